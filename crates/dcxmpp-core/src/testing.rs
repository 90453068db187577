//! In-memory fakes of the host and XMPP collaborators.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use dcxmpp_net::NetError;
use dcxmpp_shared::ChatId;
use dcxmpp_store::{Database, SharedDatabase};

use crate::gateway::MucGateway;
use crate::host::{DcClient, Settings};

pub const BOT: &str = "bot@dc.example.org";

pub fn memory_store() -> SharedDatabase {
    SharedDatabase::new(Database::open_in_memory().unwrap())
}

#[derive(Default)]
pub struct MemorySettings {
    values: Mutex<HashMap<String, String>>,
}

impl Settings for MemorySettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Chat(ChatId, String),
    Contact(String, String),
}

#[derive(Default)]
struct DcState {
    groups: BTreeMap<ChatId, Vec<String>>,
    names: HashMap<ChatId, String>,
    next_id: u32,
    sent: Vec<Sent>,
    refuse_groups: bool,
}

/// DC host fake. Every group contains the bot.
#[derive(Default)]
pub struct FakeDc {
    state: Mutex<DcState>,
}

impl FakeDc {
    /// Register an existing group with the given members (plus the bot).
    pub fn add_group(&self, chat: ChatId, members: &[&str]) {
        let mut state = self.state.lock().unwrap();
        let mut all = vec![BOT.to_string()];
        all.extend(members.iter().map(|m| m.to_string()));
        state.groups.insert(chat, all);
        state.next_id = state.next_id.max(chat.0);
    }

    pub fn members_of(&self, chat: ChatId) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .groups
            .get(&chat)
            .cloned()
            .unwrap_or_default()
    }

    /// Make every later `create_group` fail.
    pub fn refuse_new_groups(&self) {
        self.state.lock().unwrap().refuse_groups = true;
    }

    pub fn group_name(&self, chat: ChatId) -> Option<String> {
        self.state.lock().unwrap().names.get(&chat).cloned()
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn sent_to(&self, chat: ChatId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Chat(c, text) if c == chat => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn clear_sent(&self) {
        self.state.lock().unwrap().sent.clear();
    }
}

#[async_trait]
impl DcClient for FakeDc {
    fn self_addr(&self) -> &str {
        BOT
    }

    async fn create_group(&self, name: &str, members: &[String]) -> anyhow::Result<ChatId> {
        let mut state = self.state.lock().unwrap();
        if state.refuse_groups {
            anyhow::bail!("host refused to create group {name}");
        }
        state.next_id += 1;
        let chat = ChatId(state.next_id);
        let mut all = vec![BOT.to_string()];
        all.extend(members.iter().cloned());
        state.groups.insert(chat, all);
        state.names.insert(chat, name.to_string());
        Ok(chat)
    }

    async fn add_member(&self, chat: ChatId, addr: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        let group = state
            .groups
            .get_mut(&chat)
            .ok_or_else(|| anyhow::anyhow!("no such chat {chat}"))?;
        group.push(addr.to_string());
        Ok(())
    }

    async fn remove_member(&self, chat: ChatId, addr: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        let group = state
            .groups
            .get_mut(&chat)
            .ok_or_else(|| anyhow::anyhow!("no such chat {chat}"))?;
        group.retain(|m| m != addr);
        Ok(())
    }

    async fn members(&self, chat: ChatId) -> anyhow::Result<Vec<String>> {
        self.state
            .lock()
            .unwrap()
            .groups
            .get(&chat)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no such chat {chat}"))
    }

    async fn send_text(&self, chat: ChatId, text: &str) -> anyhow::Result<()> {
        self.state
            .lock()
            .unwrap()
            .sent
            .push(Sent::Chat(chat, text.to_string()));
        Ok(())
    }

    async fn send_to_contact(&self, addr: &str, text: &str) -> anyhow::Result<()> {
        self.state
            .lock()
            .unwrap()
            .sent
            .push(Sent::Contact(addr.to_string(), text.to_string()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MucCall {
    Join(String),
    Leave(String),
    Send(String, String),
}

/// XMPP side fake recording every call.
pub struct FakeMuc {
    nick: String,
    calls: Mutex<Vec<MucCall>>,
    rosters: Mutex<HashMap<String, Vec<String>>>,
    offline: AtomicBool,
}

impl FakeMuc {
    pub fn new(nick: &str) -> Self {
        Self {
            nick: nick.to_string(),
            calls: Mutex::new(Vec::new()),
            rosters: Mutex::new(HashMap::new()),
            offline: AtomicBool::new(false),
        }
    }

    /// Fail sends as if the XMPP worker were gone.
    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub fn set_roster(&self, room: &str, nicks: &[&str]) {
        self.rosters.lock().unwrap().insert(
            room.to_string(),
            nicks.iter().map(|n| n.to_string()).collect(),
        );
    }

    pub fn calls(&self) -> Vec<MucCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &MucCall) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn sends(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                MucCall::Send(room, body) => Some((room, body)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl MucGateway for FakeMuc {
    fn nick(&self) -> &str {
        &self.nick
    }

    async fn join_channel(&self, room: &str) -> Result<(), NetError> {
        self.calls.lock().unwrap().push(MucCall::Join(room.to_string()));
        Ok(())
    }

    async fn leave_channel(&self, room: &str) -> Result<(), NetError> {
        self.calls.lock().unwrap().push(MucCall::Leave(room.to_string()));
        Ok(())
    }

    async fn send_group_message(&self, room: &str, body: &str) -> Result<(), NetError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(NetError::WorkerGone);
        }
        self.calls
            .lock()
            .unwrap()
            .push(MucCall::Send(room.to_string(), body.to_string()));
        Ok(())
    }

    async fn list_room_members(&self, room: &str) -> Result<Vec<String>, NetError> {
        Ok(self
            .rosters
            .lock()
            .unwrap()
            .get(room)
            .cloned()
            .unwrap_or_default())
    }
}

/// Store and fakes wired together.
pub struct Fixture {
    pub store: SharedDatabase,
    pub dc: Arc<FakeDc>,
    pub muc: Arc<FakeMuc>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            store: memory_store(),
            dc: Arc::new(FakeDc::default()),
            muc: Arc::new(FakeMuc::new("DC-Bridge")),
        }
    }

    pub fn dc_client(&self) -> Arc<dyn DcClient> {
        self.dc.clone()
    }

    pub fn gateway(&self) -> Arc<dyn MucGateway> {
        self.muc.clone()
    }
}
