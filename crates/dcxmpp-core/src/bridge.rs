//! Application context of the bridge.
//!
//! A [`Bridge`] is built once at startup and handed to every host callback.
//! It owns the store handle, the host's DC client, the XMPP gateway and the
//! command table.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use dcxmpp_net::{spawn_supervisor, SessionConfig, XmppClient, XmppHandle};
use dcxmpp_shared::ChatId;
use dcxmpp_store::SharedDatabase;

use crate::channels::{ChannelManager, Teardown};
use crate::commands::{parse_command, CommandContext, CommandSpec, CommandTable};
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::gateway::MucGateway;
use crate::host::{DcClient, IncomingMessage, Settings};
use crate::nicks::NickRegistry;
use crate::relay::{run_xmpp_relay, RelayEngine};
use crate::replies::Replies;

/// Reply for failures the user cannot act on.
const INTERNAL_ERROR_REPLY: &str = "** Something went wrong, please try again later";

pub struct Bridge {
    config: BridgeConfig,
    store: SharedDatabase,
    dc: Arc<dyn DcClient>,
    /// Set when the bridge owns the XMPP worker.
    xmpp: Option<XmppHandle>,
    nicks: NickRegistry,
    channels: ChannelManager,
    relay: RelayEngine,
    commands: CommandTable,
}

impl Bridge {
    pub fn new(
        config: BridgeConfig,
        store: SharedDatabase,
        dc: Arc<dyn DcClient>,
        muc: Arc<dyn MucGateway>,
    ) -> Self {
        Self {
            nicks: NickRegistry::new(store.clone()),
            channels: ChannelManager::new(
                store.clone(),
                dc.clone(),
                muc.clone(),
                config.max_group_size,
            ),
            relay: RelayEngine::new(store.clone(), dc.clone(), muc),
            commands: CommandTable::new(config.allow_bridging),
            config,
            store,
            dc,
            xmpp: None,
        }
    }

    /// Load the configuration, spawn the XMPP worker and the relay loop.
    ///
    /// Returns once the worker has built its client. Fails only when the
    /// configuration is unusable.
    pub async fn start<C, F>(
        settings: &dyn Settings,
        store: SharedDatabase,
        dc: Arc<dyn DcClient>,
        build_client: F,
    ) -> anyhow::Result<(Self, JoinHandle<()>)>
    where
        C: XmppClient,
        F: FnOnce(&SessionConfig) -> C + Send + 'static,
    {
        let config = BridgeConfig::load(settings)?;
        info!(?config, "Loaded bridge configuration");

        let (handle, notif_rx) =
            spawn_supervisor(build_client, config.session_config(), store.clone()).await?;

        let mut bridge = Self::new(config, store, dc, Arc::new(handle.clone()));
        bridge.xmpp = Some(handle);
        let relay_task = tokio::spawn(run_xmpp_relay(bridge.relay.clone(), notif_rx));

        info!(commands = bridge.commands.iter().count(), "Bridge started");
        Ok((bridge, relay_task))
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn store(&self) -> &SharedDatabase {
        &self.store
    }

    pub fn nicks(&self) -> &NickRegistry {
        &self.nicks
    }

    pub fn channels(&self) -> &ChannelManager {
        &self.channels
    }

    pub fn relay(&self) -> &RelayEngine {
        &self.relay
    }

    /// Registered commands, for the host's help listing.
    pub fn commands(&self) -> impl Iterator<Item = &CommandSpec> {
        self.commands.iter()
    }

    /// Handle a message from the host: registered commands are dispatched,
    /// everything else goes to the relay engine.
    pub async fn on_message(&self, msg: &IncomingMessage) -> Replies {
        if let Some((name, payload)) = parse_command(&msg.text) {
            if let Some(replies) = self.dispatch_command(name, payload, msg).await {
                return replies;
            }
        }

        match self.relay.on_group_message(msg).await {
            Ok(_) => Replies::new(),
            Err(e) => self.error_replies(e),
        }
    }

    /// Run a registered command. `None` if `name` is not registered.
    pub async fn dispatch_command(
        &self,
        name: &str,
        payload: &str,
        msg: &IncomingMessage,
    ) -> Option<Replies> {
        let spec = self.commands.get(name)?;
        let ctx = CommandContext {
            payload: payload.trim(),
            message: msg,
        };

        let replies = match (spec.handler)(self, &ctx).await {
            Ok(replies) => replies,
            Err(e) => self.error_replies(e),
        };
        Some(replies)
    }

    /// Host event: `addr` left or was removed from DC chat `chat`.
    pub async fn on_member_removed(&self, chat: ChatId, addr: &str) {
        match self.channels.on_member_removed(chat, addr).await {
            Ok(Teardown::None) => {}
            Ok(teardown) => info!(group = %chat, ?teardown, "group torn down"),
            Err(e) => error!(group = %chat, error = %e, "Failed to handle member removal"),
        }
    }

    /// Post replies through the DC client; `origin` receives untargeted
    /// ones.
    pub async fn send_replies(&self, origin: ChatId, replies: Replies) {
        for reply in replies {
            let chat = reply.chat.unwrap_or(origin);
            if let Err(e) = self.dc.send_text(chat, &reply.text).await {
                warn!(chat = %chat, error = %e, "Failed to send reply");
            }
        }
    }

    /// Stop the XMPP worker. No-op for bridges built with [`Bridge::new`].
    pub async fn shutdown(&self) {
        if let Some(xmpp) = &self.xmpp {
            if let Err(e) = xmpp.shutdown().await {
                warn!(error = %e, "XMPP worker already gone");
            }
        }
    }

    fn error_replies(&self, err: BridgeError) -> Replies {
        if err.is_internal() {
            error!(error = %err, "Bridge operation failed");
            return Replies::text(INTERNAL_ERROR_REPLY);
        }

        let mut replies = Replies::new();
        match &err {
            BridgeError::AlreadyMember { group, .. } => replies.add_to(*group, err.to_string()),
            _ => replies.add(err.to_string()),
        }
        replies
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use dcxmpp_net::{NetError, XmppEvent};
    use dcxmpp_shared::constants::{KEY_ALLOW_BRIDGING, KEY_JID, KEY_MAX_GROUP_SIZE, KEY_PASSWORD};
    use dcxmpp_shared::MessageKind;
    use tokio::sync::mpsc;

    use super::*;
    use crate::testing::{Fixture, MemorySettings, MucCall, Sent};

    const ROOM: &str = "dev@muc.example.org";

    fn config(max_group_size: usize, allow_bridging: bool) -> BridgeConfig {
        let settings = MemorySettings::default();
        settings.set(KEY_JID, "bridge@example.org").unwrap();
        settings.set(KEY_PASSWORD, "secret").unwrap();
        settings
            .set(KEY_MAX_GROUP_SIZE, &max_group_size.to_string())
            .unwrap();
        settings
            .set(KEY_ALLOW_BRIDGING, if allow_bridging { "1" } else { "0" })
            .unwrap();
        BridgeConfig::load(&settings).unwrap()
    }

    fn bridge(fx: &Fixture, max_group_size: usize, allow_bridging: bool) -> Bridge {
        Bridge::new(
            config(max_group_size, allow_bridging),
            fx.store.clone(),
            fx.dc_client(),
            fx.gateway(),
        )
    }

    fn msg(chat: u32, sender: &str, text: &str) -> IncomingMessage {
        IncomingMessage::text(ChatId(chat), sender, text)
    }

    #[tokio::test]
    async fn join_command_replies_with_nick() {
        let fx = Fixture::new();
        let bridge = bridge(&fx, 20, true);

        let replies = bridge
            .on_message(&msg(100, "a@dc", &format!("/xmpp_join {ROOM}")))
            .await;

        assert_eq!(replies.texts(), vec![format!("** You joined {ROOM} as User1")]);
    }

    #[tokio::test]
    async fn second_join_replies_in_the_group() {
        let fx = Fixture::new();
        let bridge = bridge(&fx, 20, true);
        let join = format!("/xmpp_join {ROOM}");
        bridge.on_message(&msg(100, "a@dc", &join)).await;
        let group = fx.store.with(|db| db.list_bound_groups(ROOM)).unwrap()[0];

        let replies = bridge.on_message(&msg(100, "a@dc", &join)).await;

        let reply = replies.iter().next().unwrap();
        assert_eq!(reply.chat, Some(group));
        assert_eq!(reply.text, "You are already a member of this channel");
        assert_eq!(fx.store.with(|db| db.list_bound_groups(ROOM)).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn join_without_channel_is_wrong_syntax() {
        let fx = Fixture::new();
        let bridge = bridge(&fx, 20, true);

        let replies = bridge.on_message(&msg(100, "a@dc", "/xmpp_join")).await;
        assert_eq!(replies.texts(), vec!["Wrong syntax"]);
    }

    #[tokio::test]
    async fn nick_command() {
        let fx = Fixture::new();
        let bridge = bridge(&fx, 20, true);

        let shown = bridge.on_message(&msg(100, "a@dc", "/xmpp_nick")).await;
        let set = bridge.on_message(&msg(100, "a@dc", "/xmpp_nick alice")).await;
        let bad = bridge.on_message(&msg(100, "b@dc", "/xmpp_nick bad nick")).await;
        let taken = bridge.on_message(&msg(100, "b@dc", "/xmpp_nick alice")).await;

        assert_eq!(shown.texts(), vec!["** Nick: User1"]);
        assert_eq!(set.texts(), vec!["** Nick: alice"]);
        assert!(bad.texts()[0].starts_with("** Invalid nick"));
        assert_eq!(taken.texts(), vec!["** Nick already taken"]);
    }

    #[tokio::test]
    async fn bridge_command_respects_setting() {
        let fx = Fixture::new();
        fx.dc.add_group(ChatId(7), &["a@dc"]);

        let closed = bridge(&fx, 20, false);
        let cmd = format!("/xmpp_bridge {ROOM}");
        // Unregistered: falls through to the relay, which ignores unbound chats.
        assert!(closed.on_message(&msg(7, "a@dc", &cmd)).await.is_empty());
        assert!(!fx.store.with(|db| db.channel_exists(ROOM)).unwrap());

        let open = bridge(&fx, 20, true);
        let replies = open.on_message(&msg(7, "a@dc", &cmd)).await;
        assert_eq!(
            replies.texts(),
            vec![format!("** This chat is now bridged with XMPP channel: {ROOM}")]
        );

        let again = open.on_message(&msg(7, "a@dc", "/xmpp_bridge other@muc")).await;
        assert_eq!(
            again.texts(),
            vec![format!("This chat is already bridged with channel: {ROOM}")]
        );
    }

    #[tokio::test]
    async fn plain_text_is_relayed_and_attachments_rejected() {
        let fx = Fixture::new();
        let bridge = bridge(&fx, 20, true);
        fx.dc.add_group(ChatId(7), &["a@dc"]);
        bridge
            .on_message(&msg(7, "a@dc", &format!("/xmpp_bridge {ROOM}")))
            .await;

        assert!(bridge.on_message(&msg(7, "a@dc", "hi")).await.is_empty());
        assert_eq!(fx.muc.sends(), vec![(ROOM.to_string(), "User1[dc]:\nhi".to_string())]);

        let mut photo = msg(7, "a@dc", "");
        photo.has_attachment = true;
        let replies = bridge.on_message(&photo).await;
        assert_eq!(replies.texts(), vec!["Unsupported message"]);
        assert_eq!(fx.muc.sends().len(), 1);
    }

    #[tokio::test]
    async fn members_command() {
        let fx = Fixture::new();
        let bridge = bridge(&fx, 20, true);
        bridge
            .on_message(&msg(100, "a@dc", &format!("/xmpp_join {ROOM}")))
            .await;
        let group = fx.store.with(|db| db.list_bound_groups(ROOM)).unwrap()[0];
        fx.muc.set_roster(ROOM, &["DC-Bridge", "alice"]);

        let replies = bridge.on_message(&msg(group.0, "a@dc", "/xmpp_members")).await;
        assert_eq!(replies.texts(), vec!["Members:\n• User1[dc]\n• alice[xmpp]\n"]);

        let outside = bridge.on_message(&msg(100, "a@dc", "/xmpp_members")).await;
        assert_eq!(outside.texts(), vec!["This is not an XMPP channel"]);
    }

    #[tokio::test]
    async fn remove_command_and_teardown() {
        let fx = Fixture::new();
        let bridge = bridge(&fx, 20, true);
        let join = format!("/xmpp_join {ROOM}");
        bridge.on_message(&msg(100, "a@dc", &join)).await;
        bridge.on_message(&msg(101, "b@dc", &join)).await;
        let group = fx.store.with(|db| db.list_bound_groups(ROOM)).unwrap()[0];
        fx.dc.clear_sent();

        let replies = bridge
            .on_message(&msg(group.0, "a@dc", "/xmpp_remove User2"))
            .await;

        assert!(replies.is_empty());
        assert!(fx.dc.sent().contains(&Sent::Contact(
            "b@dc".into(),
            format!("Removed from {ROOM} by User1")
        )));

        // Only a and the bot are left; a leaving tears the channel down.
        fx.dc.remove_member(group, "a@dc").await.unwrap();
        bridge.on_member_removed(group, "a@dc").await;
        assert!(!fx.store.with(|db| db.channel_exists(ROOM)).unwrap());
        assert_eq!(fx.muc.count(&MucCall::Leave(ROOM.into())), 1);
    }

    #[tokio::test]
    async fn unknown_commands_are_relayed() {
        let fx = Fixture::new();
        let bridge = bridge(&fx, 20, true);
        fx.dc.add_group(ChatId(7), &["a@dc"]);
        bridge
            .on_message(&msg(7, "a@dc", &format!("/xmpp_bridge {ROOM}")))
            .await;

        bridge.on_message(&msg(7, "a@dc", "/shrug")).await;

        assert_eq!(fx.muc.sends(), vec![(ROOM.to_string(), "User1[dc]:\n/shrug".to_string())]);
    }

    #[tokio::test]
    async fn send_replies_targets_origin_by_default() {
        let fx = Fixture::new();
        let bridge = bridge(&fx, 20, true);
        let mut replies = Replies::text("here");
        replies.add_to(ChatId(9), "there");

        bridge.send_replies(ChatId(1), replies).await;

        assert_eq!(
            fx.dc.sent(),
            vec![
                Sent::Chat(ChatId(1), "here".into()),
                Sent::Chat(ChatId(9), "there".into()),
            ]
        );
    }

    /// Client whose stream starts a session right away and then relays
    /// whatever the test pushes.
    struct LoopbackClient {
        events: mpsc::UnboundedReceiver<XmppEvent>,
        started: bool,
    }

    #[async_trait]
    impl XmppClient for LoopbackClient {
        async fn connect(&mut self, _jid: &str, _password: &str) -> Result<(), NetError> {
            Ok(())
        }

        async fn disconnect(&mut self) {}

        async fn send_presence(&mut self, _status: &str) -> Result<(), NetError> {
            Ok(())
        }

        async fn fetch_roster(&mut self) -> Result<(), NetError> {
            Ok(())
        }

        async fn join_muc(&mut self, _room: &str, _nick: &str) -> Result<(), NetError> {
            Ok(())
        }

        async fn leave_muc(&mut self, _room: &str, _nick: &str) -> Result<(), NetError> {
            Ok(())
        }

        async fn send_message(
            &mut self,
            _to: &str,
            _body: &str,
            _kind: MessageKind,
        ) -> Result<(), NetError> {
            Ok(())
        }

        async fn room_roster(&mut self, _room: &str) -> Result<Vec<String>, NetError> {
            Ok(Vec::new())
        }

        async fn next_event(&mut self) -> Result<XmppEvent, NetError> {
            if !self.started {
                self.started = true;
                return Ok(XmppEvent::SessionStarted);
            }
            match self.events.recv().await {
                Some(event) => Ok(event),
                None => std::future::pending().await,
            }
        }
    }

    #[tokio::test]
    async fn start_wires_xmpp_into_dc_groups() {
        let fx = Fixture::new();
        fx.dc.add_group(ChatId(7), &["a@dc"]);
        fx.store
            .with(|db| {
                db.add_channel(ROOM)?;
                db.add_bound_group(ChatId(7), ROOM)
            })
            .unwrap();

        let settings = MemorySettings::default();
        settings.set(KEY_JID, "bridge@example.org").unwrap();
        settings.set(KEY_PASSWORD, "secret").unwrap();

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let client = LoopbackClient {
            events: events_rx,
            started: false,
        };

        let (bridge, _relay) = Bridge::start(&settings, fx.store.clone(), fx.dc_client(), move |_| client)
            .await
            .unwrap();
        assert_eq!(bridge.config().nick, "DC-Bridge");

        events_tx
            .send(XmppEvent::Message {
                room: ROOM.into(),
                nick: "alice".into(),
                kind: MessageKind::Groupchat,
                body: "hello from xmpp".into(),
            })
            .unwrap();
        events_tx
            .send(XmppEvent::Message {
                room: ROOM.into(),
                nick: "DC-Bridge".into(),
                kind: MessageKind::Groupchat,
                body: "echo".into(),
            })
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while fx.dc.sent_to(ChatId(7)).is_empty() {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(fx.dc.sent_to(ChatId(7)), vec!["alice[xmpp]:\nhello from xmpp".to_string()]);

        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn start_fails_without_credentials() {
        let fx = Fixture::new();
        let settings = MemorySettings::default();
        settings.set(KEY_JID, "").unwrap();
        settings.set(KEY_PASSWORD, "").unwrap();
        let (_tx, events_rx) = mpsc::unbounded_channel();
        let client = LoopbackClient {
            events: events_rx,
            started: false,
        };

        let result = Bridge::start(&settings, fx.store.clone(), fx.dc_client(), move |_| client).await;
        assert!(result.is_err());
    }
}
