//! Message pump between bound DC groups and MUC rooms.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use dcxmpp_net::XmppNotification;
use dcxmpp_shared::format::{dc_attribution, xmpp_attribution};
use dcxmpp_shared::{ChatId, MessageKind};
use dcxmpp_store::SharedDatabase;

use crate::error::BridgeError;
use crate::gateway::MucGateway;
use crate::host::{DcClient, IncomingMessage};
use crate::nicks::NickRegistry;

/// Who is in a channel, on both networks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemberList {
    pub dc: Vec<String>,
    pub xmpp: Vec<String>,
}

impl MemberList {
    pub fn render(&self) -> String {
        let mut out = String::from("Members:\n");
        for nick in &self.dc {
            out.push_str(&format!("• {nick}[dc]\n"));
        }
        for nick in &self.xmpp {
            out.push_str(&format!("• {nick}[xmpp]\n"));
        }
        out
    }
}

#[derive(Clone)]
pub struct RelayEngine {
    store: SharedDatabase,
    dc: Arc<dyn DcClient>,
    muc: Arc<dyn MucGateway>,
    nicks: NickRegistry,
}

impl RelayEngine {
    pub fn new(store: SharedDatabase, dc: Arc<dyn DcClient>, muc: Arc<dyn MucGateway>) -> Self {
        Self {
            nicks: NickRegistry::new(store.clone()),
            store,
            dc,
            muc,
        }
    }

    /// Relay a DC group message to the room and to the channel's other
    /// groups. Returns `false` when the chat is not bound to a channel.
    pub async fn on_group_message(&self, msg: &IncomingMessage) -> Result<bool, BridgeError> {
        let Some(channel) = self.store.with(|db| db.channel_by_group(msg.chat))? else {
            return Ok(false);
        };

        if msg.text.is_empty() || msg.has_attachment {
            return Err(BridgeError::UnsupportedMessage);
        }

        let nick = self.nicks.nick(&msg.sender)?;
        let text = dc_attribution(&nick, &msg.text);

        debug!(channel = %channel, group = %msg.chat, "Sending message to XMPP");
        // Sibling groups do not depend on the XMPP side.
        if let Err(e) = self.muc.send_group_message(&channel, &text).await {
            warn!(channel = %channel, error = %e, "Failed to relay to XMPP");
        }

        let siblings = self.store.with(|db| db.list_bound_groups(&channel))?;
        for group in siblings.into_iter().filter(|g| *g != msg.chat) {
            if let Err(e) = self.dc.send_text(group, &text).await {
                warn!(group = %group, error = %e, "Failed to relay to sibling group");
            }
        }
        Ok(true)
    }

    /// Relay a room message to every bound group. Returns how many groups
    /// received it.
    pub async fn on_xmpp_message(
        &self,
        room: &str,
        nick: &str,
        kind: MessageKind,
        body: &str,
    ) -> Result<usize, BridgeError> {
        if nick == self.muc.nick() || kind != MessageKind::Groupchat {
            return Ok(0);
        }

        let text = xmpp_attribution(nick, body);
        let mut delivered = 0;
        for group in self.store.with(|db| db.list_bound_groups(room))? {
            match self.dc.send_text(group, &text).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(group = %group, error = %e, "Failed to relay XMPP message"),
            }
        }

        debug!(room = %room, nick = %nick, delivered, "Relayed XMPP message");
        Ok(delivered)
    }

    /// Members of the channel `chat` is bound to.
    pub async fn list_members(&self, chat: ChatId) -> Result<MemberList, BridgeError> {
        let channel = self
            .store
            .with(|db| db.channel_by_group(chat))?
            .ok_or(BridgeError::NotAChannel)?;

        let me = self.dc.self_addr();
        let mut members = MemberList::default();
        for group in self.store.with(|db| db.list_bound_groups(&channel))? {
            for addr in self.dc.members(group).await? {
                if addr != me {
                    members.dc.push(self.nicks.nick(&addr)?);
                }
            }
        }

        let own = self.muc.nick();
        members.xmpp = self
            .muc
            .list_room_members(&channel)
            .await?
            .into_iter()
            .filter(|n| !n.is_empty() && n != own)
            .collect();

        Ok(members)
    }
}

/// Feed XMPP notifications to the relay engine until the worker goes away.
pub async fn run_xmpp_relay(relay: RelayEngine, mut notif_rx: mpsc::Receiver<XmppNotification>) {
    info!("XMPP relay loop started");

    while let Some(notification) = notif_rx.recv().await {
        match notification {
            XmppNotification::Message {
                room,
                nick,
                kind,
                body,
            } => {
                if let Err(e) = relay.on_xmpp_message(&room, &nick, kind, &body).await {
                    warn!(room = %room, error = %e, "Failed to relay XMPP message");
                }
            }
        }
    }

    warn!("XMPP relay loop ended");
}
