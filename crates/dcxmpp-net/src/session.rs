//! Contract of the XMPP client library the supervisor drives.

use async_trait::async_trait;

use dcxmpp_shared::MessageKind;

use crate::error::NetError;

/// Events delivered by an established XMPP stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmppEvent {
    /// The stream is authenticated and bound; the session may be used.
    SessionStarted,
    /// A message stanza. `room` is the bare room JID for MUC traffic.
    Message {
        room: String,
        nick: String,
        kind: MessageKind,
        body: String,
    },
    /// The server closed the stream.
    Disconnected,
}

/// One XMPP client connection with MUC support.
///
/// The supervisor owns the client for the whole process lifetime and calls
/// [`XmppClient::connect`] again after every disconnect.
#[async_trait]
pub trait XmppClient: Send + 'static {
    async fn connect(&mut self, jid: &str, password: &str) -> Result<(), NetError>;

    /// Drop the current stream, if any.
    async fn disconnect(&mut self);

    async fn send_presence(&mut self, status: &str) -> Result<(), NetError>;

    async fn fetch_roster(&mut self) -> Result<(), NetError>;

    async fn join_muc(&mut self, room: &str, nick: &str) -> Result<(), NetError>;

    async fn leave_muc(&mut self, room: &str, nick: &str) -> Result<(), NetError>;

    async fn send_message(&mut self, to: &str, body: &str, kind: MessageKind)
        -> Result<(), NetError>;

    /// Occupant nicks currently known in `room`.
    async fn room_roster(&mut self, room: &str) -> Result<Vec<String>, NetError>;

    /// Next event on the stream. Must be cancel-safe: the supervisor drops
    /// this future whenever a command arrives first.
    async fn next_event(&mut self) -> Result<XmppEvent, NetError>;
}
