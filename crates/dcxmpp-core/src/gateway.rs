//! What the channel manager and relay engine need from the XMPP side.

use async_trait::async_trait;

use dcxmpp_net::{NetError, XmppHandle};

#[async_trait]
pub trait MucGateway: Send + Sync {
    /// Nick the bridge uses in rooms.
    fn nick(&self) -> &str;

    async fn join_channel(&self, room: &str) -> Result<(), NetError>;

    async fn leave_channel(&self, room: &str) -> Result<(), NetError>;

    async fn send_group_message(&self, room: &str, body: &str) -> Result<(), NetError>;

    async fn list_room_members(&self, room: &str) -> Result<Vec<String>, NetError>;
}

#[async_trait]
impl MucGateway for XmppHandle {
    fn nick(&self) -> &str {
        XmppHandle::nick(self)
    }

    async fn join_channel(&self, room: &str) -> Result<(), NetError> {
        XmppHandle::join_channel(self, room).await
    }

    async fn leave_channel(&self, room: &str) -> Result<(), NetError> {
        XmppHandle::leave_channel(self, room).await
    }

    async fn send_group_message(&self, room: &str, body: &str) -> Result<(), NetError> {
        XmppHandle::send_group_message(self, room, body).await
    }

    async fn list_room_members(&self, room: &str) -> Result<Vec<String>, NetError> {
        XmppHandle::list_room_members(self, room).await
    }
}
