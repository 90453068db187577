//! Contracts of the host bot framework.

use async_trait::async_trait;

use dcxmpp_shared::ChatId;
use dcxmpp_store::SharedDatabase;

/// A message delivered by the host's message-handling context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub chat: ChatId,
    pub sender: String,
    /// Empty when the message carries no text.
    pub text: String,
    pub has_attachment: bool,
}

impl IncomingMessage {
    pub fn text(chat: ChatId, sender: &str, text: &str) -> Self {
        Self {
            chat,
            sender: sender.to_string(),
            text: text.to_string(),
            has_attachment: false,
        }
    }
}

/// DC group and contact operations provided by the host.
#[async_trait]
pub trait DcClient: Send + Sync {
    /// Address of the bot's own contact.
    fn self_addr(&self) -> &str;

    /// Create a group containing the bot and `members`.
    async fn create_group(&self, name: &str, members: &[String]) -> anyhow::Result<ChatId>;

    async fn add_member(&self, chat: ChatId, addr: &str) -> anyhow::Result<()>;

    async fn remove_member(&self, chat: ChatId, addr: &str) -> anyhow::Result<()>;

    /// Addresses of every contact in the chat, the bot included.
    async fn members(&self, chat: ChatId) -> anyhow::Result<Vec<String>>;

    async fn send_text(&self, chat: ChatId, text: &str) -> anyhow::Result<()>;

    /// Send to the 1:1 chat with `addr`.
    async fn send_to_contact(&self, addr: &str, text: &str) -> anyhow::Result<()>;
}

/// Per-plugin key/value settings.
pub trait Settings: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// Hosts without their own settings storage can keep them in the bridge
/// database.
impl Settings for SharedDatabase {
    fn get(&self, key: &str) -> Option<String> {
        match self.with(|db| db.setting(key)) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to read setting");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.with(|db| db.set_setting(key, value))?;
        Ok(())
    }
}
