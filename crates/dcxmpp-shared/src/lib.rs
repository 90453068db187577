// Types and helpers shared by every dcxmpp crate.

pub mod constants;
pub mod format;
pub mod types;

pub use types::{ChannelName, ChatId, MessageKind};
