use serde::Serialize;

use dcxmpp_shared::ChatId;

/// A text the host should post; `chat: None` targets the originating chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub chat: Option<ChatId>,
    pub text: String,
}

/// Replies collected while handling one inbound message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Replies(Vec<Reply>);

impl Replies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(text: impl Into<String>) -> Self {
        let mut replies = Self::new();
        replies.add(text);
        replies
    }

    pub fn add(&mut self, text: impl Into<String>) {
        self.0.push(Reply {
            chat: None,
            text: text.into(),
        });
    }

    pub fn add_to(&mut self, chat: ChatId, text: impl Into<String>) {
        self.0.push(Reply {
            chat: Some(chat),
            text: text.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reply> {
        self.0.iter()
    }

    /// Texts in order, for assertions and logging.
    pub fn texts(&self) -> Vec<&str> {
        self.0.iter().map(|r| r.text.as_str()).collect()
    }
}

impl IntoIterator for Replies {
    type Item = Reply;
    type IntoIter = std::vec::IntoIter<Reply>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
