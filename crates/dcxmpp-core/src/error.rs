use thiserror::Error;

use dcxmpp_net::NetError;
use dcxmpp_shared::ChatId;
use dcxmpp_store::StoreError;

/// Everything a bridge operation can fail with. The `Display` text is the
/// reply shown to the user.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Wrong syntax")]
    WrongSyntax,

    #[error("That channel isn't in the whitelist")]
    NotWhitelisted(String),

    /// `group` is the bound group already holding the member.
    #[error("You are already a member of this channel")]
    AlreadyMember { channel: String, group: ChatId },

    #[error("This chat is already bridged with channel: {channel}")]
    AlreadyBound { channel: String },

    #[error("** Invalid nick, only letters and numbers are allowed, and nick should be less than 30 characters")]
    InvalidNick,

    #[error("** Nick already taken")]
    NickTaken,

    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("Unsupported message")]
    UnsupportedMessage,

    /// `who: None` means the requester.
    #[error("{}", not_a_member(.channel, .who.as_deref()))]
    NotAMember { channel: String, who: Option<String> },

    #[error("This is not an XMPP channel")]
    NotAChannel,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("DC client error: {0}")]
    Dc(#[from] anyhow::Error),

    #[error(transparent)]
    Xmpp(#[from] NetError),
}

impl BridgeError {
    /// Internal failures get a generic reply; their details go to the log.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Dc(_) | Self::Xmpp(_))
    }
}

fn not_a_member(channel: &str, who: Option<&str>) -> String {
    match who {
        None => "You are not a member of that channel".to_string(),
        Some(who) => format!("{who} is not a member of {channel}"),
    }
}
