/// Settings scope the bridge reads its keys from.
pub const SETTINGS_SCOPE: &str = "dcxmpp";

/// Settings keys.
pub const KEY_JID: &str = "jid";
pub const KEY_PASSWORD: &str = "password";
pub const KEY_NICK: &str = "nick";
pub const KEY_MAX_GROUP_SIZE: &str = "max_group_size";
pub const KEY_ALLOW_BRIDGING: &str = "allow_bridging";

/// Nick the bridge uses inside every MUC room.
pub const DEFAULT_NICK: &str = "DC-Bridge";

/// Members per bound DC group before a new shard is created.
pub const DEFAULT_MAX_GROUP_SIZE: usize = 20;

/// Prefix of auto-assigned nicks (`User1`, `User2`, ...).
pub const DEFAULT_NICK_PREFIX: &str = "User";

/// Longest nick a user may pick.
pub const MAX_NICK_LEN: usize = 30;

/// Presence status announced on session start.
pub const PRESENCE_STATUS: &str = "Open source DeltaChat <--> XMPP bridge";

/// Reconnect backoff bounds, in milliseconds.
pub const RECONNECT_INITIAL_DELAY_MS: u64 = 1_000;
pub const RECONNECT_MAX_DELAY_MS: u64 = 60_000;
