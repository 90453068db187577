//! Domain model structs persisted in the bridge database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bridged MUC room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Channel {
    /// Lowercase room JID, unique.
    pub name: String,
    /// When the bridge first bound this room.
    pub created_at: DateTime<Utc>,
}

