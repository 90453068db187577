//! v001 -- Initial schema creation.
//!
//! Creates `channels`, `bound_groups`, `nicks`, `whitelist` and `settings`.

use rusqlite::Connection;

const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Channels (one per bridged MUC room)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS channels (
    id         INTEGER PRIMARY KEY,
    name       TEXT NOT NULL UNIQUE,          -- lowercase room JID
    created_at TEXT NOT NULL                  -- RFC-3339
);

-- ----------------------------------------------------------------
-- DC groups bound to a channel
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS bound_groups (
    chat_id    INTEGER PRIMARY KEY NOT NULL,  -- DC chat id
    channel_id INTEGER NOT NULL,

    FOREIGN KEY (channel_id) REFERENCES channels(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_bound_groups_channel ON bound_groups(channel_id);

-- ----------------------------------------------------------------
-- Nicks
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS nicks (
    addr TEXT PRIMARY KEY NOT NULL,
    nick TEXT NOT NULL UNIQUE
);

-- ----------------------------------------------------------------
-- Whitelist (empty = every channel allowed)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS whitelist (
    name TEXT PRIMARY KEY NOT NULL            -- lowercase room JID
);

-- ----------------------------------------------------------------
-- Plugin settings
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS settings (
    key   TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
