//! CRUD operations for [`Channel`] records.
//!
//! Every name argument is lowercased before it touches SQL, so lookups are
//! case-insensitive.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use dcxmpp_shared::ChatId;

use crate::database::Database;
use crate::error::Result;
use crate::models::Channel;

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a channel. Adding an existing channel is a no-op.
    pub fn add_channel(&self, name: &str) -> Result<()> {
        let name = name.to_lowercase();
        self.conn().execute(
            "INSERT OR IGNORE INTO channels (name, created_at) VALUES (?1, ?2)",
            params![name, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn channel_exists(&self, name: &str) -> Result<bool> {
        Ok(self.channel_id(name)?.is_some())
    }

    /// Name of the channel the given DC chat is bound to.
    pub fn channel_by_group(&self, chat_id: ChatId) -> Result<Option<String>> {
        let name = self
            .conn()
            .query_row(
                "SELECT c.name
                 FROM bound_groups g
                 JOIN channels c ON c.id = g.channel_id
                 WHERE g.chat_id = ?1",
                params![chat_id.0],
                |row| row.get(0),
            )
            .optional()?;
        Ok(name)
    }

    /// List all channels in creation order.
    pub fn list_channels(&self) -> Result<Vec<Channel>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT name, created_at FROM channels ORDER BY id ASC")?;

        let rows = stmt.query_map([], row_to_channel)?;

        let mut channels = Vec::new();
        for row in rows {
            channels.push(row?);
        }
        Ok(channels)
    }

    /// Names of all channels in creation order.
    pub fn channel_names(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn().prepare("SELECT name FROM channels ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<std::result::Result<Vec<String>, _>>()?)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a channel and, through the foreign key, its bound groups.
    /// Returns `true` if a row was deleted.
    pub fn remove_channel(&self, name: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM channels WHERE name = ?1",
            params![name.to_lowercase()],
        )?;
        Ok(affected > 0)
    }

    pub(crate) fn channel_id(&self, name: &str) -> Result<Option<i64>> {
        let id = self
            .conn()
            .query_row(
                "SELECT id FROM channels WHERE name = ?1",
                params![name.to_lowercase()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }
}

/// Map a `rusqlite::Row` to a [`Channel`].
fn row_to_channel(row: &rusqlite::Row<'_>) -> rusqlite::Result<Channel> {
    let name: String = row.get(0)?;
    let created_str: String = row.get(1)?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Channel { name, created_at })
}
