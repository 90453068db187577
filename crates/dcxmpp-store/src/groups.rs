//! Bound DC groups: which DC chats relay into which channel.

use rusqlite::params;

use dcxmpp_shared::ChatId;

use crate::database::Database;
use crate::error::{Result, StoreError};

impl Database {
    /// Bind a DC chat to an existing channel.
    ///
    /// Fails with [`StoreError::NotFound`] if the channel is unknown and with
    /// [`StoreError::Conflict`] if the chat is already bound.
    pub fn add_bound_group(&self, chat_id: ChatId, channel: &str) -> Result<()> {
        let channel_id = self.channel_id(channel)?.ok_or(StoreError::NotFound)?;

        self.conn()
            .execute(
                "INSERT INTO bound_groups (chat_id, channel_id) VALUES (?1, ?2)",
                params![chat_id.0, channel_id],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    StoreError::Conflict(format!("chat {chat_id} is already bound"))
                }
                other => StoreError::Sqlite(other),
            })?;
        Ok(())
    }

    /// DC chats bound to the channel, in binding order. Unknown channels
    /// have no groups.
    pub fn list_bound_groups(&self, channel: &str) -> Result<Vec<ChatId>> {
        let mut stmt = self.conn().prepare(
            "SELECT g.chat_id
             FROM bound_groups g
             JOIN channels c ON c.id = g.channel_id
             WHERE c.name = ?1
             ORDER BY g.rowid ASC",
        )?;

        let rows = stmt.query_map(params![channel.to_lowercase()], |row| {
            row.get::<_, u32>(0).map(ChatId)
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Unbind a DC chat. Returns `true` if it was bound.
    pub fn remove_bound_group(&self, chat_id: ChatId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM bound_groups WHERE chat_id = ?1",
            params![chat_id.0],
        )?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_and_list() {
        let db = Database::open_in_memory().unwrap();
        db.add_channel("room@muc").unwrap();
        db.add_bound_group(ChatId(1), "room@muc").unwrap();
        db.add_bound_group(ChatId(2), "ROOM@muc").unwrap();

        assert_eq!(db.list_bound_groups("room@muc").unwrap(), vec![ChatId(1), ChatId(2)]);
        assert!(db.list_bound_groups("other@muc").unwrap().is_empty());
    }

    #[test]
    fn binding_requires_channel() {
        let db = Database::open_in_memory().unwrap();
        let err = db.add_bound_group(ChatId(1), "missing@muc").unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[test]
    fn chat_binds_to_one_channel() {
        let db = Database::open_in_memory().unwrap();
        db.add_channel("a@muc").unwrap();
        db.add_channel("b@muc").unwrap();
        db.add_bound_group(ChatId(7), "a@muc").unwrap();

        let err = db.add_bound_group(ChatId(7), "b@muc").unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(db.channel_by_group(ChatId(7)).unwrap().as_deref(), Some("a@muc"));
    }

    #[test]
    fn removing_channel_drops_its_groups() {
        let db = Database::open_in_memory().unwrap();
        db.add_channel("a@muc").unwrap();
        db.add_bound_group(ChatId(3), "a@muc").unwrap();

        db.remove_channel("a@muc").unwrap();

        assert_eq!(db.channel_by_group(ChatId(3)).unwrap(), None);
        assert!(!db.remove_bound_group(ChatId(3)).unwrap());
    }

    #[test]
    fn unbind() {
        let db = Database::open_in_memory().unwrap();
        db.add_channel("a@muc").unwrap();
        db.add_bound_group(ChatId(3), "a@muc").unwrap();

        assert!(db.remove_bound_group(ChatId(3)).unwrap());
        assert!(db.list_bound_groups("a@muc").unwrap().is_empty());
        assert!(db.channel_exists("a@muc").unwrap());
    }
}
