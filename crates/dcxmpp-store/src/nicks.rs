//! Nick assignments (`addr -> nick`, nick unique).

use rusqlite::{params, OptionalExtension};

use dcxmpp_shared::constants::DEFAULT_NICK_PREFIX;

use crate::database::Database;
use crate::error::{Result, StoreError};

impl Database {
    /// Nick of `addr`, assigning the first free `User{N}` if it has none.
    pub fn nick(&self, addr: &str) -> Result<String> {
        let tx = self.conn().unchecked_transaction()?;

        let existing: Option<String> = tx
            .query_row("SELECT nick FROM nicks WHERE addr = ?1", params![addr], |row| {
                row.get(0)
            })
            .optional()?;
        if let Some(nick) = existing {
            return Ok(nick);
        }

        let mut i: u64 = 1;
        let nick = loop {
            let candidate = format!("{DEFAULT_NICK_PREFIX}{i}");
            let taken: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM nicks WHERE nick = ?1)",
                params![candidate],
                |row| row.get(0),
            )?;
            if !taken {
                break candidate;
            }
            i += 1;
        };

        tx.execute(
            "INSERT INTO nicks (addr, nick) VALUES (?1, ?2)",
            params![addr, nick],
        )?;
        tx.commit()?;

        tracing::debug!(addr = %addr, nick = %nick, "assigned default nick");
        Ok(nick)
    }

    /// Assign `nick` to `addr`.
    ///
    /// Fails with [`StoreError::Conflict`] if another address owns the nick.
    /// Re-assigning an address its own nick is a no-op.
    pub fn set_nick(&self, addr: &str, nick: &str) -> Result<()> {
        let tx = self.conn().unchecked_transaction()?;

        let owner: Option<String> = tx
            .query_row("SELECT addr FROM nicks WHERE nick = ?1", params![nick], |row| {
                row.get(0)
            })
            .optional()?;
        if let Some(owner) = owner {
            if owner != addr {
                return Err(StoreError::Conflict(format!("nick {nick} is taken")));
            }
        }

        tx.execute(
            "INSERT INTO nicks (addr, nick) VALUES (?1, ?2)
             ON CONFLICT(addr) DO UPDATE SET nick = excluded.nick",
            params![addr, nick],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Address owning `nick`, if any.
    pub fn addr_by_nick(&self, nick: &str) -> Result<Option<String>> {
        let addr = self
            .conn()
            .query_row("SELECT addr FROM nicks WHERE nick = ?1", params![nick], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(addr)
    }
}
