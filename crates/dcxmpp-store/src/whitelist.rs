//! Channel whitelist. An empty whitelist allows every channel.

use rusqlite::params;

use crate::database::Database;
use crate::error::Result;

impl Database {
    pub fn is_whitelisted(&self, name: &str) -> Result<bool> {
        let (total, listed): (i64, bool) = self.conn().query_row(
            "SELECT COUNT(*), COALESCE(MAX(name = ?1), 0) FROM whitelist",
            params![name.to_lowercase()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(total == 0 || listed)
    }

    pub fn add_to_whitelist(&self, name: &str) -> Result<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO whitelist (name) VALUES (?1)",
            params![name.to_lowercase()],
        )?;
        Ok(())
    }

    /// Returns `true` if the name was listed.
    pub fn remove_from_whitelist(&self, name: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM whitelist WHERE name = ?1",
            params![name.to_lowercase()],
        )?;
        Ok(affected > 0)
    }

    pub fn whitelist(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn().prepare("SELECT name FROM whitelist ORDER BY name ASC")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<std::result::Result<Vec<String>, _>>()?)
    }
}
