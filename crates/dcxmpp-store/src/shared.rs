//! Coarse-locked handle shared between the DC and XMPP contexts.
//!
//! SQLite connections are not `Sync`; every access goes through one mutex
//! and holds it for the duration of a single closure.

use std::sync::{Arc, Mutex};

use crate::database::Database;
use crate::error::{Result, StoreError};

#[derive(Clone)]
pub struct SharedDatabase {
    inner: Arc<Mutex<Database>>,
}

impl SharedDatabase {
    pub fn new(db: Database) -> Self {
        Self {
            inner: Arc::new(Mutex::new(db)),
        }
    }

    /// Run `f` with exclusive access to the database.
    ///
    /// Never hold the guard across an `.await`: keep `f` synchronous.
    pub fn with<T>(&self, f: impl FnOnce(&Database) -> Result<T>) -> Result<T> {
        let guard = self.inner.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&guard)
    }
}
