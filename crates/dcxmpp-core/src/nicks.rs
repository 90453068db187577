//! Per-address nicks shown on the XMPP side of the bridge.

use dcxmpp_shared::format::is_valid_nick;
use dcxmpp_store::{SharedDatabase, StoreError};

use crate::error::BridgeError;

#[derive(Clone)]
pub struct NickRegistry {
    store: SharedDatabase,
}

impl NickRegistry {
    pub fn new(store: SharedDatabase) -> Self {
        Self { store }
    }

    /// Current nick of `addr`; the first free `User{N}` is assigned on first
    /// use.
    pub fn nick(&self, addr: &str) -> Result<String, BridgeError> {
        Ok(self.store.with(|db| db.nick(addr))?)
    }

    pub fn rename(&self, addr: &str, new_nick: &str) -> Result<(), BridgeError> {
        if !is_valid_nick(new_nick) {
            return Err(BridgeError::InvalidNick);
        }

        let result = self.store.with(|db| {
            if let Some(owner) = db.addr_by_nick(new_nick)? {
                if owner != addr {
                    return Err(StoreError::Conflict(new_nick.to_string()));
                }
            }
            db.set_nick(addr, new_nick)
        });

        match result {
            Ok(()) => {
                tracing::info!(addr = %addr, nick = %new_nick, "nick changed");
                Ok(())
            }
            Err(StoreError::Conflict(_)) => Err(BridgeError::NickTaken),
            Err(e) => Err(e.into()),
        }
    }

    /// Address for a user given either as an address (contains `@`) or as a
    /// nick.
    pub fn resolve(&self, addr_or_nick: &str) -> Result<String, BridgeError> {
        if addr_or_nick.contains('@') {
            return Ok(addr_or_nick.to_string());
        }
        self.store
            .with(|db| db.addr_by_nick(addr_or_nick))?
            .ok_or_else(|| BridgeError::UnknownUser(addr_or_nick.to_string()))
    }
}
