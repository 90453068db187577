//! # dcxmpp-store
//!
//! Durable state of the bridge, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle wrapping a
//! `rusqlite::Connection`, with typed helpers for channels, bound DC groups,
//! nick assignments, the channel whitelist and plugin settings. Writes are
//! durable when the call returns. `SharedDatabase` puts the handle behind a
//! single coarse lock so the DC and XMPP contexts can share it.

pub mod channels;
pub mod database;
pub mod groups;
pub mod migrations;
pub mod models;
pub mod nicks;
pub mod settings;
pub mod shared;
pub mod whitelist;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
pub use shared::SharedDatabase;
