//! # dcxmpp-core
//!
//! Routing and state logic of the DC <-> XMPP bridge.
//!
//! - [`nicks`] keeps per-address nicks unique and validated
//! - [`channels`] creates, shards and tears down bridged channels
//! - [`relay`] moves messages between DC groups and MUC rooms
//! - [`commands`] is the registration table for the user commands
//! - [`bridge`] wires everything into one application context
//!
//! The DC client, the host's settings storage and the XMPP client library
//! are reached only through the traits in [`host`], [`gateway`] and
//! `dcxmpp_net::XmppClient`.

pub mod bridge;
pub mod channels;
pub mod commands;
pub mod config;
pub mod error;
pub mod gateway;
pub mod host;
pub mod logging;
pub mod nicks;
pub mod relay;
pub mod replies;

#[cfg(test)]
mod testing;

pub use bridge::Bridge;
pub use config::{BridgeConfig, ConfigError};
pub use error::BridgeError;
pub use gateway::MucGateway;
pub use host::{DcClient, IncomingMessage, Settings};
pub use replies::{Replies, Reply};
