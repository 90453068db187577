//! Bridge configuration, read from the host's settings scope.
//!
//! Optional keys get their defaults written back on first start, so they
//! show up in the host's settings listing and can be edited there.

use thiserror::Error;

use dcxmpp_net::{BackoffConfig, SessionConfig};
use dcxmpp_shared::constants::{
    DEFAULT_MAX_GROUP_SIZE, DEFAULT_NICK, KEY_ALLOW_BRIDGING, KEY_JID, KEY_MAX_GROUP_SIZE,
    KEY_NICK, KEY_PASSWORD,
};

use crate::host::Settings;

/// Env fallbacks for the credentials.
const ENV_JID: &str = "DCXMPP_JID";
const ENV_PASSWORD: &str = "DCXMPP_PASSWORD";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing \"{0}\" setting")]
    MissingSetting(&'static str),

    #[error("Settings error: {0}")]
    Settings(#[from] anyhow::Error),
}

#[derive(Clone)]
pub struct BridgeConfig {
    /// Account the bridge logs in with.
    /// Setting: `jid`, env fallback `DCXMPP_JID`. Required.
    pub jid: String,

    /// Setting: `password`, env fallback `DCXMPP_PASSWORD`. Required.
    pub password: String,

    /// Nick used in every MUC room.
    /// Setting: `nick`. Default: `DC-Bridge`.
    pub nick: String,

    /// Contacts per bound DC group before a new one is created.
    /// Setting: `max_group_size`. Default: `20`.
    pub max_group_size: usize,

    /// Registers the command that bridges an existing group.
    /// Setting: `allow_bridging` (`1`/`0`). Default: `1`.
    pub allow_bridging: bool,

    pub reconnect: BackoffConfig,
}

impl std::fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("jid", &self.jid)
            .field("password", &"<redacted>")
            .field("nick", &self.nick)
            .field("max_group_size", &self.max_group_size)
            .field("allow_bridging", &self.allow_bridging)
            .field("reconnect", &self.reconnect)
            .finish()
    }
}

impl BridgeConfig {
    /// Load from settings. Missing credentials are the only fatal error.
    pub fn load(settings: &dyn Settings) -> Result<Self, ConfigError> {
        let nick = get_or_default(settings, KEY_NICK, DEFAULT_NICK)?;

        let max_group_size = get_or_default(
            settings,
            KEY_MAX_GROUP_SIZE,
            &DEFAULT_MAX_GROUP_SIZE.to_string(),
        )?;
        let max_group_size = match max_group_size.trim().parse::<usize>() {
            Ok(n) if n > 0 => n,
            _ => {
                tracing::warn!(
                    value = %max_group_size,
                    "Invalid max_group_size, using default"
                );
                DEFAULT_MAX_GROUP_SIZE
            }
        };

        let allow_bridging = parse_flag(&get_or_default(settings, KEY_ALLOW_BRIDGING, "1")?);

        let jid = credential(settings, KEY_JID, ENV_JID)?;
        let password = credential(settings, KEY_PASSWORD, ENV_PASSWORD)?;

        Ok(Self {
            jid,
            password,
            nick,
            max_group_size,
            allow_bridging,
            reconnect: BackoffConfig::default(),
        })
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            jid: self.jid.clone(),
            password: self.password.clone(),
            nick: self.nick.clone(),
            reconnect: self.reconnect,
        }
    }
}

fn get_or_default(
    settings: &dyn Settings,
    key: &str,
    default: &str,
) -> Result<String, ConfigError> {
    if let Some(value) = settings.get(key) {
        return Ok(value);
    }
    settings.set(key, default)?;
    Ok(default.to_string())
}

fn credential(
    settings: &dyn Settings,
    key: &'static str,
    env_key: &str,
) -> Result<String, ConfigError> {
    settings
        .get(key)
        .or_else(|| std::env::var(env_key).ok())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingSetting(key))
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim(), "1") || value.trim().eq_ignore_ascii_case("true")
}
