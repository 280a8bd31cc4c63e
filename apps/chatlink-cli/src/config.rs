//! CLI configuration.
//!
//! Stored as TOML at `$XDG_CONFIG_HOME/chatlink/cli.toml`, falling back to
//! `~/.config/chatlink/cli.toml`. A missing file means defaults.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use chatlink_connection::{ReconnectConfig, SessionConfig};
use chatlink_protocol::constants::{MAX_RECONNECT_ATTEMPTS, RECONNECT_BASE_DELAY, WS_PING_PERIOD};

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Base socket URI; identity and thread are appended as path segments.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_identity")]
    pub identity: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,

    /// Context categories attached to every turn.
    #[serde(default)]
    pub contexts: Vec<String>,

    /// Let the backend search the web.
    #[serde(default)]
    pub web_search: bool,

    /// Send deep-research turns instead of chat turns.
    #[serde(default)]
    pub research: bool,

    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,

    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Keepalive ping period in seconds. `0` disables pings.
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
}

fn default_endpoint() -> String {
    "ws://localhost:8000/ws".into()
}

fn default_identity() -> String {
    std::env::var("USER")
        .ok()
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| "anonymous".into())
}

fn default_reconnect_base_ms() -> u64 {
    RECONNECT_BASE_DELAY.as_millis() as u64
}

fn default_max_reconnect_attempts() -> u32 {
    MAX_RECONNECT_ATTEMPTS
}

fn default_keepalive_secs() -> u64 {
    WS_PING_PERIOD.as_secs()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            identity: default_identity(),
            thread_id: None,
            contexts: Vec::new(),
            web_search: false,
            research: false,
            reconnect_base_ms: default_reconnect_base_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            keepalive_secs: default_keepalive_secs(),
        }
    }
}

impl CliConfig {
    /// Loads `path`, or the default location when `None`.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path(),
        };

        if !path.exists() {
            tracing::debug!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: CliConfig = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Builds the session configuration.
    pub fn session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::new(&self.endpoint, &self.identity)
            .with_reconnect(ReconnectConfig {
                base_delay: Duration::from_millis(self.reconnect_base_ms),
                max_attempts: self.max_reconnect_attempts,
                jitter: false,
            })
            .with_keepalive(match self.keepalive_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            });
        if let Some(thread) = &self.thread_id {
            config = config.with_thread_id(thread);
        }
        config
    }
}

/// Returns the default configuration file path.
pub fn config_path() -> PathBuf {
    resolve_config_path(
        std::env::var_os("XDG_CONFIG_HOME"),
        std::env::var_os("HOME"),
    )
}

fn resolve_config_path(xdg: Option<OsString>, home: Option<OsString>) -> PathBuf {
    let base = match xdg.filter(|x| !x.is_empty()) {
        Some(xdg) => PathBuf::from(xdg),
        None => PathBuf::from(home.unwrap_or_else(|| "/tmp".into())).join(".config"),
    };
    base.join("chatlink").join("cli.toml")
}
