// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client configuration.
//!
//! Configuration is usually read from a TOML file and includes:
//! - `host`, `port`, `tls`, `app_key`: where the broker lives
//! - keepalive and reconnect pacing
//! - `auth_endpoint`: where restricted channels get their tokens
//! - `[headers]`: extra handshake headers

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use qs_core::protocol::{PROTOCOL_VERSION, SUBPROTOCOL};
use serde::{Deserialize, Serialize};
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use url::Url;

use crate::reconnect::Backoff;

/// Handshake header used to negotiate the protocol revision.
pub const SUBPROTOCOL_HEADER: &str = "Sec-WebSocket-Protocol";

/// Handshake header used to opt into compression.
pub const EXTENSIONS_HEADER: &str = "Sec-WebSocket-Extensions";

const PERMESSAGE_DEFLATE: &str = "permessage-deflate; client_max_window_bits";

/// Error type for configuration problems.
///
/// These are the only errors reported synchronously to callers; everything
/// that goes wrong after a client starts is absorbed into state transitions.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("host is required\n  hint: set 'host' to the broker hostname, e.g. ws-eu.pusher.com")]
    MissingHost,

    #[error("app_key is required")]
    MissingAppKey,

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("invalid header '{0}'")]
    InvalidHeader(String),
}

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Broker hostname.
    pub host: String,
    /// Explicit port; the scheme default is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Application key, placed in the connection path.
    pub app_key: String,
    /// Use `wss` (default: true).
    #[serde(default = "default_tls")]
    pub tls: bool,
    /// Value of the `client` query parameter.
    #[serde(default = "default_client_name")]
    pub client_name: String,
    /// Value of the `version` query parameter.
    #[serde(default = "default_client_version")]
    pub client_version: String,
    /// Max time to wait for the socket to open, in milliseconds (default: 10000).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Keepalive ping interval in milliseconds (default: 25000). 0 = disabled.
    #[serde(default = "default_keepalive_interval_ms")]
    pub keepalive_interval_ms: u64,
    /// Drop the connection when a ping goes unanswered this long, in
    /// milliseconds. 0 (default) keeps the keepalive advisory only.
    #[serde(default)]
    pub pong_timeout_ms: u64,
    /// Reconnect automatically after the transport drops (default: true).
    #[serde(default = "default_reconnect")]
    pub reconnect: bool,
    /// Maximum consecutive failed attempts before giving up (default: 0 = unlimited).
    #[serde(default)]
    pub reconnect_max_retries: u32,
    /// Initial delay for exponential backoff in milliseconds (default: 1000).
    #[serde(default = "default_reconnect_initial_delay_ms")]
    pub reconnect_initial_delay_ms: u64,
    /// Maximum delay between reconnection attempts in seconds (default: 30).
    #[serde(default = "default_reconnect_max_delay_secs")]
    pub reconnect_max_delay_secs: u64,
    /// URL of the channel auth endpoint, required for private/presence channels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_endpoint: Option<String>,
    /// Opt into `permessage-deflate` (default: false).
    #[serde(default)]
    pub compression: bool,
    /// Extra headers sent with the WebSocket handshake.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

fn default_tls() -> bool {
    true
}

fn default_client_name() -> String {
    "qsync-rust".to_string()
}

fn default_client_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_keepalive_interval_ms() -> u64 {
    25_000
}

fn default_reconnect() -> bool {
    true
}

fn default_reconnect_initial_delay_ms() -> u64 {
    1_000
}

fn default_reconnect_max_delay_secs() -> u64 {
    30
}

/// Everything the transport needs to open one connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub url: Url,
    /// Handshake headers, in send order.
    pub headers: Vec<(String, String)>,
    pub connect_timeout: Duration,
    pub keepalive_interval: Option<Duration>,
}

impl ClientConfig {
    /// Creates a config with defaults for everything but the broker identity.
    pub fn new(host: impl Into<String>, app_key: impl Into<String>) -> Self {
        ClientConfig {
            host: host.into(),
            port: None,
            app_key: app_key.into(),
            tls: default_tls(),
            client_name: default_client_name(),
            client_version: default_client_version(),
            connect_timeout_ms: default_connect_timeout_ms(),
            keepalive_interval_ms: default_keepalive_interval_ms(),
            pong_timeout_ms: 0,
            reconnect: default_reconnect(),
            reconnect_max_retries: 0,
            reconnect_initial_delay_ms: default_reconnect_initial_delay_ms(),
            reconnect_max_delay_secs: default_reconnect_max_delay_secs(),
            auth_endpoint: None,
            compression: false,
            headers: BTreeMap::new(),
        }
    }

    /// Loads a config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a config from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Builds the connection URL:
    /// `<ws|wss>://<host>[:<port>]/app/<appKey>?protocol=7&client=<id>&version=<v>&flash=false`.
    pub fn url(&self) -> Result<Url, ConfigError> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err(ConfigError::MissingHost);
        }
        if self.app_key.trim().is_empty() {
            return Err(ConfigError::MissingAppKey);
        }

        let scheme = if self.tls { "wss" } else { "ws" };
        let mut url = Url::parse(&format!("{}://{}", scheme, host))
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", host, e)))?;

        if url.path() != "/" || url.query().is_some() || !url.username().is_empty() {
            return Err(ConfigError::InvalidUrl(format!(
                "host '{}' must be a bare hostname",
                host
            )));
        }
        if self.port.is_some() {
            url.set_port(self.port)
                .map_err(|()| ConfigError::InvalidUrl(format!("cannot set port on {}", host)))?;
        }

        url.path_segments_mut()
            .map_err(|()| ConfigError::InvalidUrl(format!("{} cannot carry a path", host)))?
            .pop_if_empty()
            .extend(["app", self.app_key.trim()]);

        url.query_pairs_mut()
            .append_pair("protocol", &PROTOCOL_VERSION.to_string())
            .append_pair("client", &self.client_name)
            .append_pair("version", &self.client_version)
            .append_pair("flash", "false");

        Ok(url)
    }

    /// Validates the config and builds the transport endpoint.
    pub fn endpoint(&self) -> Result<Endpoint, ConfigError> {
        let url = self.url()?;

        let mut headers = vec![(SUBPROTOCOL_HEADER.to_string(), SUBPROTOCOL.to_string())];
        if self.compression {
            headers.push((EXTENSIONS_HEADER.to_string(), PERMESSAGE_DEFLATE.to_string()));
        }
        for (name, value) in &self.headers {
            if HeaderName::from_bytes(name.as_bytes()).is_err()
                || HeaderValue::from_str(value).is_err()
            {
                return Err(ConfigError::InvalidHeader(name.clone()));
            }
            headers.push((name.clone(), value.clone()));
        }

        Ok(Endpoint {
            url,
            headers,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            keepalive_interval: self.keepalive_interval(),
        })
    }

    /// Parses `auth_endpoint`, if set.
    pub fn auth_url(&self) -> Result<Option<Url>, ConfigError> {
        self.auth_endpoint
            .as_deref()
            .map(|raw| {
                Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", raw, e)))
            })
            .transpose()
    }

    /// Keepalive interval, `None` when disabled.
    pub fn keepalive_interval(&self) -> Option<Duration> {
        (self.keepalive_interval_ms > 0).then(|| Duration::from_millis(self.keepalive_interval_ms))
    }

    /// Pong deadline, `None` when the keepalive is advisory.
    pub fn pong_timeout(&self) -> Option<Duration> {
        (self.pong_timeout_ms > 0).then(|| Duration::from_millis(self.pong_timeout_ms))
    }

    /// Reconnect pacing derived from this config.
    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.reconnect_initial_delay_ms),
            Duration::from_secs(self.reconnect_max_delay_secs),
            self.reconnect_max_retries,
        )
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
