// SPDX-FileCopyrightText: 2026 Keywarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Keywarden credential vault.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup instead of silently ignoring them.

use serde::{Deserialize, Serialize};

/// Top-level Keywarden configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to values
/// suitable for local development.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KeywardenConfig {
    /// On-disk vault storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Listener and TLS settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Process logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

/// On-disk vault storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory holding the encrypted vault files.
    #[serde(default = "default_storage_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> String {
    "keywarden-data".to_string()
}

/// Listener and TLS configuration.
///
/// In production mode the TLS section is mandatory; starting without it is
/// a fatal configuration error caught by [`crate::validate_config`].
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to bind, e.g. `127.0.0.1:5771`.
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Production mode: requires TLS and tightens logging defaults.
    #[serde(default)]
    pub production: bool,

    /// TLS certificate configuration. `None` serves plain TCP, which is
    /// only permitted outside production.
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            production: false,
            tls: None,
        }
    }
}

fn default_listen_address() -> String {
    "127.0.0.1:5771".to_string()
}

/// TLS certificate and key file locations (PEM).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TlsConfig {
    /// Path to the PEM certificate chain.
    pub cert_file: String,

    /// Path to the PEM private key.
    pub key_file: String,
}

/// Process logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
