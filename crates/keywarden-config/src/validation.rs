// SPDX-FileCopyrightText: 2026 Keywarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes: socket address syntax, non-empty paths, and the
//! TLS-required-in-production rule.

use std::net::SocketAddr;

use thiserror::Error;

use crate::model::KeywardenConfig;

/// A configuration validation error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A semantic constraint on a config value was violated.
    #[error("validation error: {message}")]
    Validation {
        /// Description of the validation failure.
        message: String,
    },
}

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)`
/// with all collected validation errors (does not fail fast).
pub fn validate_config(config: &KeywardenConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.path must not be empty".to_string(),
        });
    }

    let addr = config.server.listen_address.trim();
    if addr.parse::<SocketAddr>().is_err() {
        errors.push(ConfigError::Validation {
            message: format!(
                "server.listen_address `{addr}` is not a valid socket address (host:port)"
            ),
        });
    }

    // Production without TLS must never come up.
    if config.server.production && config.server.tls.is_none() {
        errors.push(ConfigError::Validation {
            message: "server.production = true requires a [server.tls] section".to_string(),
        });
    }

    if let Some(tls) = &config.server.tls {
        if tls.cert_file.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: "server.tls.cert_file must not be empty".to_string(),
            });
        }
        if tls.key_file.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: "server.tls.key_file must not be empty".to_string(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TlsConfig;

    #[test]
    fn default_config_validates() {
        let config = KeywardenConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_storage_path_fails_validation() {
        let mut config = KeywardenConfig::default();
        config.storage.path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("storage.path"))
        ));
    }

    #[test]
    fn bare_host_fails_validation() {
        let mut config = KeywardenConfig::default();
        config.server.listen_address = "127.0.0.1".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("listen_address"))
        ));
    }

    #[test]
    fn production_without_tls_fails_validation() {
        let mut config = KeywardenConfig::default();
        config.server.production = true;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("server.tls"))
        ));
    }

    #[test]
    fn production_with_tls_passes() {
        let mut config = KeywardenConfig::default();
        config.server.production = true;
        config.server.tls = Some(TlsConfig {
            cert_file: "/etc/keywarden/cert.pem".to_string(),
            key_file: "/etc/keywarden/key.pem".to_string(),
        });
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_tls_paths_fail_validation() {
        let mut config = KeywardenConfig::default();
        config.server.tls = Some(TlsConfig {
            cert_file: "".to_string(),
            key_file: "".to_string(),
        });
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
