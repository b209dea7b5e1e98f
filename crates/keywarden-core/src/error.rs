// SPDX-FileCopyrightText: 2026 Keywarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Keywarden credential vault.
//!
//! The taxonomy is deliberately small. Callers that failed to authenticate
//! receive opaque messages: [`KeywardenError::BadPassphrase`] and
//! [`KeywardenError::Unauthorized`] never reveal which sub-condition
//! triggered the refusal. Underlying causes go to the log, not the wire.

use thiserror::Error;

/// The primary error type used across the Keywarden workspace.
#[derive(Debug, Error)]
pub enum KeywardenError {
    /// Passphrase verification or unlock failed. Always this exact
    /// message, regardless of the underlying cause.
    #[error("failed to verify passphrase")]
    BadPassphrase,

    /// An operation other than unlock was attempted on a locked vault.
    #[error("vault is locked")]
    VaultLocked,

    /// Client credential or host-pinning check failed. The message is the
    /// full detail an unauthenticated caller is allowed to see.
    #[error("{0}")]
    Unauthorized(String),

    /// The requested item id is not in the vault.
    #[error("item not found")]
    ItemNotFound,

    /// On-disk data failed an integrity check (metadata MAC mismatch or
    /// plaintext checksum mismatch). Affects one item, not the vault.
    #[error("integrity check failed: {0}")]
    Integrity(String),

    /// Storage backend I/O errors.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Encryption or decryption failed.
    #[error("{0}")]
    Crypto(String),

    /// Configuration errors (invalid TOML, missing required fields).
    #[error("configuration error: {0}")]
    Config(String),

    /// The caller supplied an unusable argument (empty value, malformed
    /// recipient text, unparseable id).
    #[error("{0}")]
    InvalidInput(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl KeywardenError {
    /// Wrap a backend I/O failure.
    pub fn storage(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage {
            source: Box::new(source),
        }
    }

    /// Shorthand for an opaque unauthorized refusal.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_passphrase_message_is_opaque() {
        let err = KeywardenError::BadPassphrase;
        assert_eq!(err.to_string(), "failed to verify passphrase");
    }

    #[test]
    fn unauthorized_carries_only_its_message() {
        let err = KeywardenError::unauthorized("client credentials mismatch");
        assert_eq!(err.to_string(), "client credentials mismatch");
    }

    #[test]
    fn storage_error_preserves_source() {
        let err = KeywardenError::storage(std::io::Error::other("disk on fire"));
        assert!(err.to_string().contains("disk on fire"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn locked_vault_message() {
        assert_eq!(KeywardenError::VaultLocked.to_string(), "vault is locked");
    }
}
