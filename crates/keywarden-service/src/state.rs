// SPDX-FileCopyrightText: 2026 Keywarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared service state: the vault, configuration, and the host-pinning
//! index.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use keywarden_config::KeywardenConfig;
use keywarden_core::KeywardenError;
use keywarden_vault::Vault;
use secrecy::SecretString;
use tracing::debug;
use uuid::Uuid;

use crate::model::InfoResponse;

/// Service facade state shared by all request handlers.
pub struct State {
    config: KeywardenConfig,
    vault: Arc<Vault>,
    version: String,
    production: bool,

    /// Host-pinning companion index: client item id → verification item
    /// id. A cache over the durable `VI[<id>]` item descriptions; entries
    /// are rebuilt by scanning when missing.
    pub(crate) verification_index: RwLock<HashMap<Uuid, Uuid>>,
}

impl State {
    pub fn new(
        config: KeywardenConfig,
        vault: Arc<Vault>,
        version: impl Into<String>,
        production: bool,
    ) -> Self {
        Self {
            config,
            vault,
            version: version.into(),
            production,
            verification_index: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &KeywardenConfig {
        &self.config
    }

    pub fn vault(&self) -> &Arc<Vault> {
        &self.vault
    }

    pub fn is_production(&self) -> bool {
        self.production
    }

    /// Unauthenticated store info.
    pub fn info(&self) -> InfoResponse {
        InfoResponse {
            version: self.version.clone(),
            is_locked: self.vault.is_locked(),
            is_production: self.production,
        }
    }

    /// Unlock the vault with the admin passphrase.
    pub fn unlock(&self, passphrase: &SecretString) -> Result<(), KeywardenError> {
        self.vault.unlock(passphrase)
    }

    /// Lock the vault. Returns whether it was unlocked.
    pub fn lock(&self) -> bool {
        match self.vault.lock() {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "failed to lock vault");
                false
            }
        }
    }

    /// Admin authentication gate; every admin operation starts here.
    pub(crate) fn require_admin(&self, passphrase: &SecretString) -> Result<(), KeywardenError> {
        self.vault.verify_passphrase(passphrase)
    }
}
