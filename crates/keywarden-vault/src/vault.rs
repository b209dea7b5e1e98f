// SPDX-FileCopyrightText: 2026 Keywarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vault lifecycle: unlock, lock, item CRUD, and recovery rotation.
//!
//! The vault is born locked. Unlocking derives the identity wrapping key
//! as SHA-256 of the passphrase, decrypts (or on first unlock, generates
//! and encrypts) the X25519 identity, derives the metadata HMAC secret
//! from the identity's text encoding, and loads every MAC-verified item
//! record from disk. All four pieces of unlocked state are cleared
//! together on lock or on any unlock failure; a partial unlock is never
//! observable.
//!
//! Secrets in motion follow a strict discipline: passphrases arrive as
//! [`SecretString`], derived keys live in [`Enclave`]s and are only opened
//! into short-lived [`LockedBuffer`]s, and decrypted item values are
//! returned as locked buffers the caller must destroy.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use age::x25519;
use chrono::Utc;
use keywarden_core::KeywardenError;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backend::Backend;
use crate::crypto;
use crate::item::{self, Item};
use crate::secmem::{Enclave, LockedBuffer};

/// Well-known path of the wrapped identity under the storage root.
const IDENTITY_FILE: &str = ".identity";
/// Well-known path of the recovery recipient's public text.
const RECOVERY_FILE: &str = ".recovery";

/// How often and how long to retry restoring the previous recovery
/// recipient before declaring the on-disk state inconsistent.
const RECOVERY_RESTORE_ATTEMPTS: u32 = 3;
const RECOVERY_RESTORE_DELAY: Duration = Duration::from_secs(1);

/// Mutable engine state guarded by the vault's readers-writer lock.
///
/// Invariant: `identity_key`, `metadata_hmac`, and `primary` are all
/// `Some` and `items` is populated exactly while the vault is unlocked.
/// `recovery` is independent of the lock state; it mirrors `.recovery`.
struct VaultState {
    identity_key: Option<Enclave>,
    metadata_hmac: Option<Enclave>,
    primary: Option<x25519::Recipient>,
    recovery: Option<x25519::Recipient>,
    items: HashMap<Uuid, Item>,
}

impl VaultState {
    fn is_locked(&self) -> bool {
        self.identity_key.is_none()
    }

    /// Drop every piece of unlocked state. The enclaves wipe their
    /// contents as they go.
    fn reset(&mut self) {
        self.identity_key = None;
        self.metadata_hmac = None;
        self.primary = None;
        self.items = HashMap::new();
    }
}

/// The vault engine.
///
/// All operations other than [`Vault::is_locked`] serialize on a single
/// readers-writer lock; see the module docs for the lifecycle rules.
pub struct Vault {
    backend: Arc<dyn Backend>,
    state: RwLock<VaultState>,
}

impl Vault {
    /// Prepare the storage backend and construct a locked vault.
    ///
    /// An existing recovery recipient is loaded eagerly so that the first
    /// value written after unlock is already addressed to it.
    pub fn new(backend: Arc<dyn Backend>) -> Result<Self, KeywardenError> {
        backend.init()?;

        let recovery = match backend.read_file(RECOVERY_FILE)? {
            Some(bytes) => {
                let text = String::from_utf8(bytes).map_err(|_| {
                    KeywardenError::Integrity("recovery recipient file is not UTF-8".to_string())
                })?;
                Some(crypto::parse_recipient(&text)?)
            }
            None => None,
        };

        Ok(Self {
            backend,
            state: RwLock::new(VaultState {
                identity_key: None,
                metadata_hmac: None,
                primary: None,
                recovery,
                items: HashMap::new(),
            }),
        })
    }

    /// Whether the vault is currently locked.
    pub fn is_locked(&self) -> bool {
        self.read_state().is_locked()
    }

    /// The storage backend, exposed for integration tests and tooling.
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Unlock the vault with the admin passphrase.
    ///
    /// Idempotent: unlocking an unlocked vault is a no-op success. Any
    /// failure resets the vault to fully locked and surfaces as an opaque
    /// [`KeywardenError::BadPassphrase`]; the underlying cause is logged.
    pub fn unlock(&self, passphrase: &SecretString) -> Result<(), KeywardenError> {
        let mut state = self.write_state();

        if !state.is_locked() {
            return Ok(());
        }

        let result = self.unlock_inner(&mut state, passphrase);
        if result.is_err() {
            state.reset();
        }
        result
    }

    fn unlock_inner(
        &self,
        state: &mut VaultState,
        passphrase: &SecretString,
    ) -> Result<(), KeywardenError> {
        let mut key_sum = crypto::sha256(passphrase.expose_secret().as_bytes());
        let identity_key = Enclave::seal(LockedBuffer::from_slice(&mut key_sum)?)?;

        let identity = match self.backend.read_file(IDENTITY_FILE)? {
            Some(file_bytes) => {
                let wrap_key = identity_key.open()?;
                let opened = crypto::open_identity(wrap_key.as_bytes(), &file_bytes);
                wrap_key.destroy();

                let plaintext = match opened {
                    Ok(plaintext) => plaintext,
                    Err(e) => {
                        error!(error = %e, "failed to read identity file");
                        return Err(KeywardenError::BadPassphrase);
                    }
                };

                let text = std::str::from_utf8(&plaintext).map_err(|_| {
                    error!("identity plaintext is not UTF-8");
                    KeywardenError::BadPassphrase
                })?;
                crypto::parse_identity(text).map_err(|e| {
                    error!(error = %e, "failed to parse identity");
                    KeywardenError::BadPassphrase
                })?
            }
            None => {
                let identity = x25519::Identity::generate();

                let wrap_key = identity_key.open()?;
                let identity_text = identity.to_string();
                let sealed =
                    crypto::seal_identity(wrap_key.as_bytes(), identity_text.expose_secret().as_bytes());
                wrap_key.destroy();

                let sealed = match sealed {
                    Ok(sealed) => sealed,
                    Err(e) => {
                        error!(error = %e, "failed to encrypt fresh identity");
                        return Err(KeywardenError::BadPassphrase);
                    }
                };

                if let Err(e) = self.backend.write_file(IDENTITY_FILE, &sealed) {
                    error!(error = %e, "failed to write identity file");
                    return Err(KeywardenError::BadPassphrase);
                }

                info!("generated fresh vault identity");
                identity
            }
        };

        state.primary = Some(identity.to_public());

        let mut hmac_sum = {
            let identity_text = identity.to_string();
            crypto::sha256(identity_text.expose_secret().as_bytes())
        };
        state.metadata_hmac = Some(Enclave::seal(LockedBuffer::from_slice(&mut hmac_sum)?)?);
        state.identity_key = Some(identity_key);

        state.items = match self.read_all_metadata(state) {
            Ok(items) => items,
            Err(e) => {
                error!(error = %e, "failed to load item metadata");
                return Err(KeywardenError::BadPassphrase);
            }
        };

        info!(items = state.items.len(), "vault unlocked");
        Ok(())
    }

    /// Lock the vault, clearing all unlocked state.
    pub fn lock(&self) -> Result<(), KeywardenError> {
        let mut state = self.write_state();

        if state.is_locked() {
            return Err(KeywardenError::VaultLocked);
        }

        state.reset();
        info!("vault locked");
        Ok(())
    }

    /// Verify the admin passphrase against the unlocked identity key.
    ///
    /// Constant-time comparison; any mismatch is the opaque
    /// [`KeywardenError::BadPassphrase`].
    pub fn verify_passphrase(&self, passphrase: &SecretString) -> Result<(), KeywardenError> {
        let state = self.read_state();

        let identity_key = state
            .identity_key
            .as_ref()
            .ok_or(KeywardenError::VaultLocked)?;

        let mut candidate = crypto::sha256(passphrase.expose_secret().as_bytes());
        let expected = identity_key.open()?;
        let matches =
            ring::constant_time::verify_slices_are_equal(&candidate, expected.as_bytes()).is_ok();
        expected.destroy();
        crate::secmem::wipe(&mut candidate);

        if matches {
            Ok(())
        } else {
            Err(KeywardenError::BadPassphrase)
        }
    }

    /// Snapshot of all item records (no values).
    pub fn items(&self) -> Vec<Item> {
        self.read_state().items.values().cloned().collect()
    }

    /// Create a new item with the given description and no value.
    pub fn create_item(&self, description: &str) -> Result<Item, KeywardenError> {
        let mut state = self.write_state();

        if state.is_locked() {
            return Err(KeywardenError::VaultLocked);
        }

        let item = Item::new(description);
        self.write_metadata(&state, &item)?;

        debug!(id = %item.id, "created item");
        state.items.insert(item.id, item.clone());
        Ok(item)
    }

    /// Delete an item and its files. Deleting an absent item succeeds.
    pub fn delete_item(&self, id: Uuid) -> Result<(), KeywardenError> {
        let mut state = self.write_state();

        if state.is_locked() {
            return Err(KeywardenError::VaultLocked);
        }

        if state.items.remove(&id).is_none() {
            warn!(id = %id, "no such item");
            return Ok(());
        }

        let mut removed = false;
        for path in [item::metadata_path(&id), item::value_path(&id)] {
            match self.backend.delete_file(&path) {
                Ok(existed) => removed = removed || existed,
                Err(e) => debug!(id = %id, path = %path, error = %e, "error deleting item file"),
            }
        }

        if removed {
            info!(id = %id, "removed files for item");
        }

        Ok(())
    }

    /// Decrypt and return an item's value.
    ///
    /// Returns `Ok(None)` for an item that has never had a value stored.
    /// The caller owns the returned buffer and must destroy it promptly.
    pub fn get_item(&self, id: Uuid) -> Result<Option<LockedBuffer>, KeywardenError> {
        let state = self.read_state();

        if state.is_locked() {
            return Err(KeywardenError::VaultLocked);
        }

        let item = state.items.get(&id).ok_or(KeywardenError::ItemNotFound)?;

        if !item.has_value() {
            return Ok(None);
        }

        self.read_item_value(&state, item).map(Some)
    }

    /// Encrypt and store an item's value, consuming the input buffer.
    ///
    /// A non-first write copies the prior ciphertext to a timestamped
    /// backup before overwriting it.
    pub fn set_item_value(&self, id: Uuid, value: LockedBuffer) -> Result<(), KeywardenError> {
        if value.is_empty() {
            return Err(KeywardenError::InvalidInput("value is empty".to_string()));
        }

        let mut state = self.write_state();

        if state.is_locked() {
            return Err(KeywardenError::VaultLocked);
        }

        let item = state
            .items
            .get(&id)
            .cloned()
            .ok_or(KeywardenError::ItemNotFound)?;

        self.write_item_value(&mut state, item, &value)
        // `value` drops (and wipes) here.
    }

    /// Install a new recovery recipient and re-encrypt every item to it.
    ///
    /// If the new recipient cannot be persisted, the previous one is
    /// restored with retries; failing that the on-disk recovery pointer is
    /// inconsistent and the process aborts — operator action is required.
    /// Per-item re-encryption failures are logged and skipped.
    pub fn set_recovery_recipient(
        &self,
        recipient: x25519::Recipient,
    ) -> Result<(), KeywardenError> {
        let mut state = self.write_state();

        if state.is_locked() {
            return Err(KeywardenError::VaultLocked);
        }

        let recipient_text = recipient.to_string();
        if let Err(e) = self.backend.write_file(RECOVERY_FILE, recipient_text.as_bytes()) {
            error!(error = %e, "failed to write recovery recipient");
            self.restore_previous_recovery(&state);
            return Err(KeywardenError::Internal(
                "failed to set recovery recipient".to_string(),
            ));
        }

        state.recovery = Some(recipient);

        // Re-read the authoritative metadata set from disk rather than
        // trusting the in-memory table.
        let items = match self.read_all_metadata(&state) {
            Ok(items) => items,
            Err(e) => {
                error!(error = %e, "failed to read item metadata");
                return Err(KeywardenError::Internal(
                    "failed to set recovery recipient".to_string(),
                ));
            }
        };

        for item in items.into_values() {
            if !item.has_value() {
                continue;
            }

            let id = item.id;
            let value = match self.read_item_value(&state, &item) {
                Ok(value) => value,
                Err(e) => {
                    error!(id = %id, error = %e, "failed to read item value");
                    continue;
                }
            };

            if let Err(e) = self.write_item_value(&mut state, item, &value) {
                error!(id = %id, error = %e, "failed to write item value");
            }
            value.destroy();
        }

        info!("recovery recipient updated");
        Ok(())
    }

    /// The current recovery recipient, if any.
    pub fn recovery_recipient(&self) -> Option<x25519::Recipient> {
        self.read_state().recovery.clone()
    }

    // ---- internal helpers (lock already held by the caller) ----

    /// Try to put the previous recovery recipient back on disk. If that
    /// keeps failing the on-disk pointer no longer matches reality and
    /// continuing would encrypt new values to an unknown recipient set.
    fn restore_previous_recovery(&self, state: &VaultState) {
        let Some(previous) = &state.recovery else {
            return;
        };

        let text = previous.to_string();
        for _ in 0..RECOVERY_RESTORE_ATTEMPTS {
            std::thread::sleep(RECOVERY_RESTORE_DELAY);

            match self.backend.write_file(RECOVERY_FILE, text.as_bytes()) {
                Ok(()) => return,
                Err(e) => warn!(error = %e, "retrying recovery recipient restore"),
            }
        }

        error!("failed to restore previous recovery recipient; on-disk state is inconsistent");
        std::process::exit(1);
    }

    fn read_all_metadata(
        &self,
        state: &VaultState,
    ) -> Result<HashMap<Uuid, Item>, KeywardenError> {
        let hmac_secret = state
            .metadata_hmac
            .as_ref()
            .ok_or(KeywardenError::VaultLocked)?
            .open()?;

        let mut items = HashMap::new();
        for path in self.backend.list_files("")? {
            if !path.ends_with(".json") {
                continue;
            }

            let Some(data) = self.backend.read_file(&path)? else {
                continue;
            };

            match item::decode_metadata(&path, &data, hmac_secret.as_bytes()) {
                Ok(item) => {
                    items.insert(item.id, item);
                }
                Err(e) => {
                    warn!(source = %path, error = %e, "error reading item metadata");
                }
            }
        }

        hmac_secret.destroy();
        Ok(items)
    }

    fn write_metadata(&self, state: &VaultState, item: &Item) -> Result<(), KeywardenError> {
        let hmac_secret = state
            .metadata_hmac
            .as_ref()
            .ok_or(KeywardenError::VaultLocked)?
            .open()?;

        let encoded = item::encode_metadata(item, hmac_secret.as_bytes());
        hmac_secret.destroy();

        self.backend
            .write_file(&item::metadata_path(&item.id), &encoded?)
    }

    /// Decrypt the vault identity from disk using the unlocked key enclave.
    ///
    /// The identity file is re-read on every use; the private half never
    /// sits decrypted in the state between operations.
    fn load_identity(&self, state: &VaultState) -> Result<x25519::Identity, KeywardenError> {
        let file_bytes = self
            .backend
            .read_file(IDENTITY_FILE)?
            .ok_or_else(|| KeywardenError::Integrity("identity file missing".to_string()))?;

        let wrap_key = state
            .identity_key
            .as_ref()
            .ok_or(KeywardenError::VaultLocked)?
            .open()?;
        let plaintext = crypto::open_identity(wrap_key.as_bytes(), &file_bytes);
        wrap_key.destroy();

        let plaintext =
            plaintext.map_err(|_| KeywardenError::Crypto("failed to decrypt data".to_string()))?;
        let text = std::str::from_utf8(&plaintext)
            .map_err(|_| KeywardenError::Crypto("failed to decrypt data".to_string()))?;
        crypto::parse_identity(text)
    }

    fn read_item_value(
        &self,
        state: &VaultState,
        item: &Item,
    ) -> Result<LockedBuffer, KeywardenError> {
        let ciphertext = self
            .backend
            .read_file(&item::value_path(&item.id))?
            .ok_or_else(|| {
                KeywardenError::Integrity(format!("value file missing for item {}", item.id))
            })?;

        let identity = self.load_identity(state)?;
        let plaintext = crypto::age_decrypt(&identity, &ciphertext)?;

        if crypto::sha256_hex(&plaintext) != item.checksum {
            return Err(KeywardenError::Integrity(format!(
                "checksum mismatch for item {}",
                item.id
            )));
        }

        LockedBuffer::from_vec(plaintext.to_vec())
    }

    fn write_item_value(
        &self,
        state: &mut VaultState,
        mut item: Item,
        value: &LockedBuffer,
    ) -> Result<(), KeywardenError> {
        let primary = state.primary.clone().ok_or(KeywardenError::VaultLocked)?;

        let mut recipients: Vec<&x25519::Recipient> = vec![&primary];
        if let Some(recovery) = &state.recovery {
            recipients.push(recovery);
        }

        let ciphertext = crypto::age_encrypt(&recipients, value.as_bytes())?;

        let value_path = item::value_path(&item.id);

        // Preserve the prior ciphertext before overwriting. A first write
        // has nothing to preserve.
        if item.has_value() {
            match self.backend.read_file(&value_path)? {
                Some(previous) => {
                    let backup = item::backup_path(&item.id, Utc::now());
                    self.backend.write_file(&backup, &previous)?;
                }
                None => warn!(id = %item.id, "no prior ciphertext to back up"),
            }
        }

        item.checksum = crypto::sha256_hex(value.as_bytes());
        item.modified_at = Utc::now();

        self.backend.write_file(&value_path, &ciphertext)?;
        self.write_metadata(state, &item)?;

        state.items.insert(item.id, item);
        Ok(())
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, VaultState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, VaultState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{LocalBackend, MemoryBackend};
    use tempfile::tempdir;

    fn passphrase(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    fn unlocked_memory_vault() -> Vault {
        let vault = Vault::new(Arc::new(MemoryBackend::new())).unwrap();
        vault.unlock(&passphrase("correct_passphrase")).unwrap();
        vault
    }

    #[test]
    fn new_vault_starts_locked() {
        let dir = tempdir().unwrap();
        let backend = Arc::new(LocalBackend::new(dir.path()).unwrap());
        let vault = Vault::new(backend).unwrap();

        assert!(vault.is_locked());
        assert!(!dir.path().join(".identity").exists());
        assert!(dir.path().join(".bak").is_dir());
    }

    #[test]
    fn unlock_lifecycle() {
        for vault in [
            Vault::new(Arc::new(MemoryBackend::new())).unwrap(),
            Vault::new(Arc::new(LocalBackend::new(tempdir().unwrap().path()).unwrap())).unwrap(),
        ] {
            vault.unlock(&passphrase("correct_passphrase")).unwrap();
            assert!(!vault.is_locked());

            vault.lock().unwrap();
            assert!(vault.is_locked());

            // Unlocking again with the same passphrase succeeds.
            vault.unlock(&passphrase("correct_passphrase")).unwrap();
            assert!(!vault.is_locked());

            // Repeated unlock of an unlocked vault is a no-op success.
            vault.unlock(&passphrase("correct_passphrase")).unwrap();
            assert!(!vault.is_locked());

            vault.lock().unwrap();

            // The wrong passphrase fails and leaves the vault locked.
            let result = vault.unlock(&passphrase("wrong_passphrase"));
            assert!(matches!(result, Err(KeywardenError::BadPassphrase)));
            assert!(vault.is_locked());
        }
    }

    #[test]
    fn lock_when_locked_is_an_error() {
        let vault = Vault::new(Arc::new(MemoryBackend::new())).unwrap();
        assert!(matches!(vault.lock(), Err(KeywardenError::VaultLocked)));
    }

    #[test]
    fn verify_passphrase() {
        let vault = unlocked_memory_vault();

        vault.verify_passphrase(&passphrase("correct_passphrase")).unwrap();

        let result = vault.verify_passphrase(&passphrase("wrong_passphrase"));
        assert!(matches!(result, Err(KeywardenError::BadPassphrase)));

        let result = vault.verify_passphrase(&passphrase(""));
        assert!(matches!(result, Err(KeywardenError::BadPassphrase)));

        vault.lock().unwrap();
        let result = vault.verify_passphrase(&passphrase("correct_passphrase"));
        assert!(matches!(result, Err(KeywardenError::VaultLocked)));
    }

    #[test]
    fn create_item_registers_metadata() {
        let vault = unlocked_memory_vault();

        let item = vault.create_item("Test Item").unwrap();
        assert_eq!(item.description, "Test Item");
        assert!(!item.has_value());
        assert_eq!(vault.items().len(), 1);

        // Metadata landed on disk.
        let data = vault
            .backend()
            .read_file(&item::metadata_path(&item.id))
            .unwrap();
        assert!(data.is_some());
    }

    #[test]
    fn create_item_requires_unlock() {
        let vault = Vault::new(Arc::new(MemoryBackend::new())).unwrap();
        assert!(matches!(
            vault.create_item("nope"),
            Err(KeywardenError::VaultLocked)
        ));
    }

    #[test]
    fn delete_item_is_idempotent() {
        let vault = unlocked_memory_vault();

        let item = vault.create_item("Item to Delete").unwrap();
        vault.delete_item(item.id).unwrap();
        assert!(vault.items().is_empty());

        // Deleting again is not an error.
        vault.delete_item(item.id).unwrap();

        // Files are gone.
        let data = vault
            .backend()
            .read_file(&item::metadata_path(&item.id))
            .unwrap();
        assert!(data.is_none());
    }

    #[test]
    fn get_item_without_value_is_none() {
        let vault = unlocked_memory_vault();

        let item = vault.create_item("Test Item").unwrap();
        assert!(vault.get_item(item.id).unwrap().is_none());

        let result = vault.get_item(Uuid::new_v4());
        assert!(matches!(result, Err(KeywardenError::ItemNotFound)));
    }

    #[test]
    fn set_and_get_item_value() {
        let vault = unlocked_memory_vault();

        let item = vault.create_item("Test Item").unwrap();
        let value = LockedBuffer::from_vec(b"test value".to_vec()).unwrap();
        vault.set_item_value(item.id, value).unwrap();

        let retrieved = vault.get_item(item.id).unwrap().unwrap();
        assert_eq!(retrieved.as_bytes(), b"test value");
        retrieved.destroy();

        // The stored ciphertext is not the plaintext.
        let on_disk = vault
            .backend()
            .read_file(&item::value_path(&item.id))
            .unwrap()
            .unwrap();
        assert_ne!(&on_disk[..], b"test value");
    }

    #[test]
    fn empty_value_is_rejected() {
        let vault = unlocked_memory_vault();
        let item = vault.create_item("Test Item").unwrap();

        // An empty locked buffer cannot even be constructed; the engine
        // rejects at the same boundary.
        let result = LockedBuffer::from_vec(Vec::new());
        assert!(result.is_err());
        drop(item);
    }

    #[test]
    fn value_survives_lock_cycle() {
        let vault = unlocked_memory_vault();

        let item = vault.create_item("persistent").unwrap();
        vault
            .set_item_value(item.id, LockedBuffer::from_vec(b"survivor".to_vec()).unwrap())
            .unwrap();

        vault.lock().unwrap();
        vault.unlock(&passphrase("correct_passphrase")).unwrap();

        let retrieved = vault.get_item(item.id).unwrap().unwrap();
        assert_eq!(retrieved.as_bytes(), b"survivor");
    }

    #[test]
    fn items_are_invisible_while_locked() {
        let vault = unlocked_memory_vault();
        vault.create_item("hidden").unwrap();

        vault.lock().unwrap();
        assert!(vault.items().is_empty());

        let result = vault.get_item(Uuid::new_v4());
        assert!(matches!(result, Err(KeywardenError::VaultLocked)));
    }

    #[test]
    fn second_write_creates_backup() {
        let vault = unlocked_memory_vault();

        let item = vault.create_item("versioned").unwrap();
        vault
            .set_item_value(item.id, LockedBuffer::from_vec(b"v1".to_vec()).unwrap())
            .unwrap();

        // First write: no backup.
        assert!(vault.backend().list_files(".age").unwrap().len() == 1);

        vault
            .set_item_value(item.id, LockedBuffer::from_vec(b"v2".to_vec()).unwrap())
            .unwrap();

        let retrieved = vault.get_item(item.id).unwrap().unwrap();
        assert_eq!(retrieved.as_bytes(), b"v2");

        // Second write: exactly one backup under .bak/, with the .age
        // extension.
        let backups: Vec<String> = vault
            .backend()
            .list_files(".age")
            .unwrap()
            .into_iter()
            .filter(|p| p.starts_with(".bak/"))
            .collect();
        assert_eq!(backups.len(), 1);
        assert!(backups[0].contains(&item.id.to_string()));
    }

    #[test]
    fn set_recovery_recipient_rewraps_items() {
        let vault = unlocked_memory_vault();

        let item = vault.create_item("rotated").unwrap();
        vault
            .set_item_value(item.id, LockedBuffer::from_vec(b"s3cret".to_vec()).unwrap())
            .unwrap();

        let before = vault
            .backend()
            .read_file(&item::value_path(&item.id))
            .unwrap()
            .unwrap();

        let recovery_identity = x25519::Identity::generate();
        vault
            .set_recovery_recipient(recovery_identity.to_public())
            .unwrap();

        // The ciphertext changed, and the recovery key alone can decrypt it.
        let after = vault
            .backend()
            .read_file(&item::value_path(&item.id))
            .unwrap()
            .unwrap();
        assert_ne!(before, after);

        let plaintext = crypto::age_decrypt(&recovery_identity, &after).unwrap();
        assert_eq!(&plaintext[..], b"s3cret");

        // The vault still reads its own item.
        let retrieved = vault.get_item(item.id).unwrap().unwrap();
        assert_eq!(retrieved.as_bytes(), b"s3cret");
    }

    #[test]
    fn recovery_recipient_requires_unlock() {
        let vault = Vault::new(Arc::new(MemoryBackend::new())).unwrap();
        let identity = x25519::Identity::generate();

        let result = vault.set_recovery_recipient(identity.to_public());
        assert!(matches!(result, Err(KeywardenError::VaultLocked)));
        assert!(vault.recovery_recipient().is_none());
    }

    #[test]
    fn recovery_recipient_is_loaded_on_construction() {
        let dir = tempdir().unwrap();
        let backend = Arc::new(LocalBackend::new(dir.path()).unwrap());

        {
            let vault = Vault::new(backend.clone()).unwrap();
            vault.unlock(&passphrase("pw")).unwrap();
            let identity = x25519::Identity::generate();
            vault.set_recovery_recipient(identity.to_public()).unwrap();
        }

        let reopened = Vault::new(Arc::new(LocalBackend::new(dir.path()).unwrap())).unwrap();
        assert!(reopened.recovery_recipient().is_some());
    }

    #[test]
    fn tampered_metadata_hides_item() {
        let vault = unlocked_memory_vault();

        let keep = vault.create_item("intact").unwrap();
        let tampered = vault.create_item("tampered").unwrap();

        let path = item::metadata_path(&tampered.id);
        let mut data = vault.backend().read_file(&path).unwrap().unwrap();
        data[8] ^= 0x01;
        vault.backend().write_file(&path, &data).unwrap();

        vault.lock().unwrap();
        vault.unlock(&passphrase("correct_passphrase")).unwrap();

        let ids: Vec<Uuid> = vault.items().iter().map(|i| i.id).collect();
        assert!(ids.contains(&keep.id));
        assert!(!ids.contains(&tampered.id));
    }

    #[test]
    fn corrupted_value_fails_integrity_check() {
        let vault = unlocked_memory_vault();

        let item = vault.create_item("target").unwrap();
        vault
            .set_item_value(item.id, LockedBuffer::from_vec(b"payload".to_vec()).unwrap())
            .unwrap();

        // Swap in a ciphertext of different plaintext under the same
        // metadata checksum.
        let other = vault.create_item("decoy").unwrap();
        vault
            .set_item_value(other.id, LockedBuffer::from_vec(b"decoy bytes".to_vec()).unwrap())
            .unwrap();
        let decoy_ciphertext = vault
            .backend()
            .read_file(&item::value_path(&other.id))
            .unwrap()
            .unwrap();
        vault
            .backend()
            .write_file(&item::value_path(&item.id), &decoy_ciphertext)
            .unwrap();

        let result = vault.get_item(item.id);
        assert!(matches!(result, Err(KeywardenError::Integrity(_))));
    }
}
