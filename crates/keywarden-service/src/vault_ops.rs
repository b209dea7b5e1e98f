// SPDX-FileCopyrightText: 2026 Keywarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admin vault operations: recovery recipient, item CRUD, admin reads.
//!
//! Every operation authenticates the caller's passphrase before touching
//! the engine.

use keywarden_core::KeywardenError;
use keywarden_vault::{crypto, Item, LockedBuffer};
use tracing::warn;
use uuid::Uuid;

use crate::model::{
    CreateVaultItemRequest, DeleteVaultItemsRequest, ListVaultItemsRequest, ReadVaultItemRequest,
    ReadVaultItemResponse, SetRecoveryRecipientRequest,
};
use crate::state::State;

impl State {
    /// Install a new recovery recipient, re-encrypting all items to it.
    pub fn set_recovery_recipient(
        &self,
        request: &SetRecoveryRecipientRequest,
    ) -> Result<(), KeywardenError> {
        self.require_admin(&request.passphrase)?;

        let recipient = crypto::parse_recipient(&request.recipient)?;
        self.vault().set_recovery_recipient(recipient)
    }

    /// Create an item and store its initial value in one step.
    ///
    /// If storing the value fails, the freshly created item is removed
    /// again so no value-less stub is left behind.
    pub fn create_vault_item(
        &self,
        request: &CreateVaultItemRequest,
    ) -> Result<Item, KeywardenError> {
        self.require_admin(&request.passphrase)?;

        if request.data.is_empty() {
            return Err(KeywardenError::InvalidInput("value is empty".to_string()));
        }

        let item = self.vault().create_item(&request.description)?;

        let mut data = request.data.clone();
        let value = LockedBuffer::from_slice(&mut data)?;
        if let Err(e) = self.vault().set_item_value(item.id, value) {
            if let Err(cleanup) = self.vault().delete_item(item.id) {
                warn!(id = %item.id, error = %cleanup, "failed to remove half-created item");
            }
            return Err(e);
        }

        // The engine updated checksum and modification time; return the
        // current record rather than the pre-value snapshot.
        let record = self
            .vault()
            .items()
            .into_iter()
            .find(|i| i.id == item.id)
            .unwrap_or(item);
        Ok(record)
    }

    /// Item records, optionally filtered by description substring,
    /// yielded one at a time for the streaming wire surface.
    pub fn list_vault_items(
        &self,
        request: &ListVaultItemsRequest,
    ) -> Result<impl Iterator<Item = Item>, KeywardenError> {
        self.require_admin(&request.passphrase)?;

        let filter = request.description_contains.clone();
        let items = self.vault().items().into_iter().filter(move |item| {
            filter
                .as_deref()
                .map_or(true, |needle| item.description.contains(needle))
        });

        Ok(items)
    }

    /// Delete the requested items, returning the ids actually processed.
    pub fn delete_vault_items(
        &self,
        request: &DeleteVaultItemsRequest,
    ) -> Result<Vec<Uuid>, KeywardenError> {
        self.require_admin(&request.passphrase)?;

        let mut deleted = Vec::with_capacity(request.item_ids.len());
        for &id in &request.item_ids {
            self.vault().delete_item(id)?;
            self.drop_verification_entry(id);
            deleted.push(id);
        }

        Ok(deleted)
    }

    /// Read an item's plaintext as the administrator.
    pub fn read_vault_item(
        &self,
        request: &ReadVaultItemRequest,
    ) -> Result<ReadVaultItemResponse, KeywardenError> {
        self.require_admin(&request.passphrase)?;

        let value = self
            .vault()
            .get_item(request.item_id)?
            .ok_or_else(|| KeywardenError::InvalidInput("item has no value".to_string()))?;

        let response = ReadVaultItemResponse {
            value: value.as_bytes().to_vec(),
            verification_id: None,
        };
        value.destroy();
        Ok(response)
    }

    /// Forget the host-pinning cache entry for a deleted client item.
    fn drop_verification_entry(&self, client_id: Uuid) {
        self.verification_index
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&client_id);
    }
}
