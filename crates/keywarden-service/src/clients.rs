// SPDX-FileCopyrightText: 2026 Keywarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Machine-client credentials and host pinning.
//!
//! A client credential is a vault item: the item's UUID is the client id
//! and the item's value is the client secret. The item description is
//! `CC[<user description>]`. On first use, a companion item described as
//! `VI[<client id>]` records the remote host the credential was used
//! from; every later use must present the companion's id and come from
//! that same host.
//!
//! Authentication failures are deliberately uniform: an unknown id, a
//! wrong secret, and a pinning mismatch all produce the same opaque
//! refusals.

use keywarden_core::KeywardenError;
use keywarden_vault::{Item, LockedBuffer};
use ring::rand::{SecureRandom, SystemRandom};
use secrecy::{ExposeSecret, SecretString};
use tracing::{error, info};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::model::{
    ClientCredentialsResponse, ClientReadVaultItemRequest, CreateClientCredentialsRequest,
    ReadVaultItemResponse,
};
use crate::state::State;

const CREDENTIALS_MISMATCH: &str = "client credentials mismatch";
const HOST_MISMATCH: &str = "failed to verify client remote host";

/// Client secrets: 26 characters over a 62-symbol alphabet, ≈154 bits.
const TOKEN_LEN: usize = 26;
const TOKEN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

impl State {
    /// Issue a fresh machine-client credential.
    ///
    /// The secret is revealed exactly once, in the response; afterwards it
    /// only exists encrypted inside the vault item.
    pub fn create_client_credentials(
        &self,
        request: &CreateClientCredentialsRequest,
    ) -> Result<ClientCredentialsResponse, KeywardenError> {
        self.require_admin(&request.passphrase)?;

        let token = generate_token()?;

        let item = self
            .vault()
            .create_item(&format!("CC[{}]", request.description))?;

        let mut token_bytes = token.as_bytes().to_vec();
        let value = LockedBuffer::from_slice(&mut token_bytes)?;
        if let Err(e) = self.vault().set_item_value(item.id, value) {
            let _ = self.vault().delete_item(item.id);
            return Err(e);
        }

        // Read back through the engine so the response carries exactly
        // what a verification will later decrypt.
        let stored = self
            .vault()
            .get_item(item.id)?
            .ok_or_else(|| KeywardenError::Internal("client secret not stored".to_string()))?;
        let secret = String::from_utf8(stored.as_bytes().to_vec())
            .map_err(|_| KeywardenError::Internal("client secret not UTF-8".to_string()))?;
        stored.destroy();

        info!(id = %item.id, "issued client credentials");
        Ok(ClientCredentialsResponse {
            id: item.id,
            secret,
        })
    }

    /// Read an item as a machine client: credential check plus host
    /// pinning.
    ///
    /// `remote_host` is the connection's peer identity as seen by the
    /// transport.
    pub fn client_read_vault_item(
        &self,
        request: &ClientReadVaultItemRequest,
        remote_host: &str,
    ) -> Result<ReadVaultItemResponse, KeywardenError> {
        self.verify_client_credentials(request.id, &request.secret)?;

        let verification_id =
            self.verify_client_host(request.id, request.verification_id, remote_host)?;

        let value = self
            .vault()
            .get_item(request.item_id)?
            .ok_or_else(|| KeywardenError::InvalidInput("item has no value".to_string()))?;

        let response = ReadVaultItemResponse {
            value: value.as_bytes().to_vec(),
            verification_id: Some(verification_id),
        };
        value.destroy();
        Ok(response)
    }

    /// Constant-time verification of a client (id, secret) pair.
    ///
    /// Unknown id, valueless item, and wrong secret are indistinguishable
    /// to the caller.
    fn verify_client_credentials(
        &self,
        id: Uuid,
        secret: &SecretString,
    ) -> Result<(), KeywardenError> {
        let stored = self
            .vault()
            .get_item(id)
            .map_err(|_| KeywardenError::unauthorized(CREDENTIALS_MISMATCH))?
            .ok_or_else(|| KeywardenError::unauthorized(CREDENTIALS_MISMATCH))?;

        let matches = ring::constant_time::verify_slices_are_equal(
            secret.expose_secret().as_bytes(),
            stored.as_bytes(),
        )
        .is_ok();
        stored.destroy();

        if matches {
            Ok(())
        } else {
            Err(KeywardenError::unauthorized(CREDENTIALS_MISMATCH))
        }
    }

    /// Enforce host pinning for a verified client credential.
    ///
    /// Returns the verification id the caller must present next time.
    fn verify_client_host(
        &self,
        client_id: Uuid,
        presented: Option<Uuid>,
        remote_host: &str,
    ) -> Result<Uuid, KeywardenError> {
        match self.find_companion(client_id) {
            None => self.pin_client_host(client_id, remote_host),
            Some(companion) => {
                if presented != Some(companion.id) {
                    error!(
                        client_id = %client_id,
                        remote_host = %remote_host,
                        "client presented missing or mismatching verification id"
                    );
                    return Err(KeywardenError::unauthorized(HOST_MISMATCH));
                }

                let stored = self
                    .vault()
                    .get_item(companion.id)
                    .map_err(|_| KeywardenError::unauthorized(HOST_MISMATCH))?
                    .ok_or_else(|| KeywardenError::unauthorized(HOST_MISMATCH))?;
                let pinned_host = String::from_utf8(stored.as_bytes().to_vec());
                stored.destroy();

                let pinned_host =
                    pinned_host.map_err(|_| KeywardenError::unauthorized(HOST_MISMATCH))?;
                if pinned_host != remote_host {
                    error!(
                        client_id = %client_id,
                        pinned_host = %pinned_host,
                        remote_host = %remote_host,
                        "client host pinning mismatch"
                    );
                    return Err(KeywardenError::unauthorized(HOST_MISMATCH));
                }

                Ok(companion.id)
            }
        }
    }

    /// First use of a credential: bind it to the calling host.
    fn pin_client_host(
        &self,
        client_id: Uuid,
        remote_host: &str,
    ) -> Result<Uuid, KeywardenError> {
        let companion = self
            .vault()
            .create_item(&format!("VI[{client_id}]"))?;

        let mut host_bytes = remote_host.as_bytes().to_vec();
        let value = LockedBuffer::from_slice(&mut host_bytes)?;
        if let Err(e) = self.vault().set_item_value(companion.id, value) {
            let _ = self.vault().delete_item(companion.id);
            return Err(e);
        }

        self.verification_index
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(client_id, companion.id);

        info!(
            client_id = %client_id,
            remote_host = %remote_host,
            verification_id = %companion.id,
            "pinned client credential to remote host"
        );
        Ok(companion.id)
    }

    /// Find the host-pinning companion item for a client id.
    ///
    /// The index is a cache; on miss the item table is scanned for the
    /// `VI[<id>]` marker and the index refreshed. An index entry whose
    /// item has vanished (deleted, hidden by MAC failure) is dropped.
    fn find_companion(&self, client_id: Uuid) -> Option<Item> {
        let items = self.vault().items();

        let cached = {
            let index = self
                .verification_index
                .read()
                .unwrap_or_else(|e| e.into_inner());
            index.get(&client_id).copied()
        };

        if let Some(verification_id) = cached {
            if let Some(item) = items.iter().find(|i| i.id == verification_id) {
                return Some(item.clone());
            }
        }

        let marker = format!("VI[{client_id}]");
        let found = items.into_iter().find(|i| i.description == marker);

        let mut index = self
            .verification_index
            .write()
            .unwrap_or_else(|e| e.into_inner());
        match &found {
            Some(item) => {
                index.insert(client_id, item.id);
            }
            None => {
                index.remove(&client_id);
            }
        }

        found
    }
}

/// Generate a client secret by rejection sampling over the CSPRNG, so
/// every alphabet symbol is equally likely.
fn generate_token() -> Result<Zeroizing<String>, KeywardenError> {
    let rng = SystemRandom::new();
    let mut token = Zeroizing::new(String::with_capacity(TOKEN_LEN));

    let mut block = [0u8; 64];
    while token.len() < TOKEN_LEN {
        rng.fill(&mut block)
            .map_err(|_| KeywardenError::Crypto("failed to generate client secret".to_string()))?;

        for &byte in &block {
            let candidate = (byte & 0x3f) as usize;
            if candidate < TOKEN_ALPHABET.len() {
                token.push(TOKEN_ALPHABET[candidate] as char);
                if token.len() == TOKEN_LEN {
                    break;
                }
            }
        }
    }

    Ok(token)
}
