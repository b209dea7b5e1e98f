// SPDX-FileCopyrightText: 2026 Keywarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Item records and the authenticated metadata codec.
//!
//! Metadata is stored as UTF-8 JSON immediately followed by 32 raw bytes
//! of HMAC-SHA256 over the JSON, keyed by a secret derived from the
//! unlocked identity. No framing. The JSON field names are the stable
//! interop boundary and must not change.

use chrono::{DateTime, Utc};
use keywarden_core::KeywardenError;
use ring::hmac;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Length of the HMAC-SHA256 tag appended to metadata files.
pub const METADATA_MAC_LEN: usize = 32;

/// A vault item record. The value bytes live in a separate age-encrypted
/// file; this record only carries metadata about them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Item identifier; also determines the on-disk file names.
    pub id: Uuid,

    /// Caller-supplied description.
    pub description: String,

    /// Hex SHA-256 of the plaintext value, or `""` while no value has
    /// ever been stored.
    pub checksum: String,

    /// Last modification time (creation, value write, or re-encryption).
    pub modified_at: DateTime<Utc>,
}

impl Item {
    /// A fresh item with no value.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            checksum: String::new(),
            modified_at: Utc::now(),
        }
    }

    /// Whether a value has ever been stored for this item.
    pub fn has_value(&self) -> bool {
        !self.checksum.is_empty()
    }
}

/// Relative path of the item's metadata file.
pub fn metadata_path(id: &Uuid) -> String {
    format!("{id}.json")
}

/// Relative path of the item's encrypted value file.
pub fn value_path(id: &Uuid) -> String {
    format!("{id}.age")
}

/// Relative path for a timestamped backup of the item's prior ciphertext.
pub fn backup_path(id: &Uuid, now: DateTime<Utc>) -> String {
    format!("{}/{id}.{}.age", crate::backend::BACKUP_DIR, now.timestamp_millis())
}

/// Serialize an item and append its authentication tag.
pub fn encode_metadata(item: &Item, hmac_secret: &[u8]) -> Result<Vec<u8>, KeywardenError> {
    let mut encoded = serde_json::to_vec(item)
        .map_err(|e| KeywardenError::Internal(format!("failed to serialize metadata: {e}")))?;

    let key = hmac::Key::new(hmac::HMAC_SHA256, hmac_secret);
    let tag = hmac::sign(&key, &encoded);
    encoded.extend_from_slice(tag.as_ref());

    Ok(encoded)
}

/// Verify and parse a metadata file.
///
/// `file_name` is the basename of the file the bytes came from; it must
/// match the id recorded inside the payload, otherwise a valid record
/// copied over another item's file would impersonate it.
pub fn decode_metadata(
    file_name: &str,
    data: &[u8],
    hmac_secret: &[u8],
) -> Result<Item, KeywardenError> {
    if data.len() <= METADATA_MAC_LEN {
        return Err(KeywardenError::Integrity(
            "metadata file too short".to_string(),
        ));
    }

    let (payload, tag) = data.split_at(data.len() - METADATA_MAC_LEN);
    let key = hmac::Key::new(hmac::HMAC_SHA256, hmac_secret);
    hmac::verify(&key, payload, tag)
        .map_err(|_| KeywardenError::Integrity("metadata MAC mismatch".to_string()))?;

    let item: Item = serde_json::from_slice(payload)
        .map_err(|e| KeywardenError::Integrity(format!("malformed metadata: {e}")))?;

    if file_name != metadata_path(&item.id) {
        return Err(KeywardenError::Integrity(format!(
            "metadata file name does not match item id {}",
            item.id
        )));
    }

    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    #[test]
    fn new_item_has_empty_checksum() {
        let item = Item::new("backup repo key");
        assert_eq!(item.description, "backup repo key");
        assert!(!item.has_value());
    }

    #[test]
    fn metadata_round_trip() {
        let item = Item::new("db password");
        let encoded = encode_metadata(&item, SECRET).unwrap();

        let decoded = decode_metadata(&metadata_path(&item.id), &encoded, SECRET).unwrap();
        assert_eq!(decoded, item);
    }

    #[test]
    fn json_field_names_are_stable() {
        let item = Item::new("desc");
        let encoded = encode_metadata(&item, SECRET).unwrap();
        let json = &encoded[..encoded.len() - METADATA_MAC_LEN];
        let value: serde_json::Value = serde_json::from_slice(json).unwrap();

        for field in ["id", "description", "checksum", "modified_at"] {
            assert!(value.get(field).is_some(), "missing field {field}");
        }
    }

    #[test]
    fn flipped_bit_fails_verification() {
        let item = Item::new("tamper target");
        let mut encoded = encode_metadata(&item, SECRET).unwrap();
        encoded[10] ^= 0x01;

        let result = decode_metadata(&metadata_path(&item.id), &encoded, SECRET);
        assert!(matches!(result, Err(KeywardenError::Integrity(_))));
    }

    #[test]
    fn flipped_tag_bit_fails_verification() {
        let item = Item::new("tamper target");
        let mut encoded = encode_metadata(&item, SECRET).unwrap();
        let last = encoded.len() - 1;
        encoded[last] ^= 0x80;

        let result = decode_metadata(&metadata_path(&item.id), &encoded, SECRET);
        assert!(matches!(result, Err(KeywardenError::Integrity(_))));
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let item = Item::new("keyed");
        let encoded = encode_metadata(&item, SECRET).unwrap();

        let result = decode_metadata(
            &metadata_path(&item.id),
            &encoded,
            b"ffffffffffffffffffffffffffffffff",
        );
        assert!(matches!(result, Err(KeywardenError::Integrity(_))));
    }

    #[test]
    fn renamed_file_is_rejected() {
        let item = Item::new("original");
        let encoded = encode_metadata(&item, SECRET).unwrap();

        let other = Uuid::new_v4();
        let result = decode_metadata(&metadata_path(&other), &encoded, SECRET);
        assert!(matches!(result, Err(KeywardenError::Integrity(_))));
    }

    #[test]
    fn truncated_file_is_rejected() {
        let result = decode_metadata("x.json", &[0u8; METADATA_MAC_LEN], SECRET);
        assert!(matches!(result, Err(KeywardenError::Integrity(_))));
    }

    #[test]
    fn paths_are_deterministic() {
        let id = Uuid::new_v4();
        assert_eq!(metadata_path(&id), format!("{id}.json"));
        assert_eq!(value_path(&id), format!("{id}.age"));

        let now = Utc::now();
        let backup = backup_path(&id, now);
        assert!(backup.starts_with(".bak/"));
        assert!(backup.ends_with(".age"));
        assert!(backup.contains(&id.to_string()));
    }
}
