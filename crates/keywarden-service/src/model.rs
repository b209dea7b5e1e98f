// SPDX-FileCopyrightText: 2026 Keywarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire request and response models.
//!
//! Field names are the stable wire contract. Passphrases and client
//! secrets deserialize into [`SecretString`] so the backing memory is
//! wiped when a request is dropped; responses carrying secret material
//! wipe themselves on drop, after serialization.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroize;

use keywarden_vault::Item;

/// Bytes-on-the-wire are base64 strings.
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// `GET /version`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub version: String,
    pub is_locked: bool,
    pub is_production: bool,
}

/// `POST /vault/unlock`
#[derive(Deserialize)]
pub struct UnlockRequest {
    pub passphrase: SecretString,
}

/// `POST /vault/recovery-recipient`
#[derive(Deserialize)]
pub struct SetRecoveryRecipientRequest {
    pub passphrase: SecretString,
    pub recipient: String,
}

/// `POST /vault/item`
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVaultItemRequest {
    pub passphrase: SecretString,
    pub description: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl Drop for CreateVaultItemRequest {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}

/// `POST /vault/item/list`
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListVaultItemsRequest {
    pub passphrase: SecretString,
    #[serde(default)]
    pub description_contains: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListVaultItemsResponse {
    pub items: Vec<Item>,
}

/// `POST /vault/item/read` (admin)
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadVaultItemRequest {
    pub passphrase: SecretString,
    pub item_id: Uuid,
}

/// `POST /item` (client credentials + host pinning)
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientReadVaultItemRequest {
    pub id: Uuid,
    pub secret: SecretString,
    pub item_id: Uuid,
    #[serde(default)]
    pub verification_id: Option<Uuid>,
}

/// Response for both read endpoints. The plaintext value is wiped when
/// the response is dropped, immediately after serialization.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadVaultItemResponse {
    #[serde(with = "base64_bytes")]
    pub value: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_id: Option<Uuid>,
}

impl Drop for ReadVaultItemResponse {
    fn drop(&mut self) {
        self.value.zeroize();
    }
}

impl std::fmt::Debug for ReadVaultItemResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadVaultItemResponse")
            .field("value", &"[REDACTED]")
            .field("verification_id", &self.verification_id)
            .finish()
    }
}

/// `DELETE /vault/item`
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteVaultItemsRequest {
    pub passphrase: SecretString,
    pub item_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteVaultItemsResponse {
    pub deleted_item_ids: Vec<Uuid>,
}

/// `POST /vault/client`
#[derive(Deserialize)]
pub struct CreateClientCredentialsRequest {
    pub passphrase: SecretString,
    pub description: String,
}

/// The one-time reveal of a machine client's credentials. The secret is
/// wiped when the response is dropped, immediately after serialization.
#[derive(Serialize)]
pub struct ClientCredentialsResponse {
    pub id: Uuid,
    pub secret: String,
}

impl Drop for ClientCredentialsResponse {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

impl std::fmt::Debug for ClientCredentialsResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentialsResponse")
            .field("id", &self.id)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Error payload: a single opaque message.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn unlock_request_deserializes() {
        let req: UnlockRequest = serde_json::from_str(r#"{"passphrase": "hunter2"}"#).unwrap();
        assert_eq!(req.passphrase.expose_secret(), "hunter2");
    }

    #[test]
    fn create_item_request_decodes_base64_data() {
        let req: CreateVaultItemRequest = serde_json::from_str(
            r#"{"passphrase": "pw", "description": "db", "data": "czNjcmV0"}"#,
        )
        .unwrap();
        assert_eq!(req.data, b"s3cret");
    }

    #[test]
    fn create_item_request_rejects_bad_base64() {
        let result: Result<CreateVaultItemRequest, _> = serde_json::from_str(
            r#"{"passphrase": "pw", "description": "db", "data": "not base64!!!"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn read_response_encodes_base64_and_skips_absent_verification_id() {
        let resp = ReadVaultItemResponse {
            value: b"s3cret".to_vec(),
            verification_id: None,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"value\":\"czNjcmV0\""));
        assert!(!json.contains("verificationId"));
    }

    #[test]
    fn read_response_includes_verification_id_when_present() {
        let vid = Uuid::new_v4();
        let resp = ReadVaultItemResponse {
            value: b"x".to_vec(),
            verification_id: Some(vid),
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains(&vid.to_string()));
    }

    #[test]
    fn client_read_request_verification_id_is_optional() {
        let id = Uuid::new_v4();
        let item_id = Uuid::new_v4();
        let json = format!(r#"{{"id": "{id}", "secret": "tok", "itemId": "{item_id}"}}"#);
        let req: ClientReadVaultItemRequest = serde_json::from_str(&json).unwrap();
        assert!(req.verification_id.is_none());
    }

    #[test]
    fn info_response_field_names() {
        let resp = InfoResponse {
            version: "0.4.0".to_string(),
            is_locked: true,
            is_production: false,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"isLocked\":true"));
        assert!(json.contains("\"isProduction\":false"));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let resp = ClientCredentialsResponse {
            id: Uuid::new_v4(),
            secret: "supersecret".to_string(),
        };
        assert!(!format!("{resp:?}").contains("supersecret"));

        let read = ReadVaultItemResponse {
            value: b"plaintext".to_vec(),
            verification_id: None,
        };
        assert!(!format!("{read:?}").contains("plaintext"));
    }
}
