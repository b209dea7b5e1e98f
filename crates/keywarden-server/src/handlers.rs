// SPDX-FileCopyrightText: 2026 Keywarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers.
//!
//! Every vault-touching handler moves its work to the blocking thread
//! pool: engine operations hold a lock across disk I/O and must not stall
//! the async runtime. Error payloads are a single opaque `message`;
//! authentication failures are always 401 regardless of the failing
//! sub-condition, and internal causes never reach the wire.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use keywarden_core::KeywardenError;
use keywarden_service::model::{
    ClientReadVaultItemRequest, CreateClientCredentialsRequest, CreateVaultItemRequest,
    DeleteVaultItemsRequest, DeleteVaultItemsResponse, ErrorResponse, ListVaultItemsRequest,
    ListVaultItemsResponse, ReadVaultItemRequest, SetRecoveryRecipientRequest, UnlockRequest,
};
use keywarden_service::State as ServiceState;
use tracing::error;

/// Error wrapper giving [`KeywardenError`] an HTTP rendering.
pub struct ApiError(KeywardenError);

impl From<KeywardenError> for ApiError {
    fn from(err: KeywardenError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            KeywardenError::BadPassphrase | KeywardenError::Unauthorized(_) => {
                (StatusCode::UNAUTHORIZED, self.0.to_string())
            }
            KeywardenError::VaultLocked | KeywardenError::InvalidInput(_) => {
                (StatusCode::BAD_REQUEST, self.0.to_string())
            }
            KeywardenError::ItemNotFound => (StatusCode::NOT_FOUND, self.0.to_string()),
            KeywardenError::Integrity(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string())
            }
            KeywardenError::Storage { .. }
            | KeywardenError::Crypto(_)
            | KeywardenError::Config(_)
            | KeywardenError::Internal(_) => {
                error!(error = %self.0, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { message })).into_response()
    }
}

/// Run a facade call on the blocking pool.
async fn blocking<T, F>(state: Arc<ServiceState>, work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&ServiceState) -> Result<T, KeywardenError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || work(&state))
        .await
        .map_err(|e| {
            ApiError(KeywardenError::Internal(format!(
                "blocking task failed: {e}"
            )))
        })?
        .map_err(ApiError)
}

/// `GET /version`
pub async fn version(State(state): State<Arc<ServiceState>>) -> Response {
    Json(state.info()).into_response()
}

/// `POST /vault/unlock`
pub async fn unlock(
    State(state): State<Arc<ServiceState>>,
    Json(request): Json<UnlockRequest>,
) -> Result<StatusCode, ApiError> {
    blocking(state, move |s| s.unlock(&request.passphrase)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /vault/lock`
pub async fn lock(State(state): State<Arc<ServiceState>>) -> Result<StatusCode, ApiError> {
    blocking(state, move |s| {
        s.lock();
        Ok(())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /vault/recovery-recipient`
pub async fn set_recovery_recipient(
    State(state): State<Arc<ServiceState>>,
    Json(request): Json<SetRecoveryRecipientRequest>,
) -> Result<StatusCode, ApiError> {
    blocking(state, move |s| s.set_recovery_recipient(&request)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /vault/item`
pub async fn create_vault_item(
    State(state): State<Arc<ServiceState>>,
    Json(request): Json<CreateVaultItemRequest>,
) -> Result<Response, ApiError> {
    let item = blocking(state, move |s| s.create_vault_item(&request)).await?;
    Ok(Json(item).into_response())
}

/// `POST /vault/item/list`
pub async fn list_vault_items(
    State(state): State<Arc<ServiceState>>,
    Json(request): Json<ListVaultItemsRequest>,
) -> Result<Response, ApiError> {
    let items = blocking(state, move |s| {
        Ok(s.list_vault_items(&request)?.collect::<Vec<_>>())
    })
    .await?;
    Ok(Json(ListVaultItemsResponse { items }).into_response())
}

/// `DELETE /vault/item`
pub async fn delete_vault_items(
    State(state): State<Arc<ServiceState>>,
    Json(request): Json<DeleteVaultItemsRequest>,
) -> Result<Response, ApiError> {
    let deleted_item_ids = blocking(state, move |s| s.delete_vault_items(&request)).await?;
    Ok(Json(DeleteVaultItemsResponse { deleted_item_ids }).into_response())
}

/// `POST /vault/item/read` (admin)
pub async fn read_vault_item(
    State(state): State<Arc<ServiceState>>,
    Json(request): Json<ReadVaultItemRequest>,
) -> Result<Response, ApiError> {
    let response = blocking(state, move |s| s.read_vault_item(&request)).await?;
    // Serializing into the response body is the plaintext's last stop;
    // the model wipes it on drop.
    Ok(Json(response).into_response())
}

/// `POST /vault/client`
pub async fn create_client_credentials(
    State(state): State<Arc<ServiceState>>,
    Json(request): Json<CreateClientCredentialsRequest>,
) -> Result<Response, ApiError> {
    let credentials = blocking(state, move |s| s.create_client_credentials(&request)).await?;
    Ok(Json(credentials).into_response())
}

/// `POST /item` (client credentials + host pinning)
pub async fn client_read_vault_item(
    State(state): State<Arc<ServiceState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(request): Json<ClientReadVaultItemRequest>,
) -> Result<Response, ApiError> {
    let remote_host = peer.ip().to_string();
    let response =
        blocking(state, move |s| s.client_read_vault_item(&request, &remote_host)).await?;
    Ok(Json(response).into_response())
}
