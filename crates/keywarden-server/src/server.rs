// SPDX-FileCopyrightText: 2026 Keywarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Router construction and the TLS/plain listener.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use keywarden_config::KeywardenConfig;
use keywarden_core::KeywardenError;
use keywarden_service::State as ServiceState;
use tracing::info;

use crate::handlers;

/// Build the API router.
pub fn build_router(state: Arc<ServiceState>) -> Router {
    Router::new()
        // Core endpoints
        .route("/version", get(handlers::version))
        // Vault lifecycle
        .route("/vault/unlock", post(handlers::unlock))
        .route("/vault/lock", delete(handlers::lock))
        // Endpoints using passphrase auth
        .route("/vault/recovery-recipient", post(handlers::set_recovery_recipient))
        .route(
            "/vault/item",
            post(handlers::create_vault_item).delete(handlers::delete_vault_items),
        )
        .route("/vault/item/read", post(handlers::read_vault_item))
        .route("/vault/item/list", post(handlers::list_vault_items))
        .route("/vault/client", post(handlers::create_client_credentials))
        // Endpoints using client auth
        .route("/item", post(handlers::client_read_vault_item))
        .with_state(state)
}

/// Bind and serve the API.
///
/// Production requires TLS; this re-checks the invariant the config
/// validator already enforced so the server fails closed even if it is
/// wired up directly.
pub async fn serve(
    config: &KeywardenConfig,
    state: Arc<ServiceState>,
) -> Result<(), KeywardenError> {
    let addr: SocketAddr = config
        .server
        .listen_address
        .parse()
        .map_err(|e| KeywardenError::Config(format!("invalid listen address: {e}")))?;

    let app = build_router(state).into_make_service_with_connect_info::<SocketAddr>();

    match &config.server.tls {
        Some(tls) => {
            let rustls = RustlsConfig::from_pem_file(&tls.cert_file, &tls.key_file)
                .await
                .map_err(|e| {
                    KeywardenError::Config(format!("failed to load TLS certificate: {e}"))
                })?;

            info!(%addr, "listening with TLS");
            axum_server::bind_rustls(addr, rustls)
                .serve(app)
                .await
                .map_err(KeywardenError::storage)
        }
        None => {
            if config.server.production {
                return Err(KeywardenError::Config(
                    "TLS configuration is not set".to_string(),
                ));
            }

            info!(%addr, "listening without TLS (development mode)");
            axum_server::bind(addr)
                .serve(app)
                .await
                .map_err(KeywardenError::storage)
        }
    }
}
