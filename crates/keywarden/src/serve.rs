// SPDX-FileCopyrightText: 2026 Keywarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `keywarden serve` command implementation.
//!
//! Loads and validates configuration, opens the vault over the local
//! storage backend, installs the interrupt handler that bulk-wipes all
//! locked secret memory, and runs the HTTP listener (TLS in production).

use std::path::PathBuf;
use std::sync::Arc;

#[cfg(test)]
use keywarden_config::KeywardenConfig;
use keywarden_config::{load_config, load_config_from_path, validate_config};
use keywarden_core::KeywardenError;
use keywarden_service::State;
use keywarden_vault::{purge_all, LocalBackend, Vault};
use tracing::{error, info};

/// Runs the `keywarden serve` command.
pub async fn run_serve(config_path: Option<PathBuf>) -> Result<(), KeywardenError> {
    let config = match config_path {
        Some(path) => load_config_from_path(&path),
        None => load_config(),
    }
    .map_err(|e| KeywardenError::Config(e.to_string()))?;

    init_tracing(&config.log.level);

    if let Err(errors) = validate_config(&config) {
        for e in &errors {
            error!("{e}");
        }
        return Err(KeywardenError::Config(format!(
            "{} configuration error(s); refusing to start",
            errors.len()
        )));
    }

    info!(
        storage = config.storage.path.as_str(),
        listen = config.server.listen_address.as_str(),
        production = config.server.production,
        "starting keywarden serve"
    );

    let backend = Arc::new(LocalBackend::new(&config.storage.path)?);
    let vault = Arc::new(Vault::new(backend)?);

    let state = Arc::new(State::new(
        config.clone(),
        vault,
        env!("CARGO_PKG_VERSION"),
        config.server.production,
    ));

    spawn_purge_on_interrupt();

    keywarden_server::serve(&config, state).await
}

/// Install the interrupt handler: wipe every live locked buffer, then
/// exit. Plaintext must not outlive the process in swappable memory.
fn spawn_purge_on_interrupt() {
    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received; purging secret memory");
            purge_all();
            std::process::exit(0);
        }
    });
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("keywarden={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
