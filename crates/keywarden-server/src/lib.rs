// SPDX-FileCopyrightText: 2026 Keywarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP API surface for the Keywarden credential vault.
//!
//! A thin axum layer over the service facade. Vault work runs on the
//! blocking thread pool; handlers only shape requests and responses.
//! In production mode the listener is TLS-only.

pub mod handlers;
pub mod server;

pub use server::{build_router, serve};
