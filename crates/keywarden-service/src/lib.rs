// SPDX-FileCopyrightText: 2026 Keywarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Service facade for the Keywarden credential vault.
//!
//! Sits between the wire surface and the vault engine: verifies admin
//! passphrases and client credentials, shapes engine records into wire
//! models, issues machine-client credentials, and pins each client
//! credential to the first remote host that used it.

pub mod clients;
pub mod model;
pub mod state;
pub mod vault_ops;

pub use state::State;
