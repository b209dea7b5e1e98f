// SPDX-FileCopyrightText: 2026 Keywarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Keywarden credential vault.
//!
//! Loads TOML configuration through a layered figment hierarchy with
//! `KEYWARDEN_*` environment overrides, then validates semantic
//! constraints that serde cannot express (socket addresses, the
//! TLS-required-in-production rule).

pub mod loader;
pub mod model;
pub mod validation;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::KeywardenConfig;
pub use validation::{validate_config, ConfigError};
