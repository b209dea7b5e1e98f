// SPDX-FileCopyrightText: 2026 Keywarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Keywarden credential vault.
//!
//! This crate provides the error taxonomy shared by every other crate in
//! the workspace. The vault engine, service facade, and server all speak
//! [`KeywardenError`].

pub mod error;

pub use error::KeywardenError;
