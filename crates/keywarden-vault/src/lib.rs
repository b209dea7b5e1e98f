// SPDX-FileCopyrightText: 2026 Keywarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vault engine for the Keywarden credential vault.
//!
//! Items are opaque secret byte strings, encrypted at rest with age
//! (X25519) to the vault's primary recipient and an optional recovery
//! recipient. Item metadata is authenticated with HMAC-SHA256 keyed by a
//! secret derived from the unlocked identity. Every plaintext held by the
//! engine lives in a page-locked, wipe-on-drop buffer.
//!
//! The engine is synchronous: one readers-writer lock serializes all
//! mutating operations, and disk I/O for a single item happens under it.

pub mod backend;
pub mod crypto;
pub mod item;
pub mod secmem;
pub mod vault;

pub use backend::{Backend, LocalBackend, MemoryBackend};
pub use item::Item;
pub use secmem::{purge_all, Enclave, LockedBuffer};
pub use vault::Vault;
