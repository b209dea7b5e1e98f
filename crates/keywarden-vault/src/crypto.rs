// SPDX-FileCopyrightText: 2026 Keywarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Low-level crypto: digests, identity wrapping, and age streams.
//!
//! The identity file format is 12 random bytes of GCM nonce followed by
//! the AES-256-GCM ciphertext of the age identity's canonical text
//! encoding, keyed by SHA-256 of the passphrase, with empty associated
//! data. Item values are armor-less age v1 streams addressed to the
//! primary recipient and, when configured, the recovery recipient.

use std::io::{Read, Write};

use age::x25519;
use keywarden_core::KeywardenError;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::digest;
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

/// GCM nonce length prefixed to the identity file.
pub const IDENTITY_NONCE_LEN: usize = 12;

/// SHA-256 of `data` as a raw 32-byte array.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(digest::digest(&digest::SHA256, data).as_ref());
    out
}

/// Hex-encoded SHA-256, used as the item value checksum.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(digest::digest(&digest::SHA256, data).as_ref())
}

/// Encrypt the identity's text encoding under the wrapping key.
///
/// Returns `nonce || ciphertext` ready to be written to the identity file.
pub fn seal_identity(wrap_key: &[u8], identity_text: &[u8]) -> Result<Vec<u8>, KeywardenError> {
    let key = gcm_key(wrap_key)?;

    let mut nonce = [0u8; IDENTITY_NONCE_LEN];
    SystemRandom::new()
        .fill(&mut nonce)
        .map_err(|_| KeywardenError::Crypto("failed to generate identity nonce".to_string()))?;

    let mut in_out = identity_text.to_vec();
    key.seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut in_out)
        .map_err(|_| KeywardenError::Crypto("failed to encrypt identity".to_string()))?;

    let mut result = Vec::with_capacity(IDENTITY_NONCE_LEN + in_out.len());
    result.extend_from_slice(&nonce);
    result.extend_from_slice(&in_out);
    Ok(result)
}

/// Decrypt an identity file written by [`seal_identity`].
///
/// The returned plaintext is the identity's canonical text encoding; it
/// wipes itself when dropped.
pub fn open_identity(
    wrap_key: &[u8],
    file_bytes: &[u8],
) -> Result<Zeroizing<Vec<u8>>, KeywardenError> {
    if file_bytes.len() <= IDENTITY_NONCE_LEN {
        return Err(KeywardenError::Crypto("identity file too short".to_string()));
    }

    let key = gcm_key(wrap_key)?;

    let mut nonce = [0u8; IDENTITY_NONCE_LEN];
    nonce.copy_from_slice(&file_bytes[..IDENTITY_NONCE_LEN]);

    let mut in_out = Zeroizing::new(file_bytes[IDENTITY_NONCE_LEN..].to_vec());
    let plaintext_len = key
        .open_in_place(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut in_out)
        .map_err(|_| KeywardenError::Crypto("failed to decrypt identity".to_string()))?
        .len();

    let mut plaintext = Zeroizing::new(vec![0u8; plaintext_len]);
    plaintext.copy_from_slice(&in_out[..plaintext_len]);
    Ok(plaintext)
}

/// Parse the canonical identity text into an X25519 identity.
pub fn parse_identity(text: &str) -> Result<x25519::Identity, KeywardenError> {
    text.trim()
        .parse::<x25519::Identity>()
        .map_err(|e| KeywardenError::Crypto(format!("malformed identity: {e}")))
}

/// Parse the canonical recipient text into an X25519 recipient.
pub fn parse_recipient(text: &str) -> Result<x25519::Recipient, KeywardenError> {
    text.trim()
        .parse::<x25519::Recipient>()
        .map_err(|e| KeywardenError::InvalidInput(format!("malformed recipient: {e}")))
}

/// Encrypt `plaintext` into an armor-less age stream for `recipients`.
pub fn age_encrypt(
    recipients: &[&x25519::Recipient],
    plaintext: &[u8],
) -> Result<Vec<u8>, KeywardenError> {
    let encryptor =
        age::Encryptor::with_recipients(recipients.iter().map(|r| *r as &dyn age::Recipient))
            .map_err(|e| KeywardenError::Crypto(format!("failed to encrypt data: {e}")))?;

    let mut ciphertext = Vec::new();
    let mut writer = encryptor
        .wrap_output(&mut ciphertext)
        .map_err(|e| KeywardenError::Crypto(format!("failed to encrypt data: {e}")))?;
    writer
        .write_all(plaintext)
        .map_err(|e| KeywardenError::Crypto(format!("failed to encrypt data: {e}")))?;
    writer
        .finish()
        .map_err(|e| KeywardenError::Crypto(format!("failed to encrypt data: {e}")))?;

    Ok(ciphertext)
}

/// Decrypt an age stream with the given identity.
///
/// The returned plaintext wipes itself when dropped; callers move it into
/// a locked buffer immediately.
pub fn age_decrypt(
    identity: &x25519::Identity,
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, KeywardenError> {
    let decryptor = age::Decryptor::new(ciphertext)
        .map_err(|e| KeywardenError::Crypto(format!("failed to decrypt data: {e}")))?;

    let mut reader = decryptor
        .decrypt(std::iter::once(identity as &dyn age::Identity))
        .map_err(|e| KeywardenError::Crypto(format!("failed to decrypt data: {e}")))?;

    let mut plaintext = Zeroizing::new(Vec::new());
    reader
        .read_to_end(&mut plaintext)
        .map_err(|e| KeywardenError::Crypto(format!("failed to decrypt data: {e}")))?;

    Ok(plaintext)
}

fn gcm_key(wrap_key: &[u8]) -> Result<LessSafeKey, KeywardenError> {
    let unbound = UnboundKey::new(&AES_256_GCM, wrap_key)
        .map_err(|_| KeywardenError::Crypto("invalid wrapping key".to_string()))?;
    Ok(LessSafeKey::new(unbound))
}
