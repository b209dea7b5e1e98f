// SPDX-FileCopyrightText: 2026 Keywarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Secret-memory primitives: locked buffers and encrypted-at-rest enclaves.
//!
//! A [`LockedBuffer`] holds plaintext in a heap region that is `mlock`ed so
//! a cooperating OS never swaps it to disk, and is zeroized before the
//! memory is released. An [`Enclave`] keeps a secret encrypted inside the
//! process (AES-256-GCM under an ephemeral process key) until it is
//! explicitly opened into a fresh locked buffer.
//!
//! Every live locked region is tracked in a process-scope registry so that
//! [`purge_all`] can bulk-wipe secrets before an interrupted process exits.

use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

use keywarden_core::KeywardenError;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};
use tracing::warn;
use zeroize::Zeroize;

/// GCM nonce length used by the enclave envelope.
const NONCE_LEN: usize = 12;

static NEXT_REGION_ID: AtomicU64 = AtomicU64::new(1);

/// A raw memory region tracked for emergency wiping. Stored as integers so
/// the registry itself never dereferences anything outside [`purge_all`].
#[derive(Clone, Copy)]
struct Region {
    addr: usize,
    len: usize,
}

fn registry() -> &'static Mutex<HashMap<u64, Region>> {
    static REGISTRY: OnceLock<Mutex<HashMap<u64, Region>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Zeroize every registered locked region.
///
/// Called from the interrupt handler before the process exits. Buffers that
/// are dropped normally afterwards zeroize again, which is harmless. The
/// process must not continue doing vault work after calling this.
pub fn purge_all() {
    let regions = registry().lock().unwrap_or_else(|e| e.into_inner());
    for region in regions.values() {
        // Safety: registered regions stay valid until deregistered in Drop,
        // and the registry lock is held for the duration of the wipe.
        unsafe {
            std::slice::from_raw_parts_mut(region.addr as *mut u8, region.len).zeroize();
        }
    }
}

/// Overwrite a transient byte slice with zeros.
///
/// Used on buffers that briefly held secret material outside a
/// [`LockedBuffer`] (decrypt scratch space, serialized key text).
pub fn wipe(bytes: &mut [u8]) {
    bytes.zeroize();
}

/// A page-locked, zero-on-destroy byte buffer holding plaintext secrets.
///
/// The region is `mlock`ed on creation (best effort: failure is logged and
/// the buffer still works, it just loses the no-swap guarantee). Dropping
/// the buffer zeroizes the bytes, unlocks the pages, and releases the
/// allocation.
pub struct LockedBuffer {
    ptr: NonNull<u8>,
    len: usize,
    page_locked: bool,
    region_id: u64,
}

// The buffer owns its region exclusively; access is by shared reference.
unsafe impl Send for LockedBuffer {}
unsafe impl Sync for LockedBuffer {}

impl LockedBuffer {
    /// Allocate a locked buffer and fill it from `src`, wiping `src`.
    pub fn from_slice(src: &mut [u8]) -> Result<Self, KeywardenError> {
        let buf = Self::alloc(src.len())?;
        // Safety: the fresh region is `src.len()` bytes and disjoint from `src`.
        unsafe {
            std::ptr::copy_nonoverlapping(src.as_ptr(), buf.ptr.as_ptr(), src.len());
        }
        src.zeroize();
        Ok(buf)
    }

    /// Allocate a locked buffer from an owned vector, wiping the vector.
    pub fn from_vec(mut src: Vec<u8>) -> Result<Self, KeywardenError> {
        Self::from_slice(&mut src)
    }

    fn alloc(len: usize) -> Result<Self, KeywardenError> {
        if len == 0 {
            return Err(KeywardenError::InvalidInput(
                "locked buffer must not be empty".to_string(),
            ));
        }

        let raw = Box::into_raw(vec![0u8; len].into_boxed_slice());
        let ptr = NonNull::new(raw as *mut u8)
            .ok_or_else(|| KeywardenError::Internal("allocation returned null".to_string()))?;

        // Safety: the region was just allocated with the given length.
        let rc = unsafe { libc::mlock(ptr.as_ptr().cast(), len) };
        let page_locked = rc == 0;
        if !page_locked {
            let err = std::io::Error::last_os_error();
            warn!(error = %err, "mlock failed; secret memory may be swappable");
        }

        let region_id = NEXT_REGION_ID.fetch_add(1, Ordering::Relaxed);
        registry()
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                region_id,
                Region {
                    addr: ptr.as_ptr() as usize,
                    len,
                },
            );

        Ok(Self {
            ptr,
            len,
            page_locked,
            region_id,
        })
    }

    /// The plaintext bytes.
    pub fn as_bytes(&self) -> &[u8] {
        // Safety: the region is owned by `self` and valid for `self.len`.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Explicitly wipe and release the buffer.
    pub fn destroy(self) {
        drop(self);
    }

    fn deregister(&self) {
        registry()
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.region_id);
    }
}

impl Drop for LockedBuffer {
    fn drop(&mut self) {
        registry()
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.region_id);

        // Safety: the region is still owned here; wipe, unlock, then free
        // with the same layout it was allocated with.
        unsafe {
            std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len).zeroize();
            if self.page_locked {
                libc::munlock(self.ptr.as_ptr().cast(), self.len);
            }
            drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                self.ptr.as_ptr(),
                self.len,
            )));
        }
    }
}

impl std::fmt::Debug for LockedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockedBuffer")
            .field("len", &self.len)
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// The ephemeral key the enclave envelope encrypts under. Generated on
/// first use, lives in a locked region for the remainder of the process.
fn process_key() -> Result<&'static LockedBuffer, KeywardenError> {
    static PROCESS_KEY: OnceLock<LockedBuffer> = OnceLock::new();

    if let Some(key) = PROCESS_KEY.get() {
        return Ok(key);
    }

    let mut raw = [0u8; 32];
    SystemRandom::new()
        .fill(&mut raw)
        .map_err(|_| KeywardenError::Crypto("failed to generate process key".to_string()))?;
    let buf = LockedBuffer::from_slice(&mut raw)?;

    // The process key is not a caller secret: it must survive purge_all so
    // enclaves opened during shutdown still decrypt, so it is not tracked
    // in the purge registry.
    buf.deregister();

    // A racing second initialization is dropped (and wiped) by get_or_init.
    Ok(PROCESS_KEY.get_or_init(|| buf))
}

/// An opaque envelope keeping a secret encrypted at rest inside the process.
///
/// The contents stay AES-256-GCM-sealed under the process key until
/// [`Enclave::open`] produces a fresh [`LockedBuffer`], which the caller
/// must destroy after use.
pub struct Enclave {
    nonce: [u8; NONCE_LEN],
    ciphertext: Vec<u8>,
}

impl Enclave {
    /// Seal a locked buffer into an enclave, consuming (and wiping) it.
    pub fn seal(buf: LockedBuffer) -> Result<Self, KeywardenError> {
        let key = enclave_key()?;

        let mut nonce = [0u8; NONCE_LEN];
        SystemRandom::new()
            .fill(&mut nonce)
            .map_err(|_| KeywardenError::Crypto("failed to generate nonce".to_string()))?;

        let mut in_out = buf.as_bytes().to_vec();
        let result = key.seal_in_place_append_tag(
            Nonce::assume_unique_for_key(nonce),
            Aad::empty(),
            &mut in_out,
        );
        buf.destroy();
        result.map_err(|_| KeywardenError::Crypto("failed to seal enclave".to_string()))?;

        Ok(Self {
            nonce,
            ciphertext: in_out,
        })
    }

    /// Open the enclave into a fresh locked buffer.
    pub fn open(&self) -> Result<LockedBuffer, KeywardenError> {
        let key = enclave_key()?;

        let mut in_out = self.ciphertext.clone();
        let opened = key
            .open_in_place(
                Nonce::assume_unique_for_key(self.nonce),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| KeywardenError::Crypto("failed to open enclave".to_string()))?;

        let buf = LockedBuffer::from_slice(opened)?;
        in_out.zeroize();
        Ok(buf)
    }
}

impl std::fmt::Debug for Enclave {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enclave")
            .field("len", &self.ciphertext.len())
            .finish()
    }
}

fn enclave_key() -> Result<LessSafeKey, KeywardenError> {
    let key = process_key()?;
    let unbound = UnboundKey::new(&AES_256_GCM, key.as_bytes())
        .map_err(|_| KeywardenError::Crypto("failed to create enclave key".to_string()))?;
    Ok(LessSafeKey::new(unbound))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_slice_copies_and_wipes_source() {
        let mut source = *b"super secret";
        let buf = LockedBuffer::from_slice(&mut source).unwrap();

        assert_eq!(buf.as_bytes(), b"super secret");
        assert_eq!(source, [0u8; 12]);
    }

    #[test]
    fn empty_buffer_is_rejected() {
        let result = LockedBuffer::from_vec(Vec::new());
        assert!(result.is_err());
    }

    #[test]
    fn enclave_round_trip() {
        let buf = LockedBuffer::from_vec(b"enclave payload".to_vec()).unwrap();
        let enclave = Enclave::seal(buf).unwrap();

        let opened = enclave.open().unwrap();
        assert_eq!(opened.as_bytes(), b"enclave payload");
        opened.destroy();

        // Opening twice yields independent buffers.
        let again = enclave.open().unwrap();
        assert_eq!(again.as_bytes(), b"enclave payload");
    }

    #[test]
    fn enclave_ciphertext_differs_from_plaintext() {
        let buf = LockedBuffer::from_vec(b"visible?".to_vec()).unwrap();
        let enclave = Enclave::seal(buf).unwrap();
        assert_ne!(&enclave.ciphertext[..], b"visible?");
    }

    #[test]
    fn debug_output_redacts_contents() {
        let buf = LockedBuffer::from_vec(b"hidden".to_vec()).unwrap();
        let debug = format!("{buf:?}");
        assert!(!debug.contains("hidden"));
        assert!(debug.contains("REDACTED"));
    }
}
