use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rand::RngCore;
use tracing::debug;
use zeroize::Zeroize;

use crate::algorithms::AlgorithmId;
use crate::error::*;

/// Operations a key may be used for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum KeyUsage {
    /// No restriction.
    Any,
    /// Restricted to MAC computation and signing.
    Signing,
}

/// Opaque identifier of a key held by a [`KeyStore`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyHandle(pub u64);

struct KeyInner {
    raw_key: Vec<u8>,
    usage: KeyUsage,
}

impl Drop for KeyInner {
    fn drop(&mut self) {
        self.raw_key.zeroize();
    }
}

/// Symmetric key material.
///
/// Clones share the same underlying secret; the bytes are wiped when the last clone is dropped.
#[derive(Clone)]
pub struct KeyMaterial {
    inner: Arc<KeyInner>,
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("len", &self.len())
            .field("usage", &self.usage())
            .finish()
    }
}

impl KeyMaterial {
    /// Create a key from a byte slice.
    pub fn from_bytes(raw_key: &[u8]) -> Self {
        Self::with_usage(raw_key, KeyUsage::Any)
    }

    /// Create a key from a byte slice, with an explicit usage attribute.
    pub fn with_usage(raw_key: &[u8], usage: KeyUsage) -> Self {
        KeyMaterial {
            inner: Arc::new(KeyInner {
                raw_key: raw_key.to_vec(),
                usage,
            }),
        }
    }

    /// Generate a random key of `len` bytes.
    pub fn generate(len: usize) -> Self {
        let mut raw_key = vec![0u8; len];
        rand::thread_rng().fill_bytes(&mut raw_key);
        let key = Self::from_bytes(&raw_key);
        raw_key.zeroize();
        key
    }

    /// Derive an independent copy of this key whose usage is restricted to signing.
    pub fn signing_copy(&self) -> Self {
        Self::with_usage(&self.inner.raw_key, KeyUsage::Signing)
    }

    pub fn usage(&self) -> KeyUsage {
        self.inner.usage
    }

    pub fn len(&self) -> usize {
        self.inner.raw_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.raw_key.is_empty()
    }

    /// Returns `true` if both values refer to the same underlying secret.
    pub fn same_material(&self, other: &KeyMaterial) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of live references to the underlying secret.
    pub fn reference_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    fn downgrade(&self) -> Weak<KeyInner> {
        Arc::downgrade(&self.inner)
    }
}

impl AsRef<[u8]> for KeyMaterial {
    /// Get the raw key, as a byte slice
    fn as_ref(&self) -> &[u8] {
        &self.inner.raw_key
    }
}

/// Source of key material for MAC contexts.
pub trait KeyStore {
    /// Resolve a handle to the key it names.
    fn resolve(&self, handle: KeyHandle) -> Result<KeyMaterial, Error>;

    /// Produce a copy of `key` restricted to signing with `mechanism`.
    ///
    /// `None` is not an error: some stores (hardware-backed ones in particular) cannot export a
    /// derived key, and the original key is then used directly.
    fn copy_for_signing(&self, key: &KeyMaterial, mechanism: AlgorithmId) -> Option<KeyMaterial>;

    /// Whether `key` is still live material that may be bound to a context.
    fn is_live(&self, key: &KeyMaterial) -> bool {
        !key.is_empty()
    }
}

/// Key store for keys created directly by the application.
///
/// It has no handles; restricted copies are always available.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectKeys;

impl KeyStore for DirectKeys {
    fn resolve(&self, _handle: KeyHandle) -> Result<KeyMaterial, Error> {
        bail!(DigestError::InvalidKeyHandle)
    }

    fn copy_for_signing(&self, key: &KeyMaterial, _mechanism: AlgorithmId) -> Option<KeyMaterial> {
        Some(key.signing_copy())
    }
}

struct StoredKey {
    key: KeyMaterial,
    hardware_backed: bool,
}

#[derive(Default)]
struct StoreInner {
    next_handle: u64,
    keys: HashMap<KeyHandle, StoredKey>,
    issued_copies: Vec<Weak<KeyInner>>,
}

impl StoreInner {
    fn find(&self, key: &KeyMaterial) -> Option<&StoredKey> {
        self.keys
            .values()
            .find(|stored| stored.key.same_material(key))
    }
}

/// In-memory key store.
///
/// Keys inserted with [`MemoryKeyStore::insert_hardware_backed`] behave like keys living on a
/// hardware module: they can be used, but no signing copy can be derived from them.
#[derive(Default)]
pub struct MemoryKeyStore {
    inner: Mutex<StoreInner>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, raw_key: &[u8]) -> KeyHandle {
        self.insert_key(KeyMaterial::from_bytes(raw_key), false)
    }

    pub fn insert_hardware_backed(&self, raw_key: &[u8]) -> KeyHandle {
        self.insert_key(KeyMaterial::from_bytes(raw_key), true)
    }

    fn insert_key(&self, key: KeyMaterial, hardware_backed: bool) -> KeyHandle {
        let mut inner = self.inner.lock();
        inner.next_handle += 1;
        let handle = KeyHandle(inner.next_handle);
        inner.keys.insert(
            handle,
            StoredKey {
                key,
                hardware_backed,
            },
        );
        handle
    }

    /// Revoke a key. Contexts already bound to it keep working until they are retired.
    pub fn remove(&self, handle: KeyHandle) -> bool {
        self.inner.lock().keys.remove(&handle).is_some()
    }

    /// Number of signing copies handed out by this store that are still alive.
    pub fn outstanding_copies(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.issued_copies.retain(|copy| copy.strong_count() > 0);
        inner.issued_copies.len()
    }
}

impl KeyStore for MemoryKeyStore {
    fn resolve(&self, handle: KeyHandle) -> Result<KeyMaterial, Error> {
        match self.inner.lock().keys.get(&handle) {
            Some(stored) => Ok(stored.key.clone()),
            None => bail!(DigestError::InvalidKeyHandle),
        }
    }

    fn copy_for_signing(&self, key: &KeyMaterial, mechanism: AlgorithmId) -> Option<KeyMaterial> {
        let mut inner = self.inner.lock();
        match inner.find(key) {
            Some(stored) if !stored.hardware_backed => {}
            _ => {
                debug!(%mechanism, "key store cannot derive a signing copy");
                return None;
            }
        }
        let copy = key.signing_copy();
        inner.issued_copies.retain(|issued| issued.strong_count() > 0);
        inner.issued_copies.push(copy.downgrade());
        Some(copy)
    }

    fn is_live(&self, key: &KeyMaterial) -> bool {
        !key.is_empty() && self.inner.lock().find(key).is_some()
    }
}
