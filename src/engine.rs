use tracing::{debug, warn};

use crate::algorithms::AlgorithmId;
use crate::common::EngineOptions;
use crate::context::{BoundKey, StreamingContext};
use crate::error::*;
use crate::key::{KeyHandle, KeyMaterial, KeyStore};
use crate::provider::{Provider, SoftwareProvider};

/// Creates streaming contexts for plain digests and MAC mechanisms.
#[derive(Debug, Clone, Default)]
pub struct DigestEngine<P: Provider = SoftwareProvider> {
    provider: P,
    options: EngineOptions,
}

impl DigestEngine<SoftwareProvider> {
    /// An engine backed by the software provider, with default options.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: EngineOptions) -> Result<Self, Error> {
        Self::with_provider(SoftwareProvider, options)
    }
}

impl<P: Provider> DigestEngine<P> {
    pub fn with_provider(provider: P, options: EngineOptions) -> Result<Self, Error> {
        options.validate()?;
        Ok(DigestEngine { provider, options })
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn check_permitted(&self, algorithm: AlgorithmId) -> Result<(), Error> {
        ensure!(
            self.options.permits(algorithm),
            DigestError::UnsupportedAlgorithm(format!("{} (disabled)", algorithm))
        );
        Ok(())
    }

    /// Create an unkeyed context for a digest algorithm.
    pub fn create_digest(&self, algorithm: AlgorithmId) -> Result<StreamingContext, Error> {
        ensure!(
            algorithm.is_digest(),
            DigestError::UnsupportedAlgorithm(format!("{} is not a digest", algorithm))
        );
        self.check_permitted(algorithm)?;
        let primitive = self
            .provider
            .digest_state(algorithm)
            .map_err(init_failure)?;
        debug!(%algorithm, provider = self.provider.name(), "digest context created");
        Ok(StreamingContext::new(algorithm, primitive, None))
    }

    /// Create a digest context from an algorithm name.
    pub fn create_digest_by_name(&self, name: &str) -> Result<StreamingContext, Error> {
        self.create_digest(AlgorithmId::lookup(name)?)
    }

    /// Create a MAC context keyed with `key`.
    ///
    /// The context is bound to a signing copy of the key obtained from `store`. If the store
    /// cannot produce one, the original key is bound instead, unless
    /// [`EngineOptions::allow_key_fallback`] is disabled. A signing copy made for a context that
    /// then fails to initialize is released before returning.
    pub fn create_hmac<S: KeyStore + ?Sized>(
        &self,
        algorithm: AlgorithmId,
        key: &KeyMaterial,
        store: &S,
    ) -> Result<StreamingContext, Error> {
        ensure!(
            algorithm.is_mac(),
            DigestError::UnsupportedAlgorithm(format!("{} is not a MAC mechanism", algorithm))
        );
        self.check_permitted(algorithm)?;
        ensure!(store.is_live(key), DigestError::InvalidKeyHandle);
        ensure!(
            key.len() >= self.options.min_hmac_key_len,
            DigestError::InvalidKey(format!(
                "key is {} bytes, at least {} required",
                key.len(),
                self.options.min_hmac_key_len
            ))
        );
        let bound = match store.copy_for_signing(key, algorithm) {
            Some(copy) => BoundKey::Restricted(copy),
            None if self.options.allow_key_fallback => {
                warn!(%algorithm, "no signing copy of the key available, using the original key");
                BoundKey::Original(key.clone())
            }
            None => bail!(DigestError::EngineInitFailure(
                "no signing copy of the key available".to_string()
            )),
        };
        let primitive = match self.provider.mac_state(algorithm, bound.material().as_ref()) {
            Ok(primitive) => primitive,
            Err(e) => {
                drop(bound);
                return Err(init_failure(e));
            }
        };
        debug!(%algorithm, provider = self.provider.name(), "MAC context created");
        Ok(StreamingContext::new(algorithm, primitive, Some(bound)))
    }

    /// Resolve `handle` through `store` and create a MAC context keyed with it.
    pub fn create_hmac_from_handle<S: KeyStore + ?Sized>(
        &self,
        algorithm: AlgorithmId,
        handle: KeyHandle,
        store: &S,
    ) -> Result<StreamingContext, Error> {
        let key = store.resolve(handle)?;
        self.create_hmac(algorithm, &key, store)
    }

    /// Compute the digest of `data` in one call.
    pub fn digest(&self, algorithm: AlgorithmId, data: impl AsRef<[u8]>) -> Result<Vec<u8>, Error> {
        let mut ctx = self.create_digest(algorithm)?;
        ctx.absorb(data)?;
        ctx.finalize(algorithm.output_len())
    }

    /// Compute the MAC of `data` in one call.
    pub fn hmac<S: KeyStore + ?Sized>(
        &self,
        algorithm: AlgorithmId,
        key: &KeyMaterial,
        store: &S,
        data: impl AsRef<[u8]>,
    ) -> Result<Vec<u8>, Error> {
        let mut ctx = self.create_hmac(algorithm, key, store)?;
        ctx.absorb(data)?;
        ctx.finalize(algorithm.output_len())
    }
}

fn init_failure(e: Error) -> Error {
    match e.downcast::<DigestError>() {
        Ok(e @ DigestError::EngineInitFailure(_))
        | Ok(e @ DigestError::UnsupportedAlgorithm(_))
        | Ok(e @ DigestError::InvalidKey(_)) => e.into(),
        Ok(e) => DigestError::EngineInitFailure(e.to_string()).into(),
        Err(e) => DigestError::EngineInitFailure(e.to_string()).into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextState;
    use crate::key::{DirectKeys, MemoryKeyStore};

    #[test]
    fn digest_rejects_mac_mechanisms() {
        let engine = DigestEngine::new();
        let e = engine.create_digest(AlgorithmId::HmacSha256).err().unwrap();
        assert!(matches!(
            digest_error(&e),
            Some(DigestError::UnsupportedAlgorithm(_))
        ));
        assert!(engine.create_digest_by_name("MD5").is_err());
        assert!(engine.create_digest_by_name("sha-512").is_ok());
    }

    #[test]
    fn hmac_rejects_digest_algorithms() {
        let engine = DigestEngine::new();
        let key = KeyMaterial::from_bytes(b"key");
        let e = engine
            .create_hmac(AlgorithmId::Sha256, &key, &DirectKeys)
            .err()
            .unwrap();
        assert!(matches!(
            digest_error(&e),
            Some(DigestError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn allow_list_is_enforced() {
        let options = EngineOptions::from_json(r#"{ "allowed_algorithms": ["SHA-256"] }"#).unwrap();
        let engine = DigestEngine::with_options(options).unwrap();
        assert!(engine.create_digest(AlgorithmId::Sha256).is_ok());
        let e = engine.create_digest(AlgorithmId::Sha1).err().unwrap();
        assert!(matches!(
            digest_error(&e),
            Some(DigestError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn restricted_copy_is_bound_when_available() {
        let engine = DigestEngine::new();
        let store = MemoryKeyStore::new();
        let handle = store.insert(b"0123456789abcdef");
        let mut ctx = engine
            .create_hmac_from_handle(AlgorithmId::HmacSha256, handle, &store)
            .unwrap();
        assert!(ctx.is_keyed());
        assert!(ctx.uses_restricted_key());
        assert_eq!(store.outstanding_copies(), 1);
        ctx.absorb(b"data").unwrap();
        ctx.finalize(32).unwrap();
        assert!(!ctx.is_keyed());
        assert_eq!(store.outstanding_copies(), 0);
    }

    #[test]
    fn fallback_binds_original_key_without_releasing_it() {
        let engine = DigestEngine::new();
        let store = MemoryKeyStore::new();
        let key = store
            .resolve(store.insert_hardware_backed(b"0123456789abcdef"))
            .unwrap();
        let references = key.reference_count();
        let mut ctx = engine
            .create_hmac(AlgorithmId::HmacSha256, &key, &store)
            .unwrap();
        assert!(ctx.is_keyed());
        assert!(!ctx.uses_restricted_key());
        ctx.discard();
        assert_eq!(key.reference_count(), references);
        assert!(store.is_live(&key));
    }

    #[test]
    fn fallback_can_be_disabled() {
        let options = EngineOptions {
            allow_key_fallback: false,
            ..Default::default()
        };
        let engine = DigestEngine::with_options(options).unwrap();
        let store = MemoryKeyStore::new();
        let handle = store.insert_hardware_backed(b"0123456789abcdef");
        let e = engine
            .create_hmac_from_handle(AlgorithmId::HmacSha256, handle, &store)
            .err()
            .unwrap();
        assert!(matches!(
            digest_error(&e),
            Some(DigestError::EngineInitFailure(_))
        ));
    }

    #[test]
    fn dead_keys_are_invalid_handles() {
        let engine = DigestEngine::new();
        let store = MemoryKeyStore::new();
        let handle = store.insert(b"0123456789abcdef");
        let key = store.resolve(handle).unwrap();
        store.remove(handle);

        let e = engine
            .create_hmac(AlgorithmId::HmacSha256, &key, &store)
            .err()
            .unwrap();
        assert!(matches!(
            digest_error(&e),
            Some(DigestError::InvalidKeyHandle)
        ));
        let e = engine
            .create_hmac_from_handle(AlgorithmId::HmacSha256, handle, &store)
            .err()
            .unwrap();
        assert!(matches!(
            digest_error(&e),
            Some(DigestError::InvalidKeyHandle)
        ));
        let empty = KeyMaterial::from_bytes(b"");
        assert!(engine
            .create_hmac(AlgorithmId::HmacSha256, &empty, &DirectKeys)
            .is_err());
    }

    #[test]
    fn short_keys_can_be_refused() {
        let options = EngineOptions {
            min_hmac_key_len: 12,
            ..Default::default()
        };
        let engine = DigestEngine::with_options(options).unwrap();
        let key = KeyMaterial::from_bytes(b"short");
        let e = engine
            .create_hmac(AlgorithmId::HmacSha512, &key, &DirectKeys)
            .err()
            .unwrap();
        assert!(matches!(digest_error(&e), Some(DigestError::InvalidKey(_))));
        assert!(digest_error(&e).unwrap().is_misuse());
    }

    #[test]
    fn blake2b_mac_rejects_long_keys_without_leaking_the_copy() {
        let engine = DigestEngine::new();
        let store = MemoryKeyStore::new();
        let handle = store.insert(&[7u8; 65]);
        let e = engine
            .create_hmac_from_handle(AlgorithmId::Blake2bMac256, handle, &store)
            .err()
            .unwrap();
        assert!(matches!(digest_error(&e), Some(DigestError::InvalidKey(_))));
        assert!(digest_error(&e).unwrap().is_misuse());
        assert_eq!(store.outstanding_copies(), 0);
    }

    #[test]
    fn one_shot_helpers_match_streaming() {
        let engine = DigestEngine::new();
        let mut ctx = engine.create_digest(AlgorithmId::Sha384).unwrap();
        ctx.absorb(b"hello ").unwrap();
        ctx.absorb(b"world").unwrap();
        assert_eq!(ctx.state(), ContextState::Updating);
        assert_eq!(
            ctx.finalize(48).unwrap(),
            engine.digest(AlgorithmId::Sha384, b"hello world").unwrap()
        );
    }
}
