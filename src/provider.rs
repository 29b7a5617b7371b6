use tracing::trace;

use crate::algorithms::*;
use crate::error::*;

/// An in-progress computation owned by the underlying cryptographic library.
pub trait PrimitiveState: Send {
    /// Absorb more input.
    fn update(&mut self, data: &[u8]) -> Result<(), Error>;

    /// Consume the state and produce the full-length output.
    fn finalize(self: Box<Self>) -> Result<Vec<u8>, Error>;
}

/// The cryptographic library the engine forwards computations to.
///
/// Implementations may fail to allocate a state (for example when a hardware module is out of
/// sessions); those failures are reported to callers as `EngineInitFailure`.
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;

    fn digest_state(&self, algorithm: AlgorithmId) -> Result<Box<dyn PrimitiveState>, Error>;

    fn mac_state(
        &self,
        algorithm: AlgorithmId,
        key: &[u8],
    ) -> Result<Box<dyn PrimitiveState>, Error>;
}

/// Pure software provider backed by the `hmac-sha*` and `blake2b_simd` crates.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareProvider;

impl Provider for SoftwareProvider {
    fn name(&self) -> &'static str {
        "software"
    }

    fn digest_state(&self, algorithm: AlgorithmId) -> Result<Box<dyn PrimitiveState>, Error> {
        trace!(provider = self.name(), %algorithm, "allocating digest state");
        let state: Box<dyn PrimitiveState> = match algorithm {
            AlgorithmId::Sha1 => Box::new(Sha1State::new()),
            AlgorithmId::Sha256 => Box::new(Sha256State::new()),
            AlgorithmId::Sha384 => Box::new(Sha384State::new()),
            AlgorithmId::Sha512 => Box::new(Sha512State::new()),
            AlgorithmId::Blake2b256 => Box::new(Blake2bState::new()),
            mac => bail!(DigestError::UnsupportedAlgorithm(mac.name().to_string())),
        };
        Ok(state)
    }

    fn mac_state(
        &self,
        algorithm: AlgorithmId,
        key: &[u8],
    ) -> Result<Box<dyn PrimitiveState>, Error> {
        trace!(provider = self.name(), %algorithm, "allocating MAC state");
        let state: Box<dyn PrimitiveState> = match algorithm {
            AlgorithmId::HmacSha1 => Box::new(HmacSha1State::new(key)),
            AlgorithmId::HmacSha256 => Box::new(HmacSha256State::new(key)),
            AlgorithmId::HmacSha384 => Box::new(HmacSha384State::new(key)),
            AlgorithmId::HmacSha512 => Box::new(HmacSha512State::new(key)),
            AlgorithmId::Blake2bMac256 => Box::new(Blake2bState::keyed(key)?),
            digest => bail!(DigestError::UnsupportedAlgorithm(digest.name().to_string())),
        };
        Ok(state)
    }
}
