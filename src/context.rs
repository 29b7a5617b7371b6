use std::fmt;

use tracing::{debug, trace};
use zeroize::Zeroize;

use crate::algorithms::AlgorithmId;
use crate::error::*;
use crate::key::KeyMaterial;
use crate::provider::PrimitiveState;

/// Lifecycle of a [`StreamingContext`]. Transitions only move forward.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ContextState {
    Idle,
    Updating,
    Finalized,
}

/// Key bound to a MAC context.
pub(crate) enum BoundKey {
    /// Signing copy owned by the context, released with it.
    Restricted(KeyMaterial),
    /// The caller's key, used directly because no signing copy could be derived.
    Original(KeyMaterial),
}

impl BoundKey {
    pub(crate) fn material(&self) -> &KeyMaterial {
        match self {
            BoundKey::Restricted(key) | BoundKey::Original(key) => key,
        }
    }
}

/// A single digest or MAC computation, from creation to its one and only finalization.
///
/// Contexts are created by [`crate::engine::DigestEngine`]. They are not shared: every
/// operation takes `&mut self`. Dropping a context without finalizing it releases everything
/// it holds, like [`StreamingContext::discard`].
pub struct StreamingContext {
    algorithm: AlgorithmId,
    state: ContextState,
    primitive: Option<Box<dyn PrimitiveState>>,
    key: Option<BoundKey>,
    bytes_processed: u64,
}

impl fmt::Debug for StreamingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingContext")
            .field("algorithm", &self.algorithm)
            .field("state", &self.state)
            .field("keyed", &self.is_keyed())
            .field("bytes_processed", &self.bytes_processed)
            .finish()
    }
}

impl StreamingContext {
    pub(crate) fn new(
        algorithm: AlgorithmId,
        primitive: Box<dyn PrimitiveState>,
        key: Option<BoundKey>,
    ) -> Self {
        StreamingContext {
            algorithm,
            state: ContextState::Idle,
            primitive: Some(primitive),
            key,
            bytes_processed: 0,
        }
    }

    pub fn algorithm(&self) -> AlgorithmId {
        self.algorithm
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn output_len(&self) -> usize {
        self.algorithm.output_len()
    }

    /// Total number of bytes absorbed so far.
    pub fn bytes_processed(&self) -> u64 {
        self.bytes_processed
    }

    /// Whether a key is currently bound. Always `false` once the context is retired.
    pub fn is_keyed(&self) -> bool {
        self.key.is_some()
    }

    /// Whether the bound key is a signing copy owned by this context.
    pub fn uses_restricted_key(&self) -> bool {
        matches!(self.key, Some(BoundKey::Restricted(_)))
    }

    /// Feed `length` bytes of `data`, starting at `offset`.
    ///
    /// The range is validated before anything is read; an invalid range leaves the context
    /// untouched. A primitive failure retires the context.
    pub fn update(&mut self, data: &[u8], offset: usize, length: usize) -> Result<(), Error> {
        let primitive = match self.primitive.as_mut() {
            Some(primitive) => primitive,
            None => bail!(DigestError::ContextFinalized("update")),
        };
        let end = checked_range("update", data.len(), offset, length)?;
        if length == 0 {
            self.state = ContextState::Updating;
            return Ok(());
        }
        if let Err(e) = primitive.update(&data[offset..end]) {
            self.release();
            return Err(computation_failure(e));
        }
        trace!(algorithm = %self.algorithm, length, "absorbed");
        self.bytes_processed += length as u64;
        self.state = ContextState::Updating;
        Ok(())
    }

    /// Feed the whole of `data`.
    pub fn absorb(&mut self, data: impl AsRef<[u8]>) -> Result<(), Error> {
        let data = data.as_ref();
        self.update(data, 0, data.len())
    }

    /// Produce the digest of everything absorbed and retire the context.
    ///
    /// `output_capacity` is the room the caller has for the result; it must be at least
    /// [`StreamingContext::output_len`]. The context is retired whether or not this succeeds.
    pub fn finalize(&mut self, output_capacity: usize) -> Result<Vec<u8>, Error> {
        let primitive = self.retire("finalize")?;
        let required = self.algorithm.output_len();
        ensure!(
            output_capacity >= required,
            DigestError::InsufficientOutputCapacity {
                required,
                capacity: output_capacity,
            }
        );
        let output = primitive.finalize().map_err(computation_failure)?;
        if output.len() != required {
            bail!(DigestError::ComputationFailure(format!(
                "{} produced {} bytes, expected {}",
                self.algorithm,
                output.len(),
                required
            )));
        }
        debug!(algorithm = %self.algorithm, bytes = self.bytes_processed, "finalized");
        Ok(output)
    }

    /// Finalize into `out[offset..offset + length]` and return the number of bytes written.
    pub fn finalize_into(
        &mut self,
        out: &mut [u8],
        offset: usize,
        length: usize,
    ) -> Result<usize, Error> {
        if self.primitive.is_none() {
            bail!(DigestError::ContextFinalized("finalize"));
        }
        if let Err(e) = checked_range("finalize", out.len(), offset, length) {
            self.release();
            return Err(e);
        }
        let mut output = self.finalize(length)?;
        out[offset..offset + output.len()].copy_from_slice(&output);
        let written = output.len();
        output.zeroize();
        Ok(written)
    }

    /// Finalize and compare the result with `expected` in constant time.
    pub fn finalize_verify(&mut self, expected: &[u8]) -> Result<(), Error> {
        let output = self.finalize(self.output_len())?;
        ensure!(
            expected.len() == output.len() && ct_codecs::verify(&output, expected),
            DigestError::VerificationFailed
        );
        Ok(())
    }

    /// Retire the context without producing any output. Idempotent.
    pub fn discard(&mut self) {
        if self.primitive.is_some() {
            debug!(algorithm = %self.algorithm, "discarded");
        }
        self.release();
    }

    fn retire(&mut self, operation: &'static str) -> Result<Box<dyn PrimitiveState>, Error> {
        let primitive = match self.primitive.take() {
            Some(primitive) => primitive,
            None => bail!(DigestError::ContextFinalized(operation)),
        };
        self.release();
        Ok(primitive)
    }

    fn release(&mut self) {
        self.primitive = None;
        self.key = None;
        self.state = ContextState::Finalized;
    }
}

impl Drop for StreamingContext {
    fn drop(&mut self) {
        self.discard();
    }
}

fn checked_range(
    operation: &'static str,
    available: usize,
    offset: usize,
    length: usize,
) -> Result<usize, Error> {
    match offset.checked_add(length) {
        Some(end) if end <= available => Ok(end),
        _ => bail!(DigestError::InvalidRange {
            operation,
            offset,
            length,
            available,
        }),
    }
}

fn computation_failure(e: Error) -> Error {
    match e.downcast::<DigestError>() {
        Ok(e @ DigestError::ComputationFailure(_)) => e.into(),
        Ok(e) => DigestError::ComputationFailure(e.to_string()).into(),
        Err(e) => DigestError::ComputationFailure(e.to_string()).into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::Sha256State;

    fn sha256_context() -> StreamingContext {
        StreamingContext::new(AlgorithmId::Sha256, Box::new(Sha256State::new()), None)
    }

    #[test]
    fn state_moves_forward() {
        let mut ctx = sha256_context();
        assert_eq!(ctx.state(), ContextState::Idle);
        ctx.update(b"", 0, 0).unwrap();
        assert_eq!(ctx.state(), ContextState::Updating);
        ctx.absorb(b"abc").unwrap();
        assert_eq!(ctx.bytes_processed(), 3);
        ctx.finalize(32).unwrap();
        assert_eq!(ctx.state(), ContextState::Finalized);
    }

    #[test]
    fn offset_and_length_select_the_input() {
        let mut ctx = sha256_context();
        ctx.update(b"xxabcxx", 2, 3).unwrap();
        let mut reference = sha256_context();
        reference.absorb(b"abc").unwrap();
        assert_eq!(ctx.finalize(32).unwrap(), reference.finalize(32).unwrap());
    }

    #[test]
    fn overflowing_range_is_rejected() {
        let mut ctx = sha256_context();
        let e = ctx.update(b"abc", usize::MAX, 2).unwrap_err();
        assert!(matches!(
            digest_error(&e),
            Some(DigestError::InvalidRange { .. })
        ));
        assert_eq!(ctx.state(), ContextState::Idle);
    }

    #[test]
    fn finalize_into_writes_at_offset() {
        let mut ctx = sha256_context();
        ctx.absorb(b"abc").unwrap();
        let mut out = [0xffu8; 40];
        let written = ctx.finalize_into(&mut out, 4, 36).unwrap();
        assert_eq!(written, 32);
        assert_eq!(&out[..4], &[0xff; 4]);
        assert_eq!(&out[36..], &[0xff; 4]);
        assert_eq!(&out[4..8], &[0xba, 0x78, 0x16, 0xbf]);
    }

    #[test]
    fn finalize_into_rejects_bad_range_and_retires() {
        let mut ctx = sha256_context();
        let mut out = [0u8; 32];
        let e = ctx.finalize_into(&mut out, 8, 32).unwrap_err();
        assert!(matches!(
            digest_error(&e),
            Some(DigestError::InvalidRange {
                operation: "finalize",
                ..
            })
        ));
        let e = ctx.finalize(32).unwrap_err();
        assert!(matches!(
            digest_error(&e),
            Some(DigestError::ContextFinalized("finalize"))
        ));
    }

    #[test]
    fn discard_is_idempotent() {
        let mut ctx = sha256_context();
        ctx.discard();
        ctx.discard();
        assert_eq!(ctx.state(), ContextState::Finalized);
        assert!(ctx.absorb(b"abc").is_err());
    }

    #[test]
    fn verify_compares_tags() {
        let mut ctx = sha256_context();
        ctx.absorb(b"abc").unwrap();
        let expected = ctx.finalize(32).unwrap();

        let mut ctx = sha256_context();
        ctx.absorb(b"abc").unwrap();
        ctx.finalize_verify(&expected).unwrap();

        let mut ctx = sha256_context();
        ctx.absorb(b"abd").unwrap();
        let e = ctx.finalize_verify(&expected).unwrap_err();
        assert!(matches!(
            digest_error(&e),
            Some(DigestError::VerificationFailed)
        ));

        let mut ctx = sha256_context();
        assert!(ctx.finalize_verify(&expected[..16]).is_err());
    }
}
