use crate::error::*;
use crate::provider::PrimitiveState;

const BLAKE2B_OUTPUT_LEN: usize = 32;

/// Maximum key length accepted by keyed BLAKE2b.
pub const BLAKE2B_MAX_KEY_LEN: usize = blake2b_simd::KEYBYTES;

/// BLAKE2b with a 256-bit output, either plain or keyed.
pub struct Blake2bState(blake2b_simd::State);

impl Blake2bState {
    pub fn new() -> Self {
        Blake2bState(
            blake2b_simd::Params::new()
                .hash_length(BLAKE2B_OUTPUT_LEN)
                .to_state(),
        )
    }

    pub fn keyed(key: &[u8]) -> Result<Self, Error> {
        ensure!(
            key.len() <= BLAKE2B_MAX_KEY_LEN,
            DigestError::InvalidKey(format!(
                "BLAKE2b keys are limited to {} bytes",
                BLAKE2B_MAX_KEY_LEN
            ))
        );
        Ok(Blake2bState(
            blake2b_simd::Params::new()
                .hash_length(BLAKE2B_OUTPUT_LEN)
                .key(key)
                .to_state(),
        ))
    }
}

impl Default for Blake2bState {
    fn default() -> Self {
        Self::new()
    }
}

impl PrimitiveState for Blake2bState {
    fn update(&mut self, data: &[u8]) -> Result<(), Error> {
        self.0.update(data);
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<Vec<u8>, Error> {
        Ok(self.0.finalize().as_bytes().to_vec())
    }
}
