use zeroize::Zeroize;

use super::AlgorithmId;
use crate::error::*;
use crate::provider::PrimitiveState;

/// SHA-1, kept for interoperability with legacy peers.
pub struct Sha1State(hmac_sha1_compact::Hash);

impl Sha1State {
    pub fn new() -> Self {
        Sha1State(hmac_sha1_compact::Hash::new())
    }
}

impl Default for Sha1State {
    fn default() -> Self {
        Self::new()
    }
}

impl PrimitiveState for Sha1State {
    fn update(&mut self, data: &[u8]) -> Result<(), Error> {
        self.0.update(data);
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<Vec<u8>, Error> {
        Ok(self.0.finalize().to_vec())
    }
}

/// Streaming HMAC-SHA1 (RFC 2104) over two SHA-1 states.
///
/// The outer state absorbs the opad-masked key up front, so the padded key is not kept around.
pub struct HmacSha1State {
    inner: hmac_sha1_compact::Hash,
    outer: hmac_sha1_compact::Hash,
}

impl HmacSha1State {
    pub fn new(key: &[u8]) -> Self {
        let block_len = AlgorithmId::HmacSha1.block_len();
        let mut padded = vec![0u8; block_len];
        if key.len() > block_len {
            let mut hashed_key = hmac_sha1_compact::Hash::hash(key);
            padded[..hashed_key.len()].copy_from_slice(&hashed_key);
            hashed_key.zeroize();
        } else {
            padded[..key.len()].copy_from_slice(key);
        }

        for b in padded.iter_mut() {
            *b ^= 0x36;
        }
        let mut inner = hmac_sha1_compact::Hash::new();
        inner.update(&padded);

        for b in padded.iter_mut() {
            *b ^= 0x36 ^ 0x5c;
        }
        let mut outer = hmac_sha1_compact::Hash::new();
        outer.update(&padded);

        padded.zeroize();
        HmacSha1State { inner, outer }
    }
}

impl PrimitiveState for HmacSha1State {
    fn update(&mut self, data: &[u8]) -> Result<(), Error> {
        self.inner.update(data);
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<Vec<u8>, Error> {
        let HmacSha1State { inner, mut outer } = *self;
        outer.update(inner.finalize());
        Ok(outer.finalize().to_vec())
    }
}
