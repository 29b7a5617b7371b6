use hmac_sha512::sha384 as hmac_sha384;

use crate::error::*;
use crate::provider::PrimitiveState;

pub struct Sha256State(hmac_sha256::Hash);

impl Sha256State {
    pub fn new() -> Self {
        Sha256State(hmac_sha256::Hash::new())
    }
}

impl Default for Sha256State {
    fn default() -> Self {
        Self::new()
    }
}

impl PrimitiveState for Sha256State {
    fn update(&mut self, data: &[u8]) -> Result<(), Error> {
        self.0.update(data);
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<Vec<u8>, Error> {
        Ok(self.0.finalize().to_vec())
    }
}

pub struct Sha384State(hmac_sha384::Hash);

impl Sha384State {
    pub fn new() -> Self {
        Sha384State(hmac_sha384::Hash::new())
    }
}

impl Default for Sha384State {
    fn default() -> Self {
        Self::new()
    }
}

impl PrimitiveState for Sha384State {
    fn update(&mut self, data: &[u8]) -> Result<(), Error> {
        self.0.update(data);
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<Vec<u8>, Error> {
        Ok(self.0.finalize().to_vec())
    }
}

pub struct Sha512State(hmac_sha512::Hash);

impl Sha512State {
    pub fn new() -> Self {
        Sha512State(hmac_sha512::Hash::new())
    }
}

impl Default for Sha512State {
    fn default() -> Self {
        Self::new()
    }
}

impl PrimitiveState for Sha512State {
    fn update(&mut self, data: &[u8]) -> Result<(), Error> {
        self.0.update(data);
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<Vec<u8>, Error> {
        Ok(self.0.finalize().to_vec())
    }
}

//

pub struct HmacSha256State(hmac_sha256::HMAC);

impl HmacSha256State {
    pub fn new(key: &[u8]) -> Self {
        HmacSha256State(hmac_sha256::HMAC::new(key))
    }
}

impl PrimitiveState for HmacSha256State {
    fn update(&mut self, data: &[u8]) -> Result<(), Error> {
        self.0.update(data);
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<Vec<u8>, Error> {
        Ok(self.0.finalize().to_vec())
    }
}

pub struct HmacSha384State(hmac_sha384::HMAC);

impl HmacSha384State {
    pub fn new(key: &[u8]) -> Self {
        HmacSha384State(hmac_sha384::HMAC::new(key))
    }
}

impl PrimitiveState for HmacSha384State {
    fn update(&mut self, data: &[u8]) -> Result<(), Error> {
        self.0.update(data);
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<Vec<u8>, Error> {
        Ok(self.0.finalize().to_vec())
    }
}

pub struct HmacSha512State(hmac_sha512::HMAC);

impl HmacSha512State {
    pub fn new(key: &[u8]) -> Self {
        HmacSha512State(hmac_sha512::HMAC::new(key))
    }
}

impl PrimitiveState for HmacSha512State {
    fn update(&mut self, data: &[u8]) -> Result<(), Error> {
        self.0.update(data);
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<Vec<u8>, Error> {
        Ok(self.0.finalize().to_vec())
    }
}
