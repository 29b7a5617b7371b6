mod blake2b;
mod sha1;
mod sha2;

pub use self::blake2b::*;
pub use self::sha1::*;
pub use self::sha2::*;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::*;

/// Whether an algorithm is a plain digest or a keyed MAC construction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AlgorithmKind {
    Digest,
    Mac,
}

/// Identifier of a supported digest algorithm or MAC mechanism.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlgorithmId {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
    Blake2b256,
    HmacSha1,
    HmacSha256,
    HmacSha384,
    HmacSha512,
    Blake2bMac256,
}

impl AlgorithmId {
    pub const ALL: [AlgorithmId; 10] = [
        AlgorithmId::Sha1,
        AlgorithmId::Sha256,
        AlgorithmId::Sha384,
        AlgorithmId::Sha512,
        AlgorithmId::Blake2b256,
        AlgorithmId::HmacSha1,
        AlgorithmId::HmacSha256,
        AlgorithmId::HmacSha384,
        AlgorithmId::HmacSha512,
        AlgorithmId::Blake2bMac256,
    ];

    /// Canonical name of the algorithm.
    pub fn name(self) -> &'static str {
        match self {
            AlgorithmId::Sha1 => "SHA-1",
            AlgorithmId::Sha256 => "SHA-256",
            AlgorithmId::Sha384 => "SHA-384",
            AlgorithmId::Sha512 => "SHA-512",
            AlgorithmId::Blake2b256 => "BLAKE2B-256",
            AlgorithmId::HmacSha1 => "HMAC-SHA1",
            AlgorithmId::HmacSha256 => "HMAC-SHA256",
            AlgorithmId::HmacSha384 => "HMAC-SHA384",
            AlgorithmId::HmacSha512 => "HMAC-SHA512",
            AlgorithmId::Blake2bMac256 => "BLAKE2B-MAC-256",
        }
    }

    pub fn kind(self) -> AlgorithmKind {
        match self {
            AlgorithmId::Sha1
            | AlgorithmId::Sha256
            | AlgorithmId::Sha384
            | AlgorithmId::Sha512
            | AlgorithmId::Blake2b256 => AlgorithmKind::Digest,
            _ => AlgorithmKind::Mac,
        }
    }

    pub fn is_digest(self) -> bool {
        self.kind() == AlgorithmKind::Digest
    }

    pub fn is_mac(self) -> bool {
        self.kind() == AlgorithmKind::Mac
    }

    /// The digest a MAC mechanism is built on. Digests return themselves.
    pub fn digest_algorithm(self) -> AlgorithmId {
        match self {
            AlgorithmId::HmacSha1 => AlgorithmId::Sha1,
            AlgorithmId::HmacSha256 => AlgorithmId::Sha256,
            AlgorithmId::HmacSha384 => AlgorithmId::Sha384,
            AlgorithmId::HmacSha512 => AlgorithmId::Sha512,
            AlgorithmId::Blake2bMac256 => AlgorithmId::Blake2b256,
            digest => digest,
        }
    }

    /// Length of the output, in bytes.
    pub fn output_len(self) -> usize {
        match self.digest_algorithm() {
            AlgorithmId::Sha1 => 20,
            AlgorithmId::Sha256 | AlgorithmId::Blake2b256 => 32,
            AlgorithmId::Sha384 => 48,
            _ => 64,
        }
    }

    /// Internal block size of the underlying digest, in bytes.
    pub fn block_len(self) -> usize {
        match self.digest_algorithm() {
            AlgorithmId::Sha1 | AlgorithmId::Sha256 => 64,
            _ => 128,
        }
    }

    /// Look an algorithm up by name.
    ///
    /// Matching is case-insensitive and ignores `-`, `_`, `/` and spaces, so that
    /// `SHA-256`, `sha256`, `HmacSHA256` and `HMAC/SHA-256` are all recognized.
    pub fn lookup(name: &str) -> Result<AlgorithmId, Error> {
        let normalized: String = name
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | '/' | ' '))
            .map(|c| c.to_ascii_uppercase())
            .collect();
        let algorithm = match normalized.as_str() {
            "SHA1" | "SHA" => AlgorithmId::Sha1,
            "SHA256" => AlgorithmId::Sha256,
            "SHA384" => AlgorithmId::Sha384,
            "SHA512" => AlgorithmId::Sha512,
            "BLAKE2B256" | "BLAKE2B" => AlgorithmId::Blake2b256,
            "HMACSHA1" | "HS1" => AlgorithmId::HmacSha1,
            "HMACSHA256" | "HS256" => AlgorithmId::HmacSha256,
            "HMACSHA384" | "HS384" => AlgorithmId::HmacSha384,
            "HMACSHA512" | "HS512" => AlgorithmId::HmacSha512,
            "BLAKE2BMAC256" | "BLAKE2BMAC" => AlgorithmId::Blake2bMac256,
            _ => bail!(DigestError::UnsupportedAlgorithm(name.to_string())),
        };
        Ok(algorithm)
    }
}

impl fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AlgorithmId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AlgorithmId::lookup(s)
    }
}
