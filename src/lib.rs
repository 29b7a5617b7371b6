//! Streaming digest and HMAC contexts.
//!
//! A [`engine::DigestEngine`] creates [`context::StreamingContext`]s for plain digests or for
//! MAC mechanisms bound to a key. A context absorbs input through any number of `update` calls
//! and is finalized exactly once; every resource it holds (including a signing copy of its key)
//! is released at that point, on error paths too. [`registry::ContextRegistry`] exposes the same
//! operations through opaque handles for callers living across a runtime boundary.
//!
//! ```
//! use digest_engine::prelude::*;
//!
//! # fn main() -> Result<(), digest_engine::error::Error> {
//! let engine = DigestEngine::new();
//! let mut ctx = engine.create_digest(AlgorithmId::Sha256)?;
//! ctx.absorb(b"ab")?;
//! ctx.absorb(b"c")?;
//! let digest = ctx.finalize(32)?;
//! assert_eq!(
//!     to_hex(&digest)?,
//!     "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
//! );
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod algorithms;
pub mod common;
pub mod context;
pub mod engine;
pub mod error;
pub mod key;
pub mod provider;
pub mod registry;

pub mod prelude {
    pub use crate::algorithms::{AlgorithmId, AlgorithmKind};
    pub use crate::common::*;
    pub use crate::context::*;
    pub use crate::engine::*;
    pub use crate::error::{digest_error, DigestError};
    pub use crate::key::*;
    pub use crate::provider::*;
    pub use crate::registry::*;
}
