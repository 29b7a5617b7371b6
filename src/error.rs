#[allow(unused)]
pub use anyhow::{anyhow, bail, ensure, Error};

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("Unsupported algorithm: [{0}]")]
    UnsupportedAlgorithm(String),
    #[error("Key handle does not resolve to live key material")]
    InvalidKeyHandle,
    #[error("Key rejected for this mechanism: [{0}]")]
    InvalidKey(String),
    #[error("Unable to initialize digest context: [{0}]")]
    EngineInitFailure(String),
    #[error("{operation}: range {offset}+{length} exceeds a buffer of {available} bytes")]
    InvalidRange {
        operation: &'static str,
        offset: usize,
        length: usize,
        available: usize,
    },
    #[error("{0}: context already finalized")]
    ContextFinalized(&'static str),
    #[error("Digest operation failed: [{0}]")]
    ComputationFailure(String),
    #[error("Output buffer too small: {required} bytes required, {capacity} available")]
    InsufficientOutputCapacity { required: usize, capacity: usize },
    #[error("Context handle was never issued by this registry")]
    InvalidContextHandle,
    #[error("Authentication tag didn't verify")]
    VerificationFailed,
    #[error("Invalid engine options: [{0}]")]
    InvalidOptions(String),
}

impl DigestError {
    /// Returns `true` if the error was caused by the caller using the API incorrectly,
    /// as opposed to a failure of the environment or of the underlying primitive.
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            DigestError::UnsupportedAlgorithm(_)
                | DigestError::InvalidKeyHandle
                | DigestError::InvalidKey(_)
                | DigestError::InvalidRange { .. }
                | DigestError::ContextFinalized(_)
                | DigestError::InsufficientOutputCapacity { .. }
                | DigestError::InvalidContextHandle
                | DigestError::InvalidOptions(_)
        )
    }
}

/// Extract the typed error carried by an `anyhow::Error`, if any.
pub fn digest_error(e: &Error) -> Option<&DigestError> {
    e.downcast_ref::<DigestError>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn misuse_classification() {
        assert!(DigestError::ContextFinalized("update").is_misuse());
        assert!(DigestError::InvalidRange {
            operation: "update",
            offset: 4,
            length: 8,
            available: 10
        }
        .is_misuse());
        assert!(DigestError::InvalidKey("too short".into()).is_misuse());
        assert!(!DigestError::EngineInitFailure("out of memory".into()).is_misuse());
        assert!(!DigestError::ComputationFailure("device fault".into()).is_misuse());
    }

    #[test]
    fn messages_name_the_operation() {
        let e = DigestError::ContextFinalized("finalize");
        assert_eq!(e.to_string(), "finalize: context already finalized");
        let e: Error = DigestError::InvalidRange {
            operation: "update",
            offset: 4,
            length: 8,
            available: 10,
        }
        .into();
        assert!(e.to_string().starts_with("update: range 4+8"));
        assert!(matches!(
            digest_error(&e),
            Some(DigestError::InvalidRange { offset: 4, .. })
        ));
    }
}
