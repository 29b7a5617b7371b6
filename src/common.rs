use std::collections::HashSet;

use ct_codecs::{Encoder, Hex};
use serde::{Deserialize, Serialize};

use crate::algorithms::AlgorithmId;
use crate::error::*;

/// Engine configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Bind the original key when the key store cannot derive a signing copy.
    ///
    /// Some hardware-backed stores never produce such a copy while the key itself works fine.
    /// When disabled, context creation fails instead.
    pub allow_key_fallback: bool,

    /// Reject HMAC keys shorter than this many bytes
    pub min_hmac_key_len: usize,

    /// Maximum number of contexts a registry keeps alive at the same time
    pub max_live_contexts: usize,

    /// Only accept algorithms whose names are in the set
    pub allowed_algorithms: Option<HashSet<String>>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            allow_key_fallback: true,
            min_hmac_key_len: 0,
            max_live_contexts: 1024,
            allowed_algorithms: None,
        }
    }
}

impl EngineOptions {
    /// Load options from a JSON document. Missing fields take their default values.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let options: EngineOptions = serde_json::from_str(json)
            .map_err(|e| DigestError::InvalidOptions(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), Error> {
        ensure!(
            self.max_live_contexts > 0,
            DigestError::InvalidOptions("max_live_contexts must be at least 1".to_string())
        );
        if let Some(allowed) = &self.allowed_algorithms {
            for name in allowed {
                if AlgorithmId::lookup(name).is_err() {
                    bail!(DigestError::InvalidOptions(format!(
                        "unknown algorithm in allow-list: {}",
                        name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Whether `algorithm` may be used under these options.
    pub fn permits(&self, algorithm: AlgorithmId) -> bool {
        match &self.allowed_algorithms {
            None => true,
            Some(allowed) => allowed
                .iter()
                .any(|name| matches!(AlgorithmId::lookup(name), Ok(a) if a == algorithm)),
        }
    }
}

/// Lowercase hexadecimal rendering of a digest.
pub fn to_hex(bytes: &[u8]) -> Result<String, Error> {
    Hex::encode_to_string(bytes).map_err(|_| anyhow!("hex encoding failed"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = EngineOptions::default();
        assert!(options.allow_key_fallback);
        assert_eq!(options.max_live_contexts, 1024);
        assert!(options.permits(AlgorithmId::Sha1));
        options.validate().unwrap();
    }

    #[test]
    fn from_json_fills_missing_fields() {
        let options = EngineOptions::from_json(
            r#"{ "allow_key_fallback": false, "allowed_algorithms": ["SHA-256", "HmacSHA256"] }"#,
        )
        .unwrap();
        assert!(!options.allow_key_fallback);
        assert_eq!(options.max_live_contexts, 1024);
        assert!(options.permits(AlgorithmId::Sha256));
        assert!(options.permits(AlgorithmId::HmacSha256));
        assert!(!options.permits(AlgorithmId::Sha1));
    }

    #[test]
    fn invalid_documents_are_rejected() {
        for json in &[
            r#"{ "max_live_contexts": 0 }"#,
            r#"{ "allowed_algorithms": ["MD5"] }"#,
            r#"{ "max_live_contexts": "many" }"#,
        ] {
            let e = EngineOptions::from_json(json).unwrap_err();
            assert!(matches!(
                digest_error(&e),
                Some(DigestError::InvalidOptions(_))
            ));
        }
    }

    #[test]
    fn hex_rendering() {
        assert_eq!(to_hex(&[0x00, 0xab, 0x10]).unwrap(), "00ab10");
    }
}
