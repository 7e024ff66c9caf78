//! Ed25519 request signing
//!
//! The signature covers the exact bytes of the request body and travels in
//! headers alongside it:
//!
//! | Header                  | Value                                   |
//! |-------------------------|-----------------------------------------|
//! | `X-Signature`           | standard base64 of the 64-byte signature |
//! | `X-Signature-Algorithm` | `ed25519`                                |
//! | `X-Key-Id`              | key identifier for the receiver          |
//!
//! Keys are exchanged as PKCS#8 PEM (private) and SPKI PEM (public).

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use ed25519_dalek::{Signature, SigningKey, VerifyingKey};
use ed25519_dalek::{Signer as _, Verifier as _};
use rand::rngs::OsRng;

use crate::error::PipelineError;

pub const ALGORITHM: &str = "ed25519";

pub const SIGNATURE_HEADER: &str = "X-Signature";
pub const ALGORITHM_HEADER: &str = "X-Signature-Algorithm";
pub const KEY_ID_HEADER: &str = "X-Key-Id";

/// Private signing key plus the identifier advertised with each signature.
#[derive(Clone)]
pub struct Signer {
    key: SigningKey,
    key_id: String,
}

/// A body together with the signature over its exact bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayload {
    pub body: Vec<u8>,
    pub signature: String,
    pub algorithm: &'static str,
    pub key_id: String,
}

impl SignedPayload {
    /// Check this payload against `key`.
    pub fn verify_with(&self, key: &VerifyingKey) -> bool {
        verify(key, &self.body, &self.signature)
    }

    pub fn headers(&self) -> Vec<(String, String)> {
        vec![
            (SIGNATURE_HEADER.to_string(), self.signature.clone()),
            (ALGORITHM_HEADER.to_string(), self.algorithm.to_string()),
            (KEY_ID_HEADER.to_string(), self.key_id.clone()),
        ]
    }
}

impl Signer {
    fn from_key(key: SigningKey) -> Self {
        let key_id = key_id_for(&key.verifying_key());
        Self { key, key_id }
    }

    /// Fresh random key.
    pub fn generate() -> Self {
        Self::from_key(SigningKey::generate(&mut OsRng))
    }

    /// Parse a PKCS#8 PEM private key.
    ///
    /// Accepts `\n` escapes in place of newlines, as produced when a PEM is
    /// squeezed into a single environment variable.
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, PipelineError> {
        let pem = if pem.contains('\n') {
            pem.trim().to_string()
        } else {
            pem.trim().replace("\\n", "\n")
        };
        let key = SigningKey::from_pkcs8_pem(&pem)
            .map_err(|e| PipelineError::SigningUnavailable(format!("invalid private key: {e}")))?;
        Ok(Self::from_key(key))
    }

    /// Read a PKCS#8 PEM private key from `path`.
    pub fn from_pem_file(path: &Path) -> Result<Self, PipelineError> {
        let pem = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::SigningUnavailable(format!(
                "cannot read private key {}: {e}",
                path.display()
            ))
        })?;
        Self::from_pkcs8_pem(&pem)
    }

    /// Override the derived key identifier.
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = key_id.into();
        self
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    /// Sign `body` as-is; the payload keeps the bytes that were signed.
    pub fn sign(&self, body: Vec<u8>) -> SignedPayload {
        let signature: Signature = self.key.sign(&body);
        SignedPayload {
            body,
            signature: STANDARD.encode(signature.to_bytes()),
            algorithm: ALGORITHM,
            key_id: self.key_id.clone(),
        }
    }

    pub fn private_key_pem(&self) -> anyhow::Result<String> {
        let pem = self
            .key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| anyhow::anyhow!("encode private key: {e}"))?;
        Ok(pem.as_str().to_string())
    }

    pub fn public_key_pem(&self) -> anyhow::Result<String> {
        public_key_pem(&self.verifying_key())
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("algorithm", &ALGORITHM)
            .field("key_id", &self.key_id)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// First 16 hex chars of the BLAKE3 hash of the raw public key.
pub fn key_id_for(key: &VerifyingKey) -> String {
    blake3::hash(key.as_bytes()).to_hex().as_str()[..16].to_string()
}

pub fn public_key_pem(key: &VerifyingKey) -> anyhow::Result<String> {
    key.to_public_key_pem(LineEnding::LF)
        .map_err(|e| anyhow::anyhow!("encode public key: {e}"))
}

pub fn verifying_key_from_pem(pem: &str) -> anyhow::Result<VerifyingKey> {
    VerifyingKey::from_public_key_pem(pem.trim())
        .map_err(|e| anyhow::anyhow!("invalid public key: {e}"))
}

/// Check a base64 signature over `body`.
pub fn verify(key: &VerifyingKey, body: &[u8], signature_b64: &str) -> bool {
    let Ok(bytes) = STANDARD.decode(signature_b64.trim()) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&bytes) else {
        return false;
    };
    key.verify(body, &signature).is_ok()
}
