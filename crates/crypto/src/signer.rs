//! Ed25519 signing of integrity-export snapshots.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};

use crate::CryptoError;

/// Signs integrity-export bytes with an Ed25519 key.
///
/// Holds the signing key in memory only; callers are responsible for
/// loading key material from a secret store rather than a config file.
pub struct Signer {
    key: SigningKey,
    kid: String,
}

impl Signer {
    /// Build a signer from 32 raw seed bytes and a key identifier that is
    /// embedded in every export so verifiers can pick the right public key.
    pub fn from_seed(seed: &[u8], kid: impl Into<String>) -> Result<Self, CryptoError> {
        let seed: [u8; 32] = seed
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("signing seed must be 32 bytes".to_owned()))?;
        Ok(Self {
            key: SigningKey::from_bytes(&seed),
            kid: kid.into(),
        })
    }

    /// The key identifier this signer embeds in signatures.
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Sign canonical bytes, returning a base64url (no padding) signature.
    #[must_use]
    pub fn sign(&self, canonical_bytes: &[u8]) -> String {
        B64.encode(self.key.sign(canonical_bytes).to_bytes())
    }

    /// The verifying (public) key, to hand to a [`Verifier`] out of band.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

/// Verifies signatures produced by a [`Signer`].
pub struct Verifier {
    key: VerifyingKey,
}

impl Verifier {
    /// Build a verifier from a raw 32-byte Ed25519 public key.
    pub fn from_public_key(public_key: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; 32] = public_key
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("public key must be 32 bytes".to_owned()))?;
        let key = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| CryptoError::InvalidKey(format!("invalid Ed25519 public key: {e}")))?;
        Ok(Self { key })
    }

    /// Verify `signature_b64` (base64url, no padding) over `canonical_bytes`.
    pub fn verify(&self, canonical_bytes: &[u8], signature_b64: &str) -> Result<(), CryptoError> {
        let raw = B64
            .decode(signature_b64)
            .map_err(|e| CryptoError::InvalidEncoding(format!("signature is not valid base64: {e}")))?;
        let sig_bytes: [u8; 64] = raw
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidEncoding("signature must be 64 bytes".to_owned()))?;
        let signature = Signature::from_bytes(&sig_bytes);
        self.key
            .verify(canonical_bytes, &signature)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed() -> [u8; 32] {
        [7u8; 32]
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let signer = Signer::from_seed(&seed(), "kid-1").unwrap();
        let verifier = Verifier::from_public_key(signer.verifying_key().as_bytes()).unwrap();
        let bytes = b"canonical export payload";
        let sig = signer.sign(bytes);
        assert!(verifier.verify(bytes, &sig).is_ok());
    }

    #[test]
    fn tampered_bytes_fail_verification() {
        let signer = Signer::from_seed(&seed(), "kid-1").unwrap();
        let verifier = Verifier::from_public_key(signer.verifying_key().as_bytes()).unwrap();
        let sig = signer.sign(b"original");
        assert!(verifier.verify(b"tampered", &sig).is_err());
    }

    #[test]
    fn wrong_key_fails_verification() {
        let signer = Signer::from_seed(&seed(), "kid-1").unwrap();
        let other = Signer::from_seed(&[9u8; 32], "kid-2").unwrap();
        let verifier = Verifier::from_public_key(other.verifying_key().as_bytes()).unwrap();
        let sig = signer.sign(b"payload");
        assert!(verifier.verify(b"payload", &sig).is_err());
    }

    #[test]
    fn rejects_short_seed() {
        assert!(Signer::from_seed(&[1u8; 16], "kid").is_err());
    }

    #[test]
    fn kid_is_exposed() {
        let signer = Signer::from_seed(&seed(), "primary-2026").unwrap();
        assert_eq!(signer.kid(), "primary-2026");
    }
}
