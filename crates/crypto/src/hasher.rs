//! Keyed pseudonymization of actor/object identifiers.
//!
//! `hash_with` is deterministic for a given `(secret, raw)` pair and
//! one-way: recovering `raw` from the output requires the secret. Truncating
//! the HMAC to 18 bytes keeps stored pseudonyms short while leaving enough
//! entropy (144 bits) that collisions are not a practical concern at audit
//! log scale.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

const TRUNCATED_LEN: usize = 18;

/// Compute `base64url(no-pad)(HMAC-SHA256(secret, raw)[..18])`.
#[must_use]
pub fn hash_with(secret: &[u8], raw: &str) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(raw.as_bytes());
    let full = mac.finalize().into_bytes();
    URL_SAFE_NO_PAD.encode(&full[..TRUNCATED_LEN])
}

/// An ordered set of pseudonymization secrets: `current` is used for all new
/// hashing, `previous` entries exist only so `rehash_all` can recompute what
/// a value would have hashed to under an older key during rotation.
pub struct SecretSet {
    secrets: Vec<Zeroizing<Vec<u8>>>,
}

impl SecretSet {
    /// `secrets[0]` is the current key; the rest are retired keys kept
    /// around to verify rows hashed before a rotation.
    #[must_use]
    pub fn new(secrets: Vec<Vec<u8>>) -> Self {
        Self {
            secrets: secrets.into_iter().map(Zeroizing::new).collect(),
        }
    }

    /// Hash `raw` with the current (first) secret.
    #[must_use]
    pub fn hash(&self, raw: &str) -> String {
        hash_with(&self.secrets[0], raw)
    }

    /// Hash `raw` under every known secret, current first. Used to check
    /// whether a stored pseudonym matches any key this process knows about,
    /// without ever storing or transmitting the raw identifier again.
    #[must_use]
    pub fn rehash_all(&self, raw: &str) -> Vec<String> {
        self.secrets.iter().map(|s| hash_with(s, raw)).collect()
    }

    /// Check whether `raw` hashes to `stored` under any known secret
    /// (current or retired), comparing in constant time so a verifier does
    /// not leak which prefix byte of a near-match first diverged.
    #[must_use]
    pub fn verify(&self, raw: &str, stored: &str) -> bool {
        self.rehash_all(raw)
            .iter()
            .any(|candidate| candidate.as_bytes().ct_eq(stored.as_bytes()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_secret_and_input() {
        let a = hash_with(b"k1", "actor-1");
        let b = hash_with(b"k1", "actor-1");
        assert_eq!(a, b);
    }

    #[test]
    fn differs_across_secrets() {
        let a = hash_with(b"k1", "actor-1");
        let b = hash_with(b"k2", "actor-1");
        assert_ne!(a, b);
    }

    #[test]
    fn differs_across_inputs() {
        let a = hash_with(b"k1", "actor-1");
        let b = hash_with(b"k1", "actor-2");
        assert_ne!(a, b);
    }

    #[test]
    fn output_has_no_padding_and_is_url_safe() {
        let out = hash_with(b"k1", "actor-1");
        assert!(!out.contains('='));
        assert!(!out.contains('+'));
        assert!(!out.contains('/'));
    }

    #[test]
    fn rehash_all_includes_retired_secrets() {
        let set = SecretSet::new(vec![b"current".to_vec(), b"retired".to_vec()]);
        let hashes = set.rehash_all("actor-1");
        assert_eq!(hashes.len(), 2);
        assert_eq!(hashes[0], set.hash("actor-1"));
        assert_eq!(hashes[1], hash_with(b"retired", "actor-1"));
    }

    #[test]
    fn verify_matches_current_and_retired_secrets() {
        let set = SecretSet::new(vec![b"current".to_vec(), b"retired".to_vec()]);
        assert!(set.verify("actor-1", &hash_with(b"current", "actor-1")));
        assert!(set.verify("actor-1", &hash_with(b"retired", "actor-1")));
    }

    #[test]
    fn verify_rejects_unknown_secret_or_value() {
        let set = SecretSet::new(vec![b"current".to_vec()]);
        assert!(!set.verify("actor-1", &hash_with(b"other", "actor-1")));
        assert!(!set.verify("actor-2", &set.hash("actor-1")));
    }
}
