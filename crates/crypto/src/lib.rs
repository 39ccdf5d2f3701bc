//! Pseudonymization and integrity-export signing primitives.
//!
//! Two independent concerns live here: [`SecretSet`] turns raw actor/object
//! identifiers into stable pseudonyms before they ever reach the chain or a
//! durable store, and [`Signer`]/[`Verifier`] sign and check the canonical
//! bytes of an integrity export. Neither touches the chain algorithm itself
//! (that lives in `vaultlog-core`) — this crate only produces the bytes that
//! feed into it.

mod hasher;
mod signer;

pub use hasher::{hash_with, SecretSet};
pub use signer::{Signer, Verifier};

use thiserror::Error;

/// Errors produced by this crate.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// A configured key was the wrong length or not validly encoded.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Signature verification failed.
    #[error("signature verification failed")]
    VerificationFailed,

    /// A value could not be decoded (base64/hex).
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),
}
