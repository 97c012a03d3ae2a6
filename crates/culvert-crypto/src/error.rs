//! Error types for cryptographic operations.

use thiserror::Error;

/// Result type alias for cryptographic operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Cryptographic operation errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Key generation failed: the secure random source is unavailable.
    /// Unrecoverable — no valid key can be produced without it.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Key derivation failed. Not reachable with the fixed 32-byte outputs
    /// used by the protocol; occurrence indicates a construction bug.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// AEAD encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Ciphertext blob could not be decoded (bad hex or shorter than the
    /// nonce prefix).
    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    /// AEAD tag verification failed. Tampering, a wrong key, and transport
    /// corruption are indistinguishable here by design.
    #[error("authentication failed")]
    AuthenticationFailed,
}
