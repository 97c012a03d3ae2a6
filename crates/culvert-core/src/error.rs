//! Error types for protocol operations.

use thiserror::Error;

/// Result type alias for protocol operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Protocol operation errors.
///
/// Per-request failures are recovered at the transport boundary and turned
/// into structured error responses. The variants deliberately carry no
/// detail about which internal check failed: a remote caller must not be
/// able to distinguish a missing session from an expired one, or a bad tag
/// from a bad token (oracle avoidance).
#[derive(Debug, Error)]
pub enum Error {
    /// Peer public point is not valid hex or not exactly 32 bytes.
    /// The request is rejected and no session is created.
    #[error("invalid peer public key")]
    InvalidPeerKey,

    /// Session unknown, expired, or token mismatch.
    #[error("unauthorized")]
    Unauthorized,

    /// Request payload could not be decoded or decrypted.
    #[error("bad request")]
    BadRequest,

    /// Server-side failure while producing a response.
    #[error("internal error: {0}")]
    Internal(String),

    /// Cryptographic primitive failure. Derivation failures here indicate
    /// a programming defect, not a runtime condition.
    #[error("crypto error: {0}")]
    Crypto(#[from] culvert_crypto::Error),
}
