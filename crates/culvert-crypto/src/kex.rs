//! X25519 key agreement (RFC 7748).
//!
//! Each party holds one long-lived keypair: the client generates its own
//! per install, the server per process lifetime. The shared secret computed
//! here is the protocol's K1 and feeds straight into [`crate::kdf`].
//!
//! # Security
//!
//! - Private scalars and shared secrets are wrapped in `Zeroizing<>` so they
//!   are cleared from memory when dropped.
//! - Peer points are NOT checked for contributory behavior: a low-order
//!   peer point yields an all-zero shared secret which is accepted rather
//!   than rejected. This is a known limitation of the wire protocol;
//!   rejecting such points would change observable behavior.

use crate::{Error, Result};
use rand::RngCore;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

/// Length in bytes of an X25519 point or scalar on the wire.
pub const POINT_LEN: usize = 32;

/// X25519 keypair used to negotiate a tunnel session.
///
/// The private scalar never leaves the process and is zeroed on drop.
pub struct KeyPair {
    private_key: Zeroizing<StaticSecret>,
    public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new keypair from the OS secure random source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyGeneration`] when the random source is
    /// unavailable. Callers should treat this as fatal.
    pub fn generate() -> Result<Self> {
        let mut scalar = Zeroizing::new([0u8; POINT_LEN]);
        rand::rngs::OsRng
            .try_fill_bytes(scalar.as_mut())
            .map_err(|e| Error::KeyGeneration(e.to_string()))?;
        Ok(Self::from_private(*scalar))
    }

    /// Build a keypair from a raw private scalar.
    ///
    /// Primarily for tests with known vectors; production code uses
    /// [`KeyPair::generate`].
    #[doc(hidden)]
    pub fn from_private(private: [u8; POINT_LEN]) -> Self {
        let private_key = StaticSecret::from(private);
        let public_key = PublicKey::from(&private_key);
        Self {
            private_key: Zeroizing::new(private_key),
            public_key,
        }
    }

    /// The public point, safe to transmit to the peer.
    pub fn public_key(&self) -> &[u8; POINT_LEN] {
        self.public_key.as_bytes()
    }

    /// Compute the shared secret (K1) with a peer's public point.
    ///
    /// The caller must have validated that the point is exactly
    /// [`POINT_LEN`] bytes. No further validation happens here: an
    /// all-zero result from a malicious low-order point is returned as-is
    /// (see the module docs).
    pub fn exchange(&self, peer_public: &[u8; POINT_LEN]) -> Zeroizing<[u8; POINT_LEN]> {
        let peer = PublicKey::from(*peer_public);
        let shared = self.private_key.diffie_hellman(&peer);
        Zeroizing::new(*shared.as_bytes())
    }
}
