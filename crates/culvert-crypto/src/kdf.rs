//! Key derivation (HKDF-SHA256 chain and rolling request token).
//!
//! The tunnel derives three successive keys:
//! - K1: raw X25519 shared secret (from [`crate::kex`])
//! - K2: HKDF-SHA256(secret = K1, salt = session id, info = "K2")
//! - K3: HKDF-SHA256(secret = K2, no salt, info = "K3")
//!
//! Salting K2 with the session identifier binds the chain to one session:
//! two sessions negotiated from the same K1 never share keys. Every step is
//! deterministic so client and server converge on identical K3 without
//! further negotiation. K3 is the only key used for message-level
//! cryptography — both the AEAD and the rolling token below.
//!
//! The rolling token (EAPI) authenticates tunnel requests without a fresh
//! handshake: HMAC-SHA256 over the current 30-second epoch number, keyed
//! with K3. It is recomputed per request and never stored.

use crate::{Error, Result};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Length in bytes of every derived key in the chain.
pub const KEY_LEN: usize = 32;

/// Width of one rolling-token epoch in seconds.
pub const EPOCH_SECONDS: i64 = 30;

/// Generic HKDF-SHA256 key derivation per RFC 5869.
///
/// # Arguments
/// * `ikm` - Input key material
/// * `salt` - Salt value (empty slice for no salt)
/// * `info` - Context and application-specific information
/// * `output_len` - Length of output key material
///
/// # Errors
///
/// Fails only when `output_len` exceeds the PRF expansion limit
/// (255 × 32 bytes) — unreachable with the fixed lengths used here, and a
/// construction bug if it ever surfaces.
pub fn hkdf_sha256(
    ikm: &[u8],
    salt: &[u8],
    info: &[u8],
    output_len: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);

    let mut okm = vec![0u8; output_len];
    hk.expand(info, &mut okm)
        .map_err(|_| Error::KeyDerivation("HKDF expansion failed".into()))?;

    Ok(Zeroizing::new(okm))
}

/// Derive the session-bound key K2 from the shared secret K1.
pub fn derive_k2(k1: &[u8], session_id: &str) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let okm = hkdf_sha256(k1, session_id.as_bytes(), b"K2", KEY_LEN)?;

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    key.copy_from_slice(&okm);
    Ok(key)
}

/// Derive the tunnel key K3 from K2.
pub fn derive_k3(k2: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let okm = hkdf_sha256(k2, &[], b"K3", KEY_LEN)?;

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    key.copy_from_slice(&okm);
    Ok(key)
}

/// Compute the rolling token for one epoch:
/// HMAC-SHA256(key = K3, message = epoch as signed big-endian 64-bit).
///
/// The token itself travels on the wire and is not secret.
pub fn derive_eapi(k3: &[u8], epoch: i64) -> Result<[u8; KEY_LEN]> {
    let mut mac = HmacSha256::new_from_slice(k3)
        .map_err(|e| Error::KeyDerivation(format!("HMAC key setup failed: {e}")))?;
    mac.update(&epoch.to_be_bytes());
    Ok(mac.finalize().into_bytes().into())
}

/// Map a unix timestamp in seconds to its rolling-token epoch.
pub fn epoch_at(unix_seconds: i64) -> i64 {
    unix_seconds / EPOCH_SECONDS
}
