//! Tunnel AEAD: AES-256-GCM with random-nonce hex framing.
//!
//! Every message is sealed under the session's tunnel key (K3) with a fresh
//! random 12-byte nonce and travels as `hex(nonce ‖ ciphertext ‖ tag)` with
//! no associated data. Nonce reuse under the same key is a catastrophic
//! confidentiality and integrity failure, so each call draws its nonce
//! independently from the OS secure random source.

use crate::{Error, Result};
use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use rand::RngCore;
use zeroize::Zeroizing;

/// AES-256-GCM nonce length in bytes; also the minimum decoded blob length.
pub const NONCE_LEN: usize = 12;

fn cipher_for(key: &[u8; 32]) -> Aes256Gcm {
    // Key length is fixed by the type, from_slice cannot panic here.
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key))
}

/// Seal `plaintext` under `key`, returning the hex-encoded blob.
///
/// # Errors
///
/// Returns [`Error::Encryption`] when the nonce cannot be drawn from the
/// secure random source or the seal itself fails.
pub fn encrypt(plaintext: &[u8], key: &[u8; 32]) -> Result<String> {
    let mut nonce = [0u8; NONCE_LEN];
    rand::rngs::OsRng
        .try_fill_bytes(&mut nonce)
        .map_err(|e| Error::Encryption(format!("nonce generation failed: {e}")))?;

    let sealed = cipher_for(key)
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| Error::Encryption("AES-256-GCM seal failed".into()))?;

    let mut blob = Vec::with_capacity(NONCE_LEN + sealed.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&sealed);
    Ok(hex::encode(blob))
}

/// Open a hex-encoded blob produced by [`encrypt`].
///
/// # Errors
///
/// - [`Error::MalformedCiphertext`] when the blob is not valid hex or is
///   shorter than the nonce prefix.
/// - [`Error::AuthenticationFailed`] when the tag check fails — tampering,
///   a wrong key, and corruption are deliberately indistinguishable.
pub fn decrypt(hex_blob: &str, key: &[u8; 32]) -> Result<Zeroizing<Vec<u8>>> {
    let blob = hex::decode(hex_blob)
        .map_err(|_| Error::MalformedCiphertext("blob is not valid hex".into()))?;

    if blob.len() < NONCE_LEN {
        return Err(Error::MalformedCiphertext(format!(
            "blob too short: {} bytes",
            blob.len()
        )));
    }

    let (nonce, sealed) = blob.split_at(NONCE_LEN);
    let plaintext = cipher_for(key)
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| Error::AuthenticationFailed)?;

    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let key = [0x42u8; 32];
        let plaintext = b"The quick brown fox jumps over the lazy dog";

        let blob = encrypt(plaintext, &key).unwrap();
        let decrypted = decrypt(&blob, &key).unwrap();

        assert_eq!(&*decrypted, plaintext);
    }

    #[test]
    fn empty_plaintext_roundtrip() {
        let key = [0x42u8; 32];

        let blob = encrypt(b"", &key).unwrap();
        // nonce (12) + tag (16), hex doubles it
        assert_eq!(blob.len(), 2 * (NONCE_LEN + 16));

        let decrypted = decrypt(&blob, &key).unwrap();
        assert!(decrypted.is_empty());
    }

    /// Two seals of the same plaintext must differ: fresh nonce per call.
    #[test]
    fn nonce_is_fresh_per_call() {
        let key = [0x42u8; 32];

        let a = encrypt(b"same message", &key).unwrap();
        let b = encrypt(b"same message", &key).unwrap();

        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_rejected() {
        let blob = encrypt(b"secret", &[0x42u8; 32]).unwrap();

        let result = decrypt(&blob, &[0x43u8; 32]);
        assert!(matches!(result, Err(Error::AuthenticationFailed)));
    }

    /// Flipping any single bit of the blob must fail authentication, never
    /// return a wrong plaintext silently.
    #[test]
    fn any_bit_flip_rejected() {
        let key = [0x42u8; 32];
        let blob = encrypt(b"integrity", &key).unwrap();
        let bytes = hex::decode(&blob).unwrap();

        for i in 0..bytes.len() {
            for bit in 0..8 {
                let mut tampered = bytes.clone();
                tampered[i] ^= 1 << bit;
                let result = decrypt(&hex::encode(&tampered), &key);
                assert!(
                    matches!(result, Err(Error::AuthenticationFailed)),
                    "flipped bit {bit} of byte {i} was not rejected"
                );
            }
        }
    }

    #[test]
    fn invalid_hex_rejected() {
        let result = decrypt("not hex at all!", &[0u8; 32]);
        assert!(matches!(result, Err(Error::MalformedCiphertext(_))));
    }

    #[test]
    fn undersized_blob_rejected() {
        // 8 bytes decoded, shorter than the 12-byte nonce
        let result = decrypt("0011223344556677", &[0u8; 32]);
        assert!(matches!(result, Err(Error::MalformedCiphertext(_))));
    }
}
