//! Cryptographic primitives for the culvert tunnel protocol.
//!
//! This crate implements the cryptographic foundations of the tunnel:
//! - Key agreement (X25519, RFC 7748)
//! - Key derivation (HKDF-SHA256 chain K1 → K2 → K3, plus the rolling
//!   HMAC-SHA256 request token)
//! - AEAD encryption (AES-256-GCM with random-nonce hex framing)
//!
//! Security requirements observed throughout:
//! - All secrets use `Zeroizing` wrappers
//! - No logging of key material
//! - No unsafe code

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aead;
pub mod error;
pub mod kdf;
pub mod kex;

pub use error::{Error, Result};
