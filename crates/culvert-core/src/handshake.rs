//! Handshake orchestration.
//!
//! The two halves mirror each other: the server computes K1 from its
//! long-lived scalar and the client's point, the client from its own scalar
//! and the server's point, and both walk the same K1 → K2 → K3 chain so
//! they converge on an identical tunnel key without further negotiation.
//!
//! The server keypair is generated once per process and reused across all
//! sessions — there is no rotation or per-session forward secrecy on the
//! server side. Compromise of that long-term scalar retroactively exposes
//! every K1 derived with it; this trade-off is part of the protocol design,
//! not an oversight.
//!
//! K1 lives only long enough to derive K2, K2 only long enough to derive
//! K3; neither is stored or transmitted.

use uuid::Uuid;
use zeroize::Zeroizing;

use culvert_crypto::kdf::{self, KEY_LEN};
use culvert_crypto::kex::{KeyPair, POINT_LEN};

use crate::store::SessionStore;
use crate::{Error, Result};

/// Successful server-side handshake output, returned to the peer.
#[derive(Debug, Clone)]
pub struct HandshakeOutcome {
    /// Server's public point, hex-encoded.
    pub server_public_key: String,
    /// Freshly minted session identifier.
    pub session_id: String,
}

/// Decode and length-check a hex-encoded peer point.
///
/// # Errors
///
/// [`Error::InvalidPeerKey`] unless the input is valid hex of exactly
/// [`POINT_LEN`] bytes. Point *contents* are not validated (see
/// `culvert_crypto::kex`).
pub fn decode_peer_point(hex_point: &str) -> Result<[u8; POINT_LEN]> {
    let bytes = hex::decode(hex_point).map_err(|_| Error::InvalidPeerKey)?;
    bytes.try_into().map_err(|_| Error::InvalidPeerKey)
}

/// Server half: accept a client's public point and mint a session.
///
/// Computes K1 with the server's long-lived scalar, derives the tunnel key,
/// registers it in the store under a new UUID, and returns the data the
/// client needs to run the mirror derivation.
pub fn accept(
    keypair: &KeyPair,
    store: &SessionStore,
    client_public_hex: &str,
) -> Result<HandshakeOutcome> {
    let peer_point = decode_peer_point(client_public_hex)?;
    let k1 = keypair.exchange(&peer_point);

    let session_id = Uuid::new_v4().to_string();
    let tunnel_key = derive_tunnel_key(&*k1, &session_id)?;
    store.create(&session_id, &tunnel_key);

    Ok(HandshakeOutcome {
        server_public_key: hex::encode(keypair.public_key()),
        session_id,
    })
}

/// Client half: finish the exchange with the server's reply.
///
/// Returns the tunnel key (K3) for the caller to cache alongside the
/// session identifier.
pub fn complete(
    keypair: &KeyPair,
    server_public_hex: &str,
    session_id: &str,
) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let peer_point = decode_peer_point(server_public_hex)?;
    let k1 = keypair.exchange(&peer_point);
    derive_tunnel_key(&*k1, session_id)
}

fn derive_tunnel_key(k1: &[u8], session_id: &str) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let k2 = kdf::derive_k2(k1, session_id)?;
    Ok(kdf::derive_k3(&*k2)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use culvert_crypto::kdf::{derive_eapi, epoch_at};

    #[test]
    fn both_halves_derive_the_same_tunnel_key() {
        let server = KeyPair::generate().unwrap();
        let client = KeyPair::generate().unwrap();
        let store = SessionStore::new();

        let outcome = accept(&server, &store, &hex::encode(client.public_key())).unwrap();
        let client_key =
            complete(&client, &outcome.server_public_key, &outcome.session_id).unwrap();

        // A token derived from the client's copy of K3 must validate
        // against the record the server stored.
        let now = 1_700_000_010;
        let token = hex::encode(derive_eapi(&*client_key, epoch_at(now)).unwrap());
        assert!(store
            .validate_and_touch_at(&outcome.session_id, &token, now)
            .is_ok());
    }

    #[test]
    fn rejects_undersized_point() {
        let server = KeyPair::generate().unwrap();
        let store = SessionStore::new();

        let result = accept(&server, &store, &hex::encode([0u8; 16]));
        assert!(matches!(result, Err(Error::InvalidPeerKey)));
        assert!(store.is_empty());
    }

    #[test]
    fn rejects_oversized_point() {
        let server = KeyPair::generate().unwrap();
        let store = SessionStore::new();

        let result = accept(&server, &store, &hex::encode([0u8; 33]));
        assert!(matches!(result, Err(Error::InvalidPeerKey)));
    }

    #[test]
    fn rejects_non_hex_point() {
        let server = KeyPair::generate().unwrap();
        let store = SessionStore::new();

        assert!(matches!(
            accept(&server, &store, "zz-definitely-not-hex"),
            Err(Error::InvalidPeerKey)
        ));
    }

    /// Two handshakes from the same client public key must yield distinct
    /// session identifiers and distinct tunnel keys.
    #[test]
    fn repeated_handshakes_diverge() {
        let server = KeyPair::generate().unwrap();
        let client = KeyPair::generate().unwrap();
        let store = SessionStore::new();
        let client_hex = hex::encode(client.public_key());

        let first = accept(&server, &store, &client_hex).unwrap();
        let second = accept(&server, &store, &client_hex).unwrap();
        assert_ne!(first.session_id, second.session_id);
        assert_eq!(store.len(), 2);

        let key1 = complete(&client, &first.server_public_key, &first.session_id).unwrap();
        let key2 = complete(&client, &second.server_public_key, &second.session_id).unwrap();
        assert_ne!(&*key1, &*key2);
    }
}
