//! Encrypted request/response round trips.
//!
//! One tunnel request carries `{session id, rolling token, ciphertext}`.
//! The gateway validates the token, decrypts the payload, hands the
//! plaintext to the application handler, and seals the handler's reply
//! under the same tunnel key.

use std::sync::Arc;

use zeroize::Zeroizing;

use culvert_crypto::aead;

use crate::store::{unix_now, SessionStore};
use crate::{Error, Result};

/// Application-level request handler.
///
/// Implementations receive one decrypted request and produce the plaintext
/// response; they carry no protocol knowledge. Supplied by the surrounding
/// application when the gateway is built.
pub trait RequestHandler: Send + Sync {
    /// Handle one decrypted request.
    fn process(&self, request: &str) -> String;
}

impl<F> RequestHandler for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn process(&self, request: &str) -> String {
        self(request)
    }
}

/// Processes authenticated, encrypted round trips against a session store.
pub struct TunnelGateway {
    store: Arc<SessionStore>,
    handler: Box<dyn RequestHandler>,
}

impl TunnelGateway {
    /// Build a gateway over a shared session store and an application
    /// handler.
    pub fn new(store: Arc<SessionStore>, handler: Box<dyn RequestHandler>) -> Self {
        Self { store, handler }
    }

    /// Process one encrypted request, returning the sealed response blob.
    ///
    /// # Errors
    ///
    /// - [`Error::Unauthorized`] when session/token validation fails, with
    ///   no indication of why.
    /// - [`Error::BadRequest`] when the payload cannot be decrypted or is
    ///   not UTF-8.
    /// - [`Error::Internal`] when the response cannot be sealed.
    pub fn handle(&self, session_id: &str, eapi_hex: &str, data_hex: &str) -> Result<String> {
        self.handle_at(session_id, eapi_hex, data_hex, unix_now())
    }

    /// [`TunnelGateway::handle`] with an explicit clock, for deterministic
    /// tests.
    pub fn handle_at(
        &self,
        session_id: &str,
        eapi_hex: &str,
        data_hex: &str,
        now: i64,
    ) -> Result<String> {
        let tunnel_key = self
            .store
            .validate_and_touch_at(session_id, eapi_hex, now)?;

        let plaintext = decrypt_request(data_hex, &tunnel_key)?;
        let response = self.handler.process(&plaintext);

        aead::encrypt(response.as_bytes(), &tunnel_key)
            .map_err(|e| Error::Internal(e.to_string()))
    }
}

fn decrypt_request(data_hex: &str, tunnel_key: &[u8; 32]) -> Result<String> {
    let plaintext: Zeroizing<Vec<u8>> =
        aead::decrypt(data_hex, tunnel_key).map_err(|_| Error::BadRequest)?;
    let request = std::str::from_utf8(&plaintext).map_err(|_| Error::BadRequest)?;
    Ok(request.to_owned())
}
