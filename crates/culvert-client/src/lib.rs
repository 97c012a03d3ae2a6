//! Client side of the culvert tunnel.
//!
//! A [`Client`] owns a keypair (generated per install), a session cache on
//! disk, and an HTTP connection to the server. On startup it tries to
//! resume the cached session; otherwise it runs the key exchange once and
//! caches the result so later runs skip the handshake entirely.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use zeroize::Zeroizing;

use culvert_core::handshake;
use culvert_core::wire::{HandshakeReply, TunnelReply};
use culvert_crypto::kdf::{self, KEY_LEN};
use culvert_crypto::{aead, kex::KeyPair};
use culvert_store::FileStore;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Client operation errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The HTTP request could not be sent or its body not read.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-empty `Error` field.
    #[error("server returned an error: {0}")]
    Server(String),

    /// The server's reply could not be interpreted.
    #[error("malformed server response: {0}")]
    Malformed(String),

    /// [`Client::send`] was called before a session existed.
    #[error("no session established")]
    NoSession,

    /// Protocol-level failure while completing the handshake.
    #[error("protocol failure: {0}")]
    Protocol(#[from] culvert_core::Error),

    /// Cryptographic failure.
    #[error("crypto failure: {0}")]
    Crypto(#[from] culvert_crypto::Error),

    /// The session cache file could not be read or written.
    #[error("session cache failure: {0}")]
    Cache(#[from] culvert_store::Error),
}

/// Cache keys for the persisted session.
const CACHE_SESSION_ID: &str = "SessionID";
const CACHE_K3: &str = "K3";

struct Session {
    id: String,
    tunnel_key: Zeroizing<[u8; KEY_LEN]>,
}

/// Tunnel client: keypair, cached session, and server endpoint.
pub struct Client {
    keypair: KeyPair,
    server_url: String,
    http: reqwest::blocking::Client,
    cache: FileStore,
    session: Option<Session>,
}

impl Client {
    /// Create a client for `server_url`, caching session state at
    /// `cache_path`.
    ///
    /// # Errors
    ///
    /// Fails when no keypair can be generated (fatal: the random source is
    /// unavailable) or the cache file cannot be opened.
    pub fn new(server_url: impl Into<String>, cache_path: impl AsRef<Path>) -> Result<Self> {
        let keypair = KeyPair::generate()?;
        let cache = FileStore::open(cache_path)?;
        Ok(Self {
            keypair,
            server_url: server_url.into(),
            http: reqwest::blocking::Client::new(),
            cache,
            session: None,
        })
    }

    /// Try to resume the cached session. Returns `true` when one was
    /// loaded; a missing or undecodable cache entry just means the caller
    /// should run [`Client::exchange_keys`].
    pub fn load_session(&mut self) -> bool {
        let (id, k3_hex) = match (self.cache.get(CACHE_SESSION_ID), self.cache.get(CACHE_K3)) {
            (Some(id), Some(k3)) => (id.to_owned(), k3.to_owned()),
            _ => return false,
        };

        let tunnel_key = match decode_tunnel_key(&k3_hex) {
            Some(key) => key,
            None => {
                tracing::warn!("cached tunnel key is not valid, ignoring cached session");
                return false;
            }
        };

        tracing::debug!(session_id = %id, "resumed cached session");
        self.session = Some(Session { id, tunnel_key });
        true
    }

    /// Run the key exchange, derive the tunnel key, and cache the session.
    pub fn exchange_keys(&mut self) -> Result<()> {
        let public_hex = hex::encode(self.keypair.public_key());
        let reply: HandshakeReply = self
            .http
            .post(format!("{}/exchange-keys", self.server_url))
            .form(&[("ClientPublicKey", public_hex.as_str())])
            .send()?
            .json()?;

        if !reply.error.is_empty() {
            return Err(Error::Server(reply.error));
        }

        let tunnel_key =
            handshake::complete(&self.keypair, &reply.server_public_key, &reply.session_id)?;

        self.cache.set(CACHE_SESSION_ID, reply.session_id.clone());
        self.cache.set(CACHE_K3, hex::encode(&*tunnel_key));
        self.cache.save()?;

        tracing::info!(session_id = %reply.session_id, "established tunnel session");
        self.session = Some(Session {
            id: reply.session_id,
            tunnel_key,
        });
        Ok(())
    }

    /// Send one message through the tunnel and return the decrypted reply.
    ///
    /// # Errors
    ///
    /// [`Error::NoSession`] unless [`Client::load_session`] or
    /// [`Client::exchange_keys`] succeeded first; otherwise transport,
    /// server, or decryption failures.
    pub fn send(&self, message: &str) -> Result<String> {
        let session = self.session.as_ref().ok_or(Error::NoSession)?;

        let data = aead::encrypt(message.as_bytes(), &session.tunnel_key)?;
        let eapi = current_eapi(&session.tunnel_key)?;

        let reply: TunnelReply = self
            .http
            .post(format!("{}/tunnel", self.server_url))
            .form(&[
                ("Data", data.as_str()),
                ("EAPI", eapi.as_str()),
                ("SessionID", session.id.as_str()),
            ])
            .send()?
            .json()?;

        if !reply.error.is_empty() {
            return Err(Error::Server(reply.error));
        }

        let plaintext = aead::decrypt(&reply.data, &session.tunnel_key)?;
        String::from_utf8(plaintext.to_vec())
            .map_err(|_| Error::Malformed("reply is not valid UTF-8".into()))
    }

    /// Identifier of the active session, if any.
    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.id.as_str())
    }
}

fn decode_tunnel_key(k3_hex: &str) -> Option<Zeroizing<[u8; KEY_LEN]>> {
    let bytes = hex::decode(k3_hex).ok()?;
    let key: [u8; KEY_LEN] = bytes.as_slice().try_into().ok()?;
    Some(Zeroizing::new(key))
}

fn current_eapi(tunnel_key: &[u8; KEY_LEN]) -> Result<String> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs() as i64;
    Ok(hex::encode(kdf::derive_eapi(
        tunnel_key,
        kdf::epoch_at(now),
    )?))
}
