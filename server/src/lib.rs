//! culvert tunnel server.
//!
//! Exposes the two protocol endpoints over HTTP:
//! - `POST /exchange-keys` — X25519 handshake, mints a session
//! - `POST /tunnel` — one authenticated, encrypted round trip
//!
//! The server keypair is generated once per process. The session table
//! lives in memory and is snapshotted to a flat key-value file after every
//! handshake so established sessions survive a restart (a fresh keypair
//! does not invalidate them: once derived, a tunnel key no longer depends
//! on the server scalar).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::post;
use axum::Router;
use parking_lot::Mutex;

use culvert_core::store::{PersistedSession, SessionStore};
use culvert_core::wire::{HandshakeReply, HandshakeRequest, TunnelReply, TunnelRequest};
use culvert_core::{handshake, Error, RequestHandler, TunnelGateway};
use culvert_crypto::kex::KeyPair;
use culvert_store::FileStore;

pub mod config;

use config::ServerConfig;

/// Shared server state behind every request worker.
pub struct Server {
    keypair: KeyPair,
    store: Arc<SessionStore>,
    gateway: TunnelGateway,
    sessions_file: Mutex<FileStore>,
}

impl Server {
    /// Build the server: generate the process keypair, restore any
    /// persisted sessions, and wire the tunnel gateway to `handler`.
    ///
    /// # Errors
    ///
    /// Fails when the keypair cannot be generated (fatal: no secure random
    /// source) or the session file cannot be opened.
    pub fn new(config: &ServerConfig, handler: Box<dyn RequestHandler>) -> anyhow::Result<Arc<Self>> {
        let keypair = KeyPair::generate()?;
        let store = Arc::new(SessionStore::new());

        let sessions_file = FileStore::open(&config.sessions.file)?;
        store.restore(load_sessions(&sessions_file));
        if !store.is_empty() {
            tracing::info!(count = store.len(), "restored persisted sessions");
        }

        let gateway = TunnelGateway::new(store.clone(), handler);
        Ok(Arc::new(Self {
            keypair,
            store,
            gateway,
            sessions_file: Mutex::new(sessions_file),
        }))
    }

    /// Whether a session id is currently present in the live table.
    pub fn is_session_live(&self, session_id: &str) -> bool {
        self.store.contains(session_id)
    }

    /// Router serving both protocol endpoints.
    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .route("/exchange-keys", post(exchange_keys))
            .route("/tunnel", post(tunnel))
            .with_state(self.clone())
    }

    /// Snapshot the session table to the session file. Persistence is
    /// best-effort: a failed write is logged, never surfaced to the peer.
    fn persist_sessions(&self) {
        let mut file = self.sessions_file.lock();
        file.clear();
        for session in self.store.snapshot() {
            let value = format!(
                "{}|{}|{}",
                hex::encode(&*session.tunnel_key),
                session.expires_at,
                session.last_used
            );
            file.set(session.session_id, value);
        }
        if let Err(err) = file.save() {
            tracing::warn!(error = %err, "failed to persist session table");
        }
    }
}

fn load_sessions(file: &FileStore) -> Vec<PersistedSession> {
    let mut sessions = Vec::new();
    for (id, value) in file.iter() {
        match decode_session(id, value) {
            Some(session) => sessions.push(session),
            None => tracing::warn!(session_id = id, "skipping malformed session entry"),
        }
    }
    sessions
}

fn decode_session(id: &str, value: &str) -> Option<PersistedSession> {
    let mut parts = value.split('|');
    let key_bytes = hex::decode(parts.next()?).ok()?;
    let tunnel_key: [u8; 32] = key_bytes.as_slice().try_into().ok()?;
    let expires_at = parts.next()?.parse().ok()?;
    let last_used = parts.next()?.parse().ok()?;
    Some(PersistedSession::new(id, tunnel_key, last_used, expires_at))
}

async fn exchange_keys(
    State(server): State<Arc<Server>>,
    Form(request): Form<HandshakeRequest>,
) -> (StatusCode, Json<HandshakeReply>) {
    match handshake::accept(&server.keypair, &server.store, &request.client_public_key) {
        Ok(outcome) => {
            tracing::info!(session_id = %outcome.session_id, "key exchange completed");
            server.persist_sessions();
            (
                StatusCode::OK,
                Json(HandshakeReply::ok(
                    outcome.server_public_key,
                    outcome.session_id,
                )),
            )
        }
        Err(Error::InvalidPeerKey) => (
            StatusCode::BAD_REQUEST,
            Json(HandshakeReply::error("Invalid ClientPublicKey")),
        ),
        Err(err) => {
            tracing::error!(error = %err, "key exchange failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(HandshakeReply::error("Failed to establish session")),
            )
        }
    }
}

async fn tunnel(
    State(server): State<Arc<Server>>,
    Form(request): Form<TunnelRequest>,
) -> (StatusCode, Json<TunnelReply>) {
    match server
        .gateway
        .handle(&request.session_id, &request.eapi, &request.data)
    {
        Ok(data) => (StatusCode::OK, Json(TunnelReply::ok(data))),
        Err(Error::Unauthorized) => {
            tracing::debug!(session_id = %request.session_id, "rejected tunnel request");
            (
                StatusCode::UNAUTHORIZED,
                Json(TunnelReply::error("Invalid or expired EAPI")),
            )
        }
        Err(Error::BadRequest) => (
            StatusCode::BAD_REQUEST,
            Json(TunnelReply::error("Failed to decrypt")),
        ),
        Err(err) => {
            tracing::error!(error = %err, "tunnel request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(TunnelReply::error("Failed to encrypt response")),
            )
        }
    }
}

/// Bind the configured address and serve until the process exits.
pub async fn run(config: ServerConfig, handler: Box<dyn RequestHandler>) -> anyhow::Result<()> {
    let server = Server::new(&config, handler)?;
    let listener = tokio::net::TcpListener::bind(&config.network.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "culvert server listening");
    axum::serve(listener, server.router()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_entry_encoding_round_trips() {
        let decoded = decode_session("s1", &format!("{}|{}|{}", "ab".repeat(32), 200, 100))
            .unwrap();
        assert_eq!(decoded.session_id, "s1");
        assert_eq!(&*decoded.tunnel_key, &[0xabu8; 32]);
        assert_eq!(decoded.expires_at, 200);
        assert_eq!(decoded.last_used, 100);
    }

    #[test]
    fn malformed_session_entries_are_skipped() {
        assert!(decode_session("s1", "not-hex|1|2").is_none());
        assert!(decode_session("s1", &"ab".repeat(32)).is_none());
        assert!(decode_session("s1", &format!("{}|x|2", "ab".repeat(32))).is_none());
    }
}
