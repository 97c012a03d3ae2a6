//! End-to-end tests over real HTTP: handshake, tunnel round trips, and
//! session persistence across a server restart.

use std::net::SocketAddr;
use std::sync::Arc;

use culvert_client::Client;
use culvert_core::RequestHandler;
use culvert_server::{config::ServerConfig, Server};

fn ping_handler() -> Box<dyn RequestHandler> {
    Box::new(|request: &str| {
        if request == "ping" {
            "pong".to_string()
        } else {
            "unknown message".to_string()
        }
    })
}

/// A server running on its own runtime; dropping the runtime stops it.
struct RunningServer {
    addr: SocketAddr,
    server: Arc<Server>,
    runtime: tokio::runtime::Runtime,
}

impl RunningServer {
    fn start(config: &ServerConfig) -> Self {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let server = Server::new(config, ping_handler()).unwrap();

        let listener = runtime
            .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
            .unwrap();
        let addr = listener.local_addr().unwrap();

        let router = server.router();
        runtime.spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            addr,
            server,
            runtime,
        }
    }

    fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn stop(self) {
        self.runtime.shutdown_background();
    }
}

fn test_config(dir: &std::path::Path) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.sessions.file = dir
        .join("server_sessions.json")
        .to_string_lossy()
        .into_owned();
    config
}

#[test]
fn handshake_and_ping_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let server = RunningServer::start(&test_config(dir.path()));

    let mut client = Client::new(server.url(), dir.path().join("client_session.json")).unwrap();
    assert!(!client.load_session());
    client.exchange_keys().unwrap();

    assert_eq!(client.send("ping").unwrap(), "pong");
    assert_eq!(client.send("hello").unwrap(), "unknown message");

    server.stop();
}

#[test]
fn session_survives_server_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let cache_path = dir.path().join("client_session.json");

    let first = RunningServer::start(&config);
    let mut client = Client::new(first.url(), &cache_path).unwrap();
    client.exchange_keys().unwrap();
    assert_eq!(client.send("ping").unwrap(), "pong");
    let session_id = client.session_id().unwrap().to_owned();
    first.stop();

    // Fresh process: new keypair, same session file.
    let second = RunningServer::start(&config);
    assert!(second.server.is_session_live(&session_id));

    let mut resumed = Client::new(second.url(), &cache_path).unwrap();
    assert!(resumed.load_session());
    assert_eq!(resumed.session_id(), Some(session_id.as_str()));
    assert_eq!(resumed.send("ping").unwrap(), "pong");

    assert!(dir.path().join("server_sessions.json").exists());
    second.stop();
}

#[test]
fn two_handshakes_mint_distinct_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let server = RunningServer::start(&test_config(dir.path()));

    let mut first = Client::new(server.url(), dir.path().join("c1.json")).unwrap();
    let mut second = Client::new(server.url(), dir.path().join("c2.json")).unwrap();
    first.exchange_keys().unwrap();
    second.exchange_keys().unwrap();

    assert_ne!(first.session_id(), second.session_id());
    assert_eq!(first.send("ping").unwrap(), "pong");
    assert_eq!(second.send("ping").unwrap(), "pong");

    server.stop();
}

#[test]
fn invalid_public_key_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let server = RunningServer::start(&test_config(dir.path()));

    let response = reqwest::blocking::Client::new()
        .post(format!("{}/exchange-keys", server.url()))
        .form(&[("ClientPublicKey", "definitely-not-a-point")])
        .send()
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let reply: culvert_core::wire::HandshakeReply = response.json().unwrap();
    assert_eq!(reply.error, "Invalid ClientPublicKey");

    server.stop();
}

#[test]
fn stale_token_is_rejected_over_http() {
    use culvert_crypto::kdf::{derive_eapi, epoch_at, EPOCH_SECONDS};

    let dir = tempfile::tempdir().unwrap();
    let server = RunningServer::start(&test_config(dir.path()));
    let cache_path = dir.path().join("client_session.json");

    let mut client = Client::new(server.url(), &cache_path).unwrap();
    client.exchange_keys().unwrap();
    let session_id = client.session_id().unwrap().to_owned();

    // Recover the tunnel key from the cache and compute a token five
    // epochs in the past.
    let cache = culvert_store::FileStore::open(&cache_path).unwrap();
    let key_bytes = hex::decode(cache.get("K3").unwrap()).unwrap();
    let tunnel_key: [u8; 32] = key_bytes.as_slice().try_into().unwrap();
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;
    let stale = hex::encode(derive_eapi(&tunnel_key, epoch_at(now - 5 * EPOCH_SECONDS)).unwrap());

    let data = culvert_crypto::aead::encrypt(b"ping", &tunnel_key).unwrap();
    let response = reqwest::blocking::Client::new()
        .post(format!("{}/tunnel", server.url()))
        .form(&[
            ("Data", data.as_str()),
            ("EAPI", stale.as_str()),
            ("SessionID", session_id.as_str()),
        ])
        .send()
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
    let reply: culvert_core::wire::TunnelReply = response.json().unwrap();
    assert_eq!(reply.error, "Invalid or expired EAPI");

    // The session itself is still live.
    assert_eq!(client.send("ping").unwrap(), "pong");

    server.stop();
}
