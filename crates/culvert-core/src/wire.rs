//! Wire-level request and response types.
//!
//! Requests arrive as HTTP form fields, responses leave as JSON objects;
//! the field names below are the protocol's wire surface and must not
//! change. `Error` is empty on success.

use serde::{Deserialize, Serialize};

/// Handshake request: the client's public point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeRequest {
    /// Hex-encoded 32-byte X25519 point.
    #[serde(rename = "ClientPublicKey")]
    pub client_public_key: String,
}

/// Handshake response: the server's public point and the minted session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeReply {
    /// Hex-encoded 32-byte X25519 point.
    #[serde(rename = "ServerPublicKey", default)]
    pub server_public_key: String,
    /// Opaque session identifier.
    #[serde(rename = "SessionID", default)]
    pub session_id: String,
    /// Error message; empty on success.
    #[serde(rename = "Error", default)]
    pub error: String,
}

impl HandshakeReply {
    /// Successful reply.
    pub fn ok(server_public_key: String, session_id: String) -> Self {
        Self {
            server_public_key,
            session_id,
            error: String::new(),
        }
    }

    /// Failed reply carrying only an error message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            server_public_key: String::new(),
            session_id: String::new(),
            error: message.into(),
        }
    }
}

/// Tunnel request: one sealed application message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunnelRequest {
    /// Hex-encoded nonce ‖ ciphertext blob.
    #[serde(rename = "Data")]
    pub data: String,
    /// Hex-encoded 32-byte rolling token.
    #[serde(rename = "EAPI")]
    pub eapi: String,
    /// Session identifier from the handshake.
    #[serde(rename = "SessionID")]
    pub session_id: String,
}

/// Tunnel response: the sealed reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunnelReply {
    /// Hex-encoded nonce ‖ ciphertext blob.
    #[serde(rename = "Data", default)]
    pub data: String,
    /// Error message; empty on success.
    #[serde(rename = "Error", default)]
    pub error: String,
}

impl TunnelReply {
    /// Successful reply.
    pub fn ok(data: String) -> Self {
        Self {
            data,
            error: String::new(),
        }
    }

    /// Failed reply carrying only an error message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            data: String::new(),
            error: message.into(),
        }
    }
}
