//! Server-side session table.
//!
//! Each entry moves through a small state machine: absent → active
//! (created by a successful handshake) → absent again (deleted on the
//! first access after expiry). The tunnel key and expiry never change
//! while a record exists; only `last_used` mutates.
//!
//! The table is shared mutable state across all request workers and is
//! guarded by a single reader/writer lock. [`SessionStore::validate_and_touch`]
//! is one logically atomic step — lookup, conditional expiry-delete, token
//! check, and touch all happen under one writer guard so a record can never
//! be deleted between the existence check and the dereference.
//!
//! Expiry is purely lazy; there is no background sweeper.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use culvert_crypto::kdf::{derive_eapi, epoch_at, KEY_LEN};

use crate::{Error, Result};

/// Session lifetime in seconds (24 hours from creation).
pub const SESSION_TTL_SECS: i64 = 24 * 60 * 60;

/// State held for one active session.
struct SessionRecord {
    /// Tunnel key (K3). Immutable after creation.
    tunnel_key: Zeroizing<[u8; KEY_LEN]>,
    /// Unix seconds of the last authenticated request. Monotonic
    /// non-decreasing while the record exists.
    last_used: i64,
    /// Unix seconds after which the record is dead.
    expires_at: i64,
}

/// Snapshot of one live session for the persistence collaborator.
///
/// The store itself never touches the disk; the surrounding process can
/// export and re-import records across restarts through these.
pub struct PersistedSession {
    /// Opaque session identifier.
    pub session_id: String,
    /// Tunnel key (K3).
    pub tunnel_key: Zeroizing<[u8; KEY_LEN]>,
    /// Unix seconds of the last authenticated request.
    pub last_used: i64,
    /// Unix seconds after which the session is dead.
    pub expires_at: i64,
}

impl PersistedSession {
    /// Assemble a snapshot entry from its raw parts.
    pub fn new(
        session_id: impl Into<String>,
        tunnel_key: [u8; KEY_LEN],
        last_used: i64,
        expires_at: i64,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            tunnel_key: Zeroizing::new(tunnel_key),
            last_used,
            expires_at,
        }
    }
}

/// Concurrent map from session identifier to session state.
///
/// Instantiate one per server and inject it into the protocol handlers;
/// there is no ambient global table, so tests can run isolated stores.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly negotiated session expiring [`SESSION_TTL_SECS`]
    /// from now.
    pub fn create(&self, session_id: &str, tunnel_key: &[u8; KEY_LEN]) {
        self.create_at(session_id, tunnel_key, unix_now());
    }

    /// [`SessionStore::create`] with an explicit clock, for deterministic
    /// tests.
    pub fn create_at(&self, session_id: &str, tunnel_key: &[u8; KEY_LEN], now: i64) {
        let record = SessionRecord {
            tunnel_key: Zeroizing::new(*tunnel_key),
            last_used: now,
            expires_at: now + SESSION_TTL_SECS,
        };
        // Identifiers are server-minted UUIDs; a collision is treated as
        // negligible and overwrites silently.
        self.sessions.write().insert(session_id.to_owned(), record);
    }

    /// Validate a presented rolling token and touch the session.
    ///
    /// Accepts the token for the current epoch or the immediately prior
    /// one — requests computed just before an epoch boundary must still
    /// validate, and one extra window bounds the replay-acceptance
    /// surface. On success `last_used` is updated and the tunnel key is
    /// returned.
    ///
    /// # Errors
    ///
    /// [`Error::Unauthorized`] for every validation outcome: unknown
    /// session, expired session (which is deleted on the spot), undecodable
    /// token, and token mismatch are indistinguishable to the caller.
    pub fn validate_and_touch(
        &self,
        session_id: &str,
        presented_eapi: &str,
    ) -> Result<Zeroizing<[u8; KEY_LEN]>> {
        self.validate_and_touch_at(session_id, presented_eapi, unix_now())
    }

    /// [`SessionStore::validate_and_touch`] with an explicit clock.
    pub fn validate_and_touch_at(
        &self,
        session_id: &str,
        presented_eapi: &str,
        now: i64,
    ) -> Result<Zeroizing<[u8; KEY_LEN]>> {
        // One writer guard across the whole lookup/expire/compare/touch
        // sequence.
        let mut sessions = self.sessions.write();

        let expired = match sessions.get(session_id) {
            None => return Err(Error::Unauthorized),
            Some(record) => now > record.expires_at,
        };
        if expired {
            sessions.remove(session_id);
            return Err(Error::Unauthorized);
        }

        let presented = decode_token(presented_eapi).ok_or(Error::Unauthorized)?;

        let record = sessions.get_mut(session_id).ok_or(Error::Unauthorized)?;
        let epoch = epoch_at(now);
        if !token_matches(&record.tunnel_key, epoch, &presented)?
            && !token_matches(&record.tunnel_key, epoch - 1, &presented)?
        {
            return Err(Error::Unauthorized);
        }

        record.last_used = record.last_used.max(now);
        Ok(record.tunnel_key.clone())
    }

    /// Export all live records for persistence.
    pub fn snapshot(&self) -> Vec<PersistedSession> {
        let sessions = self.sessions.read();
        sessions
            .iter()
            .map(|(id, record)| PersistedSession {
                session_id: id.clone(),
                tunnel_key: record.tunnel_key.clone(),
                last_used: record.last_used,
                expires_at: record.expires_at,
            })
            .collect()
    }

    /// Re-import persisted records, dropping any that are already expired.
    pub fn restore(&self, persisted: impl IntoIterator<Item = PersistedSession>) {
        self.restore_at(persisted, unix_now());
    }

    /// [`SessionStore::restore`] with an explicit clock.
    pub fn restore_at(&self, persisted: impl IntoIterator<Item = PersistedSession>, now: i64) {
        let mut sessions = self.sessions.write();
        for entry in persisted {
            if now > entry.expires_at {
                continue;
            }
            sessions.insert(
                entry.session_id,
                SessionRecord {
                    tunnel_key: entry.tunnel_key,
                    last_used: entry.last_used,
                    expires_at: entry.expires_at,
                },
            );
        }
    }

    /// Number of records currently in the table (live or not-yet-reaped).
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Whether a record exists for `session_id` (expired-but-unreaped
    /// records count).
    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().contains_key(session_id)
    }

    /// `last_used` of a record, for diagnostics.
    pub fn last_used(&self, session_id: &str) -> Option<i64> {
        self.sessions.read().get(session_id).map(|r| r.last_used)
    }
}

fn token_matches(k3: &[u8; KEY_LEN], epoch: i64, presented: &[u8; KEY_LEN]) -> Result<bool> {
    let expected = derive_eapi(k3, epoch)?;
    Ok(bool::from(expected.ct_eq(presented)))
}

fn decode_token(presented: &str) -> Option<[u8; KEY_LEN]> {
    let bytes = hex::decode(presented).ok()?;
    bytes.as_slice().try_into().ok()
}

/// Current unix time in whole seconds.
pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs() as i64
}
