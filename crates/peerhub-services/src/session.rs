//! Login sessions, with tokens persisted in SQLite.
//!
//! Sessions have a fixed lifetime and are never extended. Expiry is lazy:
//! `validate` deletes a stale row when it sees one. `cleanup_expired` is
//! the bulk sweep run periodically by the daemon.
//!
//! The async methods run the SQLite work on tokio's blocking pool. The
//! `*_at` and `*_sync` methods do the same work on the calling thread.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rand::RngCore;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use peerhub_core::now_millis;

/// One authenticated login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    /// Opaque token, 64 hex chars.
    pub id: String,
    pub username: String,
    /// Unix milliseconds.
    pub created_at: u64,
    /// Unix milliseconds. Valid while `now <= expires_at`.
    pub expires_at: u64,
}

impl Session {
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms > self.expires_at
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session expired")]
    Expired,
    #[error("session not found")]
    NotFound,
    #[error("session storage: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("session task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS sessions (
        session_id TEXT PRIMARY KEY,
        username   TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        expires_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);
";

/// SQLite-backed session table.
///
/// Cheap to clone; all clones share one connection, so storage access is
/// serialized per store.
#[derive(Clone)]
pub struct SessionStore {
    conn: Arc<Mutex<Connection>>,
    ttl: Duration,
}

impl SessionStore {
    /// Open (or create) the session database at `path`.
    pub fn open(path: &Path, ttl: Duration) -> Result<Self, SessionError> {
        Self::with_connection(Connection::open(path)?, ttl)
    }

    /// Non-persistent store, for tests and throwaway instances.
    pub fn in_memory(ttl: Duration) -> Result<Self, SessionError> {
        Self::with_connection(Connection::open_in_memory()?, ttl)
    }

    fn with_connection(conn: Connection, ttl: Duration) -> Result<Self, SessionError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            ttl,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against this store on the blocking pool.
    async fn offload<F, R>(&self, f: F) -> Result<R, SessionError>
    where
        F: FnOnce(&SessionStore) -> Result<R, SessionError> + Send + 'static,
        R: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(&store)).await?
    }

    pub async fn create(&self, username: &str) -> Result<Session, SessionError> {
        let username = username.to_string();
        self.offload(move |s| s.create_at(&username, now_millis())).await
    }

    /// Create a session as if the current time were `now_ms`.
    pub fn create_at(&self, username: &str, now_ms: u64) -> Result<Session, SessionError> {
        let session = Session {
            id: new_token(),
            username: username.to_string(),
            created_at: now_ms,
            expires_at: now_ms + self.ttl.as_millis() as u64,
        };

        self.lock().execute(
            "INSERT INTO sessions (session_id, username, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                session.id,
                session.username,
                session.created_at as i64,
                session.expires_at as i64
            ],
        )?;

        tracing::info!(
            session_id = &session.id[..16],
            username = %session.username,
            "session created"
        );
        Ok(session)
    }

    pub async fn validate(&self, token: &str) -> Result<Session, SessionError> {
        let token = token.to_string();
        self.offload(move |s| s.validate_at(&token, now_millis())).await
    }

    /// Look up `token` as of `now_ms`, deleting it if it has expired.
    pub fn validate_at(&self, token: &str, now_ms: u64) -> Result<Session, SessionError> {
        if token.is_empty() {
            return Err(SessionError::NotFound);
        }
        let conn = self.lock();
        let session = conn
            .query_row(
                "SELECT session_id, username, created_at, expires_at
                 FROM sessions WHERE session_id = ?1",
                params![token],
                |row| {
                    Ok(Session {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        created_at: row.get::<_, i64>(2)? as u64,
                        expires_at: row.get::<_, i64>(3)? as u64,
                    })
                },
            )
            .optional()?
            .ok_or(SessionError::NotFound)?;

        if session.is_expired_at(now_ms) {
            conn.execute("DELETE FROM sessions WHERE session_id = ?1", params![token])?;
            tracing::info!(session_id = short(token), "session expired");
            return Err(SessionError::Expired);
        }
        Ok(session)
    }

    pub async fn destroy(&self, token: &str) -> Result<bool, SessionError> {
        let token = token.to_string();
        self.offload(move |s| s.destroy_sync(&token)).await
    }

    /// Remove a session. Returns whether a row existed; absence is not an error.
    pub fn destroy_sync(&self, token: &str) -> Result<bool, SessionError> {
        let removed = self
            .lock()
            .execute("DELETE FROM sessions WHERE session_id = ?1", params![token])?;
        if removed > 0 {
            tracing::info!(session_id = short(token), "session destroyed");
        }
        Ok(removed > 0)
    }

    pub async fn cleanup_expired(&self) -> Result<usize, SessionError> {
        self.offload(|s| s.cleanup_expired_at(now_millis())).await
    }

    /// Delete every session that expired before `now_ms`.
    pub fn cleanup_expired_at(&self, now_ms: u64) -> Result<usize, SessionError> {
        let count = self.lock().execute(
            "DELETE FROM sessions WHERE expires_at < ?1",
            params![now_ms as i64],
        )?;
        if count > 0 {
            tracing::info!(count, "cleaned up expired sessions");
        }
        Ok(count)
    }

    pub async fn active_count(&self) -> Result<usize, SessionError> {
        self.offload(|s| s.active_count_at(now_millis())).await
    }

    pub fn active_count_at(&self, now_ms: u64) -> Result<usize, SessionError> {
        let count: i64 = self.lock().query_row(
            "SELECT COUNT(*) FROM sessions WHERE expires_at >= ?1",
            params![now_ms as i64],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn new_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn short(token: &str) -> &str {
    token.get(..16).unwrap_or(token)
}
