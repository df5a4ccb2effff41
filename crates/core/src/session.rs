//! Authentication gate.
//!
//! Credentials are a single static username/password pair from the
//! environment. A successful login is persisted with a timestamp and
//! accepted on later runs for 24 hours, as long as the environment pair
//! has not changed. The stored password is plaintext: this gate keeps
//! casual users out, it is not a security boundary.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Storage key of the persisted session.
pub const SESSION_KEY: &str = "auth";

/// How long a persisted login stays valid.
pub fn session_ttl() -> Duration {
    Duration::hours(24)
}

/* --------------------------------------------------------------------------
Seams
-------------------------------------------------------------------------- */

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// String key/value persistence.
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, CoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), CoreError>;
    fn remove(&self, key: &str) -> Result<(), CoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, CoreError> {
        self.entries
            .lock()
            .map_err(|_| CoreError::Internal("session storage lock poisoned".into()))
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CoreError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per entry under `dir`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        match std::fs::read_to_string(self.path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path(key), value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CoreError> {
        match std::fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/* --------------------------------------------------------------------------
Session store
-------------------------------------------------------------------------- */

/// The configured username/password pair. Either may be absent, in which
/// case no login can succeed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(username: Option<String>, password: Option<String>) -> Self {
        Self { username, password }
    }

    fn matches(&self, username: &str, password: &str) -> bool {
        self.username.as_deref() == Some(username) && self.password.as_deref() == Some(password)
    }
}

/// Persisted form of a login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub username: String,
    pub password: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// Why a persisted session was rejected on restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    NoSession,
    Restored,
    Expired,
    CredentialsChanged,
    Corrupt,
}

pub struct SessionStore<C: Clock, S: SessionStorage> {
    clock: C,
    storage: S,
    credentials: Credentials,
    authenticated: bool,
}

impl<C: Clock, S: SessionStorage> SessionStore<C, S> {
    pub fn new(clock: C, storage: S, credentials: Credentials) -> Self {
        Self {
            clock,
            storage,
            credentials,
            authenticated: false,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Load the persisted session, keeping it only if it is younger than
    /// [`session_ttl`] and still matches the configured credentials.
    /// Anything else is removed from storage.
    pub fn restore(&mut self) -> Result<RestoreOutcome, CoreError> {
        self.authenticated = false;
        let Some(raw) = self.storage.get(SESSION_KEY)? else {
            return Ok(RestoreOutcome::NoSession);
        };

        let outcome = match serde_json::from_str::<StoredSession>(&raw) {
            Err(e) => {
                tracing::warn!(error = %e, "Discarding corrupt session data");
                RestoreOutcome::Corrupt
            }
            Ok(session) => {
                let age = self.clock.now().timestamp_millis() - session.timestamp;
                if age >= session_ttl().num_milliseconds() {
                    tracing::info!(age_ms = age, "Session expired");
                    RestoreOutcome::Expired
                } else if !self.credentials.matches(&session.username, &session.password) {
                    tracing::info!("Stored session no longer matches configured credentials");
                    RestoreOutcome::CredentialsChanged
                } else {
                    RestoreOutcome::Restored
                }
            }
        };

        if outcome == RestoreOutcome::Restored {
            self.authenticated = true;
        } else {
            self.storage.remove(SESSION_KEY)?;
        }
        Ok(outcome)
    }

    /// Check `username`/`password` and persist the session on success.
    pub fn login(&mut self, username: &str, password: &str) -> Result<bool, CoreError> {
        if !self.credentials.matches(username, password) {
            tracing::warn!(username = %username, "Login rejected");
            return Ok(false);
        }

        let session = StoredSession {
            username: username.to_string(),
            password: password.to_string(),
            timestamp: self.clock.now().timestamp_millis(),
        };
        let raw = serde_json::to_string(&session)
            .map_err(|e| CoreError::Internal(format!("encode session: {e}")))?;
        self.storage.set(SESSION_KEY, &raw)?;
        self.authenticated = true;
        tracing::info!(username = %username, "Logged in");
        Ok(true)
    }

    pub fn logout(&mut self) -> Result<(), CoreError> {
        self.storage.remove(SESSION_KEY)?;
        self.authenticated = false;
        Ok(())
    }

    /// Fail with [`CoreError::Unauthorized`] unless a session is active.
    pub fn require_authenticated(&self) -> Result<(), CoreError> {
        if self.authenticated {
            Ok(())
        } else {
            Err(CoreError::Unauthorized(
                "Sessão não autenticada. Execute `coloracao login` primeiro.".into(),
            ))
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}
