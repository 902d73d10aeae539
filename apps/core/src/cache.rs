use rusqlite::Connection;

use crate::cache_store::{self, CacheRecord};
use crate::logging;

#[derive(Debug)]
pub enum CacheError {
    Store(rusqlite::Error),
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(error) => write!(f, "cache store error: {error}"),
        }
    }
}

impl std::error::Error for CacheError {}

impl From<rusqlite::Error> for CacheError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Store(value)
    }
}

/// Persists the last query and last selection for a session
/// identifier. Without an identifier every operation is a no-op, and
/// store failures are surfaced to the caller but must never block the
/// selection flow (callers log and continue).
pub struct CacheBridge {
    db: Option<Connection>,
    session_id: String,
}

impl CacheBridge {
    pub fn new(db: Connection, session_id: &str) -> Self {
        Self {
            db: Some(db),
            session_id: session_id.to_string(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            db: None,
            session_id: String::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.db.is_some() && !self.session_id.is_empty()
    }

    /// Writes the generation-end state: the raw query and whatever was
    /// chosen or typed.
    pub fn cache_state(&self, raw_query: &str, chosen_or_typed: &str) -> Result<(), CacheError> {
        let Some(db) = self.enabled_db() else {
            return Ok(());
        };
        let record = CacheRecord {
            last_query: raw_query.to_string(),
            last_selection: chosen_or_typed.to_string(),
        };
        cache_store::save_cache(db, &self.session_id, &record)?;
        Ok(())
    }

    pub fn clear_cache(&self) -> Result<(), CacheError> {
        let Some(db) = self.enabled_db() else {
            return Ok(());
        };
        cache_store::save_cache(db, &self.session_id, &CacheRecord::default())?;
        Ok(())
    }

    pub fn last_state(&self) -> Result<Option<CacheRecord>, CacheError> {
        let Some(db) = self.enabled_db() else {
            return Ok(None);
        };
        Ok(cache_store::load_cache(db, &self.session_id)?)
    }

    /// Picks the query a fresh generation starts with: an explicit
    /// query always wins; otherwise the cached one is restored only
    /// when it is purely alphanumeric, since anything else cannot be
    /// auto-highlighted by the presentation layer.
    pub fn initial_query(&self, explicit: &str) -> String {
        if !explicit.is_empty() {
            return explicit.to_string();
        }

        let cached = match self.last_state() {
            Ok(record) => record.unwrap_or_default().last_query,
            Err(error) => {
                logging::warn(&format!("cache read failed: {error}"));
                return String::new();
            }
        };

        if !cached.is_empty() && cached.chars().all(char::is_alphanumeric) {
            cached
        } else {
            String::new()
        }
    }

    fn enabled_db(&self) -> Option<&Connection> {
        if self.session_id.is_empty() {
            return None;
        }
        self.db.as_ref()
    }
}
