//! Typed access to the persisted session tokens.
//!
//! Reads never fail: an unavailable backend or an unparsable value reads as
//! absent. Token pairs are always written as one batch.

use crate::{KeyValueStorage, MemoryStorage, StorageKeys, StorageResult, StorageWrite};
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything the store holds for one origin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
}

impl PersistedTokens {
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.expiry.is_none()
    }
}

/// Durable storage for the access token, refresh token, and expiry.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn KeyValueStorage>,
}

impl TokenStore {
    /// Create a token store over the given backend.
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    /// A store that forgets everything when the process exits.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Read a raw value.
    pub fn get(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "Token storage unavailable, treating as absent");
                None
            }
        }
    }

    /// Write a raw value.
    pub fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.storage.set(key, value)
    }

    /// Remove a raw value.
    pub fn remove(&self, key: &str) -> StorageResult<()> {
        self.storage.delete(key).map(|_| ())
    }

    pub fn access_token(&self) -> Option<String> {
        self.get(StorageKeys::ACCESS_TOKEN)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.get(StorageKeys::REFRESH_TOKEN)
    }

    /// The persisted access token expiry.
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        parse_expiry(&self.get(StorageKeys::ACCESS_TOKEN_EXPIRY)?)
    }

    /// Read all three entries in one backend read.
    pub fn snapshot(&self) -> PersistedTokens {
        let keys = [
            StorageKeys::ACCESS_TOKEN,
            StorageKeys::REFRESH_TOKEN,
            StorageKeys::ACCESS_TOKEN_EXPIRY,
        ];
        let values = match self.storage.get_many(&keys) {
            Ok(values) => values,
            Err(e) => {
                warn!(error = %e, "Token storage unavailable, treating as absent");
                return PersistedTokens::default();
            }
        };

        let mut values = values.into_iter();
        let mut next = || values.next().flatten();
        PersistedTokens {
            access_token: next(),
            refresh_token: next(),
            expiry: next().as_deref().and_then(parse_expiry),
        }
    }

    /// Persist a freshly issued token pair and its expiry in one batch.
    pub fn persist_login(
        &self,
        access_token: &str,
        refresh_token: &str,
        expiry: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.storage.apply(&[
            StorageWrite::set(StorageKeys::ACCESS_TOKEN, access_token),
            StorageWrite::set(StorageKeys::REFRESH_TOKEN, refresh_token),
            StorageWrite::set(StorageKeys::ACCESS_TOKEN_EXPIRY, format_expiry(expiry)),
        ])?;
        debug!(expires_at = %format_expiry(expiry), "Persisted token pair");
        Ok(())
    }

    /// Persist a refreshed access token and its expiry in one batch.
    pub fn persist_refresh(&self, access_token: &str, expiry: DateTime<Utc>) -> StorageResult<()> {
        self.storage.apply(&[
            StorageWrite::set(StorageKeys::ACCESS_TOKEN, access_token),
            StorageWrite::set(StorageKeys::ACCESS_TOKEN_EXPIRY, format_expiry(expiry)),
        ])?;
        debug!(expires_at = %format_expiry(expiry), "Persisted refreshed access token");
        Ok(())
    }

    /// Remove every session entry. Failures are logged, never returned.
    pub fn clear(&self) {
        let writes: Vec<StorageWrite> = StorageKeys::ALL
            .iter()
            .map(|key| StorageWrite::delete(*key))
            .collect();

        if let Err(e) = self.storage.apply(&writes) {
            warn!(error = %e, "Failed to clear token storage");
        }
    }
}

fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(expiry) => Some(expiry.with_timezone(&Utc)),
        Err(e) => {
            warn!(error = %e, "Stored token expiry is not a valid timestamp, treating as absent");
            None
        }
    }
}

/// RFC 3339 with millisecond precision and a `Z` suffix.
pub fn format_expiry(expiry: DateTime<Utc>) -> String {
    expiry.to_rfc3339_opts(SecondsFormat::Millis, true)
}
