//! Token persistence for the IAM session client.
//!
//! This crate provides:
//! - A `KeyValueStorage` backend trait with batch writes
//! - **Memory** storage for tests and ephemeral sessions
//! - **File** storage, one JSON document per origin, surviving restarts
//! - `TokenStore`, the typed facade the session layer talks to

mod file;
mod keys;
mod memory;
mod token_store;
mod traits;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use token_store::{format_expiry, PersistedTokens, TokenStore};
pub use traits::{KeyValueStorage, StorageWrite};

use session_config_and_utils::Paths;
use std::sync::Arc;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend cannot be reached (disabled, locked, missing permissions)
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create the default storage backend for an origin.
pub fn create_storage(paths: &Paths, origin: &str) -> Arc<dyn KeyValueStorage> {
    Arc::new(FileStorage::new(paths.token_store_file(origin)))
}

/// Create a TokenStore with the default storage backend for an origin.
pub fn create_token_store(paths: &Paths, origin: &str) -> TokenStore {
    TokenStore::new(create_storage(paths, origin))
}
