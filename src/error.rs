use thiserror::Error;

use crate::domain::AccountId;

/// Main error type for the order execution data store
#[derive(Error, Debug)]
pub enum StoreError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Backend errors
    #[error("Connection error: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("Schema error: {0}")]
    Schema(#[source] sqlx::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Lifecycle errors
    #[error("Data store is not open")]
    NotOpen,

    // Replication errors
    #[error("Write to duplicate store {replica} failed: {source}")]
    ReplicationWrite {
        replica: usize,
        #[source]
        source: Box<StoreError>,
    },

    // Registry errors
    #[error("Account {0} is not registered")]
    UnknownAccount(AccountId),
}

/// Result type alias for StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Wrap an error that occurred while writing to a duplicate store.
    pub fn replication(replica: usize, source: StoreError) -> Self {
        StoreError::ReplicationWrite {
            replica,
            source: Box::new(source),
        }
    }
}
