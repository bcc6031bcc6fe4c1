//! Order execution data store with per-account sequencing and replication.
//!
//! The crate persists order submissions and their execution reports,
//! stamping every record with a per-account ordinal so each account's
//! history forms a totally ordered stream. Three backends implement the
//! [`OrderDataStore`] contract: the SQL-backed [`RelationalStore`], the
//! in-process [`MemoryStore`], and the [`ReplicationCoordinator`] that
//! mirrors writes across several stores while rotating reads.
//!
//! Ordinal allocation lives in the [`sequencer`] module: a
//! [`SubmissionRegistry`] lazily creates one [`AccountSequencer`] per
//! account, bootstrapping it from the store exactly once even under
//! concurrent publishes.
//!
//! [`AccountSequencer`]: sequencer::AccountSequencer

pub mod config;
pub mod domain;
pub mod error;
pub mod queries;
pub mod sequencer;
pub mod store;

pub use config::{DatabaseConfig, LoggingConfig, StoreConfig};
pub use error::{Result, StoreError};
pub use queries::{AccountQuery, FilterExpression, Range, SnapshotLimit};
pub use sequencer::{load_initial_sequences, SubmissionRegistry};
pub use store::{
    make_replicated_store, MemoryStore, OrderDataStore, RelationalStore, ReplicationCoordinator,
};
