//! Storage backends for order submissions and execution reports.
//!
//! All backends implement [`OrderDataStore`]: the SQL-backed
//! [`RelationalStore`], the in-process [`MemoryStore`], and the
//! [`ReplicationCoordinator`] composing several backends into one logical
//! store.

pub mod memory;
pub mod relational;
pub mod replicated;
pub mod rows;

pub use memory::MemoryStore;
pub use relational::{AccountSource, RelationalStore};
pub use replicated::{make_replicated_store, ReplicationCoordinator};

use async_trait::async_trait;

use crate::domain::{
    OrderId, SequencedAccountExecutionReport, SequencedAccountOrderInfo,
    SequencedAccountOrderRecord, SequencedExecutionReport, SequencedOrderRecord,
};
use crate::error::Result;
use crate::queries::AccountQuery;

/// The contract every backend implements.
///
/// Loads return joined, fully ordered results or an error, never partial
/// rows. A failed store aborts the entire batch for that call. Backends do
/// not retry; retry policy belongs to the caller.
#[async_trait]
pub trait OrderDataStore: Send + Sync {
    /// Locates one order with its account and execution reports in
    /// local-sequence order.
    async fn load_order_record(&self, id: OrderId)
        -> Result<Option<SequencedAccountOrderRecord>>;

    /// Loads all matching orders joined with their reports, ascending by
    /// global ordinal.
    async fn load_order_records(&self, query: &AccountQuery)
        -> Result<Vec<SequencedOrderRecord>>;

    /// Loads matching execution reports only, without the submission join.
    async fn load_execution_reports(
        &self,
        query: &AccountQuery,
    ) -> Result<Vec<SequencedExecutionReport>>;

    /// Persists one submission and idempotently inserts its order id into
    /// the live index.
    async fn store_order(&self, order: &SequencedAccountOrderInfo) -> Result<()>;

    /// Persists a batch of submissions; the live-index inserts cover every
    /// order id in the call.
    async fn store_orders(&self, orders: &[SequencedAccountOrderInfo]) -> Result<()>;

    /// Persists one report; a terminal status idempotently removes its
    /// order id from the live index.
    async fn store_report(&self, report: &SequencedAccountExecutionReport) -> Result<()>;

    /// Persists a batch of reports; all terminal order ids in the call are
    /// removed from the live index in one delete.
    async fn store_reports(&self, reports: &[SequencedAccountExecutionReport]) -> Result<()>;

    /// Releases resources. Idempotent; subsequent operations fail with
    /// [`StoreError::NotOpen`].
    ///
    /// [`StoreError::NotOpen`]: crate::error::StoreError::NotOpen
    async fn close(&self) -> Result<()>;
}

/// Open/close lifecycle for backends holding external resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpenState {
    Closed,
    Opening,
    Open,
    Closing,
}
