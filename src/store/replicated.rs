//! Replication over several data stores.
//!
//! One primary store is the source of truth; any number of duplicates
//! receive every write after the primary accepts it. Reads rotate
//! round-robin across the duplicates to spread load, falling back to the
//! primary only when no duplicates are configured.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::relational::AccountSource;
use super::{OrderDataStore, RelationalStore};
use crate::config::StoreConfig;
use crate::domain::{
    OrderId, SequencedAccountExecutionReport, SequencedAccountOrderInfo,
    SequencedAccountOrderRecord, SequencedExecutionReport, SequencedOrderRecord,
};
use crate::error::{Result, StoreError};
use crate::queries::AccountQuery;

/// Composes a primary store and its duplicates into one logical store.
pub struct ReplicationCoordinator {
    primary: Arc<dyn OrderDataStore>,
    duplicates: Vec<Arc<dyn OrderDataStore>>,
    next_reader: AtomicUsize,
}

impl ReplicationCoordinator {
    pub fn new(
        primary: Arc<dyn OrderDataStore>,
        duplicates: Vec<Arc<dyn OrderDataStore>>,
    ) -> Self {
        Self {
            primary,
            duplicates,
            next_reader: AtomicUsize::new(0),
        }
    }

    /// Picks the next store for a load. Reads rotate across the duplicates
    /// only, leaving the primary free for writes; with no duplicates every
    /// read falls back to the primary. Duplicates may lag the primary, so
    /// there is no read-after-write guarantee here.
    fn reader(&self) -> &dyn OrderDataStore {
        if self.duplicates.is_empty() {
            return self.primary.as_ref();
        }
        let cursor = self.next_reader.fetch_add(1, Ordering::Relaxed);
        self.duplicates[cursor % self.duplicates.len()].as_ref()
    }

    /// Runs a write on the primary first, then fans it out to every
    /// duplicate. A duplicate failure is reported with its position; writes
    /// to the remaining duplicates are not attempted.
    async fn fan_out<'a, F>(&'a self, write: F) -> Result<()>
    where
        F: Fn(
            &'a dyn OrderDataStore,
        )
            -> futures::future::BoxFuture<'a, Result<()>>,
    {
        write(self.primary.as_ref()).await?;
        for (i, duplicate) in self.duplicates.iter().enumerate() {
            write(duplicate.as_ref()).await.map_err(|e| {
                warn!(replica = i, error = %e, "Replica write failed");
                StoreError::replication(i, e)
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl OrderDataStore for ReplicationCoordinator {
    async fn load_order_record(
        &self,
        id: OrderId,
    ) -> Result<Option<SequencedAccountOrderRecord>> {
        self.reader().load_order_record(id).await
    }

    async fn load_order_records(
        &self,
        query: &AccountQuery,
    ) -> Result<Vec<SequencedOrderRecord>> {
        self.reader().load_order_records(query).await
    }

    async fn load_execution_reports(
        &self,
        query: &AccountQuery,
    ) -> Result<Vec<SequencedExecutionReport>> {
        self.reader().load_execution_reports(query).await
    }

    async fn store_order(&self, order: &SequencedAccountOrderInfo) -> Result<()> {
        self.fan_out(|store| Box::pin(store.store_order(order))).await
    }

    async fn store_orders(&self, orders: &[SequencedAccountOrderInfo]) -> Result<()> {
        self.fan_out(|store| Box::pin(store.store_orders(orders)))
            .await
    }

    async fn store_report(&self, report: &SequencedAccountExecutionReport) -> Result<()> {
        self.fan_out(|store| Box::pin(store.store_report(report)))
            .await
    }

    async fn store_reports(&self, reports: &[SequencedAccountExecutionReport]) -> Result<()> {
        self.fan_out(|store| Box::pin(store.store_reports(reports)))
            .await
    }

    /// Closes duplicates first, then the primary, so the source of truth
    /// outlives its copies.
    async fn close(&self) -> Result<()> {
        for duplicate in &self.duplicates {
            duplicate.close().await?;
        }
        self.primary.close().await
    }
}

/// Opens the primary and every replica named by the config and wires them
/// into a [`ReplicationCoordinator`]. With no replicas configured the
/// coordinator degenerates to a pass-through over the primary.
pub async fn make_replicated_store(
    config: &StoreConfig,
    account_source: AccountSource,
) -> Result<ReplicationCoordinator> {
    let primary = RelationalStore::new(config.database.clone(), Arc::clone(&account_source));
    primary.open().await?;
    let mut duplicates: Vec<Arc<dyn OrderDataStore>> = Vec::with_capacity(config.replicas.len());
    for replica in &config.replicas {
        let store = RelationalStore::new(replica.clone(), Arc::clone(&account_source));
        store.open().await?;
        duplicates.push(Arc::new(store));
    }
    info!(replicas = duplicates.len(), "Replicated store open");
    Ok(ReplicationCoordinator::new(Arc::new(primary), duplicates))
}
