use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::debug;

use super::allocator::{AccountSequencer, InitialSequences};
use crate::domain::{
    AccountEntry, AccountId, ExecutionReport, OrderInfo, SequencedAccountExecutionReport,
    SequencedAccountOrderInfo, FIRST_ORDINAL,
};
use crate::error::{Result, StoreError};
use crate::queries::{AccountQuery, SnapshotLimit};
use crate::store::OrderDataStore;

struct RegistryEntry {
    account: AccountEntry,
    sequencer: OnceCell<Arc<AccountSequencer>>,
}

/// Guarantees exactly one [`AccountSequencer`] exists per account.
///
/// Each registered account holds a promise slot for its sequencer; the
/// first publish runs the caller-supplied initial-sequence loader, while
/// concurrent racers block on and reuse that single result. A failed load
/// leaves the slot empty so a later publish can retry. Publishes on
/// different accounts never contend on a shared lock.
pub struct SubmissionRegistry {
    accounts: DashMap<AccountId, Arc<RegistryEntry>>,
}

impl SubmissionRegistry {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
        }
    }

    /// Marks an account as eligible for publishing. Idempotent; the
    /// sequencer itself is created lazily on first publish.
    pub fn add_account(&self, account: AccountEntry) {
        self.accounts
            .entry(account.id)
            .or_insert_with(|| {
                debug!(account = %account, "Registered account");
                Arc::new(RegistryEntry {
                    account,
                    sequencer: OnceCell::new(),
                })
            });
    }

    /// Stamps a submission with the owning account's next order ordinal.
    ///
    /// The owning account is taken from `info.fields.account`; publishing
    /// for an account never registered via [`add_account`] fails with
    /// [`StoreError::UnknownAccount`].
    ///
    /// [`add_account`]: SubmissionRegistry::add_account
    pub async fn publish_order<F, Fut>(
        &self,
        info: OrderInfo,
        load_initial: F,
    ) -> Result<SequencedAccountOrderInfo>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<InitialSequences>>,
    {
        let sequencer = self
            .sequencer(info.fields.account.id, load_initial)
            .await?;
        Ok(sequencer.publish_order(info))
    }

    /// Stamps a report with the owning account's next report ordinal.
    pub async fn publish_report<F, Fut>(
        &self,
        account: AccountId,
        report: ExecutionReport,
        load_initial: F,
    ) -> Result<SequencedAccountExecutionReport>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<InitialSequences>>,
    {
        let sequencer = self.sequencer(account, load_initial).await?;
        Ok(sequencer.publish_report(report))
    }

    async fn sequencer<F, Fut>(
        &self,
        account: AccountId,
        load_initial: F,
    ) -> Result<Arc<AccountSequencer>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<InitialSequences>>,
    {
        // Clone the entry out so no map shard lock is held across an await.
        let entry = self
            .accounts
            .get(&account)
            .map(|entry| Arc::clone(&entry))
            .ok_or(StoreError::UnknownAccount(account))?;
        let sequencer = entry
            .sequencer
            .get_or_try_init(|| async {
                let initial = load_initial().await?;
                debug!(
                    account = %entry.account,
                    next_order_ordinal = initial.next_order_ordinal,
                    next_report_ordinal = initial.next_report_ordinal,
                    "Initialized account sequencer"
                );
                Ok::<_, StoreError>(Arc::new(AccountSequencer::new(
                    entry.account.clone(),
                    initial,
                )))
            })
            .await?;
        Ok(Arc::clone(sequencer))
    }
}

impl Default for SubmissionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes an account's [`InitialSequences`] by loading the most recent
/// stored record per stream and incrementing its ordinal, or
/// [`FIRST_ORDINAL`] when the account has no history.
pub async fn load_initial_sequences(
    store: &dyn OrderDataStore,
    account: AccountId,
) -> Result<InitialSequences> {
    let query = AccountQuery::total(account).with_limit(SnapshotLimit::Tail(1));
    let last_order = store.load_order_records(&query).await?;
    let last_report = store.load_execution_reports(&query).await?;
    Ok(InitialSequences {
        next_order_ordinal: last_order
            .last()
            .map_or(FIRST_ORDINAL, |record| record.ordinal + 1),
        next_report_ordinal: last_report
            .last()
            .map_or(FIRST_ORDINAL, |report| report.ordinal + 1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        OrderFields, OrderStatus, OrderType, Security, Side, TimeInForce, TimeInForceKind,
    };
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn order_info(account: &AccountEntry, order_id: u64) -> OrderInfo {
        OrderInfo::new(
            OrderFields {
                account: account.clone(),
                security: Security::new("TST", "XTSE", 124),
                currency: 124,
                order_type: OrderType::Limit,
                side: Side::Buy,
                destination: "TSX".to_string(),
                quantity: dec!(100),
                price: dec!(1.25),
                time_in_force: TimeInForce::new(TimeInForceKind::Day),
                additional_fields: Vec::new(),
            },
            order_id,
            account.clone(),
            Utc::now(),
            false,
        )
    }

    #[tokio::test]
    async fn publish_for_unregistered_account_fails() {
        let registry = SubmissionRegistry::new();
        let account = AccountEntry::new(1, "ghost");
        let result = registry
            .publish_order(order_info(&account, 1), || async {
                Ok(InitialSequences::default())
            })
            .await;
        assert!(matches!(result, Err(StoreError::UnknownAccount(1))));
    }

    #[tokio::test]
    async fn loader_runs_once_per_account() {
        let registry = Arc::new(SubmissionRegistry::new());
        let account = AccountEntry::new(7, "desk");
        registry.add_account(account.clone());
        let loads = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..16u64 {
            let registry = Arc::clone(&registry);
            let loads = Arc::clone(&loads);
            let account = account.clone();
            handles.push(tokio::spawn(async move {
                registry
                    .publish_order(order_info(&account, i), move || async move {
                        loads.fetch_add(1, Ordering::SeqCst);
                        Ok(InitialSequences::default())
                    })
                    .await
                    .unwrap()
                    .ordinal
            }));
        }
        let mut ordinals = Vec::new();
        for handle in handles {
            ordinals.push(handle.await.unwrap());
        }
        ordinals.sort_unstable();
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(ordinals, (1..=16).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn failed_load_is_retried_on_next_publish() {
        let registry = SubmissionRegistry::new();
        let account = AccountEntry::new(9, "flaky");
        registry.add_account(account.clone());

        let result = registry
            .publish_order(order_info(&account, 1), || async {
                Err(StoreError::NotOpen)
            })
            .await;
        assert!(matches!(result, Err(StoreError::NotOpen)));

        let sequenced = registry
            .publish_order(order_info(&account, 1), || async {
                Ok(InitialSequences {
                    next_order_ordinal: 5,
                    next_report_ordinal: 1,
                })
            })
            .await
            .unwrap();
        assert_eq!(sequenced.ordinal, 5);
    }

    #[tokio::test]
    async fn accounts_sequence_independently() {
        let registry = SubmissionRegistry::new();
        let a = AccountEntry::new(1, "a");
        let b = AccountEntry::new(2, "b");
        registry.add_account(a.clone());
        registry.add_account(b.clone());

        let first_a = registry
            .publish_order(order_info(&a, 1), || async {
                Ok(InitialSequences::default())
            })
            .await
            .unwrap();
        let first_b = registry
            .publish_order(order_info(&b, 2), || async {
                Ok(InitialSequences::default())
            })
            .await
            .unwrap();
        assert_eq!(first_a.ordinal, 1);
        assert_eq!(first_b.ordinal, 1);
        assert_eq!(first_a.value.index, a);
        assert_eq!(first_b.value.index, b);

        let report = ExecutionReport::initial(1, OrderStatus::PendingNew, Utc::now());
        let sequenced = registry
            // Loader must not run again for an initialized account; if it
            // did, the publish would fail and the unwrap below would catch it.
            .publish_report(a.id, report, || async { Err(StoreError::NotOpen) })
            .await
            .unwrap();
        assert_eq!(sequenced.ordinal, 1);
    }
}
