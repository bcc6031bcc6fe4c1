//! In-process data store, primarily for tests and standalone deployments.
//!
//! Implements the same contract as the SQL backend, including the live
//! index and query semantics, over plain in-memory maps. The filter tree is
//! evaluated directly against the live set instead of being translated.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::OrderDataStore;
use crate::domain::{
    AccountId, IndexedValue, OrderId, OrderRecord, SequencedAccountExecutionReport,
    SequencedAccountOrderInfo, SequencedAccountOrderRecord, SequencedExecutionReport,
    SequencedOrderRecord, SequencedValue,
};
use crate::error::{Result, StoreError};
use crate::queries::{AccountQuery, Bound, FilterExpression, Range, SnapshotLimit};

#[derive(Default)]
struct Inner {
    closed: bool,
    submissions: HashMap<OrderId, SequencedAccountOrderInfo>,
    /// Per account, ordinal -> order id, kept sorted for range scans.
    order_index: HashMap<AccountId, BTreeMap<u64, OrderId>>,
    /// Per order, reports in local-sequence order.
    reports: HashMap<OrderId, Vec<SequencedAccountExecutionReport>>,
    /// Per account, ordinal -> report, kept sorted for range scans.
    report_index: HashMap<AccountId, BTreeMap<u64, SequencedExecutionReport>>,
    live: HashSet<OrderId>,
}

/// An [`OrderDataStore`] held entirely in process memory. Ready for use on
/// construction; [`close`](OrderDataStore::close) discards all state.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn eval_filter(filter: &FilterExpression, is_live: bool) -> bool {
    match filter {
        FilterExpression::Literal(value) => *value,
        FilterExpression::IsLive => is_live,
        FilterExpression::Not(inner) => !eval_filter(inner, is_live),
        FilterExpression::And(lhs, rhs) => {
            eval_filter(lhs, is_live) && eval_filter(rhs, is_live)
        }
        FilterExpression::Or(lhs, rhs) => eval_filter(lhs, is_live) || eval_filter(rhs, is_live),
    }
}

fn in_range(range: &Range, ordinal: u64, timestamp: DateTime<Utc>) -> bool {
    let after_start = match range.start {
        Bound::First => true,
        Bound::Last => false,
        Bound::Ordinal(start) => ordinal >= start,
        Bound::Timestamp(start) => timestamp >= start,
    };
    let before_end = match range.end {
        Bound::Last => true,
        Bound::First => false,
        Bound::Ordinal(end) => ordinal <= end,
        Bound::Timestamp(end) => timestamp <= end,
    };
    after_start && before_end
}

/// Applies a snapshot limit to an ascending result set, preserving
/// ascending order for tails.
fn apply_limit<T>(mut records: Vec<T>, limit: SnapshotLimit) -> Vec<T> {
    match limit {
        SnapshotLimit::Unlimited => records,
        SnapshotLimit::Head(n) => {
            records.truncate(n);
            records
        }
        SnapshotLimit::Tail(n) => {
            if records.len() > n {
                records.drain(..records.len() - n);
            }
            records
        }
    }
}

impl Inner {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(StoreError::NotOpen)
        } else {
            Ok(())
        }
    }

    fn record_for(&self, submission: &SequencedAccountOrderInfo) -> SequencedOrderRecord {
        let reports = self
            .reports
            .get(&submission.value.value.order_id)
            .map(|reports| {
                reports
                    .iter()
                    .map(|report| report.value.value.clone())
                    .collect()
            })
            .unwrap_or_default();
        SequencedValue::new(
            OrderRecord::new(submission.value.value.clone(), reports),
            submission.ordinal,
        )
    }
}

#[async_trait]
impl OrderDataStore for MemoryStore {
    async fn load_order_record(
        &self,
        id: OrderId,
    ) -> Result<Option<SequencedAccountOrderRecord>> {
        let inner = self.inner.read().expect("memory store lock poisoned");
        inner.ensure_open()?;
        let Some(submission) = inner.submissions.get(&id) else {
            return Ok(None);
        };
        let record = inner.record_for(submission);
        Ok(Some(SequencedValue::new(
            IndexedValue::new(record.value, submission.value.index.clone()),
            record.ordinal,
        )))
    }

    async fn load_order_records(
        &self,
        query: &AccountQuery,
    ) -> Result<Vec<SequencedOrderRecord>> {
        let inner = self.inner.read().expect("memory store lock poisoned");
        inner.ensure_open()?;
        let Some(index) = inner.order_index.get(&query.account) else {
            return Ok(Vec::new());
        };
        let records = index
            .values()
            .filter_map(|order_id| inner.submissions.get(order_id))
            .filter(|submission| {
                in_range(
                    &query.range,
                    submission.ordinal,
                    submission.value.value.timestamp,
                ) && eval_filter(
                    &query.filter,
                    inner.live.contains(&submission.value.value.order_id),
                )
            })
            .map(|submission| inner.record_for(submission))
            .collect();
        Ok(apply_limit(records, query.limit))
    }

    async fn load_execution_reports(
        &self,
        query: &AccountQuery,
    ) -> Result<Vec<SequencedExecutionReport>> {
        let inner = self.inner.read().expect("memory store lock poisoned");
        inner.ensure_open()?;
        let Some(index) = inner.report_index.get(&query.account) else {
            return Ok(Vec::new());
        };
        let reports = index
            .values()
            .filter(|report| {
                in_range(&query.range, report.ordinal, report.value.timestamp)
                    && eval_filter(
                        &query.filter,
                        inner.live.contains(&report.value.order_id),
                    )
            })
            .cloned()
            .collect();
        Ok(apply_limit(reports, query.limit))
    }

    async fn store_order(&self, order: &SequencedAccountOrderInfo) -> Result<()> {
        self.store_orders(std::slice::from_ref(order)).await
    }

    async fn store_orders(&self, orders: &[SequencedAccountOrderInfo]) -> Result<()> {
        let mut inner = self.inner.write().expect("memory store lock poisoned");
        inner.ensure_open()?;
        for order in orders {
            let order_id = order.value.value.order_id;
            inner
                .order_index
                .entry(order.value.index.id)
                .or_default()
                .insert(order.ordinal, order_id);
            inner.submissions.insert(order_id, order.clone());
            inner.live.insert(order_id);
        }
        Ok(())
    }

    async fn store_report(&self, report: &SequencedAccountExecutionReport) -> Result<()> {
        self.store_reports(std::slice::from_ref(report)).await
    }

    async fn store_reports(&self, reports: &[SequencedAccountExecutionReport]) -> Result<()> {
        let mut inner = self.inner.write().expect("memory store lock poisoned");
        inner.ensure_open()?;
        for report in reports {
            inner
                .report_index
                .entry(report.value.index.id)
                .or_default()
                .insert(
                    report.ordinal,
                    SequencedValue::new(report.value.value.clone(), report.ordinal),
                );
            inner
                .reports
                .entry(report.value.value.order_id)
                .or_default()
                .push(report.clone());
            if report.value.value.status.is_terminal() {
                inner.live.remove(&report.value.value.order_id);
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut inner = self.inner.write().expect("memory store lock poisoned");
        *inner = Inner {
            closed: true,
            ..Inner::default()
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        AccountEntry, ExecutionReport, OrderFields, OrderInfo, OrderStatus, OrderType, Security,
        Side, TimeInForce, TimeInForceKind,
    };
    use rust_decimal_macros::dec;

    fn sequenced_order(
        account: &AccountEntry,
        order_id: u64,
        ordinal: u64,
    ) -> SequencedAccountOrderInfo {
        let info = OrderInfo::new(
            OrderFields {
                account: account.clone(),
                security: Security::new("ABX", "XTSE", 124),
                currency: 124,
                order_type: OrderType::Limit,
                side: Side::Buy,
                destination: "TSX".to_string(),
                quantity: dec!(100),
                price: dec!(20.50),
                time_in_force: TimeInForce::new(TimeInForceKind::Day),
                additional_fields: Vec::new(),
            },
            order_id,
            account.clone(),
            Utc::now(),
            false,
        );
        SequencedValue::new(IndexedValue::new(info, account.clone()), ordinal)
    }

    fn sequenced_report(
        account: &AccountEntry,
        order_id: u64,
        status: OrderStatus,
        ordinal: u64,
    ) -> SequencedAccountExecutionReport {
        let report = ExecutionReport::initial(order_id, status, Utc::now());
        SequencedValue::new(IndexedValue::new(report, account.clone()), ordinal)
    }

    #[tokio::test]
    async fn live_filter_tracks_terminal_reports() {
        let store = MemoryStore::new();
        let account = AccountEntry::new(1, "desk");
        store
            .store_orders(&[
                sequenced_order(&account, 10, 1),
                sequenced_order(&account, 11, 2),
            ])
            .await
            .unwrap();
        store
            .store_report(&sequenced_report(&account, 10, OrderStatus::Filled, 1))
            .await
            .unwrap();

        let live = store
            .load_order_records(&AccountQuery::total(1).live_only())
            .await
            .unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].value.info.order_id, 11);

        let terminal = store
            .load_order_records(&AccountQuery::total(1).terminal_only())
            .await
            .unwrap();
        assert_eq!(terminal.len(), 1);
        assert_eq!(terminal[0].value.info.order_id, 10);
    }

    #[tokio::test]
    async fn ranges_and_limits_apply_in_ordinal_order() {
        let store = MemoryStore::new();
        let account = AccountEntry::new(2, "desk");
        let orders: Vec<_> = (1..=5u64)
            .map(|i| sequenced_order(&account, 100 + i, i))
            .collect();
        store.store_orders(&orders).await.unwrap();

        let middle = store
            .load_order_records(&AccountQuery::total(2).with_range(Range::ordinals(2, 4)))
            .await
            .unwrap();
        let ordinals: Vec<u64> = middle.iter().map(|r| r.ordinal).collect();
        assert_eq!(ordinals, vec![2, 3, 4]);

        let tail = store
            .load_order_records(&AccountQuery::total(2).with_limit(SnapshotLimit::Tail(2)))
            .await
            .unwrap();
        let ordinals: Vec<u64> = tail.iter().map(|r| r.ordinal).collect();
        assert_eq!(ordinals, vec![4, 5]);

        let head = store
            .load_order_records(&AccountQuery::total(2).with_limit(SnapshotLimit::Head(2)))
            .await
            .unwrap();
        let ordinals: Vec<u64> = head.iter().map(|r| r.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2]);
    }

    #[tokio::test]
    async fn record_joins_reports_in_local_sequence() {
        let store = MemoryStore::new();
        let account = AccountEntry::new(3, "desk");
        store
            .store_order(&sequenced_order(&account, 42, 1))
            .await
            .unwrap();
        let first = ExecutionReport::initial(42, OrderStatus::PendingNew, Utc::now());
        let second = ExecutionReport::updated(&first, OrderStatus::New, Utc::now());
        store
            .store_reports(&[
                SequencedValue::new(IndexedValue::new(first, account.clone()), 1),
                SequencedValue::new(IndexedValue::new(second, account.clone()), 2),
            ])
            .await
            .unwrap();

        let record = store.load_order_record(42).await.unwrap().unwrap();
        let sequences: Vec<u32> = record
            .value
            .value
            .reports
            .iter()
            .map(|r| r.sequence)
            .collect();
        assert_eq!(sequences, vec![0, 1]);
        assert_eq!(record.value.index, account);
    }

    #[tokio::test]
    async fn closed_store_rejects_operations() {
        let store = MemoryStore::new();
        let account = AccountEntry::new(4, "desk");
        store
            .store_order(&sequenced_order(&account, 1, 1))
            .await
            .unwrap();
        store.close().await.unwrap();
        assert!(matches!(
            store.load_order_record(1).await,
            Err(StoreError::NotOpen)
        ));
        assert!(matches!(
            store.store_order(&sequenced_order(&account, 2, 2)).await,
            Err(StoreError::NotOpen)
        ));
    }

    #[tokio::test]
    async fn unknown_account_yields_empty_results() {
        let store = MemoryStore::new();
        assert!(store
            .load_order_records(&AccountQuery::total(99))
            .await
            .unwrap()
            .is_empty());
        assert!(store
            .load_execution_reports(&AccountQuery::total(99))
            .await
            .unwrap()
            .is_empty());
    }
}
