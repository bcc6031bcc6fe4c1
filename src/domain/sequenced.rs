use serde::{Deserialize, Serialize};

use super::order::{AccountEntry, OrderInfo};
use super::report::ExecutionReport;

/// The ordinal assigned to the first record of a stream.
pub const FIRST_ORDINAL: u64 = 1;

/// A value stamped with its global per-account, per-stream ordinal.
///
/// Ordinals are assigned exactly once, at store time, and totally order one
/// account's stream; nothing is promised across accounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencedValue<T> {
    pub value: T,
    pub ordinal: u64,
}

impl<T> SequencedValue<T> {
    pub fn new(value: T, ordinal: u64) -> Self {
        Self { value, ordinal }
    }

    /// Re-stamp a different value with this value's ordinal.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> SequencedValue<U> {
        SequencedValue {
            value: f(self.value),
            ordinal: self.ordinal,
        }
    }
}

/// A value paired with the account that owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedValue<T> {
    pub value: T,
    pub index: AccountEntry,
}

impl<T> IndexedValue<T> {
    pub fn new(value: T, index: AccountEntry) -> Self {
        Self { value, index }
    }
}

/// An order submission joined with its execution reports in local-sequence
/// order. Assembled at read time; never stored as a single row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub info: OrderInfo,
    pub reports: Vec<ExecutionReport>,
}

impl OrderRecord {
    pub fn new(info: OrderInfo, reports: Vec<ExecutionReport>) -> Self {
        Self { info, reports }
    }
}

pub type SequencedOrderInfo = SequencedValue<OrderInfo>;
pub type SequencedAccountOrderInfo = SequencedValue<IndexedValue<OrderInfo>>;
pub type SequencedExecutionReport = SequencedValue<ExecutionReport>;
pub type SequencedAccountExecutionReport = SequencedValue<IndexedValue<ExecutionReport>>;
pub type SequencedOrderRecord = SequencedValue<OrderRecord>;
pub type SequencedAccountOrderRecord = SequencedValue<IndexedValue<OrderRecord>>;
