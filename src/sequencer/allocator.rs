use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::{
    AccountEntry, ExecutionReport, IndexedValue, OrderInfo, SequencedAccountExecutionReport,
    SequencedAccountOrderInfo, SequencedValue, FIRST_ORDINAL,
};

/// The next ordinal to assign on each of an account's two streams.
///
/// Normally computed once per account by [`load_initial_sequences`], which
/// scans the backing store for the most recent record per stream.
///
/// [`load_initial_sequences`]: crate::sequencer::load_initial_sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitialSequences {
    pub next_order_ordinal: u64,
    pub next_report_ordinal: u64,
}

impl Default for InitialSequences {
    fn default() -> Self {
        Self {
            next_order_ordinal: FIRST_ORDINAL,
            next_report_ordinal: FIRST_ORDINAL,
        }
    }
}

/// Issues gap-free, strictly increasing ordinals for one account's order
/// submissions and execution reports.
///
/// The two streams use independent lock-free counters, so publishing an
/// order never contends with publishing a report. Safe for any number of
/// concurrent callers; performs no I/O and cannot fail. Ordinal overflow is
/// out of scope (the 64-bit space is assumed sufficient).
#[derive(Debug)]
pub struct AccountSequencer {
    account: AccountEntry,
    next_order_ordinal: AtomicU64,
    next_report_ordinal: AtomicU64,
}

impl AccountSequencer {
    pub fn new(account: AccountEntry, initial: InitialSequences) -> Self {
        Self {
            account,
            next_order_ordinal: AtomicU64::new(initial.next_order_ordinal),
            next_report_ordinal: AtomicU64::new(initial.next_report_ordinal),
        }
    }

    pub fn account(&self) -> &AccountEntry {
        &self.account
    }

    /// Stamps a submission with the account and the next order ordinal.
    pub fn publish_order(&self, info: OrderInfo) -> SequencedAccountOrderInfo {
        let ordinal = self.next_order_ordinal.fetch_add(1, Ordering::AcqRel);
        SequencedValue::new(IndexedValue::new(info, self.account.clone()), ordinal)
    }

    /// Stamps a report with the account and the next report ordinal.
    pub fn publish_report(&self, report: ExecutionReport) -> SequencedAccountExecutionReport {
        let ordinal = self.next_report_ordinal.fetch_add(1, Ordering::AcqRel);
        SequencedValue::new(IndexedValue::new(report, self.account.clone()), ordinal)
    }
}
