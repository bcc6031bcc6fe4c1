use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::AccountId;

/// One endpoint of a query range, in ordinal or timestamp space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Bound {
    /// The beginning of the stream
    First,
    /// The end of the stream
    Last,
    Ordinal(u64),
    Timestamp(DateTime<Utc>),
}

/// An inclusive range over one account's stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub start: Bound,
    pub end: Bound,
}

impl Range {
    pub fn new(start: Bound, end: Bound) -> Self {
        Self { start, end }
    }

    /// The entire stream.
    pub fn total() -> Self {
        Self {
            start: Bound::First,
            end: Bound::Last,
        }
    }

    pub fn ordinals(start: u64, end: u64) -> Self {
        Self {
            start: Bound::Ordinal(start),
            end: Bound::Ordinal(end),
        }
    }

    pub fn timestamps(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Bound::Timestamp(start),
            end: Bound::Timestamp(end),
        }
    }
}

impl Default for Range {
    fn default() -> Self {
        Self::total()
    }
}

/// How many matching records a query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotLimit {
    Unlimited,
    /// The first n records of the matching range
    Head(usize),
    /// The last n records of the matching range, still returned in
    /// ascending ordinal order
    Tail(usize),
}

impl Default for SnapshotLimit {
    fn default() -> Self {
        SnapshotLimit::Unlimited
    }
}

/// A logical filter over order submissions.
///
/// `IsLive` is the one domain-aware leaf: it selects orders currently
/// present in the live index, evaluated at query time. Everything else is
/// plain boolean structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterExpression {
    Literal(bool),
    IsLive,
    Not(Box<FilterExpression>),
    And(Box<FilterExpression>, Box<FilterExpression>),
    Or(Box<FilterExpression>, Box<FilterExpression>),
}

impl FilterExpression {
    pub fn is_live() -> Self {
        FilterExpression::IsLive
    }

    pub fn not(self) -> Self {
        FilterExpression::Not(Box::new(self))
    }

    pub fn and(self, other: FilterExpression) -> Self {
        FilterExpression::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: FilterExpression) -> Self {
        FilterExpression::Or(Box::new(self), Box::new(other))
    }
}

impl Default for FilterExpression {
    fn default() -> Self {
        FilterExpression::Literal(true)
    }
}

/// Selects a range of one account's order or report stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountQuery {
    pub account: AccountId,
    pub range: Range,
    pub limit: SnapshotLimit,
    pub filter: FilterExpression,
}

impl AccountQuery {
    /// The account's entire stream, unfiltered.
    pub fn total(account: AccountId) -> Self {
        Self {
            account,
            range: Range::total(),
            limit: SnapshotLimit::Unlimited,
            filter: FilterExpression::default(),
        }
    }

    pub fn with_range(mut self, range: Range) -> Self {
        self.range = range;
        self
    }

    pub fn with_limit(mut self, limit: SnapshotLimit) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_filter(mut self, filter: FilterExpression) -> Self {
        self.filter = filter;
        self
    }

    /// Restrict to orders currently in the live index.
    pub fn live_only(self) -> Self {
        self.with_filter(FilterExpression::IsLive)
    }

    /// Restrict to orders whose terminal report has been recorded.
    pub fn terminal_only(self) -> Self {
        self.with_filter(FilterExpression::IsLive.not())
    }
}
