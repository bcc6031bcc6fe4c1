use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::order::OrderId;
use crate::error::StoreError;

/// Order status carried by an execution report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Acknowledged locally, not yet accepted by the venue
    PendingNew,
    /// Accepted by the venue
    New,
    PartiallyFilled,
    Filled,
    Suspended,
    Canceled,
    Rejected,
    Expired,
    DoneForDay,
    PendingCancel,
    CancelReject,
}

impl OrderStatus {
    /// A terminal status ends an order's report stream; no further reports
    /// are expected once one is recorded.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Canceled
                | OrderStatus::Rejected
                | OrderStatus::Expired
                | OrderStatus::DoneForDay
        )
    }

    pub fn is_live(&self) -> bool {
        !self.is_terminal()
    }

    pub(crate) fn to_db(self) -> i64 {
        match self {
            OrderStatus::PendingNew => 0,
            OrderStatus::New => 1,
            OrderStatus::PartiallyFilled => 2,
            OrderStatus::Filled => 3,
            OrderStatus::Suspended => 4,
            OrderStatus::Canceled => 5,
            OrderStatus::Rejected => 6,
            OrderStatus::Expired => 7,
            OrderStatus::DoneForDay => 8,
            OrderStatus::PendingCancel => 9,
            OrderStatus::CancelReject => 10,
        }
    }

    pub(crate) fn from_db(value: i64) -> Result<Self, StoreError> {
        match value {
            0 => Ok(OrderStatus::PendingNew),
            1 => Ok(OrderStatus::New),
            2 => Ok(OrderStatus::PartiallyFilled),
            3 => Ok(OrderStatus::Filled),
            4 => Ok(OrderStatus::Suspended),
            5 => Ok(OrderStatus::Canceled),
            6 => Ok(OrderStatus::Rejected),
            7 => Ok(OrderStatus::Expired),
            8 => Ok(OrderStatus::DoneForDay),
            9 => Ok(OrderStatus::PendingCancel),
            10 => Ok(OrderStatus::CancelReject),
            other => Err(StoreError::Serialization(format!(
                "invalid order status code: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::PendingNew => "PENDING_NEW",
            OrderStatus::New => "NEW",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Suspended => "SUSPENDED",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Expired => "EXPIRED",
            OrderStatus::DoneForDay => "DONE_FOR_DAY",
            OrderStatus::PendingCancel => "PENDING_CANCEL",
            OrderStatus::CancelReject => "CANCEL_REJECT",
        };
        write!(f, "{s}")
    }
}

/// An immutable status update appended to an order's report stream.
///
/// `sequence` is the per-order local sequence, starting at 0 and strictly
/// increasing; it is distinct from the global per-account ordinal stamped at
/// store time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub order_id: OrderId,
    pub sequence: u32,
    pub timestamp: DateTime<Utc>,
    pub status: OrderStatus,
    pub last_quantity: Decimal,
    pub last_price: Decimal,
    pub liquidity_flag: String,
    pub last_market: String,
    pub execution_fee: Decimal,
    pub processing_fee: Decimal,
    pub commission: Decimal,
    pub text: String,
}

impl ExecutionReport {
    /// The first report of an order's stream, at local sequence 0.
    pub fn initial(order_id: OrderId, status: OrderStatus, timestamp: DateTime<Utc>) -> Self {
        Self {
            order_id,
            sequence: 0,
            timestamp,
            status,
            last_quantity: Decimal::ZERO,
            last_price: Decimal::ZERO,
            liquidity_flag: String::new(),
            last_market: String::new(),
            execution_fee: Decimal::ZERO,
            processing_fee: Decimal::ZERO,
            commission: Decimal::ZERO,
            text: String::new(),
        }
    }

    /// The next report in a stream, continuing the local sequence chain.
    pub fn updated(previous: &Self, status: OrderStatus, timestamp: DateTime<Utc>) -> Self {
        Self {
            order_id: previous.order_id,
            sequence: previous.sequence + 1,
            timestamp,
            status,
            last_quantity: Decimal::ZERO,
            last_price: Decimal::ZERO,
            liquidity_flag: String::new(),
            last_market: String::new(),
            execution_fee: Decimal::ZERO,
            processing_fee: Decimal::ZERO,
            commission: Decimal::ZERO,
            text: String::new(),
        }
    }

    pub fn with_fill(mut self, quantity: Decimal, price: Decimal) -> Self {
        self.last_quantity = quantity;
        self.last_price = price;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }
}
