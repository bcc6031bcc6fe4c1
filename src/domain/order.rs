use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Numeric account identifier.
pub type AccountId = u32;

/// Order identifier, assigned externally at submission time and never reused.
pub type OrderId = u64;

/// A resolved trading identity. Identity is determined by `id` alone; the
/// name is display metadata filled in by the account source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountEntry {
    pub id: AccountId,
    pub name: String,
}

impl AccountEntry {
    pub fn new(id: AccountId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// An account entry known only by id, before identity resolution.
    pub fn unresolved(id: AccountId) -> Self {
        Self {
            id,
            name: String::new(),
        }
    }
}

impl PartialEq for AccountEntry {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for AccountEntry {}

impl std::fmt::Display for AccountEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.id)
        } else {
            write!(f, "{} ({})", self.name, self.id)
        }
    }
}

/// The instrument an order trades.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Security {
    pub symbol: String,
    pub market: String,
    pub country: u32,
}

impl Security {
    pub fn new(symbol: impl Into<String>, market: impl Into<String>, country: u32) -> Self {
        Self {
            symbol: symbol.into(),
            market: market.into(),
            country,
        }
    }
}

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub(crate) fn to_db(self) -> i64 {
        match self {
            Side::Buy => 0,
            Side::Sell => 1,
        }
    }

    pub(crate) fn from_db(value: i64) -> Result<Self, StoreError> {
        match value {
            0 => Ok(Side::Buy),
            1 => Ok(Side::Sell),
            other => Err(StoreError::Serialization(format!(
                "invalid order side code: {other}"
            ))),
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Market,
    Limit,
    Pegged,
    Stop,
}

impl OrderType {
    pub(crate) fn to_db(self) -> i64 {
        match self {
            OrderType::Market => 0,
            OrderType::Limit => 1,
            OrderType::Pegged => 2,
            OrderType::Stop => 3,
        }
    }

    pub(crate) fn from_db(value: i64) -> Result<Self, StoreError> {
        match value {
            0 => Ok(OrderType::Market),
            1 => Ok(OrderType::Limit),
            2 => Ok(OrderType::Pegged),
            3 => Ok(OrderType::Stop),
            other => Err(StoreError::Serialization(format!(
                "invalid order type code: {other}"
            ))),
        }
    }
}

/// Time in force policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForceKind {
    /// Good for the trading day
    Day,
    /// Good till cancelled
    Gtc,
    /// At the opening
    Opg,
    /// Immediate or cancel
    Ioc,
    /// Fill or kill
    Fok,
    /// Good till date (uses the expiry field)
    Gtd,
    /// At market close
    Moc,
}

impl TimeInForceKind {
    pub(crate) fn to_db(self) -> i64 {
        match self {
            TimeInForceKind::Day => 0,
            TimeInForceKind::Gtc => 1,
            TimeInForceKind::Opg => 2,
            TimeInForceKind::Ioc => 3,
            TimeInForceKind::Fok => 4,
            TimeInForceKind::Gtd => 5,
            TimeInForceKind::Moc => 6,
        }
    }

    pub(crate) fn from_db(value: i64) -> Result<Self, StoreError> {
        match value {
            0 => Ok(TimeInForceKind::Day),
            1 => Ok(TimeInForceKind::Gtc),
            2 => Ok(TimeInForceKind::Opg),
            3 => Ok(TimeInForceKind::Ioc),
            4 => Ok(TimeInForceKind::Fok),
            5 => Ok(TimeInForceKind::Gtd),
            6 => Ok(TimeInForceKind::Moc),
            other => Err(StoreError::Serialization(format!(
                "invalid time in force code: {other}"
            ))),
        }
    }
}

/// Time in force with optional expiry (only meaningful for Gtd).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInForce {
    pub kind: TimeInForceKind,
    pub expiry: Option<DateTime<Utc>>,
}

impl TimeInForce {
    pub fn new(kind: TimeInForceKind) -> Self {
        Self { kind, expiry: None }
    }

    pub fn until(expiry: DateTime<Utc>) -> Self {
        Self {
            kind: TimeInForceKind::Gtd,
            expiry: Some(expiry),
        }
    }
}

/// A typed value carried by an additional order field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum FieldValue {
    Int(i64),
    Double(f64),
    Quantity(Decimal),
    Money(Decimal),
    Char(char),
    Text(String),
    Date(NaiveDate),
    /// Duration in whole seconds
    Duration(i64),
    DateTime(DateTime<Utc>),
}

/// An extensible tagged order field, preserved in submission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditionalField {
    pub tag: i32,
    pub value: FieldValue,
}

impl AdditionalField {
    pub fn new(tag: i32, value: FieldValue) -> Self {
        Self { tag, value }
    }
}

/// The fields specified by a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderFields {
    /// The account the order trades under
    pub account: AccountEntry,
    pub security: Security,
    /// Numeric currency code
    pub currency: u32,
    pub order_type: OrderType,
    pub side: Side,
    /// Venue the order is routed to
    pub destination: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub time_in_force: TimeInForce,
    /// Ordered list of tagged extension fields; may be empty
    pub additional_fields: Vec<AdditionalField>,
}

/// The immutable record created when an order is submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderInfo {
    pub fields: OrderFields,
    pub order_id: OrderId,
    /// The account the submission was made through, which may differ from
    /// the owning account in `fields`
    pub submission_account: AccountEntry,
    pub timestamp: DateTime<Utc>,
    pub shorting_flag: bool,
}

impl OrderInfo {
    pub fn new(
        fields: OrderFields,
        order_id: OrderId,
        submission_account: AccountEntry,
        timestamp: DateTime<Utc>,
        shorting_flag: bool,
    ) -> Self {
        Self {
            fields,
            order_id,
            submission_account,
            timestamp,
            shorting_flag,
        }
    }
}
