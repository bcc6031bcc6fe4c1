//! Mapping between database rows and domain records.
//!
//! Decimals persist as canonical strings, timestamps as microseconds since
//! the Unix epoch, and the additional-fields list as an opaque JSON blob.
//! An empty blob is always accepted as an empty field list; anything else
//! that fails to decode is a hard serialization error, never silently
//! dropped.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::domain::{
    AccountEntry, AccountId, AdditionalField, ExecutionReport, IndexedValue, OrderFields,
    OrderInfo, OrderStatus, OrderType, Security, SequencedAccountOrderInfo,
    SequencedExecutionReport, SequencedValue, Side, TimeInForce, TimeInForceKind,
};
use crate::error::{Result, StoreError};

pub(crate) fn encode_additional_fields(fields: &[AdditionalField]) -> Result<Vec<u8>> {
    if fields.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::to_vec(fields)
        .map_err(|e| StoreError::Serialization(format!("Unable to store additional fields: {e}")))
}

pub(crate) fn decode_additional_fields(blob: &[u8]) -> Result<Vec<AdditionalField>> {
    if blob.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_slice(blob)
        .map_err(|e| StoreError::Serialization(format!("Unable to load additional fields: {e}")))
}

pub(crate) fn decimal_to_db(value: &Decimal) -> String {
    value.to_string()
}

pub(crate) fn decimal_from_db(column: &str, text: &str) -> Result<Decimal> {
    Decimal::from_str(text)
        .map_err(|e| StoreError::Serialization(format!("invalid decimal in {column}: {e}")))
}

pub(crate) fn timestamp_to_db(timestamp: DateTime<Utc>) -> i64 {
    timestamp.timestamp_micros()
}

pub(crate) fn timestamp_from_db(column: &str, micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros).ok_or_else(|| {
        StoreError::Serialization(format!("invalid timestamp in {column}: {micros}"))
    })
}

/// Expiry is NULL for time-in-force kinds that carry none, so an epoch
/// expiry stays distinguishable from no expiry.
fn expiry_from_db(micros: Option<i64>) -> Result<Option<DateTime<Utc>>> {
    micros
        .map(|micros| timestamp_from_db("time_in_force_expiry", micros))
        .transpose()
}

pub(crate) fn expiry_to_db(expiry: Option<DateTime<Utc>>) -> Option<i64> {
    expiry.map(timestamp_to_db)
}

/// Builds a sequenced, account-indexed submission from a `submissions` (or
/// `status_submissions`) row, resolving identities through `resolve`.
pub(crate) fn order_info_from_row(
    row: &SqliteRow,
    resolve: &dyn Fn(AccountId) -> AccountEntry,
) -> Result<SequencedAccountOrderInfo> {
    let account = resolve(row.try_get::<i64, _>("account")? as AccountId);
    let submission_account = resolve(row.try_get::<i64, _>("submission_account")? as AccountId);
    let quantity: String = row.try_get("quantity")?;
    let price: String = row.try_get("price")?;
    let blob: Vec<u8> = row.try_get("additional_fields")?;
    let fields = OrderFields {
        account: account.clone(),
        security: Security {
            symbol: row.try_get("symbol")?,
            market: row.try_get("market")?,
            country: row.try_get::<i64, _>("country")? as u32,
        },
        currency: row.try_get::<i64, _>("currency")? as u32,
        order_type: OrderType::from_db(row.try_get("order_type")?)?,
        side: Side::from_db(row.try_get("side")?)?,
        destination: row.try_get("destination")?,
        quantity: decimal_from_db("quantity", &quantity)?,
        price: decimal_from_db("price", &price)?,
        time_in_force: TimeInForce {
            kind: TimeInForceKind::from_db(row.try_get("time_in_force")?)?,
            expiry: expiry_from_db(row.try_get("time_in_force_expiry")?)?,
        },
        additional_fields: decode_additional_fields(&blob)?,
    };
    let info = OrderInfo {
        fields,
        order_id: row.try_get::<i64, _>("order_id")? as u64,
        submission_account,
        timestamp: timestamp_from_db("timestamp", row.try_get("timestamp")?)?,
        shorting_flag: row.try_get("shorting_flag")?,
    };
    Ok(SequencedValue::new(
        IndexedValue::new(info, account),
        row.try_get::<i64, _>("ordinal")? as u64,
    ))
}

/// Builds a sequenced execution report from an `execution_reports` row.
pub(crate) fn execution_report_from_row(row: &SqliteRow) -> Result<SequencedExecutionReport> {
    let last_quantity: String = row.try_get("last_quantity")?;
    let last_price: String = row.try_get("last_price")?;
    let execution_fee: String = row.try_get("execution_fee")?;
    let processing_fee: String = row.try_get("processing_fee")?;
    let commission: String = row.try_get("commission")?;
    let report = ExecutionReport {
        order_id: row.try_get::<i64, _>("order_id")? as u64,
        sequence: row.try_get::<i64, _>("sequence")? as u32,
        timestamp: timestamp_from_db("timestamp", row.try_get("timestamp")?)?,
        status: OrderStatus::from_db(row.try_get("status")?)?,
        last_quantity: decimal_from_db("last_quantity", &last_quantity)?,
        last_price: decimal_from_db("last_price", &last_price)?,
        liquidity_flag: row.try_get("liquidity_flag")?,
        last_market: row.try_get("last_market")?,
        execution_fee: decimal_from_db("execution_fee", &execution_fee)?,
        processing_fee: decimal_from_db("processing_fee", &processing_fee)?,
        commission: decimal_from_db("commission", &commission)?,
        text: row.try_get("text")?,
    };
    Ok(SequencedValue::new(
        report,
        row.try_get::<i64, _>("ordinal")? as u64,
    ))
}
