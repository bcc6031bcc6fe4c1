#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal_macros::dec;
use tempfile::TempDir;

use orderstore::domain::{
    AccountEntry, ExecutionReport, IndexedValue, OrderFields, OrderInfo, OrderStatus, OrderType,
    Security, SequencedAccountExecutionReport, SequencedAccountOrderInfo, SequencedValue, Side,
    TimeInForce, TimeInForceKind,
};
use orderstore::{DatabaseConfig, RelationalStore};

pub fn account(id: u32, name: &str) -> AccountEntry {
    AccountEntry::new(id, name)
}

pub fn timestamp(micros: i64) -> DateTime<Utc> {
    Utc.timestamp_micros(micros).unwrap()
}

pub fn order_info(account: &AccountEntry, order_id: u64, ts: DateTime<Utc>) -> OrderInfo {
    OrderInfo::new(
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
        ts,
        false,
    )
}

pub fn sequenced_order(
    account: &AccountEntry,
    order_id: u64,
    ordinal: u64,
    ts: DateTime<Utc>,
) -> SequencedAccountOrderInfo {
    SequencedValue::new(
        IndexedValue::new(order_info(account, order_id, ts), account.clone()),
        ordinal,
    )
}

pub fn sequenced_report(
    account: &AccountEntry,
    report: ExecutionReport,
    ordinal: u64,
) -> SequencedAccountExecutionReport {
    SequencedValue::new(IndexedValue::new(report, account.clone()), ordinal)
}

pub fn initial_report(
    order_id: u64,
    status: OrderStatus,
    ts: DateTime<Utc>,
) -> ExecutionReport {
    ExecutionReport::initial(order_id, status, ts)
}

pub fn db_config(dir: &TempDir, name: &str) -> DatabaseConfig {
    DatabaseConfig::new(dir.path().join(name).to_string_lossy().into_owned())
}

pub async fn open_store(dir: &TempDir, name: &str) -> RelationalStore {
    let store = RelationalStore::with_unresolved_accounts(db_config(dir, name));
    store.open().await.unwrap();
    store
}
