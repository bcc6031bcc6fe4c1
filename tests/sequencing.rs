mod common;

use chrono::Utc;
use tempfile::TempDir;

use common::*;
use orderstore::domain::{ExecutionReport, IndexedValue, OrderStatus, SequencedValue};
use orderstore::sequencer::InitialSequences;
use orderstore::{
    load_initial_sequences, AccountQuery, OrderDataStore, SubmissionRegistry,
};

#[tokio::test]
async fn publish_store_and_query_one_account() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, "orders.db").await;
    let registry = SubmissionRegistry::new();
    let acct = account(1, "desk");
    registry.add_account(acct.clone());

    // Three submissions take ordinals 1, 2, 3.
    for order_id in [101u64, 102, 103] {
        let sequenced = registry
            .publish_order(order_info(&acct, order_id, Utc::now()), || {
                load_initial_sequences(&store, acct.id)
            })
            .await
            .unwrap();
        assert_eq!(sequenced.ordinal, order_id - 100);
        store.store_order(&sequenced).await.unwrap();
    }

    // Order 101 goes through PENDING_NEW then FILLED.
    let first = ExecutionReport::initial(101, OrderStatus::PendingNew, Utc::now());
    let second = ExecutionReport::updated(&first, OrderStatus::Filled, Utc::now());
    for report in [first, second] {
        let sequenced = registry
            .publish_report(acct.id, report, || load_initial_sequences(&store, acct.id))
            .await
            .unwrap();
        store.store_report(&sequenced).await.unwrap();
    }

    let record = store.load_order_record(101).await.unwrap().unwrap();
    let statuses: Vec<OrderStatus> = record
        .value
        .value
        .reports
        .iter()
        .map(|r| r.status)
        .collect();
    assert_eq!(statuses, vec![OrderStatus::PendingNew, OrderStatus::Filled]);

    let live = store
        .load_order_records(&AccountQuery::total(1).live_only())
        .await
        .unwrap();
    let live_ids: Vec<u64> = live.iter().map(|r| r.value.info.order_id).collect();
    assert_eq!(live_ids, vec![102, 103]);
    store.close().await.unwrap();
}

#[tokio::test]
async fn initial_sequences_resume_after_restart() {
    let dir = TempDir::new().unwrap();
    let acct = account(7, "desk");
    {
        let store = open_store(&dir, "orders.db").await;
        let registry = SubmissionRegistry::new();
        registry.add_account(acct.clone());
        for order_id in 1..=3u64 {
            let sequenced = registry
                .publish_order(order_info(&acct, order_id, Utc::now()), || {
                    load_initial_sequences(&store, acct.id)
                })
                .await
                .unwrap();
            store.store_order(&sequenced).await.unwrap();
        }
        let report = registry
            .publish_report(
                acct.id,
                ExecutionReport::initial(1, OrderStatus::New, Utc::now()),
                || load_initial_sequences(&store, acct.id),
            )
            .await
            .unwrap();
        store.store_report(&report).await.unwrap();
        store.close().await.unwrap();
    }

    // A fresh registry bootstraps from the stored tail of each stream.
    let store = open_store(&dir, "orders.db").await;
    let initial = load_initial_sequences(&store, acct.id).await.unwrap();
    assert_eq!(
        initial,
        InitialSequences {
            next_order_ordinal: 4,
            next_report_ordinal: 2,
        }
    );

    let registry = SubmissionRegistry::new();
    registry.add_account(acct.clone());
    let sequenced = registry
        .publish_order(order_info(&acct, 4, Utc::now()), || {
            load_initial_sequences(&store, acct.id)
        })
        .await
        .unwrap();
    assert_eq!(sequenced.ordinal, 4);
    store.close().await.unwrap();
}

#[tokio::test]
async fn empty_account_starts_at_the_first_ordinal() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, "orders.db").await;
    let initial = load_initial_sequences(&store, 42).await.unwrap();
    assert_eq!(initial, InitialSequences::default());
    assert_eq!(initial.next_order_ordinal, 1);
    assert_eq!(initial.next_report_ordinal, 1);
    store.close().await.unwrap();
}

#[tokio::test]
async fn stored_ordinals_come_from_the_publisher() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, "orders.db").await;
    let acct = account(3, "desk");

    // Records written out of submission order still read back by ordinal.
    store
        .store_orders(&[
            sequenced_order(&acct, 30, 3, Utc::now()),
            SequencedValue::new(
                IndexedValue::new(order_info(&acct, 10, Utc::now()), acct.clone()),
                1,
            ),
            sequenced_order(&acct, 20, 2, Utc::now()),
        ])
        .await
        .unwrap();

    let records = store
        .load_order_records(&AccountQuery::total(3))
        .await
        .unwrap();
    let ids: Vec<u64> = records.iter().map(|r| r.value.info.order_id).collect();
    assert_eq!(ids, vec![10, 20, 30]);
    store.close().await.unwrap();
}
