//! SQL-backed order execution data store.
//!
//! Maps domain records onto a `submissions` table, an `execution_reports`
//! table, and a `live_orders` index of order ids with no terminal report
//! yet. A `status_submissions` view joins submissions against the live
//! index so queries can be routed to the live or terminal partition.
//!
//! Reads run on a connection pool sized to available parallelism; writes
//! are serialized through one dedicated connection behind a mutex.

use std::sync::{Arc, Mutex as StdMutex, RwLock as StdRwLock};

use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::{ConnectOptions, Connection, QueryBuilder, Sqlite};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::rows::{
    decimal_to_db, encode_additional_fields, execution_report_from_row, expiry_to_db,
    order_info_from_row, timestamp_to_db,
};
use super::{OpenState, OrderDataStore};
use crate::config::DatabaseConfig;
use crate::domain::{
    AccountEntry, AccountId, IndexedValue, OrderId, OrderRecord, SequencedAccountExecutionReport,
    SequencedAccountOrderInfo, SequencedAccountOrderRecord, SequencedExecutionReport,
    SequencedOrderRecord, SequencedValue,
};
use crate::error::{Result, StoreError};
use crate::queries::{has_live_check, translate_filter, translate_range, AccountQuery, SnapshotLimit};

/// Resolves an account id to its identity. Injected by the caller; results
/// are cached per store.
pub type AccountSource = Arc<dyn Fn(AccountId) -> AccountEntry + Send + Sync>;

/// Rows per multi-row INSERT, keeping statements well under SQLite's
/// bind-variable limit at 18 columns per row.
const INSERT_CHUNK_SIZE: usize = 50;

struct AccountCache {
    source: AccountSource,
    entries: DashMap<AccountId, AccountEntry>,
}

impl AccountCache {
    fn load(&self, id: AccountId) -> AccountEntry {
        self.entries
            .entry(id)
            .or_insert_with(|| (self.source)(id))
            .clone()
    }
}

/// Stores order execution data in a SQL database.
pub struct RelationalStore {
    config: DatabaseConfig,
    accounts: AccountCache,
    state: StdMutex<OpenState>,
    read_pool: StdRwLock<Option<SqlitePool>>,
    writer: Mutex<Option<SqliteConnection>>,
}

impl RelationalStore {
    /// Creates a store over the given database with an injected account
    /// identity source. Call [`open`](Self::open) before use.
    pub fn new(config: DatabaseConfig, account_source: AccountSource) -> Self {
        Self {
            config,
            accounts: AccountCache {
                source: account_source,
                entries: DashMap::new(),
            },
            state: StdMutex::new(OpenState::Closed),
            read_pool: StdRwLock::new(None),
            writer: Mutex::new(None),
        }
    }

    /// Creates a store that resolves accounts to unnamed entries, for
    /// deployments without an identity service.
    pub fn with_unresolved_accounts(config: DatabaseConfig) -> Self {
        Self::new(config, Arc::new(AccountEntry::unresolved))
    }

    /// Acquires connections and creates or verifies the schema. A no-op if
    /// the store is already opening or open; any failure tears down
    /// partially acquired resources.
    pub async fn open(&self) -> Result<()> {
        {
            let mut state = self.state.lock().expect("store state lock poisoned");
            match *state {
                OpenState::Open | OpenState::Opening => return Ok(()),
                OpenState::Closing => return Err(StoreError::NotOpen),
                OpenState::Closed => *state = OpenState::Opening,
            }
        }
        match self.try_open().await {
            Ok(()) => {
                *self.state.lock().expect("store state lock poisoned") = OpenState::Open;
                info!(path = %self.config.path, "Relational store open");
                Ok(())
            }
            Err(e) => {
                self.teardown().await;
                *self.state.lock().expect("store state lock poisoned") = OpenState::Closed;
                Err(e)
            }
        }
    }

    async fn try_open(&self) -> Result<()> {
        let options = SqliteConnectOptions::new()
            .filename(&self.config.path)
            .create_if_missing(true);
        let mut writer = options.connect().await.map_err(StoreError::Connection)?;
        create_schema(&mut writer).await?;
        let pool = SqlitePoolOptions::new()
            .max_connections(self.config.max_read_connections.max(1))
            .connect_with(options)
            .await
            .map_err(StoreError::Connection)?;
        *self.writer.lock().await = Some(writer);
        *self.read_pool.write().expect("read pool lock poisoned") = Some(pool);
        Ok(())
    }

    async fn teardown(&self) {
        let pool = self
            .read_pool
            .write()
            .expect("read pool lock poisoned")
            .take();
        if let Some(pool) = pool {
            pool.close().await;
        }
        if let Some(writer) = self.writer.lock().await.take() {
            let _ = writer.close().await;
        }
    }

    fn ensure_open(&self) -> Result<()> {
        match *self.state.lock().expect("store state lock poisoned") {
            OpenState::Open => Ok(()),
            _ => Err(StoreError::NotOpen),
        }
    }

    fn pool(&self) -> Result<SqlitePool> {
        self.ensure_open()?;
        self.read_pool
            .read()
            .expect("read pool lock poisoned")
            .clone()
            .ok_or(StoreError::NotOpen)
    }

    async fn load_reports_for_order(
        &self,
        pool: &SqlitePool,
        order_id: OrderId,
    ) -> Result<Vec<SequencedExecutionReport>> {
        let rows = sqlx::query(
            "SELECT * FROM execution_reports WHERE order_id = ? ORDER BY sequence ASC",
        )
        .bind(order_id as i64)
        .fetch_all(pool)
        .await?;
        rows.iter().map(execution_report_from_row).collect()
    }

    async fn load_submissions(
        &self,
        pool: &SqlitePool,
        query: &AccountQuery,
    ) -> Result<Vec<SequencedAccountOrderInfo>> {
        // An is_live reference routes the query to the partitioned view;
        // everything else reads the base table.
        let table = if has_live_check(&query.filter) {
            "status_submissions"
        } else {
            "submissions"
        };
        let sql = build_select(table, query);
        let rows = sqlx::query(&sql).fetch_all(pool).await?;
        let resolve = |id: AccountId| self.accounts.load(id);
        let mut submissions = rows
            .iter()
            .map(|row| order_info_from_row(row, &resolve))
            .collect::<Result<Vec<_>>>()?;
        if matches!(query.limit, SnapshotLimit::Tail(_)) {
            submissions.reverse();
        }
        Ok(submissions)
    }
}

/// Assembles `SELECT ... WHERE account AND range AND filter ORDER BY
/// ordinal` with the snapshot limit applied. Tail limits scan descending
/// and the caller restores ascending order.
fn build_select(table: &str, query: &AccountQuery) -> String {
    let mut conditions = vec![format!("account = {}", query.account)];
    conditions.extend(translate_range(&query.range));
    let filter = translate_filter(&query.filter);
    if filter != "1" {
        conditions.push(filter);
    }
    let where_clause = conditions.join(" AND ");
    match query.limit {
        SnapshotLimit::Unlimited => {
            format!("SELECT * FROM {table} WHERE {where_clause} ORDER BY ordinal ASC")
        }
        SnapshotLimit::Head(n) => {
            format!("SELECT * FROM {table} WHERE {where_clause} ORDER BY ordinal ASC LIMIT {n}")
        }
        SnapshotLimit::Tail(n) => {
            format!("SELECT * FROM {table} WHERE {where_clause} ORDER BY ordinal DESC LIMIT {n}")
        }
    }
}

async fn create_schema(conn: &mut SqliteConnection) -> Result<()> {
    const STATEMENTS: &[&str] = &[
        "CREATE TABLE IF NOT EXISTS submissions (
            order_id INTEGER PRIMARY KEY NOT NULL,
            submission_account INTEGER NOT NULL,
            account INTEGER NOT NULL,
            timestamp INTEGER NOT NULL,
            symbol TEXT NOT NULL,
            market TEXT NOT NULL,
            country INTEGER NOT NULL,
            currency INTEGER NOT NULL,
            order_type INTEGER NOT NULL,
            side INTEGER NOT NULL,
            destination TEXT NOT NULL,
            quantity TEXT NOT NULL,
            price TEXT NOT NULL,
            time_in_force INTEGER NOT NULL,
            time_in_force_expiry INTEGER,
            additional_fields BLOB NOT NULL,
            shorting_flag INTEGER NOT NULL,
            ordinal INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS submissions_sequence_index
            ON submissions (account, ordinal)",
        "CREATE INDEX IF NOT EXISTS submissions_timestamp_index
            ON submissions (account, timestamp, ordinal)",
        "CREATE TABLE IF NOT EXISTS live_orders (
            order_id INTEGER PRIMARY KEY NOT NULL
        )",
        "CREATE VIEW IF NOT EXISTS status_submissions AS
            SELECT submissions.*, live_orders.order_id IS NOT NULL AS is_live
            FROM submissions
            LEFT JOIN live_orders ON submissions.order_id = live_orders.order_id",
        "CREATE TABLE IF NOT EXISTS execution_reports (
            account INTEGER NOT NULL,
            order_id INTEGER NOT NULL,
            sequence INTEGER NOT NULL,
            timestamp INTEGER NOT NULL,
            status INTEGER NOT NULL,
            last_quantity TEXT NOT NULL,
            last_price TEXT NOT NULL,
            liquidity_flag TEXT NOT NULL,
            last_market TEXT NOT NULL,
            execution_fee TEXT NOT NULL,
            processing_fee TEXT NOT NULL,
            commission TEXT NOT NULL,
            text TEXT NOT NULL,
            ordinal INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS execution_reports_order_index
            ON execution_reports (order_id)",
        "CREATE INDEX IF NOT EXISTS execution_reports_sequence_index
            ON execution_reports (account, ordinal)",
        "CREATE INDEX IF NOT EXISTS execution_reports_timestamp_index
            ON execution_reports (account, timestamp, ordinal)",
    ];
    for statement in STATEMENTS {
        sqlx::query(statement)
            .execute(&mut *conn)
            .await
            .map_err(StoreError::Schema)?;
    }
    Ok(())
}

async fn insert_submissions(
    conn: &mut SqliteConnection,
    orders: &[SequencedAccountOrderInfo],
) -> Result<()> {
    for chunk in orders.chunks(INSERT_CHUNK_SIZE) {
        // Encode blobs up front so a bad record aborts before any insert.
        let mut encoded = Vec::with_capacity(chunk.len());
        for order in chunk {
            encoded.push(encode_additional_fields(
                &order.value.value.fields.additional_fields,
            )?);
        }
        let mut builder = QueryBuilder::<Sqlite>::new(
            "INSERT INTO submissions (order_id, submission_account, account, timestamp, \
             symbol, market, country, currency, order_type, side, destination, quantity, \
             price, time_in_force, time_in_force_expiry, additional_fields, shorting_flag, \
             ordinal) ",
        );
        builder.push_values(chunk.iter().zip(encoded), |mut b, (order, blob)| {
            let info = &order.value.value;
            let fields = &info.fields;
            b.push_bind(info.order_id as i64)
                .push_bind(info.submission_account.id as i64)
                .push_bind(fields.account.id as i64)
                .push_bind(timestamp_to_db(info.timestamp))
                .push_bind(fields.security.symbol.clone())
                .push_bind(fields.security.market.clone())
                .push_bind(fields.security.country as i64)
                .push_bind(fields.currency as i64)
                .push_bind(fields.order_type.to_db())
                .push_bind(fields.side.to_db())
                .push_bind(fields.destination.clone())
                .push_bind(decimal_to_db(&fields.quantity))
                .push_bind(decimal_to_db(&fields.price))
                .push_bind(fields.time_in_force.kind.to_db())
                .push_bind(expiry_to_db(fields.time_in_force.expiry))
                .push_bind(blob)
                .push_bind(info.shorting_flag)
                .push_bind(order.ordinal as i64);
        });
        builder.build().execute(&mut *conn).await?;
    }
    Ok(())
}

async fn insert_live_orders(conn: &mut SqliteConnection, order_ids: &[OrderId]) -> Result<()> {
    for chunk in order_ids.chunks(INSERT_CHUNK_SIZE) {
        let mut builder =
            QueryBuilder::<Sqlite>::new("INSERT OR IGNORE INTO live_orders (order_id) ");
        builder.push_values(chunk, |mut b, order_id| {
            b.push_bind(*order_id as i64);
        });
        builder.build().execute(&mut *conn).await?;
    }
    Ok(())
}

async fn insert_execution_reports(
    conn: &mut SqliteConnection,
    reports: &[SequencedAccountExecutionReport],
) -> Result<()> {
    for chunk in reports.chunks(INSERT_CHUNK_SIZE) {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "INSERT INTO execution_reports (account, order_id, sequence, timestamp, status, \
             last_quantity, last_price, liquidity_flag, last_market, execution_fee, \
             processing_fee, commission, text, ordinal) ",
        );
        builder.push_values(chunk, |mut b, report| {
            let value = &report.value.value;
            b.push_bind(report.value.index.id as i64)
                .push_bind(value.order_id as i64)
                .push_bind(value.sequence as i64)
                .push_bind(timestamp_to_db(value.timestamp))
                .push_bind(value.status.to_db())
                .push_bind(decimal_to_db(&value.last_quantity))
                .push_bind(decimal_to_db(&value.last_price))
                .push_bind(value.liquidity_flag.clone())
                .push_bind(value.last_market.clone())
                .push_bind(decimal_to_db(&value.execution_fee))
                .push_bind(decimal_to_db(&value.processing_fee))
                .push_bind(decimal_to_db(&value.commission))
                .push_bind(value.text.clone())
                .push_bind(report.ordinal as i64);
        });
        builder.build().execute(&mut *conn).await?;
    }
    Ok(())
}

/// One delete covering every terminal order id in a call.
async fn delete_live_orders(conn: &mut SqliteConnection, order_ids: &[OrderId]) -> Result<()> {
    let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM live_orders WHERE order_id IN (");
    let mut ids = builder.separated(", ");
    for order_id in order_ids {
        ids.push_bind(*order_id as i64);
    }
    builder.push(")");
    builder.build().execute(&mut *conn).await?;
    Ok(())
}

#[async_trait]
impl OrderDataStore for RelationalStore {
    async fn load_order_record(
        &self,
        id: OrderId,
    ) -> Result<Option<SequencedAccountOrderRecord>> {
        let pool = self.pool()?;
        let row = sqlx::query("SELECT * FROM submissions WHERE order_id = ?")
            .bind(id as i64)
            .fetch_optional(&pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let resolve = |account: AccountId| self.accounts.load(account);
        let submission = order_info_from_row(&row, &resolve)?;
        let reports = self
            .load_reports_for_order(&pool, id)
            .await?
            .into_iter()
            .map(|report| report.value)
            .collect();
        let ordinal = submission.ordinal;
        let index = submission.value.index;
        let record = OrderRecord::new(submission.value.value, reports);
        Ok(Some(SequencedValue::new(
            IndexedValue::new(record, index),
            ordinal,
        )))
    }

    async fn load_order_records(
        &self,
        query: &AccountQuery,
    ) -> Result<Vec<SequencedOrderRecord>> {
        let pool = self.pool()?;
        let submissions = self.load_submissions(&pool, query).await?;
        let mut records = Vec::with_capacity(submissions.len());
        for submission in submissions {
            let reports = self
                .load_reports_for_order(&pool, submission.value.value.order_id)
                .await?
                .into_iter()
                .map(|report| report.value)
                .collect();
            records.push(SequencedValue::new(
                OrderRecord::new(submission.value.value, reports),
                submission.ordinal,
            ));
        }
        debug!(account = query.account, count = records.len(), "Loaded order records");
        Ok(records)
    }

    async fn load_execution_reports(
        &self,
        query: &AccountQuery,
    ) -> Result<Vec<SequencedExecutionReport>> {
        let pool = self.pool()?;
        let sql = build_select("execution_reports", query);
        let rows = sqlx::query(&sql).fetch_all(&pool).await?;
        let mut reports = rows
            .iter()
            .map(execution_report_from_row)
            .collect::<Result<Vec<_>>>()?;
        if matches!(query.limit, SnapshotLimit::Tail(_)) {
            reports.reverse();
        }
        Ok(reports)
    }

    async fn store_order(&self, order: &SequencedAccountOrderInfo) -> Result<()> {
        self.store_orders(std::slice::from_ref(order)).await
    }

    async fn store_orders(&self, orders: &[SequencedAccountOrderInfo]) -> Result<()> {
        self.ensure_open()?;
        if orders.is_empty() {
            return Ok(());
        }
        let mut writer = self.writer.lock().await;
        let conn = writer.as_mut().ok_or(StoreError::NotOpen)?;
        insert_submissions(conn, orders).await?;
        let order_ids: Vec<OrderId> = orders
            .iter()
            .map(|order| order.value.value.order_id)
            .collect();
        insert_live_orders(conn, &order_ids).await?;
        debug!(count = orders.len(), "Stored order submissions");
        Ok(())
    }

    async fn store_report(&self, report: &SequencedAccountExecutionReport) -> Result<()> {
        self.store_reports(std::slice::from_ref(report)).await
    }

    async fn store_reports(&self, reports: &[SequencedAccountExecutionReport]) -> Result<()> {
        self.ensure_open()?;
        if reports.is_empty() {
            return Ok(());
        }
        let mut writer = self.writer.lock().await;
        let conn = writer.as_mut().ok_or(StoreError::NotOpen)?;
        insert_execution_reports(conn, reports).await?;
        let terminal: Vec<OrderId> = reports
            .iter()
            .filter(|report| report.value.value.status.is_terminal())
            .map(|report| report.value.value.order_id)
            .collect();
        if !terminal.is_empty() {
            delete_live_orders(conn, &terminal).await?;
        }
        debug!(
            count = reports.len(),
            terminal = terminal.len(),
            "Stored execution reports"
        );
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        {
            let mut state = self.state.lock().expect("store state lock poisoned");
            match *state {
                OpenState::Closed | OpenState::Closing => return Ok(()),
                _ => *state = OpenState::Closing,
            }
        }
        self.teardown().await;
        *self.state.lock().expect("store state lock poisoned") = OpenState::Closed;
        info!(path = %self.config.path, "Relational store closed");
        Ok(())
    }
}
