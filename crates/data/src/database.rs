//! SQLite storage engine: schema creation, parameter binding and the write lock.
//!
//! Writes go through [`Database::execute`], which serializes them behind one
//! async mutex shared by every clone of the handle. Reads use the pool
//! directly and never wait on that lock.

use crate::error::Result;
use crate::models::settings::SettingsValues;
use sqlx::query::Query;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
    SqliteRow,
};
use sqlx::{Row, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Tables owned by the engine, in creation order.
pub const TABLES: [&str; 5] = ["orders", "logs", "market_state", "scanner", "settings"];

const SCHEMA: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS orders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        symbol TEXT NOT NULL CHECK (length(symbol) > 0),
        order_id TEXT,
        position_id TEXT,
        side TEXT NOT NULL CHECK (side IN ('LONG', 'SHORT')),
        order_type TEXT NOT NULL CHECK (length(order_type) > 0),
        leverage REAL,
        amount_usdt REAL NOT NULL,
        open_time INTEGER NOT NULL,
        open_price REAL NOT NULL,
        ai_prediction TEXT CHECK (ai_prediction IN ('up', 'down', 'neutral')),
        ai_reason TEXT,
        latest_update_time INTEGER,
        latest_price REAL,
        tlsl REAL,
        target_profit_percent REAL,
        status TEXT NOT NULL DEFAULT 'open'
            CHECK (status IN ('open', 'filled', 'closed', 'cancelled')),
        close_reason TEXT,
        close_time INTEGER,
        close_price REAL,
        pnl_usdt REAL,
        pnl_percent REAL,
        note TEXT
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        action TEXT NOT NULL CHECK (length(action) > 0),
        status TEXT NOT NULL DEFAULT 'success'
            CHECK (status IN ('success', 'error', 'warning')),
        message TEXT,
        order_index INTEGER,
        order_id TEXT,
        client_order_id TEXT,
        timestamp INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
    )
    ",
    // Each side's wall columns are all NULL or all set.
    r"
    CREATE TABLE IF NOT EXISTS market_state (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        symbol TEXT NOT NULL CHECK (length(symbol) > 0),
        price REAL NOT NULL,
        buy_walls INTEGER,
        sell_walls INTEGER,
        nearest_buy_price REAL,
        nearest_buy_strength REAL,
        nearest_buy_distance REAL,
        nearest_sell_price REAL,
        nearest_sell_strength REAL,
        nearest_sell_distance REAL,
        trend TEXT,
        recent_volatility REAL,
        position TEXT,
        candles TEXT,
        updated_at INTEGER NOT NULL,
        CHECK ((nearest_buy_price IS NULL) = (nearest_buy_strength IS NULL)
           AND (nearest_buy_price IS NULL) = (nearest_buy_distance IS NULL)),
        CHECK ((nearest_sell_price IS NULL) = (nearest_sell_strength IS NULL)
           AND (nearest_sell_price IS NULL) = (nearest_sell_distance IS NULL))
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS scanner (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        symbol TEXT NOT NULL CHECK (length(symbol) > 0),
        score REAL NOT NULL,
        volatility REAL NOT NULL,
        candles TEXT,
        updated_at INTEGER NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS settings (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        tsls REAL NOT NULL DEFAULT 20,
        tps REAL NOT NULL DEFAULT 60,
        min_vol REAL NOT NULL DEFAULT 1.5,
        max_vol REAL NOT NULL DEFAULT 8,
        min_vol24 REAL NOT NULL DEFAULT 500000,
        max_vol24 REAL NOT NULL DEFAULT 5000000,
        leverage REAL NOT NULL DEFAULT 2,
        black_list TEXT NOT NULL DEFAULT '[]',
        updated_at INTEGER NOT NULL
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_orders_symbol ON orders(symbol)",
    "CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status)",
    "CREATE INDEX IF NOT EXISTS idx_orders_order_id ON orders(order_id)",
    "CREATE INDEX IF NOT EXISTS idx_market_state_symbol ON market_state(symbol)",
    "CREATE INDEX IF NOT EXISTS idx_market_state_updated ON market_state(updated_at)",
    "CREATE INDEX IF NOT EXISTS idx_scanner_symbol ON scanner(symbol)",
];

/// The settings row always lives at this key; the table CHECK forbids others.
pub(crate) const SETTINGS_ROW_ID: i64 = 1;

/// Statement parameter. Closed set of the SQLite storage classes in use.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl<T: Into<Self>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Result of a write statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecOutcome {
    pub rows_affected: u64,
    pub last_insert_id: i64,
}

fn bind_all<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &'q [SqlValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Integer(v) => query.bind(*v),
            SqlValue::Real(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.as_str()),
        };
    }
    query
}

/// Handle to the storage engine. Cheap to clone; clones share the pool and
/// the write lock.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
}

impl Database {
    /// Opens (creating if needed) the database at `url` and ensures the schema.
    ///
    /// # Arguments
    ///
    /// * `url` - `SQLite` URL, e.g. `sqlite://data/bot.db` or `sqlite::memory:`
    /// * `max_connections` - pool size
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid, the file cannot be opened or the
    /// schema cannot be created.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        if let Some(parent) = Path::new(options.get_filename()).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        let db = Self::from_pool(pool);
        db.ensure_schema().await?;

        info!(url = %url, "Database initialized");
        Ok(db)
    }

    /// Creates an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns error if the connection or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        // One connection that never expires: the database lives as long as it does.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let db = Self::from_pool(pool);
        db.ensure_schema().await?;

        debug!("In-memory database initialized");
        Ok(db)
    }

    fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Creates missing tables and indexes and seeds the settings row.
    ///
    /// Safe to call repeatedly and from racing initializers: every statement
    /// is a no-op when its object already exists, and the settings seed is
    /// `INSERT OR IGNORE` on a fixed key.
    ///
    /// # Errors
    ///
    /// Returns error if any DDL statement fails.
    pub async fn ensure_schema(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        let defaults = SettingsValues::default();
        let black_list = serde_json::to_string(&defaults.black_list)
            .map_err(|e| crate::StoreError::corrupt(e.to_string()))?;
        let seeded = sqlx::query(
            r"
            INSERT OR IGNORE INTO settings
                (id, tsls, tps, min_vol, max_vol, min_vol24, max_vol24, leverage, black_list, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
        )
        .bind(SETTINGS_ROW_ID)
        .bind(defaults.trailing_stop_loss_percent)
        .bind(defaults.take_profit_percent)
        .bind(defaults.min_vol)
        .bind(defaults.max_vol)
        .bind(defaults.min_vol24)
        .bind(defaults.max_vol24)
        .bind(defaults.leverage)
        .bind(black_list)
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        if seeded.rows_affected() > 0 {
            info!("Settings table initialized with default values");
        }

        Ok(())
    }

    /// Runs a write statement under the write lock.
    ///
    /// # Errors
    ///
    /// Returns the underlying storage error; constraint violations are
    /// reported as `StoreError::Validation`.
    pub async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<ExecOutcome> {
        let _guard = self.write_lock.lock().await;
        let result = bind_all(sqlx::query(sql), params)
            .execute(&self.pool)
            .await?;

        Ok(ExecOutcome {
            rows_affected: result.rows_affected(),
            last_insert_id: result.last_insert_rowid(),
        })
    }

    /// Runs a read statement and returns every row.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<SqliteRow>> {
        let rows = bind_all(sqlx::query(sql), params)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Runs a read statement expected to return at most one row.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn query_optional(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Option<SqliteRow>> {
        let row = bind_all(sqlx::query(sql), params)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Row count of every table, in [`TABLES`] order.
    ///
    /// # Errors
    ///
    /// Returns error if any count query fails.
    pub async fn table_counts(&self) -> Result<Vec<(&'static str, i64)>> {
        let mut counts = Vec::with_capacity(TABLES.len());
        for table in TABLES {
            // Table names come from the fixed list above.
            let row = sqlx::query(&format!("SELECT COUNT(*) AS count FROM {table}"))
                .fetch_one(&self.pool)
                .await?;
            counts.push((table, row.try_get::<i64, _>("count")?));
        }
        Ok(counts)
    }

    /// Get the connection pool
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
