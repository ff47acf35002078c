//! Scanner repository: volatility scan results keyed by symbol.

use super::clamp_limit;
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::scanner::SCANNER_COLUMNS;
use crate::models::{NewScannerEntry, ScannerEntry, ScannerField};
use crate::patch::{update_statement, FieldSet};
use chrono::Utc;
use tracing::debug;
use tradestate_core::{ChangeKind, ChangeNotifier};

#[derive(Clone)]
pub struct ScannerRepository {
    db: Database,
    notifier: ChangeNotifier,
}

impl ScannerRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(db: Database, notifier: ChangeNotifier) -> Self {
        Self { db, notifier }
    }

    /// Inserts a scan result and returns its id.
    ///
    /// # Errors
    /// Returns `StoreError::Validation` for malformed candles or an empty
    /// symbol, or a storage error.
    pub async fn insert(&self, entry: &NewScannerEntry) -> Result<i64> {
        let outcome = self
            .db
            .execute(
                "INSERT INTO scanner (symbol, score, volatility, candles, updated_at) \
                 VALUES (?, ?, ?, ?, ?)",
                &entry.params()?,
            )
            .await?;

        debug!(id = outcome.last_insert_id, symbol = %entry.symbol, "Scanner entry inserted");
        self.notifier.publish(ChangeKind::ScannerUpdated);
        Ok(outcome.last_insert_id)
    }

    /// Applies `fields` to every row of `symbol`. `updated_at` is stamped
    /// with the current time unless the field set carries it.
    ///
    /// # Errors
    /// Returns `StoreError::Validation` for an empty field set and
    /// `StoreError::NotFound` when the symbol has no rows.
    pub async fn update_by_symbol(&self, symbol: &str, fields: &FieldSet<ScannerField>) -> Result<u64> {
        let mut assignments = fields.assignments()?;
        if !fields.contains(ScannerField::UPDATED_AT) {
            assignments.push(("updated_at", Utc::now().timestamp_millis().into()));
        }

        let (sql, mut params) = update_statement("scanner", assignments, "symbol = ?");
        params.push(symbol.into());

        let outcome = self.db.execute(&sql, &params).await?;
        if outcome.rows_affected == 0 {
            return Err(StoreError::NotFound(format!("scanner entry for {symbol}")));
        }

        debug!(symbol, rows = outcome.rows_affected, "Scanner entries updated");
        self.notifier.publish(ChangeKind::ScannerUpdated);
        Ok(outcome.rows_affected)
    }

    /// Deletes every row of `symbol` and returns the count.
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` when the symbol has no rows.
    pub async fn delete_by_symbol(&self, symbol: &str) -> Result<u64> {
        let outcome = self
            .db
            .execute("DELETE FROM scanner WHERE symbol = ?", &[symbol.into()])
            .await?;
        if outcome.rows_affected == 0 {
            return Err(StoreError::NotFound(format!("scanner entry for {symbol}")));
        }

        debug!(symbol, rows = outcome.rows_affected, "Scanner entries deleted");
        self.notifier.publish(ChangeKind::ScannerUpdated);
        Ok(outcome.rows_affected)
    }

    /// Returns up to `limit` entries, newest first.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row does not decode.
    pub async fn list(&self, limit: u32) -> Result<Vec<ScannerEntry>> {
        let rows = self
            .db
            .query(
                &format!("SELECT {SCANNER_COLUMNS} FROM scanner ORDER BY id DESC LIMIT ?"),
                &[clamp_limit(limit).into()],
            )
            .await?;
        rows.iter().map(ScannerEntry::from_row).collect()
    }

    /// Returns the newest entry for `symbol`.
    ///
    /// # Errors
    /// Returns an error if the query fails or the row does not decode.
    pub async fn get(&self, symbol: &str) -> Result<Option<ScannerEntry>> {
        let row = self
            .db
            .query_optional(
                &format!(
                    "SELECT {SCANNER_COLUMNS} FROM scanner WHERE symbol = ? ORDER BY id DESC LIMIT 1"
                ),
                &[symbol.into()],
            )
            .await?;
        row.as_ref().map(ScannerEntry::from_row).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Candle;
    use chrono::{DateTime, TimeZone};

    async fn repo() -> (ScannerRepository, ChangeNotifier) {
        let db = Database::in_memory().await.unwrap();
        let notifier = ChangeNotifier::new(8, 64);
        (ScannerRepository::new(db, notifier.clone()), notifier)
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn candle(open_time: i64) -> Candle {
        Candle {
            open_time,
            open: 1.0,
            high: 1.2,
            low: 0.9,
            close: 1.1,
            volume: 10.0,
        }
    }

    #[tokio::test]
    async fn insert_then_get_returns_entry() {
        let (repo, _) = repo().await;
        let mut entry = NewScannerEntry::new("BTCUSDT", 7.5, 3.1, at(0));
        entry.candles = Some(vec![candle(1), candle(2)]);

        let id = repo.insert(&entry).await.unwrap();
        let stored = repo.get("BTCUSDT").await.unwrap().unwrap();

        assert_eq!(stored.id, id);
        assert_eq!(stored.candles, entry.candles);
        assert_eq!(stored.updated_at, at(0));
    }

    #[tokio::test]
    async fn too_many_candles_are_rejected() {
        let (repo, notifier) = repo().await;
        let mut sub = notifier.subscribe().unwrap();
        let mut entry = NewScannerEntry::new("BTCUSDT", 1.0, 1.0, at(0));
        entry.candles = Some((0..4).map(candle).collect());

        assert!(repo.insert(&entry).await.unwrap_err().is_validation());
        assert!(repo.get("BTCUSDT").await.unwrap().is_none());
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn update_by_symbol_touches_every_row() {
        let (repo, _) = repo().await;
        repo.insert(&NewScannerEntry::new("ETHUSDT", 1.0, 1.0, at(0))).await.unwrap();
        repo.insert(&NewScannerEntry::new("ETHUSDT", 2.0, 1.0, at(1))).await.unwrap();
        repo.insert(&NewScannerEntry::new("SOLUSDT", 3.0, 1.0, at(1))).await.unwrap();

        let fields = FieldSet::new().with(ScannerField::Score(9.0));
        assert_eq!(repo.update_by_symbol("ETHUSDT", &fields).await.unwrap(), 2);

        for entry in repo.list(10).await.unwrap() {
            let expected = if entry.symbol == "ETHUSDT" { 9.0 } else { 3.0 };
            assert!((entry.score - expected).abs() < f64::EPSILON);
        }
    }

    #[tokio::test]
    async fn explicit_updated_at_is_not_overwritten() {
        let (repo, _) = repo().await;
        repo.insert(&NewScannerEntry::new("BTCUSDT", 1.0, 1.0, at(0))).await.unwrap();

        let fields = FieldSet::new().with(ScannerField::UpdatedAt(at(30)));
        repo.update_by_symbol("BTCUSDT", &fields).await.unwrap();

        assert_eq!(repo.get("BTCUSDT").await.unwrap().unwrap().updated_at, at(30));
    }

    #[tokio::test]
    async fn missing_symbol_is_not_found_and_silent() {
        let (repo, notifier) = repo().await;
        let mut sub = notifier.subscribe().unwrap();

        let fields = FieldSet::new().with(ScannerField::Volatility(2.0));
        assert!(repo.update_by_symbol("NONE", &fields).await.unwrap_err().is_not_found());
        assert!(repo.delete_by_symbol("NONE").await.unwrap_err().is_not_found());
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn delete_then_get_is_absent() {
        let (repo, notifier) = repo().await;
        repo.insert(&NewScannerEntry::new("BTCUSDT", 1.0, 1.0, at(0))).await.unwrap();
        let mut sub = notifier.subscribe().unwrap();

        assert_eq!(repo.delete_by_symbol("BTCUSDT").await.unwrap(), 1);
        assert!(repo.get("BTCUSDT").await.unwrap().is_none());
        assert_eq!(sub.try_recv().unwrap().kind, ChangeKind::ScannerUpdated);
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for Captured {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn delete_logs_removed_row_count() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(captured.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let (repo, _) = repo().await;
        repo.insert(&NewScannerEntry::new("ETHUSDT", 1.0, 1.0, at(0))).await.unwrap();
        repo.insert(&NewScannerEntry::new("ETHUSDT", 2.0, 1.0, at(1))).await.unwrap();
        repo.delete_by_symbol("ETHUSDT").await.unwrap();

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let line = output
            .lines()
            .find(|line| line.contains("Scanner entries deleted"))
            .unwrap();
        assert!(line.contains("symbol=\"ETHUSDT\"") || line.contains("symbol=ETHUSDT"));
        assert!(line.contains("rows=2"));
    }
}
