//! Market state repository.
//!
//! A symbol may have several rows (history). Symbol-keyed updates touch the
//! newest row of the symbol; the staleness sweep is the only bulk delete.

use super::clamp_limit;
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::market_state::{INSERT_COLUMNS, MARKET_STATE_COLUMNS};
use crate::models::{MarketState, MarketStateField, NewMarketState};
use crate::patch::{update_statement, FieldSet};
use chrono::{DateTime, Utc};
use tracing::{debug, info};
use tradestate_core::{ChangeKind, ChangeNotifier};

/// Repository for market state snapshots.
#[derive(Clone)]
pub struct MarketStateRepository {
    db: Database,
    notifier: ChangeNotifier,
}

impl MarketStateRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(db: Database, notifier: ChangeNotifier) -> Self {
        Self { db, notifier }
    }

    /// Inserts a snapshot and returns its id.
    ///
    /// # Errors
    /// Returns `StoreError::Validation` for malformed payloads or constraint
    /// violations, or a storage error.
    pub async fn insert(&self, snapshot: &NewMarketState) -> Result<i64> {
        let params = snapshot.params()?;
        let outcome = self
            .db
            .execute(
                &format!(
                    "INSERT INTO market_state ({INSERT_COLUMNS}) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
                ),
                &params,
            )
            .await?;

        debug!(id = outcome.last_insert_id, symbol = %snapshot.symbol, "Market state inserted");
        self.notifier.publish(ChangeKind::MarketStateUpdated);
        Ok(outcome.last_insert_id)
    }

    /// Applies `fields` to the newest snapshot of `symbol`. `updated_at` is
    /// stamped with the current time unless the field set carries it.
    ///
    /// # Errors
    /// Returns `StoreError::Validation` for an empty field set and
    /// `StoreError::NotFound` when the symbol has no snapshot.
    pub async fn update_by_symbol(
        &self,
        symbol: &str,
        fields: &FieldSet<MarketStateField>,
    ) -> Result<u64> {
        let mut assignments = fields.assignments()?;
        if !fields.contains(MarketStateField::UPDATED_AT) {
            assignments.push(("updated_at", Utc::now().timestamp_millis().into()));
        }

        let (sql, mut params) = update_statement(
            "market_state",
            assignments,
            "id = (SELECT MAX(id) FROM market_state WHERE symbol = ?)",
        );
        params.push(symbol.into());

        let outcome = self.db.execute(&sql, &params).await?;
        if outcome.rows_affected == 0 {
            return Err(StoreError::NotFound(format!("market state for {symbol}")));
        }

        debug!(symbol, fields = fields.len(), "Market state updated");
        self.notifier.publish(ChangeKind::MarketStateUpdated);
        Ok(outcome.rows_affected)
    }

    /// Deletes every snapshot of `symbol` and returns the count.
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` when the symbol has no snapshot.
    pub async fn delete_by_symbol(&self, symbol: &str) -> Result<u64> {
        let outcome = self
            .db
            .execute("DELETE FROM market_state WHERE symbol = ?", &[symbol.into()])
            .await?;
        if outcome.rows_affected == 0 {
            return Err(StoreError::NotFound(format!("market state for {symbol}")));
        }

        debug!(symbol, rows = outcome.rows_affected, "Market state deleted");
        self.notifier.publish(ChangeKind::MarketStateUpdated);
        Ok(outcome.rows_affected)
    }

    /// Deletes every snapshot whose `updated_at` is strictly before `cutoff`
    /// and returns the count. Publishes only when something was removed.
    ///
    /// # Errors
    /// Returns an error if the delete fails.
    pub async fn delete_stale_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let outcome = self
            .db
            .execute(
                "DELETE FROM market_state WHERE updated_at < ?",
                &[cutoff.timestamp_millis().into()],
            )
            .await?;

        if outcome.rows_affected > 0 {
            info!(removed = outcome.rows_affected, %cutoff, "Swept stale market state");
            self.notifier.publish(ChangeKind::MarketStateUpdated);
        }
        Ok(outcome.rows_affected)
    }

    /// Returns up to `limit` snapshots, newest first.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row does not decode.
    pub async fn list(&self, limit: u32) -> Result<Vec<MarketState>> {
        let rows = self
            .db
            .query(
                &format!("SELECT {MARKET_STATE_COLUMNS} FROM market_state ORDER BY id DESC LIMIT ?"),
                &[clamp_limit(limit).into()],
            )
            .await?;
        rows.iter().map(MarketState::from_row).collect()
    }

    /// Returns the current (newest) snapshot of `symbol`.
    ///
    /// # Errors
    /// Returns an error if the query fails or the row does not decode.
    pub async fn latest(&self, symbol: &str) -> Result<Option<MarketState>> {
        let row = self
            .db
            .query_optional(
                &format!(
                    "SELECT {MARKET_STATE_COLUMNS} FROM market_state \
                     WHERE symbol = ? ORDER BY id DESC LIMIT 1"
                ),
                &[symbol.into()],
            )
            .await?;
        row.as_ref().map(MarketState::from_row).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candle, Wall};
    use chrono::TimeZone;
    use serde_json::json;

    async fn repo() -> (MarketStateRepository, ChangeNotifier) {
        let db = Database::in_memory().await.unwrap();
        let notifier = ChangeNotifier::new(8, 64);
        (MarketStateRepository::new(db, notifier.clone()), notifier)
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[tokio::test]
    async fn insert_keeps_walls_and_json_payloads() {
        let (repo, _) = repo().await;
        let mut snapshot = NewMarketState::new("BTCUSDT", 50_000.0, at(0));
        snapshot.buy_walls = Some(2);
        snapshot.nearest_buy = Some(Wall {
            price: 49_500.0,
            strength: 3.2,
            distance: 1.0,
        });
        snapshot.trend = Some("up".into());
        snapshot.position = Some(
            json!({"side": "LONG", "confidence": 0.7})
                .as_object()
                .cloned()
                .unwrap(),
        );
        snapshot.candles = Some(vec![Candle {
            open_time: 1,
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
            volume: 100.0,
        }]);

        let id = repo.insert(&snapshot).await.unwrap();
        let stored = repo.latest("BTCUSDT").await.unwrap().unwrap();

        assert_eq!(stored.id, id);
        assert_eq!(stored.nearest_buy, snapshot.nearest_buy);
        assert_eq!(stored.nearest_sell, None);
        assert_eq!(stored.position, snapshot.position);
        assert_eq!(stored.candles, snapshot.candles);
        assert_eq!(stored.updated_at, at(0));
    }

    #[tokio::test]
    async fn update_by_symbol_touches_newest_row_only() {
        let (repo, _) = repo().await;
        let old = repo.insert(&NewMarketState::new("ETHUSDT", 1.0, at(0))).await.unwrap();
        let new = repo.insert(&NewMarketState::new("ETHUSDT", 2.0, at(1))).await.unwrap();

        let fields = FieldSet::new()
            .with(MarketStateField::Price(3.0))
            .with(MarketStateField::UpdatedAt(at(5)));
        repo.update_by_symbol("ETHUSDT", &fields).await.unwrap();

        let rows = repo.list(10).await.unwrap();
        let newest = rows.iter().find(|r| r.id == new).unwrap();
        let oldest = rows.iter().find(|r| r.id == old).unwrap();
        assert!((newest.price - 3.0).abs() < f64::EPSILON);
        assert_eq!(newest.updated_at, at(5));
        assert!((oldest.price - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn update_stamps_updated_at_when_not_given() {
        let (repo, _) = repo().await;
        repo.insert(&NewMarketState::new("SOLUSDT", 1.0, at(0))).await.unwrap();

        let fields = FieldSet::new().with(MarketStateField::Trend(Some("down".into())));
        repo.update_by_symbol("SOLUSDT", &fields).await.unwrap();

        let stored = repo.latest("SOLUSDT").await.unwrap().unwrap();
        assert!(stored.updated_at > at(0));
        assert_eq!(stored.trend.as_deref(), Some("down"));
    }

    #[tokio::test]
    async fn clearing_a_wall_nulls_the_whole_side() {
        let (repo, _) = repo().await;
        let mut snapshot = NewMarketState::new("BTCUSDT", 1.0, at(0));
        snapshot.nearest_sell = Some(Wall {
            price: 2.0,
            strength: 1.0,
            distance: 0.5,
        });
        repo.insert(&snapshot).await.unwrap();

        let fields = FieldSet::new().with(MarketStateField::NearestSell(None));
        repo.update_by_symbol("BTCUSDT", &fields).await.unwrap();

        assert_eq!(repo.latest("BTCUSDT").await.unwrap().unwrap().nearest_sell, None);
    }

    #[tokio::test]
    async fn unknown_symbol_is_not_found() {
        let (repo, _) = repo().await;
        let fields = FieldSet::new().with(MarketStateField::Price(1.0));
        assert!(repo.update_by_symbol("NONE", &fields).await.unwrap_err().is_not_found());
        assert!(repo.delete_by_symbol("NONE").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn stale_sweep_uses_strict_cutoff_and_is_idempotent() {
        let (repo, notifier) = repo().await;
        let stale = repo.insert(&NewMarketState::new("A", 1.0, at(-10))).await.unwrap();
        let boundary = repo.insert(&NewMarketState::new("B", 1.0, at(0))).await.unwrap();
        let fresh = repo.insert(&NewMarketState::new("C", 1.0, at(10))).await.unwrap();
        let mut sub = notifier.subscribe().unwrap();

        assert_eq!(repo.delete_stale_before(at(0)).await.unwrap(), 1);
        assert_eq!(repo.delete_stale_before(at(0)).await.unwrap(), 0);

        let ids: Vec<i64> = repo.list(10).await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![fresh, boundary]);
        assert!(!ids.contains(&stale));

        // Only the sweep that removed rows published.
        assert_eq!(sub.try_recv().unwrap().kind, ChangeKind::MarketStateUpdated);
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn delete_by_symbol_removes_history() {
        let (repo, _) = repo().await;
        repo.insert(&NewMarketState::new("XRPUSDT", 1.0, at(0))).await.unwrap();
        repo.insert(&NewMarketState::new("XRPUSDT", 1.1, at(1))).await.unwrap();
        repo.insert(&NewMarketState::new("ADAUSDT", 0.3, at(1))).await.unwrap();

        assert_eq!(repo.delete_by_symbol("XRPUSDT").await.unwrap(), 2);
        assert!(repo.latest("XRPUSDT").await.unwrap().is_none());
        assert!(repo.latest("ADAUSDT").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn list_respects_limit() {
        let (repo, _) = repo().await;
        for i in 0..4 {
            repo.insert(&NewMarketState::new("BTCUSDT", 1.0, at(i)))
                .await
                .unwrap();
        }
        assert_eq!(repo.list(2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn every_mutation_publishes() {
        let (repo, notifier) = repo().await;
        let mut sub = notifier.subscribe().unwrap();

        repo.insert(&NewMarketState::new("BTCUSDT", 1.0, at(0))).await.unwrap();
        repo.update_by_symbol("BTCUSDT", &FieldSet::new().with(MarketStateField::Price(2.0)))
            .await
            .unwrap();
        repo.delete_by_symbol("BTCUSDT").await.unwrap();

        for _ in 0..3 {
            assert_eq!(sub.try_recv().unwrap().kind, ChangeKind::MarketStateUpdated);
        }
        assert!(sub.try_recv().is_none());
    }
}
