//! Settings repository. There is exactly one settings row, created with
//! defaults when the schema is initialized.

use crate::database::{Database, SqlValue, SETTINGS_ROW_ID};
use crate::error::{Result, StoreError};
use crate::models::settings::SETTINGS_COLUMNS;
use crate::models::{from_millis, Settings, SettingsValues};
use crate::patch::encode_json;
use chrono::Utc;
use tracing::info;
use tradestate_core::{ChangeKind, ChangeNotifier};

#[derive(Clone)]
pub struct SettingsRepository {
    db: Database,
    notifier: ChangeNotifier,
}

impl SettingsRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(db: Database, notifier: ChangeNotifier) -> Self {
        Self { db, notifier }
    }

    /// Returns the current settings.
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` if the schema was never initialized.
    pub async fn get(&self) -> Result<Settings> {
        let row = self
            .db
            .query_optional(
                &format!("SELECT {SETTINGS_COLUMNS} FROM settings WHERE id = ?"),
                &[SETTINGS_ROW_ID.into()],
            )
            .await?
            .ok_or_else(|| StoreError::NotFound("settings".to_string()))?;
        Settings::from_row(&row)
    }

    /// Replaces every settings value and returns what was written. The
    /// blacklist is trimmed and deduplicated before it is written.
    ///
    /// # Errors
    /// Returns `StoreError::Validation` for out-of-range values, or
    /// `StoreError::NotFound` if the settings row is missing.
    pub async fn update(&self, values: &SettingsValues) -> Result<Settings> {
        let values = values.normalized()?;
        // Stored at millisecond precision.
        let updated_at = from_millis(Utc::now().timestamp_millis())?;
        let params: Vec<SqlValue> = vec![
            values.trailing_stop_loss_percent.into(),
            values.take_profit_percent.into(),
            values.min_vol.into(),
            values.max_vol.into(),
            values.min_vol24.into(),
            values.max_vol24.into(),
            values.leverage.into(),
            encode_json(&values.black_list)?.into(),
            updated_at.timestamp_millis().into(),
            SETTINGS_ROW_ID.into(),
        ];

        let outcome = self
            .db
            .execute(
                r"
                UPDATE settings SET
                    tsls = ?, tps = ?, min_vol = ?, max_vol = ?,
                    min_vol24 = ?, max_vol24 = ?, leverage = ?,
                    black_list = ?, updated_at = ?
                WHERE id = ?
                ",
                &params,
            )
            .await?;
        if outcome.rows_affected == 0 {
            return Err(StoreError::NotFound("settings".to_string()));
        }

        info!(
            leverage = values.leverage,
            blacklisted = values.black_list.len(),
            "Settings updated"
        );
        self.notifier.publish(ChangeKind::SettingsUpdated);
        Ok(Settings { values, updated_at })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn repo() -> (SettingsRepository, ChangeNotifier) {
        let db = Database::in_memory().await.unwrap();
        let notifier = ChangeNotifier::new(8, 64);
        (SettingsRepository::new(db, notifier.clone()), notifier)
    }

    #[tokio::test]
    async fn fresh_store_has_defaults() {
        let (repo, _) = repo().await;
        let settings = repo.get().await.unwrap();
        assert_eq!(settings.values, SettingsValues::default());
    }

    #[tokio::test]
    async fn update_replaces_values_and_normalizes_blacklist() {
        let (repo, notifier) = repo().await;
        let mut sub = notifier.subscribe().unwrap();
        let before = repo.get().await.unwrap().updated_at;

        let values = SettingsValues {
            leverage: 5.0,
            black_list: vec!["DOGEUSDT ".into(), "DOGEUSDT".into()],
            ..SettingsValues::default()
        };
        let stored = repo.update(&values).await.unwrap();

        assert!((stored.values.leverage - 5.0).abs() < f64::EPSILON);
        assert_eq!(stored.values.black_list, vec!["DOGEUSDT".to_string()]);
        assert!(stored.updated_at >= before);
        assert_eq!(repo.get().await.unwrap(), stored);
        assert_eq!(sub.try_recv().unwrap().kind, ChangeKind::SettingsUpdated);
    }

    #[tokio::test]
    async fn update_returns_its_own_write() {
        let (repo, _) = repo().await;
        // Stands in for a writer that lands right after this update commits.
        repo.db
            .execute(
                r"
                CREATE TRIGGER overwrite_leverage AFTER UPDATE OF leverage ON settings
                BEGIN
                    UPDATE settings SET leverage = 99 WHERE id = NEW.id;
                END
                ",
                &[],
            )
            .await
            .unwrap();

        let values = SettingsValues {
            leverage: 5.0,
            ..SettingsValues::default()
        };
        let returned = repo.update(&values).await.unwrap();

        assert!((returned.values.leverage - 5.0).abs() < f64::EPSILON);
        assert!((repo.get().await.unwrap().values.leverage - 99.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn invalid_update_leaves_row_untouched() {
        let (repo, notifier) = repo().await;
        let mut sub = notifier.subscribe().unwrap();
        let values = SettingsValues {
            min_vol24: 10.0,
            max_vol24: 1.0,
            ..SettingsValues::default()
        };

        assert!(repo.update(&values).await.unwrap_err().is_validation());
        assert_eq!(repo.get().await.unwrap().values, SettingsValues::default());
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn missing_row_is_not_found() {
        let (repo, _) = repo().await;
        repo.db.execute("DELETE FROM settings", &[]).await.unwrap();
        assert!(repo.get().await.unwrap_err().is_not_found());
        assert!(repo
            .update(&SettingsValues::default())
            .await
            .unwrap_err()
            .is_not_found());
    }
}
