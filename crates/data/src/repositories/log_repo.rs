//! Log repository. Append-only: there is no update or delete.

use super::clamp_limit;
use crate::database::{Database, SqlValue};
use crate::error::Result;
use crate::models::log::LOG_COLUMNS;
use crate::models::{LogEntry, NewLogEntry};
use chrono::Utc;
use tracing::debug;
use tradestate_core::{ChangeKind, ChangeNotifier};

/// Repository for audit log entries.
#[derive(Clone)]
pub struct LogRepository {
    db: Database,
    notifier: ChangeNotifier,
}

impl LogRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(db: Database, notifier: ChangeNotifier) -> Self {
        Self { db, notifier }
    }

    /// Appends an entry and returns its id. A missing timestamp is stamped
    /// with the current Unix time in seconds.
    ///
    /// # Errors
    /// Returns `StoreError::Validation` for an empty action, or a storage error.
    pub async fn append(&self, entry: &NewLogEntry) -> Result<i64> {
        let timestamp = entry.timestamp.unwrap_or_else(|| Utc::now().timestamp());
        let params: Vec<SqlValue> = vec![
            entry.action.as_str().into(),
            entry.status.as_str().into(),
            entry.message.clone().into(),
            entry.order_index.into(),
            entry.order_id.clone().into(),
            entry.client_order_id.clone().into(),
            timestamp.into(),
        ];

        let outcome = self
            .db
            .execute(
                r"
                INSERT INTO logs (action, status, message, order_index, order_id, client_order_id, timestamp)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ",
                &params,
            )
            .await?;

        debug!(id = outcome.last_insert_id, action = %entry.action, "Log appended");
        self.notifier.publish(ChangeKind::LogsUpdated);
        Ok(outcome.last_insert_id)
    }

    /// Returns up to `limit` entries, newest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn recent(&self, limit: u32) -> Result<Vec<LogEntry>> {
        let rows = self
            .db
            .query(
                &format!("SELECT {LOG_COLUMNS} FROM logs ORDER BY id DESC LIMIT ?"),
                &[clamp_limit(limit).into()],
            )
            .await?;
        rows.iter().map(LogEntry::from_row).collect()
    }

    /// Returns every entry, newest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn all(&self) -> Result<Vec<LogEntry>> {
        let rows = self
            .db
            .query(&format!("SELECT {LOG_COLUMNS} FROM logs ORDER BY id DESC"), &[])
            .await?;
        rows.iter().map(LogEntry::from_row).collect()
    }

    /// Returns up to `limit` entries correlated with an external order id,
    /// newest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn recent_for_order(&self, order_id: &str, limit: u32) -> Result<Vec<LogEntry>> {
        let rows = self
            .db
            .query(
                &format!(
                    "SELECT {LOG_COLUMNS} FROM logs WHERE order_id = ? ORDER BY id DESC LIMIT ?"
                ),
                &[order_id.into(), clamp_limit(limit).into()],
            )
            .await?;
        rows.iter().map(LogEntry::from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LogStatus;

    async fn repo() -> (LogRepository, ChangeNotifier) {
        let db = Database::in_memory().await.unwrap();
        let notifier = ChangeNotifier::new(8, 64);
        (LogRepository::new(db, notifier.clone()), notifier)
    }

    #[tokio::test]
    async fn append_defaults_status_and_timestamp() {
        let (repo, _) = repo().await;
        let before = Utc::now().timestamp();

        repo.append(&NewLogEntry::new("open_position")).await.unwrap();

        let entries = repo.recent(10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, LogStatus::Success);
        assert!(entries[0].timestamp >= before);
        assert!(entries[0].timestamp <= Utc::now().timestamp());
    }

    #[tokio::test]
    async fn explicit_timestamp_is_kept() {
        let (repo, _) = repo().await;
        let mut entry = NewLogEntry::new("sync").with_status(LogStatus::Warning);
        entry.timestamp = Some(1_600_000_000);
        repo.append(&entry).await.unwrap();

        let stored = &repo.recent(1).await.unwrap()[0];
        assert_eq!(stored.timestamp, 1_600_000_000);
        assert_eq!(stored.status, LogStatus::Warning);
    }

    #[tokio::test]
    async fn recent_caps_count_newest_first() {
        let (repo, _) = repo().await;
        for i in 0..5 {
            repo.append(&NewLogEntry::new(format!("step-{i}"))).await.unwrap();
        }

        let entries = repo.recent(3).await.unwrap();
        let actions: Vec<&str> = entries.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["step-4", "step-3", "step-2"]);
    }

    #[tokio::test]
    async fn all_is_not_capped_by_list_limit() {
        let (repo, _) = repo().await;
        let total = crate::MAX_LIST_LIMIT + 5;
        for i in 0..total {
            repo.append(&NewLogEntry::new(format!("step-{i}"))).await.unwrap();
        }

        let entries = repo.all().await.unwrap();
        assert_eq!(entries.len(), total as usize);
        assert_eq!(entries[0].action, format!("step-{}", total - 1));
        assert_eq!(repo.recent(u32::MAX).await.unwrap().len(), crate::MAX_LIST_LIMIT as usize);
    }

    #[tokio::test]
    async fn empty_action_is_rejected() {
        let (repo, notifier) = repo().await;
        let mut sub = notifier.subscribe().unwrap();

        assert!(repo.append(&NewLogEntry::new("")).await.unwrap_err().is_validation());
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn recent_for_order_filters_by_correlation_id() {
        let (repo, _) = repo().await;
        repo.append(&NewLogEntry::new("open").with_order_id("a1")).await.unwrap();
        repo.append(&NewLogEntry::new("open").with_order_id("b2")).await.unwrap();
        repo.append(
            &NewLogEntry::new("close")
                .with_order_id("a1")
                .with_status(LogStatus::Error)
                .with_message("exchange rejected"),
        )
        .await
        .unwrap();

        let entries = repo.recent_for_order("a1", 10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "close");
        assert_eq!(entries[0].message.as_deref(), Some("exchange rejected"));
    }

    #[tokio::test]
    async fn append_publishes_logs_updated() {
        let (repo, notifier) = repo().await;
        let mut sub = notifier.subscribe().unwrap();

        repo.append(&NewLogEntry::new("heartbeat")).await.unwrap();

        assert_eq!(sub.try_recv().unwrap().kind, ChangeKind::LogsUpdated);
        assert!(sub.try_recv().is_none());
    }
}
