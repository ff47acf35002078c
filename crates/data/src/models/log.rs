//! Append-only audit log entries.

use crate::error::{Result, StoreError};
use crate::models::external_id;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// Outcome recorded for a logged action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    #[default]
    Success,
    Error,
    Warning,
}

impl LogStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Warning => "warning",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            "warning" => Some(Self::Warning),
            _ => None,
        }
    }
}

/// Entry to append. Only `action` is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLogEntry {
    pub action: String,
    #[serde(default)]
    pub status: LogStatus,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, alias = "order_index")]
    pub order_index: Option<i64>,
    #[serde(default, alias = "order_id", deserialize_with = "external_id")]
    pub order_id: Option<String>,
    #[serde(default, alias = "client_order_id", deserialize_with = "external_id")]
    pub client_order_id: Option<String>,
    /// Unix seconds; the insert time when absent.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl NewLogEntry {
    #[must_use]
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            status: LogStatus::Success,
            message: None,
            order_index: None,
            order_id: None,
            client_order_id: None,
            timestamp: None,
        }
    }

    #[must_use]
    pub const fn with_status(mut self, status: LogStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_order_id(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }
}

/// Stored log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: i64,
    pub action: String,
    pub status: LogStatus,
    pub message: Option<String>,
    pub order_index: Option<i64>,
    pub order_id: Option<String>,
    pub client_order_id: Option<String>,
    pub timestamp: i64,
}

pub(crate) const LOG_COLUMNS: &str =
    "id, action, status, message, order_index, order_id, client_order_id, timestamp";

impl LogEntry {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        let status: String = row.try_get("status")?;
        Ok(Self {
            id: row.try_get("id")?,
            action: row.try_get("action")?,
            status: LogStatus::parse(&status)
                .ok_or_else(|| StoreError::corrupt(format!("log status `{status}`")))?,
            message: row.try_get("message")?,
            order_index: row.try_get("order_index")?,
            order_id: row.try_get("order_id")?,
            client_order_id: row.try_get("client_order_id")?,
            timestamp: row.try_get("timestamp")?,
        })
    }
}
