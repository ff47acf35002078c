use serde::{Deserialize, Serialize};
use std::fmt;

/// Which record kind changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    OrdersUpdated,
    LogsUpdated,
    MarketStateUpdated,
    ScannerUpdated,
    SettingsUpdated,
}

impl ChangeKind {
    pub const ALL: [Self; 5] = [
        Self::OrdersUpdated,
        Self::LogsUpdated,
        Self::MarketStateUpdated,
        Self::ScannerUpdated,
        Self::SettingsUpdated,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OrdersUpdated => "orders_updated",
            Self::LogsUpdated => "logs_updated",
            Self::MarketStateUpdated => "market_state_updated",
            Self::ScannerUpdated => "scanner_updated",
            Self::SettingsUpdated => "settings_updated",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification that a record kind changed. Carries no record contents;
/// observers re-query the store for current data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
}

impl ChangeEvent {
    #[must_use]
    pub const fn new(kind: ChangeKind) -> Self {
        Self { kind }
    }

    /// Text frame sent to observers: `{"kind":"orders_updated"}`.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_text(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<ChangeKind> for ChangeEvent {
    fn from(kind: ChangeKind) -> Self {
        Self::new(kind)
    }
}
