//! The single shared tunables record.

use super::from_millis;
use crate::error::{Result, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// Tunables shared by the trading process and the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsValues {
    #[serde(alias = "tsls")]
    pub trailing_stop_loss_percent: f64,
    #[serde(alias = "tps")]
    pub take_profit_percent: f64,
    pub min_vol: f64,
    pub max_vol: f64,
    pub min_vol24: f64,
    pub max_vol24: f64,
    pub leverage: f64,
    /// Symbols the trading process must skip, in the order given.
    #[serde(default)]
    pub black_list: Vec<String>,
}

impl Default for SettingsValues {
    fn default() -> Self {
        Self {
            trailing_stop_loss_percent: 20.0,
            take_profit_percent: 60.0,
            min_vol: 1.5,
            max_vol: 8.0,
            min_vol24: 500_000.0,
            max_vol24: 5_000_000.0,
            leverage: 2.0,
            black_list: Vec::new(),
        }
    }
}

impl SettingsValues {
    /// Checks value ranges and returns a copy with the blacklist trimmed and
    /// de-duplicated (first occurrence wins).
    ///
    /// # Errors
    /// Returns `StoreError::Validation` on negative or inverted ranges.
    pub fn normalized(&self) -> Result<Self> {
        let numbers = [
            ("trailingStopLossPercent", self.trailing_stop_loss_percent),
            ("takeProfitPercent", self.take_profit_percent),
            ("minVol", self.min_vol),
            ("maxVol", self.max_vol),
            ("minVol24", self.min_vol24),
            ("maxVol24", self.max_vol24),
            ("leverage", self.leverage),
        ];
        for (name, value) in numbers {
            if !value.is_finite() || value < 0.0 {
                return Err(StoreError::validation(format!(
                    "`{name}` must be a non-negative number"
                )));
            }
        }
        if self.min_vol > self.max_vol {
            return Err(StoreError::validation("`minVol` exceeds `maxVol`"));
        }
        if self.min_vol24 > self.max_vol24 {
            return Err(StoreError::validation("`minVol24` exceeds `maxVol24`"));
        }

        let mut black_list: Vec<String> = Vec::with_capacity(self.black_list.len());
        for symbol in &self.black_list {
            let symbol = symbol.trim();
            if !symbol.is_empty() && !black_list.iter().any(|s| s == symbol) {
                black_list.push(symbol.to_string());
            }
        }

        Ok(Self {
            black_list,
            ..self.clone()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(flatten)]
    pub values: SettingsValues,
    pub updated_at: DateTime<Utc>,
}

pub(crate) const SETTINGS_COLUMNS: &str =
    "tsls, tps, min_vol, max_vol, min_vol24, max_vol24, leverage, black_list, updated_at";

impl Settings {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        let black_list: String = row.try_get("black_list")?;
        let black_list: Vec<String> = serde_json::from_str(&black_list)
            .map_err(|e| StoreError::corrupt(format!("blacklist: {e}")))?;

        Ok(Self {
            values: SettingsValues {
                trailing_stop_loss_percent: row.try_get("tsls")?,
                take_profit_percent: row.try_get("tps")?,
                min_vol: row.try_get("min_vol")?,
                max_vol: row.try_get("max_vol")?,
                min_vol24: row.try_get("min_vol24")?,
                max_vol24: row.try_get("max_vol24")?,
                leverage: row.try_get("leverage")?,
                black_list,
            },
            updated_at: from_millis(row.try_get("updated_at")?)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn short_aliases_are_accepted() {
        let values: SettingsValues = serde_json::from_value(json!({
            "tsls": 15,
            "tps": 40,
            "minVol": 1,
            "maxVol": 9,
            "minVol24": 100,
            "maxVol24": 200,
            "leverage": 3
        }))
        .unwrap();
        assert!((values.trailing_stop_loss_percent - 15.0).abs() < f64::EPSILON);
        assert!(values.black_list.is_empty());
    }

    #[test]
    fn blacklist_is_trimmed_and_deduplicated_in_order() {
        let values = SettingsValues {
            black_list: vec![" DOGEUSDT".into(), "PEPEUSDT".into(), "DOGEUSDT".into(), String::new()],
            ..SettingsValues::default()
        };
        assert_eq!(
            values.normalized().unwrap().black_list,
            vec!["DOGEUSDT".to_string(), "PEPEUSDT".to_string()]
        );
    }

    #[test]
    fn inverted_volume_range_is_rejected() {
        let values = SettingsValues {
            min_vol: 10.0,
            max_vol: 2.0,
            ..SettingsValues::default()
        };
        assert!(values.normalized().unwrap_err().is_validation());
    }

    #[test]
    fn negative_leverage_is_rejected() {
        let values = SettingsValues {
            leverage: -1.0,
            ..SettingsValues::default()
        };
        assert!(values.normalized().is_err());
    }
}
