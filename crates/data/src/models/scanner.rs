//! Symbol ranking entries.

use super::candle::{check_candles, decode_candles, encode_candles, Candle};
use super::from_millis;
use crate::database::SqlValue;
use crate::error::Result;
use crate::patch::{decode, Assignment, Field};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewScannerEntry {
    pub symbol: String,
    pub score: f64,
    pub volatility: f64,
    #[serde(default)]
    pub candles: Option<Vec<Candle>>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl NewScannerEntry {
    #[must_use]
    pub fn new(
        symbol: impl Into<String>,
        score: f64,
        volatility: f64,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            score,
            volatility,
            candles: None,
            updated_at,
        }
    }

    pub(crate) fn params(&self) -> Result<Vec<SqlValue>> {
        Ok(vec![
            self.symbol.as_str().into(),
            self.score.into(),
            self.volatility.into(),
            encode_candles(self.candles.as_ref())?.into(),
            self.updated_at.timestamp_millis().into(),
        ])
    }
}

pub(crate) const SCANNER_COLUMNS: &str = "id, symbol, score, volatility, candles, updated_at";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannerEntry {
    pub id: i64,
    pub symbol: String,
    pub score: f64,
    pub volatility: f64,
    pub candles: Option<Vec<Candle>>,
    pub updated_at: DateTime<Utc>,
}

impl ScannerEntry {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            symbol: row.try_get("symbol")?,
            score: row.try_get("score")?,
            volatility: row.try_get("volatility")?,
            candles: decode_candles(row.try_get("candles")?)?,
            updated_at: from_millis(row.try_get("updated_at")?)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScannerField {
    Symbol(String),
    Score(f64),
    Volatility(f64),
    Candles(Option<Vec<Candle>>),
    UpdatedAt(DateTime<Utc>),
}

impl ScannerField {
    pub const UPDATED_AT: &'static str = "updatedAt";
}

impl Field for ScannerField {
    fn from_json(key: &str, value: Value) -> Result<Option<Self>> {
        Ok(Some(match key {
            "symbol" => Self::Symbol(decode(key, value)?),
            "score" => Self::Score(decode(key, value)?),
            "volatility" => Self::Volatility(decode(key, value)?),
            "candles" => {
                let candles: Option<Vec<Candle>> = decode(key, value)?;
                if let Some(c) = &candles {
                    check_candles(c)?;
                }
                Self::Candles(candles)
            }
            "updatedAt" | "updated_at" => Self::UpdatedAt(decode(key, value)?),
            _ => return Ok(None),
        }))
    }

    fn key(&self) -> &'static str {
        match self {
            Self::Symbol(_) => "symbol",
            Self::Score(_) => "score",
            Self::Volatility(_) => "volatility",
            Self::Candles(_) => "candles",
            Self::UpdatedAt(_) => Self::UPDATED_AT,
        }
    }

    fn assign(&self, out: &mut Vec<Assignment>) -> Result<()> {
        let assignment: Assignment = match self {
            Self::Symbol(v) => ("symbol", v.as_str().into()),
            Self::Score(v) => ("score", (*v).into()),
            Self::Volatility(v) => ("volatility", (*v).into()),
            Self::Candles(v) => ("candles", encode_candles(v.as_ref())?.into()),
            Self::UpdatedAt(v) => ("updated_at", v.timestamp_millis().into()),
        };
        out.push(assignment);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::FieldSet;
    use serde_json::json;

    #[test]
    fn score_must_be_numeric() {
        let err = FieldSet::<ScannerField>::from_json(json!({"score": "high"})).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn updated_at_accepts_rfc3339() {
        let set = FieldSet::<ScannerField>::from_json(json!({
            "updatedAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(
            set.assignments().unwrap(),
            vec![("updated_at", SqlValue::Integer(1_704_067_200_000))]
        );
    }
}
