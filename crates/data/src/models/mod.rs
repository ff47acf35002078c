//! Record models for the five tables.
//!
//! Row decoding is explicit: enum columns are parsed from their stored text
//! and opaque JSON columns are decoded into their documented shapes, so a
//! malformed stored value surfaces as `StoreError::Corrupt`.

pub mod candle;
pub mod log;
pub mod market_state;
pub mod order;
pub mod scanner;
pub mod settings;

pub use candle::{Candle, MAX_CANDLES};
pub use log::{LogEntry, LogStatus, NewLogEntry};
pub use market_state::{
    MarketState, MarketStateField, NewMarketState, PositionRecommendation, Wall,
};
pub use order::{AiPrediction, NewOrder, Order, OrderField, OrderFilter, OrderKey, OrderStatus, Side};
pub use scanner::{NewScannerEntry, ScannerEntry, ScannerField};
pub use settings::{Settings, SettingsValues};

use crate::error::{Result, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// `updated_at` columns hold Unix milliseconds.
pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::corrupt(format!("timestamp {ms} out of range")))
}

/// External identifier as sent by exchange clients: a JSON string or number.
#[derive(Deserialize)]
#[serde(untagged)]
enum ExternalId {
    Text(String),
    Number(serde_json::Number),
}

/// Reads an optional external id, keeping numbers in their decimal text form.
pub(crate) fn external_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<ExternalId>::deserialize(deserializer)?.map(|id| match id {
        ExternalId::Text(text) => text,
        ExternalId::Number(number) => number.to_string(),
    }))
}

/// `external_id` for patch values.
pub(crate) fn decode_external_id(key: &str, value: serde_json::Value) -> Result<Option<String>> {
    external_id(value)
        .map_err(|e| StoreError::validation(format!("invalid value for `{key}`: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn external_ids_accept_strings_and_numbers() {
        assert_eq!(decode_external_id("orderId", json!("ex-1")).unwrap().as_deref(), Some("ex-1"));
        assert_eq!(
            decode_external_id("orderId", json!(123_456_789)).unwrap().as_deref(),
            Some("123456789")
        );
        assert_eq!(decode_external_id("orderId", json!(null)).unwrap(), None);
        assert!(decode_external_id("orderId", json!(true)).unwrap_err().is_validation());
    }
}
