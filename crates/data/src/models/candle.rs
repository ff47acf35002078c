//! Candle payloads stored as opaque JSON alongside market state and scanner rows.

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};

/// Most candles kept with a snapshot.
pub const MAX_CANDLES: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candle {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Checks the decoded shape before the list is serialized into a column.
pub(crate) fn check_candles(candles: &[Candle]) -> Result<()> {
    if candles.len() > MAX_CANDLES {
        return Err(StoreError::validation(format!(
            "at most {MAX_CANDLES} candles may be stored, got {}",
            candles.len()
        )));
    }
    Ok(())
}

pub(crate) fn encode_candles(candles: Option<&Vec<Candle>>) -> Result<Option<String>> {
    candles
        .map(|c| {
            check_candles(c)?;
            crate::patch::encode_json(c)
        })
        .transpose()
}

pub(crate) fn decode_candles(text: Option<String>) -> Result<Option<Vec<Candle>>> {
    text.map(|t| {
        serde_json::from_str(&t).map_err(|e| StoreError::corrupt(format!("candles: {e}")))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(open_time: i64) -> Candle {
        Candle {
            open_time,
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
            volume: 10.0,
        }
    }

    #[test]
    fn more_than_three_candles_is_rejected() {
        let candles: Vec<Candle> = (0..4).map(candle).collect();
        assert!(encode_candles(Some(&candles)).unwrap_err().is_validation());
    }

    #[test]
    fn stored_text_decodes_back() {
        let candles: Vec<Candle> = (0..3).map(candle).collect();
        let text = encode_candles(Some(&candles)).unwrap();
        assert_eq!(decode_candles(text).unwrap(), Some(candles));
        assert_eq!(decode_candles(None).unwrap(), None);
    }

    #[test]
    fn garbage_text_is_corrupt() {
        let err = decode_candles(Some("{not json".to_string())).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }
}
