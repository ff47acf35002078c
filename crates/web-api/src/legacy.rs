//! Row shapes of the unprefixed `/orders` and `/logs` routes.
//!
//! These routes return rows keyed by their table column names, so older
//! dashboards that read `amount_usdt` or `tlsl` keep working.

use serde::Serialize;
use serde_json::Value;
use tradestate_data::{AiPrediction, LogEntry, LogStatus, Order, OrderStatus, Side};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegacyOrder {
    pub id: i64,
    pub symbol: String,
    pub order_id: Option<String>,
    pub position_id: Option<String>,
    pub side: Side,
    pub order_type: String,
    pub leverage: Option<f64>,
    pub amount_usdt: f64,
    pub open_time: i64,
    pub open_price: f64,
    pub ai_prediction: Option<AiPrediction>,
    pub ai_reason: Option<String>,
    pub latest_update_time: Option<i64>,
    pub latest_price: Option<f64>,
    pub tlsl: Option<f64>,
    pub target_profit_percent: Option<f64>,
    pub status: OrderStatus,
    pub close_reason: Option<String>,
    pub close_time: Option<i64>,
    pub close_price: Option<f64>,
    pub pnl_usdt: Option<f64>,
    pub pnl_percent: Option<f64>,
    pub note: Option<String>,
}

impl From<Order> for LegacyOrder {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            symbol: order.symbol,
            order_id: order.order_id,
            position_id: order.position_id,
            side: order.side,
            order_type: order.order_type,
            leverage: order.leverage,
            amount_usdt: order.amount_usdt,
            open_time: order.open_time,
            open_price: order.open_price,
            ai_prediction: order.ai_prediction,
            ai_reason: order.ai_reason,
            latest_update_time: order.latest_update_time,
            latest_price: order.latest_price,
            tlsl: order.trailing_stop_loss_percent,
            target_profit_percent: order.target_profit_percent,
            status: order.status,
            close_reason: order.close_reason,
            close_time: order.close_time,
            close_price: order.close_price,
            pnl_usdt: order.pnl_usdt,
            pnl_percent: order.pnl_percent,
            note: order.note,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegacyLog {
    pub id: i64,
    pub action: String,
    pub status: LogStatus,
    pub message: Option<String>,
    pub order_index: Option<i64>,
    /// Integer when the stored id is numeric, text otherwise.
    pub order_id: Option<Value>,
    #[serde(rename = "clientOrderId")]
    pub client_order_id: Option<String>,
    pub timestamp: i64,
}

impl From<LogEntry> for LegacyLog {
    fn from(entry: LogEntry) -> Self {
        Self {
            id: entry.id,
            action: entry.action,
            status: entry.status,
            message: entry.message,
            order_index: entry.order_index,
            order_id: entry.order_id.map(|id| match id.parse::<i64>() {
                Ok(number) => Value::from(number),
                Err(_) => Value::String(id),
            }),
            client_order_id: entry.client_order_id,
            timestamp: entry.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(order_id: Option<&str>) -> LogEntry {
        LogEntry {
            id: 1,
            action: "open".into(),
            status: LogStatus::Success,
            message: None,
            order_index: Some(0),
            order_id: order_id.map(str::to_string),
            client_order_id: Some("c-1".into()),
            timestamp: 1_700_000_000,
        }
    }

    #[test]
    fn log_keys_follow_table_columns() {
        let value = serde_json::to_value(LegacyLog::from(entry(Some("42")))).unwrap();
        assert_eq!(
            value,
            json!({
                "id": 1,
                "action": "open",
                "status": "success",
                "message": null,
                "order_index": 0,
                "order_id": 42,
                "clientOrderId": "c-1",
                "timestamp": 1_700_000_000
            })
        );
    }

    #[test]
    fn non_numeric_log_order_id_stays_text() {
        let log = LegacyLog::from(entry(Some("ex-7")));
        assert_eq!(log.order_id, Some(json!("ex-7")));
        assert_eq!(LegacyLog::from(entry(None)).order_id, None);
    }
}
