//! Trading position/order records.

use crate::database::SqlValue;
use crate::error::{Result, StoreError};
use crate::models::{decode_external_id, external_id};
use crate::patch::{decode, Assignment, Field};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// Position direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// Returns the stored representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Long => "LONG",
            Self::Short => "SHORT",
        }
    }

    /// Parses the stored representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LONG" => Some(Self::Long),
            "SHORT" => Some(Self::Short),
            _ => None,
        }
    }
}

/// Order lifecycle status. Transitions are up to the caller; the store accepts
/// any value of the set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Open,
    Filled,
    Closed,
    Cancelled,
}

impl OrderStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Filled => "filled",
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "filled" => Some(Self::Filled),
            "closed" => Some(Self::Closed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Direction predicted by the AI model when the order was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiPrediction {
    Up,
    Down,
    Neutral,
}

impl AiPrediction {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Neutral => "neutral",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "neutral" => Some(Self::Neutral),
            _ => None,
        }
    }
}

/// Order as supplied at open time. Snake-case aliases accept the payloads of
/// the legacy save-order endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub symbol: String,
    #[serde(default, alias = "order_id", deserialize_with = "external_id")]
    pub order_id: Option<String>,
    #[serde(default, alias = "position_id", deserialize_with = "external_id")]
    pub position_id: Option<String>,
    pub side: Side,
    #[serde(alias = "order_type")]
    pub order_type: String,
    #[serde(default)]
    pub leverage: Option<f64>,
    #[serde(alias = "amount_usdt")]
    pub amount_usdt: f64,
    #[serde(alias = "open_time")]
    pub open_time: i64,
    #[serde(alias = "open_price")]
    pub open_price: f64,
    #[serde(default, alias = "ai_prediction")]
    pub ai_prediction: Option<AiPrediction>,
    #[serde(default, alias = "ai_reason")]
    pub ai_reason: Option<String>,
    #[serde(default, alias = "latest_update_time")]
    pub latest_update_time: Option<i64>,
    #[serde(default, alias = "latest_price")]
    pub latest_price: Option<f64>,
    #[serde(default, alias = "tlsl")]
    pub trailing_stop_loss_percent: Option<f64>,
    #[serde(default, alias = "target_profit_percent")]
    pub target_profit_percent: Option<f64>,
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default, alias = "close_reason")]
    pub close_reason: Option<String>,
    #[serde(default, alias = "close_time")]
    pub close_time: Option<i64>,
    #[serde(default, alias = "close_price")]
    pub close_price: Option<f64>,
    #[serde(default, alias = "pnl_usdt")]
    pub pnl_usdt: Option<f64>,
    #[serde(default, alias = "pnl_percent")]
    pub pnl_percent: Option<f64>,
    #[serde(default)]
    pub note: Option<String>,
}

impl NewOrder {
    /// Minimal order with only the required fields set.
    #[must_use]
    pub fn new(
        symbol: impl Into<String>,
        side: Side,
        order_type: impl Into<String>,
        amount_usdt: f64,
        open_time: i64,
        open_price: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            order_id: None,
            position_id: None,
            side,
            order_type: order_type.into(),
            leverage: None,
            amount_usdt,
            open_time,
            open_price,
            ai_prediction: None,
            ai_reason: None,
            latest_update_time: None,
            latest_price: None,
            trailing_stop_loss_percent: None,
            target_profit_percent: None,
            status: None,
            close_reason: None,
            close_time: None,
            close_price: None,
            pnl_usdt: None,
            pnl_percent: None,
            note: None,
        }
    }

    /// The record `insert` stores for this input under `id`.
    #[must_use]
    pub fn into_order(self, id: i64) -> Order {
        Order {
            id,
            symbol: self.symbol,
            order_id: self.order_id,
            position_id: self.position_id,
            side: self.side,
            order_type: self.order_type,
            leverage: self.leverage,
            amount_usdt: self.amount_usdt,
            open_time: self.open_time,
            open_price: self.open_price,
            ai_prediction: self.ai_prediction,
            ai_reason: self.ai_reason,
            latest_update_time: self.latest_update_time,
            latest_price: self.latest_price,
            trailing_stop_loss_percent: self.trailing_stop_loss_percent,
            target_profit_percent: self.target_profit_percent,
            status: self.status.unwrap_or_default(),
            close_reason: self.close_reason,
            close_time: self.close_time,
            close_price: self.close_price,
            pnl_usdt: self.pnl_usdt,
            pnl_percent: self.pnl_percent,
            note: self.note,
        }
    }
}

/// Stored order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
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
    pub trailing_stop_loss_percent: Option<f64>,
    pub target_profit_percent: Option<f64>,
    pub status: OrderStatus,
    pub close_reason: Option<String>,
    pub close_time: Option<i64>,
    pub close_price: Option<f64>,
    pub pnl_usdt: Option<f64>,
    pub pnl_percent: Option<f64>,
    pub note: Option<String>,
}

/// Column list shared by every order SELECT.
pub(crate) const ORDER_COLUMNS: &str = "id, symbol, order_id, position_id, side, order_type, \
    leverage, amount_usdt, open_time, open_price, ai_prediction, ai_reason, latest_update_time, \
    latest_price, tlsl, target_profit_percent, status, close_reason, close_time, close_price, \
    pnl_usdt, pnl_percent, note";

impl Order {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        let side: String = row.try_get("side")?;
        let status: String = row.try_get("status")?;
        let ai_prediction: Option<String> = row.try_get("ai_prediction")?;

        Ok(Self {
            id: row.try_get("id")?,
            symbol: row.try_get("symbol")?,
            order_id: row.try_get("order_id")?,
            position_id: row.try_get("position_id")?,
            side: Side::parse(&side)
                .ok_or_else(|| StoreError::corrupt(format!("order side `{side}`")))?,
            order_type: row.try_get("order_type")?,
            leverage: row.try_get("leverage")?,
            amount_usdt: row.try_get("amount_usdt")?,
            open_time: row.try_get("open_time")?,
            open_price: row.try_get("open_price")?,
            ai_prediction: ai_prediction
                .map(|p| {
                    AiPrediction::parse(&p)
                        .ok_or_else(|| StoreError::corrupt(format!("ai prediction `{p}`")))
                })
                .transpose()?,
            ai_reason: row.try_get("ai_reason")?,
            latest_update_time: row.try_get("latest_update_time")?,
            latest_price: row.try_get("latest_price")?,
            trailing_stop_loss_percent: row.try_get("tlsl")?,
            target_profit_percent: row.try_get("target_profit_percent")?,
            status: OrderStatus::parse(&status)
                .ok_or_else(|| StoreError::corrupt(format!("order status `{status}`")))?,
            close_reason: row.try_get("close_reason")?,
            close_time: row.try_get("close_time")?,
            close_price: row.try_get("close_price")?,
            pnl_usdt: row.try_get("pnl_usdt")?,
            pnl_percent: row.try_get("pnl_percent")?,
            note: row.try_get("note")?,
        })
    }
}

/// Exact-match filter for order listing. Absent keys impose no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFilter {
    pub symbol: Option<String>,
    pub status: Option<OrderStatus>,
    pub side: Option<Side>,
}

impl OrderFilter {
    #[must_use]
    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    #[must_use]
    pub const fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub const fn side(mut self, side: Side) -> Self {
        self.side = Some(side);
        self
    }
}

/// Lookup key for order updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderKey {
    /// Engine-assigned row id (canonical).
    Id(i64),
    /// Exchange order identifier; matches every row carrying it.
    OrderId(String),
}

impl std::fmt::Display for OrderKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id {id}"),
            Self::OrderId(order_id) => write!(f, "order id {order_id}"),
        }
    }
}

/// Updatable order column. `id` is not part of the set.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderField {
    Symbol(String),
    OrderId(Option<String>),
    PositionId(Option<String>),
    Side(Side),
    OrderType(String),
    Leverage(Option<f64>),
    AmountUsdt(f64),
    OpenTime(i64),
    OpenPrice(f64),
    AiPrediction(Option<AiPrediction>),
    AiReason(Option<String>),
    LatestUpdateTime(Option<i64>),
    LatestPrice(Option<f64>),
    TrailingStopLossPercent(Option<f64>),
    TargetProfitPercent(Option<f64>),
    Status(OrderStatus),
    CloseReason(Option<String>),
    CloseTime(Option<i64>),
    ClosePrice(Option<f64>),
    PnlUsdt(Option<f64>),
    PnlPercent(Option<f64>),
    Note(Option<String>),
}

impl Field for OrderField {
    fn from_json(key: &str, value: Value) -> Result<Option<Self>> {
        Ok(Some(match key {
            "symbol" => Self::Symbol(decode(key, value)?),
            "orderId" | "order_id" => Self::OrderId(decode_external_id(key, value)?),
            "positionId" | "position_id" => Self::PositionId(decode_external_id(key, value)?),
            "side" => Self::Side(decode(key, value)?),
            "orderType" | "order_type" => Self::OrderType(decode(key, value)?),
            "leverage" => Self::Leverage(decode(key, value)?),
            "amountUsdt" | "amount_usdt" => Self::AmountUsdt(decode(key, value)?),
            "openTime" | "open_time" => Self::OpenTime(decode(key, value)?),
            "openPrice" | "open_price" => Self::OpenPrice(decode(key, value)?),
            "aiPrediction" | "ai_prediction" => Self::AiPrediction(decode(key, value)?),
            "aiReason" | "ai_reason" => Self::AiReason(decode(key, value)?),
            "latestUpdateTime" | "latest_update_time" => {
                Self::LatestUpdateTime(decode(key, value)?)
            }
            "latestPrice" | "latest_price" => Self::LatestPrice(decode(key, value)?),
            "trailingStopLossPercent" | "tlsl" => {
                Self::TrailingStopLossPercent(decode(key, value)?)
            }
            "targetProfitPercent" | "target_profit_percent" => {
                Self::TargetProfitPercent(decode(key, value)?)
            }
            "status" => Self::Status(decode(key, value)?),
            "closeReason" | "close_reason" => Self::CloseReason(decode(key, value)?),
            "closeTime" | "close_time" => Self::CloseTime(decode(key, value)?),
            "closePrice" | "close_price" => Self::ClosePrice(decode(key, value)?),
            "pnlUsdt" | "pnl_usdt" => Self::PnlUsdt(decode(key, value)?),
            "pnlPercent" | "pnl_percent" => Self::PnlPercent(decode(key, value)?),
            "note" => Self::Note(decode(key, value)?),
            _ => return Ok(None),
        }))
    }

    fn key(&self) -> &'static str {
        match self {
            Self::Symbol(_) => "symbol",
            Self::OrderId(_) => "orderId",
            Self::PositionId(_) => "positionId",
            Self::Side(_) => "side",
            Self::OrderType(_) => "orderType",
            Self::Leverage(_) => "leverage",
            Self::AmountUsdt(_) => "amountUsdt",
            Self::OpenTime(_) => "openTime",
            Self::OpenPrice(_) => "openPrice",
            Self::AiPrediction(_) => "aiPrediction",
            Self::AiReason(_) => "aiReason",
            Self::LatestUpdateTime(_) => "latestUpdateTime",
            Self::LatestPrice(_) => "latestPrice",
            Self::TrailingStopLossPercent(_) => "trailingStopLossPercent",
            Self::TargetProfitPercent(_) => "targetProfitPercent",
            Self::Status(_) => "status",
            Self::CloseReason(_) => "closeReason",
            Self::CloseTime(_) => "closeTime",
            Self::ClosePrice(_) => "closePrice",
            Self::PnlUsdt(_) => "pnlUsdt",
            Self::PnlPercent(_) => "pnlPercent",
            Self::Note(_) => "note",
        }
    }

    fn assign(&self, out: &mut Vec<Assignment>) -> Result<()> {
        let assignment: Assignment = match self {
            Self::Symbol(v) => ("symbol", v.as_str().into()),
            Self::OrderId(v) => ("order_id", v.clone().into()),
            Self::PositionId(v) => ("position_id", v.clone().into()),
            Self::Side(v) => ("side", v.as_str().into()),
            Self::OrderType(v) => ("order_type", v.as_str().into()),
            Self::Leverage(v) => ("leverage", (*v).into()),
            Self::AmountUsdt(v) => ("amount_usdt", (*v).into()),
            Self::OpenTime(v) => ("open_time", (*v).into()),
            Self::OpenPrice(v) => ("open_price", (*v).into()),
            Self::AiPrediction(v) => ("ai_prediction", v.map(|p| p.as_str()).into()),
            Self::AiReason(v) => ("ai_reason", v.clone().into()),
            Self::LatestUpdateTime(v) => ("latest_update_time", (*v).into()),
            Self::LatestPrice(v) => ("latest_price", (*v).into()),
            Self::TrailingStopLossPercent(v) => ("tlsl", (*v).into()),
            Self::TargetProfitPercent(v) => ("target_profit_percent", (*v).into()),
            Self::Status(v) => ("status", v.as_str().into()),
            Self::CloseReason(v) => ("close_reason", v.clone().into()),
            Self::CloseTime(v) => ("close_time", (*v).into()),
            Self::ClosePrice(v) => ("close_price", (*v).into()),
            Self::PnlUsdt(v) => ("pnl_usdt", (*v).into()),
            Self::PnlPercent(v) => ("pnl_percent", (*v).into()),
            Self::Note(v) => ("note", v.clone().into()),
        };
        out.push(assignment);
        Ok(())
    }
}

impl From<OrderStatus> for SqlValue {
    fn from(status: OrderStatus) -> Self {
        Self::Text(status.as_str().to_string())
    }
}

impl From<Side> for SqlValue {
    fn from(side: Side) -> Self {
        Self::Text(side.as_str().to_string())
    }
}
