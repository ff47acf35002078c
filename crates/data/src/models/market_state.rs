//! Point-in-time market snapshots per symbol.

use super::candle::{check_candles, decode_candles, encode_candles, Candle};
use super::from_millis;
use crate::database::SqlValue;
use crate::error::{Result, StoreError};
use crate::patch::{decode, encode_json, Assignment, Field};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// Nearest order-book wall on one side. Either the whole wall is known or
/// the side has none.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wall {
    pub price: f64,
    pub strength: f64,
    pub distance: f64,
}

/// Position recommendation payload: any JSON object.
pub type PositionRecommendation = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMarketState {
    pub symbol: String,
    pub price: f64,
    #[serde(default)]
    pub buy_walls: Option<i64>,
    #[serde(default)]
    pub sell_walls: Option<i64>,
    #[serde(default)]
    pub nearest_buy: Option<Wall>,
    #[serde(default)]
    pub nearest_sell: Option<Wall>,
    #[serde(default)]
    pub trend: Option<String>,
    #[serde(default)]
    pub recent_volatility: Option<f64>,
    #[serde(default)]
    pub position: Option<PositionRecommendation>,
    #[serde(default)]
    pub candles: Option<Vec<Candle>>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl NewMarketState {
    #[must_use]
    pub fn new(symbol: impl Into<String>, price: f64, updated_at: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            buy_walls: None,
            sell_walls: None,
            nearest_buy: None,
            nearest_sell: None,
            trend: None,
            recent_volatility: None,
            position: None,
            candles: None,
            updated_at,
        }
    }

    /// Parameters in [`INSERT_COLUMNS`] order.
    pub(crate) fn params(&self) -> Result<Vec<SqlValue>> {
        let mut params = vec![
            self.symbol.as_str().into(),
            self.price.into(),
            self.buy_walls.into(),
            self.sell_walls.into(),
        ];
        push_wall(&mut params, self.nearest_buy.as_ref());
        push_wall(&mut params, self.nearest_sell.as_ref());
        params.push(self.trend.clone().into());
        params.push(self.recent_volatility.into());
        params.push(self.position.as_ref().map(encode_json).transpose()?.into());
        params.push(encode_candles(self.candles.as_ref())?.into());
        params.push(self.updated_at.timestamp_millis().into());
        Ok(params)
    }
}

fn push_wall(params: &mut Vec<SqlValue>, wall: Option<&Wall>) {
    params.push(wall.map(|w| w.price).into());
    params.push(wall.map(|w| w.strength).into());
    params.push(wall.map(|w| w.distance).into());
}

pub(crate) const INSERT_COLUMNS: &str = "symbol, price, buy_walls, sell_walls, \
    nearest_buy_price, nearest_buy_strength, nearest_buy_distance, \
    nearest_sell_price, nearest_sell_strength, nearest_sell_distance, \
    trend, recent_volatility, position, candles, updated_at";

pub(crate) const MARKET_STATE_COLUMNS: &str = "id, symbol, price, buy_walls, sell_walls, \
    nearest_buy_price, nearest_buy_strength, nearest_buy_distance, \
    nearest_sell_price, nearest_sell_strength, nearest_sell_distance, \
    trend, recent_volatility, position, candles, updated_at";

/// Stored snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketState {
    pub id: i64,
    pub symbol: String,
    pub price: f64,
    pub buy_walls: Option<i64>,
    pub sell_walls: Option<i64>,
    pub nearest_buy: Option<Wall>,
    pub nearest_sell: Option<Wall>,
    pub trend: Option<String>,
    pub recent_volatility: Option<f64>,
    pub position: Option<PositionRecommendation>,
    pub candles: Option<Vec<Candle>>,
    pub updated_at: DateTime<Utc>,
}

fn wall_from_row(row: &SqliteRow, side: &str) -> Result<Option<Wall>> {
    let price: Option<f64> = row.try_get(format!("nearest_{side}_price").as_str())?;
    let strength: Option<f64> = row.try_get(format!("nearest_{side}_strength").as_str())?;
    let distance: Option<f64> = row.try_get(format!("nearest_{side}_distance").as_str())?;

    match (price, strength, distance) {
        (Some(price), Some(strength), Some(distance)) => Ok(Some(Wall {
            price,
            strength,
            distance,
        })),
        (None, None, None) => Ok(None),
        _ => Err(StoreError::corrupt(format!("partially null {side} wall"))),
    }
}

impl MarketState {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        let position: Option<String> = row.try_get("position")?;
        let position = position
            .map(|text| {
                serde_json::from_str::<PositionRecommendation>(&text)
                    .map_err(|e| StoreError::corrupt(format!("position: {e}")))
            })
            .transpose()?;

        Ok(Self {
            id: row.try_get("id")?,
            symbol: row.try_get("symbol")?,
            price: row.try_get("price")?,
            buy_walls: row.try_get("buy_walls")?,
            sell_walls: row.try_get("sell_walls")?,
            nearest_buy: wall_from_row(row, "buy")?,
            nearest_sell: wall_from_row(row, "sell")?,
            trend: row.try_get("trend")?,
            recent_volatility: row.try_get("recent_volatility")?,
            position,
            candles: decode_candles(row.try_get("candles")?)?,
            updated_at: from_millis(row.try_get("updated_at")?)?,
        })
    }
}

/// Updatable snapshot column. A wall field covers all three columns of its side.
#[derive(Debug, Clone, PartialEq)]
pub enum MarketStateField {
    Symbol(String),
    Price(f64),
    BuyWalls(Option<i64>),
    SellWalls(Option<i64>),
    NearestBuy(Option<Wall>),
    NearestSell(Option<Wall>),
    Trend(Option<String>),
    RecentVolatility(Option<f64>),
    Position(Option<PositionRecommendation>),
    Candles(Option<Vec<Candle>>),
    UpdatedAt(DateTime<Utc>),
}

impl MarketStateField {
    pub const UPDATED_AT: &'static str = "updatedAt";
}

impl Field for MarketStateField {
    fn from_json(key: &str, value: Value) -> Result<Option<Self>> {
        Ok(Some(match key {
            "symbol" => Self::Symbol(decode(key, value)?),
            "price" => Self::Price(decode(key, value)?),
            "buyWalls" | "buy_walls" => Self::BuyWalls(decode(key, value)?),
            "sellWalls" | "sell_walls" => Self::SellWalls(decode(key, value)?),
            "nearestBuy" | "nearest_buy" => Self::NearestBuy(decode(key, value)?),
            "nearestSell" | "nearest_sell" => Self::NearestSell(decode(key, value)?),
            "trend" => Self::Trend(decode(key, value)?),
            "recentVolatility" | "recent_volatility" => {
                Self::RecentVolatility(decode(key, value)?)
            }
            "position" => Self::Position(decode(key, value)?),
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
            Self::Price(_) => "price",
            Self::BuyWalls(_) => "buyWalls",
            Self::SellWalls(_) => "sellWalls",
            Self::NearestBuy(_) => "nearestBuy",
            Self::NearestSell(_) => "nearestSell",
            Self::Trend(_) => "trend",
            Self::RecentVolatility(_) => "recentVolatility",
            Self::Position(_) => "position",
            Self::Candles(_) => "candles",
            Self::UpdatedAt(_) => Self::UPDATED_AT,
        }
    }

    fn assign(&self, out: &mut Vec<Assignment>) -> Result<()> {
        match self {
            Self::Symbol(v) => out.push(("symbol", v.as_str().into())),
            Self::Price(v) => out.push(("price", (*v).into())),
            Self::BuyWalls(v) => out.push(("buy_walls", (*v).into())),
            Self::SellWalls(v) => out.push(("sell_walls", (*v).into())),
            Self::NearestBuy(wall) => {
                out.push(("nearest_buy_price", wall.map(|w| w.price).into()));
                out.push(("nearest_buy_strength", wall.map(|w| w.strength).into()));
                out.push(("nearest_buy_distance", wall.map(|w| w.distance).into()));
            }
            Self::NearestSell(wall) => {
                out.push(("nearest_sell_price", wall.map(|w| w.price).into()));
                out.push(("nearest_sell_strength", wall.map(|w| w.strength).into()));
                out.push(("nearest_sell_distance", wall.map(|w| w.distance).into()));
            }
            Self::Trend(v) => out.push(("trend", v.clone().into())),
            Self::RecentVolatility(v) => out.push(("recent_volatility", (*v).into())),
            Self::Position(v) => {
                out.push(("position", v.as_ref().map(encode_json).transpose()?.into()));
            }
            Self::Candles(v) => out.push(("candles", encode_candles(v.as_ref())?.into())),
            Self::UpdatedAt(v) => out.push(("updated_at", v.timestamp_millis().into())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::FieldSet;
    use serde_json::json;

    #[test]
    fn wall_field_expands_to_all_three_columns() {
        let set = FieldSet::new().with(MarketStateField::NearestSell(None));
        let assignments = set.assignments().unwrap();

        assert_eq!(assignments.len(), 3);
        assert!(assignments.iter().all(|(_, v)| *v == SqlValue::Null));
    }

    #[test]
    fn flat_wall_keys_are_not_accepted() {
        let err =
            FieldSet::<MarketStateField>::from_json(json!({"nearestBuyPrice": 10.0})).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn incomplete_wall_object_is_rejected() {
        let err = FieldSet::<MarketStateField>::from_json(json!({
            "nearestBuy": {"price": 10.0, "strength": 2.0}
        }))
        .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn position_must_be_an_object() {
        assert!(FieldSet::<MarketStateField>::from_json(json!({"position": [1, 2]})).is_err());
        assert!(FieldSet::<MarketStateField>::from_json(json!({"position": {"side": "LONG"}}))
            .is_ok());
    }

    #[test]
    fn updated_at_defaults_to_now_when_absent() {
        let before = Utc::now();
        let snapshot: NewMarketState =
            serde_json::from_value(json!({"symbol": "BTCUSDT", "price": 1.0})).unwrap();
        assert!(snapshot.updated_at >= before);
    }
}
