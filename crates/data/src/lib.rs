//! Persistent state for the trading bot.
//!
//! This crate provides:
//! - The SQLite storage engine and its schema
//! - Record models for orders, logs, market state, scanner results and settings
//! - Partial-update field sets
//! - Repositories that validate, persist and publish change events

pub mod database;
pub mod error;
pub mod models;
pub mod patch;
pub mod repositories;

pub use database::{Database, ExecOutcome, SqlValue, TABLES};
pub use error::{Result, StoreError};
pub use patch::{Field, FieldSet};

pub use models::{
    AiPrediction, Candle, LogEntry, LogStatus, MarketState, MarketStateField, NewLogEntry,
    NewMarketState, NewOrder, NewScannerEntry, Order, OrderField, OrderFilter, OrderKey,
    OrderStatus, PositionRecommendation, ScannerEntry, ScannerField, Settings, SettingsValues,
    Side, Wall, MAX_CANDLES,
};

pub use repositories::{
    LogRepository, MarketStateRepository, OrderRepository, Repositories, ScannerRepository,
    SettingsRepository, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT,
};
