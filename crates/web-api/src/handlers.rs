use crate::error::{ApiError, ApiResult};
use crate::legacy::{LegacyLog, LegacyOrder};
use crate::server::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tradestate_data::{
    FieldSet, LogEntry, MarketState, MarketStateField, NewLogEntry, NewMarketState, NewOrder,
    NewScannerEntry, Order, OrderField, OrderFilter, OrderKey, OrderStatus, ScannerEntry,
    ScannerField, Settings, SettingsValues, Side, StoreError, DEFAULT_LIST_LIMIT,
};

type Shared = State<Arc<AppState>>;

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: i64,
}

#[derive(Debug, Serialize)]
pub struct UpdatedResponse {
    pub updated: u64,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: u64,
}

/// Reply of the legacy save-order endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOrderResponse {
    pub success: bool,
    pub last_insert_rowid: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub symbol: Option<String>,
    pub status: Option<OrderStatus>,
    pub side: Option<Side>,
}

impl From<OrderQuery> for OrderFilter {
    fn from(query: OrderQuery) -> Self {
        Self {
            symbol: query.symbol,
            status: query.status,
            side: query.side,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

impl LimitQuery {
    fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIST_LIMIT)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogQuery {
    pub limit: Option<u32>,
    pub order_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepQuery {
    pub max_age_secs: u32,
}

fn not_found(what: String) -> ApiError {
    ApiError::Store(StoreError::NotFound(what))
}

/// Lists orders matching every supplied filter, newest first.
///
/// # Errors
/// Returns 400 for an unparseable filter and 500 if the store fails.
pub async fn list_orders(
    State(state): Shared,
    query: Result<Query<OrderQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Order>>> {
    let Query(query) = query?;
    let filter: OrderFilter = query.into();
    let orders = state.repos.orders.list(&filter).await?;
    Ok(Json(orders))
}

/// Inserts an order.
///
/// # Errors
/// Returns 400 for a malformed or invalid order.
pub async fn create_order(
    State(state): Shared,
    body: Result<Json<NewOrder>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreatedResponse>)> {
    let Json(order) = body?;
    let id = state.repos.orders.insert(&order).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// Gets one order by its row id.
///
/// # Errors
/// Returns 400 for a non-numeric id and 404 if no order has that id.
pub async fn get_order(
    State(state): Shared,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Order>> {
    let Path(id) = id?;
    state
        .repos
        .orders
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(format!("order {id}")))
}

/// Applies a partial update to one order by row id.
///
/// # Errors
/// Returns 400 for a non-numeric id or an empty or malformed field set, and
/// 404 for an unknown id.
pub async fn patch_order(
    State(state): Shared,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<UpdatedResponse>> {
    let Path(id) = id?;
    let Json(body) = body?;
    let fields = FieldSet::<OrderField>::from_json(body)?;
    let updated = state.repos.orders.update_fields(&OrderKey::Id(id), &fields).await?;
    Ok(Json(UpdatedResponse { updated }))
}

/// Gets the newest order carrying an exchange order id.
///
/// # Errors
/// Returns 404 if no order carries that id.
pub async fn get_external_order(
    State(state): Shared,
    Path(order_id): Path<String>,
) -> ApiResult<Json<Order>> {
    state
        .repos
        .orders
        .get_by_order_id(&order_id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(format!("order id {order_id}")))
}

/// Applies a partial update to every order carrying an exchange order id.
///
/// # Errors
/// Returns 400 for an empty or malformed field set and 404 for an unknown id.
pub async fn patch_external_order(
    State(state): Shared,
    Path(order_id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<UpdatedResponse>> {
    let Json(body) = body?;
    let fields = FieldSet::<OrderField>::from_json(body)?;
    let updated = state
        .repos
        .orders
        .update_fields(&OrderKey::OrderId(order_id), &fields)
        .await?;
    Ok(Json(UpdatedResponse { updated }))
}

/// `POST /api/save-order`: insert with the reply shape older bots expect.
///
/// # Errors
/// Returns 400 for a malformed or invalid order.
pub async fn save_order(
    State(state): Shared,
    body: Result<Json<NewOrder>, JsonRejection>,
) -> ApiResult<Json<SaveOrderResponse>> {
    let Json(order) = body?;
    let id = state.repos.orders.insert(&order).await?;
    Ok(Json(SaveOrderResponse {
        success: true,
        last_insert_rowid: id,
    }))
}

/// `GET /orders`: every order, newest first, keyed by column name.
///
/// # Errors
/// Returns 500 if the store fails.
pub async fn legacy_orders(State(state): Shared) -> ApiResult<Json<Vec<LegacyOrder>>> {
    let orders = state.repos.orders.list(&OrderFilter::default()).await?;
    Ok(Json(orders.into_iter().map(LegacyOrder::from).collect()))
}

/// Lists recent log entries, optionally for one exchange order id.
///
/// # Errors
/// Returns 500 if the store fails.
pub async fn list_logs(
    State(state): Shared,
    query: Result<Query<LogQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<LogEntry>>> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let entries = match query.order_id {
        Some(order_id) => state.repos.logs.recent_for_order(&order_id, limit).await?,
        None => state.repos.logs.recent(limit).await?,
    };
    Ok(Json(entries))
}

/// Appends a log entry.
///
/// # Errors
/// Returns 400 for a malformed entry or an empty action.
pub async fn append_log(
    State(state): Shared,
    body: Result<Json<NewLogEntry>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreatedResponse>)> {
    let Json(entry) = body?;
    let id = state.repos.logs.append(&entry).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// `GET /logs`: every log entry, newest first, keyed by column name.
///
/// # Errors
/// Returns 500 if the store fails.
pub async fn legacy_logs(State(state): Shared) -> ApiResult<Json<Vec<LegacyLog>>> {
    let entries = state.repos.logs.all().await?;
    Ok(Json(entries.into_iter().map(LegacyLog::from).collect()))
}

/// # Errors
/// Returns 500 if the store fails.
pub async fn list_market_state(
    State(state): Shared,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<MarketState>>> {
    let Query(query) = query?;
    Ok(Json(state.repos.market_state.list(query.limit()).await?))
}

/// # Errors
/// Returns 400 for a malformed snapshot.
pub async fn create_market_state(
    State(state): Shared,
    body: Result<Json<NewMarketState>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreatedResponse>)> {
    let Json(snapshot) = body?;
    let id = state.repos.market_state.insert(&snapshot).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// Deletes snapshots not updated within `maxAgeSecs`.
///
/// # Errors
/// Returns 400 without a valid `maxAgeSecs` and 500 if the store fails.
pub async fn sweep_market_state(
    State(state): Shared,
    query: Result<Query<SweepQuery>, QueryRejection>,
) -> ApiResult<Json<DeletedResponse>> {
    let Query(query) = query?;
    let cutoff = Utc::now()
        .checked_sub_signed(Duration::seconds(i64::from(query.max_age_secs)))
        .ok_or_else(|| ApiError::BadRequest("maxAgeSecs out of range".into()))?;
    let deleted = state.repos.market_state.delete_stale_before(cutoff).await?;
    Ok(Json(DeletedResponse { deleted }))
}

/// # Errors
/// Returns 404 if the symbol has no snapshot.
pub async fn get_market_state(
    State(state): Shared,
    Path(symbol): Path<String>,
) -> ApiResult<Json<MarketState>> {
    state
        .repos
        .market_state
        .latest(&symbol)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(format!("market state for {symbol}")))
}

/// # Errors
/// Returns 400 for an empty or malformed field set and 404 for an unknown symbol.
pub async fn patch_market_state(
    State(state): Shared,
    Path(symbol): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<UpdatedResponse>> {
    let Json(body) = body?;
    let fields = FieldSet::<MarketStateField>::from_json(body)?;
    let updated = state.repos.market_state.update_by_symbol(&symbol, &fields).await?;
    Ok(Json(UpdatedResponse { updated }))
}

/// # Errors
/// Returns 404 for an unknown symbol.
pub async fn delete_market_state(
    State(state): Shared,
    Path(symbol): Path<String>,
) -> ApiResult<Json<DeletedResponse>> {
    let deleted = state.repos.market_state.delete_by_symbol(&symbol).await?;
    Ok(Json(DeletedResponse { deleted }))
}

/// # Errors
/// Returns 500 if the store fails.
pub async fn list_scanner(
    State(state): Shared,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<ScannerEntry>>> {
    let Query(query) = query?;
    Ok(Json(state.repos.scanner.list(query.limit()).await?))
}

/// # Errors
/// Returns 400 for a malformed entry.
pub async fn create_scanner(
    State(state): Shared,
    body: Result<Json<NewScannerEntry>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreatedResponse>)> {
    let Json(entry) = body?;
    let id = state.repos.scanner.insert(&entry).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// # Errors
/// Returns 404 if the symbol has no entry.
pub async fn get_scanner(
    State(state): Shared,
    Path(symbol): Path<String>,
) -> ApiResult<Json<ScannerEntry>> {
    state
        .repos
        .scanner
        .get(&symbol)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(format!("scanner entry for {symbol}")))
}

/// # Errors
/// Returns 400 for an empty or malformed field set and 404 for an unknown symbol.
pub async fn patch_scanner(
    State(state): Shared,
    Path(symbol): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<UpdatedResponse>> {
    let Json(body) = body?;
    let fields = FieldSet::<ScannerField>::from_json(body)?;
    let updated = state.repos.scanner.update_by_symbol(&symbol, &fields).await?;
    Ok(Json(UpdatedResponse { updated }))
}

/// # Errors
/// Returns 404 for an unknown symbol.
pub async fn delete_scanner(
    State(state): Shared,
    Path(symbol): Path<String>,
) -> ApiResult<Json<DeletedResponse>> {
    let deleted = state.repos.scanner.delete_by_symbol(&symbol).await?;
    Ok(Json(DeletedResponse { deleted }))
}

/// # Errors
/// Returns 404 if the settings row is missing.
pub async fn get_settings(State(state): Shared) -> ApiResult<Json<Settings>> {
    Ok(Json(state.repos.settings.get().await?))
}

/// Replaces all tunables and the blacklist.
///
/// # Errors
/// Returns 400 for missing or out-of-range values.
pub async fn put_settings(
    State(state): Shared,
    body: Result<Json<SettingsValues>, JsonRejection>,
) -> ApiResult<Json<Settings>> {
    let Json(values) = body?;
    Ok(Json(state.repos.settings.update(&values).await?))
}
