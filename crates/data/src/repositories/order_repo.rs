//! Order repository.
//!
//! Orders are inserted once at open time and then changed only through
//! partial field updates. Rows are never deleted.

use crate::database::{Database, SqlValue};
use crate::error::{Result, StoreError};
use crate::models::order::ORDER_COLUMNS;
use crate::models::{NewOrder, Order, OrderField, OrderFilter, OrderKey};
use crate::patch::{update_statement, FieldSet};
use tracing::debug;
use tradestate_core::{ChangeKind, ChangeNotifier};

/// Repository for order records.
#[derive(Clone)]
pub struct OrderRepository {
    db: Database,
    notifier: ChangeNotifier,
}

impl OrderRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(db: Database, notifier: ChangeNotifier) -> Self {
        Self { db, notifier }
    }

    /// Inserts a new order and returns the assigned id.
    ///
    /// # Errors
    /// Returns `StoreError::Validation` if the storage constraints reject the
    /// row, or `StoreError::Storage` on engine failure.
    pub async fn insert(&self, order: &NewOrder) -> Result<i64> {
        let params: Vec<SqlValue> = vec![
            order.symbol.as_str().into(),
            order.order_id.clone().into(),
            order.position_id.clone().into(),
            order.side.into(),
            order.order_type.as_str().into(),
            order.leverage.into(),
            order.amount_usdt.into(),
            order.open_time.into(),
            order.open_price.into(),
            order.ai_prediction.map(|p| p.as_str()).into(),
            order.ai_reason.clone().into(),
            order.latest_update_time.into(),
            order.latest_price.into(),
            order.trailing_stop_loss_percent.into(),
            order.target_profit_percent.into(),
            order.status.unwrap_or_default().into(),
            order.close_reason.clone().into(),
            order.close_time.into(),
            order.close_price.into(),
            order.pnl_usdt.into(),
            order.pnl_percent.into(),
            order.note.clone().into(),
        ];

        let outcome = self
            .db
            .execute(
                r"
                INSERT INTO orders (
                    symbol, order_id, position_id, side, order_type, leverage, amount_usdt,
                    open_time, open_price, ai_prediction, ai_reason,
                    latest_update_time, latest_price, tlsl, target_profit_percent,
                    status, close_reason, close_time, close_price, pnl_usdt, pnl_percent, note
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
                &params,
            )
            .await?;

        debug!(id = outcome.last_insert_id, symbol = %order.symbol, "Order inserted");
        self.notifier.publish(ChangeKind::OrdersUpdated);
        Ok(outcome.last_insert_id)
    }

    /// Lists orders matching every present filter key, newest first.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row does not decode.
    pub async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>> {
        let mut conditions = Vec::new();
        let mut params: Vec<SqlValue> = Vec::new();

        if let Some(symbol) = &filter.symbol {
            conditions.push("symbol = ?");
            params.push(symbol.as_str().into());
        }
        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(status.into());
        }
        if let Some(side) = filter.side {
            conditions.push("side = ?");
            params.push(side.into());
        }

        let mut sql = format!("SELECT {ORDER_COLUMNS} FROM orders");
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY id DESC");

        let rows = self.db.query(&sql, &params).await?;
        rows.iter().map(Order::from_row).collect()
    }

    /// Gets an order by its engine-assigned id.
    ///
    /// # Errors
    /// Returns an error if the query fails or the row does not decode.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Order>> {
        let row = self
            .db
            .query_optional(
                &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"),
                &[id.into()],
            )
            .await?;

        row.as_ref().map(Order::from_row).transpose()
    }

    /// Gets the newest order carrying the external order id.
    ///
    /// # Errors
    /// Returns an error if the query fails or the row does not decode.
    pub async fn get_by_order_id(&self, order_id: &str) -> Result<Option<Order>> {
        let row = self
            .db
            .query_optional(
                &format!(
                    "SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = ? ORDER BY id DESC LIMIT 1"
                ),
                &[order_id.into()],
            )
            .await?;

        row.as_ref().map(Order::from_row).transpose()
    }

    /// Changes exactly the columns named in `fields` on the row(s) matching
    /// `key` and returns the number of rows changed.
    ///
    /// # Errors
    /// Returns `StoreError::Validation` for an empty field set (before any
    /// storage call) or a constraint violation, and `StoreError::NotFound`
    /// when no row matches.
    pub async fn update_fields(&self, key: &OrderKey, fields: &FieldSet<OrderField>) -> Result<u64> {
        let assignments = fields.assignments()?;

        let (filter, key_param): (&str, SqlValue) = match key {
            OrderKey::Id(id) => ("id = ?", (*id).into()),
            OrderKey::OrderId(order_id) => ("order_id = ?", order_id.as_str().into()),
        };
        let (sql, mut params) = update_statement("orders", assignments, filter);
        params.push(key_param);

        let outcome = self.db.execute(&sql, &params).await?;
        if outcome.rows_affected == 0 {
            return Err(StoreError::NotFound(format!("order with {key}")));
        }

        debug!(%key, fields = fields.len(), rows = outcome.rows_affected, "Order updated");
        self.notifier.publish(ChangeKind::OrdersUpdated);
        Ok(outcome.rows_affected)
    }
}
