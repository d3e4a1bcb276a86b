//! Order repository for database operations
//!
//! Every multi-row write runs inside a single transaction. Returning early
//! drops the transaction, which rolls it back.

use std::collections::HashMap;

use async_trait::async_trait;
use common::{DatabaseError, StoreOutcome, StoreResult, classify};
use sqlx::{PgPool, postgres::PgExecutor};
use tracing::debug;

use super::{OrderStore, Patched, PendingOp};
use crate::models::{NewOrder, Order, OrderItem, UserId};

/// PostgreSQL-backed order repository
#[derive(Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    /// Create a new order repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn try_insert_order(
        &self,
        owner: UserId,
        new_order: &NewOrder,
    ) -> Result<Order, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let mut order = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (order_id, user_id, value, creation_date)
            VALUES ($1, $2, $3, $4)
            RETURNING order_id, user_id, value, creation_date
            "#,
        )
        .bind(&new_order.order_id)
        .bind(owner)
        .bind(new_order.value)
        .bind(new_order.creation_date)
        .fetch_one(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(new_order.items.len());
        for item in &new_order.items {
            let row = sqlx::query_as::<_, OrderItem>(
                r#"
                INSERT INTO items (product_id, order_id, price, quantity)
                VALUES ($1, $2, $3, $4)
                RETURNING product_id, order_id, price, quantity
                "#,
            )
            .bind(item.product_id)
            .bind(&new_order.order_id)
            .bind(item.price)
            .bind(item.quantity)
            .fetch_one(&mut *tx)
            .await?;
            items.push(row);
        }

        tx.commit().await?;

        order.items = Some(items);
        Ok(order)
    }

    /// `Ok(None)` when the order is missing
    async fn try_apply_patch(
        &self,
        order_id: &str,
        ops: &[PendingOp],
    ) -> Result<Option<Patched>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<String> =
            sqlx::query_scalar("SELECT order_id FROM orders WHERE order_id = $1 FOR UPDATE")
                .bind(order_id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Ok(None);
        }

        for op in ops {
            match op {
                PendingOp::UpdateOrder {
                    value,
                    creation_date,
                } => {
                    sqlx::query(
                        r#"
                        UPDATE orders
                        SET value = COALESCE($2, value),
                            creation_date = COALESCE($3, creation_date)
                        WHERE order_id = $1
                        "#,
                    )
                    .bind(order_id)
                    .bind(*value)
                    .bind(*creation_date)
                    .execute(&mut *tx)
                    .await?;
                }
                PendingOp::RemoveItems(product_ids) => {
                    let removed =
                        sqlx::query("DELETE FROM items WHERE order_id = $1 AND product_id = ANY($2)")
                            .bind(order_id)
                            .bind(product_ids.as_slice())
                            .execute(&mut *tx)
                            .await?;
                    debug!(order_id, removed = removed.rows_affected(), "Removed items");
                }
                PendingOp::AddItem(item) => {
                    sqlx::query(
                        r#"
                        INSERT INTO items (product_id, order_id, price, quantity)
                        VALUES ($1, $2, $3, $4)
                        "#,
                    )
                    .bind(item.product_id)
                    .bind(order_id)
                    .bind(item.price)
                    .bind(item.quantity)
                    .execute(&mut *tx)
                    .await?;
                }
                PendingOp::UpdateItem(update) => {
                    let updated = sqlx::query(
                        r#"
                        UPDATE items
                        SET price = COALESCE($3, price),
                            quantity = COALESCE($4, quantity)
                        WHERE order_id = $1 AND product_id = $2
                        "#,
                    )
                    .bind(order_id)
                    .bind(update.product_id)
                    .bind(update.price)
                    .bind(update.quantity)
                    .execute(&mut *tx)
                    .await?;

                    if updated.rows_affected() == 0 {
                        debug!(order_id, product_id = update.product_id, "Item to update not found");
                        return Ok(Some(Patched::MissingItem(update.product_id)));
                    }
                }
            }
        }

        let mut order = fetch_order(&mut *tx, order_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        order.items = Some(fetch_items(&mut *tx, order_id).await?);

        tx.commit().await?;
        Ok(Some(Patched::Applied(order)))
    }

    async fn try_delete_order(&self, order_id: &str) -> Result<Option<Order>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT order_id, user_id, value, creation_date
            FROM orders
            WHERE order_id = $1
            FOR UPDATE
            "#,
        )
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(mut order) = order else {
            return Ok(None);
        };

        let mut items = sqlx::query_as::<_, OrderItem>(
            r#"
            DELETE FROM items
            WHERE order_id = $1
            RETURNING product_id, order_id, price, quantity
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *tx)
        .await?;
        items.sort_by_key(|item| item.product_id);

        sqlx::query("DELETE FROM orders WHERE order_id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        order.items = Some(items);
        Ok(Some(order))
    }
}

async fn fetch_order<'e, E: PgExecutor<'e>>(
    executor: E,
    order_id: &str,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>(
        r#"
        SELECT order_id, user_id, value, creation_date
        FROM orders
        WHERE order_id = $1
        "#,
    )
    .bind(order_id)
    .fetch_optional(executor)
    .await
}

async fn fetch_items<'e, E: PgExecutor<'e>>(
    executor: E,
    order_id: &str,
) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as::<_, OrderItem>(
        r#"
        SELECT product_id, order_id, price, quantity
        FROM items
        WHERE order_id = $1
        ORDER BY product_id
        "#,
    )
    .bind(order_id)
    .fetch_all(executor)
    .await
}

/// Turn a "missing row" result into the `NotFound` outcome
fn found_or_not<T>(result: Result<Option<T>, sqlx::Error>) -> StoreResult<T> {
    match result {
        Ok(Some(value)) => Ok(StoreOutcome::Success(value)),
        Ok(None) => Ok(StoreOutcome::NotFound),
        Err(e) => classify(e),
    }
}

#[async_trait]
impl OrderStore for OrderRepository {
    async fn insert_order(&self, owner: UserId, order: &NewOrder) -> StoreResult<Order> {
        match self.try_insert_order(owner, order).await {
            Ok(order) => Ok(StoreOutcome::Success(order)),
            Err(e) => classify(e),
        }
    }

    async fn find_order(
        &self,
        order_id: &str,
        include_items: bool,
    ) -> Result<Option<Order>, DatabaseError> {
        let Some(mut order) = fetch_order(&self.pool, order_id)
            .await
            .map_err(DatabaseError::Query)?
        else {
            return Ok(None);
        };

        if include_items {
            let items = fetch_items(&self.pool, order_id)
                .await
                .map_err(DatabaseError::Query)?;
            order.items = Some(items);
        }

        Ok(Some(order))
    }

    async fn list_orders(&self, include_items: bool) -> Result<Vec<Order>, DatabaseError> {
        let mut orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT order_id, user_id, value, creation_date
            FROM orders
            ORDER BY creation_date DESC, order_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        if !include_items {
            return Ok(orders);
        }

        let rows = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT product_id, order_id, price, quantity
            FROM items
            ORDER BY order_id, product_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        let mut by_order: HashMap<String, Vec<OrderItem>> = HashMap::new();
        for item in rows {
            by_order.entry(item.order_id.clone()).or_default().push(item);
        }

        for order in &mut orders {
            order.items = Some(by_order.remove(&order.order_id).unwrap_or_default());
        }

        Ok(orders)
    }

    async fn apply_patch(&self, order_id: &str, ops: &[PendingOp]) -> StoreResult<Patched> {
        found_or_not(self.try_apply_patch(order_id, ops).await)
    }

    async fn delete_order(&self, order_id: &str) -> StoreResult<Order> {
        found_or_not(self.try_delete_order(order_id).await)
    }

    async fn health_check(&self) -> Result<bool, DatabaseError> {
        common::database::health_check(&self.pool).await
    }
}
