//! Order mutation engine
//!
//! Create, patch and delete touch an order and its items as one unit. Each
//! operation is a single call into the [`OrderStore`], which runs it as one
//! transaction; the engine turns store outcomes into [`OrderError`]s.

use std::collections::HashSet;
use std::sync::Arc;

use common::{DatabaseError, StoreOutcome};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{NewOrder, Order, OrderPatch, UserId};
use crate::repositories::{OrderStore, Patched, PendingOp};

/// Errors returned by the order engine
#[derive(Debug, Error)]
pub enum OrderError {
    /// The request is structurally unusable
    #[error("{0}")]
    InvalidInput(String),

    /// The order id, or a product id within the order, is already taken
    #[error("{0}")]
    DuplicateIdentity(String),

    /// The store rejected a row for a missing column
    #[error("{0}")]
    MissingRequiredField(String),

    /// A foreign key or other relational constraint rejected the write
    #[error("{0}")]
    ConstraintViolation(String),

    /// The order does not exist
    #[error("order \"{0}\" was not found")]
    RecordNotFound(String),

    /// An item update named a product that is not on the order
    #[error("item {product_id} was not found on order \"{order_id}\"")]
    ItemNotFound { order_id: String, product_id: i32 },

    /// Anything else; logged server side only
    #[error("unexpected order store error: {0}")]
    Unexpected(#[from] DatabaseError),
}

/// Order engine
#[derive(Clone)]
pub struct OrderEngine {
    store: Arc<dyn OrderStore>,
}

impl OrderEngine {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// Create an order with its full item set, owned by `owner`
    pub async fn create(&self, order: NewOrder, owner: UserId) -> Result<Order, OrderError> {
        if order.order_id.trim().is_empty() {
            return Err(OrderError::InvalidInput("Order requires an orderId".to_string()));
        }
        if order.items.is_empty() {
            return Err(OrderError::InvalidInput(
                "Order must contain at least one item".to_string(),
            ));
        }
        let mut seen = HashSet::with_capacity(order.items.len());
        if let Some(item) = order.items.iter().find(|item| !seen.insert(item.product_id)) {
            return Err(OrderError::InvalidInput(format!(
                "Product {} appears more than once",
                item.product_id
            )));
        }

        match self.store.insert_order(owner, &order).await? {
            StoreOutcome::Success(created) => {
                info!(
                    order_id = %created.order_id,
                    user_id = owner,
                    items = order.items.len(),
                    "Order created"
                );
                Ok(created)
            }
            StoreOutcome::UniqueViolation => {
                debug!(order_id = %order.order_id, "Create rejected: order id taken");
                Err(OrderError::DuplicateIdentity(
                    "A record with this orderId already exists".to_string(),
                ))
            }
            StoreOutcome::NullViolation => {
                debug!(order_id = %order.order_id, "Create rejected: missing column");
                Err(OrderError::MissingRequiredField(
                    "Order requires an orderId".to_string(),
                ))
            }
            StoreOutcome::ForeignKeyViolation => {
                debug!(order_id = %order.order_id, user_id = owner, "Create rejected: unknown owner");
                Err(OrderError::ConstraintViolation(
                    "Order owner does not exist".to_string(),
                ))
            }
            StoreOutcome::NotFound => Err(OrderError::ConstraintViolation(
                "Order could not be created".to_string(),
            )),
        }
    }

    /// Look an order up; `None` when it does not exist
    pub async fn read(&self, order_id: &str, include_items: bool) -> Result<Option<Order>, OrderError> {
        Ok(self.store.find_order(order_id, include_items).await?)
    }

    /// All orders, regardless of owner
    pub async fn list(&self, include_items: bool) -> Result<Vec<Order>, OrderError> {
        Ok(self.store.list_orders(include_items).await?)
    }

    /// Apply a sparse patch atomically and return the updated order with its items
    pub async fn patch(&self, order_id: &str, patch: OrderPatch) -> Result<Order, OrderError> {
        let ops = plan_patch(patch);
        debug!(order_id, operations = ops.len(), "Applying order patch");

        match self.store.apply_patch(order_id, &ops).await? {
            StoreOutcome::Success(Patched::Applied(order)) => {
                info!(order_id, "Order patched");
                Ok(order)
            }
            StoreOutcome::Success(Patched::MissingItem(product_id)) => {
                debug!(order_id, product_id, "Patch rejected: item to update not found");
                Err(OrderError::ItemNotFound {
                    order_id: order_id.to_string(),
                    product_id,
                })
            }
            StoreOutcome::NotFound => {
                debug!(order_id, "Patch target not found");
                Err(OrderError::RecordNotFound(order_id.to_string()))
            }
            StoreOutcome::UniqueViolation => {
                debug!(order_id, "Patch rejected: product already on order");
                Err(OrderError::DuplicateIdentity(
                    "An item with this product id already exists on the order".to_string(),
                ))
            }
            StoreOutcome::ForeignKeyViolation => {
                debug!(order_id, "Patch rejected: foreign key");
                Err(OrderError::ConstraintViolation(
                    "Order items must reference an existing order".to_string(),
                ))
            }
            StoreOutcome::NullViolation => {
                debug!(order_id, "Patch rejected: missing column");
                Err(OrderError::MissingRequiredField(
                    "Item requires a price and quantity".to_string(),
                ))
            }
        }
    }

    /// Delete an order with its items; `None` when it does not exist
    pub async fn delete(&self, order_id: &str) -> Result<Option<Order>, OrderError> {
        match self.store.delete_order(order_id).await? {
            StoreOutcome::Success(order) => {
                info!(order_id, "Order deleted");
                Ok(Some(order))
            }
            StoreOutcome::NotFound => Ok(None),
            other => Err(OrderError::ConstraintViolation(format!(
                "Order could not be deleted: {:?}",
                other.map(|_| ())
            ))),
        }
    }

    /// Whether the order store is reachable
    pub async fn health_check(&self) -> Result<bool, OrderError> {
        Ok(self.store.health_check().await?)
    }
}

/// Turn a patch into the ordered operations the store applies:
/// order fields, then removals, then additions, then item updates.
pub fn plan_patch(patch: OrderPatch) -> Vec<PendingOp> {
    let OrderPatch {
        value,
        creation_date,
        remove_items,
        add_items,
        update_items,
    } = patch;

    let mut ops = Vec::with_capacity(2 + add_items.len() + update_items.len());

    if value.is_some() || creation_date.is_some() {
        ops.push(PendingOp::UpdateOrder {
            value,
            creation_date,
        });
    }
    if !remove_items.is_empty() {
        ops.push(PendingOp::RemoveItems(remove_items));
    }
    ops.extend(add_items.into_iter().map(PendingOp::AddItem));
    ops.extend(update_items.into_iter().map(PendingOp::UpdateItem));

    ops
}
