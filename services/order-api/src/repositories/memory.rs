//! In-process store
//!
//! Implements both store traits over a single lock with the same constraint
//! semantics as the PostgreSQL schema: unique emails, unique order ids,
//! unique `(product_id, order_id)` items, orders referencing an existing
//! user, and items deleted with their order. Patches are applied to a copy
//! of the order and swapped in only when every operation succeeded.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use common::{DatabaseError, StoreOutcome, StoreResult};
use tokio::sync::RwLock;

use super::{CredentialStore, OrderStore, Patched, PendingOp};
use crate::models::{NewOrder, NewUser, Order, OrderItem, User, UserId};

/// Why a patch operation was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    DuplicateItem,
    MissingItem(i32),
}

#[derive(Debug, Clone)]
struct StoredOrder {
    order: Order,
    items: BTreeMap<i32, OrderItem>,
}

impl StoredOrder {
    fn snapshot(&self, include_items: bool) -> Order {
        let mut order = self.order.clone();
        order.items = include_items.then(|| self.items.values().cloned().collect());
        order
    }

    /// Apply one operation, or say why the patch is refused
    fn apply(&mut self, op: &PendingOp) -> Result<(), Rejection> {
        match op {
            PendingOp::UpdateOrder {
                value,
                creation_date,
            } => {
                if let Some(value) = value {
                    self.order.value = *value;
                }
                if let Some(creation_date) = creation_date {
                    self.order.creation_date = *creation_date;
                }
            }
            PendingOp::RemoveItems(product_ids) => {
                for product_id in product_ids {
                    self.items.remove(product_id);
                }
            }
            PendingOp::AddItem(item) => {
                if self.items.contains_key(&item.product_id) {
                    return Err(Rejection::DuplicateItem);
                }
                let item = item.clone().into_order_item(&self.order.order_id);
                self.items.insert(item.product_id, item);
            }
            PendingOp::UpdateItem(update) => {
                let Some(item) = self.items.get_mut(&update.product_id) else {
                    return Err(Rejection::MissingItem(update.product_id));
                };
                if let Some(price) = update.price {
                    item.price = price;
                }
                if let Some(quantity) = update.quantity {
                    item.quantity = quantity;
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct State {
    last_user_id: UserId,
    users: BTreeMap<UserId, User>,
    orders: BTreeMap<String, StoredOrder>,
}

/// Store that keeps users and orders in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of item rows across all orders
    pub async fn item_count(&self) -> usize {
        let state = self.state.read().await;
        state.orders.values().map(|stored| stored.items.len()).sum()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn insert_user(&self, new_user: &NewUser) -> StoreResult<User> {
        let mut state = self.state.write().await;

        if state.users.values().any(|user| user.email == new_user.email) {
            return Ok(StoreOutcome::UniqueViolation);
        }

        state.last_user_id += 1;
        let user = User {
            user_id: state.last_user_id,
            email: new_user.email.clone(),
            password_hash: new_user.password_hash.clone(),
            first_name: new_user.first_name.clone(),
            last_name: new_user.last_name.clone(),
            created_at: Utc::now(),
        };
        state.users.insert(user.user_id, user.clone());

        Ok(StoreOutcome::Success(user))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|user| user.email == email).cloned())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, owner: UserId, new_order: &NewOrder) -> StoreResult<Order> {
        let mut state = self.state.write().await;

        if state.orders.contains_key(&new_order.order_id) {
            return Ok(StoreOutcome::UniqueViolation);
        }
        if !state.users.contains_key(&owner) {
            return Ok(StoreOutcome::ForeignKeyViolation);
        }

        let mut items = BTreeMap::new();
        for item in &new_order.items {
            let item = item.clone().into_order_item(&new_order.order_id);
            if items.insert(item.product_id, item).is_some() {
                return Ok(StoreOutcome::UniqueViolation);
            }
        }

        let stored = StoredOrder {
            order: Order {
                order_id: new_order.order_id.clone(),
                user_id: owner,
                value: new_order.value,
                creation_date: new_order.creation_date,
                items: None,
            },
            items,
        };
        let order = stored.snapshot(true);
        state.orders.insert(new_order.order_id.clone(), stored);

        Ok(StoreOutcome::Success(order))
    }

    async fn find_order(
        &self,
        order_id: &str,
        include_items: bool,
    ) -> Result<Option<Order>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .get(order_id)
            .map(|stored| stored.snapshot(include_items)))
    }

    async fn list_orders(&self, include_items: bool) -> Result<Vec<Order>, DatabaseError> {
        let state = self.state.read().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .map(|stored| stored.snapshot(include_items))
            .collect();
        orders.sort_by(|a, b| {
            b.creation_date
                .cmp(&a.creation_date)
                .then_with(|| a.order_id.cmp(&b.order_id))
        });
        Ok(orders)
    }

    async fn apply_patch(&self, order_id: &str, ops: &[PendingOp]) -> StoreResult<Patched> {
        let mut state = self.state.write().await;

        let Some(current) = state.orders.get(order_id) else {
            return Ok(StoreOutcome::NotFound);
        };

        let mut working = current.clone();
        for op in ops {
            match working.apply(op) {
                Ok(()) => {}
                Err(Rejection::DuplicateItem) => return Ok(StoreOutcome::UniqueViolation),
                Err(Rejection::MissingItem(product_id)) => {
                    return Ok(StoreOutcome::Success(Patched::MissingItem(product_id)));
                }
            }
        }

        let order = working.snapshot(true);
        state.orders.insert(order_id.to_string(), working);

        Ok(StoreOutcome::Success(Patched::Applied(order)))
    }

    async fn delete_order(&self, order_id: &str) -> StoreResult<Order> {
        let mut state = self.state.write().await;
        Ok(match state.orders.remove(order_id) {
            Some(stored) => StoreOutcome::Success(stored.snapshot(true)),
            None => StoreOutcome::NotFound,
        })
    }

    async fn health_check(&self) -> Result<bool, DatabaseError> {
        Ok(true)
    }
}
