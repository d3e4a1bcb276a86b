//! Repositories for database operations
//!
//! The service talks to storage through [`CredentialStore`] and
//! [`OrderStore`]. Constraint violations come back as
//! [`StoreOutcome`] values; only failures the caller cannot act on are
//! returned as [`DatabaseError`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{DatabaseError, StoreResult};
use rust_decimal::Decimal;

use crate::models::{ItemUpdate, NewItem, NewOrder, NewUser, Order, User, UserId};

pub mod memory;
pub mod order;
pub mod user;

pub use memory::MemoryStore;
pub use order::OrderRepository;
pub use user::UserRepository;

pub use common::StoreOutcome;

/// A single write that belongs to an order patch
///
/// A patch is submitted as an ordered list of these and applied in one
/// transaction. Any operation that does not yield `Success` aborts the whole
/// list.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingOp {
    /// Overwrite the order's value and/or creation date
    UpdateOrder {
        value: Option<Decimal>,
        creation_date: Option<DateTime<Utc>>,
    },
    /// Delete the listed product ids from the order; absent ids are ignored
    RemoveItems(Vec<i32>),
    /// Insert a new item; an existing product id is a unique violation
    AddItem(NewItem),
    /// Update an existing item; a missing item rejects the patch with
    /// [`Patched::MissingItem`]
    UpdateItem(ItemUpdate),
}

/// Result of a patch that reached an existing order
#[derive(Debug, Clone, PartialEq)]
pub enum Patched {
    /// Every operation committed; the order with its items
    Applied(Order),
    /// An item update named a product that is not on the order.
    /// Nothing was committed.
    MissingItem(i32),
}

/// Persistence for user identities
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a user. A taken email yields `UniqueViolation`.
    async fn insert_user(&self, user: &NewUser) -> StoreResult<User>;

    /// Look a user up by exact email
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;
}

/// Persistence for orders and their items
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert an order with all of its items in one transaction
    async fn insert_order(&self, owner: UserId, order: &NewOrder) -> StoreResult<Order>;

    async fn find_order(
        &self,
        order_id: &str,
        include_items: bool,
    ) -> Result<Option<Order>, DatabaseError>;

    async fn list_orders(&self, include_items: bool) -> Result<Vec<Order>, DatabaseError>;

    /// Apply `ops` in order, all or nothing. An unknown order yields `NotFound`.
    async fn apply_patch(&self, order_id: &str, ops: &[PendingOp]) -> StoreResult<Patched>;

    /// Delete an order and its items, returning what was deleted
    async fn delete_order(&self, order_id: &str) -> StoreResult<Order>;

    /// Whether the backing store is reachable
    async fn health_check(&self) -> Result<bool, DatabaseError>;
}
