//! Order and item models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

use super::user::UserId;

/// Order entity
///
/// `items` is `None` when the caller did not ask for the item collection,
/// which keeps "not loaded" apart from "loaded and empty".
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: String,
    pub user_id: UserId,
    #[serde(with = "rust_decimal::serde::str")]
    pub value: Decimal,
    pub creation_date: DateTime<Utc>,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<OrderItem>>,
}

/// Item entity, identified by `(product_id, order_id)`
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: i32,
    pub order_id: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    pub quantity: i32,
}

/// Validated order creation payload
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub order_id: String,
    pub value: Decimal,
    pub creation_date: DateTime<Utc>,
    pub items: Vec<NewItem>,
}

/// A fully specified item, used on create and by `addItems`
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub product_id: i32,
    pub price: Decimal,
    pub quantity: i32,
}

impl NewItem {
    pub fn into_order_item(self, order_id: &str) -> OrderItem {
        OrderItem {
            product_id: self.product_id,
            order_id: order_id.to_string(),
            price: self.price,
            quantity: self.quantity,
        }
    }
}

/// In-place item update from `updateItems`
#[derive(Debug, Clone, PartialEq)]
pub struct ItemUpdate {
    pub product_id: i32,
    pub price: Option<Decimal>,
    pub quantity: Option<i32>,
}

/// Sparse order patch; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderPatch {
    pub value: Option<Decimal>,
    pub creation_date: Option<DateTime<Utc>>,
    pub remove_items: Vec<i32>,
    pub add_items: Vec<NewItem>,
    pub update_items: Vec<ItemUpdate>,
}
