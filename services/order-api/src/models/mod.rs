//! Order service models

pub mod order;
pub mod user;

// Re-export for convenience
pub use order::{ItemUpdate, NewItem, NewOrder, Order, OrderItem, OrderPatch};
pub use user::{Credentials, NewUser, Registration, User, UserId};
