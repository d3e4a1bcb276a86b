//! Common library for the order service
//!
//! This crate provides the store plumbing shared by the service crates:
//! PostgreSQL connectivity, the database error type, and the
//! [`store::StoreOutcome`] value repositories use to report constraint
//! violations.
//!
//! ```rust,no_run
//! use common::database::{DatabaseConfig, health_check, init_pool};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig::from_env()?;
//!     let pool = init_pool(&config).await?;
//!     let is_healthy = health_check(&pool).await?;
//!     println!("Database health check: {}", is_healthy);
//!     Ok(())
//! }
//! ```

pub mod database;
pub mod error;
pub mod store;

pub use error::{DatabaseError, DatabaseResult};
pub use store::{StoreOutcome, StoreResult, classify};
