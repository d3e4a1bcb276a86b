//! Order management service
//!
//! Account sign-up and sign-in with bearer session tokens, and order CRUD in
//! which an order and its items are always written as one unit.

pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod state;
pub mod validation;

pub use state::AppState;
