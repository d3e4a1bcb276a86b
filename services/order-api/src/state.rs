//! Application state shared across handlers

use std::sync::Arc;

use crate::{
    auth::{AuthError, Authenticator, PasswordHashing},
    config::AppConfig,
    engine::OrderEngine,
    jwt::JwtService,
    repositories::{CredentialStore, OrderStore},
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub authenticator: Authenticator,
    pub orders: OrderEngine,
}

impl AppState {
    /// Wire the authenticator and order engine over the given stores
    pub async fn new(
        config: &AppConfig,
        users: Arc<dyn CredentialStore>,
        orders: Arc<dyn OrderStore>,
    ) -> Result<Self, AuthError> {
        let hashing = PasswordHashing::new(config.hashing_config())?;
        let jwt = JwtService::new(&config.jwt_config());

        Ok(Self {
            authenticator: Authenticator::new(users, hashing, jwt).await?,
            orders: OrderEngine::new(orders),
        })
    }
}
