//! User repository for database operations

use async_trait::async_trait;
use common::{DatabaseError, StoreOutcome, StoreResult, classify};
use sqlx::PgPool;
use tracing::{debug, info};

use super::CredentialStore;
use crate::models::{NewUser, User};

/// PostgreSQL-backed user repository
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for UserRepository {
    async fn insert_user(&self, new_user: &NewUser) -> StoreResult<User> {
        info!("Creating new user: {}", new_user.email);

        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name)
            VALUES ($1, $2, $3, $4)
            RETURNING user_id, email, password_hash, first_name, last_name, created_at
            "#,
        )
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(StoreOutcome::Success(user)),
            Err(e) => classify(e),
        }
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        debug!("Finding user by email: {}", email);

        sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, email, password_hash, first_name, last_name, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)
    }
}
