//! Service configuration
//!
//! Read once at startup from environment variables through the `config`
//! crate. Store connection settings are loaded separately by
//! [`common::database::DatabaseConfig`].

use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

use crate::{auth::HashingConfig, jwt::JwtConfig};

/// Which store backs users and orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

/// Service configuration
#[derive(Clone, Deserialize)]
pub struct AppConfig {
    /// Address the HTTP server binds to
    pub bind_address: String,
    /// Secret used to sign and verify session tokens
    pub jwt_secret: String,
    /// Session token lifetime in seconds
    pub token_ttl_seconds: u64,
    /// Argon2id memory cost in KiB
    pub hash_memory_kib: u32,
    /// Argon2id passes
    pub hash_iterations: u32,
    /// Argon2id lanes
    pub hash_parallelism: u32,
    /// Store backend
    pub order_store: StoreBackend,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let config = Config::builder()
            .set_default("bind_address", "0.0.0.0:3000")?
            .set_default("token_ttl_seconds", 3600_i64)?
            .set_default("hash_memory_kib", 19456_i64)?
            .set_default("hash_iterations", 2_i64)?
            .set_default("hash_parallelism", 1_i64)?
            .set_default("order_store", "postgres")?
            .add_source(Environment::default())
            .build()
            .context("Failed to read configuration")?;

        let config: AppConfig = config
            .try_deserialize()
            .context("Invalid configuration; JWT_SECRET must be set")?;

        if config.jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }

        Ok(config)
    }

    pub fn jwt_config(&self) -> JwtConfig {
        JwtConfig {
            secret: self.jwt_secret.clone(),
            token_ttl: self.token_ttl_seconds,
        }
    }

    pub fn hashing_config(&self) -> HashingConfig {
        HashingConfig {
            memory_kib: self.hash_memory_kib,
            iterations: self.hash_iterations,
            parallelism: self.hash_parallelism,
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_address", &self.bind_address)
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .field("hash_memory_kib", &self.hash_memory_kib)
            .field("hash_iterations", &self.hash_iterations)
            .field("hash_parallelism", &self.hash_parallelism)
            .field("order_store", &self.order_store)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const VARS: [&str; 7] = [
        "BIND_ADDRESS",
        "JWT_SECRET",
        "TOKEN_TTL_SECONDS",
        "HASH_MEMORY_KIB",
        "HASH_ITERATIONS",
        "HASH_PARALLELISM",
        "ORDER_STORE",
    ];

    fn clear() {
        for var in VARS {
            unsafe { env::remove_var(var) };
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear();
        unsafe { env::set_var("JWT_SECRET", "s3cret") };

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:3000");
        assert_eq!(config.token_ttl_seconds, 3600);
        assert_eq!(config.order_store, StoreBackend::Postgres);
        assert_eq!(
            config.hashing_config(),
            HashingConfig {
                memory_kib: 19456,
                iterations: 2,
                parallelism: 1,
            }
        );
        assert_eq!(config.jwt_config().secret, "s3cret");
        assert!(!format!("{:?}", config).contains("s3cret"));

        clear();
    }

    #[test]
    #[serial]
    fn test_overrides() {
        clear();
        unsafe {
            env::set_var("JWT_SECRET", "s3cret");
            env::set_var("TOKEN_TTL_SECONDS", "60");
            env::set_var("ORDER_STORE", "memory");
            env::set_var("BIND_ADDRESS", "127.0.0.1:8080");
        }

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.token_ttl_seconds, 60);
        assert_eq!(config.jwt_config().token_ttl, 60);
        assert_eq!(config.order_store, StoreBackend::Memory);
        assert_eq!(config.bind_address, "127.0.0.1:8080");

        clear();
    }

    #[test]
    #[serial]
    fn test_secret_is_required() {
        clear();
        assert!(AppConfig::from_env().is_err());

        unsafe { env::set_var("JWT_SECRET", "  ") };
        assert!(AppConfig::from_env().is_err());

        clear();
    }
}
