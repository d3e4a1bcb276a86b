//! Authenticator: sign-up, sign-in and session token verification
//!
//! Passwords are hashed with argon2id on the blocking thread pool. Sign-in
//! failures never say whether the email or the password was wrong, and an
//! unknown email still pays for one hash verification against a decoy
//! digest.

use std::sync::Arc;

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::SaltString,
};
use common::{DatabaseError, StoreOutcome};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::jwt::JwtService;
use crate::models::{NewUser, Registration, User, UserId};
use crate::repositories::CredentialStore;
use crate::validation::{ValidationIssue, validate_registration};

const DECOY_PASSWORD: &str = "decoy-password-for-unknown-accounts";

/// Errors returned by the authenticator
#[derive(Debug, Error)]
pub enum AuthError {
    /// One or more sign-up fields failed their shape rules
    #[error("invalid input")]
    InvalidInput(Vec<ValidationIssue>),

    /// The email is already registered
    #[error("an account with this email already exists")]
    DuplicateIdentity,

    /// The store rejected the user row for a missing column
    #[error("user requires an email")]
    MissingRequiredField,

    /// Credentials or token did not check out
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Anything else; logged server side only
    #[error("unexpected authentication error: {0}")]
    Unexpected(String),
}

impl From<DatabaseError> for AuthError {
    fn from(err: DatabaseError) -> Self {
        AuthError::Unexpected(err.to_string())
    }
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingConfig {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism
    pub parallelism: u32,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// Salted, adaptive password hashing
#[derive(Clone)]
pub struct PasswordHashing {
    argon2: Argon2<'static>,
}

impl PasswordHashing {
    pub fn new(config: HashingConfig) -> Result<Self, AuthError> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| AuthError::Unexpected(format!("Invalid hashing parameters: {}", e)))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash a password into a PHC string
    pub async fn hash(&self, password: String) -> Result<String, AuthError> {
        let argon2 = self.argon2.clone();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut rand::thread_rng());
            argon2
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
        })
        .await
        .map_err(|e| AuthError::Unexpected(format!("Hashing task failed: {}", e)))?
        .map_err(|e| AuthError::Unexpected(format!("Failed to hash password: {}", e)))
    }

    /// Compare a password with a stored digest in constant time
    pub async fn verify(&self, password: String, digest: String) -> Result<bool, AuthError> {
        let argon2 = self.argon2.clone();
        tokio::task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&digest)?;
            Ok::<_, argon2::password_hash::Error>(
                argon2.verify_password(password.as_bytes(), &parsed).is_ok(),
            )
        })
        .await
        .map_err(|e| AuthError::Unexpected(format!("Hashing task failed: {}", e)))?
        .map_err(|e| AuthError::Unexpected(format!("Failed to parse password hash: {}", e)))
    }
}

/// Signed, time-limited credential returned by sign-in
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// Verifies credentials and issues or checks session tokens
#[derive(Clone)]
pub struct Authenticator {
    users: Arc<dyn CredentialStore>,
    hashing: PasswordHashing,
    jwt: JwtService,
    decoy_hash: String,
}

impl Authenticator {
    /// Build an authenticator; hashes the decoy digest up front
    pub async fn new(
        users: Arc<dyn CredentialStore>,
        hashing: PasswordHashing,
        jwt: JwtService,
    ) -> Result<Self, AuthError> {
        let decoy_hash = hashing.hash(DECOY_PASSWORD.to_string()).await?;
        Ok(Self {
            users,
            hashing,
            jwt,
            decoy_hash,
        })
    }

    /// Create a new account
    pub async fn register(&self, registration: Registration) -> Result<User, AuthError> {
        let issues = validate_registration(&registration);
        if !issues.is_empty() {
            return Err(AuthError::InvalidInput(issues));
        }

        let Registration {
            email,
            password,
            first_name,
            last_name,
        } = registration;

        let new_user = NewUser {
            email,
            password_hash: self.hashing.hash(password).await?,
            first_name,
            last_name,
        };

        match self.users.insert_user(&new_user).await? {
            StoreOutcome::Success(user) => {
                info!(user_id = user.user_id, "User registered");
                Ok(user)
            }
            StoreOutcome::UniqueViolation => {
                debug!("Sign-up rejected: email already registered");
                Err(AuthError::DuplicateIdentity)
            }
            StoreOutcome::NullViolation => Err(AuthError::MissingRequiredField),
            other => Err(AuthError::Unexpected(format!(
                "Unexpected store outcome on user insert: {:?}",
                other.map(|_| ())
            ))),
        }
    }

    /// Check an email/password pair and issue a session token
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<SessionToken, AuthError> {
        let user = self.users.find_user_by_email(email).await?;

        let (user_id, digest) = match user {
            Some(user) => (Some(user.user_id), user.password_hash),
            None => (None, self.decoy_hash.clone()),
        };

        let matches = self.hashing.verify(password.to_string(), digest).await?;

        match user_id {
            Some(user_id) if matches => {
                let token = self
                    .jwt
                    .generate_token(user_id)
                    .map_err(|e| AuthError::Unexpected(format!("Failed to sign token: {}", e)))?;
                info!(user_id, "User signed in");
                Ok(SessionToken(token))
            }
            _ => Err(AuthError::AuthenticationFailed),
        }
    }

    /// Resolve a session token to the user id it was issued for
    pub fn verify(&self, token: &str) -> Result<UserId, AuthError> {
        self.jwt.validate_token(token).map_err(|e| {
            debug!("Token rejected: {}", e);
            AuthError::AuthenticationFailed
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::jwt::JwtConfig;
    use crate::repositories::MemoryStore;

    /// Cheap argon2 parameters so tests stay fast
    pub(crate) const TEST_HASHING: HashingConfig = HashingConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    };

    pub(crate) async fn authenticator(store: Arc<MemoryStore>) -> Authenticator {
        let jwt = JwtService::new(&JwtConfig {
            secret: "test-secret".to_string(),
            token_ttl: 3600,
        });
        Authenticator::new(store, PasswordHashing::new(TEST_HASHING).unwrap(), jwt)
            .await
            .unwrap()
    }

    pub(crate) fn registration(email: &str) -> Registration {
        Registration {
            email: email.to_string(),
            password: "correct-horse".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_and_authenticate() {
        let auth = authenticator(Arc::new(MemoryStore::new())).await;

        let user = auth.register(registration("ada@example.com")).await.unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.last_name, "Lovelace");
        assert_ne!(user.password_hash, "correct-horse");
        assert!(user.password_hash.starts_with("$argon2id$"));

        let token = auth
            .authenticate("ada@example.com", "correct-horse")
            .await
            .unwrap();
        assert_eq!(auth.verify(token.as_str()).unwrap(), user.user_id);
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let auth = authenticator(Arc::new(MemoryStore::new())).await;
        auth.register(registration("ada@example.com")).await.unwrap();

        let err = auth
            .register(registration("ada@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateIdentity));
    }

    #[tokio::test]
    async fn test_register_rejects_bad_shape() {
        let auth = authenticator(Arc::new(MemoryStore::new())).await;
        let mut bad = registration("not-an-email");
        bad.password = "short".to_string();

        match auth.register(bad).await {
            Err(AuthError::InvalidInput(issues)) => assert_eq!(issues.len(), 2),
            other => panic!("expected invalid input, got {:?}", other.map(|u| u.user_id)),
        }
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_email_fail_alike() {
        let auth = authenticator(Arc::new(MemoryStore::new())).await;
        auth.register(registration("ada@example.com")).await.unwrap();

        let wrong_password = auth
            .authenticate("ada@example.com", "wrong-password")
            .await
            .unwrap_err();
        let unknown_email = auth
            .authenticate("nobody@example.com", "correct-horse")
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, AuthError::AuthenticationFailed));
        assert!(matches!(unknown_email, AuthError::AuthenticationFailed));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn test_email_is_case_sensitive() {
        let auth = authenticator(Arc::new(MemoryStore::new())).await;
        auth.register(registration("ada@example.com")).await.unwrap();

        let err = auth
            .authenticate("ADA@example.com", "correct-horse")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AuthenticationFailed));
    }

    #[tokio::test]
    async fn test_verify_rejects_garbage() {
        let auth = authenticator(Arc::new(MemoryStore::new())).await;
        assert!(matches!(
            auth.verify("garbage"),
            Err(AuthError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_default_hashing_config_is_usable() {
        assert!(PasswordHashing::new(HashingConfig::default()).is_ok());
        assert!(
            PasswordHashing::new(HashingConfig {
                memory_kib: 0,
                iterations: 0,
                parallelism: 0,
            })
            .is_err()
        );
    }
}
