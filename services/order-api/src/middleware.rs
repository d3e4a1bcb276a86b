//! Request gate: bearer token validation for order routes

use axum::{
    body::Body,
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use thiserror::Error;

use crate::{auth::Authenticator, error::ApiError, models::UserId, state::AppState};

/// Why a request was turned away at the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("No authorization header")]
    MissingCredential,

    #[error("Invalid authorization format")]
    MalformedCredential,

    #[error("Authentication required")]
    AuthenticationFailed,
}

/// Authenticated caller, stored in the request extensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: UserId,
}

/// Extract the token from a `Bearer <token>` header value
pub fn extract_bearer(header: Option<&str>) -> Result<&str, GateError> {
    let header = header.ok_or(GateError::MissingCredential)?;

    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(token),
        _ => Err(GateError::MalformedCredential),
    }
}

/// Resolve a raw `Authorization` header value to the calling user
pub fn authorize(authenticator: &Authenticator, header: Option<&str>) -> Result<AuthUser, GateError> {
    let token = extract_bearer(header)?;
    let id = authenticator
        .verify(token)
        .map_err(|_| GateError::AuthenticationFailed)?;
    Ok(AuthUser { id })
}

/// Authentication middleware
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let header = match req.headers().get(AUTHORIZATION) {
        Some(value) => Some(value.to_str().map_err(|_| GateError::MalformedCredential)?),
        None => None,
    };

    let user = authorize(&state.authenticator, header)?;

    // Handlers read the caller through `Extension<AuthUser>`
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tests::{authenticator, registration};
    use crate::repositories::MemoryStore;
    use std::sync::Arc;

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer(Some("Bearer abc.def.ghi")), Ok("abc.def.ghi"));
        assert_eq!(extract_bearer(None), Err(GateError::MissingCredential));
    }

    #[test]
    fn test_extract_bearer_rejects_other_shapes() {
        for header in [
            "",
            "Bearer",
            "Bearer ",
            "bearer abc",
            "Basic abc",
            "Bearer abc extra",
            "Bearer  abc",
            "abc",
        ] {
            assert_eq!(
                extract_bearer(Some(header)),
                Err(GateError::MalformedCredential),
                "header {:?}",
                header
            );
        }
    }

    #[tokio::test]
    async fn test_authorize_resolves_user() {
        let auth = authenticator(Arc::new(MemoryStore::new())).await;
        let user = auth.register(registration("gate@example.com")).await.unwrap();
        let token = auth
            .authenticate("gate@example.com", "correct-horse")
            .await
            .unwrap();

        let header = format!("Bearer {}", token.as_str());
        assert_eq!(
            authorize(&auth, Some(&header)),
            Ok(AuthUser { id: user.user_id })
        );
        assert_eq!(
            authorize(&auth, Some("Bearer not-a-token")),
            Err(GateError::AuthenticationFailed)
        );
    }
}
