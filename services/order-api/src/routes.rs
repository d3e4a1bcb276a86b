//! Order service routes

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info};

use crate::{
    error::{ApiError, ApiResult},
    middleware::{AuthUser, auth_middleware},
    state::AppState,
    validation::{
        ValidationIssue, parse_new_order, parse_order_patch, parse_sign_in, parse_sign_up,
    },
};

/// Query string accepted by the order read endpoints
#[derive(Debug, Deserialize)]
pub struct ItemsQuery {
    pub items: Option<String>,
}

impl ItemsQuery {
    /// Resolve the `items` flag, falling back to `default` when absent
    fn include_items(&self, default: bool) -> ApiResult<bool> {
        match self.items.as_deref() {
            None => Ok(default),
            Some("true") => Ok(true),
            Some("false") => Ok(false),
            Some(_) => Err(ApiError::InvalidInput(vec![ValidationIssue::new(
                "items",
                "Expected true or false",
            )])),
        }
    }
}

/// Create the router for the order service
pub fn create_router(state: AppState) -> Router {
    let order_routes = Router::new()
        .route("/order", post(create_order))
        .route("/order/list", get(list_orders))
        .route(
            "/order/:order_id",
            get(get_order).patch(patch_order).delete(delete_order),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/signup", post(sign_up))
        .route("/auth/signin", post(sign_in))
        .merge(order_routes)
        .with_state(state)
}

/// Unwrap a JSON body, reporting unreadable input as a validation failure
fn json_body(body: Result<Json<Value>, JsonRejection>) -> ApiResult<Value> {
    body.map(|Json(value)| value).map_err(|rejection| {
        ApiError::InvalidInput(vec![ValidationIssue::new("body", rejection.body_text())])
    })
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    match state.orders.health_check().await {
        Ok(true) => Ok(Json(json!({ "status": "ok" }))),
        Ok(false) => Err(ApiError::ServiceUnavailable),
        Err(e) => {
            error!("Health check failed: {}", e);
            Err(ApiError::ServiceUnavailable)
        }
    }
}

/// Register a new account
pub async fn sign_up(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let registration = parse_sign_up(&json_body(body)?).map_err(ApiError::InvalidInput)?;
    let user = state.authenticator.register(registration).await?;

    Ok(Json(json!({
        "message": "User created successfully",
        "user": {
            "userId": user.user_id,
            "email": user.email,
        }
    })))
}

/// Exchange credentials for a session token
pub async fn sign_in(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let credentials = parse_sign_in(&json_body(body)?).map_err(ApiError::InvalidInput)?;
    let token = state
        .authenticator
        .authenticate(&credentials.email, &credentials.password)
        .await?;

    Ok(Json(json!({ "token": token })))
}

/// Create an order owned by the caller
pub async fn create_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let order = parse_new_order(&json_body(body)?).map_err(ApiError::InvalidInput)?;
    let created = state.orders.create(order, user.id).await?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// List every order
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ItemsQuery>,
) -> ApiResult<impl IntoResponse> {
    let orders = state.orders.list(query.include_items(false)?).await?;
    Ok(Json(orders))
}

/// Fetch one order
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Query(query): Query<ItemsQuery>,
) -> ApiResult<impl IntoResponse> {
    let order = state
        .orders
        .read(&order_id, query.include_items(true)?)
        .await?
        .ok_or(ApiError::NotFound(order_id))?;

    Ok(Json(order))
}

/// Apply a sparse patch to an order and its items
pub async fn patch_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(order_id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let patch = parse_order_patch(&json_body(body)?).map_err(ApiError::InvalidInput)?;
    info!(order_id = %order_id, user_id = user.id, "Patch requested");

    let order = state.orders.patch(&order_id, patch).await?;
    Ok(Json(order))
}

/// Delete an order and its items
pub async fn delete_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(order_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    info!(order_id = %order_id, user_id = user.id, "Delete requested");

    let deleted = state
        .orders
        .delete(&order_id)
        .await?
        .ok_or(ApiError::NotFound(order_id))?;

    Ok(Json(json!({ "deleted": deleted })))
}
