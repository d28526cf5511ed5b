//! Auth Handlers
//!
//! Signup and login. A successful login sets the `jwt` cookie that the
//! auth middleware reads on every protected route.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::auth::jwt::TOKEN_EXPIRATION_HOURS;
use crate::core::ServerState;
use crate::utils::{AppError, AppResult};

#[derive(Debug, Deserialize, Validate)]
pub struct CredentialsRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
}

/// Register a new user
pub async fn signup(
    State(state): State<ServerState>,
    Json(req): Json<CredentialsRequest>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    state.auth_service.register(&req.email, &req.password).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({"message": "user registered"})),
    ))
}

/// Login; sets the `jwt` cookie on success
pub async fn login(
    State(state): State<ServerState>,
    Json(req): Json<CredentialsRequest>,
) -> AppResult<Response> {
    let token = state.auth_service.login(&req.email, &req.password).await?;

    let cookie = format!(
        "jwt={}; Path=/; HttpOnly; Max-Age={}",
        token,
        TOKEN_EXPIRATION_HOURS * 3600
    );

    let mut response = Json(json!({"message": "login successful"})).into_response();
    response.headers_mut().insert(
        header::SET_COOKIE,
        cookie
            .parse()
            .map_err(|_| AppError::Internal("cookie encoding failed".into()))?,
    );
    Ok(response)
}
