//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for registration and login. Both answer with a
//! session token on success.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bookstore_core::domain::{validate_password, validate_username};
use bookstore_core::{EntityId, PortError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::web::rest::{error_response, json_body, port_error, ErrorBody, HandlerError};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}

const INVALID_CREDENTIALS: &str = "Invalid username or password";

fn validate_credentials(req: &CredentialsRequest) -> Result<(), HandlerError> {
    validate_username(&req.username)
        .and_then(|_| validate_password(&req.password))
        .map_err(|e| port_error("Invalid credentials payload", e))
}

fn issue_token(state: &AppState, user_id: EntityId) -> Result<String, HandlerError> {
    state.tokens.issue(user_id).map_err(|e| {
        error!("Failed to sign session token: {}", e);
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create token")
    })
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /register - Create a new user account
#[utoipa::path(
    post,
    path = "/register",
    request_body = CredentialsRequest,
    responses(
        (status = 201, description = "User created successfully", body = TokenResponse),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 409, description = "Username is already taken", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let req = json_body(payload)?;
    validate_credentials(&req)?;

    // 1. Reject taken usernames before writing anything
    match state.db.get_user_by_username(&req.username).await {
        Ok(_) => {
            return Err(error_response(
                StatusCode::CONFLICT,
                "Username is already taken",
            ))
        }
        Err(PortError::NotFound(_)) => {}
        Err(e) => return Err(port_error("Failed to look up user", e)),
    }

    // 2. Hash the password
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to hash password")
        })?
        .to_string();

    // 3. Create user in database
    let user = state
        .db
        .create_user(&req.username, &password_hash)
        .await
        .map_err(|e| port_error("Failed to create user", e))?;
    info!(user_id = user.id, "Registered user");

    // 4. Issue the session token
    let token = issue_token(&state, user.id)?;
    Ok((StatusCode::CREATED, Json(TokenResponse { token })))
}

/// POST /login - Login with an existing account
#[utoipa::path(
    post,
    path = "/login",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let req = json_body(payload)?;
    validate_credentials(&req)?;

    // 1. Get user by username
    let user_creds = match state.db.get_user_by_username(&req.username).await {
        Ok(creds) => creds,
        Err(PortError::NotFound(_)) => {
            return Err(error_response(StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS))
        }
        Err(e) => return Err(port_error("Failed to look up user", e)),
    };

    // 2. Verify password
    let parsed_hash = PasswordHash::new(&user_creds.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "Authentication error")
    })?;

    let valid = Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_ok();

    if !valid {
        return Err(error_response(StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS));
    }

    // 3. Issue the session token
    let token = issue_token(&state, user_creds.id)?;
    Ok((StatusCode::OK, Json(TokenResponse { token })))
}
