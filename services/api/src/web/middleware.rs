//! services/api/src/web/middleware.rs
//!
//! Authentication gate in front of every route.
//!
//! `/login` and `/register` pass through untouched, whatever the method. Every
//! other request needs an `Authorization: Bearer <token>` header carrying a
//! valid session token, otherwise it is answered with a plain `401
//! Unauthorized` and never reaches its handler.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bookstore_core::EntityId;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::token::{TokenError, TokenService};
use crate::web::state::AppState;

/// Paths that bypass the gate. Matched by exact string equality.
pub const PUBLIC_PATHS: [&str; 2] = ["/login", "/register"];

/// The principal attached to request extensions once the gate lets a request in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: EntityId,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("missing Authorization header")]
    MissingHeader,
    #[error(transparent)]
    Token(#[from] TokenError),
}

/// Outcome of running a request through the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Exempt,
    Authorized(EntityId),
    Rejected(RejectReason),
}

/// Decides whether a request may proceed. No state is kept between calls.
pub fn gate(path: &str, headers: &HeaderMap, tokens: &TokenService) -> GateDecision {
    if PUBLIC_PATHS.contains(&path) {
        return GateDecision::Exempt;
    }

    let value = match headers.get(header::AUTHORIZATION) {
        Some(value) if !value.is_empty() => value,
        _ => return GateDecision::Rejected(RejectReason::MissingHeader),
    };
    let Ok(authorization) = value.to_str() else {
        return GateDecision::Rejected(TokenError::MalformedHeader.into());
    };

    match tokens.validate(authorization) {
        Ok(user_id) => GateDecision::Authorized(user_id),
        Err(e) => GateDecision::Rejected(e.into()),
    }
}

/// Middleware that validates the bearer token and exposes the user id.
///
/// If valid, inserts an [`AuthenticatedUser`] into request extensions for handlers to use.
/// The cause of a rejection is logged but never sent to the client.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    match gate(req.uri().path(), req.headers(), &state.tokens) {
        GateDecision::Exempt => next.run(req).await,
        GateDecision::Authorized(user_id) => {
            debug!(user_id, path = %req.uri().path(), "Authorized request");
            req.extensions_mut().insert(AuthenticatedUser { user_id });
            next.run(req).await
        }
        GateDecision::Rejected(reason) => {
            warn!(path = %req.uri().path(), %reason, "Rejected request");
            (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
        }
    }
}
