//! services/api/src/web/rest.rs
//!
//! Shared pieces of the REST layer: the master definition for the OpenAPI
//! document, the JSON error body and the mapping from port errors to
//! HTTP responses.

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    extract::Path,
    http::StatusCode,
    Json,
};
use bookstore_core::{EntityId, PortError};
use serde::Serialize;
use tracing::{error, warn};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};

use crate::web::{auth, authors, books, publishers};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register_handler,
        auth::login_handler,
        authors::list_authors_handler,
        authors::get_author_handler,
        authors::create_author_handler,
        authors::update_author_handler,
        authors::delete_author_handler,
        publishers::list_publishers_handler,
        publishers::get_publisher_handler,
        publishers::create_publisher_handler,
        publishers::update_publisher_handler,
        publishers::delete_publisher_handler,
        books::list_books_handler,
        books::get_book_handler,
        books::create_book_handler,
        books::update_book_handler,
        books::delete_book_handler,
    ),
    components(
        schemas(
            ErrorBody,
            MessageBody,
            auth::CredentialsRequest,
            auth::TokenResponse,
            authors::AuthorRequest,
            authors::AuthorResponse,
            publishers::PublisherRequest,
            publishers::PublisherResponse,
            books::CreateBookRequest,
            books::UpdateBookRequest,
            books::BookResponse,
        )
    ),
    modifiers(&BearerSecurity),
    tags(
        (name = "Bookstore API", description = "Users, authors, publishers and books.")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by protected paths.
struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

//=========================================================================================
// Response Bodies and Error Mapping
//=========================================================================================

/// Body of every error response: `{"error": "..."}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

/// Body of a successful delete: `{"message": "..."}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageBody {
    pub message: String,
}

pub type HandlerError = (StatusCode, Json<ErrorBody>);

pub fn error_response(status: StatusCode, message: impl Into<String>) -> HandlerError {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

/// Maps a port error onto a status code. Unexpected errors are logged in full
/// and reported to the client without detail.
pub fn port_error(context: &str, e: PortError) -> HandlerError {
    match e {
        PortError::NotFound(msg) => {
            warn!("{}: {}", context, msg);
            error_response(StatusCode::NOT_FOUND, msg)
        }
        PortError::Conflict(msg) => {
            warn!("{}: {}", context, msg);
            error_response(StatusCode::CONFLICT, msg)
        }
        PortError::Validation(msg) => error_response(StatusCode::BAD_REQUEST, msg),
        PortError::Unexpected(msg) => {
            error!("{}: {}", context, msg);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// Unwraps a JSON body, answering `400 Invalid request payload` when it does not parse.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, HandlerError> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        warn!("Invalid request payload: {}", rejection);
        error_response(StatusCode::BAD_REQUEST, "Invalid request payload")
    })
}

/// Unwraps a numeric `{id}` path segment.
pub fn path_id(id: Result<Path<EntityId>, PathRejection>) -> Result<EntityId, HandlerError> {
    id.map(|Path(id)| id)
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, "Invalid id"))
}

pub async fn not_found_handler() -> HandlerError {
    error_response(StatusCode::NOT_FOUND, "Not found")
}
