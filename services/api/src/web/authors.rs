//! services/api/src/web/authors.rs
//!
//! CRUD handlers for authors.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bookstore_core::domain::{validate_name, Author};
use bookstore_core::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::web::books::BookResponse;
use crate::web::rest::{json_body, path_id, port_error, ErrorBody, HandlerError, MessageBody};
use crate::web::state::AppState;

#[derive(Deserialize, ToSchema)]
pub struct AuthorRequest {
    pub name: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthorResponse {
    pub id: EntityId,
    pub name: String,
    pub books: Vec<BookResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Author> for AuthorResponse {
    fn from(author: Author) -> Self {
        Self {
            id: author.id,
            name: author.name,
            books: author.books.into_iter().map(BookResponse::from).collect(),
            created_at: author.created_at,
            updated_at: author.updated_at,
        }
    }
}

/// GET /authors
#[utoipa::path(
    get,
    path = "/authors",
    responses((status = 200, description = "All authors with their books", body = [AuthorResponse])),
    security(("bearer_auth" = []))
)]
pub async fn list_authors_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HandlerError> {
    let authors = state
        .db
        .list_authors()
        .await
        .map_err(|e| port_error("Failed to list authors", e))?;
    Ok(Json(
        authors.into_iter().map(AuthorResponse::from).collect::<Vec<_>>(),
    ))
}

/// GET /authors/{id}
#[utoipa::path(
    get,
    path = "/authors/{id}",
    params(("id" = i64, Path, description = "Author id")),
    responses(
        (status = 200, description = "The author with its books", body = AuthorResponse),
        (status = 404, description = "Author not found", body = ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_author_handler(
    State(state): State<Arc<AppState>>,
    id: Result<Path<EntityId>, PathRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = path_id(id)?;
    let author = state
        .db
        .get_author(id)
        .await
        .map_err(|e| port_error("Failed to get author", e))?;
    Ok(Json(AuthorResponse::from(author)))
}

/// POST /authors
#[utoipa::path(
    post,
    path = "/authors",
    request_body = AuthorRequest,
    responses(
        (status = 201, description = "Author created", body = AuthorResponse),
        (status = 400, description = "Invalid request", body = ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_author_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AuthorRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let req = json_body(payload)?;
    validate_name(&req.name).map_err(|e| port_error("Invalid author", e))?;
    let author = state
        .db
        .create_author(&req.name)
        .await
        .map_err(|e| port_error("Failed to create author", e))?;
    Ok((StatusCode::CREATED, Json(AuthorResponse::from(author))))
}

/// PUT /authors/{id}
#[utoipa::path(
    put,
    path = "/authors/{id}",
    params(("id" = i64, Path, description = "Author id")),
    request_body = AuthorRequest,
    responses(
        (status = 200, description = "Author updated", body = AuthorResponse),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 404, description = "Author not found", body = ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_author_handler(
    State(state): State<Arc<AppState>>,
    id: Result<Path<EntityId>, PathRejection>,
    payload: Result<Json<AuthorRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = path_id(id)?;
    let req = json_body(payload)?;
    validate_name(&req.name).map_err(|e| port_error("Invalid author", e))?;
    let author = state
        .db
        .update_author(id, &req.name)
        .await
        .map_err(|e| port_error("Failed to update author", e))?;
    Ok(Json(AuthorResponse::from(author)))
}

/// DELETE /authors/{id}
#[utoipa::path(
    delete,
    path = "/authors/{id}",
    params(("id" = i64, Path, description = "Author id")),
    responses(
        (status = 200, description = "Author deleted", body = MessageBody),
        (status = 404, description = "Author not found", body = ErrorBody),
        (status = 409, description = "Author still has books", body = ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_author_handler(
    State(state): State<Arc<AppState>>,
    id: Result<Path<EntityId>, PathRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = path_id(id)?;
    state
        .db
        .delete_author(id)
        .await
        .map_err(|e| port_error("Failed to delete author", e))?;
    Ok(Json(MessageBody {
        message: "Author deleted successfully".to_string(),
    }))
}
