//! services/api/src/web/books.rs
//!
//! Handlers for books. Creation and updates go through the catalog so the
//! author and publisher collections stay in step with the book rows.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bookstore_core::catalog;
use bookstore_core::domain::{Book, BookChanges, NewBook};
use bookstore_core::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use crate::web::rest::{json_body, path_id, port_error, ErrorBody, HandlerError, MessageBody};
use crate::web::state::AppState;

#[derive(Deserialize, ToSchema)]
pub struct CreateBookRequest {
    pub title: String,
    pub author_id: EntityId,
    pub publisher_id: EntityId,
}

/// Every field is optional; omitted fields keep their current value.
#[derive(Deserialize, ToSchema)]
pub struct UpdateBookRequest {
    pub title: Option<String>,
    pub author_id: Option<EntityId>,
    pub publisher_id: Option<EntityId>,
}

#[derive(Serialize, ToSchema)]
pub struct BookResponse {
    pub id: EntityId,
    pub title: String,
    pub author_id: EntityId,
    pub publisher_id: EntityId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            title: book.title,
            author_id: book.author_id,
            publisher_id: book.publisher_id,
            created_at: book.created_at,
            updated_at: book.updated_at,
        }
    }
}

/// GET /books
#[utoipa::path(
    get,
    path = "/books",
    responses((status = 200, description = "All books", body = [BookResponse])),
    security(("bearer_auth" = []))
)]
pub async fn list_books_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HandlerError> {
    let books = state
        .db
        .list_books()
        .await
        .map_err(|e| port_error("Failed to list books", e))?;
    Ok(Json(
        books.into_iter().map(BookResponse::from).collect::<Vec<_>>(),
    ))
}

/// GET /books/{id}
#[utoipa::path(
    get,
    path = "/books/{id}",
    params(("id" = i64, Path, description = "Book id")),
    responses(
        (status = 200, description = "The book", body = BookResponse),
        (status = 404, description = "Book not found", body = ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_book_handler(
    State(state): State<Arc<AppState>>,
    id: Result<Path<EntityId>, PathRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = path_id(id)?;
    let book = state
        .db
        .get_book(id)
        .await
        .map_err(|e| port_error("Failed to get book", e))?;
    Ok(Json(BookResponse::from(book)))
}

/// POST /books - Create a book and link it to its author and publisher
#[utoipa::path(
    post,
    path = "/books",
    request_body = CreateBookRequest,
    responses(
        (status = 201, description = "Book created and linked to both parents", body = BookResponse),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 404, description = "Author or publisher not found", body = ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_book_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateBookRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let req = json_body(payload)?;
    let new_book = NewBook {
        title: req.title,
        author_id: req.author_id,
        publisher_id: req.publisher_id,
    };
    let book = catalog::create_book(state.db.as_ref(), &new_book)
        .await
        .map_err(|e| port_error("Failed to create book", e))?;
    info!(
        book_id = book.id,
        author_id = book.author_id,
        publisher_id = book.publisher_id,
        "Created book"
    );
    Ok((StatusCode::CREATED, Json(BookResponse::from(book))))
}

/// PUT /books/{id}
#[utoipa::path(
    put,
    path = "/books/{id}",
    params(("id" = i64, Path, description = "Book id")),
    request_body = UpdateBookRequest,
    responses(
        (status = 200, description = "Book updated", body = BookResponse),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 404, description = "Book, author or publisher not found", body = ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_book_handler(
    State(state): State<Arc<AppState>>,
    id: Result<Path<EntityId>, PathRejection>,
    payload: Result<Json<UpdateBookRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = path_id(id)?;
    let req = json_body(payload)?;
    let changes = BookChanges {
        title: req.title,
        author_id: req.author_id,
        publisher_id: req.publisher_id,
    };
    let book = catalog::update_book(state.db.as_ref(), id, &changes)
        .await
        .map_err(|e| port_error("Failed to update book", e))?;
    Ok(Json(BookResponse::from(book)))
}

/// DELETE /books/{id}
#[utoipa::path(
    delete,
    path = "/books/{id}",
    params(("id" = i64, Path, description = "Book id")),
    responses(
        (status = 200, description = "Book deleted", body = MessageBody),
        (status = 404, description = "Book not found", body = ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_book_handler(
    State(state): State<Arc<AppState>>,
    id: Result<Path<EntityId>, PathRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = path_id(id)?;
    state
        .db
        .delete_book(id)
        .await
        .map_err(|e| port_error("Failed to delete book", e))?;
    Ok(Json(MessageBody {
        message: "Book deleted successfully".to_string(),
    }))
}
