//! services/api/src/web/publishers.rs
//!
//! CRUD handlers for publishers. Publisher names are unique.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bookstore_core::domain::{validate_name, Publisher};
use bookstore_core::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::web::books::BookResponse;
use crate::web::rest::{json_body, path_id, port_error, ErrorBody, HandlerError, MessageBody};
use crate::web::state::AppState;

#[derive(Deserialize, ToSchema)]
pub struct PublisherRequest {
    pub name: String,
}

#[derive(Serialize, ToSchema)]
pub struct PublisherResponse {
    pub id: EntityId,
    pub name: String,
    pub books: Vec<BookResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Publisher> for PublisherResponse {
    fn from(publisher: Publisher) -> Self {
        Self {
            id: publisher.id,
            name: publisher.name,
            books: publisher.books.into_iter().map(BookResponse::from).collect(),
            created_at: publisher.created_at,
            updated_at: publisher.updated_at,
        }
    }
}

/// GET /publishers
#[utoipa::path(
    get,
    path = "/publishers",
    responses((status = 200, description = "All publishers with their books", body = [PublisherResponse])),
    security(("bearer_auth" = []))
)]
pub async fn list_publishers_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HandlerError> {
    let publishers = state
        .db
        .list_publishers()
        .await
        .map_err(|e| port_error("Failed to list publishers", e))?;
    Ok(Json(
        publishers.into_iter().map(PublisherResponse::from).collect::<Vec<_>>(),
    ))
}

/// GET /publishers/{id}
#[utoipa::path(
    get,
    path = "/publishers/{id}",
    params(("id" = i64, Path, description = "Publisher id")),
    responses(
        (status = 200, description = "The publisher with its books", body = PublisherResponse),
        (status = 404, description = "Publisher not found", body = ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_publisher_handler(
    State(state): State<Arc<AppState>>,
    id: Result<Path<EntityId>, PathRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = path_id(id)?;
    let publisher = state
        .db
        .get_publisher(id)
        .await
        .map_err(|e| port_error("Failed to get publisher", e))?;
    Ok(Json(PublisherResponse::from(publisher)))
}

/// POST /publishers
#[utoipa::path(
    post,
    path = "/publishers",
    request_body = PublisherRequest,
    responses(
        (status = 201, description = "Publisher created", body = PublisherResponse),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 409, description = "Publisher name is already taken", body = ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_publisher_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PublisherRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let req = json_body(payload)?;
    validate_name(&req.name).map_err(|e| port_error("Invalid publisher", e))?;
    let publisher = state
        .db
        .create_publisher(&req.name)
        .await
        .map_err(|e| port_error("Failed to create publisher", e))?;
    Ok((StatusCode::CREATED, Json(PublisherResponse::from(publisher))))
}

/// PUT /publishers/{id}
#[utoipa::path(
    put,
    path = "/publishers/{id}",
    params(("id" = i64, Path, description = "Publisher id")),
    request_body = PublisherRequest,
    responses(
        (status = 200, description = "Publisher updated", body = PublisherResponse),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 404, description = "Publisher not found", body = ErrorBody),
        (status = 409, description = "Publisher name is already taken", body = ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_publisher_handler(
    State(state): State<Arc<AppState>>,
    id: Result<Path<EntityId>, PathRejection>,
    payload: Result<Json<PublisherRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = path_id(id)?;
    let req = json_body(payload)?;
    validate_name(&req.name).map_err(|e| port_error("Invalid publisher", e))?;
    let publisher = state
        .db
        .update_publisher(id, &req.name)
        .await
        .map_err(|e| port_error("Failed to update publisher", e))?;
    Ok(Json(PublisherResponse::from(publisher)))
}

/// DELETE /publishers/{id}
#[utoipa::path(
    delete,
    path = "/publishers/{id}",
    params(("id" = i64, Path, description = "Publisher id")),
    responses(
        (status = 200, description = "Publisher deleted", body = MessageBody),
        (status = 404, description = "Publisher not found", body = ErrorBody),
        (status = 409, description = "Publisher still has books", body = ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_publisher_handler(
    State(state): State<Arc<AppState>>,
    id: Result<Path<EntityId>, PathRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = path_id(id)?;
    state
        .db
        .delete_publisher(id)
        .await
        .map_err(|e| port_error("Failed to delete publisher", e))?;
    Ok(Json(MessageBody {
        message: "Publisher deleted successfully".to_string(),
    }))
}
