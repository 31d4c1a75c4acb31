pub mod auth;
pub mod authors;
pub mod books;
pub mod middleware;
pub mod publishers;
pub mod rest;
pub mod state;

use axum::{middleware as axum_middleware, routing::{get, post}, Router};
use std::sync::Arc;

pub use middleware::{require_auth, AuthenticatedUser};
pub use state::AppState;

/// Builds every route behind the authentication gate. The gate itself lets
/// `/login` and `/register` through.
pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/register", post(auth::register_handler))
        .route("/login", post(auth::login_handler))
        .route(
            "/authors",
            get(authors::list_authors_handler).post(authors::create_author_handler),
        )
        .route(
            "/authors/{id}",
            get(authors::get_author_handler)
                .put(authors::update_author_handler)
                .delete(authors::delete_author_handler),
        )
        .route(
            "/publishers",
            get(publishers::list_publishers_handler).post(publishers::create_publisher_handler),
        )
        .route(
            "/publishers/{id}",
            get(publishers::get_publisher_handler)
                .put(publishers::update_publisher_handler)
                .delete(publishers::delete_publisher_handler),
        )
        .route(
            "/books",
            get(books::list_books_handler).post(books::create_book_handler),
        )
        .route(
            "/books/{id}",
            get(books::get_book_handler)
                .put(books::update_book_handler)
                .delete(books::delete_book_handler),
        )
        // Registered before the gate so unknown paths are gated too.
        .fallback(rest::not_found_handler)
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ))
        .with_state(app_state)
}
