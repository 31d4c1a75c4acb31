//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::token::TokenService;
use bookstore_core::ports::DatabaseService;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub tokens: Arc<TokenService>,
}

impl AppState {
    pub fn new(db: Arc<dyn DatabaseService>, tokens: TokenService) -> Self {
        Self {
            db,
            tokens: Arc::new(tokens),
        }
    }
}
