//! services/api/src/lib.rs
//!
//! The bookstore REST service: store adapters, the session token service and
//! the axum web layer. The binaries in `src/bin` wire these together.

pub mod adapters;
pub mod config;
pub mod error;
pub mod token;
pub mod web;
