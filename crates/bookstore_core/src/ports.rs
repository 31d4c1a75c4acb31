//! crates/bookstore_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of a specific store such as PostgreSQL.

use async_trait::async_trait;

use crate::domain::{Author, Book, EntityId, NewBook, Publisher, User, UserCredentials};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---
    /// Fails with `Conflict` when the username is taken.
    async fn create_user(&self, username: &str, hashed_password: &str) -> PortResult<User>;

    async fn get_user_by_username(&self, username: &str) -> PortResult<UserCredentials>;

    // --- Authors ---
    async fn list_authors(&self) -> PortResult<Vec<Author>>;

    async fn get_author(&self, author_id: EntityId) -> PortResult<Author>;

    async fn create_author(&self, name: &str) -> PortResult<Author>;

    async fn update_author(&self, author_id: EntityId, name: &str) -> PortResult<Author>;

    /// Fails with `Conflict` while books still reference the author.
    async fn delete_author(&self, author_id: EntityId) -> PortResult<()>;

    // --- Publishers ---
    async fn list_publishers(&self) -> PortResult<Vec<Publisher>>;

    async fn get_publisher(&self, publisher_id: EntityId) -> PortResult<Publisher>;

    /// Fails with `Conflict` when the name is taken.
    async fn create_publisher(&self, name: &str) -> PortResult<Publisher>;

    async fn update_publisher(&self, publisher_id: EntityId, name: &str) -> PortResult<Publisher>;

    /// Fails with `Conflict` while books still reference the publisher.
    async fn delete_publisher(&self, publisher_id: EntityId) -> PortResult<()>;

    // --- Books ---
    async fn list_books(&self) -> PortResult<Vec<Book>>;

    async fn get_book(&self, book_id: EntityId) -> PortResult<Book>;

    /// Removes the book row and its links from both parent collections.
    async fn delete_book(&self, book_id: EntityId) -> PortResult<()>;

    /// Opens a unit of work for writes that span a book and its parents.
    async fn begin_catalog_unit(&self) -> PortResult<Box<dyn CatalogUnit>>;
}

/// A transactional scope over the catalog tables.
///
/// Every `find_*` call locks the returned row until the unit ends, so two units
/// touching the same parent are serialized. Dropping a unit without calling
/// [`CatalogUnit::commit`] discards every write made through it.
#[async_trait]
pub trait CatalogUnit: Send {
    async fn insert_book(&mut self, book: &NewBook) -> PortResult<Book>;

    async fn find_book(&mut self, book_id: EntityId) -> PortResult<Book>;

    /// Persists title and parent references of an existing book.
    async fn save_book(&mut self, book: &Book) -> PortResult<Book>;

    async fn find_publisher(&mut self, publisher_id: EntityId) -> PortResult<Publisher>;

    /// Persists the publisher, making its stored collection match `publisher.books`.
    async fn save_publisher(&mut self, publisher: &Publisher) -> PortResult<()>;

    async fn find_author(&mut self, author_id: EntityId) -> PortResult<Author>;

    /// Persists the author, making its stored collection match `author.books`.
    async fn save_author(&mut self, author: &Author) -> PortResult<()>;

    async fn commit(self: Box<Self>) -> PortResult<()>;
}
