//! crates/bookstore_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};

use crate::ports::{PortError, PortResult};

/// Numeric identifier shared by every entity. Assigned by the store, always positive.
pub type EntityId = i64;

// Represents a registered user - used throughout app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: EntityId,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

// Only used internally for login/registration - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub id: EntityId,
    pub username: String,
    pub hashed_password: String,
}

/// A book row. It always references exactly one author and one publisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub id: EntityId,
    pub title: String,
    pub author_id: EntityId,
    pub publisher_id: EntityId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An author together with the ordered collection of books linked to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: EntityId,
    pub name: String,
    pub books: Vec<Book>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A publisher together with the ordered collection of books linked to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publisher {
    pub id: EntityId,
    pub name: String,
    pub books: Vec<Book>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The fields a client supplies to create a book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    pub title: String,
    pub author_id: EntityId,
    pub publisher_id: EntityId,
}

/// A partial update of a book. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookChanges {
    pub title: Option<String>,
    pub author_id: Option<EntityId>,
    pub publisher_id: Option<EntityId>,
}

//=========================================================================================
// Field Validation
//=========================================================================================

fn check_length(field: &str, value: &str, min: usize, max: Option<usize>) -> PortResult<()> {
    let len = value.chars().count();
    if len == 0 {
        return Err(PortError::Validation(format!("{field} is required")));
    }
    match max {
        Some(max) if len < min || len > max => Err(PortError::Validation(format!(
            "{field} must be between {min} and {max} characters"
        ))),
        None if len < min => Err(PortError::Validation(format!(
            "{field} must be at least {min} characters"
        ))),
        _ => Ok(()),
    }
}

fn check_reference(field: &str, id: EntityId) -> PortResult<()> {
    if id <= 0 {
        return Err(PortError::Validation(format!("{field} is required")));
    }
    Ok(())
}

pub fn validate_username(username: &str) -> PortResult<()> {
    check_length("username", username, 4, Some(20))
}

pub fn validate_password(password: &str) -> PortResult<()> {
    check_length("password", password, 6, None)
}

/// Author and publisher names share the same constraint.
pub fn validate_name(name: &str) -> PortResult<()> {
    check_length("name", name, 3, Some(100))
}

pub fn validate_title(title: &str) -> PortResult<()> {
    check_length("title", title, 3, Some(255))
}

impl NewBook {
    pub fn validate(&self) -> PortResult<()> {
        validate_title(&self.title)?;
        check_reference("author_id", self.author_id)?;
        check_reference("publisher_id", self.publisher_id)
    }
}

impl BookChanges {
    pub fn validate(&self) -> PortResult<()> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(author_id) = self.author_id {
            check_reference("author_id", author_id)?;
        }
        if let Some(publisher_id) = self.publisher_id {
            check_reference("publisher_id", publisher_id)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.author_id.is_none() && self.publisher_id.is_none()
    }
}
