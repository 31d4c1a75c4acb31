//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of the `DatabaseService` port. Selected with
//! `DATABASE_URL=memory://` and used by the test suites.
//!
//! A catalog unit holds the store-wide lock for its whole lifetime and works on
//! a copy of the tables; `commit` swaps the copy in, dropping the unit throws it
//! away.

use async_trait::async_trait;
use bookstore_core::domain::{Author, Book, EntityId, NewBook, Publisher, User, UserCredentials};
use bookstore_core::ports::{CatalogUnit, DatabaseService, PortError, PortResult};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Clone)]
struct UserRow {
    username: String,
    hashed_password: String,
    created_at: DateTime<Utc>,
}

#[derive(Clone)]
struct ParentRow {
    name: String,
    book_ids: Vec<EntityId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Default)]
struct Tables {
    last_id: EntityId,
    users: BTreeMap<EntityId, UserRow>,
    authors: BTreeMap<EntityId, ParentRow>,
    publishers: BTreeMap<EntityId, ParentRow>,
    books: BTreeMap<EntityId, Book>,
}

impl Tables {
    fn next_id(&mut self) -> EntityId {
        self.last_id += 1;
        self.last_id
    }

    fn books_for(&self, ids: &[EntityId]) -> Vec<Book> {
        ids.iter().filter_map(|id| self.books.get(id).cloned()).collect()
    }

    fn author(&self, id: EntityId) -> PortResult<Author> {
        let row = self
            .authors
            .get(&id)
            .ok_or_else(|| PortError::NotFound(format!("Author {} not found", id)))?;
        Ok(Author {
            id,
            name: row.name.clone(),
            books: self.books_for(&row.book_ids),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn publisher(&self, id: EntityId) -> PortResult<Publisher> {
        let row = self
            .publishers
            .get(&id)
            .ok_or_else(|| PortError::NotFound(format!("Publisher {} not found", id)))?;
        Ok(Publisher {
            id,
            name: row.name.clone(),
            books: self.books_for(&row.book_ids),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn book(&self, id: EntityId) -> PortResult<Book> {
        self.books
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Book {} not found", id)))
    }

    fn publisher_name_taken(&self, name: &str, except: Option<EntityId>) -> bool {
        self.publishers
            .iter()
            .any(|(id, row)| row.name == name && Some(*id) != except)
    }
}

/// Link ids in collection order, without duplicates.
fn link_ids(books: &[Book]) -> Vec<EntityId> {
    let mut ids: Vec<EntityId> = Vec::with_capacity(books.len());
    for book in books {
        if !ids.contains(&book.id) {
            ids.push(book.id);
        }
    }
    ids
}

fn new_parent(name: &str) -> ParentRow {
    let now = Utc::now();
    ParentRow {
        name: name.to_string(),
        book_ids: Vec::new(),
        created_at: now,
        updated_at: now,
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DatabaseService for MemoryStore {
    async fn create_user(&self, username: &str, hashed_password: &str) -> PortResult<User> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|u| u.username == username) {
            return Err(PortError::Conflict("Username is already taken".to_string()));
        }
        let id = tables.next_id();
        let row = UserRow {
            username: username.to_string(),
            hashed_password: hashed_password.to_string(),
            created_at: Utc::now(),
        };
        let user = User {
            id,
            username: row.username.clone(),
            created_at: row.created_at,
        };
        tables.users.insert(id, row);
        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> PortResult<UserCredentials> {
        let tables = self.tables.lock().await;
        tables
            .users
            .iter()
            .find(|(_, row)| row.username == username)
            .map(|(id, row)| UserCredentials {
                id: *id,
                username: row.username.clone(),
                hashed_password: row.hashed_password.clone(),
            })
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", username)))
    }

    async fn list_authors(&self) -> PortResult<Vec<Author>> {
        let tables = self.tables.lock().await;
        tables.authors.keys().map(|id| tables.author(*id)).collect()
    }

    async fn get_author(&self, author_id: EntityId) -> PortResult<Author> {
        self.tables.lock().await.author(author_id)
    }

    async fn create_author(&self, name: &str) -> PortResult<Author> {
        let mut tables = self.tables.lock().await;
        let id = tables.next_id();
        tables.authors.insert(id, new_parent(name));
        tables.author(id)
    }

    async fn update_author(&self, author_id: EntityId, name: &str) -> PortResult<Author> {
        let mut tables = self.tables.lock().await;
        let row = tables
            .authors
            .get_mut(&author_id)
            .ok_or_else(|| PortError::NotFound(format!("Author {} not found", author_id)))?;
        row.name = name.to_string();
        row.updated_at = Utc::now();
        tables.author(author_id)
    }

    async fn delete_author(&self, author_id: EntityId) -> PortResult<()> {
        let mut tables = self.tables.lock().await;
        if !tables.authors.contains_key(&author_id) {
            return Err(PortError::NotFound(format!("Author {} not found", author_id)));
        }
        if tables.books.values().any(|b| b.author_id == author_id) {
            return Err(PortError::Conflict(format!("Author {} still has books", author_id)));
        }
        tables.authors.remove(&author_id);
        Ok(())
    }

    async fn list_publishers(&self) -> PortResult<Vec<Publisher>> {
        let tables = self.tables.lock().await;
        tables.publishers.keys().map(|id| tables.publisher(*id)).collect()
    }

    async fn get_publisher(&self, publisher_id: EntityId) -> PortResult<Publisher> {
        self.tables.lock().await.publisher(publisher_id)
    }

    async fn create_publisher(&self, name: &str) -> PortResult<Publisher> {
        let mut tables = self.tables.lock().await;
        if tables.publisher_name_taken(name, None) {
            return Err(PortError::Conflict("Publisher name is already taken".to_string()));
        }
        let id = tables.next_id();
        tables.publishers.insert(id, new_parent(name));
        tables.publisher(id)
    }

    async fn update_publisher(&self, publisher_id: EntityId, name: &str) -> PortResult<Publisher> {
        let mut tables = self.tables.lock().await;
        if !tables.publishers.contains_key(&publisher_id) {
            return Err(PortError::NotFound(format!("Publisher {} not found", publisher_id)));
        }
        if tables.publisher_name_taken(name, Some(publisher_id)) {
            return Err(PortError::Conflict("Publisher name is already taken".to_string()));
        }
        if let Some(row) = tables.publishers.get_mut(&publisher_id) {
            row.name = name.to_string();
            row.updated_at = Utc::now();
        }
        tables.publisher(publisher_id)
    }

    async fn delete_publisher(&self, publisher_id: EntityId) -> PortResult<()> {
        let mut tables = self.tables.lock().await;
        if !tables.publishers.contains_key(&publisher_id) {
            return Err(PortError::NotFound(format!("Publisher {} not found", publisher_id)));
        }
        if tables.books.values().any(|b| b.publisher_id == publisher_id) {
            return Err(PortError::Conflict(format!(
                "Publisher {} still has books",
                publisher_id
            )));
        }
        tables.publishers.remove(&publisher_id);
        Ok(())
    }

    async fn list_books(&self) -> PortResult<Vec<Book>> {
        Ok(self.tables.lock().await.books.values().cloned().collect())
    }

    async fn get_book(&self, book_id: EntityId) -> PortResult<Book> {
        self.tables.lock().await.book(book_id)
    }

    async fn delete_book(&self, book_id: EntityId) -> PortResult<()> {
        let mut guard = self.tables.lock().await;
        let tables = &mut *guard;
        if tables.books.remove(&book_id).is_none() {
            return Err(PortError::NotFound(format!("Book {} not found", book_id)));
        }
        for row in tables.authors.values_mut().chain(tables.publishers.values_mut()) {
            row.book_ids.retain(|id| *id != book_id);
        }
        Ok(())
    }

    async fn begin_catalog_unit(&self) -> PortResult<Box<dyn CatalogUnit>> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryUnit { guard, working }))
    }
}

//=========================================================================================
// `CatalogUnit` Implementation
//=========================================================================================

struct MemoryUnit {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl CatalogUnit for MemoryUnit {
    async fn insert_book(&mut self, book: &NewBook) -> PortResult<Book> {
        let id = self.working.next_id();
        let now = Utc::now();
        let row = Book {
            id,
            title: book.title.clone(),
            author_id: book.author_id,
            publisher_id: book.publisher_id,
            created_at: now,
            updated_at: now,
        };
        self.working.books.insert(id, row.clone());
        Ok(row)
    }

    async fn find_book(&mut self, book_id: EntityId) -> PortResult<Book> {
        self.working.book(book_id)
    }

    async fn save_book(&mut self, book: &Book) -> PortResult<Book> {
        let row = self
            .working
            .books
            .get_mut(&book.id)
            .ok_or_else(|| PortError::NotFound(format!("Book {} not found", book.id)))?;
        row.title = book.title.clone();
        row.author_id = book.author_id;
        row.publisher_id = book.publisher_id;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn find_publisher(&mut self, publisher_id: EntityId) -> PortResult<Publisher> {
        self.working.publisher(publisher_id)
    }

    async fn save_publisher(&mut self, publisher: &Publisher) -> PortResult<()> {
        let row = self
            .working
            .publishers
            .get_mut(&publisher.id)
            .ok_or_else(|| PortError::NotFound(format!("Publisher {} not found", publisher.id)))?;
        row.name = publisher.name.clone();
        row.book_ids = link_ids(&publisher.books);
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn find_author(&mut self, author_id: EntityId) -> PortResult<Author> {
        self.working.author(author_id)
    }

    async fn save_author(&mut self, author: &Author) -> PortResult<()> {
        let row = self
            .working
            .authors
            .get_mut(&author.id)
            .ok_or_else(|| PortError::NotFound(format!("Author {} not found", author.id)))?;
        row.name = author.name.clone();
        row.book_ids = link_ids(&author.books);
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn commit(self: Box<Self>) -> PortResult<()> {
        let MemoryUnit { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
