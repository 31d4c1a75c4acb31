//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! Book collections live in the `author_books` and `publisher_books` link tables,
//! ordered by their `position` column. Catalog units run in a transaction and
//! lock every parent row they read with `FOR UPDATE`.

use async_trait::async_trait;
use bookstore_core::domain::{Author, Book, EntityId, NewBook, Publisher, User, UserCredentials};
use bookstore_core::ports::{CatalogUnit, DatabaseService, PortError, PortResult};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgExecutor, PgPool, Postgres, Transaction};
use std::collections::HashMap;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

const BOOK_COLUMNS: &str = "id, title, author_id, publisher_id, created_at, updated_at";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: i64,
    username: String,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            username: self.username,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: i64,
    username: String,
    password_hash: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            id: self.id,
            username: self.username,
            hashed_password: self.password_hash,
        }
    }
}

#[derive(FromRow)]
struct BookRecord {
    id: i64,
    title: String,
    author_id: i64,
    publisher_id: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl BookRecord {
    fn to_domain(self) -> Book {
        Book {
            id: self.id,
            title: self.title,
            author_id: self.author_id,
            publisher_id: self.publisher_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// A book row joined through a link table, tagged with the owning parent.
#[derive(FromRow)]
struct LinkedBookRecord {
    parent_id: i64,
    #[sqlx(flatten)]
    book: BookRecord,
}

/// Authors and publishers share one row shape.
#[derive(FromRow)]
struct ParentRecord {
    id: i64,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ParentRecord {
    fn to_author(self, books: Vec<Book>) -> Author {
        Author {
            id: self.id,
            name: self.name,
            books,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn to_publisher(self, books: Vec<Book>) -> Publisher {
        Publisher {
            id: self.id,
            name: self.name,
            books,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

//=========================================================================================
// Shared Query Helpers
//=========================================================================================

#[derive(Clone, Copy)]
enum Parent {
    Author,
    Publisher,
}

impl Parent {
    fn table(self) -> &'static str {
        match self {
            Parent::Author => "authors",
            Parent::Publisher => "publishers",
        }
    }

    fn link_table(self) -> &'static str {
        match self {
            Parent::Author => "author_books",
            Parent::Publisher => "publisher_books",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Parent::Author => "author_id",
            Parent::Publisher => "publisher_id",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Parent::Author => "Author",
            Parent::Publisher => "Publisher",
        }
    }

    fn not_found(self, id: EntityId) -> PortError {
        PortError::NotFound(format!("{} {} not found", self.label(), id))
    }
}

fn violates(e: &sqlx::Error, code: &str) -> bool {
    match e {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(code),
        _ => false,
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

async fn fetch_parent<'e, E>(
    executor: E,
    parent: Parent,
    id: EntityId,
    lock: bool,
) -> PortResult<ParentRecord>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "SELECT id, name, created_at, updated_at FROM {} WHERE id = $1{}",
        parent.table(),
        if lock { " FOR UPDATE" } else { "" }
    );
    sqlx::query_as::<_, ParentRecord>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| parent.not_found(id))
}

async fn fetch_linked_books<'e, E>(executor: E, parent: Parent, id: EntityId) -> PortResult<Vec<Book>>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "SELECT b.id, b.title, b.author_id, b.publisher_id, b.created_at, b.updated_at \
         FROM {link} l JOIN books b ON b.id = l.book_id \
         WHERE l.{key} = $1 ORDER BY l.position",
        link = parent.link_table(),
        key = parent.key(),
    );
    let records = sqlx::query_as::<_, BookRecord>(&sql)
        .bind(id)
        .fetch_all(executor)
        .await
        .map_err(unexpected)?;
    Ok(records.into_iter().map(BookRecord::to_domain).collect())
}

impl DbAdapter {
    async fn get_parent(&self, parent: Parent, id: EntityId) -> PortResult<(ParentRecord, Vec<Book>)> {
        let record = fetch_parent(&self.pool, parent, id, false).await?;
        let books = fetch_linked_books(&self.pool, parent, id).await?;
        Ok((record, books))
    }

    async fn list_parents(&self, parent: Parent) -> PortResult<Vec<(ParentRecord, Vec<Book>)>> {
        let sql = format!(
            "SELECT id, name, created_at, updated_at FROM {} ORDER BY id",
            parent.table()
        );
        let records = sqlx::query_as::<_, ParentRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        let sql = format!(
            "SELECT l.{key} AS parent_id, b.id, b.title, b.author_id, b.publisher_id, \
             b.created_at, b.updated_at \
             FROM {link} l JOIN books b ON b.id = l.book_id ORDER BY l.position",
            link = parent.link_table(),
            key = parent.key(),
        );
        let links = sqlx::query_as::<_, LinkedBookRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        let mut grouped: HashMap<i64, Vec<Book>> = HashMap::new();
        for link in links {
            grouped
                .entry(link.parent_id)
                .or_default()
                .push(link.book.to_domain());
        }

        Ok(records
            .into_iter()
            .map(|r| {
                let books = grouped.remove(&r.id).unwrap_or_default();
                (r, books)
            })
            .collect())
    }

    async fn create_parent(&self, parent: Parent, name: &str) -> PortResult<ParentRecord> {
        let sql = format!(
            "INSERT INTO {} (name) VALUES ($1) RETURNING id, name, created_at, updated_at",
            parent.table()
        );
        sqlx::query_as::<_, ParentRecord>(&sql)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if violates(&e, UNIQUE_VIOLATION) {
                    PortError::Conflict(format!("{} name is already taken", parent.label()))
                } else {
                    unexpected(e)
                }
            })
    }

    async fn rename_parent(&self, parent: Parent, id: EntityId, name: &str) -> PortResult<(ParentRecord, Vec<Book>)> {
        let sql = format!(
            "UPDATE {} SET name = $2, updated_at = now() WHERE id = $1 \
             RETURNING id, name, created_at, updated_at",
            parent.table()
        );
        let record = sqlx::query_as::<_, ParentRecord>(&sql)
            .bind(id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                if violates(&e, UNIQUE_VIOLATION) {
                    PortError::Conflict(format!("{} name is already taken", parent.label()))
                } else {
                    unexpected(e)
                }
            })?
            .ok_or_else(|| parent.not_found(id))?;
        let books = fetch_linked_books(&self.pool, parent, id).await?;
        Ok((record, books))
    }

    async fn delete_parent(&self, parent: Parent, id: EntityId) -> PortResult<()> {
        let sql = format!("DELETE FROM {} WHERE id = $1", parent.table());
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if violates(&e, FOREIGN_KEY_VIOLATION) {
                    PortError::Conflict(format!("{} {} still has books", parent.label(), id))
                } else {
                    unexpected(e)
                }
            })?;
        if result.rows_affected() == 0 {
            return Err(parent.not_found(id));
        }
        Ok(())
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user(&self, username: &str, hashed_password: &str) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (username, password_hash) VALUES ($1, $2) \
             RETURNING id, username, created_at",
        )
        .bind(username)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if violates(&e, UNIQUE_VIOLATION) {
                PortError::Conflict("Username is already taken".to_string())
            } else {
                unexpected(e)
            }
        })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_username(&self, username: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, username, password_hash FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("User {} not found", username)))?;
        Ok(record.to_domain())
    }

    async fn list_authors(&self) -> PortResult<Vec<Author>> {
        let rows = self.list_parents(Parent::Author).await?;
        Ok(rows.into_iter().map(|(r, books)| r.to_author(books)).collect())
    }

    async fn get_author(&self, author_id: EntityId) -> PortResult<Author> {
        let (record, books) = self.get_parent(Parent::Author, author_id).await?;
        Ok(record.to_author(books))
    }

    async fn create_author(&self, name: &str) -> PortResult<Author> {
        let record = self.create_parent(Parent::Author, name).await?;
        Ok(record.to_author(Vec::new()))
    }

    async fn update_author(&self, author_id: EntityId, name: &str) -> PortResult<Author> {
        let (record, books) = self.rename_parent(Parent::Author, author_id, name).await?;
        Ok(record.to_author(books))
    }

    async fn delete_author(&self, author_id: EntityId) -> PortResult<()> {
        self.delete_parent(Parent::Author, author_id).await
    }

    async fn list_publishers(&self) -> PortResult<Vec<Publisher>> {
        let rows = self.list_parents(Parent::Publisher).await?;
        Ok(rows.into_iter().map(|(r, books)| r.to_publisher(books)).collect())
    }

    async fn get_publisher(&self, publisher_id: EntityId) -> PortResult<Publisher> {
        let (record, books) = self.get_parent(Parent::Publisher, publisher_id).await?;
        Ok(record.to_publisher(books))
    }

    async fn create_publisher(&self, name: &str) -> PortResult<Publisher> {
        let record = self.create_parent(Parent::Publisher, name).await?;
        Ok(record.to_publisher(Vec::new()))
    }

    async fn update_publisher(&self, publisher_id: EntityId, name: &str) -> PortResult<Publisher> {
        let (record, books) = self.rename_parent(Parent::Publisher, publisher_id, name).await?;
        Ok(record.to_publisher(books))
    }

    async fn delete_publisher(&self, publisher_id: EntityId) -> PortResult<()> {
        self.delete_parent(Parent::Publisher, publisher_id).await
    }

    async fn list_books(&self) -> PortResult<Vec<Book>> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM books ORDER BY id");
        let records = sqlx::query_as::<_, BookRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(BookRecord::to_domain).collect())
    }

    async fn get_book(&self, book_id: EntityId) -> PortResult<Book> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = $1");
        let record = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(book_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Book {} not found", book_id)))?;
        Ok(record.to_domain())
    }

    async fn delete_book(&self, book_id: EntityId) -> PortResult<()> {
        // Link rows go with it through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(book_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Book {} not found", book_id)));
        }
        Ok(())
    }

    async fn begin_catalog_unit(&self) -> PortResult<Box<dyn CatalogUnit>> {
        let tx = self.pool.begin().await.map_err(unexpected)?;
        Ok(Box::new(PgCatalogUnit { tx }))
    }
}

//=========================================================================================
// `CatalogUnit` Implementation
//=========================================================================================

/// Rolls back on drop unless committed (sqlx `Transaction` semantics).
struct PgCatalogUnit {
    tx: Transaction<'static, Postgres>,
}

/// Makes the stored collection of `parent` equal to `book_ids`, keeping the
/// position of links that already exist.
async fn sync_links(
    conn: &mut PgConnection,
    parent: Parent,
    parent_id: EntityId,
    name: &str,
    book_ids: &[EntityId],
) -> PortResult<()> {
    let sql = format!(
        "UPDATE {} SET name = $2, updated_at = now() WHERE id = $1",
        parent.table()
    );
    let result = sqlx::query(&sql)
        .bind(parent_id)
        .bind(name)
        .execute(&mut *conn)
        .await
        .map_err(unexpected)?;
    if result.rows_affected() == 0 {
        return Err(parent.not_found(parent_id));
    }

    let sql = format!(
        "DELETE FROM {link} WHERE {key} = $1 AND NOT (book_id = ANY($2))",
        link = parent.link_table(),
        key = parent.key(),
    );
    sqlx::query(&sql)
        .bind(parent_id)
        .bind(book_ids)
        .execute(&mut *conn)
        .await
        .map_err(unexpected)?;

    let sql = format!(
        "INSERT INTO {link} ({key}, book_id) \
         SELECT $1, t.book_id FROM UNNEST($2::BIGINT[]) WITH ORDINALITY AS t(book_id, ord) \
         ORDER BY t.ord \
         ON CONFLICT ({key}, book_id) DO NOTHING",
        link = parent.link_table(),
        key = parent.key(),
    );
    sqlx::query(&sql)
        .bind(parent_id)
        .bind(book_ids)
        .execute(&mut *conn)
        .await
        .map_err(unexpected)?;
    Ok(())
}

fn collection_ids(books: &[Book]) -> Vec<EntityId> {
    let mut ids: Vec<EntityId> = Vec::with_capacity(books.len());
    for book in books {
        if !ids.contains(&book.id) {
            ids.push(book.id);
        }
    }
    ids
}

#[async_trait]
impl CatalogUnit for PgCatalogUnit {
    async fn insert_book(&mut self, book: &NewBook) -> PortResult<Book> {
        // The parent foreign keys are DEFERRABLE INITIALLY DEFERRED, so they are
        // checked at commit after the parents have been looked up and locked.
        let sql = format!(
            "INSERT INTO books (title, author_id, publisher_id) VALUES ($1, $2, $3) \
             RETURNING {BOOK_COLUMNS}"
        );
        let record = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(&book.title)
            .bind(book.author_id)
            .bind(book.publisher_id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn find_book(&mut self, book_id: EntityId) -> PortResult<Book> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = $1 FOR UPDATE");
        let record = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(book_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Book {} not found", book_id)))?;
        Ok(record.to_domain())
    }

    async fn save_book(&mut self, book: &Book) -> PortResult<Book> {
        let sql = format!(
            "UPDATE books SET title = $2, author_id = $3, publisher_id = $4, updated_at = now() \
             WHERE id = $1 RETURNING {BOOK_COLUMNS}"
        );
        let record = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(book.id)
            .bind(&book.title)
            .bind(book.author_id)
            .bind(book.publisher_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Book {} not found", book.id)))?;
        Ok(record.to_domain())
    }

    async fn find_publisher(&mut self, publisher_id: EntityId) -> PortResult<Publisher> {
        let record = fetch_parent(&mut *self.tx, Parent::Publisher, publisher_id, true).await?;
        let books = fetch_linked_books(&mut *self.tx, Parent::Publisher, publisher_id).await?;
        Ok(record.to_publisher(books))
    }

    async fn save_publisher(&mut self, publisher: &Publisher) -> PortResult<()> {
        let ids = collection_ids(&publisher.books);
        sync_links(&mut *self.tx, Parent::Publisher, publisher.id, &publisher.name, &ids).await
    }

    async fn find_author(&mut self, author_id: EntityId) -> PortResult<Author> {
        let record = fetch_parent(&mut *self.tx, Parent::Author, author_id, true).await?;
        let books = fetch_linked_books(&mut *self.tx, Parent::Author, author_id).await?;
        Ok(record.to_author(books))
    }

    async fn save_author(&mut self, author: &Author) -> PortResult<()> {
        let ids = collection_ids(&author.books);
        sync_links(&mut *self.tx, Parent::Author, author.id, &author.name, &ids).await
    }

    async fn commit(self: Box<Self>) -> PortResult<()> {
        self.tx.commit().await.map_err(|e| {
            if violates(&e, FOREIGN_KEY_VIOLATION) {
                PortError::Conflict("A referenced author or publisher no longer exists".to_string())
            } else {
                unexpected(e)
            }
        })
    }
}
