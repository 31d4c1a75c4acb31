//! crates/bookstore_core/src/catalog.rs
//!
//! Keeps the book collections of authors and publishers consistent with the
//! book rows themselves.
//!
//! Every write that touches a book and one of its parents runs inside a single
//! [`CatalogUnit`]. If any step fails the unit is dropped uncommitted, so a book
//! never exists without being reachable from both of its parents.

use tracing::debug;

use crate::domain::{Book, BookChanges, EntityId, NewBook};
use crate::ports::{CatalogUnit, DatabaseService, PortError, PortResult};

/// Appends `book` to its publisher's collection, then to its author's.
///
/// The publisher is resolved first; when it is missing the author is never
/// looked up.
pub async fn attach_book_to_parents(unit: &mut dyn CatalogUnit, book: &Book) -> PortResult<()> {
    let mut publisher = unit.find_publisher(book.publisher_id).await?;
    publisher.books.push(book.clone());
    unit.save_publisher(&publisher).await?;
    debug!(book_id = book.id, publisher_id = publisher.id, "linked book to publisher");

    let mut author = unit.find_author(book.author_id).await?;
    author.books.push(book.clone());
    unit.save_author(&author).await?;
    debug!(book_id = book.id, author_id = author.id, "linked book to author");

    Ok(())
}

/// Creates a book and links it to both parents in one unit of work.
pub async fn create_book(db: &dyn DatabaseService, new_book: &NewBook) -> PortResult<Book> {
    new_book.validate()?;
    insert_linked_book(db.begin_catalog_unit().await?, new_book).await
}

/// Inserts the book row, attaches it and commits. Any failure drops `unit`
/// without committing.
pub async fn insert_linked_book(
    mut unit: Box<dyn CatalogUnit>,
    new_book: &NewBook,
) -> PortResult<Book> {
    let book = unit.insert_book(new_book).await?;
    attach_book_to_parents(unit.as_mut(), &book).await?;
    unit.commit().await?;
    Ok(book)
}

/// Applies a partial update to a book, moving it between parent collections
/// when its author or publisher changes.
pub async fn update_book(
    db: &dyn DatabaseService,
    book_id: EntityId,
    changes: &BookChanges,
) -> PortResult<Book> {
    if changes.is_empty() {
        return Err(PortError::Validation(
            "at least one of title, author_id or publisher_id is required".to_string(),
        ));
    }
    changes.validate()?;
    apply_book_changes(db.begin_catalog_unit().await?, book_id, changes).await
}

pub async fn apply_book_changes(
    mut unit: Box<dyn CatalogUnit>,
    book_id: EntityId,
    changes: &BookChanges,
) -> PortResult<Book> {
    let current = unit.find_book(book_id).await?;

    let mut updated = current.clone();
    if let Some(title) = &changes.title {
        updated.title = title.clone();
    }
    if let Some(publisher_id) = changes.publisher_id {
        updated.publisher_id = publisher_id;
    }
    if let Some(author_id) = changes.author_id {
        updated.author_id = author_id;
    }

    // Same ordering as creation: the new publisher is checked before the new author.
    if updated.publisher_id != current.publisher_id {
        move_between_publishers(unit.as_mut(), &updated, current.publisher_id).await?;
    }
    if updated.author_id != current.author_id {
        move_between_authors(unit.as_mut(), &updated, current.author_id).await?;
    }

    let saved = unit.save_book(&updated).await?;
    unit.commit().await?;
    Ok(saved)
}

async fn move_between_publishers(
    unit: &mut dyn CatalogUnit,
    book: &Book,
    previous_id: EntityId,
) -> PortResult<()> {
    // Both rows are locked in ascending id order so opposite moves cannot deadlock.
    let (mut target, mut previous) = if book.publisher_id < previous_id {
        let target = unit.find_publisher(book.publisher_id).await?;
        (target, unit.find_publisher(previous_id).await?)
    } else {
        let previous = unit.find_publisher(previous_id).await?;
        (unit.find_publisher(book.publisher_id).await?, previous)
    };

    previous.books.retain(|b| b.id != book.id);
    unit.save_publisher(&previous).await?;

    target.books.push(book.clone());
    unit.save_publisher(&target).await
}

async fn move_between_authors(
    unit: &mut dyn CatalogUnit,
    book: &Book,
    previous_id: EntityId,
) -> PortResult<()> {
    let (mut target, mut previous) = if book.author_id < previous_id {
        let target = unit.find_author(book.author_id).await?;
        (target, unit.find_author(previous_id).await?)
    } else {
        let previous = unit.find_author(previous_id).await?;
        (unit.find_author(book.author_id).await?, previous)
    };

    previous.books.retain(|b| b.id != book.id);
    unit.save_author(&previous).await?;

    target.books.push(book.clone());
    unit.save_author(&target).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Author, Publisher};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct FakeState {
        calls: Vec<String>,
        books: HashMap<EntityId, Book>,
        authors: HashMap<EntityId, Author>,
        publishers: HashMap<EntityId, Publisher>,
        committed: bool,
        next_id: EntityId,
    }

    /// Records every call; writes go straight into the shared state, and
    /// `committed` tells the test whether the unit finished.
    struct FakeUnit(Arc<Mutex<FakeState>>);

    impl FakeUnit {
        fn log(&self, call: impl Into<String>) {
            self.0.lock().unwrap().calls.push(call.into());
        }
    }

    #[async_trait]
    impl CatalogUnit for FakeUnit {
        async fn insert_book(&mut self, book: &NewBook) -> PortResult<Book> {
            self.log("insert_book");
            let mut state = self.0.lock().unwrap();
            state.next_id += 1;
            let now = Utc::now();
            let row = Book {
                id: state.next_id,
                title: book.title.clone(),
                author_id: book.author_id,
                publisher_id: book.publisher_id,
                created_at: now,
                updated_at: now,
            };
            state.books.insert(row.id, row.clone());
            Ok(row)
        }

        async fn find_book(&mut self, book_id: EntityId) -> PortResult<Book> {
            self.log(format!("find_book:{book_id}"));
            self.0
                .lock()
                .unwrap()
                .books
                .get(&book_id)
                .cloned()
                .ok_or_else(|| PortError::NotFound(format!("Book {book_id} not found")))
        }

        async fn save_book(&mut self, book: &Book) -> PortResult<Book> {
            self.log(format!("save_book:{}", book.id));
            self.0.lock().unwrap().books.insert(book.id, book.clone());
            Ok(book.clone())
        }

        async fn find_publisher(&mut self, publisher_id: EntityId) -> PortResult<Publisher> {
            self.log(format!("find_publisher:{publisher_id}"));
            self.0
                .lock()
                .unwrap()
                .publishers
                .get(&publisher_id)
                .cloned()
                .ok_or_else(|| PortError::NotFound(format!("Publisher {publisher_id} not found")))
        }

        async fn save_publisher(&mut self, publisher: &Publisher) -> PortResult<()> {
            self.log(format!("save_publisher:{}", publisher.id));
            self.0
                .lock()
                .unwrap()
                .publishers
                .insert(publisher.id, publisher.clone());
            Ok(())
        }

        async fn find_author(&mut self, author_id: EntityId) -> PortResult<Author> {
            self.log(format!("find_author:{author_id}"));
            self.0
                .lock()
                .unwrap()
                .authors
                .get(&author_id)
                .cloned()
                .ok_or_else(|| PortError::NotFound(format!("Author {author_id} not found")))
        }

        async fn save_author(&mut self, author: &Author) -> PortResult<()> {
            self.log(format!("save_author:{}", author.id));
            self.0.lock().unwrap().authors.insert(author.id, author.clone());
            Ok(())
        }

        async fn commit(self: Box<Self>) -> PortResult<()> {
            self.log("commit");
            self.0.lock().unwrap().committed = true;
            Ok(())
        }
    }

    fn seeded(author_ids: &[EntityId], publisher_ids: &[EntityId]) -> Arc<Mutex<FakeState>> {
        let now = Utc::now();
        let mut state = FakeState {
            next_id: 100,
            ..Default::default()
        };
        for &id in author_ids {
            state.authors.insert(
                id,
                Author {
                    id,
                    name: format!("Author {id}"),
                    books: Vec::new(),
                    created_at: now,
                    updated_at: now,
                },
            );
        }
        for &id in publisher_ids {
            state.publishers.insert(
                id,
                Publisher {
                    id,
                    name: format!("Publisher {id}"),
                    books: Vec::new(),
                    created_at: now,
                    updated_at: now,
                },
            );
        }
        Arc::new(Mutex::new(state))
    }

    fn new_book(author_id: EntityId, publisher_id: EntityId) -> NewBook {
        NewBook {
            title: "The Left Hand of Darkness".to_string(),
            author_id,
            publisher_id,
        }
    }

    #[tokio::test]
    async fn linked_book_is_reachable_from_both_parents() {
        let state = seeded(&[1], &[7]);
        let book = insert_linked_book(Box::new(FakeUnit(state.clone())), &new_book(1, 7))
            .await
            .unwrap();

        let state = state.lock().unwrap();
        assert!(state.committed);
        assert_eq!(state.publishers[&7].books, vec![book.clone()]);
        assert_eq!(state.authors[&1].books, vec![book]);
        assert_eq!(
            state.calls,
            vec![
                "insert_book",
                "find_publisher:7",
                "save_publisher:7",
                "find_author:1",
                "save_author:1",
                "commit",
            ]
        );
    }

    #[tokio::test]
    async fn missing_publisher_stops_before_author_lookup() {
        let state = seeded(&[1], &[]);
        let err = insert_linked_book(Box::new(FakeUnit(state.clone())), &new_book(1, 7))
            .await
            .unwrap_err();

        assert!(matches!(err, PortError::NotFound(_)));
        let state = state.lock().unwrap();
        assert!(!state.committed);
        assert_eq!(state.calls, vec!["insert_book", "find_publisher:7"]);
    }

    #[tokio::test]
    async fn missing_author_leaves_unit_uncommitted() {
        let state = seeded(&[], &[7]);
        let err = insert_linked_book(Box::new(FakeUnit(state.clone())), &new_book(1, 7))
            .await
            .unwrap_err();

        assert!(matches!(err, PortError::NotFound(_)));
        let state = state.lock().unwrap();
        assert!(!state.committed);
        assert_eq!(state.calls.last().map(String::as_str), Some("find_author:1"));
    }

    #[tokio::test]
    async fn moving_a_book_relinks_both_collections() {
        let state = seeded(&[1, 2], &[7, 8]);
        let book = insert_linked_book(Box::new(FakeUnit(state.clone())), &new_book(1, 7))
            .await
            .unwrap();

        let changes = BookChanges {
            title: Some("A Wizard of Earthsea".to_string()),
            author_id: Some(2),
            publisher_id: Some(8),
        };
        let moved = apply_book_changes(Box::new(FakeUnit(state.clone())), book.id, &changes)
            .await
            .unwrap();

        assert_eq!(moved.title, "A Wizard of Earthsea");
        let state = state.lock().unwrap();
        assert!(state.publishers[&7].books.is_empty());
        assert!(state.authors[&1].books.is_empty());
        assert_eq!(state.publishers[&8].books, vec![moved.clone()]);
        assert_eq!(state.authors[&2].books, vec![moved]);
    }

    #[tokio::test]
    async fn parents_are_locked_in_ascending_id_order() {
        let state = seeded(&[1, 2], &[7, 8]);
        let down = insert_linked_book(Box::new(FakeUnit(state.clone())), &new_book(2, 8))
            .await
            .unwrap();
        let up = insert_linked_book(Box::new(FakeUnit(state.clone())), &new_book(1, 7))
            .await
            .unwrap();
        state.lock().unwrap().calls.clear();

        let to_lower = BookChanges {
            author_id: Some(1),
            publisher_id: Some(7),
            ..Default::default()
        };
        apply_book_changes(Box::new(FakeUnit(state.clone())), down.id, &to_lower)
            .await
            .unwrap();
        let to_higher = BookChanges {
            author_id: Some(2),
            publisher_id: Some(8),
            ..Default::default()
        };
        apply_book_changes(Box::new(FakeUnit(state.clone())), up.id, &to_higher)
            .await
            .unwrap();

        let state = state.lock().unwrap();
        let lookups: Vec<&str> = state
            .calls
            .iter()
            .map(String::as_str)
            .filter(|c| c.starts_with("find_publisher") || c.starts_with("find_author"))
            .collect();
        assert_eq!(
            lookups,
            vec![
                "find_publisher:7",
                "find_publisher:8",
                "find_author:1",
                "find_author:2",
                "find_publisher:7",
                "find_publisher:8",
                "find_author:1",
                "find_author:2",
            ]
        );
        assert_eq!(state.authors[&1].books.len(), 1);
        assert_eq!(state.authors[&1].books[0].id, down.id);
        assert_eq!(state.publishers[&8].books[0].id, up.id);
    }

    #[tokio::test]
    async fn missing_lower_target_fails_before_any_save() {
        let state = seeded(&[1], &[7]);
        let book = insert_linked_book(Box::new(FakeUnit(state.clone())), &new_book(1, 7))
            .await
            .unwrap();
        state.lock().unwrap().calls.clear();

        let changes = BookChanges {
            publisher_id: Some(3),
            ..Default::default()
        };
        let err = apply_book_changes(Box::new(FakeUnit(state.clone())), book.id, &changes)
            .await
            .unwrap_err();

        assert!(matches!(err, PortError::NotFound(_)));
        let state = state.lock().unwrap();
        assert_eq!(
            state.calls,
            vec![format!("find_book:{}", book.id), "find_publisher:3".to_string()]
        );
    }

    #[tokio::test]
    async fn title_only_change_does_not_touch_parents() {
        let state = seeded(&[1], &[7]);
        let book = insert_linked_book(Box::new(FakeUnit(state.clone())), &new_book(1, 7))
            .await
            .unwrap();
        state.lock().unwrap().calls.clear();

        let changes = BookChanges {
            title: Some("Always Coming Home".to_string()),
            ..Default::default()
        };
        apply_book_changes(Box::new(FakeUnit(state.clone())), book.id, &changes)
            .await
            .unwrap();

        let state = state.lock().unwrap();
        assert_eq!(
            state.calls,
            vec![format!("find_book:{}", book.id), format!("save_book:{}", book.id), "commit".to_string()]
        );
    }

    #[tokio::test]
    async fn moving_to_unknown_publisher_fails() {
        let state = seeded(&[1], &[7]);
        let book = insert_linked_book(Box::new(FakeUnit(state.clone())), &new_book(1, 7))
            .await
            .unwrap();
        state.lock().unwrap().committed = false;

        let changes = BookChanges {
            publisher_id: Some(99),
            ..Default::default()
        };
        let err = apply_book_changes(Box::new(FakeUnit(state.clone())), book.id, &changes)
            .await
            .unwrap_err();

        assert!(matches!(err, PortError::NotFound(_)));
        assert!(!state.lock().unwrap().committed);
    }
}
