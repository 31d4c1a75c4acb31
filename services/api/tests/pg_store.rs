//! Catalog behaviour against the PostgreSQL adapter.
//!
//! Each test gets a fresh database with the embedded migrations applied.
//! Run with `DATABASE_URL` pointing at a server that allows creating databases:
//! `cargo test -p api --test pg_store -- --ignored`.

use api_lib::adapters::DbAdapter;
use bookstore_core::catalog;
use bookstore_core::domain::{BookChanges, NewBook};
use bookstore_core::ports::{DatabaseService, PortError};
use sqlx::PgPool;
use std::sync::Arc;

fn new_book(title: &str, author_id: i64, publisher_id: i64) -> NewBook {
    NewBook {
        title: title.to_string(),
        author_id,
        publisher_id,
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn missing_publisher_rolls_back_the_book(pool: PgPool) {
    let db = DbAdapter::new(pool.clone());
    let author = db.create_author("Octavia Butler").await.unwrap();

    let err = catalog::create_book(&db, &new_book("Kindred", author.id, 9_999))
        .await
        .unwrap_err();

    assert!(matches!(err, PortError::NotFound(_)));
    assert!(db.list_books().await.unwrap().is_empty());
    assert!(db.get_author(author.id).await.unwrap().books.is_empty());

    let (links,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM author_books")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(links, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn concurrent_creates_against_one_author_are_all_linked(pool: PgPool) {
    let db = Arc::new(DbAdapter::new(pool));
    let author = db.create_author("Busy Author").await.unwrap();
    let publisher = db.create_publisher("Busy Press").await.unwrap();

    let handles: Vec<_> = (0..8)
        .map(|n| {
            let db = db.clone();
            let book = new_book(&format!("Volume {n}"), author.id, publisher.id);
            tokio::spawn(async move { catalog::create_book(db.as_ref(), &book).await })
        })
        .collect();

    let mut created = Vec::new();
    for handle in handles {
        created.push(handle.await.unwrap().unwrap().id);
    }
    created.sort_unstable();

    let mut author_books: Vec<i64> = db
        .get_author(author.id)
        .await
        .unwrap()
        .books
        .iter()
        .map(|b| b.id)
        .collect();
    let mut publisher_books: Vec<i64> = db
        .get_publisher(publisher.id)
        .await
        .unwrap()
        .books
        .iter()
        .map(|b| b.id)
        .collect();
    author_books.sort_unstable();
    publisher_books.sort_unstable();
    assert_eq!(author_books, created);
    assert_eq!(publisher_books, created);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn moving_a_book_relinks_and_keeps_order(pool: PgPool) {
    let db = DbAdapter::new(pool);
    let first = db.create_author("First Author").await.unwrap();
    let second = db.create_author("Second Author").await.unwrap();
    let publisher = db.create_publisher("Tor Books").await.unwrap();

    let kept = catalog::create_book(&db, &new_book("Already There", second.id, publisher.id))
        .await
        .unwrap();
    let moved = catalog::create_book(&db, &new_book("On The Move", first.id, publisher.id))
        .await
        .unwrap();

    let changes = BookChanges {
        author_id: Some(second.id),
        ..Default::default()
    };
    let updated = catalog::update_book(&db, moved.id, &changes).await.unwrap();
    assert_eq!(updated.author_id, second.id);

    // The previous author's collection becomes empty.
    assert!(db.get_author(first.id).await.unwrap().books.is_empty());
    let ids: Vec<i64> = db
        .get_author(second.id)
        .await
        .unwrap()
        .books
        .iter()
        .map(|b| b.id)
        .collect();
    assert_eq!(ids, vec![kept.id, moved.id]);
    assert_eq!(db.get_book(moved.id).await.unwrap().author_id, second.id);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn opposite_moves_between_publishers_both_commit(pool: PgPool) {
    let db = Arc::new(DbAdapter::new(pool));
    let author = db.create_author("Shared Author").await.unwrap();
    let low = db.create_publisher("Low Press").await.unwrap();
    let high = db.create_publisher("High Press").await.unwrap();

    let mut handles = Vec::new();
    for round in 0..10 {
        let x = catalog::create_book(db.as_ref(), &new_book(&format!("X {round}"), author.id, low.id))
            .await
            .unwrap();
        let y = catalog::create_book(db.as_ref(), &new_book(&format!("Y {round}"), author.id, high.id))
            .await
            .unwrap();
        for (book_id, target) in [(x.id, high.id), (y.id, low.id)] {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                let changes = BookChanges {
                    publisher_id: Some(target),
                    ..Default::default()
                };
                catalog::update_book(db.as_ref(), book_id, &changes).await
            }));
        }
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(db.get_publisher(low.id).await.unwrap().books.len(), 10);
    assert_eq!(db.get_publisher(high.id).await.unwrap().books.len(), 10);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn parents_with_books_cannot_be_deleted(pool: PgPool) {
    let db = DbAdapter::new(pool);
    let author = db.create_author("Ursula Le Guin").await.unwrap();
    let publisher = db.create_publisher("Ace Books").await.unwrap();
    let book = catalog::create_book(&db, &new_book("The Dispossessed", author.id, publisher.id))
        .await
        .unwrap();

    assert!(matches!(
        db.delete_author(author.id).await,
        Err(PortError::Conflict(_))
    ));
    assert!(matches!(
        db.delete_publisher(publisher.id).await,
        Err(PortError::Conflict(_))
    ));
    assert_eq!(db.get_author(author.id).await.unwrap().books.len(), 1);

    db.delete_book(book.id).await.unwrap();
    assert!(db.get_publisher(publisher.id).await.unwrap().books.is_empty());
    db.delete_author(author.id).await.unwrap();
    db.delete_publisher(publisher.id).await.unwrap();
    assert!(matches!(
        db.get_author(author.id).await,
        Err(PortError::NotFound(_))
    ));
}
