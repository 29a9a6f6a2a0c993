//! Many tasks racing over the same books through a shared store.

use std::{collections::HashSet, sync::Arc};

use futures::future::join_all;
use shelfstore::{
    config::{BackendKind, SqliteConfig, StorageConfig},
    prelude::*,
};

struct Fixture {
    store: AnyStore,
    path: Option<std::path::PathBuf>,
}

impl Fixture {
    async fn open(backend: BackendKind) -> Self {
        let path = match backend {
            BackendKind::Memory => None,
            BackendKind::Sqlite => Some(
                std::env::temp_dir().join(format!("shelfstore-race-{}.db", uuid::Uuid::new_v4())),
            ),
        };

        let config = StorageConfig {
            backend,
            sqlite: SqliteConfig {
                path: path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
                max_connections: 4,
                busy_timeout_secs: 30,
            },
            fallback_to_memory: false,
        };

        Self {
            store: AnyStore::open(&config).await.unwrap(),
            path,
        }
    }

    async fn close(self) {
        self.store.shutdown().await.unwrap();

        if let Some(path) = self.path {
            for suffix in ["", "-wal", "-shm"] {
                let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
            }
        }
    }
}

async fn exactly_one_borrower_wins(backend: BackendKind) {
    let fixture = Fixture::open(backend).await;
    let store = Arc::new(fixture.store.clone());
    let book = store
        .create_book(Book::new("1984", "George Orwell", "978-0451524935"))
        .await
        .unwrap();

    let attempts = (0..24).map(|i| {
        let store = Arc::clone(&store);
        let book_id = book.id.clone();
        tokio::spawn(async move { store.create_loan(Loan::new(book_id, format!("reader-{i}"))).await })
    });

    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err, &StoreError::BookNotAvailable(book.id.clone()));
    }
    assert_eq!(store.get_active_loans().await.unwrap().len(), 1);
    assert!(!store.get_book_by_id(&book.id).await.unwrap().available);

    drop(store);
    fixture.close().await;
}

async fn borrow_and_return_cycles_keep_invariant(backend: BackendKind) {
    let fixture = Fixture::open(backend).await;
    let store = Arc::new(fixture.store.clone());

    let mut book_ids = Vec::new();
    for i in 0..4 {
        let book = store
            .create_book(Book::new(format!("Volume {i}"), "Anonymous", format!("isbn-{i}")))
            .await
            .unwrap();
        book_ids.push(book.id);
    }

    let readers = (0..8).map(|reader| {
        let store = Arc::clone(&store);
        let book_ids = book_ids.clone();
        tokio::spawn(async move {
            for round in 0..10 {
                let book_id = &book_ids[(reader + round) % book_ids.len()];
                match store.create_loan(Loan::new(book_id, format!("reader-{reader}"))).await {
                    Ok(loan) => store.return_book(&loan.id).await.unwrap(),
                    Err(StoreError::BookNotAvailable(_)) => {}
                    Err(err) => panic!("unexpected error: {err}"),
                }
            }
        })
    });

    for joined in join_all(readers).await {
        joined.unwrap();
    }

    assert!(store.get_active_loans().await.unwrap().is_empty());
    for book in store.get_books().await.unwrap() {
        assert!(book.available, "{} still marked as lent", book.title);
    }

    let loan_ids: HashSet<_> = store
        .get_loans()
        .await
        .unwrap()
        .into_iter()
        .map(|loan| loan.id)
        .collect();
    assert!(!loan_ids.is_empty());

    drop(store);
    fixture.close().await;
}

async fn concurrent_registrations_keep_usernames_unique(backend: BackendKind) {
    let fixture = Fixture::open(backend).await;
    let store = Arc::new(fixture.store.clone());

    let registrations = (0..16).map(|i| {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.create_user(User::new("alice", format!("hash-{i}"), "")).await })
    });

    let results: Vec<_> = join_all(registrations)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(store.count_users().await.unwrap(), 1);

    drop(store);
    fixture.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_memory_exactly_one_borrower_wins() {
    exactly_one_borrower_wins(BackendKind::Memory).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_memory_borrow_and_return_cycles_keep_invariant() {
    borrow_and_return_cycles_keep_invariant(BackendKind::Memory).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_memory_concurrent_registrations_keep_usernames_unique() {
    concurrent_registrations_keep_usernames_unique(BackendKind::Memory).await;
}

#[cfg(feature = "sqlite")]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sqlite_exactly_one_borrower_wins() {
    exactly_one_borrower_wins(BackendKind::Sqlite).await;
}

#[cfg(feature = "sqlite")]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sqlite_borrow_and_return_cycles_keep_invariant() {
    borrow_and_return_cycles_keep_invariant(BackendKind::Sqlite).await;
}

#[cfg(feature = "sqlite")]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sqlite_concurrent_registrations_keep_usernames_unique() {
    concurrent_registrations_keep_usernames_unique(BackendKind::Sqlite).await;
}
