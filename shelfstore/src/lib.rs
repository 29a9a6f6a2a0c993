//! Main shelfstore crate providing a unified interface for library record storage.
//!
//! This crate is the primary entry point for users of shelfstore. It re-exports the
//! core types from the sub-crates, picks a backend from configuration and carries the
//! startup chores of a library service: seeding sample data, creating the default
//! administrator and setting up logging.
//!
//! # Features
//!
//! - **One contract, two backends** - [`LibraryStore`](store::LibraryStore) is served by
//!   an in-memory store and a persistent SQLite store with identical observable behavior
//! - **Safe lending** - A book can never be lent twice, however many tasks race for it
//! - **Layered configuration** - Files, `SHELFSTORE_*` variables and legacy overrides
//! - **Structured logging** - Every mutation is traced with the ids it touched
//!
//! # Quick Start
//!
//! ```ignore
//! use shelfstore::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = InMemoryStore::builder().build().await.unwrap();
//!
//!     let book = store
//!         .create_book(Book::new("1984", "George Orwell", "978-0451524935").genre("Dystopia"))
//!         .await
//!         .unwrap();
//!
//!     let loan = store.create_loan(Loan::new(&book.id, "alice")).await.unwrap();
//!     assert!(!store.get_book_by_id(&book.id).await.unwrap().available);
//!
//!     store.return_book(&loan.id).await.unwrap();
//!     assert!(store.get_book_by_id(&book.id).await.unwrap().available);
//!
//!     let dystopias = store
//!         .search_books(BookQuery::builder().genre("dysto").available(true).build())
//!         .await
//!         .unwrap();
//!
//!     println!("Available dystopias: {:?}", dystopias);
//!
//!     store.shutdown().await.unwrap();
//! }
//! ```
//!
//! # Choosing a backend at runtime
//!
//! [`AnyStore`](backend::AnyStore) opens whichever backend the configuration names
//! and can fall back to memory when the database cannot be opened:
//!
//! ```ignore
//! use shelfstore::{backend::AnyStore, config::AppConfig, seed::seed_library};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load()?;
//!     let store = AnyStore::open(&config.storage).await?;
//!
//!     seed_library(&store, &config.seed).await?;
//!     store.shutdown().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - Fast in-memory storage for development and testing
//! - [`sqlite`] - Persistent SQLite backend (requires the `sqlite` feature, on by default)

pub mod backend;
pub mod config;
pub mod credentials;
pub mod prelude;
pub mod seed;
pub mod telemetry;

pub use shelfstore_core::{error, model, query, store};

/// In-memory storage backend implementations.
pub mod memory {
    pub use shelfstore_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// SQLite storage backend implementations.
///
/// This module is only available when the `sqlite` feature is enabled.
#[cfg(feature = "sqlite")]
pub mod sqlite {
    pub use shelfstore_sqlite::{SqliteStore, SqliteStoreBuilder};
}
