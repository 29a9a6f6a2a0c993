//! In-memory storage backend for shelfstore.
//!
//! This crate provides a thread-safe, in-memory implementation of the `LibraryStore`
//! trait. Books, loans and users live in three maps guarded together by one async-aware
//! read-write lock. It is meant for tests and ephemeral deployments: nothing survives
//! the process.
//!
//! # Quick Start
//!
//! ```ignore
//! use shelfstore_core::{model::{Book, Loan}, store::{LibraryStore, StoreBuilder}};
//! use shelfstore_memory::InMemoryStore;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = InMemoryStore::builder().build().await.unwrap();
//!
//!     let book = store
//!         .create_book(Book::new("1984", "George Orwell", "978-0451524935"))
//!         .await
//!         .unwrap();
//!
//!     store.create_loan(Loan::new(&book.id, "alice")).await.unwrap();
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as shelfstore_memory;

pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
