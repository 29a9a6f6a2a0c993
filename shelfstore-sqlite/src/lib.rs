//! SQLite backend implementation for shelfstore.
//!
//! This crate provides a persistent implementation of the `LibraryStore` trait on top
//! of a `sqlx` SQLite connection pool.
//!
//! # Features
//!
//! - **Durable storage** - Books, loans and users live in three indexed tables
//! - **Transactional lending** - Lending and returning each run in one transaction,
//!   so a book's availability and its loan rows never diverge, even across a crash
//! - **Constraint-backed uniqueness** - `UNIQUE` constraints on ISBN and username
//! - **Idempotent schema** - Tables and indexes are created on first connect
//!
//! # Example
//!
//! ```ignore
//! use shelfstore_core::store::StoreBuilder;
//! use shelfstore_sqlite::SqliteStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = SqliteStore::builder("sqlite://data/library.db")
//!         .max_connections(5)
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as shelfstore_sqlite;

pub mod rows;
pub mod schema;
pub mod store;

pub use store::{SqliteStore, SqliteStoreBuilder};
