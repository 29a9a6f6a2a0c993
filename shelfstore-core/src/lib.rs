//! Core types for the shelfstore library record store.
//!
//! This crate defines everything a backend has to agree on:
//!
//! - **Entity model** ([`model`]) - Books, loans and users, plus the joined loan history view
//! - **Store contract** ([`store`]) - The [`LibraryStore`](store::LibraryStore) trait every backend implements
//! - **Search queries** ([`query`]) - Field-matching filters for book searches
//! - **Error handling** ([`error`]) - The typed error vocabulary shared by all backends
//!
//! # Example
//!
//! ```ignore
//! use shelfstore_core::{model::{Book, Loan}, store::LibraryStore};
//!
//! async fn lend(store: &impl LibraryStore) -> shelfstore_core::error::StoreResult<()> {
//!     let book = store
//!         .create_book(Book::new("1984", "George Orwell", "978-0451524935"))
//!         .await?;
//!     let loan = store.create_loan(Loan::new(&book.id, "alice")).await?;
//!
//!     store.return_book(&loan.id).await
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as shelfstore_core;

pub mod error;
pub mod model;
pub mod query;
pub mod store;
