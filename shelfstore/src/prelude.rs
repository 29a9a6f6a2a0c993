//! Convenient re-exports of commonly used types from shelfstore.
//!
//! ```ignore
//! use shelfstore::prelude::*;
//! ```
//!
//! This provides access to the record types, the store contract and its builder
//! trait, book queries and the error types.

pub use shelfstore_core::{
    error::{StoreError, StoreResult},
    model::{Book, Loan, LoanWithBook, Record, User},
    query::{BookQuery, BookQueryBuilder},
    store::{LibraryStore, StoreBuilder},
};

pub use crate::backend::AnyStore;
