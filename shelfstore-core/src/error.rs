//! Error types and result types for store operations.
//!
//! Every backend reports the same conditions through [`StoreError`], so callers can map
//! each variant to an outward response without knowing which backend is in use.

use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a library store.
///
/// The record-level variants (`*NotFound`, `BookNotAvailable`, `*AlreadyExists`) describe
/// conditions the caller caused. `Initialization` and `Backend` describe infrastructure
/// failures and should be reported as internal errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No book exists with the given id.
    #[error("Book not found: {0}")]
    BookNotFound(String),
    /// No loan exists with the given id.
    #[error("Loan not found: {0}")]
    LoanNotFound(String),
    /// No user exists with the given id or username.
    #[error("User not found: {0}")]
    UserNotFound(String),
    /// The book is currently on loan.
    #[error("Book not available: {0}")]
    BookNotAvailable(String),
    /// A user with the given username already exists.
    #[error("User already exists: {0}")]
    UserAlreadyExists(String),
    /// A book with the given ISBN already exists.
    #[error("ISBN already exists: {0}")]
    IsbnAlreadyExists(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns `true` for the variants meaning "no such record".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::BookNotFound(_) | StoreError::LoanNotFound(_) | StoreError::UserNotFound(_)
        )
    }

    /// Returns `true` when the failure was caused by the request rather than by the backend.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, StoreError::Initialization(_) | StoreError::Backend(_))
    }
}

/// A specialized `Result` type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
