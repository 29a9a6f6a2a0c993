//! The store contract implemented by every backend.
//!
//! [`LibraryStore`] is the only boundary between callers and storage. Callers obtain
//! one implementation at startup and share it between all request handlers; the store
//! is the sole synchronization point, so callers never lock anything themselves.
//!
//! # Invariants
//!
//! Every implementation upholds the following, whatever the interleaving of calls:
//!
//! - A book's `available` flag is `false` exactly when some loan references it with
//!   `returned == false`. Only [`create_loan`](LibraryStore::create_loan) and
//!   [`return_book`](LibraryStore::return_book) move a book between the two states
//!   ([`update_book`](LibraryStore::update_book) and
//!   [`update_book_availability`](LibraryStore::update_book_availability) are an
//!   administrative override outside the loan protocol).
//! - At most one unreturned loan references a given book.
//! - A composite operation either applies completely or not at all.
//! - Lookups of missing records return the matching `*NotFound` error, never a
//!   default value.
//! - Returned records are independent copies of the stored state.

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;

use crate::{
    error::StoreResult,
    model::{Book, Loan, LoanWithBook, User},
    query::BookQuery,
};

/// Abstract interface for library record storage.
///
/// All mutating operations take the caller's draft by value. Fields the store owns
/// (ids, timestamps, computed flags) are overwritten silently.
#[async_trait]
pub trait LibraryStore: Send + Sync + Debug {
    /// Stores a new book.
    ///
    /// Assigns a fresh id, stamps `created_at` and `updated_at` and forces
    /// `available = true` regardless of the draft.
    ///
    /// # Errors
    ///
    /// [`StoreError::IsbnAlreadyExists`](crate::error::StoreError::IsbnAlreadyExists)
    /// when another book already carries the draft's ISBN.
    async fn create_book(&self, book: Book) -> StoreResult<Book>;

    /// Returns every book.
    async fn get_books(&self) -> StoreResult<Vec<Book>>;

    /// Returns the book with the given id, or `BookNotFound`.
    async fn get_book_by_id(&self, id: &str) -> StoreResult<Book>;

    /// Replaces the mutable fields of a book with those of `book`.
    ///
    /// The stored id and `created_at` are kept whatever the draft carries, and
    /// `updated_at` is stamped. The store performs a full replace: interpreting
    /// blank fields as "no change" is the caller's job.
    async fn update_book(&self, id: &str, book: Book) -> StoreResult<Book>;

    /// Sets the availability flag directly, outside the loan protocol.
    async fn update_book_availability(&self, id: &str, available: bool) -> StoreResult<()>;

    /// Deletes a book. Loans referencing it are kept.
    async fn delete_book(&self, id: &str) -> StoreResult<()>;

    /// Returns the books matching every filter set in `query`.
    async fn search_books(&self, query: BookQuery) -> StoreResult<Vec<Book>>;

    /// Lends a book.
    ///
    /// Atomically checks that the referenced book exists and is available, marks it
    /// unavailable and records the loan with a fresh id and `loan_date`.
    ///
    /// # Errors
    ///
    /// `BookNotFound` when the book does not exist, `BookNotAvailable` when it is
    /// already on loan. Neither leaves any trace in the store.
    async fn create_loan(&self, loan: Loan) -> StoreResult<Loan>;

    /// Marks a loan as returned and the book as available again.
    ///
    /// Returning an already returned loan succeeds without changing anything. A loan
    /// whose book has since been deleted is still returned.
    ///
    /// # Errors
    ///
    /// `LoanNotFound` when no loan has the given id.
    async fn return_book(&self, loan_id: &str) -> StoreResult<()>;

    /// Returns every loan, newest first.
    async fn get_loans(&self) -> StoreResult<Vec<Loan>>;

    /// Returns the loans that have not been returned, newest first.
    async fn get_active_loans(&self) -> StoreResult<Vec<Loan>>;

    /// Returns the loan with the given id, or `LoanNotFound`.
    async fn get_loan_by_id(&self, id: &str) -> StoreResult<Loan>;

    /// Returns every loan joined with its book, newest first.
    async fn get_loans_with_books(&self) -> StoreResult<Vec<LoanWithBook>>;

    /// Returns the unreturned loans joined with their books, newest first.
    async fn get_active_loans_with_books(&self) -> StoreResult<Vec<LoanWithBook>>;

    /// Stores a new user.
    ///
    /// Keeps the draft's id when one is set and generates one otherwise. An empty
    /// role becomes [`User::DEFAULT_ROLE`].
    ///
    /// # Errors
    ///
    /// `UserAlreadyExists` when the username is taken.
    async fn create_user(&self, user: User) -> StoreResult<User>;

    /// Returns the user with the given username, or `UserNotFound`.
    async fn get_user_by_username(&self, username: &str) -> StoreResult<User>;

    /// Returns the user with the given id, or `UserNotFound`.
    async fn get_user_by_id(&self, id: &str) -> StoreResult<User>;

    /// Replaces username, password and role of a user, keeping id and `created_at`.
    ///
    /// # Errors
    ///
    /// `UserNotFound` for an unknown id, `UserAlreadyExists` when renaming onto a
    /// username held by another user.
    async fn update_user(&self, id: &str, user: User) -> StoreResult<User>;

    /// Deletes a user, or returns `UserNotFound`.
    async fn delete_user(&self, id: &str) -> StoreResult<()>;

    /// Returns the number of stored users.
    async fn count_users(&self) -> StoreResult<usize>;

    /// Releases backend resources. The default implementation does nothing.
    async fn shutdown(self) -> StoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Factory trait for creating store instances.
#[async_trait]
pub trait StoreBuilder: Send {
    /// The store produced by this builder.
    type Store: LibraryStore;

    /// Builds the store, connecting and preparing storage as needed.
    async fn build(self) -> StoreResult<Self::Store>;
}

macro_rules! forward_library_store {
    ($wrapper:ty) => {
        #[async_trait]
        impl<S> LibraryStore for $wrapper
        where
            S: LibraryStore + ?Sized,
        {
            async fn create_book(&self, book: Book) -> StoreResult<Book> {
                (**self).create_book(book).await
            }

            async fn get_books(&self) -> StoreResult<Vec<Book>> {
                (**self).get_books().await
            }

            async fn get_book_by_id(&self, id: &str) -> StoreResult<Book> {
                (**self).get_book_by_id(id).await
            }

            async fn update_book(&self, id: &str, book: Book) -> StoreResult<Book> {
                (**self).update_book(id, book).await
            }

            async fn update_book_availability(&self, id: &str, available: bool) -> StoreResult<()> {
                (**self).update_book_availability(id, available).await
            }

            async fn delete_book(&self, id: &str) -> StoreResult<()> {
                (**self).delete_book(id).await
            }

            async fn search_books(&self, query: BookQuery) -> StoreResult<Vec<Book>> {
                (**self).search_books(query).await
            }

            async fn create_loan(&self, loan: Loan) -> StoreResult<Loan> {
                (**self).create_loan(loan).await
            }

            async fn return_book(&self, loan_id: &str) -> StoreResult<()> {
                (**self).return_book(loan_id).await
            }

            async fn get_loans(&self) -> StoreResult<Vec<Loan>> {
                (**self).get_loans().await
            }

            async fn get_active_loans(&self) -> StoreResult<Vec<Loan>> {
                (**self).get_active_loans().await
            }

            async fn get_loan_by_id(&self, id: &str) -> StoreResult<Loan> {
                (**self).get_loan_by_id(id).await
            }

            async fn get_loans_with_books(&self) -> StoreResult<Vec<LoanWithBook>> {
                (**self).get_loans_with_books().await
            }

            async fn get_active_loans_with_books(&self) -> StoreResult<Vec<LoanWithBook>> {
                (**self).get_active_loans_with_books().await
            }

            async fn create_user(&self, user: User) -> StoreResult<User> {
                (**self).create_user(user).await
            }

            async fn get_user_by_username(&self, username: &str) -> StoreResult<User> {
                (**self).get_user_by_username(username).await
            }

            async fn get_user_by_id(&self, id: &str) -> StoreResult<User> {
                (**self).get_user_by_id(id).await
            }

            async fn update_user(&self, id: &str, user: User) -> StoreResult<User> {
                (**self).update_user(id, user).await
            }

            async fn delete_user(&self, id: &str) -> StoreResult<()> {
                (**self).delete_user(id).await
            }

            async fn count_users(&self) -> StoreResult<usize> {
                (**self).count_users().await
            }
        }
    };
}

forward_library_store!(&S);
forward_library_store!(Arc<S>);
