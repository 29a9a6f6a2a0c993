//! In-memory storage implementation of the library store.
//!
//! Records live in three `HashMap`s keyed by id. One async-aware read-write lock
//! covers all three maps, because lending and returning touch books and loans in
//! the same critical section.

use std::{cmp::Reverse, collections::HashMap, sync::Arc};

use async_trait::async_trait;
use mea::rwlock::RwLock;

use shelfstore_core::{
    error::{StoreError, StoreResult},
    model::{Book, Loan, LoanWithBook, Record, User, new_id, timestamp},
    query::BookQuery,
    store::{LibraryStore, StoreBuilder},
};

type Table<R> = HashMap<String, R>;

#[derive(Debug, Default)]
struct Tables {
    books: Table<Book>,
    loans: Table<Loan>,
    users: Table<User>,
}

impl Tables {
    fn isbn_taken(&self, isbn: &str, except: Option<&str>) -> bool {
        self.books
            .values()
            .any(|b| b.isbn == isbn && Some(b.id.as_str()) != except)
    }

    fn username_taken(&self, username: &str, except: Option<&str>) -> bool {
        self.users
            .values()
            .any(|u| u.username == username && Some(u.id.as_str()) != except)
    }

    fn join<'a>(&self, loans: impl Iterator<Item = &'a Loan>) -> Vec<LoanWithBook> {
        newest_first(loans.cloned().collect())
            .into_iter()
            .map(|loan| {
                let book = self.books.get(&loan.book_id).cloned();
                LoanWithBook::resolve(loan, book)
            })
            .collect()
    }
}

fn fetch<R: Record>(table: &Table<R>, id: &str) -> StoreResult<R> {
    table.get(id).cloned().ok_or_else(|| {
        tracing::debug!(kind = R::KIND, id, "record not found");
        R::not_found(id)
    })
}

fn by_title(mut books: Vec<Book>) -> Vec<Book> {
    books.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
    books
}

fn newest_first(mut loans: Vec<Loan>) -> Vec<Loan> {
    loans.sort_by_key(|l| (Reverse(l.loan_date), l.id.clone()));
    loans
}

/// Thread-safe in-memory library store.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, so clones
/// share the same records. Reads take the shared lock and run concurrently; every
/// mutation takes the exclusive lock for the whole check-and-update, and any
/// failure is detected before the first change is applied.
///
/// Searches scan every book. ISBN and username uniqueness are checked with a scan as
/// well, which keeps behaviour identical to the SQLite backend's table constraints.
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder
    }
}

#[async_trait]
impl LibraryStore for InMemoryStore {
    async fn create_book(&self, mut book: Book) -> StoreResult<Book> {
        let mut tables = self.tables.write().await;

        if tables.isbn_taken(&book.isbn, None) {
            return Err(StoreError::IsbnAlreadyExists(book.isbn));
        }

        let now = timestamp();
        book.id = new_id();
        book.created_at = now;
        book.updated_at = now;
        book.available = true;

        tables.books.insert(book.id.clone(), book.clone());
        tracing::debug!(book_id = %book.id, title = %book.title, "created book");

        Ok(book)
    }

    async fn get_books(&self) -> StoreResult<Vec<Book>> {
        let tables = self.tables.read().await;

        Ok(by_title(tables.books.values().cloned().collect()))
    }

    async fn get_book_by_id(&self, id: &str) -> StoreResult<Book> {
        fetch(&self.tables.read().await.books, id)
    }

    async fn update_book(&self, id: &str, mut book: Book) -> StoreResult<Book> {
        let mut tables = self.tables.write().await;
        let existing = fetch(&tables.books, id)?;

        if tables.isbn_taken(&book.isbn, Some(id)) {
            return Err(StoreError::IsbnAlreadyExists(book.isbn));
        }

        book.id = existing.id;
        book.created_at = existing.created_at;
        book.updated_at = timestamp();

        tables.books.insert(book.id.clone(), book.clone());
        tracing::debug!(book_id = %book.id, "updated book");

        Ok(book)
    }

    async fn update_book_availability(&self, id: &str, available: bool) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let book = tables
            .books
            .get_mut(id)
            .ok_or_else(|| Book::not_found(id))?;

        book.available = available;
        book.updated_at = timestamp();
        tracing::debug!(book_id = %id, available, "overrode book availability");

        Ok(())
    }

    async fn delete_book(&self, id: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;

        if tables.books.remove(id).is_none() {
            return Err(Book::not_found(id));
        }

        tracing::debug!(book_id = %id, "deleted book");

        Ok(())
    }

    async fn search_books(&self, query: BookQuery) -> StoreResult<Vec<Book>> {
        let tables = self.tables.read().await;

        Ok(by_title(
            tables
                .books
                .values()
                .filter(|book| query.matches(book))
                .cloned()
                .collect(),
        ))
    }

    async fn create_loan(&self, mut loan: Loan) -> StoreResult<Loan> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;

        let book = tables
            .books
            .get_mut(&loan.book_id)
            .ok_or_else(|| Book::not_found(&loan.book_id))?;

        if !book.available {
            return Err(StoreError::BookNotAvailable(loan.book_id));
        }

        let now = timestamp();
        book.available = false;
        book.updated_at = now;

        loan.id = new_id();
        loan.loan_date = now;
        loan.return_date = None;
        loan.returned = false;

        tables.loans.insert(loan.id.clone(), loan.clone());
        tracing::debug!(loan_id = %loan.id, book_id = %loan.book_id, user = %loan.user, "created loan");

        Ok(loan)
    }

    async fn return_book(&self, loan_id: &str) -> StoreResult<()> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;

        let loan = tables
            .loans
            .get_mut(loan_id)
            .ok_or_else(|| Loan::not_found(loan_id))?;

        if loan.returned {
            return Ok(());
        }

        let now = timestamp();
        loan.returned = true;
        loan.return_date = Some(now);

        match tables.books.get_mut(&loan.book_id) {
            Some(book) => {
                book.available = true;
                book.updated_at = now;
            }
            None => tracing::debug!(loan_id, book_id = %loan.book_id, "returned loan of a deleted book"),
        }

        tracing::debug!(loan_id, "returned loan");

        Ok(())
    }

    async fn get_loans(&self) -> StoreResult<Vec<Loan>> {
        let tables = self.tables.read().await;

        Ok(newest_first(tables.loans.values().cloned().collect()))
    }

    async fn get_active_loans(&self) -> StoreResult<Vec<Loan>> {
        let tables = self.tables.read().await;

        Ok(newest_first(
            tables
                .loans
                .values()
                .filter(|l| l.is_active())
                .cloned()
                .collect(),
        ))
    }

    async fn get_loan_by_id(&self, id: &str) -> StoreResult<Loan> {
        fetch(&self.tables.read().await.loans, id)
    }

    async fn get_loans_with_books(&self) -> StoreResult<Vec<LoanWithBook>> {
        let tables = self.tables.read().await;

        Ok(tables.join(tables.loans.values()))
    }

    async fn get_active_loans_with_books(&self) -> StoreResult<Vec<LoanWithBook>> {
        let tables = self.tables.read().await;

        Ok(tables.join(tables.loans.values().filter(|l| l.is_active())))
    }

    async fn create_user(&self, mut user: User) -> StoreResult<User> {
        let mut tables = self.tables.write().await;

        if tables.username_taken(&user.username, None) {
            return Err(StoreError::UserAlreadyExists(user.username));
        }

        if user.id.is_empty() {
            user.id = new_id();
        } else if tables.users.contains_key(&user.id) {
            return Err(StoreError::Backend(format!("user id {} is already in use", user.id)));
        }

        if user.role.is_empty() {
            user.role = User::DEFAULT_ROLE.to_string();
        }

        let now = timestamp();
        user.created_at = now;
        user.updated_at = now;

        tables.users.insert(user.id.clone(), user.clone());
        tracing::debug!(user_id = %user.id, username = %user.username, "created user");

        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> StoreResult<User> {
        self.tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or_else(|| User::not_found(username))
    }

    async fn get_user_by_id(&self, id: &str) -> StoreResult<User> {
        fetch(&self.tables.read().await.users, id)
    }

    async fn update_user(&self, id: &str, mut user: User) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        let existing = fetch(&tables.users, id)?;

        if tables.username_taken(&user.username, Some(id)) {
            return Err(StoreError::UserAlreadyExists(user.username));
        }

        if user.role.is_empty() {
            user.role = User::DEFAULT_ROLE.to_string();
        }

        user.id = existing.id;
        user.created_at = existing.created_at;
        user.updated_at = timestamp();

        tables.users.insert(user.id.clone(), user.clone());
        tracing::debug!(user_id = %user.id, "updated user");

        Ok(user)
    }

    async fn delete_user(&self, id: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;

        if tables.users.remove(id).is_none() {
            return Err(User::not_found(id));
        }

        tracing::debug!(user_id = %id, "deleted user");

        Ok(())
    }

    async fn count_users(&self) -> StoreResult<usize> {
        Ok(self.tables.read().await.users.len())
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
#[derive(Debug, Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBuilder for InMemoryStoreBuilder {
    type Store = InMemoryStore;

    /// Builds and returns a new, empty [`InMemoryStore`].
    async fn build(self) -> StoreResult<Self::Store> {
        Ok(InMemoryStore::new())
    }
}
