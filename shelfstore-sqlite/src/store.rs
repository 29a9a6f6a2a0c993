//! SQLite storage implementation of the library store.

use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    QueryBuilder, Sqlite, SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};

use shelfstore_core::{
    error::{StoreError, StoreResult},
    model::{Book, Loan, LoanWithBook, Record, User, new_id, timestamp},
    query::BookQuery,
    store::{LibraryStore, StoreBuilder},
};

use crate::{
    rows::{
        BOOK_COLUMNS, BookRow, LOAN_COLUMNS, LOAN_WITH_BOOK_SELECT, LoanRow, LoanWithBookRow,
        USER_COLUMNS, UserRow,
    },
    schema,
};

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// Returns `true` when `err` is a `UNIQUE` violation on `column` (`table.column`).
fn violates_unique(err: &sqlx::Error, column: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation() && db.message().contains(column),
        _ => false,
    }
}

/// Persistent library store backed by a SQLite connection pool.
///
/// Lending and returning each run in a single transaction whose first statement is
/// the conditional write (`... WHERE available = TRUE`, `... WHERE returned = FALSE`).
/// The availability check and the state change are therefore one atomic step, and
/// the write lock is taken up front instead of being upgraded from a read. Any early
/// return drops the transaction, which rolls it back.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wraps an existing pool. The schema is expected to be in place.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn builder(url: &str) -> SqliteStoreBuilder {
        SqliteStoreBuilder::new(url)
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch_loans(&self, active_only: bool) -> StoreResult<Vec<Loan>> {
        let filter = if active_only { "WHERE returned = FALSE" } else { "" };

        Ok(
            sqlx::query_as::<_, LoanRow>(&format!(
                "SELECT {LOAN_COLUMNS} FROM loans {filter} ORDER BY loan_date DESC, id"
            ))
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?
            .into_iter()
            .map(Loan::from)
            .collect()
        )
    }

    async fn fetch_loans_with_books(&self, active_only: bool) -> StoreResult<Vec<LoanWithBook>> {
        let filter = if active_only { "WHERE l.returned = FALSE" } else { "" };

        Ok(
            sqlx::query_as::<_, LoanWithBookRow>(&format!(
                "{LOAN_WITH_BOOK_SELECT} {filter} ORDER BY l.loan_date DESC, l.id"
            ))
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?
            .into_iter()
            .map(LoanWithBook::from)
            .collect()
        )
    }
}

#[async_trait]
impl LibraryStore for SqliteStore {
    async fn create_book(&self, mut book: Book) -> StoreResult<Book> {
        let now = timestamp();
        book.id = new_id();
        book.created_at = now;
        book.updated_at = now;
        book.available = true;

        sqlx::query(&format!(
            "INSERT INTO books ({BOOK_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(book.published)
        .bind(&book.genre)
        .bind(&book.description)
        .bind(book.available)
        .bind(book.created_at)
        .bind(book.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match violates_unique(&e, "books.isbn") {
            true => StoreError::IsbnAlreadyExists(book.isbn.clone()),
            false => backend(e),
        })?;

        tracing::debug!(book_id = %book.id, title = %book.title, "created book");

        Ok(book)
    }

    async fn get_books(&self) -> StoreResult<Vec<Book>> {
        Ok(
            sqlx::query_as::<_, BookRow>(&format!(
                "SELECT {BOOK_COLUMNS} FROM books ORDER BY title, id"
            ))
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?
            .into_iter()
            .map(Book::from)
            .collect()
        )
    }

    async fn get_book_by_id(&self, id: &str) -> StoreResult<Book> {
        sqlx::query_as::<_, BookRow>(&format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .map(Book::from)
            .ok_or_else(|| Book::not_found(id))
    }

    async fn update_book(&self, id: &str, mut book: Book) -> StoreResult<Book> {
        book.id = id.to_string();
        book.updated_at = timestamp();

        let created_at: DateTime<Utc> = sqlx::query_scalar(
            r#"
            UPDATE books
            SET title = ?, author = ?, isbn = ?, published = ?, genre = ?,
                description = ?, available = ?, updated_at = ?
            WHERE id = ?
            RETURNING created_at
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(book.published)
        .bind(&book.genre)
        .bind(&book.description)
        .bind(book.available)
        .bind(book.updated_at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match violates_unique(&e, "books.isbn") {
            true => StoreError::IsbnAlreadyExists(book.isbn.clone()),
            false => backend(e),
        })?
        .ok_or_else(|| Book::not_found(id))?;

        book.created_at = created_at;
        tracing::debug!(book_id = %book.id, "updated book");

        Ok(book)
    }

    async fn update_book_availability(&self, id: &str, available: bool) -> StoreResult<()> {
        let result = sqlx::query("UPDATE books SET available = ?, updated_at = ? WHERE id = ?")
            .bind(available)
            .bind(timestamp())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(Book::not_found(id));
        }

        tracing::debug!(book_id = %id, available, "overrode book availability");

        Ok(())
    }

    async fn delete_book(&self, id: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(Book::not_found(id));
        }

        tracing::debug!(book_id = %id, "deleted book");

        Ok(())
    }

    async fn search_books(&self, query: BookQuery) -> StoreResult<Vec<Book>> {
        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("SELECT {BOOK_COLUMNS} FROM books"));

        if let Some(available) = query.available {
            builder.push(" WHERE available = ").push_bind(available);
        }

        builder.push(" ORDER BY title, id");

        // SQLite's LIKE only folds ASCII case, so text filters run on the decoded rows.
        Ok(
            builder
                .build_query_as::<BookRow>()
                .fetch_all(&self.pool)
                .await
                .map_err(backend)?
                .into_iter()
                .map(Book::from)
                .filter(|book| query.matches(book))
                .collect()
        )
    }

    async fn create_loan(&self, mut loan: Loan) -> StoreResult<Loan> {
        let now = timestamp();
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let flipped = sqlx::query(
            "UPDATE books SET available = FALSE, updated_at = ? WHERE id = ? AND available = TRUE",
        )
        .bind(now)
        .bind(&loan.book_id)
        .execute(&mut *tx)
        .await
        .map_err(backend)?
        .rows_affected();

        if flipped == 0 {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM books WHERE id = ?)")
                .bind(&loan.book_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(backend)?;

            return Err(match exists {
                true => StoreError::BookNotAvailable(loan.book_id),
                false => Book::not_found(loan.book_id),
            });
        }

        loan.id = new_id();
        loan.loan_date = now;
        loan.return_date = None;
        loan.returned = false;

        sqlx::query(&format!("INSERT INTO loans ({LOAN_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?)"))
            .bind(&loan.id)
            .bind(&loan.book_id)
            .bind(&loan.user)
            .bind(loan.loan_date)
            .bind(loan.return_date)
            .bind(loan.returned)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        tx.commit().await.map_err(backend)?;
        tracing::debug!(loan_id = %loan.id, book_id = %loan.book_id, user = %loan.user, "created loan");

        Ok(loan)
    }

    async fn return_book(&self, loan_id: &str) -> StoreResult<()> {
        let now = timestamp();
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let book_id: Option<String> = sqlx::query_scalar(
            r#"
            UPDATE loans SET returned = TRUE, return_date = ?
            WHERE id = ? AND returned = FALSE
            RETURNING book_id
            "#,
        )
        .bind(now)
        .bind(loan_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend)?;

        let Some(book_id) = book_id else {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM loans WHERE id = ?)")
                .bind(loan_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(backend)?;

            // Already returned is a no-op.
            return match exists {
                true => Ok(()),
                false => Err(Loan::not_found(loan_id)),
            };
        };

        let restored = sqlx::query("UPDATE books SET available = TRUE, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(&book_id)
            .execute(&mut *tx)
            .await
            .map_err(backend)?
            .rows_affected();

        tx.commit().await.map_err(backend)?;

        if restored == 0 {
            tracing::debug!(loan_id, %book_id, "returned loan of a deleted book");
        }
        tracing::debug!(loan_id, "returned loan");

        Ok(())
    }

    async fn get_loans(&self) -> StoreResult<Vec<Loan>> {
        self.fetch_loans(false).await
    }

    async fn get_active_loans(&self) -> StoreResult<Vec<Loan>> {
        self.fetch_loans(true).await
    }

    async fn get_loan_by_id(&self, id: &str) -> StoreResult<Loan> {
        sqlx::query_as::<_, LoanRow>(&format!("SELECT {LOAN_COLUMNS} FROM loans WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .map(Loan::from)
            .ok_or_else(|| Loan::not_found(id))
    }

    async fn get_loans_with_books(&self) -> StoreResult<Vec<LoanWithBook>> {
        self.fetch_loans_with_books(false).await
    }

    async fn get_active_loans_with_books(&self) -> StoreResult<Vec<LoanWithBook>> {
        self.fetch_loans_with_books(true).await
    }

    async fn create_user(&self, mut user: User) -> StoreResult<User> {
        if user.id.is_empty() {
            user.id = new_id();
        }
        if user.role.is_empty() {
            user.role = User::DEFAULT_ROLE.to_string();
        }

        let now = timestamp();
        user.created_at = now;
        user.updated_at = now;

        // The UNIQUE constraint arbitrates concurrent registrations of one username.
        sqlx::query(&format!("INSERT INTO users ({USER_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?)"))
            .bind(&user.id)
            .bind(&user.username)
            .bind(&user.password)
            .bind(&user.role)
            .bind(user.created_at)
            .bind(user.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| match violates_unique(&e, "users.username") {
                true => StoreError::UserAlreadyExists(user.username.clone()),
                false => backend(e),
            })?;

        tracing::debug!(user_id = %user.id, username = %user.username, "created user");

        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> StoreResult<User> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ? LIMIT 1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .map(User::from)
        .ok_or_else(|| User::not_found(username))
    }

    async fn get_user_by_id(&self, id: &str) -> StoreResult<User> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .map(User::from)
            .ok_or_else(|| User::not_found(id))
    }

    async fn update_user(&self, id: &str, mut user: User) -> StoreResult<User> {
        if user.role.is_empty() {
            user.role = User::DEFAULT_ROLE.to_string();
        }
        user.id = id.to_string();
        user.updated_at = timestamp();

        let created_at: DateTime<Utc> = sqlx::query_scalar(
            r#"
            UPDATE users SET username = ?, password = ?, role = ?, updated_at = ?
            WHERE id = ?
            RETURNING created_at
            "#,
        )
        .bind(&user.username)
        .bind(&user.password)
        .bind(&user.role)
        .bind(user.updated_at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match violates_unique(&e, "users.username") {
            true => StoreError::UserAlreadyExists(user.username.clone()),
            false => backend(e),
        })?
        .ok_or_else(|| User::not_found(id))?;

        user.created_at = created_at;
        tracing::debug!(user_id = %user.id, "updated user");

        Ok(user)
    }

    async fn delete_user(&self, id: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(User::not_found(id));
        }

        tracing::debug!(user_id = %id, "deleted user");

        Ok(())
    }

    async fn count_users(&self) -> StoreResult<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;

        Ok(count as usize)
    }

    async fn shutdown(self) -> StoreResult<()> {
        self.pool.close().await;

        Ok(())
    }
}

/// Builder for [`SqliteStore`].
///
/// `sqlite::memory:` URLs get a single long-lived connection, since every SQLite
/// connection would otherwise see its own empty database.
#[derive(Debug, Clone)]
pub struct SqliteStoreBuilder {
    url: String,
    max_connections: u32,
    create_if_missing: bool,
    busy_timeout: Duration,
}

impl SqliteStoreBuilder {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            max_connections: 5,
            create_if_missing: true,
            busy_timeout: Duration::from_secs(5),
        }
    }

    /// Builder for a private in-memory database.
    pub fn in_memory() -> Self {
        Self::new("sqlite::memory:")
    }

    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    pub fn create_if_missing(mut self, create_if_missing: bool) -> Self {
        self.create_if_missing = create_if_missing;
        self
    }

    /// How long a connection waits for another writer before failing.
    pub fn busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    fn is_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

#[async_trait]
impl StoreBuilder for SqliteStoreBuilder {
    type Store = SqliteStore;

    async fn build(self) -> StoreResult<Self::Store> {
        let options = SqliteConnectOptions::from_str(&self.url)
            .map_err(|e| StoreError::Initialization(format!("invalid database url {}: {e}", self.url)))?
            .create_if_missing(self.create_if_missing)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(self.busy_timeout)
            // Deleting a book must leave its loan history in place.
            .foreign_keys(false);

        let pool_options = match self.is_memory() {
            true => SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None),
            false => SqlitePoolOptions::new().max_connections(self.max_connections),
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Initialization(format!("connecting to {}: {e}", self.url)))?;

        schema::apply(&pool).await?;
        tracing::info!(url = %self.url, "opened sqlite store");

        Ok(SqliteStore::new(pool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;

    async fn memory_store() -> SqliteStore {
        SqliteStoreBuilder::in_memory().build().await.unwrap()
    }

    fn temp_db_url() -> (String, std::path::PathBuf) {
        let path = std::env::temp_dir().join(format!("shelfstore-{}.db", uuid::Uuid::new_v4()));
        (format!("sqlite://{}", path.display()), path)
    }

    fn cleanup(path: &std::path::Path) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let store = memory_store().await;

        schema::apply(store.pool()).await.unwrap();
        schema::apply(store.pool()).await.unwrap();
    }

    #[tokio::test]
    async fn test_round_trip_preserves_every_field() {
        let store = memory_store().await;

        let book = store
            .create_book(
                Book::new("Cien años de soledad", "Gabriel García Márquez", "978-0307474728")
                    .published(1967)
                    .genre("Realismo mágico")
                    .description("La familia Buendía en Macondo."),
            )
            .await
            .unwrap();

        assert_eq!(store.get_book_by_id(&book.id).await.unwrap(), book);
    }

    #[tokio::test]
    async fn test_search_orders_by_title_and_folds_unicode_case() {
        let store = memory_store().await;
        for (title, isbn) in [("Zebra 100%", "1"), ("Apple 100 percent", "2"), ("Mango", "3")] {
            store.create_book(Book::new(title, "Someone", isbn)).await.unwrap();
        }

        let all = store.search_books(BookQuery::new()).await.unwrap();
        let titles: Vec<_> = all.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["Apple 100 percent", "Mango", "Zebra 100%"]);

        let literal = store
            .search_books(BookQuery::builder().title("100%").build())
            .await
            .unwrap();
        assert_eq!(literal.len(), 1);
        assert_eq!(literal[0].title, "Zebra 100%");

        store
            .create_book(Book::new("Cien años de soledad", "Gabriel García Márquez", "4").genre("Realismo mágico"))
            .await
            .unwrap();
        let accented = store
            .search_books(BookQuery::builder().title("AÑOS").genre("MÁGICO").build())
            .await
            .unwrap();
        assert_eq!(accented.len(), 1);
        assert_eq!(accented[0].isbn, "4");
    }

    #[tokio::test]
    async fn test_failed_loan_leaves_no_row() {
        let store = memory_store().await;
        let book = store.create_book(Book::new("1984", "George Orwell", "978-0451524935")).await.unwrap();
        store.create_loan(Loan::new(&book.id, "alice")).await.unwrap();

        let err = store.create_loan(Loan::new(&book.id, "bob")).await.unwrap_err();
        assert_eq!(err, StoreError::BookNotAvailable(book.id.clone()));

        let err = store.create_loan(Loan::new("missing", "bob")).await.unwrap_err();
        assert_eq!(err, StoreError::BookNotFound("missing".to_string()));

        assert_eq!(store.get_loans().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_deleted_book_shows_placeholder_in_history() {
        let store = memory_store().await;
        let book = store.create_book(Book::new("1984", "George Orwell", "978-0451524935")).await.unwrap();
        let loan = store.create_loan(Loan::new(&book.id, "alice")).await.unwrap();

        store.delete_book(&book.id).await.unwrap();

        let active = store.get_active_loans_with_books().await.unwrap();
        assert_eq!(active.len(), 1);
        assert!(active[0].book_deleted());
        assert_eq!(active[0].book.created_at, loan.loan_date);

        store.return_book(&loan.id).await.unwrap();
        assert!(store.get_active_loans_with_books().await.unwrap().is_empty());
        assert!(store.get_loan_by_id(&loan.id).await.unwrap().returned);
    }

    #[tokio::test]
    async fn test_duplicate_username_maps_to_typed_error() {
        let store = memory_store().await;
        store.create_user(User::new("alice", "hash", "user")).await.unwrap();

        let err = store.create_user(User::new("alice", "hash", "user")).await.unwrap_err();

        assert_eq!(err, StoreError::UserAlreadyExists("alice".to_string()));
        assert_eq!(store.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_data_survives_reopen() {
        let (url, path) = temp_db_url();

        let store = SqliteStore::builder(&url).build().await.unwrap();
        let book = store.create_book(Book::new("1984", "George Orwell", "978-0451524935")).await.unwrap();
        let loan = store.create_loan(Loan::new(&book.id, "alice")).await.unwrap();
        store.shutdown().await.unwrap();

        let reopened = SqliteStore::builder(&url).build().await.unwrap();
        assert!(!reopened.get_book_by_id(&book.id).await.unwrap().available);
        assert_eq!(reopened.get_loan_by_id(&loan.id).await.unwrap(), loan);
        reopened.shutdown().await.unwrap();

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_concurrent_borrowers_across_connections() {
        let (url, path) = temp_db_url();
        let store = SqliteStore::builder(&url)
            .max_connections(4)
            .busy_timeout(Duration::from_secs(30))
            .build()
            .await
            .unwrap();
        let book = store.create_book(Book::new("1984", "George Orwell", "978-0451524935")).await.unwrap();

        let attempts = (0..16).map(|i| {
            let store = store.clone();
            let book_id = book.id.clone();
            tokio::spawn(async move { store.create_loan(Loan::new(book_id, format!("reader-{i}"))).await })
        });

        let results: Vec<_> = join_all(attempts)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, StoreError::BookNotAvailable(_))));
        assert_eq!(store.get_active_loans().await.unwrap().len(), 1);

        store.shutdown().await.unwrap();
        cleanup(&path);
    }
}
