//! Runtime backend selection.
//!
//! [`AnyStore`] is a closed set of the available backends. It lets a service pick the
//! backend from configuration while keeping static dispatch at every call site.

use async_trait::async_trait;

use shelfstore_core::{
    error::{StoreError, StoreResult},
    model::{Book, Loan, LoanWithBook, User},
    query::BookQuery,
    store::{LibraryStore, StoreBuilder},
};
use shelfstore_memory::InMemoryStore;
#[cfg(feature = "sqlite")]
use shelfstore_sqlite::{SqliteStore, SqliteStoreBuilder};

use crate::config::{BackendKind, SqliteConfig, StorageConfig};

/// A store backed by one of the built-in backends.
#[derive(Debug, Clone)]
pub enum AnyStore {
    Memory(InMemoryStore),
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteStore),
}

macro_rules! dispatch {
    ($self:ident, $store:ident => $body:expr) => {
        match $self {
            AnyStore::Memory($store) => $body,
            #[cfg(feature = "sqlite")]
            AnyStore::Sqlite($store) => $body,
        }
    };
}

impl AnyStore {
    /// Opens the backend named by `config`.
    ///
    /// When the SQLite backend cannot be opened and `fallback_to_memory` is set, an
    /// empty in-memory store is returned instead and a warning is logged.
    pub async fn open(config: &StorageConfig) -> StoreResult<Self> {
        match config.backend {
            BackendKind::Memory => Self::open_memory().await,
            BackendKind::Sqlite => match Self::open_sqlite(&config.sqlite).await {
                Ok(store) => Ok(store),
                Err(err) if config.fallback_to_memory => {
                    tracing::warn!(error = %err, path = %config.sqlite.path, "sqlite store unavailable, falling back to memory");
                    Self::open_memory().await
                }
                Err(err) => Err(err),
            },
        }
    }

    async fn open_memory() -> StoreResult<Self> {
        let store = InMemoryStore::builder().build().await?;
        tracing::info!("opened in-memory store");

        Ok(Self::Memory(store))
    }

    #[cfg(feature = "sqlite")]
    async fn open_sqlite(config: &SqliteConfig) -> StoreResult<Self> {
        if let Some(dir) = config.parent_dir() {
            tokio::fs::create_dir_all(&dir).await.map_err(|e| {
                StoreError::Initialization(format!("creating {}: {e}", dir.display()))
            })?;
        }

        let builder = match config.is_memory() {
            true => SqliteStoreBuilder::in_memory(),
            false => SqliteStoreBuilder::new(&config.url()),
        };

        let store = builder
            .max_connections(config.max_connections)
            .busy_timeout(config.busy_timeout())
            .build()
            .await?;

        Ok(Self::Sqlite(store))
    }

    #[cfg(not(feature = "sqlite"))]
    async fn open_sqlite(_config: &SqliteConfig) -> StoreResult<Self> {
        Err(StoreError::Initialization(
            "built without the `sqlite` feature".to_string(),
        ))
    }

    /// The backend actually serving requests.
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Memory(_) => BackendKind::Memory,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(_) => BackendKind::Sqlite,
        }
    }
}

impl From<InMemoryStore> for AnyStore {
    fn from(store: InMemoryStore) -> Self {
        Self::Memory(store)
    }
}

#[cfg(feature = "sqlite")]
impl From<SqliteStore> for AnyStore {
    fn from(store: SqliteStore) -> Self {
        Self::Sqlite(store)
    }
}

#[async_trait]
impl LibraryStore for AnyStore {
    async fn create_book(&self, book: Book) -> StoreResult<Book> {
        dispatch!(self, store => store.create_book(book).await)
    }

    async fn get_books(&self) -> StoreResult<Vec<Book>> {
        dispatch!(self, store => store.get_books().await)
    }

    async fn get_book_by_id(&self, id: &str) -> StoreResult<Book> {
        dispatch!(self, store => store.get_book_by_id(id).await)
    }

    async fn update_book(&self, id: &str, book: Book) -> StoreResult<Book> {
        dispatch!(self, store => store.update_book(id, book).await)
    }

    async fn update_book_availability(&self, id: &str, available: bool) -> StoreResult<()> {
        dispatch!(self, store => store.update_book_availability(id, available).await)
    }

    async fn delete_book(&self, id: &str) -> StoreResult<()> {
        dispatch!(self, store => store.delete_book(id).await)
    }

    async fn search_books(&self, query: BookQuery) -> StoreResult<Vec<Book>> {
        dispatch!(self, store => store.search_books(query).await)
    }

    async fn create_loan(&self, loan: Loan) -> StoreResult<Loan> {
        dispatch!(self, store => store.create_loan(loan).await)
    }

    async fn return_book(&self, loan_id: &str) -> StoreResult<()> {
        dispatch!(self, store => store.return_book(loan_id).await)
    }

    async fn get_loans(&self) -> StoreResult<Vec<Loan>> {
        dispatch!(self, store => store.get_loans().await)
    }

    async fn get_active_loans(&self) -> StoreResult<Vec<Loan>> {
        dispatch!(self, store => store.get_active_loans().await)
    }

    async fn get_loan_by_id(&self, id: &str) -> StoreResult<Loan> {
        dispatch!(self, store => store.get_loan_by_id(id).await)
    }

    async fn get_loans_with_books(&self) -> StoreResult<Vec<LoanWithBook>> {
        dispatch!(self, store => store.get_loans_with_books().await)
    }

    async fn get_active_loans_with_books(&self) -> StoreResult<Vec<LoanWithBook>> {
        dispatch!(self, store => store.get_active_loans_with_books().await)
    }

    async fn create_user(&self, user: User) -> StoreResult<User> {
        dispatch!(self, store => store.create_user(user).await)
    }

    async fn get_user_by_username(&self, username: &str) -> StoreResult<User> {
        dispatch!(self, store => store.get_user_by_username(username).await)
    }

    async fn get_user_by_id(&self, id: &str) -> StoreResult<User> {
        dispatch!(self, store => store.get_user_by_id(id).await)
    }

    async fn update_user(&self, id: &str, user: User) -> StoreResult<User> {
        dispatch!(self, store => store.update_user(id, user).await)
    }

    async fn delete_user(&self, id: &str) -> StoreResult<()> {
        dispatch!(self, store => store.delete_user(id).await)
    }

    async fn count_users(&self) -> StoreResult<usize> {
        dispatch!(self, store => store.count_users().await)
    }

    async fn shutdown(self) -> StoreResult<()> {
        dispatch!(self, store => store.shutdown().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_is_opened_directly() {
        let store = AnyStore::open(&StorageConfig::memory()).await.unwrap();

        assert_eq!(store.kind(), BackendKind::Memory);
        assert!(store.get_books().await.unwrap().is_empty());
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_in_memory_sqlite_is_selected_by_path() {
        let config = StorageConfig {
            backend: BackendKind::Sqlite,
            sqlite: SqliteConfig {
                path: SqliteConfig::MEMORY_PATH.to_string(),
                ..Default::default()
            },
            fallback_to_memory: false,
        };

        let store = AnyStore::open(&config).await.unwrap();

        assert_eq!(store.kind(), BackendKind::Sqlite);
        store.create_book(Book::new("1984", "George Orwell", "978-0451524935")).await.unwrap();
        assert_eq!(store.get_books().await.unwrap().len(), 1);
    }

    fn unreachable_sqlite(fallback_to_memory: bool) -> StorageConfig {
        // A regular file used as the parent directory cannot hold a database.
        let blocker = std::env::temp_dir().join(format!("shelfstore-blocker-{}", uuid::Uuid::new_v4()));
        std::fs::write(&blocker, b"not a directory").unwrap();

        StorageConfig {
            backend: BackendKind::Sqlite,
            sqlite: SqliteConfig {
                path: blocker.join("library.db").display().to_string(),
                ..Default::default()
            },
            fallback_to_memory,
        }
    }

    #[tokio::test]
    async fn test_unopenable_sqlite_falls_back_to_memory() {
        let store = AnyStore::open(&unreachable_sqlite(true)).await.unwrap();

        assert_eq!(store.kind(), BackendKind::Memory);
    }

    #[tokio::test]
    async fn test_unopenable_sqlite_fails_without_fallback() {
        let err = AnyStore::open(&unreachable_sqlite(false)).await.unwrap_err();

        assert!(matches!(err, StoreError::Initialization(_)));
    }
}
