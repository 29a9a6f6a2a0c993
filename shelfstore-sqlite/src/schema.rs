//! Table layout of the SQLite backend.
//!
//! Columns mirror the JSON field names of the model. Every statement is idempotent,
//! so the schema is applied on each connect.

use sqlx::SqlitePool;

use shelfstore_core::error::{StoreError, StoreResult};

pub const CREATE_USERS: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    password TEXT NOT NULL,
    role TEXT NOT NULL DEFAULT 'user',
    created_at TIMESTAMP NOT NULL,
    updated_at TIMESTAMP NOT NULL
)
"#;

pub const CREATE_BOOKS: &str = r#"
CREATE TABLE IF NOT EXISTS books (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    author TEXT NOT NULL,
    isbn TEXT NOT NULL UNIQUE,
    published INTEGER NOT NULL DEFAULT 0,
    genre TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    available BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMP NOT NULL,
    updated_at TIMESTAMP NOT NULL
)
"#;

// No ON DELETE action: loans outlive the books they reference.
pub const CREATE_LOANS: &str = r#"
CREATE TABLE IF NOT EXISTS loans (
    id TEXT PRIMARY KEY,
    book_id TEXT NOT NULL REFERENCES books (id),
    "user" TEXT NOT NULL,
    loan_date TIMESTAMP NOT NULL,
    return_date TIMESTAMP,
    returned BOOLEAN NOT NULL DEFAULT FALSE
)
"#;

pub const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_users_username ON users (username)",
    "CREATE INDEX IF NOT EXISTS idx_books_title ON books (title)",
    "CREATE INDEX IF NOT EXISTS idx_books_author ON books (author)",
    "CREATE INDEX IF NOT EXISTS idx_books_genre ON books (genre)",
    "CREATE INDEX IF NOT EXISTS idx_books_available ON books (available)",
    "CREATE INDEX IF NOT EXISTS idx_loans_book_id ON loans (book_id)",
    "CREATE INDEX IF NOT EXISTS idx_loans_returned ON loans (returned)",
];

/// Creates the tables and indexes that do not exist yet.
pub async fn apply(pool: &SqlitePool) -> StoreResult<()> {
    let statements = [CREATE_USERS, CREATE_BOOKS, CREATE_LOANS]
        .into_iter()
        .chain(INDEXES.iter().copied());

    for statement in statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| StoreError::Initialization(format!("applying schema: {e}")))?;
    }

    Ok(())
}
