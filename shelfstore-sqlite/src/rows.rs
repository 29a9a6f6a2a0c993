//! Row types read from the SQLite tables and their conversion into the model.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use shelfstore_core::model::{Book, Loan, LoanWithBook, User};

pub const BOOK_COLUMNS: &str =
    "id, title, author, isbn, published, genre, description, available, created_at, updated_at";

pub const LOAN_COLUMNS: &str = r#"id, book_id, "user", loan_date, return_date, returned"#;

pub const USER_COLUMNS: &str = "id, username, password, role, created_at, updated_at";

pub const LOAN_WITH_BOOK_SELECT: &str = r#"
SELECT l.id, l.book_id, l."user", l.loan_date, l.return_date, l.returned,
       b.id AS b_id, b.title AS b_title, b.author AS b_author, b.isbn AS b_isbn,
       b.published AS b_published, b.genre AS b_genre, b.description AS b_description,
       b.available AS b_available, b.created_at AS b_created_at, b.updated_at AS b_updated_at
FROM loans l
LEFT JOIN books b ON b.id = l.book_id
"#;

#[derive(Debug, FromRow)]
pub struct BookRow {
    pub id: String,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub published: i64,
    pub genre: String,
    pub description: String,
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<BookRow> for Book {
    fn from(row: BookRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            author: row.author,
            isbn: row.isbn,
            published: row.published as i32,
            genre: row.genre,
            description: row.description,
            available: row.available,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct LoanRow {
    pub id: String,
    pub book_id: String,
    pub user: String,
    pub loan_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub returned: bool,
}

impl From<LoanRow> for Loan {
    fn from(row: LoanRow) -> Self {
        Self {
            id: row.id,
            book_id: row.book_id,
            user: row.user,
            loan_date: row.loan_date,
            return_date: row.return_date,
            returned: row.returned,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            password: row.password,
            role: row.role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// A loan row left-joined with its book; the `b_` columns are all null when the
/// book has been deleted.
#[derive(Debug, FromRow)]
pub struct LoanWithBookRow {
    #[sqlx(flatten)]
    pub loan: LoanRow,
    pub b_id: Option<String>,
    pub b_title: Option<String>,
    pub b_author: Option<String>,
    pub b_isbn: Option<String>,
    pub b_published: Option<i64>,
    pub b_genre: Option<String>,
    pub b_description: Option<String>,
    pub b_available: Option<bool>,
    pub b_created_at: Option<DateTime<Utc>>,
    pub b_updated_at: Option<DateTime<Utc>>,
}

impl From<LoanWithBookRow> for LoanWithBook {
    fn from(row: LoanWithBookRow) -> Self {
        let loan = Loan::from(row.loan);
        let book = row.b_id.map(|id| Book {
            id,
            title: row.b_title.unwrap_or_default(),
            author: row.b_author.unwrap_or_default(),
            isbn: row.b_isbn.unwrap_or_default(),
            published: row.b_published.unwrap_or_default() as i32,
            genre: row.b_genre.unwrap_or_default(),
            description: row.b_description.unwrap_or_default(),
            available: row.b_available.unwrap_or_default(),
            created_at: row.b_created_at.unwrap_or(loan.loan_date),
            updated_at: row.b_updated_at.unwrap_or(loan.loan_date),
        });

        LoanWithBook::resolve(loan, book)
    }
}
