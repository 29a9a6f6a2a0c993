//! Entity model shared by every store backend.
//!
//! Records are plain owned values. A store always hands out copies, so mutating a
//! returned [`Book`], [`Loan`] or [`User`] never touches the stored state. Fields the
//! store controls (ids, timestamps, the `available` and `returned` flags) are
//! overwritten by the store on the mutating operations that own them.

use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

/// Placeholder id used in the joined loan history when the book no longer exists.
pub const DELETED_BOOK_ID: &str = "DELETED";

/// Common behaviour of the three record kinds.
pub trait Record: Clone + Send + Sync + 'static {
    /// Human readable name of the record kind, used in logs.
    const KIND: &'static str;

    /// Returns the record's unique identifier.
    fn id(&self) -> &str;

    /// Builds the not-found error for this record kind.
    fn not_found(key: impl Into<String>) -> StoreError;
}

/// Returns the current time at microsecond precision.
///
/// Every timestamp the store stamps goes through here so that values compare equal
/// after a round trip through any backend.
pub fn timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Generates a new random record identifier.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// A catalog record representing a lendable title.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub published: i32,
    pub genre: String,
    pub description: String,
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Creates a draft book. The store assigns the id and timestamps on creation.
    pub fn new(title: impl Into<String>, author: impl Into<String>, isbn: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            isbn: isbn.into(),
            available: true,
            ..Default::default()
        }
    }

    pub fn published(mut self, year: i32) -> Self {
        self.published = year;
        self
    }

    pub fn genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = genre.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Placeholder shown in loan history for a book that has been deleted.
    pub fn deleted_placeholder(loan: &Loan) -> Self {
        Self {
            id: DELETED_BOOK_ID.to_string(),
            title: "Book deleted".to_string(),
            author: "N/A".to_string(),
            isbn: "N/A".to_string(),
            published: 0,
            genre: "N/A".to_string(),
            description: "This book has been deleted".to_string(),
            available: false,
            created_at: loan.loan_date,
            updated_at: loan.loan_date,
        }
    }
}

impl Record for Book {
    const KIND: &'static str = "book";

    fn id(&self) -> &str {
        &self.id
    }

    fn not_found(key: impl Into<String>) -> StoreError {
        StoreError::BookNotFound(key.into())
    }
}

/// A record of one borrowing event.
///
/// `book_id` is a back-reference resolved by lookup, and `user` is the free-text
/// borrower name rather than a reference to a [`User`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Loan {
    pub id: String,
    pub book_id: String,
    pub user: String,
    pub loan_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_date: Option<DateTime<Utc>>,
    pub returned: bool,
}

impl Loan {
    /// Creates a draft loan of `book_id` to `user`.
    pub fn new(book_id: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            book_id: book_id.into(),
            user: user.into(),
            ..Default::default()
        }
    }

    /// Returns `true` while the book has not been brought back.
    pub fn is_active(&self) -> bool {
        !self.returned
    }
}

impl Record for Loan {
    const KIND: &'static str = "loan";

    fn id(&self) -> &str {
        &self.id
    }

    fn not_found(key: impl Into<String>) -> StoreError {
        StoreError::LoanNotFound(key.into())
    }
}

/// An account able to sign in to the library system.
///
/// `password` is stored as opaque text; callers are expected to hand in a one-way hash.
/// It is never serialized and never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Role given to users created without one.
    pub const DEFAULT_ROLE: &'static str = "user";

    pub fn new(username: impl Into<String>, password: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            role: role.into(),
            ..Default::default()
        }
    }

    /// Sets an explicit id. When left empty the store generates one.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

impl Record for User {
    const KIND: &'static str = "user";

    fn id(&self) -> &str {
        &self.id
    }

    fn not_found(key: impl Into<String>) -> StoreError {
        StoreError::UserNotFound(key.into())
    }
}

/// A loan together with the book it references, for history displays.
///
/// When the referenced book has been deleted, `book` holds
/// [`Book::deleted_placeholder`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanWithBook {
    #[serde(flatten)]
    pub loan: Loan,
    pub book: Book,
}

impl LoanWithBook {
    /// Pairs `loan` with `book`, substituting the placeholder when the book is gone.
    pub fn resolve(loan: Loan, book: Option<Book>) -> Self {
        let book = book.unwrap_or_else(|| Book::deleted_placeholder(&loan));

        Self { loan, book }
    }

    pub fn book_deleted(&self) -> bool {
        self.book.id == DELETED_BOOK_ID
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn describe<R: Record>(record: &R) -> String {
        format!("{} {}", R::KIND, record.id())
    }

    #[test]
    fn test_record_kind_and_id() {
        let book = Book { id: "b1".to_string(), ..Default::default() };
        let loan = Loan { id: "l1".to_string(), ..Default::default() };
        let user = User::new("alice", "hash", "").with_id("u1");

        assert_eq!(describe(&book), "book b1");
        assert_eq!(describe(&loan), "loan l1");
        assert_eq!(describe(&user), "user u1");
        assert_eq!(Loan::not_found("l9"), StoreError::LoanNotFound("l9".to_string()));
    }

    #[test]
    fn test_book_json_field_names() {
        let book = Book::new("1984", "George Orwell", "978-0451524935").published(1949);
        let value = serde_json::to_value(&book).unwrap();

        for field in [
            "id", "title", "author", "isbn", "published", "genre",
            "description", "available", "created_at", "updated_at",
        ] {
            assert!(value.get(field).is_some(), "missing field {field}");
        }
        assert_eq!(value["published"], json!(1949));
    }

    #[test]
    fn test_password_is_never_serialized() {
        let user = User::new("alice", "secret-hash", "user");
        let value = serde_json::to_value(&user).unwrap();

        assert!(value.get("password").is_none());
        assert_eq!(value["username"], json!("alice"));
        assert!(!format!("{user:?}").contains("secret-hash"));
    }

    #[test]
    fn test_user_password_is_accepted_on_input() {
        let user: User = serde_json::from_value(json!({
            "username": "bob",
            "password": "hunter2",
        }))
        .unwrap();

        assert_eq!(user.password, "hunter2");
        assert!(user.id.is_empty());
    }

    #[test]
    fn test_return_date_omitted_when_absent() {
        let loan = Loan::new("book-1", "alice");
        let value = serde_json::to_value(&loan).unwrap();

        assert!(value.get("return_date").is_none());
        assert_eq!(value["book_id"], json!("book-1"));
        assert_eq!(value["returned"], json!(false));
    }

    #[test]
    fn test_resolve_substitutes_placeholder() {
        let mut loan = Loan::new("gone", "alice");
        loan.loan_date = timestamp();

        let joined = LoanWithBook::resolve(loan.clone(), None);

        assert!(joined.book_deleted());
        assert_eq!(joined.book.title, "Book deleted");
        assert_eq!(joined.book.created_at, loan.loan_date);
        assert!(!joined.book.available);
    }

    #[test]
    fn test_timestamp_has_microsecond_precision() {
        let now = timestamp();

        assert_eq!(now.timestamp_subsec_nanos() % 1_000, 0);
    }
}
