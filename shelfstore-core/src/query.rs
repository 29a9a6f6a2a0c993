//! Book search queries.
//!
//! A [`BookQuery`] combines up to three text filters and an availability filter. All
//! supplied filters must match (logical AND). Text filters are case-insensitive
//! substring matches and an empty text filter counts as unset, so an empty query
//! matches every book. Whitespace is matched literally like any other text.
//!
//! ```ignore
//! use shelfstore_core::query::BookQuery;
//!
//! let query = BookQuery::builder()
//!     .author("orwell")
//!     .available(true)
//!     .build();
//! ```

use crate::model::Book;

/// Filters for [`LibraryStore::search_books`](crate::store::LibraryStore::search_books).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookQuery {
    /// Substring of the title.
    pub title: Option<String>,
    /// Substring of the author.
    pub author: Option<String>,
    /// Substring of the genre.
    pub genre: Option<String>,
    /// Exact availability.
    pub available: Option<bool>,
}

impl BookQuery {
    /// Creates a query that matches every book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> BookQueryBuilder {
        BookQueryBuilder::default()
    }

    /// Builds a query from the positional form used by request handlers, where an
    /// empty string means "no filter".
    pub fn from_parts(title: &str, author: &str, genre: &str, available: Option<bool>) -> Self {
        Self::builder()
            .title(title)
            .author(author)
            .genre(genre)
            .available_opt(available)
            .build()
    }

    /// The title filter, if one is set and not empty.
    pub fn title(&self) -> Option<&str> {
        non_empty(&self.title)
    }

    /// The author filter, if one is set and not empty.
    pub fn author(&self) -> Option<&str> {
        non_empty(&self.author)
    }

    /// The genre filter, if one is set and not empty.
    pub fn genre(&self) -> Option<&str> {
        non_empty(&self.genre)
    }

    /// Returns `true` when no filter is set.
    pub fn is_empty(&self) -> bool {
        self.title().is_none()
            && self.author().is_none()
            && self.genre().is_none()
            && self.available.is_none()
    }

    /// Evaluates the query against a single book.
    pub fn matches(&self, book: &Book) -> bool {
        contains_ignore_case(&book.title, self.title())
            && contains_ignore_case(&book.author, self.author())
            && contains_ignore_case(&book.genre, self.genre())
            && self.available.is_none_or(|available| book.available == available)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn contains_ignore_case(haystack: &str, needle: Option<&str>) -> bool {
    match needle {
        Some(needle) => haystack.to_lowercase().contains(&needle.to_lowercase()),
        None => true,
    }
}

/// Fluent builder for [`BookQuery`].
#[derive(Debug, Default)]
pub struct BookQueryBuilder {
    query: BookQuery,
}

impl BookQueryBuilder {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.query.title = Some(title.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.query.author = Some(author.into());
        self
    }

    pub fn genre(mut self, genre: impl Into<String>) -> Self {
        self.query.genre = Some(genre.into());
        self
    }

    pub fn available(mut self, available: bool) -> Self {
        self.query.available = Some(available);
        self
    }

    pub fn available_opt(mut self, available: Option<bool>) -> Self {
        self.query.available = available;
        self
    }

    pub fn build(self) -> BookQuery {
        self.query
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orwell_books() -> Vec<Book> {
        let mut farm = Book::new("Animal Farm", "George Orwell", "978-0451526342").genre("Satire");
        farm.available = false;

        vec![
            Book::new("1984", "George Orwell", "978-0451524935").genre("Dystopia"),
            farm,
            Book::new("Don Quijote de la Mancha", "Miguel de Cervantes", "978-8424113296"),
        ]
    }

    fn titles(query: &BookQuery) -> Vec<String> {
        orwell_books()
            .into_iter()
            .filter(|b| query.matches(b))
            .map(|b| b.title)
            .collect()
    }

    #[test]
    fn test_empty_query_matches_all() {
        let query = BookQuery::from_parts("", "", "", None);

        assert!(query.is_empty());
        assert_eq!(titles(&query).len(), 3);
    }

    #[test]
    fn test_filters_compose_with_and() {
        let query = BookQuery::builder().author("Orwell").available(true).build();

        assert_eq!(titles(&query), vec!["1984"]);
    }

    #[test]
    fn test_text_match_is_case_insensitive_substring() {
        assert_eq!(titles(&BookQuery::builder().title("FARM").build()), vec!["Animal Farm"]);
        assert_eq!(titles(&BookQuery::builder().author("cervan").build()).len(), 1);
        assert_eq!(titles(&BookQuery::builder().genre("dysto").build()), vec!["1984"]);
    }

    #[test]
    fn test_empty_text_filter_is_ignored() {
        let query = BookQuery::builder().title("").available(false).build();

        assert_eq!(query.title(), None);
        assert_eq!(titles(&query), vec!["Animal Farm"]);
    }

    #[test]
    fn test_whitespace_filter_matches_literally() {
        let single = BookQuery::builder().title(" ").build();
        let triple = BookQuery::builder().title("   ").build();

        assert!(!single.is_empty());
        assert_eq!(titles(&single), vec!["Animal Farm", "Don Quijote de la Mancha"]);
        assert!(titles(&triple).is_empty());
    }
}
