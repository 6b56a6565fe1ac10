//! Plain data records passed between the stores and the terminal UI. They are
//! never mutated in place by persistence code: stores hand out fresh values
//! and the UI reloads after every write.

use std::fmt;

use chrono::{DateTime, Utc};

/// A book counts as recent when it is at most this many years old.
pub const RECENT_YEARS: i32 = 10;

#[derive(Debug, Clone, PartialEq)]
/// A person who owns zero or more books in the catalog.
pub struct Author {
    /// Primary key assigned by SQLite.
    pub id: i64,
    pub name: String,
    /// Unique across all authors, compared case-insensitively.
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl Author {
    /// `Name (email)`, the way the author lists present an entry.
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.name, self.email)
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// An author paired with the number of books referencing it. Counts are
/// computed by the store at load time and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorSummary {
    pub author: Author,
    pub book_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
/// A catalogued book. `isbn` is always stored in its normalized digit-only
/// form.
pub struct Book {
    pub id: i64,
    pub title: String,
    pub isbn: String,
    pub publication_year: i32,
    pub genre: String,
    /// Owning author; the author store deletes the book along with it.
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
}

impl Book {
    /// Years elapsed since publication, relative to `current_year`.
    pub fn age(&self, current_year: i32) -> i32 {
        current_year - self.publication_year
    }

    pub fn is_recent(&self, current_year: i32) -> bool {
        self.age(current_year) <= RECENT_YEARS
    }
}

impl fmt::Display for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)
    }
}

/// Partial update for a book. `None` leaves the stored value untouched while
/// `Some` is validated like a fresh value, so `Some(String::new())` is
/// rejected rather than ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookChanges {
    pub title: Option<String>,
    pub isbn: Option<String>,
    pub publication_year: Option<i32>,
    pub genre: Option<String>,
    pub author_id: Option<i64>,
}

impl BookChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.isbn.is_none()
            && self.publication_year.is_none()
            && self.genre.is_none()
            && self.author_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book_from(year: i32) -> Book {
        Book {
            id: 1,
            title: "T1".to_string(),
            isbn: "0123456789".to_string(),
            publication_year: year,
            genre: "Fiction".to_string(),
            author_id: 1,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn age_and_recency_follow_reference_year() {
        let book = book_from(2020);
        assert_eq!(book.age(2024), 4);
        assert!(book.is_recent(2024));
    }

    #[test]
    fn recency_boundary_is_inclusive() {
        assert!(book_from(2014).is_recent(2024));
        assert!(!book_from(2013).is_recent(2024));
    }

    #[test]
    fn display_name_includes_email() {
        let author = Author {
            id: 1,
            name: "Jane Doe".to_string(),
            email: "jane@x.com".to_string(),
            created_at: Utc::now(),
        };
        assert_eq!(author.display_name(), "Jane Doe (jane@x.com)");
        assert_eq!(author.to_string(), "Jane Doe");
    }

    #[test]
    fn default_changes_are_empty() {
        assert!(BookChanges::default().is_empty());
        let changes = BookChanges {
            genre: Some("Poetry".to_string()),
            ..BookChanges::default()
        };
        assert!(!changes.is_empty());
    }
}
