//! Read-only aggregation over both stores, shared by the `stats` subcommand
//! and the statistics overlay in the terminal UI.

use std::collections::BTreeMap;

use rusqlite::Connection;

use crate::db::{AuthorStore, BookStore};
use crate::error::Result;
use crate::models::Author;

#[derive(Debug, Clone, PartialEq)]
pub struct LibraryStats {
    pub total_authors: usize,
    pub total_books: usize,
    /// Keyed by the exact stored genre; "Fiction" and "fiction" stay apart.
    pub books_by_genre: BTreeMap<String, usize>,
    pub recent_books: usize,
    /// Mean age in years, `0.0` for an empty catalog.
    pub average_age: f64,
    /// Author with the most books. Ties go to the earliest created author.
    pub most_prolific: Option<(Author, usize)>,
}

/// Compute the report with ages relative to `current_year`.
pub fn library_stats(conn: &Connection, current_year: i32) -> Result<LibraryStats> {
    let summaries = AuthorStore::new(conn).get_all_with_counts()?;
    let books = BookStore::with_reference_year(conn, current_year).get_all()?;

    let mut books_by_genre = BTreeMap::new();
    for book in &books {
        *books_by_genre.entry(book.genre.clone()).or_insert(0) += 1;
    }

    let recent_books = books
        .iter()
        .filter(|book| book.is_recent(current_year))
        .count();

    let average_age = if books.is_empty() {
        0.0
    } else {
        let total: i64 = books
            .iter()
            .map(|book| i64::from(book.age(current_year)))
            .sum();
        total as f64 / books.len() as f64
    };

    let total_authors = summaries.len();
    let mut most_prolific: Option<(Author, usize)> = None;
    for summary in summaries {
        let beats_current = match &most_prolific {
            Some((_, best)) => summary.book_count > *best,
            None => true,
        };
        if beats_current {
            most_prolific = Some((summary.author, summary.book_count));
        }
    }

    Ok(LibraryStats {
        total_authors,
        total_books: books.len(),
        books_by_genre,
        recent_books,
        average_age,
        most_prolific,
    })
}

impl LibraryStats {
    /// Plain-text rendering used by the CLI and the UI overlay alike.
    pub fn report_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Total Authors: {}", self.total_authors),
            format!("Total Books: {}", self.total_books),
        ];

        if self.total_books > 0 {
            lines.push(String::new());
            lines.push("Books by Genre:".to_string());
            for (genre, count) in &self.books_by_genre {
                lines.push(format!("  {genre}: {count}"));
            }
            lines.push(String::new());
            lines.push(format!(
                "Recent Books (last 10 years): {}",
                self.recent_books
            ));
            lines.push(format!("Average Book Age: {:.1} years", self.average_age));
        }

        if let Some((author, count)) = &self.most_prolific {
            lines.push(String::new());
            lines.push(format!(
                "Most Prolific Author: {} ({count} books)",
                author.name
            ));
        }

        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    #[test]
    fn empty_catalog_reports_zeroes() {
        let conn = open_in_memory().unwrap();
        let stats = library_stats(&conn, 2024).unwrap();

        assert_eq!(stats.total_authors, 0);
        assert_eq!(stats.total_books, 0);
        assert!(stats.books_by_genre.is_empty());
        assert_eq!(stats.recent_books, 0);
        assert_eq!(stats.average_age, 0.0);
        assert_eq!(stats.most_prolific, None);
        assert_eq!(
            stats.report_lines(),
            vec!["Total Authors: 0", "Total Books: 0"]
        );
    }

    #[test]
    fn authors_without_books_still_name_a_leader() {
        let conn = open_in_memory().unwrap();
        let authors = AuthorStore::new(&conn);
        let first = authors.create("First", "first@x.com").unwrap();
        authors.create("Second", "second@x.com").unwrap();

        let stats = library_stats(&conn, 2024).unwrap();
        assert_eq!(stats.average_age, 0.0);
        assert_eq!(stats.most_prolific, Some((first, 0)));
    }

    #[test]
    fn aggregates_genres_ages_and_leader() {
        let conn = open_in_memory().unwrap();
        let authors = AuthorStore::new(&conn);
        let books = BookStore::with_reference_year(&conn, 2024);
        let jane = authors.create("Jane", "jane@x.com").unwrap();
        let john = authors.create("John", "john@x.com").unwrap();
        books
            .create("A", "0000000001", 2020, "Fiction", jane.id)
            .unwrap();
        books
            .create("B", "0000000002", 2000, "fiction", john.id)
            .unwrap();
        books
            .create("C", "0000000003", 2014, "Fiction", john.id)
            .unwrap();

        let stats = library_stats(&conn, 2024).unwrap();

        assert_eq!(stats.total_authors, 2);
        assert_eq!(stats.total_books, 3);
        assert_eq!(stats.books_by_genre.get("Fiction"), Some(&2));
        assert_eq!(stats.books_by_genre.get("fiction"), Some(&1));
        assert_eq!(stats.recent_books, 2);
        assert!((stats.average_age - 38.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.most_prolific, Some((john, 2)));
    }

    #[test]
    fn ties_go_to_the_first_author() {
        let conn = open_in_memory().unwrap();
        let authors = AuthorStore::new(&conn);
        let books = BookStore::with_reference_year(&conn, 2024);
        let jane = authors.create("Jane", "jane@x.com").unwrap();
        let john = authors.create("John", "john@x.com").unwrap();
        books
            .create("A", "0000000001", 2020, "Fiction", john.id)
            .unwrap();
        books
            .create("B", "0000000002", 2020, "Fiction", jane.id)
            .unwrap();

        let stats = library_stats(&conn, 2024).unwrap();
        assert_eq!(stats.most_prolific.map(|(author, _)| author.id), Some(jane.id));
    }

    #[test]
    fn report_lists_genres_in_order() {
        let conn = open_in_memory().unwrap();
        let authors = AuthorStore::new(&conn);
        let books = BookStore::with_reference_year(&conn, 2024);
        let jane = authors.create("Jane", "jane@x.com").unwrap();
        books
            .create("A", "0000000001", 2020, "Poetry", jane.id)
            .unwrap();
        books
            .create("B", "0000000002", 2022, "Drama", jane.id)
            .unwrap();

        let lines = library_stats(&conn, 2024).unwrap().report_lines();
        let drama = lines.iter().position(|line| line == "  Drama: 1").unwrap();
        let poetry = lines.iter().position(|line| line == "  Poetry: 1").unwrap();
        assert!(drama < poetry);
        assert!(lines.contains(&"Average Book Age: 3.0 years".to_string()));
        assert!(lines.contains(&"Most Prolific Author: Jane (2 books)".to_string()));
    }
}
