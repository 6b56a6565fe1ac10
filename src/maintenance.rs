//! Housekeeping operations behind the `seed`, `clear` and `info`
//! subcommands.

use std::collections::HashMap;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::db::{AuthorStore, BookStore};
use crate::error::{CatalogError, Result};

const SAMPLE_AUTHORS: &[(&str, &str)] = &[
    ("Ursula K. Le Guin", "ursula@earthsea.example.com"),
    ("Octavia E. Butler", "octavia@parables.example.com"),
    ("Terry Pratchett", "terry@discworld.example.com"),
    ("Toni Morrison", "toni@beloved.example.com"),
    ("Italo Calvino", "italo@invisiblecities.example.com"),
];

/// `(title, isbn, year, genre, index into SAMPLE_AUTHORS)`
const SAMPLE_BOOKS: &[(&str, &str, i32, &str, usize)] = &[
    ("A Wizard of Earthsea", "978-0-547-77374-3", 1968, "Fantasy", 0),
    ("The Left Hand of Darkness", "978-0-441-47812-5", 1969, "Science Fiction", 0),
    ("The Dispossessed", "978-0-06-051275-3", 1974, "Science Fiction", 0),
    ("Kindred", "978-0-8070-8369-7", 1979, "Science Fiction", 1),
    ("Parable of the Sower", "978-1-53-871073-2", 1993, "Science Fiction", 1),
    ("Fledgling", "978-0-446-69616-1", 2005, "Horror", 1),
    ("Guards! Guards!", "978-0-06-230218-9", 1989, "Fantasy", 2),
    ("Small Gods", "978-0-06-223737-5", 1992, "Fantasy", 2),
    ("Going Postal", "978-0-06-050293-8", 2004, "Fantasy", 2),
    ("The Shepherd's Crown", "978-0-06-242998-5", 2015, "Fantasy", 2),
    ("Beloved", "978-1-4000-3341-6", 1987, "Fiction", 3),
    ("Song of Solomon", "978-1-4000-3342-3", 1977, "Fiction", 3),
    ("God Help the Child", "978-0-307-59426-9", 2015, "Fiction", 3),
    ("Invisible Cities", "978-0-15-645380-6", 1972, "Fiction", 4),
    ("Italian Folktales", "978-0-15-645489-6", 1956, "Folklore", 4),
];

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedSummary {
    pub authors_created: usize,
    pub books_created: usize,
    pub skipped: usize,
}

/// Insert the sample catalog. Records whose email or ISBN already exists are
/// skipped, so running it twice is harmless.
pub fn seed_sample_data(conn: &Connection, current_year: i32) -> Result<SeedSummary> {
    let authors = AuthorStore::new(conn);
    let books = BookStore::with_reference_year(conn, current_year);
    let mut summary = SeedSummary::default();

    let mut author_ids = Vec::with_capacity(SAMPLE_AUTHORS.len());
    for (name, email) in SAMPLE_AUTHORS {
        let id = match authors.create(name, email) {
            Ok(author) => {
                summary.authors_created += 1;
                author.id
            }
            Err(CatalogError::Duplicate(_)) => {
                summary.skipped += 1;
                debug!(email, "sample author already present");
                let existing = authors.find_by_email(email)?.ok_or_else(|| {
                    CatalogError::duplicate(format!(
                        "Email '{email}' is taken by an author with different casing."
                    ))
                })?;
                existing.id
            }
            Err(err) => return Err(err),
        };
        author_ids.push(id);
    }

    for (title, isbn, year, genre, author_index) in SAMPLE_BOOKS {
        match books.create(title, isbn, *year, genre, author_ids[*author_index]) {
            Ok(_) => summary.books_created += 1,
            Err(CatalogError::Duplicate(_)) => {
                summary.skipped += 1;
                debug!(isbn, "sample book already present");
            }
            Err(err) => return Err(err),
        }
    }

    info!(
        authors = summary.authors_created,
        books = summary.books_created,
        skipped = summary.skipped,
        "seeded sample data"
    );
    Ok(summary)
}

/// Remove every book and then every author in one transaction. Returns
/// `(authors, books)` removed.
pub fn clear_all(conn: &Connection) -> Result<(usize, usize)> {
    let tx = conn.unchecked_transaction()?;
    let books = tx.execute("DELETE FROM books", [])?;
    let authors = tx.execute("DELETE FROM authors", [])?;
    tx.commit()?;

    info!(authors, books, "cleared catalog");
    Ok((authors, books))
}

/// Human-readable dump of the catalog: authors with their book counts, then
/// books with their author's name.
pub fn catalog_info(conn: &Connection) -> Result<Vec<String>> {
    let summaries = AuthorStore::new(conn).get_all_with_counts()?;
    let books = BookStore::new(conn).get_all()?;

    let mut lines = vec![
        format!("Authors: {}", summaries.len()),
        format!("Books: {}", books.len()),
    ];

    if !summaries.is_empty() {
        lines.push(String::new());
        lines.push("Authors:".to_string());
        for summary in &summaries {
            lines.push(format!(
                "  - {} - {} books",
                summary.author.display_name(),
                summary.book_count
            ));
        }
    }

    if !books.is_empty() {
        let names: HashMap<i64, &str> = summaries
            .iter()
            .map(|summary| (summary.author.id, summary.author.name.as_str()))
            .collect();
        lines.push(String::new());
        lines.push("Books:".to_string());
        for book in &books {
            let author = names
                .get(&book.author_id)
                .copied()
                .unwrap_or("Unknown Author");
            lines.push(format!("  - {} by {} ({})", book.title, author, book.genre));
        }
    }

    Ok(lines)
}
