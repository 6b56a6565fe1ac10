use chrono::{SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use crate::error::{CatalogError, Result};
use crate::models::{Book, BookChanges};
use crate::validation;

use super::{contains_ignore_case, is_constraint_violation, is_foreign_key_violation};

const BOOK_COLUMNS: &str = "id, title, isbn, publication_year, genre, author_id, created_at";

/// Owns the `books` table. Publication years are checked against
/// `current_year`, fixed when the store is built.
pub struct BookStore<'c> {
    conn: &'c Connection,
    current_year: i32,
}

impl<'c> BookStore<'c> {
    /// Store validating against today's calendar year.
    pub fn new(conn: &'c Connection) -> Self {
        Self::with_reference_year(conn, validation::current_year())
    }

    pub fn with_reference_year(conn: &'c Connection, current_year: i32) -> Self {
        Self { conn, current_year }
    }

    pub fn reference_year(&self) -> i32 {
        self.current_year
    }

    /// Validate every field, check ISBN uniqueness and the author reference,
    /// then insert. Nothing is written when any check fails.
    pub fn create(
        &self,
        title: &str,
        isbn: &str,
        publication_year: i32,
        genre: &str,
        author_id: i64,
    ) -> Result<Book> {
        let title = validation::required("Book title", title)?;
        let isbn = validation::normalize_isbn(isbn)?;
        let publication_year = validation::validate_year(publication_year, self.current_year)?;
        let genre = validation::required("Genre", genre)?;

        let tx = self.conn.unchecked_transaction()?;
        ensure_isbn_available(&tx, &isbn, None)?;
        ensure_author_exists(&tx, author_id)?;

        let created_at = Utc::now().trunc_subsecs(0);
        tx.execute(
            "INSERT INTO books (title, isbn, publication_year, genre, author_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![title, isbn, publication_year, genre, author_id, created_at],
        )
        .map_err(|err| map_book_constraint(err, &isbn, author_id))?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        info!(book_id = id, author_id, "created book");
        Ok(Book {
            id,
            title,
            isbn,
            publication_year,
            genre,
            author_id,
            created_at,
        })
    }

    pub fn get_all(&self) -> Result<Vec<Book>> {
        self.query_books(&format!("SELECT {BOOK_COLUMNS} FROM books ORDER BY id"), [])
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<Book>> {
        fetch_book(self.conn, id)
    }

    /// Books whose title contains `fragment`, ignoring case.
    pub fn find_by_title(&self, fragment: &str) -> Result<Vec<Book>> {
        Ok(self
            .get_all()?
            .into_iter()
            .filter(|book| contains_ignore_case(&book.title, fragment))
            .collect())
    }

    pub fn find_by_author_id(&self, author_id: i64) -> Result<Vec<Book>> {
        self.query_books(
            &format!("SELECT {BOOK_COLUMNS} FROM books WHERE author_id = ?1 ORDER BY id"),
            [author_id],
        )
    }

    /// Books whose genre contains `fragment`, ignoring case.
    pub fn find_by_genre(&self, fragment: &str) -> Result<Vec<Book>> {
        Ok(self
            .get_all()?
            .into_iter()
            .filter(|book| contains_ignore_case(&book.genre, fragment))
            .collect())
    }

    /// Exact lookup after stripping hyphens and whitespace from `isbn`, so
    /// `978-0-13-468599-1` finds `9780134685991`.
    pub fn find_by_isbn(&self, isbn: &str) -> Result<Option<Book>> {
        let normalized = validation::strip_isbn(isbn);
        let book = self
            .conn
            .query_row(
                &format!("SELECT {BOOK_COLUMNS} FROM books WHERE isbn = ?1"),
                [normalized],
                book_from_row,
            )
            .optional()?;
        Ok(book)
    }

    /// Apply the supplied changes, re-validating each one. A changed
    /// `author_id` must point at an existing author.
    pub fn update(&self, id: i64, changes: BookChanges) -> Result<Book> {
        let tx = self.conn.unchecked_transaction()?;
        let mut book = fetch_book(&tx, id)?.ok_or_else(|| CatalogError::book_not_found(id))?;

        if let Some(title) = changes.title.as_deref() {
            book.title = validation::required("Book title", title)?;
        }
        if let Some(isbn) = changes.isbn.as_deref() {
            let isbn = validation::normalize_isbn(isbn)?;
            ensure_isbn_available(&tx, &isbn, Some(id))?;
            book.isbn = isbn;
        }
        if let Some(year) = changes.publication_year {
            book.publication_year = validation::validate_year(year, self.current_year)?;
        }
        if let Some(genre) = changes.genre.as_deref() {
            book.genre = validation::required("Genre", genre)?;
        }
        if let Some(author_id) = changes.author_id {
            if author_id != book.author_id {
                ensure_author_exists(&tx, author_id)?;
            }
            book.author_id = author_id;
        }

        tx.execute(
            "UPDATE books
             SET title = ?1, isbn = ?2, publication_year = ?3, genre = ?4, author_id = ?5
             WHERE id = ?6",
            params![
                book.title,
                book.isbn,
                book.publication_year,
                book.genre,
                book.author_id,
                id
            ],
        )
        .map_err(|err| map_book_constraint(err, &book.isbn, book.author_id))?;
        tx.commit()?;

        info!(book_id = id, "updated book");
        Ok(book)
    }

    pub fn delete(&self, id: i64) -> Result<()> {
        let deleted = self.conn.execute("DELETE FROM books WHERE id = ?1", [id])?;
        if deleted == 0 {
            return Err(CatalogError::book_not_found(id));
        }
        info!(book_id = id, "deleted book");
        Ok(())
    }

    fn query_books<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Book>> {
        let mut stmt = self.conn.prepare(sql)?;
        let books = stmt
            .query_map(params, book_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(books)
    }
}

fn book_from_row(row: &Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: row.get(0)?,
        title: row.get(1)?,
        isbn: row.get(2)?,
        publication_year: row.get(3)?,
        genre: row.get(4)?,
        author_id: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn fetch_book(conn: &Connection, id: i64) -> Result<Option<Book>> {
    let book = conn
        .query_row(
            &format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?1"),
            [id],
            book_from_row,
        )
        .optional()?;
    Ok(book)
}

fn ensure_isbn_available(conn: &Connection, isbn: &str, exclude_id: Option<i64>) -> Result<()> {
    let taken = conn
        .query_row(
            "SELECT id FROM books WHERE isbn = ?1 AND id IS NOT ?2",
            params![isbn, exclude_id],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    if taken.is_some() {
        return Err(duplicate_isbn(isbn));
    }
    Ok(())
}

fn ensure_author_exists(conn: &Connection, author_id: i64) -> Result<()> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM authors WHERE id = ?1",
            [author_id],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    if exists.is_none() {
        return Err(CatalogError::foreign_key(author_id));
    }
    Ok(())
}

fn duplicate_isbn(isbn: &str) -> CatalogError {
    CatalogError::duplicate(format!("Book with ISBN '{isbn}' already exists."))
}

/// Translate constraint failures that slipped past the explicit checks.
fn map_book_constraint(err: rusqlite::Error, isbn: &str, author_id: i64) -> CatalogError {
    if is_foreign_key_violation(&err) {
        CatalogError::foreign_key(author_id)
    } else if is_constraint_violation(&err) {
        duplicate_isbn(isbn)
    } else {
        err.into()
    }
}
