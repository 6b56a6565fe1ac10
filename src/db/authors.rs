use chrono::{SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use crate::error::{CatalogError, Result};
use crate::models::{Author, AuthorSummary};
use crate::validation;

use super::{contains_ignore_case, is_constraint_violation};

const AUTHOR_COLUMNS: &str = "id, name, email, created_at";

/// Owns every read and write against the `authors` table, including the
/// cascade into `books` when an author is removed.
pub struct AuthorStore<'c> {
    conn: &'c Connection,
}

impl<'c> AuthorStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Validate and insert a new author, returning the hydrated record.
    pub fn create(&self, name: &str, email: &str) -> Result<Author> {
        let name = validation::required("Author name", name)?;
        let email = validation::validate_email(email)?;

        let tx = self.conn.unchecked_transaction()?;
        ensure_email_available(&tx, &email, None)?;

        let created_at = Utc::now().trunc_subsecs(0);
        tx.execute(
            "INSERT INTO authors (name, email, created_at) VALUES (?1, ?2, ?3)",
            params![name, email, created_at],
        )
        .map_err(|err| map_email_constraint(err, &email))?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        info!(author_id = id, "created author");
        Ok(Author {
            id,
            name,
            email,
            created_at,
        })
    }

    /// Every author in insertion order.
    pub fn get_all(&self) -> Result<Vec<Author>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {AUTHOR_COLUMNS} FROM authors ORDER BY id"))?;
        let authors = stmt
            .query_map([], author_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(authors)
    }

    /// Every author with its book count, in insertion order. One grouped query
    /// instead of a count per author.
    pub fn get_all_with_counts(&self) -> Result<Vec<AuthorSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT a.id, a.name, a.email, a.created_at, COUNT(b.id)
             FROM authors a
             LEFT JOIN books b ON b.author_id = a.id
             GROUP BY a.id
             ORDER BY a.id",
        )?;
        let summaries = stmt
            .query_map([], |row| {
                let book_count: i64 = row.get(4)?;
                Ok(AuthorSummary {
                    author: author_from_row(row)?,
                    book_count: book_count as usize,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(summaries)
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<Author>> {
        fetch_author(self.conn, id)
    }

    /// Authors whose name contains `fragment`, ignoring case.
    pub fn find_by_name(&self, fragment: &str) -> Result<Vec<Author>> {
        Ok(self
            .get_all()?
            .into_iter()
            .filter(|author| contains_ignore_case(&author.name, fragment))
            .collect())
    }

    /// Exact, case-sensitive lookup. The column collates `NOCASE` for the
    /// uniqueness check, so the comparison forces `BINARY` here.
    pub fn find_by_email(&self, email: &str) -> Result<Option<Author>> {
        let author = self
            .conn
            .query_row(
                &format!(
                    "SELECT {AUTHOR_COLUMNS} FROM authors WHERE email = ?1 COLLATE BINARY"
                ),
                [email],
                author_from_row,
            )
            .optional()?;
        Ok(author)
    }

    /// Change the supplied fields only. `None` keeps the stored value; an
    /// empty `Some` fails validation.
    pub fn update(&self, id: i64, name: Option<&str>, email: Option<&str>) -> Result<Author> {
        let tx = self.conn.unchecked_transaction()?;
        let mut author = fetch_author(&tx, id)?.ok_or_else(|| CatalogError::author_not_found(id))?;

        if let Some(name) = name {
            author.name = validation::required("Author name", name)?;
        }
        if let Some(email) = email {
            let email = validation::validate_email(email)?;
            ensure_email_available(&tx, &email, Some(id))?;
            author.email = email;
        }

        tx.execute(
            "UPDATE authors SET name = ?1, email = ?2 WHERE id = ?3",
            params![author.name, author.email, id],
        )
        .map_err(|err| map_email_constraint(err, &author.email))?;
        tx.commit()?;

        info!(author_id = id, "updated author");
        Ok(author)
    }

    /// Remove the author and every book referencing it as one transaction.
    /// Returns how many books went with it. If any step fails the transaction
    /// is dropped uncommitted and nothing changes.
    pub fn delete(&self, id: i64) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        if fetch_author(&tx, id)?.is_none() {
            return Err(CatalogError::author_not_found(id));
        }

        let books_removed = tx.execute("DELETE FROM books WHERE author_id = ?1", [id])?;
        let deleted = tx.execute("DELETE FROM authors WHERE id = ?1", [id])?;
        if deleted == 0 {
            return Err(CatalogError::author_not_found(id));
        }
        tx.commit()?;

        info!(author_id = id, books_removed, "deleted author and their books");
        Ok(books_removed)
    }

    /// Books referencing `id`; zero for unknown ids.
    pub fn book_count(&self, id: i64) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM books WHERE author_id = ?1",
            [id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn author_from_row(row: &Row<'_>) -> rusqlite::Result<Author> {
    Ok(Author {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn fetch_author(conn: &Connection, id: i64) -> Result<Option<Author>> {
    let author = conn
        .query_row(
            &format!("SELECT {AUTHOR_COLUMNS} FROM authors WHERE id = ?1"),
            [id],
            author_from_row,
        )
        .optional()?;
    Ok(author)
}

/// Fail with `Duplicate` when another author already uses `email`, ignoring
/// case and skipping `exclude_id`.
fn ensure_email_available(conn: &Connection, email: &str, exclude_id: Option<i64>) -> Result<()> {
    let taken = conn
        .query_row(
            "SELECT id FROM authors WHERE email = ?1 COLLATE NOCASE AND id IS NOT ?2",
            params![email, exclude_id],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    if taken.is_some() {
        return Err(duplicate_email(email));
    }
    Ok(())
}

fn duplicate_email(email: &str) -> CatalogError {
    CatalogError::duplicate(format!("Author with email '{email}' already exists."))
}

fn map_email_constraint(err: rusqlite::Error, email: &str) -> CatalogError {
    if is_constraint_violation(&err) {
        duplicate_email(email)
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{open_in_memory, BookStore};

    fn store_with_books(conn: &Connection) -> (Author, Author) {
        let authors = AuthorStore::new(conn);
        let books = BookStore::with_reference_year(conn, 2024);
        let jane = authors.create("Jane Doe", "jane@x.com").unwrap();
        let john = authors.create("John Roe", "john@y.org").unwrap();
        books
            .create("T1", "0123456789", 2023, "Fiction", jane.id)
            .unwrap();
        books
            .create("T2", "9780134685991", 2001, "Mystery", jane.id)
            .unwrap();
        books
            .create("T3", "0306406152", 1999, "Poetry", john.id)
            .unwrap();
        (jane, john)
    }

    #[test]
    fn create_then_find_by_id_round_trips() {
        let conn = open_in_memory().unwrap();
        let store = AuthorStore::new(&conn);

        let created = store.create("Jane Doe", "jane@x.com").unwrap();
        let found = store.find_by_id(created.id).unwrap().unwrap();

        assert_eq!(found, created);
        assert_eq!(found.name, "Jane Doe");
        assert_eq!(found.email, "jane@x.com");
    }

    #[test]
    fn ids_are_fresh_for_each_author() {
        let conn = open_in_memory().unwrap();
        let store = AuthorStore::new(&conn);

        let first = store.create("A", "a@x.com").unwrap();
        let second = store.create("B", "b@x.com").unwrap();
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn ids_are_not_reused_after_delete() {
        let conn = open_in_memory().unwrap();
        let store = AuthorStore::new(&conn);

        let first = store.create("A", "a@x.com").unwrap();
        store.delete(first.id).unwrap();
        let second = store.create("B", "b@x.com").unwrap();
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn create_rejects_blank_name_and_bad_email() {
        let conn = open_in_memory().unwrap();
        let store = AuthorStore::new(&conn);

        assert!(matches!(
            store.create("  ", "jane@x.com"),
            Err(CatalogError::Validation(_))
        ));
        assert!(matches!(
            store.create("Jane", "jane-at-x"),
            Err(CatalogError::Validation(_))
        ));
        assert!(store.get_all().unwrap().is_empty());
    }

    #[test]
    fn duplicate_email_is_rejected_in_any_case() {
        let conn = open_in_memory().unwrap();
        let store = AuthorStore::new(&conn);

        store.create("Jane Doe", "jane@x.com").unwrap();
        assert!(matches!(
            store.create("Other Jane", "jane@x.com"),
            Err(CatalogError::Duplicate(_))
        ));
        assert!(matches!(
            store.create("Loud Jane", "JANE@X.COM"),
            Err(CatalogError::Duplicate(_))
        ));
        assert_eq!(store.get_all().unwrap().len(), 1);
    }

    #[test]
    fn find_by_name_is_case_insensitive_substring() {
        let conn = open_in_memory().unwrap();
        let store = AuthorStore::new(&conn);
        store.create("Jane Doe", "jane@x.com").unwrap();
        store.create("John Roe", "john@y.org").unwrap();
        store.create("Mary Janeway", "mary@z.net").unwrap();

        let names: Vec<String> = store
            .find_by_name("JANE")
            .unwrap()
            .into_iter()
            .map(|author| author.name)
            .collect();
        assert_eq!(names, vec!["Jane Doe", "Mary Janeway"]);
        assert!(store.find_by_name("nobody").unwrap().is_empty());
    }

    #[test]
    fn find_by_email_is_exact() {
        let conn = open_in_memory().unwrap();
        let store = AuthorStore::new(&conn);
        let jane = store.create("Jane Doe", "jane@x.com").unwrap();

        assert_eq!(store.find_by_email("jane@x.com").unwrap(), Some(jane));
        assert_eq!(store.find_by_email("JANE@x.com").unwrap(), None);
        assert_eq!(store.find_by_email("jane@x").unwrap(), None);
    }

    #[test]
    fn update_changes_only_supplied_fields() {
        let conn = open_in_memory().unwrap();
        let store = AuthorStore::new(&conn);
        let jane = store.create("Jane Doe", "jane@x.com").unwrap();

        let renamed = store.update(jane.id, Some("Jane Smith"), None).unwrap();
        assert_eq!(renamed.name, "Jane Smith");
        assert_eq!(renamed.email, "jane@x.com");
        assert_eq!(renamed.created_at, jane.created_at);

        let moved = store.update(jane.id, None, Some("js@x.com")).unwrap();
        assert_eq!(moved.name, "Jane Smith");
        assert_eq!(store.find_by_id(jane.id).unwrap(), Some(moved));
    }

    #[test]
    fn update_distinguishes_empty_from_absent() {
        let conn = open_in_memory().unwrap();
        let store = AuthorStore::new(&conn);
        let jane = store.create("Jane Doe", "jane@x.com").unwrap();

        assert!(matches!(
            store.update(jane.id, Some(""), None),
            Err(CatalogError::Validation(_))
        ));
        assert_eq!(store.find_by_id(jane.id).unwrap().unwrap().name, "Jane Doe");
    }

    #[test]
    fn update_email_uniqueness_excludes_self() {
        let conn = open_in_memory().unwrap();
        let store = AuthorStore::new(&conn);
        let jane = store.create("Jane Doe", "jane@x.com").unwrap();
        store.create("John Roe", "john@y.org").unwrap();

        let same = store.update(jane.id, None, Some("Jane@X.com")).unwrap();
        assert_eq!(same.email, "Jane@X.com");
        assert!(matches!(
            store.update(jane.id, None, Some("john@y.org")),
            Err(CatalogError::Duplicate(_))
        ));
    }

    #[test]
    fn update_missing_author_is_not_found() {
        let conn = open_in_memory().unwrap();
        let store = AuthorStore::new(&conn);
        assert!(matches!(
            store.update(404, Some("Ghost"), None),
            Err(CatalogError::NotFound { id: 404, .. })
        ));
    }

    #[test]
    fn delete_cascades_to_owned_books_only() {
        let conn = open_in_memory().unwrap();
        let (jane, john) = store_with_books(&conn);
        let authors = AuthorStore::new(&conn);
        let books = BookStore::with_reference_year(&conn, 2024);

        let removed = authors.delete(jane.id).unwrap();

        assert_eq!(removed, 2);
        assert_eq!(authors.find_by_id(jane.id).unwrap(), None);
        let remaining = books.get_all().unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(remaining.iter().all(|book| book.author_id == john.id));
    }

    #[test]
    fn delete_missing_author_is_not_found_and_changes_nothing() {
        let conn = open_in_memory().unwrap();
        store_with_books(&conn);
        let authors = AuthorStore::new(&conn);

        assert!(matches!(
            authors.delete(999),
            Err(CatalogError::NotFound { entity: "Author", .. })
        ));
        assert_eq!(authors.get_all().unwrap().len(), 2);
        assert_eq!(BookStore::new(&conn).get_all().unwrap().len(), 3);
    }

    #[test]
    fn failed_cascade_rolls_back() {
        let conn = open_in_memory().unwrap();
        let (jane, _) = store_with_books(&conn);
        conn.execute_batch(
            "CREATE TRIGGER refuse_author_delete BEFORE DELETE ON authors
             BEGIN SELECT RAISE(ABORT, 'author delete refused'); END;",
        )
        .unwrap();
        let authors = AuthorStore::new(&conn);

        let err = authors.delete(jane.id).unwrap_err();

        assert!(matches!(err, CatalogError::Storage(_)));
        assert!(authors.find_by_id(jane.id).unwrap().is_some());
        assert_eq!(authors.book_count(jane.id).unwrap(), 2);
    }

    #[test]
    fn book_count_tracks_owned_books() {
        let conn = open_in_memory().unwrap();
        let (jane, john) = store_with_books(&conn);
        let authors = AuthorStore::new(&conn);

        assert_eq!(authors.book_count(jane.id).unwrap(), 2);
        assert_eq!(authors.book_count(john.id).unwrap(), 1);
        assert_eq!(authors.book_count(12345).unwrap(), 0);
    }

    #[test]
    fn summaries_include_authors_without_books() {
        let conn = open_in_memory().unwrap();
        let (jane, john) = store_with_books(&conn);
        let authors = AuthorStore::new(&conn);
        let lonely = authors.create("Lonely", "lonely@x.com").unwrap();

        let counts: Vec<(i64, usize)> = authors
            .get_all_with_counts()
            .unwrap()
            .into_iter()
            .map(|summary| (summary.author.id, summary.book_count))
            .collect();
        assert_eq!(counts, vec![(jane.id, 2), (john.id, 1), (lonely.id, 0)]);
    }
}
