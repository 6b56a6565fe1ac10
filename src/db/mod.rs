//! Persistence split across one store per entity plus the connection
//! bootstrap.

mod authors;
mod books;
mod connection;

use rusqlite::{Error as SqlError, ErrorCode};

pub use authors::AuthorStore;
pub use books::BookStore;
pub use connection::{ensure_schema, open_database, open_in_memory};

/// Case-insensitive substring test used by every `find_by_*` text search.
/// Done in Rust rather than with `LIKE` so `%`/`_` in user input stay literal
/// and non-ASCII letters fold correctly.
pub(crate) fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

pub(crate) fn is_constraint_violation(err: &SqlError) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::ConstraintViolation)
    )
}

pub(crate) fn is_foreign_key_violation(err: &SqlError) -> bool {
    matches!(
        err,
        SqlError::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substring_match_ignores_case() {
        assert!(contains_ignore_case("Jane Doe", "jane"));
        assert!(contains_ignore_case("Émile Zola", "émile"));
        assert!(contains_ignore_case("Anything", ""));
        assert!(!contains_ignore_case("Jane Doe", "john"));
    }

    #[test]
    fn wildcard_characters_are_literal() {
        assert!(!contains_ignore_case("Jane Doe", "%"));
        assert!(contains_ignore_case("100% Fiction", "0% f"));
    }
}
