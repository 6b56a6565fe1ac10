//! Typed failures surfaced by the author and book stores. The presentation
//! layer wraps these in `anyhow` and only ever shows the message, so each
//! variant carries a sentence that reads well in the footer.

use thiserror::Error;

/// Every store operation resolves to one of these kinds instead of a generic
/// failure.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A field is malformed or out of range.
    #[error("{0}")]
    Validation(String),

    /// A unique constraint (author email, book ISBN) would be violated.
    #[error("{0}")]
    Duplicate(String),

    /// A book references an author that does not exist.
    #[error("{0}")]
    ForeignKey(String),

    /// The targeted record does not exist.
    #[error("{entity} with ID {id} not found.")]
    NotFound { entity: &'static str, id: i64 },

    /// The SQLite backend failed underneath us.
    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl CatalogError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn duplicate(message: impl Into<String>) -> Self {
        Self::Duplicate(message.into())
    }

    pub fn foreign_key(author_id: i64) -> Self {
        Self::ForeignKey(format!("Author with ID {author_id} does not exist."))
    }

    pub fn author_not_found(id: i64) -> Self {
        Self::NotFound {
            entity: "Author",
            id,
        }
    }

    pub fn book_not_found(id: i64) -> Self {
        Self::NotFound { entity: "Book", id }
    }
}

pub type Result<T, E = CatalogError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_entity_and_id() {
        assert_eq!(
            CatalogError::author_not_found(7).to_string(),
            "Author with ID 7 not found."
        );
        assert_eq!(
            CatalogError::book_not_found(3).to_string(),
            "Book with ID 3 not found."
        );
    }

    #[test]
    fn foreign_key_message_mentions_author() {
        let err = CatalogError::foreign_key(42);
        assert!(matches!(err, CatalogError::ForeignKey(_)));
        assert_eq!(err.to_string(), "Author with ID 42 does not exist.");
    }
}
