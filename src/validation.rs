//! Field rules shared by the stores and the UI forms. Every function returns
//! the cleaned value so callers persist exactly what was checked.

use std::sync::OnceLock;

use chrono::{Datelike, Local};
use regex::Regex;

use crate::error::{CatalogError, Result};

/// Earliest publication year the catalog accepts.
pub const MIN_PUBLICATION_YEAR: i32 = 1000;

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("email pattern compiles"))
}

/// Calendar year on the local clock. Only the binary calls this; stores and
/// tests receive the year explicitly.
pub fn current_year() -> i32 {
    Local::now().year()
}

/// Trim `value` and reject it when nothing is left.
pub fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::validation(format!("{field} is required.")));
    }
    Ok(trimmed.to_string())
}

pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email)
}

pub fn validate_email(email: &str) -> Result<String> {
    let trimmed = email.trim();
    if !is_valid_email(trimmed) {
        return Err(CatalogError::validation(format!(
            "'{trimmed}' is not a valid email address."
        )));
    }
    Ok(trimmed.to_string())
}

/// Drop hyphens and whitespace without judging what remains. Lookups use this
/// so a malformed ISBN simply finds nothing.
pub fn strip_isbn(isbn: &str) -> String {
    isbn.chars()
        .filter(|ch| *ch != '-' && !ch.is_whitespace())
        .collect()
}

/// Normalize an ISBN to its 10 or 13 digit form.
pub fn normalize_isbn(isbn: &str) -> Result<String> {
    let digits = strip_isbn(isbn);
    let valid_len = digits.len() == 10 || digits.len() == 13;
    if !valid_len || !digits.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(CatalogError::validation(format!(
            "ISBN '{}' must contain exactly 10 or 13 digits.",
            isbn.trim()
        )));
    }
    Ok(digits)
}

/// Accept years in `[MIN_PUBLICATION_YEAR, current_year]`.
pub fn validate_year(year: i32, current_year: i32) -> Result<i32> {
    if !(MIN_PUBLICATION_YEAR..=current_year).contains(&year) {
        return Err(CatalogError::validation(format!(
            "Publication year must be between {MIN_PUBLICATION_YEAR} and {current_year}."
        )));
    }
    Ok(year)
}

pub fn parse_year(raw: &str, current_year: i32) -> Result<i32> {
    let trimmed = raw.trim();
    let year = trimmed.parse::<i32>().map_err(|_| {
        CatalogError::validation(format!("Publication year '{trimmed}' is not a number."))
    })?;
    validate_year(year, current_year)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_trims_and_rejects_blank() {
        assert_eq!(required("Title", "  Dune ").unwrap(), "Dune");
        let err = required("Title", "   ").unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
        assert_eq!(err.to_string(), "Title is required.");
    }

    #[test]
    fn email_pattern_accepts_common_addresses() {
        assert!(is_valid_email("jane@x.com"));
        assert!(is_valid_email("first.last+tag@mail.example.org"));
        assert!(!is_valid_email("jane@x"));
        assert!(!is_valid_email("jane.x.com"));
        assert!(!is_valid_email("jane@x.c"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn validate_email_returns_trimmed_value() {
        assert_eq!(validate_email(" jane@x.com ").unwrap(), "jane@x.com");
        assert!(matches!(
            validate_email("not an email"),
            Err(CatalogError::Validation(_))
        ));
    }

    #[test]
    fn isbn_with_hyphens_normalizes_to_digits() {
        assert_eq!(
            normalize_isbn("978-0-13-468599-1").unwrap(),
            "9780134685991"
        );
        assert_eq!(normalize_isbn("0 306 40615 2").unwrap(), "0306406152");
    }

    #[test]
    fn isbn_with_wrong_length_or_letters_is_rejected() {
        assert!(matches!(
            normalize_isbn("123"),
            Err(CatalogError::Validation(_))
        ));
        assert!(normalize_isbn("123456789X").is_err());
        assert!(normalize_isbn("12345678901").is_err());
        assert!(normalize_isbn("").is_err());
    }

    #[test]
    fn strip_isbn_keeps_non_digits() {
        assert_eq!(strip_isbn("12-ab 3"), "12ab3");
    }

    #[test]
    fn year_bounds_are_inclusive() {
        assert_eq!(validate_year(1000, 2024).unwrap(), 1000);
        assert_eq!(validate_year(2024, 2024).unwrap(), 2024);
        assert_eq!(validate_year(2020, 2024).unwrap(), 2020);
        assert!(validate_year(999, 2024).is_err());
        assert!(validate_year(2025, 2024).is_err());
    }

    #[test]
    fn upper_bound_moves_with_reference_year() {
        assert!(validate_year(2026, 2025).is_err());
        assert!(validate_year(2026, 2026).is_ok());
    }

    #[test]
    fn parse_year_rejects_non_numeric_input() {
        assert_eq!(parse_year(" 1984 ", 2024).unwrap(), 1984);
        let err = parse_year("nineteen", 2024).unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
        assert!(parse_year("", 2024).is_err());
    }
}
