use anyhow::Error;
use ratatui::layout::{Constraint, Direction, Layout, Rect};

use crate::models::{Author, Book};

/// Public catalog page opened for a book's ISBN.
const OPEN_LIBRARY_ISBN_URL: &str = "https://openlibrary.org/isbn/";

/// Produce a rectangle centered within `area` that spans the requested percent
/// of the width and height. Used for modal dialogs.
pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(area);

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(horizontal[1]);

    vertical[1]
}

/// Extract the most relevant error message from a chained error.
pub(crate) fn surface_error(err: &Error) -> String {
    err.chain()
        .last()
        .map(|cause| cause.to_string())
        .unwrap_or_else(|| err.to_string())
}

/// `1 book`, `3 books`.
pub(crate) fn pluralize(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{count} {singular}")
    } else {
        format!("{count} {plural}")
    }
}

pub(crate) fn open_library_url(isbn: &str) -> String {
    format!("{OPEN_LIBRARY_ISBN_URL}{isbn}")
}

/// Second line of a book card: author and ISBN.
pub(crate) fn book_byline(book: &Book, author_name: Option<&str>) -> String {
    format!(
        "by {} · ISBN {}",
        author_name.unwrap_or("Unknown Author"),
        book.isbn
    )
}

/// Third line of a book card: year, genre and derived age.
pub(crate) fn book_age_line(book: &Book, current_year: i32) -> String {
    let age = book.age(current_year);
    let recent = if book.is_recent(current_year) {
        " (Recent)"
    } else {
        ""
    };
    format!(
        "{} · {} · {} old{recent}",
        book.publication_year,
        book.genre,
        pluralize(age.max(0) as usize, "year", "years")
    )
}

/// Row text for the author list.
pub(crate) fn author_row(author: &Author, book_count: usize) -> String {
    format!(
        "#{:<4} {}  [{}]",
        author.id,
        author.display_name(),
        pluralize(book_count, "book", "books")
    )
}
