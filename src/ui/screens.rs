use std::collections::HashSet;

use crate::models::{Author, AuthorSummary, Book};

/// Clamp `selected + offset` into `0..len`.
fn offset_index(selected: usize, len: usize, offset: isize) -> usize {
    if len == 0 {
        return 0;
    }
    let target = selected as isize + offset;
    target.clamp(0, len as isize - 1) as usize
}

/// Field a search query runs against. Tab cycles within the fields of the
/// current screen.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum SearchField {
    AuthorName,
    AuthorEmail,
    AuthorId,
    BookTitle,
    BookGenre,
    BookIsbn,
    BookId,
}

impl SearchField {
    pub(crate) fn label(self) -> &'static str {
        match self {
            SearchField::AuthorName => "Name",
            SearchField::AuthorEmail => "Email",
            SearchField::AuthorId => "Author ID",
            SearchField::BookTitle => "Title",
            SearchField::BookGenre => "Genre",
            SearchField::BookIsbn => "ISBN",
            SearchField::BookId => "Book ID",
        }
    }

    pub(crate) fn next(self) -> Self {
        match self {
            SearchField::AuthorName => SearchField::AuthorEmail,
            SearchField::AuthorEmail => SearchField::AuthorId,
            SearchField::AuthorId => SearchField::AuthorName,
            SearchField::BookTitle => SearchField::BookGenre,
            SearchField::BookGenre => SearchField::BookIsbn,
            SearchField::BookIsbn => SearchField::BookId,
            SearchField::BookId => SearchField::BookTitle,
        }
    }

    pub(crate) fn targets_authors(self) -> bool {
        matches!(
            self,
            SearchField::AuthorName | SearchField::AuthorEmail | SearchField::AuthorId
        )
    }
}

/// The author list plus whatever search filter is active.
pub(crate) struct AuthorsScreen {
    authors: Vec<AuthorSummary>,
    matches: Option<HashSet<i64>>,
    pub(crate) visible: Vec<AuthorSummary>,
    pub(crate) selected: usize,
}

impl AuthorsScreen {
    pub(crate) fn new(authors: Vec<AuthorSummary>) -> Self {
        let mut screen = Self {
            authors,
            matches: None,
            visible: Vec::new(),
            selected: 0,
        };
        screen.apply_filter();
        screen
    }

    fn apply_filter(&mut self) {
        self.visible = match &self.matches {
            Some(ids) => self
                .authors
                .iter()
                .filter(|summary| ids.contains(&summary.author.id))
                .cloned()
                .collect(),
            None => self.authors.clone(),
        };
        self.selected = offset_index(self.selected, self.visible.len(), 0);
    }

    /// Replace the list after a write, keeping `focus_id` selected when it is
    /// still visible.
    pub(crate) fn set_authors(&mut self, authors: Vec<AuthorSummary>, focus_id: Option<i64>) {
        self.authors = authors;
        self.apply_filter();
        if let Some(id) = focus_id {
            if let Some(idx) = self
                .visible
                .iter()
                .position(|summary| summary.author.id == id)
            {
                self.selected = idx;
            }
        }
    }

    pub(crate) fn set_matches(&mut self, matches: Option<HashSet<i64>>) {
        self.matches = matches;
        self.selected = 0;
        self.apply_filter();
    }

    pub(crate) fn is_filtered(&self) -> bool {
        self.matches.is_some()
    }

    pub(crate) fn current(&self) -> Option<&AuthorSummary> {
        self.visible.get(self.selected)
    }

    pub(crate) fn author_name(&self, id: i64) -> Option<&str> {
        self.authors
            .iter()
            .find(|summary| summary.author.id == id)
            .map(|summary| summary.author.name.as_str())
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        self.selected = offset_index(self.selected, self.visible.len(), offset);
    }

    pub(crate) fn select_first(&mut self) {
        self.selected = 0;
    }

    pub(crate) fn select_last(&mut self) {
        self.selected = self.visible.len().saturating_sub(1);
    }
}

/// Which books the books screen lists.
#[derive(Clone)]
pub(crate) enum BookScope {
    All,
    Author(Author),
}

pub(crate) struct BooksScreen {
    pub(crate) scope: BookScope,
    books: Vec<Book>,
    matches: Option<HashSet<i64>>,
    pub(crate) visible: Vec<Book>,
    pub(crate) selected: usize,
}

impl BooksScreen {
    pub(crate) fn new(scope: BookScope, books: Vec<Book>) -> Self {
        let mut screen = Self {
            scope,
            books,
            matches: None,
            visible: Vec::new(),
            selected: 0,
        };
        screen.apply_filter();
        screen
    }

    fn apply_filter(&mut self) {
        self.visible = match &self.matches {
            Some(ids) => self
                .books
                .iter()
                .filter(|book| ids.contains(&book.id))
                .cloned()
                .collect(),
            None => self.books.clone(),
        };
        self.selected = offset_index(self.selected, self.visible.len(), 0);
    }

    /// Author the screen is scoped to, if any.
    pub(crate) fn author_id(&self) -> Option<i64> {
        match &self.scope {
            BookScope::All => None,
            BookScope::Author(author) => Some(author.id),
        }
    }

    pub(crate) fn title(&self) -> String {
        match &self.scope {
            BookScope::All => "All Books".to_string(),
            BookScope::Author(author) => format!("Books by {}", author.name),
        }
    }

    pub(crate) fn set_books(&mut self, books: Vec<Book>, focus_id: Option<i64>) {
        self.books = books;
        self.apply_filter();
        if let Some(id) = focus_id {
            if let Some(idx) = self.visible.iter().position(|book| book.id == id) {
                self.selected = idx;
            }
        }
    }

    pub(crate) fn set_matches(&mut self, matches: Option<HashSet<i64>>) {
        self.matches = matches;
        self.selected = 0;
        self.apply_filter();
    }

    pub(crate) fn is_filtered(&self) -> bool {
        self.matches.is_some()
    }

    pub(crate) fn total(&self) -> usize {
        self.books.len()
    }

    pub(crate) fn current(&self) -> Option<&Book> {
        self.visible.get(self.selected)
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        self.selected = offset_index(self.selected, self.visible.len(), offset);
    }

    pub(crate) fn select_first(&mut self) {
        self.selected = 0;
    }

    pub(crate) fn select_last(&mut self) {
        self.selected = self.visible.len().saturating_sub(1);
    }
}
