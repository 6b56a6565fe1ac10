use anyhow::{anyhow, Result};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

use crate::models::{Author, Book, BookChanges};
use crate::validation;

/// Internal representation of the author form fields.
#[derive(Default, Clone)]
pub(crate) struct AuthorForm {
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) active: AuthorField,
    pub(crate) error: Option<String>,
}

/// Fields available within the author form.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub(crate) enum AuthorField {
    #[default]
    Name,
    Email,
}

impl AuthorForm {
    /// Populate the form from an existing author when editing.
    pub(crate) fn from_author(author: &Author) -> Self {
        Self {
            name: author.name.clone(),
            email: author.email.clone(),
            active: AuthorField::Name,
            error: None,
        }
    }

    /// Swap focus between the name and email fields.
    pub(crate) fn toggle_field(&mut self) {
        self.active = match self.active {
            AuthorField::Name => AuthorField::Email,
            AuthorField::Email => AuthorField::Name,
        };
    }

    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        match self.active {
            AuthorField::Name => self.name.push(ch),
            AuthorField::Email => {
                if ch.is_whitespace() {
                    return false;
                }
                self.email.push(ch);
            }
        }
        true
    }

    pub(crate) fn backspace(&mut self) {
        match self.active {
            AuthorField::Name => {
                self.name.pop();
            }
            AuthorField::Email => {
                self.email.pop();
            }
        }
    }

    /// Prompt-level checks only: both fields must be filled in. The store
    /// re-validates format and uniqueness.
    pub(crate) fn parse_inputs(&self) -> Result<(String, String)> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(anyhow!("Author name is required."));
        }
        let email = self.email.trim();
        if email.is_empty() {
            return Err(anyhow!("Author email is required."));
        }
        Ok((name.to_string(), email.to_string()))
    }

    pub(crate) fn build_line(&self, field: AuthorField) -> Line<'static> {
        let (label, value) = match field {
            AuthorField::Name => ("Name", &self.name),
            AuthorField::Email => ("Email", &self.email),
        };
        field_line(label, value, self.active == field)
    }

    pub(crate) fn value_len(&self, field: AuthorField) -> usize {
        match field {
            AuthorField::Name => self.name.chars().count(),
            AuthorField::Email => self.email.chars().count(),
        }
    }
}

/// Typed values pulled out of a completed book form.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BookInput {
    pub(crate) title: String,
    pub(crate) isbn: String,
    pub(crate) publication_year: i32,
    pub(crate) genre: String,
    pub(crate) author_id: i64,
}

/// Form state for book creation/editing.
#[derive(Default, Clone)]
pub(crate) struct BookForm {
    pub(crate) title: String,
    pub(crate) isbn: String,
    pub(crate) year: String,
    pub(crate) genre: String,
    pub(crate) author_id: String,
    pub(crate) active: BookField,
    pub(crate) error: Option<String>,
}

/// Enumerates the fields within the book form to drive focus management.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub(crate) enum BookField {
    #[default]
    Title,
    Isbn,
    Year,
    Genre,
    AuthorId,
}

impl BookField {
    /// Render order, top to bottom.
    pub(crate) const ALL: [BookField; 5] = [
        BookField::Title,
        BookField::Isbn,
        BookField::Year,
        BookField::Genre,
        BookField::AuthorId,
    ];

    pub(crate) fn label(self) -> &'static str {
        match self {
            BookField::Title => "Title",
            BookField::Isbn => "ISBN",
            BookField::Year => "Year",
            BookField::Genre => "Genre",
            BookField::AuthorId => "Author ID",
        }
    }

    fn index(self) -> usize {
        Self::ALL
            .iter()
            .position(|field| *field == self)
            .unwrap_or(0)
    }

    fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    fn previous(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl BookForm {
    /// Blank form, pre-filling the author when the books screen is scoped to
    /// one.
    pub(crate) fn for_author(author_id: Option<i64>) -> Self {
        Self {
            author_id: author_id.map(|id| id.to_string()).unwrap_or_default(),
            ..Self::default()
        }
    }

    /// Populate the form from an existing book when entering edit mode.
    pub(crate) fn from_book(book: &Book) -> Self {
        Self {
            title: book.title.clone(),
            isbn: book.isbn.clone(),
            year: book.publication_year.to_string(),
            genre: book.genre.clone(),
            author_id: book.author_id.to_string(),
            active: BookField::Title,
            error: None,
        }
    }

    pub(crate) fn next_field(&mut self) {
        self.active = self.active.next();
    }

    pub(crate) fn previous_field(&mut self) {
        self.active = self.active.previous();
    }

    fn value(&self, field: BookField) -> &String {
        match field {
            BookField::Title => &self.title,
            BookField::Isbn => &self.isbn,
            BookField::Year => &self.year,
            BookField::Genre => &self.genre,
            BookField::AuthorId => &self.author_id,
        }
    }

    fn value_mut(&mut self, field: BookField) -> &mut String {
        match field {
            BookField::Title => &mut self.title,
            BookField::Isbn => &mut self.isbn,
            BookField::Year => &mut self.year,
            BookField::Genre => &mut self.genre,
            BookField::AuthorId => &mut self.author_id,
        }
    }

    /// Insert a character into the active field. Year and author id only take
    /// digits; the ISBN also takes the separators normalization strips.
    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        let allowed = match self.active {
            BookField::Year | BookField::AuthorId => ch.is_ascii_digit(),
            BookField::Isbn => ch.is_ascii_digit() || ch == '-' || ch == ' ',
            BookField::Title | BookField::Genre => !ch.is_control(),
        };
        if allowed {
            let field = self.active;
            self.value_mut(field).push(ch);
        }
        allowed
    }

    pub(crate) fn backspace(&mut self) {
        let field = self.active;
        self.value_mut(field).pop();
    }

    /// Check required fields and parse the numeric ones.
    pub(crate) fn parse_inputs(&self, current_year: i32) -> Result<BookInput> {
        for field in BookField::ALL {
            if self.value(field).trim().is_empty() {
                return Err(anyhow!("{} is required.", field.label()));
            }
        }
        let publication_year = validation::parse_year(&self.year, current_year)?;
        let author_id = self
            .author_id
            .trim()
            .parse::<i64>()
            .map_err(|_| anyhow!("Author ID must be a number."))?;

        Ok(BookInput {
            title: self.title.trim().to_string(),
            isbn: self.isbn.trim().to_string(),
            publication_year,
            genre: self.genre.trim().to_string(),
            author_id,
        })
    }

    /// Changes relative to `original`; unchanged fields stay `None`.
    pub(crate) fn changes(&self, original: &Book, current_year: i32) -> Result<BookChanges> {
        let input = self.parse_inputs(current_year)?;
        Ok(BookChanges {
            title: (input.title != original.title).then_some(input.title),
            isbn: (validation::strip_isbn(&input.isbn) != original.isbn).then_some(input.isbn),
            publication_year: (input.publication_year != original.publication_year)
                .then_some(input.publication_year),
            genre: (input.genre != original.genre).then_some(input.genre),
            author_id: (input.author_id != original.author_id).then_some(input.author_id),
        })
    }

    pub(crate) fn build_line(&self, field: BookField) -> Line<'static> {
        field_line(field.label(), self.value(field), self.active == field)
    }

    pub(crate) fn value_len(&self, field: BookField) -> usize {
        self.value(field).chars().count()
    }
}

/// `Label: value` with the active field highlighted and blanks shown as a
/// placeholder.
fn field_line(label: &str, value: &str, is_active: bool) -> Line<'static> {
    let display = if value.is_empty() {
        "<required>".to_string()
    } else {
        value.to_string()
    };

    let style = if is_active {
        Style::default().fg(Color::Yellow)
    } else if value.is_empty() {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };

    Line::from(vec![
        Span::raw(format!("{label}: ")),
        Span::styled(display, style),
    ])
}

/// State for confirming an author delete, which also removes its books.
#[derive(Clone)]
pub(crate) struct ConfirmAuthorDelete {
    pub(crate) author: Author,
    pub(crate) book_count: usize,
}

/// State for confirming permanent book deletion.
#[derive(Clone)]
pub(crate) struct ConfirmBookDelete {
    pub(crate) book: Book,
}
