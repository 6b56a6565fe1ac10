use std::cmp::min;
use std::collections::HashSet;
use std::mem;

use anyhow::Result;
use crossterm::event::KeyCode;
use open::that as open_link;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use rusqlite::Connection;
use tracing::warn;

use crate::db::{AuthorStore, BookStore};
use crate::models::{Author, Book};
use crate::stats::{library_stats, LibraryStats};

use super::forms::{
    AuthorField, AuthorForm, BookField, BookForm, ConfirmAuthorDelete, ConfirmBookDelete,
};
use super::helpers::{
    author_row, book_age_line, book_byline, centered_rect, open_library_url, pluralize,
    surface_error,
};
use super::screens::{AuthorsScreen, BookScope, BooksScreen, SearchField};

/// Footer space reserved for status messages and instructions.
const FOOTER_HEIGHT: u16 = 3;
/// Height allocation per book card.
const BOOK_CARD_HEIGHT: u16 = 5;
/// Rows skipped by PgUp/PgDn.
const PAGE_SIZE: isize = 5;

/// High-level navigation states.
enum Screen {
    Authors,
    Books(BooksScreen),
}

/// Fine-grained modes scoped to the current screen.
enum Mode {
    Normal,
    AddingAuthor(AuthorForm),
    EditingAuthor { author: Author, form: AuthorForm },
    ConfirmAuthorDelete(ConfirmAuthorDelete),
    AddingBook(BookForm),
    EditingBook { book: Book, form: BookForm },
    ConfirmBookDelete(ConfirmBookDelete),
    Searching(SearchState),
    ShowingStats(LibraryStats),
}

/// State for an active inline search.
struct SearchState {
    field: SearchField,
    query: String,
}

/// Holds the footer message text plus its severity.
struct StatusMessage {
    text: String,
    kind: StatusKind,
}

/// Severity levels shown in the footer.
enum StatusKind {
    Info,
    Error,
}

impl StatusKind {
    fn style(&self) -> Style {
        match self {
            StatusKind::Info => Style::default().fg(Color::Green),
            StatusKind::Error => Style::default().fg(Color::Red),
        }
    }
}

/// Central application state shared across the TUI.
pub struct App {
    conn: Connection,
    current_year: i32,
    authors: AuthorsScreen,
    screen: Screen,
    mode: Mode,
    status: Option<StatusMessage>,
    saved_search: Option<SearchState>,
}

impl App {
    /// Load the author list and start on the authors screen. Book ages and
    /// the publication year bound are computed against `current_year`.
    pub fn new(conn: Connection, current_year: i32) -> Result<Self> {
        let authors = AuthorStore::new(&conn).get_all_with_counts()?;
        Ok(Self {
            conn,
            current_year,
            authors: AuthorsScreen::new(authors),
            screen: Screen::Authors,
            mode: Mode::Normal,
            status: None,
            saved_search: None,
        })
    }

    pub fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        let mut exit = false;
        let mut mode = mem::replace(&mut self.mode, Mode::Normal);

        mode = match mode {
            Mode::Normal => self.handle_normal_key(code, &mut exit)?,
            Mode::AddingAuthor(form) => self.handle_add_author(code, form)?,
            Mode::EditingAuthor { author, form } => self.handle_edit_author(code, author, form)?,
            Mode::ConfirmAuthorDelete(confirm) => {
                self.handle_confirm_author_delete(code, confirm)?
            }
            Mode::AddingBook(form) => self.handle_add_book(code, form)?,
            Mode::EditingBook { book, form } => self.handle_edit_book(code, book, form)?,
            Mode::ConfirmBookDelete(confirm) => self.handle_confirm_book_delete(code, confirm)?,
            Mode::Searching(state) => self.handle_search(code, state)?,
            Mode::ShowingStats(_) => Mode::Normal,
        };

        self.mode = mode;
        Ok(exit)
    }

    fn handle_normal_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        if self.navigate(code) {
            return Ok(Mode::Normal);
        }
        match self.screen {
            Screen::Authors => self.handle_authors_key(code, exit),
            Screen::Books(_) => self.handle_books_key(code, exit),
        }
    }

    fn handle_authors_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        match code {
            KeyCode::Char('q') => *exit = true,
            KeyCode::Esc => {
                if self.authors.is_filtered() {
                    self.authors.set_matches(None);
                    self.set_status("Search cleared.", StatusKind::Info);
                } else {
                    *exit = true;
                }
            }
            KeyCode::Enter => {
                if let Some(summary) = self.authors.current().cloned() {
                    self.clear_status();
                    self.open_books(BookScope::Author(summary.author))?;
                } else {
                    self.set_status("No author selected.", StatusKind::Error);
                }
            }
            KeyCode::Char('b') | KeyCode::Char('B') => {
                self.clear_status();
                self.open_books(BookScope::All)?;
            }
            KeyCode::Char('+') => {
                self.clear_status();
                return Ok(Mode::AddingAuthor(AuthorForm::default()));
            }
            KeyCode::Char('-') => {
                if let Some(summary) = self.authors.current().cloned() {
                    self.clear_status();
                    let book_count = AuthorStore::new(&self.conn).book_count(summary.author.id)?;
                    return Ok(Mode::ConfirmAuthorDelete(ConfirmAuthorDelete {
                        author: summary.author,
                        book_count,
                    }));
                }
                self.set_status("No author selected to delete.", StatusKind::Error);
            }
            KeyCode::Char('e') | KeyCode::Char('E') => {
                if let Some(summary) = self.authors.current().cloned() {
                    self.clear_status();
                    return Ok(Self::edit_author_mode(summary.author));
                }
                self.set_status("No author selected to edit.", StatusKind::Error);
            }
            KeyCode::Char('f') => {
                return Ok(Mode::Searching(SearchState {
                    field: SearchField::AuthorName,
                    query: String::new(),
                }));
            }
            KeyCode::Char('s') | KeyCode::Char('S') => return self.stats_mode(),
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_books_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        let Screen::Books(books) = &mut self.screen else {
            return Ok(Mode::Normal);
        };
        match code {
            KeyCode::Char('q') => *exit = true,
            KeyCode::Esc => {
                self.clear_status();
                self.screen = Screen::Authors;
            }
            KeyCode::Enter | KeyCode::Char('o') | KeyCode::Char('O') => {
                if let Some(book) = books.current().cloned() {
                    self.open_book_page(&book);
                } else {
                    self.set_status("No book selected.", StatusKind::Error);
                }
            }
            KeyCode::Char('+') => {
                let form = BookForm::for_author(books.author_id());
                self.clear_status();
                return Ok(Mode::AddingBook(form));
            }
            KeyCode::Char('-') => {
                if let Some(book) = books.current().cloned() {
                    self.clear_status();
                    return Ok(Mode::ConfirmBookDelete(ConfirmBookDelete { book }));
                }
                self.set_status("No book selected to delete.", StatusKind::Error);
            }
            KeyCode::Char('e') | KeyCode::Char('E') => {
                if let Some(book) = books.current().cloned() {
                    self.clear_status();
                    return Ok(Self::edit_book_mode(book));
                }
                self.set_status("No book selected to edit.", StatusKind::Error);
            }
            KeyCode::Char('f') => {
                return Ok(Mode::Searching(SearchState {
                    field: SearchField::BookTitle,
                    query: String::new(),
                }));
            }
            KeyCode::Char('s') | KeyCode::Char('S') => return self.stats_mode(),
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_add_author(&mut self, code: KeyCode, mut form: AuthorForm) -> Result<Mode> {
        let mut keep_open = true;
        match code {
            KeyCode::Esc => {
                self.set_status("Add author cancelled.", StatusKind::Info);
                keep_open = false;
            }
            KeyCode::Tab | KeyCode::BackTab => form.toggle_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.save_new_author(&form) {
                Ok(_) => keep_open = false,
                Err(err) => {
                    let message = surface_error(&err);
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }

        if keep_open {
            Ok(Mode::AddingAuthor(form))
        } else {
            Ok(Mode::Normal)
        }
    }

    fn handle_edit_author(
        &mut self,
        code: KeyCode,
        author: Author,
        mut form: AuthorForm,
    ) -> Result<Mode> {
        let mut keep_open = true;
        match code {
            KeyCode::Esc => {
                self.set_status("Edit cancelled.", StatusKind::Info);
                keep_open = false;
            }
            KeyCode::Tab | KeyCode::BackTab => form.toggle_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.save_existing_author(&author, &form) {
                Ok(_) => keep_open = false,
                Err(err) => {
                    let message = surface_error(&err);
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }

        if keep_open {
            Ok(Mode::EditingAuthor { author, form })
        } else {
            self.resume_search()
        }
    }

    fn handle_confirm_author_delete(
        &mut self,
        code: KeyCode,
        confirm: ConfirmAuthorDelete,
    ) -> Result<Mode> {
        match code {
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.set_status("Deletion cancelled.", StatusKind::Info);
                Ok(Mode::Normal)
            }
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                match self.perform_author_delete(&confirm) {
                    Ok(_) => Ok(Mode::Normal),
                    Err(err) => {
                        self.set_status(surface_error(&err), StatusKind::Error);
                        Ok(Mode::ConfirmAuthorDelete(confirm))
                    }
                }
            }
            _ => Ok(Mode::ConfirmAuthorDelete(confirm)),
        }
    }

    fn handle_add_book(&mut self, code: KeyCode, mut form: BookForm) -> Result<Mode> {
        let mut keep_open = true;
        match code {
            KeyCode::Esc => {
                self.set_status("Add book cancelled.", StatusKind::Info);
                keep_open = false;
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.previous_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.save_new_book(&form) {
                Ok(_) => keep_open = false,
                Err(err) => {
                    let message = surface_error(&err);
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }

        if keep_open {
            Ok(Mode::AddingBook(form))
        } else {
            Ok(Mode::Normal)
        }
    }

    fn handle_edit_book(&mut self, code: KeyCode, book: Book, mut form: BookForm) -> Result<Mode> {
        let mut keep_open = true;
        match code {
            KeyCode::Esc => {
                self.set_status("Edit cancelled.", StatusKind::Info);
                keep_open = false;
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.previous_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.save_existing_book(&book, &form) {
                Ok(_) => keep_open = false,
                Err(err) => {
                    let message = surface_error(&err);
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }

        if keep_open {
            Ok(Mode::EditingBook { book, form })
        } else {
            self.resume_search()
        }
    }

    fn handle_confirm_book_delete(
        &mut self,
        code: KeyCode,
        confirm: ConfirmBookDelete,
    ) -> Result<Mode> {
        match code {
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.set_status("Deletion cancelled.", StatusKind::Info);
                Ok(Mode::Normal)
            }
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                match self.perform_book_delete(&confirm) {
                    Ok(_) => Ok(Mode::Normal),
                    Err(err) => {
                        self.set_status(surface_error(&err), StatusKind::Error);
                        Ok(Mode::ConfirmBookDelete(confirm))
                    }
                }
            }
            _ => Ok(Mode::ConfirmBookDelete(confirm)),
        }
    }

    /// Incremental search: every edit to the query re-runs the store lookup
    /// for the chosen field. Enter keeps the filter, Esc drops it.
    fn handle_search(&mut self, code: KeyCode, mut state: SearchState) -> Result<Mode> {
        if self.navigate(code) {
            return Ok(Mode::Searching(state));
        }
        match code {
            KeyCode::Esc => {
                self.set_matches(None);
                return Ok(Mode::Normal);
            }
            KeyCode::Enter => {
                if !state.query.trim().is_empty() {
                    let shown = self.visible_count();
                    self.set_status(
                        format!(
                            "{} for {} \"{}\".",
                            pluralize(shown, "match", "matches"),
                            state.field.label(),
                            state.query.trim()
                        ),
                        StatusKind::Info,
                    );
                }
                return Ok(Mode::Normal);
            }
            KeyCode::Tab => state.field = state.field.next(),
            KeyCode::Backspace => {
                state.query.pop();
            }
            KeyCode::Char(ch) if !ch.is_control() => state.query.push(ch),
            _ => return Ok(Mode::Searching(state)),
        }

        if let Err(err) = self.apply_search(&state) {
            self.set_status(surface_error(&err), StatusKind::Error);
        }
        Ok(Mode::Searching(state))
    }

    pub(crate) fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let footer_height = FOOTER_HEIGHT.min(area.height);

        let (content_area, footer_area) = if area.height > footer_height {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(0), Constraint::Length(footer_height)])
                .split(area);
            (chunks[0], chunks[1])
        } else {
            (area, area)
        };

        match &self.screen {
            Screen::Authors => self.draw_authors(frame, content_area),
            Screen::Books(books) => self.draw_books(frame, content_area, books),
        }

        if area.height >= footer_height {
            self.draw_footer(frame, footer_area);
        }

        match &self.mode {
            Mode::AddingAuthor(form) => self.draw_author_form(frame, area, "Add Author", form),
            Mode::EditingAuthor { form, .. } => {
                self.draw_author_form(frame, area, "Edit Author", form)
            }
            Mode::ConfirmAuthorDelete(confirm) => self.draw_confirm_author(frame, area, confirm),
            Mode::AddingBook(form) => self.draw_book_form(frame, area, "Add Book", form),
            Mode::EditingBook { form, .. } => self.draw_book_form(frame, area, "Edit Book", form),
            Mode::ConfirmBookDelete(confirm) => self.draw_confirm_book(frame, area, confirm),
            Mode::Searching(state) => self.draw_search_bar(frame, area, state),
            Mode::ShowingStats(stats) => self.draw_stats(frame, area, stats),
            Mode::Normal => {}
        }
    }

    /// Ctrl-E while searching: edit the highlighted entry, then come back to
    /// the same search once the form closes.
    pub(crate) fn handle_ctrl_e(&mut self) -> Result<()> {
        if !matches!(self.mode, Mode::Searching(_)) {
            return Ok(());
        }

        let previous = mem::replace(&mut self.mode, Mode::Normal);
        if let Mode::Searching(state) = previous {
            self.saved_search = Some(state);
        }

        match &self.screen {
            Screen::Authors => {
                if let Some(summary) = self.authors.current().cloned() {
                    self.mode = Self::edit_author_mode(summary.author);
                } else {
                    self.set_status("No author selected to edit.", StatusKind::Error);
                }
            }
            Screen::Books(books) => {
                if let Some(book) = books.current().cloned() {
                    self.mode = Self::edit_book_mode(book);
                } else {
                    self.set_status("No book selected to edit.", StatusKind::Error);
                }
            }
        }

        if matches!(self.mode, Mode::Normal) {
            self.mode = self.resume_search()?;
        }
        Ok(())
    }

    fn draw_authors(&self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(1)])
            .split(area);

        let mut summary = vec![Span::styled(
            "Library Catalog",
            Style::default().add_modifier(Modifier::BOLD),
        )];
        summary.push(Span::raw(format!(
            "  •  {}",
            pluralize(self.authors.visible.len(), "author", "authors")
        )));
        if self.authors.is_filtered() {
            summary.push(Span::styled(
                "  (filtered)",
                Style::default().fg(Color::Yellow),
            ));
        }
        let header = Paragraph::new(Line::from(summary))
            .alignment(Alignment::Left)
            .block(Block::default().borders(Borders::ALL).title("Authors"));
        frame.render_widget(header, chunks[0]);

        if self.authors.visible.is_empty() {
            let text = if self.authors.is_filtered() {
                "No authors match the search."
            } else {
                "No authors yet. Press '+' to add one."
            };
            let message = Paragraph::new(text)
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL));
            frame.render_widget(message, chunks[1]);
            return;
        }

        let items: Vec<ListItem> = self
            .authors
            .visible
            .iter()
            .map(|summary| ListItem::new(author_row(&summary.author, summary.book_count)))
            .collect();
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL))
            .highlight_style(Style::default().fg(Color::Yellow))
            .highlight_symbol("▶ ");

        let mut list_state = ListState::default();
        list_state.select(Some(self.authors.selected));
        frame.render_stateful_widget(list, chunks[1], &mut list_state);
    }

    fn draw_books(&self, frame: &mut Frame, area: Rect, books: &BooksScreen) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(1)])
            .split(area);

        let count_line = if books.is_filtered() {
            format!("{} of {}", books.visible.len(), books.total())
        } else {
            pluralize(books.total(), "book", "books")
        };
        let mut lines = vec![
            Line::from(Span::styled(
                books.title(),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::raw(count_line)),
        ];
        if let BookScope::Author(author) = &books.scope {
            lines[1].spans.push(Span::styled(
                format!("  •  {}", author.email),
                Style::default().fg(Color::Gray),
            ));
        }
        let header = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .block(Block::default().borders(Borders::ALL).title("Books"));
        frame.render_widget(header, chunks[0]);

        if books.visible.is_empty() {
            let text = if books.is_filtered() {
                "No books match the search."
            } else {
                "No books yet. Press '+' to add one."
            };
            let message = Paragraph::new(text)
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL));
            frame.render_widget(message, chunks[1]);
            return;
        }

        self.render_book_cards(frame, chunks[1], &books.visible, books.selected);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let status_line = if let Some(status) = &self.status {
            Line::from(vec![Span::styled(status.text.clone(), status.kind.style())])
        } else {
            Line::from("")
        };

        let instructions = self.footer_instructions();

        let paragraph = Paragraph::new(vec![status_line, instructions]).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn draw_search_bar(&self, frame: &mut Frame, area: Rect, state: &SearchState) {
        let height = 3u16.min(area.height);
        let popup_area = Rect {
            x: area.x,
            y: area.y,
            width: area.width,
            height,
        };
        frame.render_widget(Clear, popup_area);

        let prefix = format!("{}: ", state.field.label());
        let target = if state.field.targets_authors() {
            "authors"
        } else {
            "books"
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("Search {target} (Tab: field, Enter: keep, Esc: clear)"));
        let paragraph = Paragraph::new(Line::from(vec![
            Span::styled(prefix.clone(), Style::default().fg(Color::Cyan)),
            Span::raw(state.query.clone()),
        ]))
        .block(block.clone())
        .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, popup_area);

        let inner = block.inner(popup_area);
        let cursor_x = inner.x + prefix.chars().count() as u16 + state.query.chars().count() as u16;
        frame.set_cursor_position((cursor_x, inner.y));
    }

    fn footer_instructions(&self) -> Line<'static> {
        let key_style = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
        let hints: &[(&str, &str)] = match (&self.screen, &self.mode) {
            (_, Mode::Searching(_)) => &[
                ("[↑↓]", "Select"),
                ("[Tab]", "Field"),
                ("[Ctrl-E]", "Edit"),
                ("[Enter]", "Keep"),
                ("[Esc]", "Clear"),
            ],
            (_, Mode::ShowingStats(_)) => &[("[any key]", "Close")],
            (Screen::Books(_), _) => &[
                ("[↑↓]", "Select"),
                ("[Enter/o]", "Open Library"),
                ("[f]", "Search"),
                ("[+]", "Add"),
                ("[-]", "Delete"),
                ("[e]", "Edit"),
                ("[s]", "Stats"),
                ("[Esc]", "Back"),
                ("[q]", "Quit"),
            ],
            (Screen::Authors, _) => &[
                ("[↑↓]", "Select"),
                ("[Enter]", "Books"),
                ("[b]", "All Books"),
                ("[f]", "Search"),
                ("[+]", "Add"),
                ("[-]", "Delete"),
                ("[e]", "Edit"),
                ("[s]", "Stats"),
                ("[q]", "Quit"),
            ],
        };

        let mut spans = Vec::with_capacity(hints.len() * 2);
        for (idx, (key, action)) in hints.iter().enumerate() {
            spans.push(Span::styled(key.to_string(), key_style));
            let gap = if idx + 1 == hints.len() { "" } else { "   " };
            spans.push(Span::raw(format!(" {action}{gap}")));
        }
        Line::from(spans)
    }

    fn draw_author_form(&self, frame: &mut Frame, area: Rect, title: &str, form: &AuthorForm) {
        let popup_area = centered_rect(60, 40, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title(title).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines = vec![
            form.build_line(AuthorField::Name),
            form.build_line(AuthorField::Email),
            Line::from(""),
        ];
        lines.push(form_hint(form.error.as_deref(), "Tab to switch"));

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);

        let (prefix, row) = match form.active {
            AuthorField::Name => ("Name: ".len(), 0),
            AuthorField::Email => ("Email: ".len(), 1),
        };
        frame.set_cursor_position((
            inner.x + (prefix + form.value_len(form.active)) as u16,
            inner.y + row,
        ));
    }

    fn draw_book_form(&self, frame: &mut Frame, area: Rect, title: &str, form: &BookForm) {
        let popup_area = centered_rect(70, 50, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title(title).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines: Vec<Line> = BookField::ALL
            .iter()
            .map(|field| form.build_line(*field))
            .collect();
        lines.push(Line::from(""));
        lines.push(form_hint(form.error.as_deref(), "Tab/↑↓ to switch"));

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);

        let row = BookField::ALL
            .iter()
            .position(|field| *field == form.active)
            .unwrap_or(0) as u16;
        let prefix = form.active.label().len() + 2;
        frame.set_cursor_position((
            inner.x + (prefix + form.value_len(form.active)) as u16,
            inner.y + row,
        ));
    }

    fn draw_confirm_author(&self, frame: &mut Frame, area: Rect, confirm: &ConfirmAuthorDelete) {
        let mut lines = vec![Line::from(format!(
            "Delete {}?",
            confirm.author.display_name()
        ))];
        if confirm.book_count > 0 {
            lines.push(Line::from(Span::styled(
                format!(
                    "This will also delete their {}.",
                    pluralize(confirm.book_count, "book", "books")
                ),
                Style::default().fg(Color::Red),
            )));
        }
        draw_confirm(frame, area, "Confirm Deletion", lines);
    }

    fn draw_confirm_book(&self, frame: &mut Frame, area: Rect, confirm: &ConfirmBookDelete) {
        let lines = vec![
            Line::from(format!("Delete \"{}\"?", confirm.book.title)),
            Line::from(Span::styled(
                format!("ISBN {}", confirm.book.isbn),
                Style::default().fg(Color::Gray),
            )),
        ];
        draw_confirm(frame, area, "Confirm Deletion", lines);
    }

    fn draw_stats(&self, frame: &mut Frame, area: Rect, stats: &LibraryStats) {
        let popup_area = centered_rect(60, 70, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title("Library Statistics")
            .borders(Borders::ALL);
        let lines: Vec<Line> = stats.report_lines().into_iter().map(Line::from).collect();
        let paragraph = Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, popup_area);
    }

    fn render_book_cards(&self, frame: &mut Frame, area: Rect, books: &[Book], selected: usize) {
        if books.is_empty() || area.height == 0 {
            return;
        }

        let card_height = BOOK_CARD_HEIGHT as usize;
        let capacity = ((area.height as usize) / card_height).max(1);
        let len = books.len();
        let mut start = if selected >= capacity {
            selected + 1 - capacity
        } else {
            0
        };
        if start + capacity > len {
            start = len.saturating_sub(capacity);
        }
        let end = min(start + capacity, len);
        let visible_len = end.saturating_sub(start);
        if visible_len == 0 {
            return;
        }

        let constraints: Vec<Constraint> = (0..visible_len)
            .map(|_| Constraint::Length(BOOK_CARD_HEIGHT))
            .collect();
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(area);

        for (idx, chunk) in rows.iter().enumerate() {
            if chunk.height == 0 {
                continue;
            }
            let book_index = start + idx;
            let Some(book) = books.get(book_index) else {
                break;
            };

            let is_selected = book_index == selected;
            let mut block = Block::default()
                .borders(Borders::ALL)
                .title(format!("#{}", book.id));
            let mut paragraph_style = Style::default();
            if is_selected {
                block = block.style(Style::default().fg(Color::Yellow));
                paragraph_style = Style::default().fg(Color::Yellow);
            }

            let title = if is_selected {
                format!("▶ {}", book.title)
            } else {
                book.title.clone()
            };
            let lines = vec![
                Line::from(Span::styled(
                    title,
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(
                    book_byline(book, self.authors.author_name(book.author_id)),
                    Style::default().fg(Color::Gray),
                )),
                Line::from(Span::styled(
                    book_age_line(book, self.current_year),
                    Style::default().fg(Color::Cyan),
                )),
            ];

            let paragraph = Paragraph::new(lines)
                .block(block)
                .wrap(Wrap { trim: true })
                .alignment(Alignment::Left)
                .style(paragraph_style);
            frame.render_widget(paragraph, *chunk);
        }
    }

    fn set_status<S: Into<String>>(&mut self, text: S, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    fn clear_status(&mut self) {
        self.status = None;
    }

    fn book_store(&self) -> BookStore<'_> {
        BookStore::with_reference_year(&self.conn, self.current_year)
    }

    fn edit_author_mode(author: Author) -> Mode {
        let form = AuthorForm::from_author(&author);
        Mode::EditingAuthor { author, form }
    }

    fn edit_book_mode(book: Book) -> Mode {
        let form = BookForm::from_book(&book);
        Mode::EditingBook { book, form }
    }

    fn stats_mode(&mut self) -> Result<Mode> {
        self.clear_status();
        let stats = library_stats(&self.conn, self.current_year)?;
        Ok(Mode::ShowingStats(stats))
    }

    /// Return to a search interrupted by Ctrl-E, re-running it so edits that
    /// changed whether an entry matches are reflected.
    fn resume_search(&mut self) -> Result<Mode> {
        match self.saved_search.take() {
            Some(state) => {
                self.apply_search(&state)?;
                Ok(Mode::Searching(state))
            }
            None => Ok(Mode::Normal),
        }
    }

    fn save_new_author(&mut self, form: &AuthorForm) -> Result<()> {
        let (name, email) = form.parse_inputs()?;
        let author = AuthorStore::new(&self.conn).create(&name, &email)?;
        self.reload_authors(Some(author.id))?;
        self.set_status(format!("Added {}.", author.name), StatusKind::Info);
        Ok(())
    }

    fn save_existing_author(&mut self, original: &Author, form: &AuthorForm) -> Result<()> {
        let (name, email) = form.parse_inputs()?;
        let name = (name != original.name).then_some(name);
        let email = (email != original.email).then_some(email);
        if name.is_none() && email.is_none() {
            self.set_status("No changes made.", StatusKind::Info);
            return Ok(());
        }

        let author = AuthorStore::new(&self.conn).update(
            original.id,
            name.as_deref(),
            email.as_deref(),
        )?;
        self.reload_authors(Some(author.id))?;
        self.set_status(format!("Updated {}.", author.name), StatusKind::Info);
        Ok(())
    }

    fn perform_author_delete(&mut self, confirm: &ConfirmAuthorDelete) -> Result<()> {
        let removed = AuthorStore::new(&self.conn).delete(confirm.author.id)?;
        self.reload_authors(None)?;
        self.screen = Screen::Authors;
        self.set_status(
            format!(
                "Deleted {} and {}.",
                confirm.author.name,
                pluralize(removed, "book", "books")
            ),
            StatusKind::Info,
        );
        Ok(())
    }

    fn save_new_book(&mut self, form: &BookForm) -> Result<()> {
        let input = form.parse_inputs(self.current_year)?;
        let book = self.book_store().create(
            &input.title,
            &input.isbn,
            input.publication_year,
            &input.genre,
            input.author_id,
        )?;
        self.reload_books(Some(book.id))?;
        self.reload_authors(None)?;
        self.set_status(format!("Added \"{}\".", book.title), StatusKind::Info);
        Ok(())
    }

    fn save_existing_book(&mut self, original: &Book, form: &BookForm) -> Result<()> {
        let changes = form.changes(original, self.current_year)?;
        if changes.is_empty() {
            self.set_status("No changes made.", StatusKind::Info);
            return Ok(());
        }

        let book = self.book_store().update(original.id, changes)?;
        self.reload_books(Some(book.id))?;
        self.reload_authors(None)?;
        self.set_status(format!("Updated \"{}\".", book.title), StatusKind::Info);
        Ok(())
    }

    fn perform_book_delete(&mut self, confirm: &ConfirmBookDelete) -> Result<()> {
        self.book_store().delete(confirm.book.id)?;
        self.reload_books(None)?;
        self.reload_authors(None)?;
        self.set_status(
            format!("Deleted \"{}\".", confirm.book.title),
            StatusKind::Info,
        );
        Ok(())
    }

    fn reload_authors(&mut self, focus_id: Option<i64>) -> Result<()> {
        let authors = AuthorStore::new(&self.conn).get_all_with_counts()?;
        let focus_id = focus_id.or_else(|| self.authors.current().map(|s| s.author.id));
        self.authors.set_authors(authors, focus_id);
        Ok(())
    }

    fn reload_books(&mut self, focus_id: Option<i64>) -> Result<()> {
        let store = BookStore::with_reference_year(&self.conn, self.current_year);
        if let Screen::Books(screen) = &mut self.screen {
            let books = match &screen.scope {
                BookScope::All => store.get_all()?,
                BookScope::Author(author) => store.find_by_author_id(author.id)?,
            };
            let focus_id = focus_id.or_else(|| screen.current().map(|book| book.id));
            screen.set_books(books, focus_id);
        }
        Ok(())
    }

    fn open_books(&mut self, scope: BookScope) -> Result<()> {
        let store = self.book_store();
        let books = match &scope {
            BookScope::All => store.get_all()?,
            BookScope::Author(author) => store.find_by_author_id(author.id)?,
        };
        self.screen = Screen::Books(BooksScreen::new(scope, books));
        Ok(())
    }

    fn open_book_page(&mut self, book: &Book) {
        let url = open_library_url(&book.isbn);
        match open_link(&url) {
            Ok(()) => self.set_status(
                format!("Opened \"{}\" on Open Library.", book.title),
                StatusKind::Info,
            ),
            Err(err) => {
                warn!(book_id = book.id, error = %err, "failed to open browser");
                self.set_status(format!("Failed to open link: {err}"), StatusKind::Error);
            }
        }
    }

    /// Shared list movement for the normal and search modes.
    fn navigate(&mut self, code: KeyCode) -> bool {
        let (offset, edge) = match code {
            KeyCode::Up => (-1, None),
            KeyCode::Down => (1, None),
            KeyCode::PageUp => (-PAGE_SIZE, None),
            KeyCode::PageDown => (PAGE_SIZE, None),
            KeyCode::Home => (0, Some(true)),
            KeyCode::End => (0, Some(false)),
            _ => return false,
        };
        match &mut self.screen {
            Screen::Authors => match edge {
                Some(true) => self.authors.select_first(),
                Some(false) => self.authors.select_last(),
                None => self.authors.move_selection(offset),
            },
            Screen::Books(books) => match edge {
                Some(true) => books.select_first(),
                Some(false) => books.select_last(),
                None => books.move_selection(offset),
            },
        }
        true
    }

    fn visible_count(&self) -> usize {
        match &self.screen {
            Screen::Authors => self.authors.visible.len(),
            Screen::Books(books) => books.visible.len(),
        }
    }

    fn set_matches(&mut self, matches: Option<HashSet<i64>>) {
        match &mut self.screen {
            Screen::Authors => self.authors.set_matches(matches),
            Screen::Books(books) => books.set_matches(matches),
        }
    }

    fn apply_search(&mut self, state: &SearchState) -> Result<()> {
        let query = state.query.trim();
        if query.is_empty() {
            self.set_matches(None);
            return Ok(());
        }
        let matches = self.search_ids(state.field, query)?;
        self.set_matches(Some(matches));
        Ok(())
    }

    /// IDs of the entries the store reports for `query` on `field`. ID
    /// searches that do not parse as a number match nothing.
    fn search_ids(&self, field: SearchField, query: &str) -> Result<HashSet<i64>> {
        let authors = AuthorStore::new(&self.conn);
        let books = self.book_store();
        let parsed_id = query.parse::<i64>().ok();

        let ids: HashSet<i64> = match field {
            SearchField::AuthorName => authors.find_by_name(query)?.iter().map(|a| a.id).collect(),
            SearchField::AuthorEmail => {
                authors.find_by_email(query)?.map(|a| a.id).into_iter().collect()
            }
            SearchField::AuthorId => match parsed_id {
                Some(id) => authors.find_by_id(id)?.map(|a| a.id).into_iter().collect(),
                None => HashSet::new(),
            },
            SearchField::BookTitle => books.find_by_title(query)?.iter().map(|b| b.id).collect(),
            SearchField::BookGenre => books.find_by_genre(query)?.iter().map(|b| b.id).collect(),
            SearchField::BookIsbn => books.find_by_isbn(query)?.map(|b| b.id).into_iter().collect(),
            SearchField::BookId => match parsed_id {
                Some(id) => books.find_by_id(id)?.map(|b| b.id).into_iter().collect(),
                None => HashSet::new(),
            },
        };
        Ok(ids)
    }
}

/// Red error text when the last save failed, otherwise the key hint.
fn form_hint(error: Option<&str>, switch_hint: &str) -> Line<'static> {
    match error {
        Some(error) => Line::from(Span::styled(
            error.to_string(),
            Style::default().fg(Color::Red),
        )),
        None => Line::from(Span::styled(
            format!("Enter to save • {switch_hint} • Esc to cancel"),
            Style::default().fg(Color::Gray),
        )),
    }
}

fn draw_confirm(frame: &mut Frame, area: Rect, title: &str, mut lines: Vec<Line<'static>>) {
    let popup_area = centered_rect(60, 30, area);
    frame.render_widget(Clear, popup_area);

    let block = Block::default().title(title.to_string()).borders(Borders::ALL);
    frame.render_widget(block.clone(), popup_area);
    let inner = block.inner(popup_area);

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Press Y to confirm or N / Esc to cancel.",
        Style::default().fg(Color::Gray),
    )));

    let paragraph = Paragraph::new(lines)
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, inner);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn app() -> App {
        App::new(open_in_memory().unwrap(), 2024).unwrap()
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(code).unwrap();
    }

    fn type_text(app: &mut App, text: &str) {
        for ch in text.chars() {
            press(app, KeyCode::Char(ch));
        }
    }

    fn seed_author(app: &mut App, name: &str, email: &str) -> Author {
        let author = AuthorStore::new(&app.conn).create(name, email).unwrap();
        app.reload_authors(None).unwrap();
        author
    }

    #[test]
    fn adds_author_through_the_form() {
        let mut app = app();
        press(&mut app, KeyCode::Char('+'));
        type_text(&mut app, "Jane Doe");
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "jane@x.com");
        press(&mut app, KeyCode::Enter);

        assert!(matches!(app.mode, Mode::Normal));
        let current = app.authors.current().unwrap();
        assert_eq!(current.author.name, "Jane Doe");
        assert_eq!(current.book_count, 0);
    }

    #[test]
    fn duplicate_email_keeps_form_open_with_error() {
        let mut app = app();
        seed_author(&mut app, "Jane Doe", "jane@x.com");

        press(&mut app, KeyCode::Char('+'));
        type_text(&mut app, "Other");
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "JANE@X.COM");
        press(&mut app, KeyCode::Enter);

        match &app.mode {
            Mode::AddingAuthor(form) => assert!(form.error.is_some()),
            _ => panic!("form should stay open"),
        }
        assert_eq!(app.authors.visible.len(), 1);
    }

    #[test]
    fn deleting_author_confirms_and_cascades() {
        let mut app = app();
        let author = seed_author(&mut app, "Jane Doe", "jane@x.com");
        let books = BookStore::with_reference_year(&app.conn, 2024);
        books
            .create("T1", "0123456789", 2020, "Fiction", author.id)
            .unwrap();
        books
            .create("T2", "9780134685991", 1999, "Drama", author.id)
            .unwrap();

        press(&mut app, KeyCode::Char('-'));
        match &app.mode {
            Mode::ConfirmAuthorDelete(confirm) => assert_eq!(confirm.book_count, 2),
            _ => panic!("expected delete confirmation"),
        }
        press(&mut app, KeyCode::Char('y'));

        assert!(app.authors.visible.is_empty());
        assert!(app.book_store().get_all().unwrap().is_empty());
    }

    #[test]
    fn cancelled_delete_keeps_author() {
        let mut app = app();
        seed_author(&mut app, "Jane Doe", "jane@x.com");
        press(&mut app, KeyCode::Char('-'));
        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.authors.visible.len(), 1);
    }

    #[test]
    fn search_filters_until_cleared() {
        let mut app = app();
        seed_author(&mut app, "Jane Doe", "jane@x.com");
        seed_author(&mut app, "John Roe", "john@x.com");

        press(&mut app, KeyCode::Char('f'));
        type_text(&mut app, "JAN");
        assert_eq!(app.authors.visible.len(), 1);

        press(&mut app, KeyCode::Tab);
        assert_eq!(app.authors.visible.len(), 0);

        press(&mut app, KeyCode::Esc);
        assert!(matches!(app.mode, Mode::Normal));
        assert_eq!(app.authors.visible.len(), 2);
    }

    #[test]
    fn ctrl_e_returns_to_the_search() {
        let mut app = app();
        seed_author(&mut app, "Jane Doe", "jane@x.com");

        press(&mut app, KeyCode::Char('f'));
        type_text(&mut app, "jane");
        app.handle_ctrl_e().unwrap();
        assert!(matches!(app.mode, Mode::EditingAuthor { .. }));

        press(&mut app, KeyCode::Esc);
        match &app.mode {
            Mode::Searching(state) => assert_eq!(state.query, "jane"),
            _ => panic!("search should resume"),
        }
    }

    #[test]
    fn adds_book_for_the_opened_author() {
        let mut app = app();
        let author = seed_author(&mut app, "Jane Doe", "jane@x.com");

        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Char('+'));
        match &app.mode {
            Mode::AddingBook(form) => assert_eq!(form.author_id, author.id.to_string()),
            _ => panic!("expected book form"),
        }
        type_text(&mut app, "T1");
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "0-12-345678-9");
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "2020");
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "Fiction");
        press(&mut app, KeyCode::Enter);

        assert!(matches!(app.mode, Mode::Normal));
        let Screen::Books(books) = &app.screen else {
            panic!("expected books screen");
        };
        assert_eq!(books.current().unwrap().isbn, "0123456789");
        assert_eq!(app.authors.current().unwrap().book_count, 1);
    }

    #[test]
    fn book_form_reports_unknown_author() {
        let mut app = app();
        press(&mut app, KeyCode::Char('b'));
        press(&mut app, KeyCode::Char('+'));
        type_text(&mut app, "T1");
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "0123456789");
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "2020");
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "Fiction");
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "42");
        press(&mut app, KeyCode::Enter);

        match &app.mode {
            Mode::AddingBook(form) => assert_eq!(
                form.error.as_deref(),
                Some("Author with ID 42 does not exist.")
            ),
            _ => panic!("form should stay open"),
        }
    }

    #[test]
    fn stats_overlay_closes_on_any_key() {
        let mut app = app();
        press(&mut app, KeyCode::Char('s'));
        assert!(matches!(app.mode, Mode::ShowingStats(_)));
        press(&mut app, KeyCode::Char('x'));
        assert!(matches!(app.mode, Mode::Normal));
    }

    #[test]
    fn quit_keys_exit_from_authors_screen() {
        let mut app = app();
        assert!(app.handle_key(KeyCode::Char('q')).unwrap());
        press(&mut app, KeyCode::Char('b'));
        assert!(!app.handle_key(KeyCode::Esc).unwrap());
        assert!(matches!(app.screen, Screen::Authors));
    }

    #[test]
    fn draws_every_overlay_without_panicking() {
        let mut app = app();
        let author = seed_author(&mut app, "Jane Doe", "jane@x.com");
        BookStore::with_reference_year(&app.conn, 2024)
            .create("T1", "0123456789", 2020, "Fiction", author.id)
            .unwrap();
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();

        for key in [KeyCode::Char('+'), KeyCode::Esc, KeyCode::Char('s'), KeyCode::Esc] {
            press(&mut app, key);
            terminal.draw(|frame| app.draw(frame)).unwrap();
        }
        press(&mut app, KeyCode::Enter);
        for key in [KeyCode::Char('e'), KeyCode::Esc, KeyCode::Char('-'), KeyCode::Esc] {
            press(&mut app, key);
            terminal.draw(|frame| app.draw(frame)).unwrap();
        }
    }
}
