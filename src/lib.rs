//! Core library surface for the Library Catalog manager.
//!
//! The stores in [`db`] own validation and persistence for authors and books;
//! the terminal UI and the maintenance subcommands in `main.rs` are thin
//! callers on top of them.
pub mod config;
pub mod db;
pub mod error;
pub mod maintenance;
pub mod models;
pub mod stats;
pub mod ui;
pub mod validation;

/// Persistence entry points: open a database, then build a store per entity.
pub use db::{open_database, open_in_memory, AuthorStore, BookStore};

pub use error::{CatalogError, Result};

/// The domain records other layers manipulate.
pub use models::{Author, AuthorSummary, Book, BookChanges};

pub use stats::{library_stats, LibraryStats};

/// The interactive application entry point and state container.
pub use ui::{run_app, App};
