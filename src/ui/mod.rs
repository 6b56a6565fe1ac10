//! Ratatui front-end: an authors screen, a books screen, and modal overlays
//! for forms, confirmations, search and statistics.

mod app;
mod forms;
mod helpers;
mod screens;
mod terminal;

pub use app::App;
pub use terminal::run_app;
