//! Ratatui front-end: a paged bird list beside an info card, with popups for
//! adding, editing and deleting, and a statistics screen.

mod app;
mod forms;
mod helpers;
mod terminal;

pub use app::App;
pub use terminal::run_app;
