//! Line-oriented terminal front end
//!
//! Reads commands from an input stream, runs them through
//! [`crate::control`], and renders replies and session events through a
//! [`Presenter`].

mod presenter;
mod repl;

pub use presenter::{format_elapsed, Presenter, TerminalPresenter};
pub use repl::run;
