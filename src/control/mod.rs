//! Command handling for the presentation shell
//!
//! The shell parses a line into a [`ShellCommand`], hands it to
//! [`handle`] together with the [`ControlState`], and renders the [`Reply`].

mod commands;
mod handlers;
mod state;

pub use commands::ShellCommand;
pub use handlers::{default_file_name, finish_input, handle, request_shutdown, Reply, StatusView};
pub use state::ControlState;
