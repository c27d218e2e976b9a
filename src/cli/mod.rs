//! Command-line interface components
//!
//! Argument parsing, the fetch command handler and progress display.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{Cli, FetchArgs, GlobalArgs};
pub use commands::{api_banner, execute_fetch, handle_fetch, list_matching};
pub use progress::download_bar;
