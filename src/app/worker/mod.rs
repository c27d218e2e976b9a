//! Download tasks for matched artifacts
//!
//! Each matched artifact becomes one [`DownloadTask`]. A task validates the
//! artifact path, ensures the destination directory, truncates the file and
//! hands it to the [`crate::app::transport::TransportSelector`]. Its terminal
//! state is returned as a [`crate::app::models::TaskReport`]; tasks never log
//! failures or end the process themselves.
//!
//! # Module Organization
//!
//! - [`path`] - Destination resolution and directory creation
//! - [`task`] - The download task itself

pub mod path;
pub mod task;

pub use path::{ensure_parent_dir, resolve_destination};
pub use task::DownloadTask;
