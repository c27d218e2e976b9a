//! Progress display for download runs
//!
//! A single indicatif bar counts finished downloads. Its length grows as the
//! coordinator matches artifacts, since the total is unknown until the last
//! manifest page has been read.

use std::io::IsTerminal;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

const TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} artifacts ({per_sec})";

/// Create the download progress bar
///
/// Returns a hidden bar when `enabled` is false or stderr is not a terminal.
pub fn download_bar(enabled: bool) -> ProgressBar {
    if !enabled || !std::io::stderr().is_terminal() {
        debug!("Progress bar disabled");
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(0);
    match ProgressStyle::default_bar().template(TEMPLATE) {
        Ok(style) => bar.set_style(style.progress_chars("##-")),
        Err(e) => debug!("Progress bar template error: {}", e),
    }
    bar.set_message("Downloading artifacts");
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_is_valid() {
        assert!(ProgressStyle::default_bar().template(TEMPLATE).is_ok());
    }

    #[test]
    fn test_disabled_bar_is_hidden() {
        let bar = download_bar(false);
        assert!(bar.is_hidden());
        bar.inc_length(2);
        bar.inc(1);
        assert_eq!(bar.position(), 1);
    }
}
