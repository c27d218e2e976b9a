//! Parallel artifact fetcher CLI
//!
//! Downloads the artifacts of a CI build that match a glob pattern.

use std::process;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use parallel_artifact::cli::{handle_fetch, Cli};
use parallel_artifact::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error ({}): {}", e.category(), e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // A missing .env file is fine
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();
    init_logging(&cli);

    info!("parallel-artifact v{} starting", env!("CARGO_PKG_VERSION"));

    handle_fetch(&cli.global, cli.fetch).await
}

/// Initialize logging based on CLI verbosity settings
fn init_logging(cli: &Cli) {
    let log_level = cli.log_level();

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("parallel_artifact={}", log_level).parse() {
        filter = filter.add_directive(directive);
    }

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .with_writer(std::io::stderr)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
