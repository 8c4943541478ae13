//! mintview command-line entry point
//!
//! Browse and export tabular datasets from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # First page of the east region
//! mintview page sales.csv -f region=east
//!
//! # Values for a filter picker
//! mintview values sales.csv region
//!
//! # Stream every matching row into a workbook
//! mintview export sales.csv --format xlsx -f region=east -o east.xlsx
//! ```

use tracing_subscriber::EnvFilter;

use mintview::cli::CliInterface;
use mintview::config::Config;
use mintview::error::Result;

/// Application entry point
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Main application logic
///
/// 1. Parse command-line arguments
/// 2. Load configuration
/// 3. Initialize logging
/// 4. Run the subcommand
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;
    initialize_logging(cli.config());
    cli.run().await
}

/// Initialize logging from the configured level
///
/// `RUST_LOG` takes precedence when set.
fn initialize_logging(config: &Config) {
    let level = config.logging.level.to_tracing_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    // Configure timestamps
    if config.logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
