// Firkinize — Application Entry Point
//
// Parses CLI arguments, initializes structured logging on stderr (stdout
// is reserved for requested output such as passwords), and dispatches to
// the command handler.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use firkinize::cli::{execute, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG overrides; --debug raises the default from info to debug.
    // Neither level ever includes secret values.
    let default_filter = if cli.settings.debug {
        "firkinize=debug"
    } else {
        "firkinize=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Debug log enabled");

    if let Err(e) = execute(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
