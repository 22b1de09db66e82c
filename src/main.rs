//
// main.rs
// spherical-tools
//
// Tokio entry point that hands off execution to the CLI layer so multi-file reads can be dispatched concurrently.
//

use tracing_subscriber::EnvFilter;

use spherical_tools::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logging is opt-in via RUST_LOG; default to warnings so CLI output stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    cli::run().await
}
