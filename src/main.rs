#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod app;
mod cli;

use cli::commands::Cli;
use microprobe::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Install the ring provider as the process-level rustls default.
    if let Err(e) = rustls::crypto::ring::default_provider().install_default() {
        eprintln!("Warning: Failed to install default crypto provider: {e:?}");
    }

    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config.as_deref())?;

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        config.logging.level()?
    };
    // Logs go to stderr so reports printed to stdout stay valid JSON.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    app::dispatch::dispatch(cli, config).await
}
