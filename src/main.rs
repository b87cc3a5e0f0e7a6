use clap::Parser;
use colored::*;

use pollpulse::cli::Args;
use pollpulse::client;
use pollpulse::config::ClientConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match ClientConfig::resolve(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{} {}", "Configuration error:".bright_red().bold(), err);
            std::process::exit(1);
        }
    };

    if let Err(err) = client::run(config).await {
        eprintln!("{} {}", "Error:".bright_red().bold(), err);
        std::process::exit(1);
    }
}
