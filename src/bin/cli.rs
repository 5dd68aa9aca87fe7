//! stockwatch CLI
//!
//! Local execution entry point.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use stockwatch::{
    error::{AppError, Result},
    models::Config,
    pipeline::Watcher,
    services::{HtmlTableSource, ListingSource, TelegramNotifier},
    utils::http,
};

/// stockwatch - Stock availability watcher with Telegram alerts
#[derive(Parser, Debug)]
#[command(name = "stockwatch", version, about = "Stock availability watcher")]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "stockwatch.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the source on an interval and send Telegram alerts
    Watch,

    /// Fetch once and print the watched listings currently available
    Check,

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("stockwatch starting...");

    let config = Config::load_or_default(&cli.config);

    match cli.command {
        Command::Watch => {
            config.validate()?;
            if config.telegram.chat_id.trim().is_empty() {
                return Err(AppError::config("telegram.chat_id is not set"));
            }
            let token = std::env::var("TELEGRAM_TOKEN")
                .map_err(|_| AppError::config("TELEGRAM_TOKEN environment variable is not set"))?;

            let client = http::create_client(&config.source)?;
            let source = HtmlTableSource::new(client.clone(), &config.source.url);
            let notifier = TelegramNotifier::new(client, &token, &config.telegram);

            log::info!(
                "Watching {} every {}s (+ up to {}s jitter)",
                config.source.url,
                config.watch.poll_interval_secs,
                config.watch.jitter_secs
            );

            let mut watcher = Watcher::new(&config, Box::new(source), Box::new(notifier));
            watcher.run().await?;
        }

        Command::Check => {
            config.validate()?;
            let client = http::create_client(&config.source)?;
            let source = HtmlTableSource::new(client, &config.source.url);

            let listings = source.fetch_listings().await?;
            let filter = config.filter.interest_filter();

            let available: Vec<_> = listings
                .iter()
                .filter(|l| filter.matches(&l.sku) && l.available)
                .collect();

            log::info!(
                "{} watched listings in stock (of {} fetched)",
                available.len(),
                listings.len()
            );
            for listing in available {
                println!(
                    "{} | {} | {} | {}",
                    listing.sku, listing.vendor, listing.price.display, listing.link
                );
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            let config = Config::load(&cli.config)?;
            config.validate()?;
            log::info!("✓ Config OK");
        }
    }

    log::info!("Done!");

    Ok(())
}
