//! feedhook CLI
//!
//! Polls the configured feeds and forum threads and forwards new items to
//! their Discord webhooks.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use feedhook::{
    error::Result,
    models::Config,
    pipeline::Scheduler,
    services::{Strategies, WebhookClient},
    storage::{LocalSeenStore, SeenStore},
    utils::{http, shutdown},
};

/// feedhook - Feed and forum thread forwarder for Discord webhooks
#[derive(Parser, Debug)]
#[command(
    name = "feedhook",
    version,
    about = "Forwards new feed entries and forum posts to Discord webhooks"
)]
struct Cli {
    /// Path to the configuration file (default: $CONFIG_PATH or config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Default)]
enum Command {
    /// Poll every source until interrupted
    #[default]
    Run,

    /// Run a single poll cycle for every source
    Once,

    /// Validate the configuration file
    Validate,

    /// Show the seen-store location and per-source counts
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn config_path(cli: &Cli) -> PathBuf {
    cli.config
        .clone()
        .or_else(|| std::env::var_os("CONFIG_PATH").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

fn load_config(path: &Path) -> Result<Config> {
    let config = Config::load(path).inspect_err(|e| {
        log::error!("Cannot load configuration from {}: {}", path.display(), e);
    })?;
    config.validate().inspect_err(|e| {
        log::error!("Config validation failed: {}", e);
    })?;
    log::info!(
        "Loaded {} source(s) from {}",
        config.feeds.len(),
        path.display()
    );
    Ok(config)
}

/// Wire strategies, store and delivery into a scheduler.
async fn build(config: &Config) -> Result<(Scheduler, Arc<LocalSeenStore>)> {
    let store = Arc::new(LocalSeenStore::open(config.seen_path()).await?);
    let client = http::create_client(&config.http)?;
    let strategies = Strategies::new(client.clone(), &config.thread)?;
    let webhook = WebhookClient::new(client, &config.delivery);

    let scheduler = Scheduler::new(
        Arc::new(strategies),
        store.clone(),
        Arc::new(webhook),
        config,
    );
    Ok((scheduler, store))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let path = config_path(&cli);
    let command = cli.command.unwrap_or_default();

    match command {
        Command::Run => {
            let config = load_config(&path)?;
            if config.feeds.is_empty() {
                log::warn!("No feeds configured, nothing to do");
                return Ok(());
            }

            let (scheduler, store) = build(&config).await?;
            let (trigger, listener) = shutdown::channel();
            tokio::spawn(async move {
                shutdown::os_signal().await;
                log::info!("Shutdown requested, stopping sources...");
                trigger.trigger();
            });

            scheduler.run(listener).await;
            store.flush().await?;
            log::info!("Seen-store saved to {}", store.path().display());
        }

        Command::Once => {
            let config = load_config(&path)?;
            if config.feeds.is_empty() {
                log::warn!("No feeds configured, nothing to do");
                return Ok(());
            }

            let (scheduler, store) = build(&config).await?;
            let results = scheduler.run_once().await;
            store.flush().await?;

            let failed = results.iter().filter(|(_, r)| r.is_err()).count();
            log::info!(
                "Cycle complete: {} source(s), {} failed",
                results.len(),
                failed
            );
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            let config = load_config(&path)?;
            for source in &config.feeds {
                log::info!(
                    "  {} [{}] {}",
                    source.name,
                    source.strategy.as_str(),
                    source.url
                );
            }
            log::info!("✓ Config OK");
        }

        Command::Info => {
            let config = load_config(&path)?;
            let seen_path = config.seen_path();
            log::info!("Seen-store: {}", seen_path.display());

            if !seen_path.exists() {
                log::info!("No seen-store yet.");
                return Ok(());
            }

            let store = LocalSeenStore::open(seen_path).await?;
            let summary = store.summary().await;
            for source in &config.feeds {
                match summary.get(source.key()) {
                    Some(count) => log::info!("  {}: {} seen", source.name, count),
                    None => log::info!("  {}: not polled yet", source.name),
                }
            }
            for (name, count) in &summary {
                if !config.feeds.iter().any(|s| s.key() == name.as_str()) {
                    log::info!("  {} (no longer configured): {} seen", name, count);
                }
            }
        }
    }

    Ok(())
}
