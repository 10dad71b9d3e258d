#![deny(unsafe_code)]

//! CivicBridge CLI: ask questions, inspect history and providers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::instrument::WithSubscriber;
use tracing::{Subscriber, debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

use civicbridge_config::AppConfig;
use civicbridge_core::{
    CivicCatalog, FailoverRouter, GeoPoint, HistoryRecorder, InMemoryCatalog, Query, QueryChannel,
};

/// CivicBridge Assist: answers citizen questions about government programs
/// and nearby healthcare using a chain of AI providers.
#[derive(Parser)]
#[command(name = "civicbridge", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "civicbridge.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Route a question through the provider chain and print the answer.
    Ask {
        /// The question text.
        text: String,

        /// Id of the asking user.
        #[arg(short, long)]
        user: String,

        /// Language tag of the question.
        #[arg(short, long, default_value = "en")]
        lang: String,

        /// Latitude of the caller (requires --lon).
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,

        /// Longitude of the caller (requires --lat).
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,

        /// How the question was captured.
        #[arg(long, value_enum, default_value_t = ChannelArg::Text)]
        channel: ChannelArg,
    },

    /// List a user's past questions, newest first.
    History {
        #[arg(short, long)]
        user: String,

        /// Maximum number of records to show.
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },

    /// Show the provider trial order and which providers are enabled.
    Providers,

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ChannelArg {
    Voice,
    Text,
}

impl From<ChannelArg> for QueryChannel {
    fn from(arg: ChannelArg) -> Self {
        match arg {
            ChannelArg::Voice => QueryChannel::Voice,
            ChannelArg::Text => QueryChannel::Text,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)
        .with_subscriber(bootstrap_subscriber(cli.verbose, std::io::stderr))
        .await?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(log_filter(cli.verbose, &config.logging.level)))
        .with_writer(std::io::stderr)
        .init();

    if !cli.config.exists() {
        info!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    match cli.command {
        Commands::Ask {
            text,
            user,
            lang,
            lat,
            lon,
            channel,
        } => {
            let query = build_query(&text, &lang, &user, lat.zip(lon), channel.into())?;
            cmd_ask(&config, &query).await?
        }
        Commands::History { user, limit } => cmd_history(&config, &user, limit).await?,
        Commands::Providers => cmd_providers(&config).await?,
        Commands::Config { show } => cmd_config(&cli.config, &config, show)?,
    }

    Ok(())
}

async fn cmd_ask(config: &AppConfig, query: &Query) -> Result<()> {
    let router = build_router(config).await?;
    let answer = router
        .route(query)
        .await
        .context("no provider could answer the question")?;
    println!("{answer}");
    Ok(())
}

async fn cmd_history(config: &AppConfig, user: &str, limit: usize) -> Result<()> {
    let history = open_history(config)?;
    let records = history.for_user(user).await?;
    if records.is_empty() {
        println!("No history for '{user}'.");
        return Ok(());
    }
    for record in records.iter().take(limit) {
        println!(
            "{}  [{} via {}]  {}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.channel,
            record.provider_name.as_deref().unwrap_or("-"),
            record.query_text
        );
        if let Some(ref response) = record.response_text {
            println!("    {response}");
        }
    }
    Ok(())
}

async fn cmd_providers(config: &AppConfig) -> Result<()> {
    let router = build_router(config).await?;
    println!("primary: {}", router.primary());
    for (position, slot) in router.trial_order().into_iter().enumerate() {
        let limit = if slot.limiter.is_unlimited() {
            "unlimited".to_string()
        } else {
            format!("{} tokens", slot.limiter.capacity())
        };
        println!(
            "{}. {:<12} {:<8} attempts={} rate={}",
            position + 1,
            slot.name(),
            if slot.provider.enabled() { "enabled" } else { "disabled" },
            slot.retry.max_attempts(),
            limit
        );
    }
    Ok(())
}

fn cmd_config(config_path: &Path, config: &AppConfig, show: bool) -> Result<()> {
    if show {
        let toml_str =
            toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {e}"))?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

async fn build_router(config: &AppConfig) -> Result<FailoverRouter> {
    let catalog = load_catalog(config).await?;
    let history = open_history(config)?;
    Ok(FailoverRouter::from_config(config, catalog, history))
}

fn open_history(config: &AppConfig) -> Result<Arc<dyn HistoryRecorder>> {
    civicbridge_core::history::from_config(&config.history)
        .context("failed to open query history")
}

async fn load_catalog(config: &AppConfig) -> Result<Arc<dyn CivicCatalog>> {
    match config.catalog.seed_path {
        Some(ref path) => {
            let catalog = InMemoryCatalog::load(Path::new(path))
                .await
                .with_context(|| format!("failed to load catalog seed '{path}'"))?;
            debug!(path = %path, "catalog seed loaded");
            Ok(Arc::new(catalog))
        }
        None => {
            info!("No catalog seed configured, starting with an empty catalog");
            Ok(Arc::new(InMemoryCatalog::default()))
        }
    }
}

async fn load_config(path: &Path) -> Result<AppConfig> {
    let mut config = if path.exists() {
        AppConfig::load(path).await?
    } else {
        AppConfig::default()
    };
    config.apply_env();
    Ok(config)
}

/// Verbosity flags win over `default_level`.
fn log_filter(verbose: u8, default_level: &str) -> String {
    match verbose {
        0 => default_level.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// `RUST_LOG` wins over everything else.
fn env_filter(fallback: String) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Subscriber active while the config loads, before its logging level is known.
fn bootstrap_subscriber<W>(verbose: u8, writer: W) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(log_filter(verbose, "warn")))
        .with_writer(writer)
        .finish()
}

fn build_query(
    text: &str,
    lang: &str,
    user: &str,
    location: Option<(f64, f64)>,
    channel: QueryChannel,
) -> Result<Query> {
    let mut query = Query::new(text, lang, user)?.with_channel(channel);
    if let Some((lat, lon)) = location {
        query = query.with_location(GeoPoint::new(lat, lon)?);
    }
    Ok(query)
}
