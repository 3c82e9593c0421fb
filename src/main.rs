use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use notification_sync::config::{self, AppConfig};
use notification_sync::{
    AppState, ChannelLifecycle, FeedKey, FetchOutcome, HttpNotificationApi, NotificationSync,
    SyncEvent,
};

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Base URL of the notification API, e.g. https://api.example.com/v1.
    /// Can also be specified in config file.
    #[clap(long)]
    pub base_url: Option<String>,

    /// Bearer token sent with every request.
    #[clap(long)]
    pub auth_token: Option<String>,

    /// Timeout in seconds for each request.
    #[clap(long, default_value_t = config::DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub request_timeout_secs: u64,

    /// Interval in seconds between badge polls while in the foreground.
    #[clap(long, default_value_t = 900)]
    pub poll_interval_secs: u64,

    /// Minimum seconds between two unforced badge fetches.
    #[clap(long, default_value_t = 30)]
    pub badge_throttle_secs: u64,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the unread badge count once.
    Badge,
    /// Print the notification feed.
    Feed {
        /// Number of pages to load.
        #[clap(long, default_value_t = 1)]
        pages: u32,
    },
    /// Mark a notification as read.
    MarkRead { notification_id: String },
    /// Poll the badge count until Ctrl+C.
    Watch,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            base_url: args.base_url.clone(),
            auth_token: args.auth_token.clone(),
            request_timeout_secs: args.request_timeout_secs,
            poll_interval_secs: args.poll_interval_secs,
            badge_throttle_secs: args.badge_throttle_secs,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  base_url: {}", app_config.http.base_url);
    info!("  poll_interval: {:?}", app_config.sync.poll_interval);
    info!("  badge_throttle: {:?}", app_config.sync.badge_throttle);

    let api = Arc::new(HttpNotificationApi::new(&app_config.http)?);
    let sync = NotificationSync::create(api, app_config.sync);

    match cli_args.command {
        Command::Badge => {
            let count = sync.badge().fetch(true).await?;
            println!("{}", count);
        }
        Command::Feed { pages } => print_feed(&sync, pages).await?,
        Command::MarkRead { notification_id } => {
            let record = sync.mark_read(&notification_id).settled().await?;
            println!(
                "{} read at {}",
                record.id,
                record
                    .read_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string())
            );
        }
        Command::Watch => watch(&sync).await?,
    }

    sync.teardown();
    Ok(())
}

async fn print_feed(sync: &NotificationSync, pages: u32) -> Result<()> {
    if pages == 0 {
        bail!("--pages must be at least 1");
    }
    let feed = sync.feed(FeedKey::notifications());
    feed.fetch_first_page().await?;
    for _ in 1..pages {
        if feed.fetch_next_page().await? == FetchOutcome::EndOfData {
            break;
        }
    }

    let view = feed.view();
    for record in &view.items {
        println!(
            "{} {} {:<10} {:?} by @{}",
            if record.is_read() { " " } else { "*" },
            record.created_at.format("%Y-%m-%d %H:%M"),
            record.id,
            record.notification_type,
            record.actor.handle,
        );
    }
    println!(
        "{} notifications, {} unread{}",
        view.items.len(),
        view.unread_count(),
        if view.has_next_page { ", more available" } else { "" }
    );
    Ok(())
}

async fn watch(sync: &NotificationSync) -> Result<()> {
    // A terminal is always in the foreground.
    let lifecycle = ChannelLifecycle::new(AppState::Active);
    sync.start_poller(&lifecycle);

    let mut badge = sync.badge().subscribe();
    let mut events = sync.events();
    let mut last_count = None;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            changed = badge.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = *badge.borrow_and_update();
                if !snapshot.is_loading && last_count != Some(snapshot.count) {
                    info!("Unread notifications: {}", snapshot.count);
                    last_count = Some(snapshot.count);
                }
            }
            event = events.recv() => match event {
                Ok(SyncEvent::BadgeFetchFailed { error }) => {
                    warn!("Badge refresh failed: {}", error);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => warn!("Missed {} sync events", n),
                Err(RecvError::Closed) => break,
            },
            _ = &mut ctrl_c => {
                info!("Received Ctrl+C, stopping");
                break;
            }
        }
    }

    sync.teardown();
    if last_count.is_none() {
        error!("No badge count was fetched");
    }
    Ok(())
}
