use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use notification_relay::app::{self, Config};
use notification_relay::capability::{CapabilityChecker, FileSecureSettings};
use notification_relay::notify::{self, protocol::extra_keys, Broadcast, NOTIFICATION_ACTION};

/// Notification Relay - stream captured system notifications to one consumer
#[derive(Parser)]
#[command(name = "notification-relay")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    /// Config file (defaults to ~/.config/notification-relay/config.toml)
    #[arg(short, long, env = "NOTIFICATION_RELAY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream notifications to stdout as JSON lines (default)
    Listen,
    /// Report whether notification access is granted
    Check,
    /// Send a notification broadcast to the relay, as the observer would
    Post {
        /// Package that posted the notification
        #[arg(long)]
        package: String,
        /// Notification title
        #[arg(long)]
        title: Option<String>,
        /// Notification text
        #[arg(long)]
        text: Option<String>,
        /// Additional extras as key=value (value parsed as JSON when possible)
        #[arg(long = "extra", value_parser = parse_extra)]
        extras: Vec<(String, Value)>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_default(),
    };

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    init_logging(level)?;

    match cli.command {
        Some(Commands::Check) => run_check(&config),
        Some(Commands::Post {
            package,
            title,
            text,
            extras,
        }) => run_post(&config, package, title, text, extras),
        Some(Commands::Listen) | None => run_listen(config),
    }
}

fn parse_extra(s: &str) -> std::result::Result<(String, Value), String> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{}`", s))?;
    if key.is_empty() {
        return Err(format!("empty key in `{}`", s));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

fn run_check(config: &Config) -> Result<()> {
    let checker = CapabilityChecker::new(
        Arc::new(FileSecureSettings::new(&config.settings_path)),
        config.app_id.clone(),
    );

    if checker.is_granted() {
        println!("Notification access granted for {}", config.app_id);
        Ok(())
    } else {
        println!("Notification access NOT granted for {}", config.app_id);
        std::process::exit(1);
    }
}

fn run_post(
    config: &Config,
    package: String,
    title: Option<String>,
    text: Option<String>,
    extras: Vec<(String, Value)>,
) -> Result<()> {
    let mut broadcast = Broadcast::new(NOTIFICATION_ACTION)
        .with_extra(extra_keys::PACKAGE, package)
        .with_extra(extra_keys::TIMESTAMP, chrono::Utc::now().timestamp_millis());
    if let Some(title) = title {
        broadcast = broadcast.with_extra(extra_keys::TITLE, title);
    }
    if let Some(text) = text {
        broadcast = broadcast.with_extra(extra_keys::TEXT, text);
    }
    for (key, value) in extras {
        broadcast = broadcast.with_extra(key, value);
    }

    notify::send_broadcast(&config.socket_path, &broadcast)
        .context("Is `notification-relay listen` running?")?;
    info!("Broadcast sent successfully");
    Ok(())
}

fn run_listen(config: Config) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async {
        let mut stdout = std::io::stdout();
        let interrupted = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        };
        app::listen::run(&config, &mut stdout, interrupted).await
    })
}

fn init_logging(level: &str) -> Result<()> {
    let log_dir = directories::ProjectDirs::from("", "", "notification-relay")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("notification-relay"));

    std::fs::create_dir_all(&log_dir)?;
    let log_file = std::fs::File::create(log_dir.join("notification-relay.log"))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(log_file))
        .init();

    info!("Notification Relay starting");
    Ok(())
}
