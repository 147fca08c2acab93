//! queuewatch - retailer order-queue position watcher.
//!
//! Single-shot, cron-style invocation: one pass over the stored order
//! list, then exit.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use queuewatch::cdp::CdpClient;
use queuewatch::config::Config;
use queuewatch::notify::{ChannelSender, DiscordSender, NotificationRouter, SlackSender};
use queuewatch::probe::QueueProbe;
use queuewatch::run::PollRun;

/// queuewatch CLI.
#[derive(Parser)]
#[command(name = "queuewatch")]
#[command(about = "Checks retailer order-queue positions and notifies owners on change")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: PathBuf,

    /// State file path (overrides the config value)
    #[arg(short, long)]
    state: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = if cli.config.exists() {
        Config::load(&cli.config).with_context(|| format!("loading {}", cli.config.display()))?
    } else {
        info!("No config file at {}, using defaults", cli.config.display());
        Config::default()
    };

    let state_path = cli.state.unwrap_or_else(|| config.state.path.clone());

    let http = reqwest::Client::new();
    let slack = SlackSender::new(
        http.clone(),
        config.slack.username.clone(),
        config.slack.icon_emoji.clone(),
    );
    let discord = config.discord.resolve_token().map(|token| {
        Box::new(DiscordSender::new(
            http.clone(),
            token,
            config.discord.api_base.clone(),
        )) as Box<dyn ChannelSender>
    });
    if discord.is_none() {
        info!("No Discord bot token configured; Discord channel disabled");
    }
    let router = NotificationRouter::new(Box::new(slack), discord);

    let probe = QueueProbe::new(Duration::from_millis(config.browser.response_timeout_ms));

    let client = CdpClient::connect(&config.browser.endpoint)
        .await
        .context("connecting to Chrome")?;
    let mut page = client.new_page().await.context("opening browser page")?;

    let run = PollRun::new(state_path, probe, router);
    let result = run.execute(&mut page).await;

    if let Err(e) = client.close_page(page.target_id()).await {
        warn!("Failed to close browser page: {}", e);
    }

    result.context("completing the run")?;
    Ok(())
}
