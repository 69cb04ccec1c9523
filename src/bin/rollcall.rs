//! rollcall: check-in bot for Discord.

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use rollcall::commands::CommandDispatcher;
use rollcall::messaging::discord::{DiscordAdapter, GatewayEvent};
use rollcall::messaging::{ChannelRef, MessagingPort};
use rollcall::{CheckinEngine, ResponseStore, RollcallConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// How long `trigger` waits for the gateway before asking questions.
const GATEWAY_READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Scheduled check-in campaigns over Discord direct messages.
#[derive(Parser)]
#[command(name = "rollcall", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Connect, schedule the campaign and reminder, and serve chat commands.
    Run,

    /// Validate the configuration and print upcoming fire times.
    CheckConfig,

    /// Run one campaign immediately, then exit.
    Trigger,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rollcall=info,reqwest=warn,tokio_tungstenite=warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::CheckConfig => check_config(&config),
        Command::Trigger => trigger(config).await,
    }
}

fn load_config(explicit: Option<&Path>) -> anyhow::Result<RollcallConfig> {
    let mut config = match explicit {
        Some(path) => RollcallConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => {
            let path = RollcallConfig::default_config_path();
            if path.exists() {
                RollcallConfig::from_file(&path)
                    .with_context(|| format!("loading config from {}", path.display()))?
            } else {
                RollcallConfig::default()
            }
        }
    };
    config.apply_env_overrides();
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn open_store(config: &RollcallConfig) -> anyhow::Result<Arc<ResponseStore>> {
    let path = config.store.resolved_path();
    let store = if config.store.recover_corrupt {
        ResponseStore::open_or_recover(&path)
    } else {
        ResponseStore::open(&path)
    }
    .with_context(|| format!("opening response store {}", path.display()))?;
    info!(path = %path.display(), "response store opened");
    Ok(Arc::new(store))
}

fn build(config: RollcallConfig) -> anyhow::Result<(Arc<DiscordAdapter>, Arc<CheckinEngine>)> {
    let store = open_store(&config)?;
    let adapter = Arc::new(DiscordAdapter::new(
        &config.discord,
        ChannelRef::new(config.channels.roster_channel_id.clone()),
    ));
    let port: Arc<dyn MessagingPort> = Arc::clone(&adapter) as Arc<dyn MessagingPort>;
    let engine = Arc::new(CheckinEngine::new(config, port, store)?);
    Ok((adapter, engine))
}

fn spawn_gateway(adapter: &Arc<DiscordAdapter>, cancel: &CancellationToken) -> tokio::task::JoinHandle<()> {
    let adapter = Arc::clone(adapter);
    let cancel = cancel.clone();
    tokio::spawn(async move { adapter.run_forever(cancel).await })
}

async fn run(config: RollcallConfig) -> anyhow::Result<()> {
    println!("rollcall v{}", env!("CARGO_PKG_VERSION"));
    let (adapter, engine) = build(config)?;
    let cancel = CancellationToken::new();

    let gateway = spawn_gateway(&adapter, &cancel);
    engine.start()?;
    for job in engine.next_fire_times() {
        if let Some(at) = job.next_fire {
            info!(job = %job.name, rule = %job.rule, next_fire = %at, "scheduled");
        }
    }

    let dispatcher = Arc::new(CommandDispatcher::new(Arc::clone(&engine)));
    let commands = tokio::spawn(serve_commands(Arc::clone(&adapter), dispatcher, cancel.clone()));

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutting down");
    engine.shutdown();
    cancel.cancel();
    let _ = commands.await;
    let _ = gateway.await;
    Ok(())
}

async fn serve_commands(
    adapter: Arc<DiscordAdapter>,
    dispatcher: Arc<CommandDispatcher>,
    cancel: CancellationToken,
) {
    let mut events = adapter.subscribe();
    loop {
        let event = tokio::select! {
            () = cancel.cancelled() => break,
            event = events.recv() => event,
        };
        let message = match event {
            Ok(GatewayEvent::Message(message)) => message,
            Ok(GatewayEvent::Reaction(_)) => continue,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "command listener lagged behind gateway events");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        // Direct messages carry check-in answers, never commands.
        if message.author_is_bot || message.guild_id.is_none() {
            continue;
        }

        let adapter = Arc::clone(&adapter);
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            let Some(reply) = dispatcher.handle_text(&message.author_id, &message.content).await else {
                return;
            };
            let channel = ChannelRef::new(message.channel_id);
            if let Err(e) = adapter.send_message(&channel, &reply).await {
                warn!(%channel, "command reply failed: {e}");
            }
        });
    }
}

fn check_config(config: &RollcallConfig) -> anyhow::Result<()> {
    let now = Utc::now();
    let campaign = &config.campaign;
    println!("configuration ok");
    println!(
        "campaign: {} ({} prompts), next at {}",
        campaign.schedule,
        campaign.prompts.len(),
        campaign.schedule.next_fire_after(now)?
    );
    match (&config.channels.reminder_channel_id, config.reminder.enabled) {
        (Some(channel), true) => println!(
            "reminder: {} to channel {channel}, next at {}",
            config.reminder.schedule,
            config.reminder.schedule.next_fire_after(now)?
        ),
        (None, true) => println!("reminder: enabled but no channel configured; will not be scheduled"),
        (_, false) => println!("reminder: disabled"),
    }
    println!("store: {}", config.store.resolved_path().display());
    Ok(())
}

async fn trigger(config: RollcallConfig) -> anyhow::Result<()> {
    let (adapter, engine) = build(config)?;
    let cancel = CancellationToken::new();
    let gateway = spawn_gateway(&adapter, &cancel);

    if !adapter.wait_until_ready(GATEWAY_READY_TIMEOUT).await {
        cancel.cancel();
        anyhow::bail!(
            "discord gateway not ready after {}s",
            GATEWAY_READY_TIMEOUT.as_secs()
        );
    }

    let result = engine.run_campaign_once().await;
    cancel.cancel();
    let _ = gateway.await;

    let report = result.context("check-in campaign failed")?;
    println!("{report}");
    Ok(())
}
