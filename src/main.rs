//! # Karogs: Latvian flag-day reminder bot
//!
//! Usage:
//!   karogs                       # Run bot + daily scheduler + HTTP gateway
//!   karogs list --year 2026      # Print a year's flag days
//!   karogs next                  # Print the next flag day
//!   karogs remind --dry-run      # Show today's reminder without sending it
//!   karogs config show           # Print the effective configuration

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Datelike;
use clap::{Parser, Subcommand};
use karogs_calendar::{DynamicDateCalculator, FlagDayRegistry, SystemClock};
use karogs_channels::{CommandProcessor, TelegramBot, TelegramChannel};
use karogs_core::{KarogsConfig, SubscriberDirectory};
use karogs_gateway::AppState;
use karogs_scheduler::{
    DEFAULT_WATCH_INTERVAL, FileSubscriberStore, NotificationScheduler, ReminderDispatcher, TickOutcome, message,
};
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(
    name = "karogs",
    version,
    about = "🇱🇻 Karogs: Latvian flag-day reminder bot"
)]
struct Cli {
    /// Config file (default: ~/.karogs/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot, the daily scheduler and the HTTP gateway
    Run,
    /// List flag days of a year
    List {
        /// Year (default: current year)
        #[arg(short, long)]
        year: Option<i32>,
    },
    /// Show the next flag day
    Next,
    /// Run the daily check once, right now
    Remind {
        /// Print the reminder instead of sending it
        #[arg(long)]
        dry_run: bool,
    },
    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (file + environment)
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "karogs=debug,tower_http=debug"
    } else {
        "karogs=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config).await,
        Commands::List { year } => list(&config, year),
        Commands::Next => next(&config),
        Commands::Remind { dry_run } => remind(config, dry_run).await,
        Commands::Config {
            action: ConfigAction::Show,
        } => show_config(config),
    }
}

fn load_config(path: Option<&Path>) -> Result<KarogsConfig> {
    let mut config = match path {
        Some(path) => KarogsConfig::load_from(path)?,
        None => KarogsConfig::load()?,
    };
    config.apply_env()?;
    Ok(config)
}

fn build_registry(config: &KarogsConfig) -> Result<Arc<FlagDayRegistry>> {
    let tz = config.notification.tz()?;
    Ok(Arc::new(FlagDayRegistry::new(
        Arc::new(DynamicDateCalculator::new()),
        Arc::new(SystemClock),
        tz,
    )))
}

/// Everything the daily reminder needs.
struct ReminderStack {
    registry: Arc<FlagDayRegistry>,
    store: Arc<FileSubscriberStore>,
    directory: Arc<dyn SubscriberDirectory>,
    channel: Arc<TelegramChannel>,
    scheduler: Arc<NotificationScheduler>,
}

async fn build_reminder_stack(config: &KarogsConfig) -> Result<ReminderStack> {
    config.validate_for_bot()?;

    let registry = build_registry(config)?;
    let store = Arc::new(FileSubscriberStore::open(&config.storage.subscribers_file()).await?);
    let directory: Arc<dyn SubscriberDirectory> = store.clone();
    let channel = Arc::new(TelegramChannel::new(config.telegram.clone()));

    let dispatcher = Arc::new(
        ReminderDispatcher::new(channel.clone(), directory.clone(), registry.clone()).with_batching(
            config.notification.batch_size,
            Duration::from_millis(config.notification.batch_delay_ms),
        ),
    );
    let scheduler = Arc::new(NotificationScheduler::new(
        registry.clone(),
        directory.clone(),
        dispatcher,
        config.notification.hour,
    ));

    Ok(ReminderStack {
        registry,
        store,
        directory,
        channel,
        scheduler,
    })
}

async fn run(config: KarogsConfig) -> Result<()> {
    let stack = build_reminder_stack(&config).await?;
    tracing::info!(
        "🇱🇻 Karogs v{} starting ({} subscribers)",
        env!("CARGO_PKG_VERSION"),
        stack.directory.count().await?
    );

    stack.scheduler.start();
    let watch_stop = Arc::new(Notify::new());
    let watcher = stack.store.clone().watch(DEFAULT_WATCH_INTERVAL, watch_stop.clone());

    let processor = Arc::new(CommandProcessor::new(
        stack.registry.clone(),
        stack.directory.clone(),
        config.telegram.admin_id,
    ));
    let bot_stop = Arc::new(Notify::new());
    let mut bot_task = tokio::spawn(TelegramBot::new(stack.channel.clone(), processor).run(bot_stop.clone()));

    let gateway_stop = Arc::new(Notify::new());
    let gateway_task = config.gateway.enabled.then(|| {
        let state = Arc::new(AppState::new(stack.registry.clone(), stack.directory.clone()));
        let gateway_config = config.gateway.clone();
        let stop = gateway_stop.clone();
        tokio::spawn(async move { karogs_gateway::start(&gateway_config, state, stop).await })
    });

    let finished_early = tokio::select! {
        _ = shutdown_signal() => {
            tracing::info!("🛑 Shutdown signal received, stopping...");
            None
        }
        result = &mut bot_task => Some(result),
    };

    stack.scheduler.stop();
    bot_stop.notify_one();
    gateway_stop.notify_one();
    watch_stop.notify_one();

    let bot_result = match finished_early {
        Some(result) => result,
        None => match tokio::time::timeout(SHUTDOWN_GRACE, bot_task).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("⚠️ Telegram bot did not stop in time");
                Ok(Ok(()))
            }
        },
    };

    if let Some(task) = gateway_task {
        match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
            Ok(Ok(Err(e))) => tracing::error!("❌ Gateway error: {e}"),
            Ok(Err(e)) => tracing::error!("❌ Gateway task failed: {e}"),
            Err(_) => tracing::warn!("⚠️ Gateway did not stop in time"),
            Ok(Ok(Ok(()))) => {}
        }
    }

    if let Err(e) = watcher.await {
        tracing::error!("❌ Subscriber watcher failed: {e}");
    }

    bot_result??;
    tracing::info!("👋 Karogs stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::warn!("⚠️ Cannot listen for SIGTERM: {e}");
                    std::future::pending::<()>().await;
                }
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn list(config: &KarogsConfig, year: Option<i32>) -> Result<()> {
    config.validate()?;
    let registry = build_registry(config)?;
    let year = year.unwrap_or_else(|| registry.today().year());
    let days = registry.all_flag_days_for_year(year);

    println!("🇱🇻 Latvijas valsts karoga izkāršanas dienas {year}. gadā:\n");
    for day in days.iter() {
        println!(
            "  {} {}  {}",
            day.kind.icon(),
            message::latvian_date(day.day, day.month),
            day.description
        );
    }
    Ok(())
}

fn next(config: &KarogsConfig) -> Result<()> {
    config.validate()?;
    let registry = build_registry(config)?;
    match registry.next_flag_day() {
        Some(next) => println!(
            "{} {}, {}  {}",
            next.flag_day.kind.icon(),
            message::latvian_date(next.flag_day.day, next.flag_day.month),
            next.year,
            next.flag_day.description
        ),
        None => println!("Neizdevās atrast nākamo karoga dienu."),
    }
    Ok(())
}

async fn remind(config: KarogsConfig, dry_run: bool) -> Result<()> {
    if dry_run {
        config.validate()?;
        let registry = build_registry(&config)?;
        match registry.flag_day_today() {
            Some(day) => {
                let next = registry.next_flag_day();
                println!("{}", message::reminder(&day, registry.today(), next.as_ref()));
            }
            None => println!("No flag day today ({})", registry.today()),
        }
        return Ok(());
    }

    let stack = build_reminder_stack(&config).await?;
    match stack.scheduler.run_tick().await {
        TickOutcome::NoFlagDay => println!("No flag day today ({})", stack.registry.today()),
        TickOutcome::NoSubscribers => println!("No subscribers to notify"),
        TickOutcome::Dispatched(summary) => println!(
            "✅ Sent {}/{} reminders ({} failed, {} removed) in {}ms",
            summary.success,
            summary.total(),
            summary.failed,
            summary.removed,
            summary.elapsed.as_millis()
        ),
        TickOutcome::Failed(reason) => anyhow::bail!("Reminder run failed: {reason}"),
    }
    Ok(())
}

fn show_config(mut config: KarogsConfig) -> Result<()> {
    if !config.telegram.bot_token.is_empty() {
        config.telegram.bot_token = "********".into();
    }
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
