use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use restock_watcher::config::LoggingConfig;
use restock_watcher::control::{forward_lines, ControlSurface};
use restock_watcher::dispatcher::AlertDispatcher;
use restock_watcher::fetcher::HttpFetcher;
use restock_watcher::plugins::DiscordNotifier;
use restock_watcher::scheduler::MonitorScheduler;
use restock_watcher::state::{RuntimeFlags, TargetStateStore};
use restock_watcher::AppConfig;

#[derive(Parser)]
#[command(
    name = "restock-watcher",
    version,
    about = "Watch product pages and alert Discord when they restock"
)]
struct Cli {
    /// Configuration file layered over config/default
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level for this crate (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Seconds between automatic checks
    #[arg(long)]
    check_interval: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config =
        AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(interval) = cli.check_interval {
        config.scheduler.check_interval = interval;
        config.validate().context("Invalid --check-interval")?;
    }

    let _guard = init_tracing(&config.logging)?;

    info!("Starting Restock Watcher...");

    let groups = Arc::new(config.load_groups().context("Failed to resolve groups")?);
    let flags = Arc::new(RuntimeFlags::new());
    let states = Arc::new(TargetStateStore::new());

    let fetcher =
        Arc::new(HttpFetcher::new(&config.scraper).context("Failed to build HTTP client")?);
    let notifier = Arc::new(
        DiscordNotifier::new(
            config.notifications.discord.clone(),
            config.notifications.request_timeout(),
        )
        .context("Failed to build webhook client")?,
    );
    let dispatcher = Arc::new(AlertDispatcher::new(
        notifier,
        Arc::clone(&flags),
        config.notifications.dispatch_delay(),
    ));

    let scheduler = Arc::new(
        MonitorScheduler::new(
            groups,
            fetcher,
            Arc::clone(&dispatcher),
            Arc::clone(&states),
            Arc::clone(&flags),
            &config,
        )
        .context("Failed to build scheduler")?,
    );
    let monitor = Arc::clone(&scheduler).spawn();

    let control = ControlSurface::new(scheduler, dispatcher, states, flags);
    let mut stdout = tokio::io::stdout();
    let result = control.run(spawn_stdin_reader(), &mut stdout).await;

    // Any in-progress pass is abandoned
    monitor.abort();
    info!("Shutting down...");

    result.context("Control loop failed")
}

fn init_tracing(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::from_default_env().add_directive(
        format!("restock_watcher={}", logging.level)
            .parse()
            .with_context(|| format!("Invalid log level '{}'", logging.level))?,
    );

    match &logging.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, &logging.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}

/// Blocking stdin reads live on their own thread so they never hold up runtime shutdown.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);

    std::thread::spawn(move || forward_lines(std::io::stdin().lock(), tx));

    rx
}
