//! pomo daemon - per-chat pomodoro scheduler
//!
//! Runs the scheduler, the progress broadcaster and the Unix socket server
//! that chat clients connect to.
//!
//! # Usage
//!
//! ```bash
//! # Start the daemon (foreground)
//! pomod start
//!
//! # Start with an explicit config file
//! pomod start --config ./pomo.toml
//!
//! # Validate configuration and print the effective values
//! pomod check-config
//!
//! # Start with custom socket path
//! POMO_SOCKET=/run/pomo.sock pomod start
//!
//! # Enable debug logging
//! RUST_LOG=pomod=debug pomod start
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: Graceful shutdown

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pomod::broadcaster::Broadcaster;
use pomod::config::Config;
use pomod::dispatcher::Dispatcher;
use pomod::server::{DaemonServer, SocketNotifier};
use pomod::session::Scheduler;
use pomod::store::{HistoryStore, InMemoryStore, SqliteStore, TaskStore};

/// pomo daemon - pomodoro scheduler for chat clients
#[derive(Parser, Debug)]
#[command(name = "pomod", version, about)]
struct Args {
    /// Config file (default: $XDG_CONFIG_HOME/pomo/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the daemon in the foreground
    Start,
    /// Load and validate the configuration, then exit
    CheckConfig,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;

    match args.command.unwrap_or(Command::Start) {
        Command::Start => run_daemon(config),
        Command::CheckConfig => {
            let rendered = toml::to_string_pretty(&config).context("Failed to render config")?;
            println!("{rendered}");
            Ok(())
        }
    }
}

/// Opens the history and task stores selected by `database_path`.
fn open_stores(config: &Config) -> Result<(Arc<dyn HistoryStore>, Arc<dyn TaskStore>)> {
    if config.uses_in_memory_store() {
        info!("Using in-memory history and task stores");
        let store = Arc::new(InMemoryStore::new());
        let history: Arc<dyn HistoryStore> = store.clone();
        let tasks: Arc<dyn TaskStore> = store;
        return Ok((history, tasks));
    }

    let store = Arc::new(SqliteStore::open(&config.database_path).with_context(|| {
        format!(
            "Failed to open database at {}",
            config.database_path.display()
        )
    })?);
    info!(database = %config.database_path.display(), "Opened SQLite store");
    let history: Arc<dyn HistoryStore> = store.clone();
    let tasks: Arc<dyn TaskStore> = store;
    Ok((history, tasks))
}

/// Runs the daemon (async entry point).
#[tokio::main]
async fn run_daemon(config: Config) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("pomod=info".parse()?)
                .add_directive("pomo_core=info".parse()?)
                .add_directive("pomo_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "pomo daemon starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let (history, tasks) = open_stores(&config)?;
    let routes = Arc::new(SocketNotifier::new());
    let settings = config.timers.settings();

    let scheduler = Scheduler::new(routes.clone(), history, tasks, settings);
    let dispatcher = Dispatcher::new(scheduler.clone(), config.allowed_chat_id);

    let _broadcaster_handle = Broadcaster::new(&scheduler).spawn(cancel_token.clone());

    let server = DaemonServer::new(&config.socket_path, dispatcher, routes, cancel_token);

    info!(
        socket = %config.socket_path.display(),
        allowed_chat_id = ?config.allowed_chat_id,
        work_secs = settings.work.as_secs(),
        break_secs = settings.short_break.as_secs(),
        "Starting server"
    );

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("pomo daemon stopped");
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
