// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! livetrace main entry point - CLI, commands, and the live server.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{info, warn, Level};

use livetrace::config::{self, CliOptions};
use livetrace::correlation::with_correlation;
use livetrace::health::HealthCollector;
use livetrace::intercept::RunTracker;
use livetrace::store::{LogLevel, NodeKind, TelemetryStore};
use livetrace::stream::{LiveServer, HEALTH_PATH, STREAM_PATH};
use livetrace::telemetry::{init_telemetry, TelemetryConfig};
use livetrace::VERSION;

/// livetrace - live telemetry and correlation tracing.
#[derive(Parser)]
#[command(name = "livetrace")]
#[command(author, version, about = "Live telemetry and correlation tracing", long_about = None)]
struct Cli {
    /// Show verbose output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Show debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Show trace output
    #[arg(long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl Cli {
    fn log_level(&self) -> Level {
        if self.trace {
            Level::TRACE
        } else if self.debug {
            Level::DEBUG
        } else if self.verbose {
            Level::INFO
        } else {
            Level::WARN
        }
    }
}

/// Subcommands for livetrace.
#[derive(Subcommand)]
enum Commands {
    /// Serve the live stream and health routes
    Serve {
        /// Address to listen on
        #[arg(short, long, env = "LIVETRACE_BIND")]
        bind: Option<String>,

        /// Per-buffer capacity of the telemetry store
        #[arg(long, env = "LIVETRACE_MAX_ENTRIES")]
        max_entries: Option<usize>,

        /// Generate a synthetic task workload
        #[arg(long)]
        demo: bool,
    },

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// Initialize a new configuration file
    Init,

    /// Show version information
    Version,
}

/// Config subcommand actions.
#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = cli.log_level();

    let Some(command) = cli.command else {
        println!("{}", "Use 'livetrace serve' to start the live server".cyan());
        println!("{}", "Use 'livetrace config show' to see the resolved configuration".cyan());
        return Ok(());
    };

    // `serve` installs its own subscriber so it can capture into the store.
    if !matches!(command, Commands::Serve { .. }) {
        init_telemetry(&TelemetryConfig::default().with_level(level))?;
    }
    handle_command(command, level).await
}

async fn handle_command(command: Commands, level: Level) -> anyhow::Result<()> {
    match command {
        Commands::Serve {
            bind,
            max_entries,
            demo,
        } => {
            serve(CliOptions { bind, max_entries }, demo, level).await?;
        }
        Commands::Config { action } => match action {
            Some(ConfigAction::Show) | None => {
                let config = config::load_config(&workspace_root()?, CliOptions::default())?;
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
        },
        Commands::Init => {
            let path = config::init_config(&std::env::current_dir()?, None)?;
            println!("{} {}", "Created config file:".green(), path.display());
        }
        Commands::Version => {
            println!("livetrace {}", VERSION);
        }
    }
    Ok(())
}

fn workspace_root() -> anyhow::Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    Ok(config::find_workspace_root(&cwd).unwrap_or(cwd))
}

async fn serve(options: CliOptions, demo: bool, level: Level) -> anyhow::Result<()> {
    let config = config::load_config(&workspace_root()?, options)?;

    // The demo logs at info; keep those events flowing into the store.
    let level = if demo { level.max(Level::INFO) } else { level };

    let store = Arc::new(TelemetryStore::new(config.max_entries));
    let telemetry = TelemetryConfig::default()
        .with_level(level)
        .with_capture(Arc::clone(&store));
    let _guard = init_telemetry(&telemetry)?;

    let health = Arc::new(HealthCollector::new(config.health_config()));
    health.start();

    let server = Arc::new(LiveServer::new(
        Arc::clone(&store),
        Arc::clone(&health),
        config.server_config(),
    ));
    let listener = server.bind().await?;
    let addr = listener.local_addr()?;

    println!("{} {}", "livetrace".bright_blue().bold(), VERSION);
    println!("  stream  http://{}{}", addr, STREAM_PATH);
    println!("  health  http://{}{}", addr, HEALTH_PATH);

    let workload = demo.then(|| spawn_demo(Arc::clone(&store)));
    if workload.is_some() {
        println!("{}", "  demo workload running".dimmed());
    }

    let result = server.serve(listener, shutdown_signal()).await;

    if let Some(workload) = workload {
        workload.abort();
    }
    health.shutdown();
    info!(recorded = store.counts().total(), "shutdown complete");
    Ok(result?)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

fn spawn_demo(store: Arc<TelemetryStore>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(750));
        for iteration in 1u64.. {
            ticker.tick().await;
            let store = Arc::clone(&store);
            tokio::spawn(with_correlation(None, async move {
                if let Err(err) = demo_pipeline(&store, iteration).await {
                    warn!(target: "demo", iteration, error = %err, "pipeline failed");
                }
            }));
        }
    })
}

/// One pass of a small pipeline: a validation hook, then a transform task
/// that fails every fifth batch.
async fn demo_pipeline(store: &TelemetryStore, iteration: u64) -> anyhow::Result<()> {
    RunTracker::run(store, "pipeline", NodeKind::Task, async {
        RunTracker::run(store, "validate", NodeKind::Hook, async {
            store.log(LogLevel::Debug, format!("validating batch {iteration}"));
            Ok::<_, anyhow::Error>(())
        })
        .await?;

        RunTracker::run(store, "transform", NodeKind::Task, async {
            tokio::time::sleep(Duration::from_millis(5 + iteration % 20)).await;
            if iteration % 5 == 0 {
                anyhow::bail!("upstream timed out on batch {iteration}");
            }
            store.record_emission(
                "batch.transformed",
                Some(json!({ "batch": iteration })),
                Some("transform".to_string()),
            );
            info!(target: "demo", batch = iteration, "batch transformed");
            Ok(())
        })
        .await
    })
    .await
}
