mod commands;
mod scheduler;
mod server;
mod settings;
#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use streakline_core::store::{AnalyticsStore, MemoryStore, StoreHandle};
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

use settings::Settings;

#[derive(Parser)]
#[command(name = "streakline")]
#[command(author, version, about = "GitHub contribution analytics and stats cards")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Enable debug logging")]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Fetch fresh analytics for a user and store them")]
    Update {
        username: String,
        #[arg(long, help = "Output as JSON")]
        json: bool,
        #[arg(long, help = "Disable spinner")]
        no_spinner: bool,
    },
    #[command(about = "Show the stored analytics for a user")]
    Show {
        username: String,
        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
    #[command(about = "Render the stats card for a user")]
    Card {
        username: String,
        #[arg(short, long, help = "Write to this path instead of <username>-stats.svg")]
        output: Option<PathBuf>,
        #[arg(long, help = "Rasterize to PNG")]
        png: bool,
        #[arg(long, default_value = "2.0", help = "PNG scale factor (0.5 - 4.0)")]
        scale: f32,
    },
    #[command(about = "Run the HTTP API and the scheduled refresh")]
    Serve {
        #[arg(long, help = "Listen address (overrides HOST)")]
        host: Option<String>,
        #[arg(long, help = "Listen port (overrides PORT)")]
        port: Option<u16>,
        #[arg(long, help = "Keep snapshots in memory instead of SQLite")]
        memory: bool,
    },
    #[command(about = "Refresh users periodically")]
    Schedule {
        #[arg(help = "Users to refresh (defaults to `users` from the config file)")]
        users: Vec<String>,
        #[arg(long, help = "Hours between refreshes (default 6)")]
        interval_hours: Option<u64>,
        #[arg(long, help = "Refresh once and exit")]
        once: bool,
    },
    #[command(about = "Remove deprecated columns from the analytics database")]
    Migrate,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Update {
            username,
            json,
            no_spinner,
        } => {
            init_logging(cli.debug, "warn");
            commands::run_update(&username, json, no_spinner)
        }
        Commands::Show { username, json } => {
            init_logging(cli.debug, "warn");
            commands::run_show(&username, json)
        }
        Commands::Card {
            username,
            output,
            png,
            scale,
        } => {
            init_logging(cli.debug, "warn");
            commands::card::run_card(&username, output, png, scale)
        }
        Commands::Serve { host, port, memory } => {
            init_logging(cli.debug, "info");
            run_serve(host, port, memory)
        }
        Commands::Schedule {
            users,
            interval_hours,
            once,
        } => {
            init_logging(cli.debug, "info");
            run_schedule(users, interval_hours, once)
        }
        Commands::Migrate => {
            init_logging(cli.debug, "warn");
            commands::run_migrate()
        }
    }
}

/// `--debug` wins over `RUST_LOG`, which wins over the per-command default.
fn init_logging(debug: bool, default_level: &str) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run_serve(host: Option<String>, port: Option<u16>, memory: bool) -> Result<()> {
    let settings = Settings::load();

    let store: Arc<dyn AnalyticsStore> = if memory {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(StoreHandle::new(settings.database_path()))
    };
    let aggregator = Arc::new(commands::build_aggregator(&settings, store)?);

    let host = host.unwrap_or_else(|| settings.host.clone());
    let port = port.unwrap_or(settings.port);

    let rt = Runtime::new()?;
    rt.block_on(async {
        if !settings.users.is_empty() {
            tokio::spawn(scheduler::run(
                Arc::clone(&aggregator),
                settings.users.clone(),
                settings.refresh_interval(),
                false,
            ));
        }

        server::serve(server::AppState::new(aggregator), &host, port).await
    })
}

fn run_schedule(users: Vec<String>, interval_hours: Option<u64>, once: bool) -> Result<()> {
    let mut settings = Settings::load();
    if let Some(hours) = interval_hours {
        settings.refresh_interval_hours = hours;
    }

    let users = if users.is_empty() {
        settings.users.clone()
    } else {
        users
    };
    if users.is_empty() {
        bail!("No users to refresh: pass usernames or set `users` in the config file");
    }

    let store = Arc::new(StoreHandle::new(settings.database_path()));
    let aggregator = Arc::new(commands::build_aggregator(&settings, store)?);

    let rt = Runtime::new()?;
    rt.block_on(async {
        tokio::select! {
            _ = scheduler::run(aggregator, users, settings.refresh_interval(), once) => {}
            _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted"),
        }
    });

    Ok(())
}
