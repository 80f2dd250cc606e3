use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use tokio::sync::mpsc;
use tracing::{info, warn};

use sysmonbar::config::{Config, load_or_default};
use sysmonbar::format::history_line;
use sysmonbar::logging;
use sysmonbar::report::{Period, Pricing, Report};
use sysmonbar::store::MetricsStore;
use sysmonbar::system::collector::SysinfoMetrics;
use sysmonbar::system::history::SnapshotHistory;
use sysmonbar::system::sampler::{Sampler, SamplerConfig};
use sysmonbar::system::snapshot::Snapshot;

#[derive(Parser)]
#[command(
    name = "sysmonbar",
    about = "Compact hardware monitor with power and temperature analytics"
)]
struct Cli {
    /// Path to config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the power database
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Sample continuously and print one indicator line per tick
    Run {
        /// Sampling interval in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Print snapshots as JSON lines
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Skip the hardware sensor backend and estimate power from CPU load
        #[arg(long, default_value_t = false)]
        no_sensors: bool,
    },
    /// Summarize stored power readings
    Report {
        /// Period: 24h, 7d, 30d or all
        #[arg(long, default_value = "24h")]
        period: Period,

        /// Electricity price per kWh
        #[arg(long)]
        rate: Option<f64>,

        /// Print the report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Delete readings older than the retention window
    Prune {
        /// Retention in days (defaults to the configured value)
        #[arg(long)]
        days: Option<u32>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let (mut config, config_error) = load_or_default(cli.config.as_deref());
    if let Some(db) = &cli.db {
        config.store.path = Some(db.clone());
    }
    logging::init(&config.logging.filter, config.logging.json)?;
    if let Some(err) = config_error {
        warn!(error = %err, "using default configuration");
    }

    match cli.command.unwrap_or(Command::Run {
        interval_ms: None,
        json: false,
        no_sensors: false,
    }) {
        Command::Run {
            interval_ms,
            json,
            no_sensors,
        } => {
            if let Some(ms) = interval_ms {
                config.sampler.interval_ms = ms;
            }
            if no_sensors {
                config.sampler.hardware_sensors = false;
            }
            run(config, json).await
        }
        Command::Report { period, rate, json } => {
            if let Some(rate) = rate {
                config.report.rate_per_kwh = rate;
            }
            report(&config, period, json)
        }
        Command::Prune { days } => {
            if let Some(days) = days {
                config.store.retention_days = days;
            }
            prune(&config)
        }
    }
}

fn open_store(config: &Config) -> Result<MetricsStore> {
    let path = config
        .store
        .resolved_path()
        .ok_or_else(|| eyre!("no data directory available; pass --db"))?;
    MetricsStore::open(&path).wrap_err_with(|| format!("opening {}", path.display()))
}

async fn run(config: Config, json: bool) -> Result<()> {
    if config.sampler.interval_ms == 0 {
        return Err(eyre!("--interval-ms must be greater than 0"));
    }

    let store = Arc::new(open_store(&config)?);
    let retention = config.store.retention();
    if let Err(err) = store.prune(retention) {
        warn!(error = %err, "startup prune failed");
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<Snapshot>();
    let backend = if config.sampler.hardware_sensors {
        Sampler::open_host_backend()
    } else {
        None
    };
    let handle = Sampler::new(
        SamplerConfig::from(&config.sampler),
        Box::new(SysinfoMetrics::new()),
        Box::new(tx),
    )
    .with_backend(backend)
    .with_recorder(store.clone())
    .start()?;
    info!(interval_ms = config.sampler.interval_ms, "sampling");

    let mut history = SnapshotHistory::default();
    let mut prune_interval =
        tokio::time::interval(Duration::from_secs(config.store.prune_interval_secs.max(1)));
    // The first tick fires immediately and the startup prune already ran.
    prune_interval.tick().await;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            maybe_snapshot = rx.recv() => {
                let Some(snapshot) = maybe_snapshot else {
                    break;
                };
                history.record(snapshot);
                if json {
                    println!("{}", serde_json::to_string(&snapshot)?);
                } else if let Some(line) = history_line(&history, &config.display) {
                    println!("{line}");
                }
            }
            _ = prune_interval.tick() => {
                if let Err(err) = store.prune(retention) {
                    warn!(error = %err, "periodic prune failed");
                }
            }
            _ = &mut shutdown => {
                info!("shutting down");
                break;
            }
        }
    }

    handle.stop();
    tokio::task::spawn_blocking(move || handle.join()).await??;
    drop(rx);

    match Arc::try_unwrap(store) {
        Ok(store) => store.close()?,
        Err(_) => warn!("metrics store still shared at shutdown"),
    }
    Ok(())
}

fn report(config: &Config, period: Period, json: bool) -> Result<()> {
    let store = open_store(config)?;
    let report = Report::build(&store, period, Pricing::from(&config.report))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.render());
    }
    store.close()?;
    Ok(())
}

fn prune(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let deleted = store.prune(config.store.retention())?;
    println!(
        "Deleted {deleted} readings older than {} days",
        config.store.retention_days
    );
    store.close()?;
    Ok(())
}
