//! TankWatch: simulation and monitoring entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  MemoryStore        LogSink        JsonConfigStore  SystemClock│
//! │  (History+Events)   (History+      (ConfigStore)    (Clock)    │
//! │  (ConfigStore)       Events)                                   │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │        TankService × N (one tokio actor per tank)      │    │
//! │  │  Geometry · Classifier · Aggregator · Reorder          │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  TelemetryGenerator (one producer per tank, business hours)    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use tankwatch::adapters::fanout::Fanout;
use tankwatch::adapters::json_store::JsonConfigStore;
use tankwatch::adapters::log_sink::LogSink;
use tankwatch::adapters::memory::MemoryStore;
use tankwatch::adapters::time::SystemClock;
use tankwatch::analytics::{
    daily_consumption, headroom_to_critical, last_critical_at, safety_margin,
};
use tankwatch::app::ports::ConfigStore;
use tankwatch::app::service::TankService;
use tankwatch::config::{MonitorConfig, TankConfig, TankEntry};
use tankwatch::error::ConfigError;
use tankwatch::model::TankId;
use tankwatch::runtime::{DEFAULT_COMMAND_CAPACITY, follow_config, run_generator, spawn_tank};

/// Days shown in the shutdown consumption summary.
const SUMMARY_DAYS: usize = 7;

#[derive(Parser, Debug)]
#[command(name = "tankwatch", version, about = "Tank level telemetry and reorder engine")]
struct Cli {
    /// Monitor file (JSON).  Built-in defaults are used when omitted.
    #[arg(long, short, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory of per-tank `<id>.json` configs that take precedence
    /// over the monitor file.
    #[arg(long, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// How often the config directory is re-read for hand edits.
    #[arg(long, default_value_t = 5, value_name = "SECS")]
    config_poll_secs: u64,

    /// Log filter in `RUST_LOG` syntax.  `RUST_LOG` wins when set.
    #[arg(long, default_value = "info")]
    log_filter: String,

    /// Run the synthetic generator even if the monitor file disables it.
    #[arg(long)]
    simulate: bool,

    /// Seed the generator for reproducible runs.
    #[arg(long)]
    seed: Option<u64>,
}

fn init_logging(filter: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .with_context(|| format!("invalid log filter {filter:?}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!(e))
}

/// Stored configuration wins; otherwise seed the store from the monitor
/// file.
fn resolve_config(store: &impl ConfigStore, entry: &TankEntry) -> Result<TankConfig> {
    match store.load(&entry.id) {
        Ok(config) => {
            info!("tank {}: using stored configuration", entry.id);
            Ok(config)
        }
        Err(ConfigError::NotFound(_)) => {
            store
                .save(&entry.id, &entry.config)
                .with_context(|| format!("saving configuration for {}", entry.id))?;
            Ok(entry.config.clone())
        }
        Err(e) => Err(e).with_context(|| format!("loading configuration for {}", entry.id)),
    }
}

/// Re-read the config files so hand edits reach the running pipelines.
async fn poll_config_dir(
    store: JsonConfigStore,
    tank_ids: Vec<TankId>,
    every: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => break,

            _ = ticker.tick() => {
                for id in &tank_ids {
                    if let Err(e) = store.refresh(id) {
                        warn!("tank {id}: config file not applied: {e}");
                    }
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_filter)?;

    info!("==============================");
    info!("  TankWatch v{}", env!("CARGO_PKG_VERSION"));
    info!("==============================");

    let monitor = match &cli.config {
        Some(path) => MonitorConfig::load(path)
            .with_context(|| format!("loading monitor file {}", path.display()))?,
        None => {
            warn!("no monitor file given, using built-in defaults");
            MonitorConfig::default()
        }
    };

    let store = MemoryStore::new();
    let file_store = cli
        .config_dir
        .as_ref()
        .map(JsonConfigStore::open)
        .transpose()
        .context("opening config directory")?;

    let shutdown = CancellationToken::new();
    let simulate = monitor.generator.enabled || cli.simulate;
    let mut pipelines = Vec::with_capacity(monitor.tanks.len());
    let mut generators = Vec::new();
    let mut followers = Vec::with_capacity(monitor.tanks.len());

    for (i, entry) in monitor.tanks.iter().enumerate() {
        let config = match &file_store {
            Some(files) => resolve_config(files, entry)?,
            None => resolve_config(&store, entry)?,
        };
        let configs = match &file_store {
            Some(files) => files.subscribe(&entry.id),
            None => store.subscribe(&entry.id),
        };
        // History lives in memory only, so every run starts cold.
        let service = TankService::new(entry.id.clone(), config, &monitor.engine)
            .with_context(|| format!("starting pipeline for {}", entry.id))?;

        let sink = Fanout::new(store.clone(), LogSink::new());
        let (handle, task) = spawn_tank(
            service,
            sink,
            SystemClock,
            DEFAULT_COMMAND_CAPACITY,
            shutdown.clone(),
        );
        followers.push(tokio::spawn(follow_config(
            handle.clone(),
            configs,
            shutdown.clone(),
        )));

        if simulate {
            let producer = handle.claim_producer()?;
            let rng = match cli.seed {
                Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(i as u64)),
                None => StdRng::from_os_rng(),
            };
            generators.push(tokio::spawn(run_generator(
                producer,
                monitor.generator,
                SystemClock,
                rng,
                shutdown.clone(),
            )));
        }
        pipelines.push((handle, task));
    }

    let poller = file_store.map(|files| {
        let ids = monitor.tanks.iter().map(|t| t.id.clone()).collect();
        let every = Duration::from_secs(cli.config_poll_secs.max(1));
        tokio::spawn(poll_config_dir(files, ids, every, shutdown.clone()))
    });

    info!(
        "monitoring {} tank(s){}; Ctrl-C to stop",
        pipelines.len(),
        if simulate { " with synthetic telemetry" } else { "" }
    );
    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;

    info!("shutdown requested");
    shutdown.cancel();
    for generator in generators {
        generator.await.context("generator task panicked")?;
    }
    for follower in followers {
        let applied = follower.await.context("config follower panicked")?;
        if applied > 0 {
            info!("{applied} configuration update(s) applied at runtime");
        }
    }
    if let Some(poller) = poller {
        poller.await.context("config poller panicked")?;
    }

    for (handle, task) in pipelines {
        let service = task.await.context("pipeline task panicked")?;
        let view = service.view();
        let tank_id = handle.tank_id();
        let min = view.min_threshold_l;
        let history = store.history(tank_id);

        info!(
            "tank {}: {} samples, {} events, {} orders, {} sink failures",
            tank_id,
            view.samples_processed,
            store.events(tank_id).len(),
            store.orders(tank_id).len(),
            view.sink_failures
        );
        if let Some(reading) = view.reading {
            info!(
                "tank {}: {:.0}L ({}), margin {:+.0}L, {:+.0}L to critical",
                tank_id,
                reading.volume_l,
                reading.status,
                safety_margin(reading.volume_l, min),
                headroom_to_critical(reading.volume_l, min)
            );
        }
        for day in daily_consumption(&history, SUMMARY_DAYS) {
            info!("tank {}: {} consumed {:.0}L", tank_id, day.day, day.litres);
        }
        if let Some(at) = last_critical_at(&history, min) {
            info!("tank {}: last critical at {}", tank_id, at);
        }
    }

    info!("TankWatch stopped");
    Ok(())
}
