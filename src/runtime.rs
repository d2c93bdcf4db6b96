//! Async runtime: one pipeline actor per tank.
//!
//! ```text
//!  ProducerGuard ──┐ samples            ┌────────────────────────┐
//!  (generator or   │  mpsc<Envelope>    │       TankActor        │
//!   sensor feed)   ├───────────────────▶│  TankService + sinks   │──▶ HistorySink
//!  TankHandle ─────┘ other commands     │                        │──▶ EventSink
//!   ▲                                   └───────────┬────────────┘
//!   └── follow_config (ConfigStore)                 │ watch<TankView>
//!                                                   ▼
//!                                            subscribers
//! ```
//!
//! Each actor owns its [`TankService`] outright, so no two samples for the
//! same tank are ever processed concurrently, while separate tanks run in
//! parallel with no shared mutable state.  Only one producer may feed a
//! tank at a time: samples are only accepted through the tank's
//! [`ProducerGuard`], and [`TankHandle`] refuses them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration as StdDuration;

use log::{debug, info, warn};
use rand::Rng;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::app::commands::TankCommand;
use crate::app::events::{CommandOutcome, TankView};
use crate::app::ports::{Clock, EventSink, HistorySink, SampleSource};
use crate::app::service::TankService;
use crate::config::{GeneratorConfig, TankConfig};
use crate::error::{EngineError, Result};
use crate::generator::{TelemetryGenerator, TickOutcome};
use crate::model::{TankId, TelemetrySample};

/// Default capacity of a tank's command queue.
pub const DEFAULT_COMMAND_CAPACITY: usize = 256;

type Reply = oneshot::Sender<Result<CommandOutcome>>;

struct Envelope {
    command: TankCommand,
    reply: Option<Reply>,
}

// =============================================================================
// Handle
// =============================================================================

/// Cloneable front door of a tank pipeline.
#[derive(Clone)]
pub struct TankHandle {
    tank_id: TankId,
    tx: mpsc::Sender<Envelope>,
    view: watch::Receiver<TankView>,
    producer: Arc<AtomicBool>,
}

impl TankHandle {
    pub fn tank_id(&self) -> &str {
        &self.tank_id
    }

    /// Send a command and wait for its outcome.  Samples are refused here;
    /// they go through [`ProducerGuard`].
    pub async fn send(&self, command: TankCommand) -> Result<CommandOutcome> {
        self.refuse_samples(&command)?;
        self.request(command).await
    }

    /// Queue a command without waiting.  Fails instead of blocking when the
    /// queue is full.  Samples are refused here as well.
    pub fn submit(&self, command: TankCommand) -> Result<()> {
        self.refuse_samples(&command)?;
        self.enqueue(command)
    }

    fn refuse_samples(&self, command: &TankCommand) -> Result<()> {
        if !matches!(command, TankCommand::Sample(_)) {
            return Ok(());
        }
        if self.producer.load(Ordering::Acquire) {
            Err(EngineError::ProducerBusy(self.tank_id.clone()))
        } else {
            Err(EngineError::ProducerRequired(self.tank_id.clone()))
        }
    }

    async fn request(&self, command: TankCommand) -> Result<CommandOutcome> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope {
                command,
                reply: Some(reply),
            })
            .await
            .map_err(|_| self.closed())?;
        rx.await.map_err(|_| self.closed())?
    }

    fn enqueue(&self, command: TankCommand) -> Result<()> {
        self.tx
            .try_send(Envelope {
                command,
                reply: None,
            })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => EngineError::QueueFull(self.tank_id.clone()),
                mpsc::error::TrySendError::Closed(_) => self.closed(),
            })
    }

    /// Latest published view.
    pub fn view(&self) -> TankView {
        self.view.borrow().clone()
    }

    /// Receiver that wakes on every processed command.
    pub fn subscribe(&self) -> watch::Receiver<TankView> {
        self.view.clone()
    }

    /// Become the tank's only sample producer until the guard is dropped.
    pub fn claim_producer(&self) -> Result<ProducerGuard> {
        self.producer
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| EngineError::ProducerBusy(self.tank_id.clone()))?;
        debug!("tank {}: producer claimed", self.tank_id);
        Ok(ProducerGuard {
            handle: self.clone(),
        })
    }

    fn closed(&self) -> EngineError {
        EngineError::PipelineClosed(self.tank_id.clone())
    }
}

/// Exclusive right to push samples into one tank.  Released on drop.
pub struct ProducerGuard {
    handle: TankHandle,
}

impl ProducerGuard {
    pub fn handle(&self) -> &TankHandle {
        &self.handle
    }

    /// Push a sample and wait until the pipeline has processed it.
    pub async fn send(&self, sample: TelemetrySample) -> Result<CommandOutcome> {
        self.handle.request(TankCommand::Sample(sample)).await
    }
}

impl SampleSource for ProducerGuard {
    fn push(&mut self, sample: TelemetrySample) -> Result<()> {
        self.handle.enqueue(TankCommand::Sample(sample))
    }
}

impl Drop for ProducerGuard {
    fn drop(&mut self) {
        self.handle.producer.store(false, Ordering::Release);
        debug!("tank {}: producer released", self.handle.tank_id);
    }
}

// =============================================================================
// Actor
// =============================================================================

/// Spawn the pipeline task for one tank.
///
/// The task runs until `shutdown` fires or every handle is dropped, and
/// yields the service back so its final state can be inspected.
pub fn spawn_tank<S, C>(
    service: TankService,
    sink: S,
    clock: C,
    capacity: usize,
    shutdown: CancellationToken,
) -> (TankHandle, JoinHandle<TankService>)
where
    S: HistorySink + EventSink + Send + 'static,
    C: Clock + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let (view_tx, view_rx) = watch::channel(service.view());
    let handle = TankHandle {
        tank_id: service.tank_id().to_string(),
        tx,
        view: view_rx,
        producer: Arc::new(AtomicBool::new(false)),
    };
    let task = tokio::spawn(run_tank(service, sink, clock, rx, view_tx, shutdown));
    (handle, task)
}

async fn run_tank<S, C>(
    mut service: TankService,
    mut sink: S,
    clock: C,
    mut rx: mpsc::Receiver<Envelope>,
    view_tx: watch::Sender<TankView>,
    shutdown: CancellationToken,
) -> TankService
where
    S: HistorySink + EventSink,
    C: Clock,
{
    info!("tank {}: pipeline starting", service.tank_id());

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("tank {}: pipeline shutting down", service.tank_id());
                break;
            }

            msg = rx.recv() => {
                let Some(Envelope { command, reply }) = msg else {
                    info!("tank {}: all handles dropped", service.tank_id());
                    break;
                };
                let result = service.handle_command(command, clock.now_utc(), &mut sink);
                view_tx.send_replace(service.view());
                match reply {
                    Some(reply) => {
                        let _ = reply.send(result);
                    }
                    None => {
                        if let Err(e) = result {
                            warn!("tank {}: command failed: {}", service.tank_id(), e);
                        }
                    }
                }
            }
        }
    }

    service
}

// =============================================================================
// Configuration follower
// =============================================================================

/// Forward stored configuration changes into a tank pipeline until
/// `shutdown` fires or the store drops the channel.
///
/// Only values stored after `configs` was subscribed are sent; the one
/// current at subscription is the one the service was built from.
/// Returns the number of updates applied.
pub async fn follow_config(
    handle: TankHandle,
    mut configs: watch::Receiver<Option<TankConfig>>,
    shutdown: CancellationToken,
) -> u64 {
    let tank_id = handle.tank_id().to_string();
    let mut applied = 0;

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => break,

            changed = configs.changed() => {
                if changed.is_err() {
                    debug!("tank {tank_id}: config store closed");
                    break;
                }
                let next = configs.borrow_and_update().clone();
                let Some(config) = next else { continue };
                match handle.send(TankCommand::UpdateConfig(config)).await {
                    Ok(_) => applied += 1,
                    Err(e) => warn!("tank {tank_id}: stored configuration not applied: {e}"),
                }
            }
        }
    }

    applied
}

// =============================================================================
// Generator task
// =============================================================================

/// Totals reported when a generator task stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeneratorReport {
    pub ticks: u64,
    pub emitted: u64,
    pub rejected: u64,
}

/// Drive a tank with synthetic samples until `shutdown` fires.
///
/// The clock is read fresh on every tick, and the tank's geometry and
/// capacity come from its latest view, so configuration changes and
/// business-hours boundaries take effect on the next tick.
pub async fn run_generator<C, R>(
    mut producer: ProducerGuard,
    config: GeneratorConfig,
    clock: C,
    mut rng: R,
    shutdown: CancellationToken,
) -> GeneratorReport
where
    C: Clock,
    R: Rng,
{
    let tank_id = producer.handle().tank_id().to_string();
    let mut generator = TelemetryGenerator::new(config);
    let mut ticker = tokio::time::interval(StdDuration::from_secs(u64::from(
        config.tick_interval_secs.max(1),
    )));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_depth: Option<f64> = None;
    let mut rejected = 0;

    info!(
        "tank {tank_id}: generator started (every {}s)",
        config.tick_interval_secs
    );

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => break,

            _ = ticker.tick() => {
                let view = producer.handle().view();
                let current = view
                    .reading
                    .map(|r| r.depth_mm)
                    .or(last_depth)
                    .unwrap_or(view.geometry.radius_mm);
                let outcome = generator.tick(
                    clock.now_local(),
                    current,
                    &view.geometry,
                    view.capacity_l,
                    &mut rng,
                );
                if let TickOutcome::Emitted { depth_mm, .. } = outcome {
                    last_depth = Some(depth_mm);
                    if let Err(e) = producer.push(TelemetrySample::new(clock.now_utc(), depth_mm)) {
                        rejected += 1;
                        warn!("tank {tank_id}: generator sample not queued: {e}");
                    }
                }
            }
        }
    }

    let report = GeneratorReport {
        ticks: generator.tick_count(),
        emitted: generator.emitted_count(),
        rejected,
    };
    info!(
        "tank {tank_id}: generator stopped ({} ticks, {} samples)",
        report.ticks, report.emitted
    );
    report
}
