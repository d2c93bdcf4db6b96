//! Tank service: the hexagonal core of one tank pipeline.
//!
//! [`TankService`] owns the explicit per-tank state: configuration,
//! aggregation slot, reorder guard and last reading.  Samples run through
//! the whole pipeline before the next one is accepted; all output flows
//! through port traits injected at call sites, making the service
//! testable with mock adapters.
//!
//! ```text
//!                 ┌──────────────────────────────────────┐
//!  TelemetrySample│             TankService              │
//!  ──────────────▶│ clamp ─▶ volume ─▶ classify          │──▶ EventSink
//!                 │           ─▶ aggregate ─▶ reorder    │
//!                 └──────────────────────────────────────┘──▶ HistorySink
//! ```

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::aggregator::{Admission, PreviousSample, RefillAggregator, Transition};
use crate::classifier::classify;
use crate::config::{EngineConfig, TankConfig};
use crate::error::{self, ConfigError, EngineError, SinkError};
use crate::model::{
    DerivedReading, LevelSnapshot, Notification, PendingOrder, RefillEvent, Severity, TankId,
    TelemetrySample,
};
use crate::reorder::{ReorderDecision, ReorderPolicy};

use super::commands::TankCommand;
use super::events::{CommandOutcome, DropReason, SampleOutcome, TankView};
use super::ports::{EventSink, HistorySink};

/// Last known state, used to warm-start a pipeline after a restart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TankSnapshot {
    pub last_sample: Option<TelemetrySample>,
    pub last_event: Option<RefillEvent>,
    pub pending_order: Option<PendingOrder>,
}

// ───────────────────────────────────────────────────────────────
// TankService
// ───────────────────────────────────────────────────────────────

pub struct TankService {
    tank_id: TankId,
    config: TankConfig,
    /// Derived from `config`; refreshed on every update.
    capacity_l: f64,
    aggregator: RefillAggregator,
    reorder: ReorderPolicy,
    last_reading: Option<DerivedReading>,
    samples_processed: u64,
    sink_failures: u64,
}

impl TankService {
    /// Construct a cold pipeline.  Call [`restore`](Self::restore) to warm
    /// start from persisted state.
    pub fn new(
        tank_id: impl Into<TankId>,
        config: TankConfig,
        engine: &EngineConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        engine.validate()?;
        Ok(Self {
            tank_id: tank_id.into(),
            capacity_l: config.effective_capacity(),
            config,
            aggregator: RefillAggregator::new(engine),
            reorder: ReorderPolicy::new(),
            last_reading: None,
            samples_processed: 0,
            sink_failures: 0,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Initialise from the last known sample, refill event and order.
    pub fn restore(&mut self, snapshot: TankSnapshot) {
        let mut previous = None;
        if let Some(sample) = snapshot.last_sample.filter(|s| s.depth_mm.is_finite()) {
            let (reading, _) = self.derive(sample);
            self.last_reading = Some(reading);
            previous = Some(PreviousSample {
                sample,
                volume_l: reading.volume_l,
            });
        }
        info!(
            "tank {}: restored (sample={}, event={}, order={})",
            self.tank_id,
            previous.is_some(),
            snapshot.last_event.is_some(),
            snapshot.pending_order.is_some()
        );
        self.aggregator.restore(previous, snapshot.last_event);
        self.reorder.restore(snapshot.pending_order);
    }

    /// Current state in restorable form.
    pub fn snapshot(&self) -> TankSnapshot {
        TankSnapshot {
            last_sample: self.aggregator.previous().map(|p| p.sample),
            last_event: self.aggregator.last_event().cloned(),
            pending_order: self.reorder.pending().cloned(),
        }
    }

    // ── Sample pipeline ───────────────────────────────────────

    /// Run one sample end to end: clamp → volume → status → aggregate →
    /// reorder → history.
    pub fn process_sample(
        &mut self,
        sample: TelemetrySample,
        sink: &mut (impl HistorySink + EventSink),
    ) -> SampleOutcome {
        if !sample.depth_mm.is_finite() {
            warn!(
                "tank {}: dropping non-finite depth {} at {}",
                self.tank_id, sample.depth_mm, sample.timestamp
            );
            return SampleOutcome::Dropped(DropReason::NonFinite);
        }
        match self.aggregator.admit(&sample) {
            Admission::Fresh => {}
            Admission::Duplicate => {
                debug!("tank {}: duplicate sample at {}", self.tank_id, sample.timestamp);
                return SampleOutcome::Dropped(DropReason::Duplicate);
            }
            Admission::OutOfOrder { previous } => {
                warn!(
                    "tank {}: sample at {} is older than {}, dropped",
                    self.tank_id, sample.timestamp, previous
                );
                return SampleOutcome::Dropped(DropReason::OutOfOrder);
            }
        }
        self.samples_processed += 1;

        // 1–2. Geometry and classification
        let (reading, clamped) = self.derive(sample);
        if clamped {
            warn!(
                "tank {}: depth {:.1}mm out of range, clamped to {:.1}mm",
                self.tank_id, sample.depth_mm, reading.depth_mm
            );
        }
        let previous_volume = self.last_reading.map(|r| r.volume_l);
        if let Some(prev) = self.last_reading {
            if prev.status != reading.status {
                info!(
                    "tank {}: status {} -> {} ({:.0}L)",
                    self.tank_id, prev.status, reading.status, reading.volume_l
                );
            }
        }

        // 3. Refill aggregation
        let transition = self.aggregator.observe(sample, reading.volume_l);
        match &transition {
            Transition::Opened(event) => {
                let result = sink.append_event(&self.tank_id, event);
                self.deliver("refill event", result);
                let n = self.notification(
                    reading.timestamp,
                    Severity::Success,
                    "Refill detected",
                    format!(
                        "Inflow of {:.0} L detected. Confirm the supplier.",
                        event.amount
                    ),
                    reading.volume_l,
                    Some(event.volume_before),
                );
                let result = sink.notify(&n);
                self.deliver("refill notification", result);
            }
            Transition::Extended(event) => {
                let result = sink.update_event(&self.tank_id, event);
                self.deliver("refill update", result);
            }
            _ => {}
        }

        // 4. Reorder policy
        let reorder = self
            .reorder
            .evaluate(reading.volume_l, reading.timestamp, &self.config);
        if let ReorderDecision::Placed(order) = &reorder {
            let result = sink.place_order(&self.tank_id, order);
            self.deliver("order", result);
            let n = self.notification(
                reading.timestamp,
                Severity::Critical,
                "Automatic order",
                format!(
                    "Critical level! Order of {:.0} L placed with {}.",
                    order.volume, order.supplier_name
                ),
                reading.volume_l,
                previous_volume,
            );
            let result = sink.notify(&n);
            self.deliver("order notification", result);
        }

        // 5. History
        let result = sink.append(&self.tank_id, &reading);
        self.deliver("reading", result);
        debug!(
            "tank {}: {:.0}mm {:.0}L {}",
            self.tank_id, reading.depth_mm, reading.volume_l, reading.status
        );
        self.last_reading = Some(reading);

        SampleOutcome::Processed {
            reading,
            clamped,
            transition,
            reorder,
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an inbound command.  `now` timestamps notifications and
    /// override samples the command produces.
    pub fn handle_command(
        &mut self,
        cmd: TankCommand,
        now: DateTime<Utc>,
        sink: &mut (impl HistorySink + EventSink),
    ) -> error::Result<CommandOutcome> {
        match cmd {
            TankCommand::Sample(sample) => {
                Ok(CommandOutcome::Sample(self.process_sample(sample, sink)))
            }
            TankCommand::UpdateConfig(config) => self.update_config(config, now, sink),
            TankCommand::ConfirmSupplier {
                event_id,
                confirmed,
            } => {
                let event = self.aggregator.apply_confirmation(&event_id, confirmed)?;
                info!(
                    "tank {}: refill {} supplier {:?}",
                    self.tank_id, event.id, event.confirmed_supplier
                );
                let result = sink.update_event(&self.tank_id, &event);
                self.deliver("refill update", result);
                Ok(CommandOutcome::SupplierRecorded(event))
            }
            TankCommand::FulfilOrder => {
                let order = self.reorder.fulfil()?;
                info!("tank {}: order {} fulfilled", self.tank_id, order.id);
                self.close_order(&order, now, "Order received", sink);
                Ok(CommandOutcome::OrderFulfilled(order))
            }
            TankCommand::ExecuteRefill => {
                if self.reorder.pending().is_none() {
                    return Err(EngineError::NoPendingOrder);
                }
                let target = self.config.reorder_target();
                let depth_mm = self.config.geometry.depth_for_volume(target);
                let override_sample = TelemetrySample::new(now, depth_mm);
                // The order stays pending unless the delivery reading can land.
                if let Admission::OutOfOrder { previous } = self.aggregator.admit(&override_sample)
                {
                    warn!(
                        "tank {}: refill at {} predates last sample at {}, order kept",
                        self.tank_id, now, previous
                    );
                    return Err(EngineError::StaleOverride { at: now, previous });
                }

                let order = self.reorder.fulfil()?;
                info!(
                    "tank {}: executing order {}, filling to {:.0}L ({:.1}mm)",
                    self.tank_id, order.id, target, depth_mm
                );
                self.close_order(&order, now, "Refill delivered", sink);
                let sample = self.process_sample(override_sample, sink);
                if let SampleOutcome::Dropped(reason) = &sample {
                    warn!(
                        "tank {}: delivery reading for order {} dropped ({:?})",
                        self.tank_id, order.id, reason
                    );
                }
                Ok(CommandOutcome::RefillExecuted {
                    order,
                    depth_mm,
                    sample,
                })
            }
        }
    }

    /// Swap the configuration if it validates.  On rejection the last valid
    /// configuration stays in effect and a warning notification goes out.
    pub fn update_config(
        &mut self,
        config: TankConfig,
        now: DateTime<Utc>,
        sink: &mut impl EventSink,
    ) -> error::Result<CommandOutcome> {
        if let Err(e) = config.validate() {
            warn!("tank {}: configuration rejected: {}", self.tank_id, e);
            let volume = self.last_reading.map_or(0.0, |r| r.volume_l);
            let n = self.notification(
                now,
                Severity::Warning,
                "Configuration rejected",
                format!("{e}. The previous configuration remains in effect."),
                volume,
                None,
            );
            let result = sink.notify(&n);
            self.deliver("config notification", result);
            return Err(e.into());
        }

        let geometry_changed = config.geometry != self.config.geometry;
        self.config = config;
        self.capacity_l = self.config.effective_capacity();
        if geometry_changed {
            self.aggregator.reproject(&self.config.geometry);
        }
        if let Some(reading) = self.last_reading {
            let (rederived, _) = self.derive(reading.sample());
            self.last_reading = Some(rederived);
        }
        info!(
            "tank {}: configuration updated (capacity {:.0}L, min {:.0}L)",
            self.tank_id, self.capacity_l, self.config.min_threshold_l
        );
        Ok(CommandOutcome::ConfigApplied {
            capacity_l: self.capacity_l,
        })
    }

    /// Swap the noise floor and window; in-flight aggregation is kept.
    pub fn set_engine(&mut self, engine: &EngineConfig) -> Result<(), ConfigError> {
        engine.validate()?;
        self.aggregator.set_engine(engine);
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn tank_id(&self) -> &str {
        &self.tank_id
    }

    pub fn config(&self) -> &TankConfig {
        &self.config
    }

    pub fn capacity(&self) -> f64 {
        self.capacity_l
    }

    pub fn last_reading(&self) -> Option<&DerivedReading> {
        self.last_reading.as_ref()
    }

    pub fn pending_order(&self) -> Option<&PendingOrder> {
        self.reorder.pending()
    }

    pub fn last_event(&self) -> Option<&RefillEvent> {
        self.aggregator.last_event()
    }

    pub fn view(&self) -> TankView {
        TankView {
            tank_id: self.tank_id.clone(),
            name: self.config.name.clone(),
            geometry: self.config.geometry,
            capacity_l: self.capacity_l,
            min_threshold_l: self.config.min_threshold_l,
            reading: self.last_reading,
            last_event: self.aggregator.last_event().cloned(),
            pending_order: self.reorder.pending().cloned(),
            samples_processed: self.samples_processed,
            sink_failures: self.sink_failures,
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn derive(&self, sample: TelemetrySample) -> (DerivedReading, bool) {
        let geometry = &self.config.geometry;
        let clamped = geometry.clamp_depth(sample.depth_mm);
        let volume_l = geometry.volume_at(clamped.depth_mm);
        let reading = DerivedReading {
            timestamp: sample.timestamp,
            raw_depth_mm: sample.depth_mm,
            depth_mm: clamped.depth_mm,
            volume_l,
            status: classify(volume_l, self.config.min_threshold_l),
        };
        (reading, clamped.was_clamped())
    }

    fn notification(
        &self,
        timestamp: DateTime<Utc>,
        severity: Severity,
        title: &str,
        message: String,
        volume_l: f64,
        previous_volume_l: Option<f64>,
    ) -> Notification {
        Notification {
            tank_id: self.tank_id.clone(),
            timestamp,
            severity,
            title: title.to_string(),
            message,
            snapshot: LevelSnapshot {
                volume_l,
                capacity_l: self.capacity_l,
                previous_volume_l,
            },
        }
    }

    fn close_order(
        &mut self,
        order: &PendingOrder,
        now: DateTime<Utc>,
        title: &str,
        sink: &mut impl EventSink,
    ) {
        let result = sink.close_order(&self.tank_id, order);
        self.deliver("order close", result);
        let volume = self.last_reading.map_or(0.0, |r| r.volume_l);
        let n = self.notification(
            now,
            Severity::Info,
            title,
            format!(
                "Order {} for {:.0} L from {} closed.",
                order.id, order.volume, order.supplier_name
            ),
            volume,
            None,
        );
        let result = sink.notify(&n);
        self.deliver("order notification", result);
    }

    /// Sink failures never touch in-memory state.
    fn deliver(&mut self, what: &str, result: Result<(), SinkError>) {
        if let Err(e) = result {
            self.sink_failures += 1;
            warn!("tank {}: {} not delivered: {}", self.tank_id, what, e);
        }
    }
}
