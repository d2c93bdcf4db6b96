//! Refill detection and aggregation.
//!
//! Turns a stream of noisy volume readings into discrete [`RefillEvent`]s.
//! One physical delivery often arrives as several rising samples (slow
//! fill, sensor ripple), so a rise inside the active window extends the
//! open event instead of creating a new one.
//!
//! ```text
//!                     ┌───────────┐
//!    first sample ──▶ │ Baseline  │
//!                     └───────────┘
//!    delta ≤ floor ──▶ Steady            (consumption / jitter)
//!    delta > floor ─┬─ open & recent? ─no──▶ Opened   (notify)
//!                   │        │ yes
//!                   │        ▼
//!                   │  total = v − before
//!                   │  total > amount? ─no──▶ Held
//!                   │        │ yes
//!                   │        ▼
//!                   └──── Extended           (no notify, window slides)
//! ```
//!
//! The aggregator's notion of "now" is the timestamp of the sample being
//! processed, so replays of a recorded feed are deterministic.

use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::geometry::TankGeometry;
use crate::model::{RefillEvent, SupplierConfirmation, TelemetrySample};

// ═══════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════

/// Last admitted sample together with the volume it produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreviousSample {
    pub sample: TelemetrySample,
    pub volume_l: f64,
}

/// Whether an incoming sample should enter the pipeline at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Fresh,
    /// Same timestamp and depth as the previous sample (redelivery).
    Duplicate,
    /// Older than the previous sample.
    OutOfOrder { previous: DateTime<Utc> },
}

/// What a sample did to the aggregation state.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// First sample ever seen; nothing to compare against.
    Baseline,
    Duplicate,
    OutOfOrder,
    /// Change at or below the noise floor.
    Steady { delta_l: f64 },
    /// New refill event.  The only transition that notifies.
    Opened(RefillEvent),
    /// Open event grew; `opened_at` slid forward.
    Extended(RefillEvent),
    /// Rise above the floor that did not beat the recorded total.
    Held { total_l: f64, recorded_l: f64 },
}

// ═══════════════════════════════════════════════════════════════
//  Aggregator
// ═══════════════════════════════════════════════════════════════

/// Per-tank aggregation state: the previous sample and the last refill
/// event.  Not shareable; one pipeline owns it.
#[derive(Debug, Clone)]
pub struct RefillAggregator {
    noise_floor_l: f64,
    window: Duration,
    previous: Option<PreviousSample>,
    event: Option<RefillEvent>,
    opened: u64,
}

impl RefillAggregator {
    pub fn new(engine: &EngineConfig) -> Self {
        Self {
            noise_floor_l: engine.noise_floor_l,
            window: engine.refill_window(),
            previous: None,
            event: None,
            opened: 0,
        }
    }

    /// Swap tuning constants without touching in-flight state.
    pub fn set_engine(&mut self, engine: &EngineConfig) {
        self.noise_floor_l = engine.noise_floor_l;
        self.window = engine.refill_window();
    }

    /// Warm start from the last persisted sample and event.
    pub fn restore(&mut self, previous: Option<PreviousSample>, event: Option<RefillEvent>) {
        self.previous = previous;
        self.event = event;
    }

    /// Recompute the previous volume after a geometry change so the next
    /// delta compares like with like.
    pub fn reproject(&mut self, geometry: &TankGeometry) {
        if let Some(prev) = self.previous.as_mut() {
            prev.volume_l = geometry.volume_at(prev.sample.depth_mm);
        }
    }

    pub fn previous(&self) -> Option<&PreviousSample> {
        self.previous.as_ref()
    }

    /// The most recent refill event, open or not.
    pub fn last_event(&self) -> Option<&RefillEvent> {
        self.event.as_ref()
    }

    pub fn admit(&self, sample: &TelemetrySample) -> Admission {
        let Some(prev) = self.previous.as_ref() else {
            return Admission::Fresh;
        };
        if sample.timestamp < prev.sample.timestamp {
            Admission::OutOfOrder {
                previous: prev.sample.timestamp,
            }
        } else if sample.timestamp == prev.sample.timestamp
            && sample.depth_mm.to_bits() == prev.sample.depth_mm.to_bits()
        {
            Admission::Duplicate
        } else {
            Admission::Fresh
        }
    }

    /// Feed one sample and its derived volume.
    pub fn observe(&mut self, sample: TelemetrySample, volume_l: f64) -> Transition {
        match self.admit(&sample) {
            Admission::Fresh => {}
            Admission::Duplicate => return Transition::Duplicate,
            Admission::OutOfOrder { .. } => return Transition::OutOfOrder,
        }

        let previous = self.previous.replace(PreviousSample { sample, volume_l });
        let Some(previous) = previous else {
            return Transition::Baseline;
        };

        let now = sample.timestamp;
        let delta = volume_l - previous.volume_l;
        if delta <= self.noise_floor_l {
            debug!("aggregator: delta {delta:.1}L within noise floor");
            return Transition::Steady { delta_l: delta };
        }

        let window = self.window;
        if let Some(event) = self
            .event
            .as_mut()
            .filter(|e| !e.is_closed() && now - e.opened_at < window)
        {
            // Anchored to the pre-refill volume, not the previous sample.
            let total = volume_l - event.volume_before;
            if total > event.amount {
                event.volume_after = volume_l;
                event.amount = total;
                event.opened_at = now;
                debug!("aggregator: refill {} extended to {total:.0}L", event.id);
                return Transition::Extended(event.clone());
            }
            return Transition::Held {
                total_l: total,
                recorded_l: event.amount,
            };
        }

        self.opened += 1;
        let event = RefillEvent {
            id: format!("RF-{}-{}", now.timestamp_millis(), self.opened),
            opened_at: now,
            volume_before: previous.volume_l,
            volume_after: volume_l,
            amount: delta,
            confirmed_supplier: SupplierConfirmation::Unknown,
        };
        info!(
            "aggregator: refill {} opened ({:.0}L -> {:.0}L, +{:.0}L)",
            event.id, event.volume_before, event.volume_after, event.amount
        );
        self.event = Some(event.clone());
        Transition::Opened(event)
    }

    /// Record the supplier confirmation.  The event is read-only afterwards.
    pub fn apply_confirmation(
        &mut self,
        event_id: &str,
        confirmed: bool,
    ) -> Result<RefillEvent, EngineError> {
        let event = self
            .event
            .as_mut()
            .filter(|e| e.id == event_id)
            .ok_or_else(|| EngineError::UnknownEvent(event_id.to_string()))?;
        if event.is_closed() {
            return Err(EngineError::EventClosed(event_id.to_string()));
        }
        event.confirmed_supplier = if confirmed {
            SupplierConfirmation::Confirmed
        } else {
            SupplierConfirmation::Rejected
        };
        Ok(event.clone())
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
