//! Synthetic telemetry generator.
//!
//! Stands in for the depth sensor when no hardware is attached.  Each tick
//! it either simulates a delivery or ordinary consumption, converts the
//! resulting volume back into a depth and emits it, but only during
//! business hours and only if the depth actually changed.
//!
//! ```text
//!   tick(now) ──▶ business hours? ──no──▶ OffHours
//!                      │ yes
//!                      ▼
//!        p = inflow_probability
//!       ┌──────────────┴──────────────┐
//!   +[500, 3500) L              −[50, 250) L
//!   capped at capacity          floored at 0
//!       └──────────────┬──────────────┘
//!                      ▼
//!            depth_for_volume(target)
//!                      │
//!             changed? ──no──▶ Unchanged
//!                      │ yes
//!                      ▼
//!                   Emitted
//! ```
//!
//! The caller supplies the wall-clock time on every tick; nothing here
//! caches it, so crossing a business-hours boundary mid-run takes effect
//! on the very next tick.

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::GeneratorConfig;
use crate::error::ConfigError;
use crate::geometry::TankGeometry;

// ═══════════════════════════════════════════════════════════════
//  Business hours
// ═══════════════════════════════════════════════════════════════

/// Time-of-day window during which the facility is staffed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessHours {
    /// First open hour (0-23 inclusive).  E.g. 8 = 08:00.
    pub start_hour: u8,
    /// First closed hour (1-24).  E.g. 18 = 18:00.
    pub end_hour: u8,
    /// Closed on Saturday and Sunday.
    pub weekdays_only: bool,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            start_hour: 8,
            end_hour: 18,
            weekdays_only: true,
        }
    }
}

impl BusinessHours {
    /// Check if the given local time falls within business hours.
    pub fn is_open(&self, at: NaiveDateTime) -> bool {
        if self.weekdays_only && matches!(at.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        let hour = at.hour();
        hour >= u32::from(self.start_hour) && hour < u32::from(self.end_hour)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start_hour > 23 || self.end_hour > 24 || self.start_hour >= self.end_hour {
            return Err(ConfigError::ValidationFailed(
                "business hours must satisfy start_hour < end_hour <= 24",
            ));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════
//  Generator
// ═══════════════════════════════════════════════════════════════

/// What a tick did to the simulated volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Perturbation {
    Inflow(f64),
    Consumption(f64),
}

/// Result of one generator tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Outside business hours; nothing emitted.
    OffHours,
    /// The perturbation did not move the depth by a whole millimetre.
    Unchanged,
    /// A new depth should be pushed into the pipeline.
    Emitted {
        depth_mm: f64,
        target_volume_l: f64,
        perturbation: Perturbation,
    },
}

/// Random-walk depth source gated by business hours.
pub struct TelemetryGenerator {
    config: GeneratorConfig,
    ticks: u64,
    emitted: u64,
}

impl TelemetryGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            config,
            ticks: 0,
            emitted: 0,
        }
    }

    /// Run one tick.
    ///
    /// # Parameters
    ///
    /// * `now`: current local wall-clock time, read fresh by the caller.
    /// * `current_depth_mm`: latest depth the pipeline has seen.
    /// * `capacity_l`: effective capacity; inflows never exceed it.
    pub fn tick<R: Rng + ?Sized>(
        &mut self,
        now: NaiveDateTime,
        current_depth_mm: f64,
        geometry: &TankGeometry,
        capacity_l: f64,
        rng: &mut R,
    ) -> TickOutcome {
        self.ticks += 1;

        if !self.config.business_hours.is_open(now) {
            return TickOutcome::OffHours;
        }

        let volume = geometry.volume_at(current_depth_mm);
        let (target, perturbation) = if rng.random_bool(self.config.inflow_probability) {
            let amount = rng.random_range(self.config.inflow_min_l..self.config.inflow_max_l);
            ((volume + amount).min(capacity_l), Perturbation::Inflow(amount))
        } else {
            let amount =
                rng.random_range(self.config.consumption_min_l..self.config.consumption_max_l);
            ((volume - amount).max(0.0), Perturbation::Consumption(amount))
        };

        // Sensor resolution is one millimetre.
        let depth = geometry.depth_for_volume(target).round();
        if (depth - current_depth_mm.round()).abs() < 0.5 {
            return TickOutcome::Unchanged;
        }

        self.emitted += 1;
        debug!(
            "generator: {:?} {:.0}L -> {:.0}L (depth {:.0}mm)",
            perturbation, volume, target, depth
        );
        TickOutcome::Emitted {
            depth_mm: depth,
            target_volume_l: target,
            perturbation,
        }
    }

    /// Total ticks evaluated, including off-hours ones.
    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    /// Ticks that produced a sample.
    pub fn emitted_count(&self) -> u64 {
        self.emitted
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
