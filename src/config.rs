//! Configuration parameters
//!
//! All tunable parameters for the TankWatch engine.  Values come from a
//! JSON monitor file at startup and can be replaced per tank at runtime
//! through [`TankCommand::UpdateConfig`](crate::app::commands::TankCommand).
//!
//! Invalid values are rejected with [`ConfigError::ValidationFailed`],
//! never silently clamped.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::generator::BusinessHours;
use crate::geometry::TankGeometry;
use crate::model::TankId;

// ---------------------------------------------------------------------------
// Per-tank configuration
// ---------------------------------------------------------------------------

/// Automatic reordering settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoOrderConfig {
    pub enabled: bool,
    pub supplier_name: String,
    pub supplier_phone: String,
    pub supplier_email: String,
    /// Volume to fill up to (L).  0 = use the effective capacity.
    pub target_volume_l: f64,
}

impl Default for AutoOrderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            supplier_name: String::new(),
            supplier_phone: String::new(),
            supplier_email: String::new(),
            target_volume_l: 0.0,
        }
    }
}

/// Everything the engine needs to know about one tank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TankConfig {
    pub name: String,
    pub location: String,
    pub geometry: TankGeometry,
    /// Declared capacity (L).  0 = derive from geometry.
    pub nominal_capacity_l: f64,
    /// Below this volume the tank is `Low`; below half of it, `Critical`.
    pub min_threshold_l: f64,
    pub auto_order: AutoOrderConfig,
}

impl Default for TankConfig {
    fn default() -> Self {
        Self {
            name: "Main generator tank".into(),
            location: String::new(),
            geometry: TankGeometry::default(),
            nominal_capacity_l: 20_000.0,
            min_threshold_l: 3000.0,
            auto_order: AutoOrderConfig::default(),
        }
    }
}

impl TankConfig {
    /// Nominal capacity if declared, otherwise the geometric full volume.
    pub fn effective_capacity(&self) -> f64 {
        if self.nominal_capacity_l > 0.0 {
            self.nominal_capacity_l
        } else {
            self.geometry.full_volume()
        }
    }

    /// Volume an automatic order should fill up to.
    pub fn reorder_target(&self) -> f64 {
        if self.auto_order.target_volume_l > 0.0 {
            self.auto_order.target_volume_l
        } else {
            self.effective_capacity()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.geometry.validate()?;
        if !non_negative(self.nominal_capacity_l) {
            return Err(ConfigError::ValidationFailed(
                "nominal_capacity_l must be a finite value >= 0",
            ));
        }
        if !non_negative(self.min_threshold_l) {
            return Err(ConfigError::ValidationFailed(
                "min_threshold_l must be a finite value >= 0",
            ));
        }
        if !non_negative(self.auto_order.target_volume_l) {
            return Err(ConfigError::ValidationFailed(
                "auto_order.target_volume_l must be a finite value >= 0",
            ));
        }
        if self.auto_order.enabled && self.auto_order.supplier_name.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "auto_order.supplier_name is required when auto ordering is enabled",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Engine tuning
// ---------------------------------------------------------------------------

/// Change-detection constants shared by every tank pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Smallest volume rise (L) treated as a refill rather than jitter.
    pub noise_floor_l: f64,
    /// How long a refill event keeps aggregating after its last update.
    pub refill_window_secs: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            noise_floor_l: 50.0,
            refill_window_secs: 30 * 60,
        }
    }
}

impl EngineConfig {
    pub fn refill_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(self.refill_window_secs))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !non_negative(self.noise_floor_l) {
            return Err(ConfigError::ValidationFailed(
                "noise_floor_l must be a finite value >= 0",
            ));
        }
        if self.refill_window_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "refill_window_secs must be > 0",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Synthetic telemetry
// ---------------------------------------------------------------------------

/// Parameters of the synthetic telemetry generator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub enabled: bool,
    /// Seconds between ticks (typically 10–60).
    pub tick_interval_secs: u32,
    /// Chance per tick of simulating a delivery.
    pub inflow_probability: f64,
    pub inflow_min_l: f64,
    pub inflow_max_l: f64,
    pub consumption_min_l: f64,
    pub consumption_max_l: f64,
    pub business_hours: BusinessHours,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            tick_interval_secs: 10,
            inflow_probability: 0.1,
            inflow_min_l: 500.0,
            inflow_max_l: 3500.0,
            consumption_min_l: 50.0,
            consumption_max_l: 250.0,
            business_hours: BusinessHours::default(),
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=3600).contains(&self.tick_interval_secs) {
            return Err(ConfigError::ValidationFailed(
                "tick_interval_secs must be 1–3600",
            ));
        }
        if !(0.0..=1.0).contains(&self.inflow_probability) {
            return Err(ConfigError::ValidationFailed(
                "inflow_probability must be 0.0–1.0",
            ));
        }
        if !non_negative(self.inflow_min_l)
            || !self.inflow_max_l.is_finite()
            || self.inflow_min_l >= self.inflow_max_l
        {
            return Err(ConfigError::ValidationFailed(
                "inflow range must satisfy 0 <= inflow_min_l < inflow_max_l",
            ));
        }
        if !non_negative(self.consumption_min_l)
            || !self.consumption_max_l.is_finite()
            || self.consumption_min_l >= self.consumption_max_l
        {
            return Err(ConfigError::ValidationFailed(
                "consumption range must satisfy 0 <= consumption_min_l < consumption_max_l",
            ));
        }
        self.business_hours.validate()
    }
}

// ---------------------------------------------------------------------------
// Monitor file
// ---------------------------------------------------------------------------

/// One tank entry in the monitor file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TankEntry {
    pub id: TankId,
    #[serde(default)]
    pub config: TankConfig,
}

/// Top-level configuration of the `tankwatch` binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub tanks: Vec<TankEntry>,
    pub engine: EngineConfig,
    pub generator: GeneratorConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tanks: vec![TankEntry {
                id: "UNI-01".into(),
                config: TankConfig::default(),
            }],
            engine: EngineConfig::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Parse and validate a monitor file.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Corrupted(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tanks.is_empty() {
            return Err(ConfigError::ValidationFailed("at least one tank is required"));
        }
        for (i, entry) in self.tanks.iter().enumerate() {
            if entry.id.trim().is_empty() {
                return Err(ConfigError::ValidationFailed("tank id must not be empty"));
            }
            if self.tanks[..i].iter().any(|other| other.id == entry.id) {
                return Err(ConfigError::ValidationFailed("tank ids must be unique"));
            }
            entry.config.validate()?;
        }
        self.engine.validate()?;
        self.generator.validate()
    }
}

fn non_negative(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}
