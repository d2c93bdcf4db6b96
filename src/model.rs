//! Core data types shared by every module.
//!
//! Samples come in, readings/events/orders/notifications go out.  Nothing
//! here performs I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a monitored tank (e.g. `"UNI-01"`).
pub type TankId = String;

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// One raw depth measurement.  Immutable once recorded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub timestamp: DateTime<Utc>,
    pub depth_mm: f64,
}

impl TelemetrySample {
    pub fn new(timestamp: DateTime<Utc>, depth_mm: f64) -> Self {
        Self {
            timestamp,
            depth_mm,
        }
    }
}

// ---------------------------------------------------------------------------
// Derived
// ---------------------------------------------------------------------------

/// Operational status derived from volume and the minimum threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Normal,
    Low,
    Critical,
}

impl core::fmt::Display for Status {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Low => write!(f, "low"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Volume and status computed from a sample.  Never stored on its own.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedReading {
    pub timestamp: DateTime<Utc>,
    /// Depth as reported by the sample, before clamping.
    pub raw_depth_mm: f64,
    /// Depth after clamping into `[0, 2r]`.
    pub depth_mm: f64,
    pub volume_l: f64,
    pub status: Status,
}

impl DerivedReading {
    /// The sample this reading was derived from.
    pub fn sample(&self) -> TelemetrySample {
        TelemetrySample::new(self.timestamp, self.raw_depth_mm)
    }
}

// ---------------------------------------------------------------------------
// Refill events
// ---------------------------------------------------------------------------

/// Supplier confirmation of a refill event.  Written externally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SupplierConfirmation {
    /// Awaiting the operator.
    #[default]
    Unknown,
    /// Delivered by the registered supplier.
    Confirmed,
    /// Delivered by someone else.
    Rejected,
}

/// A detected inflow, possibly aggregated over several samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefillEvent {
    pub id: String,
    /// Start of the aggregation window; refreshed while inflow continues.
    pub opened_at: DateTime<Utc>,
    pub volume_before: f64,
    pub volume_after: f64,
    pub amount: f64,
    pub confirmed_supplier: SupplierConfirmation,
}

impl RefillEvent {
    /// Read-only once the supplier has been confirmed or rejected.
    pub fn is_closed(&self) -> bool {
        self.confirmed_supplier != SupplierConfirmation::Unknown
    }
}

// ---------------------------------------------------------------------------
// Orders & notifications
// ---------------------------------------------------------------------------

/// An automatic purchase order awaiting delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOrder {
    pub id: String,
    pub supplier_name: String,
    pub volume: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Critical,
}

/// Tank state attached to a notification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelSnapshot {
    pub volume_l: f64,
    pub capacity_l: f64,
    pub previous_volume_l: Option<f64>,
}

/// Alert routed to the external notification channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub tank_id: TankId,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub snapshot: LevelSnapshot,
}
