//! Port traits: the hexagonal boundary between the tank pipeline and the
//! outside world.
//!
//! ```text
//!   SampleSource ──▶ TankService ──▶ HistorySink / EventSink
//!                        ▲
//!                   ConfigStore
//! ```
//!
//! Adapters (in-memory store, log sink, file store, the tokio runtime)
//! implement these traits.  [`TankService`](super::service::TankService)
//! consumes the outbound ones via generics, so the pipeline never touches
//! a transport directly.
//!
//! ## Delivery notes
//!
//! - Outbound writes are fire-and-forget from the pipeline's point of view.
//!   A returned [`SinkError`] is logged and never rolls back in-memory state.
//! - **ConfigStore** implementations MUST validate before persisting, and
//!   publish every stored change to [`ConfigStore::subscribe`] receivers.

use chrono::{DateTime, NaiveDateTime, Utc};
use tokio::sync::watch;

use crate::config::TankConfig;
use crate::error::{ConfigError, EngineError, SinkError};
use crate::model::{DerivedReading, Notification, PendingOrder, RefillEvent, TelemetrySample};

// ───────────────────────────────────────────────────────────────
// History sink (domain → reading log)
// ───────────────────────────────────────────────────────────────

/// Receives every derived reading, whether or not it triggered an event.
pub trait HistorySink {
    /// Append a reading.  Timestamps are non-decreasing per tank.
    fn append(&mut self, tank_id: &str, reading: &DerivedReading) -> Result<(), SinkError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink (domain → events, alerts, purchasing)
// ───────────────────────────────────────────────────────────────

pub trait EventSink {
    /// A refill event was opened.
    fn append_event(&mut self, tank_id: &str, event: &RefillEvent) -> Result<(), SinkError>;

    /// An existing refill event changed (aggregation or confirmation).
    fn update_event(&mut self, tank_id: &str, event: &RefillEvent) -> Result<(), SinkError>;

    /// Route an alert to the notification channel.
    fn notify(&mut self, notification: &Notification) -> Result<(), SinkError>;

    /// Hand a new purchase order to purchasing.
    fn place_order(&mut self, tank_id: &str, order: &PendingOrder) -> Result<(), SinkError>;

    /// The pipeline stopped tracking an order (received or delivered).
    fn close_order(&mut self, _tank_id: &str, _order: &PendingOrder) -> Result<(), SinkError> {
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Configuration store (domain ↔ persistent per-tank config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists tank configuration.
///
/// Implementations MUST validate before persisting and reject invalid
/// values with [`ConfigError`], never clamp them.  A rejected save leaves
/// the previously stored configuration in place.
pub trait ConfigStore {
    /// Returns [`ConfigError::NotFound`] if nothing is stored for the tank.
    fn load(&self, tank_id: &str) -> Result<TankConfig, ConfigError>;

    /// Validate and persist.
    fn save(&self, tank_id: &str, config: &TankConfig) -> Result<(), ConfigError>;

    /// Current configuration of a tank, updated after every successful
    /// save.  `None` while nothing is stored.
    fn subscribe(&self, tank_id: &str) -> watch::Receiver<Option<TankConfig>>;
}

// ───────────────────────────────────────────────────────────────
// Sample source (producer → pipeline)
// ───────────────────────────────────────────────────────────────

/// Push side of a tank pipeline: the real sensor feed, the generator, or a
/// manual override.
pub trait SampleSource {
    fn push(&mut self, sample: TelemetrySample) -> Result<(), EngineError>;
}

// ───────────────────────────────────────────────────────────────
// Clock
// ───────────────────────────────────────────────────────────────

/// Wall-clock access, injected so gating logic is testable.
pub trait Clock {
    fn now_utc(&self) -> DateTime<Utc>;

    /// Local civil time, used for business hours.
    fn now_local(&self) -> NaiveDateTime;
}
