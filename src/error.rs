//! Unified error types for the TankWatch engine.
//!
//! Every subsystem converts into [`EngineError`] so the per-tank pipeline
//! handles failures uniformly.  Configuration and sink errors keep their
//! own enums because adapters return them directly through the port traits.

use chrono::{DateTime, Utc};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from loading, validating or persisting a tank configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Radius or length is not a positive, finite number.
    #[error("invalid geometry: radius={radius_mm}mm length={length_mm}mm")]
    InvalidGeometry { radius_mm: f64, length_mm: f64 },
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    #[error("validation failed: {0}")]
    ValidationFailed(&'static str),
    /// No configuration stored for the requested tank.
    #[error("no configuration for tank {0}")]
    NotFound(String),
    /// Stored configuration could not be decoded.
    #[error("configuration corrupted: {0}")]
    Corrupted(String),
    /// The backing store could not be read or written.
    #[error("configuration I/O error: {0}")]
    Io(String),
}

// ---------------------------------------------------------------------------
// Sink errors
// ---------------------------------------------------------------------------

/// Errors returned by the outbound history/event sinks.
///
/// The pipeline never propagates these: it logs them and carries on with
/// its in-memory state untouched.  Retrying is the transport's business.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("sink unavailable: {0}")]
    Unavailable(String),
    #[error("sink rejected write: {0}")]
    Rejected(String),
    #[error("sink closed")]
    Closed,
}

// ---------------------------------------------------------------------------
// Engine errors
// ---------------------------------------------------------------------------

/// Errors surfaced by [`TankService`](crate::app::service::TankService)
/// commands and the runtime.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// The referenced refill event is not the one held by the aggregator.
    #[error("unknown refill event {0}")]
    UnknownEvent(String),
    /// The refill event already left the `Unknown` confirmation state.
    #[error("refill event {0} is closed")]
    EventClosed(String),
    /// A fulfil/execute command arrived with no outstanding order.
    #[error("no pending order")]
    NoPendingOrder,
    /// A delivery override would be older than the last processed sample.
    #[error("refill at {at} predates the last sample at {previous}")]
    StaleOverride {
        at: DateTime<Utc>,
        previous: DateTime<Utc>,
    },
    /// Another producer already feeds samples into this tank's pipeline.
    #[error("tank {0} already has an active sample producer")]
    ProducerBusy(String),
    /// Samples must be pushed through the tank's producer claim.
    #[error("samples for tank {0} require a producer claim")]
    ProducerRequired(String),
    /// The tank's pipeline task has stopped.
    #[error("pipeline for tank {0} is closed")]
    PipelineClosed(String),
    /// The tank's command queue is full; the sample was not queued.
    #[error("pipeline for tank {0} is saturated")]
    QueueFull(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Engine-wide `Result` alias.
pub type Result<T> = core::result::Result<T, EngineError>;
