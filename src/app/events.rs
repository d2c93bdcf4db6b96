//! Outcomes reported by the tank pipeline.
//!
//! [`TankService`](super::service::TankService) returns these to its
//! caller; the side effects themselves go out through the ports.

use serde::Serialize;

use crate::aggregator::Transition;
use crate::geometry::TankGeometry;
use crate::model::{DerivedReading, PendingOrder, RefillEvent, TankId};
use crate::reorder::ReorderDecision;

/// Why a sample never entered the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    NonFinite,
    Duplicate,
    OutOfOrder,
}

/// Result of processing one sample.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleOutcome {
    Dropped(DropReason),
    Processed {
        reading: DerivedReading,
        clamped: bool,
        transition: Transition,
        reorder: ReorderDecision,
    },
}

impl SampleOutcome {
    pub fn reading(&self) -> Option<&DerivedReading> {
        match self {
            Self::Processed { reading, .. } => Some(reading),
            Self::Dropped(_) => None,
        }
    }
}

/// Result of a successfully handled command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Sample(SampleOutcome),
    ConfigApplied { capacity_l: f64 },
    SupplierRecorded(RefillEvent),
    OrderFulfilled(PendingOrder),
    /// The order was cleared and the post-delivery depth was pushed
    /// through the pipeline as an override sample.
    RefillExecuted {
        order: PendingOrder,
        depth_mm: f64,
        sample: SampleOutcome,
    },
}

/// Snapshot of a tank's pipeline, published after every command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TankView {
    pub tank_id: TankId,
    pub name: String,
    pub geometry: TankGeometry,
    pub capacity_l: f64,
    pub min_threshold_l: f64,
    pub reading: Option<DerivedReading>,
    pub last_event: Option<RefillEvent>,
    pub pending_order: Option<PendingOrder>,
    pub samples_processed: u64,
    pub sink_failures: u64,
}

