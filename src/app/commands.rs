//! Inbound commands to a tank pipeline.
//!
//! These represent actions requested by the outside world (sensor feed,
//! generator, configuration subscription, operator) that the
//! [`TankService`](super::service::TankService) interprets in order.

use crate::config::TankConfig;
use crate::model::TelemetrySample;

/// Commands that adapters can send into a tank pipeline.
#[derive(Debug, Clone)]
pub enum TankCommand {
    /// A new depth measurement.
    Sample(TelemetrySample),

    /// Replace the tank configuration.  Aggregation state is kept.
    UpdateConfig(TankConfig),

    /// Operator verdict on a refill event's supplier.
    ConfirmSupplier { event_id: String, confirmed: bool },

    /// The pending order was received.
    FulfilOrder,

    /// Simulate delivery of the pending order: clear it and push the depth
    /// of a tank filled to the order target through the pipeline.
    ExecuteRefill,
}
