//! Automatic reorder policy.
//!
//! Places at most one purchase order per depletion episode.  The policy
//! only creates orders; clearing one is an external action (receipt
//! confirmation or an executed refill) routed through [`ReorderPolicy::fulfil`].
//!
//! There is no expiry: an order that is never fulfilled blocks further
//! automatic ordering for the tank.

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::classifier::critical_level;
use crate::config::TankConfig;
use crate::error::EngineError;
use crate::model::PendingOrder;

/// Outcome of one policy evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum ReorderDecision {
    /// Volume is not below the reorder trigger.
    NotTriggered,
    /// Triggered, but automatic ordering is switched off.
    Disabled,
    /// Triggered while an order is already outstanding.
    AlreadyPending,
    /// Triggered, but the target is not above the current volume.
    NothingToOrder { target_l: f64 },
    Placed(PendingOrder),
}

#[derive(Debug, Clone, Default)]
pub struct ReorderPolicy {
    pending: Option<PendingOrder>,
    placed: u64,
}

impl ReorderPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Warm start with the outstanding order, if any.
    pub fn restore(&mut self, pending: Option<PendingOrder>) {
        self.pending = pending;
    }

    pub fn pending(&self) -> Option<&PendingOrder> {
        self.pending.as_ref()
    }

    /// Evaluate the trigger for one processed sample.
    pub fn evaluate(
        &mut self,
        volume_l: f64,
        at: DateTime<Utc>,
        config: &TankConfig,
    ) -> ReorderDecision {
        if volume_l >= critical_level(config.min_threshold_l) {
            return ReorderDecision::NotTriggered;
        }
        if !config.auto_order.enabled {
            return ReorderDecision::Disabled;
        }
        if self.pending.is_some() {
            return ReorderDecision::AlreadyPending;
        }

        let target = config.reorder_target();
        let volume = target - volume_l;
        if volume <= 0.0 {
            warn!(
                "reorder: target {target:.0}L not above current {volume_l:.0}L, no order placed"
            );
            return ReorderDecision::NothingToOrder { target_l: target };
        }

        self.placed += 1;
        let order = PendingOrder {
            id: format!("PO-{}-{}", at.timestamp_millis(), self.placed),
            supplier_name: config.auto_order.supplier_name.clone(),
            volume,
            created_at: at,
        };
        info!(
            "reorder: order {} placed with {} for {:.0}L",
            order.id, order.supplier_name, order.volume
        );
        self.pending = Some(order.clone());
        ReorderDecision::Placed(order)
    }

    /// Clear the outstanding order.
    pub fn fulfil(&mut self) -> Result<PendingOrder, EngineError> {
        self.pending.take().ok_or(EngineError::NoPendingOrder)
    }
}
