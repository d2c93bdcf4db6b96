//! Log-based sink adapter.
//!
//! Implements [`HistorySink`] and [`EventSink`] by writing structured
//! lines to the `log` facade.  The binary chains it behind the data store
//! with [`Fanout`](super::fanout::Fanout); a webhook or message-bus
//! adapter would implement the same traits.

use log::{debug, info, warn};

use crate::app::ports::{EventSink, HistorySink};
use crate::error::SinkError;
use crate::model::{DerivedReading, Notification, PendingOrder, RefillEvent, Severity};

/// Adapter that logs every reading, event, alert and order.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

impl HistorySink for LogSink {
    fn append(&mut self, tank_id: &str, r: &DerivedReading) -> Result<(), SinkError> {
        debug!(
            "READING | tank={} | t={} | depth={:.1}mm | volume={:.0}L | status={}",
            tank_id,
            r.timestamp.format("%Y-%m-%dT%H:%M:%SZ"),
            r.depth_mm,
            r.volume_l,
            r.status,
        );
        Ok(())
    }
}

impl EventSink for LogSink {
    fn append_event(&mut self, tank_id: &str, e: &RefillEvent) -> Result<(), SinkError> {
        info!(
            "REFILL | tank={} | id={} | {:.0}L -> {:.0}L | +{:.0}L",
            tank_id, e.id, e.volume_before, e.volume_after, e.amount
        );
        Ok(())
    }

    fn update_event(&mut self, tank_id: &str, e: &RefillEvent) -> Result<(), SinkError> {
        info!(
            "REFILL | tank={} | id={} | updated +{:.0}L | supplier={:?}",
            tank_id, e.id, e.amount, e.confirmed_supplier
        );
        Ok(())
    }

    fn notify(&mut self, n: &Notification) -> Result<(), SinkError> {
        match n.severity {
            Severity::Warning | Severity::Critical => {
                warn!("ALERT | tank={} | {:?} | {} | {}", n.tank_id, n.severity, n.title, n.message);
            }
            Severity::Info | Severity::Success => {
                info!("ALERT | tank={} | {:?} | {} | {}", n.tank_id, n.severity, n.title, n.message);
            }
        }
        Ok(())
    }

    fn place_order(&mut self, tank_id: &str, o: &PendingOrder) -> Result<(), SinkError> {
        info!(
            "ORDER | tank={} | id={} | supplier={} | {:.0}L",
            tank_id, o.id, o.supplier_name, o.volume
        );
        Ok(())
    }

    fn close_order(&mut self, tank_id: &str, o: &PendingOrder) -> Result<(), SinkError> {
        info!("ORDER | tank={} | id={} | closed", tank_id, o.id);
        Ok(())
    }
}
