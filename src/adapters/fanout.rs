//! Sink combinator.
//!
//! [`Fanout`] forwards every write to two sinks in order.  Both are always
//! called; the first error (if any) is returned.

use crate::app::ports::{EventSink, HistorySink};
use crate::error::SinkError;
use crate::model::{DerivedReading, Notification, PendingOrder, RefillEvent};

#[derive(Debug, Clone, Default)]
pub struct Fanout<A, B> {
    pub primary: A,
    pub secondary: B,
}

impl<A, B> Fanout<A, B> {
    pub fn new(primary: A, secondary: B) -> Self {
        Self { primary, secondary }
    }
}

fn both(a: Result<(), SinkError>, b: Result<(), SinkError>) -> Result<(), SinkError> {
    a.and(b)
}

impl<A: HistorySink, B: HistorySink> HistorySink for Fanout<A, B> {
    fn append(&mut self, tank_id: &str, reading: &DerivedReading) -> Result<(), SinkError> {
        both(
            self.primary.append(tank_id, reading),
            self.secondary.append(tank_id, reading),
        )
    }
}

impl<A: EventSink, B: EventSink> EventSink for Fanout<A, B> {
    fn append_event(&mut self, tank_id: &str, event: &RefillEvent) -> Result<(), SinkError> {
        both(
            self.primary.append_event(tank_id, event),
            self.secondary.append_event(tank_id, event),
        )
    }

    fn update_event(&mut self, tank_id: &str, event: &RefillEvent) -> Result<(), SinkError> {
        both(
            self.primary.update_event(tank_id, event),
            self.secondary.update_event(tank_id, event),
        )
    }

    fn notify(&mut self, notification: &Notification) -> Result<(), SinkError> {
        both(
            self.primary.notify(notification),
            self.secondary.notify(notification),
        )
    }

    fn place_order(&mut self, tank_id: &str, order: &PendingOrder) -> Result<(), SinkError> {
        both(
            self.primary.place_order(tank_id, order),
            self.secondary.place_order(tank_id, order),
        )
    }

    fn close_order(&mut self, tank_id: &str, order: &PendingOrder) -> Result<(), SinkError> {
        both(
            self.primary.close_order(tank_id, order),
            self.secondary.close_order(tank_id, order),
        )
    }
}
