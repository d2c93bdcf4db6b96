//! In-memory data store adapter.
//!
//! Implements [`HistorySink`], [`EventSink`] and [`ConfigStore`] on a
//! shared, cloneable handle.  Every pipeline task gets its own clone; all
//! clones see the same data.  Used by the simulation binary and by tests.
//!
//! Tank configurations are validated before they are stored and kept as
//! compact `postcard` blobs, the same way a flash-backed store would hold
//! them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::info;
use tokio::sync::watch;

use super::config_feed::ConfigFeed;
use crate::app::ports::{ConfigStore, EventSink, HistorySink};
use crate::app::service::TankSnapshot;
use crate::config::TankConfig;
use crate::error::{ConfigError, SinkError};
use crate::model::{DerivedReading, Notification, PendingOrder, RefillEvent};

#[derive(Default)]
struct Inner {
    configs: HashMap<String, Vec<u8>>,
    history: HashMap<String, Vec<DerivedReading>>,
    events: HashMap<String, Vec<RefillEvent>>,
    orders: HashMap<String, Vec<PendingOrder>>,
    pending: HashMap<String, PendingOrder>,
    notifications: Vec<Notification>,
}

/// Shared in-memory store.  Clones share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    feed: ConfigFeed,
}

impl MemoryStore {
    pub fn new() -> Self {
        info!("MemoryStore: simulation backend");
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Every write is a single insert or push, so poisoning is harmless.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Queries ───────────────────────────────────────────────

    /// Readings for a tank, oldest first.
    pub fn history(&self, tank_id: &str) -> Vec<DerivedReading> {
        self.lock().history.get(tank_id).cloned().unwrap_or_default()
    }

    /// Refill events for a tank, oldest first.
    pub fn events(&self, tank_id: &str) -> Vec<RefillEvent> {
        self.lock().events.get(tank_id).cloned().unwrap_or_default()
    }

    /// Every order ever placed for a tank.
    pub fn orders(&self, tank_id: &str) -> Vec<PendingOrder> {
        self.lock().orders.get(tank_id).cloned().unwrap_or_default()
    }

    pub fn pending_order(&self, tank_id: &str) -> Option<PendingOrder> {
        self.lock().pending.get(tank_id).cloned()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.lock().notifications.clone()
    }

    /// Last known state of a tank, for warm-starting its pipeline.
    pub fn snapshot(&self, tank_id: &str) -> TankSnapshot {
        let inner = self.lock();
        TankSnapshot {
            last_sample: inner
                .history
                .get(tank_id)
                .and_then(|h| h.last())
                .map(DerivedReading::sample),
            last_event: inner.events.get(tank_id).and_then(|e| e.last()).cloned(),
            pending_order: inner.pending.get(tank_id).cloned(),
        }
    }
}

impl HistorySink for MemoryStore {
    fn append(&mut self, tank_id: &str, reading: &DerivedReading) -> Result<(), SinkError> {
        self.lock()
            .history
            .entry(tank_id.to_string())
            .or_default()
            .push(*reading);
        Ok(())
    }
}

impl EventSink for MemoryStore {
    fn append_event(&mut self, tank_id: &str, event: &RefillEvent) -> Result<(), SinkError> {
        let mut inner = self.lock();
        let events = inner.events.entry(tank_id.to_string()).or_default();
        if events.iter().any(|e| e.id == event.id) {
            return Err(SinkError::Rejected(format!("duplicate event id {}", event.id)));
        }
        events.push(event.clone());
        Ok(())
    }

    fn update_event(&mut self, tank_id: &str, event: &RefillEvent) -> Result<(), SinkError> {
        let mut inner = self.lock();
        let slot = inner
            .events
            .get_mut(tank_id)
            .and_then(|events| events.iter_mut().find(|e| e.id == event.id))
            .ok_or_else(|| SinkError::Rejected(format!("unknown event id {}", event.id)))?;
        *slot = event.clone();
        Ok(())
    }

    fn notify(&mut self, notification: &Notification) -> Result<(), SinkError> {
        self.lock().notifications.push(notification.clone());
        Ok(())
    }

    fn place_order(&mut self, tank_id: &str, order: &PendingOrder) -> Result<(), SinkError> {
        let mut inner = self.lock();
        inner
            .orders
            .entry(tank_id.to_string())
            .or_default()
            .push(order.clone());
        inner.pending.insert(tank_id.to_string(), order.clone());
        Ok(())
    }

    fn close_order(&mut self, tank_id: &str, order: &PendingOrder) -> Result<(), SinkError> {
        let mut inner = self.lock();
        if inner.pending.get(tank_id).is_some_and(|p| p.id == order.id) {
            inner.pending.remove(tank_id);
        }
        Ok(())
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self, tank_id: &str) -> Result<TankConfig, ConfigError> {
        let inner = self.lock();
        let bytes = inner
            .configs
            .get(tank_id)
            .ok_or_else(|| ConfigError::NotFound(tank_id.to_string()))?;
        postcard::from_bytes(bytes).map_err(|e| ConfigError::Corrupted(e.to_string()))
    }

    fn save(&self, tank_id: &str, config: &TankConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|e| ConfigError::Io(e.to_string()))?;
        self.lock().configs.insert(tank_id.to_string(), bytes);
        info!("MemoryStore: saved config for {tank_id}");
        self.feed.publish(tank_id, config);
        Ok(())
    }

    fn subscribe(&self, tank_id: &str) -> watch::Receiver<Option<TankConfig>> {
        self.feed.subscribe(tank_id, || self.load(tank_id).ok())
    }
}
