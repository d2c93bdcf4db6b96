//! Per-tank configuration broadcast.
//!
//! The config stores keep one `watch` channel per tank and publish every
//! successfully saved configuration on it.  Subscribers only wake when the
//! stored value actually changed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::config::TankConfig;
use crate::model::TankId;

type Channels = HashMap<TankId, watch::Sender<Option<TankConfig>>>;

/// Shared set of config channels.  Clones share the channels.
#[derive(Clone, Default)]
pub struct ConfigFeed {
    channels: Arc<Mutex<Channels>>,
}

impl ConfigFeed {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Channels> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Receiver for `tank_id`.  The channel is seeded with `current` the
    /// first time anyone asks for it.
    pub fn subscribe(
        &self,
        tank_id: &str,
        current: impl FnOnce() -> Option<TankConfig>,
    ) -> watch::Receiver<Option<TankConfig>> {
        self.lock()
            .entry(tank_id.to_string())
            .or_insert_with(|| watch::channel(current()).0)
            .subscribe()
    }

    /// Publish a stored configuration.  Returns `false` if it equals the
    /// value already published.
    pub fn publish(&self, tank_id: &str, config: &TankConfig) -> bool {
        let mut channels = self.lock();
        match channels.get(tank_id) {
            Some(tx) => tx.send_if_modified(|slot| {
                if slot.as_ref() == Some(config) {
                    false
                } else {
                    *slot = Some(config.clone());
                    true
                }
            }),
            None => {
                channels.insert(tank_id.to_string(), watch::channel(Some(config.clone())).0);
                true
            }
        }
    }
}
