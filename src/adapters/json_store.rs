//! JSON file configuration store.
//!
//! One pretty-printed `<tank_id>.json` file per tank under a directory.
//! Values are validated before anything touches the disk, and writes go
//! through a temporary file plus rename so a crash never leaves a
//! truncated config behind.
//!
//! Saves made through the store reach subscribers at once; edits made to
//! the files by hand are picked up by [`JsonConfigStore::refresh`].

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::info;
use tokio::sync::watch;

use super::config_feed::ConfigFeed;
use crate::app::ports::ConfigStore;
use crate::config::TankConfig;
use crate::error::ConfigError;

#[derive(Clone)]
pub struct JsonConfigStore {
    dir: PathBuf,
    feed: ConfigFeed,
}

impl JsonConfigStore {
    /// Open (and create if needed) the config directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| io_error(&dir, &e))?;
        info!("JsonConfigStore: using {}", dir.display());
        Ok(Self {
            dir,
            feed: ConfigFeed::new(),
        })
    }

    /// Re-read a tank's file and publish it if it changed.  An invalid or
    /// missing file is reported and the last published value stays.
    pub fn refresh(&self, tank_id: &str) -> Result<bool, ConfigError> {
        let config = self.load(tank_id)?;
        let changed = self.feed.publish(tank_id, &config);
        if changed {
            info!("JsonConfigStore: {tank_id} changed on disk");
        }
        Ok(changed)
    }

    fn path_for(&self, tank_id: &str) -> Result<PathBuf, ConfigError> {
        let safe = !tank_id.is_empty()
            && tank_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !safe {
            return Err(ConfigError::ValidationFailed(
                "tank id must be ASCII alphanumeric, '-' or '_'",
            ));
        }
        Ok(self.dir.join(format!("{tank_id}.json")))
    }
}

fn io_error(path: &Path, e: &std::io::Error) -> ConfigError {
    ConfigError::Io(format!("{}: {e}", path.display()))
}

impl ConfigStore for JsonConfigStore {
    fn load(&self, tank_id: &str) -> Result<TankConfig, ConfigError> {
        let path = self.path_for(tank_id)?;
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(tank_id.to_string()));
            }
            Err(e) => return Err(io_error(&path, &e)),
        };
        let config: TankConfig =
            serde_json::from_str(&json).map_err(|e| ConfigError::Corrupted(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn save(&self, tank_id: &str, config: &TankConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let path = self.path_for(tank_id)?;
        let json = serde_json::to_string_pretty(config)
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| io_error(&tmp, &e))?;
        fs::rename(&tmp, &path).map_err(|e| io_error(&path, &e))?;
        info!("JsonConfigStore: saved config for {tank_id}");
        self.feed.publish(tank_id, config);
        Ok(())
    }

    fn subscribe(&self, tank_id: &str) -> watch::Receiver<Option<TankConfig>> {
        self.feed.subscribe(tank_id, || self.load(tank_id).ok())
    }
}
