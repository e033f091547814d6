//! Opaque save/load interface for world and registry state

use crate::error::PersistenceError;
use crate::registry::PlayerRegistry;
use crate::world::WorldSnapshot;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Snapshot {
    pub world: WorldSnapshot,
    pub registry: PlayerRegistry,
}

pub trait Persistence: Send + Sync {
    fn save(&self, snapshot: &Snapshot, location: &str) -> Result<(), PersistenceError>;
    fn load(&self, location: &str) -> Result<Snapshot, PersistenceError>;
    fn delete(&self, location: &str) -> Result<(), PersistenceError>;
}

/// Stores each location as a bincode file inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path(&self, location: &str) -> PathBuf {
        self.dir.join(format!("{}.sav", location))
    }
}

impl Persistence for FileStore {
    fn save(&self, snapshot: &Snapshot, location: &str) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(location);
        let tmp = path.with_extension("sav.tmp");
        fs::write(&tmp, bincode::serialize(snapshot)?)?;
        fs::rename(&tmp, &path)?;
        info!("Saved state to {}", path.display());
        Ok(())
    }

    fn load(&self, location: &str) -> Result<Snapshot, PersistenceError> {
        let path = self.path(location);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PersistenceError::NotFound(path.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(bincode::deserialize(&bytes)?)
    }

    fn delete(&self, location: &str) -> Result<(), PersistenceError> {
        match fs::remove_file(self.path(location)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Keeps encoded snapshots in memory. Useful for single-participant sessions
/// that should not touch the disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Persistence for MemoryStore {
    fn save(&self, snapshot: &Snapshot, location: &str) -> Result<(), PersistenceError> {
        let bytes = bincode::serialize(snapshot)?;
        self.slots().insert(location.to_string(), bytes);
        Ok(())
    }

    fn load(&self, location: &str) -> Result<Snapshot, PersistenceError> {
        let slots = self.slots();
        let bytes = slots
            .get(location)
            .ok_or_else(|| PersistenceError::NotFound(location.to_string()))?;
        Ok(bincode::deserialize(bytes)?)
    }

    fn delete(&self, location: &str) -> Result<(), PersistenceError> {
        self.slots().remove(location);
        Ok(())
    }
}
