//! Bijective mapping between participant names and player ids

use crate::protocol::PlayerId;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlayerRecord {
    pub name: String,
    pub id: PlayerId,
}

/// Name ↔ id registry for connected participants.
///
/// No two records ever share a name or an id: [`PlayerRegistry::put`] evicts
/// every other record colliding on either. Serializes as a flat list of
/// records in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<PlayerRecord>", into = "Vec<PlayerRecord>")]
pub struct PlayerRegistry {
    records: Vec<PlayerRecord>,
    by_name: HashMap<String, PlayerId>,
    by_id: HashMap<PlayerId, String>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `id`, evicting any other record sharing either
    ///
    /// A player that is renamed keeps its place in the record order. A name
    /// taken over by a different id goes to the end like a new record.
    pub fn put(&mut self, name: &str, id: PlayerId) {
        let stale_id = self.by_name.get(name).copied();
        let stale_name = self.by_id.get(&id).cloned();

        if stale_id == Some(id) {
            return;
        }
        if let Some(stale_id) = stale_id {
            info!("Name {} moves from player {} to {}", name, stale_id, id);
            self.evict(stale_id);
        }
        self.by_name.insert(name.to_string(), id);
        self.by_id.insert(id, name.to_string());

        match stale_name {
            Some(stale_name) => {
                info!("Player {} renamed from {} to {}", id, stale_name, name);
                self.by_name.remove(&stale_name);
                if let Some(record) = self.records.iter_mut().find(|record| record.id == id) {
                    record.name = name.to_string();
                }
            }
            None => self.records.push(PlayerRecord {
                name: name.to_string(),
                id,
            }),
        }
    }

    pub fn get_id(&self, name: &str) -> Option<PlayerId> {
        self.by_name.get(name).copied()
    }

    pub fn get_name(&self, id: PlayerId) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Removes the record for `id`, returning its name.
    pub fn remove_id(&mut self, id: PlayerId) -> Option<String> {
        let name = self.by_id.get(&id).cloned()?;
        self.evict(id);
        Some(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn evict(&mut self, id: PlayerId) {
        if let Some(name) = self.by_id.remove(&id) {
            self.by_name.remove(&name);
        }
        self.records.retain(|record| record.id != id);
    }
}

impl From<Vec<PlayerRecord>> for PlayerRegistry {
    fn from(records: Vec<PlayerRecord>) -> Self {
        let mut registry = PlayerRegistry::new();
        for record in records {
            registry.put(&record.name, record.id);
        }
        registry
    }
}

impl From<PlayerRegistry> for Vec<PlayerRecord> {
    fn from(registry: PlayerRegistry) -> Self {
        registry.records
    }
}
