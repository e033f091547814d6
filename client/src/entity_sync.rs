//! Phased entity creation
//!
//! The server introduces entities as a run of `AddEntity` messages closed by
//! one `AddEntityFinish`. Nothing in the run is visible to the world until
//! the closing signal arrives, and then either every entity appears, in
//! receipt order, or none does.

use log::{debug, warn};
use shared::{
    BatchIntegrityError, EntityId, EntityKind, EntityRef, EntityState, Provenance, World,
    WorldError,
};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// Collecting refs.
    Pending,
    /// Commit signal received, refs being applied.
    Committing,
    /// Last batch applied in full.
    Committed,
    /// Last batch dropped as a whole.
    Discarded,
}

#[derive(Debug)]
pub struct EntitySyncController {
    pending: Vec<EntityRef>,
    state: BatchState,
}

impl Default for EntitySyncController {
    fn default() -> Self {
        Self::new()
    }
}

impl EntitySyncController {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            state: BatchState::Pending,
        }
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Appends a ref to the open batch, opening a new one if needed.
    pub fn buffer(&mut self, entity: EntityRef) {
        if self.state != BatchState::Pending {
            self.state = BatchState::Pending;
        }
        self.pending.push(entity);
    }

    /// Drops a ref the server removed before the batch closed.
    pub fn remove_pending(&mut self, id: EntityId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|entity| entity.id != id);
        before != self.pending.len()
    }

    /// Applies the open batch to the world. On any failure the world is left
    /// exactly as it was and the batch is gone.
    pub fn commit(&mut self, world: &mut World) -> Result<Vec<EntityId>, BatchIntegrityError> {
        self.state = BatchState::Committing;
        let batch = std::mem::take(&mut self.pending);

        let result = validate(&batch, world).and_then(|decoded| apply(decoded, world));
        match &result {
            Ok(ids) => {
                debug!("Committed batch of {} entities", ids.len());
                self.state = BatchState::Committed;
            }
            Err(e) => {
                warn!("Discarding batch of {} entities: {}", batch.len(), e);
                self.state = BatchState::Discarded;
            }
        }
        result
    }

    /// Drops the open batch, e.g. when the connection is lost mid-batch.
    pub fn discard(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        if dropped > 0 {
            debug!("Discarded {} pending entities", dropped);
        }
        self.state = BatchState::Discarded;
        dropped
    }
}

/// Decodes every ref and checks it would insert, before anything is inserted.
fn validate(
    batch: &[EntityRef],
    world: &World,
) -> Result<Vec<(EntityId, EntityKind, EntityState)>, BatchIntegrityError> {
    if batch.len() > world.remaining_capacity() {
        let id = batch
            .get(world.remaining_capacity())
            .map_or(0, |entity| entity.id);
        return Err(BatchIntegrityError::Rejected {
            id,
            source: WorldError::Full(world.entity_count() + world.remaining_capacity()),
        });
    }

    let mut seen = HashSet::new();
    let mut decoded = Vec::with_capacity(batch.len());
    for entity in batch {
        let kind = EntityKind::from_tag(entity.kind).ok_or(BatchIntegrityError::UnknownKind {
            id: entity.id,
            tag: entity.kind,
        })?;
        let state = EntityState::from_blob(&entity.state)
            .map_err(|_| BatchIntegrityError::MalformedState { id: entity.id })?;
        if world.entity(entity.id).is_some() || !seen.insert(entity.id) {
            return Err(BatchIntegrityError::Rejected {
                id: entity.id,
                source: WorldError::DuplicateEntity(entity.id),
            });
        }
        decoded.push((entity.id, kind, state));
    }
    Ok(decoded)
}

/// Inserts in receipt order, undoing earlier inserts if one fails.
fn apply(
    decoded: Vec<(EntityId, EntityKind, EntityState)>,
    world: &mut World,
) -> Result<Vec<EntityId>, BatchIntegrityError> {
    let mut inserted = Vec::with_capacity(decoded.len());
    for (id, kind, state) in decoded {
        if let Err(source) = world.insert(id, kind, state) {
            for id in inserted.iter().rev() {
                world.remove(*id, Provenance::Remote);
            }
            return Err(BatchIntegrityError::Rejected { id, source });
        }
        inserted.push(id);
    }
    Ok(inserted)
}
