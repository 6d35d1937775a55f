use log::warn;

use crate::{world::id_range_allocator::IdRange, EntityId};

use super::error::RegistryError;

/// Generates entity ids from the local connection's id range.
///
/// Freed ids are reused most-recently-freed first. An id is only freed once
/// the entity holding it has been removed from every registry index.
pub struct EntityIdGenerator {
    range: IdRange,
    next_id: u32,
    freed_ids: Vec<EntityId>,
}

impl EntityIdGenerator {
    pub fn new(range: IdRange) -> Self {
        Self {
            range,
            next_id: u32::from(range.min),
            freed_ids: Vec::new(),
        }
    }

    pub fn range(&self) -> IdRange {
        self.range
    }

    pub fn generate(&mut self) -> Result<EntityId, RegistryError> {
        if let Some(id) = self.freed_ids.pop() {
            return Ok(id);
        }

        if self.next_id > u32::from(self.range.max) {
            return Err(RegistryError::IdSpaceExhausted {
                min: self.range.min,
                max: self.range.max,
            });
        }

        let id = self.next_id as EntityId;
        self.next_id += 1;
        Ok(id)
    }

    /// Makes `id` available again. Ids outside the local range are ignored.
    pub fn recycle(&mut self, id: EntityId) {
        if !self.range.contains(id) {
            warn!(
                "Ignoring recycled entity id {} outside of local range {}..={}",
                id, self.range.min, self.range.max
            );
            return;
        }
        if self.freed_ids.contains(&id) {
            warn!("Entity id {} recycled twice, ignoring", id);
            return;
        }
        self.freed_ids.push(id);
    }
}
