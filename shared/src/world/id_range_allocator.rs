use thiserror::Error;

use crate::EntityId;

/// Number of entity ids handed to each connection
pub const RANGE_PER_CONNECTION: u16 = 500;

/// An inclusive block of entity ids owned by one connection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IdRange {
    pub min: EntityId,
    pub max: EntityId,
}

impl IdRange {
    pub fn new(min: EntityId, max: EntityId) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.min <= id && id <= self.max
    }

    pub fn len(&self) -> u32 {
        u32::from(self.max) - u32::from(self.min) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.max < self.min
    }

    pub fn overlaps(&self, other: &IdRange) -> bool {
        self.min <= other.max && other.min <= self.max
    }
}

/// Errors that can occur while handing out id ranges
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdRangeError {
    /// Every fresh range has been carved and none have been freed
    #[error("Entity id space exhausted: no free range of {range_size} ids left after {next_range_start}")]
    Exhausted {
        next_range_start: u32,
        range_size: u16,
    },

    /// Ranges must hold at least one id
    #[error("Id ranges must contain at least one id")]
    EmptyRange,

    /// The freed id is not the start of a range this allocator handed out
    #[error("Id {min} is not the start of an allocated range of {range_size} ids")]
    UnknownRange { min: EntityId, range_size: u16 },
}

/// Hands out disjoint, fixed-size id ranges to connections.
///
/// Freed ranges are reused most-recently-freed first; otherwise the next block
/// is carved off a monotonically increasing counter. Ranges are never split.
pub struct IdRangeAllocator {
    range_size: u16,
    next_range_start: u32,
    freed_range_mins: Vec<EntityId>,
}

impl IdRangeAllocator {
    pub fn new() -> Self {
        Self {
            range_size: RANGE_PER_CONNECTION,
            next_range_start: 0,
            freed_range_mins: Vec::new(),
        }
    }

    pub fn with_range_size(range_size: u16) -> Result<Self, IdRangeError> {
        if range_size == 0 {
            return Err(IdRangeError::EmptyRange);
        }
        Ok(Self {
            range_size,
            ..Self::new()
        })
    }

    pub fn range_size(&self) -> u16 {
        self.range_size
    }

    pub fn get_free_range(&mut self) -> Result<IdRange, IdRangeError> {
        if let Some(min) = self.freed_range_mins.pop() {
            return Ok(self.range_starting_at(min));
        }

        let max = self.next_range_start + u32::from(self.range_size) - 1;
        if max > u32::from(EntityId::MAX) {
            return Err(IdRangeError::Exhausted {
                next_range_start: self.next_range_start,
                range_size: self.range_size,
            });
        }
        let min = self.next_range_start as EntityId;
        self.next_range_start += u32::from(self.range_size);
        Ok(self.range_starting_at(min))
    }

    /// Returns the range starting at `min` to the pool
    pub fn free_range(&mut self, min: EntityId) -> Result<(), IdRangeError> {
        let start = u32::from(min);
        if start % u32::from(self.range_size) != 0 || start >= self.next_range_start {
            return Err(IdRangeError::UnknownRange {
                min,
                range_size: self.range_size,
            });
        }
        if self.freed_range_mins.contains(&min) {
            log::warn!("Id range starting at {} freed twice, ignoring", min);
            return Ok(());
        }
        self.freed_range_mins.push(min);
        Ok(())
    }

    pub fn freed_count(&self) -> usize {
        self.freed_range_mins.len()
    }

    fn range_starting_at(&self, min: EntityId) -> IdRange {
        IdRange::new(min, min + (self.range_size - 1))
    }
}

impl Default for IdRangeAllocator {
    fn default() -> Self {
        Self::new()
    }
}
