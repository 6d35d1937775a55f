mod entity_key;
mod interpolated;
mod interpolation_buffer;
mod sync_entities;
mod sync_entity;

pub use entity_key::EntityKey;
pub use interpolated::{Interpolated, InterpolatedBehavior};
pub use interpolation_buffer::{
    InterpolationBuffer, INTERPOLATION_BUFFER_CAPACITY, INTERPOLATION_TIME_STRETCH,
};
pub use sync_entities::SyncEntities;
pub use sync_entity::{SyncBehavior, SyncEntity, Synced};
