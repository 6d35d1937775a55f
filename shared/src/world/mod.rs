pub mod data;
pub mod entity;
pub mod entity_id_generator;
pub mod entity_registry;
pub mod error;
pub mod id_range_allocator;
pub mod scene;
