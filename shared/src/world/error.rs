use thiserror::Error;

use crate::{world::entity::EntityKey, DataTypeId, EntityId};

/// Errors raised by the entity registry. These are fatal to the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The local connection has used every id in its range
    #[error("Ran out of entity ids: every id in the local range {min}..={max} is in use")]
    IdSpaceExhausted { min: EntityId, max: EntityId },

    /// An operation that needs the local id range ran before `init`
    #[error("Entity registry used before init assigned a local id range")]
    NotInitialized,

    /// The registry was initialized twice for one session
    #[error("Entity registry already initialized for connection {connection_id}")]
    AlreadyInitialized { connection_id: u16 },

    /// Another entity is still registered under the id
    #[error("Entity id {id} is still held by {holder:?}")]
    IdInUse { id: EntityId, holder: EntityKey },
}

/// Errors resolving a remote creation to a local entity.
/// Each one affects only the single entity being created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntityResolveError {
    /// The first path segment names no root object in the scene
    #[error("Root object \"{root}\" not found when creating {data_type} entity at \"{path}\"")]
    RootNotFound {
        root: String,
        path: String,
        data_type: String,
    },

    /// The parent of a missing object does not exist, so it cannot be instantiated
    #[error("Parent at path \"{parent}\" not found when creating {data_type} entity at \"{path}\"")]
    ParentNotFound {
        parent: String,
        path: String,
        data_type: String,
    },

    /// The object does not exist and the payload names no prefab to build it from
    #[error("No object at \"{path}\" and {data_type} provides no prefab to instantiate")]
    MissingPrefab { path: String, data_type: String },

    /// The scene provider could not instantiate the prefab
    #[error("Prefab \"{prefab}\" could not be instantiated for {data_type} entity at \"{path}\"")]
    InstantiateFailed {
        prefab: String,
        path: String,
        data_type: String,
    },

    /// Zero or several entities on the object use this data type
    #[error("{count} sync entities found for {data_type} (id {data_type_id}) on object at \"{path}\"")]
    EntityMatchCount {
        count: usize,
        data_type_id: DataTypeId,
        data_type: String,
        path: String,
    },

    /// The matched entity is already admitted under a different id
    #[error("Entity {key:?} at \"{path}\" is already registered under id {existing_id}")]
    AlreadyRegistered {
        key: EntityKey,
        existing_id: EntityId,
        path: String,
    },

    /// The id is registered to another entity
    #[error("Entity id {id} for \"{path}\" is still held by another entity")]
    IdInUse { id: EntityId, path: String },

    /// An empty path cannot address anything
    #[error("Empty hierarchical path")]
    EmptyPath,
}

/// Errors changing an entity's ownership
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OwnershipError {
    /// Ownership, once granted, is never given back
    #[error("Ownership of {key:?} cannot be revoked")]
    CannotRevoke { key: EntityKey },

    #[error("Sync entity {key:?} does not exist")]
    EntityNotFound { key: EntityKey },

    #[error("Sync entity {key:?} is destroyed and cannot become owned")]
    EntityDestroyed { key: EntityKey },
}
