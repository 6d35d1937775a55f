//! # Peerhost Shared
//! Entity replication engine shared by the host and client roles of a
//! peerhost session: id ranges, the entity registry, sync entities,
//! interpolation, and the message envelope.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

pub use peerhost_serde::{ByteReader, ByteWriter, Serde, SerdeErr};

mod messages;
mod notifications;
mod protocol;
mod types;
mod world;

pub use messages::{
    read_create_batch, read_delete_batch, read_initial_data, read_sync_data, write_create_batch,
    write_delete_batch, write_initial_data, write_sync_data, BatchError, CreateEntry,
    EnvelopeError, EnvelopeHeader, InitialData, MessageRecipient, MessageType,
    NetworkMessageType, MAX_TARGET,
};
pub use notifications::{ListenerId, NotificationBus, OwnershipGranted, ReceivedInitialData};
pub use protocol::{Protocol, ProtocolError, DEFAULT_FIXED_UPDATES_BETWEEN_TICKS};
pub use types::{ConnectionId, DataTypeId, EntityId, HostType, MessageTypeTag, SendMode};
pub use world::{
    data::{DataKinds, DataKindsError, DataPool, DynNetworkData, NetworkData},
    entity::{
        EntityKey, Interpolated, InterpolatedBehavior, InterpolationBuffer, SyncBehavior,
        SyncEntities, SyncEntity, Synced, INTERPOLATION_BUFFER_CAPACITY,
        INTERPOLATION_TIME_STRETCH,
    },
    entity_id_generator::EntityIdGenerator,
    entity_registry::{EntityRegistry, TickBatch},
    error::{EntityResolveError, OwnershipError, RegistryError},
    id_range_allocator::{IdRange, IdRangeAllocator, IdRangeError, RANGE_PER_CONNECTION},
    scene::{strip_display_suffix, ObjectId, SceneProvider, ScenePath},
};
