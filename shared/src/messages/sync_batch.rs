use peerhost_serde::{ByteReader, ByteWriter};

use crate::{
    world::{
        data::{DataKinds, DataPool, DynNetworkData},
        entity::{EntityKey, SyncEntities},
        entity_registry::EntityRegistry,
        id_range_allocator::IdRange,
        scene::SceneProvider,
    },
    ConnectionId, DataTypeId, EntityId,
};

use super::BatchError;

/// One entry of a create batch, decoded but not yet applied
pub struct CreateEntry {
    pub owner: ConnectionId,
    pub id: EntityId,
    pub path: String,
    pub data_type_id: DataTypeId,
    pub data: Box<dyn DynNetworkData>,
}

/// Payload of an initial message: the receiver's id range, and every
/// existing entity unless the receiver is the host's own client
pub struct InitialData {
    pub range: IdRange,
    pub creates: Vec<CreateEntry>,
}

/// Appends `[u16 id][u16 data type id][payload]` per registered entity
pub fn write_sync_data(
    writer: &mut ByteWriter,
    registry: &EntityRegistry,
    entities: &mut SyncEntities,
    keys: impl IntoIterator<Item = EntityKey>,
) {
    for key in keys {
        let Some(id) = registry.id_of(key) else {
            continue;
        };
        if !entities.contains(key) {
            continue;
        }
        writer.write(&id);
        entities.write_entity(key, writer);
    }
}

/// Reads `[u16 id][u16 data type id][payload]` entries until the message ends
pub fn read_sync_data(
    reader: &mut ByteReader,
    data_kinds: &DataKinds,
    pool: &mut DataPool,
) -> Result<Vec<(EntityId, Box<dyn DynNetworkData>)>, BatchError> {
    let mut entries = Vec::new();
    while reader.has_remaining() {
        let id: EntityId = reader.read()?;
        let data = read_data(reader, data_kinds, pool)?;
        entries.push((id, data));
    }
    Ok(entries)
}

/// Appends `[u16 owner][u16 id][string path][u16 data type id][payload]`
/// per registered entity
pub fn write_create_batch(
    writer: &mut ByteWriter,
    registry: &EntityRegistry,
    entities: &mut SyncEntities,
    scene: &dyn SceneProvider,
    keys: impl IntoIterator<Item = EntityKey>,
) {
    for key in keys {
        let (Some(id), Some(owner), Some(object)) = (
            registry.id_of(key),
            registry.owner_of(key),
            entities.object_of(key),
        ) else {
            continue;
        };
        let path = scene.path_of(object).unwrap_or_default();
        writer.write(&owner);
        writer.write(&id);
        writer.write(&path);
        entities.write_entity(key, writer);
    }
}

pub fn read_create_batch(
    reader: &mut ByteReader,
    data_kinds: &DataKinds,
    pool: &mut DataPool,
) -> Result<Vec<CreateEntry>, BatchError> {
    let mut entries = Vec::new();
    while reader.has_remaining() {
        let owner: ConnectionId = reader.read()?;
        let id: EntityId = reader.read()?;
        let path: String = reader.read()?;
        let data_type_id: DataTypeId = reader.read()?;
        let mut data = pool.take_by_id(data_kinds, data_type_id)?;
        data.read(reader)?;
        entries.push(CreateEntry {
            owner,
            id,
            path,
            data_type_id,
            data,
        });
    }
    Ok(entries)
}

pub fn write_delete_batch(writer: &mut ByteWriter, ids: impl IntoIterator<Item = EntityId>) {
    for id in ids {
        writer.write(&id);
    }
}

pub fn read_delete_batch(reader: &mut ByteReader) -> Result<Vec<EntityId>, BatchError> {
    let mut ids = Vec::with_capacity(reader.unread_len() / 2);
    while reader.has_remaining() {
        ids.push(reader.read()?);
    }
    Ok(ids)
}

/// Writes `[u16 min id][u16 max id]`. A create batch may follow.
pub fn write_initial_data(writer: &mut ByteWriter, range: IdRange) {
    writer.write(&range.min);
    writer.write(&range.max);
}

pub fn read_initial_data(
    reader: &mut ByteReader,
    data_kinds: &DataKinds,
    pool: &mut DataPool,
    with_creates: bool,
) -> Result<InitialData, BatchError> {
    let min: EntityId = reader.read()?;
    let max: EntityId = reader.read()?;
    let creates = if with_creates {
        read_create_batch(reader, data_kinds, pool)?
    } else {
        Vec::new()
    };
    Ok(InitialData {
        range: IdRange::new(min, max),
        creates,
    })
}

fn read_data(
    reader: &mut ByteReader,
    data_kinds: &DataKinds,
    pool: &mut DataPool,
) -> Result<Box<dyn DynNetworkData>, BatchError> {
    let data_type_id: DataTypeId = reader.read()?;
    let mut data = pool.take_by_id(data_kinds, data_type_id)?;
    data.read(reader)?;
    Ok(data)
}
