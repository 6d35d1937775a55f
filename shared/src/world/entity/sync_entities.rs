use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    mem,
    sync::Arc,
};

use peerhost_serde::ByteWriter;

use crate::{
    notifications::{NotificationBus, OwnershipGranted},
    world::{
        data::{DataPool, DynNetworkData},
        error::OwnershipError,
        scene::{ObjectId, SceneProvider},
    },
};

use super::{EntityKey, SyncEntity};

const DISPLAY_SUFFIX_LENGTH: usize = 8;

struct SyncEntityRecord {
    object: ObjectId,
    entity: Box<dyn SyncEntity>,
    is_owned: bool,
    is_destroyed: bool,
}

/// Every sync entity in the local scene, owned or not.
///
/// Entities are attached to scene objects. Destroying an object destroys all
/// entities on it and its descendants; destroyed entities stay in the store
/// until the registry has announced the deletion and releases them.
pub struct SyncEntities {
    records: BTreeMap<EntityKey, SyncEntityRecord>,
    by_object: HashMap<ObjectId, Vec<EntityKey>>,
    renamed_objects: HashSet<ObjectId>,
    dirtied: BTreeSet<EntityKey>,
    next_key: u64,
    pool: DataPool,
    bus: Arc<NotificationBus>,
}

impl SyncEntities {
    pub fn new(bus: Arc<NotificationBus>) -> Self {
        Self {
            records: BTreeMap::new(),
            by_object: HashMap::new(),
            renamed_objects: HashSet::new(),
            dirtied: BTreeSet::new(),
            next_key: 0,
            pool: DataPool::new(),
            bus,
        }
    }

    /// Attaches a not-owned entity to `object`
    pub fn spawn<E: SyncEntity>(&mut self, object: ObjectId, entity: E) -> EntityKey {
        self.spawn_boxed(object, Box::new(entity))
    }

    pub fn spawn_boxed(&mut self, object: ObjectId, entity: Box<dyn SyncEntity>) -> EntityKey {
        let key = EntityKey::new(self.next_key);
        self.next_key += 1;
        self.records.insert(
            key,
            SyncEntityRecord {
                object,
                entity,
                is_owned: false,
                is_destroyed: false,
            },
        );
        self.by_object.entry(object).or_default().push(key);
        key
    }

    /// Attaches an entity that the local peer owns from the start
    pub fn spawn_owned<E: SyncEntity>(
        &mut self,
        object: ObjectId,
        entity: E,
        scene: &mut dyn SceneProvider,
    ) -> EntityKey {
        let key = self.spawn(object, entity);
        self.grant_ownership(key, scene);
        key
    }

    /// Ownership can be granted but never revoked. Granting gives the object a
    /// unique display name, marks the entity dirty and publishes
    /// [`OwnershipGranted`].
    pub fn set_owned(
        &mut self,
        key: EntityKey,
        owned: bool,
        scene: &mut dyn SceneProvider,
    ) -> Result<(), OwnershipError> {
        let record = self
            .records
            .get(&key)
            .ok_or(OwnershipError::EntityNotFound { key })?;

        match (record.is_owned, owned) {
            (true, true) | (false, false) => Ok(()),
            (true, false) => Err(OwnershipError::CannotRevoke { key }),
            (false, true) => {
                if record.is_destroyed {
                    return Err(OwnershipError::EntityDestroyed { key });
                }
                self.grant_ownership(key, scene);
                Ok(())
            }
        }
    }

    fn grant_ownership(&mut self, key: EntityKey, scene: &mut dyn SceneProvider) {
        let Some(record) = self.records.get_mut(&key) else {
            return;
        };
        record.is_owned = true;
        let object = record.object;

        if self.renamed_objects.insert(object) {
            if let Some(name) = scene.name(object) {
                scene.set_name(object, &format!("{} {}", name, display_suffix()));
            }
        }

        self.dirtied.insert(key);
        self.bus.publish(&OwnershipGranted { key });
    }

    /// Queues an owned entity to be sent on the next replication tick.
    /// Has no effect on entities the local peer does not own.
    pub fn mark_dirty(&mut self, key: EntityKey) {
        if let Some(record) = self.records.get(&key) {
            if record.is_owned && !record.is_destroyed {
                self.dirtied.insert(key);
            }
        }
    }

    /// Destroys the object holding `key`, along with every entity on it
    pub fn destroy(&mut self, key: EntityKey, scene: &mut dyn SceneProvider) {
        if let Some(object) = self.object_of(key) {
            self.destroy_object(object, scene);
        }
    }

    /// Destroys `object` and its descendants, and every entity on them
    pub fn destroy_object(&mut self, object: ObjectId, scene: &mut dyn SceneProvider) {
        let mut destroyed = scene.destroy(object);
        if !destroyed.contains(&object) {
            destroyed.push(object);
        }

        for destroyed_object in destroyed {
            self.renamed_objects.remove(&destroyed_object);
            let Some(keys) = self.by_object.get(&destroyed_object) else {
                continue;
            };
            for key in keys {
                if let Some(record) = self.records.get_mut(key) {
                    if !record.is_destroyed {
                        record.is_destroyed = true;
                        self.dirtied.insert(*key);
                    }
                }
            }
        }
    }

    pub fn contains(&self, key: EntityKey) -> bool {
        self.records.contains_key(&key)
    }

    pub fn is_owned(&self, key: EntityKey) -> bool {
        self.records.get(&key).is_some_and(|record| record.is_owned)
    }

    pub fn is_destroyed(&self, key: EntityKey) -> bool {
        self.records
            .get(&key)
            .is_some_and(|record| record.is_destroyed)
    }

    pub fn object_of(&self, key: EntityKey) -> Option<ObjectId> {
        self.records.get(&key).map(|record| record.object)
    }

    pub fn keys_on_object(&self, object: ObjectId) -> &[EntityKey] {
        self.by_object
            .get(&object)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn keys(&self) -> impl Iterator<Item = EntityKey> + '_ {
        self.records.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn entity(&self, key: EntityKey) -> Option<&dyn SyncEntity> {
        self.records.get(&key).map(|record| &*record.entity)
    }

    pub fn get<T: SyncEntity>(&self, key: EntityKey) -> Option<&T> {
        self.records
            .get(&key)
            .and_then(|record| record.entity.as_any().downcast_ref::<T>())
    }

    pub fn get_mut<T: SyncEntity>(&mut self, key: EntityKey) -> Option<&mut T> {
        self.records
            .get_mut(&key)
            .and_then(|record| record.entity.as_any_mut().downcast_mut::<T>())
    }

    /// Live entities of concrete type `T`
    pub fn iter_of<T: SyncEntity>(&self) -> impl Iterator<Item = (EntityKey, &T)> + '_ {
        self.records.iter().filter_map(|(key, record)| {
            if record.is_destroyed {
                return None;
            }
            record
                .entity
                .as_any()
                .downcast_ref::<T>()
                .map(|entity| (*key, entity))
        })
    }

    pub fn pool_mut(&mut self) -> &mut DataPool {
        &mut self.pool
    }

    pub fn bus(&self) -> &Arc<NotificationBus> {
        &self.bus
    }

    /// Writes `[u16 data type id][payload]` for the entity.
    /// Returns false if the entity is unknown.
    pub fn write_entity(&mut self, key: EntityKey, writer: &mut ByteWriter) -> bool {
        let Some(record) = self.records.get(&key) else {
            return false;
        };
        record.entity.write_to(writer, &mut self.pool);
        true
    }

    pub fn create_data(&mut self, key: EntityKey) -> Option<Box<dyn DynNetworkData>> {
        let record = self.records.get(&key)?;
        Some(record.entity.create_data(&mut self.pool))
    }

    /// Hands a received payload to the entity. Payloads for unknown or
    /// destroyed entities go straight back to the pool.
    pub fn receive_data(&mut self, key: EntityKey, data: Box<dyn DynNetworkData>) {
        match self.records.get_mut(&key) {
            Some(record) if !record.is_destroyed => {
                record
                    .entity
                    .on_received_data(record.is_owned, data, &mut self.pool);
            }
            _ => self.pool.give(data),
        }
    }

    pub fn notify_synced_to_all(&mut self, key: EntityKey) {
        if let Some(record) = self.records.get_mut(&key) {
            record.entity.on_owned_data_synced_to_all();
        }
    }

    /// One-line description of the entity and its current snapshot
    pub fn describe(&mut self, key: EntityKey) -> String {
        let Some(record) = self.records.get(&key) else {
            return format!("{:?} (unknown)", key);
        };
        let data = record.entity.create_data(&mut self.pool);
        let description = format!(
            "{:?} {} owned: {} destroyed: {} data: {}",
            key,
            record.entity.type_name(),
            record.is_owned,
            record.is_destroyed,
            data.describe()
        );
        self.pool.give(data);
        description
    }

    pub fn fixed_update_all(&mut self) {
        for record in self.records.values_mut() {
            if !record.is_destroyed {
                record.entity.fixed_update(record.is_owned, &mut self.pool);
            }
        }
    }

    pub fn update_all(&mut self) {
        for record in self.records.values_mut() {
            if !record.is_destroyed {
                record.entity.update(record.is_owned, &mut self.pool);
            }
        }
    }

    /// Number of entities waiting for the next replication tick
    pub fn dirty_count(&self) -> usize {
        self.dirtied.len()
    }

    pub(crate) fn take_dirtied(&mut self) -> BTreeSet<EntityKey> {
        mem::take(&mut self.dirtied)
    }

    /// Removes an entity from the store for good
    pub(crate) fn release(&mut self, key: EntityKey) {
        let Some(record) = self.records.remove(&key) else {
            return;
        };
        if let Some(keys) = self.by_object.get_mut(&record.object) {
            keys.retain(|other| *other != key);
            if keys.is_empty() {
                self.by_object.remove(&record.object);
            }
        }
    }
}

fn display_suffix() -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    (0..DISPLAY_SUFFIX_LENGTH)
        .map(|_| ALPHABET[fastrand::usize(..ALPHABET.len())] as char)
        .collect()
}
