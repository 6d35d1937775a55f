use std::{
    collections::{BTreeSet, HashMap},
    mem,
    sync::{Arc, Mutex, MutexGuard},
};

use log::{debug, warn};

use crate::{
    notifications::{ListenerId, NotificationBus, OwnershipGranted},
    world::{
        data::DynNetworkData,
        entity::{EntityKey, SyncEntities},
        entity_id_generator::EntityIdGenerator,
        error::{EntityResolveError, RegistryError},
        id_range_allocator::IdRange,
        scene::{strip_display_suffix, ObjectId, SceneProvider, ScenePath},
    },
    ConnectionId, DataTypeId, EntityId,
};

struct RegistryEntry {
    id: EntityId,
    owner: ConnectionId,
    create_message_sent: bool,
}

/// What the local peer needs to send after one replication tick
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickBatch {
    /// Owned entities never announced before, ordered by scene path so that
    /// parents are created before their children
    pub created: Vec<EntityKey>,
    /// Owned, already announced entities that changed
    pub updated: Vec<EntityKey>,
    /// Ids of owned, already announced entities that were destroyed
    pub deleted: Vec<EntityId>,
}

impl TickBatch {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Session-scoped index of every replicated entity: which id it has on the
/// wire, which connection owns it, and what must be sent for it next tick.
///
/// Entities owned locally get ids from the local connection's range once
/// [`EntityRegistry::init`] has run. Remote entities are admitted with the id
/// and owner their creator announced.
pub struct EntityRegistry {
    entries: HashMap<EntityKey, RegistryEntry>,
    by_id: HashMap<EntityId, EntityKey>,
    by_owner: HashMap<ConnectionId, BTreeSet<EntityKey>>,
    owned: BTreeSet<EntityKey>,
    sent_on_tick: BTreeSet<EntityKey>,
    owned_and_sent_on_tick: BTreeSet<EntityKey>,
    local_id: Option<ConnectionId>,
    generator: Option<EntityIdGenerator>,
    granted: Arc<Mutex<Vec<EntityKey>>>,
    bus: Arc<NotificationBus>,
    listener: Option<ListenerId>,
}

impl EntityRegistry {
    pub fn new(bus: Arc<NotificationBus>) -> Self {
        let granted = Arc::new(Mutex::new(Vec::new()));
        let queue = granted.clone();
        let listener = bus.subscribe::<OwnershipGranted>(move |notification| {
            queue
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(notification.key);
        });

        Self {
            entries: HashMap::new(),
            by_id: HashMap::new(),
            by_owner: HashMap::new(),
            owned: BTreeSet::new(),
            sent_on_tick: BTreeSet::new(),
            owned_and_sent_on_tick: BTreeSet::new(),
            local_id: None,
            generator: None,
            granted,
            bus,
            listener: Some(listener),
        }
    }

    /// Assigns the local id range and admits every live owned entity with a
    /// fresh id, marking each dirty so it is announced on the next tick
    pub fn init(
        &mut self,
        entities: &mut SyncEntities,
        local_id: ConnectionId,
        range: IdRange,
    ) -> Result<(), RegistryError> {
        if let Some(connection_id) = self.local_id {
            return Err(RegistryError::AlreadyInitialized { connection_id });
        }
        self.local_id = Some(local_id);
        self.generator = Some(EntityIdGenerator::new(range));

        // grants queued before init are covered by the scan below
        self.lock_granted().clear();

        let owned: Vec<EntityKey> = entities
            .keys()
            .filter(|key| entities.is_owned(*key) && !entities.is_destroyed(*key))
            .collect();
        for key in owned {
            self.admit_owned(entities, key)?;
            entities.mark_dirty(key);
        }

        debug!(
            "Entity registry initialized for connection {} with ids {}..={}",
            local_id, range.min, range.max
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.generator.is_some()
    }

    pub fn local_id(&self) -> Option<ConnectionId> {
        self.local_id
    }

    /// Admits entities whose ownership was granted since the last call.
    /// Grants before `init` are left to `init` itself.
    pub fn process_ownership_grants(
        &mut self,
        entities: &SyncEntities,
    ) -> Result<(), RegistryError> {
        let granted = mem::take(&mut *self.lock_granted());
        if !self.is_initialized() {
            return Ok(());
        }
        for key in granted {
            if entities.is_destroyed(key) || !entities.contains(key) {
                continue;
            }
            if let Some(entry) = self.entries.get(&key) {
                if Some(entry.owner) == self.local_id {
                    continue;
                }
                warn!(
                    "Entity {:?} owned by connection {} was taken over locally",
                    key, entry.owner
                );
                self.remove_entry(key);
            }
            self.admit_owned(entities, key)?;
        }
        Ok(())
    }

    fn admit_owned(&mut self, entities: &SyncEntities, key: EntityKey) -> Result<(), RegistryError> {
        let (Some(local_id), Some(generator)) = (self.local_id, self.generator.as_mut()) else {
            return Err(RegistryError::NotInitialized);
        };
        let id = generator.generate()?;
        self.admit(entities, key, id, local_id, false)
    }

    fn admit(
        &mut self,
        entities: &SyncEntities,
        key: EntityKey,
        id: EntityId,
        owner: ConnectionId,
        create_message_sent: bool,
    ) -> Result<(), RegistryError> {
        if let Some(holder) = self.by_id.get(&id) {
            if *holder != key {
                return Err(RegistryError::IdInUse { id, holder: *holder });
            }
        }

        self.entries.insert(
            key,
            RegistryEntry {
                id,
                owner,
                create_message_sent,
            },
        );
        self.by_id.insert(id, key);
        self.by_owner.entry(owner).or_default().insert(key);

        let is_owned = entities.is_owned(key);
        let send_every_tick = entities
            .entity(key)
            .is_some_and(|entity| entity.send_every_tick());
        if send_every_tick {
            self.sent_on_tick.insert(key);
        }
        if is_owned {
            self.owned.insert(key);
        }
        if is_owned && send_every_tick {
            self.owned_and_sent_on_tick.insert(key);
        }
        Ok(())
    }

    fn remove_entry(&mut self, key: EntityKey) -> Option<RegistryEntry> {
        let entry = self.entries.remove(&key)?;
        self.by_id.remove(&entry.id);
        if let Some(keys) = self.by_owner.get_mut(&entry.owner) {
            keys.remove(&key);
            if keys.is_empty() {
                self.by_owner.remove(&entry.owner);
            }
        }
        self.owned.remove(&key);
        self.sent_on_tick.remove(&key);
        self.owned_and_sent_on_tick.remove(&key);
        Some(entry)
    }

    /// Classifies every entity dirtied since the last tick.
    ///
    /// Destroyed entities leave every index only after classification, so a
    /// deletion is still announced under the id the entity was created with.
    /// Their ids are then returned to the local generator for reuse.
    pub fn tick(
        &mut self,
        entities: &mut SyncEntities,
        scene: &dyn SceneProvider,
    ) -> Result<TickBatch, RegistryError> {
        self.process_ownership_grants(entities)?;
        if !self.is_initialized() {
            return Ok(TickBatch::default());
        }

        let mut batch = TickBatch::default();
        let mut to_release = Vec::new();

        for key in entities.take_dirtied() {
            let is_destroyed = entities.is_destroyed(key) || !entities.contains(key);
            let Some(entry) = self.entries.get_mut(&key) else {
                if is_destroyed {
                    to_release.push(key);
                }
                continue;
            };

            if entities.is_owned(key) {
                match (entry.create_message_sent, is_destroyed) {
                    (true, true) => batch.deleted.push(entry.id),
                    (true, false) => batch.updated.push(key),
                    (false, false) => {
                        entry.create_message_sent = true;
                        batch.created.push(key);
                    }
                    (false, true) => {}
                }
            }

            if is_destroyed {
                to_release.push(key);
            }
        }

        batch.created.sort_by_cached_key(|key| {
            entities
                .object_of(*key)
                .and_then(|object| scene.path_of(object))
                .unwrap_or_default()
        });

        for key in to_release {
            self.forget(entities, key);
        }

        Ok(batch)
    }

    /// Drops an entity from every index and from the store, recycling its id
    /// if the local peer owned it
    fn forget(&mut self, entities: &mut SyncEntities, key: EntityKey) {
        if let Some(entry) = self.remove_entry(key) {
            if entities.is_owned(key) {
                if let Some(generator) = self.generator.as_mut() {
                    generator.recycle(entry.id);
                }
            }
            debug!("Removed entity {} ({:?})", entry.id, key);
        }
        entities.release(key);
    }

    /// Finds the local entity for a remote creation, instantiating its object
    /// from the payload's prefab when the scene doesn't already hold it.
    ///
    /// A creation for an id that is already registered returns the existing
    /// entity. On failure, an object instantiated for this call is destroyed.
    #[allow(clippy::too_many_arguments)]
    pub fn get_or_create_entity(
        &mut self,
        entities: &mut SyncEntities,
        scene: &mut dyn SceneProvider,
        id: EntityId,
        owner: ConnectionId,
        path: &str,
        data_type_id: DataTypeId,
        data: &dyn DynNetworkData,
    ) -> Result<EntityKey, EntityResolveError> {
        if let Some(key) = self.by_id.get(&id).copied() {
            if !entities.is_destroyed(key) && entities.contains(key) {
                debug!("Entity {} already exists, reusing {:?}", id, key);
                return Ok(key);
            }
            self.forget(entities, key);
        }

        let scene_path = ScenePath::parse(path).ok_or(EntityResolveError::EmptyPath)?;
        let (object, instantiated) = resolve_object(entities, scene, &scene_path, data)?;

        let matches: Vec<EntityKey> = entities
            .keys_on_object(object)
            .iter()
            .copied()
            .filter(|key| {
                !entities.is_destroyed(*key)
                    && entities
                        .entity(*key)
                        .is_some_and(|entity| entity.data_type_id() == data_type_id)
            })
            .collect();

        if matches.len() != 1 {
            if instantiated {
                entities.destroy_object(object, scene);
            }
            return Err(EntityResolveError::EntityMatchCount {
                count: matches.len(),
                data_type_id,
                data_type: data.name().to_string(),
                path: path.to_string(),
            });
        }

        let key = matches[0];
        if let Some(entry) = self.entries.get(&key) {
            return Err(EntityResolveError::AlreadyRegistered {
                key,
                existing_id: entry.id,
                path: path.to_string(),
            });
        }

        if self.admit(entities, key, id, owner, true).is_err() {
            if instantiated {
                entities.destroy_object(object, scene);
            }
            return Err(EntityResolveError::IdInUse {
                id,
                path: path.to_string(),
            });
        }
        scene.set_name(object, scene_path.object_name);
        Ok(key)
    }

    /// Hands a received payload to the entity registered under `id`.
    /// Returns false, and pools the payload, if there is no such entity.
    pub fn receive_data(
        &self,
        entities: &mut SyncEntities,
        id: EntityId,
        data: Box<dyn DynNetworkData>,
    ) -> bool {
        match self.by_id.get(&id) {
            Some(key) => {
                entities.receive_data(*key, data);
                true
            }
            None => {
                entities.pool_mut().give(data);
                false
            }
        }
    }

    /// Destroys the entity registered under `id` because its owner deleted it.
    /// Remote entities destroyed this way leave the registry immediately, so a
    /// later creation reusing the id resolves to a fresh entity.
    pub fn delete(
        &mut self,
        entities: &mut SyncEntities,
        scene: &mut dyn SceneProvider,
        id: EntityId,
    ) -> bool {
        let Some(key) = self.by_id.get(&id).copied() else {
            return false;
        };
        entities.destroy(key, scene);

        let remote_destroyed: Vec<EntityKey> = self
            .entries
            .keys()
            .copied()
            .filter(|key| !entities.is_owned(*key) && entities.is_destroyed(*key))
            .collect();
        for key in remote_destroyed {
            self.forget(entities, key);
        }
        true
    }

    /// Ends the session: destroys every entity the local peer doesn't own
    /// and clears all indices. Owned entities stay in the scene.
    pub fn dispose(&mut self, entities: &mut SyncEntities, scene: &mut dyn SceneProvider) {
        if let Some(listener) = self.listener.take() {
            self.bus.unsubscribe(listener);
        }

        let not_owned: Vec<EntityKey> = entities
            .keys()
            .filter(|key| !entities.is_owned(*key))
            .collect();
        for key in not_owned.iter().copied() {
            if !entities.is_destroyed(key) {
                entities.destroy(key, scene);
            }
        }
        for key in not_owned {
            entities.release(key);
        }
        self.entries.clear();
        self.by_id.clear();
        self.by_owner.clear();
        self.owned.clear();
        self.sent_on_tick.clear();
        self.owned_and_sent_on_tick.clear();
        self.generator = None;
        self.local_id = None;
    }

    pub fn id_of(&self, key: EntityKey) -> Option<EntityId> {
        self.entries.get(&key).map(|entry| entry.id)
    }

    pub fn owner_of(&self, key: EntityKey) -> Option<ConnectionId> {
        self.entries.get(&key).map(|entry| entry.owner)
    }

    pub fn key_of(&self, id: EntityId) -> Option<EntityKey> {
        self.by_id.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids of every entity owned by `owner`, ascending
    pub fn ids_owned_by(&self, owner: ConnectionId) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .by_owner
            .get(&owner)
            .into_iter()
            .flatten()
            .filter_map(|key| self.id_of(*key))
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn owned(&self) -> impl Iterator<Item = EntityKey> + '_ {
        self.owned.iter().copied()
    }

    pub fn sent_on_tick(&self) -> impl Iterator<Item = EntityKey> + '_ {
        self.sent_on_tick.iter().copied()
    }

    pub fn owned_and_sent_on_tick(&self) -> impl Iterator<Item = EntityKey> + '_ {
        self.owned_and_sent_on_tick.iter().copied()
    }

    /// Every registered, live entity ordered by scene path, as sent in a
    /// joining client's initial snapshot
    pub fn all_by_path(&self, entities: &SyncEntities, scene: &dyn SceneProvider) -> Vec<EntityKey> {
        let mut keys: Vec<(String, EntityKey)> = self
            .entries
            .keys()
            .copied()
            .filter(|key| !entities.is_destroyed(*key))
            .map(|key| {
                let path = entities
                    .object_of(key)
                    .and_then(|object| scene.path_of(object))
                    .unwrap_or_default();
                (path, key)
            })
            .collect();
        keys.sort();
        keys.into_iter().map(|(_, key)| key).collect()
    }

    fn lock_granted(&self) -> MutexGuard<'_, Vec<EntityKey>> {
        self.granted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for EntityRegistry {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            self.bus.unsubscribe(listener);
        }
    }
}

fn resolve_object(
    entities: &mut SyncEntities,
    scene: &mut dyn SceneProvider,
    path: &ScenePath,
    data: &dyn DynNetworkData,
) -> Result<(ObjectId, bool), EntityResolveError> {
    let roots = scene.root_objects();
    let find_root = |name: &str| -> Option<ObjectId> {
        roots
            .iter()
            .find(|(root_name, _)| root_name == name)
            .or_else(|| {
                let unsuffixed = strip_display_suffix(name);
                roots.iter().find(|(root_name, _)| root_name == unsuffixed)
            })
            .map(|(_, object)| *object)
    };

    let Some(root_name) = path.root_name else {
        if let Some(object) = find_root(path.object_name) {
            return Ok((object, false));
        }
        let object = instantiate(entities, scene, path, data, None)?;
        return Ok((object, true));
    };

    let Some(root) = find_root(root_name) else {
        return Err(EntityResolveError::RootNotFound {
            root: root_name.to_string(),
            path: path.full.to_string(),
            data_type: data.name().to_string(),
        });
    };

    let existing = path
        .object_relative
        .and_then(|relative| scene.find(root, relative))
        .or_else(|| {
            path.object_relative_unsuffixed()
                .and_then(|relative| scene.find(root, &relative))
        });
    if let Some(object) = existing {
        return Ok((object, false));
    }

    let parent = match path.parent_relative {
        None => root,
        Some(parent_relative) => scene.find(root, parent_relative).ok_or_else(|| {
            EntityResolveError::ParentNotFound {
                parent: format!("{}/{}", root_name, parent_relative),
                path: path.full.to_string(),
                data_type: data.name().to_string(),
            }
        })?,
    };

    let object = instantiate(entities, scene, path, data, Some(parent))?;
    Ok((object, true))
}

fn instantiate(
    entities: &mut SyncEntities,
    scene: &mut dyn SceneProvider,
    path: &ScenePath,
    data: &dyn DynNetworkData,
    parent: Option<ObjectId>,
) -> Result<ObjectId, EntityResolveError> {
    let Some(prefab) = data.prefab_ref() else {
        return Err(EntityResolveError::MissingPrefab {
            path: path.full.to_string(),
            data_type: data.name().to_string(),
        });
    };
    scene
        .instantiate(prefab, parent, entities)
        .ok_or_else(|| EntityResolveError::InstantiateFailed {
            prefab: prefab.to_string(),
            path: path.full.to_string(),
            data_type: data.name().to_string(),
        })
}
