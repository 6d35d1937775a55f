//! In-memory object graph implementing [`SceneProvider`]

use std::collections::BTreeMap;

use peerhost_shared::{
    DataKindsError, Interpolated, ObjectId, Protocol, SceneProvider, SyncEntities, SyncEntity,
    Synced,
};

use crate::test_protocol::{
    protocol, BadgeSync, PositionSync, SmoothMotion, BADGE_PREFAB, BALL_PREFAB, PLAYER_PREFAB,
};

/// Root object present in every test scene before any session starts
pub const LEVEL_ROOT: &str = "Level";

struct SceneObject {
    name: String,
    parent: Option<ObjectId>,
    children: Vec<ObjectId>,
}

pub struct TestScene {
    objects: BTreeMap<ObjectId, SceneObject>,
    next_object: u64,
    protocol: Protocol,
    level: ObjectId,
}

impl Default for TestScene {
    fn default() -> Self {
        Self::new()
    }
}

impl TestScene {
    pub fn new() -> Self {
        let mut scene = Self {
            objects: BTreeMap::new(),
            next_object: 0,
            protocol: protocol(),
            level: ObjectId::new(0),
        };
        scene.level = scene.add_object(LEVEL_ROOT, None);
        scene
    }

    pub fn level(&self) -> ObjectId {
        self.level
    }

    pub fn add_object(&mut self, name: &str, parent: Option<ObjectId>) -> ObjectId {
        let object = ObjectId::new(self.next_object);
        self.next_object += 1;
        self.objects.insert(
            object,
            SceneObject {
                name: name.to_string(),
                parent,
                children: Vec::new(),
            },
        );
        if let Some(parent) = parent.and_then(|parent| self.objects.get_mut(&parent)) {
            parent.children.push(object);
        }
        object
    }

    pub fn contains(&self, object: ObjectId) -> bool {
        self.objects.contains_key(&object)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn parent_of(&self, object: ObjectId) -> Option<ObjectId> {
        self.objects.get(&object).and_then(|entry| entry.parent)
    }

    pub fn children_of(&self, object: ObjectId) -> Vec<ObjectId> {
        self.objects
            .get(&object)
            .map(|entry| entry.children.clone())
            .unwrap_or_default()
    }

    /// Resolves an absolute path such as `"Level/Player abc"`
    pub fn find_path(&self, path: &str) -> Option<ObjectId> {
        let (root_name, relative) = match path.split_once('/') {
            Some((root_name, relative)) => (root_name, Some(relative)),
            None => (path, None),
        };
        let root = self
            .root_objects()
            .into_iter()
            .find(|(name, _)| name == root_name)
            .map(|(_, object)| object)?;
        match relative {
            Some(relative) => self.find(root, relative),
            None => Some(root),
        }
    }

    /// Builds the entity a prefab carries, `None` for unknown prefabs
    pub fn prefab_entity(&self, prefab: &str) -> Result<Option<Box<dyn SyncEntity>>, DataKindsError> {
        let data_kinds = &self.protocol.data_kinds;
        let entity: Box<dyn SyncEntity> = match prefab {
            PLAYER_PREFAB => Box::new(Synced::new(PositionSync::default(), data_kinds)?),
            BALL_PREFAB => Box::new(Interpolated::new(
                SmoothMotion::default(),
                data_kinds,
                self.protocol.fixed_updates_between_ticks,
            )?),
            BADGE_PREFAB => Box::new(Synced::new(BadgeSync::default(), data_kinds)?),
            _ => return Ok(None),
        };
        Ok(Some(entity))
    }

    fn collect_descendants(&self, object: ObjectId, collected: &mut Vec<ObjectId>) {
        let Some(entry) = self.objects.get(&object) else {
            return;
        };
        collected.push(object);
        for child in entry.children.iter().copied() {
            self.collect_descendants(child, collected);
        }
    }
}

impl SceneProvider for TestScene {
    fn root_objects(&self) -> Vec<(String, ObjectId)> {
        self.objects
            .iter()
            .filter(|(_, entry)| entry.parent.is_none())
            .map(|(object, entry)| (entry.name.clone(), *object))
            .collect()
    }

    fn find(&self, root: ObjectId, relative_path: &str) -> Option<ObjectId> {
        let mut current = root;
        for segment in relative_path.split('/') {
            let entry = self.objects.get(&current)?;
            current = entry
                .children
                .iter()
                .copied()
                .find(|child| {
                    self.objects
                        .get(child)
                        .is_some_and(|child| child.name == segment)
                })?;
        }
        Some(current)
    }

    fn instantiate(
        &mut self,
        prefab: &str,
        parent: Option<ObjectId>,
        entities: &mut SyncEntities,
    ) -> Option<ObjectId> {
        let entity = self.prefab_entity(prefab).ok()??;
        let object = self.add_object(prefab, parent);
        entities.spawn_boxed(object, entity);
        Some(object)
    }

    fn name(&self, object: ObjectId) -> Option<String> {
        self.objects.get(&object).map(|entry| entry.name.clone())
    }

    fn set_name(&mut self, object: ObjectId, name: &str) {
        if let Some(entry) = self.objects.get_mut(&object) {
            entry.name = name.to_string();
        }
    }

    fn path_of(&self, object: ObjectId) -> Option<String> {
        let mut segments = Vec::new();
        let mut current = Some(object);
        while let Some(object) = current {
            let entry = self.objects.get(&object)?;
            segments.push(entry.name.as_str());
            current = entry.parent;
        }
        segments.reverse();
        Some(segments.join("/"))
    }

    fn destroy(&mut self, object: ObjectId) -> Vec<ObjectId> {
        let mut destroyed = Vec::new();
        self.collect_descendants(object, &mut destroyed);
        if let Some(parent) = self.parent_of(object) {
            if let Some(parent) = self.objects.get_mut(&parent) {
                parent.children.retain(|child| *child != object);
            }
        }
        for object in destroyed.iter() {
            self.objects.remove(object);
        }
        destroyed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_resolve_both_ways() {
        let mut scene = TestScene::new();
        let player = scene.add_object("Player", Some(scene.level()));
        let hat = scene.add_object("Hat", Some(player));

        assert_eq!(scene.path_of(hat).as_deref(), Some("Level/Player/Hat"));
        assert_eq!(scene.find_path("Level/Player/Hat"), Some(hat));
        assert_eq!(scene.find(scene.level(), "Player"), Some(player));
        assert_eq!(scene.find_path("Level/Nobody"), None);
    }

    #[test]
    fn destroy_takes_descendants() {
        let mut scene = TestScene::new();
        let player = scene.add_object("Player", Some(scene.level()));
        let hat = scene.add_object("Hat", Some(player));

        let destroyed = scene.destroy(player);
        assert_eq!(destroyed, vec![player, hat]);
        assert!(!scene.contains(hat));
        assert!(scene.children_of(scene.level()).is_empty());
    }
}
