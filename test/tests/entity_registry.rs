use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use peerhost_shared::{
    read_sync_data, write_sync_data, ByteReader, ByteWriter, EntityKey, EntityRegistry,
    EntityResolveError, IdRange, NotificationBus, OwnershipError, OwnershipGranted, Protocol,
    RegistryError, SceneProvider, SyncEntities, Synced,
};
use peerhost_test::{protocol, Badge, BadgeSync, Position, PositionSync, TestScene, PLAYER_PREFAB};

struct Fixture {
    protocol: Protocol,
    bus: Arc<NotificationBus>,
    entities: SyncEntities,
    registry: EntityRegistry,
    scene: TestScene,
}

impl Fixture {
    fn new() -> Self {
        let bus = Arc::new(NotificationBus::new());
        Self {
            protocol: protocol(),
            entities: SyncEntities::new(bus.clone()),
            registry: EntityRegistry::new(bus.clone()),
            scene: TestScene::new(),
            bus,
        }
    }

    fn init(&mut self) {
        self.registry
            .init(&mut self.entities, 1, IdRange::new(0, 499))
            .unwrap();
    }

    fn player(&self, x: f32) -> Synced<PositionSync> {
        Synced::new(PositionSync::new(x, 0.0), &self.protocol.data_kinds).unwrap()
    }

    fn owned_player(&mut self, x: f32) -> EntityKey {
        let object = self.scene.add_object(PLAYER_PREFAB, Some(self.scene.level()));
        let entity = self.player(x);
        self.entities.spawn_owned(object, entity, &mut self.scene)
    }

    fn tick(&mut self) -> peerhost_shared::TickBatch {
        self.registry.tick(&mut self.entities, &self.scene).unwrap()
    }

    fn position_type(&self) -> u16 {
        self.protocol.data_kinds.id_of::<Position>().unwrap()
    }

    fn remote_player(
        &mut self,
        id: u16,
        owner: u16,
        path: &str,
    ) -> Result<EntityKey, EntityResolveError> {
        let data_type_id = self.position_type();
        self.registry.get_or_create_entity(
            &mut self.entities,
            &mut self.scene,
            id,
            owner,
            path,
            data_type_id,
            &Position::default(),
        )
    }
}

#[test]
fn created_then_updated_then_deleted() {
    let mut fixture = Fixture::new();
    fixture.init();
    let key = fixture.owned_player(1.0);

    let batch = fixture.tick();
    assert_eq!(batch.created, vec![key]);
    assert!(batch.updated.is_empty() && batch.deleted.is_empty());
    assert_eq!(fixture.registry.id_of(key), Some(0));

    fixture.entities.mark_dirty(key);
    let batch = fixture.tick();
    assert!(batch.created.is_empty());
    assert_eq!(batch.updated, vec![key]);

    fixture.entities.destroy(key, &mut fixture.scene);
    let batch = fixture.tick();
    assert_eq!(batch.deleted, vec![0]);
    assert_eq!(fixture.registry.key_of(0), None);
    assert!(!fixture.entities.contains(key));
    assert!(fixture.registry.is_empty());
}

#[test]
fn second_tick_without_changes_is_empty() {
    let mut fixture = Fixture::new();
    fixture.init();
    let key = fixture.owned_player(1.0);
    fixture.entities.mark_dirty(key);

    assert!(!fixture.tick().is_empty());
    assert!(fixture.tick().is_empty());
}

#[test]
fn parents_come_before_children() {
    let mut fixture = Fixture::new();
    fixture.init();

    let parent_object = fixture
        .scene
        .add_object(PLAYER_PREFAB, Some(fixture.scene.level()));
    let child_object = fixture.scene.add_object("Badge", Some(parent_object));
    let badge = Synced::new(BadgeSync::default(), &fixture.protocol.data_kinds).unwrap();
    let child = fixture
        .entities
        .spawn_owned(child_object, badge, &mut fixture.scene);
    let player = fixture.player(0.0);
    let parent = fixture
        .entities
        .spawn_owned(parent_object, player, &mut fixture.scene);

    assert_eq!(fixture.tick().created, vec![parent, child]);
}

#[test]
fn dirtying_before_init_is_kept() {
    let mut fixture = Fixture::new();
    let key = fixture.owned_player(1.0);

    assert!(fixture.tick().is_empty());
    assert_eq!(fixture.registry.id_of(key), None);

    fixture.init();
    assert_eq!(fixture.registry.id_of(key), Some(0));
    assert_eq!(fixture.tick().created, vec![key]);
}

#[test]
fn init_twice_is_rejected() {
    let mut fixture = Fixture::new();
    fixture.init();
    assert!(fixture
        .registry
        .init(&mut fixture.entities, 1, IdRange::new(0, 499))
        .is_err());
}

#[test]
fn ownership_is_granted_once_and_never_revoked() {
    let mut fixture = Fixture::new();
    let grants = Arc::new(AtomicUsize::new(0));
    let counter = grants.clone();
    fixture.bus.subscribe::<OwnershipGranted>(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let object = fixture.scene.add_object(PLAYER_PREFAB, Some(fixture.scene.level()));
    let player = fixture.player(0.0);
    let key = fixture.entities.spawn(object, player);
    assert!(!fixture.entities.is_owned(key));

    fixture
        .entities
        .set_owned(key, true, &mut fixture.scene)
        .unwrap();
    let renamed = fixture.scene.name(object).unwrap();
    fixture
        .entities
        .set_owned(key, true, &mut fixture.scene)
        .unwrap();

    assert_eq!(grants.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.scene.name(object).unwrap(), renamed);
    assert_eq!(
        fixture.entities.set_owned(key, false, &mut fixture.scene),
        Err(OwnershipError::CannotRevoke { key })
    );
    assert!(fixture.entities.is_owned(key));
}

#[test]
fn granted_after_init_gets_next_id() {
    let mut fixture = Fixture::new();
    fixture.init();
    let first = fixture.owned_player(0.0);
    let second = fixture.owned_player(0.0);

    let batch = fixture.tick();
    assert_eq!(batch.created.len(), 2);
    assert_eq!(fixture.registry.id_of(first), Some(0));
    assert_eq!(fixture.registry.id_of(second), Some(1));
    assert_eq!(fixture.registry.owned().count(), 2);
}

#[test]
fn remote_creation_uses_scene_resident_object() {
    let mut fixture = Fixture::new();
    fixture.init();
    let object = fixture.scene.add_object(PLAYER_PREFAB, Some(fixture.scene.level()));
    let player = fixture.player(0.0);
    let resident = fixture.entities.spawn(object, player);
    let objects = fixture.scene.object_count();

    let data_type_id = fixture.position_type();
    let key = fixture
        .registry
        .get_or_create_entity(
            &mut fixture.entities,
            &mut fixture.scene,
            700,
            2,
            "Level/Player",
            data_type_id,
            &Position::default(),
        )
        .unwrap();

    assert_eq!(key, resident);
    assert_eq!(fixture.scene.object_count(), objects);
    assert_eq!(fixture.registry.owner_of(key), Some(2));
    assert_eq!(fixture.registry.ids_owned_by(2), vec![700]);
}

#[test]
fn remote_creation_instantiates_prefab_and_takes_name() {
    let mut fixture = Fixture::new();
    fixture.init();
    let data_type_id = fixture.position_type();

    let key = fixture
        .registry
        .get_or_create_entity(
            &mut fixture.entities,
            &mut fixture.scene,
            700,
            2,
            "Level/Player k2j4h5g6",
            data_type_id,
            &Position::default(),
        )
        .unwrap();

    let object = fixture.entities.object_of(key).unwrap();
    assert_eq!(
        fixture.scene.path_of(object).as_deref(),
        Some("Level/Player k2j4h5g6")
    );
    assert!(!fixture.entities.is_owned(key));

    // the same id again resolves to the same entity
    let again = fixture
        .registry
        .get_or_create_entity(
            &mut fixture.entities,
            &mut fixture.scene,
            700,
            2,
            "Level/Player k2j4h5g6",
            data_type_id,
            &Position::default(),
        )
        .unwrap();
    assert_eq!(again, key);
}

#[test]
fn unmatched_creation_destroys_new_object() {
    let mut fixture = Fixture::new();
    fixture.init();
    let objects = fixture.scene.object_count();
    let badge_type = fixture.protocol.data_kinds.id_of::<Badge>().unwrap();

    // a Position payload instantiates a Player, which has no Badge entity
    let result = fixture.registry.get_or_create_entity(
        &mut fixture.entities,
        &mut fixture.scene,
        700,
        2,
        "Level/Player",
        badge_type,
        &Position::default(),
    );

    assert!(matches!(
        result,
        Err(EntityResolveError::EntityMatchCount { count: 0, .. })
    ));
    assert_eq!(fixture.scene.object_count(), objects);
    assert_eq!(fixture.registry.key_of(700), None);
}

#[test]
fn creation_under_missing_root_fails() {
    let mut fixture = Fixture::new();
    fixture.init();
    let data_type_id = fixture.position_type();

    let result = fixture.registry.get_or_create_entity(
        &mut fixture.entities,
        &mut fixture.scene,
        700,
        2,
        "Elsewhere/Player",
        data_type_id,
        &Position::default(),
    );
    assert!(matches!(result, Err(EntityResolveError::RootNotFound { .. })));
}

#[test]
fn remote_delete_frees_the_id_immediately() {
    let mut fixture = Fixture::new();
    fixture.init();
    let data_type_id = fixture.position_type();
    let key = fixture
        .registry
        .get_or_create_entity(
            &mut fixture.entities,
            &mut fixture.scene,
            700,
            2,
            "Level/Player",
            data_type_id,
            &Position::default(),
        )
        .unwrap();

    assert!(fixture
        .registry
        .delete(&mut fixture.entities, &mut fixture.scene, 700));
    assert_eq!(fixture.registry.key_of(700), None);
    assert!(!fixture.entities.contains(key));
    assert!(!fixture
        .registry
        .delete(&mut fixture.entities, &mut fixture.scene, 700));
    // remote deletions are never announced by the local peer
    assert!(fixture.tick().is_empty());
}

#[test]
fn snapshot_round_trips_onto_remote_copy() {
    let mut owner = Fixture::new();
    owner.init();
    let key = owner.owned_player(4.5);
    owner.tick();
    let id = owner.registry.id_of(key).unwrap();

    let mut writer = ByteWriter::new();
    write_sync_data(&mut writer, &owner.registry, &mut owner.entities, [key]);
    let bytes = writer.to_bytes();

    let mut remote = Fixture::new();
    remote
        .registry
        .init(&mut remote.entities, 2, IdRange::new(500, 999))
        .unwrap();
    let data_type_id = remote.position_type();
    let path = owner
        .scene
        .path_of(owner.entities.object_of(key).unwrap())
        .unwrap();
    let remote_key = remote
        .registry
        .get_or_create_entity(
            &mut remote.entities,
            &mut remote.scene,
            id,
            1,
            &path,
            data_type_id,
            &Position::default(),
        )
        .unwrap();

    let mut reader = ByteReader::new(&bytes);
    let entries =
        read_sync_data(&mut reader, &remote.protocol.data_kinds, remote.entities.pool_mut()).unwrap();
    for (id, data) in entries {
        assert!(remote.registry.receive_data(&mut remote.entities, id, data));
    }

    let copy = remote
        .entities
        .get::<Synced<PositionSync>>(remote_key)
        .unwrap()
        .behavior();
    assert_eq!(copy.x, 4.5);
}

#[test]
fn dispose_keeps_only_owned_entities() {
    let mut fixture = Fixture::new();
    fixture.init();
    let owned = fixture.owned_player(0.0);
    let data_type_id = fixture.position_type();
    let remote = fixture
        .registry
        .get_or_create_entity(
            &mut fixture.entities,
            &mut fixture.scene,
            700,
            2,
            "Level/Player",
            data_type_id,
            &Position::default(),
        )
        .unwrap();

    fixture
        .registry
        .dispose(&mut fixture.entities, &mut fixture.scene);

    assert!(fixture.entities.contains(owned));
    assert!(!fixture.entities.contains(remote));
    assert!(fixture.registry.is_empty());
    assert!(!fixture.registry.is_initialized());
}

#[test]
fn repeated_dirtying_queues_entity_once() {
    let mut fixture = Fixture::new();
    let key = fixture.owned_player(1.0);
    for _ in 0..100 {
        fixture.entities.mark_dirty(key);
    }
    assert_eq!(fixture.entities.dirty_count(), 1);

    fixture.init();
    assert_eq!(fixture.tick().created, vec![key]);
    assert_eq!(fixture.entities.dirty_count(), 0);
}

#[test]
fn remote_entity_under_local_connection_id_does_not_recycle_its_id() {
    let mut fixture = Fixture::new();
    fixture.init();

    // announced with the local connection id as owner, but not owned here
    let remote = fixture.remote_player(700, 1, "Level/Player").unwrap();
    assert!(!fixture.entities.is_owned(remote));
    assert!(fixture
        .registry
        .delete(&mut fixture.entities, &mut fixture.scene, 700));
    assert_eq!(fixture.registry.key_of(700), None);

    let key = fixture.owned_player(1.0);
    assert_eq!(fixture.tick().created, vec![key]);
    assert_eq!(fixture.registry.id_of(key), Some(0));
}

#[test]
fn local_id_held_by_remote_entity_is_not_reassigned() {
    let mut fixture = Fixture::new();
    fixture.init();
    let remote = fixture.remote_player(0, 2, "Level/Player").unwrap();

    fixture.owned_player(1.0);
    let result = fixture.registry.tick(&mut fixture.entities, &fixture.scene);

    assert_eq!(
        result,
        Err(RegistryError::IdInUse {
            id: 0,
            holder: remote
        })
    );
    assert_eq!(fixture.registry.key_of(0), Some(remote));
    assert_eq!(fixture.registry.owner_of(remote), Some(2));
}

#[test]
fn failed_creation_leaves_resident_object_name_alone() {
    let mut fixture = Fixture::new();
    fixture.init();
    let object = fixture.scene.add_object(PLAYER_PREFAB, Some(fixture.scene.level()));
    let player = fixture.player(0.0);
    fixture.entities.spawn(object, player);
    let badge_type = fixture.protocol.data_kinds.id_of::<Badge>().unwrap();

    let result = fixture.registry.get_or_create_entity(
        &mut fixture.entities,
        &mut fixture.scene,
        700,
        2,
        "Level/Player ab12cd34",
        badge_type,
        &Badge::default(),
    );

    assert!(matches!(
        result,
        Err(EntityResolveError::EntityMatchCount { count: 0, .. })
    ));
    assert!(fixture.scene.contains(object));
    assert_eq!(fixture.scene.path_of(object).as_deref(), Some("Level/Player"));
}
