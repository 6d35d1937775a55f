use std::sync::Arc;

use log::debug;

use peerhost_session::{
    transport::LocalNetwork, ConnectFuture, NetworkSession, SessionConfig, SessionError,
    SessionEvent,
};
use peerhost_shared::{
    ConnectionId, EntityId, EntityKey, Interpolated, NotificationBus, ObjectId, SceneProvider,
    SyncEntities, Synced,
};

use crate::{
    test_protocol::{protocol, BadgeSync, PositionSync, SmoothMotion, BADGE_PREFAB, BALL_PREFAB, PLAYER_PREFAB},
    test_scene::TestScene,
};

/// One peer of a test session: the session plus the scene and entity store
/// the application would own
pub struct TestPeer {
    pub session: NetworkSession,
    pub entities: SyncEntities,
    pub scene: TestScene,
    pub bus: Arc<NotificationBus>,
    pub connect: ConnectFuture,
    pub events: Vec<SessionEvent>,
}

impl TestPeer {
    fn parts(config: SessionConfig) -> (NetworkSession, SyncEntities, TestScene, Arc<NotificationBus>) {
        let bus = Arc::new(NotificationBus::new());
        let session = NetworkSession::new(protocol(), config, bus.clone())
            .expect("test protocol is locked");
        let entities = SyncEntities::new(bus.clone());
        (session, entities, TestScene::new(), bus)
    }

    pub fn host(network: &LocalNetwork) -> Self {
        Self::host_with_config(network, SessionConfig::default())
    }

    pub fn host_with_config(network: &LocalNetwork, config: SessionConfig) -> Self {
        let (mut session, entities, scene, bus) = Self::parts(config);
        let connect = session
            .start_as_host(Box::new(network.server()), Box::new(network.client()))
            .expect("host should start");
        Self {
            session,
            entities,
            scene,
            bus,
            connect,
            events: Vec::new(),
        }
    }

    pub fn client(network: &LocalNetwork, port: u16) -> Self {
        let (mut session, entities, scene, bus) = Self::parts(SessionConfig::default());
        let connect = session
            .start_as_client(Box::new(network.client()), "127.0.0.1", port)
            .expect("client should start");
        Self {
            session,
            entities,
            scene,
            bus,
            connect,
            events: Vec::new(),
        }
    }

    /// Port the host's server bound
    pub fn port(&self) -> u16 {
        self.session.server_port().expect("peer is not hosting")
    }

    pub fn client_id(&self) -> Option<ConnectionId> {
        self.session.client_id()
    }

    pub fn fixed_update(&mut self) -> Result<(), SessionError> {
        let events = self
            .session
            .fixed_update(&mut self.entities, &mut self.scene)?;
        for event in events.iter() {
            debug!("Peer {:?} observed {:?}", self.client_id(), event);
        }
        self.events.extend(events);
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn stop(&mut self) {
        self.session.stop(&mut self.entities, &mut self.scene);
    }

    /// Adds an owned player under the level root
    pub fn spawn_player(&mut self, x: f32, y: f32) -> EntityKey {
        let object = self.scene.add_object(PLAYER_PREFAB, Some(self.scene.level()));
        let entity = Synced::new(
            PositionSync::new(x, y),
            &self.session.protocol().data_kinds,
        )
        .expect("Position is registered");
        self.entities.spawn_owned(object, entity, &mut self.scene)
    }

    pub fn spawn_ball(&mut self, x: f32) -> EntityKey {
        let object = self.scene.add_object(BALL_PREFAB, Some(self.scene.level()));
        let protocol = self.session.protocol();
        let entity = Interpolated::new(
            SmoothMotion {
                x,
                targets_started: 0,
            },
            &protocol.data_kinds,
            protocol.fixed_updates_between_ticks,
        )
        .expect("Motion is registered");
        self.entities.spawn_owned(object, entity, &mut self.scene)
    }

    /// Adds an owned badge as a child of `parent`
    pub fn spawn_badge(&mut self, parent: ObjectId, text: &str) -> EntityKey {
        let object = self.scene.add_object(BADGE_PREFAB, Some(parent));
        let entity = Synced::new(
            BadgeSync {
                text: text.to_string(),
            },
            &self.session.protocol().data_kinds,
        )
        .expect("Badge is registered");
        self.entities.spawn_owned(object, entity, &mut self.scene)
    }

    pub fn move_player(&mut self, key: EntityKey, x: f32, y: f32) {
        let player = self
            .entities
            .get_mut::<Synced<PositionSync>>(key)
            .expect("no player under this key");
        player.behavior_mut().x = x;
        player.behavior_mut().y = y;
        self.entities.mark_dirty(key);
    }

    pub fn destroy(&mut self, key: EntityKey) {
        self.entities.destroy(key, &mut self.scene);
    }

    pub fn id_of(&self, key: EntityKey) -> Option<EntityId> {
        self.session.registry().id_of(key)
    }

    pub fn key_of(&self, id: EntityId) -> Option<EntityKey> {
        self.session.registry().key_of(id)
    }

    pub fn path_of(&self, key: EntityKey) -> Option<String> {
        self.entities
            .object_of(key)
            .and_then(|object| self.scene.path_of(object))
    }

    pub fn player(&self, id: EntityId) -> Option<&PositionSync> {
        let key = self.key_of(id)?;
        self.entities
            .get::<Synced<PositionSync>>(key)
            .map(|player| player.behavior())
    }

    pub fn ball(&self, id: EntityId) -> Option<&SmoothMotion> {
        let key = self.key_of(id)?;
        self.entities
            .get::<Interpolated<SmoothMotion>>(key)
            .map(|ball| ball.behavior())
    }

    pub fn badge(&self, id: EntityId) -> Option<&BadgeSync> {
        let key = self.key_of(id)?;
        self.entities
            .get::<Synced<BadgeSync>>(key)
            .map(|badge| badge.behavior())
    }

    /// Live players in the local scene, owned or not
    pub fn player_count(&self) -> usize {
        self.entities
            .iter_of::<Synced<PositionSync>>()
            .filter(|(key, _)| !self.entities.is_destroyed(*key))
            .count()
    }
}
