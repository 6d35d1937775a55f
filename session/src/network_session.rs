use std::{collections::HashMap, sync::Arc};

use log::{debug, error, info};

use peerhost_shared::{
    read_create_batch, read_delete_batch, read_initial_data, read_sync_data, write_create_batch,
    write_delete_batch, write_initial_data, write_sync_data, ByteReader, ConnectionId,
    CreateEntry, EntityKey, EntityRegistry, IdRangeAllocator, NetworkMessageType,
    NotificationBus, Protocol, ProtocolError, ReceivedInitialData, SceneProvider, SendMode,
    SyncEntities, TickBatch,
};

use crate::{
    connect::ConnectFuture,
    connection::Connection,
    error::SessionError,
    router::{RouterEvent, RouterState, SessionRouter},
    session_config::SessionConfig,
    transport::{ClientTransport, ServerTransport},
};

/// Something the application may want to react to, returned from
/// [`NetworkSession::fixed_update`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// The local client connected with this id
    Connected(ConnectionId),
    ConnectionFailed,
    /// The local client lost its connection and the session stopped
    Disconnected,
    PeerConnected(ConnectionId),
    PeerDisconnected(ConnectionId),
    /// The initial snapshot was applied and owned entities were admitted
    ReceivedInitialData(ConnectionId),
}

/// One replication session: a router, the entity registry, and the tick
/// driver that sends dirty batches every few fixed updates.
///
/// The application owns the scene and the entity store and passes them into
/// every call that needs them.
pub struct NetworkSession {
    config: SessionConfig,
    protocol: Protocol,
    router: SessionRouter<NetworkMessageType>,
    registry: EntityRegistry,
    id_ranges: IdRangeAllocator,
    connections: HashMap<ConnectionId, Connection>,
    bus: Arc<NotificationBus>,
    is_connected: bool,
    tick_index: u32,
}

impl NetworkSession {
    /// `protocol` must be locked. `bus` must be the bus the entity store
    /// publishes ownership grants on.
    pub fn new(
        protocol: Protocol,
        config: SessionConfig,
        bus: Arc<NotificationBus>,
    ) -> Result<Self, SessionError> {
        if !protocol.is_locked() {
            return Err(ProtocolError::NotLocked.into());
        }
        Ok(Self {
            router: SessionRouter::new(&config),
            registry: EntityRegistry::new(bus.clone()),
            id_ranges: IdRangeAllocator::new(),
            connections: HashMap::new(),
            config,
            protocol,
            bus,
            is_connected: false,
            tick_index: 0,
        })
    }

    pub fn start_as_host(
        &mut self,
        server: Box<dyn ServerTransport>,
        client: Box<dyn ClientTransport>,
    ) -> Result<ConnectFuture, SessionError> {
        let suggested_port = self.config.suggested_port;
        let max_clients = self.config.max_clients;
        self.router
            .try_start_as_server(server, client, suggested_port, max_clients)
    }

    pub fn start_as_client(
        &mut self,
        client: Box<dyn ClientTransport>,
        host_address: &str,
        host_port: u16,
    ) -> Result<ConnectFuture, SessionError> {
        self.router
            .try_start_as_client(client, host_address, host_port)
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected
    }

    pub fn is_host(&self) -> bool {
        self.router.is_host()
    }

    pub fn is_stopped(&self) -> bool {
        self.router.state() == RouterState::Stopped
    }

    pub fn client_id(&self) -> Option<ConnectionId> {
        self.router.client_id()
    }

    pub fn server_port(&self) -> Option<u16> {
        self.router.server_port()
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    /// Clients connected to the local server, when hosting
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    pub fn router_mut(&mut self) -> &mut SessionRouter<NetworkMessageType> {
        &mut self.router
    }

    /// Runs one fixed step: handles everything the router received, sends a
    /// replication tick every `fixed_updates_between_ticks` steps while
    /// connected, then runs every entity's fixed update.
    ///
    /// Any error means the peers disagree on the protocol; the session is
    /// stopped before it is returned.
    pub fn fixed_update(
        &mut self,
        entities: &mut SyncEntities,
        scene: &mut dyn SceneProvider,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        let mut events = Vec::new();
        if let Err(session_error) = self.step(entities, scene, &mut events) {
            error!("Session aborted: {}", session_error);
            self.stop(entities, scene);
            return Err(session_error);
        }
        entities.fixed_update_all();
        Ok(events)
    }

    fn step(
        &mut self,
        entities: &mut SyncEntities,
        scene: &mut dyn SceneProvider,
        events: &mut Vec<SessionEvent>,
    ) -> Result<(), SessionError> {
        for router_event in self.router.receive()? {
            self.handle_router_event(router_event, entities, scene, events)?;
            if self.is_stopped() {
                return Ok(());
            }
        }

        self.tick_index = self.tick_index.wrapping_add(1);
        if self.tick_index % self.protocol.fixed_updates_between_ticks.max(1) == 0
            && self.is_connected
        {
            self.replicate(entities, scene)?;
        }
        Ok(())
    }

    /// Ends the session. Entities the local peer doesn't own are destroyed.
    pub fn stop(&mut self, entities: &mut SyncEntities, scene: &mut dyn SceneProvider) {
        if self.is_stopped() {
            return;
        }
        self.registry.dispose(entities, scene);
        self.router.stop();
        self.connections.clear();
        self.is_connected = false;
    }

    fn handle_router_event(
        &mut self,
        router_event: RouterEvent<NetworkMessageType>,
        entities: &mut SyncEntities,
        scene: &mut dyn SceneProvider,
        events: &mut Vec<SessionEvent>,
    ) -> Result<(), SessionError> {
        match router_event {
            RouterEvent::ServerClientConnected(id) => {
                self.on_server_client_connected(id, entities, scene)?;
            }
            RouterEvent::ServerClientDisconnected(id) => {
                self.on_server_client_disconnected(id, entities, scene)?;
            }
            RouterEvent::ServerMessage {
                from,
                message_type,
                payload,
            } => match message_type {
                NetworkMessageType::ConnectionTick => {
                    self.apply_sync_data(&payload, entities)?;
                }
                other => {
                    error!("Server received unexpected {:?} from {}", other, from);
                    return Err(ProtocolError::UnexpectedMessageType {
                        message_type: format!("{:?}", other),
                        receiver: "server",
                    }
                    .into());
                }
            },
            RouterEvent::Connected(id) => {
                info!("Connected with client id {}", id);
                self.is_connected = true;
                events.push(SessionEvent::Connected(id));
            }
            RouterEvent::ConnectionFailed => {
                error!("Connection failed");
                events.push(SessionEvent::ConnectionFailed);
                self.stop(entities, scene);
            }
            RouterEvent::Disconnected => {
                info!("Disconnected, stopping session");
                events.push(SessionEvent::Disconnected);
                self.stop(entities, scene);
            }
            RouterEvent::PeerConnected(id) => events.push(SessionEvent::PeerConnected(id)),
            RouterEvent::PeerDisconnected(id) => events.push(SessionEvent::PeerDisconnected(id)),
            RouterEvent::ClientMessage {
                message_type,
                payload,
            } => {
                self.on_client_message(message_type, &payload, entities, scene, events)?;
            }
        }
        Ok(())
    }

    fn on_server_client_connected(
        &mut self,
        id: ConnectionId,
        entities: &mut SyncEntities,
        scene: &mut dyn SceneProvider,
    ) -> Result<(), SessionError> {
        let id_range = self.id_ranges.get_free_range()?;
        self.connections.insert(id, Connection::new(id, id_range));

        let is_own_client = self.router.client_id() == Some(id);
        let existing = if is_own_client {
            Vec::new()
        } else {
            self.registry.all_by_path(entities, scene)
        };

        if self.config.detailed_logging {
            for key in existing.iter().copied() {
                debug!(
                    "Sending create message to client {} for:\n{}",
                    id,
                    entities.describe(key)
                );
            }
        }
        info!(
            "Client {} connected, assigned ids {}..={}",
            id, id_range.min, id_range.max
        );

        let registry = &self.registry;
        self.router.send_to_client(
            SendMode::Reliable,
            NetworkMessageType::InitialToClient,
            id,
            |writer| {
                write_initial_data(writer, id_range);
                write_create_batch(writer, registry, entities, scene, existing);
            },
        )
    }

    fn on_server_client_disconnected(
        &mut self,
        id: ConnectionId,
        entities: &mut SyncEntities,
        scene: &mut dyn SceneProvider,
    ) -> Result<(), SessionError> {
        info!("Client {} disconnected", id);

        let owned_ids = self.registry.ids_owned_by(id);
        if !owned_ids.is_empty() {
            if self.config.detailed_logging {
                for entity_id in owned_ids.iter().copied() {
                    if let Some(key) = self.registry.key_of(entity_id) {
                        debug!("Sending delete message to all clients for:\n{}", entities.describe(key));
                    }
                }
            }
            self.router.send_to_all_including_self(
                SendMode::Reliable,
                NetworkMessageType::DeleteSyncObjects,
                |writer| write_delete_batch(writer, owned_ids.iter().copied()),
            )?;

            // a client joining before the loopback delete arrives must not be
            // sent these entities, nor be handed their range while they live
            for entity_id in owned_ids {
                self.registry.delete(entities, scene, entity_id);
            }
        }

        if let Some(connection) = self.connections.remove(&id) {
            self.id_ranges.free_range(connection.id_range.min)?;
        }
        Ok(())
    }

    fn on_client_message(
        &mut self,
        message_type: NetworkMessageType,
        payload: &[u8],
        entities: &mut SyncEntities,
        scene: &mut dyn SceneProvider,
        events: &mut Vec<SessionEvent>,
    ) -> Result<(), SessionError> {
        match message_type {
            NetworkMessageType::ServerTick | NetworkMessageType::SyncData => {
                self.apply_sync_data(payload, entities)?;
            }
            NetworkMessageType::InitialToClient => {
                let client_id = self.router.client_id().ok_or(SessionError::NotConnected)?;
                let mut reader = ByteReader::new(payload);
                let initial = read_initial_data(
                    &mut reader,
                    &self.protocol.data_kinds,
                    entities.pool_mut(),
                    !self.is_host(),
                )?;
                self.apply_creates(initial.creates, entities, scene);
                self.registry.init(entities, client_id, initial.range)?;
                self.bus.publish(&ReceivedInitialData { client_id });
                events.push(SessionEvent::ReceivedInitialData(client_id));
            }
            NetworkMessageType::CreateSyncObjects => {
                let mut reader = ByteReader::new(payload);
                let creates =
                    read_create_batch(&mut reader, &self.protocol.data_kinds, entities.pool_mut())?;
                self.apply_creates(creates, entities, scene);
            }
            NetworkMessageType::DeleteSyncObjects => {
                let mut reader = ByteReader::new(payload);
                for id in read_delete_batch(&mut reader)? {
                    if !self.registry.delete(entities, scene, id) {
                        debug!("Delete for unknown entity {}", id);
                    }
                }
            }
            NetworkMessageType::ConnectionTick => {
                return Err(ProtocolError::UnexpectedMessageType {
                    message_type: format!("{:?}", message_type),
                    receiver: "client",
                }
                .into());
            }
        }
        Ok(())
    }

    fn apply_sync_data(
        &mut self,
        payload: &[u8],
        entities: &mut SyncEntities,
    ) -> Result<(), SessionError> {
        let mut reader = ByteReader::new(payload);
        let entries = read_sync_data(&mut reader, &self.protocol.data_kinds, entities.pool_mut())?;
        for (id, data) in entries {
            self.registry.receive_data(entities, id, data);
            if self.config.detailed_logging {
                if let Some(key) = self.registry.key_of(id) {
                    let every_tick = entities
                        .entity(key)
                        .is_some_and(|entity| entity.send_every_tick());
                    if !every_tick {
                        debug!("Received data update for:\n{}", entities.describe(key));
                    }
                }
            }
        }
        Ok(())
    }

    fn apply_creates(
        &mut self,
        creates: Vec<CreateEntry>,
        entities: &mut SyncEntities,
        scene: &mut dyn SceneProvider,
    ) {
        for entry in creates {
            let resolved = self.registry.get_or_create_entity(
                entities,
                scene,
                entry.id,
                entry.owner,
                &entry.path,
                entry.data_type_id,
                &*entry.data,
            );
            match resolved {
                Ok(key) => {
                    entities.receive_data(key, entry.data);
                    if self.config.detailed_logging {
                        debug!("Received create message for:\n{}", entities.describe(key));
                    }
                }
                Err(resolve_error) => {
                    error!("Dropping entity {}: {}", entry.id, resolve_error);
                    entities.pool_mut().give(entry.data);
                }
            }
        }
    }

    fn replicate(
        &mut self,
        entities: &mut SyncEntities,
        scene: &mut dyn SceneProvider,
    ) -> Result<(), SessionError> {
        let TickBatch {
            created,
            updated,
            deleted,
        } = self.registry.tick(entities, scene)?;

        if self.config.detailed_logging
            && (!created.is_empty() || !updated.is_empty() || !deleted.is_empty())
        {
            let describe = |keys: &[EntityKey], entities: &mut SyncEntities| -> String {
                keys.iter()
                    .map(|key| entities.describe(*key))
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            debug!(
                "Sending dirty batch to other clients:\n\nCreated:\n\n{}\n\nUpdated:\n\n{}\n\nDeleted: {:?}\n",
                describe(&created, entities),
                describe(&updated, entities),
                deleted
            );
        }

        let registry = &self.registry;
        if !created.is_empty() {
            self.router.send_to_other_clients(
                SendMode::Reliable,
                NetworkMessageType::CreateSyncObjects,
                |writer| {
                    write_create_batch(writer, registry, entities, scene, created.iter().copied())
                },
            )?;
        }
        if !updated.is_empty() {
            self.router.send_to_other_clients(
                SendMode::Reliable,
                NetworkMessageType::SyncData,
                |writer| write_sync_data(writer, registry, entities, updated.iter().copied()),
            )?;
        }
        if !deleted.is_empty() {
            self.router.send_to_other_clients(
                SendMode::Reliable,
                NetworkMessageType::DeleteSyncObjects,
                |writer| write_delete_batch(writer, deleted.iter().copied()),
            )?;
        }

        if self.router.is_host() {
            let every_tick: Vec<EntityKey> = registry.sent_on_tick().collect();
            if !every_tick.is_empty() {
                self.router.send_to_other_clients(
                    SendMode::Unreliable,
                    NetworkMessageType::ServerTick,
                    |writer| write_sync_data(writer, registry, entities, every_tick),
                )?;
            }
        } else {
            let owned_every_tick: Vec<EntityKey> = registry.owned_and_sent_on_tick().collect();
            if !owned_every_tick.is_empty() {
                self.router.send_to_server(
                    SendMode::Unreliable,
                    NetworkMessageType::ConnectionTick,
                    |writer| write_sync_data(writer, registry, entities, owned_every_tick),
                )?;
            }
        }

        for key in created
            .iter()
            .chain(updated.iter())
            .copied()
            .chain(self.registry.owned_and_sent_on_tick())
        {
            entities.notify_synced_to_all(key);
        }
        Ok(())
    }
}
