//! In-memory transport, routing byte buffers between servers and clients of
//! one [`LocalNetwork`] without any network I/O

use std::{
    collections::{BTreeMap, HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
};

use peerhost_shared::{ConnectionId, SendMode};

use super::{ClientEvent, ClientTransport, ServerEvent, ServerTransport};
use crate::error::TransportError;

type ClientHandle = u64;

struct LocalServer {
    max_clients: u16,
    next_id: ConnectionId,
    clients: BTreeMap<ConnectionId, ClientHandle>,
    events: VecDeque<ServerEvent>,
}

#[derive(Default)]
struct LocalClient {
    server: Option<(u16, ConnectionId)>,
    events: VecDeque<ClientEvent>,
}

#[derive(Default)]
struct Hub {
    servers: HashMap<u16, LocalServer>,
    clients: HashMap<ClientHandle, LocalClient>,
    blocked_ports: HashSet<u16>,
    next_client: ClientHandle,
}

impl Hub {
    fn push_client_event(&mut self, handle: ClientHandle, event: ClientEvent) {
        if let Some(client) = self.clients.get_mut(&handle) {
            client.events.push_back(event);
        }
    }

    fn push_to_server_clients(
        &mut self,
        port: u16,
        except: Option<ConnectionId>,
        event: impl Fn() -> ClientEvent,
    ) {
        let Some(server) = self.servers.get(&port) else {
            return;
        };
        let handles: Vec<ClientHandle> = server
            .clients
            .iter()
            .filter(|(id, _)| Some(**id) != except)
            .map(|(_, handle)| *handle)
            .collect();
        for handle in handles {
            self.push_client_event(handle, event());
        }
    }

    fn disconnect_client(&mut self, handle: ClientHandle) {
        let Some((port, id)) = self
            .clients
            .get_mut(&handle)
            .and_then(|client| client.server.take())
        else {
            return;
        };
        if let Some(server) = self.servers.get_mut(&port) {
            server.clients.remove(&id);
            server.events.push_back(ServerEvent::ClientDisconnected(id));
        }
        self.push_to_server_clients(port, None, || ClientEvent::PeerDisconnected(id));
    }
}

/// Shared in-process network. Clone it to hand the same network to every
/// peer of a test.
#[derive(Clone, Default)]
pub struct LocalNetwork {
    hub: Arc<Mutex<Hub>>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn server(&self) -> LocalServerTransport {
        LocalServerTransport {
            hub: self.hub.clone(),
            port: None,
        }
    }

    pub fn client(&self) -> LocalClientTransport {
        let mut hub = lock(&self.hub);
        let handle = hub.next_client;
        hub.next_client += 1;
        hub.clients.insert(handle, LocalClient::default());
        LocalClientTransport {
            hub: self.hub.clone(),
            handle,
        }
    }

    /// Makes `port` fail to bind, as if another process held it
    pub fn block_port(&self, port: u16) {
        lock(&self.hub).blocked_ports.insert(port);
    }

    pub fn is_listening(&self, port: u16) -> bool {
        lock(&self.hub).servers.contains_key(&port)
    }
}

pub struct LocalServerTransport {
    hub: Arc<Mutex<Hub>>,
    port: Option<u16>,
}

impl ServerTransport for LocalServerTransport {
    fn start(&mut self, port: u16, max_clients: u16) -> Result<(), TransportError> {
        if let Some(port) = self.port {
            return Err(TransportError::AlreadyListening { port });
        }
        let mut hub = lock(&self.hub);
        if hub.blocked_ports.contains(&port) || hub.servers.contains_key(&port) {
            return Err(TransportError::PortUnavailable { port });
        }
        hub.servers.insert(
            port,
            LocalServer {
                max_clients,
                next_id: 1,
                clients: BTreeMap::new(),
                events: VecDeque::new(),
            },
        );
        self.port = Some(port);
        Ok(())
    }

    fn stop(&mut self) {
        let Some(port) = self.port.take() else {
            return;
        };
        let mut hub = lock(&self.hub);
        let Some(server) = hub.servers.remove(&port) else {
            return;
        };
        for handle in server.clients.values() {
            if let Some(client) = hub.clients.get_mut(handle) {
                client.server = None;
                client.events.push_back(ClientEvent::Disconnected);
            }
        }
    }

    fn port(&self) -> Option<u16> {
        self.port
    }

    fn send(
        &mut self,
        bytes: &[u8],
        mode: SendMode,
        target: ConnectionId,
    ) -> Result<(), TransportError> {
        let port = self.port.ok_or(TransportError::NotConnected)?;
        let mut hub = lock(&self.hub);
        let handle = hub
            .servers
            .get(&port)
            .and_then(|server| server.clients.get(&target).copied())
            .ok_or(TransportError::UnknownClient { id: target })?;
        hub.push_client_event(
            handle,
            ClientEvent::MessageReceived {
                mode,
                bytes: bytes.to_vec(),
            },
        );
        Ok(())
    }

    fn send_to_all(&mut self, bytes: &[u8], mode: SendMode, except: Option<ConnectionId>) {
        let Some(port) = self.port else {
            return;
        };
        lock(&self.hub).push_to_server_clients(port, except, || ClientEvent::MessageReceived {
            mode,
            bytes: bytes.to_vec(),
        });
    }

    fn poll_events(&mut self) -> Vec<ServerEvent> {
        let Some(port) = self.port else {
            return Vec::new();
        };
        lock(&self.hub)
            .servers
            .get_mut(&port)
            .map(|server| server.events.drain(..).collect())
            .unwrap_or_default()
    }
}

impl Drop for LocalServerTransport {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct LocalClientTransport {
    hub: Arc<Mutex<Hub>>,
    handle: ClientHandle,
}

impl ClientTransport for LocalClientTransport {
    fn connect(&mut self, _address: &str, port: u16) -> Result<(), TransportError> {
        let mut hub = lock(&self.hub);
        let handle = self.handle;

        let accepted = match hub.servers.get_mut(&port) {
            Some(server) if server.clients.len() < usize::from(server.max_clients) => {
                let id = server.next_id;
                server.next_id += 1;
                server.clients.insert(id, handle);
                server.events.push_back(ServerEvent::ClientConnected(id));
                Some(id)
            }
            _ => None,
        };
        let Some(id) = accepted else {
            hub.push_client_event(handle, ClientEvent::ConnectionFailed);
            return Ok(());
        };

        hub.push_to_server_clients(port, Some(id), || ClientEvent::PeerConnected(id));
        if let Some(client) = hub.clients.get_mut(&handle) {
            client.server = Some((port, id));
            client.events.push_back(ClientEvent::Connected(id));
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        lock(&self.hub).disconnect_client(self.handle);
    }

    fn send(&mut self, bytes: &[u8], mode: SendMode) -> Result<(), TransportError> {
        let mut hub = lock(&self.hub);
        let (port, id) = hub
            .clients
            .get(&self.handle)
            .and_then(|client| client.server)
            .ok_or(TransportError::NotConnected)?;
        let server = hub
            .servers
            .get_mut(&port)
            .ok_or(TransportError::NotConnected)?;
        server.events.push_back(ServerEvent::MessageReceived {
            from: id,
            mode,
            bytes: bytes.to_vec(),
        });
        Ok(())
    }

    fn id(&self) -> Option<ConnectionId> {
        lock(&self.hub)
            .clients
            .get(&self.handle)
            .and_then(|client| client.server)
            .map(|(_, id)| id)
    }

    fn poll_events(&mut self) -> Vec<ClientEvent> {
        lock(&self.hub)
            .clients
            .get_mut(&self.handle)
            .map(|client| client.events.drain(..).collect())
            .unwrap_or_default()
    }
}

impl Drop for LocalClientTransport {
    fn drop(&mut self) {
        let mut hub = lock(&self.hub);
        hub.disconnect_client(self.handle);
        hub.clients.remove(&self.handle);
    }
}

fn lock(hub: &Mutex<Hub>) -> MutexGuard<'_, Hub> {
    hub.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
