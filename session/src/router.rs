use std::{collections::VecDeque, marker::PhantomData};

use log::{error, info, warn};

use peerhost_shared::{
    ByteReader, ByteWriter, ConnectionId, EnvelopeHeader, HostType, MessageRecipient,
    MessageType, ProtocolError, SendMode,
};

use crate::{
    connect::{ConnectCompletion, ConnectFuture},
    error::{ConnectError, SessionError},
    session_config::SessionConfig,
    transport::{ClientEvent, ClientTransport, ServerEvent, ServerTransport},
};

/// Lifecycle of a router. There is no way back from `Stopped`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouterState {
    NotStarted,
    /// Waiting for the local client to connect
    Starting,
    Started,
    Stopped,
}

/// Something the session needs to handle, produced by [`SessionRouter::receive`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouterEvent<M> {
    /// A client connected to the local server (host only)
    ServerClientConnected(ConnectionId),
    /// A client disconnected from the local server (host only)
    ServerClientDisconnected(ConnectionId),
    /// An application message addressed to the server (host only)
    ServerMessage {
        from: ConnectionId,
        message_type: M,
        payload: Vec<u8>,
    },
    /// The local client connected and was given this id
    Connected(ConnectionId),
    ConnectionFailed,
    /// The local client lost its connection
    Disconnected,
    PeerConnected(ConnectionId),
    PeerDisconnected(ConnectionId),
    /// An application message delivered to the local client
    ClientMessage { message_type: M, payload: Vec<u8> },
}

/// Messages the host addresses to itself, dispatched on the next receive
/// through the same decode path as wire traffic
enum Loopback {
    ToServer {
        from: ConnectionId,
        mode: SendMode,
        bytes: Vec<u8>,
    },
    ToClient {
        bytes: Vec<u8>,
    },
}

/// Multiplexes server-role and client-role traffic for one peer.
///
/// Every message carries an envelope naming its recipient. Clients send
/// everything to the host; the host's server relays anything not addressed
/// to the server itself, so clients can reach each other.
pub struct SessionRouter<M: MessageType> {
    state: RouterState,
    host_type: Option<HostType>,
    server: Option<Box<dyn ServerTransport>>,
    client: Option<Box<dyn ClientTransport>>,
    pending_connect: Option<ConnectCompletion>,
    loopback: VecDeque<Loopback>,
    port_retry_count: u16,
    loopback_address: String,
    phantom_m: PhantomData<M>,
}

impl<M: MessageType> SessionRouter<M> {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            state: RouterState::NotStarted,
            host_type: None,
            server: None,
            client: None,
            pending_connect: None,
            loopback: VecDeque::new(),
            port_retry_count: config.port_retry_count.max(1),
            loopback_address: config.loopback_address.clone(),
            phantom_m: PhantomData,
        }
    }

    pub fn state(&self) -> RouterState {
        self.state
    }

    pub fn host_type(&self) -> Option<HostType> {
        self.host_type
    }

    pub fn is_host(&self) -> bool {
        self.host_type.is_some_and(HostType::is_host)
    }

    /// Connection id of the local client, once connected
    pub fn client_id(&self) -> Option<ConnectionId> {
        self.client.as_ref().and_then(|client| client.id())
    }

    /// Port the local server bound, when hosting
    pub fn server_port(&self) -> Option<u16> {
        self.server.as_ref().and_then(|server| server.port())
    }

    /// Hosts a session: binds the server, trying up to `port_retry_count`
    /// consecutive ports from `suggested_port`, then connects the local client
    /// to it over loopback
    pub fn try_start_as_server(
        &mut self,
        mut server: Box<dyn ServerTransport>,
        client: Box<dyn ClientTransport>,
        suggested_port: u16,
        max_clients: u16,
    ) -> Result<ConnectFuture, SessionError> {
        self.begin_start()?;
        self.host_type = Some(HostType::Host);

        let mut port = suggested_port;
        let mut attempts = 0;
        let bound_port = loop {
            attempts += 1;
            match server.start(port, max_clients) {
                Ok(()) => break port,
                Err(last_error) => {
                    let next_port = port.checked_add(1);
                    if attempts >= self.port_retry_count || next_port.is_none() {
                        error!("Unable to start server: {}", last_error);
                        self.state = RouterState::Stopped;
                        return Err(SessionError::BindFailed {
                            first_port: suggested_port,
                            attempts,
                            last_error,
                        });
                    }
                    warn!("Port {} unavailable ({}), trying the next one", port, last_error);
                    port = next_port.unwrap_or(port);
                }
            }
        };
        info!("Server listening on port {}", bound_port);
        self.server = Some(server);

        let address = self.loopback_address.clone();
        Ok(self.connect(client, &address, bound_port))
    }

    /// Joins a session hosted elsewhere. No server is started.
    pub fn try_start_as_client(
        &mut self,
        client: Box<dyn ClientTransport>,
        host_address: &str,
        host_port: u16,
    ) -> Result<ConnectFuture, SessionError> {
        self.begin_start()?;
        self.host_type = Some(HostType::Client);
        Ok(self.connect(client, host_address, host_port))
    }

    fn begin_start(&mut self) -> Result<(), SessionError> {
        if self.state != RouterState::NotStarted {
            return Err(SessionError::AlreadyStarted);
        }
        self.state = RouterState::Starting;
        Ok(())
    }

    fn connect(
        &mut self,
        mut client: Box<dyn ClientTransport>,
        address: &str,
        port: u16,
    ) -> ConnectFuture {
        let (mut completion, future) = ConnectCompletion::new();
        match client.connect(address, port) {
            Ok(()) => self.pending_connect = Some(completion),
            Err(connect_error) => {
                error!("Unable to connect to {}:{}: {}", address, port, connect_error);
                completion.resolve(Err(ConnectError::Failed));
            }
        }
        self.client = Some(client);
        future
    }

    /// Drains host loopback traffic, then client events, then server events.
    /// Messages not addressed to the server are relayed, never returned.
    pub fn receive(&mut self) -> Result<Vec<RouterEvent<M>>, SessionError> {
        let mut events = Vec::new();
        if !matches!(self.state, RouterState::Starting | RouterState::Started) {
            return Ok(events);
        }

        while let Some(loopback) = self.loopback.pop_front() {
            match loopback {
                Loopback::ToServer { from, mode, bytes } => {
                    self.receive_server_message(from, mode, bytes, &mut events)?;
                }
                Loopback::ToClient { bytes } => {
                    events.push(Self::decode_client_message(&bytes)?);
                }
            }
        }

        let client_events = self
            .client
            .as_mut()
            .map(|client| client.poll_events())
            .unwrap_or_default();
        for event in client_events {
            match event {
                ClientEvent::Connected(id) => {
                    self.state = RouterState::Started;
                    self.resolve_connect(Ok(id));
                    events.push(RouterEvent::Connected(id));
                }
                ClientEvent::ConnectionFailed => {
                    self.resolve_connect(Err(ConnectError::Failed));
                    events.push(RouterEvent::ConnectionFailed);
                }
                ClientEvent::Disconnected => {
                    self.resolve_connect(Err(ConnectError::Disconnected));
                    events.push(RouterEvent::Disconnected);
                }
                ClientEvent::PeerConnected(id) => events.push(RouterEvent::PeerConnected(id)),
                ClientEvent::PeerDisconnected(id) => {
                    events.push(RouterEvent::PeerDisconnected(id))
                }
                ClientEvent::MessageReceived { bytes, .. } => {
                    events.push(Self::decode_client_message(&bytes)?);
                }
            }
        }

        let server_events = self
            .server
            .as_mut()
            .map(|server| server.poll_events())
            .unwrap_or_default();
        for event in server_events {
            match event {
                ServerEvent::ClientConnected(id) => {
                    events.push(RouterEvent::ServerClientConnected(id))
                }
                ServerEvent::ClientDisconnected(id) => {
                    events.push(RouterEvent::ServerClientDisconnected(id))
                }
                ServerEvent::MessageReceived { from, mode, bytes } => {
                    self.receive_server_message(from, mode, bytes, &mut events)?;
                }
            }
        }

        Ok(events)
    }

    fn receive_server_message(
        &mut self,
        from: ConnectionId,
        mode: SendMode,
        bytes: Vec<u8>,
        events: &mut Vec<RouterEvent<M>>,
    ) -> Result<(), SessionError> {
        let mut reader = ByteReader::new(&bytes);
        let header = EnvelopeHeader::read(&mut reader)?;
        let Some(server) = self.server.as_mut() else {
            return Err(SessionError::NotHosting);
        };

        match header.recipient {
            MessageRecipient::Server => {
                let message_type = decode_tag::<M>(header.tag)?;
                events.push(RouterEvent::ServerMessage {
                    from,
                    message_type,
                    payload: reader.remaining().to_vec(),
                });
            }
            MessageRecipient::SpecificClient => {
                if let Err(send_error) = server.send(&bytes, mode, header.target) {
                    warn!("Dropping message relayed from {}: {}", from, send_error);
                }
            }
            MessageRecipient::ExceptClient => {
                server.send_to_all(&bytes, mode, Some(header.target));
            }
            MessageRecipient::OtherClients => {
                server.send_to_all(&bytes, mode, Some(from));
            }
        }
        Ok(())
    }

    fn decode_client_message(bytes: &[u8]) -> Result<RouterEvent<M>, SessionError> {
        let mut reader = ByteReader::new(bytes);
        let header = EnvelopeHeader::read(&mut reader)?;
        let message_type = decode_tag::<M>(header.tag)?;
        Ok(RouterEvent::ClientMessage {
            message_type,
            payload: reader.remaining().to_vec(),
        })
    }

    fn resolve_connect(&mut self, result: Result<ConnectionId, ConnectError>) {
        if let Some(mut completion) = self.pending_connect.take() {
            completion.resolve(result);
        }
    }

    fn build(
        message_type: M,
        recipient: MessageRecipient,
        target: ConnectionId,
        write_payload: impl FnOnce(&mut ByteWriter),
    ) -> Result<Vec<u8>, SessionError> {
        let mut writer = ByteWriter::new();
        EnvelopeHeader::new(message_type.to_tag(), recipient, target).write(&mut writer)?;
        write_payload(&mut writer);
        Ok(writer.to_bytes())
    }

    fn check_started(&self) -> Result<(), SessionError> {
        match self.state {
            RouterState::Starting | RouterState::Started => Ok(()),
            _ => Err(SessionError::NotStarted),
        }
    }

    fn send_from_client(&mut self, bytes: &[u8], mode: SendMode) -> Result<(), SessionError> {
        let client = self.client.as_mut().ok_or(SessionError::NotStarted)?;
        client.send(bytes, mode)?;
        Ok(())
    }

    fn hosted_server(&mut self) -> Option<&mut Box<dyn ServerTransport>> {
        if self.is_host() {
            self.server.as_mut()
        } else {
            None
        }
    }

    /// Sends to the host's server. On the host this never touches the wire.
    pub fn send_to_server(
        &mut self,
        mode: SendMode,
        message_type: M,
        write_payload: impl FnOnce(&mut ByteWriter),
    ) -> Result<(), SessionError> {
        self.check_started()?;
        let bytes = Self::build(message_type, MessageRecipient::Server, 0, write_payload)?;
        if self.is_host() {
            let from = self.client_id().ok_or(SessionError::NotConnected)?;
            self.loopback.push_back(Loopback::ToServer { from, mode, bytes });
            return Ok(());
        }
        self.send_from_client(&bytes, mode)
    }

    pub fn send_to_client(
        &mut self,
        mode: SendMode,
        message_type: M,
        target: ConnectionId,
        write_payload: impl FnOnce(&mut ByteWriter),
    ) -> Result<(), SessionError> {
        self.check_started()?;
        let bytes = Self::build(
            message_type,
            MessageRecipient::SpecificClient,
            target,
            write_payload,
        )?;
        match self.hosted_server() {
            Some(server) => {
                server.send(&bytes, mode, target)?;
                Ok(())
            }
            None => self.send_from_client(&bytes, mode),
        }
    }

    /// Sends to every client but the local one
    pub fn send_to_other_clients(
        &mut self,
        mode: SendMode,
        message_type: M,
        write_payload: impl FnOnce(&mut ByteWriter),
    ) -> Result<(), SessionError> {
        self.check_started()?;
        let bytes = Self::build(message_type, MessageRecipient::OtherClients, 0, write_payload)?;
        let own_id = self.client_id();
        match self.hosted_server() {
            Some(server) => {
                server.send_to_all(&bytes, mode, own_id);
                Ok(())
            }
            None => self.send_from_client(&bytes, mode),
        }
    }

    pub fn send_to_all_except(
        &mut self,
        mode: SendMode,
        message_type: M,
        except: ConnectionId,
        write_payload: impl FnOnce(&mut ByteWriter),
    ) -> Result<(), SessionError> {
        self.check_started()?;
        let bytes = Self::build(
            message_type,
            MessageRecipient::ExceptClient,
            except,
            write_payload,
        )?;
        match self.hosted_server() {
            Some(server) => {
                server.send_to_all(&bytes, mode, Some(except));
                Ok(())
            }
            None => self.send_from_client(&bytes, mode),
        }
    }

    /// Sends to every other client, and delivers the same message to the
    /// local client on the next receive
    pub fn send_to_all_including_self(
        &mut self,
        mode: SendMode,
        message_type: M,
        write_payload: impl FnOnce(&mut ByteWriter),
    ) -> Result<(), SessionError> {
        self.check_started()?;
        let bytes = Self::build(message_type, MessageRecipient::OtherClients, 0, write_payload)?;
        let own_id = self.client_id();
        match self.hosted_server() {
            Some(server) => server.send_to_all(&bytes, mode, own_id),
            None => self.send_from_client(&bytes, mode)?,
        }
        self.loopback.push_back(Loopback::ToClient { bytes });
        Ok(())
    }

    /// Tears down both roles. A connect still pending resolves as cancelled.
    pub fn stop(&mut self) {
        if self.state == RouterState::Stopped {
            return;
        }
        self.state = RouterState::Stopped;
        self.resolve_connect(Err(ConnectError::Cancelled));
        self.loopback.clear();

        if let Some(mut server) = self.server.take() {
            server.stop();
        }
        if let Some(mut client) = self.client.take() {
            client.disconnect();
        }
        info!("Session router stopped");
    }
}

fn decode_tag<M: MessageType>(tag: u16) -> Result<M, ProtocolError> {
    M::from_tag(tag).ok_or(ProtocolError::UnknownMessageType { tag })
}
