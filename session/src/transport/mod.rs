use peerhost_shared::{ConnectionId, SendMode};

use crate::error::TransportError;

cfg_if! {
    if #[cfg(feature = "transport_local")] {
        mod local;
        pub use local::{LocalClientTransport, LocalNetwork, LocalServerTransport};
    }
}

/// Something the server side of a transport observed since the last poll
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerEvent {
    ClientConnected(ConnectionId),
    ClientDisconnected(ConnectionId),
    MessageReceived {
        from: ConnectionId,
        mode: SendMode,
        bytes: Vec<u8>,
    },
}

/// Something the client side of a transport observed since the last poll
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    /// The connection was established and the server assigned this id
    Connected(ConnectionId),
    ConnectionFailed,
    Disconnected,
    PeerConnected(ConnectionId),
    PeerDisconnected(ConnectionId),
    MessageReceived { mode: SendMode, bytes: Vec<u8> },
}

/// Server half of a transport provider. Events are buffered by the
/// transport and drained by [`ServerTransport::poll_events`] once per tick.
pub trait ServerTransport {
    /// Binds and starts listening. Fails if the port can't be bound.
    fn start(&mut self, port: u16, max_clients: u16) -> Result<(), TransportError>;

    fn stop(&mut self);

    /// Port the server is listening on, if started
    fn port(&self) -> Option<u16>;

    fn send(
        &mut self,
        bytes: &[u8],
        mode: SendMode,
        target: ConnectionId,
    ) -> Result<(), TransportError>;

    fn send_to_all(&mut self, bytes: &[u8], mode: SendMode, except: Option<ConnectionId>);

    fn poll_events(&mut self) -> Vec<ServerEvent>;
}

/// Client half of a transport provider
pub trait ClientTransport {
    /// Begins connecting. The outcome arrives later as a
    /// [`ClientEvent::Connected`] or [`ClientEvent::ConnectionFailed`].
    fn connect(&mut self, address: &str, port: u16) -> Result<(), TransportError>;

    fn disconnect(&mut self);

    fn send(&mut self, bytes: &[u8], mode: SendMode) -> Result<(), TransportError>;

    /// Id the server assigned to this client, once connected
    fn id(&self) -> Option<ConnectionId>;

    fn poll_events(&mut self) -> Vec<ClientEvent>;
}
