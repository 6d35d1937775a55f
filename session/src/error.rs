use thiserror::Error;

use peerhost_shared::{
    BatchError, ConnectionId, DataKindsError, EnvelopeError, IdRangeError, ProtocolError,
    RegistryError,
};

/// Errors reported by a transport provider
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The port is already bound
    #[error("Port {port} is unavailable")]
    PortUnavailable { port: u16 },

    /// The server is already running
    #[error("Server is already listening on port {port}")]
    AlreadyListening { port: u16 },

    /// Sending requires an established connection
    #[error("Transport is not connected")]
    NotConnected,

    /// The server has no client with this id
    #[error("No client with id {id} is connected")]
    UnknownClient { id: ConnectionId },
}

/// Why a pending connect did not succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("Connection attempt failed")]
    Failed,

    #[error("Disconnected before the connection was established")]
    Disconnected,

    /// The session was stopped while connecting
    #[error("Connection attempt cancelled")]
    Cancelled,

    /// The completion was dropped without ever resolving
    #[error("Connection attempt abandoned")]
    Abandoned,
}

/// Errors that end or prevent a session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Session has already started")]
    AlreadyStarted,

    #[error("Session has not started")]
    NotStarted,

    /// An operation needed the local client's connection id
    #[error("Session is not connected")]
    NotConnected,

    /// A host-only operation was called on a client session
    #[error("Session is not hosting a server")]
    NotHosting,

    /// Every port in the retry window was unavailable
    #[error("Unable to start server on any of {attempts} ports starting at {first_port}: {last_error}")]
    BindFailed {
        first_port: u16,
        attempts: u16,
        last_error: TransportError,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Id range error: {0}")]
    IdRange(#[from] IdRangeError),

    #[error("Data kinds error: {0}")]
    DataKinds(#[from] DataKindsError),
}
