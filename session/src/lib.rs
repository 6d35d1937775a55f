//! # Peerhost Session
//! Runs one peer-hosted replication session. The host runs a server and a
//! loopback client against it; every other peer is a plain client. Entity
//! replication is driven from [`NetworkSession::fixed_update`].

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

#[macro_use]
extern crate cfg_if;

pub mod transport;
pub mod shared {
    pub use peerhost_shared::{
        ByteReader, ByteWriter, ConnectionId, EntityId, EntityRegistry, HostType, IdRange,
        MessageRecipient, MessageType, NetworkMessageType, NotificationBus, Protocol,
        ReceivedInitialData, SceneProvider, SendMode, Serde, SerdeErr, SyncEntities,
    };
}

mod connect;
mod connection;
mod error;
mod network_session;
mod router;
mod session_config;

pub use connect::{ConnectCompletion, ConnectFuture, ConnectResult};
pub use connection::Connection;
pub use error::{ConnectError, SessionError, TransportError};
pub use network_session::{NetworkSession, SessionEvent};
pub use router::{RouterEvent, RouterState, SessionRouter};
pub use session_config::SessionConfig;
