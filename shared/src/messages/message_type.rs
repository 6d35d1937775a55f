use std::fmt::Debug;

use crate::MessageTypeTag;

/// An application message type, carried as the envelope's first u16
pub trait MessageType: Copy + Debug + PartialEq + Send + 'static {
    fn to_tag(self) -> MessageTypeTag;
    fn from_tag(tag: MessageTypeTag) -> Option<Self>;
}

/// Message types used by entity replication
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NetworkMessageType {
    /// Client to host, unreliable: owned every-tick snapshots
    ConnectionTick,
    /// Host to clients, unreliable: every-tick snapshots of all entities
    ServerTick,
    /// Host to one client: its id range and, for remote clients, every entity
    InitialToClient,
    CreateSyncObjects,
    SyncData,
    DeleteSyncObjects,
}

impl MessageType for NetworkMessageType {
    fn to_tag(self) -> MessageTypeTag {
        match self {
            NetworkMessageType::ConnectionTick => 0,
            NetworkMessageType::ServerTick => 1,
            NetworkMessageType::InitialToClient => 2,
            NetworkMessageType::CreateSyncObjects => 3,
            NetworkMessageType::SyncData => 4,
            NetworkMessageType::DeleteSyncObjects => 5,
        }
    }

    fn from_tag(tag: MessageTypeTag) -> Option<Self> {
        match tag {
            0 => Some(NetworkMessageType::ConnectionTick),
            1 => Some(NetworkMessageType::ServerTick),
            2 => Some(NetworkMessageType::InitialToClient),
            3 => Some(NetworkMessageType::CreateSyncObjects),
            4 => Some(NetworkMessageType::SyncData),
            5 => Some(NetworkMessageType::DeleteSyncObjects),
            _ => None,
        }
    }
}
