use crate::{world::entity::EntityKey, ConnectionId};

/// Published when a sync entity becomes owned by the local peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnershipGranted {
    pub key: EntityKey,
}

/// Published when a client has received and applied its initial snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceivedInitialData {
    pub client_id: ConnectionId,
}
