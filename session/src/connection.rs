use peerhost_shared::{ConnectionId, IdRange};

/// A client connected to the host's server, and the id range it was given
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Connection {
    pub id: ConnectionId,
    pub id_range: IdRange,
}

impl Connection {
    pub fn new(id: ConnectionId, id_range: IdRange) -> Self {
        Self { id, id_range }
    }
}
