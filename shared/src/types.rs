/// Identifies a peer connection. Assigned by the transport; the host's own
/// loopback client gets a normal connection id like everyone else.
pub type ConnectionId = u16;
/// Session-wide id of a replicated entity, drawn from its owner's id range.
pub type EntityId = u16;
/// Stable id of a payload schema, agreed on by every peer.
pub type DataTypeId = u16;
/// First word of every message on the wire.
pub type MessageTypeTag = u16;

/// Delivery guarantee requested from the transport
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SendMode {
    Reliable,
    Unreliable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostType {
    /// Runs the server and a loopback client
    Host,
    /// Connected to a remote host
    Client,
}

impl HostType {
    pub fn is_host(self) -> bool {
        matches!(self, HostType::Host)
    }
}
