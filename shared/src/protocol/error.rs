use thiserror::Error;

use crate::{world::data::DataKindsError, MessageTypeTag};

/// Errors that can occur during protocol operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Protocol is locked and cannot be modified
    #[error("Protocol is already locked and cannot be modified. Protocol.lock() has been called and no further changes are allowed")]
    AlreadyLocked,

    /// Protocol was used before `lock()` assigned data type ids
    #[error("Protocol is not locked yet. Call Protocol.lock() before starting a session")]
    NotLocked,

    /// A message carried a type tag this peer does not know. Peers disagree on the schema.
    #[error("Unknown message type tag {tag}. Peers are running mismatched protocol versions")]
    UnknownMessageType { tag: MessageTypeTag },

    /// A known message type arrived on a side that never accepts it
    #[error("Unexpected message type {message_type} received by the {receiver}")]
    UnexpectedMessageType {
        message_type: String,
        receiver: &'static str,
    },

    /// Error registering or resolving a data kind
    #[error("Data kinds error: {0}")]
    DataKinds(#[from] DataKindsError),
}
