use peerhost_serde::SerdeErr;
use thiserror::Error;

use crate::{world::data::DataKindsError, ConnectionId};

/// Errors packing or unpacking a message envelope
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// Targets share a u16 with the 2-bit recipient, leaving 14 bits
    #[error("Target connection {target} does not fit the 14 bits available in the envelope")]
    TargetOutOfRange { target: ConnectionId },

    #[error("Malformed envelope: {0}")]
    Serde(#[from] SerdeErr),
}

/// Errors reading a replication batch. Any of these means the peers disagree
/// on the wire format, so the session cannot continue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("Malformed batch: {0}")]
    Serde(#[from] SerdeErr),

    #[error("Batch references unknown data: {0}")]
    DataKinds(#[from] DataKindsError),
}
