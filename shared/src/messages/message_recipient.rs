use crate::ConnectionId;

use super::EnvelopeError;

const RECIPIENT_BITS: u16 = 2;
const RECIPIENT_MASK: u16 = (1 << RECIPIENT_BITS) - 1;

/// Highest connection id that fits in an envelope's target field
pub const MAX_TARGET: ConnectionId = u16::MAX >> RECIPIENT_BITS;

/// Who a message is meant for. Only the host routes; clients address every
/// message to the host and name the final recipients here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageRecipient {
    /// Handled by the host's server side
    Server,
    /// Relayed to the single client named by the target
    SpecificClient,
    /// Relayed to every client except the target
    ExceptClient,
    /// Relayed to every client except the sender
    OtherClients,
}

impl MessageRecipient {
    fn to_bits(self) -> u16 {
        match self {
            MessageRecipient::Server => 0,
            MessageRecipient::SpecificClient => 1,
            MessageRecipient::ExceptClient => 2,
            MessageRecipient::OtherClients => 3,
        }
    }

    fn from_bits(bits: u16) -> Self {
        match bits & RECIPIENT_MASK {
            0 => MessageRecipient::Server,
            1 => MessageRecipient::SpecificClient,
            2 => MessageRecipient::ExceptClient,
            _ => MessageRecipient::OtherClients,
        }
    }

    /// Packs the recipient into the low 2 bits and `target` into the high 14
    pub fn pack(self, target: ConnectionId) -> Result<u16, EnvelopeError> {
        if target > MAX_TARGET {
            return Err(EnvelopeError::TargetOutOfRange { target });
        }
        Ok(self.to_bits() | (target << RECIPIENT_BITS))
    }

    pub fn unpack(word: u16) -> (Self, ConnectionId) {
        (Self::from_bits(word), word >> RECIPIENT_BITS)
    }
}
