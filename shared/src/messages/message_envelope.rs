use peerhost_serde::{ByteReader, ByteWriter};

use crate::{ConnectionId, MessageTypeTag};

use super::{EnvelopeError, MessageRecipient};

/// `[u16 message type tag][u16 recipient word]`, followed by the payload
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnvelopeHeader {
    pub tag: MessageTypeTag,
    pub recipient: MessageRecipient,
    pub target: ConnectionId,
}

impl EnvelopeHeader {
    pub const BYTE_LENGTH: usize = 4;

    pub fn new(tag: MessageTypeTag, recipient: MessageRecipient, target: ConnectionId) -> Self {
        Self {
            tag,
            recipient,
            target,
        }
    }

    pub fn write(&self, writer: &mut ByteWriter) -> Result<(), EnvelopeError> {
        let word = self.recipient.pack(self.target)?;
        writer.write(&self.tag);
        writer.write(&word);
        Ok(())
    }

    pub fn read(reader: &mut ByteReader) -> Result<Self, EnvelopeError> {
        let tag: MessageTypeTag = reader.read()?;
        let word: u16 = reader.read()?;
        let (recipient, target) = MessageRecipient::unpack(word);
        Ok(Self {
            tag,
            recipient,
            target,
        })
    }
}
