use crate::{Serde, SerdeErr};

/// Reads values back out of a byte buffer produced by a [`ByteWriter`](crate::ByteWriter).
pub struct ByteReader<'b> {
    buffer: &'b [u8],
    cursor: usize,
}

impl<'b> ByteReader<'b> {
    pub fn new(buffer: &'b [u8]) -> Self {
        Self { buffer, cursor: 0 }
    }

    pub fn read_byte(&mut self) -> Result<u8, SerdeErr> {
        let bytes = self.read_bytes(1)?;
        Ok(bytes[0])
    }

    pub fn read_bytes(&mut self, length: usize) -> Result<&'b [u8], SerdeErr> {
        let remaining = self.unread_len();
        if length > remaining {
            return Err(SerdeErr::UnexpectedEnd {
                needed: length,
                remaining,
            });
        }
        let start = self.cursor;
        self.cursor += length;
        Ok(&self.buffer[start..self.cursor])
    }

    pub fn read<T: Serde>(&mut self) -> Result<T, SerdeErr> {
        T::de(self)
    }

    /// Number of bytes not yet consumed. Batch payloads are read until this hits zero.
    pub fn unread_len(&self) -> usize {
        self.buffer.len() - self.cursor
    }

    pub fn has_remaining(&self) -> bool {
        self.unread_len() > 0
    }

    /// The not-yet-consumed tail of the buffer, without advancing.
    pub fn remaining(&self) -> &'b [u8] {
        &self.buffer[self.cursor..]
    }
}
