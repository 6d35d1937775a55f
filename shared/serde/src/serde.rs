use crate::{ByteReader, ByteWriter, SerdeErr};

/// A type that can be written to and read from the wire
pub trait Serde: Sized {
    /// Serialize into the writer
    fn ser(&self, writer: &mut ByteWriter);

    /// Deserialize from the reader
    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr>;

    /// Number of bytes `ser` will write
    fn byte_length(&self) -> usize;
}

macro_rules! impl_serde_for_number {
    ($($t:ty),*) => {
        $(
            impl Serde for $t {
                fn ser(&self, writer: &mut ByteWriter) {
                    writer.write_bytes(&self.to_le_bytes());
                }

                fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
                    const SIZE: usize = std::mem::size_of::<$t>();
                    let bytes = reader.read_bytes(SIZE)?;
                    let mut array = [0u8; SIZE];
                    array.copy_from_slice(bytes);
                    Ok(<$t>::from_le_bytes(array))
                }

                fn byte_length(&self) -> usize {
                    std::mem::size_of::<$t>()
                }
            }
        )*
    };
}

impl_serde_for_number!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

impl Serde for bool {
    fn ser(&self, writer: &mut ByteWriter) {
        writer.write_byte(u8::from(*self));
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        match reader.read_byte()? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(SerdeErr::InvalidBool { value }),
        }
    }

    fn byte_length(&self) -> usize {
        1
    }
}

// Strings are length-prefixed with a u16; longer strings are truncated at a char boundary.
impl Serde for String {
    fn ser(&self, writer: &mut ByteWriter) {
        let mut end = self.len().min(u16::MAX as usize);
        while !self.is_char_boundary(end) {
            end -= 1;
        }
        (end as u16).ser(writer);
        writer.write_bytes(&self.as_bytes()[..end]);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let length = u16::de(reader)? as usize;
        let bytes = reader.read_bytes(length)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| SerdeErr::InvalidUtf8 { length })
    }

    fn byte_length(&self) -> usize {
        2 + self.len().min(u16::MAX as usize)
    }
}

impl<T: Serde> Serde for Option<T> {
    fn ser(&self, writer: &mut ByteWriter) {
        match self {
            Some(value) => {
                true.ser(writer);
                value.ser(writer);
            }
            None => false.ser(writer),
        }
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        if bool::de(reader)? {
            Ok(Some(T::de(reader)?))
        } else {
            Ok(None)
        }
    }

    fn byte_length(&self) -> usize {
        1 + self.as_ref().map_or(0, |value| value.byte_length())
    }
}
