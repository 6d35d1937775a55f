//! # Peerhost Serde
//! Byte-aligned serialization primitives used by every peerhost wire message.
//! All multi-byte integers are little-endian; strings carry a `u16` byte-length prefix.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod byte_reader;
mod byte_writer;
mod error;
mod serde;

pub use byte_reader::ByteReader;
pub use byte_writer::ByteWriter;
pub use error::SerdeErr;
pub use serde::Serde;
