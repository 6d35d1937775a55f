use std::{any::Any, fmt::Debug};

use peerhost_serde::{ByteReader, ByteWriter, SerdeErr};

/// A payload schema: the typed snapshot a sync entity writes and reads.
///
/// Every peer must register the same set of schemas. Wire ids are derived by
/// sorting [`NetworkData::NAME`], so names must be unique and must not change
/// between builds that are expected to talk to each other.
pub trait NetworkData: Debug + Default + Send + 'static {
    /// Stable schema name, used as the sort key when assigning data type ids
    const NAME: &'static str;

    fn write_to(&self, writer: &mut ByteWriter);

    fn read_from(&mut self, reader: &mut ByteReader) -> Result<(), SerdeErr>;

    /// Prefab to instantiate when a remote creation references an object that
    /// does not exist locally. `None` means the object must already exist.
    fn prefab(&self) -> Option<&str> {
        None
    }
}

/// Object-safe view of a [`NetworkData`] payload
pub trait DynNetworkData: Send {
    fn name(&self) -> &'static str;
    fn write(&self, writer: &mut ByteWriter);
    fn read(&mut self, reader: &mut ByteReader) -> Result<(), SerdeErr>;
    fn prefab_ref(&self) -> Option<&str>;
    fn describe(&self) -> String;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<D: NetworkData> DynNetworkData for D {
    fn name(&self) -> &'static str {
        D::NAME
    }

    fn write(&self, writer: &mut ByteWriter) {
        self.write_to(writer);
    }

    fn read(&mut self, reader: &mut ByteReader) -> Result<(), SerdeErr> {
        self.read_from(reader)
    }

    fn prefab_ref(&self) -> Option<&str> {
        self.prefab()
    }

    fn describe(&self) -> String {
        format!("{:?}", self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}
