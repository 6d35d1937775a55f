use thiserror::Error;

use crate::DataTypeId;

/// Errors that can occur when registering or resolving payload schemas
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataKindsError {
    /// Two registered schemas share a name, so their sort order is ambiguous
    #[error("Data type name '{name}' is registered twice. Names must be unique to agree on ids across peers")]
    DuplicateName { name: &'static str },

    /// A schema was registered after ids were assigned
    #[error("Cannot register data type '{name}': data kinds are already locked")]
    AlreadyLocked { name: &'static str },

    /// Ids are only assigned on lock
    #[error("Data kinds are not locked yet, no data type ids have been assigned")]
    NotLocked,

    /// The type was never registered with the protocol
    #[error("Data type '{name}' was never registered with the protocol")]
    UnregisteredType { name: &'static str },

    /// More schemas than a data type id can address
    #[error("{count} data types registered, more than a data type id can address")]
    TooManyDataTypes { count: usize },

    /// A peer referenced an id outside the registered range
    #[error("Unknown data type id {data_type_id}, only {registered} data types are registered")]
    UnknownDataTypeId {
        data_type_id: DataTypeId,
        registered: usize,
    },
}
