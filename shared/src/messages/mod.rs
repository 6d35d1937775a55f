mod error;
mod message_envelope;
mod message_recipient;
mod message_type;
mod sync_batch;

pub use error::{BatchError, EnvelopeError};
pub use message_envelope::EnvelopeHeader;
pub use message_recipient::{MessageRecipient, MAX_TARGET};
pub use message_type::{MessageType, NetworkMessageType};
pub use sync_batch::{
    read_create_batch, read_delete_batch, read_initial_data, read_sync_data, write_create_batch,
    write_delete_batch, write_initial_data, write_sync_data, CreateEntry, InitialData,
};
