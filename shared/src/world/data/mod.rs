mod data_kinds;
mod data_pool;
mod error;
mod network_data;

pub use data_kinds::DataKinds;
pub use data_pool::DataPool;
pub use error::DataKindsError;
pub use network_data::{DynNetworkData, NetworkData};
