use std::default::Default;

/// Contains Config properties which will be used by a session
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// First port the host tries to bind
    pub suggested_port: u16,
    /// Most clients the host's server accepts, its own loopback client included
    pub max_clients: u16,
    /// How many consecutive ports are tried before hosting fails
    pub port_retry_count: u16,
    /// Address the host's own client connects to
    pub loopback_address: String,
    /// Logs every outbound batch and received entity at debug level
    pub detailed_logging: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            suggested_port: 13337,
            max_clients: 8,
            port_retry_count: 50,
            loopback_address: "127.0.0.1".to_string(),
            detailed_logging: false,
        }
    }
}
