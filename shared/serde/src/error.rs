use thiserror::Error;

/// Errors that can occur while reading a value off the wire
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerdeErr {
    /// The reader ran out of bytes before the value was complete
    #[error("Unexpected end of buffer: needed {needed} bytes but only {remaining} remain")]
    UnexpectedEnd { needed: usize, remaining: usize },

    /// A string payload was not valid UTF-8
    #[error("String payload of {length} bytes is not valid UTF-8")]
    InvalidUtf8 { length: usize },

    /// A boolean byte was neither 0 nor 1
    #[error("Invalid boolean byte {value}")]
    InvalidBool { value: u8 },
}
