//! Custom error types used by this crate

/// Custom `Result` to prepopulate `Error` type
pub type Result<T> = std::result::Result<T, Error>;

/// A general error in decoding or encoding an AIS message
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// Malformed sentence structure: missing delimiters, wrong field count
    Framing(String),
    /// Checksum mismatch, reported only when validation was requested
    Checksum { expected: u8, found: u8 },
    /// Body character outside the AIS armor alphabet
    Armor { byte: u8 },
    /// Decode required more bits than the buffer holds
    Truncated {
        field: &'static str,
        needed: usize,
        available: usize,
    },
    /// Dispatch found no handler for a message type or sub-schema selector
    UnknownType(String),
    /// Encode received a value outside its field's domain
    FieldValue(String),
    /// Multipart set mismatch
    Grouping { expected: u64, found: usize },
    /// Tagblock k:v decoding failed
    Parse(String),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Framing(msg) => write!(f, "{}", msg),
            Self::Checksum { expected, found } => {
                write!(
                    f,
                    "checksum mismatch; expected 0x{expected:02X}, found 0x{found:02X}"
                )
            }
            Self::Armor { byte } => {
                write!(f, "body character out of armor range: {}", byte)
            }
            Self::Truncated {
                field,
                needed,
                available,
            } => {
                write!(
                    f,
                    "truncated bitstream reading {field}: needed {needed} bits, {available} available"
                )
            }
            Self::UnknownType(msg) => write!(f, "{}", msg),
            Self::FieldValue(msg) => write!(f, "{}", msg),
            Self::Grouping { expected, found } => {
                write!(f, "Expected {expected} parts but found {found}")
            }
            Self::Parse(msg) => write!(f, "{}", msg),
        }
    }
}

impl From<&str> for Error {
    fn from(err: &str) -> Self {
        Self::Framing(err.into())
    }
}

impl From<String> for Error {
    fn from(err: String) -> Self {
        Self::Framing(err)
    }
}

impl<T: std::fmt::Debug> From<nom::Err<nom::error::Error<T>>> for Error {
    fn from(err: nom::Err<nom::error::Error<T>>) -> Self {
        Self::Framing(format!("{:?}", err))
    }
}
