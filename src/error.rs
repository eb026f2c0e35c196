//! Error types for ipdeny.

use thiserror::Error;

/// Error type for ipdeny operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Address is not four dot-separated decimal octets
    #[error("invalid IPv4 address: {0:?}")]
    InvalidAddressFormat(String),

    /// Prefix length outside 0..=32
    #[error("invalid prefix length: {0}")]
    InvalidPrefixLength(String),

    /// Block base has host bits set below the prefix length
    #[error("misaligned CIDR block: {0}")]
    MisalignedBlock(String),

    /// Range start is greater than its end, or a bound is not a 32-bit integer
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// Bit string contains something other than '0' and '1', or is too long
    #[error("invalid bit string: {0:?}")]
    InvalidBitString(String),

    /// Feed could not be fetched or read
    #[error("source {name} unavailable: {reason}")]
    SourceUnavailable { name: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for ipdeny operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error concerns a single malformed entry rather than
    /// the whole build.
    pub fn is_per_entry(&self) -> bool {
        matches!(
            self,
            Error::InvalidAddressFormat(_)
                | Error::InvalidPrefixLength(_)
                | Error::MisalignedBlock(_)
                | Error::InvalidRange(_)
        )
    }
}
