/// Error types for the geolite2 library
use crate::mmdb::MmdbError;
use std::fmt;

/// Result type alias for geolite2 operations
pub type Result<T> = std::result::Result<T, GeoLiteError>;

/// Main error type for geolite2 operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeoLiteError {
    /// Lookup requested against a database name that is not registered
    UnknownParserType(String),

    /// Backing database file missing or unreadable at open time
    DatabaseLoad(String),

    /// An update strategy's precondition or transport step failed
    Update(String),

    /// Invalid entry handed to the database builder
    InvalidEntry(String),

    /// Binary format error from the underlying store
    Mmdb(MmdbError),

    /// I/O errors
    Io(String),
}

impl fmt::Display for GeoLiteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeoLiteError::UnknownParserType(name) => {
                write!(f, "Unknown parser type: {}", name)
            }
            GeoLiteError::DatabaseLoad(msg) => write!(f, "Database load error: {}", msg),
            GeoLiteError::Update(msg) => write!(f, "Update error: {}", msg),
            GeoLiteError::InvalidEntry(msg) => write!(f, "Invalid entry: {}", msg),
            GeoLiteError::Mmdb(err) => write!(f, "{}", err),
            GeoLiteError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for GeoLiteError {}

impl From<MmdbError> for GeoLiteError {
    fn from(err: MmdbError) -> Self {
        GeoLiteError::Mmdb(err)
    }
}

impl From<std::io::Error> for GeoLiteError {
    fn from(err: std::io::Error) -> Self {
        GeoLiteError::Io(err.to_string())
    }
}
