//! MMDB-specific Type Definitions

use std::fmt;

/// MMDB metadata marker: "\xAB\xCD\xEFMaxMind.com"
pub const METADATA_MARKER: &[u8] = b"\xAB\xCD\xEFMaxMind.com";

/// Size of the zero-byte separator between the search tree and the data section
pub const DATA_SECTION_SEPARATOR: usize = 16;

/// Errors from the binary store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MmdbError {
    /// Structurally invalid database: missing marker, malformed metadata,
    /// out-of-bounds offsets, or undecodable records
    Corrupt(String),
    /// The store was closed; reopen it before looking up
    StoreClosed,
    /// Queried address family is not representable in this database
    AddressFamily(String),
    /// IO error
    Io(String),
}

impl fmt::Display for MmdbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MmdbError::Corrupt(msg) => write!(f, "Corrupt database: {}", msg),
            MmdbError::StoreClosed => write!(f, "Store is closed"),
            MmdbError::AddressFamily(msg) => write!(f, "Address family mismatch: {}", msg),
            MmdbError::Io(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for MmdbError {}

impl From<std::io::Error> for MmdbError {
    fn from(err: std::io::Error) -> Self {
        MmdbError::Io(err.to_string())
    }
}

// Decode errors from the data section surface as corruption
impl From<&'static str> for MmdbError {
    fn from(msg: &'static str) -> Self {
        MmdbError::Corrupt(msg.to_string())
    }
}

/// IP version the search tree was built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpVersion {
    /// IPv4 only (32-bit tree)
    V4,
    /// IPv6 (128-bit tree, may include IPv4-mapped addresses)
    V6,
}

impl IpVersion {
    /// Create from the metadata's numeric field
    pub fn from_number(n: u64) -> Result<Self, MmdbError> {
        match n {
            4 => Ok(IpVersion::V4),
            6 => Ok(IpVersion::V6),
            _ => Err(MmdbError::Corrupt(format!("Invalid IP version: {}", n))),
        }
    }
}

/// Record size in bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSize {
    /// 24-bit records (3 bytes per record, 6 bytes per node)
    Bits24 = 24,
    /// 28-bit records (3.5 bytes per record, 7 bytes per node)
    Bits28 = 28,
    /// 32-bit records (4 bytes per record, 8 bytes per node)
    Bits32 = 32,
}

impl RecordSize {
    /// Get the size of a node (2 records) in bytes
    pub fn node_bytes(self) -> usize {
        match self {
            RecordSize::Bits24 => 6,
            RecordSize::Bits28 => 7,
            RecordSize::Bits32 => 8,
        }
    }

    /// Create from bit size
    pub fn from_bits(bits: u16) -> Result<Self, MmdbError> {
        match bits {
            24 => Ok(RecordSize::Bits24),
            28 => Ok(RecordSize::Bits28),
            32 => Ok(RecordSize::Bits32),
            _ => Err(MmdbError::Corrupt(format!(
                "Invalid record size: {} bits",
                bits
            ))),
        }
    }

    /// Numeric bit width
    pub fn bits(self) -> u16 {
        self as u16
    }
}
