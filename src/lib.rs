//! geolite2 - IP metadata lookups over GeoLite2 databases
//!
//! A native reader for the MaxMind DB binary format plus the plumbing to
//! keep a directory of GeoLite2 database files fresh. Lookups answer
//! "which record, if any, covers this IP address" by walking a binary trie
//! over a memory-mapped file; no external decoder is involved.
//!
//! # Quick Start
//!
//! ```no_run
//! use geolite2::{DatabaseKind, Parser, UpdateMethod};
//!
//! let mut parser = Parser::new("data");
//!
//! // Refresh the data directory (git | api | local strategies)
//! parser.update(&UpdateMethod::Git)?;
//!
//! // Look up an address
//! if let Some(hit) = parser.lookup(DatabaseKind::City, "8.8.8.8".parse()?)? {
//!     println!("matched /{}: {:?}", hit.prefix_len, hit.data);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │  Database File (MMDB format)         │
//! ├──────────────────────────────────────┤
//! │  1. Binary search trie               │
//! │  2. Data section (typed records)     │
//! │  3. Metadata block                   │
//! └──────────────────────────────────────┘
//!          ↓ mmap, validated once
//! ┌──────────────────────────────────────┐
//! │  Store: read-only, concurrent        │
//! │  lookups over the immutable blob     │
//! └──────────────────────────────────────┘
//! ```
//!
//! Updating never edits a database in place: each strategy stages a full
//! candidate directory, then atomically swaps it over the live one. Open
//! stores are closed before the swap and reopened lazily afterwards.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Data section encoding/decoding (typed records, pointers)
pub mod data_section;
/// Error types for geolite2 operations
pub mod error;
/// Search tree builder (writer side)
pub mod ip_tree_builder;
/// MMDB binary format internals
pub mod mmdb;
/// Database builder producing complete blobs
pub mod mmdb_builder;
/// Named database registry
pub mod parser;
/// Read-only database store
pub mod store;
/// Data directory update strategies
pub mod update;

// Re-exports for consumers

/// Data value type for database records
pub use crate::data_section::DataValue;

pub use crate::error::{GeoLiteError, Result};
pub use crate::mmdb::{IpVersion, Metadata, MmdbError, RecordSize};
pub use crate::mmdb_builder::MmdbBuilder;
pub use crate::parser::{DatabaseKind, Parser};
pub use crate::store::{LookupMatch, Store};
pub use crate::update::UpdateMethod;

/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
