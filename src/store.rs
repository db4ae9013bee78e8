//! Read-only database store
//!
//! A [`Store`] is an open database file: the blob is memory-mapped (or
//! owned, for tests and in-memory use), the section layout is validated
//! once at open, and lookups walk the tree and decode the matched record.
//!
//! After `open` the store never mutates, so any number of concurrent
//! lookups may run against a shared reference. Refreshing data is always
//! replace-the-file-and-reopen; there is no in-place update. [`Store::close`]
//! releases the mapping early (before the backing file is replaced on
//! disk); lookups on a closed store fail with [`MmdbError::StoreClosed`].

use crate::data_section::{DataDecoder, DataValue};
use crate::mmdb::{Layout, Metadata, MmdbError, SearchTree};
use memmap2::Mmap;
use std::fs::File;
use std::net::IpAddr;
use std::path::Path;

/// Backing bytes for a store - either owned or memory-mapped
enum StoreData {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl StoreData {
    fn as_slice(&self) -> &[u8] {
        match self {
            StoreData::Owned(v) => v.as_slice(),
            StoreData::Mapped(m) => &m[..],
        }
    }
}

/// A matched record and the prefix length it was found under
#[derive(Debug, Clone, PartialEq)]
pub struct LookupMatch {
    /// The decoded record
    pub data: DataValue,
    /// Network prefix length (CIDR) of the matching entry
    pub prefix_len: u8,
}

/// An open, immutable lookup database
pub struct Store {
    data: Option<StoreData>,
    layout: Layout,
}

impl Store {
    /// Open a database file using memory mapping
    ///
    /// The file is mapped read-only and validated: the metadata marker must
    /// be present, the metadata block well-formed, and the declared search
    /// tree must fit inside the blob.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, MmdbError> {
        let file = File::open(path.as_ref()).map_err(|e| {
            MmdbError::Io(format!("Failed to open {}: {}", path.as_ref().display(), e))
        })?;

        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| {
            MmdbError::Io(format!("Failed to mmap {}: {}", path.as_ref().display(), e))
        })?;

        Self::from_data(StoreData::Mapped(mmap))
    }

    /// Create a store from an in-memory blob
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, MmdbError> {
        Self::from_data(StoreData::Owned(data))
    }

    fn from_data(data: StoreData) -> Result<Self, MmdbError> {
        let layout = Layout::parse(data.as_slice())?;
        Ok(Self {
            data: Some(data),
            layout,
        })
    }

    /// Look up an IP address, decoding the matched record
    ///
    /// Returns `Ok(None)` when no prefix in the database covers the
    /// address. IPv4 queries against an IPv6-built database are routed
    /// through the IPv4-mapped prefix space; IPv6 queries against an
    /// IPv4-only database fail with an address-family error.
    pub fn lookup(&self, ip: IpAddr) -> Result<Option<LookupMatch>, MmdbError> {
        let data = self.bytes()?;

        let tree = SearchTree::new(data, &self.layout);
        let hit = match tree.lookup(ip)? {
            Some(hit) => hit,
            None => return Ok(None),
        };

        // Tree offsets are relative to the data section, which ends at the
        // metadata marker; slicing both ends keeps record decoding inside it.
        let section = &data[self.layout.data_start..self.layout.data_end];
        let value = DataDecoder::new(section)
            .decode(hit.data_offset)
            .map_err(MmdbError::from)?;

        Ok(Some(LookupMatch {
            data: value,
            prefix_len: hit.prefix_len,
        }))
    }

    /// Parse the full metadata block
    pub fn metadata(&self) -> Result<Metadata, MmdbError> {
        Metadata::parse(self.bytes()?)
    }

    /// Number of nodes in the search tree
    pub fn node_count(&self) -> u32 {
        self.layout.node_count
    }

    /// Release the underlying mapping
    ///
    /// Subsequent lookups fail with [`MmdbError::StoreClosed`]. Callers
    /// must close stores before replacing their backing files: an open
    /// mapping can pin stale data or block removal on some platforms.
    pub fn close(&mut self) {
        self.data = None;
    }

    /// Whether this store has been closed
    pub fn is_closed(&self) -> bool {
        self.data.is_none()
    }

    fn bytes(&self) -> Result<&[u8], MmdbError> {
        self.data
            .as_ref()
            .map(StoreData::as_slice)
            .ok_or(MmdbError::StoreClosed)
    }
}
