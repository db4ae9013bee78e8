//! Database builder
//!
//! Assembles a complete database blob: search tree, 16-byte separator,
//! deduplicated data section, then the metadata marker and metadata block.
//! The output is readable by [`crate::Store`] and by any MMDB reader.

use crate::data_section::{DataEncoder, DataValue};
use crate::error::{GeoLiteError, Result};
use crate::ip_tree_builder::IpTreeBuilder;
use crate::mmdb::{RecordSize, METADATA_MARKER};
use std::collections::HashMap;
use std::net::IpAddr;

/// A single prefix entry waiting to be built
#[derive(Debug, Clone)]
struct Entry {
    addr: IpAddr,
    prefix_len: u8,
    data: HashMap<String, DataValue>,
}

/// Builder for lookup databases
///
/// # Example
/// ```
/// use geolite2::{MmdbBuilder, DataValue, Store};
/// use std::collections::HashMap;
///
/// let mut builder = MmdbBuilder::new();
/// let mut data = HashMap::new();
/// data.insert("country".to_string(), DataValue::String("US".to_string()));
/// builder.add_ip("1.2.3.0/24", data)?;
///
/// let store = Store::from_bytes(builder.build()?)?;
/// assert!(store.lookup("1.2.3.4".parse()?)?.is_some());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct MmdbBuilder {
    entries: Vec<Entry>,
    record_size: RecordSize,
    database_type: Option<String>,
    description: HashMap<String, String>,
}

impl MmdbBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            // 24-bit records cover databases up to ~2.7M nodes
            record_size: RecordSize::Bits24,
            database_type: None,
            description: HashMap::new(),
        }
    }

    /// Override the record size (24-bit by default)
    pub fn with_record_size(mut self, record_size: RecordSize) -> Self {
        self.record_size = record_size;
        self
    }

    /// Set a custom database type name
    pub fn with_database_type(mut self, db_type: impl Into<String>) -> Self {
        self.database_type = Some(db_type.into());
        self
    }

    /// Add a description in a specific language
    ///
    /// Can be called multiple times for different languages.
    pub fn with_description(
        mut self,
        language: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        self.description.insert(language.into(), text.into());
        self
    }

    /// Add an IP address or CIDR block with its record data
    ///
    /// A bare address gets a host prefix (/32 or /128).
    pub fn add_ip(&mut self, key: &str, data: HashMap<String, DataValue>) -> Result<()> {
        let (addr, prefix_len) = parse_cidr(key)?;
        self.entries.push(Entry {
            addr,
            prefix_len,
            data,
        });
        Ok(())
    }

    /// Number of entries added so far
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Build the database blob
    pub fn build(&self) -> Result<Vec<u8>> {
        // Encode all records first; identical records share an offset
        let mut data_encoder = DataEncoder::new();
        let offsets: Vec<u32> = self
            .entries
            .iter()
            .map(|e| data_encoder.encode(&DataValue::Map(e.data.clone())))
            .collect();
        let data_section = data_encoder.into_bytes();

        let needs_v6 = self.entries.iter().any(|e| e.addr.is_ipv6());
        let mut tree_builder = if needs_v6 {
            IpTreeBuilder::new_v6(self.record_size)
        } else {
            IpTreeBuilder::new_v4(self.record_size)
        };

        for (entry, &offset) in self.entries.iter().zip(&offsets) {
            tree_builder.insert(entry.addr, entry.prefix_len, offset)?;
        }
        let (tree_bytes, node_count) = tree_builder.build()?;

        let metadata = self.metadata_section(node_count, if needs_v6 { 6 } else { 4 });

        let mut blob = Vec::with_capacity(
            tree_bytes.len() + 16 + data_section.len() + METADATA_MARKER.len() + metadata.len(),
        );
        blob.extend_from_slice(&tree_bytes);
        blob.extend_from_slice(&[0u8; 16]); // tree / data section separator
        blob.extend_from_slice(&data_section);
        blob.extend_from_slice(METADATA_MARKER);
        blob.extend_from_slice(&metadata);

        Ok(blob)
    }

    fn metadata_section(&self, node_count: u32, ip_version: u16) -> Vec<u8> {
        let mut metadata = HashMap::new();
        metadata.insert(
            "binary_format_major_version".to_string(),
            DataValue::Uint16(2),
        );
        metadata.insert(
            "binary_format_minor_version".to_string(),
            DataValue::Uint16(0),
        );
        metadata.insert(
            "build_epoch".to_string(),
            DataValue::Uint64(
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or(0),
            ),
        );
        metadata.insert(
            "database_type".to_string(),
            DataValue::String(
                self.database_type
                    .clone()
                    .unwrap_or_else(|| "GeoLite2-Custom".to_string()),
            ),
        );

        let description = if self.description.is_empty() {
            let mut desc = HashMap::new();
            desc.insert(
                "en".to_string(),
                DataValue::String("IP metadata lookup database".to_string()),
            );
            desc
        } else {
            self.description
                .iter()
                .map(|(k, v)| (k.clone(), DataValue::String(v.clone())))
                .collect()
        };
        metadata.insert("description".to_string(), DataValue::Map(description));
        metadata.insert(
            "languages".to_string(),
            DataValue::Array(vec![DataValue::String("en".to_string())]),
        );
        metadata.insert("ip_version".to_string(), DataValue::Uint16(ip_version));
        metadata.insert("node_count".to_string(), DataValue::Uint32(node_count));
        metadata.insert(
            "record_size".to_string(),
            DataValue::Uint16(self.record_size.bits()),
        );

        let mut encoder = DataEncoder::new();
        encoder.encode(&DataValue::Map(metadata));
        encoder.into_bytes()
    }
}

impl Default for MmdbBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse "a.b.c.d", "a.b.c.d/n", or their IPv6 forms
fn parse_cidr(key: &str) -> Result<(IpAddr, u8)> {
    if let Ok(addr) = key.parse::<IpAddr>() {
        let prefix_len = if addr.is_ipv4() { 32 } else { 128 };
        return Ok((addr, prefix_len));
    }

    if let Some((addr_str, prefix_str)) = key.split_once('/') {
        if let (Ok(addr), Ok(prefix_len)) = (addr_str.parse::<IpAddr>(), prefix_str.parse::<u8>())
        {
            let max_prefix = if addr.is_ipv4() { 32 } else { 128 };
            if prefix_len <= max_prefix {
                return Ok((addr, prefix_len));
            }
        }
    }

    Err(GeoLiteError::InvalidEntry(format!(
        "Not an IP address or CIDR block: {}",
        key
    )))
}
