//! Binary layout parsing
//!
//! A database blob is three contiguous sections: the binary search tree,
//! a 16-byte zero separator followed by the data section, and the metadata
//! block. The metadata block sits after a marker sequence near the end of
//! the file and is itself an ordinary data-section record (a map).
//!
//! Only the fields needed for traversal are pulled out eagerly; the full
//! metadata map is parsed on demand.

use super::types::{IpVersion, MmdbError, RecordSize, DATA_SECTION_SEPARATOR, METADATA_MARKER};
use crate::data_section::{DataDecoder, DataValue};
use std::collections::HashMap;

/// How far from the end of the file the metadata marker may appear
const MARKER_SEARCH_WINDOW: usize = 128 * 1024;

/// Section boundaries and tree geometry, computed once at open
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    /// Number of nodes in the search tree
    pub node_count: u32,
    /// Record size in bits (24, 28, or 32)
    pub record_size: RecordSize,
    /// IP version the tree was built for
    pub ip_version: IpVersion,
    /// Size of the search tree in bytes
    pub tree_size: usize,
    /// Byte offset where the data section starts
    pub data_start: usize,
    /// Byte offset where the data section ends (the metadata marker)
    pub data_end: usize,
}

impl Layout {
    /// Parse a database blob and compute its section boundaries
    pub fn parse(data: &[u8]) -> Result<Self, MmdbError> {
        let marker_offset = find_metadata_marker(data)?;
        let metadata = &data[marker_offset + METADATA_MARKER.len()..];

        let map = decode_metadata_map(metadata)?;

        let major = get_uint(&map, "binary_format_major_version")?;
        if major != 2 {
            return Err(MmdbError::Corrupt(format!(
                "Unsupported binary format major version {}",
                major
            )));
        }

        let node_count = get_uint(&map, "node_count")?;
        let record_size = RecordSize::from_bits(get_uint(&map, "record_size")? as u16)?;
        let ip_version = IpVersion::from_number(get_uint(&map, "ip_version")?)?;

        let tree_size = node_count as usize * record_size.node_bytes();
        let data_start = tree_size + DATA_SECTION_SEPARATOR;
        if data_start > marker_offset {
            return Err(MmdbError::Corrupt(format!(
                "Search tree ({} bytes) overruns the data section",
                tree_size
            )));
        }

        Ok(Layout {
            node_count: node_count as u32,
            record_size,
            ip_version,
            tree_size,
            data_start,
            data_end: marker_offset,
        })
    }
}

/// Full metadata block, parsed on demand
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    /// Major version of the binary format (always 2)
    pub binary_format_major_version: u16,
    /// Minor version of the binary format
    pub binary_format_minor_version: u16,
    /// Number of nodes in the search tree
    pub node_count: u32,
    /// Record size in bits
    pub record_size: RecordSize,
    /// IP version the tree was built for
    pub ip_version: IpVersion,
    /// Unix timestamp of the database build
    pub build_epoch: u64,
    /// Database type name, e.g. "GeoLite2-City"
    pub database_type: String,
    /// Locale codes the record data is available in
    pub languages: Vec<String>,
    /// Human-readable description per locale
    pub description: HashMap<String, String>,
}

impl Metadata {
    /// Parse the metadata block from a database blob
    pub fn parse(data: &[u8]) -> Result<Self, MmdbError> {
        let marker_offset = find_metadata_marker(data)?;
        let map = decode_metadata_map(&data[marker_offset + METADATA_MARKER.len()..])?;

        let languages = match map.get("languages") {
            Some(DataValue::Array(items)) => items
                .iter()
                .filter_map(|v| match v {
                    DataValue::String(s) => Some(s.clone()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };

        let description = match map.get("description") {
            Some(DataValue::Map(entries)) => entries
                .iter()
                .filter_map(|(k, v)| match v {
                    DataValue::String(s) => Some((k.clone(), s.clone())),
                    _ => None,
                })
                .collect(),
            _ => HashMap::new(),
        };

        let database_type = match map.get("database_type") {
            Some(DataValue::String(s)) => s.clone(),
            _ => {
                return Err(MmdbError::Corrupt(
                    "Metadata field 'database_type' missing or not a string".to_string(),
                ))
            }
        };

        Ok(Metadata {
            binary_format_major_version: get_uint(&map, "binary_format_major_version")? as u16,
            binary_format_minor_version: get_uint(&map, "binary_format_minor_version")? as u16,
            node_count: get_uint(&map, "node_count")? as u32,
            record_size: RecordSize::from_bits(get_uint(&map, "record_size")? as u16)?,
            ip_version: IpVersion::from_number(get_uint(&map, "ip_version")?)?,
            build_epoch: get_uint(&map, "build_epoch")?,
            database_type,
            languages,
            description,
        })
    }
}

/// Find the metadata marker in a database blob
///
/// The marker appears somewhere in the last 128KB of the file; if it occurs
/// more than once, the last occurrence wins.
pub fn find_metadata_marker(data: &[u8]) -> Result<usize, MmdbError> {
    if data.len() < METADATA_MARKER.len() {
        return Err(MmdbError::Corrupt("Metadata marker not found".to_string()));
    }

    let window_start = data.len().saturating_sub(MARKER_SEARCH_WINDOW);

    memchr::memmem::rfind(&data[window_start..], METADATA_MARKER)
        .map(|pos| window_start + pos)
        .ok_or_else(|| MmdbError::Corrupt("Metadata marker not found".to_string()))
}

/// Decode the metadata record, which must be a map
fn decode_metadata_map(metadata: &[u8]) -> Result<HashMap<String, DataValue>, MmdbError> {
    let value = DataDecoder::new(metadata)
        .decode(0)
        .map_err(|e| MmdbError::Corrupt(format!("Failed to decode metadata: {}", e)))?;

    match value {
        DataValue::Map(map) => Ok(map),
        _ => Err(MmdbError::Corrupt("Metadata is not a map".to_string())),
    }
}

fn get_uint(map: &HashMap<String, DataValue>, key: &str) -> Result<u64, MmdbError> {
    match map.get(key) {
        Some(DataValue::Uint16(n)) => Ok(*n as u64),
        Some(DataValue::Uint32(n)) => Ok(*n as u64),
        Some(DataValue::Uint64(n)) => Ok(*n),
        Some(_) => Err(MmdbError::Corrupt(format!(
            "Metadata field '{}' is not an unsigned integer",
            key
        ))),
        None => Err(MmdbError::Corrupt(format!(
            "Required metadata field '{}' not found",
            key
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_section::DataEncoder;

    fn synthetic_blob(node_count: u32, record_size: u16, ip_version: u16) -> Vec<u8> {
        let tree_size = node_count as usize * RecordSize::from_bits(record_size).unwrap().node_bytes();
        let mut blob = vec![0u8; tree_size + DATA_SECTION_SEPARATOR];

        let mut meta = HashMap::new();
        meta.insert(
            "binary_format_major_version".to_string(),
            DataValue::Uint16(2),
        );
        meta.insert(
            "binary_format_minor_version".to_string(),
            DataValue::Uint16(0),
        );
        meta.insert("node_count".to_string(), DataValue::Uint32(node_count));
        meta.insert("record_size".to_string(), DataValue::Uint16(record_size));
        meta.insert("ip_version".to_string(), DataValue::Uint16(ip_version));
        meta.insert("build_epoch".to_string(), DataValue::Uint64(1700000000));
        meta.insert(
            "database_type".to_string(),
            DataValue::String("GeoLite2-Country".to_string()),
        );
        meta.insert(
            "languages".to_string(),
            DataValue::Array(vec![DataValue::String("en".to_string())]),
        );

        let mut desc = HashMap::new();
        desc.insert(
            "en".to_string(),
            DataValue::String("Test database".to_string()),
        );
        meta.insert("description".to_string(), DataValue::Map(desc));

        let mut encoder = DataEncoder::new();
        encoder.encode(&DataValue::Map(meta));

        blob.extend_from_slice(METADATA_MARKER);
        blob.extend_from_slice(&encoder.into_bytes());
        blob
    }

    #[test]
    fn test_layout_from_synthetic_blob() {
        let blob = synthetic_blob(10, 24, 6);
        let layout = Layout::parse(&blob).unwrap();

        assert_eq!(layout.node_count, 10);
        assert_eq!(layout.record_size, RecordSize::Bits24);
        assert_eq!(layout.ip_version, IpVersion::V6);
        assert_eq!(layout.tree_size, 60);
        assert_eq!(layout.data_start, 60 + DATA_SECTION_SEPARATOR);
        assert_eq!(layout.data_end, 60 + DATA_SECTION_SEPARATOR);
    }

    #[test]
    fn test_metadata_fields() {
        let blob = synthetic_blob(2, 28, 4);
        let metadata = Metadata::parse(&blob).unwrap();

        assert_eq!(metadata.binary_format_major_version, 2);
        assert_eq!(metadata.node_count, 2);
        assert_eq!(metadata.record_size, RecordSize::Bits28);
        assert_eq!(metadata.ip_version, IpVersion::V4);
        assert_eq!(metadata.build_epoch, 1700000000);
        assert_eq!(metadata.database_type, "GeoLite2-Country");
        assert_eq!(metadata.languages, vec!["en".to_string()]);
        assert_eq!(metadata.description.get("en").unwrap(), "Test database");
    }

    #[test]
    fn test_marker_not_found() {
        let result = find_metadata_marker(b"not a valid database file");
        assert!(matches!(result, Err(MmdbError::Corrupt(_))));
    }

    #[test]
    fn test_last_marker_wins() {
        // The marker byte-sequence can legitimately occur inside the data
        // section; the real metadata block is the one after the last.
        let mut blob = vec![0u8; 6 + DATA_SECTION_SEPARATOR]; // one-node tree
        blob.extend_from_slice(METADATA_MARKER); // decoy inside the data section
        let decoy_end = blob.len();

        let real = synthetic_blob(1, 24, 4);
        blob.extend_from_slice(&real[6 + DATA_SECTION_SEPARATOR..]); // marker + metadata

        let marker = find_metadata_marker(&blob).unwrap();
        assert_eq!(marker, decoy_end);

        let layout = Layout::parse(&blob).unwrap();
        assert_eq!(layout.data_end, decoy_end);
    }

    #[test]
    fn test_rejects_wrong_major_version() {
        let mut blob = vec![0u8; 6 + DATA_SECTION_SEPARATOR];
        let mut meta = HashMap::new();
        meta.insert(
            "binary_format_major_version".to_string(),
            DataValue::Uint16(3),
        );
        meta.insert("node_count".to_string(), DataValue::Uint32(1));
        meta.insert("record_size".to_string(), DataValue::Uint16(24));
        meta.insert("ip_version".to_string(), DataValue::Uint16(4));
        let mut encoder = DataEncoder::new();
        encoder.encode(&DataValue::Map(meta));
        blob.extend_from_slice(METADATA_MARKER);
        blob.extend_from_slice(&encoder.into_bytes());

        assert!(matches!(Layout::parse(&blob), Err(MmdbError::Corrupt(_))));
    }

    #[test]
    fn test_rejects_tree_overrunning_data_section() {
        // node_count claims more tree than the file holds
        let blob = {
            let mut blob = vec![0u8; 8];
            let mut meta = HashMap::new();
            meta.insert(
                "binary_format_major_version".to_string(),
                DataValue::Uint16(2),
            );
            meta.insert("node_count".to_string(), DataValue::Uint32(1_000_000));
            meta.insert("record_size".to_string(), DataValue::Uint16(24));
            meta.insert("ip_version".to_string(), DataValue::Uint16(4));
            let mut encoder = DataEncoder::new();
            encoder.encode(&DataValue::Map(meta));
            blob.extend_from_slice(METADATA_MARKER);
            blob.extend_from_slice(&encoder.into_bytes());
            blob
        };

        assert!(matches!(Layout::parse(&blob), Err(MmdbError::Corrupt(_))));
    }
}
