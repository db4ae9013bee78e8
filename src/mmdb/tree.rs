//! Search tree traversal for IP lookups
//!
//! The tree is a binary trie: each node holds two records (left for bit 0,
//! right for bit 1) that point to either another node, a data section
//! offset, or the "not found" sentinel. An address is consumed bit by bit
//! from the root; every transition moves to a strictly later position in
//! the address, so traversal always terminates.

use super::format::Layout;
use super::types::{IpVersion, MmdbError, RecordSize, DATA_SECTION_SEPARATOR};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Result of a successful tree walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeHit {
    /// Offset into the data section (relative to data section start)
    pub data_offset: u32,
    /// Network prefix length that matched (relative to the queried family)
    pub prefix_len: u8,
}

/// Outcome of walking the IPv4-mapped prefix in an IPv6 tree
enum V4Start {
    /// Node index where the IPv4 address space begins
    Node(u32),
    /// The tree carries no IPv4-mapped space
    Absent,
    /// A prefix wider than /96 covers the whole IPv4 space
    Covered(u32),
}

/// Read-only view over the search tree section of a database blob
pub struct SearchTree<'a> {
    data: &'a [u8],
    layout: &'a Layout,
}

impl<'a> SearchTree<'a> {
    /// Create a search tree over a database blob
    pub fn new(data: &'a [u8], layout: &'a Layout) -> Self {
        Self { data, layout }
    }

    /// Look up an IP address
    ///
    /// IPv4 addresses queried against an IPv6-built tree are routed through
    /// the IPv4-mapped prefix (::ffff:0:0/96). IPv4-mapped IPv6 addresses
    /// are unwrapped and looked up as IPv4. A native IPv6 address cannot be
    /// represented in an IPv4-built tree and is an error.
    pub fn lookup(&self, ip: IpAddr) -> Result<Option<TreeHit>, MmdbError> {
        match ip {
            IpAddr::V4(addr) => self.lookup_v4(addr),
            IpAddr::V6(addr) => match addr.to_ipv4_mapped() {
                Some(v4) => self.lookup_v4(v4),
                None => self.lookup_v6(addr),
            },
        }
    }

    /// Look up an IPv4 address
    pub fn lookup_v4(&self, addr: Ipv4Addr) -> Result<Option<TreeHit>, MmdbError> {
        let bits = (u32::from(addr) as u128) << 96;

        let start = match self.layout.ip_version {
            IpVersion::V4 => 0,
            IpVersion::V6 => match self.find_ipv4_start()? {
                V4Start::Node(node) => node,
                V4Start::Absent => return Ok(None),
                V4Start::Covered(record) => {
                    // The covering record matches every IPv4 address
                    return Ok(Some(TreeHit {
                        data_offset: self.data_offset_of(record)?,
                        prefix_len: 0,
                    }));
                }
            },
        };

        self.traverse(bits, 32, start)
    }

    /// Look up an IPv6 address
    pub fn lookup_v6(&self, addr: Ipv6Addr) -> Result<Option<TreeHit>, MmdbError> {
        if self.layout.ip_version == IpVersion::V4 {
            return Err(MmdbError::AddressFamily(format!(
                "Cannot look up IPv6 address {} in an IPv4-only database",
                addr
            )));
        }

        self.traverse(u128::from(addr), 128, 0)
    }

    /// Walk the tree consuming `bit_count` bits from the top of `bits`
    fn traverse(
        &self,
        bits: u128,
        bit_count: u8,
        mut node: u32,
    ) -> Result<Option<TreeHit>, MmdbError> {
        let node_count = self.layout.node_count;

        for i in 0..bit_count {
            let bit = ((bits >> (127 - i)) & 1) as u8;
            let record = self.read_record(node as usize, bit)?;

            if record == node_count {
                return Ok(None);
            } else if record < node_count {
                node = record;
            } else {
                return Ok(Some(TreeHit {
                    data_offset: self.data_offset_of(record)?,
                    prefix_len: i + 1,
                }));
            }
        }

        Ok(None)
    }

    /// Walk the 96 zero bits of the ::ffff:0:0/96 prefix to the node where
    /// IPv4 address space begins in an IPv6 tree
    fn find_ipv4_start(&self) -> Result<V4Start, MmdbError> {
        let node_count = self.layout.node_count;
        let mut node = 0u32;

        for _ in 0..96 {
            let record = self.read_record(node as usize, 0)?;
            if record == node_count {
                return Ok(V4Start::Absent);
            } else if record < node_count {
                node = record;
            } else {
                return Ok(V4Start::Covered(record));
            }
        }

        Ok(V4Start::Node(node))
    }

    /// Read one of a node's two records. `side` 0 = left, 1 = right.
    fn read_record(&self, node: usize, side: u8) -> Result<u32, MmdbError> {
        if node as u32 >= self.layout.node_count {
            return Err(MmdbError::Corrupt(format!(
                "Node index {} exceeds node count {}",
                node, self.layout.node_count
            )));
        }

        let node_bytes = self.layout.record_size.node_bytes();
        let offset = node * node_bytes;
        if offset + node_bytes > self.layout.tree_size || offset + node_bytes > self.data.len() {
            return Err(MmdbError::Corrupt(format!(
                "Node {} lies outside the search tree",
                node
            )));
        }

        let bytes = &self.data[offset..offset + node_bytes];

        let record = match self.layout.record_size {
            RecordSize::Bits24 => {
                let r = &bytes[side as usize * 3..];
                (r[0] as u32) << 16 | (r[1] as u32) << 8 | r[2] as u32
            }
            RecordSize::Bits28 => {
                // [left low 24][middle: left-high nibble | right-high nibble][right low 24]
                if side == 0 {
                    let high = ((bytes[3] >> 4) & 0x0F) as u32;
                    high << 24 | (bytes[0] as u32) << 16 | (bytes[1] as u32) << 8 | bytes[2] as u32
                } else {
                    let high = (bytes[3] & 0x0F) as u32;
                    high << 24 | (bytes[4] as u32) << 16 | (bytes[5] as u32) << 8 | bytes[6] as u32
                }
            }
            RecordSize::Bits32 => {
                let r = &bytes[side as usize * 4..];
                u32::from_be_bytes([r[0], r[1], r[2], r[3]])
            }
        };

        Ok(record)
    }

    /// Translate a terminal record value into a data section offset
    ///
    /// Terminal records encode `node_count + separator + offset`, so the
    /// offset is recovered by subtracting both.
    fn data_offset_of(&self, record: u32) -> Result<u32, MmdbError> {
        record
            .checked_sub(self.layout.node_count)
            .and_then(|v| v.checked_sub(DATA_SECTION_SEPARATOR as u32))
            .ok_or_else(|| {
                MmdbError::Corrupt(format!(
                    "Record {} is not a data pointer (node_count = {})",
                    record, self.layout.node_count
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(node_count: u32, record_size: RecordSize, ip_version: IpVersion) -> Layout {
        let tree_size = node_count as usize * record_size.node_bytes();
        Layout {
            node_count,
            record_size,
            ip_version,
            tree_size,
            data_start: tree_size + DATA_SECTION_SEPARATOR,
            data_end: tree_size + DATA_SECTION_SEPARATOR,
        }
    }

    #[test]
    fn test_read_24bit_record() {
        // Node 0: left = 1, right = 2
        let mut data = vec![0u8; 60];
        data[2] = 0x01;
        data[5] = 0x02;

        let layout = layout(10, RecordSize::Bits24, IpVersion::V6);
        let tree = SearchTree::new(&data, &layout);

        assert_eq!(tree.read_record(0, 0).unwrap(), 1);
        assert_eq!(tree.read_record(0, 1).unwrap(), 2);
    }

    #[test]
    fn test_read_28bit_record() {
        // Left = 0x1000001, right = 0x2000002; high nibbles share byte 3
        let mut data = vec![0u8; 70];
        data[2] = 0x01;
        data[3] = 0x12;
        data[6] = 0x02;

        let layout = layout(10, RecordSize::Bits28, IpVersion::V6);
        let tree = SearchTree::new(&data, &layout);

        assert_eq!(tree.read_record(0, 0).unwrap(), 0x1000001);
        assert_eq!(tree.read_record(0, 1).unwrap(), 0x2000002);
    }

    #[test]
    fn test_read_32bit_record() {
        let mut data = vec![0u8; 80];
        data[0..4].copy_from_slice(&7u32.to_be_bytes());
        data[4..8].copy_from_slice(&9u32.to_be_bytes());

        let layout = layout(10, RecordSize::Bits32, IpVersion::V6);
        let tree = SearchTree::new(&data, &layout);

        assert_eq!(tree.read_record(0, 0).unwrap(), 7);
        assert_eq!(tree.read_record(0, 1).unwrap(), 9);
    }

    #[test]
    fn test_node_index_out_of_bounds() {
        let data = vec![0u8; 60];
        let layout = layout(10, RecordSize::Bits24, IpVersion::V6);
        let tree = SearchTree::new(&data, &layout);

        assert!(tree.read_record(10, 0).is_err());
    }

    #[test]
    fn test_data_offset_of() {
        let data = vec![];
        let layout = layout(100, RecordSize::Bits24, IpVersion::V6);
        let tree = SearchTree::new(&data, &layout);

        // record = node_count + 16 + offset
        assert_eq!(tree.data_offset_of(116).unwrap(), 0);
        assert_eq!(tree.data_offset_of(200).unwrap(), 84);
        assert!(tree.data_offset_of(100).is_err());
    }

    #[test]
    fn test_ipv6_rejected_by_v4_tree() {
        let data = vec![0u8; 6];
        let layout = layout(1, RecordSize::Bits24, IpVersion::V4);
        let tree = SearchTree::new(&data, &layout);

        let result = tree.lookup("2001:db8::1".parse().unwrap());
        assert!(matches!(result, Err(MmdbError::AddressFamily(_))));
    }

    #[test]
    fn test_ipv4_mapped_ipv6_unwraps_to_v4() {
        // One-node v4 tree: left record terminal, right record sentinel.
        // node_count = 1, so terminal = 1 + 16 + 0 = 17.
        let mut data = vec![0u8; 6 + DATA_SECTION_SEPARATOR];
        data[2] = 17;
        data[5] = 1; // sentinel (node_count)

        let layout = layout(1, RecordSize::Bits24, IpVersion::V4);
        let tree = SearchTree::new(&data, &layout);

        let native = tree.lookup("1.2.3.4".parse().unwrap()).unwrap();
        let mapped = tree.lookup("::ffff:1.2.3.4".parse().unwrap()).unwrap();
        assert_eq!(native, mapped);
        assert_eq!(
            native,
            Some(TreeHit {
                data_offset: 0,
                prefix_len: 1
            })
        );
    }

    #[test]
    fn test_dead_end_returns_no_match() {
        let mut data = vec![0u8; 6 + DATA_SECTION_SEPARATOR];
        data[2] = 17;
        data[5] = 1;

        let layout = layout(1, RecordSize::Bits24, IpVersion::V4);
        let tree = SearchTree::new(&data, &layout);

        // Leading bit 1 hits the sentinel
        let result = tree.lookup("128.0.0.1".parse().unwrap()).unwrap();
        assert_eq!(result, None);
    }
}
