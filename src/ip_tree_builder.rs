//! Search tree builder
//!
//! Builds the binary trie section of a database. Prefixes are inserted as
//! (address, prefix length, data offset) triples; on serialization each
//! node's two slots become records encoding a child node index, a terminal
//! data offset, or the "not found" sentinel.
//!
//! Longest-prefix-match is preserved regardless of insertion order: a more
//! specific prefix inserted after a broader one splits the broader leaf,
//! and a broader prefix inserted later only fills slots the more specific
//! entries left empty.

use crate::error::{GeoLiteError, Result};
use crate::mmdb::{RecordSize, DATA_SECTION_SEPARATOR};
use std::net::IpAddr;

/// One of a node's two child slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    /// Nothing below this edge (serializes to the sentinel)
    Empty,
    /// Edge continues to another node
    Node(u32),
    /// Terminal edge. The prefix length is only used while building, to
    /// arbitrate between overlapping prefixes; it is not serialized.
    Leaf { offset: u32, prefix: u8 },
}

#[derive(Debug, Clone)]
struct Node {
    slots: [Slot; 2],
}

impl Node {
    fn empty() -> Self {
        Self {
            slots: [Slot::Empty, Slot::Empty],
        }
    }
}

/// Tree depth in bits, set by the database's IP version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeDepth {
    /// 32-bit tree (IPv4 only)
    V4,
    /// 128-bit tree (IPv6, IPv4 entries land in the mapped prefix)
    V6,
}

/// Arena-allocated trie builder
pub struct IpTreeBuilder {
    record_size: RecordSize,
    depth: TreeDepth,
    nodes: Vec<Node>,
}

impl IpTreeBuilder {
    /// Create a builder for an IPv4-only tree
    pub fn new_v4(record_size: RecordSize) -> Self {
        Self::new(record_size, TreeDepth::V4)
    }

    /// Create a builder for an IPv6 tree (accepts IPv4 entries too)
    pub fn new_v6(record_size: RecordSize) -> Self {
        Self::new(record_size, TreeDepth::V6)
    }

    fn new(record_size: RecordSize, depth: TreeDepth) -> Self {
        Self {
            record_size,
            depth,
            nodes: vec![Node::empty()],
        }
    }

    /// Insert a prefix with its data-section offset
    pub fn insert(&mut self, addr: IpAddr, prefix_len: u8, data_offset: u32) -> Result<()> {
        let (bits, prefix_len) = match (addr, self.depth) {
            (IpAddr::V4(v4), TreeDepth::V4) => {
                if prefix_len > 32 {
                    return Err(GeoLiteError::InvalidEntry(format!(
                        "IPv4 prefix length {} exceeds 32",
                        prefix_len
                    )));
                }
                ((u32::from(v4) as u128) << 96, prefix_len)
            }
            (IpAddr::V4(v4), TreeDepth::V6) => {
                if prefix_len > 32 {
                    return Err(GeoLiteError::InvalidEntry(format!(
                        "IPv4 prefix length {} exceeds 32",
                        prefix_len
                    )));
                }
                // v4 entries sit below 96 leading zero bits, where readers
                // expect the IPv4-mapped space to begin
                (u32::from(v4) as u128, 96 + prefix_len)
            }
            (IpAddr::V6(_), TreeDepth::V4) => {
                return Err(GeoLiteError::InvalidEntry(
                    "Cannot insert IPv6 address into IPv4-only tree".to_string(),
                ));
            }
            (IpAddr::V6(v6), TreeDepth::V6) => {
                if prefix_len > 128 {
                    return Err(GeoLiteError::InvalidEntry(format!(
                        "IPv6 prefix length {} exceeds 128",
                        prefix_len
                    )));
                }
                (u128::from(v6), prefix_len)
            }
        };

        self.insert_bits(bits, prefix_len, data_offset);
        Ok(())
    }

    /// `bits` is aligned so the bit consumed at depth d is bit `127 - d`;
    /// the v4-in-v6 prelude is the 96 leading zeros
    fn insert_bits(&mut self, bits: u128, prefix_len: u8, data_offset: u32) {
        let mut node_id = 0u32;

        for depth in 0..prefix_len {
            let bit = ((bits >> (127 - depth as u32)) & 1) as usize;
            let slot = self.nodes[node_id as usize].slots[bit];

            if depth + 1 == prefix_len {
                match slot {
                    Slot::Empty => {
                        self.nodes[node_id as usize].slots[bit] = Slot::Leaf {
                            offset: data_offset,
                            prefix: prefix_len,
                        };
                    }
                    Slot::Leaf { prefix, .. } => {
                        // Equal depth: later insert wins over an equal or
                        // broader prefix, a narrower one is kept
                        if prefix_len >= prefix {
                            self.nodes[node_id as usize].slots[bit] = Slot::Leaf {
                                offset: data_offset,
                                prefix: prefix_len,
                            };
                        }
                    }
                    Slot::Node(child) => {
                        // More specific prefixes already live below; fill
                        // only the gaps they left
                        self.backfill(child, data_offset, prefix_len);
                    }
                }
                return;
            }

            match slot {
                Slot::Empty => {
                    let child = self.alloc();
                    self.nodes[node_id as usize].slots[bit] = Slot::Node(child);
                    node_id = child;
                }
                Slot::Node(child) => node_id = child,
                Slot::Leaf { offset, prefix } => {
                    // A broader prefix terminates here; push it one level
                    // down on both sides, then keep descending
                    let child = self.alloc();
                    self.nodes[child as usize].slots = [
                        Slot::Leaf { offset, prefix },
                        Slot::Leaf { offset, prefix },
                    ];
                    self.nodes[node_id as usize].slots[bit] = Slot::Node(child);
                    node_id = child;
                }
            }
        }
    }

    fn alloc(&mut self) -> u32 {
        let id = self.nodes.len() as u32;
        self.nodes.push(Node::empty());
        id
    }

    /// Fill every empty or broader slot in a subtree with `data_offset`,
    /// leaving more specific entries untouched
    fn backfill(&mut self, node_id: u32, data_offset: u32, prefix_len: u8) {
        for side in 0..2 {
            match self.nodes[node_id as usize].slots[side] {
                Slot::Empty => {
                    self.nodes[node_id as usize].slots[side] = Slot::Leaf {
                        offset: data_offset,
                        prefix: prefix_len,
                    };
                }
                Slot::Leaf { prefix, .. } => {
                    if prefix_len > prefix {
                        self.nodes[node_id as usize].slots[side] = Slot::Leaf {
                            offset: data_offset,
                            prefix: prefix_len,
                        };
                    }
                }
                Slot::Node(child) => self.backfill(child, data_offset, prefix_len),
            }
        }
    }

    /// Serialize the tree. Returns `(tree_bytes, node_count)`.
    pub fn build(&self) -> Result<(Vec<u8>, u32)> {
        let node_count = self.nodes.len() as u32;
        let node_bytes = self.record_size.node_bytes();
        let mut tree = vec![0u8; node_count as usize * node_bytes];

        for (node_id, node) in self.nodes.iter().enumerate() {
            let left = self.record_value(node.slots[0], node_count)?;
            let right = self.record_value(node.slots[1], node_count)?;
            let out = &mut tree[node_id * node_bytes..(node_id + 1) * node_bytes];

            match self.record_size {
                RecordSize::Bits24 => {
                    out[0..3].copy_from_slice(&left.to_be_bytes()[1..]);
                    out[3..6].copy_from_slice(&right.to_be_bytes()[1..]);
                }
                RecordSize::Bits28 => {
                    out[0..3].copy_from_slice(&left.to_be_bytes()[1..]);
                    out[3] = (((left >> 24) & 0x0F) << 4) as u8 | ((right >> 24) & 0x0F) as u8;
                    out[4..7].copy_from_slice(&right.to_be_bytes()[1..]);
                }
                RecordSize::Bits32 => {
                    out[0..4].copy_from_slice(&left.to_be_bytes());
                    out[4..8].copy_from_slice(&right.to_be_bytes());
                }
            }
        }

        Ok((tree, node_count))
    }

    fn record_value(&self, slot: Slot, node_count: u32) -> Result<u32> {
        match slot {
            Slot::Empty => Ok(node_count),
            Slot::Node(id) => {
                debug_assert!(id < node_count);
                Ok(id)
            }
            Slot::Leaf { offset, .. } => node_count
                .checked_add(DATA_SECTION_SEPARATOR as u32)
                .and_then(|base| base.checked_add(offset))
                .ok_or_else(|| {
                    GeoLiteError::InvalidEntry(format!(
                        "Data offset {} overflows the record width",
                        offset
                    ))
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_empty_tree_is_single_node() {
        let builder = IpTreeBuilder::new_v4(RecordSize::Bits24);
        let (bytes, node_count) = builder.build().unwrap();
        assert_eq!(node_count, 1);
        assert_eq!(bytes.len(), 6);
        // Both slots are the sentinel (node_count = 1)
        assert_eq!(&bytes, &[0, 0, 1, 0, 0, 1]);
    }

    #[test]
    fn test_insert_host_route() {
        let mut builder = IpTreeBuilder::new_v4(RecordSize::Bits24);
        builder
            .insert(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)), 32, 100)
            .unwrap();

        let (bytes, node_count) = builder.build().unwrap();
        assert_eq!(node_count, 32); // one node per bit of the prefix
        assert_eq!(bytes.len(), 32 * 6);
    }

    #[test]
    fn test_insert_cidr() {
        let mut builder = IpTreeBuilder::new_v4(RecordSize::Bits24);
        builder
            .insert(IpAddr::V4(Ipv4Addr::new(192, 168, 0, 0)), 16, 200)
            .unwrap();

        let (bytes, node_count) = builder.build().unwrap();
        assert_eq!(node_count, 16);
        assert_eq!(bytes.len(), 16 * 6);
    }

    #[test]
    fn test_insert_multiple_prefixes() {
        let mut builder = IpTreeBuilder::new_v4(RecordSize::Bits24);
        builder
            .insert(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 0)), 24, 100)
            .unwrap();
        builder
            .insert(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 0)), 8, 200)
            .unwrap();
        builder
            .insert(IpAddr::V4(Ipv4Addr::new(172, 16, 0, 0)), 12, 300)
            .unwrap();

        let (bytes, node_count) = builder.build().unwrap();
        assert!(node_count > 24);
        assert_eq!(bytes.len(), node_count as usize * 6);
    }

    #[test]
    fn test_insert_ipv6() {
        let mut builder = IpTreeBuilder::new_v6(RecordSize::Bits24);
        builder
            .insert(
                IpAddr::V6(Ipv6Addr::new(0x2001, 0x0db8, 0, 0, 0, 0, 0, 0)),
                64,
                100,
            )
            .unwrap();

        let (_, node_count) = builder.build().unwrap();
        assert_eq!(node_count, 64);
    }

    #[test]
    fn test_prefix_too_long_rejected() {
        let mut builder = IpTreeBuilder::new_v4(RecordSize::Bits24);
        let result = builder.insert(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)), 33, 100);
        assert!(matches!(result, Err(GeoLiteError::InvalidEntry(_))));
    }

    #[test]
    fn test_ipv6_into_v4_tree_rejected() {
        let mut builder = IpTreeBuilder::new_v4(RecordSize::Bits24);
        let result = builder.insert(IpAddr::V6(Ipv6Addr::LOCALHOST), 128, 100);
        assert!(matches!(result, Err(GeoLiteError::InvalidEntry(_))));
    }
}
