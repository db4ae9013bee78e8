//! Data section encoding and decoding
//!
//! Implements the MaxMind DB data type encoding used for record storage:
//! a control byte names the type and payload size, followed by the payload.
//! Values are self-describing and may nest (maps, arrays) or reference
//! earlier offsets (pointers), which enables deduplicated storage.
//!
//! # Supported Types
//!
//! - **Pointer**: Reference to another data item, resolved transparently
//! - **String**: UTF-8 text data
//! - **Double**: 64-bit floating point (IEEE 754)
//! - **Bytes**: Raw byte arrays
//! - **Uint16 / Uint32 / Uint64 / Uint128**: Unsigned integers
//! - **Int32**: Signed 32-bit integers
//! - **Map**: Key-value pairs (string keys)
//! - **Array**: Ordered lists of values
//! - **Bool**: Boolean values
//! - **Float**: 32-bit floating point (IEEE 754)
//!
//! # Format
//!
//! Control byte: type in the high 3 bits, size in the low 5 bits. Sizes
//! 29-31 escape to extra length bytes. Type 0 escapes to an extended type
//! byte (actual type minus 7) placed before the length bytes. Integers are
//! stored big-endian with leading zero bytes elided.
//!
//! See: https://maxmind.github.io/MaxMind-DB/

use std::collections::HashMap;

/// Maximum pointer-chase depth before a chain is declared corrupt.
///
/// A well-formed database only ever needs one hop (pointers reference
/// previously written values, which are stored inline). The guard exists so
/// that adversarial input cannot send the decoder into a loop.
pub const MAX_POINTER_DEPTH: usize = 16;

/// Maximum container nesting depth, bounding stack usage on hostile input
pub const MAX_NESTING_DEPTH: usize = 512;

/// Data value that can be stored in the data section
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    /// Pointer to another data item (offset into the data section).
    /// Only meaningful when encoding; the decoder resolves pointers and
    /// returns the referenced value instead.
    Pointer(u32),
    /// UTF-8 string
    String(String),
    /// IEEE 754 double precision float
    Double(f64),
    /// Raw byte array
    Bytes(Vec<u8>),
    /// Unsigned 16-bit integer
    Uint16(u16),
    /// Unsigned 32-bit integer
    Uint32(u32),
    /// Key-value map (string keys only)
    Map(HashMap<String, DataValue>),
    /// Signed 32-bit integer
    Int32(i32),
    /// Unsigned 64-bit integer
    Uint64(u64),
    /// Unsigned 128-bit integer
    Uint128(u128),
    /// Array of values
    Array(Vec<DataValue>),
    /// Boolean value
    Bool(bool),
    /// IEEE 754 single precision float
    Float(f32),
}

// Wire type numbers
const TYPE_POINTER: u8 = 1;
const TYPE_STRING: u8 = 2;
const TYPE_DOUBLE: u8 = 3;
const TYPE_BYTES: u8 = 4;
const TYPE_UINT16: u8 = 5;
const TYPE_UINT32: u8 = 6;
const TYPE_MAP: u8 = 7;
const TYPE_INT32: u8 = 8;
const TYPE_UINT64: u8 = 9;
const TYPE_UINT128: u8 = 10;
const TYPE_ARRAY: u8 = 11;
const TYPE_BOOL: u8 = 14;
const TYPE_FLOAT: u8 = 15;

/// Data section encoder
///
/// Builds a data section by encoding values and tracking offsets.
/// Identical values get the same offset, so repeated records cost nothing.
pub struct DataEncoder {
    buffer: Vec<u8>,
    /// Map from serialized value to offset (for deduplication)
    dedup_map: HashMap<Vec<u8>, u32>,
}

impl DataEncoder {
    /// Create a new encoder
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            dedup_map: HashMap::new(),
        }
    }

    /// Encode a value and return its offset
    ///
    /// If the value was previously encoded, returns the existing offset.
    pub fn encode(&mut self, value: &DataValue) -> u32 {
        let mut temp = Vec::new();
        Self::encode_to_buffer(value, &mut temp);

        if let Some(&offset) = self.dedup_map.get(&temp) {
            return offset;
        }

        let offset = self.buffer.len() as u32;
        self.buffer.extend_from_slice(&temp);
        self.dedup_map.insert(temp, offset);
        offset
    }

    /// Get the final encoded data section
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get current buffer size
    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    fn encode_to_buffer(value: &DataValue, buffer: &mut Vec<u8>) {
        match value {
            DataValue::Pointer(offset) => Self::encode_pointer(*offset, buffer),
            DataValue::String(s) => Self::encode_string(s, buffer),
            DataValue::Double(d) => {
                Self::encode_ctrl(TYPE_DOUBLE, 8, buffer);
                buffer.extend_from_slice(&d.to_be_bytes());
            }
            DataValue::Bytes(b) => {
                Self::encode_ctrl(TYPE_BYTES, b.len(), buffer);
                buffer.extend_from_slice(b);
            }
            DataValue::Uint16(n) => {
                Self::encode_ctrl(TYPE_UINT16, 2, buffer);
                buffer.extend_from_slice(&n.to_be_bytes());
            }
            DataValue::Uint32(n) => {
                Self::encode_ctrl(TYPE_UINT32, 4, buffer);
                buffer.extend_from_slice(&n.to_be_bytes());
            }
            DataValue::Map(m) => {
                Self::encode_ctrl(TYPE_MAP, m.len(), buffer);
                // Sorted by key for deterministic output
                let mut pairs: Vec<_> = m.iter().collect();
                pairs.sort_by_key(|(k, _)| *k);
                for (key, value) in pairs {
                    Self::encode_string(key, buffer);
                    Self::encode_to_buffer(value, buffer);
                }
            }
            DataValue::Int32(n) => {
                Self::encode_ctrl(TYPE_INT32, 4, buffer);
                buffer.extend_from_slice(&n.to_be_bytes());
            }
            DataValue::Uint64(n) => {
                Self::encode_ctrl(TYPE_UINT64, 8, buffer);
                buffer.extend_from_slice(&n.to_be_bytes());
            }
            DataValue::Uint128(n) => {
                Self::encode_ctrl(TYPE_UINT128, 16, buffer);
                buffer.extend_from_slice(&n.to_be_bytes());
            }
            DataValue::Array(a) => {
                Self::encode_ctrl(TYPE_ARRAY, a.len(), buffer);
                for value in a {
                    Self::encode_to_buffer(value, buffer);
                }
            }
            // Bool stores its value in the size field, no payload
            DataValue::Bool(b) => Self::encode_ctrl(TYPE_BOOL, *b as usize, buffer),
            DataValue::Float(f) => {
                Self::encode_ctrl(TYPE_FLOAT, 4, buffer);
                buffer.extend_from_slice(&f.to_be_bytes());
            }
        }
    }

    fn encode_string(s: &str, buffer: &mut Vec<u8>) {
        let bytes = s.as_bytes();
        Self::encode_ctrl(TYPE_STRING, bytes.len(), buffer);
        buffer.extend_from_slice(bytes);
    }

    fn encode_pointer(offset: u32, buffer: &mut Vec<u8>) {
        // Pointer control byte: type 1, size class in bits 3-4, value high
        // bits in bits 0-2. Larger classes bias by the previous class's range.
        if offset < 0x800 {
            buffer.push(0x20 | ((offset >> 8) & 0x7) as u8);
            buffer.push((offset & 0xFF) as u8);
        } else if offset < 0x80800 {
            let adjusted = offset - 0x800;
            buffer.push(0x20 | (1 << 3) | ((adjusted >> 16) & 0x7) as u8);
            buffer.push(((adjusted >> 8) & 0xFF) as u8);
            buffer.push((adjusted & 0xFF) as u8);
        } else if offset < 0x8080800 {
            let adjusted = offset - 0x80800;
            buffer.push(0x20 | (2 << 3) | ((adjusted >> 24) & 0x7) as u8);
            buffer.push(((adjusted >> 16) & 0xFF) as u8);
            buffer.push(((adjusted >> 8) & 0xFF) as u8);
            buffer.push((adjusted & 0xFF) as u8);
        } else {
            buffer.push(0x20 | (3 << 3));
            buffer.extend_from_slice(&offset.to_be_bytes());
        }
    }

    /// Write the control byte (and extended-type / length bytes) for a value
    ///
    /// Layout: control byte, extended type byte if type >= 8, then any
    /// extra length bytes for sizes >= 29.
    fn encode_ctrl(type_id: u8, size: usize, buffer: &mut Vec<u8>) {
        let type_bits = if type_id < 8 { type_id << 5 } else { 0 };

        let size_marker = if size < 29 {
            size as u8
        } else if size < 29 + 256 {
            29
        } else if size < 29 + 256 + 65536 {
            30
        } else {
            31
        };
        buffer.push(type_bits | size_marker);

        if type_id >= 8 {
            buffer.push(type_id - 7);
        }

        match size_marker {
            29 => buffer.push((size - 29) as u8),
            30 => buffer.extend_from_slice(&((size - 29 - 256) as u16).to_be_bytes()),
            31 => {
                let adjusted = (size - 29 - 256 - 65536) as u32;
                buffer.extend_from_slice(&adjusted.to_be_bytes()[1..]); // 3 bytes
            }
            _ => {}
        }
    }
}

impl Default for DataEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Data section decoder
///
/// Decodes values from an encoded data section buffer. Pointers are chased
/// (with a bounded depth) and resolved to the value they reference, so
/// callers never see `DataValue::Pointer`. All reads are bounds-checked
/// against the buffer, which the caller slices to the data section.
pub struct DataDecoder<'a> {
    buffer: &'a [u8],
}

impl<'a> DataDecoder<'a> {
    /// Create a decoder over a data section buffer
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer }
    }

    /// Decode the value at the given offset
    pub fn decode(&self, offset: u32) -> Result<DataValue, &'static str> {
        let mut cursor = offset as usize;
        self.decode_at(&mut cursor, 0, 0)
    }

    /// Decode one value. `depth` counts container nesting, `chase` counts
    /// consecutive pointer hops; both are bounded to guarantee termination.
    fn decode_at(
        &self,
        cursor: &mut usize,
        depth: usize,
        chase: usize,
    ) -> Result<DataValue, &'static str> {
        if depth > MAX_NESTING_DEPTH {
            return Err("Container nesting too deep");
        }
        if *cursor >= self.buffer.len() {
            return Err("Cursor out of bounds");
        }

        let ctrl = self.buffer[*cursor];
        *cursor += 1;

        let type_id = ctrl >> 5;
        if type_id == TYPE_POINTER {
            return self.decode_pointer(cursor, ctrl & 0x1F, depth, chase);
        }

        let type_id = if type_id == 0 {
            // Extended type: actual type is in the next byte, offset by 7
            if *cursor >= self.buffer.len() {
                return Err("Extended type truncated");
            }
            let ext = self.buffer[*cursor];
            *cursor += 1;
            ext.checked_add(7).ok_or("Invalid extended type")?
        } else {
            type_id
        };

        let size = self.decode_size(cursor, ctrl & 0x1F)?;

        match type_id {
            TYPE_STRING => {
                let bytes = self.take(cursor, size)?;
                let s = std::str::from_utf8(bytes).map_err(|_| "Invalid UTF-8")?;
                Ok(DataValue::String(s.to_string()))
            }
            TYPE_DOUBLE => {
                if size != 8 {
                    return Err("Double must be 8 bytes");
                }
                let bytes = self.take(cursor, 8)?;
                Ok(DataValue::Double(f64::from_be_bytes(
                    bytes.try_into().map_err(|_| "Double truncated")?,
                )))
            }
            TYPE_BYTES => Ok(DataValue::Bytes(self.take(cursor, size)?.to_vec())),
            TYPE_UINT16 => {
                if size > 2 {
                    return Err("Uint16 payload too long");
                }
                Ok(DataValue::Uint16(self.read_uint(cursor, size)? as u16))
            }
            TYPE_UINT32 => {
                if size > 4 {
                    return Err("Uint32 payload too long");
                }
                Ok(DataValue::Uint32(self.read_uint(cursor, size)? as u32))
            }
            TYPE_MAP => {
                let mut map = HashMap::with_capacity(size.min(64));
                for _ in 0..size {
                    let key = match self.decode_at(cursor, depth + 1, 0)? {
                        DataValue::String(s) => s,
                        _ => return Err("Map key must be string"),
                    };
                    let value = self.decode_at(cursor, depth + 1, 0)?;
                    map.insert(key, value);
                }
                Ok(DataValue::Map(map))
            }
            TYPE_INT32 => {
                if size > 4 {
                    return Err("Int32 payload too long");
                }
                Ok(DataValue::Int32(self.read_uint(cursor, size)? as u32 as i32))
            }
            TYPE_UINT64 => {
                if size > 8 {
                    return Err("Uint64 payload too long");
                }
                Ok(DataValue::Uint64(self.read_uint(cursor, size)?))
            }
            TYPE_UINT128 => {
                if size > 16 {
                    return Err("Uint128 payload too long");
                }
                let mut value: u128 = 0;
                for &byte in self.take(cursor, size)? {
                    value = (value << 8) | byte as u128;
                }
                Ok(DataValue::Uint128(value))
            }
            TYPE_ARRAY => {
                let mut array = Vec::with_capacity(size.min(64));
                for _ in 0..size {
                    array.push(self.decode_at(cursor, depth + 1, 0)?);
                }
                Ok(DataValue::Array(array))
            }
            // Bool has no payload; the size field holds the value
            TYPE_BOOL => match size {
                0 => Ok(DataValue::Bool(false)),
                1 => Ok(DataValue::Bool(true)),
                _ => Err("Invalid boolean size"),
            },
            TYPE_FLOAT => {
                if size != 4 {
                    return Err("Float must be 4 bytes");
                }
                let bytes = self.take(cursor, 4)?;
                Ok(DataValue::Float(f32::from_be_bytes(
                    bytes.try_into().map_err(|_| "Float truncated")?,
                )))
            }
            _ => Err("Unsupported data type"),
        }
    }

    /// Resolve a pointer record by decoding at its target offset
    fn decode_pointer(
        &self,
        cursor: &mut usize,
        payload: u8,
        depth: usize,
        chase: usize,
    ) -> Result<DataValue, &'static str> {
        if chase >= MAX_POINTER_DEPTH {
            return Err("Pointer chain too deep");
        }

        let size_class = (payload >> 3) & 0x3;
        let high_bits = (payload & 0x7) as u32;
        let offset = match size_class {
            0 => {
                let b = self.take(cursor, 1)?;
                (high_bits << 8) | b[0] as u32
            }
            1 => {
                let b = self.take(cursor, 2)?;
                0x800 + ((high_bits << 16) | (b[0] as u32) << 8 | b[1] as u32)
            }
            2 => {
                let b = self.take(cursor, 3)?;
                0x80800
                    + ((high_bits << 24) | (b[0] as u32) << 16 | (b[1] as u32) << 8 | b[2] as u32)
            }
            _ => {
                let b = self.take(cursor, 4)?;
                u32::from_be_bytes(b.try_into().map_err(|_| "Pointer truncated")?)
            }
        };

        if offset as usize >= self.buffer.len() {
            return Err("Pointer target out of bounds");
        }

        let mut target = offset as usize;
        self.decode_at(&mut target, depth, chase + 1)
    }

    /// Consume `len` bytes, bounds-checked
    fn take(&self, cursor: &mut usize, len: usize) -> Result<&'a [u8], &'static str> {
        let end = cursor.checked_add(len).ok_or("Length overflow")?;
        if end > self.buffer.len() {
            return Err("Payload out of bounds");
        }
        let slice = &self.buffer[*cursor..end];
        *cursor = end;
        Ok(slice)
    }

    /// Read a big-endian unsigned integer of `len` bytes (leading zeros elided)
    fn read_uint(&self, cursor: &mut usize, len: usize) -> Result<u64, &'static str> {
        let mut value: u64 = 0;
        for &byte in self.take(cursor, len)? {
            value = (value << 8) | byte as u64;
        }
        Ok(value)
    }

    fn decode_size(&self, cursor: &mut usize, size_bits: u8) -> Result<usize, &'static str> {
        match size_bits {
            0..=28 => Ok(size_bits as usize),
            29 => {
                let b = self.take(cursor, 1)?;
                Ok(29 + b[0] as usize)
            }
            30 => {
                let b = self.take(cursor, 2)?;
                Ok(29 + 256 + ((b[0] as usize) << 8 | b[1] as usize))
            }
            31 => {
                let b = self.take(cursor, 3)?;
                Ok(29 + 256 + 65536 + ((b[0] as usize) << 16 | (b[1] as usize) << 8 | b[2] as usize))
            }
            _ => Err("Invalid size encoding"),
        }
    }
}
