//! # Message Serialization
//!
//! Bounded serialization for sync messages.
//!
//! ## Design
//!
//! - Writes into a pre-allocated MTU-sized buffer that is reused per message
//! - Little-endian scalars, 7-bit-group length-prefixed UTF-8 strings
//! - Every write reports overflow instead of growing the buffer
//! - Reads return `None` on truncation instead of panicking

use crate::ids::{PartId, Vector3d, VesselId};
use crate::MAX_MESSAGE_SIZE;

/// Longest string length prefix in bytes (a `u32` in 7-bit groups).
const MAX_VARINT_BYTES: usize = 5;

/// Message serializer - writes fields to a pre-allocated buffer.
///
/// Reuse one serializer across messages to avoid per-message allocations.
pub struct MessageSerializer {
    buffer: [u8; MAX_MESSAGE_SIZE],
    position: usize,
}

impl MessageSerializer {
    /// Creates a new serializer with a fresh buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: [0u8; MAX_MESSAGE_SIZE],
            position: 0,
        }
    }

    /// Resets the serializer for reuse.
    #[inline]
    pub fn reset(&mut self) {
        self.position = 0;
    }

    /// Returns the number of bytes written.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.position
    }

    /// Returns true if no bytes have been written.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.position == 0
    }

    /// Returns a slice of the written data.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[..self.position]
    }

    /// Writes raw bytes.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) -> bool {
        if self.position + bytes.len() > MAX_MESSAGE_SIZE {
            return false;
        }
        self.buffer[self.position..self.position + bytes.len()].copy_from_slice(bytes);
        self.position += bytes.len();
        true
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_u8(&mut self, value: u8) -> bool {
        self.write_bytes(&[value])
    }

    /// Writes a bool as one byte (0 or 1).
    #[inline]
    pub fn write_bool(&mut self, value: bool) -> bool {
        self.write_u8(u8::from(value))
    }

    /// Writes a u32 in little-endian format.
    #[inline]
    pub fn write_u32(&mut self, value: u32) -> bool {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Writes a f32 in little-endian format.
    #[inline]
    pub fn write_f32(&mut self, value: f32) -> bool {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Writes a f64 in little-endian format.
    #[inline]
    pub fn write_f64(&mut self, value: f64) -> bool {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Writes a length in 7-bit groups, low group first.
    pub fn write_varint(&mut self, mut value: u32) -> bool {
        let mut scratch = [0u8; MAX_VARINT_BYTES];
        let mut len = 0;
        loop {
            // Truncation intended: only the low seven bits are kept.
            #[allow(clippy::cast_possible_truncation)]
            let group = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                scratch[len] = group;
                len += 1;
                break;
            }
            scratch[len] = group | 0x80;
            len += 1;
        }
        self.write_bytes(&scratch[..len])
    }

    /// Writes a length-prefixed UTF-8 string. The empty string is a single zero byte.
    pub fn write_string(&mut self, value: &str) -> bool {
        let Ok(len) = u32::try_from(value.len()) else {
            return false;
        };
        self.write_varint(len) && self.write_bytes(value.as_bytes())
    }

    /// Writes a vessel id in GUID byte order.
    #[inline]
    pub fn write_vessel_id(&mut self, id: VesselId) -> bool {
        self.write_bytes(&id.to_wire_bytes())
    }

    /// Writes a part id.
    #[inline]
    pub fn write_part_id(&mut self, id: PartId) -> bool {
        self.write_u32(id.0)
    }

    /// Writes a position as three f64 values.
    #[inline]
    pub fn write_vector3d(&mut self, value: Vector3d) -> bool {
        self.write_f64(value.x) && self.write_f64(value.y) && self.write_f64(value.z)
    }
}

impl Default for MessageSerializer {
    fn default() -> Self {
        Self::new()
    }
}

/// Message deserializer - reads fields from a received payload.
pub struct MessageDeserializer<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> MessageDeserializer<'a> {
    /// Creates a new deserializer from a buffer.
    #[must_use]
    pub const fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, position: 0 }
    }

    /// Returns the number of bytes remaining.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// Reads `len` raw bytes.
    #[inline]
    pub fn read_bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        if len > self.remaining() {
            return None;
        }
        let slice = &self.buffer[self.position..self.position + len];
        self.position += len;
        Some(slice)
    }

    /// Reads a fixed-size array.
    #[inline]
    pub fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        self.read_bytes(N)?.try_into().ok()
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> Option<u8> {
        self.read_array::<1>().map(|[b]| b)
    }

    /// Reads a bool; any non-zero byte is true.
    #[inline]
    pub fn read_bool(&mut self) -> Option<bool> {
        self.read_u8().map(|b| b != 0)
    }

    /// Reads a u32 in little-endian format.
    #[inline]
    pub fn read_u32(&mut self) -> Option<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    /// Reads a f32 in little-endian format.
    #[inline]
    pub fn read_f32(&mut self) -> Option<f32> {
        self.read_array().map(f32::from_le_bytes)
    }

    /// Reads a f64 in little-endian format.
    #[inline]
    pub fn read_f64(&mut self) -> Option<f64> {
        self.read_array().map(f64::from_le_bytes)
    }

    /// Reads a length in 7-bit groups. Prefixes longer than five bytes are rejected.
    pub fn read_varint(&mut self) -> Option<u32> {
        let mut value: u32 = 0;
        for index in 0..MAX_VARINT_BYTES {
            let byte = self.read_u8()?;
            let group = u32::from(byte & 0x7F);
            // The fifth group only has room for four bits.
            if index == MAX_VARINT_BYTES - 1 && group > 0x0F {
                return None;
            }
            value |= group << (7 * index);
            if byte & 0x80 == 0 {
                return Some(value);
            }
        }
        None
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Option<String> {
        let len = usize::try_from(self.read_varint()?).ok()?;
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes).ok().map(str::to_owned)
    }

    /// Reads a vessel id in GUID byte order.
    #[inline]
    pub fn read_vessel_id(&mut self) -> Option<VesselId> {
        self.read_array().map(VesselId::from_wire_bytes)
    }

    /// Reads a part id.
    #[inline]
    pub fn read_part_id(&mut self) -> Option<PartId> {
        self.read_u32().map(PartId)
    }

    /// Reads a position as three f64 values.
    #[inline]
    pub fn read_vector3d(&mut self) -> Option<Vector3d> {
        Some(Vector3d::new(self.read_f64()?, self.read_f64()?, self.read_f64()?))
    }
}
