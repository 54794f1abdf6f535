//! # Wire Identifiers
//!
//! Identifiers that cross the wire unchanged on every peer.

use std::fmt;

use uuid::Uuid;

/// Vessel identifier, shared by every peer that has the vessel loaded.
///
/// Encoded as 16 bytes in the mixed-endian GUID layout (first three groups
/// little-endian), so peers running .NET-style GUIDs agree on the bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VesselId(pub Uuid);

impl VesselId {
    /// Size on the wire.
    pub const SIZE: usize = 16;

    /// The all-zero id.
    pub const NIL: Self = Self(Uuid::nil());

    /// Creates a random id.
    #[must_use]
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Builds an id from its 128-bit value.
    #[must_use]
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    /// Builds an id from its wire bytes.
    #[inline]
    #[must_use]
    pub fn from_wire_bytes(bytes: [u8; Self::SIZE]) -> Self {
        Self(Uuid::from_bytes_le(bytes))
    }

    /// Returns the wire bytes.
    #[inline]
    #[must_use]
    pub fn to_wire_bytes(self) -> [u8; Self::SIZE] {
        self.0.to_bytes_le()
    }
}

impl From<Uuid> for VesselId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for VesselId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Per-vessel part identifier (the part's flight id).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartId(pub u32);

impl fmt::Display for PartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Double-precision world position.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vector3d {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
}

impl Vector3d {
    /// Creates a new position.
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Returns true if every component is finite.
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vessel_id_uses_guid_byte_order() {
        let id = VesselId(Uuid::from_u128(0x0011_2233_4455_6677_8899_aabb_ccdd_eeff));
        let bytes = id.to_wire_bytes();

        // First group little-endian, then 2 + 2 bytes little-endian, rest as-is.
        assert_eq!(&bytes[0..4], &[0x33, 0x22, 0x11, 0x00]);
        assert_eq!(&bytes[4..6], &[0x55, 0x44]);
        assert_eq!(&bytes[6..8], &[0x77, 0x66]);
        assert_eq!(&bytes[8..16], &[0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);

        assert_eq!(VesselId::from_wire_bytes(bytes), id);
    }

    #[test]
    fn test_vector_finiteness() {
        assert!(Vector3d::new(1.0, -2.0, 3.5).is_finite());
        assert!(!Vector3d::new(f64::NAN, 0.0, 0.0).is_finite());
        assert!(!Vector3d::new(0.0, f64::INFINITY, 0.0).is_finite());
    }
}
