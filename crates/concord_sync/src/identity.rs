//! # Entity Identity Resolver
//!
//! Derives a key that every peer computes identically for the same entity.
//!
//! ```text
//! native id ─┐
//! name ──────┼──> "{id}_{name}_{x}_{y}_{z}"     (x, y, z rounded to integers)
//! position ──┘
//! ```
//!
//! Rounding collapses floating-point jitter between peers; two distinct
//! entities colliding would need the same id and name within one unit.

use std::fmt;

use concord_protocol::Vector3d;

/// Separator between identity components.
pub const ID_DELIMITER: char = '_';

/// Cross-peer stable entity key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(String);

impl EntityId {
    /// Wraps an id received from the wire.
    #[must_use]
    pub fn from_wire(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity-bearing attributes of an entity as read from the host.
///
/// Any attribute the host could not read is `None`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntityAttributes {
    /// Engine-assigned identifier.
    pub native_id: Option<String>,
    /// Human-readable name.
    pub name: Option<String>,
    /// World position.
    pub position: Option<Vector3d>,
}

impl EntityAttributes {
    /// Creates a fully populated attribute set.
    #[must_use]
    pub fn new(native_id: impl Into<String>, name: impl Into<String>, position: Vector3d) -> Self {
        Self {
            native_id: Some(native_id.into()),
            name: Some(name.into()),
            position: Some(position),
        }
    }

    /// Resolves the cross-peer key; see [`resolve`].
    #[must_use]
    pub fn resolve(&self) -> Option<EntityId> {
        resolve(self)
    }
}

/// Resolves the cross-peer key for an entity.
///
/// Returns `None` if any attribute is missing or empty, or the position is
/// not finite. Callers skip the entity for this cycle.
#[must_use]
pub fn resolve(attributes: &EntityAttributes) -> Option<EntityId> {
    let native_id = attributes.native_id.as_deref().filter(|s| !s.is_empty())?;
    let name = attributes.name.as_deref().filter(|s| !s.is_empty())?;
    let position = attributes.position.filter(Vector3d::is_finite)?;

    let d = ID_DELIMITER;
    Some(EntityId(format!(
        "{native_id}{d}{name}{d}{}{d}{}{d}{}",
        grid(position.x),
        grid(position.y),
        grid(position.z),
    )))
}

/// Rounds to the nearest integer unit, half away from zero.
#[allow(clippy::cast_possible_truncation)]
fn grid(coordinate: f64) -> i64 {
    // Saturating cast; -0.0 becomes 0.
    coordinate.round() as i64
}
