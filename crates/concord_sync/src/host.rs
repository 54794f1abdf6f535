//! # Host Simulation Interface
//!
//! The capability interface the host simulation implements once and injects
//! at startup. The sync core never looks inside host entities beyond what
//! these calls return.
//!
//! ```text
//! Host defines:        Sync core calls:
//! ┌────────────────┐   ┌──────────────────────────┐
//! │ impl           │ ← │ sample_*  (read, per tick)│
//! │ SimulationHost │ ← │ set_* / collapse / mark  │
//! └────────────────┘   └──────────────────────────┘
//! ```
//!
//! Every sampled entity comes back as its own `Result`, so one entity that
//! cannot be read is skipped without losing the rest of the pass.

use concord_protocol::{PartId, Vector3d, VesselId};

use crate::error::HostResult;
use crate::identity::EntityAttributes;

/// Host-side handle to a structure, valid for the current scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StructureHandle(pub u64);

/// One destructible structure as seen during a sampling pass.
#[derive(Clone, Debug, PartialEq)]
pub struct StructureSample {
    /// Handle used to write back to this structure.
    pub handle: StructureHandle,
    /// Identity attributes used to derive the cross-peer key.
    pub attributes: EntityAttributes,
    /// Current damage fraction, 0.0 (intact) to 1.0.
    pub damage_fraction: f32,
}

/// Condition of a structure after its damage was written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StructureCondition {
    /// Still standing.
    Intact,
    /// No longer intact; should collapse.
    Destroyed,
}

/// Compound key of one vessel part.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartKey {
    /// Owning vessel.
    pub vessel: VesselId,
    /// Part on that vessel.
    pub part: PartId,
}

impl PartKey {
    /// Creates a part key.
    #[must_use]
    pub const fn new(vessel: VesselId, part: PartId) -> Self {
        Self { vessel, part }
    }
}

/// One vessel part as seen during a sampling pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PartSample {
    /// Which part.
    pub key: PartKey,
    /// Authoritative damage value for the part.
    pub damage: f32,
}

/// Compound key of one weapon.
///
/// The host declares weapons by returning them from
/// [`SimulationHost::sample_weapons`]; `weapon_name` must be the same on
/// every peer that has the vessel loaded.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WeaponKey {
    /// Vessel carrying the weapon.
    pub vessel: VesselId,
    /// Peer-stable weapon name.
    pub weapon_name: String,
}

impl WeaponKey {
    /// Creates a weapon key.
    #[must_use]
    pub fn new(vessel: VesselId, weapon_name: impl Into<String>) -> Self {
        Self {
            vessel,
            weapon_name: weapon_name.into(),
        }
    }
}

/// One weapon as seen during a sampling pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WeaponSample {
    /// Which weapon.
    pub key: WeaponKey,
    /// Whether it is firing right now.
    pub firing: bool,
}

/// Interface to the host simulation.
///
/// All calls happen on the host's tick thread.
pub trait SimulationHost {
    /// Enumerates all live destructible structures.
    fn sample_structures(&self) -> Vec<HostResult<StructureSample>>;

    /// Writes a structure's damage fraction and reports whether it still stands.
    ///
    /// # Errors
    /// [`crate::HostError::StructureNotFound`] if the handle is stale.
    fn set_structure_damage(
        &mut self,
        handle: StructureHandle,
        damage_fraction: f32,
    ) -> HostResult<StructureCondition>;

    /// Collapses a structure that is no longer intact.
    ///
    /// # Errors
    /// [`crate::HostError::StructureNotFound`] if the handle is stale.
    fn collapse_structure(&mut self, handle: StructureHandle) -> HostResult<()>;

    /// Enumerates all parts of all loaded vessels.
    fn sample_parts(&self) -> Vec<HostResult<PartSample>>;

    /// Writes a part's damage value.
    ///
    /// # Errors
    /// [`crate::HostError::VesselNotFound`] or [`crate::HostError::PartNotFound`]
    /// if the part is not on this peer.
    fn set_part_damage(&mut self, key: PartKey, damage: f32, explosive: bool) -> HostResult<()>;

    /// Marks a vessel for destruction.
    ///
    /// # Errors
    /// [`crate::HostError::VesselNotFound`] if the vessel is not loaded.
    fn mark_vessel_for_destruction(&mut self, vessel: VesselId) -> HostResult<()>;

    /// Enumerates all weapons on loaded vessels.
    fn sample_weapons(&self) -> Vec<HostResult<WeaponSample>>;

    /// Sets a weapon's visual firing state.
    ///
    /// # Errors
    /// [`crate::HostError::VesselNotFound`] or [`crate::HostError::WeaponNotFound`]
    /// if the weapon is not on this peer.
    fn set_weapon_firing(&mut self, key: &WeaponKey, firing: bool) -> HostResult<()>;

    /// Plays an explosion effect. Hosts without explosion effects keep the default.
    ///
    /// # Errors
    /// Host-specific.
    fn spawn_explosion(&mut self, _power: f32, _position: Vector3d) -> HostResult<()> {
        Ok(())
    }
}
