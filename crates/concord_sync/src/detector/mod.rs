//! # Change Detectors
//!
//! One detector per synced kind. Each runs the same cycle on its own period:
//!
//! ```text
//!          timer fires            per entity
//! ┌──────┐ ──────────> ┌──────────┐ ─────────> ┌───────────┐
//! │ Idle │             │ Sampling │            │ Unchanged │ ──┐
//! └──────┘ <────────── └──────────┘ ─────────> ├───────────┤   │
//!     ^                                        │ Changed   │ ──┤ (emit DeltaRecord)
//!     └────────────────────────────────────────┴───────────┴───┘
//! ```
//!
//! | Kind            | Period        | Threshold            |
//! |-----------------|---------------|----------------------|
//! | Structure       | 1.0s          | damage fraction 0.01 |
//! | Part damage     | every tick    | damage 0.1           |
//! | Weapon firing   | 0.2s          | boolean flip         |
//!
//! The apply-path writes remote values straight into the host (no threshold)
//! and records them as tracked, so the next local sample does not echo them.

mod part;
mod structure;
mod weapon;

pub use part::PartDamageDetector;
pub use structure::StructureDetector;
pub use weapon::WeaponDetector;

use crate::tracked::Observation;

/// Counters from one sampling pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SampleReport {
    /// Entities enumerated by the host.
    pub sampled: usize,
    /// Entities skipped (host fault, unresolvable identity, bad value).
    pub skipped: usize,
    /// Entities seen for the first time.
    pub baselined: usize,
    /// Entities whose change was emitted as a delta.
    pub changed: usize,
}

impl SampleReport {
    /// Counts one observation; returns true if it should be broadcast.
    fn tally<V>(&mut self, observation: &Observation<V>) -> bool {
        match observation {
            Observation::Baseline => {
                self.baselined += 1;
                false
            }
            Observation::Unchanged => false,
            Observation::Changed { .. } => {
                self.changed += 1;
                true
            }
        }
    }

    /// Adds another pass's counters.
    pub fn merge(&mut self, other: &Self) {
        self.sampled += other.sampled;
        self.skipped += other.skipped;
        self.baselined += other.baselined;
        self.changed += other.changed;
    }
}

/// What happened when a remote message was applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Value written to the host and tracked.
    Applied,
    /// Value written and the structure collapsed.
    Collapsed,
    /// Value written and the owning vessel marked for destruction.
    VesselDestroyed,
    /// Target not present on this peer; discarded.
    TargetMissing,
    /// Received value was not a finite number; discarded.
    Rejected,
    /// Host failed the write; discarded.
    HostFault,
}

impl ApplyOutcome {
    /// True if the host state now holds the received value.
    #[must_use]
    pub const fn is_applied(self) -> bool {
        matches!(self, Self::Applied | Self::Collapsed | Self::VesselDestroyed)
    }
}
