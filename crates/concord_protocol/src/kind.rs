//! # Message Kinds
//!
//! Every synced state kind owns exactly one tag byte, one transport channel
//! and one delivery class.
//!
//! ```text
//! ┌──────┬──────────────────┬──────────────────────┬────────────────────────┐
//! │ Tag  │ Kind             │ Channel              │ Delivery               │
//! ├──────┼──────────────────┼──────────────────────┼────────────────────────┤
//! │ 0    │ StructureDamage  │ concord.structure    │ reliable, high prio    │
//! │ 1    │ VesselDamage     │ concord.part_damage  │ reliable, high prio    │
//! │ 2    │ WeaponFire       │ concord.weapon       │ best-effort            │
//! │ 3    │ Explosion        │ concord.explosion    │ reliable, high prio    │
//! └──────┴──────────────────┴──────────────────────┴────────────────────────┘
//! ```

use std::fmt;

/// Kind tag written as the first byte of every message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    /// Destructible structure damage fraction.
    StructureDamage = 0,
    /// Damage to a single part of a vessel.
    VesselDamage = 1,
    /// Weapon firing state (cosmetic).
    WeaponFire = 2,
    /// Explosion at a world position.
    Explosion = 3,
}

impl MessageKind {
    /// All kinds, in tag order.
    pub const ALL: [Self; 4] = [
        Self::StructureDamage,
        Self::VesselDamage,
        Self::WeaponFire,
        Self::Explosion,
    ];

    /// Returns the tag byte.
    #[inline]
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Maps a tag byte back to its kind.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::StructureDamage),
            1 => Some(Self::VesselDamage),
            2 => Some(Self::WeaponFire),
            3 => Some(Self::Explosion),
            _ => None,
        }
    }

    /// Transport channel name carrying this kind.
    #[must_use]
    pub const fn channel(self) -> &'static str {
        match self {
            Self::StructureDamage => "concord.structure",
            Self::VesselDamage => "concord.part_damage",
            Self::WeaponFire => "concord.weapon",
            Self::Explosion => "concord.explosion",
        }
    }

    /// Maps a channel name back to its kind.
    #[must_use]
    pub fn from_channel(channel: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.channel() == channel)
    }

    /// Delivery class requested from the transport.
    #[must_use]
    pub const fn delivery(self) -> Delivery {
        match self {
            Self::WeaponFire => Delivery::BEST_EFFORT,
            Self::StructureDamage | Self::VesselDamage | Self::Explosion => Delivery::CRITICAL,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StructureDamage => "StructureDamage",
            Self::VesselDamage => "VesselDamage",
            Self::WeaponFire => "WeaponFire",
            Self::Explosion => "Explosion",
        };
        f.write_str(name)
    }
}

/// Delivery-priority class handed to the transport with every payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Delivery {
    /// Must eventually arrive.
    pub reliable: bool,
    /// Should jump the transport's send queue.
    pub high_priority: bool,
}

impl Delivery {
    /// Damage and structural events.
    pub const CRITICAL: Self = Self {
        reliable: true,
        high_priority: true,
    };

    /// Cosmetic state where staleness is acceptable.
    pub const BEST_EFFORT: Self = Self {
        reliable: false,
        high_priority: false,
    };
}
