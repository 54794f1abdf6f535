//! # Message Definitions
//!
//! One struct per synced kind plus the [`SyncMessage`] envelope enum.
//!
//! ## Layouts
//!
//! ```text
//! StructureDamage: tag │ building_id str │ damage_fraction f32 │ player_name str
//! VesselDamage:    tag │ vessel_id [16]  │ part_id u32 │ damage f32 │ explosive u8 │ player_name str
//! WeaponFire:      tag │ vessel_id [16]  │ weapon_name str │ firing u8 │ player_name str
//! Explosion:       tag │ power f32 │ x f64 │ y f64 │ z f64 │ player_name str
//! ```
//!
//! Fields are read back in write order. A kind-specific decoder that sees a
//! foreign tag returns `None` so the caller just skips the payload.

use crate::error::EncodeError;
use crate::ids::{PartId, Vector3d, VesselId};
use crate::kind::MessageKind;
use crate::serialization::{MessageDeserializer, MessageSerializer};
use crate::MAX_MESSAGE_SIZE;

/// Damage fraction of a destructible structure.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StructureDamage {
    /// Cross-peer structure identity.
    pub building_id: String,
    /// Damage fraction, 0.0 (intact) to 1.0.
    pub damage_fraction: f32,
    /// Origin peer.
    pub player_name: String,
}

/// Damage applied to one part of a vessel.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VesselDamage {
    /// Owning vessel.
    pub vessel_id: VesselId,
    /// Damaged part.
    pub part_id: PartId,
    /// Damage value; the destruction sentinel marks a destroyed part.
    pub damage: f32,
    /// Whether the damage came from an explosion.
    pub explosive: bool,
    /// Origin peer.
    pub player_name: String,
}

/// Weapon firing state (visual only).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WeaponFire {
    /// Vessel carrying the weapon.
    pub vessel_id: VesselId,
    /// Peer-stable weapon name on that vessel.
    pub weapon_name: String,
    /// Current firing state.
    pub firing: bool,
    /// Origin peer.
    pub player_name: String,
}

/// Explosion at a world position.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Explosion {
    /// Explosive power.
    pub power: f32,
    /// World position.
    pub position: Vector3d,
    /// Origin peer.
    pub player_name: String,
}

/// Any message carried by the sync channels.
#[derive(Clone, Debug, PartialEq)]
pub enum SyncMessage {
    /// Structure damage changed.
    StructureDamage(StructureDamage),
    /// Part damage changed.
    VesselDamage(VesselDamage),
    /// Weapon started or stopped firing.
    WeaponFire(WeaponFire),
    /// Something exploded.
    Explosion(Explosion),
}

impl StructureDamage {
    fn write(&self, s: &mut MessageSerializer) -> bool {
        s.write_u8(MessageKind::StructureDamage.tag())
            && s.write_string(&self.building_id)
            && s.write_f32(self.damage_fraction)
            && s.write_string(&self.player_name)
    }

    fn read(d: &mut MessageDeserializer<'_>) -> Option<Self> {
        Some(Self {
            building_id: d.read_string()?,
            damage_fraction: d.read_f32()?,
            player_name: d.read_string()?,
        })
    }

    /// Decodes a structure damage payload; `None` on tag mismatch or truncation.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let mut d = expect_tag(bytes, MessageKind::StructureDamage)?;
        Self::read(&mut d)
    }
}

impl VesselDamage {
    fn write(&self, s: &mut MessageSerializer) -> bool {
        s.write_u8(MessageKind::VesselDamage.tag())
            && s.write_vessel_id(self.vessel_id)
            && s.write_part_id(self.part_id)
            && s.write_f32(self.damage)
            && s.write_bool(self.explosive)
            && s.write_string(&self.player_name)
    }

    fn read(d: &mut MessageDeserializer<'_>) -> Option<Self> {
        Some(Self {
            vessel_id: d.read_vessel_id()?,
            part_id: d.read_part_id()?,
            damage: d.read_f32()?,
            explosive: d.read_bool()?,
            player_name: d.read_string()?,
        })
    }

    /// Decodes a vessel damage payload; `None` on tag mismatch or truncation.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let mut d = expect_tag(bytes, MessageKind::VesselDamage)?;
        Self::read(&mut d)
    }
}

impl WeaponFire {
    fn write(&self, s: &mut MessageSerializer) -> bool {
        s.write_u8(MessageKind::WeaponFire.tag())
            && s.write_vessel_id(self.vessel_id)
            && s.write_string(&self.weapon_name)
            && s.write_bool(self.firing)
            && s.write_string(&self.player_name)
    }

    fn read(d: &mut MessageDeserializer<'_>) -> Option<Self> {
        Some(Self {
            vessel_id: d.read_vessel_id()?,
            weapon_name: d.read_string()?,
            firing: d.read_bool()?,
            player_name: d.read_string()?,
        })
    }

    /// Decodes a weapon fire payload; `None` on tag mismatch or truncation.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let mut d = expect_tag(bytes, MessageKind::WeaponFire)?;
        Self::read(&mut d)
    }
}

impl Explosion {
    fn write(&self, s: &mut MessageSerializer) -> bool {
        s.write_u8(MessageKind::Explosion.tag())
            && s.write_f32(self.power)
            && s.write_vector3d(self.position)
            && s.write_string(&self.player_name)
    }

    fn read(d: &mut MessageDeserializer<'_>) -> Option<Self> {
        Some(Self {
            power: d.read_f32()?,
            position: d.read_vector3d()?,
            player_name: d.read_string()?,
        })
    }

    /// Decodes an explosion payload; `None` on tag mismatch or truncation.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let mut d = expect_tag(bytes, MessageKind::Explosion)?;
        Self::read(&mut d)
    }
}

/// Consumes the tag byte, returning the reader only if it matches `kind`.
fn expect_tag(bytes: &[u8], kind: MessageKind) -> Option<MessageDeserializer<'_>> {
    let mut d = MessageDeserializer::new(bytes);
    (d.read_u8()? == kind.tag()).then_some(d)
}

impl SyncMessage {
    /// Returns the kind of this message.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::StructureDamage(_) => MessageKind::StructureDamage,
            Self::VesselDamage(_) => MessageKind::VesselDamage,
            Self::WeaponFire(_) => MessageKind::WeaponFire,
            Self::Explosion(_) => MessageKind::Explosion,
        }
    }

    /// Origin peer name.
    #[must_use]
    pub fn player_name(&self) -> &str {
        match self {
            Self::StructureDamage(m) => &m.player_name,
            Self::VesselDamage(m) => &m.player_name,
            Self::WeaponFire(m) => &m.player_name,
            Self::Explosion(m) => &m.player_name,
        }
    }

    /// Stamps the origin peer name.
    pub fn set_player_name(&mut self, name: &str) {
        let slot = match self {
            Self::StructureDamage(m) => &mut m.player_name,
            Self::VesselDamage(m) => &mut m.player_name,
            Self::WeaponFire(m) => &mut m.player_name,
            Self::Explosion(m) => &mut m.player_name,
        };
        slot.clear();
        slot.push_str(name);
    }

    /// Serializes into `serializer`, returning the encoded bytes.
    ///
    /// # Errors
    /// Returns [`EncodeError::MessageTooLarge`] if the message does not fit in
    /// [`MAX_MESSAGE_SIZE`] bytes.
    pub fn serialize_into<'s>(
        &self,
        serializer: &'s mut MessageSerializer,
    ) -> Result<&'s [u8], EncodeError> {
        serializer.reset();
        let written = match self {
            Self::StructureDamage(m) => m.write(serializer),
            Self::VesselDamage(m) => m.write(serializer),
            Self::WeaponFire(m) => m.write(serializer),
            Self::Explosion(m) => m.write(serializer),
        };
        if written {
            Ok(serializer.as_slice())
        } else {
            Err(EncodeError::MessageTooLarge {
                kind: self.kind(),
                limit: MAX_MESSAGE_SIZE,
            })
        }
    }

    /// Encodes into a freshly allocated payload.
    ///
    /// # Errors
    /// Returns [`EncodeError::MessageTooLarge`] if the message does not fit in
    /// one datagram.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut serializer = MessageSerializer::new();
        self.serialize_into(&mut serializer).map(<[u8]>::to_vec)
    }

    /// Decodes any kind, dispatching on the tag byte.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let kind = MessageKind::from_tag(*bytes.first()?)?;
        Self::decode_as(kind, bytes)
    }

    /// Decodes with the decoder for `kind`; a payload of another kind is `None`.
    #[must_use]
    pub fn decode_as(kind: MessageKind, bytes: &[u8]) -> Option<Self> {
        match kind {
            MessageKind::StructureDamage => StructureDamage::decode(bytes).map(Self::StructureDamage),
            MessageKind::VesselDamage => VesselDamage::decode(bytes).map(Self::VesselDamage),
            MessageKind::WeaponFire => WeaponFire::decode(bytes).map(Self::WeaponFire),
            MessageKind::Explosion => Explosion::decode(bytes).map(Self::Explosion),
        }
    }
}

impl From<StructureDamage> for SyncMessage {
    fn from(value: StructureDamage) -> Self {
        Self::StructureDamage(value)
    }
}

impl From<VesselDamage> for SyncMessage {
    fn from(value: VesselDamage) -> Self {
        Self::VesselDamage(value)
    }
}

impl From<WeaponFire> for SyncMessage {
    fn from(value: WeaponFire) -> Self {
        Self::WeaponFire(value)
    }
}

impl From<Explosion> for SyncMessage {
    fn from(value: Explosion) -> Self {
        Self::Explosion(value)
    }
}
