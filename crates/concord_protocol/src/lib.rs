//! # CONCORD Protocol - The Wire Format
//!
//! Compact binary messages for replicating damage and weapon state between
//! peers over a name-addressed datagram transport.
//!
//! ## Message Structure
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Tag (1 byte)                                                 │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Kind-specific fields (fixed + length-prefixed strings)       │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Origin peer name (length-prefixed string)                    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Philosophy
//!
//! - One message per datagram, no envelope checksum (the transport owns that)
//! - Little-endian scalars, 7-bit-group string length prefixes
//! - Decoding never errors: unreadable or foreign payloads are absent
//!
//! ## Example
//!
//! ```rust
//! use concord_protocol::{StructureDamage, SyncMessage};
//!
//! let message = SyncMessage::from(StructureDamage {
//!     building_id: "17_VAB_-1203_65_2280".into(),
//!     damage_fraction: 0.55,
//!     player_name: "Val".into(),
//! });
//!
//! let bytes = message.encode().unwrap();
//! assert_eq!(SyncMessage::decode(&bytes), Some(message));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

mod error;
mod ids;
mod kind;
mod messages;
mod serialization;

pub use error::EncodeError;
pub use ids::{PartId, Vector3d, VesselId};
pub use kind::{Delivery, MessageKind};
pub use messages::{Explosion, StructureDamage, SyncMessage, VesselDamage, WeaponFire};
pub use serialization::{MessageDeserializer, MessageSerializer};

/// Maximum encoded message size - every message must fit in one datagram.
///
/// We use 1200 bytes to be safe across all networks (< 1500 MTU).
pub const MAX_MESSAGE_SIZE: usize = 1200;

/// Damage value that marks a part as destroyed.
pub const PART_DESTROYED_DAMAGE: f32 = 9999.0;
