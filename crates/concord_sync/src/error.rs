//! # Sync Error Types
//!
//! All errors that can occur in the sync subsystem.
//!
//! Only [`SyncError`] is ever fatal, and only at startup. Everything else is
//! logged where it happens and turned into "skip this item".

use std::path::PathBuf;

use concord_protocol::{EncodeError, PartId, VesselId};
use thiserror::Error;

/// Errors that stop the sync subsystem from starting.
#[derive(Error, Debug)]
pub enum SyncError {
    /// No transport/session layer was supplied.
    #[error("transport layer not available")]
    TransportUnavailable,

    /// No simulation host was supplied.
    #[error("simulation host not available")]
    SimulationUnavailable,

    /// The configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors loading or validating [`crate::SyncConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Path that was read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is outside its allowed range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors reported by the simulation host for a single entity.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostError {
    /// No structure matches the handle.
    #[error("structure not found: {0}")]
    StructureNotFound(u64),

    /// Vessel is not loaded on this peer.
    #[error("vessel not found or packed: {0}")]
    VesselNotFound(VesselId),

    /// Vessel is loaded but the part is gone.
    #[error("part {part} not found on vessel {vessel}")]
    PartNotFound {
        /// Owning vessel.
        vessel: VesselId,
        /// Missing part.
        part: PartId,
    },

    /// No weapon with that name on the vessel.
    #[error("weapon {name} not found on vessel {vessel}")]
    WeaponNotFound {
        /// Owning vessel.
        vessel: VesselId,
        /// Missing weapon.
        name: String,
    },

    /// Reading or writing an attribute failed.
    #[error("host fault: {0}")]
    Fault(String),
}

impl HostError {
    /// True if the error means the target simply is not on this peer.
    #[must_use]
    pub const fn is_lookup_miss(&self) -> bool {
        matches!(
            self,
            Self::StructureNotFound(_)
                | Self::VesselNotFound(_)
                | Self::PartNotFound { .. }
                | Self::WeaponNotFound { .. }
        )
    }
}

/// Errors reported by the transport layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// A handler could not be registered for the channel.
    #[error("channel {0} rejected handler registration")]
    RegistrationRejected(String),

    /// The payload could not be handed to the transport.
    #[error("send on channel {channel} failed: {reason}")]
    SendFailed {
        /// Channel name.
        channel: String,
        /// Transport-specific reason.
        reason: String,
    },
}

/// Errors sending one message through the gateway.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Message could not be encoded.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Transport refused the payload.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result type for sync startup.
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type for host calls.
pub type HostResult<T> = Result<T, HostError>;
