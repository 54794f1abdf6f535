//! # CONCORD Sync - Change Detection & Delta Broadcast
//!
//! Keeps destructible structures, vessel part damage and weapon firing
//! consistent across the peers of one multiplayer session.
//!
//! ## Data Flow
//!
//! ```text
//! ┌──────────────────┐  sample   ┌────────────┐  delta   ┌─────────────┐
//! │ SimulationHost   │ ────────> │ Detectors  │ ───────> │ Broadcaster │
//! │ (host simulation)│ <──────── │ (tracked)  │          └──────┬──────┘
//! └──────────────────┘   apply   └─────▲──────┘                 │ send
//!                                      │ routed                 ▼
//!                              ┌───────┴──────────────────────────────┐
//!                              │ DispatchGateway  <──>  Transport     │
//!                              └──────────────────────────────────────┘
//! ```
//!
//! ## Rules
//!
//! 1. Everything runs on the host's tick thread; transport callbacks only
//!    queue payloads
//! 2. A local sample is broadcast only when it moved past the threshold
//! 3. A remote value is applied without threshold and recorded as tracked
//! 4. Failures skip one item, never the pass, never the host
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use concord_sync::mock::{LoopbackBus, MockSimulation};
//! use concord_sync::{SyncConfig, SyncSubsystem};
//!
//! let bus = LoopbackBus::new();
//! let mut sync = SyncSubsystem::initialize(
//!     &SyncConfig::default(),
//!     Some(bus.transport("Val")),
//!     Some(MockSimulation::new()),
//! );
//! assert!(sync.is_active());
//! sync.tick(Duration::from_millis(20));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

mod broadcaster;
mod config;
mod detector;
mod error;
mod gateway;
mod host;
mod identity;
mod session;
mod timer;
mod tracked;
mod transport;

pub mod mock;

pub use broadcaster::{BatchStrategy, BroadcastStats, Broadcaster, DeltaRecord};
pub use config::{PartDamageSyncConfig, StructureSyncConfig, SyncConfig, WeaponSyncConfig};
pub use detector::{ApplyOutcome, PartDamageDetector, SampleReport, StructureDetector, WeaponDetector};
pub use error::{
    ConfigError, GatewayError, HostError, HostResult, SyncError, SyncResult, TransportError,
};
pub use gateway::{DispatchGateway, GatewayStats, PeerIdentity};
pub use host::{
    PartKey, PartSample, SimulationHost, StructureCondition, StructureHandle, StructureSample,
    WeaponKey, WeaponSample,
};
pub use identity::{resolve, EntityAttributes, EntityId, ID_DELIMITER};
pub use session::{SessionStats, SyncSession, SyncSubsystem, TickReport};
pub use timer::IntervalTimer;
pub use tracked::{Observation, SyncValue, TrackedState};
pub use transport::{InboundDatagram, InboundHandler, Transport};
