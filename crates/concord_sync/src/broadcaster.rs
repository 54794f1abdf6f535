//! # Batching Broadcaster
//!
//! Decides WHEN a detected delta goes on the wire.
//!
//! ## Strategies
//!
//! ```text
//! Immediate (structure, weapon, explosion):
//!   submit ──> gateway.send
//!
//! Windowed (part damage):
//!   submit ──> pending ──(every batch window)──> one message per delta ──> gateway.send
//! ```
//!
//! Part damage is sampled every physics tick and would flood the transport;
//! the window bounds worst-case staleness to one window. Structure and
//! weapon changes are rare and latency-sensitive, so they skip the queue.

use std::time::Duration;

use concord_protocol::{
    Explosion, MessageKind, StructureDamage, SyncMessage, Vector3d, VesselDamage, WeaponFire,
};

use crate::gateway::DispatchGateway;
use crate::host::{PartKey, WeaponKey};
use crate::identity::EntityId;
use crate::timer::IntervalTimer;
use crate::transport::Transport;

/// One pending change, below message granularity.
#[derive(Clone, Debug, PartialEq)]
pub enum DeltaRecord {
    /// Structure damage fraction changed.
    StructureDamage {
        /// Structure key.
        id: EntityId,
        /// New damage fraction.
        damage_fraction: f32,
    },
    /// Part damage changed.
    PartDamage {
        /// Part key.
        key: PartKey,
        /// New damage.
        damage: f32,
        /// Damage came from an explosion.
        explosive: bool,
    },
    /// Weapon firing state flipped.
    WeaponFire {
        /// Weapon key.
        key: WeaponKey,
        /// New firing state.
        firing: bool,
    },
    /// Explosion happened locally.
    Explosion {
        /// Explosive power.
        power: f32,
        /// World position.
        position: Vector3d,
    },
}

impl DeltaRecord {
    /// Kind of message this delta becomes.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::StructureDamage { .. } => MessageKind::StructureDamage,
            Self::PartDamage { .. } => MessageKind::VesselDamage,
            Self::WeaponFire { .. } => MessageKind::WeaponFire,
            Self::Explosion { .. } => MessageKind::Explosion,
        }
    }

    /// Builds the wire message; the gateway stamps the origin peer.
    #[must_use]
    pub fn into_message(self) -> SyncMessage {
        match self {
            Self::StructureDamage { id, damage_fraction } => SyncMessage::from(StructureDamage {
                building_id: id.as_str().to_owned(),
                damage_fraction,
                player_name: String::new(),
            }),
            Self::PartDamage {
                key,
                damage,
                explosive,
            } => SyncMessage::from(VesselDamage {
                vessel_id: key.vessel,
                part_id: key.part,
                damage,
                explosive,
                player_name: String::new(),
            }),
            Self::WeaponFire { key, firing } => SyncMessage::from(WeaponFire {
                vessel_id: key.vessel,
                weapon_name: key.weapon_name,
                firing,
                player_name: String::new(),
            }),
            Self::Explosion { power, position } => SyncMessage::from(Explosion {
                power,
                position,
                player_name: String::new(),
            }),
        }
    }
}

/// How deltas of one kind reach the gateway.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchStrategy {
    /// Sent as soon as submitted.
    Immediate,
    /// Queued and flushed once per window.
    Windowed,
}

impl BatchStrategy {
    /// Strategy used for `kind`.
    #[must_use]
    pub const fn for_kind(kind: MessageKind) -> Self {
        match kind {
            MessageKind::VesselDamage => Self::Windowed,
            MessageKind::StructureDamage | MessageKind::WeaponFire | MessageKind::Explosion => {
                Self::Immediate
            }
        }
    }
}

/// Broadcaster statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    /// Deltas sent immediately.
    pub immediate_sent: u64,
    /// Non-empty windows flushed.
    pub windows_flushed: u64,
    /// Deltas sent from windows.
    pub windowed_sent: u64,
    /// Deltas whose send failed.
    pub send_failures: u64,
    /// Deltas dropped at teardown or reset.
    pub dropped: u64,
}

/// Accumulates and forwards deltas to the gateway.
pub struct Broadcaster {
    /// Pending windowed deltas, in submission order.
    pending: Vec<DeltaRecord>,
    /// Batch window timer.
    window: IntervalTimer,
    /// Stats.
    stats: BroadcastStats,
}

impl Broadcaster {
    /// Creates a broadcaster with the given batch window.
    #[must_use]
    pub fn new(batch_window: Duration) -> Self {
        Self {
            pending: Vec::new(),
            window: IntervalTimer::new(batch_window),
            stats: BroadcastStats::default(),
        }
    }

    /// Forwards or queues one delta according to its kind's strategy.
    pub fn submit<T: Transport>(&mut self, delta: DeltaRecord, gateway: &mut DispatchGateway<T>) {
        match BatchStrategy::for_kind(delta.kind()) {
            BatchStrategy::Immediate => {
                if gateway.send(delta.into_message()).is_ok() {
                    self.stats.immediate_sent += 1;
                } else {
                    self.stats.send_failures += 1;
                }
            }
            BatchStrategy::Windowed => self.pending.push(delta),
        }
    }

    /// Submits every delta in order.
    pub fn submit_all<T: Transport>(
        &mut self,
        deltas: impl IntoIterator<Item = DeltaRecord>,
        gateway: &mut DispatchGateway<T>,
    ) {
        for delta in deltas {
            self.submit(delta, gateway);
        }
    }

    /// Advances the batch window by one tick, flushing if it elapsed.
    ///
    /// Returns the number of messages sent.
    pub fn advance<T: Transport>(&mut self, dt: Duration, gateway: &mut DispatchGateway<T>) -> usize {
        if self.window.advance(dt) {
            self.flush(gateway)
        } else {
            0
        }
    }

    /// Sends every pending delta as its own message and clears the queue.
    ///
    /// An empty queue sends nothing. A failed send is counted and the rest
    /// of the batch still goes out. Returns the number of messages sent.
    pub fn flush<T: Transport>(&mut self, gateway: &mut DispatchGateway<T>) -> usize {
        if self.pending.is_empty() {
            return 0;
        }

        let batch = std::mem::take(&mut self.pending);
        let total = batch.len();
        let mut sent = 0;
        for delta in batch {
            if gateway.send(delta.into_message()).is_ok() {
                sent += 1;
            } else {
                self.stats.send_failures += 1;
            }
        }

        self.stats.windows_flushed += 1;
        self.stats.windowed_sent += sent as u64;
        tracing::debug!("Flushed {} of {} batched damage messages", sent, total);
        sent
    }

    /// Drops every pending delta without sending.
    pub fn clear(&mut self) {
        if !self.pending.is_empty() {
            tracing::debug!("Dropping {} pending deltas", self.pending.len());
        }
        self.stats.dropped += self.pending.len() as u64;
        self.pending.clear();
        self.window.reset();
    }

    /// Number of queued deltas.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Queued deltas, in submission order.
    #[must_use]
    pub fn pending(&self) -> &[DeltaRecord] {
        &self.pending
    }

    /// Returns statistics.
    #[must_use]
    pub const fn stats(&self) -> &BroadcastStats {
        &self.stats
    }
}
