//! # Sync Session
//!
//! Owns everything one multiplayer session needs and drives it from the
//! host's fixed-timestep tick.
//!
//! ## Tick Order
//!
//! ```text
//! 1. Drain inbound queue, apply each remote message (apply-path)
//! 2. Sample structures  (every 1.0s)  -> immediate send
//! 3. Sample weapons     (every 0.2s)  -> immediate send
//! 4. Sample parts       (every tick)  -> batch window
//! 5. Advance batch window             -> flush part damage
//! ```
//!
//! ## Lifecycle
//!
//! ```text
//! SyncSubsystem::initialize ──> Active(session) ──tick──> ...
//!                          └──> Disabled(reason)  (ticks are no-ops)
//! ```
//!
//! A missing transport or host disables sync for the whole session. There
//! is no retry.

use std::time::{Duration, Instant};

use concord_protocol::{Explosion, PartId, SyncMessage, Vector3d, VesselId};

use crate::broadcaster::{BroadcastStats, Broadcaster, DeltaRecord};
use crate::config::SyncConfig;
use crate::detector::{ApplyOutcome, PartDamageDetector, SampleReport, StructureDetector, WeaponDetector};
use crate::error::{SyncError, SyncResult};
use crate::gateway::{DispatchGateway, GatewayStats};
use crate::host::{PartKey, SimulationHost};
use crate::transport::Transport;

/// What happened during one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Remote messages routed to an apply-path.
    pub received: usize,
    /// Remote messages whose value now holds on this peer.
    pub applied: usize,
    /// Structure pass, if the structure timer fired.
    pub structures: Option<SampleReport>,
    /// Weapon pass, if the weapon timer fired.
    pub weapons: Option<SampleReport>,
    /// Part pass, if the part timer fired.
    pub parts: Option<SampleReport>,
    /// Part damage messages flushed from the batch window.
    pub flushed: usize,
}

/// Session statistics.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionStats {
    /// Ticks processed.
    pub ticks: u64,
    /// Remote messages applied.
    pub applied: u64,
    /// Structures collapsed by remote damage.
    pub structures_collapsed: u64,
    /// Vessels marked for destruction by remote damage.
    pub vessels_destroyed: u64,
    /// Remote messages whose target is not on this peer.
    pub targets_missing: u64,
    /// Remote messages with unusable values.
    pub rejected: u64,
    /// Remote messages the host failed to apply.
    pub host_faults: u64,
    /// Explosions spawned from remote messages.
    pub explosions_spawned: u64,
    /// Totals over every sampling pass.
    pub sampling: SampleReport,
    /// Longest tick (microseconds).
    pub max_tick_duration_us: u64,
}

impl SessionStats {
    fn count(&mut self, outcome: ApplyOutcome) {
        match outcome {
            ApplyOutcome::Applied => {}
            ApplyOutcome::Collapsed => self.structures_collapsed += 1,
            ApplyOutcome::VesselDestroyed => self.vessels_destroyed += 1,
            ApplyOutcome::TargetMissing => self.targets_missing += 1,
            ApplyOutcome::Rejected => self.rejected += 1,
            ApplyOutcome::HostFault => self.host_faults += 1,
        }
        if outcome.is_applied() {
            self.applied += 1;
        }
    }
}

/// One live sync session.
///
/// Created once at session start, dropped at session end.
pub struct SyncSession<H: SimulationHost, T: Transport> {
    /// Host simulation - PRIVATE, access via methods only.
    host: H,
    /// Transport owner.
    gateway: DispatchGateway<T>,
    /// Structure damage detector.
    structures: StructureDetector,
    /// Part damage detector.
    parts: PartDamageDetector,
    /// Weapon firing detector.
    weapons: WeaponDetector,
    /// Immediate and windowed sending.
    broadcaster: Broadcaster,
    /// Deltas produced this tick, reused between ticks.
    deltas: Vec<DeltaRecord>,
    /// Stats.
    stats: SessionStats,
}

impl<H: SimulationHost, T: Transport> SyncSession<H, T> {
    /// Starts a session.
    ///
    /// # Errors
    /// [`SyncError::Config`] if `config` is invalid,
    /// [`SyncError::TransportUnavailable`] or [`SyncError::SimulationUnavailable`]
    /// if a dependency was not supplied.
    pub fn start(config: &SyncConfig, transport: Option<T>, host: Option<H>) -> SyncResult<Self> {
        config.validate()?;
        let transport = transport.ok_or(SyncError::TransportUnavailable)?;
        let host = host.ok_or(SyncError::SimulationUnavailable)?;

        let gateway = DispatchGateway::connect(transport, &config.fallback_peer_name);

        tracing::info!(
            "Sync session started as {} (structures {:?}, weapons {:?}, part window {:?})",
            gateway.peer(),
            config.structure_interval(),
            config.weapon_interval(),
            config.batch_window()
        );

        Ok(Self {
            host,
            gateway,
            structures: StructureDetector::from_config(config),
            parts: PartDamageDetector::from_config(config),
            weapons: WeaponDetector::from_config(config),
            broadcaster: Broadcaster::new(config.batch_window()),
            deltas: Vec::new(),
            stats: SessionStats::default(),
        })
    }

    /// Runs one tick of `dt` simulation time.
    pub fn tick(&mut self, dt: Duration) -> TickReport {
        let start = Instant::now();
        let mut report = TickReport::default();

        // 1. Remote messages
        for message in self.gateway.drain_inbound() {
            report.received += 1;
            let outcome = self.apply(&message);
            if outcome.is_applied() {
                report.applied += 1;
            }
            self.stats.count(outcome);
        }

        // 2-4. Local changes
        report.structures = self.structures.advance(dt, &self.host, &mut self.deltas);
        self.submit_deltas();
        report.weapons = self.weapons.advance(dt, &self.host, &mut self.deltas);
        self.submit_deltas();
        report.parts = self.parts.advance(dt, &self.host, &mut self.deltas);
        self.submit_deltas();

        for pass in [report.structures, report.weapons, report.parts].iter().flatten() {
            self.stats.sampling.merge(pass);
        }

        // 5. Batch window
        report.flushed = self.broadcaster.advance(dt, &mut self.gateway);

        self.stats.ticks += 1;
        let elapsed = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
        self.stats.max_tick_duration_us = self.stats.max_tick_duration_us.max(elapsed);
        report
    }

    /// Routes one remote message to its apply-path.
    fn apply(&mut self, message: &SyncMessage) -> ApplyOutcome {
        match message {
            SyncMessage::StructureDamage(m) => self.structures.apply(&mut self.host, m),
            SyncMessage::VesselDamage(m) => self.parts.apply(&mut self.host, m),
            SyncMessage::WeaponFire(m) => self.weapons.apply(&mut self.host, m),
            SyncMessage::Explosion(m) => self.apply_explosion(m),
        }
    }

    fn apply_explosion(&mut self, message: &Explosion) -> ApplyOutcome {
        if !message.power.is_finite() || !message.position.is_finite() {
            tracing::warn!("Rejected explosion from {}", message.player_name);
            return ApplyOutcome::Rejected;
        }
        match self.host.spawn_explosion(message.power, message.position) {
            Ok(()) => {
                self.stats.explosions_spawned += 1;
                ApplyOutcome::Applied
            }
            Err(err) => {
                tracing::warn!("Failed to spawn explosion from {}: {}", message.player_name, err);
                ApplyOutcome::HostFault
            }
        }
    }

    fn submit_deltas(&mut self) {
        self.broadcaster
            .submit_all(self.deltas.drain(..), &mut self.gateway);
    }

    /// Reports damage the host observed on a part.
    ///
    /// Queued for the next batch window regardless of threshold.
    pub fn report_part_damage(&mut self, vessel: VesselId, part: PartId, damage: f32, explosive: bool) {
        let key = PartKey::new(vessel, part);
        if self.parts.record_damage_event(key, damage, explosive, &mut self.deltas) {
            self.submit_deltas();
        }
    }

    /// Reports that a part was destroyed locally.
    pub fn report_part_destroyed(&mut self, vessel: VesselId, part: PartId, explosive: bool) {
        self.parts
            .record_destruction(PartKey::new(vessel, part), explosive, &mut self.deltas);
        self.submit_deltas();
    }

    /// Broadcasts a local explosion to every peer right away.
    ///
    /// Returns false if the values are not finite or the send failed.
    pub fn broadcast_explosion(&mut self, power: f32, position: Vector3d) -> bool {
        if !power.is_finite() || !position.is_finite() {
            tracing::debug!("Not broadcasting explosion with power {}", power);
            return false;
        }
        let failures = self.broadcaster.stats().send_failures;
        self.broadcaster
            .submit(DeltaRecord::Explosion { power, position }, &mut self.gateway);
        self.broadcaster.stats().send_failures == failures
    }

    /// Forgets every tracked value and drops pending deltas (scene change).
    pub fn reset_tracking(&mut self) {
        self.structures.reset();
        self.parts.reset();
        self.weapons.reset();
        self.broadcaster.clear();
        tracing::info!("Sync tracking reset");
    }

    /// Ends the session, dropping pending deltas, and hands the host back.
    pub fn shutdown(mut self) -> H {
        self.broadcaster.clear();
        tracing::info!(
            "Sync session ended after {} ticks ({} sent, {} applied)",
            self.stats.ticks,
            self.gateway.stats().sent,
            self.stats.applied
        );
        self.host
    }

    /// Read access to the host.
    #[must_use]
    pub const fn host(&self) -> &H {
        &self.host
    }

    /// Write access to the host, for the host's own gameplay.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// The dispatch gateway.
    #[must_use]
    pub const fn gateway(&self) -> &DispatchGateway<T> {
        &self.gateway
    }

    /// Part damage deltas waiting for the batch window.
    #[must_use]
    pub fn pending_deltas(&self) -> usize {
        self.broadcaster.pending_len()
    }

    /// Structure detector.
    #[must_use]
    pub const fn structures(&self) -> &StructureDetector {
        &self.structures
    }

    /// Part damage detector.
    #[must_use]
    pub const fn parts(&self) -> &PartDamageDetector {
        &self.parts
    }

    /// Weapon detector.
    #[must_use]
    pub const fn weapons(&self) -> &WeaponDetector {
        &self.weapons
    }

    /// Session statistics.
    #[must_use]
    pub const fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Gateway statistics.
    #[must_use]
    pub const fn gateway_stats(&self) -> &GatewayStats {
        self.gateway.stats()
    }

    /// Broadcaster statistics.
    #[must_use]
    pub const fn broadcast_stats(&self) -> &BroadcastStats {
        self.broadcaster.stats()
    }
}

/// The sync subsystem for one session: running, or disabled for good.
pub enum SyncSubsystem<H: SimulationHost, T: Transport> {
    /// Running.
    Active(Box<SyncSession<H, T>>),
    /// Disabled at startup.
    Disabled(SyncError),
}

impl<H: SimulationHost, T: Transport> SyncSubsystem<H, T> {
    /// Starts the session, or disables sync if a dependency is missing.
    pub fn initialize(config: &SyncConfig, transport: Option<T>, host: Option<H>) -> Self {
        match SyncSession::start(config, transport, host) {
            Ok(session) => Self::Active(Box::new(session)),
            Err(err) => {
                tracing::warn!("Sync disabled for this session: {}", err);
                Self::Disabled(err)
            }
        }
    }

    /// Ticks the session; does nothing when disabled.
    pub fn tick(&mut self, dt: Duration) -> Option<TickReport> {
        match self {
            Self::Active(session) => Some(session.tick(dt)),
            Self::Disabled(_) => None,
        }
    }

    /// True if sync is running.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    /// The running session.
    #[must_use]
    pub fn session(&self) -> Option<&SyncSession<H, T>> {
        match self {
            Self::Active(session) => Some(&**session),
            Self::Disabled(_) => None,
        }
    }

    /// The running session, mutably.
    pub fn session_mut(&mut self) -> Option<&mut SyncSession<H, T>> {
        match self {
            Self::Active(session) => Some(&mut **session),
            Self::Disabled(_) => None,
        }
    }

    /// Why sync is disabled.
    #[must_use]
    pub const fn disabled_reason(&self) -> Option<&SyncError> {
        match self {
            Self::Active(_) => None,
            Self::Disabled(err) => Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::EntityAttributes;
    use crate::mock::{LoopbackBus, LoopbackTransport, MockSimulation};
    use concord_protocol::{MessageKind, StructureDamage};

    const TICK: Duration = Duration::from_millis(20);

    type Session = SyncSession<MockSimulation, LoopbackTransport>;

    fn session(bus: &LoopbackBus, name: &str, host: MockSimulation) -> Session {
        SyncSession::start(&SyncConfig::default(), Some(bus.transport(name)), Some(host)).unwrap()
    }

    #[test]
    fn test_start_requires_both_dependencies() {
        let bus = LoopbackBus::new();
        let config = SyncConfig::default();

        let err = Session::start(&config, None, Some(MockSimulation::new())).err().unwrap();
        assert!(matches!(err, SyncError::TransportUnavailable));

        let err = Session::start(&config, Some(bus.transport("Val")), None).err().unwrap();
        assert!(matches!(err, SyncError::SimulationUnavailable));
    }

    #[test]
    fn test_start_rejects_invalid_config() {
        let bus = LoopbackBus::new();
        let mut config = SyncConfig::default();
        config.structure.damage_threshold = -1.0;
        let err = Session::start(&config, Some(bus.transport("Val")), Some(MockSimulation::new()))
            .err()
            .unwrap();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[test]
    fn test_disabled_subsystem_never_touches_transport() {
        let bus = LoopbackBus::new();
        let mut subsystem: SyncSubsystem<MockSimulation, LoopbackTransport> =
            SyncSubsystem::initialize(&SyncConfig::default(), Some(bus.transport("Val")), None);

        assert!(!subsystem.is_active());
        assert!(matches!(subsystem.disabled_reason(), Some(SyncError::SimulationUnavailable)));
        for _ in 0..100 {
            assert_eq!(subsystem.tick(TICK), None);
        }
        assert_eq!(bus.handler_count(), 0);
        assert!(bus.sent().is_empty());
    }

    #[test]
    fn test_structure_change_is_sent_on_the_structure_period() {
        let bus = LoopbackBus::new();
        let mut host = MockSimulation::new();
        let handle = host.add_structure(
            EntityAttributes::new("17", "VAB", Vector3d::new(0.0, 0.0, 0.0)),
            0.4,
        );
        let mut val = session(&bus, "Val", host);

        // First pass at 1s is the baseline.
        for _ in 0..50 {
            val.tick(TICK);
        }
        assert!(bus.sent().is_empty());

        val.host_mut().set_structure_damage_local(handle, 0.55);
        let mut sent_at = None;
        for tick in 0..50 {
            val.tick(TICK);
            if sent_at.is_none() && !bus.sent().is_empty() {
                sent_at = Some(tick);
            }
        }
        assert_eq!(sent_at, Some(49));

        let sent = bus.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].channel, MessageKind::StructureDamage.channel());
        let message = StructureDamage::decode(&sent[0].payload).unwrap();
        assert_eq!(message.building_id, "17_VAB_0_0_0");
        assert_eq!(message.player_name, "Val");
    }

    #[test]
    fn test_reported_part_damage_waits_for_window() {
        let bus = LoopbackBus::new();
        let mut val = session(&bus, "Val", MockSimulation::new());
        let vessel = VesselId::from_u128(3);

        val.report_part_damage(vessel, PartId(1), 50.0, true);
        val.report_part_destroyed(vessel, PartId(2), false);
        assert_eq!(val.pending_deltas(), 2);

        let flushed: usize = (0..5).map(|_| val.tick(TICK).flushed).sum();
        assert_eq!(flushed, 2);
        assert_eq!(bus.sent().len(), 2);
        assert_eq!(val.pending_deltas(), 0);
    }

    #[test]
    fn test_reset_tracking_drops_pending() {
        let bus = LoopbackBus::new();
        let mut val = session(&bus, "Val", MockSimulation::new());

        val.report_part_damage(VesselId::from_u128(3), PartId(1), 50.0, false);
        val.reset_tracking();
        assert_eq!(val.pending_deltas(), 0);
        assert!(val.parts().tracked().is_empty());

        for _ in 0..10 {
            val.tick(TICK);
        }
        assert!(bus.sent().is_empty());
    }

    #[test]
    fn test_broadcast_explosion_rejects_nan() {
        let bus = LoopbackBus::new();
        let mut val = session(&bus, "Val", MockSimulation::new());

        assert!(!val.broadcast_explosion(f32::NAN, Vector3d::default()));
        assert!(bus.sent().is_empty());
        assert!(val.broadcast_explosion(4.0, Vector3d::new(1.0, 2.0, 3.0)));
        assert_eq!(bus.sent().len(), 1);
    }

    #[test]
    fn test_shutdown_returns_host() {
        let bus = LoopbackBus::new();
        let mut host = MockSimulation::new();
        host.add_part(PartKey::new(VesselId::from_u128(1), PartId(1)), 7.0);
        let mut val = session(&bus, "Val", host);
        val.report_part_damage(VesselId::from_u128(1), PartId(1), 8.0, false);

        let host = val.shutdown();
        assert_eq!(host.part_damage(PartKey::new(VesselId::from_u128(1), PartId(1))), Some(7.0));
        assert!(bus.sent().is_empty());
    }
}
