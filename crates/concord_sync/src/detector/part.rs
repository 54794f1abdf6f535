//! Vessel part damage detection and apply.
//!
//! Two local sources feed deltas: the periodic sample of every part, and
//! authoritative damage/destroyed events the host reports as they happen.
//! Both land in the broadcaster's window, never on the wire directly.

use std::time::Duration;

use concord_protocol::VesselDamage;

use super::{ApplyOutcome, SampleReport};
use crate::broadcaster::DeltaRecord;
use crate::config::SyncConfig;
use crate::host::{PartKey, SimulationHost};
use crate::timer::IntervalTimer;
use crate::tracked::TrackedState;

/// Watches vessel parts for damage changes.
pub struct PartDamageDetector {
    /// Last-broadcast damage per part.
    tracked: TrackedState<PartKey, f32>,
    /// Sampling period; zero samples every tick.
    timer: IntervalTimer,
    /// Minimum absolute change that is broadcast.
    threshold: f32,
    /// Damage value that means "part destroyed".
    destruction_damage: f32,
}

impl PartDamageDetector {
    /// Creates a detector.
    #[must_use]
    pub fn new(interval: Duration, threshold: f32, destruction_damage: f32) -> Self {
        Self {
            tracked: TrackedState::new(),
            timer: IntervalTimer::new(interval),
            threshold,
            destruction_damage,
        }
    }

    /// Creates a detector from the part damage section of `config`.
    #[must_use]
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            config.part_damage_interval(),
            config.part_damage.damage_threshold,
            config.part_damage.destruction_damage,
        )
    }

    /// Advances the sampling timer; samples if the period elapsed.
    pub fn advance<H: SimulationHost>(
        &mut self,
        dt: Duration,
        host: &H,
        deltas: &mut Vec<DeltaRecord>,
    ) -> Option<SampleReport> {
        self.timer.advance(dt).then(|| self.sample(host, deltas))
    }

    /// Runs one sampling pass over every loaded part.
    pub fn sample<H: SimulationHost>(&mut self, host: &H, deltas: &mut Vec<DeltaRecord>) -> SampleReport {
        let mut report = SampleReport::default();

        for sample in host.sample_parts() {
            report.sampled += 1;

            let sample = match sample {
                Ok(sample) => sample,
                Err(err) => {
                    tracing::debug!("Skipping unreadable part: {}", err);
                    report.skipped += 1;
                    continue;
                }
            };

            if !sample.damage.is_finite() {
                report.skipped += 1;
                continue;
            }

            let observation = self.tracked.observe(sample.key, sample.damage, self.threshold);
            if report.tally(&observation) {
                deltas.push(DeltaRecord::PartDamage {
                    key: sample.key,
                    damage: sample.damage,
                    explosive: false,
                });
            }
        }

        report
    }

    /// Records a damage event the host observed directly.
    ///
    /// Events bypass the threshold; the value becomes the tracked baseline.
    pub fn record_damage_event(
        &mut self,
        key: PartKey,
        damage: f32,
        explosive: bool,
        deltas: &mut Vec<DeltaRecord>,
    ) -> bool {
        if !damage.is_finite() {
            tracing::debug!("Ignoring damage event {} for part {} on {}", damage, key.part, key.vessel);
            return false;
        }
        self.tracked.record(key, damage);
        deltas.push(DeltaRecord::PartDamage {
            key,
            damage,
            explosive,
        });
        true
    }

    /// Records that a part was destroyed locally.
    pub fn record_destruction(&mut self, key: PartKey, explosive: bool, deltas: &mut Vec<DeltaRecord>) {
        tracing::debug!("Part {} on vessel {} destroyed", key.part, key.vessel);
        self.record_damage_event(key, self.destruction_damage, explosive, deltas);
    }

    /// Applies a remote part damage message.
    ///
    /// A value at or above the destruction damage also marks the owning
    /// vessel for destruction.
    pub fn apply<H: SimulationHost>(&mut self, host: &mut H, message: &VesselDamage) -> ApplyOutcome {
        let key = PartKey::new(message.vessel_id, message.part_id);
        if !message.damage.is_finite() {
            tracing::warn!(
                "Rejected part damage {} for part {} on {} from {}",
                message.damage,
                key.part,
                key.vessel,
                message.player_name
            );
            return ApplyOutcome::Rejected;
        }

        if let Err(err) = host.set_part_damage(key, message.damage, message.explosive) {
            return if err.is_lookup_miss() {
                // Vessel unloaded or packed on this peer.
                tracing::debug!("Part damage for {} not applied: {}", key.vessel, err);
                ApplyOutcome::TargetMissing
            } else {
                tracing::warn!("Failed to apply part damage on {}: {}", key.vessel, err);
                ApplyOutcome::HostFault
            };
        }
        self.tracked.record(key, message.damage);

        if message.damage < self.destruction_damage {
            return ApplyOutcome::Applied;
        }

        match host.mark_vessel_for_destruction(key.vessel) {
            Ok(()) => {
                tracing::info!("Vessel {} destroyed by {}", key.vessel, message.player_name);
                ApplyOutcome::VesselDestroyed
            }
            Err(err) => {
                tracing::warn!("Failed to mark vessel {} for destruction: {}", key.vessel, err);
                if err.is_lookup_miss() {
                    ApplyOutcome::TargetMissing
                } else {
                    ApplyOutcome::HostFault
                }
            }
        }
    }

    /// Tracked part damage.
    #[must_use]
    pub const fn tracked(&self) -> &TrackedState<PartKey, f32> {
        &self.tracked
    }

    /// Forgets every tracked part and restarts the period.
    pub fn reset(&mut self) {
        self.tracked.clear();
        self.timer.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;
    use crate::mock::MockSimulation;
    use concord_protocol::{PartId, VesselId, PART_DESTROYED_DAMAGE};

    const TICK: Duration = Duration::from_millis(20);

    fn key(part: u32) -> PartKey {
        PartKey::new(VesselId::from_u128(0xA11CE), PartId(part))
    }

    fn detector() -> PartDamageDetector {
        PartDamageDetector::new(Duration::ZERO, 0.1, PART_DESTROYED_DAMAGE)
    }

    fn damage(part: u32, value: f32) -> VesselDamage {
        VesselDamage {
            vessel_id: key(part).vessel,
            part_id: PartId(part),
            damage: value,
            explosive: false,
            player_name: "Bob".into(),
        }
    }

    #[test]
    fn test_samples_every_tick() {
        let mut host = MockSimulation::new();
        host.add_part(key(1), 0.0);
        let mut detector = detector();
        let mut deltas = Vec::new();

        assert!(detector.advance(TICK, &host, &mut deltas).is_some());
        assert!(detector.advance(TICK, &host, &mut deltas).is_some());
        assert!(deltas.is_empty());

        host.set_part_damage_local(key(1), 12.5);
        let report = detector.advance(TICK, &host, &mut deltas).unwrap();
        assert_eq!(report.changed, 1);
        assert_eq!(
            deltas,
            vec![DeltaRecord::PartDamage {
                key: key(1),
                damage: 12.5,
                explosive: false,
            }]
        );
    }

    #[test]
    fn test_small_change_is_quiet() {
        let mut host = MockSimulation::new();
        host.add_part(key(1), 5.0);
        let mut detector = detector();
        let mut deltas = Vec::new();

        detector.sample(&host, &mut deltas);
        host.set_part_damage_local(key(1), 5.05);
        detector.sample(&host, &mut deltas);
        assert!(deltas.is_empty());
    }

    #[test]
    fn test_unreadable_part_skipped() {
        let mut host = MockSimulation::new();
        host.add_part(key(1), 1.0);
        host.add_faulty_part(HostError::VesselNotFound(key(2).vessel));
        let mut detector = detector();

        let report = detector.sample(&host, &mut Vec::new());
        assert_eq!(report.sampled, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.baselined, 1);
    }

    #[test]
    fn test_damage_event_bypasses_threshold() {
        let mut detector = detector();
        let mut deltas = Vec::new();

        assert!(detector.record_damage_event(key(3), 0.05, true, &mut deltas));
        assert_eq!(detector.tracked().get(&key(3)), Some(0.05));
        assert_eq!(
            deltas,
            vec![DeltaRecord::PartDamage {
                key: key(3),
                damage: 0.05,
                explosive: true,
            }]
        );

        assert!(!detector.record_damage_event(key(3), f32::NAN, false, &mut deltas));
        assert_eq!(deltas.len(), 1);
    }

    #[test]
    fn test_destruction_uses_sentinel_damage() {
        let mut detector = detector();
        let mut deltas = Vec::new();

        detector.record_destruction(key(4), false, &mut deltas);
        assert_eq!(
            deltas,
            vec![DeltaRecord::PartDamage {
                key: key(4),
                damage: PART_DESTROYED_DAMAGE,
                explosive: false,
            }]
        );
    }

    #[test]
    fn test_apply_writes_and_records() {
        let mut host = MockSimulation::new();
        host.add_part(key(1), 0.0);
        let mut detector = detector();

        assert_eq!(detector.apply(&mut host, &damage(1, 40.0)), ApplyOutcome::Applied);
        assert_eq!(host.part_damage(key(1)), Some(40.0));

        let mut deltas = Vec::new();
        detector.sample(&host, &mut deltas);
        assert!(deltas.is_empty());
    }

    #[test]
    fn test_apply_destruction_marks_vessel() {
        let mut host = MockSimulation::new();
        host.add_part(key(1), 0.0);
        let mut detector = detector();

        assert_eq!(
            detector.apply(&mut host, &damage(1, PART_DESTROYED_DAMAGE)),
            ApplyOutcome::VesselDestroyed
        );
        assert!(host.is_marked_for_destruction(key(1).vessel));
    }

    #[test]
    fn test_apply_unloaded_vessel_is_missing() {
        let mut host = MockSimulation::new();
        let mut detector = detector();

        assert_eq!(detector.apply(&mut host, &damage(1, 40.0)), ApplyOutcome::TargetMissing);
        assert!(detector.tracked().is_empty());
    }

    #[test]
    fn test_apply_rejects_nan() {
        let mut host = MockSimulation::new();
        host.add_part(key(1), 3.0);
        let mut detector = detector();

        assert_eq!(detector.apply(&mut host, &damage(1, f32::NAN)), ApplyOutcome::Rejected);
        assert_eq!(host.part_damage(key(1)), Some(3.0));
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut host = MockSimulation::new();
        host.add_part(key(1), 0.0);
        let mut detector = detector();

        detector.apply(&mut host, &damage(1, 40.0));
        detector.apply(&mut host, &damage(1, 40.0));
        assert_eq!(host.part_damage(key(1)), Some(40.0));
        assert_eq!(detector.tracked().get(&key(1)), Some(40.0));
    }
}
