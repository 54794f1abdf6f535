//! Structure damage detection and apply.

use std::time::Duration;

use concord_protocol::StructureDamage;

use super::{ApplyOutcome, SampleReport};
use crate::broadcaster::DeltaRecord;
use crate::config::SyncConfig;
use crate::error::HostError;
use crate::host::{SimulationHost, StructureCondition, StructureHandle};
use crate::identity::EntityId;
use crate::timer::IntervalTimer;
use crate::tracked::TrackedState;

/// Watches destructible structures for damage fraction changes.
pub struct StructureDetector {
    /// Last-broadcast damage fraction per structure.
    tracked: TrackedState<EntityId, f32>,
    /// Sampling period.
    timer: IntervalTimer,
    /// Minimum absolute change that is broadcast.
    threshold: f32,
}

impl StructureDetector {
    /// Creates a detector sampling every `interval`.
    #[must_use]
    pub fn new(interval: Duration, threshold: f32) -> Self {
        Self {
            tracked: TrackedState::new(),
            timer: IntervalTimer::new(interval),
            threshold,
        }
    }

    /// Creates a detector from the structure section of `config`.
    #[must_use]
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.structure_interval(), config.structure.damage_threshold)
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

    /// Runs one sampling pass, pushing a delta for every structure that changed.
    pub fn sample<H: SimulationHost>(&mut self, host: &H, deltas: &mut Vec<DeltaRecord>) -> SampleReport {
        let mut report = SampleReport::default();

        for sample in host.sample_structures() {
            report.sampled += 1;

            let sample = match sample {
                Ok(sample) => sample,
                Err(err) => {
                    tracing::debug!("Skipping unreadable structure: {}", err);
                    report.skipped += 1;
                    continue;
                }
            };

            let Some(id) = sample.attributes.resolve() else {
                tracing::debug!("Skipping structure {:?} without a stable identity", sample.handle);
                report.skipped += 1;
                continue;
            };

            let damage_fraction = sample.damage_fraction;
            if !damage_fraction.is_finite() {
                tracing::debug!("Skipping structure {} with damage {}", id, damage_fraction);
                report.skipped += 1;
                continue;
            }

            let observation = self.tracked.observe(id.clone(), damage_fraction, self.threshold);
            if report.tally(&observation) {
                deltas.push(DeltaRecord::StructureDamage { id, damage_fraction });
            }
        }

        report
    }

    /// Applies a remote structure damage message.
    ///
    /// The value is written as received. If the structure no longer stands
    /// it is collapsed.
    pub fn apply<H: SimulationHost>(&mut self, host: &mut H, message: &StructureDamage) -> ApplyOutcome {
        let damage_fraction = message.damage_fraction;
        if !damage_fraction.is_finite() {
            tracing::warn!(
                "Rejected structure damage {} for {} from {}",
                damage_fraction,
                message.building_id,
                message.player_name
            );
            return ApplyOutcome::Rejected;
        }

        let id = EntityId::from_wire(message.building_id.as_str());
        let Some(handle) = find_structure(host, &id) else {
            tracing::warn!("Structure {} not found on this peer", id);
            return ApplyOutcome::TargetMissing;
        };

        let condition = match host.set_structure_damage(handle, damage_fraction) {
            Ok(condition) => condition,
            Err(err) => return host_failure(&id, &err),
        };
        self.tracked.record(id.clone(), damage_fraction);

        match condition {
            StructureCondition::Intact => ApplyOutcome::Applied,
            StructureCondition::Destroyed => match host.collapse_structure(handle) {
                Ok(()) => {
                    tracing::info!("Structure {} collapsed ({} from {})", id, damage_fraction, message.player_name);
                    ApplyOutcome::Collapsed
                }
                Err(err) => host_failure(&id, &err),
            },
        }
    }

    /// Tracked damage fractions.
    #[must_use]
    pub const fn tracked(&self) -> &TrackedState<EntityId, f32> {
        &self.tracked
    }

    /// Forgets every tracked structure and restarts the period.
    pub fn reset(&mut self) {
        self.tracked.clear();
        self.timer.reset();
    }
}

/// Finds the live structure whose resolved identity is `id`.
fn find_structure<H: SimulationHost>(host: &H, id: &EntityId) -> Option<StructureHandle> {
    host.sample_structures()
        .into_iter()
        .filter_map(Result::ok)
        .find(|sample| sample.attributes.resolve().as_ref() == Some(id))
        .map(|sample| sample.handle)
}

fn host_failure(id: &EntityId, err: &HostError) -> ApplyOutcome {
    if err.is_lookup_miss() {
        tracing::warn!("Structure {} vanished during apply: {}", id, err);
        ApplyOutcome::TargetMissing
    } else {
        tracing::warn!("Failed to apply damage to structure {}: {}", id, err);
        ApplyOutcome::HostFault
    }
}
