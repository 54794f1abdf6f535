//! Weapon firing detection and apply.

use std::time::Duration;

use concord_protocol::WeaponFire;

use super::{ApplyOutcome, SampleReport};
use crate::broadcaster::DeltaRecord;
use crate::config::SyncConfig;
use crate::host::{SimulationHost, WeaponKey};
use crate::timer::IntervalTimer;
use crate::tracked::TrackedState;

/// Watches host-declared weapons for firing state flips.
pub struct WeaponDetector {
    /// Last-broadcast firing state per weapon.
    tracked: TrackedState<WeaponKey, bool>,
    /// Sampling period.
    timer: IntervalTimer,
}

impl WeaponDetector {
    /// Creates a detector sampling every `interval`.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            tracked: TrackedState::new(),
            timer: IntervalTimer::new(interval),
        }
    }

    /// Creates a detector from the weapon section of `config`.
    #[must_use]
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.weapon_interval())
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

    /// Runs one sampling pass over every declared weapon.
    pub fn sample<H: SimulationHost>(&mut self, host: &H, deltas: &mut Vec<DeltaRecord>) -> SampleReport {
        let mut report = SampleReport::default();

        for sample in host.sample_weapons() {
            report.sampled += 1;

            let sample = match sample {
                Ok(sample) => sample,
                Err(err) => {
                    tracing::debug!("Skipping unreadable weapon: {}", err);
                    report.skipped += 1;
                    continue;
                }
            };

            let observation = self.tracked.observe(sample.key.clone(), sample.firing, ());
            if report.tally(&observation) {
                deltas.push(DeltaRecord::WeaponFire {
                    key: sample.key,
                    firing: sample.firing,
                });
            }
        }

        report
    }

    /// Applies a remote firing state.
    pub fn apply<H: SimulationHost>(&mut self, host: &mut H, message: &WeaponFire) -> ApplyOutcome {
        let key = WeaponKey::new(message.vessel_id, message.weapon_name.as_str());

        match host.set_weapon_firing(&key, message.firing) {
            Ok(()) => {
                self.tracked.record(key, message.firing);
                ApplyOutcome::Applied
            }
            Err(err) if err.is_lookup_miss() => {
                // Weapon streams are lossy; missing targets are routine.
                tracing::debug!("Weapon {} on {} not applied: {}", key.weapon_name, key.vessel, err);
                ApplyOutcome::TargetMissing
            }
            Err(err) => {
                tracing::warn!("Failed to set weapon {} firing: {}", key.weapon_name, err);
                ApplyOutcome::HostFault
            }
        }
    }

    /// Tracked firing states.
    #[must_use]
    pub const fn tracked(&self) -> &TrackedState<WeaponKey, bool> {
        &self.tracked
    }

    /// Forgets every tracked weapon and restarts the period.
    pub fn reset(&mut self) {
        self.tracked.clear();
        self.timer.reset();
    }
}
