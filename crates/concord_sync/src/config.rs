//! # Sync Configuration
//!
//! Sampling periods, thresholds and the batch window, loaded once at startup.
//!
//! ```toml
//! fallback_peer_name = "Unknown"
//!
//! [structure]
//! sample_interval_secs = 1.0
//! damage_threshold = 0.01
//!
//! [part_damage]
//! sample_interval_secs = 0.0   # every tick
//! damage_threshold = 0.1
//! batch_window_secs = 0.1
//! destruction_damage = 9999.0
//!
//! [weapon]
//! sample_interval_secs = 0.2
//! ```
//!
//! Every field is optional; missing fields take the defaults above.

use std::path::Path;
use std::time::Duration;

use concord_protocol::PART_DESTROYED_DAMAGE;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Structure damage detector settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StructureSyncConfig {
    /// Seconds between sampling passes.
    pub sample_interval_secs: f64,
    /// Minimum damage-fraction change that triggers a broadcast (exclusive).
    pub damage_threshold: f32,
}

impl Default for StructureSyncConfig {
    fn default() -> Self {
        Self {
            sample_interval_secs: 1.0,
            damage_threshold: 0.01,
        }
    }
}

/// Part damage detector and batch settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PartDamageSyncConfig {
    /// Seconds between sampling passes; zero samples every tick.
    pub sample_interval_secs: f64,
    /// Minimum damage change that triggers a broadcast (exclusive).
    pub damage_threshold: f32,
    /// Seconds pending part-damage deltas are held before flushing.
    pub batch_window_secs: f64,
    /// Received damage at or above this marks the owning vessel for destruction.
    pub destruction_damage: f32,
}

impl Default for PartDamageSyncConfig {
    fn default() -> Self {
        Self {
            sample_interval_secs: 0.0,
            damage_threshold: 0.1,
            batch_window_secs: 0.1,
            destruction_damage: PART_DESTROYED_DAMAGE,
        }
    }
}

/// Weapon firing detector settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WeaponSyncConfig {
    /// Seconds between sampling passes.
    pub sample_interval_secs: f64,
}

impl Default for WeaponSyncConfig {
    fn default() -> Self {
        Self {
            sample_interval_secs: 0.2,
        }
    }
}

/// Complete sync configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Peer name used when the transport does not report one.
    pub fallback_peer_name: String,
    /// Structure damage settings.
    pub structure: StructureSyncConfig,
    /// Part damage settings.
    pub part_damage: PartDamageSyncConfig,
    /// Weapon firing settings.
    pub weapon: WeaponSyncConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            fallback_peer_name: "Unknown".to_owned(),
            structure: StructureSyncConfig::default(),
            part_damage: PartDamageSyncConfig::default(),
            weapon: WeaponSyncConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown fields and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`SyncConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Checks every value is in range.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_interval("structure.sample_interval_secs", self.structure.sample_interval_secs)?;
        check_threshold("structure.damage_threshold", self.structure.damage_threshold)?;
        check_interval("part_damage.sample_interval_secs", self.part_damage.sample_interval_secs)?;
        check_threshold("part_damage.damage_threshold", self.part_damage.damage_threshold)?;
        check_interval("part_damage.batch_window_secs", self.part_damage.batch_window_secs)?;
        check_interval("weapon.sample_interval_secs", self.weapon.sample_interval_secs)?;

        let destruction = self.part_damage.destruction_damage;
        if !destruction.is_finite() || destruction <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "part_damage.destruction_damage must be positive, got {destruction}"
            )));
        }
        Ok(())
    }

    /// Structure sampling period.
    #[must_use]
    pub fn structure_interval(&self) -> Duration {
        Duration::from_secs_f64(self.structure.sample_interval_secs)
    }

    /// Part damage sampling period.
    #[must_use]
    pub fn part_damage_interval(&self) -> Duration {
        Duration::from_secs_f64(self.part_damage.sample_interval_secs)
    }

    /// Part damage batch window.
    #[must_use]
    pub fn batch_window(&self) -> Duration {
        Duration::from_secs_f64(self.part_damage.batch_window_secs)
    }

    /// Weapon sampling period.
    #[must_use]
    pub fn weapon_interval(&self) -> Duration {
        Duration::from_secs_f64(self.weapon.sample_interval_secs)
    }
}

fn check_interval(field: &str, value: f64) -> Result<(), ConfigError> {
    // Upper bound keeps Duration::from_secs_f64 from panicking.
    if value.is_finite() && (0.0..=86_400.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{field} must be between 0 and 86400 seconds, got {value}"
        )))
    }
}

fn check_threshold(field: &str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{field} must be a non-negative number, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.structure_interval(), Duration::from_secs(1));
        assert_eq!(config.weapon_interval(), Duration::from_millis(200));
        assert_eq!(config.batch_window(), Duration::from_millis(100));
        assert_eq!(config.part_damage_interval(), Duration::ZERO);
        assert_eq!(config.fallback_peer_name, "Unknown");
        assert!((config.part_damage.destruction_damage - 9999.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = SyncConfig::from_toml_str("").unwrap();
        assert_eq!(config, SyncConfig::default());
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let config = SyncConfig::from_toml_str(
            r#"
            fallback_peer_name = "Observer"

            [structure]
            damage_threshold = 0.05

            [part_damage]
            batch_window_secs = 0.25
            "#,
        )
        .unwrap();

        assert_eq!(config.fallback_peer_name, "Observer");
        assert!((config.structure.damage_threshold - 0.05).abs() < f32::EPSILON);
        assert_eq!(config.structure_interval(), Duration::from_secs(1));
        assert_eq!(config.batch_window(), Duration::from_millis(250));
        assert_eq!(config.weapon, WeaponSyncConfig::default());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = SyncConfig::from_toml_str("[weapon]\nsample_interval = 0.5\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_negative_interval_rejected() {
        let result = SyncConfig::from_toml_str("[weapon]\nsample_interval_secs = -1.0\n");
        match result {
            Err(ConfigError::Invalid(message)) => {
                assert!(message.contains("weapon.sample_interval_secs"));
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let mut config = SyncConfig::default();
        config.part_damage.damage_threshold = -0.1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_destruction_damage_rejected() {
        let mut config = SyncConfig::default();
        config.part_damage.destruction_damage = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_serialized_default_parses_back() {
        let text = toml::to_string(&SyncConfig::default()).unwrap();
        assert_eq!(SyncConfig::from_toml_str(&text).unwrap(), SyncConfig::default());
    }

    #[test]
    fn test_load_missing_file() {
        let result = SyncConfig::load("/nonexistent/concord/sync.toml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
