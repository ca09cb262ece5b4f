//! Engine tuning knobs.
//!
//! Everything here has a sensible default; a deployment overrides only what
//! it cares about, either programmatically through the `with_*` builders or
//! by merging a TOML fragment. Retry and timeout budgets for the generation
//! service live on the service client itself, not here.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading an engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML could not be parsed.
    #[error("engine config parse failed: {0}")]
    Parse(#[from] toml::de::Error),

    /// The TOML parsed but a value is unusable.
    #[error("engine config invalid: {reason}")]
    Invalid {
        /// What was wrong.
        reason: String,
    },
}

/// Configuration for one [`MigrationEngine`].
///
/// [`MigrationEngine`]: crate::engine::MigrationEngine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ask the generation service for bundling advice before planning.
    pub advisory_enabled: bool,
    /// Ask the generation service for a prose narrative after packaging.
    pub narrative_enabled: bool,
    /// Priority assigned to the first plugin of each phase.
    pub priority_ceiling: i64,
    /// Priority decrement between consecutive plugins of one phase.
    pub priority_step: i64,
    /// File name quoted in deployment commands of the remediation plan.
    pub config_file: String,
    /// Baseline confidence for table-backed direct migrations.
    pub direct_confidence: f64,
}

impl EngineConfig {
    /// The default configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from a TOML document; absent keys keep their
    /// defaults.
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] on malformed TOML and
    /// [`ConfigError::Invalid`] on out-of-range values.
    pub fn from_toml_str(toml_src: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_src)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.direct_confidence.is_nan() || !(0.0..=1.0).contains(&self.direct_confidence) {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "direct_confidence {} outside [0.0, 1.0]",
                    self.direct_confidence
                ),
            });
        }
        if self.priority_step < 1 {
            return Err(ConfigError::Invalid {
                reason: format!("priority_step {} must be at least 1", self.priority_step),
            });
        }
        if self.config_file.trim().is_empty() {
            return Err(ConfigError::Invalid {
                reason: "config_file must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Toggle bundling advice.
    #[inline]
    #[must_use]
    pub fn with_advisory_enabled(mut self, enabled: bool) -> Self {
        self.advisory_enabled = enabled;
        self
    }

    /// Toggle the prose narrative.
    #[inline]
    #[must_use]
    pub fn with_narrative_enabled(mut self, enabled: bool) -> Self {
        self.narrative_enabled = enabled;
        self
    }

    /// Override the priority ceiling.
    #[inline]
    #[must_use]
    pub fn with_priority_ceiling(mut self, ceiling: i64) -> Self {
        self.priority_ceiling = ceiling;
        self
    }

    /// Override the priority step; values below 1 are raised to 1.
    #[inline]
    #[must_use]
    pub fn with_priority_step(mut self, step: i64) -> Self {
        self.priority_step = step.max(1);
        self
    }

    /// Override the config file name used in deployment commands.
    #[inline]
    #[must_use]
    pub fn with_config_file(mut self, name: impl Into<String>) -> Self {
        self.config_file = name.into();
        self
    }

    /// Override the direct baseline, clamped to `[0.0, 1.0]`; NaN becomes 0.
    #[inline]
    #[must_use]
    pub fn with_direct_confidence(mut self, confidence: f64) -> Self {
        self.direct_confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            advisory_enabled: true,
            narrative_enabled: true,
            priority_ceiling: 1000,
            priority_step: 10,
            config_file: "kong.yaml".into(),
            direct_confidence: 0.9,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_complete() {
        let config = EngineConfig::new();
        assert!(config.advisory_enabled);
        assert!(config.narrative_enabled);
        assert_eq!(config.priority_ceiling, 1000);
        assert_eq!(config.priority_step, 10);
        assert_eq!(config.config_file, "kong.yaml");
        assert_eq!(config.direct_confidence, 0.9);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            advisory_enabled = false
            config_file = "gateway.yaml"
            "#,
        )
        .unwrap();
        assert!(!config.advisory_enabled);
        assert_eq!(config.config_file, "gateway.yaml");
        assert_eq!(config.priority_ceiling, 1000);
    }

    #[test]
    fn out_of_range_confidence_rejected() {
        let err = EngineConfig::from_toml_str("direct_confidence = 1.5").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn zero_step_rejected_in_toml_but_clamped_by_builder() {
        assert!(EngineConfig::from_toml_str("priority_step = 0").is_err());
        let config = EngineConfig::new().with_priority_step(0);
        assert_eq!(config.priority_step, 1);
    }

    #[test]
    fn builders_chain() {
        let config = EngineConfig::new()
            .with_advisory_enabled(false)
            .with_narrative_enabled(false)
            .with_priority_ceiling(2000)
            .with_config_file("kong.yml");
        assert!(!config.advisory_enabled);
        assert!(!config.narrative_enabled);
        assert_eq!(config.priority_ceiling, 2000);
        assert_eq!(config.config_file, "kong.yml");
    }
}
