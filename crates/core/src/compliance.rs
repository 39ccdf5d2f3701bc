//! Compliance presets: named bundles of the knobs a regulated deployment
//! tends to turn on together, so an operator can write `mode = "hipaa"`
//! instead of enumerating every flag.
//!
//! Unlike the decorator this is modeled on, this subsystem's hash chain is
//! not an optional feature — every row is chained regardless of compliance
//! mode. A preset here only pre-fills `sync_writes` (bypass the async queue
//! so a write is durable before the request returns) and
//! `immutable_retention` (disable pruning entirely). Either can still be
//! overridden explicitly in config.

use serde::{Deserialize, Serialize};

/// A named compliance posture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceMode {
    /// No preset; knobs default to the throughput-favoring settings.
    #[default]
    None,
    /// SOC 2: writes are synchronous.
    Soc2,
    /// HIPAA: writes are synchronous and retention is disabled entirely.
    Hipaa,
}

impl std::fmt::Display for ComplianceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Soc2 => "soc2",
            Self::Hipaa => "hipaa",
        })
    }
}

/// The resolved knobs a [`ComplianceMode`] expands to, with room for an
/// operator to override individual fields after selecting a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComplianceConfig {
    /// The mode this config was built from.
    pub mode: ComplianceMode,
    /// Bypass the async queue: `event` writes through to the durable store
    /// before returning.
    pub sync_writes: bool,
    /// Force [`crate::retention::RetentionPolicy::none`] regardless of any
    /// configured `max_rows`/`max_age`.
    pub immutable_retention: bool,
}

impl ComplianceConfig {
    /// Build the default knob set for `mode`.
    #[must_use]
    pub fn new(mode: ComplianceMode) -> Self {
        match mode {
            ComplianceMode::None => Self {
                mode,
                sync_writes: false,
                immutable_retention: false,
            },
            ComplianceMode::Soc2 => Self {
                mode,
                sync_writes: true,
                immutable_retention: false,
            },
            ComplianceMode::Hipaa => Self {
                mode,
                sync_writes: true,
                immutable_retention: true,
            },
        }
    }

    /// Override `sync_writes` after construction.
    #[must_use]
    pub fn with_sync_writes(mut self, enabled: bool) -> Self {
        self.sync_writes = enabled;
        self
    }

    /// Override `immutable_retention` after construction.
    #[must_use]
    pub fn with_immutable_retention(mut self, enabled: bool) -> Self {
        self.immutable_retention = enabled;
        self
    }
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self::new(ComplianceMode::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_leaves_both_knobs_off() {
        let cfg = ComplianceConfig::new(ComplianceMode::None);
        assert!(!cfg.sync_writes);
        assert!(!cfg.immutable_retention);
    }

    #[test]
    fn soc2_forces_sync_writes_only() {
        let cfg = ComplianceConfig::new(ComplianceMode::Soc2);
        assert!(cfg.sync_writes);
        assert!(!cfg.immutable_retention);
    }

    #[test]
    fn hipaa_forces_sync_writes_and_immutable_retention() {
        let cfg = ComplianceConfig::new(ComplianceMode::Hipaa);
        assert!(cfg.sync_writes);
        assert!(cfg.immutable_retention);
    }

    #[test]
    fn overrides_apply_after_preset() {
        let cfg = ComplianceConfig::new(ComplianceMode::Hipaa).with_immutable_retention(false);
        assert!(cfg.sync_writes);
        assert!(!cfg.immutable_retention);
    }

    #[test]
    fn display_uses_snake_case_names() {
        assert_eq!(ComplianceMode::None.to_string(), "none");
        assert_eq!(ComplianceMode::Soc2.to_string(), "soc2");
        assert_eq!(ComplianceMode::Hipaa.to_string(), "hipaa");
    }
}
