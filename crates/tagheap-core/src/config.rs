//! Heap configuration.
//!
//! The operating mode is set either explicitly on [`HeapConfig`] or via the
//! `TAGHEAP_MODE` environment variable:
//! - `strict` (default): caller bugs fail loudly. Freeing an already-free
//!   block or resizing an unknown offset returns an error instead of being
//!   masked.
//! - `hardened`: caller bugs are absorbed. Double frees and unknown offsets
//!   are recorded in the lifecycle log and otherwise ignored, preserving the
//!   forgiving behavior some embedders rely on.

use serde::{Deserialize, Serialize};

/// Fault-handling mode for caller errors.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Report double frees and unknown offsets as errors.
    #[default]
    Strict,
    /// Log and ignore double frees and unknown offsets.
    Hardened,
}

impl Mode {
    /// Parse from string (case-insensitive, forgiving).
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "hardened" | "tolerant" | "masking" => Self::Hardened,
            _ => Self::Strict,
        }
    }

    /// Reads the mode from the `TAGHEAP_MODE` environment variable,
    /// defaulting to strict.
    #[must_use]
    pub fn from_env() -> Self {
        std::env::var("TAGHEAP_MODE")
            .map(|raw| Self::from_str_loose(&raw))
            .unwrap_or_default()
    }

    /// Returns true if caller bugs should be absorbed rather than reported.
    #[must_use]
    pub const fn masks_faults(self) -> bool {
        matches!(self, Self::Hardened)
    }
}

/// Tunable heap parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeapConfig {
    /// Growth quantum: the arena is extended by at least this many bytes.
    pub chunk_size: usize,
    /// Request sizes padded to a larger adjusted size. Churn-heavy request
    /// sizes in the replay workloads repack better with a little slack;
    /// purely a throughput/utilization knob, not a correctness requirement.
    pub padded_requests: Vec<(usize, usize)>,
    /// Fault-handling mode.
    pub mode: Mode,
}

/// Reference growth quantum.
pub const CHUNK_SIZE: usize = 4096;

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            padded_requests: vec![(112, 136), (448, 520)],
            mode: Mode::default(),
        }
    }
}

impl HeapConfig {
    /// Default parameters with the mode taken from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            mode: Mode::from_env(),
            ..Self::default()
        }
    }

    /// Returns the padded adjusted size for `request`, if one is configured.
    #[must_use]
    pub fn padding_for(&self, request: usize) -> Option<usize> {
        self.padded_requests
            .iter()
            .find(|(from, _)| *from == request)
            .map(|&(_, to)| to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!(Mode::from_str_loose("strict"), Mode::Strict);
        assert_eq!(Mode::from_str_loose("HARDENED"), Mode::Hardened);
        assert_eq!(Mode::from_str_loose("tolerant"), Mode::Hardened);
        assert_eq!(Mode::from_str_loose("gibberish"), Mode::Strict);
    }

    #[test]
    fn test_default_config() {
        let config = HeapConfig::default();
        assert_eq!(config.chunk_size, 4096);
        assert_eq!(config.padding_for(112), Some(136));
        assert_eq!(config.padding_for(448), Some(520));
        assert_eq!(config.padding_for(100), None);
        assert!(!config.mode.masks_faults());
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = HeapConfig {
            chunk_size: 8192,
            padded_requests: vec![(64, 72)],
            mode: Mode::Hardened,
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: HeapConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: HeapConfig = serde_json::from_str(r#"{"mode":"hardened"}"#).unwrap();
        assert_eq!(config.mode, Mode::Hardened);
        assert_eq!(config.chunk_size, 4096);
    }
}
