//! Error types (§7 ERROR HANDLING DESIGN).
//!
//! The engine's steady-state handlers are infallible; the one place
//! construction can fail is `Config::validate` / `ProtocolEngine::new`.
//! Following the teacher crate's own idiom of plain `impl std::error::Error`
//! types rather than reaching for a derive macro crate it never depended on.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An interval or timeout configured as zero (named by field).
    ZeroInterval(&'static str),
    InvalidSuspicionBounds { min_nanos: u128, max_nanos: u128 },
    ZeroIndependentSuspicions,
    ZeroGossipCount,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroInterval(field) => {
                write!(f, "{field} must be a non-zero duration")
            }
            ConfigError::InvalidSuspicionBounds {
                min_nanos,
                max_nanos,
            } => write!(
                f,
                "suspicion_timeout_min ({min_nanos}ns) must be <= suspicion_timeout_max ({max_nanos}ns)"
            ),
            ConfigError::ZeroIndependentSuspicions => {
                write!(f, "max_independent_suspicions must be at least 1")
            }
            ConfigError::ZeroGossipCount => {
                write!(f, "max_gossip_count_per_message must be at least 1")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
