//! Arena configuration and state machine.

use serde::{Deserialize, Serialize};

use crate::RatingConfig;

// ---------------------------------------------------------------------------
// ArenaConfig
// ---------------------------------------------------------------------------

/// Settings shared by every arena the server starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Rating update applied when a match ends.
    pub rating: RatingConfig,
}

// ---------------------------------------------------------------------------
// ArenaState
// ---------------------------------------------------------------------------

/// The lifecycle state of an arena.
///
/// ```text
/// Running → Ended
/// ```
///
/// - **Running**: ticks advance the simulation.
/// - **Ended**: outcomes and ratings have been applied; further ticks
///   are ignored and the matchmaker drops the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArenaState {
    Running,
    Ended,
}

impl ArenaState {
    /// Returns `true` while ticks still advance the game.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl std::fmt::Display for ArenaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "Running"),
            Self::Ended => write!(f, "Ended"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_state_is_running() {
        assert!(ArenaState::Running.is_running());
        assert!(!ArenaState::Ended.is_running());
    }

    #[test]
    fn test_arena_state_display() {
        assert_eq!(ArenaState::Running.to_string(), "Running");
        assert_eq!(ArenaState::Ended.to_string(), "Ended");
    }

    #[test]
    fn test_arena_config_from_partial_json() {
        let config: ArenaConfig = serde_json::from_str(r#"{"rating": {"k": 16}}"#).unwrap();
        assert_eq!(config.rating.k, 16.0);
        assert_eq!(config.rating.d, 400.0);
    }
}
