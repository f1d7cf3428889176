//! Serializable game snapshots
//!
//! The whole game state round-trips through serde, so a game can be saved
//! mid-stack and resumed later. Controllers are not part of the snapshot;
//! the host reattaches them on load. The RNG state is included, which keeps
//! a resumed game deterministic.

use crate::game::state::GameState;
use crate::{Result, RulesError};
use serde::{Deserialize, Serialize};

/// Bumped on breaking changes to the state layout.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct GameStateSnapshot {
    pub version: u32,
    pub state: GameState,
}

/// Serialize a game to a JSON snapshot.
pub fn save(state: &GameState) -> Result<String> {
    let snapshot = GameStateSnapshot {
        version: SNAPSHOT_VERSION,
        state: state.clone(),
    };
    serde_json::to_string(&snapshot).map_err(|e| RulesError::SerializationError(e.to_string()))
}

/// Restore a game from a JSON snapshot. Logger settings come back at their
/// defaults; callers reconfigure verbosity as needed.
pub fn load(json: &str) -> Result<GameState> {
    let snapshot: GameStateSnapshot =
        serde_json::from_str(json).map_err(|e| RulesError::SerializationError(e.to_string()))?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(RulesError::SerializationError(format!(
            "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
            snapshot.version
        )));
    }
    Ok(snapshot.state)
}
