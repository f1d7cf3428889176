//! Per-player state

use crate::core::entity::{ObjectId, PlayerId};
use crate::core::ManaPool;
use serde::{Deserialize, Serialize};

/// Mutable per-player state. Zone contents live in `zones::PlayerZones`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: PlayerId,
    pub name: String,

    /// May go negative transiently; SBAs pick it up after the event drain.
    pub life: i32,
    pub mana_pool: ManaPool,
    pub max_hand_size: usize,
    pub eliminated: bool,
    pub lands_played_this_turn: u32,
    pub lands_per_turn: u32,

    /// Set when a draw from an empty library happened; consumed by SBAs.
    pub drew_from_empty_library: bool,

    // Commander variant
    pub commander: Option<ObjectId>,
    /// Additional {2} per previous cast from the command zone.
    pub commander_tax: u32,
    /// Combat damage taken per enemy commander (21+ from one loses).
    pub commander_damage: Vec<(ObjectId, u32)>,
}

impl PlayerState {
    pub fn new(id: PlayerId, name: impl Into<String>, starting_life: i32) -> Self {
        PlayerState {
            id,
            name: name.into(),
            life: starting_life,
            mana_pool: ManaPool::new(),
            max_hand_size: 7,
            eliminated: false,
            lands_played_this_turn: 0,
            lands_per_turn: 1,
            drew_from_empty_library: false,
            commander: None,
            commander_tax: 0,
            commander_damage: Vec::new(),
        }
    }

    pub fn can_play_land(&self) -> bool {
        self.lands_played_this_turn < self.lands_per_turn
    }

    pub fn reset_turn_state(&mut self) {
        self.lands_played_this_turn = 0;
    }

    pub fn commander_damage_from(&self, commander: ObjectId) -> u32 {
        self.commander_damage
            .iter()
            .find(|(id, _)| *id == commander)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    pub fn note_commander_damage(&mut self, commander: ObjectId, amount: u32) {
        if let Some((_, n)) = self
            .commander_damage
            .iter_mut()
            .find(|(id, _)| *id == commander)
        {
            *n += amount;
        } else {
            self.commander_damage.push((commander, amount));
        }
    }
}
