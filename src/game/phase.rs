//! Turn phases, steps, and the priority state machine

use crate::core::PlayerId;
use serde::{Deserialize, Serialize};

/// Major phases of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Beginning,
    PrecombatMain,
    Combat,
    PostcombatMain,
    Ending,
}

/// Steps within phases. `Main` occurs in both main phases; the (phase, step)
/// pair is what identifies a turn position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Step {
    Untap,
    Upkeep,
    Draw,
    Main,
    BeginCombat,
    DeclareAttackers,
    DeclareBlockers,
    /// Executes only when a first- or double-striker is in combat;
    /// otherwise it is a no-op position in the table.
    FirstStrikeDamage,
    CombatDamage,
    EndCombat,
    End,
    Cleanup,
}

/// The fixed (phase, step) order of a turn. The turn machine is an index
/// into this table; any other combination is an invariant violation.
pub const TURN_ORDER: [(Phase, Step); 13] = [
    (Phase::Beginning, Step::Untap),
    (Phase::Beginning, Step::Upkeep),
    (Phase::Beginning, Step::Draw),
    (Phase::PrecombatMain, Step::Main),
    (Phase::Combat, Step::BeginCombat),
    (Phase::Combat, Step::DeclareAttackers),
    (Phase::Combat, Step::DeclareBlockers),
    (Phase::Combat, Step::FirstStrikeDamage),
    (Phase::Combat, Step::CombatDamage),
    (Phase::Combat, Step::EndCombat),
    (Phase::PostcombatMain, Step::Main),
    (Phase::Ending, Step::End),
    (Phase::Ending, Step::Cleanup),
];

impl Step {
    /// No player receives priority during these steps.
    pub fn grants_priority(&self) -> bool {
        !matches!(self, Step::Untap | Step::Cleanup)
    }
}

/// Turn and priority state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnState {
    /// Starts at 1.
    pub turn_number: u32,
    pub active_player: PlayerId,
    /// Index into [`TURN_ORDER`].
    step_index: usize,
    /// Who currently holds priority (None outside priority windows).
    pub priority: Option<PlayerId>,
    /// Set when the previous priority holder passed without acting; a
    /// second consecutive pass resolves the stack top or advances the step.
    pub last_passed: bool,
}

impl TurnState {
    pub fn new(starting_player: PlayerId) -> Self {
        TurnState {
            turn_number: 1,
            active_player: starting_player,
            step_index: 0,
            priority: None,
            last_passed: false,
        }
    }

    pub fn phase(&self) -> Phase {
        TURN_ORDER[self.step_index].0
    }

    pub fn step(&self) -> Step {
        TURN_ORDER[self.step_index].1
    }

    /// Advance one position in the table; false at end of turn.
    pub fn advance_step(&mut self) -> bool {
        if self.step_index + 1 < TURN_ORDER.len() {
            self.step_index += 1;
            self.priority = None;
            self.last_passed = false;
            true
        } else {
            false
        }
    }

    /// Does advancing one position cross a phase boundary?
    pub fn next_step_changes_phase(&self) -> bool {
        self.step_index + 1 < TURN_ORDER.len()
            && TURN_ORDER[self.step_index + 1].0 != TURN_ORDER[self.step_index].0
    }

    pub fn next_turn(&mut self, next_player: PlayerId) {
        self.turn_number += 1;
        self.active_player = next_player;
        self.step_index = 0;
        self.priority = None;
        self.last_passed = false;
    }

    /// Re-enter the cleanup step (extra cleanup after cleanup triggers).
    pub fn repeat_cleanup(&mut self) {
        debug_assert_eq!(self.step(), Step::Cleanup);
        self.priority = None;
        self.last_passed = false;
    }

    /// Give priority to the active player and clear the pass marker
    /// (start of each step/phase, and after each resolution).
    pub fn reset_priority(&mut self) {
        self.priority = Some(self.active_player);
        self.last_passed = false;
    }

    /// Sorcery timing: the given player's main phase.
    pub fn is_main_phase_of(&self, player: PlayerId) -> bool {
        self.active_player == player
            && matches!(self.phase(), Phase::PrecombatMain | Phase::PostcombatMain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_walk() {
        let mut turn = TurnState::new(PlayerId::new(0));
        assert_eq!(turn.phase(), Phase::Beginning);
        assert_eq!(turn.step(), Step::Untap);

        let mut steps = 1;
        while turn.advance_step() {
            steps += 1;
        }
        assert_eq!(steps, TURN_ORDER.len());
        assert_eq!(turn.step(), Step::Cleanup);
    }

    #[test]
    fn test_main_occurs_twice() {
        let mains = TURN_ORDER
            .iter()
            .filter(|(_, s)| *s == Step::Main)
            .count();
        assert_eq!(mains, 2);
    }

    #[test]
    fn test_phase_boundary_detection() {
        let mut turn = TurnState::new(PlayerId::new(0));
        // Untap -> Upkeep stays in Beginning.
        assert!(!turn.next_step_changes_phase());
        turn.advance_step();
        turn.advance_step();
        // Draw -> Main crosses into PrecombatMain.
        assert_eq!(turn.step(), Step::Draw);
        assert!(turn.next_step_changes_phase());
    }

    #[test]
    fn test_next_turn_resets() {
        let mut turn = TurnState::new(PlayerId::new(0));
        while turn.advance_step() {}
        turn.next_turn(PlayerId::new(1));

        assert_eq!(turn.turn_number, 2);
        assert_eq!(turn.active_player, PlayerId::new(1));
        assert_eq!(turn.step(), Step::Untap);
        assert!(turn.priority.is_none());
    }

    #[test]
    fn test_priority_steps() {
        assert!(!Step::Untap.grants_priority());
        assert!(!Step::Cleanup.grants_priority());
        assert!(Step::Upkeep.grants_priority());
        assert!(Step::Main.grants_priority());
    }
}
