//! Scripted controller for deterministic tests
//!
//! Each decision kind has its own queue; when a queue runs dry the
//! controller falls back to a safe default (pass priority, first
//! candidate, accept). Scripts therefore only need to spell out the
//! decisions a test cares about.

use crate::core::{ModalConstraint, ObjectId, TargetRef};
use crate::game::combat::Defender;
use crate::game::controller::{GameStateView, PlayerAction, PlayerController};
use crate::game::stack::StackItem;
use std::collections::VecDeque;

#[derive(Debug, Default)]
pub struct ScriptedController {
    actions: VecDeque<PlayerAction>,
    targets: VecDeque<Option<TargetRef>>,
    modes: VecDeque<Vec<usize>>,
    yes_no: VecDeque<bool>,
    object_choices: VecDeque<ObjectId>,
    attack_declarations: VecDeque<Vec<(ObjectId, Option<Defender>)>>,
    block_declarations: VecDeque<Vec<(ObjectId, ObjectId)>>,
}

impl ScriptedController {
    pub fn new() -> Self {
        ScriptedController::default()
    }

    pub fn enqueue_action(&mut self, action: PlayerAction) -> &mut Self {
        self.actions.push_back(action);
        self
    }

    pub fn enqueue_target(&mut self, target: Option<TargetRef>) -> &mut Self {
        self.targets.push_back(target);
        self
    }

    pub fn enqueue_modes(&mut self, modes: Vec<usize>) -> &mut Self {
        self.modes.push_back(modes);
        self
    }

    pub fn enqueue_yes_no(&mut self, answer: bool) -> &mut Self {
        self.yes_no.push_back(answer);
        self
    }

    pub fn enqueue_object(&mut self, object: ObjectId) -> &mut Self {
        self.object_choices.push_back(object);
        self
    }

    /// Queue attackers that all go at the first legal defender.
    pub fn enqueue_attackers(&mut self, attackers: Vec<ObjectId>) -> &mut Self {
        self.attack_declarations
            .push_back(attackers.into_iter().map(|id| (id, None)).collect());
        self
    }

    /// Queue attacks with explicit defenders.
    pub fn enqueue_attacks(&mut self, attacks: Vec<(ObjectId, Defender)>) -> &mut Self {
        self.attack_declarations
            .push_back(attacks.into_iter().map(|(id, d)| (id, Some(d))).collect());
        self
    }

    pub fn enqueue_blocks(&mut self, blocks: Vec<(ObjectId, ObjectId)>) -> &mut Self {
        self.block_declarations.push_back(blocks);
        self
    }
}

fn pass_index(available: &[PlayerAction]) -> usize {
    available
        .iter()
        .position(|a| *a == PlayerAction::PassPriority)
        .unwrap_or(0)
}

impl PlayerController for ScriptedController {
    fn choose_action(&mut self, _view: &GameStateView, available: &[PlayerAction]) -> usize {
        match self.actions.pop_front() {
            Some(scripted) => available
                .iter()
                .position(|a| *a == scripted)
                .unwrap_or_else(|| pass_index(available)),
            None => pass_index(available),
        }
    }

    fn choose_target(
        &mut self,
        _view: &GameStateView,
        _source: ObjectId,
        _slot: usize,
        candidates: &[TargetRef],
        optional: bool,
    ) -> Option<usize> {
        match self.targets.pop_front() {
            Some(Some(scripted)) => candidates.iter().position(|c| *c == scripted),
            Some(None) => {
                if optional {
                    None
                } else {
                    Some(0)
                }
            }
            // Unscripted: first candidate.
            None => Some(0),
        }
    }

    fn choose_modes(
        &mut self,
        _view: &GameStateView,
        _source: ObjectId,
        _mode_descriptions: &[String],
        _constraint: ModalConstraint,
    ) -> Vec<usize> {
        self.modes.pop_front().unwrap_or_else(|| vec![0])
    }

    fn choose_order(&mut self, _view: &GameStateView, items: &[StackItem]) -> Vec<usize> {
        (0..items.len()).collect()
    }

    fn choose_object(
        &mut self,
        _view: &GameStateView,
        _prompt: &str,
        candidates: &[ObjectId],
    ) -> usize {
        match self.object_choices.pop_front() {
            Some(scripted) => candidates.iter().position(|c| *c == scripted).unwrap_or(0),
            None => 0,
        }
    }

    fn choose_yes_no(&mut self, _view: &GameStateView, _prompt: &str) -> bool {
        self.yes_no.pop_front().unwrap_or(true)
    }

    fn declare_attackers(
        &mut self,
        _view: &GameStateView,
        _candidates: &[ObjectId],
        defenders: &[Defender],
    ) -> Vec<(ObjectId, Defender)> {
        self.attack_declarations
            .pop_front()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(id, d)| Some((id, d.or_else(|| defenders.first().copied())?)))
            .collect()
    }

    fn declare_blockers(
        &mut self,
        _view: &GameStateView,
        _attackers: &[ObjectId],
        _candidates: &[ObjectId],
    ) -> Vec<(ObjectId, ObjectId)> {
        self.block_declarations.pop_front().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{GameConfig, GameState};
    use crate::core::PlayerId;

    #[test]
    fn test_defaults_pass_and_pick_first() {
        let state = GameState::new(GameConfig::default(), &["A"]);
        let view = GameStateView::new(&state, PlayerId::new(0));
        let mut ctrl = ScriptedController::new();

        let available = vec![
            PlayerAction::PlayLand(ObjectId::new(1)),
            PlayerAction::PassPriority,
        ];
        assert_eq!(ctrl.choose_action(&view, &available), 1);

        let candidates = vec![TargetRef::Player(PlayerId::new(0))];
        assert_eq!(ctrl.choose_target(&view, ObjectId::new(9), 0, &candidates, false), Some(0));
        assert!(ctrl.choose_yes_no(&view, "?"));
    }

    #[test]
    fn test_scripted_action_found_by_equality() {
        let state = GameState::new(GameConfig::default(), &["A"]);
        let view = GameStateView::new(&state, PlayerId::new(0));
        let mut ctrl = ScriptedController::new();
        ctrl.enqueue_action(PlayerAction::PlayLand(ObjectId::new(4)));

        let available = vec![
            PlayerAction::PassPriority,
            PlayerAction::PlayLand(ObjectId::new(4)),
        ];
        assert_eq!(ctrl.choose_action(&view, &available), 1);
        // Queue exhausted: falls back to pass.
        assert_eq!(ctrl.choose_action(&view, &available), 0);
    }
}
