//! Player controller trait and game state view
//!
//! The engine drives all rules; controllers only answer questions. Every
//! decision point goes through this trait, so a game is fully determined
//! by (seed, decklists, controller answers). Controllers are threaded
//! through engine calls rather than stored on the state, which keeps the
//! state serializable.

use crate::core::{ManaPool, ModalConstraint, ObjectId, PlayerId, TargetRef};
use crate::game::combat::Defender;
use crate::game::layers::CharacteristicsMap;
use crate::game::phase::{Phase, Step};
use crate::game::stack::StackItem;
use crate::game::state::GameState;
use crate::{Result, RulesError};

/// Actions available to the priority holder.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerAction {
    /// Play a land card from hand (special action, does not use the stack).
    PlayLand(ObjectId),

    /// Cast a spell. Targets and modes are chosen during the casting
    /// pipeline, not here.
    CastSpell {
        object: ObjectId,
        /// Index into the definition's alternative cost list; None casts
        /// for the base cost.
        alternative: Option<usize>,
    },

    /// Activate an activated ability of a permanent.
    ActivateAbility {
        source: ObjectId,
        ability_index: usize,
    },

    PassPriority,
}

/// Read-only view of the game from one player's perspective.
pub struct GameStateView<'a> {
    game: &'a GameState,
    player_id: PlayerId,
}

impl<'a> GameStateView<'a> {
    pub fn new(game: &'a GameState, player_id: PlayerId) -> Self {
        GameStateView { game, player_id }
    }

    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    pub fn hand(&self) -> &[ObjectId] {
        self.game
            .player_zones(self.player_id)
            .map(|z| z.hand.cards.as_slice())
            .unwrap_or(&[])
    }

    pub fn graveyard(&self) -> &[ObjectId] {
        self.game
            .player_zones(self.player_id)
            .map(|z| z.graveyard.cards.as_slice())
            .unwrap_or(&[])
    }

    pub fn battlefield(&self) -> &[ObjectId] {
        &self.game.battlefield.cards
    }

    pub fn stack(&self) -> &[StackItem] {
        &self.game.stack
    }

    pub fn life(&self) -> i32 {
        self.game
            .player(self.player_id)
            .map(|p| p.life)
            .unwrap_or(0)
    }

    pub fn life_of(&self, player: PlayerId) -> i32 {
        self.game.player(player).map(|p| p.life).unwrap_or(0)
    }

    pub fn mana_pool(&self) -> ManaPool {
        self.game
            .player(self.player_id)
            .map(|p| p.mana_pool)
            .unwrap_or_default()
    }

    pub fn turn_number(&self) -> u32 {
        self.game.turn.turn_number
    }

    pub fn phase(&self) -> Phase {
        self.game.turn.phase()
    }

    pub fn step(&self) -> Step {
        self.game.turn.step()
    }

    pub fn active_player(&self) -> PlayerId {
        self.game.turn.active_player
    }

    pub fn card_name(&self, id: ObjectId) -> Option<String> {
        self.game.objects.get(id).ok().map(|o| o.def.name.to_string())
    }

    pub fn is_tapped(&self, id: ObjectId) -> bool {
        self.game.objects.get(id).map(|o| o.tapped).unwrap_or(false)
    }

    /// Effective characteristics of battlefield objects (layer-evaluated).
    pub fn characteristics(&self) -> CharacteristicsMap {
        self.game.characteristics()
    }
}

/// Decision interface. Every method is prompted with the legal candidates;
/// an out-of-range answer is re-prompted up to the configured retry count
/// and then rejected.
pub trait PlayerController {
    /// Pick one of the available actions (index into `available`).
    fn choose_action(&mut self, view: &GameStateView, available: &[PlayerAction]) -> usize;

    /// Fill one target slot. `None` is only accepted for optional slots.
    fn choose_target(
        &mut self,
        view: &GameStateView,
        source: ObjectId,
        slot: usize,
        candidates: &[TargetRef],
        optional: bool,
    ) -> Option<usize>;

    /// Choose mode indices for a modal spell.
    fn choose_modes(
        &mut self,
        view: &GameStateView,
        source: ObjectId,
        mode_descriptions: &[String],
        constraint: ModalConstraint,
    ) -> Vec<usize>;

    /// Order simultaneous triggers you control (indices into `items`; the
    /// first listed resolves last). Identity order when not overridden.
    fn choose_order(&mut self, _view: &GameStateView, items: &[StackItem]) -> Vec<usize> {
        (0..items.len()).collect()
    }

    /// Pick one object (legend to keep, permanent to sacrifice, card to
    /// discard, ...).
    fn choose_object(
        &mut self,
        view: &GameStateView,
        prompt: &str,
        candidates: &[ObjectId],
    ) -> usize;

    /// Yes/no question (optional trigger, optional replacement).
    fn choose_yes_no(&mut self, view: &GameStateView, prompt: &str) -> bool;

    /// Declare attacks as (attacker, defender) pairs from the legal
    /// candidate and defender sets.
    fn declare_attackers(
        &mut self,
        view: &GameStateView,
        candidates: &[ObjectId],
        defenders: &[Defender],
    ) -> Vec<(ObjectId, Defender)>;

    /// Declare blocks as (blocker, attacker) pairs.
    fn declare_blockers(
        &mut self,
        view: &GameStateView,
        attackers: &[ObjectId],
        candidates: &[ObjectId],
    ) -> Vec<(ObjectId, ObjectId)>;

    /// Notification: the game ended.
    fn on_game_end(&mut self, _view: &GameStateView, _winner: Option<PlayerId>) {}
}

/// The set of controllers for one game, indexed by player.
pub struct Controllers<'a> {
    controllers: Vec<&'a mut dyn PlayerController>,
}

impl<'a> Controllers<'a> {
    pub fn new(controllers: Vec<&'a mut dyn PlayerController>) -> Self {
        Controllers { controllers }
    }

    pub fn get(&mut self, player: PlayerId) -> Result<&mut (dyn PlayerController + 'a)> {
        let idx = player.index();
        match self.controllers.get_mut(idx) {
            Some(c) => Ok(&mut **c),
            None => Err(RulesError::InvariantViolation(format!(
                "no controller for {player}"
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}

/// Re-prompt a decision until it validates or retries run out.
pub(crate) fn with_retries<T>(
    retries: u32,
    what: &str,
    mut attempt: impl FnMut() -> Option<T>,
) -> Result<T> {
    for _ in 0..=retries {
        if let Some(v) = attempt() {
            return Ok(v);
        }
    }
    Err(RulesError::DecisionError(format!(
        "no valid {what} after {retries} retries"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_retries_succeeds_eventually() {
        let mut n = 0;
        let result = with_retries(3, "pick", || {
            n += 1;
            if n == 3 {
                Some(n)
            } else {
                None
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_with_retries_gives_up() {
        let result: Result<u32> = with_retries(2, "pick", || None);
        assert!(matches!(result, Err(RulesError::DecisionError(_))));
    }
}
