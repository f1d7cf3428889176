//! The turn machine
//!
//! Walks the fixed step table, performing turn-based actions (untap, draw,
//! combat, cleanup) and running priority windows. A step's priority window
//! ends when both players pass in succession on an empty stack; a pass on
//! a non-empty stack resolves the top item and reopens the window.

use crate::core::{ObjectId, PlayerId};
use crate::game::actions;
use crate::game::bus;
use crate::game::combat;
use crate::game::controller::{with_retries, Controllers, GameStateView, PlayerAction};
use crate::game::events::GameEvent;
use crate::game::phase::Step;
use crate::game::stack;
use crate::game::state::GameState;
use crate::log_if_verbose;
use crate::zones::Zone;
use crate::Result;
use serde::{Deserialize, Serialize};

/// Why the game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEndReason {
    /// All but one player was eliminated.
    Elimination,
    /// Every player was eliminated at once.
    Draw,
    /// The configured turn limit was reached.
    TurnLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    pub winner: Option<PlayerId>,
    pub turns_played: u32,
    pub reason: GameEndReason,
}

/// Play a game to completion.
pub fn run_game(state: &mut GameState, controllers: &mut Controllers) -> Result<GameResult> {
    state
        .logger
        .log_minimal(&format!("game start: {} players", state.players.len()));
    deal_opening_hands(state)?;

    loop {
        if let Some(result) = finished(state) {
            return end(state, result);
        }
        if state.turn.turn_number > state.config.max_turns {
            return end(
                state,
                GameResult {
                    winner: None,
                    turns_played: state.config.max_turns,
                    reason: GameEndReason::TurnLimit,
                },
            );
        }
        run_turn(state, controllers)?;
        if let Some(result) = finished(state) {
            return end(state, result);
        }
        let next = state.next_player_after(state.turn.active_player);
        state.turn.next_turn(next);
    }
}

fn end(state: &mut GameState, result: GameResult) -> Result<GameResult> {
    match result.winner {
        Some(w) => state.logger.log_minimal(&format!(
            "{} wins on turn {}",
            state.player(w)?.name,
            result.turns_played
        )),
        None => state
            .logger
            .log_minimal(&format!("game ends with no winner ({:?})", result.reason)),
    }
    Ok(result)
}

fn finished(state: &GameState) -> Option<GameResult> {
    let remaining: Vec<PlayerId> = state
        .players
        .iter()
        .filter(|p| !p.eliminated)
        .map(|p| p.id)
        .collect();
    match remaining.len() {
        0 => Some(GameResult {
            winner: None,
            turns_played: state.turn.turn_number,
            reason: GameEndReason::Draw,
        }),
        1 => Some(GameResult {
            winner: Some(remaining[0]),
            turns_played: state.turn.turn_number,
            reason: GameEndReason::Elimination,
        }),
        _ => None,
    }
}

/// Run one full turn for the current active player.
pub fn run_turn(state: &mut GameState, controllers: &mut Controllers) -> Result<()> {
    let active = state.turn.active_player;
    state.logger.log_normal(&format!(
        "turn {} ({})",
        state.turn.turn_number,
        state.player(active)?.name
    ));

    loop {
        run_step(state, controllers)?;
        if finished(state).is_some() {
            return Ok(());
        }
        // Pools empty at every step and phase boundary.
        for p in state.players.iter_mut() {
            p.mana_pool.clear();
        }
        if !state.turn.advance_step() {
            return Ok(());
        }
    }
}

/// Execute the current step: turn-based actions, then a priority window if
/// the step grants one.
pub fn run_step(state: &mut GameState, controllers: &mut Controllers) -> Result<()> {
    let active = state.turn.active_player;
    let step = state.turn.step();
    let phase = state.turn.phase();

    // First-strike damage only exists when a first- or double-striker is
    // actually in combat.
    if step == Step::FirstStrikeDamage && !combat::has_first_strike_wave(state) {
        return Ok(());
    }

    log_if_verbose!(state.logger, "step: {phase:?}/{step:?}");
    bus::publish(
        state,
        controllers,
        GameEvent::BeginStep {
            phase,
            step,
            active,
        },
    )?;

    match step {
        Step::Untap => untap_step(state)?,
        Step::Draw => {
            let skip = state.turn.turn_number == 1 && !state.config.draw_on_first_turn;
            if !skip {
                bus::publish(state, controllers, GameEvent::Draw { player: active })?;
            }
        }
        Step::DeclareAttackers => combat::declare_attackers(state, controllers)?,
        Step::DeclareBlockers => combat::declare_blockers(state, controllers)?,
        Step::FirstStrikeDamage => combat::deal_combat_damage(state, controllers, true)?,
        Step::CombatDamage => combat::deal_combat_damage(state, controllers, false)?,
        _ => {}
    }

    if step.grants_priority() && finished(state).is_none() {
        priority_window(state, controllers)?;
    }

    match step {
        Step::EndCombat => combat::end_combat(state),
        Step::Cleanup => cleanup_step(state, controllers)?,
        _ => {}
    }

    bus::publish(
        state,
        controllers,
        GameEvent::EndStep {
            phase,
            step,
            active,
        },
    )?;
    Ok(())
}

/// Deal opening hands at the very start of a game. Hands a host already
/// stocked (scenario setups, resumed snapshots) are left alone, and these
/// card moves are not draws: no draw replacements or triggers apply.
fn deal_opening_hands(state: &mut GameState) -> Result<()> {
    if state.turn.turn_number != 1 || state.turn.step() != Step::Untap {
        return Ok(());
    }
    for i in 0..state.players.len() {
        let id = PlayerId::new(i as u8);
        if !state.player_zones(id)?.hand.is_empty() {
            continue;
        }
        for _ in 0..state.config.starting_hand_size {
            let Some(card) = state.player_zones_mut(id)?.library.draw_top() else {
                break;
            };
            state.player_zones_mut(id)?.hand.add(card);
            state.objects.get_mut(card)?.zone = Zone::Hand;
        }
        log_if_verbose!(
            state.logger,
            "{} draws an opening hand of {}",
            state.player(id)?.name,
            state.player_zones(id)?.hand.len()
        );
    }
    Ok(())
}

fn untap_step(state: &mut GameState) -> Result<()> {
    let active = state.turn.active_player;
    state.player_mut(active)?.reset_turn_state();
    for id in state.battlefield_ids() {
        let obj = state.objects.get_mut(id)?;
        if obj.controller == active {
            obj.untap();
            obj.summoning_sick = false;
        }
    }
    Ok(())
}

/// Discard to hand size, wipe marked damage, expire until-end-of-turn
/// effects. Triggers fired here reopen a priority window and the step
/// repeats until it completes quietly.
fn cleanup_step(state: &mut GameState, controllers: &mut Controllers) -> Result<()> {
    loop {
        let active = state.turn.active_player;
        let max = state.player(active)?.max_hand_size;
        while state.player_zones(active)?.hand.len() > max {
            let hand: Vec<ObjectId> = state.player_zones(active)?.hand.cards.clone();
            let retries = state.config.decision_retries;
            let view = GameStateView::new(state, active);
            let ctrl = controllers.get(active)?;
            let pick = with_retries(retries, "discard to hand size", || {
                let i = ctrl.choose_object(&view, "discard down to your hand size", &hand);
                hand.get(i).copied()
            })?;
            bus::publish(
                state,
                controllers,
                GameEvent::zone_change(pick, Zone::Hand, Zone::Graveyard),
            )?;
        }

        for id in state.battlefield_ids() {
            state.objects.get_mut(id)?.clear_damage();
        }
        state.continuous.expire_end_of_turn();

        // Normally nobody gets priority during cleanup; if something went
        // on the stack, hold a window and clean up again.
        if state.stack.is_empty() {
            return Ok(());
        }
        priority_window(state, controllers)?;
        if finished(state).is_some() {
            return Ok(());
        }
        state.turn.repeat_cleanup();
    }
}

/// One priority window. Ends when every player passes in succession on an
/// empty stack.
pub fn priority_window(state: &mut GameState, controllers: &mut Controllers) -> Result<()> {
    state.turn.reset_priority();
    let mut consecutive_errors = 0u32;

    while let Some(player) = state.turn.priority {
        if finished(state).is_some() {
            return Ok(());
        }
        if state.player(player)?.eliminated {
            pass(state, controllers, player)?;
            continue;
        }

        let available = actions::available_actions(state, player);
        let chosen = {
            let view = GameStateView::new(state, player);
            let ctrl = controllers.get(player)?;
            let idx = ctrl.choose_action(&view, &available);
            available
                .get(idx)
                .cloned()
                .unwrap_or(PlayerAction::PassPriority)
        };

        if chosen == PlayerAction::PassPriority {
            consecutive_errors = 0;
            pass(state, controllers, player)?;
            continue;
        }

        match actions::execute_action(state, controllers, player, &chosen) {
            Ok(()) => {
                consecutive_errors = 0;
                // Acting retains priority.
                state.turn.priority = Some(player);
                state.turn.last_passed = false;
            }
            Err(e) if e.is_recoverable() => {
                state
                    .logger
                    .log_normal(&format!("illegal action rejected: {e}"));
                consecutive_errors += 1;
                if consecutive_errors > state.config.decision_retries {
                    consecutive_errors = 0;
                    pass(state, controllers, player)?;
                }
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// A pass of priority. The second consecutive pass resolves the stack top
/// (reopening the window) or closes the window.
fn pass(state: &mut GameState, controllers: &mut Controllers, player: PlayerId) -> Result<()> {
    if state.turn.last_passed {
        if state.stack.is_empty() {
            state.turn.priority = None;
            state.turn.last_passed = false;
        } else {
            stack::resolve_top(state, controllers)?;
            state.turn.reset_priority();
        }
    } else {
        state.turn.last_passed = true;
        state.turn.priority = Some(state.next_player_after(player));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CardBuilder, CardType};
    use crate::game::scripted_controller::ScriptedController;
    use crate::game::state::GameConfig;
    use std::sync::Arc;

    fn vanilla(name: &str, p: i32, t: i32) -> Arc<crate::core::CardDefinition> {
        CardBuilder::new(name.to_lowercase().replace(' ', "-"), name)
            .card_type(CardType::Creature)
            .power_toughness(p, t)
            .build()
            .unwrap()
    }

    fn filler_library(state: &mut GameState, player: PlayerId, n: usize) {
        let card = vanilla("Filler Bear", 2, 2);
        for _ in 0..n {
            state.add_to_library(card.clone(), player).unwrap();
        }
    }

    #[test]
    fn test_attacker_wins_by_damage() {
        let mut state = GameState::new(GameConfig::default(), &["A", "B"]);
        let p0 = PlayerId::new(0);
        state.player_mut(PlayerId::new(1)).unwrap().life = 4;
        filler_library(&mut state, p0, 30);
        filler_library(&mut state, PlayerId::new(1), 30);
        let bears = state.add_to_battlefield(vanilla("Grizzly Bears", 2, 2), p0).unwrap();

        let mut a = ScriptedController::new();
        a.enqueue_attackers(vec![bears]);
        a.enqueue_attackers(vec![bears]);
        let mut b = ScriptedController::new();
        let mut ctrls = Controllers::new(vec![&mut a, &mut b]);

        let result = run_game(&mut state, &mut ctrls).unwrap();
        assert_eq!(result.winner, Some(p0));
        assert_eq!(result.reason, GameEndReason::Elimination);
        // Two attacks at 2 power against 4 life: turns 1 and 3.
        assert_eq!(result.turns_played, 3);
    }

    #[test]
    fn test_turn_limit_ends_game() {
        let mut state = GameState::new(
            GameConfig {
                max_turns: 4,
                ..GameConfig::default()
            },
            &["A", "B"],
        );
        filler_library(&mut state, PlayerId::new(0), 30);
        filler_library(&mut state, PlayerId::new(1), 30);

        let mut a = ScriptedController::new();
        let mut b = ScriptedController::new();
        let mut ctrls = Controllers::new(vec![&mut a, &mut b]);

        let result = run_game(&mut state, &mut ctrls).unwrap();
        assert_eq!(result.reason, GameEndReason::TurnLimit);
        assert_eq!(result.winner, None);
    }

    #[test]
    fn test_decking_loses() {
        let mut state = GameState::new(GameConfig::default(), &["A", "B"]);
        // Empty libraries: the first draw step eliminates its player.
        filler_library(&mut state, PlayerId::new(1), 30);

        let mut a = ScriptedController::new();
        let mut b = ScriptedController::new();
        let mut ctrls = Controllers::new(vec![&mut a, &mut b]);

        let result = run_game(&mut state, &mut ctrls).unwrap();
        // Player 0 skips the turn-1 draw, so turn 2 passes to player 1,
        // and player 0 decks on turn 3.
        assert_eq!(result.winner, Some(PlayerId::new(1)));
    }

    #[test]
    fn test_untap_clears_sickness_and_taps() {
        let mut state = GameState::new(GameConfig::default(), &["A", "B"]);
        let p0 = PlayerId::new(0);
        let bears = state.add_to_battlefield(vanilla("Grizzly Bears", 2, 2), p0).unwrap();
        state.objects.get_mut(bears).unwrap().tap();
        state.objects.get_mut(bears).unwrap().summoning_sick = true;

        untap_step(&mut state).unwrap();
        let obj = state.objects.get(bears).unwrap();
        assert!(!obj.tapped);
        assert!(!obj.summoning_sick);
    }
}
