//! Combat: attacker/blocker declaration and damage assignment
//!
//! Damage happens in up to two waves. The first-strike wave runs when any
//! combatant has first or double strike; creatures that die there deal
//! nothing in the normal wave. Each wave is one simultaneous event batch,
//! so triggers and state-based actions see it whole.

use crate::core::{CardType, Keyword, ObjectId, PlayerId};
use crate::game::bus;
use crate::game::controller::{Controllers, GameStateView};
use crate::game::events::GameEvent;
use crate::game::layers::{self, Characteristics, CharacteristicsMap};
use crate::game::state::GameState;
use crate::log_if_verbose;
use crate::{Result, RulesError};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// What an attacker was declared against: an opponent, or a planeswalker an
/// opponent controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Defender {
    Player(PlayerId),
    Planeswalker(ObjectId),
}

impl Defender {
    /// The player who declares blockers against attacks on this defender.
    pub fn defending_player(&self, state: &GameState) -> Option<PlayerId> {
        match self {
            Defender::Player(p) => Some(*p),
            Defender::Planeswalker(id) => state.objects.get(*id).ok().map(|o| o.controller),
        }
    }
}

/// Combat state for the current turn's combat phase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CombatState {
    /// Each attacker and what it attacks.
    pub attackers: Vec<(ObjectId, Defender)>,
    /// Blocker/attacker pairs, in declaration order. A blocker appears at
    /// most once; an attacker may appear many times.
    pub blocks: Vec<(ObjectId, ObjectId)>,
}

impl CombatState {
    pub fn is_attacking(&self, id: ObjectId) -> bool {
        self.attackers.iter().any(|(a, _)| *a == id)
    }

    pub fn defender_of(&self, attacker: ObjectId) -> Option<Defender> {
        self.attackers
            .iter()
            .find(|(a, _)| *a == attacker)
            .map(|(_, d)| *d)
    }

    pub fn blockers_of(&self, attacker: ObjectId) -> Vec<ObjectId> {
        self.blocks
            .iter()
            .filter(|(_, a)| *a == attacker)
            .map(|(b, _)| *b)
            .collect()
    }

    pub fn is_blocked(&self, attacker: ObjectId) -> bool {
        self.blocks.iter().any(|(_, a)| *a == attacker)
    }
}

fn can_attack(state: &GameState, chars: &Characteristics, id: ObjectId) -> bool {
    let Ok(obj) = state.objects.get(id) else {
        return false;
    };
    chars.is_creature()
        && !obj.tapped
        && !chars.has_keyword(&Keyword::Defender)
        && (!obj.summoning_sick || chars.has_keyword(&Keyword::Haste))
}

fn can_block(attacker: &Characteristics, blocker: &Characteristics) -> bool {
    if !blocker.is_creature() {
        return false;
    }
    if attacker.has_keyword(&Keyword::Flying)
        && !blocker.has_keyword(&Keyword::Flying)
        && !blocker.has_keyword(&Keyword::Reach)
    {
        return false;
    }
    // Protection from a color: can't be blocked by creatures of that color.
    for kw in &attacker.keywords {
        if let Keyword::Protection(color) = kw {
            if blocker.colors.contains(color) {
                return false;
            }
        }
    }
    true
}

/// Defenders the active player may attack: each opponent in turn order,
/// followed by the planeswalkers that opponent controls.
pub fn legal_defenders(state: &GameState, chars: &CharacteristicsMap) -> Vec<Defender> {
    let active = state.turn.active_player;
    let mut defenders = Vec::new();
    for player in state.apnap_order() {
        if player == active {
            continue;
        }
        defenders.push(Defender::Player(player));
        for id in state.battlefield_ids() {
            if chars
                .get(&id)
                .is_some_and(|c| c.controller == player && c.is_type(CardType::Planeswalker))
            {
                defenders.push(Defender::Planeswalker(id));
            }
        }
    }
    defenders
}

/// Declare attackers for the active player. The controller picks each
/// attacker's defender; attackers without vigilance tap.
pub fn declare_attackers(state: &mut GameState, controllers: &mut Controllers) -> Result<()> {
    let active = state.turn.active_player;
    let chars = layers::evaluate(state);

    let candidates: Vec<ObjectId> = state
        .battlefield_ids()
        .into_iter()
        .filter(|&id| {
            chars
                .get(&id)
                .is_some_and(|c| c.controller == active && can_attack(state, c, id))
        })
        .collect();

    let defenders = legal_defenders(state, &chars);
    if defenders.is_empty() {
        return Err(RulesError::InvariantViolation(
            "combat with no opponent remaining".to_string(),
        ));
    }

    let declared = if candidates.is_empty() {
        Vec::new()
    } else {
        let view = GameStateView::new(state, active);
        let ctrl = controllers.get(active)?;
        ctrl.declare_attackers(&view, &candidates, &defenders)
    };

    let mut combat = CombatState::default();
    for (id, defender) in declared {
        if !candidates.contains(&id) || !defenders.contains(&defender) {
            log_if_verbose!(state.logger, "ignoring illegal attack by {id}");
            continue;
        }
        if combat.is_attacking(id) {
            continue;
        }
        combat.attackers.push((id, defender));
        if !chars.get(&id).is_some_and(|c| c.has_keyword(&Keyword::Vigilance)) {
            state.objects.get_mut(id)?.tap();
        }
    }

    if !combat.attackers.is_empty() {
        let names: Vec<String> = combat
            .attackers
            .iter()
            .filter_map(|(id, _)| state.objects.get(*id).ok())
            .map(|o| o.def.name.to_string())
            .collect();
        state.logger.log_normal(&format!(
            "{} attacks with {}",
            state.player(active)?.name,
            names.join(", ")
        ));
    }

    let attackers: Vec<ObjectId> = combat.attackers.iter().map(|(a, _)| *a).collect();
    state.combat = Some(combat);
    if !attackers.is_empty() {
        bus::publish(state, controllers, GameEvent::AttackersDeclared { attackers })?;
    }
    Ok(())
}

/// Declare blockers for each defending player. Illegal blocks (including
/// menace attackers blocked by a single creature) are dropped.
pub fn declare_blockers(state: &mut GameState, controllers: &mut Controllers) -> Result<()> {
    let Some(combat) = state.combat.clone() else {
        return Ok(());
    };
    if combat.attackers.is_empty() {
        return Ok(());
    }
    let chars = layers::evaluate(state);

    let mut defenders: Vec<PlayerId> = combat
        .attackers
        .iter()
        .filter_map(|(_, d)| d.defending_player(state))
        .collect();
    defenders.sort_unstable();
    defenders.dedup();

    let mut blocks: Vec<(ObjectId, ObjectId)> = Vec::new();
    for defender in defenders {
        let attackers: Vec<ObjectId> = combat
            .attackers
            .iter()
            .filter(|(_, d)| d.defending_player(state) == Some(defender))
            .map(|(a, _)| *a)
            .collect();
        let candidates: Vec<ObjectId> = state
            .battlefield_ids()
            .into_iter()
            .filter(|&id| {
                chars.get(&id).is_some_and(|c| c.controller == defender && c.is_creature())
                    && state.objects.get(id).map(|o| !o.tapped).unwrap_or(false)
            })
            .collect();
        if candidates.is_empty() {
            continue;
        }

        let view = GameStateView::new(state, defender);
        let ctrl = controllers.get(defender)?;
        let declared = ctrl.declare_blockers(&view, &attackers, &candidates);

        for (blocker, attacker) in declared {
            let legal = candidates.contains(&blocker)
                && attackers.contains(&attacker)
                && !blocks.iter().any(|(b, _)| *b == blocker)
                && match (chars.get(&attacker), chars.get(&blocker)) {
                    (Some(a), Some(b)) => can_block(a, b),
                    _ => false,
                };
            if legal {
                blocks.push((blocker, attacker));
            } else {
                log_if_verbose!(state.logger, "ignoring illegal block {blocker} -> {attacker}");
            }
        }
    }

    // Menace: fewer than two blockers means the attacker is not blocked.
    let mut block_counts: FxHashMap<ObjectId, usize> = FxHashMap::default();
    for &(_, attacker) in &blocks {
        *block_counts.entry(attacker).or_insert(0) += 1;
    }
    blocks.retain(|&(_, attacker)| {
        let menace = chars
            .get(&attacker)
            .is_some_and(|c| c.has_keyword(&Keyword::Menace));
        !menace || block_counts.get(&attacker).copied().unwrap_or(0) >= 2
    });

    let blockers: Vec<ObjectId> = blocks.iter().map(|(b, _)| *b).collect();
    if let Some(combat) = state.combat.as_mut() {
        combat.blocks = blocks;
    }
    if !blockers.is_empty() {
        state
            .logger
            .log_normal(&format!("{} creatures block", blockers.len()));
        bus::publish(state, controllers, GameEvent::BlockersDeclared { blockers })?;
    }
    Ok(())
}

/// Does any combatant have first or double strike? Decides whether the
/// first-strike damage step happens at all.
pub fn has_first_strike_wave(state: &GameState) -> bool {
    let Some(combat) = &state.combat else {
        return false;
    };
    let chars = layers::evaluate(state);
    let strikes = |id: ObjectId| {
        chars.get(&id).is_some_and(|c| {
            c.has_keyword(&Keyword::FirstStrike) || c.has_keyword(&Keyword::DoubleStrike)
        })
    };
    combat.attackers.iter().any(|(a, _)| strikes(*a))
        || combat.blocks.iter().any(|(b, _)| strikes(*b))
}

/// Deal one wave of combat damage. `first_strike_wave` selects which
/// creatures deal damage in this wave.
pub fn deal_combat_damage(
    state: &mut GameState,
    controllers: &mut Controllers,
    first_strike_wave: bool,
) -> Result<()> {
    let Some(combat) = state.combat.clone() else {
        return Ok(());
    };
    let chars = layers::evaluate(state);

    let deals_now = |c: &Characteristics| {
        let first = c.has_keyword(&Keyword::FirstStrike);
        let double = c.has_keyword(&Keyword::DoubleStrike);
        if first_strike_wave {
            first || double
        } else {
            !first || double
        }
    };

    let mut events: Vec<GameEvent> = Vec::new();

    for &(attacker, defender) in &combat.attackers {
        // A creature that left combat (died in the first wave) deals
        // nothing.
        let Some(a) = chars.get(&attacker) else { continue };
        if !state.battlefield.contains(attacker) || !deals_now(a) {
            continue;
        }
        let power = a.power.unwrap_or(0).max(0) as u32;
        if power == 0 {
            continue;
        }

        let blockers: Vec<ObjectId> = combat
            .blockers_of(attacker)
            .into_iter()
            .filter(|b| state.battlefield.contains(*b))
            .collect();

        if blockers.is_empty() {
            if combat.is_blocked(attacker) {
                // All blockers are gone. Trample still tramples; anything
                // else is stonewalled.
                if a.has_keyword(&Keyword::Trample) {
                    events.extend(defender_damage(state, attacker, defender, power));
                }
            } else {
                events.extend(defender_damage(state, attacker, defender, power));
            }
            continue;
        }

        // Blocked: assign to blockers in declaration order, lethal to each
        // before moving on; trample pushes the excess through.
        let deathtouch = a.has_keyword(&Keyword::Deathtouch);
        let trample = a.has_keyword(&Keyword::Trample);
        let mut remaining = power;
        for (i, &blocker) in blockers.iter().enumerate() {
            if remaining == 0 {
                break;
            }
            let lethal = lethal_to(state, &chars, blocker, deathtouch);
            let last = i == blockers.len() - 1;
            let assign = if trample || !last {
                remaining.min(lethal.max(1))
            } else {
                remaining
            };
            events.push(GameEvent::DamageToObject {
                source: Some(attacker),
                target: blocker,
                amount: assign,
                is_combat: true,
            });
            remaining -= assign;
        }
        if trample && remaining > 0 {
            events.extend(defender_damage(state, attacker, defender, remaining));
        }
    }

    // Blockers strike back.
    for &(blocker, attacker) in &combat.blocks {
        let Some(b) = chars.get(&blocker) else { continue };
        if !state.battlefield.contains(blocker)
            || !state.battlefield.contains(attacker)
            || !deals_now(b)
        {
            continue;
        }
        let power = b.power.unwrap_or(0).max(0) as u32;
        if power > 0 {
            events.push(GameEvent::DamageToObject {
                source: Some(blocker),
                target: attacker,
                amount: power,
                is_combat: true,
            });
        }
    }

    if !events.is_empty() {
        bus::publish_all(state, controllers, events)?;
    }
    Ok(())
}

/// Combat damage to a declared defender. A planeswalker that already left
/// the battlefield takes nothing.
fn defender_damage(
    state: &GameState,
    attacker: ObjectId,
    defender: Defender,
    amount: u32,
) -> Option<GameEvent> {
    match defender {
        Defender::Player(player) => Some(GameEvent::DamageToPlayer {
            source: Some(attacker),
            player,
            amount,
            is_combat: true,
        }),
        Defender::Planeswalker(id) if state.battlefield.contains(id) => {
            Some(GameEvent::DamageToObject {
                source: Some(attacker),
                target: id,
                amount,
                is_combat: true,
            })
        }
        Defender::Planeswalker(_) => None,
    }
}

/// How much more damage this blocker needs to die. Deathtouch makes any
/// single point lethal.
fn lethal_to(
    state: &GameState,
    chars: &CharacteristicsMap,
    blocker: ObjectId,
    deathtouch: bool,
) -> u32 {
    if deathtouch {
        return 1;
    }
    let toughness = chars
        .get(&blocker)
        .and_then(|c| c.toughness)
        .unwrap_or(0)
        .max(0) as u32;
    let marked = state.objects.get(blocker).map(|o| o.damage).unwrap_or(0);
    toughness.saturating_sub(marked)
}

/// End of combat: forget the combat state.
pub fn end_combat(state: &mut GameState) {
    state.combat = None;
}
