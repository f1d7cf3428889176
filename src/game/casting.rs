//! Casting spells and activating abilities
//!
//! The pipeline follows announcement order: put the card on the stack,
//! compute the cost, pay, then choose modes and targets against the
//! post-payment state. Payment is atomic: any failure restores the
//! pre-cast state and surfaces a recoverable error, so a rejected cast
//! never leaks partial payment.

use crate::core::{
    CastRestriction, CostChoice, CostItem, Keyword, ManaCost, ObjectId, PlayerId, SpeedClass,
};
use crate::error::IllegalActionKind;
use crate::game::bus;
use crate::game::controller::{with_retries, Controllers, GameStateView};
use crate::game::events::GameEvent;
use crate::game::layers::{self, object_filter_matches};
use crate::game::stack::{self, CastContext, StackItem};
use crate::game::state::GameState;
use crate::zones::Zone;
use crate::{Result, RulesError};

const COMMANDER_TAX_STEP: u8 = 2;

/// Cast a spell. `alternative` indexes the definition's alternative cost
/// list (flashback and friends); None casts for the printed cost.
pub fn cast_spell(
    state: &mut GameState,
    controllers: &mut Controllers,
    caster: PlayerId,
    object: ObjectId,
    alternative: Option<usize>,
) -> Result<()> {
    let def = state.objects.get(object)?.def.clone();
    let origin = state.objects.get(object)?.zone;
    let owner = state.objects.get(object)?.owner;

    if def.is_land() {
        return Err(RulesError::illegal(
            IllegalActionKind::Restricted,
            "lands are played, not cast",
        ));
    }

    let alt = match alternative {
        Some(i) => Some(def.alternative_costs.get(i).ok_or_else(|| {
            RulesError::illegal(
                IllegalActionKind::NotAvailable,
                format!("{} has no alternative cost {i}", def.name),
            )
        })?),
        None => None,
    };

    // Zone permission.
    let from_command = state.config.commander
        && origin == Zone::Command
        && state.player(caster)?.commander == Some(object);
    let zone_ok = match alt.and_then(|a| a.from_zone) {
        Some(zone) => origin == zone && owner == caster,
        None => (origin == Zone::Hand && owner == caster) || from_command,
    };
    if !zone_ok {
        return Err(RulesError::illegal(
            IllegalActionKind::WrongZone,
            format!("{} cannot be cast from {origin:?}", def.name),
        ));
    }

    // Timing.
    let instant_speed =
        def.is_type(crate::core::CardType::Instant) || def.has_keyword(&Keyword::Flash);
    if !instant_speed && !(state.turn.is_main_phase_of(caster) && state.stack.is_empty()) {
        return Err(RulesError::illegal(
            IllegalActionKind::WrongTiming,
            format!("{} can only be cast during your main phase", def.name),
        ));
    }

    // Registered global restrictions.
    for restriction in &state.cast_restrictions {
        if restriction_applies(state, restriction, caster, object) {
            return Err(RulesError::illegal(
                IllegalActionKind::Restricted,
                format!("{} cannot be cast right now", def.name),
            ));
        }
    }

    // Everything past this point can be rolled back wholesale.
    let backup = state.clone();
    let result =
        cast_inner(state, controllers, caster, object, alternative, origin, from_command);
    if let Err(e) = result {
        if e.is_recoverable() {
            *state = backup;
        }
        return Err(e);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cast_inner(
    state: &mut GameState,
    controllers: &mut Controllers,
    caster: PlayerId,
    object: ObjectId,
    alternative: Option<usize>,
    origin: Zone,
    from_command: bool,
) -> Result<()> {
    let def = state.objects.get(object)?.def.clone();
    let retries = state.config.decision_retries;

    // Announce: the spell sits on the stack while choices are made.
    if origin != Zone::Stack {
        if let Ok(list) = state.zone_list_mut(origin, caster) {
            list.remove(object);
        }
        state.objects.get_mut(object)?.zone = Zone::Stack;
    }

    let mut ctx = CastContext::new(caster, origin);
    if let Some(i) = alternative {
        ctx.cost_choice = CostChoice::Alternative(i);
        ctx.resolution_destination = def.alternative_costs[i].resolution_destination;
    }

    // Cost.
    let alt_def = alternative.map(|i| &def.alternative_costs[i]);
    let mut mana = alt_def
        .and_then(|a| a.mana)
        .unwrap_or(def.mana_cost);
    if from_command {
        let tax = state.player(caster)?.commander_tax;
        let bump = tax
            .saturating_mul(COMMANDER_TAX_STEP as u32)
            .min(u8::MAX as u32) as u8;
        mana = mana.increase_generic(bump);
    }
    for adj in &state.cost_adjustments {
        mana = adj.apply(mana);
    }

    // Pay: extra items first, then mana. Payment precedes targeting, so a
    // permanent spent on the cost is never offered as a target.
    if let Some(a) = alt_def {
        let extra = a.extra.clone();
        pay_cost_items(state, controllers, caster, object, &extra)?;
    }
    pay_mana(state, caster, &mana)?;

    if from_command {
        state.player_mut(caster)?.commander_tax += 1;
    }

    // Modes and targets, chosen against the post-payment state.
    if let Some(modal) = &def.modal {
        let descriptions: Vec<String> =
            modal.modes.iter().map(|m| m.description.clone()).collect();
        let view = GameStateView::new(state, caster);
        let ctrl = controllers.get(caster)?;
        let modes = with_retries(retries, "mode choice", || {
            let picked = ctrl.choose_modes(&view, object, &descriptions, modal.constraint);
            let in_range = picked.iter().all(|&i| i < modal.modes.len());
            let distinct = {
                let mut seen = picked.clone();
                seen.sort_unstable();
                seen.dedup();
                seen.len() == picked.len()
            };
            if in_range && distinct && modal.constraint.allows(picked.len(), modal.modes.len()) {
                Some(picked)
            } else {
                None
            }
        })
        .map_err(|_| {
            RulesError::illegal(IllegalActionKind::IllegalMode, "invalid mode choice")
        })?;

        for &mode_idx in &modes {
            let targets = stack::choose_targets(
                state,
                controllers,
                caster,
                object,
                &modal.modes[mode_idx].targets,
            )?;
            ctx.mode_targets.push(targets);
        }
        ctx.modes = modes;
    } else {
        ctx.targets = stack::choose_targets(state, controllers, caster, object, &def.spell_targets)?;
    }

    state.objects.get_mut(object)?.was_cast = true;
    state.logger.log_normal(&format!(
        "{} casts {} ({mana})",
        state.player(caster)?.name,
        def.name
    ));
    state.stack.push(StackItem::Spell { object, ctx });
    bus::publish(
        state,
        controllers,
        GameEvent::SpellCast {
            object,
            controller: caster,
        },
    )?;
    Ok(())
}

/// Activate an activated ability of a battlefield permanent. Mana
/// abilities resolve immediately; everything else goes on the stack.
pub fn activate_ability(
    state: &mut GameState,
    controllers: &mut Controllers,
    player: PlayerId,
    source: ObjectId,
    ability_index: usize,
) -> Result<()> {
    let obj = state.objects.get(source)?;
    if !obj.is_on_battlefield() || obj.controller != player {
        return Err(RulesError::illegal(
            IllegalActionKind::NotAvailable,
            "you do not control that permanent",
        ));
    }
    let def = obj.def.clone();
    let ability = def.activated.get(ability_index).ok_or_else(|| {
        RulesError::illegal(
            IllegalActionKind::NotAvailable,
            format!("{} has no ability {ability_index}", def.name),
        )
    })?;

    if ability.speed == SpeedClass::Sorcery
        && !(state.turn.is_main_phase_of(player) && state.stack.is_empty())
    {
        return Err(RulesError::illegal(
            IllegalActionKind::WrongTiming,
            "sorcery-speed ability outside your main phase",
        ));
    }

    // Tap abilities of creatures need the summoning-sickness check.
    if ability.costs.contains(&CostItem::TapSelf) {
        let chars = layers::characteristics_of(state, source)?;
        let obj = state.objects.get(source)?;
        if obj.tapped {
            return Err(RulesError::illegal(
                IllegalActionKind::UnpayableCost,
                "already tapped",
            ));
        }
        if chars.is_creature() && obj.summoning_sick && !chars.has_keyword(&Keyword::Haste) {
            return Err(RulesError::illegal(
                IllegalActionKind::WrongTiming,
                "summoning sickness",
            ));
        }
    }

    let backup = state.clone();
    let result = activate_inner(state, controllers, player, source, ability_index);
    if let Err(e) = result {
        if e.is_recoverable() {
            *state = backup;
        }
        return Err(e);
    }
    Ok(())
}

fn activate_inner(
    state: &mut GameState,
    controllers: &mut Controllers,
    player: PlayerId,
    source: ObjectId,
    ability_index: usize,
) -> Result<()> {
    let def = state.objects.get(source)?.def.clone();
    let ability = &def.activated[ability_index];

    let targets = stack::choose_targets(state, controllers, player, source, &ability.targets)?;

    pay_cost_items(state, controllers, player, source, &ability.costs)?;
    if let Some(mana) = &ability.mana_cost {
        pay_mana(state, player, mana)?;
    }

    if ability.is_mana_ability {
        // Off-stack resolution.
        stack::execute_effects(
            state,
            controllers,
            source,
            player,
            &ability.effects,
            &targets,
            &ability.targets,
        )?;
        return Ok(());
    }

    state.logger.log_normal(&format!(
        "{} activates an ability of {}",
        state.player(player)?.name,
        def.name
    ));
    state.stack.push(StackItem::Ability {
        source,
        controller: player,
        ability_index,
        targets,
    });
    Ok(())
}

/// Play a land from hand: a special action that uses no stack and no mana.
pub fn play_land(
    state: &mut GameState,
    controllers: &mut Controllers,
    player: PlayerId,
    object: ObjectId,
) -> Result<()> {
    let obj = state.objects.get(object)?;
    if obj.zone != Zone::Hand || obj.owner != player {
        return Err(RulesError::illegal(
            IllegalActionKind::WrongZone,
            "land must be played from hand",
        ));
    }
    if !obj.def.is_land() {
        return Err(RulesError::illegal(
            IllegalActionKind::NotAvailable,
            "not a land",
        ));
    }
    if !(state.turn.is_main_phase_of(player) && state.stack.is_empty()) {
        return Err(RulesError::illegal(
            IllegalActionKind::WrongTiming,
            "lands are played during your main phase",
        ));
    }
    if !state.player(player)?.can_play_land() {
        return Err(RulesError::illegal(
            IllegalActionKind::Restricted,
            "already played a land this turn",
        ));
    }

    let name = obj.def.name.to_string();
    state.player_mut(player)?.lands_played_this_turn += 1;
    state
        .logger
        .log_normal(&format!("{} plays {name}", state.player(player)?.name));
    bus::publish(
        state,
        controllers,
        GameEvent::zone_change(object, Zone::Hand, Zone::Battlefield),
    )
}

/// Does a registered global restriction forbid this cast?
fn restriction_applies(
    state: &GameState,
    restriction: &CastRestriction,
    caster: PlayerId,
    object: ObjectId,
) -> bool {
    match restriction {
        CastRestriction::NoSpells => true,
        CastRestriction::OwnTurnOnly => state.turn.active_player != caster,
        CastRestriction::Forbid(filter) => match layers::characteristics_of(state, object) {
            Ok(chars) => object_filter_matches(filter, object, &chars, caster, None),
            Err(_) => false,
        },
    }
}

// --- payment ---------------------------------------------------------------

fn pay_mana(state: &mut GameState, player: PlayerId, cost: &ManaCost) -> Result<()> {
    state
        .player_mut(player)?
        .mana_pool
        .pay(cost)
        .map_err(|msg| RulesError::illegal(IllegalActionKind::InsufficientMana, msg))
}

/// Pay non-mana cost items. Validation happens per item before any part of
/// it is paid; the caller's snapshot covers cross-item atomicity.
pub fn pay_cost_items(
    state: &mut GameState,
    controllers: &mut Controllers,
    payer: PlayerId,
    source: ObjectId,
    items: &[CostItem],
) -> Result<()> {
    let retries = state.config.decision_retries;
    for item in items {
        match item {
            CostItem::TapSelf => {
                let obj = state.objects.get_mut(source)?;
                if obj.tapped {
                    return Err(RulesError::illegal(
                        IllegalActionKind::UnpayableCost,
                        "already tapped",
                    ));
                }
                obj.tap();
            }
            CostItem::SacrificeSelf => {
                bus::move_to(state, controllers, source, Zone::Graveyard)?;
            }
            CostItem::Sacrifice(filter) => {
                let chars = layers::evaluate(state);
                let candidates: Vec<ObjectId> = state
                    .battlefield_ids()
                    .into_iter()
                    .filter(|id| {
                        chars.get(id).is_some_and(|c| {
                            c.controller == payer
                                && object_filter_matches(filter, *id, c, payer, Some(source))
                        })
                    })
                    .collect();
                if candidates.is_empty() {
                    return Err(RulesError::illegal(
                        IllegalActionKind::UnpayableCost,
                        "nothing to sacrifice",
                    ));
                }
                let view = GameStateView::new(state, payer);
                let ctrl = controllers.get(payer)?;
                let pick = with_retries(retries, "sacrifice", || {
                    let i = ctrl.choose_object(&view, "sacrifice a permanent", &candidates);
                    candidates.get(i).copied()
                })?;
                bus::move_to(state, controllers, pick, Zone::Graveyard)?;
            }
            CostItem::Discard(n) => {
                for _ in 0..*n {
                    let hand: Vec<ObjectId> = state
                        .player_zones(payer)?
                        .hand
                        .cards
                        .iter()
                        .copied()
                        .filter(|&c| c != source)
                        .collect();
                    if hand.is_empty() {
                        return Err(RulesError::illegal(
                            IllegalActionKind::UnpayableCost,
                            "not enough cards to discard",
                        ));
                    }
                    let view = GameStateView::new(state, payer);
                    let ctrl = controllers.get(payer)?;
                    let pick = with_retries(retries, "discard", || {
                        let i = ctrl.choose_object(&view, "discard a card", &hand);
                        hand.get(i).copied()
                    })?;
                    bus::publish(
                        state,
                        controllers,
                        GameEvent::zone_change(pick, Zone::Hand, Zone::Graveyard),
                    )?;
                }
            }
            CostItem::PayLife(n) => {
                if state.player(payer)?.life < *n as i32 {
                    return Err(RulesError::illegal(
                        IllegalActionKind::UnpayableCost,
                        "not enough life",
                    ));
                }
                bus::publish(
                    state,
                    controllers,
                    GameEvent::LifeChange {
                        player: payer,
                        delta: -(*n as i32),
                    },
                )?;
            }
            CostItem::ExileFromGraveyard(n) => {
                for _ in 0..*n {
                    let graveyard: Vec<ObjectId> = state
                        .player_zones(payer)?
                        .graveyard
                        .cards
                        .iter()
                        .copied()
                        .filter(|&c| c != source)
                        .collect();
                    if graveyard.is_empty() {
                        return Err(RulesError::illegal(
                            IllegalActionKind::UnpayableCost,
                            "not enough cards in graveyard",
                        ));
                    }
                    let view = GameStateView::new(state, payer);
                    let ctrl = controllers.get(payer)?;
                    let pick = with_retries(retries, "exile from graveyard", || {
                        let i = ctrl.choose_object(&view, "exile a card", &graveyard);
                        graveyard.get(i).copied()
                    })?;
                    bus::publish(
                        state,
                        controllers,
                        GameEvent::zone_change(pick, Zone::Graveyard, Zone::Exile),
                    )?;
                }
            }
        }
    }
    Ok(())
}
