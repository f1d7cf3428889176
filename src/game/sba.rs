//! State-based actions
//!
//! Run whenever the event queue empties, repeating until a pass makes no
//! change. SBAs never use the stack: they mutate (or publish the zone
//! changes for) the state directly.

use crate::core::{CardType, CounterType, Keyword, ObjectId, Subtype};
use crate::game::controller::{with_retries, Controllers, GameStateView};
use crate::game::events::{GameEvent, LossReason};
use crate::game::layers;
use crate::game::state::GameState;
use crate::zones::Zone;
use crate::Result;
use rustc_hash::FxHashMap;

const COMMANDER_DAMAGE_LOSS: u32 = 21;

/// One SBA pass. Returns true when anything happened; the caller loops to
/// the fixed point.
pub fn run(state: &mut GameState, controllers: &mut Controllers) -> Result<bool> {
    let mut acted = false;

    acted |= check_player_losses(state)?;
    acted |= check_creatures_and_planeswalkers(state)?;
    acted |= check_tokens(state);
    acted |= check_legend_rule(state, controllers)?;
    acted |= check_attachments(state)?;
    acted |= annihilate_counters(state);

    Ok(acted)
}

fn lose(state: &mut GameState, player: crate::core::PlayerId, reason: LossReason) {
    state
        .event_queue
        .push_back(crate::game::events::PendingEvent::new(
            GameEvent::PlayerLost { player, reason },
        ));
}

fn check_player_losses(state: &mut GameState) -> Result<bool> {
    let mut acted = false;
    let ids: Vec<crate::core::PlayerId> = state
        .players
        .iter()
        .filter(|p| !p.eliminated)
        .map(|p| p.id)
        .collect();

    // Skip players with a loss already queued.
    let pending_loss = |state: &GameState, p| {
        state
            .event_queue
            .iter()
            .any(|e| matches!(e.event, GameEvent::PlayerLost { player, .. } if player == p))
    };

    for id in ids {
        if pending_loss(state, id) {
            continue;
        }
        let player = state.player(id)?;
        if player.life <= 0 {
            lose(state, id, LossReason::LifeZero);
            acted = true;
        } else if player.drew_from_empty_library {
            lose(state, id, LossReason::DrewFromEmptyLibrary);
            acted = true;
        } else if state.config.commander
            && player.commander_damage.iter().any(|(_, n)| *n >= COMMANDER_DAMAGE_LOSS)
        {
            lose(state, id, LossReason::CommanderDamage);
            acted = true;
        }
    }
    Ok(acted)
}

fn check_creatures_and_planeswalkers(state: &mut GameState) -> Result<bool> {
    let chars = layers::evaluate(state);
    let mut to_graveyard: Vec<ObjectId> = Vec::new();

    for id in state.battlefield_ids() {
        let Some(c) = chars.get(&id) else { continue };
        let obj = state.objects.get(id)?;

        if c.is_creature() {
            let toughness = c.toughness.unwrap_or(0);
            if toughness <= 0 {
                // Zero toughness: not destruction, indestructible does not
                // apply.
                to_graveyard.push(id);
                continue;
            }
            let lethal = obj.damage >= toughness as u32
                || (obj.damage > 0 && obj.deathtouch_damage);
            if lethal && !c.has_keyword(&Keyword::Indestructible) {
                to_graveyard.push(id);
            }
        }

        if c.is_type(CardType::Planeswalker) && obj.counter_count(&CounterType::loyalty()) == 0 {
            to_graveyard.push(id);
        }

        if c.is_type(CardType::Battle) && obj.counter_count(&CounterType::defense()) == 0 {
            to_graveyard.push(id);
        }
    }

    let acted = !to_graveyard.is_empty();
    for id in to_graveyard {
        let name = state
            .objects
            .get(id)
            .map(|o| o.def.name.to_string())
            .unwrap_or_else(|_| id.to_string());
        state.logger.log_normal(&format!("{name} is put into the graveyard"));
        state
            .event_queue
            .push_back(crate::game::events::PendingEvent::new(
                GameEvent::zone_change(id, Zone::Battlefield, Zone::Graveyard),
            ));
    }
    Ok(acted)
}

/// Tokens in any zone but the battlefield cease to exist. The object stays
/// in the store so triggers already holding its id still resolve; it just
/// leaves all zone lists.
fn check_tokens(state: &mut GameState) -> bool {
    let mut ceased: Vec<(ObjectId, crate::core::PlayerId, Zone)> = Vec::new();
    for id in state.objects.ids_sorted() {
        let Ok(obj) = state.objects.get(id) else { continue };
        if (obj.is_token || obj.is_emblem) && !obj.is_on_battlefield() && obj.zone != Zone::Stack {
            let in_a_list = state
                .player_zones(obj.owner)
                .ok()
                .and_then(|z| z.get(obj.zone))
                .map(|z| z.contains(id))
                .unwrap_or(false);
            if in_a_list {
                ceased.push((id, obj.owner, obj.zone));
            }
        }
    }
    let acted = !ceased.is_empty();
    for (id, owner, zone) in ceased {
        if let Ok(list) = state.zone_list_mut(zone, owner) {
            list.remove(id);
        }
    }
    acted
}

fn check_legend_rule(state: &mut GameState, controllers: &mut Controllers) -> Result<bool> {
    let chars = layers::evaluate(state);
    let mut groups: FxHashMap<(crate::core::PlayerId, String), Vec<ObjectId>> =
        FxHashMap::default();
    for id in state.battlefield_ids() {
        if let Some(c) = chars.get(&id) {
            if c.supertypes.contains(&crate::core::Supertype::legendary()) {
                groups
                    .entry((c.controller, c.name.to_string()))
                    .or_default()
                    .push(id);
            }
        }
    }

    let mut acted = false;
    let mut keys: Vec<_> = groups.keys().cloned().collect();
    keys.sort();
    for key in keys {
        let ids = &groups[&key];
        if ids.len() < 2 {
            continue;
        }
        let (controller, ref name) = key;
        let retries = state.config.decision_retries;
        let view = GameStateView::new(state, controller);
        let ctrl = controllers.get(controller)?;
        let keep = with_retries(retries, "legend to keep", || {
            let i = ctrl.choose_object(&view, &format!("keep which {name}?"), ids);
            ids.get(i).copied()
        })?;
        state
            .logger
            .log_normal(&format!("legend rule: keeping {keep}, rest to graveyard"));
        for &id in ids {
            if id != keep {
                state
                    .event_queue
                    .push_back(crate::game::events::PendingEvent::new(
                        GameEvent::zone_change(id, Zone::Battlefield, Zone::Graveyard),
                    ));
            }
        }
        acted = true;
    }
    Ok(acted)
}

/// Auras attached to nothing (or to something gone) fall off into the
/// graveyard; other attachments just detach.
fn check_attachments(state: &mut GameState) -> Result<bool> {
    let mut to_graveyard: Vec<ObjectId> = Vec::new();
    let mut detach: Vec<ObjectId> = Vec::new();

    for id in state.battlefield_ids() {
        let obj = state.objects.get(id)?;
        let Some(host) = obj.attached_to else { continue };
        let host_ok = state
            .objects
            .get(host)
            .map(|h| h.is_on_battlefield())
            .unwrap_or(false);
        if host_ok {
            continue;
        }
        if obj.def.subtypes.contains(&Subtype::aura()) {
            to_graveyard.push(id);
        } else {
            detach.push(id);
        }
    }

    let acted = !to_graveyard.is_empty() || !detach.is_empty();
    for id in detach {
        state.objects.get_mut(id)?.attached_to = None;
    }
    for id in to_graveyard {
        state
            .event_queue
            .push_back(crate::game::events::PendingEvent::new(
                GameEvent::zone_change(id, Zone::Battlefield, Zone::Graveyard),
            ));
    }
    Ok(acted)
}

/// +1/+1 and -1/-1 counters on the same object annihilate in pairs.
fn annihilate_counters(state: &mut GameState) -> bool {
    let p1p1 = CounterType::plus_one_plus_one();
    let m1m1 = CounterType::minus_one_minus_one();
    let mut acted = false;
    for id in state.battlefield_ids() {
        let Ok(obj) = state.objects.get_mut(id) else { continue };
        let n = obj.counter_count(&p1p1).min(obj.counter_count(&m1m1));
        if n > 0 {
            obj.remove_counters(&p1p1, n);
            obj.remove_counters(&m1m1, n);
            acted = true;
        }
    }
    acted
}
