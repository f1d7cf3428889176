//! Event pipeline: publish, replace, apply, trigger, SBA
//!
//! `publish` is the only way game actions change state. The outermost
//! publish drains the queue: each event runs the replacement loop, applies
//! (emitting derived events), and is offered to triggers; when the queue
//! empties, state-based actions run and the drain continues until both the
//! queue and the SBA pass are quiet. Nested publishes (from effect
//! execution or SBAs) just enqueue.

use crate::core::{Keyword, ObjectId, PlayerId};
use crate::game::controller::Controllers;
use crate::game::events::{GameEvent, PendingEvent};
use crate::game::layers;
use crate::game::replacements::apply_replacements;
use crate::game::state::{self, GameState};
use crate::game::{sba, triggers};
use crate::log_if_verbose;
use crate::zones::Zone;
use crate::Result;

pub fn publish(
    state: &mut GameState,
    controllers: &mut Controllers,
    event: GameEvent,
) -> Result<()> {
    state.event_queue.push_back(PendingEvent::new(event));
    if state.draining {
        return Ok(());
    }
    state.draining = true;
    let result = drain(state, controllers);
    state.draining = false;
    result
}

/// Publish a batch of simultaneous events: all enter the queue before any
/// applies, so triggers and SBAs see the batch as one happening.
pub fn publish_all(
    state: &mut GameState,
    controllers: &mut Controllers,
    events: impl IntoIterator<Item = GameEvent>,
) -> Result<()> {
    state
        .event_queue
        .extend(events.into_iter().map(PendingEvent::new));
    if state.draining {
        return Ok(());
    }
    state.draining = true;
    let result = drain(state, controllers);
    state.draining = false;
    result
}

fn drain(state: &mut GameState, controllers: &mut Controllers) -> Result<()> {
    loop {
        while let Some(mut pending) = state.event_queue.pop_front() {
            if !apply_replacements(state, &mut pending) {
                log_if_verbose!(state.logger, "event prevented by replacement");
                continue;
            }
            apply_event(state, controllers, &pending.event)?;
            triggers::notify(state, controllers, &pending.event)?;
        }
        let acted = sba::run(state, controllers)?;
        if !acted && state.event_queue.is_empty() {
            return Ok(());
        }
    }
}

/// Destroy a permanent, respecting indestructible.
pub fn destroy_object(
    state: &mut GameState,
    controllers: &mut Controllers,
    id: ObjectId,
) -> Result<()> {
    let obj = match state.objects.get(id) {
        Ok(o) if o.is_on_battlefield() => o,
        _ => return Ok(()),
    };
    let name = obj.def.name.to_string();
    if let Ok(chars) = layers::characteristics_of(state, id) {
        if chars.has_keyword(&Keyword::Indestructible) {
            log_if_verbose!(state.logger, "{} is indestructible", name);
            return Ok(());
        }
    }
    publish(
        state,
        controllers,
        GameEvent::zone_change(id, Zone::Battlefield, Zone::Graveyard),
    )
}

/// Publish a move from an object's current zone.
pub fn move_to(
    state: &mut GameState,
    controllers: &mut Controllers,
    object: ObjectId,
    to: Zone,
) -> Result<()> {
    let from = state.objects.get(object)?.zone;
    publish(state, controllers, GameEvent::zone_change(object, from, to))
}

// --- mutation --------------------------------------------------------------

fn apply_event(
    state: &mut GameState,
    _controllers: &mut Controllers,
    event: &GameEvent,
) -> Result<()> {
    match event {
        GameEvent::ZoneChange {
            object,
            from,
            to,
            enters_tapped,
            enter_counters,
            new_controller,
        } => apply_zone_change(
            state,
            *object,
            *from,
            *to,
            *enters_tapped,
            enter_counters,
            *new_controller,
        ),

        GameEvent::Draw { player } => {
            let drawn = state.player_zones_mut(*player)?.library.draw_top();
            match drawn {
                Some(card) => {
                    state.objects.get_mut(card)?.zone = Zone::Hand;
                    state.player_zones_mut(*player)?.hand.add(card);
                    let name = state.player(*player)?.name.clone();
                    log_if_verbose!(state.logger, "{} draws a card", name);
                }
                None => {
                    // The loss is a state-based action, not immediate.
                    state.player_mut(*player)?.drew_from_empty_library = true;
                    state
                        .logger
                        .log_normal(&format!("{} draws from an empty library", player));
                }
            }
            Ok(())
        }

        GameEvent::DamageToObject {
            source,
            target,
            amount,
            ..
        } => apply_damage_to_object(state, *source, *target, *amount),

        GameEvent::DamageToPlayer {
            source,
            player,
            amount,
            is_combat,
        } => apply_damage_to_player(state, *source, *player, *amount, *is_combat),

        GameEvent::LifeChange { player, delta } => {
            let p = state.player_mut(*player)?;
            p.life += delta;
            let life = p.life;
            let name = p.name.clone();
            log_if_verbose!(state.logger, "{} life changes by {} to {}", name, delta, life);
            Ok(())
        }

        GameEvent::TapObject { object } => {
            if let Ok(obj) = state.objects.get_mut(*object) {
                obj.tap();
            }
            Ok(())
        }
        GameEvent::UntapObject { object } => {
            if let Ok(obj) = state.objects.get_mut(*object) {
                obj.untap();
            }
            Ok(())
        }

        GameEvent::AddCounters {
            object,
            kind,
            amount,
        } => {
            if let Ok(obj) = state.objects.get_mut(*object) {
                obj.add_counters(kind.clone(), *amount);
            }
            Ok(())
        }
        GameEvent::RemoveCounters {
            object,
            kind,
            amount,
        } => {
            if let Ok(obj) = state.objects.get_mut(*object) {
                obj.remove_counters(kind, *amount);
            }
            Ok(())
        }

        GameEvent::PlayerLost { player, reason } => {
            let p = state.player_mut(*player)?;
            if !p.eliminated {
                p.eliminated = true;
                let name = p.name.clone();
                state
                    .logger
                    .log_minimal(&format!("{name} loses the game ({reason:?})"));
            }
            Ok(())
        }

        // Markers: applied state lives elsewhere, these exist for triggers
        // and the log.
        GameEvent::SpellCast { .. }
        | GameEvent::SpellResolved { .. }
        | GameEvent::EnteredBattlefield { .. }
        | GameEvent::LeftBattlefield { .. }
        | GameEvent::CreatureDied { .. }
        | GameEvent::BeginStep { .. }
        | GameEvent::EndStep { .. }
        | GameEvent::AttackersDeclared { .. }
        | GameEvent::BlockersDeclared { .. } => Ok(()),
    }
}

fn apply_zone_change(
    state: &mut GameState,
    object: ObjectId,
    from: Zone,
    to: Zone,
    enters_tapped: bool,
    enter_counters: &[(crate::core::CounterType, u32)],
    new_controller: Option<PlayerId>,
) -> Result<()> {
    {
        let obj = state.objects.get(object)?;
        // Stale event: the object already moved (e.g. destroyed twice in
        // one drain).
        if obj.zone != from {
            log_if_verbose!(state.logger, "stale zone change for {} ignored", object);
            return Ok(());
        }
    }

    // Pre-move snapshot for death triggers.
    let was_creature = from == Zone::Battlefield
        && layers::characteristics_of(state, object)
            .map(|c| c.is_creature())
            .unwrap_or(false);
    let counters = triggers::counters_snapshot(state, object);
    let (owner, old_controller, name) = {
        let obj = state.objects.get(object)?;
        (obj.owner, obj.controller, obj.def.name.to_string())
    };

    // Leave the old zone.
    match from {
        Zone::Battlefield => {
            state.battlefield.remove(object);
            state.continuous.expire_for_source(object);
        }
        Zone::Stack => {}
        _ => {
            if let Ok(list) = state.zone_list_mut(from, owner) {
                list.remove(object);
            }
        }
    }

    // Enter the new zone.
    let ts = state.next_timestamp();
    {
        let obj = state.objects.get_mut(object)?;
        if from == Zone::Battlefield {
            obj.clear_battlefield_state();
        }
        obj.zone = to;
        obj.timestamp = ts;
        if to == Zone::Battlefield {
            obj.summoning_sick = true;
            obj.tapped = enters_tapped;
            obj.controller = new_controller.unwrap_or(owner);
            obj.was_cast = false;
            state::seed_entry_counters(obj);
            for (kind, count) in enter_counters {
                obj.add_counters(kind.clone(), *count);
            }
        }
    }
    match to {
        Zone::Battlefield => state.battlefield.add(object),
        Zone::Stack => {}
        _ => {
            if let Ok(list) = state.zone_list_mut(to, owner) {
                list.add(object);
            }
        }
    }

    // Derived events.
    if from == Zone::Battlefield {
        state
            .event_queue
            .push_back(PendingEvent::new(GameEvent::LeftBattlefield {
                object,
                to,
            }));
        if was_creature && to == Zone::Graveyard {
            state.logger.log_normal(&format!("{name} dies"));
            state
                .event_queue
                .push_back(PendingEvent::new(GameEvent::CreatureDied {
                    object,
                    controller: old_controller,
                    counters,
                }));
        }
    }
    if to == Zone::Battlefield {
        state
            .logger
            .log_normal(&format!("{name} enters the battlefield"));
        state
            .event_queue
            .push_back(PendingEvent::new(GameEvent::EnteredBattlefield { object }));
    }
    Ok(())
}

fn apply_damage_to_object(
    state: &mut GameState,
    source: Option<ObjectId>,
    target: ObjectId,
    amount: u32,
) -> Result<()> {
    if amount == 0 {
        return Ok(());
    }
    let target_obj = match state.objects.get(target) {
        Ok(o) if o.is_on_battlefield() => o,
        _ => return Ok(()),
    };
    let target_name = target_obj.def.name.to_string();
    let target_chars = layers::characteristics_of(state, target)?;

    let (deathtouch, lifelink, source_controller) = source_damage_traits(state, source);

    if target_chars.is_type(crate::core::CardType::Planeswalker) {
        let obj = state.objects.get_mut(target)?;
        obj.remove_counters(&crate::core::CounterType::loyalty(), amount);
    } else if target_chars.is_type(crate::core::CardType::Battle) {
        let obj = state.objects.get_mut(target)?;
        obj.remove_counters(&crate::core::CounterType::defense(), amount);
    } else {
        let obj = state.objects.get_mut(target)?;
        obj.damage += amount;
        if deathtouch {
            obj.deathtouch_damage = true;
        }
    }
    log_if_verbose!(state.logger, "{} takes {} damage", target_name, amount);

    if lifelink {
        if let Some(controller) = source_controller {
            state.event_queue.push_back(PendingEvent::new(GameEvent::LifeChange {
                player: controller,
                delta: amount as i32,
            }));
        }
    }
    Ok(())
}

fn apply_damage_to_player(
    state: &mut GameState,
    source: Option<ObjectId>,
    player: PlayerId,
    amount: u32,
    is_combat: bool,
) -> Result<()> {
    if amount == 0 {
        return Ok(());
    }
    let (_, lifelink, source_controller) = source_damage_traits(state, source);

    // Commander combat damage is tracked per commander.
    if is_combat && state.config.commander {
        if let Some(src) = source {
            let is_commander = state
                .objects
                .get(src)
                .ok()
                .map(|o| state.player(o.owner).map(|p| p.commander == Some(src)))
                .transpose()?
                .unwrap_or(false);
            if is_commander {
                state.player_mut(player)?.note_commander_damage(src, amount);
            }
        }
    }

    let p = state.player_mut(player)?;
    p.life -= amount as i32;
    let life = p.life;
    let name = p.name.clone();
    state
        .logger
        .log_normal(&format!("{name} takes {amount} damage ({life} life)"));

    if lifelink {
        if let Some(controller) = source_controller {
            state.event_queue.push_back(PendingEvent::new(GameEvent::LifeChange {
                player: controller,
                delta: amount as i32,
            }));
        }
    }
    Ok(())
}

fn source_damage_traits(
    state: &GameState,
    source: Option<ObjectId>,
) -> (bool, bool, Option<PlayerId>) {
    let Some(src) = source else {
        return (false, false, None);
    };
    let controller = state.objects.get(src).ok().map(|o| o.controller);
    match layers::characteristics_of(state, src) {
        Ok(chars) => (
            chars.has_keyword(&Keyword::Deathtouch),
            chars.has_keyword(&Keyword::Lifelink),
            controller,
        ),
        Err(_) => (false, false, controller),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        CardBuilder, CardType, CounterType, Effect, EventFilterDef, PlayerScope,
        TriggeredAbilityDef,
    };
    use crate::game::scripted_controller::ScriptedController;
    use crate::game::state::GameConfig;
    use std::sync::Arc;

    fn two_player_setup() -> (GameState, ScriptedController, ScriptedController) {
        let state = GameState::new(GameConfig::default(), &["Alice", "Bob"]);
        (state, ScriptedController::new(), ScriptedController::new())
    }

    fn bear() -> Arc<crate::core::CardDefinition> {
        CardBuilder::new("grizzly-bears", "Grizzly Bears")
            .mana_cost("1G")
            .card_type(CardType::Creature)
            .power_toughness(2, 2)
            .build()
            .unwrap()
    }

    #[test]
    fn test_lethal_damage_sba_kills_creature() {
        let (mut state, mut a, mut b) = two_player_setup();
        let p0 = PlayerId::new(0);
        let id = state.add_to_battlefield(bear(), p0).unwrap();

        let mut ctrls = Controllers::new(vec![&mut a, &mut b]);
        publish(
            &mut state,
            &mut ctrls,
            GameEvent::DamageToObject {
                source: None,
                target: id,
                amount: 2,
                is_combat: false,
            },
        )
        .unwrap();

        assert!(!state.battlefield.contains(id));
        assert!(state.player_zones(p0).unwrap().graveyard.contains(id));
    }

    #[test]
    fn test_nonlethal_damage_marks_but_does_not_kill() {
        let (mut state, mut a, mut b) = two_player_setup();
        let p0 = PlayerId::new(0);
        let id = state.add_to_battlefield(bear(), p0).unwrap();

        let mut ctrls = Controllers::new(vec![&mut a, &mut b]);
        publish(
            &mut state,
            &mut ctrls,
            GameEvent::DamageToObject {
                source: None,
                target: id,
                amount: 1,
                is_combat: false,
            },
        )
        .unwrap();

        assert!(state.battlefield.contains(id));
        assert_eq!(state.objects.get(id).unwrap().damage, 1);
    }

    #[test]
    fn test_life_zero_eliminates_player() {
        let (mut state, mut a, mut b) = two_player_setup();
        let p1 = PlayerId::new(1);

        let mut ctrls = Controllers::new(vec![&mut a, &mut b]);
        publish(
            &mut state,
            &mut ctrls,
            GameEvent::DamageToPlayer {
                source: None,
                player: p1,
                amount: 25,
                is_combat: false,
            },
        )
        .unwrap();

        assert!(state.player(p1).unwrap().eliminated);
        assert_eq!(state.players_remaining(), 1);
    }

    #[test]
    fn test_death_trigger_goes_on_stack() {
        let (mut state, mut a, mut b) = two_player_setup();
        let p0 = PlayerId::new(0);
        let def = CardBuilder::new("doomed", "Doomed Dwarf")
            .mana_cost("R")
            .card_type(CardType::Creature)
            .power_toughness(1, 1)
            .triggered_ability(TriggeredAbilityDef::new(
                EventFilterDef::SelfDies,
                vec![Effect::DrawCards {
                    scope: PlayerScope::You,
                    count: 1,
                }],
            ))
            .build()
            .unwrap();
        let id = state.add_to_battlefield(def, p0).unwrap();

        let mut ctrls = Controllers::new(vec![&mut a, &mut b]);
        destroy_object(&mut state, &mut ctrls, id).unwrap();

        assert!(state.player_zones(p0).unwrap().graveyard.contains(id));
        assert_eq!(state.stack.len(), 1);
    }

    #[test]
    fn test_battle_enters_with_defense_and_damage_removes_it() {
        let (mut state, mut a, mut b) = two_player_setup();
        let p0 = PlayerId::new(0);
        let battle = CardBuilder::new("siege", "Borderland Siege")
            .mana_cost("2R")
            .card_type(CardType::Battle)
            .defense(4)
            .build()
            .unwrap();
        let id = state.add_to_battlefield(battle, p0).unwrap();
        assert_eq!(
            state.objects.get(id).unwrap().counter_count(&CounterType::defense()),
            4
        );

        let mut ctrls = Controllers::new(vec![&mut a, &mut b]);
        publish(
            &mut state,
            &mut ctrls,
            GameEvent::DamageToObject {
                source: None,
                target: id,
                amount: 3,
                is_combat: false,
            },
        )
        .unwrap();

        // Damage comes off the defense counters, not marked damage.
        let obj = state.objects.get(id).unwrap();
        assert_eq!(obj.counter_count(&CounterType::defense()), 1);
        assert_eq!(obj.damage, 0);
        assert!(state.battlefield.contains(id));
    }

    #[test]
    fn test_battle_at_zero_defense_dies() {
        let (mut state, mut a, mut b) = two_player_setup();
        let p0 = PlayerId::new(0);
        let battle = CardBuilder::new("siege", "Borderland Siege")
            .mana_cost("2R")
            .card_type(CardType::Battle)
            .defense(2)
            .build()
            .unwrap();
        let id = state.add_to_battlefield(battle, p0).unwrap();

        let mut ctrls = Controllers::new(vec![&mut a, &mut b]);
        publish(
            &mut state,
            &mut ctrls,
            GameEvent::DamageToObject {
                source: None,
                target: id,
                amount: 2,
                is_combat: false,
            },
        )
        .unwrap();

        assert!(!state.battlefield.contains(id));
        assert!(state.player_zones(p0).unwrap().graveyard.contains(id));
    }

    #[test]
    fn test_draw_from_empty_library_loses() {
        let (mut state, mut a, mut b) = two_player_setup();
        let p0 = PlayerId::new(0);

        let mut ctrls = Controllers::new(vec![&mut a, &mut b]);
        publish(&mut state, &mut ctrls, GameEvent::Draw { player: p0 }).unwrap();

        assert!(state.player(p0).unwrap().eliminated);
    }
}
