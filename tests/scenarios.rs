//! End-to-end rules scenarios driven through the public API.

use std::sync::Arc;

use mtg_rules_rs::core::{
    ActivatedAbilityDef, CardBuilder, CardDefinition, CardType, Color, Effect, EffectTarget,
    ObjectFilter, PlayerId, PlayerScope, ReplacementTemplateDef, StaticAbilityDef, TargetFilter,
    TargetRef, TargetSpec, TriggeredAbilityDef,
};
use mtg_rules_rs::core::{AlternativeCost, EventFilterDef, ManaCost};
use mtg_rules_rs::game::{
    casting, stack, Controllers, GameConfig, GameEvent, GameState, ScriptedController, StackItem,
    Step,
};
use mtg_rules_rs::game::bus;
use mtg_rules_rs::zones::Zone;

fn vanilla(id: &str, name: &str, cost: &str, p: i32, t: i32) -> Arc<CardDefinition> {
    CardBuilder::new(id, name)
        .mana_cost(cost)
        .card_type(CardType::Creature)
        .power_toughness(p, t)
        .build()
        .unwrap()
}

fn basic_land(id: &str, name: &str, color: Color) -> Arc<CardDefinition> {
    CardBuilder::new(id, name)
        .card_type(CardType::Land)
        .activated_ability(ActivatedAbilityDef::tap_for_mana(color))
        .build()
        .unwrap()
}

fn to_main(state: &mut GameState) {
    while state.turn.step() != Step::Main {
        state.turn.advance_step();
    }
    state.turn.reset_priority();
}

fn two_player() -> (GameState, PlayerId, PlayerId) {
    let state = GameState::new(GameConfig::default(), &["Alice", "Bob"]);
    (state, PlayerId::new(0), PlayerId::new(1))
}

#[test]
fn anthem_buffs_creatures_through_the_layer_fold() {
    let (mut state, p0, _p1) = two_player();
    to_main(&mut state);

    let mut lands = Vec::new();
    for _ in 0..2 {
        lands.push(
            state
                .add_to_battlefield(basic_land("forest", "Forest", Color::Green), p0)
                .unwrap(),
        );
    }
    for _ in 0..3 {
        lands.push(
            state
                .add_to_battlefield(basic_land("plains", "Plains", Color::White), p0)
                .unwrap(),
        );
    }
    let bears = state
        .add_to_hand(vanilla("grizzly-bears", "Grizzly Bears", "1G", 2, 2), p0)
        .unwrap();
    let anthem_def = CardBuilder::new("glorious-anthem", "Glorious Anthem")
        .mana_cost("1WW")
        .card_type(CardType::Enchantment)
        .static_ability(StaticAbilityDef::anthem(1, 1))
        .build()
        .unwrap();
    let anthem = state.add_to_hand(anthem_def, p0).unwrap();

    let mut a = ScriptedController::new();
    let mut b = ScriptedController::new();
    let mut ctrls = Controllers::new(vec![&mut a, &mut b]);

    for land in lands {
        casting::activate_ability(&mut state, &mut ctrls, p0, land, 0).unwrap();
    }

    casting::cast_spell(&mut state, &mut ctrls, p0, bears, None).unwrap();
    stack::resolve_top(&mut state, &mut ctrls).unwrap();
    assert!(state.battlefield.contains(bears));

    casting::cast_spell(&mut state, &mut ctrls, p0, anthem, None).unwrap();
    stack::resolve_top(&mut state, &mut ctrls).unwrap();
    assert!(state.battlefield.contains(anthem));

    let chars = state.characteristics();
    assert_eq!(chars[&bears].power, Some(3));
    assert_eq!(chars[&bears].toughness, Some(3));
}

#[test]
fn lethal_damage_sba_moves_creature_to_graveyard() {
    let (mut state, p0, p1) = two_player();
    let a_id = state
        .add_to_battlefield(vanilla("grizzly-bears", "Grizzly Bears", "1G", 2, 2), p0)
        .unwrap();
    let b_id = state
        .add_to_battlefield(vanilla("grizzly-bears", "Grizzly Bears", "1G", 2, 2), p1)
        .unwrap();

    let mut a = ScriptedController::new();
    let mut b = ScriptedController::new();
    let mut ctrls = Controllers::new(vec![&mut a, &mut b]);

    bus::publish(
        &mut state,
        &mut ctrls,
        GameEvent::DamageToObject {
            source: None,
            target: a_id,
            amount: 2,
            is_combat: false,
        },
    )
    .unwrap();

    let obj = state.objects.get(a_id).unwrap();
    assert_eq!(obj.zone, Zone::Graveyard);
    assert_eq!(obj.damage, 0);
    assert!(state.player_zones(p0).unwrap().graveyard.contains(a_id));
    assert!(state.battlefield.contains(b_id));
}

#[test]
fn enters_tapped_replacement_applies_on_resolution() {
    let (mut state, p0, _p1) = two_player();
    to_main(&mut state);

    let def = CardBuilder::new("sleepy-ogre", "Sleepy Ogre")
        .card_type(CardType::Creature)
        .power_toughness(3, 3)
        .replacement(ReplacementTemplateDef::enters_tapped())
        .build()
        .unwrap();
    let ogre = state.add_to_hand(def, p0).unwrap();

    let mut a = ScriptedController::new();
    let mut b = ScriptedController::new();
    let mut ctrls = Controllers::new(vec![&mut a, &mut b]);

    casting::cast_spell(&mut state, &mut ctrls, p0, ogre, None).unwrap();
    stack::resolve_top(&mut state, &mut ctrls).unwrap();

    let obj = state.objects.get(ogre).unwrap();
    assert_eq!(obj.zone, Zone::Battlefield);
    assert!(obj.tapped);
}

#[test]
fn stack_resolves_lifo() {
    let (mut state, p0, p1) = two_player();
    to_main(&mut state);
    for _ in 0..5 {
        state
            .add_to_library(vanilla("filler", "Filler Bear", "1G", 2, 2), p0)
            .unwrap();
    }

    let shock_def = CardBuilder::new("shock", "Shock")
        .mana_cost("R")
        .card_type(CardType::Instant)
        .spell_target(TargetSpec::required(TargetFilter::AnyTarget))
        .spell_effect(Effect::DealDamage {
            target: EffectTarget::Slot(0),
            amount: 2,
        })
        .build()
        .unwrap();
    let opt_def = CardBuilder::new("opt", "Opt")
        .mana_cost("U")
        .card_type(CardType::Instant)
        .spell_effect(Effect::DrawCards {
            scope: PlayerScope::You,
            count: 1,
        })
        .build()
        .unwrap();
    let shock = state.add_to_hand(shock_def, p0).unwrap();
    let opt = state.add_to_hand(opt_def, p0).unwrap();
    state.player_mut(p0).unwrap().mana_pool.add(Color::Red, 1);
    state.player_mut(p0).unwrap().mana_pool.add(Color::Blue, 1);

    let mut a = ScriptedController::new();
    a.enqueue_target(Some(TargetRef::Player(p1)));
    let mut b = ScriptedController::new();
    let mut ctrls = Controllers::new(vec![&mut a, &mut b]);

    casting::cast_spell(&mut state, &mut ctrls, p0, shock, None).unwrap();
    casting::cast_spell(&mut state, &mut ctrls, p0, opt, None).unwrap();
    assert_eq!(state.stack.len(), 2);
    assert!(matches!(
        state.stack[0],
        StackItem::Spell { object, .. } if object == shock
    ));
    assert!(matches!(
        state.stack[1],
        StackItem::Spell { object, .. } if object == opt
    ));

    // Opt first: a card is drawn and Opt hits the graveyard while Shock is
    // still pending.
    let hand_before = state.player_zones(p0).unwrap().hand.len();
    stack::resolve_top(&mut state, &mut ctrls).unwrap();
    assert_eq!(state.player_zones(p0).unwrap().hand.len(), hand_before + 1);
    assert!(state.player_zones(p0).unwrap().graveyard.contains(opt));
    assert_eq!(state.player(p1).unwrap().life, 20);

    stack::resolve_top(&mut state, &mut ctrls).unwrap();
    assert!(state.player_zones(p0).unwrap().graveyard.contains(shock));
    assert_eq!(state.player(p1).unwrap().life, 18);
    assert!(state.stack.is_empty());
}

#[test]
fn passing_priority_advances_the_turn_and_empties_pools() {
    let (mut state, p0, _p1) = two_player();
    to_main(&mut state);
    assert_eq!(state.turn.phase(), mtg_rules_rs::game::Phase::PrecombatMain);

    // Float a mana so the pool-emptying rule is observable.
    let land = state
        .add_to_battlefield(basic_land("forest", "Forest", Color::Green), p0)
        .unwrap();
    let mut a = ScriptedController::new();
    let mut b = ScriptedController::new();
    let mut ctrls = Controllers::new(vec![&mut a, &mut b]);
    casting::activate_ability(&mut state, &mut ctrls, p0, land, 0).unwrap();
    assert!(!state.player(p0).unwrap().mana_pool.is_empty());

    // Both players pass: the window closes without resolving anything.
    mtg_rules_rs::game::game_loop::priority_window(&mut state, &mut ctrls).unwrap();
    assert!(state.turn.priority.is_none());
    assert!(state.stack.is_empty());

    // The turn machine's next position is the combat phase, and pools empty
    // at the boundary.
    for p in state.players.iter_mut() {
        p.mana_pool.clear();
    }
    assert!(state.turn.advance_step());
    assert_eq!(state.turn.phase(), mtg_rules_rs::game::Phase::Combat);
    assert_eq!(state.turn.step(), Step::BeginCombat);
    assert!(state.player(p0).unwrap().mana_pool.is_empty());
}

#[test]
fn simultaneous_triggers_stack_in_apnap_order() {
    let (mut state, p0, p1) = two_player();
    for _ in 0..5 {
        state
            .add_to_library(vanilla("filler", "Filler Bear", "1G", 2, 2), p0)
            .unwrap();
        state
            .add_to_library(vanilla("filler", "Filler Bear", "1G", 2, 2), p1)
            .unwrap();
    }

    let watcher_def = CardBuilder::new("watcher", "Curious Watcher")
        .mana_cost("1U")
        .card_type(CardType::Enchantment)
        .triggered_ability(TriggeredAbilityDef::new(
            EventFilterDef::ObjectEnters(ObjectFilter::creatures()),
            vec![Effect::DrawCards {
                scope: PlayerScope::You,
                count: 1,
            }],
        ))
        .build()
        .unwrap();
    let active_watcher = state.add_to_battlefield(watcher_def.clone(), p0).unwrap();
    let other_watcher = state.add_to_battlefield(watcher_def, p1).unwrap();

    let bears = state
        .add_to_hand(vanilla("grizzly-bears", "Grizzly Bears", "1G", 2, 2), p0)
        .unwrap();

    let mut a = ScriptedController::new();
    let mut b = ScriptedController::new();
    let mut ctrls = Controllers::new(vec![&mut a, &mut b]);

    bus::publish(
        &mut state,
        &mut ctrls,
        GameEvent::zone_change(bears, Zone::Hand, Zone::Battlefield),
    )
    .unwrap();

    // Bottom-to-top: non-active player's trigger first, active's on top.
    assert_eq!(state.stack.len(), 2);
    assert!(matches!(
        state.stack[0],
        StackItem::Trigger { source, .. } if source == other_watcher
    ));
    assert!(matches!(
        state.stack[1],
        StackItem::Trigger { source, .. } if source == active_watcher
    ));

    // The active player's trigger resolves first.
    let p0_hand = state.player_zones(p0).unwrap().hand.len();
    let p1_hand = state.player_zones(p1).unwrap().hand.len();
    stack::resolve_top(&mut state, &mut ctrls).unwrap();
    assert_eq!(state.player_zones(p0).unwrap().hand.len(), p0_hand + 1);
    assert_eq!(state.player_zones(p1).unwrap().hand.len(), p1_hand);
    stack::resolve_top(&mut state, &mut ctrls).unwrap();
    assert_eq!(state.player_zones(p1).unwrap().hand.len(), p1_hand + 1);
}

#[test]
fn flashback_casts_from_graveyard_and_exiles() {
    let (mut state, p0, p1) = two_player();
    to_main(&mut state);

    let bolt_def = CardBuilder::new("reckless-charge", "Searing Memory")
        .mana_cost("R")
        .card_type(CardType::Sorcery)
        .spell_target(TargetSpec::required(TargetFilter::AnyTarget))
        .spell_effect(Effect::DealDamage {
            target: EffectTarget::Slot(0),
            amount: 3,
        })
        .alternative_cost(AlternativeCost::flashback(ManaCost::from_string("1R")))
        .build()
        .unwrap();
    let bolt = state.add_to_graveyard(bolt_def, p0).unwrap();
    state.player_mut(p0).unwrap().mana_pool.add(Color::Red, 2);

    let mut a = ScriptedController::new();
    a.enqueue_target(Some(TargetRef::Player(p1)));
    let mut b = ScriptedController::new();
    let mut ctrls = Controllers::new(vec![&mut a, &mut b]);

    casting::cast_spell(&mut state, &mut ctrls, p0, bolt, Some(0)).unwrap();
    assert!(!state.player_zones(p0).unwrap().graveyard.contains(bolt));
    stack::resolve_top(&mut state, &mut ctrls).unwrap();

    assert_eq!(state.player(p1).unwrap().life, 17);
    // Flashback exiles instead of returning to the graveyard.
    assert_eq!(state.objects.get(bolt).unwrap().zone, Zone::Exile);
    assert!(state.player_zones(p0).unwrap().exile.contains(bolt));
}

#[test]
fn zone_integrity_holds_after_a_busy_drain() {
    let (mut state, p0, p1) = two_player();
    let a_id = state
        .add_to_battlefield(vanilla("grizzly-bears", "Grizzly Bears", "1G", 2, 2), p0)
        .unwrap();
    state
        .add_to_battlefield(vanilla("hill-giant", "Hill Giant", "3R", 3, 3), p1)
        .unwrap();

    let mut a = ScriptedController::new();
    let mut b = ScriptedController::new();
    let mut ctrls = Controllers::new(vec![&mut a, &mut b]);
    bus::publish(
        &mut state,
        &mut ctrls,
        GameEvent::DamageToObject {
            source: None,
            target: a_id,
            amount: 5,
            is_combat: false,
        },
    )
    .unwrap();

    // Every object id in a zone list agrees with the object's zone field,
    // and appears in exactly one list.
    let mut seen = std::collections::HashSet::new();
    for id in &state.battlefield.cards {
        assert_eq!(state.objects.get(*id).unwrap().zone, Zone::Battlefield);
        assert!(seen.insert(*id));
    }
    for player in [p0, p1] {
        let zones = state.player_zones(player).unwrap();
        for (zone, list) in [
            (Zone::Hand, &zones.hand),
            (Zone::Graveyard, &zones.graveyard),
            (Zone::Library, &zones.library),
            (Zone::Exile, &zones.exile),
        ] {
            for id in &list.cards {
                assert_eq!(state.objects.get(*id).unwrap().zone, zone);
                assert!(seen.insert(*id));
            }
        }
    }
}

#[test]
fn snapshot_round_trip_is_stable_mid_stack() {
    let (mut state, p0, p1) = two_player();
    to_main(&mut state);
    let shock_def = CardBuilder::new("shock", "Shock")
        .mana_cost("R")
        .card_type(CardType::Instant)
        .spell_target(TargetSpec::required(TargetFilter::AnyTarget))
        .spell_effect(Effect::DealDamage {
            target: EffectTarget::Slot(0),
            amount: 2,
        })
        .build()
        .unwrap();
    let shock = state.add_to_hand(shock_def, p0).unwrap();
    state.player_mut(p0).unwrap().mana_pool.add(Color::Red, 1);

    let mut a = ScriptedController::new();
    a.enqueue_target(Some(TargetRef::Player(p1)));
    let mut b = ScriptedController::new();
    let mut ctrls = Controllers::new(vec![&mut a, &mut b]);
    casting::cast_spell(&mut state, &mut ctrls, p0, shock, None).unwrap();
    assert_eq!(state.stack.len(), 1);

    // Save with the spell still on the stack; the restored game serializes
    // to the same bytes.
    let saved = mtg_rules_rs::game::snapshot::save(&state).unwrap();
    let restored = mtg_rules_rs::game::snapshot::load(&saved).unwrap();
    let saved_again = mtg_rules_rs::game::snapshot::save(&restored).unwrap();
    similar_asserts::assert_eq!(saved, saved_again);

    // And the restored game still resolves the pending spell.
    let mut state = restored;
    stack::resolve_top(&mut state, &mut ctrls).unwrap();
    assert_eq!(state.player(p1).unwrap().life, 18);
}

#[test]
fn layer_evaluation_is_pure() {
    let (mut state, p0, _p1) = two_player();
    let bears = state
        .add_to_battlefield(vanilla("grizzly-bears", "Grizzly Bears", "1G", 2, 2), p0)
        .unwrap();
    let anthem = CardBuilder::new("glorious-anthem", "Glorious Anthem")
        .mana_cost("1WW")
        .card_type(CardType::Enchantment)
        .static_ability(StaticAbilityDef::anthem(1, 1))
        .build()
        .unwrap();
    state.add_to_battlefield(anthem, p0).unwrap();

    let first = state.characteristics();
    let second = state.characteristics();
    assert_eq!(first[&bears], second[&bears]);
}
