//! Replacement effects: collection and the application loop
//!
//! Replacements rewrite an event before it is applied; nothing they watch
//! has happened yet. Sources are battlefield permanents plus the event's
//! own object (a card entering the battlefield carries its "enters tapped"
//! template with it). Each template applies at most once per event, which
//! bounds the loop.

use crate::core::{ObjectId, PlayerScope, ReplacementAction, ReplacementWatch};
use crate::game::events::{GameEvent, PendingEvent};
use crate::game::layers::{self, object_filter_matches};
use crate::game::state::GameState;
use crate::log_if_verbose;
use crate::zones::Zone;

/// One applicable replacement, keyed for the once-per-event guard.
struct Applicable {
    /// (source id << 16) | template index: unique per template instance.
    key: u64,
    source: ObjectId,
    template_index: usize,
    /// APNAP position of the source's controller, for ordering.
    apnap_pos: usize,
}

fn guard_key(source: ObjectId, template_index: usize) -> u64 {
    ((source.as_u32() as u64) << 16) | (template_index as u64 & 0xFFFF)
}

/// Run the replacement loop over a pending event. Returns false when a
/// Prevent cancelled the event outright.
pub fn apply_replacements(state: &GameState, pending: &mut PendingEvent) -> bool {
    loop {
        let applicable = collect_applicable(state, pending);
        let next = match applicable.into_iter().next() {
            Some(a) => a,
            None => return true,
        };

        pending.applied_replacements.push(next.key);
        let action = match state.objects.get(next.source) {
            Ok(obj) => obj.def.replacements[next.template_index].action.clone(),
            Err(_) => continue,
        };

        log_if_verbose!(
            state.logger,
            "replacement from {} rewrites event",
            next.source
        );

        match action {
            ReplacementAction::Prevent => return false,
            ReplacementAction::ChangeDestination(zone) => {
                if let GameEvent::ZoneChange { to, .. } = &mut pending.event {
                    *to = zone;
                }
            }
            ReplacementAction::EnterTapped => {
                if let GameEvent::ZoneChange { enters_tapped, .. } = &mut pending.event {
                    *enters_tapped = true;
                }
            }
            ReplacementAction::EnterWithCounters { kind, count } => {
                if let GameEvent::ZoneChange { enter_counters, .. } = &mut pending.event {
                    enter_counters.push((kind, count));
                }
            }
            ReplacementAction::ChangeAmount(change) => {
                if let Some(amount) = pending.event.amount() {
                    pending.event.set_amount(change.apply(amount));
                }
            }
        }
    }
}

/// Find every template watching this event that has not yet applied,
/// ordered APNAP by source controller, then source timestamp, then
/// template index. The head of the list applies next.
fn collect_applicable(state: &GameState, pending: &PendingEvent) -> Vec<Applicable> {
    let apnap = state.apnap_order();
    let apnap_pos = |p| apnap.iter().position(|&x| x == p).unwrap_or(usize::MAX);
    let chars = layers::evaluate(state);

    let mut sources: Vec<ObjectId> = state.battlefield.cards.clone();
    // The event's own object contributes its self-templates even though it
    // is not on the battlefield yet (or is leaving it).
    if let GameEvent::ZoneChange { object, .. } = &pending.event {
        if !sources.contains(object) {
            sources.push(*object);
        }
    }

    let mut out: Vec<Applicable> = Vec::new();
    for source in sources {
        let obj = match state.objects.get(source) {
            Ok(o) => o,
            Err(_) => continue,
        };
        // A permanent with its abilities removed replaces nothing.
        if chars.get(&source).is_some_and(|c| c.abilities_removed) {
            continue;
        }
        for (i, template) in obj.def.replacements.iter().enumerate() {
            let key = guard_key(source, i);
            if pending.applied_replacements.contains(&key) {
                continue;
            }
            if !watch_matches(state, &template.watches, source, &pending.event) {
                continue;
            }
            out.push(Applicable {
                key,
                source,
                template_index: i,
                apnap_pos: apnap_pos(obj.controller),
            });
        }
    }
    out.sort_by_key(|a| {
        let ts = state
            .objects
            .get(a.source)
            .map(|o| o.timestamp)
            .unwrap_or_default();
        (a.apnap_pos, ts, a.source, a.template_index)
    });
    out
}

fn watch_matches(
    state: &GameState,
    watch: &ReplacementWatch,
    source: ObjectId,
    event: &GameEvent,
) -> bool {
    let controller_of = |id: ObjectId| state.objects.get(id).map(|o| o.controller).ok();
    match (watch, event) {
        (ReplacementWatch::SelfEntersBattlefield, GameEvent::ZoneChange { object, to, .. }) => {
            *object == source && *to == Zone::Battlefield
        }
        (ReplacementWatch::SelfWouldDie, GameEvent::ZoneChange { object, from, to, .. }) => {
            *object == source && *from == Zone::Battlefield && *to == Zone::Graveyard
        }
        (
            ReplacementWatch::ObjectEntersBattlefield(filter),
            GameEvent::ZoneChange { object, to, .. },
        ) => {
            if *to != Zone::Battlefield || *object == source {
                return false;
            }
            let Some(src_controller) = controller_of(source) else {
                return false;
            };
            // The entering object is not on the battlefield yet; judge it
            // on printed characteristics.
            match layers::characteristics_of(state, *object) {
                Ok(chars) => {
                    object_filter_matches(filter, *object, &chars, src_controller, Some(source))
                }
                Err(_) => false,
            }
        }
        (ReplacementWatch::DamageToYou, GameEvent::DamageToPlayer { player, .. }) => {
            controller_of(source) == Some(*player)
        }
        (ReplacementWatch::DamageToSelf, GameEvent::DamageToObject { target, .. }) => {
            *target == source
        }
        (ReplacementWatch::DrawBy(scope), GameEvent::Draw { player }) => {
            let Some(src_controller) = controller_of(source) else {
                return false;
            };
            match scope {
                PlayerScope::You => *player == src_controller,
                PlayerScope::Opponents => *player != src_controller,
                PlayerScope::Each => true,
                PlayerScope::Slot(_) => false,
            }
        }
        (
            ReplacementWatch::SelfSpellLeavesStack,
            GameEvent::ZoneChange { object, from, .. },
        ) => *object == source && *from == Zone::Stack,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        AmountChange, CardBuilder, CardType, CounterType, PlayerId, ReplacementTemplateDef,
    };
    use crate::game::state::GameConfig;
    use smallvec::SmallVec;

    #[test]
    fn test_enters_tapped_rewrites_zone_change() {
        let mut state = GameState::new(GameConfig::default(), &["A"]);
        let p0 = PlayerId::new(0);
        let def = CardBuilder::new("guildgate", "Guildgate")
            .card_type(CardType::Land)
            .replacement(ReplacementTemplateDef::enters_tapped())
            .build()
            .unwrap();
        let card = state.add_to_hand(def, p0).unwrap();

        let mut pending = PendingEvent::new(GameEvent::zone_change(
            card,
            Zone::Hand,
            Zone::Battlefield,
        ));
        assert!(apply_replacements(&state, &mut pending));
        match pending.event {
            GameEvent::ZoneChange { enters_tapped, .. } => assert!(enters_tapped),
            _ => panic!("wrong variant"),
        }
        // Applied once: the guard stops a second application.
        assert_eq!(pending.applied_replacements.len(), 1);
    }

    #[test]
    fn test_enter_counters_accumulate() {
        let mut state = GameState::new(GameConfig::default(), &["A"]);
        let p0 = PlayerId::new(0);
        let def = CardBuilder::new("construct", "Construct")
            .card_type(CardType::Creature)
            .power_toughness(0, 0)
            .replacement(ReplacementTemplateDef::enters_with_counters(
                CounterType::plus_one_plus_one(),
                3,
            ))
            .build()
            .unwrap();
        let card = state.add_to_hand(def, p0).unwrap();

        let mut pending = PendingEvent::new(GameEvent::zone_change(
            card,
            Zone::Hand,
            Zone::Battlefield,
        ));
        assert!(apply_replacements(&state, &mut pending));
        match pending.event {
            GameEvent::ZoneChange { enter_counters, .. } => {
                let expected: SmallVec<[(CounterType, u32); 2]> =
                    smallvec::smallvec![(CounterType::plus_one_plus_one(), 3)];
                assert_eq!(enter_counters, expected);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_damage_prevention_cancels_event() {
        let mut state = GameState::new(GameConfig::default(), &["A"]);
        let p0 = PlayerId::new(0);
        let def = CardBuilder::new("ward", "Protective Ward")
            .card_type(CardType::Enchantment)
            .replacement(ReplacementTemplateDef {
                watches: ReplacementWatch::DamageToYou,
                action: ReplacementAction::Prevent,
            })
            .build()
            .unwrap();
        state.add_to_battlefield(def, p0).unwrap();

        let mut pending = PendingEvent::new(GameEvent::DamageToPlayer {
            source: None,
            player: p0,
            amount: 4,
            is_combat: false,
        });
        assert!(!apply_replacements(&state, &mut pending));
    }

    #[test]
    fn test_amount_doubling_applies_once() {
        let mut state = GameState::new(GameConfig::default(), &["A", "B"]);
        let p1 = PlayerId::new(1);
        let def = CardBuilder::new("doubler", "Damage Doubler")
            .card_type(CardType::Enchantment)
            .replacement(ReplacementTemplateDef {
                watches: ReplacementWatch::DamageToYou,
                action: ReplacementAction::ChangeAmount(AmountChange::Multiply(2)),
            })
            .build()
            .unwrap();
        state.add_to_battlefield(def, p1).unwrap();

        let mut pending = PendingEvent::new(GameEvent::DamageToPlayer {
            source: None,
            player: p1,
            amount: 3,
            is_combat: false,
        });
        assert!(apply_replacements(&state, &mut pending));
        assert_eq!(pending.event.amount(), Some(6));
    }
}
