//! Legal action enumeration
//!
//! `available_actions` lists every action a player could take with priority
//! right now; `execute_action` carries one out. The enumerator is
//! conservative about mana: a cast is only offered when the pool already
//! covers the cost, so controllers activate mana abilities first.

use crate::core::{CostItem, Keyword, PlayerId, SpeedClass};
use crate::game::casting;
use crate::game::controller::{Controllers, PlayerAction};
use crate::game::layers;
use crate::game::state::GameState;
use crate::zones::Zone;
use crate::Result;

/// Enumerate the actions `player` may legally take. `PassPriority` is
/// always last.
pub fn available_actions(state: &GameState, player: PlayerId) -> Vec<PlayerAction> {
    let mut actions = Vec::new();
    let Ok(p) = state.player(player) else {
        return vec![PlayerAction::PassPriority];
    };
    let Ok(zones) = state.player_zones(player) else {
        return vec![PlayerAction::PassPriority];
    };
    let main_open = state.turn.is_main_phase_of(player) && state.stack.is_empty();

    // Lands.
    if main_open && p.can_play_land() {
        for &card in &zones.hand.cards {
            if let Ok(obj) = state.objects.get(card) {
                if obj.def.is_land() {
                    actions.push(PlayerAction::PlayLand(card));
                }
            }
        }
    }

    // Spells from hand.
    for &card in &zones.hand.cards {
        let Ok(obj) = state.objects.get(card) else { continue };
        if obj.def.is_land() {
            continue;
        }
        let instant_speed = obj.def.is_type(crate::core::CardType::Instant)
            || obj.def.has_keyword(&Keyword::Flash);
        if !instant_speed && !main_open {
            continue;
        }
        if p.mana_pool.can_pay(&obj.def.mana_cost) {
            actions.push(PlayerAction::CastSpell {
                object: card,
                alternative: None,
            });
        }
    }

    // Alternative-cost casts from other zones (flashback and friends).
    for &card in &zones.graveyard.cards {
        let Ok(obj) = state.objects.get(card) else { continue };
        for (i, alt) in obj.def.alternative_costs.iter().enumerate() {
            if alt.from_zone != Some(Zone::Graveyard) {
                continue;
            }
            let instant_speed = obj.def.is_type(crate::core::CardType::Instant)
                || obj.def.has_keyword(&Keyword::Flash);
            if !instant_speed && !main_open {
                continue;
            }
            let mana = alt.mana.unwrap_or(obj.def.mana_cost);
            if p.mana_pool.can_pay(&mana) {
                actions.push(PlayerAction::CastSpell {
                    object: card,
                    alternative: Some(i),
                });
            }
        }
    }

    // Commander from the command zone.
    if state.config.commander {
        if let Some(cmdr) = p.commander {
            if state
                .objects
                .get(cmdr)
                .map(|o| o.zone == Zone::Command)
                .unwrap_or(false)
                && main_open
            {
                actions.push(PlayerAction::CastSpell {
                    object: cmdr,
                    alternative: None,
                });
            }
        }
    }

    // Activated abilities of controlled permanents.
    for id in state.battlefield_ids() {
        let Ok(obj) = state.objects.get(id) else { continue };
        if obj.controller != player {
            continue;
        }
        let chars = layers::characteristics_of(state, id).ok();
        if chars.as_ref().is_some_and(|c| c.abilities_removed) {
            continue;
        }
        for (i, ability) in obj.def.activated.iter().enumerate() {
            if ability.speed == SpeedClass::Sorcery && !main_open {
                continue;
            }
            if ability.costs.contains(&CostItem::TapSelf) {
                if obj.tapped {
                    continue;
                }
                let sick = chars
                    .as_ref()
                    .is_some_and(|c| c.is_creature() && !c.has_keyword(&Keyword::Haste))
                    && obj.summoning_sick;
                if sick {
                    continue;
                }
            }
            if let Some(mana) = &ability.mana_cost {
                if !p.mana_pool.can_pay(mana) {
                    continue;
                }
            }
            actions.push(PlayerAction::ActivateAbility {
                source: id,
                ability_index: i,
            });
        }
    }

    actions.push(PlayerAction::PassPriority);
    actions
}

/// Carry out one action. `PassPriority` is a no-op here; the priority loop
/// interprets it.
pub fn execute_action(
    state: &mut GameState,
    controllers: &mut Controllers,
    player: PlayerId,
    action: &PlayerAction,
) -> Result<()> {
    match action {
        PlayerAction::PlayLand(object) => casting::play_land(state, controllers, player, *object),
        PlayerAction::CastSpell {
            object,
            alternative,
        } => casting::cast_spell(state, controllers, player, *object, *alternative),
        PlayerAction::ActivateAbility {
            source,
            ability_index,
        } => casting::activate_ability(state, controllers, player, *source, *ability_index),
        PlayerAction::PassPriority => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ActivatedAbilityDef, CardBuilder, CardType, Color};

    use crate::game::state::GameConfig;

    fn forest() -> std::sync::Arc<crate::core::CardDefinition> {
        CardBuilder::new("forest", "Forest")
            .card_type(CardType::Land)
            .activated_ability(ActivatedAbilityDef::tap_for_mana(Color::Green))
            .build()
            .unwrap()
    }

    #[test]
    fn test_pass_always_offered_and_last() {
        let state = GameState::new(GameConfig::default(), &["A", "B"]);
        let actions = available_actions(&state, PlayerId::new(0));
        assert_eq!(actions.last(), Some(&PlayerAction::PassPriority));
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn test_land_only_in_own_main() {
        let mut state = GameState::new(GameConfig::default(), &["A", "B"]);
        let p0 = PlayerId::new(0);
        let land = state.add_to_hand(forest(), p0).unwrap();

        // Untap step: no land play.
        assert!(!available_actions(&state, p0).contains(&PlayerAction::PlayLand(land)));

        while state.turn.step() != crate::game::phase::Step::Main {
            state.turn.advance_step();
        }
        assert!(available_actions(&state, p0).contains(&PlayerAction::PlayLand(land)));
        // Not for the non-active player.
        assert!(!available_actions(&state, PlayerId::new(1))
            .iter()
            .any(|a| matches!(a, PlayerAction::PlayLand(_))));
    }

    #[test]
    fn test_cast_offered_only_with_mana() {
        let mut state = GameState::new(GameConfig::default(), &["A", "B"]);
        let p0 = PlayerId::new(0);
        let bolt = CardBuilder::new("shock", "Shock")
            .mana_cost("R")
            .card_type(CardType::Instant)
            .spell_target(crate::core::TargetSpec::required(
                crate::core::TargetFilter::AnyTarget,
            ))
            .spell_effect(crate::core::Effect::DealDamage {
                target: crate::core::EffectTarget::Slot(0),
                amount: 2,
            })
            .build()
            .unwrap();
        let card = state.add_to_hand(bolt, p0).unwrap();

        assert!(!available_actions(&state, p0)
            .iter()
            .any(|a| matches!(a, PlayerAction::CastSpell { object, .. } if *object == card)));

        state
            .player_mut(p0)
            .unwrap()
            .mana_pool
            .add(Color::Red, 1);
        assert!(available_actions(&state, p0)
            .iter()
            .any(|a| matches!(a, PlayerAction::CastSpell { object, .. } if *object == card)));
    }

    #[test]
    fn test_tapped_land_offers_no_mana_ability() {
        let mut state = GameState::new(GameConfig::default(), &["A", "B"]);
        let p0 = PlayerId::new(0);
        let land = state.add_to_battlefield(forest(), p0).unwrap();

        assert!(available_actions(&state, p0)
            .iter()
            .any(|a| matches!(a, PlayerAction::ActivateAbility { source, .. } if *source == land)));

        state.objects.get_mut(land).unwrap().tap();
        assert!(!available_actions(&state, p0)
            .iter()
            .any(|a| matches!(a, PlayerAction::ActivateAbility { source, .. } if *source == land)));
    }
}
