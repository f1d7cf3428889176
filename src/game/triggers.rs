//! Triggered abilities: event matching and stack placement
//!
//! After an event applies, every battlefield permanent (and the event's
//! own object, for death triggers) is offered the event. Matching triggers
//! go on the stack so they resolve in APNAP order: the active player's
//! trigger ends up on top, each player ordering their own simultaneous
//! triggers.

use crate::core::{
    ConditionDef, CounterType, EventFilterDef, ObjectId, PlayerId, PlayerScope, TriggerMoment,
};
use crate::game::controller::{Controllers, GameStateView};
use crate::game::events::GameEvent;
use crate::game::layers::{self, object_filter_matches};
use crate::game::phase::Step;
use crate::game::stack::{self, StackItem};
use crate::game::state::GameState;
use crate::log_if_verbose;
use crate::Result;

/// Evaluate an intervening-if condition. Checked when the ability triggers
/// and again on resolution.
pub fn condition_holds(
    state: &GameState,
    source: ObjectId,
    controller: PlayerId,
    cond: &ConditionDef,
    event: &GameEvent,
) -> bool {
    match cond {
        ConditionDef::SourceHasCounter(kind) => {
            // Death events carry the pre-event counter snapshot; the dying
            // object's own counters are already cleared.
            if let GameEvent::CreatureDied {
                object, counters, ..
            } = event
            {
                if *object == source {
                    return counters.iter().any(|(k, n)| k == kind && *n > 0);
                }
            }
            state
                .objects
                .get(source)
                .map(|o| o.counter_count(kind) > 0)
                .unwrap_or(false)
        }
        ConditionDef::ControlsAtLeast { filter, count } => {
            let chars = layers::evaluate(state);
            let n = chars
                .iter()
                .filter(|(id, c)| {
                    object_filter_matches(filter, **id, c, controller, Some(source))
                })
                .count();
            n >= *count as usize
        }
        ConditionDef::LifeAtMost(threshold) => state
            .player(controller)
            .map(|p| p.life <= *threshold)
            .unwrap_or(false),
    }
}

struct Fired {
    source: ObjectId,
    controller: PlayerId,
    trigger_index: usize,
}

/// Offer an applied event to all triggered abilities and put the matches
/// on the stack.
pub fn notify(
    state: &mut GameState,
    controllers: &mut Controllers,
    event: &GameEvent,
) -> Result<()> {
    let fired = collect_fired(state, event);
    if fired.is_empty() {
        return Ok(());
    }

    // Placement runs in reverse APNAP order, so the active player's
    // triggers land on top of the stack and resolve first.
    for player in state.apnap_order().into_iter().rev() {
        let mut mine: Vec<&Fired> = fired.iter().filter(|f| f.controller == player).collect();
        if mine.is_empty() {
            continue;
        }
        if mine.len() > 1 {
            // The controller orders their own simultaneous triggers; the
            // chosen order is the placement order.
            let items: Vec<StackItem> = mine
                .iter()
                .map(|f| StackItem::Trigger {
                    source: f.source,
                    controller: f.controller,
                    trigger_index: f.trigger_index,
                    targets: Vec::new(),
                    event: Box::new(event.clone()),
                })
                .collect();
            let view = GameStateView::new(state, player);
            let ctrl = controllers.get(player)?;
            let order = ctrl.choose_order(&view, &items);
            if order.len() == mine.len()
                && (0..mine.len()).all(|i| order.contains(&i))
            {
                mine = order.into_iter().map(|i| mine[i]).collect();
            }
        }

        for f in mine {
            push_trigger(state, controllers, f, event)?;
        }
    }
    Ok(())
}

fn push_trigger(
    state: &mut GameState,
    controllers: &mut Controllers,
    fired: &Fired,
    event: &GameEvent,
) -> Result<()> {
    let def = state.objects.get(fired.source)?.def.clone();
    let ability = &def.triggered[fired.trigger_index];

    if let Some(cond) = &ability.condition {
        if !condition_holds(state, fired.source, fired.controller, cond, event) {
            log_if_verbose!(
                state.logger,
                "trigger of {} suppressed by condition",
                fired.source
            );
            return Ok(());
        }
    }

    if !ability.mandatory {
        let view = GameStateView::new(state, fired.controller);
        let ctrl = controllers.get(fired.controller)?;
        if !ctrl.choose_yes_no(&view, "use optional triggered ability?") {
            return Ok(());
        }
    }

    // Targets are chosen as the trigger goes on the stack. A mandatory
    // trigger with no legal target is simply not placed.
    let targets = if ability.targets.is_empty() {
        Vec::new()
    } else {
        match stack::choose_targets(
            state,
            controllers,
            fired.controller,
            fired.source,
            &ability.targets,
        ) {
            Ok(t) => t,
            Err(e) if e.is_recoverable() => {
                log_if_verbose!(
                    state.logger,
                    "trigger of {} has no legal targets",
                    fired.source
                );
                return Ok(());
            }
            Err(e) => return Err(e),
        }
    };

    state.logger.log_normal(&format!(
        "triggered ability of {} goes on the stack",
        state
            .objects
            .get(fired.source)
            .map(|o| o.def.name.to_string())
            .unwrap_or_else(|_| fired.source.to_string())
    ));
    state.stack.push(StackItem::Trigger {
        source: fired.source,
        controller: fired.controller,
        trigger_index: fired.trigger_index,
        targets,
        event: Box::new(event.clone()),
    });
    Ok(())
}

fn collect_fired(state: &GameState, event: &GameEvent) -> Vec<Fired> {
    let chars = layers::evaluate(state);
    let mut sources: Vec<ObjectId> = state.battlefield.cards.clone();

    // The object leaving the battlefield still sees its own death event.
    if let GameEvent::CreatureDied { object, .. } | GameEvent::LeftBattlefield { object, .. } =
        event
    {
        if !sources.contains(object) {
            sources.push(*object);
        }
    }

    let mut fired: Vec<Fired> = Vec::new();
    for source in sources {
        let obj = match state.objects.get(source) {
            Ok(o) => o,
            Err(_) => continue,
        };
        if chars.get(&source).is_some_and(|c| c.abilities_removed) {
            continue;
        }
        let controller = match event {
            // The dying object's controller comes from the event snapshot.
            GameEvent::CreatureDied {
                object, controller, ..
            } if *object == source => *controller,
            _ => obj.controller,
        };
        for (i, ability) in obj.def.triggered.iter().enumerate() {
            if trigger_matches(state, &ability.trigger, source, controller, event) {
                fired.push(Fired {
                    source,
                    controller,
                    trigger_index: i,
                });
            }
        }
    }

    // Within one controller the default order is battlefield-entry order.
    fired.sort_by_key(|f| {
        let ts = state
            .objects
            .get(f.source)
            .map(|o| o.timestamp)
            .unwrap_or_default();
        (ts, f.source, f.trigger_index)
    });
    fired
}

fn trigger_matches(
    state: &GameState,
    trigger: &EventFilterDef,
    source: ObjectId,
    controller: PlayerId,
    event: &GameEvent,
) -> bool {
    match (trigger, event) {
        (EventFilterDef::SelfEnters, GameEvent::EnteredBattlefield { object }) => {
            *object == source
        }
        (EventFilterDef::ObjectEnters(filter), GameEvent::EnteredBattlefield { object }) => {
            match layers::characteristics_of(state, *object) {
                Ok(c) => object_filter_matches(filter, *object, &c, controller, Some(source)),
                Err(_) => false,
            }
        }
        (EventFilterDef::SelfDies, GameEvent::CreatureDied { object, .. }) => *object == source,
        (EventFilterDef::ObjectDies(filter), GameEvent::CreatureDied { object, .. }) => {
            // The object is off the battlefield; judge printed values.
            match layers::characteristics_of(state, *object) {
                Ok(c) => object_filter_matches(filter, *object, &c, controller, Some(source)),
                Err(_) => false,
            }
        }
        (
            EventFilterDef::BeginningOf { moment, whose },
            GameEvent::BeginStep { step, active, .. },
        ) => {
            let step_matches = matches!(
                (moment, step),
                (TriggerMoment::Upkeep, Step::Upkeep)
                    | (TriggerMoment::Draw, Step::Draw)
                    | (TriggerMoment::EndStep, Step::End)
            );
            if !step_matches {
                return false;
            }
            match whose {
                PlayerScope::You => *active == controller,
                PlayerScope::Opponents => *active != controller,
                PlayerScope::Each => true,
                PlayerScope::Slot(_) => false,
            }
        }
        (
            EventFilterDef::SelfDealsCombatDamageToPlayer,
            GameEvent::DamageToPlayer {
                source: Some(dealer),
                is_combat: true,
                amount,
                ..
            },
        ) => *dealer == source && *amount > 0,
        (EventFilterDef::SpellCast(filter), GameEvent::SpellCast { object, .. }) => {
            match layers::characteristics_of(state, *object) {
                Ok(c) => object_filter_matches(filter, *object, &c, controller, Some(source)),
                Err(_) => false,
            }
        }
        _ => false,
    }
}

/// Pre-event counter snapshot helper for death events.
pub fn counters_snapshot(
    state: &GameState,
    object: ObjectId,
) -> smallvec::SmallVec<[(CounterType, u32); 2]> {
    state
        .objects
        .get(object)
        .map(|o| o.counters.clone())
        .unwrap_or_default()
}
