//! The stack: items, targeting, and resolution
//!
//! Spells, activated abilities, and triggered abilities all resolve
//! through here. Targets are chosen when an item is put on the stack and
//! re-validated when it resolves; an item whose every chosen target has
//! become illegal is removed with no effect.

use crate::core::{
    CostChoice, Effect, EffectTarget, Keyword, ObjectId, PlayerId, PlayerScope, TargetFilter,
    TargetRef, TargetSpec,
};
use crate::game::bus;
use crate::game::controller::{with_retries, Controllers, GameStateView};
use crate::game::events::GameEvent;
use crate::game::layers;
use crate::game::state::GameState;
use crate::game::triggers;
use crate::log_if_verbose;
use crate::zones::Zone;
use crate::{Result, RulesError};
use serde::{Deserialize, Serialize};

/// Everything decided while casting a spell, carried with it on the stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastContext {
    pub caster: PlayerId,
    /// Zone the card was cast from.
    pub origin: Zone,
    pub cost_choice: CostChoice,
    pub targets: Vec<Option<TargetRef>>,
    /// Chosen mode indices (modal spells only).
    pub modes: Vec<usize>,
    /// Targets per chosen mode, parallel to `modes`.
    pub mode_targets: Vec<Vec<Option<TargetRef>>>,
    /// Where the spell goes on resolution or when countered, when an
    /// alternative cost overrides the graveyard default (flashback exiles).
    pub resolution_destination: Option<Zone>,
}

impl CastContext {
    pub fn new(caster: PlayerId, origin: Zone) -> Self {
        CastContext {
            caster,
            origin,
            cost_choice: CostChoice::Base,
            targets: Vec::new(),
            modes: Vec::new(),
            mode_targets: Vec::new(),
            resolution_destination: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StackItem {
    Spell { object: ObjectId, ctx: CastContext },
    Ability {
        source: ObjectId,
        controller: PlayerId,
        ability_index: usize,
        targets: Vec<Option<TargetRef>>,
    },
    Trigger {
        source: ObjectId,
        controller: PlayerId,
        trigger_index: usize,
        targets: Vec<Option<TargetRef>>,
        /// The event that triggered, for conditions that read pre-event
        /// state (death triggers and counters).
        event: Box<GameEvent>,
    },
}

impl StackItem {
    pub fn controller(&self) -> PlayerId {
        match self {
            StackItem::Spell { ctx, .. } => ctx.caster,
            StackItem::Ability { controller, .. } | StackItem::Trigger { controller, .. } => {
                *controller
            }
        }
    }

    pub fn source(&self) -> ObjectId {
        match self {
            StackItem::Spell { object, .. } => *object,
            StackItem::Ability { source, .. } | StackItem::Trigger { source, .. } => *source,
        }
    }

    pub fn is_spell(&self) -> bool {
        matches!(self, StackItem::Spell { .. })
    }
}

// --- targeting -------------------------------------------------------------

/// Can `target` be chosen by `caster`'s spell/ability from `source`?
/// Hexproof blocks opponents; protection blocks sources of the named color.
fn can_be_targeted(
    state: &GameState,
    target: &TargetRef,
    caster: PlayerId,
    source_colors: &[crate::core::Color],
) -> bool {
    let TargetRef::Object(id) = target else {
        return true;
    };
    let obj = match state.objects.get(*id) {
        Ok(o) => o,
        Err(_) => return false,
    };
    if !obj.is_on_battlefield() {
        // Spells on the stack carry no targeting restrictions we model.
        return true;
    }
    let chars = match layers::characteristics_of(state, *id) {
        Ok(c) => c,
        Err(_) => return false,
    };
    if chars.has_keyword(&Keyword::Hexproof) && chars.controller != caster {
        return false;
    }
    for kw in &chars.keywords {
        if let Keyword::Protection(color) = kw {
            if source_colors.contains(color) {
                return false;
            }
        }
    }
    true
}

fn matches_filter(state: &GameState, target: &TargetRef, filter: &TargetFilter) -> bool {
    match (filter, target) {
        (TargetFilter::Player, TargetRef::Player(p)) => {
            !state.players[p.index()].eliminated
        }
        (TargetFilter::AnyTarget, TargetRef::Player(p)) => !state.players[p.index()].eliminated,
        (TargetFilter::Player, TargetRef::Object(_)) => false,
        (TargetFilter::SpellOnStack, TargetRef::Object(id)) => state
            .stack
            .iter()
            .any(|item| item.is_spell() && item.source() == *id),
        (TargetFilter::SpellOnStack, TargetRef::Player(_)) => false,
        (_, TargetRef::Player(_)) => false,
        (f, TargetRef::Object(id)) => {
            let Ok(obj) = state.objects.get(*id) else {
                return false;
            };
            if !obj.is_on_battlefield() {
                return false;
            }
            let Ok(chars) = layers::characteristics_of(state, *id) else {
                return false;
            };
            match f {
                TargetFilter::AnyTarget => {
                    chars.is_creature() || chars.is_type(crate::core::CardType::Planeswalker)
                }
                TargetFilter::Creature => chars.is_creature(),
                TargetFilter::Permanent => true,
                TargetFilter::Player | TargetFilter::SpellOnStack => false,
            }
        }
    }
}

/// All legal targets for one slot.
pub fn target_candidates(
    state: &GameState,
    caster: PlayerId,
    source: ObjectId,
    filter: &TargetFilter,
) -> Vec<TargetRef> {
    let source_colors: Vec<crate::core::Color> = layers::characteristics_of(state, source)
        .map(|c| c.colors)
        .unwrap_or_default();

    let mut out: Vec<TargetRef> = Vec::new();
    match filter {
        TargetFilter::Player => {
            for p in &state.players {
                if !p.eliminated {
                    out.push(TargetRef::Player(p.id));
                }
            }
        }
        TargetFilter::SpellOnStack => {
            for item in &state.stack {
                if item.is_spell() && item.source() != source {
                    out.push(TargetRef::Object(item.source()));
                }
            }
        }
        TargetFilter::AnyTarget => {
            for id in state.battlefield_ids() {
                let t = TargetRef::Object(id);
                if matches_filter(state, &t, filter) {
                    out.push(t);
                }
            }
            for p in &state.players {
                if !p.eliminated {
                    out.push(TargetRef::Player(p.id));
                }
            }
        }
        TargetFilter::Creature | TargetFilter::Permanent => {
            for id in state.battlefield_ids() {
                let t = TargetRef::Object(id);
                if matches_filter(state, &t, filter) {
                    out.push(t);
                }
            }
        }
    }
    out.retain(|t| can_be_targeted(state, t, caster, &source_colors));
    out
}

/// Is a previously chosen target still legal?
pub fn target_is_legal(
    state: &GameState,
    caster: PlayerId,
    source: ObjectId,
    filter: &TargetFilter,
    target: &TargetRef,
) -> bool {
    let source_colors: Vec<crate::core::Color> = layers::characteristics_of(state, source)
        .map(|c| c.colors)
        .unwrap_or_default();
    matches_filter(state, target, filter) && can_be_targeted(state, target, caster, &source_colors)
}

/// Prompt a controller to fill every target slot. Errors when a required
/// slot has no legal candidates.
pub fn choose_targets(
    state: &GameState,
    controllers: &mut Controllers,
    caster: PlayerId,
    source: ObjectId,
    specs: &[TargetSpec],
) -> Result<Vec<Option<TargetRef>>> {
    let retries = state.config.decision_retries;
    let mut chosen = Vec::with_capacity(specs.len());
    for (slot, spec) in specs.iter().enumerate() {
        let candidates = target_candidates(state, caster, source, &spec.filter);
        if candidates.is_empty() {
            if spec.optional {
                chosen.push(None);
                continue;
            }
            return Err(RulesError::illegal(
                crate::error::IllegalActionKind::IllegalTarget,
                format!("no legal target for slot {slot}"),
            ));
        }
        let view = GameStateView::new(state, caster);
        let ctrl = controllers.get(caster)?;
        let pick = with_retries(retries, "target", || {
            match ctrl.choose_target(&view, source, slot, &candidates, spec.optional) {
                Some(i) if i < candidates.len() => Some(Some(candidates[i])),
                None if spec.optional => Some(None),
                _ => None,
            }
        })?;
        chosen.push(pick);
    }
    Ok(chosen)
}

// --- resolution ------------------------------------------------------------

/// Resolve the top item of the stack.
pub fn resolve_top(state: &mut GameState, controllers: &mut Controllers) -> Result<()> {
    let item = state
        .stack
        .pop()
        .ok_or_else(|| RulesError::InvariantViolation("resolve on empty stack".to_string()))?;

    match item {
        StackItem::Spell { object, ctx } => resolve_spell(state, controllers, object, ctx),
        StackItem::Ability {
            source,
            controller,
            ability_index,
            targets,
        } => {
            let def = state.objects.get(source)?.def.clone();
            let ability = def.activated.get(ability_index).ok_or_else(|| {
                RulesError::InvariantViolation(format!("no ability {ability_index} on {source}"))
            })?;
            if fizzles(state, controller, source, &ability.targets, &targets) {
                log_if_verbose!(state.logger, "ability of {} fizzles", source);
                return Ok(());
            }
            execute_effects(
                state,
                controllers,
                source,
                controller,
                &ability.effects,
                &targets,
                &ability.targets,
            )
        }
        StackItem::Trigger {
            source,
            controller,
            trigger_index,
            targets,
            event,
        } => {
            let def = match state.objects.get(source) {
                Ok(obj) => obj.def.clone(),
                // Source is gone (token that died); the trigger still
                // resolves from its last-known definition, which we no
                // longer have. Treat as no-op.
                Err(_) => return Ok(()),
            };
            let ability = def.triggered.get(trigger_index).ok_or_else(|| {
                RulesError::InvariantViolation(format!("no trigger {trigger_index} on {source}"))
            })?;
            // Intervening-if: re-checked on resolution.
            if let Some(cond) = &ability.condition {
                if !triggers::condition_holds(state, source, controller, cond, &event) {
                    log_if_verbose!(state.logger, "trigger of {} condition now false", source);
                    return Ok(());
                }
            }
            if fizzles(state, controller, source, &ability.targets, &targets) {
                log_if_verbose!(state.logger, "trigger of {} fizzles", source);
                return Ok(());
            }
            execute_effects(
                state,
                controllers,
                source,
                controller,
                &ability.effects,
                &targets,
                &ability.targets,
            )
        }
    }
}

fn resolve_spell(
    state: &mut GameState,
    controllers: &mut Controllers,
    object: ObjectId,
    ctx: CastContext,
) -> Result<()> {
    let def = state.objects.get(object)?.def.clone();
    let name = def.name.clone();

    let all_targets: Vec<Option<TargetRef>> = if ctx.modes.is_empty() {
        ctx.targets.clone()
    } else {
        ctx.mode_targets.iter().flatten().cloned().collect()
    };
    let chosen: Vec<&TargetRef> = all_targets.iter().flatten().collect();
    let fizzled = !chosen.is_empty()
        && !spell_has_legal_target(state, &ctx, object, &def, &all_targets);

    if fizzled {
        state.logger.log_normal(&format!("{name} fizzles"));
    } else if ctx.modes.is_empty() {
        execute_effects(
            state,
            controllers,
            object,
            ctx.caster,
            &def.spell_effects,
            &ctx.targets,
            &def.spell_targets,
        )?;
    } else {
        let modal = def.modal.as_ref().ok_or_else(|| {
            RulesError::InvariantViolation(format!("modes chosen on non-modal {name}"))
        })?;
        for (i, &mode_idx) in ctx.modes.iter().enumerate() {
            let mode = modal.modes.get(mode_idx).ok_or_else(|| {
                RulesError::InvariantViolation(format!("mode {mode_idx} out of range on {name}"))
            })?;
            let targets = ctx.mode_targets.get(i).cloned().unwrap_or_default();
            execute_effects(
                state,
                controllers,
                object,
                ctx.caster,
                &mode.effects,
                &targets,
                &mode.targets,
            )?;
        }
    }

    // Leave the stack. Permanents land on the battlefield under the
    // caster's control unless the spell fizzled.
    let owner = state.objects.get(object)?.owner;
    let destination = if def.is_permanent() && !fizzled {
        Zone::Battlefield
    } else {
        ctx.resolution_destination.unwrap_or(Zone::Graveyard)
    };
    let mut event = GameEvent::zone_change(object, Zone::Stack, destination);
    if destination == Zone::Battlefield && ctx.caster != owner {
        if let GameEvent::ZoneChange { new_controller, .. } = &mut event {
            *new_controller = Some(ctx.caster);
        }
    }
    bus::publish(state, controllers, event)?;
    bus::publish(state, controllers, GameEvent::SpellResolved { object })?;
    Ok(())
}

fn spell_has_legal_target(
    state: &GameState,
    ctx: &CastContext,
    object: ObjectId,
    def: &crate::core::CardDefinition,
    all_targets: &[Option<TargetRef>],
) -> bool {
    // Collect the specs in the same flat order as the targets.
    let specs: Vec<&TargetSpec> = if ctx.modes.is_empty() {
        def.spell_targets.iter().collect()
    } else {
        match &def.modal {
            Some(modal) => ctx
                .modes
                .iter()
                .filter_map(|&i| modal.modes.get(i))
                .flat_map(|m| m.targets.iter())
                .collect(),
            None => Vec::new(),
        }
    };
    all_targets
        .iter()
        .zip(specs)
        .any(|(t, spec)| match t {
            Some(target) => target_is_legal(state, ctx.caster, object, &spec.filter, target),
            None => false,
        })
}

/// All chosen targets have become illegal.
fn fizzles(
    state: &GameState,
    controller: PlayerId,
    source: ObjectId,
    specs: &[TargetSpec],
    targets: &[Option<TargetRef>],
) -> bool {
    let chosen = targets.iter().flatten().count();
    if chosen == 0 {
        return false;
    }
    !targets.iter().zip(specs).any(|(t, spec)| match t {
        Some(target) => target_is_legal(state, controller, source, &spec.filter, target),
        None => false,
    })
}

// --- effect execution ------------------------------------------------------

fn resolve_effect_target(
    source: ObjectId,
    targets: &[Option<TargetRef>],
    t: &EffectTarget,
) -> Option<TargetRef> {
    match t {
        EffectTarget::Source => Some(TargetRef::Object(source)),
        EffectTarget::Slot(i) => targets.get(*i).copied().flatten(),
    }
}

fn scope_players(
    state: &GameState,
    scope: &PlayerScope,
    controller: PlayerId,
    targets: &[Option<TargetRef>],
) -> Vec<PlayerId> {
    match scope {
        PlayerScope::You => vec![controller],
        PlayerScope::Opponents => state.opponents_of(controller),
        PlayerScope::Each => state.apnap_order(),
        PlayerScope::Slot(i) => match targets.get(*i).copied().flatten() {
            Some(TargetRef::Player(p)) => vec![p],
            _ => Vec::new(),
        },
    }
}

/// Check that a slot-directed target is still legal at the moment its
/// effect executes; stale targets make that one effect skip.
fn slot_still_legal(
    state: &GameState,
    controller: PlayerId,
    source: ObjectId,
    specs: &[TargetSpec],
    t: &EffectTarget,
    target: &TargetRef,
) -> bool {
    match t {
        EffectTarget::Source => true,
        EffectTarget::Slot(i) => match specs.get(*i) {
            Some(spec) => target_is_legal(state, controller, source, &spec.filter, target),
            None => false,
        },
    }
}

pub fn execute_effects(
    state: &mut GameState,
    controllers: &mut Controllers,
    source: ObjectId,
    controller: PlayerId,
    effects: &[Effect],
    targets: &[Option<TargetRef>],
    specs: &[TargetSpec],
) -> Result<()> {
    for effect in effects {
        execute_effect(state, controllers, source, controller, effect, targets, specs)?;
    }
    Ok(())
}

fn execute_effect(
    state: &mut GameState,
    controllers: &mut Controllers,
    source: ObjectId,
    controller: PlayerId,
    effect: &Effect,
    targets: &[Option<TargetRef>],
    specs: &[TargetSpec],
) -> Result<()> {
    let retries = state.config.decision_retries;
    match effect {
        Effect::DealDamage { target, amount } => {
            let Some(t) = resolve_effect_target(source, targets, target) else {
                return Ok(());
            };
            if !slot_still_legal(state, controller, source, specs, target, &t) {
                return Ok(());
            }
            let event = match t {
                TargetRef::Object(id) => GameEvent::DamageToObject {
                    source: Some(source),
                    target: id,
                    amount: *amount,
                    is_combat: false,
                },
                TargetRef::Player(p) => GameEvent::DamageToPlayer {
                    source: Some(source),
                    player: p,
                    amount: *amount,
                    is_combat: false,
                },
            };
            bus::publish(state, controllers, event)?;
        }
        Effect::DealDamageToPlayers { scope, amount } => {
            for p in scope_players(state, scope, controller, targets) {
                bus::publish(
                    state,
                    controllers,
                    GameEvent::DamageToPlayer {
                        source: Some(source),
                        player: p,
                        amount: *amount,
                        is_combat: false,
                    },
                )?;
            }
        }
        Effect::DrawCards { scope, count } => {
            for p in scope_players(state, scope, controller, targets) {
                for _ in 0..*count {
                    bus::publish(state, controllers, GameEvent::Draw { player: p })?;
                }
            }
        }
        Effect::ChangeLife { scope, delta } => {
            for p in scope_players(state, scope, controller, targets) {
                bus::publish(
                    state,
                    controllers,
                    GameEvent::LifeChange {
                        player: p,
                        delta: *delta,
                    },
                )?;
            }
        }
        Effect::Destroy { target } => {
            let Some(TargetRef::Object(id)) = resolve_effect_target(source, targets, target)
            else {
                return Ok(());
            };
            if !slot_still_legal(state, controller, source, specs, target, &TargetRef::Object(id))
            {
                return Ok(());
            }
            bus::destroy_object(state, controllers, id)?;
        }
        Effect::Tap { target } => {
            if let Some(TargetRef::Object(id)) = resolve_effect_target(source, targets, target) {
                if slot_still_legal(state, controller, source, specs, target, &TargetRef::Object(id))
                {
                    bus::publish(state, controllers, GameEvent::TapObject { object: id })?;
                }
            }
        }
        Effect::Untap { target } => {
            if let Some(TargetRef::Object(id)) = resolve_effect_target(source, targets, target) {
                if slot_still_legal(state, controller, source, specs, target, &TargetRef::Object(id))
                {
                    bus::publish(state, controllers, GameEvent::UntapObject { object: id })?;
                }
            }
        }
        Effect::PumpUntilEndOfTurn {
            target,
            power,
            toughness,
        } => {
            let Some(TargetRef::Object(id)) = resolve_effect_target(source, targets, target)
            else {
                return Ok(());
            };
            if !slot_still_legal(state, controller, source, specs, target, &TargetRef::Object(id))
            {
                return Ok(());
            }
            let ts = state.next_timestamp();
            state.continuous.register(
                Some(source),
                controller,
                crate::core::EffectScope::Object(id),
                crate::core::Modification::ModifyPowerToughness {
                    power: *power,
                    toughness: *toughness,
                },
                crate::core::Duration::UntilEndOfTurn,
                ts,
            );
        }
        Effect::GrantKeywordUntilEndOfTurn { target, keyword } => {
            let Some(TargetRef::Object(id)) = resolve_effect_target(source, targets, target)
            else {
                return Ok(());
            };
            if !slot_still_legal(state, controller, source, specs, target, &TargetRef::Object(id))
            {
                return Ok(());
            }
            let ts = state.next_timestamp();
            state.continuous.register(
                Some(source),
                controller,
                crate::core::EffectScope::Object(id),
                crate::core::Modification::AddKeyword(keyword.clone()),
                crate::core::Duration::UntilEndOfTurn,
                ts,
            );
        }
        Effect::AddCounters {
            target,
            kind,
            amount,
        } => {
            if let Some(TargetRef::Object(id)) = resolve_effect_target(source, targets, target) {
                if slot_still_legal(state, controller, source, specs, target, &TargetRef::Object(id))
                {
                    bus::publish(
                        state,
                        controllers,
                        GameEvent::AddCounters {
                            object: id,
                            kind: kind.clone(),
                            amount: *amount,
                        },
                    )?;
                }
            }
        }
        Effect::CounterSpell { target } => {
            let Some(TargetRef::Object(id)) = resolve_effect_target(source, targets, target)
            else {
                return Ok(());
            };
            let Some(pos) = state
                .stack
                .iter()
                .position(|item| item.is_spell() && item.source() == id)
            else {
                // Already resolved or left the stack.
                return Ok(());
            };
            let item = state.stack.remove(pos);
            let destination = match &item {
                StackItem::Spell { ctx, .. } => {
                    ctx.resolution_destination.unwrap_or(Zone::Graveyard)
                }
                _ => Zone::Graveyard,
            };
            state
                .logger
                .log_normal(&format!("spell {id} is countered"));
            bus::publish(
                state,
                controllers,
                GameEvent::zone_change(id, Zone::Stack, destination),
            )?;
        }
        Effect::CreateToken { definition, count } => {
            for _ in 0..*count {
                let id = state.create_token(definition, controller)?;
                bus::publish(state, controllers, GameEvent::EnteredBattlefield { object: id })?;
            }
        }
        Effect::Mill { scope, count } => {
            for p in scope_players(state, scope, controller, targets) {
                for _ in 0..*count {
                    let top = state.player_zones(p)?.library.peek_top();
                    match top {
                        Some(card) => bus::publish(
                            state,
                            controllers,
                            GameEvent::zone_change(card, Zone::Library, Zone::Graveyard),
                        )?,
                        None => break,
                    }
                }
            }
        }
        Effect::Discard { scope, count } => {
            for p in scope_players(state, scope, controller, targets) {
                for _ in 0..*count {
                    let hand = state.player_zones(p)?.hand.cards.clone();
                    if hand.is_empty() {
                        break;
                    }
                    let view = GameStateView::new(state, p);
                    let ctrl = controllers.get(p)?;
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
        }
        Effect::AddMana { color, amount } => {
            // Mana abilities bypass the stack and the event pipeline.
            state.player_mut(controller)?.mana_pool.add(*color, *amount);
        }
    }
    Ok(())
}
