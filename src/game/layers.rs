//! Continuous-effect registry and the layer evaluator
//!
//! Effective characteristics are never stored. Every read recomputes them
//! from printed values plus active continuous effects, folded in layer
//! order (copy, control, text, types, color, abilities, power/toughness
//! with its sublayers). Within a layer effects apply in timestamp order,
//! except that an effect whose scope reads a characteristic another effect
//! in the same layer changes waits for it (dependency ordering).

use crate::core::{
    CardName, CardType, Color, CounterType, Duration, EffectScope, GameObject, Keyword, Layer,
    Modification, ObjectFilter, ObjectId, PlayerId, PlayerScope, PtSublayer, Subtype, Supertype,
    Timestamp,
};
use crate::game::state::GameState;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Effective characteristics of one object after the layer fold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Characteristics {
    pub name: CardName,
    pub controller: PlayerId,
    pub supertypes: Vec<Supertype>,
    pub card_types: Vec<CardType>,
    pub subtypes: Vec<Subtype>,
    pub colors: Vec<Color>,
    pub keywords: Vec<Keyword>,
    pub power: Option<i32>,
    pub toughness: Option<i32>,
    /// Set by RemoveAllAbilities; the object's statics, triggers, and
    /// activated abilities are inert while this holds.
    pub abilities_removed: bool,
}

impl Characteristics {
    /// Printed characteristics, before any effects.
    pub fn printed(obj: &GameObject) -> Self {
        let def = &obj.def;
        Characteristics {
            name: def.name.clone(),
            controller: obj.controller,
            supertypes: def.supertypes.to_vec(),
            card_types: def.card_types.to_vec(),
            subtypes: def.subtypes.to_vec(),
            colors: def.colors.to_vec(),
            keywords: def.keywords.to_vec(),
            power: def.base_power,
            toughness: def.base_toughness,
            abilities_removed: false,
        }
    }

    pub fn is_type(&self, t: CardType) -> bool {
        self.card_types.contains(&t)
    }

    pub fn is_creature(&self) -> bool {
        self.is_type(CardType::Creature)
    }

    pub fn has_keyword(&self, kw: &Keyword) -> bool {
        self.keywords.contains(kw)
    }

    pub fn has_subtype(&self, s: &Subtype) -> bool {
        self.subtypes.contains(s)
    }
}

pub type CharacteristicsMap = FxHashMap<ObjectId, Characteristics>;

/// One active continuous effect: a single modification with its scope,
/// source, and ordering key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveEffect {
    pub id: u64,
    pub source: Option<ObjectId>,
    pub controller: PlayerId,
    pub scope: EffectScope,
    pub modification: Modification,
    pub duration: Duration,
    pub timestamp: Timestamp,
}

/// Registry of continuous effects that are not static abilities of
/// battlefield permanents (those are regenerated from the battlefield on
/// each evaluation): until-end-of-turn pumps, emblem effects, and so on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContinuousEffects {
    effects: Vec<ActiveEffect>,
    next_id: u64,
}

impl ContinuousEffects {
    pub fn new() -> Self {
        ContinuousEffects::default()
    }

    pub fn register(
        &mut self,
        source: Option<ObjectId>,
        controller: PlayerId,
        scope: EffectScope,
        modification: Modification,
        duration: Duration,
        timestamp: Timestamp,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.effects.push(ActiveEffect {
            id,
            source,
            controller,
            scope,
            modification,
            duration,
            timestamp,
        });
        id
    }

    /// Cleanup-step expiry.
    pub fn expire_end_of_turn(&mut self) {
        self.effects
            .retain(|e| e.duration != Duration::UntilEndOfTurn);
    }

    /// Drop WhileSourceOnBattlefield effects whose source left.
    pub fn expire_for_source(&mut self, source: ObjectId) {
        self.effects.retain(|e| {
            !(e.duration == Duration::WhileSourceOnBattlefield && e.source == Some(source))
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveEffect> {
        self.effects.iter()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

/// Does an object match a filter, judged on effective characteristics?
pub fn object_filter_matches(
    filter: &ObjectFilter,
    target: ObjectId,
    chars: &Characteristics,
    effect_controller: PlayerId,
    effect_source: Option<ObjectId>,
) -> bool {
    if filter.self_only && effect_source != Some(target) {
        return false;
    }
    if filter.other_than_self && effect_source == Some(target) {
        return false;
    }
    if let Some(t) = filter.card_type {
        if !chars.is_type(t) {
            return false;
        }
    }
    if let Some(s) = &filter.subtype {
        if !chars.has_subtype(s) {
            return false;
        }
    }
    match filter.controlled_by {
        Some(PlayerScope::You) => chars.controller == effect_controller,
        Some(PlayerScope::Opponents) => chars.controller != effect_controller,
        _ => true,
    }
}

/// Compute effective characteristics for every battlefield object.
pub fn evaluate(state: &GameState) -> CharacteristicsMap {
    let mut map = base_map(state);
    let effects = collect_effects(state, &map);
    apply_all(state, &mut map, &effects);

    // RemoveAllAbilities silences the affected objects' own statics, so the
    // fold is redone once without them.
    if map.values().any(|c| c.abilities_removed) {
        let silenced: Vec<ObjectId> = map
            .iter()
            .filter(|(_, c)| c.abilities_removed)
            .map(|(id, _)| *id)
            .collect();
        map = base_map(state);
        let effects = collect_effects_excluding(state, &map, &silenced);
        apply_all(state, &mut map, &effects);
    }
    map
}

/// Effective characteristics of one object. Battlefield objects get the
/// full fold; elsewhere only the printed values (plus the object's own
/// characteristic-defining abilities) apply.
pub fn characteristics_of(state: &GameState, id: ObjectId) -> crate::Result<Characteristics> {
    let obj = state.objects.get(id)?;
    if obj.is_on_battlefield() {
        if let Some(c) = evaluate(state).remove(&id) {
            return Ok(c);
        }
    }
    let mut chars = Characteristics::printed(obj);
    for stat in &obj.def.statics {
        if !stat.is_cda {
            continue;
        }
        for m in &stat.modifications {
            apply_modification(state, &mut chars, m);
        }
    }
    Ok(chars)
}

fn base_map(state: &GameState) -> CharacteristicsMap {
    let mut map = CharacteristicsMap::default();
    for &id in &state.battlefield.cards {
        if let Ok(obj) = state.objects.get(id) {
            if !obj.phased_out {
                map.insert(id, Characteristics::printed(obj));
            }
        }
    }
    map
}

fn collect_effects(state: &GameState, map: &CharacteristicsMap) -> Vec<ActiveEffect> {
    collect_effects_excluding(state, map, &[])
}

fn collect_effects_excluding(
    state: &GameState,
    map: &CharacteristicsMap,
    silenced: &[ObjectId],
) -> Vec<ActiveEffect> {
    let mut out: Vec<ActiveEffect> = state
        .continuous
        .iter()
        .filter(|e| match e.source {
            Some(s) => !silenced.contains(&s),
            None => true,
        })
        .cloned()
        .collect();

    // Static abilities of battlefield permanents, stamped with the source's
    // battlefield-entry timestamp. Synthetic ids sit above the registry's so
    // they never collide.
    let mut synth_id = u64::MAX / 2;
    for &id in map.keys() {
        if silenced.contains(&id) {
            continue;
        }
        let obj = match state.objects.get(id) {
            Ok(o) => o,
            Err(_) => continue,
        };
        for stat in &obj.def.statics {
            for m in &stat.modifications {
                out.push(ActiveEffect {
                    id: synth_id,
                    source: Some(id),
                    controller: obj.controller,
                    scope: EffectScope::Matching(stat.scope.clone()),
                    modification: m.clone(),
                    duration: Duration::WhileSourceOnBattlefield,
                    timestamp: obj.timestamp,
                });
                synth_id += 1;
            }
        }
    }
    out
}

fn apply_all(state: &GameState, map: &mut CharacteristicsMap, effects: &[ActiveEffect]) {
    const LAYERS: [Layer; 6] = [
        Layer::Copy,
        Layer::Control,
        Layer::Text,
        Layer::Types,
        Layer::Color,
        Layer::Abilities,
    ];
    for layer in LAYERS {
        let group: Vec<&ActiveEffect> = effects
            .iter()
            .filter(|e| e.modification.layer() == layer)
            .collect();
        for effect in order_within_layer(group) {
            apply_to_scope(state, map, effect);
        }
    }

    const PT_ORDER: [PtSublayer; 3] = [PtSublayer::Cda, PtSublayer::Set, PtSublayer::Modify];
    for sublayer in PT_ORDER {
        let group: Vec<&ActiveEffect> = effects
            .iter()
            .filter(|e| e.modification.pt_sublayer() == Some(sublayer))
            .collect();
        for effect in order_within_layer(group) {
            apply_to_scope(state, map, effect);
        }
    }

    // 7d: counters, read from object state.
    let p1p1 = CounterType::plus_one_plus_one();
    let m1m1 = CounterType::minus_one_minus_one();
    for (&id, chars) in map.iter_mut() {
        if let Ok(obj) = state.objects.get(id) {
            let delta = obj.counter_count(&p1p1) as i32 - obj.counter_count(&m1m1) as i32;
            if delta != 0 {
                if let Some(p) = chars.power.as_mut() {
                    *p += delta;
                }
                if let Some(t) = chars.toughness.as_mut() {
                    *t += delta;
                }
            }
        }
    }

    // 7e: switch.
    let group: Vec<&ActiveEffect> = effects
        .iter()
        .filter(|e| e.modification.pt_sublayer() == Some(PtSublayer::Switch))
        .collect();
    for effect in order_within_layer(group) {
        apply_to_scope(state, map, effect);
    }
}

/// Characteristic dimensions a scope filter can read; used for dependency
/// detection within a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dimension {
    Types,
    Controller,
}

fn modification_writes(m: &Modification) -> Option<Dimension> {
    match m {
        Modification::AddCardType(_)
        | Modification::RemoveCardType(_)
        | Modification::AddSubtype(_)
        | Modification::RemoveSubtype(_)
        | Modification::AddSupertype(_)
        | Modification::RemoveSupertype(_)
        | Modification::CopyOf(_) => Some(Dimension::Types),
        Modification::ChangeController(_) => Some(Dimension::Controller),
        _ => None,
    }
}

fn scope_reads(scope: &EffectScope) -> Vec<Dimension> {
    let mut dims = Vec::new();
    if let EffectScope::Matching(filter) = scope {
        if filter.card_type.is_some() || filter.subtype.is_some() {
            dims.push(Dimension::Types);
        }
        if matches!(
            filter.controlled_by,
            Some(PlayerScope::You) | Some(PlayerScope::Opponents)
        ) {
            dims.push(Dimension::Controller);
        }
    }
    dims
}

/// Order one layer's effects: timestamp (ties by source id then effect id),
/// then hoist dependencies. Effect A depends on B when A's scope reads a
/// dimension B writes; dependency cycles fall back to plain timestamp order.
fn order_within_layer(mut group: Vec<&ActiveEffect>) -> Vec<&ActiveEffect> {
    group.sort_by_key(|e| (e.timestamp, e.source, e.id));
    if group.len() < 2 {
        return group;
    }

    let depends = |a: &ActiveEffect, b: &ActiveEffect| -> bool {
        if a.id == b.id {
            return false;
        }
        match modification_writes(&b.modification) {
            Some(dim) => scope_reads(&a.scope).contains(&dim),
            None => false,
        }
    };

    let mut ordered: Vec<&ActiveEffect> = Vec::with_capacity(group.len());
    let mut remaining = group.clone();
    while !remaining.is_empty() {
        let pick = remaining
            .iter()
            .position(|a| !remaining.iter().any(|b| depends(a, b) && !depends(b, a)))
            .unwrap_or(0); // cycle: timestamp order
        ordered.push(remaining.remove(pick));
    }
    ordered
}

fn apply_to_scope(state: &GameState, map: &mut CharacteristicsMap, effect: &ActiveEffect) {
    let targets: Vec<ObjectId> = match &effect.scope {
        EffectScope::Object(id) => {
            if map.contains_key(id) {
                vec![*id]
            } else {
                Vec::new()
            }
        }
        EffectScope::Objects(ids) => ids.iter().filter(|i| map.contains_key(i)).copied().collect(),
        EffectScope::Matching(filter) => {
            let mut ids: Vec<ObjectId> = map
                .iter()
                .filter(|(id, chars)| {
                    object_filter_matches(filter, **id, chars, effect.controller, effect.source)
                })
                .map(|(id, _)| *id)
                .collect();
            ids.sort();
            ids
        }
    };
    for id in targets {
        if let Some(chars) = map.get_mut(&id) {
            apply_modification(state, chars, &effect.modification);
        }
    }
}

fn apply_modification(state: &GameState, chars: &mut Characteristics, m: &Modification) {
    match m {
        Modification::CopyOf(src) => {
            if let Ok(src_obj) = state.objects.get(*src) {
                let def = &src_obj.def;
                chars.name = def.name.clone();
                chars.supertypes = def.supertypes.to_vec();
                chars.card_types = def.card_types.to_vec();
                chars.subtypes = def.subtypes.to_vec();
                chars.colors = def.colors.to_vec();
                chars.keywords = def.keywords.to_vec();
                chars.power = def.base_power;
                chars.toughness = def.base_toughness;
            }
        }
        Modification::ChangeController(p) => chars.controller = *p,
        Modification::SetName(name) => chars.name = name.clone(),
        Modification::AddCardType(t) => {
            if !chars.card_types.contains(t) {
                chars.card_types.push(*t);
            }
        }
        Modification::RemoveCardType(t) => chars.card_types.retain(|x| x != t),
        Modification::AddSubtype(s) => {
            if !chars.subtypes.contains(s) {
                chars.subtypes.push(s.clone());
            }
        }
        Modification::RemoveSubtype(s) => chars.subtypes.retain(|x| x != s),
        Modification::AddSupertype(s) => {
            if !chars.supertypes.contains(s) {
                chars.supertypes.push(s.clone());
            }
        }
        Modification::RemoveSupertype(s) => chars.supertypes.retain(|x| x != s),
        Modification::AddColor(c) => {
            if !chars.colors.contains(c) {
                chars.colors.push(*c);
            }
        }
        Modification::SetColors(colors) => chars.colors = colors.clone(),
        Modification::AddKeyword(kw) => {
            if !chars.keywords.contains(kw) {
                chars.keywords.push(kw.clone());
            }
        }
        Modification::RemoveKeyword(kw) => chars.keywords.retain(|x| x != kw),
        Modification::RemoveAllAbilities => {
            chars.keywords.clear();
            chars.abilities_removed = true;
        }
        Modification::SetPowerToughness {
            power, toughness, ..
        } => {
            chars.power = Some(*power);
            chars.toughness = Some(*toughness);
        }
        Modification::ModifyPowerToughness { power, toughness } => {
            if let Some(p) = chars.power.as_mut() {
                *p += power;
            }
            if let Some(t) = chars.toughness.as_mut() {
                *t += toughness;
            }
        }
        Modification::SwitchPowerToughness => {
            std::mem::swap(&mut chars.power, &mut chars.toughness);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_expiry() {
        let mut reg = ContinuousEffects::new();
        reg.register(
            Some(ObjectId::new(1)),
            PlayerId::new(0),
            EffectScope::Object(ObjectId::new(2)),
            Modification::ModifyPowerToughness {
                power: 2,
                toughness: 2,
            },
            Duration::UntilEndOfTurn,
            Timestamp::new(1),
        );
        reg.register(
            Some(ObjectId::new(1)),
            PlayerId::new(0),
            EffectScope::Matching(ObjectFilter::creatures()),
            Modification::AddKeyword(Keyword::Flying),
            Duration::WhileSourceOnBattlefield,
            Timestamp::new(2),
        );
        assert_eq!(reg.len(), 2);

        reg.expire_end_of_turn();
        assert_eq!(reg.len(), 1);

        reg.expire_for_source(ObjectId::new(1));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_dependency_hoists_type_changer() {
        // A pump scoped to creatures must wait for a same-layer effect that
        // grants the creature type... but they are in different layers here,
        // so construct two Types-layer effects: one reads, one writes.
        let writer = ActiveEffect {
            id: 1,
            source: None,
            controller: PlayerId::new(0),
            scope: EffectScope::Object(ObjectId::new(5)),
            modification: Modification::AddCardType(CardType::Creature),
            duration: Duration::Permanent,
            timestamp: Timestamp::new(10),
        };
        let reader = ActiveEffect {
            id: 2,
            source: None,
            controller: PlayerId::new(0),
            scope: EffectScope::Matching(ObjectFilter::creatures()),
            modification: Modification::AddSubtype(Subtype::new("Zombie")),
            duration: Duration::Permanent,
            timestamp: Timestamp::new(5),
        };
        // Reader has the earlier timestamp but depends on the writer.
        let ordered = order_within_layer(vec![&reader, &writer]);
        assert_eq!(ordered[0].id, 1);
        assert_eq!(ordered[1].id, 2);
    }

    use crate::core::{CardBuilder, StaticAbilityDef};
    use crate::game::state::{GameConfig, GameState};
    use std::sync::Arc;

    fn bears() -> Arc<crate::core::CardDefinition> {
        CardBuilder::new("grizzly-bears", "Grizzly Bears")
            .mana_cost("1G")
            .card_type(CardType::Creature)
            .subtype("Bear")
            .power_toughness(2, 2)
            .build()
            .unwrap()
    }

    #[test]
    fn test_anthem_applies_to_controllers_creatures_only() {
        let mut state = GameState::new(GameConfig::default(), &["A", "B"]);
        let p0 = PlayerId::new(0);
        let p1 = PlayerId::new(1);

        let my_bear = state.add_to_battlefield(bears(), p0).unwrap();
        let their_bear = state.add_to_battlefield(bears(), p1).unwrap();
        let anthem = CardBuilder::new("glorious-anthem", "Glorious Anthem")
            .mana_cost("1WW")
            .card_type(CardType::Enchantment)
            .static_ability(StaticAbilityDef::anthem(1, 1))
            .build()
            .unwrap();
        state.add_to_battlefield(anthem, p0).unwrap();

        let chars = evaluate(&state);
        assert_eq!(chars[&my_bear].power, Some(3));
        assert_eq!(chars[&their_bear].power, Some(2));
    }

    #[test]
    fn test_counters_apply_after_modify_sublayer() {
        let mut state = GameState::new(GameConfig::default(), &["A"]);
        let p0 = PlayerId::new(0);
        let bear = state.add_to_battlefield(bears(), p0).unwrap();

        state
            .objects
            .get_mut(bear)
            .unwrap()
            .add_counters(CounterType::plus_one_plus_one(), 2);
        let ts = state.next_timestamp();
        state.continuous.register(
            None,
            p0,
            EffectScope::Object(bear),
            Modification::ModifyPowerToughness {
                power: 1,
                toughness: 1,
            },
            Duration::UntilEndOfTurn,
            ts,
        );

        let chars = evaluate(&state);
        assert_eq!(chars[&bear].power, Some(5));
        assert_eq!(chars[&bear].toughness, Some(5));
    }

    #[test]
    fn test_switch_applies_last() {
        let mut state = GameState::new(GameConfig::default(), &["A"]);
        let p0 = PlayerId::new(0);
        let bear = state.add_to_battlefield(bears(), p0).unwrap();

        let ts = state.next_timestamp();
        state.continuous.register(
            None,
            p0,
            EffectScope::Object(bear),
            Modification::ModifyPowerToughness {
                power: 2,
                toughness: 0,
            },
            Duration::UntilEndOfTurn,
            ts,
        );
        let ts = state.next_timestamp();
        state.continuous.register(
            None,
            p0,
            EffectScope::Object(bear),
            Modification::SwitchPowerToughness,
            Duration::UntilEndOfTurn,
            ts,
        );

        // 2/2 pumped to 4/2, then switched: 2/4.
        let chars = evaluate(&state);
        assert_eq!(chars[&bear].power, Some(2));
        assert_eq!(chars[&bear].toughness, Some(4));
    }

    #[test]
    fn test_remove_all_abilities_silences_statics() {
        let mut state = GameState::new(GameConfig::default(), &["A"]);
        let p0 = PlayerId::new(0);

        let bear = state.add_to_battlefield(bears(), p0).unwrap();
        let anthem = CardBuilder::new("anthem", "Anthem")
            .card_type(CardType::Enchantment)
            .static_ability(StaticAbilityDef::anthem(1, 1))
            .build()
            .unwrap();
        let anthem_id = state.add_to_battlefield(anthem, p0).unwrap();

        let chars = evaluate(&state);
        assert_eq!(chars[&bear].power, Some(3));

        let ts = state.next_timestamp();
        state.continuous.register(
            None,
            p0,
            EffectScope::Object(anthem_id),
            Modification::RemoveAllAbilities,
            Duration::UntilEndOfTurn,
            ts,
        );

        let chars = evaluate(&state);
        assert_eq!(chars[&bear].power, Some(2));
        assert!(chars[&anthem_id].abilities_removed);
    }

    #[test]
    fn test_later_timestamp_wins_within_sublayer() {
        let mut state = GameState::new(GameConfig::default(), &["A"]);
        let p0 = PlayerId::new(0);
        let bear = state.add_to_battlefield(bears(), p0).unwrap();

        let ts = state.next_timestamp();
        state.continuous.register(
            None,
            p0,
            EffectScope::Object(bear),
            Modification::SetPowerToughness {
                power: 0,
                toughness: 1,
                sublayer: PtSublayer::Set,
            },
            Duration::UntilEndOfTurn,
            ts,
        );
        let ts = state.next_timestamp();
        state.continuous.register(
            None,
            p0,
            EffectScope::Object(bear),
            Modification::SetPowerToughness {
                power: 5,
                toughness: 5,
                sublayer: PtSublayer::Set,
            },
            Duration::UntilEndOfTurn,
            ts,
        );

        let chars = evaluate(&state);
        assert_eq!(chars[&bear].power, Some(5));
    }
}
