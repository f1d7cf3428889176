//! Immutable card definitions and the definition store
//!
//! A `CardDefinition` is the parsed, printed face of a card: characteristics
//! plus the ability graph. The engine consumes definitions; producing them
//! (oracle-text parsing, database import) is out of scope. Definitions are
//! never mutated after construction and are shared via `Arc`.

use crate::core::ability::{ActivatedAbilityDef, ModalSpec, TriggeredAbilityDef};
use crate::core::continuous::StaticAbilityDef;
use crate::core::costs::AlternativeCost;
use crate::core::replacement::ReplacementTemplateDef;
use crate::core::{CardName, Color, Effect, Keyword, ManaCost, Subtype, Supertype, TargetSpec};
use crate::{Result, RulesError};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Card types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardType {
    Creature,
    Instant,
    Sorcery,
    Enchantment,
    Artifact,
    Land,
    Planeswalker,
    Battle,
}

impl CardType {
    /// Types that stay on the battlefield when they resolve.
    pub fn is_permanent_type(&self) -> bool {
        !matches!(self, CardType::Instant | CardType::Sorcery)
    }
}

/// Printed characteristics plus the ability graph. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardDefinition {
    /// Store key ("card id"); deck lists reference this.
    pub id: String,
    pub name: CardName,
    pub mana_cost: ManaCost,
    pub supertypes: SmallVec<[Supertype; 1]>,
    pub card_types: SmallVec<[CardType; 2]>,
    pub subtypes: SmallVec<[Subtype; 2]>,
    /// Defaults to the colors of the mana cost; overridable for color
    /// indicators.
    pub colors: SmallVec<[Color; 2]>,
    pub base_power: Option<i32>,
    pub base_toughness: Option<i32>,
    pub base_loyalty: Option<u32>,
    pub base_defense: Option<u32>,
    pub keywords: SmallVec<[Keyword; 2]>,

    // Ability graph
    pub statics: Vec<StaticAbilityDef>,
    pub activated: Vec<ActivatedAbilityDef>,
    pub triggered: Vec<TriggeredAbilityDef>,
    pub replacements: Vec<ReplacementTemplateDef>,
    /// One-shot effects for instants and sorceries.
    pub spell_effects: Vec<Effect>,
    pub spell_targets: Vec<TargetSpec>,
    pub modal: Option<ModalSpec>,
    pub alternative_costs: Vec<AlternativeCost>,
}

impl CardDefinition {
    pub fn mana_value(&self) -> u8 {
        self.mana_cost.mana_value()
    }

    pub fn is_type(&self, t: CardType) -> bool {
        self.card_types.contains(&t)
    }

    pub fn is_creature(&self) -> bool {
        self.is_type(CardType::Creature)
    }

    pub fn is_land(&self) -> bool {
        self.is_type(CardType::Land)
    }

    pub fn is_permanent(&self) -> bool {
        self.card_types.iter().any(|t| t.is_permanent_type())
    }

    pub fn is_legendary(&self) -> bool {
        self.supertypes.contains(&Supertype::legendary())
    }

    pub fn has_keyword(&self, kw: &Keyword) -> bool {
        self.keywords.contains(kw)
    }

    /// Validate the ability graph. Called when a definition enters the
    /// store; a failing card is unplayable.
    pub fn validate(&self) -> Result<()> {
        let err = |message: String| RulesError::DefinitionError {
            card: self.id.clone(),
            message,
        };

        if self.card_types.is_empty() {
            return Err(err("card has no types".to_string()));
        }
        if self.is_creature() && (self.base_power.is_none() || self.base_toughness.is_none()) {
            return Err(err("creature without power/toughness".to_string()));
        }
        if self.is_type(CardType::Planeswalker) && self.base_loyalty.is_none() {
            return Err(err("planeswalker without loyalty".to_string()));
        }
        if self.is_type(CardType::Battle) && self.base_defense.is_none() {
            return Err(err("battle without defense".to_string()));
        }

        // Every target slot an effect reads must be declared.
        let check_slots = |effects: &[Effect], targets: &[TargetSpec], what: &str| {
            for effect in effects {
                if let Some(slot) = effect.target_slots() {
                    if slot >= targets.len() {
                        return Err(err(format!(
                            "{what} references target slot {slot} but only {} declared",
                            targets.len()
                        )));
                    }
                }
            }
            Ok(())
        };

        check_slots(&self.spell_effects, &self.spell_targets, "spell effect")?;
        for (i, ability) in self.activated.iter().enumerate() {
            check_slots(
                &ability.effects,
                &ability.targets,
                &format!("activated ability {i}"),
            )?;
        }
        for (i, ability) in self.triggered.iter().enumerate() {
            check_slots(
                &ability.effects,
                &ability.targets,
                &format!("triggered ability {i}"),
            )?;
        }
        if let Some(modal) = &self.modal {
            if modal.modes.is_empty() {
                return Err(err("modal spell with no modes".to_string()));
            }
            for (i, mode) in modal.modes.iter().enumerate() {
                check_slots(&mode.effects, &mode.targets, &format!("mode {i}"))?;
            }
        }
        Ok(())
    }
}

/// Builder for card definitions. Tests and hosts construct cards with this;
/// there is no text parser in the core.
#[derive(Debug, Clone)]
pub struct CardBuilder {
    def: CardDefinition,
    colors_overridden: bool,
}

impl CardBuilder {
    pub fn new(id: impl Into<String>, name: impl Into<CardName>) -> Self {
        CardBuilder {
            def: CardDefinition {
                id: id.into(),
                name: name.into(),
                mana_cost: ManaCost::new(),
                supertypes: SmallVec::new(),
                card_types: SmallVec::new(),
                subtypes: SmallVec::new(),
                colors: SmallVec::new(),
                base_power: None,
                base_toughness: None,
                base_loyalty: None,
                base_defense: None,
                keywords: SmallVec::new(),
                statics: Vec::new(),
                activated: Vec::new(),
                triggered: Vec::new(),
                replacements: Vec::new(),
                spell_effects: Vec::new(),
                spell_targets: Vec::new(),
                modal: None,
                alternative_costs: Vec::new(),
            },
            colors_overridden: false,
        }
    }

    pub fn mana_cost(mut self, cost: &str) -> Self {
        self.def.mana_cost = ManaCost::from_string(cost);
        self
    }

    pub fn card_type(mut self, t: CardType) -> Self {
        self.def.card_types.push(t);
        self
    }

    pub fn supertype(mut self, s: Supertype) -> Self {
        self.def.supertypes.push(s);
        self
    }

    pub fn subtype(mut self, s: impl Into<Subtype>) -> Self {
        self.def.subtypes.push(s.into());
        self
    }

    pub fn colors(mut self, colors: &[Color]) -> Self {
        self.def.colors = colors.iter().copied().collect();
        self.colors_overridden = true;
        self
    }

    pub fn power_toughness(mut self, power: i32, toughness: i32) -> Self {
        self.def.base_power = Some(power);
        self.def.base_toughness = Some(toughness);
        self
    }

    pub fn loyalty(mut self, loyalty: u32) -> Self {
        self.def.base_loyalty = Some(loyalty);
        self
    }

    pub fn defense(mut self, defense: u32) -> Self {
        self.def.base_defense = Some(defense);
        self
    }

    pub fn keyword(mut self, kw: Keyword) -> Self {
        self.def.keywords.push(kw);
        self
    }

    pub fn static_ability(mut self, ab: StaticAbilityDef) -> Self {
        self.def.statics.push(ab);
        self
    }

    pub fn activated_ability(mut self, ab: ActivatedAbilityDef) -> Self {
        self.def.activated.push(ab);
        self
    }

    pub fn triggered_ability(mut self, ab: TriggeredAbilityDef) -> Self {
        self.def.triggered.push(ab);
        self
    }

    pub fn replacement(mut self, r: ReplacementTemplateDef) -> Self {
        self.def.replacements.push(r);
        self
    }

    pub fn spell_effect(mut self, effect: Effect) -> Self {
        self.def.spell_effects.push(effect);
        self
    }

    pub fn spell_target(mut self, target: TargetSpec) -> Self {
        self.def.spell_targets.push(target);
        self
    }

    pub fn modal(mut self, spec: ModalSpec) -> Self {
        self.def.modal = Some(spec);
        self
    }

    pub fn alternative_cost(mut self, cost: AlternativeCost) -> Self {
        self.def.alternative_costs.push(cost);
        self
    }

    pub fn build(mut self) -> Result<Arc<CardDefinition>> {
        if !self.colors_overridden {
            self.def.colors = self.def.mana_cost.colors().into_iter().collect();
        }
        self.def.validate()?;
        Ok(Arc::new(self.def))
    }
}

/// Immutable store of card definitions, keyed by definition id. Built once
/// at load time and shared freely across the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CardDefinitionStore {
    // BTreeMap for deterministic iteration.
    defs: BTreeMap<String, Arc<CardDefinition>>,
}

impl CardDefinitionStore {
    pub fn new() -> Self {
        CardDefinitionStore::default()
    }

    pub fn insert(&mut self, def: Arc<CardDefinition>) -> Result<()> {
        def.validate()?;
        self.defs.insert(def.id.clone(), def);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Arc<CardDefinition>> {
        self.defs
            .get(id)
            .cloned()
            .ok_or_else(|| RulesError::DefinitionError {
                card: id.to_string(),
                message: "unknown card id".to_string(),
            })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.defs.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EffectTarget, TargetFilter};

    #[test]
    fn test_builder_basic_creature() {
        let bears = CardBuilder::new("grizzly-bears", "Grizzly Bears")
            .mana_cost("1G")
            .card_type(CardType::Creature)
            .subtype("Bear")
            .power_toughness(2, 2)
            .build()
            .unwrap();

        assert!(bears.is_creature());
        assert_eq!(bears.mana_value(), 2);
        assert_eq!(bears.colors.as_slice(), &[Color::Green]);
    }

    #[test]
    fn test_validation_rejects_creature_without_pt() {
        let result = CardBuilder::new("bad", "Bad Creature")
            .card_type(CardType::Creature)
            .build();
        assert!(matches!(
            result,
            Err(RulesError::DefinitionError { .. })
        ));
    }

    #[test]
    fn test_validation_rejects_unbound_target_slot() {
        let result = CardBuilder::new("bad-bolt", "Bad Bolt")
            .mana_cost("R")
            .card_type(CardType::Instant)
            .spell_effect(Effect::DealDamage {
                target: EffectTarget::Slot(0),
                amount: 3,
            })
            .build();
        assert!(result.is_err());

        let ok = CardBuilder::new("bolt", "Bolt")
            .mana_cost("R")
            .card_type(CardType::Instant)
            .spell_target(TargetSpec::required(TargetFilter::AnyTarget))
            .spell_effect(Effect::DealDamage {
                target: EffectTarget::Slot(0),
                amount: 3,
            })
            .build();
        assert!(ok.is_ok());
    }

    #[test]
    fn test_store_lookup() {
        let mut store = CardDefinitionStore::new();
        let forest = CardBuilder::new("forest", "Forest")
            .card_type(CardType::Land)
            .supertype(Supertype::basic())
            .build()
            .unwrap();
        store.insert(forest).unwrap();

        assert!(store.get("forest").is_ok());
        assert!(store.get("island").is_err());
    }
}
