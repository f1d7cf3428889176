//! Ability descriptors: activated abilities, triggered abilities, modes

use crate::core::costs::{CostItem, SpeedClass};
use crate::core::{CounterType, Effect, ManaCost, ObjectFilter, PlayerScope, TargetSpec};
use serde::{Deserialize, Serialize};

/// Turn moments a "at the beginning of…" trigger can watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerMoment {
    Upkeep,
    Draw,
    EndStep,
}

/// Which events a triggered ability observes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventFilterDef {
    /// The source itself enters the battlefield.
    SelfEnters,
    /// A matching object enters the battlefield ("whenever a creature
    /// enters…"). Matches the source itself too unless the filter excludes
    /// it.
    ObjectEnters(ObjectFilter),
    SelfDies,
    ObjectDies(ObjectFilter),
    /// Once when the step begins, for the player in scope.
    BeginningOf {
        moment: TriggerMoment,
        whose: PlayerScope,
    },
    /// The source deals combat damage to a player.
    SelfDealsCombatDamageToPlayer,
    /// A matching spell is cast.
    SpellCast(ObjectFilter),
}

/// Intervening-if condition, evaluated when the ability triggers and again
/// on resolution; false at either point means the ability does nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConditionDef {
    /// The source has at least one counter of this kind. For death triggers
    /// this reads the counters snapshot carried by the event (pre-event
    /// state), since dynamic state is cleared on leaving the battlefield.
    SourceHasCounter(CounterType),
    /// You control at least `count` objects matching the filter.
    ControlsAtLeast { filter: ObjectFilter, count: u8 },
    /// Your life total is at or below the threshold.
    LifeAtMost(i32),
}

/// A triggered ability as printed on a card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggeredAbilityDef {
    pub trigger: EventFilterDef,
    pub condition: Option<ConditionDef>,
    pub effects: Vec<Effect>,
    pub targets: Vec<TargetSpec>,
    /// Mandatory triggers go on the stack unconditionally; optional ones ask
    /// the controller first.
    pub mandatory: bool,
}

impl TriggeredAbilityDef {
    pub fn new(trigger: EventFilterDef, effects: Vec<Effect>) -> Self {
        TriggeredAbilityDef {
            trigger,
            condition: None,
            effects,
            targets: Vec::new(),
            mandatory: true,
        }
    }

    pub fn with_condition(mut self, condition: ConditionDef) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_targets(mut self, targets: Vec<TargetSpec>) -> Self {
        self.targets = targets;
        self
    }
}

/// An activated ability as printed on a card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivatedAbilityDef {
    pub mana_cost: Option<ManaCost>,
    pub costs: Vec<CostItem>,
    pub effects: Vec<Effect>,
    pub targets: Vec<TargetSpec>,
    pub speed: SpeedClass,
    /// Mana abilities resolve immediately, without using the stack.
    pub is_mana_ability: bool,
}

impl ActivatedAbilityDef {
    /// "{T}: Add one mana of the given color."
    pub fn tap_for_mana(color: crate::core::Color) -> Self {
        ActivatedAbilityDef {
            mana_cost: None,
            costs: vec![CostItem::TapSelf],
            effects: vec![Effect::AddMana { color, amount: 1 }],
            targets: Vec::new(),
            speed: SpeedClass::Instant,
            is_mana_ability: true,
        }
    }
}

/// One mode of a modal spell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeDef {
    pub description: String,
    pub effects: Vec<Effect>,
    pub targets: Vec<TargetSpec>,
}

/// Modal constraint: how many modes must be chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModalConstraint {
    ChooseExactly(u8),
    ChooseUpTo(u8),
    ChooseOneOrMore,
    AnyNumber,
}

impl ModalConstraint {
    /// Is choosing `n` of `available` modes legal?
    pub fn allows(&self, n: usize, available: usize) -> bool {
        if n > available {
            return false;
        }
        match self {
            ModalConstraint::ChooseExactly(k) => n == *k as usize,
            ModalConstraint::ChooseUpTo(k) => n <= *k as usize,
            ModalConstraint::ChooseOneOrMore => n >= 1,
            ModalConstraint::AnyNumber => true,
        }
    }
}

/// A modal spell's mode table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalSpec {
    pub modes: Vec<ModeDef>,
    pub constraint: ModalConstraint,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Color;

    #[test]
    fn test_modal_constraint() {
        assert!(ModalConstraint::ChooseExactly(1).allows(1, 3));
        assert!(!ModalConstraint::ChooseExactly(1).allows(2, 3));
        assert!(ModalConstraint::ChooseUpTo(2).allows(0, 3));
        assert!(!ModalConstraint::ChooseOneOrMore.allows(0, 3));
        assert!(!ModalConstraint::AnyNumber.allows(4, 3));
    }

    #[test]
    fn test_mana_ability_template() {
        let ab = ActivatedAbilityDef::tap_for_mana(Color::Green);
        assert!(ab.is_mana_ability);
        assert_eq!(ab.costs, vec![CostItem::TapSelf]);
    }
}
