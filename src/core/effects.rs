//! One-shot effect descriptors and targeting data
//!
//! Effects are data interpreted by the executor in `game::stack`; card
//! definitions never carry closures, so the whole graph serializes.

use crate::core::{CardType, Color, CounterType, PlayerId, Subtype};
use crate::core::entity::ObjectId;
use serde::{Deserialize, Serialize};

/// A resolved target: chosen at cast/activation time, re-validated at
/// resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetRef {
    Player(PlayerId),
    Object(ObjectId),
}

/// Which objects a target slot may legally point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetFilter {
    /// Any creature, player, or planeswalker ("any target").
    AnyTarget,
    Creature,
    Permanent,
    Player,
    /// A spell on the stack (for counterspells).
    SpellOnStack,
}

/// A declared target slot on a spell, ability, or mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub filter: TargetFilter,
    /// Optional slots ("up to one target") leave the slot empty when no
    /// legal target is chosen.
    pub optional: bool,
}

impl TargetSpec {
    pub fn required(filter: TargetFilter) -> Self {
        TargetSpec {
            filter,
            optional: false,
        }
    }
}

/// Which player an effect applies to, resolved against the execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerScope {
    You,
    Opponents,
    Each,
    /// The player chosen in the given target slot.
    Slot(usize),
}

/// Which object an effect applies to, resolved against the execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectTarget {
    /// The object chosen in the given target slot.
    Slot(usize),
    /// The effect's own source object.
    Source,
}

/// Data predicate over game objects, evaluated against effective
/// characteristics by the game layer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ObjectFilter {
    pub card_type: Option<CardType>,
    pub subtype: Option<Subtype>,
    /// None = any controller; interpreted relative to the effect controller.
    pub controlled_by: Option<PlayerScope>,
    /// Match only the effect's own source object.
    pub self_only: bool,
    /// Exclude the effect's own source object.
    pub other_than_self: bool,
}

impl ObjectFilter {
    pub fn any() -> Self {
        ObjectFilter::default()
    }

    pub fn self_object() -> Self {
        ObjectFilter {
            self_only: true,
            ..Default::default()
        }
    }

    pub fn creatures() -> Self {
        ObjectFilter {
            card_type: Some(CardType::Creature),
            ..Default::default()
        }
    }

    pub fn creatures_you_control() -> Self {
        ObjectFilter {
            card_type: Some(CardType::Creature),
            controlled_by: Some(PlayerScope::You),
            ..Default::default()
        }
    }
}

/// Keyword abilities.
///
/// The evergreen set is recognized by combat, SBAs, and the layer evaluator;
/// `Extension` carries format- or card-specific keywords the core treats as
/// opaque grantable markers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Keyword {
    Flying,
    FirstStrike,
    DoubleStrike,
    Deathtouch,
    Defender,
    Haste,
    Hexproof,
    Indestructible,
    Lifelink,
    Menace,
    Reach,
    Trample,
    Vigilance,
    Flash,
    Protection(Color),
    Extension(String),
}

/// One-shot effects executed at resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    /// Deal damage to the object or player in a target slot.
    DealDamage { target: EffectTarget, amount: u32 },

    /// Deal damage to players by scope (e.g. "each opponent").
    DealDamageToPlayers { scope: PlayerScope, amount: u32 },

    DrawCards { scope: PlayerScope, count: u8 },

    /// Positive gains, negative loses.
    ChangeLife { scope: PlayerScope, delta: i32 },

    Destroy { target: EffectTarget },

    Tap { target: EffectTarget },

    Untap { target: EffectTarget },

    /// Register a until-end-of-turn power/toughness modification (layer 7c).
    PumpUntilEndOfTurn {
        target: EffectTarget,
        power: i32,
        toughness: i32,
    },

    /// Register a until-end-of-turn keyword grant (layer 6).
    GrantKeywordUntilEndOfTurn {
        target: EffectTarget,
        keyword: Keyword,
    },

    AddCounters {
        target: EffectTarget,
        kind: CounterType,
        amount: u32,
    },

    /// Move the targeted spell from the stack to its owner's graveyard.
    CounterSpell { target: EffectTarget },

    /// Create token copies of a stored token definition.
    CreateToken { definition: String, count: u8 },

    Mill { scope: PlayerScope, count: u8 },

    /// Players discard; each chooses which cards through their controller.
    Discard { scope: PlayerScope, count: u8 },

    /// Produce mana (mana abilities resolve without using the stack).
    AddMana { color: Color, amount: u8 },
}

impl Effect {
    /// Target slots this effect reads. Used by definition validation and by
    /// resolution-time fizzle checks.
    pub fn target_slots(&self) -> Option<usize> {
        let slot = |t: &EffectTarget| match t {
            EffectTarget::Slot(i) => Some(*i),
            EffectTarget::Source => None,
        };
        match self {
            Effect::DealDamage { target, .. }
            | Effect::Destroy { target }
            | Effect::Tap { target }
            | Effect::Untap { target }
            | Effect::PumpUntilEndOfTurn { target, .. }
            | Effect::GrantKeywordUntilEndOfTurn { target, .. }
            | Effect::AddCounters { target, .. }
            | Effect::CounterSpell { target } => slot(target),
            Effect::DrawCards {
                scope: PlayerScope::Slot(i),
                ..
            }
            | Effect::ChangeLife {
                scope: PlayerScope::Slot(i),
                ..
            }
            | Effect::Mill {
                scope: PlayerScope::Slot(i),
                ..
            }
            | Effect::Discard {
                scope: PlayerScope::Slot(i),
                ..
            }
            | Effect::DealDamageToPlayers {
                scope: PlayerScope::Slot(i),
                ..
            } => Some(*i),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_slot_extraction() {
        let e = Effect::DealDamage {
            target: EffectTarget::Slot(0),
            amount: 3,
        };
        assert_eq!(e.target_slots(), Some(0));

        let e = Effect::DrawCards {
            scope: PlayerScope::You,
            count: 1,
        };
        assert_eq!(e.target_slots(), None);
    }

    #[test]
    fn test_filter_constructors() {
        let f = ObjectFilter::creatures_you_control();
        assert_eq!(f.card_type, Some(CardType::Creature));
        assert_eq!(f.controlled_by, Some(PlayerScope::You));
        assert!(!f.self_only);
    }
}
