//! Costs: non-mana cost items, alternative costs, and cost modifiers

use crate::core::{ManaCost, ObjectFilter};
use crate::zones::Zone;
use serde::{Deserialize, Serialize};

/// A non-mana cost item. Payment is atomic: if any item cannot be paid the
/// whole payment rolls back and the action is illegal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CostItem {
    /// Tap the source ("{T}").
    TapSelf,
    SacrificeSelf,
    /// Sacrifice a permanent matching the filter (controller chooses).
    Sacrifice(ObjectFilter),
    /// Discard N cards (controller chooses which).
    Discard(u8),
    PayLife(u8),
    /// Exile N cards from your graveyard (escape-style).
    ExileFromGraveyard(u8),
}

/// Timing class for spells and activated abilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeedClass {
    /// Any time the player has priority.
    Instant,
    /// Own main phase, empty stack.
    Sorcery,
}

/// A registered alternative way to cast a card (flashback, escape, madness).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativeCost {
    /// Tag recorded in the cast context, e.g. "flashback".
    pub name: String,
    /// Replacement mana cost; None keeps the printed cost.
    pub mana: Option<ManaCost>,
    pub extra: Vec<CostItem>,
    /// Grants permission to cast from this zone (e.g. Graveyard for
    /// flashback). None leaves the base zone rules in place.
    pub from_zone: Option<Zone>,
    /// Where the spell goes when it resolves or is countered, overriding the
    /// default graveyard destination (flashback exiles).
    pub resolution_destination: Option<Zone>,
}

impl AlternativeCost {
    pub fn flashback(mana: ManaCost) -> Self {
        AlternativeCost {
            name: "flashback".to_string(),
            mana: Some(mana),
            extra: Vec::new(),
            from_zone: Some(Zone::Graveyard),
            resolution_destination: Some(Zone::Exile),
        }
    }
}

/// How a cast was paid for; recorded in the cast context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CostChoice {
    Base,
    /// Index into the definition's alternative cost list.
    Alternative(usize),
}

/// A registered global casting restriction, consulted as a predicate during
/// cast permission. Any matching restriction makes the cast illegal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CastRestriction {
    /// No player may cast spells.
    NoSpells,
    /// Spells matching the filter cannot be cast.
    Forbid(ObjectFilter),
    /// Spells may only be cast during their caster's own turn.
    OwnTurnOnly,
}

/// A registered cost increase or reduction. Modifiers apply in registration
/// order; the generic component clamps at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CostAdjustment {
    ReduceGeneric(u8),
    IncreaseGeneric(u8),
}

impl CostAdjustment {
    pub fn apply(&self, cost: ManaCost) -> ManaCost {
        match self {
            CostAdjustment::ReduceGeneric(n) => cost.reduce_generic(*n),
            CostAdjustment::IncreaseGeneric(n) => cost.increase_generic(*n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjustment_order_and_clamp() {
        let cost = ManaCost::from_string("2R");
        // Reduction first, then increase: clamping happens per step.
        let reduced = CostAdjustment::ReduceGeneric(4).apply(cost);
        assert_eq!(reduced.generic, 0);
        let bumped = CostAdjustment::IncreaseGeneric(1).apply(reduced);
        assert_eq!(bumped.generic, 1);
    }

    #[test]
    fn test_flashback_template() {
        let fb = AlternativeCost::flashback(ManaCost::from_string("3R"));
        assert_eq!(fb.from_zone, Some(Zone::Graveyard));
        assert_eq!(fb.resolution_destination, Some(Zone::Exile));
    }
}
