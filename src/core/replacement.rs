//! Replacement-effect descriptors
//!
//! Data templates carried by card definitions; the runtime registry and the
//! application loop live in `game::replacements`.

use crate::core::{CounterType, ObjectFilter, PlayerScope};
use crate::zones::Zone;
use serde::{Deserialize, Serialize};

/// Which in-flight events a replacement watches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReplacementWatch {
    /// The source itself would enter the battlefield.
    SelfEntersBattlefield,
    /// The source itself would die (battlefield to graveyard).
    SelfWouldDie,
    /// A matching object would enter the battlefield.
    ObjectEntersBattlefield(ObjectFilter),
    /// Damage would be dealt to the effect's controller.
    DamageToYou,
    /// Damage would be dealt to the source.
    DamageToSelf,
    /// A player in scope would draw a card.
    DrawBy(PlayerScope),
    /// The source spell resolves and would leave the stack (flashback-style
    /// destination overrides).
    SelfSpellLeavesStack,
}

/// Arithmetic modification of an event amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmountChange {
    Multiply(u32),
    Add(u32),
    /// Saturating at zero; a zero amount still happens (it is not a Prevent).
    Subtract(u32),
    SetTo(u32),
}

impl AmountChange {
    pub fn apply(&self, amount: u32) -> u32 {
        match self {
            AmountChange::Multiply(n) => amount.saturating_mul(*n),
            AmountChange::Add(n) => amount.saturating_add(*n),
            AmountChange::Subtract(n) => amount.saturating_sub(*n),
            AmountChange::SetTo(n) => *n,
        }
    }
}

/// What happens instead when a replacement applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReplacementAction {
    /// Cancel the event entirely.
    Prevent,
    /// Rewrite the destination zone of a zone change.
    ChangeDestination(Zone),
    /// "Enters the battlefield tapped."
    EnterTapped,
    /// "Enters the battlefield with N counters."
    EnterWithCounters { kind: CounterType, count: u32 },
    /// Modify the numeric payload (damage amount, life change, draw count).
    ChangeAmount(AmountChange),
}

/// A replacement template on a card definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplacementTemplateDef {
    pub watches: ReplacementWatch,
    pub action: ReplacementAction,
}

impl ReplacementTemplateDef {
    pub fn enters_tapped() -> Self {
        ReplacementTemplateDef {
            watches: ReplacementWatch::SelfEntersBattlefield,
            action: ReplacementAction::EnterTapped,
        }
    }

    pub fn enters_with_counters(kind: CounterType, count: u32) -> Self {
        ReplacementTemplateDef {
            watches: ReplacementWatch::SelfEntersBattlefield,
            action: ReplacementAction::EnterWithCounters { kind, count },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_change() {
        assert_eq!(AmountChange::Multiply(2).apply(3), 6);
        assert_eq!(AmountChange::Subtract(5).apply(3), 0);
        assert_eq!(AmountChange::SetTo(1).apply(9), 1);
    }

    #[test]
    fn test_enters_tapped_template() {
        let t = ReplacementTemplateDef::enters_tapped();
        assert_eq!(t.watches, ReplacementWatch::SelfEntersBattlefield);
        assert_eq!(t.action, ReplacementAction::EnterTapped);
    }
}
