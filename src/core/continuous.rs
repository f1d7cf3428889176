//! Continuous-effect descriptors: layers, modifications, durations
//!
//! These are the data half of the layer system. The evaluator that folds
//! them into effective characteristics lives in `game::layers`.

use crate::core::entity::{ObjectId, PlayerId};
use crate::core::{CardName, CardType, Color, Keyword, ObjectFilter, Subtype, Supertype};
use serde::{Deserialize, Serialize};

/// The seven layers, applied in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Layer {
    /// 1 — copy effects
    Copy,
    /// 2 — control-changing
    Control,
    /// 3 — text-changing
    Text,
    /// 4 — type/subtype/supertype
    Types,
    /// 5 — color
    Color,
    /// 6 — ability add/remove
    Abilities,
    /// 7 — power/toughness (with sublayers)
    PowerToughness,
}

/// Sublayers of layer 7, applied in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PtSublayer {
    /// 7a — characteristic-defining abilities
    Cda,
    /// 7b — set to a specific value
    Set,
    /// 7c — modify (+N/+N)
    Modify,
    /// 7d — counters (handled from object state, not stored effects)
    Counters,
    /// 7e — switch power and toughness
    Switch,
}

/// A single layered modification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Modification {
    /// Layer 1: replace printed characteristics with the copy source's.
    CopyOf(ObjectId),

    /// Layer 2.
    ChangeController(PlayerId),

    /// Layer 3 (minimal text-changing: rename).
    SetName(CardName),

    /// Layer 4.
    AddCardType(CardType),
    RemoveCardType(CardType),
    AddSubtype(Subtype),
    RemoveSubtype(Subtype),
    AddSupertype(Supertype),
    RemoveSupertype(Supertype),

    /// Layer 5.
    AddColor(Color),
    SetColors(Vec<Color>),

    /// Layer 6. A removal in the same effect as adds applies first.
    AddKeyword(Keyword),
    RemoveKeyword(Keyword),
    RemoveAllAbilities,

    /// Layer 7a/7b depending on `sublayer`.
    SetPowerToughness {
        power: i32,
        toughness: i32,
        sublayer: PtSublayer,
    },

    /// Layer 7c.
    ModifyPowerToughness { power: i32, toughness: i32 },

    /// Layer 7e.
    SwitchPowerToughness,
}

impl Modification {
    pub fn layer(&self) -> Layer {
        match self {
            Modification::CopyOf(_) => Layer::Copy,
            Modification::ChangeController(_) => Layer::Control,
            Modification::SetName(_) => Layer::Text,
            Modification::AddCardType(_)
            | Modification::RemoveCardType(_)
            | Modification::AddSubtype(_)
            | Modification::RemoveSubtype(_)
            | Modification::AddSupertype(_)
            | Modification::RemoveSupertype(_) => Layer::Types,
            Modification::AddColor(_) | Modification::SetColors(_) => Layer::Color,
            Modification::AddKeyword(_)
            | Modification::RemoveKeyword(_)
            | Modification::RemoveAllAbilities => Layer::Abilities,
            Modification::SetPowerToughness { .. }
            | Modification::ModifyPowerToughness { .. }
            | Modification::SwitchPowerToughness => Layer::PowerToughness,
        }
    }

    pub fn pt_sublayer(&self) -> Option<PtSublayer> {
        match self {
            Modification::SetPowerToughness { sublayer, .. } => Some(*sublayer),
            Modification::ModifyPowerToughness { .. } => Some(PtSublayer::Modify),
            Modification::SwitchPowerToughness => Some(PtSublayer::Switch),
            _ => None,
        }
    }
}

/// How long a continuous effect lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Duration {
    /// Lives as long as the source object stays in its generating zone
    /// (static abilities of permanents).
    WhileSourceOnBattlefield,
    UntilEndOfTurn,
    /// Never expires on its own (emblems).
    Permanent,
}

/// Which objects a continuous effect modifies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EffectScope {
    Object(ObjectId),
    Objects(Vec<ObjectId>),
    Matching(ObjectFilter),
}

/// A static ability template on a card definition: while the source is on
/// the battlefield it generates one continuous effect per modification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticAbilityDef {
    pub scope: ObjectFilter,
    pub modifications: Vec<Modification>,
    /// Characteristic-defining abilities apply in 7a and are active in every
    /// zone, not only on the battlefield.
    pub is_cda: bool,
}

impl StaticAbilityDef {
    pub fn new(scope: ObjectFilter, modifications: Vec<Modification>) -> Self {
        StaticAbilityDef {
            scope,
            modifications,
            is_cda: false,
        }
    }

    /// Anthem helper: "creatures you control get +P/+T".
    pub fn anthem(power: i32, toughness: i32) -> Self {
        StaticAbilityDef::new(
            ObjectFilter::creatures_you_control(),
            vec![Modification::ModifyPowerToughness { power, toughness }],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_assignment() {
        assert_eq!(
            Modification::ChangeController(PlayerId::new(1)).layer(),
            Layer::Control
        );
        assert_eq!(Modification::RemoveAllAbilities.layer(), Layer::Abilities);
        assert_eq!(
            Modification::ModifyPowerToughness {
                power: 1,
                toughness: 1
            }
            .layer(),
            Layer::PowerToughness
        );
    }

    #[test]
    fn test_sublayer_ordering() {
        assert!(PtSublayer::Cda < PtSublayer::Set);
        assert!(PtSublayer::Set < PtSublayer::Modify);
        assert!(PtSublayer::Counters < PtSublayer::Switch);
        assert_eq!(
            Modification::SwitchPowerToughness.pt_sublayer(),
            Some(PtSublayer::Switch)
        );
    }

    #[test]
    fn test_anthem_template() {
        let anthem = StaticAbilityDef::anthem(1, 1);
        assert_eq!(anthem.modifications.len(), 1);
        assert!(!anthem.is_cda);
    }
}
