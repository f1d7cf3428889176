//! Core value types: ids, mana, card definitions, ability descriptors

pub mod ability;
pub mod card;
pub mod continuous;
pub mod costs;
pub mod effects;
pub mod entity;
pub mod mana;
pub mod object;
pub mod player;
pub mod replacement;
pub mod types;

pub use ability::{
    ActivatedAbilityDef, ConditionDef, EventFilterDef, ModalConstraint, ModalSpec, ModeDef,
    TriggerMoment, TriggeredAbilityDef,
};
pub use card::{CardBuilder, CardDefinition, CardDefinitionStore, CardType};
pub use continuous::{Duration, EffectScope, Layer, Modification, PtSublayer, StaticAbilityDef};
pub use costs::{
    AlternativeCost, CastRestriction, CostAdjustment, CostChoice, CostItem, SpeedClass,
};
pub use effects::{
    Effect, EffectTarget, Keyword, ObjectFilter, PlayerScope, TargetFilter, TargetRef, TargetSpec,
};
pub use entity::{EntityStore, ObjectId, PlayerId};
pub use mana::{Color, ManaCost, ManaPool};
pub use object::GameObject;
pub use player::PlayerState;
pub use replacement::{AmountChange, ReplacementAction, ReplacementTemplateDef, ReplacementWatch};
pub use types::{CardName, CounterType, Subtype, Supertype, Timestamp};
