//! Game events
//!
//! Every state mutation flows through an event: it is published to the
//! queue, offered to replacement effects, applied, offered to triggered
//! abilities, and finally followed by a state-based action pass. Derived
//! events (EnteredBattlefield, CreatureDied, ...) are emitted by the
//! mutation itself so watchers see the real outcome, post-replacement.

use crate::core::{CounterType, ObjectId, PlayerId};
use crate::game::phase::{Phase, Step};
use crate::zones::Zone;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Why a player left the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LossReason {
    LifeZero,
    DrewFromEmptyLibrary,
    CommanderDamage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// An object moves between zones. Replacements may rewrite the
    /// destination or attach entry state before the move applies.
    ZoneChange {
        object: ObjectId,
        from: Zone,
        to: Zone,
        /// "Enters the battlefield tapped" (set by replacements).
        enters_tapped: bool,
        /// Counters the object enters with (set by replacements).
        enter_counters: SmallVec<[(CounterType, u32); 2]>,
        /// Controller on arrival when it differs from the owner.
        new_controller: Option<PlayerId>,
    },

    /// One card drawn. Multi-card draws publish one event per card so
    /// draw replacements see each individually.
    Draw { player: PlayerId },

    DamageToObject {
        source: Option<ObjectId>,
        target: ObjectId,
        amount: u32,
        is_combat: bool,
    },

    DamageToPlayer {
        source: Option<ObjectId>,
        player: PlayerId,
        amount: u32,
        is_combat: bool,
    },

    /// Life gain or loss that is not damage.
    LifeChange { player: PlayerId, delta: i32 },

    TapObject { object: ObjectId },
    UntapObject { object: ObjectId },

    AddCounters {
        object: ObjectId,
        kind: CounterType,
        amount: u32,
    },
    RemoveCounters {
        object: ObjectId,
        kind: CounterType,
        amount: u32,
    },

    /// A spell was put on the stack by casting it.
    SpellCast {
        object: ObjectId,
        controller: PlayerId,
    },

    /// A spell finished resolving and left the stack.
    SpellResolved { object: ObjectId },

    // Derived events, emitted by the mutation layer.
    EnteredBattlefield { object: ObjectId },
    LeftBattlefield { object: ObjectId, to: Zone },
    /// A creature went from the battlefield to a graveyard. Carries the
    /// controller and counters it had, since that state is cleared on
    /// leaving and death triggers read the pre-event snapshot.
    CreatureDied {
        object: ObjectId,
        controller: PlayerId,
        counters: SmallVec<[(CounterType, u32); 2]>,
    },

    BeginStep {
        phase: Phase,
        step: Step,
        active: PlayerId,
    },
    EndStep {
        phase: Phase,
        step: Step,
        active: PlayerId,
    },

    AttackersDeclared { attackers: Vec<ObjectId> },
    BlockersDeclared { blockers: Vec<ObjectId> },

    PlayerLost {
        player: PlayerId,
        reason: LossReason,
    },
}

impl GameEvent {
    /// Move an object between zones with no entry modifications (the
    /// common case before replacements run).
    pub fn zone_change(object: ObjectId, from: Zone, to: Zone) -> Self {
        GameEvent::ZoneChange {
            object,
            from,
            to,
            enters_tapped: false,
            enter_counters: SmallVec::new(),
            new_controller: None,
        }
    }

    /// Numeric payload replacements (ChangeAmount) operate on.
    pub fn amount(&self) -> Option<u32> {
        match self {
            GameEvent::DamageToObject { amount, .. }
            | GameEvent::DamageToPlayer { amount, .. }
            | GameEvent::AddCounters { amount, .. } => Some(*amount),
            _ => None,
        }
    }

    pub fn set_amount(&mut self, new_amount: u32) {
        match self {
            GameEvent::DamageToObject { amount, .. }
            | GameEvent::DamageToPlayer { amount, .. }
            | GameEvent::AddCounters { amount, .. } => *amount = new_amount,
            _ => {}
        }
    }
}

/// An event waiting in the queue, with the replacement ids that already
/// applied to it. Each replacement effect applies at most once per event,
/// which keeps mutually-triggering replacements from looping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingEvent {
    pub event: GameEvent,
    pub applied_replacements: SmallVec<[u64; 2]>,
}

impl PendingEvent {
    pub fn new(event: GameEvent) -> Self {
        PendingEvent {
            event,
            applied_replacements: SmallVec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_payload() {
        let mut e = GameEvent::DamageToPlayer {
            source: None,
            player: PlayerId::new(0),
            amount: 3,
            is_combat: false,
        };
        assert_eq!(e.amount(), Some(3));
        e.set_amount(6);
        assert_eq!(e.amount(), Some(6));

        let e = GameEvent::Draw {
            player: PlayerId::new(0),
        };
        assert_eq!(e.amount(), None);
    }

    #[test]
    fn test_zone_change_defaults() {
        let e = GameEvent::zone_change(ObjectId::new(1), Zone::Hand, Zone::Battlefield);
        match e {
            GameEvent::ZoneChange {
                enters_tapped,
                enter_counters,
                new_controller,
                ..
            } => {
                assert!(!enters_tapped);
                assert!(enter_counters.is_empty());
                assert!(new_controller.is_none());
            }
            _ => panic!("wrong variant"),
        }
    }
}
