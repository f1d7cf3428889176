//! Runtime game objects
//!
//! A `GameObject` is a card, token, or emblem at runtime: a stable id, a
//! shared immutable definition, and the dynamic state that changes as the
//! game progresses. Effects refer to objects by id only.

use crate::core::entity::{ObjectId, PlayerId};
use crate::core::{CardDefinition, CounterType, Timestamp};
use crate::zones::Zone;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameObject {
    pub id: ObjectId,
    /// Printed identity; never mutated. Layer 1 copy effects substitute a
    /// different definition at evaluation time only.
    pub def: Arc<CardDefinition>,
    pub owner: PlayerId,
    pub controller: PlayerId,
    pub zone: Zone,

    /// Sequence number from the last battlefield entry; orders continuous
    /// effects generated by this object's static abilities.
    pub timestamp: Timestamp,

    // Dynamic state, cleared when the object leaves the battlefield.
    pub tapped: bool,
    pub damage: u32,
    /// Set when any of the marked damage came from a deathtouch source.
    pub deathtouch_damage: bool,
    pub counters: SmallVec<[(CounterType, u32); 2]>,
    pub attached_to: Option<ObjectId>,
    pub phased_out: bool,
    pub summoning_sick: bool,

    pub is_token: bool,
    pub is_emblem: bool,
    /// Set while the object is a spell that was cast (vs. put onto the
    /// stack or battlefield by an effect).
    pub was_cast: bool,
}

impl GameObject {
    pub fn new(id: ObjectId, def: Arc<CardDefinition>, owner: PlayerId, zone: Zone) -> Self {
        GameObject {
            id,
            def,
            owner,
            controller: owner,
            zone,
            timestamp: Timestamp::default(),
            tapped: false,
            damage: 0,
            deathtouch_damage: false,
            counters: SmallVec::new(),
            attached_to: None,
            phased_out: false,
            summoning_sick: false,
            is_token: false,
            is_emblem: false,
            was_cast: false,
        }
    }

    pub fn tap(&mut self) {
        self.tapped = true;
    }

    pub fn untap(&mut self) {
        self.tapped = false;
    }

    pub fn counter_count(&self, kind: &CounterType) -> u32 {
        self.counters
            .iter()
            .find(|(k, _)| k == kind)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    pub fn add_counters(&mut self, kind: CounterType, amount: u32) {
        if amount == 0 {
            return;
        }
        if let Some((_, n)) = self.counters.iter_mut().find(|(k, _)| *k == kind) {
            *n += amount;
        } else {
            self.counters.push((kind, amount));
        }
    }

    /// Remove up to `amount` counters; returns how many were removed.
    pub fn remove_counters(&mut self, kind: &CounterType, amount: u32) -> u32 {
        let mut removed = 0;
        if let Some(pos) = self.counters.iter().position(|(k, _)| k == kind) {
            let (_, n) = &mut self.counters[pos];
            removed = amount.min(*n);
            *n -= removed;
            if *n == 0 {
                self.counters.remove(pos);
            }
        }
        removed
    }

    /// Reset everything that does not survive leaving the battlefield.
    /// Printed identity, owner, and token/emblem flags are preserved.
    /// End-of-turn damage wear-off.
    pub fn clear_damage(&mut self) {
        self.damage = 0;
        self.deathtouch_damage = false;
    }

    pub fn clear_battlefield_state(&mut self) {
        self.tapped = false;
        self.damage = 0;
        self.deathtouch_damage = false;
        self.counters.clear();
        self.attached_to = None;
        self.phased_out = false;
        self.summoning_sick = false;
        self.controller = self.owner;
    }

    pub fn is_on_battlefield(&self) -> bool {
        self.zone == Zone::Battlefield
    }
}
