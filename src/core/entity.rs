//! Game object ids and the central object store

use crate::{Result, RulesError};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Id of a game object (card, token, or emblem).
///
/// Ids are simple integers, contiguous and stable for the whole game.
/// Objects change zones; they are never reallocated, so an id taken at any
/// point remains valid (tokens and emblems are the one exception: they are
/// destroyed when they leave the battlefield).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(u32);

impl ObjectId {
    pub fn new(id: u32) -> Self {
        ObjectId(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Index of a player in turn order.
///
/// Distinct from [`ObjectId`]: players are not game objects and never move
/// zones. Turn order is the index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(u8);

impl PlayerId {
    pub fn new(idx: u8) -> Self {
        PlayerId(idx)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Central storage for game objects.
///
/// Fast lookup by [`ObjectId`] over FxHashMap (integer keys). Effects refer
/// to objects by id, never by reference, so the store is the single owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityStore<T> {
    entities: FxHashMap<ObjectId, T>,
    next_id: u32,
}

impl<T> EntityStore<T> {
    pub fn new() -> Self {
        EntityStore {
            entities: FxHashMap::default(),
            next_id: 0,
        }
    }

    /// Generate a new unique id.
    pub fn next_id(&mut self) -> ObjectId {
        let id = ObjectId::new(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn insert(&mut self, id: ObjectId, entity: T) {
        self.entities.insert(id, entity);
    }

    /// Get an object by id. A miss is an engine invariant violation, not a
    /// recoverable condition.
    pub fn get(&self, id: ObjectId) -> Result<&T> {
        self.entities
            .get(&id)
            .ok_or(RulesError::ObjectNotFound(id.as_u32()))
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Result<&mut T> {
        self.entities
            .get_mut(&id)
            .ok_or(RulesError::ObjectNotFound(id.as_u32()))
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Remove an object. Only tokens and emblems are ever removed; cards
    /// persist for the whole game.
    pub fn remove(&mut self, id: ObjectId) -> Option<T> {
        self.entities.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ObjectId, &T)> {
        self.entities.iter()
    }

    /// Ids in creation order, for deterministic iteration.
    pub fn ids_sorted(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self.entities.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl<T> Default for EntityStore<T> {
    fn default() -> Self {
        Self::new()
    }
}
