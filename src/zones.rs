//! Game zones (Library, Hand, Battlefield, etc.)

use crate::core::entity::{ObjectId, PlayerId};
use serde::{Deserialize, Serialize};

/// The zones an object can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Zone {
    Library,
    Hand,
    Battlefield,
    Stack,
    Graveyard,
    Exile,
    Command,
}

impl Zone {
    /// Zones whose contents are public to all players.
    pub fn is_public(&self) -> bool {
        !matches!(self, Zone::Library | Zone::Hand)
    }
}

/// An ordered list of object ids in one zone.
///
/// Order matters everywhere: Library order is game-relevant, and stable
/// iteration order keeps replays deterministic for the other zones too.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardZone {
    pub zone_type: Zone,
    pub owner: Option<PlayerId>,
    pub cards: Vec<ObjectId>,
}

impl CardZone {
    pub fn new(zone_type: Zone, owner: Option<PlayerId>) -> Self {
        CardZone {
            zone_type,
            owner,
            cards: Vec::new(),
        }
    }

    pub fn add(&mut self, id: ObjectId) {
        self.cards.push(id);
    }

    /// Remove preserving order of the remainder (determinism over speed).
    pub fn remove(&mut self, id: ObjectId) -> bool {
        if let Some(pos) = self.cards.iter().position(|&c| c == id) {
            self.cards.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.cards.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Top of the library is the end of the vec.
    pub fn draw_top(&mut self) -> Option<ObjectId> {
        self.cards.pop()
    }

    pub fn peek_top(&self) -> Option<ObjectId> {
        self.cards.last().copied()
    }

    pub fn add_to_bottom(&mut self, id: ObjectId) {
        self.cards.insert(0, id);
    }

    pub fn shuffle(&mut self, rng: &mut impl rand::Rng) {
        use rand::seq::SliceRandom;
        self.cards.shuffle(rng);
    }
}

/// The per-player zones. The battlefield and the stack are shared and live
/// on the game state directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerZones {
    pub library: CardZone,
    pub hand: CardZone,
    pub graveyard: CardZone,
    pub exile: CardZone,
    pub command: CardZone,
}

impl PlayerZones {
    pub fn new(player: PlayerId) -> Self {
        let owner = Some(player);
        PlayerZones {
            library: CardZone::new(Zone::Library, owner),
            hand: CardZone::new(Zone::Hand, owner),
            graveyard: CardZone::new(Zone::Graveyard, owner),
            exile: CardZone::new(Zone::Exile, owner),
            command: CardZone::new(Zone::Command, owner),
        }
    }

    pub fn get(&self, zone: Zone) -> Option<&CardZone> {
        match zone {
            Zone::Library => Some(&self.library),
            Zone::Hand => Some(&self.hand),
            Zone::Graveyard => Some(&self.graveyard),
            Zone::Exile => Some(&self.exile),
            Zone::Command => Some(&self.command),
            Zone::Battlefield | Zone::Stack => None,
        }
    }

    pub fn get_mut(&mut self, zone: Zone) -> Option<&mut CardZone> {
        match zone {
            Zone::Library => Some(&mut self.library),
            Zone::Hand => Some(&mut self.hand),
            Zone::Graveyard => Some(&mut self.graveyard),
            Zone::Exile => Some(&mut self.exile),
            Zone::Command => Some(&mut self.command),
            Zone::Battlefield | Zone::Stack => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_ops() {
        let mut zone = CardZone::new(Zone::Hand, Some(PlayerId::new(0)));
        let a = ObjectId::new(10);
        let b = ObjectId::new(11);

        zone.add(a);
        zone.add(b);
        assert_eq!(zone.len(), 2);
        assert!(zone.contains(a));

        assert!(zone.remove(a));
        assert!(!zone.remove(a));
        assert_eq!(zone.cards, vec![b]);
    }

    #[test]
    fn test_library_top() {
        let mut lib = CardZone::new(Zone::Library, Some(PlayerId::new(0)));
        let bottom = ObjectId::new(1);
        let top = ObjectId::new(2);
        lib.add(bottom);
        lib.add(top);

        assert_eq!(lib.peek_top(), Some(top));
        assert_eq!(lib.draw_top(), Some(top));
        assert_eq!(lib.draw_top(), Some(bottom));
        assert_eq!(lib.draw_top(), None);
    }

    #[test]
    fn test_player_zones_shared_excluded() {
        let zones = PlayerZones::new(PlayerId::new(1));
        assert!(zones.get(Zone::Battlefield).is_none());
        assert!(zones.get(Zone::Stack).is_none());
        assert_eq!(zones.command.zone_type, Zone::Command);
    }
}
