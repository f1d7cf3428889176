//! Central game state
//!
//! `GameState` owns every object, zone, and registry. It is fully
//! serializable (the logger is transient); `game::snapshot` wraps it in a
//! versioned envelope. Controllers are never stored here, which is what
//! keeps the state serializable: the loop threads them through calls.

use crate::core::{
    CardDefinition, CardDefinitionStore, CastRestriction, CostAdjustment, CounterType,
    EntityStore, GameObject, ObjectId, PlayerId, PlayerState, Timestamp,
};
use crate::game::combat::CombatState;
use crate::game::events::PendingEvent;
use crate::game::layers::{self, CharacteristicsMap, ContinuousEffects};
use crate::game::logger::{GameLogger, VerbosityLevel};
use crate::game::phase::TurnState;
use crate::game::stack::StackItem;
use crate::zones::{CardZone, PlayerZones, Zone};
use crate::{Result, RulesError};
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::Arc;

/// Game setup knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    pub starting_life: i32,
    pub starting_hand_size: usize,
    pub max_hand_size: usize,
    /// The starting player skips their first draw step unless set.
    pub draw_on_first_turn: bool,
    /// Commander variant: command zone, tax, 21-damage loss.
    pub commander: bool,
    /// How many times an invalid controller decision is re-prompted before
    /// the action is rejected.
    pub decision_retries: u32,
    pub rng_seed: u64,
    pub verbosity: VerbosityLevel,
    /// Game loop forces a draw after this many turns.
    pub max_turns: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            starting_life: 20,
            starting_hand_size: 7,
            max_hand_size: 7,
            draw_on_first_turn: false,
            commander: false,
            decision_retries: 3,
            rng_seed: 0,
            verbosity: VerbosityLevel::default(),
            max_turns: 200,
        }
    }
}

impl GameConfig {
    pub fn commander() -> Self {
        GameConfig {
            starting_life: 40,
            commander: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub config: GameConfig,
    pub definitions: CardDefinitionStore,
    pub objects: EntityStore<GameObject>,
    pub players: Vec<PlayerState>,
    pub zones: Vec<PlayerZones>,
    pub battlefield: CardZone,
    pub stack: Vec<StackItem>,
    pub turn: TurnState,
    pub combat: Option<CombatState>,
    pub continuous: ContinuousEffects,
    /// Registered cost modifiers, applied to every cast in registration
    /// order.
    pub cost_adjustments: Vec<CostAdjustment>,
    /// Registered global casting restrictions, consulted during cast
    /// permission.
    pub cast_restrictions: Vec<CastRestriction>,

    pub(crate) event_queue: VecDeque<PendingEvent>,
    /// Set while the outermost publish drains the queue.
    pub(crate) draining: bool,

    pub rng: RefCell<ChaCha12Rng>,
    #[serde(skip)]
    pub logger: GameLogger,
    next_timestamp: u64,
}

impl GameState {
    pub fn new(config: GameConfig, player_names: &[&str]) -> Self {
        let players: Vec<PlayerState> = player_names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let mut p = PlayerState::new(PlayerId::new(i as u8), *name, config.starting_life);
                p.max_hand_size = config.max_hand_size;
                p
            })
            .collect();
        let zones = players.iter().map(|p| PlayerZones::new(p.id)).collect();
        let rng = ChaCha12Rng::seed_from_u64(config.rng_seed);
        let logger = GameLogger::with_verbosity(config.verbosity);

        GameState {
            config,
            definitions: CardDefinitionStore::new(),
            objects: EntityStore::new(),
            players,
            zones,
            battlefield: CardZone::new(Zone::Battlefield, None),
            stack: Vec::new(),
            turn: TurnState::new(PlayerId::new(0)),
            combat: None,
            continuous: ContinuousEffects::new(),
            cost_adjustments: Vec::new(),
            cast_restrictions: Vec::new(),
            event_queue: VecDeque::new(),
            draining: false,
            rng: RefCell::new(rng),
            logger,
            next_timestamp: 1,
        }
    }

    pub fn player(&self, id: PlayerId) -> Result<&PlayerState> {
        self.players
            .get(id.index())
            .ok_or_else(|| RulesError::InvariantViolation(format!("no player {id}")))
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Result<&mut PlayerState> {
        self.players
            .get_mut(id.index())
            .ok_or_else(|| RulesError::InvariantViolation(format!("no player {id}")))
    }

    pub fn player_zones(&self, id: PlayerId) -> Result<&PlayerZones> {
        self.zones
            .get(id.index())
            .ok_or_else(|| RulesError::InvariantViolation(format!("no zones for {id}")))
    }

    pub fn player_zones_mut(&mut self, id: PlayerId) -> Result<&mut PlayerZones> {
        self.zones
            .get_mut(id.index())
            .ok_or_else(|| RulesError::InvariantViolation(format!("no zones for {id}")))
    }

    /// The ordered list a given zone keeps its cards in.
    pub fn zone_list_mut(&mut self, zone: Zone, owner: PlayerId) -> Result<&mut CardZone> {
        match zone {
            Zone::Battlefield => Ok(&mut self.battlefield),
            Zone::Stack => Err(RulesError::InvariantViolation(
                "stack has no card list".to_string(),
            )),
            _ => {
                let zones = self.player_zones_mut(owner)?;
                zones.get_mut(zone).ok_or_else(|| {
                    RulesError::InvariantViolation(format!("no list for zone {zone:?}"))
                })
            }
        }
    }

    /// Players still in the game, in turn order starting with the active
    /// player (APNAP).
    pub fn apnap_order(&self) -> Vec<PlayerId> {
        let n = self.players.len();
        let start = self.turn.active_player.index();
        (0..n)
            .map(|i| PlayerId::new(((start + i) % n) as u8))
            .filter(|p| !self.players[p.index()].eliminated)
            .collect()
    }

    pub fn opponents_of(&self, player: PlayerId) -> Vec<PlayerId> {
        self.apnap_order()
            .into_iter()
            .filter(|p| *p != player)
            .collect()
    }

    pub fn next_player_after(&self, player: PlayerId) -> PlayerId {
        let n = self.players.len();
        let mut idx = (player.index() + 1) % n;
        while self.players[idx].eliminated && idx != player.index() {
            idx = (idx + 1) % n;
        }
        PlayerId::new(idx as u8)
    }

    pub fn players_remaining(&self) -> usize {
        self.players.iter().filter(|p| !p.eliminated).count()
    }

    pub fn next_timestamp(&mut self) -> Timestamp {
        let t = Timestamp::new(self.next_timestamp);
        self.next_timestamp += 1;
        t
    }

    /// Effective characteristics of every battlefield object.
    pub fn characteristics(&self) -> CharacteristicsMap {
        layers::evaluate(self)
    }

    /// Battlefield ids in deterministic order.
    pub fn battlefield_ids(&self) -> Vec<ObjectId> {
        self.battlefield.cards.clone()
    }

    // --- setup helpers -----------------------------------------------------
    // Scenario construction for tests and hosts. These bypass the event
    // pipeline: nothing here is a game action.

    /// Create a card object in the given zone.
    pub fn create_card(
        &mut self,
        def: Arc<CardDefinition>,
        owner: PlayerId,
        zone: Zone,
    ) -> Result<ObjectId> {
        if !self.definitions.contains(&def.id) {
            self.definitions.insert(def.clone())?;
        }
        let id = self.objects.next_id();
        let mut obj = GameObject::new(id, def, owner, zone);
        if zone == Zone::Battlefield {
            obj.timestamp = self.next_timestamp();
            // Setup battlefield objects count as having been controlled
            // since the turn began.
            obj.summoning_sick = false;
            seed_entry_counters(&mut obj);
            self.battlefield.add(id);
        } else {
            obj.timestamp = self.next_timestamp();
            self.zone_list_mut(zone, owner)?.add(id);
        }
        self.objects.insert(id, obj);
        Ok(id)
    }

    pub fn add_to_hand(&mut self, def: Arc<CardDefinition>, owner: PlayerId) -> Result<ObjectId> {
        self.create_card(def, owner, Zone::Hand)
    }

    pub fn add_to_battlefield(
        &mut self,
        def: Arc<CardDefinition>,
        owner: PlayerId,
    ) -> Result<ObjectId> {
        self.create_card(def, owner, Zone::Battlefield)
    }

    pub fn add_to_graveyard(
        &mut self,
        def: Arc<CardDefinition>,
        owner: PlayerId,
    ) -> Result<ObjectId> {
        self.create_card(def, owner, Zone::Graveyard)
    }

    /// Add to the top of the library (last added is drawn first).
    pub fn add_to_library(
        &mut self,
        def: Arc<CardDefinition>,
        owner: PlayerId,
    ) -> Result<ObjectId> {
        self.create_card(def, owner, Zone::Library)
    }

    /// Designate a commander; the card goes to the command zone.
    pub fn set_commander(
        &mut self,
        def: Arc<CardDefinition>,
        owner: PlayerId,
    ) -> Result<ObjectId> {
        let id = self.create_card(def, owner, Zone::Command)?;
        self.player_mut(owner)?.commander = Some(id);
        Ok(id)
    }

    /// Create a token on the battlefield from a stored definition.
    pub fn create_token(&mut self, definition: &str, controller: PlayerId) -> Result<ObjectId> {
        let def = self.definitions.get(definition)?;
        let id = self.objects.next_id();
        let mut obj = GameObject::new(id, def, controller, Zone::Battlefield);
        obj.is_token = true;
        obj.timestamp = self.next_timestamp();
        obj.summoning_sick = true;
        seed_entry_counters(&mut obj);
        self.battlefield.add(id);
        self.objects.insert(id, obj);
        Ok(id)
    }

    /// Shuffle a player's library.
    pub fn shuffle_library(&mut self, player: PlayerId) -> Result<()> {
        let mut rng = self.rng.borrow_mut();
        self.zones
            .get_mut(player.index())
            .ok_or_else(|| RulesError::InvariantViolation(format!("no zones for {player}")))?
            .library
            .shuffle(&mut *rng);
        Ok(())
    }
}

/// Planeswalkers enter with their printed loyalty, battles with their
/// printed defense.
pub(crate) fn seed_entry_counters(obj: &mut GameObject) {
    if let Some(n) = obj.def.base_loyalty {
        obj.add_counters(CounterType::loyalty(), n);
    }
    if let Some(n) = obj.def.base_defense {
        obj.add_counters(CounterType::defense(), n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CardBuilder, CardType, Supertype};

    fn forest() -> Arc<CardDefinition> {
        CardBuilder::new("forest", "Forest")
            .card_type(CardType::Land)
            .supertype(Supertype::basic())
            .build()
            .unwrap()
    }

    #[test]
    fn test_setup_and_zone_lists() {
        let mut state = GameState::new(GameConfig::default(), &["Alice", "Bob"]);
        let p0 = PlayerId::new(0);

        let in_hand = state.add_to_hand(forest(), p0).unwrap();
        let on_bf = state.add_to_battlefield(forest(), p0).unwrap();

        assert!(state.player_zones(p0).unwrap().hand.contains(in_hand));
        assert!(state.battlefield.contains(on_bf));
        assert_eq!(state.objects.get(on_bf).unwrap().zone, Zone::Battlefield);
    }

    #[test]
    fn test_apnap_order_skips_eliminated() {
        let mut state = GameState::new(GameConfig::default(), &["A", "B", "C"]);
        state.turn.active_player = PlayerId::new(1);
        state.players[2].eliminated = true;

        assert_eq!(
            state.apnap_order(),
            vec![PlayerId::new(1), PlayerId::new(0)]
        );
        assert_eq!(state.next_player_after(PlayerId::new(1)), PlayerId::new(0));
    }

    #[test]
    fn test_timestamps_increase() {
        let mut state = GameState::new(GameConfig::default(), &["A", "B"]);
        let t1 = state.next_timestamp();
        let t2 = state.next_timestamp();
        assert!(t1 < t2);
    }

    #[test]
    fn test_seeded_rng_is_deterministic() {
        let config = GameConfig {
            rng_seed: 42,
            ..Default::default()
        };
        let mut a = GameState::new(config.clone(), &["A"]);
        let mut b = GameState::new(config, &["A"]);
        for _ in 0..10 {
            a.add_to_library(forest(), PlayerId::new(0)).unwrap();
            b.add_to_library(forest(), PlayerId::new(0)).unwrap();
        }
        a.shuffle_library(PlayerId::new(0)).unwrap();
        b.shuffle_library(PlayerId::new(0)).unwrap();

        assert_eq!(
            a.player_zones(PlayerId::new(0)).unwrap().library.cards,
            b.player_zones(PlayerId::new(0)).unwrap().library.cards
        );
    }
}
