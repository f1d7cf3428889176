//! Game state, the event pipeline, and the turn machine

pub mod actions;
pub mod bus;
pub mod casting;
pub mod combat;
pub mod controller;
pub mod events;
pub mod game_loop;
pub mod layers;
pub mod logger;
pub mod phase;
pub mod replacements;
pub mod sba;
pub mod scripted_controller;
pub mod snapshot;
pub mod stack;
pub mod state;
pub mod triggers;

pub use combat::{CombatState, Defender};
pub use controller::{Controllers, GameStateView, PlayerAction, PlayerController};
pub use events::{GameEvent, LossReason};
pub use game_loop::{run_game, GameEndReason, GameResult};
pub use layers::Characteristics;
pub use logger::{GameLogger, OutputMode, VerbosityLevel};
pub use phase::{Phase, Step, TurnState};
pub use scripted_controller::ScriptedController;
pub use snapshot::{GameStateSnapshot, SNAPSHOT_VERSION};
pub use stack::{CastContext, StackItem};
pub use state::{GameConfig, GameState};
