//! MTG rules engine
//!
//! A rules runtime for Magic: The Gathering built around an event pipeline
//! (replacement effects, atomic mutation, triggers, state-based actions),
//! a seven-layer continuous-effect evaluator, the stack and priority system,
//! and a casting pipeline. Card definitions are consumed as structured data;
//! there is no text parsing, persistence, or UI in this crate.

pub mod core;
pub mod error;
pub mod game;
pub mod zones;

pub use error::{Result, RulesError};
