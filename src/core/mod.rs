//! Core types: identifiers, values, dice RNG, configuration.
//!
//! This module holds the small building blocks shared by the evaluator,
//! the combat model and the interpreter.

pub mod config;
pub mod entity;
pub mod rng;
pub mod value;

pub use config::AutomationConfig;
pub use entity::{CombatantId, EffectRef, IEffectId};
pub use rng::DiceRng;
pub use value::Value;
