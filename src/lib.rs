//! # effect-automation
//!
//! A tree-structured effect interpreter for tabletop combat automation.
//!
//! Authored automation (an attack that deals damage on hit, a spell that
//! forces a save and attaches an effect on failure) is stored as a JSON
//! tree of typed effect nodes. This crate decodes that tree, runs it
//! against a roster of combatants, and describes it in plain text.
//!
//! ## Design Principles
//!
//! 1. **Closed Node Taxonomy**: Every node is one of a fixed set of
//!    variants. Unknown tags fail the whole decode; nothing partially runs.
//!
//! 2. **Two Phases**: An async preflight fetches compendium data, then a
//!    synchronous run mutates state. The run never awaits.
//!
//! 3. **Fail Soft, Stop Hard**: A recoverable error in one node is narrated
//!    and its siblings keep running. A hard stop ends the run.
//!
//! 4. **Pure Preview**: `build_str` only sees the caster and a read-only
//!    evaluator, so describing a tree cannot change anything.
//!
//! ## Modules
//!
//! - `core`: IDs, values, configuration, dice RNG
//! - `eval`: Expression evaluator and dice parser
//! - `combat`: Combatants, counters, initiative effects, the roster
//! - `effects`: Effect node types, decoding and results
//! - `runtime`: Context, signals, narration, compendium, interpreter

pub mod combat;
pub mod core;
pub mod effects;
pub mod eval;
pub mod runtime;

pub use crate::core::{AutomationConfig, CombatantId, DiceRng, EffectRef, IEffectId, Value};

pub use crate::eval::{DiceExpr, Evaluator};

pub use crate::combat::{Combatant, Counter, InitiativeEffect, Roster};

pub use crate::effects::{decode, encode, AutomationResult, DecodeError, Effect, EffectKind, EffectNode, EffectResult};

pub use crate::runtime::{
    Automation, AutomationContext, AutomationError, Compendium, MemoryCompendium, Signal, StopExecution,
};
