//! Execution runtime: context, signals, narration and the interpreter.
//!
//! - [`AutomationContext`]: the mutable state one run works on
//! - [`Signal`]: recoverable [`AutomationError`] or hard [`StopExecution`]
//! - [`Narration`]: queued output lines and fields
//! - [`Compendium`]: async source of spells and entity text
//! - [`Automation`]: top-level entry points (`preflight`, `run`, `execute`)

mod compendium;
mod context;
mod error;
mod interpreter;
mod narration;

pub use compendium::{Compendium, CompendiumError, EntityRef, MemoryCompendium, Spell};
pub use context::{AutomationContext, PreflightCache, SpellState};
pub use error::{AutomationError, Signal, StopExecution};
pub use interpreter::{build_child_str, run_children, Automation};
pub use narration::{Narration, NarrationField};
