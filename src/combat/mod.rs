//! Combat model: combatants, initiative effects and the roster.
//!
//! ## Key Types
//!
//! - `Combatant`: HP, AC, stat bonuses, counters, spellcasting, effects
//! - `Counter`: limited-use resource with bounds
//! - `InitiativeEffect`: timed condition with passive modifiers and buttons
//! - `Roster`: owner of all combatants in an encounter

pub mod combatant;
pub mod ieffect;
pub mod roster;

pub use combatant::{Combatant, Counter, CounterError, Spellbook};
pub use ieffect::{EffectButton, InitiativeEffect};
pub use roster::Roster;
