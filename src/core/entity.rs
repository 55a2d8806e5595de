//! Identifiers for combat entities.
//!
//! Combatants and the initiative effects attached to them are referred to by
//! small copyable IDs rather than references. Automation contexts, variable
//! bindings and effect parent links all store these IDs, which keeps the
//! roster the single owner of combat state.
//!
//! ```
//! use effect_automation::core::{CombatantId, IEffectId, EffectRef};
//!
//! let owner = CombatantId::new(3);
//! let effect = EffectRef::new(owner, IEffectId::new(1));
//! assert_eq!(effect.combatant, owner);
//! ```

use serde::{Deserialize, Serialize};

/// Unique identifier for a combatant in a roster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CombatantId(pub u32);

impl CombatantId {
    /// Create a new combatant ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for CombatantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Combatant({})", self.0)
    }
}

/// Identifier for an initiative effect, unique within its combatant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IEffectId(pub u32);

impl IEffectId {
    /// Create a new initiative effect ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Fully-qualified reference to an initiative effect: owner plus effect ID.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EffectRef {
    /// The combatant the effect is attached to.
    pub combatant: CombatantId,
    /// The effect on that combatant.
    pub effect: IEffectId,
}

impl EffectRef {
    /// Create a new effect reference.
    #[must_use]
    pub const fn new(combatant: CombatantId, effect: IEffectId) -> Self {
        Self { combatant, effect }
    }
}

impl std::fmt::Display for EffectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Effect({}:{})", self.combatant.0, self.effect.0)
    }
}
