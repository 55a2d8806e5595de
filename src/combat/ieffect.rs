//! Initiative effects - timed conditions attached to combatants.
//!
//! Automation creates these (Bless, Hunter's Mark, Prone) and removes them.
//! An effect may carry passive numeric modifiers, buttons that run their own
//! automation later, and a parent link (concentration effects own the
//! effects they created on other combatants).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::{EffectRef, IEffectId};
use crate::effects::Effect;

/// A button on an initiative effect that runs its own automation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EffectButton {
    /// Button label.
    pub label: String,
    /// Automation executed when the button is pressed.
    pub automation: Vec<Effect>,
}

/// An effect attached to a combatant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InitiativeEffect {
    /// ID within the owning combatant.
    pub id: IEffectId,

    /// Display name.
    pub name: String,

    /// Duration in rounds. `None` lasts until removed.
    pub duration: Option<i64>,

    /// Rounds left. Mirrors `duration` when created.
    pub remaining: Option<i64>,

    /// Passive numeric modifiers (`ac_bonus`, `save_bonus`, `check_bonus`,
    /// `attack_bonus`, ...).
    #[serde(default)]
    pub passive: BTreeMap<String, i64>,

    /// Buttons offered while the effect is active.
    #[serde(default)]
    pub buttons: Vec<EffectButton>,

    /// Whether this is a concentration effect.
    #[serde(default)]
    pub concentration: bool,

    /// Whether the effect ends at the end of the turn instead of the start.
    #[serde(default)]
    pub end_on_turn_end: bool,

    /// Free-form description.
    pub description: Option<String>,

    /// Owning effect, if this effect was created under another.
    pub parent: Option<EffectRef>,
}

impl InitiativeEffect {
    /// Create an indefinite effect with no modifiers.
    ///
    /// The ID is assigned when the effect is attached to a combatant.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: IEffectId::new(0),
            name: name.into(),
            duration: None,
            remaining: None,
            passive: BTreeMap::new(),
            buttons: Vec::new(),
            concentration: false,
            end_on_turn_end: false,
            description: None,
            parent: None,
        }
    }

    /// Set the duration in rounds (builder pattern).
    #[must_use]
    pub fn with_duration(mut self, rounds: i64) -> Self {
        self.duration = Some(rounds);
        self.remaining = Some(rounds);
        self
    }

    /// Add a passive modifier (builder pattern).
    #[must_use]
    pub fn with_passive(mut self, key: impl Into<String>, value: i64) -> Self {
        self.passive.insert(key.into(), value);
        self
    }

    /// Mark as concentration (builder pattern).
    #[must_use]
    pub fn with_concentration(mut self) -> Self {
        self.concentration = true;
        self
    }

    /// Set the parent effect (builder pattern).
    #[must_use]
    pub fn with_parent(mut self, parent: EffectRef) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Short display form, e.g. `Bless [10 rounds]`.
    #[must_use]
    pub fn short_str(&self) -> String {
        let mut out = self.name.clone();
        match self.remaining {
            Some(1) => out.push_str(" [1 round]"),
            Some(n) if n >= 0 => out.push_str(&format!(" [{n} rounds]")),
            _ => {}
        }
        if self.concentration {
            out.push_str(" <C>");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_str() {
        let bless = InitiativeEffect::new("Bless").with_duration(10).with_concentration();
        assert_eq!(bless.short_str(), "Bless [10 rounds] <C>");
        assert_eq!(InitiativeEffect::new("Prone").short_str(), "Prone");
        assert_eq!(InitiativeEffect::new("Hex").with_duration(1).short_str(), "Hex [1 round]");
    }
}
