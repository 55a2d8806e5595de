//! Combat roster.
//!
//! The `Roster` owns every combatant in an encounter, in initiative order,
//! and is the single owner of their initiative effects. Automation refers
//! to combatants and effects through `CombatantId` / `EffectRef` and goes
//! through the roster to read or mutate them.
//!
//! Combatants are stored in an `im` persistent vector so `snapshot()` is
//! O(1). Automation runs are not transactional; a caller that wants to undo
//! an action keeps a snapshot taken before the run.
//!
//! ```
//! use effect_automation::combat::{Combatant, Roster};
//!
//! let mut roster = Roster::new();
//! let orc = roster.add(Combatant::new("Orc").with_hp(15, 15));
//!
//! let before = roster.snapshot();
//! roster.get_mut(orc).unwrap().hp = 3;
//!
//! assert_eq!(before.get(orc).unwrap().hp, 15);
//! assert_eq!(roster.get(orc).unwrap().hp, 3);
//! ```

use im::Vector;
use serde::{Deserialize, Serialize};

use super::combatant::Combatant;
use super::ieffect::InitiativeEffect;
use crate::core::{CombatantId, EffectRef};

/// All combatants in an encounter.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Roster {
    combatants: Vector<Combatant>,
    next_id: u32,
}

impl Roster {
    /// Create an empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a combatant at the end of initiative order. Returns its ID.
    pub fn add(&mut self, mut combatant: Combatant) -> CombatantId {
        let id = CombatantId::new(self.next_id);
        self.next_id += 1;
        combatant.id = id;
        self.combatants.push_back(combatant);
        id
    }

    /// O(1) copy of the roster.
    #[must_use]
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// Number of combatants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.combatants.len()
    }

    /// Whether the roster is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.combatants.is_empty()
    }

    fn index_of(&self, id: CombatantId) -> Option<usize> {
        self.combatants.iter().position(|c| c.id == id)
    }

    /// Get a combatant.
    #[must_use]
    pub fn get(&self, id: CombatantId) -> Option<&Combatant> {
        self.combatants.iter().find(|c| c.id == id)
    }

    /// Get a combatant mutably.
    pub fn get_mut(&mut self, id: CombatantId) -> Option<&mut Combatant> {
        let idx = self.index_of(id)?;
        self.combatants.get_mut(idx)
    }

    /// Find a combatant by name (case-insensitive).
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&Combatant> {
        self.combatants.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Iterate in initiative order.
    pub fn iter(&self) -> impl Iterator<Item = &Combatant> {
        self.combatants.iter()
    }

    /// Look up an initiative effect.
    #[must_use]
    pub fn effect(&self, r: EffectRef) -> Option<&InitiativeEffect> {
        self.get(r.combatant)?.effect(r.effect)
    }

    /// Attach an effect to a combatant, assigning its ID.
    ///
    /// Returns `None` if the combatant does not exist.
    pub fn add_effect(&mut self, target: CombatantId, mut effect: InitiativeEffect) -> Option<EffectRef> {
        let combatant = self.get_mut(target)?;
        effect.id = combatant.alloc_effect_id();
        let r = EffectRef::new(target, effect.id);
        combatant.effects.push(effect);
        Some(r)
    }

    /// Effects whose parent is `parent`.
    #[must_use]
    pub fn children_of(&self, parent: EffectRef) -> Vec<EffectRef> {
        self.combatants
            .iter()
            .flat_map(|c| {
                c.effects
                    .iter()
                    .filter(move |e| e.parent == Some(parent))
                    .map(move |e| EffectRef::new(c.id, e.id))
            })
            .collect()
    }

    /// The concentration effect a combatant is maintaining, if any.
    #[must_use]
    pub fn concentration_of(&self, caster: CombatantId) -> Option<EffectRef> {
        let combatant = self.get(caster)?;
        combatant
            .effects
            .iter()
            .find(|e| e.concentration)
            .map(|e| EffectRef::new(caster, e.id))
    }

    /// Remove an effect and, recursively, every effect parented to it.
    ///
    /// Returns the removed effects, the requested one first.
    pub fn remove_effect(&mut self, r: EffectRef) -> Vec<InitiativeEffect> {
        let mut removed = Vec::new();
        let Some(combatant) = self.get_mut(r.combatant) else {
            return removed;
        };
        let Some(pos) = combatant.effects.iter().position(|e| e.id == r.effect) else {
            return removed;
        };
        removed.push(combatant.effects.remove(pos));

        for child in self.children_of(r) {
            removed.extend(self.remove_effect(child));
        }
        removed
    }
}
