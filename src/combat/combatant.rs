//! Combatants - runtime creature state.
//!
//! A `Combatant` is anything automation can act as or on: a player
//! character, a monster, a summoned creature. It tracks hit points, armor
//! class, generic stat bonuses, limited-use counters, spellcasting data and
//! the initiative effects currently attached to it.
//!
//! ## Stats (i64 only)
//!
//! `stats` is a flat `FxHashMap<String, i64>`. Conventions:
//! - `{ability}Save`: saving throw bonus (`dexSave`, `wisSave`)
//! - skill names: check bonus (`athletics`, `perception`)
//! - anything else is exposed to expressions as a builtin name
//!   (`strengthMod`, `level`)

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ieffect::InitiativeEffect;
use crate::core::{CombatantId, IEffectId};

/// Errors when using a counter.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CounterError {
    /// Using would drop below the minimum.
    #[error("You do not have enough remaining uses of {name}.")]
    Underflow { name: String },
    /// Restoring would exceed the maximum.
    #[error("{name} cannot be restored above its maximum.")]
    Overflow { name: String },
}

/// A limited-use resource (Ki, Channel Divinity, spell slots).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Counter {
    /// Current value.
    pub value: i64,
    /// Upper bound, if any.
    pub max: Option<i64>,
    /// Lower bound.
    #[serde(default)]
    pub min: i64,
}

impl Counter {
    /// Create a full counter with a maximum.
    #[must_use]
    pub fn new(max: i64) -> Self {
        Self {
            value: max,
            max: Some(max),
            min: 0,
        }
    }

    /// Use `amount` (negative restores).
    ///
    /// Out-of-bounds results fail unless `allow_overflow`, in which case the
    /// value is clamped. Returns the amount actually applied.
    pub fn apply(&mut self, name: &str, amount: i64, allow_overflow: bool) -> Result<i64, CounterError> {
        let target = self.value.saturating_sub(amount);
        let clamped = match self.max {
            Some(max) => target.clamp(self.min, max.max(self.min)),
            None => target.max(self.min),
        };

        if clamped != target && !allow_overflow {
            return Err(if target < self.min {
                CounterError::Underflow {
                    name: name.to_string(),
                }
            } else {
                CounterError::Overflow {
                    name: name.to_string(),
                }
            });
        }

        let used = self.value.saturating_sub(clamped);
        self.value = clamped;
        Ok(used)
    }
}

/// Spellcasting data for a combatant.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Spellbook {
    /// Spell save DC, if the combatant casts spells.
    pub dc: Option<i64>,
    /// Spell attack bonus, if the combatant casts spells.
    pub attack_bonus: Option<i64>,
    /// Spellcasting ability modifier.
    pub casting_mod: i64,
    /// Caster level (cantrip scaling).
    pub caster_level: i64,
    /// Spell slots by level.
    #[serde(default)]
    pub slots: BTreeMap<u8, Counter>,
}

/// A creature taking part in combat.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Combatant {
    /// Roster-assigned ID. Zero until added to a roster.
    pub id: CombatantId,

    /// Display name.
    pub name: String,

    /// Identity of whoever controls this combatant (a user ID), if any.
    pub controller: Option<u64>,

    /// Current hit points.
    pub hp: i64,

    /// Maximum hit points.
    pub max_hp: i64,

    /// Temporary hit points.
    pub temp_hp: i64,

    /// Base armor class (passive effect bonuses apply on top).
    pub ac: i64,

    /// Generic stat bonuses and builtins.
    #[serde(default)]
    pub stats: FxHashMap<String, i64>,

    /// Limited-use counters by name.
    #[serde(default)]
    pub counters: FxHashMap<String, Counter>,

    /// Spellcasting data.
    #[serde(default)]
    pub spellbook: Spellbook,

    /// Initiative effects attached to this combatant.
    #[serde(default)]
    pub effects: Vec<InitiativeEffect>,

    #[serde(default)]
    next_effect_id: u32,
}

impl Combatant {
    /// Create a combatant with 1 HP and AC 10.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: CombatantId::new(0),
            name: name.into(),
            controller: None,
            hp: 1,
            max_hp: 1,
            temp_hp: 0,
            ac: 10,
            stats: FxHashMap::default(),
            counters: FxHashMap::default(),
            spellbook: Spellbook::default(),
            effects: Vec::new(),
            next_effect_id: 0,
        }
    }

    /// Set current and maximum HP (builder pattern).
    #[must_use]
    pub fn with_hp(mut self, hp: i64, max_hp: i64) -> Self {
        self.hp = hp;
        self.max_hp = max_hp;
        self
    }

    /// Set armor class (builder pattern).
    #[must_use]
    pub fn with_ac(mut self, ac: i64) -> Self {
        self.ac = ac;
        self
    }

    /// Set a stat (builder pattern).
    #[must_use]
    pub fn with_stat(mut self, key: impl Into<String>, value: i64) -> Self {
        self.stats.insert(key.into(), value);
        self
    }

    /// Add a counter (builder pattern).
    #[must_use]
    pub fn with_counter(mut self, name: impl Into<String>, counter: Counter) -> Self {
        self.counters.insert(name.into(), counter);
        self
    }

    /// Set spellcasting numbers (builder pattern).
    #[must_use]
    pub fn with_spellcasting(mut self, dc: i64, attack_bonus: i64, casting_mod: i64, caster_level: i64) -> Self {
        self.spellbook.dc = Some(dc);
        self.spellbook.attack_bonus = Some(attack_bonus);
        self.spellbook.casting_mod = casting_mod;
        self.spellbook.caster_level = caster_level;
        self
    }

    /// Add spell slots of a level (builder pattern).
    #[must_use]
    pub fn with_slots(mut self, level: u8, count: i64) -> Self {
        self.spellbook.slots.insert(level, Counter::new(count));
        self
    }

    /// Set the controller identity (builder pattern).
    #[must_use]
    pub fn with_controller(mut self, controller: u64) -> Self {
        self.controller = Some(controller);
        self
    }

    /// Get a stat with a default.
    #[must_use]
    pub fn stat(&self, key: &str, default: i64) -> i64 {
        self.stats.get(key).copied().unwrap_or(default)
    }

    /// Proficiency bonus: the `proficiencyBonus` stat, else derived from `level`.
    #[must_use]
    pub fn proficiency_bonus(&self) -> i64 {
        self.stats
            .get("proficiencyBonus")
            .copied()
            .unwrap_or_else(|| (self.stat("level", 1).max(1) - 1) / 4 + 2)
    }

    /// Sum of one passive effect key across attached initiative effects.
    #[must_use]
    pub fn passive_total(&self, key: &str) -> i64 {
        self.effects
            .iter()
            .filter_map(|e| e.passive.get(key))
            .fold(0, |acc, v| acc.saturating_add(*v))
    }

    /// Armor class including passive `ac_bonus` effects.
    #[must_use]
    pub fn effective_ac(&self) -> i64 {
        self.ac.saturating_add(self.passive_total("ac_bonus"))
    }

    /// Saving throw bonus for an ability key (`dex`, `wis`).
    #[must_use]
    pub fn save_bonus(&self, ability: &str) -> i64 {
        self.stat(&format!("{ability}Save"), 0)
            .saturating_add(self.passive_total("save_bonus"))
    }

    /// Check bonus for a skill or ability key.
    #[must_use]
    pub fn check_bonus(&self, skill: &str) -> i64 {
        self.stat(skill, 0).saturating_add(self.passive_total("check_bonus"))
    }

    /// Whether hit points are at or below zero.
    #[must_use]
    pub fn is_down(&self) -> bool {
        self.hp <= 0
    }

    /// Apply damage: temp HP absorbs first. Negative damage heals, capped at
    /// max HP unless `overheal`.
    pub fn modify_hp_by_damage(&mut self, amount: i64, overheal: bool) {
        if amount >= 0 {
            let absorbed = amount.min(self.temp_hp);
            self.temp_hp -= absorbed;
            self.hp = self.hp.saturating_sub(amount - absorbed).max(0);
        } else {
            let healed = self.hp.saturating_sub(amount);
            self.hp = if overheal { healed } else { healed.min(self.max_hp.max(self.hp)) };
        }
    }

    /// Human-readable HP summary, e.g. `<12/20 HP; 5 temp>`.
    #[must_use]
    pub fn hp_str(&self) -> String {
        if self.temp_hp > 0 {
            format!("<{}/{} HP; {} temp>", self.hp, self.max_hp, self.temp_hp)
        } else {
            format!("<{}/{} HP>", self.hp, self.max_hp)
        }
    }

    /// Allocate an ID for a new initiative effect on this combatant.
    pub(crate) fn alloc_effect_id(&mut self) -> IEffectId {
        let id = IEffectId::new(self.next_effect_id);
        self.next_effect_id += 1;
        id
    }

    /// Find an attached effect.
    #[must_use]
    pub fn effect(&self, id: IEffectId) -> Option<&InitiativeEffect> {
        self.effects.iter().find(|e| e.id == id)
    }

    /// Find an attached effect by name (case-insensitive).
    #[must_use]
    pub fn effect_named(&self, name: &str) -> Option<&InitiativeEffect> {
        self.effects.iter().find(|e| e.name.eq_ignore_ascii_case(name))
    }
}
