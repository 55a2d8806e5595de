//! Results returned by effects.
//!
//! Every effect that produces something a caller may want to inspect
//! (damage dealt, whether a save passed, which effect was added) returns
//! an [`EffectResult`]. Branching effects carry their children's results,
//! so a whole run forms a result tree mirroring the effect tree.

use serde::Serialize;

use crate::core::{CombatantId, EffectRef, Value};

/// Results of a `target` effect: one entry per target iteration.
///
/// The same target appears once per repeat.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TargetResult {
    /// Target of each iteration (`None` when run against no target).
    pub targets: Vec<Option<CombatantId>>,
    /// Child results of each iteration, parallel to `targets`.
    pub results: Vec<Vec<EffectResult>>,
}

/// Result of an attack roll.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AttackResult {
    /// Attack bonus used.
    pub attack_bonus: i64,
    /// Target AC, if there was a target.
    pub ac: Option<i64>,
    /// To-hit total.
    pub total: i64,
    /// Kept d20 face.
    pub natural: Option<i64>,
    /// Advantage state (`1`, `0`, `-1`).
    pub adv: i64,
    /// Whether the attack hit.
    pub did_hit: bool,
    /// Whether the attack was a critical hit.
    pub did_crit: bool,
    /// Results of the branch that ran.
    pub children: Vec<EffectResult>,
}

/// Result of a saving throw.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SaveResult {
    /// Save DC.
    pub dc: i64,
    /// Ability key.
    pub ability: String,
    /// Save total, if a target rolled.
    pub total: Option<i64>,
    /// Kept d20 face.
    pub natural: Option<i64>,
    /// Advantage state.
    pub adv: i64,
    /// Whether the save succeeded.
    pub did_save: bool,
    /// Results of the branch that ran.
    pub children: Vec<EffectResult>,
}

/// Result of dealing damage (or healing, when negative).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DamageResult {
    /// Damage dealt.
    pub damage: i64,
    /// Rendered roll.
    pub display: String,
    /// Whether the damage was doubled for a critical hit.
    pub in_crit: bool,
}

/// Result of granting temporary hit points.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TempHpResult {
    /// Temp HP granted.
    pub amount: i64,
    /// Rendered roll.
    pub display: String,
}

/// Result of adding an initiative effect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IEffectResult {
    /// The added effect.
    pub effect: EffectRef,
    /// Name of the added effect.
    pub name: String,
    /// Names of concentration effects ended by this one.
    pub conc_conflict: Vec<String>,
}

/// Result of removing an initiative effect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RemoveIEffectResult {
    /// Name of the removed effect.
    pub removed: String,
    /// Name of the removed parent, if it was removed too.
    pub removed_parent: Option<String>,
}

/// Result of a named roll.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RollResult {
    /// Roll total.
    pub total: i64,
    /// Rendered roll.
    pub display: String,
    /// Whether the roll was hidden from narration.
    pub hidden: bool,
}

/// Result of a text effect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TextResult {
    /// The text shown.
    pub text: String,
}

/// Result of a variable assignment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SetVariableResult {
    /// The value bound.
    pub value: Value,
    /// Whether evaluation failed and the fallback was used.
    pub did_error: bool,
}

/// Result of a condition.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConditionResult {
    /// Whether the true branch ran.
    pub did_true: bool,
    /// Whether the false branch ran.
    pub did_false: bool,
    /// Whether the condition failed to evaluate.
    pub did_error: bool,
    /// Results of the branches that ran.
    pub children: Vec<EffectResult>,
}

/// Result of using a counter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct UseCounterResult {
    /// Counter used, if it was used.
    pub counter_name: Option<String>,
    /// Value left afterwards.
    pub remaining: i64,
    /// Amount actually used.
    pub used: i64,
    /// Amount requested.
    pub requested: i64,
    /// Whether the use was skipped (`-i`-style free use).
    pub skipped: bool,
}

/// Result of casting a spell from automation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CastSpellResult {
    /// Name of the spell cast.
    pub spell: String,
    /// Results of the spell's automation.
    pub children: Vec<EffectResult>,
}

/// Result of an ability check.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CheckResult {
    /// Skill or ability checked.
    pub skill: String,
    /// Check total, if a target rolled.
    pub total: Option<i64>,
    /// Kept d20 face.
    pub natural: Option<i64>,
    /// DC, if checked against one.
    pub dc: Option<i64>,
    /// Caster's contest total, if contested.
    pub contest_total: Option<i64>,
    /// Whether the check succeeded. `None` when neither branch applies.
    pub did_succeed: Option<bool>,
    /// Results of the branch that ran.
    pub children: Vec<EffectResult>,
}

/// The result of one effect.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectResult {
    Target(TargetResult),
    Attack(AttackResult),
    Save(SaveResult),
    Damage(DamageResult),
    TempHp(TempHpResult),
    IEffect(IEffectResult),
    RemoveIEffect(RemoveIEffectResult),
    Roll(RollResult),
    Text(TextResult),
    SetVariable(SetVariableResult),
    Condition(ConditionResult),
    UseCounter(UseCounterResult),
    CastSpell(CastSpellResult),
    Check(CheckResult),
}

impl EffectResult {
    /// Nested results, in order.
    #[must_use]
    pub fn children(&self) -> Vec<&EffectResult> {
        match self {
            EffectResult::Target(r) => r.results.iter().flatten().collect(),
            EffectResult::Attack(r) => r.children.iter().collect(),
            EffectResult::Save(r) => r.children.iter().collect(),
            EffectResult::Condition(r) => r.children.iter().collect(),
            EffectResult::CastSpell(r) => r.children.iter().collect(),
            EffectResult::Check(r) => r.children.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Total damage dealt by this result and everything under it.
    #[must_use]
    pub fn total_damage(&self) -> i64 {
        match self {
            EffectResult::Damage(r) => r.damage,
            other => other
                .children()
                .into_iter()
                .map(EffectResult::total_damage)
                .fold(0, i64::saturating_add),
        }
    }
}

/// The result of a whole automation run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AutomationResult {
    /// Top-level results.
    pub children: Vec<EffectResult>,
    /// Whether the run cast a spell.
    pub is_spell: bool,
    /// Whether the caster's state changed and should be saved.
    pub caster_needs_commit: bool,
}

impl AutomationResult {
    /// Total damage dealt by the run.
    #[must_use]
    pub fn total_damage(&self) -> i64 {
        self.children
            .iter()
            .map(EffectResult::total_damage)
            .fold(0, i64::saturating_add)
    }
}
