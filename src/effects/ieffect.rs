//! Adding initiative effects.
//!
//! Two tags share one implementation:
//!
//! - `ieffect2`: structured passive effects (`{"ac_bonus": "2"}`), buttons,
//!   parent links and `save_as`.
//! - `ieffect` (legacy): passive effects written as an argument string
//!   (`"-ac 2 -sb 1"`). Kept so old automation still decodes and runs.
//!
//! ## Concentration
//!
//! An effect with `conc` ends every other concentration effect on its
//! combatant (and everything parented to them). The first concentration
//! effect created in a run becomes the run's concentration effect; later
//! effects in the same run are parented to it, so ending concentration
//! removes them too.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::combat::{Combatant, EffectButton, InitiativeEffect};
use crate::core::{CombatantId, EffectRef, Value};
use crate::eval::Evaluator;
use crate::runtime::{AutomationContext, AutomationError, Signal};

use super::common::{eval_int, is_false, IntExpr};
use super::effect::{Effect, EffectNode};
use super::results::{EffectResult, IEffectResult};

/// A button offered by an added effect.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ButtonSpec {
    pub label: String,
    pub automation: Vec<Effect>,
}

/// Add an initiative effect to the current target (`ieffect2`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IEffect {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<IntExpr>,
    /// Passive effect key to integer expression.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub effects: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<ButtonSpec>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub end: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub conc: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub stacking: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_as: Option<String>,
    /// Name of a variable holding the parent effect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub target_self: bool,
}

impl IEffect {
    /// Create an indefinite effect with no passive effects.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            duration: None,
            effects: BTreeMap::new(),
            buttons: Vec::new(),
            end: false,
            conc: false,
            desc: None,
            stacking: false,
            save_as: None,
            parent: None,
            target_self: false,
        }
    }

    /// Set the duration (builder pattern).
    #[must_use]
    pub fn with_duration(mut self, duration: impl Into<IntExpr>) -> Self {
        self.duration = Some(duration.into());
        self
    }

    /// Add a passive effect (builder pattern).
    #[must_use]
    pub fn with_passive(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.effects.insert(key.into(), value.into());
        self
    }

    /// Require concentration (builder pattern).
    #[must_use]
    pub fn with_concentration(mut self) -> Self {
        self.conc = true;
        self
    }

    /// Bind the new effect to a variable (builder pattern).
    #[must_use]
    pub fn saved_as(mut self, name: impl Into<String>) -> Self {
        self.save_as = Some(name.into());
        self
    }
}

/// Add an initiative effect with legacy argument-string passives (`ieffect`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LegacyIEffect {
    pub name: String,
    pub duration: IntExpr,
    pub effects: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub end: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub conc: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub stacking: bool,
}

/// Parse legacy passive arguments (`-ac 2 -sb 1`). Unknown flags and
/// malformed values are skipped.
fn parse_legacy_passives(args: &str) -> BTreeMap<String, i64> {
    let mut passives = BTreeMap::new();
    let mut words = args.split_whitespace().peekable();
    while let Some(flag) = words.next() {
        let key = match flag {
            "-ac" => "ac_bonus",
            "-sb" => "save_bonus",
            "-cb" => "check_bonus",
            "-b" => "attack_bonus",
            _ => continue,
        };
        if let Some(value) = words.peek().and_then(|w| w.parse::<i64>().ok()) {
            words.next();
            let total = passives.entry(key.to_string()).or_insert(0i64);
            *total = total.saturating_add(value);
        }
    }
    passives
}

/// Everything needed to add one effect, after evaluation.
struct Pending<'a> {
    effect: InitiativeEffect,
    stacking: bool,
    parent_var: Option<&'a str>,
    save_as: Option<&'a str>,
    target_self: bool,
}

fn eval_duration(ctx: &AutomationContext, duration: Option<&IntExpr>) -> Result<Option<i64>, AutomationError> {
    Ok(duration.map(|d| d.evaluate(ctx)).transpose()?.filter(|d| *d >= 0))
}

fn explicit_parent(ctx: &AutomationContext, var: &str) -> Result<EffectRef, AutomationError> {
    match ctx.variable(var) {
        Some(Value::Effect(r)) if ctx.roster().effect(*r).is_some() => Ok(*r),
        _ => Err(AutomationError::NoEffect(format!(
            "Could not set IEffect parent: The variable `{var}` is not an IEffect."
        ))),
    }
}

fn stacked_name(target: &Combatant, name: &str) -> String {
    let mut n = 2;
    let mut candidate = format!("{name} x{n}");
    while target.effect_named(&candidate).is_some() {
        n += 1;
        candidate = format!("{name} x{n}");
    }
    candidate
}

/// Attach the pending effect to the current target (or caster).
fn apply(ctx: &mut AutomationContext, pending: Pending<'_>) -> Result<Option<EffectResult>, Signal> {
    let Pending {
        mut effect,
        stacking,
        parent_var,
        save_as,
        target_self,
    } = pending;

    let target: Option<CombatantId> = if target_self {
        Some(ctx.caster_id())
    } else {
        ctx.current_target()
    };
    let Some(target) = target.filter(|id| ctx.roster().get(*id).is_some()) else {
        ctx.queue(format!("**Effect**: {}", effect.short_str()));
        return Ok(None);
    };

    effect.parent = match parent_var {
        Some(var) => Some(explicit_parent(ctx, var)?),
        None if !effect.concentration => ctx.conc_effect(),
        None => None,
    };

    let existing = ctx
        .roster()
        .get(target)
        .and_then(|c| c.effect_named(&effect.name).map(|e| (e.id, stacked_name(c, &effect.name))));
    if let Some((existing_id, stacked)) = existing {
        if stacking {
            effect.name = stacked;
        } else {
            ctx.roster_mut().remove_effect(EffectRef::new(target, existing_id));
        }
    }

    let mut conc_conflict = Vec::new();
    if effect.concentration {
        while let Some(old) = ctx.roster().concentration_of(target) {
            conc_conflict.extend(ctx.roster_mut().remove_effect(old).into_iter().map(|e| e.name));
        }
    }

    let display = effect.short_str();
    let name = effect.name.clone();
    let concentration = effect.concentration;
    let Some(added) = ctx.roster_mut().add_effect(target, effect) else {
        return Ok(None);
    };
    ctx.note_changed(target);

    if concentration && ctx.conc_effect().is_none() {
        ctx.set_conc_effect(Some(added));
    }
    if let Some(var) = save_as {
        ctx.set_variable(var, added);
    }
    ctx.queue(format!("**Effect**: {display}"));

    Ok(Some(EffectResult::IEffect(IEffectResult {
        effect: added,
        name,
        conc_conflict,
    })))
}

impl EffectNode for IEffect {
    fn children(&self) -> Vec<&Effect> {
        self.buttons.iter().flat_map(|b| &b.automation).collect()
    }

    fn run(&self, ctx: &mut AutomationContext) -> Result<Option<EffectResult>, Signal> {
        let mut effect = InitiativeEffect::new(ctx.transformed_str(&self.name)?);
        effect.duration = eval_duration(ctx, self.duration.as_ref())?;
        effect.remaining = effect.duration;
        for (key, expr) in &self.effects {
            effect.passive.insert(key.clone(), eval_int(ctx, expr)?);
        }
        effect.buttons = self
            .buttons
            .iter()
            .map(|b| {
                Ok(EffectButton {
                    label: ctx.transformed_str(&b.label)?,
                    automation: b.automation.clone(),
                })
            })
            .collect::<Result<_, AutomationError>>()?;
        effect.concentration = self.conc;
        effect.end_on_turn_end = self.end;
        effect.description = self.desc.as_deref().map(|d| ctx.transformed_str(d)).transpose()?;

        apply(
            ctx,
            Pending {
                effect,
                stacking: self.stacking,
                parent_var: self.parent.as_deref(),
                save_as: self.save_as.as_deref(),
                target_self: self.target_self,
            },
        )
    }

    fn build_str(&self, _caster: &Combatant, _evaluator: &Evaluator) -> String {
        format!("Effect: {}", self.name)
    }
}

impl EffectNode for LegacyIEffect {
    fn run(&self, ctx: &mut AutomationContext) -> Result<Option<EffectResult>, Signal> {
        let mut effect = InitiativeEffect::new(ctx.transformed_str(&self.name)?);
        effect.duration = eval_duration(ctx, Some(&self.duration))?;
        effect.remaining = effect.duration;
        effect.passive = parse_legacy_passives(&ctx.transformed_str(&self.effects)?);
        effect.concentration = self.conc;
        effect.end_on_turn_end = self.end;
        effect.description = self.desc.as_deref().map(|d| ctx.transformed_str(d)).transpose()?;

        apply(
            ctx,
            Pending {
                effect,
                stacking: self.stacking,
                parent_var: None,
                save_as: None,
                target_self: false,
            },
        )
    }

    fn build_str(&self, _caster: &Combatant, _evaluator: &Evaluator) -> String {
        format!("Effect: {}", self.name)
    }
}
