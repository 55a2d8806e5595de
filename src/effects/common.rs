//! Helpers shared by several effect variants.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::eval::dice::{cantrip_scale, d20_for};
use crate::eval::{DiceExpr, Evaluator, RollOutcome};
use crate::runtime::{AutomationContext, AutomationError};

/// Extra dice by cast level (`{"3": "1d6", "4": "2d6"}`).
pub type Higher = BTreeMap<String, String>;

/// An integer given either literally or as an expression.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntExpr {
    Int(i64),
    Expr(String),
}

impl IntExpr {
    /// Evaluate against the run context.
    pub fn evaluate(&self, ctx: &AutomationContext) -> Result<i64, AutomationError> {
        match self {
            IntExpr::Int(n) => Ok(*n),
            IntExpr::Expr(expr) => eval_int(ctx, expr),
        }
    }

    /// Best-effort value for preview text.
    #[must_use]
    pub fn preview(&self, evaluator: &Evaluator) -> String {
        match self {
            IntExpr::Int(n) => n.to_string(),
            IntExpr::Expr(expr) => preview_int(evaluator, expr)
                .map_or_else(|| expr.clone(), |n| n.to_string()),
        }
    }
}

impl From<i64> for IntExpr {
    fn from(n: i64) -> Self {
        IntExpr::Int(n)
    }
}

impl From<i32> for IntExpr {
    fn from(n: i32) -> Self {
        IntExpr::Int(i64::from(n))
    }
}

impl From<&str> for IntExpr {
    fn from(expr: &str) -> Self {
        IntExpr::Expr(expr.to_string())
    }
}

pub(crate) fn is_false(b: &bool) -> bool {
    !*b
}

/// Evaluate an annotated integer expression.
pub(crate) fn eval_int(ctx: &AutomationContext, expr: &str) -> Result<i64, AutomationError> {
    ctx.eval_int(&ctx.transformed_str(expr)?)
}

/// Evaluate an optional annotated integer expression.
pub(crate) fn eval_opt_int(
    ctx: &AutomationContext,
    expr: Option<&str>,
) -> Result<Option<i64>, AutomationError> {
    expr.map(|e| eval_int(ctx, e)).transpose()
}

/// Evaluate an integer expression for preview text, if it can be.
pub(crate) fn preview_int(evaluator: &Evaluator, expr: &str) -> Option<i64> {
    let text = evaluator.transformed_str(expr).ok()?;
    evaluator.eval(&text).ok()?.as_int()
}

/// Build the dice for a damage-like effect: annotations, higher-level
/// dice when casting above base level, then cantrip scaling.
pub(crate) fn scaled_dice(
    ctx: &AutomationContext,
    base: &str,
    higher: Option<&Higher>,
    cantrip: bool,
) -> Result<DiceExpr, AutomationError> {
    let mut text = ctx.transformed_str(base)?;
    if let (Some(higher), Some(level)) = (higher, ctx.cast_level()) {
        if let Some(extra) = higher.get(&level.to_string()) {
            text = format!("{text}+{}", ctx.transformed_str(extra)?);
        }
    }
    let mut dice = DiceExpr::parse(&text)?;
    if cantrip {
        let level = ctx.caster().map_or(0, |c| c.spellbook.caster_level);
        dice = dice.scaled(cantrip_scale(level));
    }
    Ok(dice)
}

/// Evaluate an advantage expression into `-1`, `0` or `1`.
pub(crate) fn eval_adv(ctx: &AutomationContext, adv: Option<&str>) -> Result<i64, AutomationError> {
    Ok(eval_opt_int(ctx, adv)?.unwrap_or(0).signum())
}

/// Roll a d20 with advantage state and a flat bonus.
pub(crate) fn roll_d20(ctx: &mut AutomationContext, adv: i64, bonus: i64) -> Result<RollOutcome, AutomationError> {
    let dice = DiceExpr::parse(&format!("{}{bonus:+}", d20_for(adv)))?;
    ctx.roll(&dice)
}

/// Full ability name for a save key (`dex` -> `Dexterity`).
#[must_use]
pub(crate) fn ability_name(key: &str) -> String {
    let name = match key.get(..3).map(str::to_ascii_lowercase).as_deref() {
        Some("str") => "Strength",
        Some("dex") => "Dexterity",
        Some("con") => "Constitution",
        Some("int") => "Intelligence",
        Some("wis") => "Wisdom",
        Some("cha") => "Charisma",
        _ => return title_case(key),
    };
    name.to_string()
}

/// `sleightOfHand` -> `Sleight Of Hand`, `bonus roll` -> `Bonus Roll`.
#[must_use]
pub(crate) fn title_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut word_start = true;
    for c in key.chars() {
        if c == ' ' || c == '_' {
            out.push(' ');
            word_start = true;
            continue;
        }
        if c.is_uppercase() && !out.is_empty() && !word_start {
            out.push(' ');
        }
        if word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        word_start = false;
    }
    out
}
