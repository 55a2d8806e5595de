//! Saving throws.

use serde::{Deserialize, Serialize};

use crate::combat::Combatant;
use crate::eval::Evaluator;
use crate::runtime::{build_child_str, run_children, AutomationContext, AutomationError, Signal};

use super::common::{ability_name, eval_adv, eval_int, preview_int, roll_d20};
use super::effect::{Effect, EffectNode};
use super::results::{EffectResult, SaveResult};

/// The current target rolls a save against a DC; `fail` or `success` runs.
///
/// The DC defaults to the spell's DC override, then the caster's spell DC.
/// Without a target nothing is rolled and `fail` runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Save {
    pub stat: String,
    pub fail: Vec<Effect>,
    pub success: Vec<Effect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adv: Option<String>,
}

impl Save {
    /// Create a save against the caster's spell DC.
    #[must_use]
    pub fn new(stat: impl Into<String>, fail: Vec<Effect>, success: Vec<Effect>) -> Self {
        Self {
            stat: stat.into(),
            fail,
            success,
            dc: None,
            adv: None,
        }
    }

    /// Set the DC expression (builder pattern).
    #[must_use]
    pub fn with_dc(mut self, dc: impl Into<String>) -> Self {
        self.dc = Some(dc.into());
        self
    }

    fn stat_abbr(&self) -> String {
        self.stat.chars().take(3).collect::<String>().to_uppercase()
    }
}

impl EffectNode for Save {
    fn children(&self) -> Vec<&Effect> {
        self.fail.iter().chain(&self.success).collect()
    }

    fn run(&self, ctx: &mut AutomationContext) -> Result<Option<EffectResult>, Signal> {
        let dc = match &self.dc {
            Some(expr) => eval_int(ctx, expr)?,
            None => ctx.spell_dc().ok_or_else(|| {
                AutomationError::Evaluation(
                    "No spell save DC found. Use the `dc` field to specify one.".to_string(),
                )
            })?,
        };
        let adv = eval_adv(ctx, self.adv.as_deref())?;
        let key = self.stat.chars().take(3).collect::<String>().to_lowercase();
        let ability = ability_name(&self.stat);
        let abbr = self.stat_abbr();

        let bonus = ctx.target().map(|t| t.save_bonus(&key));
        let (total, natural, did_save) = match bonus {
            Some(bonus) => {
                let roll = roll_d20(ctx, adv, bonus)?;
                let did_save = roll.total >= dc;
                let verdict = if did_save { "Success!" } else { "Failure!" };
                ctx.queue(format!("**{abbr} Save**: {}; {verdict}", roll.display));
                (Some(roll.total), roll.natural, did_save)
            }
            None => {
                ctx.queue(format!("**DC**: {dc}"));
                (None, None, false)
            }
        };

        ctx.set_variable("lastSaveDidPass", did_save);
        ctx.set_variable("lastSaveDC", dc);
        ctx.set_variable("lastSaveRollTotal", total.unwrap_or(0));
        ctx.set_variable("lastSaveNaturalRoll", natural.unwrap_or(0));
        ctx.set_variable("lastSaveAbility", ability.clone());

        let branch = if did_save { &self.success } else { &self.fail };
        let children = run_children(branch, ctx)?;

        Ok(Some(EffectResult::Save(SaveResult {
            dc,
            ability,
            total,
            natural,
            adv,
            did_save,
            children,
        })))
    }

    fn build_str(&self, caster: &Combatant, evaluator: &Evaluator) -> String {
        let dc = match &self.dc {
            Some(expr) => Some(preview_int(evaluator, expr).map_or_else(|| expr.clone(), |n| n.to_string())),
            None => caster.spellbook.dc.map(|n| n.to_string()),
        };
        let mut out = match dc {
            Some(dc) => format!("DC {dc} {} Save", self.stat_abbr()),
            None => format!("{} Save", self.stat_abbr()),
        };

        let fail = build_child_str(&self.fail, caster, evaluator);
        if !fail.is_empty() {
            out.push_str(&format!(". Fail: {fail}"));
        }
        let success = build_child_str(&self.success, caster, evaluator);
        if !success.is_empty() {
            out.push_str(&format!(". Success: {success}"));
        }
        out
    }
}
