//! Temporary hit points.

use serde::{Deserialize, Serialize};

use crate::combat::Combatant;
use crate::eval::Evaluator;
use crate::runtime::{AutomationContext, Signal};

use super::common::{is_false, scaled_dice, Higher};
use super::effect::EffectNode;
use super::results::{EffectResult, TempHpResult};

/// Set the current target's temporary hit points.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TempHp {
    pub amount: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub higher: Option<Higher>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub cantrip_scale: bool,
}

impl TempHp {
    /// Create a temp HP effect.
    #[must_use]
    pub fn new(amount: impl Into<String>) -> Self {
        Self {
            amount: amount.into(),
            higher: None,
            cantrip_scale: false,
        }
    }
}

impl EffectNode for TempHp {
    fn run(&self, ctx: &mut AutomationContext) -> Result<Option<EffectResult>, Signal> {
        let dice = scaled_dice(ctx, &self.amount, self.higher.as_ref(), self.cantrip_scale)?;
        let roll = ctx.roll(&dice)?;
        let amount = roll.total.max(0);
        if let Some(target) = ctx.target_mut() {
            target.temp_hp = amount;
        }

        ctx.queue(format!("**THP**: {}", roll.display));
        ctx.set_variable("lastTempHp", amount);

        Ok(Some(EffectResult::TempHp(TempHpResult {
            amount,
            display: roll.display,
        })))
    }

    fn build_str(&self, _caster: &Combatant, evaluator: &Evaluator) -> String {
        format!("{} temp HP", evaluator.annotate(&self.amount))
    }
}
