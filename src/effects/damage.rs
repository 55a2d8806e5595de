//! Damage and healing.

use serde::{Deserialize, Serialize};

use crate::combat::Combatant;
use crate::eval::Evaluator;
use crate::runtime::{AutomationContext, Signal};

use super::common::{is_false, scaled_dice, Higher};
use super::effect::EffectNode;
use super::results::{DamageResult, EffectResult};

/// Roll damage and apply it to the current target.
///
/// Negative damage heals, capped at max HP unless `overheal`. Dice double
/// on a critical hit unless `fixedValue` is set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Damage {
    pub damage: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub overheal: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub higher: Option<Higher>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub cantrip_scale: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub fixed_value: bool,
}

impl Damage {
    /// Create a damage effect.
    #[must_use]
    pub fn new(damage: impl Into<String>) -> Self {
        Self {
            damage: damage.into(),
            overheal: false,
            higher: None,
            cantrip_scale: false,
            fixed_value: false,
        }
    }
}

impl EffectNode for Damage {
    fn run(&self, ctx: &mut AutomationContext) -> Result<Option<EffectResult>, Signal> {
        let mut dice = scaled_dice(ctx, &self.damage, self.higher.as_ref(), self.cantrip_scale)?;
        let in_crit = ctx.in_crit() && !self.fixed_value;
        if in_crit {
            dice = dice.doubled();
        }

        let roll = ctx.roll(&dice)?;
        let amount = roll.total;
        let overheal = self.overheal;
        if let Some(target) = ctx.target_mut() {
            target.modify_hp_by_damage(amount, overheal);
        }

        let label = if in_crit { "**Damage (CRIT!)**" } else { "**Damage**" };
        ctx.queue(format!("{label}: {}", roll.display));
        ctx.set_variable("lastDamage", amount);

        Ok(Some(EffectResult::Damage(DamageResult {
            damage: amount,
            display: roll.display,
            in_crit,
        })))
    }

    fn build_str(&self, _caster: &Combatant, evaluator: &Evaluator) -> String {
        format!("{} damage", evaluator.annotate(&self.damage))
    }
}
