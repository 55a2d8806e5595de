//! Named rolls bound to variables.

use serde::{Deserialize, Serialize};

use crate::combat::Combatant;
use crate::eval::Evaluator;
use crate::runtime::{AutomationContext, Signal};

use super::common::{is_false, scaled_dice, title_case, Higher};
use super::effect::EffectNode;
use super::results::{EffectResult, RollResult};

/// Roll dice and bind the total to a variable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Roll {
    pub dice: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub higher: Option<Higher>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub cantrip_scale: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub fixed_value: bool,
}

impl Roll {
    /// Create a visible roll bound to `name`.
    #[must_use]
    pub fn new(dice: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            dice: dice.into(),
            name: name.into(),
            higher: None,
            cantrip_scale: false,
            hidden: false,
            display_name: None,
            fixed_value: false,
        }
    }

    /// Hide the roll from narration (builder pattern).
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

impl EffectNode for Roll {
    fn run(&self, ctx: &mut AutomationContext) -> Result<Option<EffectResult>, Signal> {
        let mut dice = scaled_dice(ctx, &self.dice, self.higher.as_ref(), self.cantrip_scale)?;
        if ctx.in_crit() && !self.fixed_value {
            dice = dice.doubled();
        }
        let roll = ctx.roll(&dice)?;
        ctx.set_variable(self.name.clone(), roll.total);

        if !self.hidden {
            let label = self
                .display_name
                .clone()
                .unwrap_or_else(|| title_case(&self.name));
            ctx.queue(format!("**{label}**: {}", roll.display));
        }

        Ok(Some(EffectResult::Roll(RollResult {
            total: roll.total,
            display: roll.display,
            hidden: self.hidden,
        })))
    }

    fn build_str(&self, _caster: &Combatant, evaluator: &Evaluator) -> String {
        match &self.display_name {
            Some(label) => format!("{label}: {}", evaluator.annotate(&self.dice)),
            None => String::new(),
        }
    }
}
