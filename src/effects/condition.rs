//! Branching on an expression.

use serde::{Deserialize, Serialize};

use crate::combat::Combatant;
use crate::eval::Evaluator;
use crate::runtime::{build_child_str, run_children, AutomationContext, AutomationError, Signal};

use super::effect::{Effect, EffectNode};
use super::results::{ConditionResult, EffectResult};

/// What a condition does when its expression fails to evaluate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionErrorBehaviour {
    /// Run `onTrue`.
    True,
    /// Run `onFalse`.
    #[default]
    False,
    /// Run both branches.
    Both,
    /// Run neither branch.
    Neither,
    /// Fail with a recoverable error.
    Raise,
}

/// Branch on an expression.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub condition: String,
    pub on_true: Vec<Effect>,
    pub on_false: Vec<Effect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_behaviour: Option<ConditionErrorBehaviour>,
}

impl Condition {
    /// Create a condition.
    #[must_use]
    pub fn new(condition: impl Into<String>, on_true: Vec<Effect>, on_false: Vec<Effect>) -> Self {
        Self {
            condition: condition.into(),
            on_true,
            on_false,
            error_behaviour: None,
        }
    }
}

impl EffectNode for Condition {
    fn children(&self) -> Vec<&Effect> {
        self.on_true.iter().chain(&self.on_false).collect()
    }

    fn run(&self, ctx: &mut AutomationContext) -> Result<Option<EffectResult>, Signal> {
        let (run_true, run_false, did_error) = match ctx.eval(&self.condition) {
            Ok(value) => (value.is_truthy(), !value.is_truthy(), false),
            Err(e) => match self.error_behaviour.unwrap_or_default() {
                ConditionErrorBehaviour::True => (true, false, true),
                ConditionErrorBehaviour::False => (false, true, true),
                ConditionErrorBehaviour::Both => (true, true, true),
                ConditionErrorBehaviour::Neither => (false, false, true),
                ConditionErrorBehaviour::Raise => {
                    return Err(AutomationError::Evaluation(format!("Error in Condition: {e}")).into())
                }
            },
        };

        let mut children = Vec::new();
        if run_true {
            children.extend(run_children(&self.on_true, ctx)?);
        }
        if run_false {
            children.extend(run_children(&self.on_false, ctx)?);
        }

        Ok(Some(EffectResult::Condition(ConditionResult {
            did_true: run_true,
            did_false: run_false,
            did_error,
            children,
        })))
    }

    fn build_str(&self, caster: &Combatant, evaluator: &Evaluator) -> String {
        let on_true = build_child_str(&self.on_true, caster, evaluator);
        let on_false = build_child_str(&self.on_false, caster, evaluator);
        match (on_true.is_empty(), on_false.is_empty()) {
            (false, false) => format!("{on_true} or {on_false}"),
            (false, true) => on_true,
            (true, false) => on_false,
            (true, true) => String::new(),
        }
    }
}
