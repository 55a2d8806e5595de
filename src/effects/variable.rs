//! Variable bindings.

use serde::{Deserialize, Serialize};

use crate::combat::Combatant;
use crate::eval::Evaluator;
use crate::runtime::{AutomationContext, AutomationError, Signal};

use super::common::Higher;
use super::effect::EffectNode;
use super::results::{EffectResult, SetVariableResult};

/// Evaluate an expression and bind it to a variable.
///
/// When casting above base level, `higher` may replace the expression for
/// that level. If evaluation fails, `onError` is evaluated instead; without
/// it the failure is a recoverable error.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetVariable {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub higher: Option<Higher>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<String>,
}

impl SetVariable {
    /// Create a variable assignment.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            higher: None,
            on_error: None,
        }
    }

    /// Set the fallback expression (builder pattern).
    #[must_use]
    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.on_error = Some(fallback.into());
        self
    }
}

impl EffectNode for SetVariable {
    fn run(&self, ctx: &mut AutomationContext) -> Result<Option<EffectResult>, Signal> {
        let level_expr = match (&self.higher, ctx.cast_level()) {
            (Some(higher), Some(level)) => higher.get(&level.to_string()),
            _ => None,
        };
        let expr = level_expr.unwrap_or(&self.value);

        let (value, did_error) = match ctx.eval(expr) {
            Ok(value) => (value, false),
            Err(e) => match &self.on_error {
                Some(fallback) => (ctx.eval(fallback)?, true),
                None => {
                    return Err(AutomationError::Evaluation(format!(
                        "Error in SetVariable ({}): {e}",
                        self.name
                    ))
                    .into())
                }
            },
        };

        ctx.set_variable(self.name.clone(), value.clone());
        Ok(Some(EffectResult::SetVariable(SetVariableResult { value, did_error })))
    }

    fn build_str(&self, _caster: &Combatant, _evaluator: &Evaluator) -> String {
        String::new()
    }
}
