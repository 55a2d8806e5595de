//! Removing the effect that triggered a button.

use serde::{Deserialize, Serialize};

use crate::combat::Combatant;
use crate::eval::Evaluator;
use crate::runtime::{AutomationContext, AutomationError, Signal};

use super::effect::EffectNode;
use super::results::{EffectResult, RemoveIEffectResult};

/// When to also remove the removed effect's parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoveParent {
    Always,
    IfNoChildren,
}

/// Remove the initiative effect whose button started this run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveIEffect {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_parent: Option<RemoveParent>,
}

impl EffectNode for RemoveIEffect {
    fn run(&self, ctx: &mut AutomationContext) -> Result<Option<EffectResult>, Signal> {
        let origin = ctx.origin_effect().ok_or_else(|| {
            AutomationError::NoEffect("No effect to remove: this automation was not run from an effect.".to_string())
        })?;
        let (name, parent) = ctx
            .roster()
            .effect(origin)
            .map(|e| (e.name.clone(), e.parent))
            .ok_or_else(|| AutomationError::NoEffect("The effect to remove no longer exists.".to_string()))?;

        ctx.roster_mut().remove_effect(origin);
        ctx.note_changed(origin.combatant);

        let removed_parent = match (self.remove_parent, parent) {
            (Some(RemoveParent::Always), Some(p)) => Some(p),
            (Some(RemoveParent::IfNoChildren), Some(p)) if ctx.roster().children_of(p).is_empty() => Some(p),
            _ => None,
        }
        .and_then(|p| {
            ctx.note_changed(p.combatant);
            ctx.roster_mut().remove_effect(p).into_iter().next()
        })
        .map(|e| e.name);

        match &removed_parent {
            Some(parent) => ctx.queue(format!("**Removed Effect**: {name}, {parent}")),
            None => ctx.queue(format!("**Removed Effect**: {name}")),
        }

        Ok(Some(EffectResult::RemoveIEffect(RemoveIEffectResult {
            removed: name,
            removed_parent,
        })))
    }

    fn build_str(&self, _caster: &Combatant, _evaluator: &Evaluator) -> String {
        "Remove effect".to_string()
    }
}
