//! Running and describing whole automation trees.
//!
//! [`run_children`] is the one place recoverable errors are caught: each
//! sibling runs in order, a failing sibling is narrated as
//! `**Error**: {message}` and the next one runs. A hard stop unwinds past it.
//!
//! [`Automation`] wraps a top-level effect list with the phase entry points:
//!
//! ```
//! use effect_automation::combat::{Combatant, Roster};
//! use effect_automation::effects::{Damage, Target};
//! use effect_automation::runtime::{Automation, AutomationContext};
//!
//! let mut roster = Roster::new();
//! let caster = roster.add(Combatant::new("Wizard"));
//! let goblin = roster.add(Combatant::new("Goblin").with_hp(7, 7));
//!
//! let automation = Automation::new(vec![
//!     Target::new("each", vec![Damage::new("3").into()]).into(),
//! ]);
//! let mut ctx = AutomationContext::new(roster, caster).with_targets([goblin]);
//! let results = automation.run(&mut ctx).unwrap();
//!
//! assert_eq!(results.len(), 1);
//! assert_eq!(ctx.roster().get(goblin).unwrap().hp, 4);
//! ```

use serde_json::Value as Json;
use tracing::{debug, info, warn};

use crate::combat::Combatant;
use crate::effects::{decode, encode, AutomationResult, DecodeError, Effect, EffectResult};
use crate::eval::Evaluator;

use super::context::AutomationContext;
use super::error::{Signal, StopExecution};

/// Run sibling effects in order, isolating recoverable errors.
///
/// A node that fails with a recoverable error contributes no result; its
/// message is added to the meta narration and its siblings still run.
pub fn run_children(effects: &[Effect], ctx: &mut AutomationContext) -> Result<Vec<EffectResult>, StopExecution> {
    let mut results = Vec::with_capacity(effects.len());
    for effect in effects {
        match effect.run(ctx) {
            Ok(Some(result)) => results.push(result),
            Ok(None) => {}
            Err(Signal::Error(e)) => {
                warn!(effect = effect.tag(), error = %e, "effect failed");
                ctx.meta_queue(format!("**Error**: {e}"));
            }
            Err(Signal::Stop(stop)) => {
                info!(effect = effect.tag(), reason = %stop.reason, "execution stopped");
                return Err(stop);
            }
        }
    }
    Ok(results)
}

/// Describe sibling effects, joining non-empty descriptions with `", "`.
#[must_use]
pub fn build_child_str(effects: &[Effect], caster: &Combatant, evaluator: &Evaluator) -> String {
    effects
        .iter()
        .map(|e| e.build_str(caster, evaluator))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A top-level automation: the effect list attached to an action or spell.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Automation {
    pub effects: Vec<Effect>,
}

impl Automation {
    /// Wrap an effect list.
    #[must_use]
    pub fn new(effects: Vec<Effect>) -> Self {
        Self { effects }
    }

    /// Decode from a JSON list of descriptors. Any bad node rejects the
    /// whole automation.
    pub fn from_json(value: &Json) -> Result<Self, DecodeError> {
        let list = value.as_array().ok_or(DecodeError::NotAList)?;
        Ok(Self::new(decode(list)?))
    }

    /// Encode to a JSON list of descriptors.
    pub fn to_json(&self) -> Result<Json, serde_json::Error> {
        Ok(Json::Array(encode(&self.effects)?))
    }

    /// Fetch everything the tree needs from the compendium.
    pub async fn preflight(&self, ctx: &mut AutomationContext) {
        debug!(effects = self.effects.len(), "preflight");
        for effect in &self.effects {
            effect.preflight(ctx).await;
        }
    }

    /// Run the tree. Narration is left in the context, including after a
    /// hard stop.
    pub fn run(&self, ctx: &mut AutomationContext) -> Result<Vec<EffectResult>, StopExecution> {
        debug!(effects = self.effects.len(), "run");
        run_children(&self.effects, ctx)
    }

    /// Preflight, then run.
    pub async fn execute(&self, ctx: &mut AutomationContext) -> Result<AutomationResult, StopExecution> {
        self.preflight(ctx).await;
        let was_spell = ctx.is_spell();
        let children = self.run(ctx)?;
        let is_spell = was_spell || children.iter().any(casts_spell);
        Ok(AutomationResult {
            children,
            is_spell,
            caster_needs_commit: ctx.caster_needs_commit(),
        })
    }

    /// Describe the tree. Never mutates anything.
    #[must_use]
    pub fn build_str(&self, caster: &Combatant, evaluator: &Evaluator) -> String {
        build_child_str(&self.effects, caster, evaluator)
    }
}

impl From<Vec<Effect>> for Automation {
    fn from(effects: Vec<Effect>) -> Self {
        Self::new(effects)
    }
}

fn casts_spell(result: &EffectResult) -> bool {
    matches!(result, EffectResult::CastSpell(_)) || result.children().into_iter().any(casts_spell)
}
