//! Target selection.
//!
//! A `target` effect picks combatants and runs its child effects once per
//! target (and once per repeat). Everything nested under it that acts "on
//! the target" acts on the combatant selected here.

use serde::{Deserialize, Serialize};

use crate::combat::Combatant;
use crate::core::{CombatantId, Value};
use crate::eval::Evaluator;
use crate::runtime::{build_child_str, run_children, AutomationContext, AutomationError, Signal};

use super::effect::{Effect, EffectNode};
use super::results::{EffectResult, TargetResult};

/// Which combatants a `target` effect selects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawSelector", into = "RawSelector")]
pub enum TargetSelector {
    /// Every selected target (`all`).
    All,
    /// Every selected target (`each`).
    Each,
    /// The caster.
    SelfTarget,
    /// The combatant owning the parent of the button's effect.
    Parent,
    /// Combatants owning children of the button's effect.
    Children,
    /// The Nth selected target, 1-based.
    Index(i64),
    /// Anything else. Fails when run.
    Unknown(String),
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawSelector {
    Index(i64),
    Keyword(String),
}

impl From<RawSelector> for TargetSelector {
    fn from(raw: RawSelector) -> Self {
        match raw {
            RawSelector::Index(n) => TargetSelector::Index(n),
            RawSelector::Keyword(k) => TargetSelector::from(k.as_str()),
        }
    }
}

impl From<TargetSelector> for RawSelector {
    fn from(selector: TargetSelector) -> Self {
        let keyword = match selector {
            TargetSelector::Index(n) => return RawSelector::Index(n),
            TargetSelector::All => "all",
            TargetSelector::Each => "each",
            TargetSelector::SelfTarget => "self",
            TargetSelector::Parent => "parent",
            TargetSelector::Children => "children",
            TargetSelector::Unknown(other) => return RawSelector::Keyword(other),
        };
        RawSelector::Keyword(keyword.to_string())
    }
}

impl From<&str> for TargetSelector {
    fn from(keyword: &str) -> Self {
        match keyword {
            "all" => TargetSelector::All,
            "each" => TargetSelector::Each,
            "self" => TargetSelector::SelfTarget,
            "parent" => TargetSelector::Parent,
            "children" => TargetSelector::Children,
            other => TargetSelector::Unknown(other.to_string()),
        }
    }
}

impl From<i64> for TargetSelector {
    fn from(n: i64) -> Self {
        TargetSelector::Index(n)
    }
}

/// Target ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    HpAsc,
    HpDesc,
}

/// Run child effects against selected targets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub target: TargetSelector,
    pub effects: Vec<Effect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortBy>,
}

const BUTTON_ONLY: &str = "You can only use the `self`, `parent`, or `children` target on an IEffect button.";
const ACTION_ONLY: &str = "You can only use the `self`, `each`, or numbered targets on an action.";

impl Target {
    /// Create a target effect.
    #[must_use]
    pub fn new(target: impl Into<TargetSelector>, effects: Vec<Effect>) -> Self {
        Self {
            target: target.into(),
            effects,
            sort_by: None,
        }
    }

    /// Set target ordering (builder pattern).
    #[must_use]
    pub fn with_sort(mut self, sort_by: SortBy) -> Self {
        self.sort_by = Some(sort_by);
        self
    }

    fn sorted(&self, ctx: &AutomationContext, mut targets: Vec<CombatantId>) -> Vec<CombatantId> {
        let hp = |id: &CombatantId, missing: i64| ctx.roster().get(*id).map_or(missing, |c| c.hp);
        match self.sort_by {
            Some(SortBy::HpAsc) => targets.sort_by_key(|id| hp(id, i64::MAX)),
            Some(SortBy::HpDesc) => targets.sort_by(|a, b| hp(b, i64::MIN).cmp(&hp(a, i64::MIN))),
            None => {}
        }
        targets
    }

    /// Resolve the selector into combatants.
    fn resolve(&self, ctx: &AutomationContext) -> Result<Vec<CombatantId>, AutomationError> {
        let on_button = ctx.origin_effect().is_some();
        match &self.target {
            TargetSelector::All | TargetSelector::Each => {
                if on_button {
                    return Err(AutomationError::Target(BUTTON_ONLY.to_string()));
                }
                Ok(self.sorted(ctx, ctx.targets().to_vec()))
            }
            TargetSelector::SelfTarget => Ok(vec![ctx.caster_id()]),
            TargetSelector::Index(n) => {
                if on_button {
                    return Err(AutomationError::Target(BUTTON_ONLY.to_string()));
                }
                let sorted = self.sorted(ctx, ctx.targets().to_vec());
                let picked = n
                    .checked_sub(1)
                    .and_then(|idx| usize::try_from(idx).ok())
                    .and_then(|idx| sorted.get(idx).copied());
                Ok(picked.into_iter().collect())
            }
            TargetSelector::Parent => {
                let origin = ctx
                    .origin_effect()
                    .ok_or_else(|| AutomationError::Target(ACTION_ONLY.to_string()))?;
                let parent = ctx.roster().effect(origin).and_then(|e| e.parent);
                Ok(parent
                    .map(|p| p.combatant)
                    .filter(|id| ctx.roster().get(*id).is_some())
                    .into_iter()
                    .collect())
            }
            TargetSelector::Children => {
                let origin = ctx
                    .origin_effect()
                    .ok_or_else(|| AutomationError::Target(ACTION_ONLY.to_string()))?;
                let mut owners: Vec<CombatantId> = Vec::new();
                for child in ctx.roster().children_of(origin) {
                    if !owners.contains(&child.combatant) {
                        owners.push(child.combatant);
                    }
                }
                Ok(self.sorted(ctx, owners))
            }
            TargetSelector::Unknown(keyword) => Err(AutomationError::Target(format!(
                "Invalid target supplied: '{keyword}'"
            ))),
        }
    }

    fn iteration_title(&self, iteration: u32) -> String {
        match self.effects.as_slice() {
            [only] => format!("{} {iteration}", only.kind_name()),
            _ => format!("Iteration {iteration}"),
        }
    }

    /// Run the child effects against one target, once per repeat.
    fn run_one(
        &self,
        ctx: &mut AutomationContext,
        target: Option<CombatantId>,
        index: usize,
        out: &mut TargetResult,
    ) -> Result<(), Signal> {
        ctx.set_target(target);
        let name = ctx.target().map(|c| c.name.clone());
        ctx.set_variable("target", name.clone().map_or(Value::None, Value::Str));
        ctx.set_variable("targetIndex", index as i64);
        ctx.set_variable("targetNumber", index as i64 + 1);
        ctx.set_variable("targetIteration", 1);

        let repeat = ctx.repeat();
        if repeat <= 1 {
            let results = run_children(&self.effects, ctx)?;
            out.targets.push(target);
            out.results.push(results);
            match &name {
                Some(name) => ctx.push_field(Some(name)),
                None => ctx.push_to_meta(),
            }
            return Ok(());
        }

        let mut total_damage = 0i64;
        for iteration in 1..=repeat {
            let title = self.iteration_title(iteration);
            ctx.set_variable("targetIteration", i64::from(iteration));
            if name.is_some() {
                ctx.queue(format!("\n**__{title}__**"));
            }

            let results = run_children(&self.effects, ctx)?;
            total_damage = results
                .iter()
                .map(EffectResult::total_damage)
                .fold(total_damage, i64::saturating_add);
            out.targets.push(target);
            out.results.push(results);

            if name.is_none() {
                ctx.push_field(Some(&title));
            }
        }

        match &name {
            Some(name) => {
                if total_damage != 0 {
                    ctx.queue(format!("\n**__Total Damage__**: {total_damage}"));
                }
                ctx.push_field(Some(name));
            }
            None => {
                if total_damage != 0 {
                    ctx.queue(total_damage.to_string());
                    ctx.push_field(Some("Total Damage"));
                }
            }
        }
        Ok(())
    }
}

impl EffectNode for Target {
    fn children(&self) -> Vec<&Effect> {
        self.effects.iter().collect()
    }

    fn run(&self, ctx: &mut AutomationContext) -> Result<Option<EffectResult>, Signal> {
        let previous = ctx.current_target();
        let previous_var = ctx.variable("target").cloned();

        let targets = self.resolve(ctx)?;
        let mut result = TargetResult::default();
        if targets.is_empty() {
            self.run_one(ctx, None, 0, &mut result)?;
        } else {
            for (index, target) in targets.into_iter().enumerate() {
                self.run_one(ctx, Some(target), index, &mut result)?;
            }
        }

        ctx.set_target(previous);
        match previous_var {
            Some(value) => ctx.set_variable("target", value),
            None => {
                ctx.unset_variable("target");
            }
        }
        Ok(Some(EffectResult::Target(result)))
    }

    fn build_str(&self, caster: &Combatant, evaluator: &Evaluator) -> String {
        build_child_str(&self.effects, caster, evaluator)
    }
}
