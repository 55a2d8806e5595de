//! Ability and skill checks, optionally contested by the caster.

use serde::{Deserialize, Serialize};

use crate::combat::Combatant;
use crate::eval::Evaluator;
use crate::runtime::{build_child_str, run_children, AutomationContext, AutomationError, Signal};

use super::common::{eval_adv, eval_opt_int, preview_int, roll_d20, title_case};
use super::effect::{Effect, EffectNode};
use super::results::{CheckResult, EffectResult};

/// One skill, or a list the roller picks the best of.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AbilityList {
    One(String),
    Many(Vec<String>),
}

impl AbilityList {
    fn names(&self) -> Vec<&str> {
        match self {
            AbilityList::One(name) => vec![name.as_str()],
            AbilityList::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }

    /// The skill with the highest bonus for `who`, and that bonus.
    fn best<'a>(&'a self, who: &Combatant) -> Option<(&'a str, i64)> {
        self.names()
            .into_iter()
            .map(|name| (name, who.check_bonus(name)))
            .fold(None, |best, (name, bonus)| match best {
                Some((_, b)) if b >= bonus => best,
                _ => Some((name, bonus)),
            })
    }

    fn display(&self) -> String {
        self.names().into_iter().map(title_case).collect::<Vec<_>>().join(" or ")
    }
}

/// Who wins when a contest ties.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContestTie {
    /// The target fails.
    #[default]
    Fail,
    /// The target succeeds.
    Success,
    /// Neither branch runs.
    Neither,
}

/// The current target makes a check against a DC or the caster's roll.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Check {
    pub ability: AbilityList,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contest_ability: Option<AbilityList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dc: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub success: Vec<Effect>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fail: Vec<Effect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contest_tie: Option<ContestTie>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adv: Option<String>,
}

impl Check {
    /// A plain check of one skill.
    #[must_use]
    pub fn new(ability: impl Into<String>) -> Self {
        Self {
            ability: AbilityList::One(ability.into()),
            contest_ability: None,
            dc: None,
            success: Vec::new(),
            fail: Vec::new(),
            contest_tie: None,
            adv: None,
        }
    }

    /// Check against a DC (builder pattern).
    #[must_use]
    pub fn with_dc(mut self, dc: impl Into<String>, success: Vec<Effect>, fail: Vec<Effect>) -> Self {
        self.dc = Some(dc.into());
        self.success = success;
        self.fail = fail;
        self
    }

    /// Contest against the caster's `ability` (builder pattern).
    #[must_use]
    pub fn contested_by(mut self, ability: impl Into<String>, success: Vec<Effect>, fail: Vec<Effect>) -> Self {
        self.contest_ability = Some(AbilityList::One(ability.into()));
        self.success = success;
        self.fail = fail;
        self
    }
}

impl EffectNode for Check {
    fn children(&self) -> Vec<&Effect> {
        self.success.iter().chain(&self.fail).collect()
    }

    fn run(&self, ctx: &mut AutomationContext) -> Result<Option<EffectResult>, Signal> {
        if self.dc.is_some() && self.contest_ability.is_some() {
            return Err(AutomationError::Evaluation(
                "Check cannot have both a DC and a contested ability.".to_string(),
            )
            .into());
        }
        let dc = eval_opt_int(ctx, self.dc.as_deref())?;
        let adv = eval_adv(ctx, self.adv.as_deref())?;

        let Some((skill, bonus)) = ctx.target().and_then(|t| self.ability.best(t)) else {
            if let Some(dc) = dc {
                ctx.queue(format!("**DC**: {dc}"));
            }
            return Ok(Some(EffectResult::Check(CheckResult {
                skill: self.ability.display(),
                dc,
                ..CheckResult::default()
            })));
        };
        let skill_name = title_case(skill);

        let roll = roll_d20(ctx, adv, bonus)?;
        let contest_total = match &self.contest_ability {
            Some(contest) => {
                let best = ctx.caster().and_then(|c| contest.best(c));
                match best {
                    Some((_, caster_bonus)) => {
                        let contest_roll = roll_d20(ctx, 0, caster_bonus)?;
                        ctx.queue(format!("**Contest**: {}", contest_roll.display));
                        Some(contest_roll.total)
                    }
                    None => None,
                }
            }
            None => None,
        };

        let did_succeed = match (dc, contest_total) {
            (Some(dc), _) => Some(roll.total >= dc),
            (None, Some(contest)) if roll.total == contest => match self.contest_tie.unwrap_or_default() {
                ContestTie::Fail => Some(false),
                ContestTie::Success => Some(true),
                ContestTie::Neither => None,
            },
            (None, Some(contest)) => Some(roll.total > contest),
            (None, None) => None,
        };

        let verdict = match did_succeed {
            Some(true) => "; Success!",
            Some(false) => "; Failure!",
            None => "",
        };
        ctx.queue(format!("**{skill_name} Check**: {}{verdict}", roll.display));

        ctx.set_variable("lastCheckRollTotal", roll.total);
        ctx.set_variable("lastCheckNaturalRoll", roll.natural.unwrap_or(0));
        ctx.set_variable("lastCheckDidPass", did_succeed.unwrap_or(false));

        let children = match did_succeed {
            Some(true) => run_children(&self.success, ctx)?,
            Some(false) => run_children(&self.fail, ctx)?,
            None => Vec::new(),
        };

        Ok(Some(EffectResult::Check(CheckResult {
            skill: skill_name,
            total: Some(roll.total),
            natural: roll.natural,
            dc,
            contest_total,
            did_succeed,
            children,
        })))
    }

    fn build_str(&self, caster: &Combatant, evaluator: &Evaluator) -> String {
        let skill = self.ability.display();
        let mut out = match (&self.dc, &self.contest_ability) {
            (Some(dc), _) => {
                let dc = preview_int(evaluator, dc).map_or_else(|| dc.clone(), |n| n.to_string());
                format!("{skill} check (DC {dc})")
            }
            (None, Some(contest)) => format!("{skill} check contested by {}", contest.display()),
            (None, None) => format!("{skill} check"),
        };

        let success = build_child_str(&self.success, caster, evaluator);
        if !success.is_empty() {
            out.push_str(&format!(". Success: {success}"));
        }
        let fail = build_child_str(&self.fail, caster, evaluator);
        if !fail.is_empty() {
            out.push_str(&format!(". Fail: {fail}"));
        }
        out
    }
}
