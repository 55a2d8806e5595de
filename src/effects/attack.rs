//! Attack rolls.

use serde::{Deserialize, Serialize};

use crate::combat::Combatant;
use crate::eval::Evaluator;
use crate::runtime::{build_child_str, run_children, AutomationContext, AutomationError, Signal};

use super::common::{eval_adv, eval_int, eval_opt_int, preview_int, roll_d20};
use super::effect::{Effect, EffectNode};
use super::results::{AttackResult, EffectResult};

/// Roll to hit the current target and run `hit` or `miss`.
///
/// A natural 20 (or anything at or above `criton`) is a critical hit; a
/// natural 1 always misses. Without a target there is no AC to beat, so
/// the attack hits unless it rolls a natural 1.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attack {
    pub hit: Vec<Effect>,
    pub miss: Vec<Effect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack_bonus: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criton: Option<String>,
}

impl Attack {
    /// Create an attack using the caster's spell attack bonus.
    #[must_use]
    pub fn new(hit: Vec<Effect>, miss: Vec<Effect>) -> Self {
        Self {
            hit,
            miss,
            attack_bonus: None,
            adv: None,
            criton: None,
        }
    }

    /// Set the attack bonus expression (builder pattern).
    #[must_use]
    pub fn with_bonus(mut self, bonus: impl Into<String>) -> Self {
        self.attack_bonus = Some(bonus.into());
        self
    }

    fn bonus(&self, ctx: &AutomationContext) -> Result<i64, AutomationError> {
        let base = match &self.attack_bonus {
            Some(expr) => eval_int(ctx, expr)?,
            None => ctx.spell_attack_bonus().ok_or_else(|| {
                AutomationError::Evaluation(
                    "No spell attack bonus found. Use the `attackBonus` field to specify one."
                        .to_string(),
                )
            })?,
        };
        Ok(base.saturating_add(ctx.caster().map_or(0, |c| c.passive_total("attack_bonus"))))
    }
}

impl EffectNode for Attack {
    fn children(&self) -> Vec<&Effect> {
        self.hit.iter().chain(&self.miss).collect()
    }

    fn run(&self, ctx: &mut AutomationContext) -> Result<Option<EffectResult>, Signal> {
        let bonus = self.bonus(ctx)?;
        let adv = eval_adv(ctx, self.adv.as_deref())?;
        let criton = eval_opt_int(ctx, self.criton.as_deref())?.unwrap_or(20);
        let ac = ctx.target().map(Combatant::effective_ac);

        let roll = roll_d20(ctx, adv, bonus)?;
        let natural = roll.natural.unwrap_or(0);
        let did_crit = natural >= criton;
        let did_hit = natural != 1 && (did_crit || ac.map_or(true, |ac| roll.total >= ac));

        let verdict = match (did_crit, did_hit) {
            (true, _) => "; **CRIT!**",
            (false, true) if ac.is_some() => "; **HIT**",
            (false, true) => "",
            (false, false) => "; **MISS**",
        };
        ctx.queue(format!("**To Hit**: {}{verdict}", roll.display));

        ctx.set_variable("lastAttackDidHit", did_hit);
        ctx.set_variable("lastAttackDidCrit", did_crit);
        ctx.set_variable("lastAttackRollTotal", roll.total);
        ctx.set_variable("lastAttackNaturalRoll", natural);
        ctx.set_variable("lastAttackHitBonus", bonus);

        let children = if did_hit {
            let was_crit = ctx.set_in_crit(did_crit);
            let children = run_children(&self.hit, ctx);
            ctx.set_in_crit(was_crit);
            children?
        } else {
            run_children(&self.miss, ctx)?
        };

        Ok(Some(EffectResult::Attack(AttackResult {
            attack_bonus: bonus,
            ac,
            total: roll.total,
            natural: roll.natural,
            adv,
            did_hit,
            did_crit,
            children,
        })))
    }

    fn build_str(&self, caster: &Combatant, evaluator: &Evaluator) -> String {
        let bonus = match &self.attack_bonus {
            Some(expr) => Some(
                preview_int(evaluator, expr).map_or_else(|| expr.clone(), |n| format!("{n:+}")),
            ),
            None => caster.spellbook.attack_bonus.map(|n| format!("{n:+}")),
        };
        let mut out = match bonus {
            Some(bonus) => format!("Attack: {bonus} to hit"),
            None => "Attack".to_string(),
        };

        let hit = build_child_str(&self.hit, caster, evaluator);
        if !hit.is_empty() {
            out.push_str(&format!(". Hit: {hit}"));
        }
        let miss = build_child_str(&self.miss, caster, evaluator);
        if !miss.is_empty() {
            out.push_str(&format!(". Miss: {miss}"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::Damage;

    #[test]
    fn test_build_str() {
        let caster = Combatant::new("Fighter").with_stat("strengthMod", 3);
        let evaluator = Evaluator::for_caster(&caster);
        let attack = Attack::new(vec![Damage::new("1d8+{strengthMod}").into()], Vec::new())
            .with_bonus("strengthMod + 2");
        assert_eq!(attack.build_str(&caster, &evaluator), "Attack: +5 to hit. Hit: 1d8+3 damage");
    }

    #[test]
    fn test_build_str_without_bonus() {
        let caster = Combatant::new("Commoner");
        let attack = Attack::new(Vec::new(), Vec::new());
        assert_eq!(attack.build_str(&caster, &Evaluator::new()), "Attack");
    }
}
