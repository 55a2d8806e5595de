//! Casting a spell from automation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::combat::{Combatant, InitiativeEffect};
use crate::eval::Evaluator;
use crate::runtime::{run_children, AutomationContext, AutomationError, Signal, SpellState};

use super::common::eval_opt_int;
use super::effect::EffectNode;
use super::results::{CastSpellResult, EffectResult};

/// Cast a compendium spell: run its automation as if the caster cast it.
///
/// The spell is fetched (and its automation preflighted) during preflight.
/// Casting from inside a spell, or nesting deeper than the configured
/// maximum, is a recoverable error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastSpell {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack_bonus: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub casting_mod: Option<String>,
}

impl CastSpell {
    /// Cast a spell at its base level.
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self {
            id,
            level: None,
            dc: None,
            attack_bonus: None,
            casting_mod: None,
        }
    }

    /// Cast at a level (builder pattern).
    #[must_use]
    pub fn at_level(mut self, level: u8) -> Self {
        self.level = Some(level);
        self
    }
}

#[async_trait]
impl EffectNode for CastSpell {
    async fn preflight(&self, ctx: &mut AutomationContext) {
        if ctx.cache().has_spell(self.id) {
            return;
        }
        let spell = match ctx.compendium().spell(self.id).await {
            Ok(Some(spell)) => ctx.cache_mut().insert_spell(spell),
            Ok(None) => {
                warn!(spell = self.id, "spell not found");
                return;
            }
            Err(e) => {
                warn!(spell = self.id, error = %e, "failed to load spell");
                return;
            }
        };
        debug!(spell = %spell.name, effects = spell.automation.len(), "preflighting spell automation");
        for effect in &spell.automation {
            effect.preflight(ctx).await;
        }
    }

    fn run(&self, ctx: &mut AutomationContext) -> Result<Option<EffectResult>, Signal> {
        if ctx.is_spell() {
            return Err(AutomationError::Spell("You cannot cast a spell inside another spell.".to_string()).into());
        }
        let spell = ctx
            .cache()
            .spell(self.id)
            .ok_or_else(|| AutomationError::Spell(format!("Spell {} has not been loaded.", self.id)))?;

        let mut state = SpellState::new(spell.clone()).at_level(self.level.unwrap_or(spell.level));
        state.dc = eval_opt_int(ctx, self.dc.as_deref())?;
        state.attack_bonus = eval_opt_int(ctx, self.attack_bonus.as_deref())?;
        state.casting_mod = eval_opt_int(ctx, self.casting_mod.as_deref())?;
        let casting_mod = state.casting_mod;

        ctx.enter()?;
        let previous_spell = ctx.set_spell(Some(state));
        let previous_mod = match casting_mod {
            Some(m) => {
                let prev = ctx.unset_variable("spell");
                ctx.set_variable("spell", m);
                Some(prev)
            }
            None => None,
        };
        let previous_conc = ctx.conc_effect();
        if spell.concentration {
            let caster = ctx.caster_id();
            if let Some(old) = ctx.roster().concentration_of(caster) {
                ctx.roster_mut().remove_effect(old);
            }
            let conc = InitiativeEffect::new(spell.name.clone()).with_concentration();
            let added = ctx.roster_mut().add_effect(caster, conc);
            ctx.note_changed(caster);
            ctx.set_conc_effect(added);
        }

        ctx.queue(format!("**Cast {}**", spell.name));
        let children = run_children(&spell.automation, ctx);

        ctx.set_conc_effect(previous_conc);
        match previous_mod {
            Some(Some(prev)) => ctx.set_variable("spell", prev),
            Some(None) => {
                ctx.unset_variable("spell");
            }
            None => {}
        }
        ctx.set_spell(previous_spell);
        ctx.exit();

        Ok(Some(EffectResult::CastSpell(CastSpellResult {
            spell: spell.name.clone(),
            children: children?,
        })))
    }

    fn build_str(&self, _caster: &Combatant, _evaluator: &Evaluator) -> String {
        match self.level {
            Some(level) => format!("Casts spell {} at level {level}", self.id),
            None => format!("Casts spell {}", self.id),
        }
    }
}
