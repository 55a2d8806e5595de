//! Limited-use counters and spell slots.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::combat::{Combatant, Counter};
use crate::eval::Evaluator;
use crate::runtime::{AutomationContext, AutomationError, EntityRef, Signal, StopExecution};

use super::common::{eval_int, is_false, preview_int, IntExpr};
use super::effect::EffectNode;
use super::results::{EffectResult, UseCounterResult};

/// Which counter to use.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CounterRef {
    /// A named counter on the caster.
    Named(String),
    /// A spell slot level.
    Slot { slot: IntExpr },
    /// A limited-use entity, resolved to a counter name during preflight.
    Entity(EntityRef),
}

/// What happens when the counter cannot be used.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterErrorBehaviour {
    /// Narrate a warning and continue.
    #[default]
    Warn,
    /// Stop the whole run.
    Raise,
    /// Continue silently.
    Ignore,
}

/// Use (or, with a negative amount, restore) a caster counter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UseCounter {
    pub counter: CounterRef,
    pub amount: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub allow_overflow: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_behaviour: Option<CounterErrorBehaviour>,
    /// Use the counter even when the run skips counters.
    #[serde(default, skip_serializing_if = "is_false")]
    pub fixed_value: bool,
}

impl UseCounter {
    /// Use `amount` of a named counter.
    #[must_use]
    pub fn named(counter: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            counter: CounterRef::Named(counter.into()),
            amount: amount.into(),
            allow_overflow: false,
            error_behaviour: None,
            fixed_value: false,
        }
    }

    /// Set the error behaviour (builder pattern).
    #[must_use]
    pub fn with_error_behaviour(mut self, behaviour: CounterErrorBehaviour) -> Self {
        self.error_behaviour = Some(behaviour);
        self
    }

    /// The counter to use and its display name.
    fn resolve(&self, ctx: &AutomationContext) -> Result<(CounterKey, String), AutomationError> {
        let caster = ctx
            .caster()
            .ok_or_else(|| AutomationError::Counter("There is no caster to use a counter.".to_string()))?;
        let named = |name: &str| -> Result<(CounterKey, String), AutomationError> {
            caster
                .counters
                .keys()
                .find(|k| k.as_str() == name)
                .or_else(|| caster.counters.keys().find(|k| k.eq_ignore_ascii_case(name)))
                .map(|k| (CounterKey::Named(k.clone()), k.clone()))
                .ok_or_else(|| AutomationError::Counter(format!("Could not find counter `{name}`.")))
        };

        match &self.counter {
            CounterRef::Named(name) => named(name),
            CounterRef::Entity(entity) => match ctx.cache().limited_use(*entity) {
                Some(name) => named(name),
                None => Err(AutomationError::Counter(format!(
                    "Limited use {} (type {}) has not been loaded.",
                    entity.id, entity.type_id
                ))),
            },
            CounterRef::Slot { slot } => {
                let level = slot.evaluate(ctx)?;
                let level = u8::try_from(level)
                    .ok()
                    .filter(|l| caster.spellbook.slots.contains_key(l))
                    .ok_or_else(|| {
                        AutomationError::Counter(format!("There are no level {level} spell slots."))
                    })?;
                Ok((CounterKey::Slot(level), format!("Level {level} Spell Slots")))
            }
        }
    }

    fn fail(&self, ctx: &mut AutomationContext, error: AutomationError) -> Result<Option<EffectResult>, Signal> {
        match self.error_behaviour.unwrap_or_default() {
            CounterErrorBehaviour::Warn => {
                ctx.meta_queue(format!("**Warning**: {error}"));
                Ok(Some(EffectResult::UseCounter(UseCounterResult::default())))
            }
            CounterErrorBehaviour::Raise => Err(StopExecution::new(error.to_string()).into()),
            CounterErrorBehaviour::Ignore => {
                debug!(%error, "ignoring counter error");
                Ok(Some(EffectResult::UseCounter(UseCounterResult::default())))
            }
        }
    }
}

enum CounterKey {
    Named(String),
    Slot(u8),
}

fn counter_mut<'a>(caster: &'a mut Combatant, key: &CounterKey) -> Option<&'a mut Counter> {
    match key {
        CounterKey::Named(name) => caster.counters.get_mut(name),
        CounterKey::Slot(level) => caster.spellbook.slots.get_mut(level),
    }
}

#[async_trait]
impl EffectNode for UseCounter {
    async fn preflight(&self, ctx: &mut AutomationContext) {
        let &CounterRef::Entity(entity) = &self.counter else {
            return;
        };
        if ctx.cache().limited_use(entity).is_some() {
            return;
        }
        match ctx.compendium().limited_use(entity).await {
            Ok(Some(name)) => ctx.cache_mut().insert_limited_use(entity, name),
            Ok(None) => warn!(id = entity.id, type_id = entity.type_id, "limited use not found"),
            Err(e) => warn!(id = entity.id, type_id = entity.type_id, error = %e, "failed to load limited use"),
        }
    }

    fn run(&self, ctx: &mut AutomationContext) -> Result<Option<EffectResult>, Signal> {
        let requested = eval_int(ctx, &self.amount)?;
        if ctx.ignore_counters() && !self.fixed_value {
            return Ok(Some(EffectResult::UseCounter(UseCounterResult {
                requested,
                skipped: true,
                ..UseCounterResult::default()
            })));
        }

        let (key, name) = match self.resolve(ctx) {
            Ok(found) => found,
            Err(e) => return self.fail(ctx, e),
        };

        let allow_overflow = self.allow_overflow;
        let applied = ctx
            .caster_mut()
            .and_then(|caster| counter_mut(caster, &key))
            .map(|counter| {
                counter
                    .apply(&name, requested, allow_overflow)
                    .map(|used| (used, counter.value, counter.max))
            });
        let (used, remaining, max) = match applied {
            Some(Ok(state)) => state,
            Some(Err(e)) => return self.fail(ctx, AutomationError::Counter(e.to_string())),
            None => return self.fail(ctx, AutomationError::Counter(format!("Could not find counter `{name}`."))),
        };

        let shown = match max {
            Some(max) => format!("{remaining}/{max}"),
            None => remaining.to_string(),
        };
        ctx.queue(format!("**{name}**: {shown} ({:+})", -used));

        Ok(Some(EffectResult::UseCounter(UseCounterResult {
            counter_name: Some(name),
            remaining,
            used,
            requested,
            skipped: false,
        })))
    }

    fn build_str(&self, _caster: &Combatant, evaluator: &Evaluator) -> String {
        let amount = preview_int(evaluator, &self.amount)
            .map_or_else(|| self.amount.clone(), |n| n.to_string());
        let counter = match &self.counter {
            CounterRef::Named(name) => name.clone(),
            CounterRef::Slot { slot } => format!("level {} spell slot", slot.preview(evaluator)),
            CounterRef::Entity(_) => "limited use".to_string(),
        };
        format!("uses {amount} {counter}")
    }
}
