//! Name-bound evaluation of expressions and annotated strings.
//!
//! An `Evaluator` holds the builtin names derived from a caster (ability
//! modifiers, spell DC, caster level, ...). During a run the automation
//! context layers its variable bindings on top; when building preview text
//! the evaluator is used on its own, by shared reference only.

use rustc_hash::FxHashMap;

use crate::combat::Combatant;
use crate::core::Value;

use super::expr::{self, EvalError, NameLookup};

/// Evaluates expressions against caster builtins plus optional bindings.
#[derive(Clone, Debug, Default)]
pub struct Evaluator {
    builtins: FxHashMap<String, Value>,
}

struct Layered<'a> {
    top: Option<&'a FxHashMap<String, Value>>,
    base: &'a FxHashMap<String, Value>,
}

impl NameLookup for Layered<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.top
            .and_then(|top| top.get(name))
            .or_else(|| self.base.get(name))
            .cloned()
    }
}

impl Evaluator {
    /// Create an evaluator with no builtins.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an evaluator exposing a caster's stats as builtins.
    ///
    /// Every stat in the caster's stat map is bound under its own key, plus
    /// `name`, `hp`, `maxHp`, `ac`, `spell` (casting modifier),
    /// `casterLevel` and `proficiencyBonus`. `spellDc` and
    /// `spellAttackBonus` are bound only for spellcasters.
    #[must_use]
    pub fn for_caster(caster: &Combatant) -> Self {
        let mut builtins: FxHashMap<String, Value> = caster
            .stats
            .iter()
            .map(|(k, v)| (k.clone(), Value::Int(*v)))
            .collect();
        builtins.insert("name".to_string(), Value::Str(caster.name.clone()));
        builtins.insert("hp".to_string(), Value::Int(caster.hp));
        builtins.insert("maxHp".to_string(), Value::Int(caster.max_hp));
        builtins.insert("ac".to_string(), Value::Int(caster.ac));
        builtins.insert("spell".to_string(), Value::Int(caster.spellbook.casting_mod));
        if let Some(dc) = caster.spellbook.dc {
            builtins.insert("spellDc".to_string(), Value::Int(dc));
        }
        if let Some(bonus) = caster.spellbook.attack_bonus {
            builtins.insert("spellAttackBonus".to_string(), Value::Int(bonus));
        }
        builtins.insert("casterLevel".to_string(), Value::Int(caster.spellbook.caster_level));
        builtins.insert(
            "proficiencyBonus".to_string(),
            Value::Int(caster.proficiency_bonus()),
        );
        Self { builtins }
    }

    /// Bind an additional builtin (builder pattern).
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.builtins.insert(name.into(), value.into());
        self
    }

    /// Look up a builtin.
    #[must_use]
    pub fn builtin(&self, name: &str) -> Option<&Value> {
        self.builtins.get(name)
    }

    /// Evaluate an expression against the builtins only.
    pub fn eval(&self, src: &str) -> Result<Value, EvalError> {
        self.eval_layered(src, None)
    }

    /// Evaluate an expression with `bindings` shadowing the builtins.
    pub fn eval_with(
        &self,
        src: &str,
        bindings: &FxHashMap<String, Value>,
    ) -> Result<Value, EvalError> {
        self.eval_layered(src, Some(bindings))
    }

    fn eval_layered(
        &self,
        src: &str,
        top: Option<&FxHashMap<String, Value>>,
    ) -> Result<Value, EvalError> {
        let names = Layered {
            top,
            base: &self.builtins,
        };
        expr::parse(src)?.eval(&names)
    }

    /// Evaluate an expression that must produce an integer.
    pub fn eval_int_with(
        &self,
        src: &str,
        bindings: &FxHashMap<String, Value>,
    ) -> Result<i64, EvalError> {
        let value = self.eval_with(src, bindings)?;
        match value {
            Value::Str(s) => s.trim().parse().map_err(|_| EvalError::Call {
                name: "int".to_string(),
                reason: format!("`{s}` is not an integer"),
            }),
            other => other.as_int().ok_or(EvalError::Type {
                op: "int",
                left: other.type_name(),
                right: "int",
            }),
        }
    }

    /// Replace every `{expr}` in `text` with its evaluated value.
    pub fn transformed_str(&self, text: &str) -> Result<String, EvalError> {
        self.transform_layered(text, None)
    }

    /// Like [`Self::transformed_str`], with `bindings` shadowing the builtins.
    pub fn transformed_str_with(
        &self,
        text: &str,
        bindings: &FxHashMap<String, Value>,
    ) -> Result<String, EvalError> {
        self.transform_layered(text, Some(bindings))
    }

    fn transform_layered(
        &self,
        text: &str,
        top: Option<&FxHashMap<String, Value>>,
    ) -> Result<String, EvalError> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open..].find('}') else {
                break;
            };
            out.push_str(&rest[..open]);
            let inner = &rest[open + 1..open + close];
            out.push_str(&self.eval_layered(inner, top)?.to_string());
            rest = &rest[open + close + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Best-effort annotation for preview text: the transformed string, or
    /// the raw text when it does not evaluate.
    #[must_use]
    pub fn annotate(&self, text: &str) -> String {
        self.transformed_str(text).unwrap_or_else(|_| text.to_string())
    }
}
