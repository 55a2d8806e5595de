//! Runtime values for automation variables.
//!
//! Everything an expression can evaluate to, and everything a variable
//! binding can hold, is a `Value`.
//!
//! ## Value Types
//!
//! - `Int`: Numbers (roll totals, damage, DCs)
//! - `Bool`: Flags (`lastAttackDidHit`)
//! - `Str`: Text (names, ability keys)
//! - `Effect`: A reference to an initiative effect (`save_as` bindings)
//! - `None`: Absence of a value

use serde::{Deserialize, Serialize};

use super::EffectRef;

/// A value bound to a name during automation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// Integer value.
    Int(i64),
    /// Boolean flag.
    Bool(bool),
    /// Text value.
    Str(String),
    /// Reference to an initiative effect.
    Effect(EffectRef),
    /// No value.
    #[default]
    None,
}

impl Value {
    /// Get as integer. Booleans coerce to 0/1.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Get as bool if this is a Bool value.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as string reference if this is a Str value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get the effect reference if this is an Effect value.
    #[must_use]
    pub fn as_effect(&self) -> Option<EffectRef> {
        match self {
            Value::Effect(r) => Some(*r),
            _ => None,
        }
    }

    /// Truthiness with the usual scripting rules: zero, empty and None are false.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(v) => *v != 0,
            Value::Bool(b) => *b,
            Value::Str(s) => !s.is_empty(),
            Value::Effect(_) => true,
            Value::None => false,
        }
    }

    /// Name of the value's type, for error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::Str(_) => "str",
            Value::Effect(_) => "effect",
            Value::None => "None",
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Str(s) => f.write_str(s),
            Value::Effect(r) => write!(f, "{r}"),
            Value::None => f.write_str("None"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<EffectRef> for Value {
    fn from(v: EffectRef) -> Self {
        Value::Effect(v)
    }
}
