//! Expression and dice evaluation.
//!
//! - `expr`: the small expression language used by conditions, DCs,
//!   bonuses and variable values
//! - `evaluator`: name binding (caster builtins plus run-time variables)
//!   and annotated-string transformation
//! - `dice`: dice notation parsing and rolling

pub mod dice;
pub mod evaluator;
pub mod expr;

pub use dice::{DiceError, DiceExpr, RollOutcome};
pub use evaluator::Evaluator;
pub use expr::{EvalError, NameLookup};
