//! The automation effect tree.
//!
//! An automation is a list of [`Effect`] nodes. Each node wraps one
//! [`EffectKind`] variant plus optional `meta` children that run before it.
//! Variants nest other effects (an `Attack` holds `hit` and `miss`
//! branches, a `Target` holds the effects to run per target) so a whole
//! action is one tree.
//!
//! ## Node Types
//!
//! | Tag            | Type            | Does                                  |
//! |----------------|-----------------|---------------------------------------|
//! | `target`       | [`Target`]      | Selects targets and iterates them     |
//! | `attack`       | [`Attack`]      | Rolls to hit against the target's AC  |
//! | `save`         | [`Save`]        | Target rolls a saving throw           |
//! | `damage`       | [`Damage`]      | Rolls and deals damage                |
//! | `temphp`       | [`TempHp`]      | Grants temporary hit points           |
//! | `ieffect`      | [`LegacyIEffect`] | Attaches an effect (legacy form)    |
//! | `ieffect2`     | [`IEffect`]     | Attaches an initiative effect         |
//! | `remove_ieffect` | [`RemoveIEffect`] | Removes the originating effect    |
//! | `roll`         | [`Roll`]        | Rolls dice into a variable            |
//! | `text`         | [`Text`]        | Adds a text field                     |
//! | `variable`     | [`SetVariable`] | Binds a variable                      |
//! | `condition`    | [`Condition`]   | Branches on an expression             |
//! | `counter`      | [`UseCounter`]  | Uses a counter or spell slot          |
//! | `spell`        | [`CastSpell`]   | Casts a compendium spell              |
//! | `check`        | [`Check`]       | Target makes an ability check         |
//!
//! ## Phases
//!
//! - `preflight` (async): fetch compendium data the tree needs
//! - `run`: mutate combatants and narrate
//! - `build_str`: describe the tree without side effects

mod attack;
mod check;
mod common;
mod condition;
mod counter;
mod damage;
mod effect;
mod ieffect;
mod registry;
mod remove_ieffect;
mod results;
mod roll;
mod save;
mod spell;
mod target;
mod temphp;
mod text;
mod variable;

pub use attack::Attack;
pub use check::{AbilityList, Check, ContestTie};
pub use common::{Higher, IntExpr};
pub use condition::{Condition, ConditionErrorBehaviour};
pub use counter::{CounterErrorBehaviour, CounterRef, UseCounter};
pub use damage::Damage;
pub use effect::{Effect, EffectKind, EffectNode};
pub use ieffect::{ButtonSpec, IEffect, LegacyIEffect};
pub use registry::{decode, decode_value, encode, DecodeError, TAGS};
pub use remove_ieffect::{RemoveIEffect, RemoveParent};
pub use results::{
    AttackResult, AutomationResult, CastSpellResult, CheckResult, ConditionResult, DamageResult,
    EffectResult, IEffectResult, RemoveIEffectResult, RollResult, SaveResult, SetVariableResult,
    TargetResult, TempHpResult, TextResult, UseCounterResult,
};
pub use roll::Roll;
pub use save::Save;
pub use spell::CastSpell;
pub use target::{SortBy, Target, TargetSelector};
pub use temphp::TempHp;
pub use text::{Text, TextSource};
pub use variable::SetVariable;
