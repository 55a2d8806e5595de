//! The effect tree node.
//!
//! An [`Effect`] is one typed automation primitive plus its `meta`
//! children. The variant set is closed: [`EffectKind`] has one arm per
//! registered tag, and every place that needs per-variant behavior matches
//! it exhaustively, so adding a variant is a compile error until every
//! pass handles it.
//!
//! ## Passes
//!
//! - `preflight`: async, once per node, before any `run`. The node's own
//!   work first, then its children depth-first, sequentially.
//! - `run`: synchronous. Meta children first, then the variant body.
//! - `build_str`: read-only preview text. Takes a shared caster and
//!   evaluator, never the context, so it cannot mutate run state.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use tracing::debug;

use crate::combat::Combatant;
use crate::eval::Evaluator;
use crate::runtime::{AutomationContext, Signal};

use super::attack::Attack;
use super::check::Check;
use super::condition::Condition;
use super::counter::UseCounter;
use super::damage::Damage;
use super::ieffect::{IEffect, LegacyIEffect};
use super::remove_ieffect::RemoveIEffect;
use super::results::EffectResult;
use super::roll::Roll;
use super::save::Save;
use super::spell::CastSpell;
use super::target::Target;
use super::temphp::TempHp;
use super::text::Text;
use super::variable::SetVariable;

/// Behavior every effect variant implements.
///
/// `run` and `build_str` are required; a variant without its own preview
/// text does not compile.
#[async_trait]
pub trait EffectNode: Send + Sync {
    /// Nested effects owned by the variant itself (branches, target
    /// effects). Meta children are not included.
    fn children(&self) -> Vec<&Effect> {
        Vec::new()
    }

    /// Async setup before the run: fetch external data into the context.
    ///
    /// Must not fail; problems surface when the node runs.
    async fn preflight(&self, _ctx: &mut AutomationContext) {}

    /// Execute the variant body.
    fn run(&self, ctx: &mut AutomationContext) -> Result<Option<EffectResult>, Signal>;

    /// Describe what the variant would do.
    fn build_str(&self, caster: &Combatant, evaluator: &Evaluator) -> String;
}

/// One node of an automation tree.
#[derive(Clone, Debug, PartialEq)]
pub struct Effect {
    /// The variant and its fields.
    pub kind: EffectKind,
    /// Modifier children, run before the variant body.
    pub meta: Vec<Effect>,
}

/// The closed set of effect variants.
#[derive(Clone, Debug, PartialEq)]
pub enum EffectKind {
    Target(Target),
    Attack(Attack),
    Save(Save),
    Damage(Damage),
    TempHp(TempHp),
    LegacyIEffect(LegacyIEffect),
    IEffect(IEffect),
    RemoveIEffect(RemoveIEffect),
    Roll(Roll),
    Text(Text),
    SetVariable(SetVariable),
    Condition(Condition),
    UseCounter(UseCounter),
    CastSpell(CastSpell),
    Check(Check),
}

impl EffectKind {
    /// The registry tag of this variant.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            EffectKind::Target(_) => "target",
            EffectKind::Attack(_) => "attack",
            EffectKind::Save(_) => "save",
            EffectKind::Damage(_) => "damage",
            EffectKind::TempHp(_) => "temphp",
            EffectKind::LegacyIEffect(_) => "ieffect",
            EffectKind::IEffect(_) => "ieffect2",
            EffectKind::RemoveIEffect(_) => "remove_ieffect",
            EffectKind::Roll(_) => "roll",
            EffectKind::Text(_) => "text",
            EffectKind::SetVariable(_) => "variable",
            EffectKind::Condition(_) => "condition",
            EffectKind::UseCounter(_) => "counter",
            EffectKind::CastSpell(_) => "spell",
            EffectKind::Check(_) => "check",
        }
    }

    /// Display name of the variant, used in iteration titles.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            EffectKind::Target(_) => "Target",
            EffectKind::Attack(_) => "Attack",
            EffectKind::Save(_) => "Save",
            EffectKind::Damage(_) => "Damage",
            EffectKind::TempHp(_) => "TempHP",
            EffectKind::LegacyIEffect(_) | EffectKind::IEffect(_) => "IEffect",
            EffectKind::RemoveIEffect(_) => "RemoveIEffect",
            EffectKind::Roll(_) => "Roll",
            EffectKind::Text(_) => "Text",
            EffectKind::SetVariable(_) => "SetVariable",
            EffectKind::Condition(_) => "Condition",
            EffectKind::UseCounter(_) => "UseCounter",
            EffectKind::CastSpell(_) => "CastSpell",
            EffectKind::Check(_) => "Check",
        }
    }

    /// The variant's behavior.
    #[must_use]
    pub fn node(&self) -> &dyn EffectNode {
        match self {
            EffectKind::Target(e) => e,
            EffectKind::Attack(e) => e,
            EffectKind::Save(e) => e,
            EffectKind::Damage(e) => e,
            EffectKind::TempHp(e) => e,
            EffectKind::LegacyIEffect(e) => e,
            EffectKind::IEffect(e) => e,
            EffectKind::RemoveIEffect(e) => e,
            EffectKind::Roll(e) => e,
            EffectKind::Text(e) => e,
            EffectKind::SetVariable(e) => e,
            EffectKind::Condition(e) => e,
            EffectKind::UseCounter(e) => e,
            EffectKind::CastSpell(e) => e,
            EffectKind::Check(e) => e,
        }
    }
}

macro_rules! impl_from_variant {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for EffectKind {
                fn from(effect: $variant) -> Self {
                    EffectKind::$variant(effect)
                }
            }

            impl From<$variant> for Effect {
                fn from(effect: $variant) -> Self {
                    Effect::new(effect)
                }
            }
        )*
    };
}

impl_from_variant!(
    Target,
    Attack,
    Save,
    Damage,
    TempHp,
    LegacyIEffect,
    IEffect,
    RemoveIEffect,
    Roll,
    Text,
    SetVariable,
    Condition,
    UseCounter,
    CastSpell,
    Check,
);

impl Effect {
    /// Create a node with no meta children.
    #[must_use]
    pub fn new(kind: impl Into<EffectKind>) -> Self {
        Self {
            kind: kind.into(),
            meta: Vec::new(),
        }
    }

    /// Attach meta children (builder pattern).
    #[must_use]
    pub fn with_meta(mut self, meta: Vec<Effect>) -> Self {
        self.meta = meta;
        self
    }

    /// The registry tag of this node.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        self.kind.tag()
    }

    /// Display name of this node's variant.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }

    /// Every child for generic traversal: meta children, then the
    /// variant's own nested effects.
    #[must_use]
    pub fn children(&self) -> Vec<&Effect> {
        self.meta.iter().chain(self.kind.node().children()).collect()
    }

    /// Preflight this node, then its children depth-first.
    pub fn preflight<'a>(&'a self, ctx: &'a mut AutomationContext) -> BoxFuture<'a, ()> {
        async move {
            self.kind.node().preflight(ctx).await;
            for child in self.children() {
                child.preflight(ctx).await;
            }
        }
        .boxed()
    }

    /// Run meta children, then the variant body.
    ///
    /// Errors from meta children propagate: a failing modifier fails the
    /// node it modifies.
    pub fn run(&self, ctx: &mut AutomationContext) -> Result<Option<EffectResult>, Signal> {
        debug!(effect = self.tag(), depth = ctx.depth(), "running effect");
        for meta in &self.meta {
            meta.run(ctx)?;
        }
        self.kind.node().run(ctx)
    }

    /// Preview text for this node.
    #[must_use]
    pub fn build_str(&self, caster: &Combatant, evaluator: &Evaluator) -> String {
        self.kind.node().build_str(caster, evaluator)
    }
}
