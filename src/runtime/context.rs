//! The automation context: mutable state threaded through one run.
//!
//! A context is built fresh by the caller for every top-level invocation.
//! It owns the roster for the duration of the run (the caller takes it
//! back with [`AutomationContext::into_roster`]), the caster and target
//! selection, variable bindings, the narration queue, nesting depth, spell
//! state and whatever preflight fetched from the compendium.
//!
//! ## Variables
//!
//! Bindings set during a run (`lastDamage`, a `roll` effect's name, a
//! `variable` effect) shadow the caster builtins and are visible to every
//! effect that runs afterwards in the same context. They are not persisted.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::combat::{Combatant, Roster};
use crate::core::{AutomationConfig, CombatantId, DiceRng, EffectRef, Value};
use crate::eval::{DiceExpr, Evaluator, RollOutcome};

use super::compendium::{Compendium, EntityRef, MemoryCompendium, Spell};
use super::error::AutomationError;
use super::narration::Narration;

/// The spell currently being cast, with any overrides.
#[derive(Clone, Debug, PartialEq)]
pub struct SpellState {
    /// The spell.
    pub spell: Arc<Spell>,
    /// Level the spell is cast at.
    pub cast_level: u8,
    /// Save DC override.
    pub dc: Option<i64>,
    /// Attack bonus override.
    pub attack_bonus: Option<i64>,
    /// Casting modifier override.
    pub casting_mod: Option<i64>,
}

impl SpellState {
    /// Cast a spell at its base level with no overrides.
    #[must_use]
    pub fn new(spell: Arc<Spell>) -> Self {
        let cast_level = spell.level;
        Self {
            spell,
            cast_level,
            dc: None,
            attack_bonus: None,
            casting_mod: None,
        }
    }

    /// Set the cast level (builder pattern).
    #[must_use]
    pub fn at_level(mut self, level: u8) -> Self {
        self.cast_level = level;
        self
    }
}

/// Data fetched during preflight.
#[derive(Clone, Debug, Default)]
pub struct PreflightCache {
    spells: FxHashMap<i64, Arc<Spell>>,
    texts: FxHashMap<EntityRef, String>,
    limited_uses: FxHashMap<EntityRef, String>,
}

impl PreflightCache {
    /// A fetched spell.
    #[must_use]
    pub fn spell(&self, id: i64) -> Option<Arc<Spell>> {
        self.spells.get(&id).cloned()
    }

    /// Whether a spell has been fetched.
    #[must_use]
    pub fn has_spell(&self, id: i64) -> bool {
        self.spells.contains_key(&id)
    }

    /// Store a fetched spell.
    pub fn insert_spell(&mut self, spell: Spell) -> Arc<Spell> {
        let spell = Arc::new(spell);
        self.spells.insert(spell.id, Arc::clone(&spell));
        spell
    }

    /// A fetched entity text.
    #[must_use]
    pub fn text(&self, entity: EntityRef) -> Option<&str> {
        self.texts.get(&entity).map(String::as_str)
    }

    /// Store a fetched entity text.
    pub fn insert_text(&mut self, entity: EntityRef, text: String) {
        self.texts.insert(entity, text);
    }

    /// A fetched limited-use counter name.
    #[must_use]
    pub fn limited_use(&self, entity: EntityRef) -> Option<&str> {
        self.limited_uses.get(&entity).map(String::as_str)
    }

    /// Store a fetched limited-use counter name.
    pub fn insert_limited_use(&mut self, entity: EntityRef, counter: String) {
        self.limited_uses.insert(entity, counter);
    }
}

/// Mutable execution environment for one automation run.
pub struct AutomationContext {
    roster: Roster,
    caster: CombatantId,
    targets: SmallVec<[CombatantId; 4]>,
    target: Option<CombatantId>,
    variables: FxHashMap<String, Value>,
    evaluator: Evaluator,
    narration: Narration,
    depth: u32,
    spell: Option<SpellState>,
    in_crit: bool,
    origin: Option<EffectRef>,
    conc_effect: Option<EffectRef>,
    repeat: u32,
    ignore_counters: bool,
    cache: PreflightCache,
    rng: DiceRng,
    config: AutomationConfig,
    compendium: Arc<dyn Compendium>,
    caster_needs_commit: bool,
}

impl AutomationContext {
    /// Create a context for `caster` acting within `roster`.
    ///
    /// Targets default to none, the compendium to an empty in-memory one,
    /// and dice are seeded from entropy.
    #[must_use]
    pub fn new(roster: Roster, caster: CombatantId) -> Self {
        let evaluator = roster.get(caster).map(Evaluator::for_caster).unwrap_or_default();
        Self {
            roster,
            caster,
            targets: SmallVec::new(),
            target: None,
            variables: FxHashMap::default(),
            evaluator,
            narration: Narration::new(),
            depth: 0,
            spell: None,
            in_crit: false,
            origin: None,
            conc_effect: None,
            repeat: 1,
            ignore_counters: false,
            cache: PreflightCache::default(),
            rng: DiceRng::from_entropy(),
            config: AutomationConfig::default(),
            compendium: Arc::new(MemoryCompendium::new()),
            caster_needs_commit: false,
        }
    }

    /// Set the configuration (builder pattern). A configured seed reseeds
    /// the dice.
    #[must_use]
    pub fn with_config(mut self, config: AutomationConfig) -> Self {
        if let Some(seed) = config.seed {
            self.rng = DiceRng::new(seed);
        }
        self.config = config;
        self
    }

    /// Set the selected targets (builder pattern).
    #[must_use]
    pub fn with_targets(mut self, targets: impl IntoIterator<Item = CombatantId>) -> Self {
        self.targets = targets.into_iter().collect();
        self
    }

    /// Set the compendium (builder pattern).
    #[must_use]
    pub fn with_compendium(mut self, compendium: Arc<dyn Compendium>) -> Self {
        self.compendium = compendium;
        self
    }

    /// Mark this run as a button press on an initiative effect (builder pattern).
    #[must_use]
    pub fn with_origin_effect(mut self, origin: EffectRef) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Repeat each target's effects `times` times (builder pattern).
    #[must_use]
    pub fn with_repeat(mut self, times: u32) -> Self {
        self.repeat = times.max(1);
        self
    }

    /// Skip counter usage unless a counter effect fixes its value (builder pattern).
    #[must_use]
    pub fn with_ignore_counters(mut self) -> Self {
        self.ignore_counters = true;
        self
    }

    /// Pre-bind a variable (builder pattern).
    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Run as the casting of a spell (builder pattern).
    #[must_use]
    pub fn with_spell(mut self, spell: SpellState) -> Self {
        self.spell = Some(spell);
        self
    }

    // === Combatants ===

    /// The roster.
    #[must_use]
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// The roster, mutably.
    pub fn roster_mut(&mut self) -> &mut Roster {
        &mut self.roster
    }

    /// Consume the context, returning the roster.
    #[must_use]
    pub fn into_roster(self) -> Roster {
        self.roster
    }

    /// The caster's ID.
    #[must_use]
    pub fn caster_id(&self) -> CombatantId {
        self.caster
    }

    /// The caster.
    #[must_use]
    pub fn caster(&self) -> Option<&Combatant> {
        self.roster.get(self.caster)
    }

    /// The caster, mutably. Marks the caster as changed.
    pub fn caster_mut(&mut self) -> Option<&mut Combatant> {
        self.caster_needs_commit = true;
        self.roster.get_mut(self.caster)
    }

    /// Selected targets.
    #[must_use]
    pub fn targets(&self) -> &[CombatantId] {
        &self.targets
    }

    /// The target effects currently act on.
    #[must_use]
    pub fn current_target(&self) -> Option<CombatantId> {
        self.target
    }

    /// Replace the current target, returning the previous one.
    pub(crate) fn set_target(&mut self, target: Option<CombatantId>) -> Option<CombatantId> {
        std::mem::replace(&mut self.target, target)
    }

    /// The current target combatant.
    #[must_use]
    pub fn target(&self) -> Option<&Combatant> {
        self.roster.get(self.target?)
    }

    /// The current target combatant, mutably.
    pub fn target_mut(&mut self) -> Option<&mut Combatant> {
        let id = self.target?;
        self.note_changed(id);
        self.roster.get_mut(id)
    }

    /// Record that a combatant changed; changes to the caster need a commit.
    pub fn note_changed(&mut self, id: CombatantId) {
        if id == self.caster {
            self.caster_needs_commit = true;
        }
    }

    /// Whether the caster was changed during the run.
    #[must_use]
    pub fn caster_needs_commit(&self) -> bool {
        self.caster_needs_commit
    }

    // === Variables & evaluation ===

    /// Current variable bindings.
    #[must_use]
    pub fn variables(&self) -> &FxHashMap<String, Value> {
        &self.variables
    }

    /// Look up a variable binding.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Bind a variable.
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(name.into(), value.into());
    }

    /// Remove a binding, returning its old value.
    pub fn unset_variable(&mut self, name: &str) -> Option<Value> {
        self.variables.remove(name)
    }

    /// The caster's evaluator (builtins only).
    #[must_use]
    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Evaluate an expression with variables shadowing builtins.
    pub fn eval(&self, expr: &str) -> Result<Value, AutomationError> {
        Ok(self.evaluator.eval_with(expr, &self.variables)?)
    }

    /// Evaluate an expression that must produce an integer.
    pub fn eval_int(&self, expr: &str) -> Result<i64, AutomationError> {
        Ok(self.evaluator.eval_int_with(expr, &self.variables)?)
    }

    /// Replace `{expr}` blocks in `text`.
    pub fn transformed_str(&self, text: &str) -> Result<String, AutomationError> {
        Ok(self.evaluator.transformed_str_with(text, &self.variables)?)
    }

    /// Transform and parse a dice string.
    pub fn parse_dice(&self, text: &str) -> Result<DiceExpr, AutomationError> {
        Ok(DiceExpr::parse(&self.transformed_str(text)?)?)
    }

    /// Roll a parsed dice expression.
    pub fn roll(&mut self, dice: &DiceExpr) -> Result<RollOutcome, AutomationError> {
        Ok(dice.roll(&mut self.rng)?)
    }

    // === Narration ===

    /// The narration so far.
    #[must_use]
    pub fn narration(&self) -> &Narration {
        &self.narration
    }

    /// The narration, mutably.
    pub fn narration_mut(&mut self) -> &mut Narration {
        &mut self.narration
    }

    /// Queue a narration line.
    pub fn queue(&mut self, line: impl Into<String>) {
        self.narration.queue(line);
    }

    /// Queue a meta line.
    pub fn meta_queue(&mut self, line: impl Into<String>) {
        self.narration.meta_queue(line);
    }

    /// Group pending lines under a title.
    pub fn push_field(&mut self, title: Option<&str>) {
        self.narration.push_field(title, false);
    }

    /// Move pending lines to the meta lines.
    pub fn push_to_meta(&mut self) {
        self.narration.push_to_meta();
    }

    // === Run state ===

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &AutomationConfig {
        &self.config
    }

    /// Nested-automation depth (0 at top level).
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Enter nested automation.
    pub(crate) fn enter(&mut self) -> Result<(), AutomationError> {
        if self.depth >= self.config.max_depth {
            return Err(AutomationError::Nesting(format!(
                "Automation is nested too deeply (max depth {}).",
                self.config.max_depth
            )));
        }
        self.depth += 1;
        Ok(())
    }

    /// Leave nested automation.
    pub(crate) fn exit(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// The spell being cast, if any.
    #[must_use]
    pub fn spell(&self) -> Option<&SpellState> {
        self.spell.as_ref()
    }

    /// Replace the spell state, returning the previous one.
    pub(crate) fn set_spell(&mut self, spell: Option<SpellState>) -> Option<SpellState> {
        std::mem::replace(&mut self.spell, spell)
    }

    /// Whether this run casts a spell.
    #[must_use]
    pub fn is_spell(&self) -> bool {
        self.spell.is_some()
    }

    /// Level of the spell being cast.
    #[must_use]
    pub fn cast_level(&self) -> Option<u8> {
        self.spell.as_ref().map(|s| s.cast_level)
    }

    /// Save DC: spell override, then the caster's spell DC.
    #[must_use]
    pub fn spell_dc(&self) -> Option<i64> {
        self.spell
            .as_ref()
            .and_then(|s| s.dc)
            .or_else(|| self.caster()?.spellbook.dc)
    }

    /// Attack bonus: spell override, then the caster's spell attack bonus.
    #[must_use]
    pub fn spell_attack_bonus(&self) -> Option<i64> {
        self.spell
            .as_ref()
            .and_then(|s| s.attack_bonus)
            .or_else(|| self.caster()?.spellbook.attack_bonus)
    }

    /// Whether the last attack was a critical hit.
    #[must_use]
    pub fn in_crit(&self) -> bool {
        self.in_crit
    }

    /// Set the critical-hit flag, returning the previous value.
    pub(crate) fn set_in_crit(&mut self, crit: bool) -> bool {
        std::mem::replace(&mut self.in_crit, crit)
    }

    /// The initiative effect whose button started this run.
    #[must_use]
    pub fn origin_effect(&self) -> Option<EffectRef> {
        self.origin
    }

    /// The concentration effect created during this run.
    #[must_use]
    pub fn conc_effect(&self) -> Option<EffectRef> {
        self.conc_effect
    }

    /// Record the concentration effect created during this run.
    pub(crate) fn set_conc_effect(&mut self, effect: Option<EffectRef>) {
        self.conc_effect = effect;
    }

    /// How many times each target is iterated, capped by configuration.
    #[must_use]
    pub fn repeat(&self) -> u32 {
        self.repeat.min(self.config.max_iterations).max(1)
    }

    /// Whether counter usage is skipped.
    #[must_use]
    pub fn ignore_counters(&self) -> bool {
        self.ignore_counters
    }

    /// Data fetched during preflight.
    #[must_use]
    pub fn cache(&self) -> &PreflightCache {
        &self.cache
    }

    /// Data fetched during preflight, mutably.
    pub fn cache_mut(&mut self) -> &mut PreflightCache {
        &mut self.cache
    }

    /// The compendium.
    #[must_use]
    pub fn compendium(&self) -> Arc<dyn Compendium> {
        Arc::clone(&self.compendium)
    }
}

impl fmt::Debug for AutomationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutomationContext")
            .field("caster", &self.caster)
            .field("targets", &self.targets)
            .field("target", &self.target)
            .field("variables", &self.variables)
            .field("depth", &self.depth)
            .field("spell", &self.spell.as_ref().map(|s| &s.spell.name))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> AutomationContext {
        let mut roster = Roster::new();
        let caster = roster.add(
            Combatant::new("Merric")
                .with_stat("dexterityMod", 3)
                .with_spellcasting(14, 6, 4, 5),
        );
        let goblin = roster.add(Combatant::new("Goblin").with_hp(7, 7));
        AutomationContext::new(roster, caster)
            .with_targets([goblin])
            .with_config(AutomationConfig::new().with_seed(7))
    }

    #[test]
    fn test_variables_shadow_builtins() {
        let mut ctx = context();
        assert_eq!(ctx.eval_int("dexterityMod + 1").unwrap(), 4);
        ctx.set_variable("dexterityMod", 10);
        assert_eq!(ctx.eval_int("dexterityMod").unwrap(), 10);
        assert_eq!(ctx.transformed_str("1d6+{dexterityMod}").unwrap(), "1d6+10");
    }

    #[test]
    fn test_spell_overrides() {
        let mut ctx = context();
        assert_eq!(ctx.spell_dc(), Some(14));

        let spell = Arc::new(Spell {
            id: 1,
            name: "Sacred Flame".to_string(),
            level: 0,
            concentration: false,
            automation: Vec::new(),
        });
        let mut state = SpellState::new(spell);
        state.dc = Some(17);
        ctx.set_spell(Some(state));
        assert_eq!(ctx.spell_dc(), Some(17));
        assert_eq!(ctx.spell_attack_bonus(), Some(6));
        assert_eq!(ctx.cast_level(), Some(0));
    }

    #[test]
    fn test_depth_limit() {
        let mut ctx = context().with_config(AutomationConfig::new().with_max_depth(1));
        assert!(ctx.enter().is_ok());
        assert!(matches!(ctx.enter(), Err(AutomationError::Nesting(_))));
        ctx.exit();
        assert_eq!(ctx.depth(), 0);
    }

    #[test]
    fn test_target_mutation_of_caster_needs_commit() {
        let mut ctx = context();
        let goblin = ctx.targets()[0];
        ctx.set_target(Some(goblin));
        ctx.target_mut().unwrap().hp = 1;
        assert!(!ctx.caster_needs_commit());

        ctx.set_target(Some(ctx.caster_id()));
        ctx.target_mut().unwrap().hp = 1;
        assert!(ctx.caster_needs_commit());
    }

    #[test]
    fn test_repeat_is_capped() {
        let ctx = context()
            .with_config(AutomationConfig::new().with_max_iterations(3))
            .with_repeat(50);
        assert_eq!(ctx.repeat(), 3);
    }
}
