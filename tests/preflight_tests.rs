//! Preflight and spell casting tests.
//!
//! These tests verify the async phase and what it feeds the run:
//! - Compendium data is fetched once, before anything runs
//! - Text and limited-use entities resolve from the preflight cache
//! - Spells cast from automation use their overrides and concentration

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use effect_automation::combat::{Combatant, Counter, Roster};
use effect_automation::core::{CombatantId, Value};
use effect_automation::effects::{
    Attack, ButtonSpec, CastSpell, Condition, CounterRef, Damage, Effect, EffectResult, IEffect, Save, SetVariable,
    Target, Text, UseCounter,
};
use effect_automation::runtime::{
    Automation, AutomationContext, Compendium, CompendiumError, EntityRef, MemoryCompendium, Spell,
};

/// Counts every lookup it forwards.
struct Recording {
    inner: MemoryCompendium,
    lookups: AtomicUsize,
}

impl Recording {
    fn new(inner: MemoryCompendium) -> Arc<Self> {
        Arc::new(Self {
            inner,
            lookups: AtomicUsize::new(0),
        })
    }

    fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Compendium for Recording {
    async fn spell(&self, id: i64) -> Result<Option<Spell>, CompendiumError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.spell(id).await
    }

    async fn entity_text(&self, entity: EntityRef) -> Result<Option<String>, CompendiumError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.entity_text(entity).await
    }

    async fn limited_use(&self, entity: EntityRef) -> Result<Option<String>, CompendiumError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.limited_use(entity).await
    }
}

/// Always fails.
struct Offline;

#[async_trait]
impl Compendium for Offline {
    async fn spell(&self, _id: i64) -> Result<Option<Spell>, CompendiumError> {
        Err(CompendiumError("offline".to_string()))
    }

    async fn entity_text(&self, _entity: EntityRef) -> Result<Option<String>, CompendiumError> {
        Err(CompendiumError("offline".to_string()))
    }

    async fn limited_use(&self, _entity: EntityRef) -> Result<Option<String>, CompendiumError> {
        Err(CompendiumError("offline".to_string()))
    }
}

const RAGE: EntityRef = EntityRef::new(9, 12);
const FEATURE: EntityRef = EntityRef::new(501, 3);

fn burning_hands() -> Spell {
    Spell {
        id: 10,
        name: "Burning Hands".to_string(),
        level: 1,
        concentration: false,
        automation: vec![Target::new(
            "all",
            vec![Save::new("dex", vec![Damage::new("3").into()], vec![Damage::new("1").into()]).into()],
        )
        .into()],
    }
}

fn hex() -> Spell {
    Spell {
        id: 20,
        name: "Hex".to_string(),
        level: 1,
        concentration: true,
        automation: vec![Target::new("each", vec![IEffect::new("Hexed").into()]).into()],
    }
}

fn compendium() -> MemoryCompendium {
    MemoryCompendium::new()
        .with_spell(burning_hands())
        .with_spell(hex())
        .with_text(FEATURE, "You can see in dim light within 60 feet.")
        .with_limited_use(RAGE, "Rage")
}

fn arena() -> (Roster, CombatantId, CombatantId) {
    let mut roster = Roster::new();
    let caster = roster.add(
        Combatant::new("Warlock")
            .with_spellcasting(13, 5, 3, 5)
            .with_counter("Rage", Counter::new(3)),
    );
    let target = roster.add(Combatant::new("Bandit").with_hp(11, 11).with_stat("dexSave", -100));
    (roster, caster, target)
}

// ============================================================================
// Preflight
// ============================================================================

/// Everything is fetched before the run, and each thing only once.
#[tokio::test]
async fn test_preflight_fetches_once() {
    let (roster, caster, target) = arena();
    let recording = Recording::new(compendium());
    let mut ctx = AutomationContext::new(roster, caster)
        .with_targets([target])
        .with_compendium(recording.clone());
    let automation = Automation::new(vec![
        Text::entity(FEATURE).into(),
        Text::entity(FEATURE).into(),
        CastSpell::new(10).into(),
        CastSpell::new(10).into(),
    ]);

    automation.preflight(&mut ctx).await;
    assert_eq!(recording.lookups(), 2);
    assert!(ctx.cache().has_spell(10));
    assert!(ctx.cache().text(FEATURE).is_some());

    // Running needs nothing more.
    automation.run(&mut ctx).unwrap();
    assert_eq!(recording.lookups(), 2);
}

/// Lookups nested anywhere in the tree are fetched before the run:
/// meta lists, attack branches, condition branches and button automation.
#[tokio::test]
async fn test_preflight_reaches_nested_nodes() {
    const SIGHT: EntityRef = EntityRef::new(502, 3);
    let (roster, caster, target) = arena();
    let recording = Recording::new(compendium().with_text(SIGHT, "Blindsight 10 ft."));
    let mut ctx = AutomationContext::new(roster, caster)
        .with_targets([target])
        .with_compendium(recording.clone());

    let rage = UseCounter {
        counter: CounterRef::Entity(RAGE),
        ..UseCounter::named("", "1")
    };
    let mut hexed = IEffect::new("Hexed");
    hexed.buttons = vec![ButtonSpec {
        label: "Recast".to_string(),
        automation: vec![CastSpell::new(20).into()],
    }];
    let automation = Automation::new(vec![
        Effect::new(SetVariable::new("ready", "1")).with_meta(vec![Text::entity(FEATURE).into()]),
        Target::new(
            "each",
            vec![
                Attack::new(vec![Text::entity(SIGHT).into()], vec![])
                    .with_bonus("5")
                    .into(),
                Condition::new("False", vec![], vec![rage.into()]).into(),
                hexed.into(),
            ],
        )
        .into(),
    ]);

    automation.preflight(&mut ctx).await;

    assert_eq!(recording.lookups(), 4);
    assert!(ctx.cache().text(FEATURE).is_some());
    assert!(ctx.cache().text(SIGHT).is_some());
    assert!(ctx.cache().limited_use(RAGE).is_some());
    assert!(ctx.cache().has_spell(20));

    // The run reads from the cache only.
    automation.run(&mut ctx).unwrap();
    assert_eq!(recording.lookups(), 4);
    assert!(ctx
        .narration()
        .postflight_fields()
        .iter()
        .any(|f| f.body == "You can see in dim light within 60 feet."));
}

/// A spell whose automation casts itself is fetched once and terminates.
#[tokio::test]
async fn test_preflight_self_referencing_spell() {
    let (roster, caster, _) = arena();
    let mut echo = burning_hands();
    echo.id = 30;
    echo.automation = vec![CastSpell::new(30).into()];
    let recording = Recording::new(MemoryCompendium::new().with_spell(echo));
    let mut ctx = AutomationContext::new(roster, caster).with_compendium(recording.clone());

    Automation::new(vec![CastSpell::new(30).into()]).preflight(&mut ctx).await;
    assert_eq!(recording.lookups(), 1);
}

/// Lookup failures are logged, not raised; the run reports them.
#[tokio::test]
async fn test_preflight_failures_surface_at_run() {
    let (roster, caster, _) = arena();
    let mut ctx = AutomationContext::new(roster, caster).with_compendium(Arc::new(Offline));
    let automation = Automation::new(vec![
        Text::entity(FEATURE).into(),
        CastSpell::new(10).into(),
        SetVariable::new("after", "1").into(),
    ]);

    let result = automation.execute(&mut ctx).await.unwrap();

    assert_eq!(result.children.len(), 1);
    assert_eq!(ctx.variable("after"), Some(&Value::Int(1)));
    assert_eq!(ctx.narration().meta_lines().len(), 2);
}

/// Entity text lands in a postflight field.
#[tokio::test]
async fn test_entity_text() {
    let (roster, caster, _) = arena();
    let mut ctx = AutomationContext::new(roster, caster).with_compendium(compendium().shared());
    let automation = Automation::new(vec![Text::entity(FEATURE).into()]);

    automation.execute(&mut ctx).await.unwrap();

    let fields = ctx.narration().postflight_fields();
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].body, "You can see in dim light within 60 feet.");
}

/// Limited-use entities resolve to the caster's counter.
#[tokio::test]
async fn test_limited_use_counter() {
    let (roster, caster, _) = arena();
    let mut ctx = AutomationContext::new(roster, caster).with_compendium(compendium().shared());
    let rage = UseCounter {
        counter: CounterRef::Entity(RAGE),
        ..UseCounter::named("", "1")
    };

    let result = Automation::new(vec![rage.into()]).execute(&mut ctx).await.unwrap();

    assert!(result.caster_needs_commit);
    assert_eq!(ctx.caster().unwrap().counters["Rage"].value, 2);
}

// ============================================================================
// Casting
// ============================================================================

#[tokio::test]
async fn test_cast_spell_with_overrides() {
    let (roster, caster, target) = arena();
    let mut ctx = AutomationContext::new(roster, caster)
        .with_targets([target])
        .with_compendium(compendium().shared());
    let mut cast = CastSpell::new(10).at_level(2);
    cast.dc = Some("8 + 2 + 3".to_string());

    let result = Automation::new(vec![cast.into()]).execute(&mut ctx).await.unwrap();

    assert!(result.is_spell);
    let EffectResult::CastSpell(spell) = &result.children[0] else {
        panic!("expected a cast result");
    };
    assert_eq!(spell.spell, "Burning Hands");
    assert_eq!(result.total_damage(), 3);
    assert_eq!(ctx.variable("lastSaveDC"), Some(&Value::Int(13)));
    assert_eq!(ctx.roster().get(target).unwrap().hp, 8);
    // Spell state does not leak past the cast.
    assert!(!ctx.is_spell());
    assert_eq!(ctx.depth(), 0);
}

#[tokio::test]
async fn test_cast_concentration_spell() {
    let (roster, caster, target) = arena();
    let mut ctx = AutomationContext::new(roster, caster)
        .with_targets([target])
        .with_compendium(compendium().shared());

    Automation::new(vec![CastSpell::new(20).into()])
        .execute(&mut ctx)
        .await
        .unwrap();

    let conc = ctx.roster().concentration_of(caster).unwrap();
    assert_eq!(ctx.roster().effect(conc).unwrap().name, "Hex");
    let hexed = ctx.roster().children_of(conc);
    assert_eq!(hexed.len(), 1);
    assert_eq!(hexed[0].combatant, target);

    // Dropping concentration ends the hex.
    ctx.roster_mut().remove_effect(conc);
    assert!(ctx.roster().get(target).unwrap().effects.is_empty());
}

#[tokio::test]
async fn test_cast_inside_spell_is_rejected() {
    let (roster, caster, _) = arena();
    let mut nested = burning_hands();
    nested.id = 40;
    nested.automation = vec![CastSpell::new(20).into()];
    let mut ctx = AutomationContext::new(roster, caster)
        .with_compendium(MemoryCompendium::new().with_spell(nested).with_spell(hex()).shared());

    let result = Automation::new(vec![CastSpell::new(40).into()])
        .execute(&mut ctx)
        .await
        .unwrap();

    let EffectResult::CastSpell(outer) = &result.children[0] else {
        panic!("expected a cast result");
    };
    assert!(outer.children.is_empty());
    assert!(ctx.narration().meta_lines()[0].contains("cannot cast a spell inside another spell"));
}
