//! Interpreter tests.
//!
//! These tests verify the run-level guarantees of the interpreter:
//! - Recoverable errors are isolated to the failing node
//! - Hard stops end the run but keep earlier effects
//! - Preview text never depends on running the tree
//! - Repeat, nesting limits and narration layout

use effect_automation::combat::{Combatant, Counter, Roster};
use effect_automation::core::{AutomationConfig, CombatantId, Value};
use effect_automation::effects::{
    CastSpell, Condition, CounterErrorBehaviour, Damage, Effect, EffectResult, Roll, Save, SetVariable, Target,
    Text, UseCounter,
};
use effect_automation::runtime::{Automation, AutomationContext, MemoryCompendium, Spell};
use effect_automation::Evaluator;
use serde_json::json;

fn arena() -> (Roster, CombatantId, CombatantId) {
    let mut roster = Roster::new();
    let caster = roster.add(
        Combatant::new("Wizard")
            .with_spellcasting(15, 7, 4, 5)
            .with_counter("Arcane Recovery", Counter::new(1)),
    );
    let goblin = roster.add(Combatant::new("Goblin").with_hp(30, 30).with_ac(13));
    (roster, caster, goblin)
}

fn context() -> (AutomationContext, CombatantId) {
    let (roster, caster, goblin) = arena();
    let ctx = AutomationContext::new(roster, caster)
        .with_targets([goblin])
        .with_config(AutomationConfig::new().with_seed(7));
    (ctx, goblin)
}

// ============================================================================
// Fail-soft and hard-stop
// ============================================================================

/// A failing middle node is narrated once; its siblings still apply.
#[test]
fn test_recoverable_error_is_isolated() {
    let (mut ctx, goblin) = context();
    let automation = Automation::new(vec![Target::new(
        "each",
        vec![
            Damage::new("3").into(),
            Damage::new("1d{notAVariable}").into(),
            Damage::new("4").into(),
        ],
    )
    .into()]);

    let results = automation.run(&mut ctx).unwrap();

    assert_eq!(ctx.roster().get(goblin).unwrap().hp, 23);
    let errors: Vec<_> = ctx
        .narration()
        .meta_lines()
        .iter()
        .filter(|line| line.starts_with("**Error**"))
        .collect();
    assert_eq!(errors.len(), 1);

    let EffectResult::Target(target) = &results[0] else {
        panic!("expected a target result");
    };
    assert_eq!(target.results[0].len(), 2);
}

/// Dice totals too large for an integer are a recoverable error.
#[test]
fn test_dice_overflow_is_recoverable() {
    let (mut ctx, goblin) = context();
    let automation = Automation::from_json(&json!([{
        "type": "target",
        "target": "each",
        "effects": [
            {"type": "damage", "damage": "9223372036854775807 + 1"},
            {"type": "damage", "damage": "2"}
        ]
    }]))
    .unwrap();

    automation.run(&mut ctx).unwrap();

    assert_eq!(ctx.roster().get(goblin).unwrap().hp, 28);
    assert!(ctx
        .narration()
        .meta_lines()
        .iter()
        .any(|line| line.starts_with("**Error**") && line.contains("total out of range")));
}

/// Extreme damage and healing clamp instead of wrapping.
#[test]
fn test_extreme_damage_clamps_hp() {
    let (mut ctx, goblin) = context();
    let automation = Automation::new(vec![Target::new(
        "each",
        vec![
            Damage::new("9223372036854775807").into(),
            Damage {
                overheal: true,
                ..Damage::new("-9223372036854775807 - 1")
            }
            .into(),
        ],
    )
    .into()]);

    automation.run(&mut ctx).unwrap();
    assert_eq!(ctx.roster().get(goblin).unwrap().hp, i64::MAX);
}

/// A counter that raises stops everything after it.
#[test]
fn test_hard_stop_unwinds_the_run() {
    let (mut ctx, goblin) = context();
    let automation = Automation::new(vec![
        Target::new("each", vec![Damage::new("5").into()]).into(),
        UseCounter::named("Bardic Inspiration", "1")
            .with_error_behaviour(CounterErrorBehaviour::Raise)
            .into(),
        Target::new("each", vec![Damage::new("5").into()]).into(),
    ]);

    let stop = automation.run(&mut ctx).unwrap_err();

    assert!(stop.reason.contains("Bardic Inspiration"));
    assert_eq!(ctx.roster().get(goblin).unwrap().hp, 25);
    // Narration from before the stop is kept.
    assert!(!ctx.narration().is_empty());
}

/// A stop raised deep inside nested branches still reaches the top.
#[test]
fn test_hard_stop_from_nested_branch() {
    let (mut ctx, _) = context();
    let automation = Automation::new(vec![
        Condition::new(
            "True",
            vec![UseCounter::named("Missing", "1")
                .with_error_behaviour(CounterErrorBehaviour::Raise)
                .into()],
            vec![],
        )
        .into(),
        SetVariable::new("after", "1").into(),
    ]);

    assert!(automation.run(&mut ctx).is_err());
    assert_eq!(ctx.variable("after"), None);
}

/// Warn is the default counter behaviour: a warning, not a stop.
#[test]
fn test_counter_warns_by_default() {
    let (mut ctx, _) = context();
    let automation = Automation::new(vec![
        UseCounter::named("Missing", "1").into(),
        SetVariable::new("after", "1").into(),
    ]);

    automation.run(&mut ctx).unwrap();
    assert_eq!(ctx.variable("after"), Some(&Value::Int(1)));
    assert!(ctx.narration().meta_lines().iter().any(|l| l.starts_with("**Warning**")));
}

// ============================================================================
// Variables
// ============================================================================

/// Bindings are visible to later siblings and descendants.
#[test]
fn test_variables_flow_forward() {
    let (mut ctx, goblin) = context();
    let automation = Automation::new(vec![
        SetVariable::new("bonus", "2 + 3").into(),
        Target::new("each", vec![Damage::new("{bonus}").into()]).into(),
    ]);

    automation.run(&mut ctx).unwrap();
    assert_eq!(ctx.roster().get(goblin).unwrap().hp, 25);
}

/// Variables bound by the caller are visible to the whole tree.
#[test]
fn test_caller_bound_variables() {
    let (roster, caster, goblin) = arena();
    let mut ctx = AutomationContext::new(roster, caster)
        .with_targets([goblin])
        .with_variable("sneak", 7);
    let automation = Automation::new(vec![Target::new("each", vec![Damage::new("{sneak}").into()]).into()]);

    automation.run(&mut ctx).unwrap();
    assert_eq!(ctx.roster().get(goblin).unwrap().hp, 23);
}

/// `lastDamage` is bound after damage and readable by a later condition.
#[test]
fn test_condition_reads_last_damage() {
    let (mut ctx, _) = context();
    let automation = Automation::new(vec![Target::new(
        "each",
        vec![
            Damage::new("6").into(),
            Condition::new(
                "lastDamage > 5",
                vec![SetVariable::new("big", "1").into()],
                vec![SetVariable::new("big", "0").into()],
            )
            .into(),
        ],
    )
    .into()]);

    automation.run(&mut ctx).unwrap();
    assert_eq!(ctx.variable("big"), Some(&Value::Int(1)));
}

// ============================================================================
// Preview text
// ============================================================================

fn fireball() -> Automation {
    Automation::new(vec![Target::new(
        "all",
        vec![Save::new("dex", vec![Damage::new("8d6").into()], vec![Damage::new("4d6").into()]).into()],
    )
    .into()])
}

/// Building the preview twice gives the same text.
#[test]
fn test_build_str_is_idempotent() {
    let (roster, caster, _) = arena();
    let wizard = roster.get(caster).unwrap();
    let evaluator = Evaluator::for_caster(wizard);
    let automation = fireball();

    let first = automation.build_str(wizard, &evaluator);
    let second = automation.build_str(wizard, &evaluator);
    assert_eq!(first, second);
    assert_eq!(first, "DC 15 DEX Save. Fail: 8d6 damage. Success: 4d6 damage");
}

/// Running the tree does not change its preview.
#[test]
fn test_build_str_unchanged_by_run() {
    let (mut ctx, _) = context();
    let automation = fireball();
    let before = {
        let caster = ctx.caster().unwrap();
        automation.build_str(caster, &Evaluator::for_caster(caster))
    };

    automation.run(&mut ctx).unwrap();

    let caster = ctx.caster().unwrap();
    let after = automation.build_str(caster, &Evaluator::for_caster(caster));
    assert_eq!(before, after);
}

/// Empty fragments are dropped, not joined as blanks.
#[test]
fn test_build_str_skips_empty_fragments() {
    let caster = Combatant::new("Fighter");
    let evaluator = Evaluator::for_caster(&caster);
    let automation = Automation::new(vec![
        Damage::new("1d8").into(),
        Roll::new("1d4", "bless").into(),
        Text::new("Flavour.").into(),
        Damage::new("2").into(),
    ]);
    assert_eq!(automation.build_str(&caster, &evaluator), "1d8 damage, 2 damage");
}

// ============================================================================
// Repeat, nesting and narration
// ============================================================================

/// Index targets are 1-based; anything below 1 selects nobody.
#[test]
fn test_index_targets() {
    for (index, expected_hp) in [(json!(1), 27), (json!(2), 30), (json!(0), 30), (json!(i64::MIN), 30)] {
        let (mut ctx, goblin) = context();
        let automation = Automation::from_json(&json!([{
            "type": "target",
            "target": index,
            "effects": [{"type": "damage", "damage": "3"}]
        }]))
        .unwrap();

        automation.run(&mut ctx).unwrap();
        assert_eq!(ctx.roster().get(goblin).unwrap().hp, expected_hp, "index {index}");
    }
}

/// Repeat runs each target's effects several times with iteration titles.
#[test]
fn test_repeat_iterates_targets() {
    let (roster, caster, goblin) = arena();
    let mut ctx = AutomationContext::new(roster, caster)
        .with_targets([goblin])
        .with_repeat(3);
    let automation = Automation::new(vec![Target::new("each", vec![Damage::new("2").into()]).into()]);

    let results = automation.run(&mut ctx).unwrap();

    assert_eq!(ctx.roster().get(goblin).unwrap().hp, 24);
    let EffectResult::Target(target) = &results[0] else {
        panic!("expected a target result");
    };
    assert_eq!(target.results.len(), 3);
    let field = &ctx.narration().fields()[0];
    assert_eq!(field.title.as_deref(), Some("Goblin"));
    assert!(field.body.contains("**__Damage 2__**"));
    assert!(field.body.contains("**__Total Damage__**: 6"));
}

/// Repeat is capped by configuration.
#[test]
fn test_repeat_is_capped() {
    let (roster, caster, goblin) = arena();
    let mut ctx = AutomationContext::new(roster, caster)
        .with_targets([goblin])
        .with_config(AutomationConfig::new().with_max_iterations(2))
        .with_repeat(10);
    let automation = Automation::new(vec![Target::new("each", vec![Damage::new("1").into()]).into()]);

    automation.run(&mut ctx).unwrap();
    assert_eq!(ctx.roster().get(goblin).unwrap().hp, 28);
}

/// Casting past the depth limit is a recoverable error.
#[tokio::test]
async fn test_nesting_limit() {
    let (roster, caster, goblin) = arena();
    let spell = Spell {
        id: 1,
        name: "Magic Missile".to_string(),
        level: 1,
        concentration: false,
        automation: vec![Target::new("each", vec![Damage::new("3").into()]).into()],
    };
    let mut ctx = AutomationContext::new(roster, caster)
        .with_targets([goblin])
        .with_compendium(MemoryCompendium::new().with_spell(spell).shared())
        .with_config(AutomationConfig::new().with_max_depth(0));
    let automation = Automation::new(vec![CastSpell::new(1).into()]);

    let result = automation.execute(&mut ctx).await.unwrap();

    assert!(result.children.is_empty());
    assert_eq!(ctx.roster().get(goblin).unwrap().hp, 30);
    assert!(ctx.narration().meta_lines()[0].contains("nested too deeply"));
}

/// Meta children run before the node they modify.
#[test]
fn test_meta_runs_first() {
    let (mut ctx, goblin) = context();
    let damage = Effect::new(Damage::new("{extra}")).with_meta(vec![SetVariable::new("extra", "9").into()]);
    let automation = Automation::new(vec![Target::new("each", vec![damage]).into()]);

    automation.run(&mut ctx).unwrap();
    assert_eq!(ctx.roster().get(goblin).unwrap().hp, 21);
}

/// Each target gets its own field; untargeted output goes to meta.
#[test]
fn test_narration_layout() {
    let (mut ctx, _) = context();
    let automation = Automation::new(vec![
        Target::new("self", vec![Roll::new("1d1", "luck").into()]).into(),
        Target::new("each", vec![Damage::new("1").into()]).into(),
    ]);

    automation.run(&mut ctx).unwrap();

    let titles: Vec<_> = ctx
        .narration()
        .fields()
        .iter()
        .map(|f| f.title.clone().unwrap_or_default())
        .collect();
    assert_eq!(titles, vec!["Wizard".to_string(), "Goblin".to_string()]);
    assert!(ctx.narration().render().contains("**Goblin**"));
}
