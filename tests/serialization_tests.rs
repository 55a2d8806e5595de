//! Descriptor format tests.
//!
//! These tests verify the persisted JSON form of automation:
//! - Realistic authored automation decodes and re-encodes unchanged
//! - Malformed trees are rejected before anything runs
//! - Empty `meta` lists are omitted on encode
//! - Optional fields survive decoding and re-encoding
//! - Arbitrary generated trees survive a round trip

use effect_automation::effects::{
    decode, encode, Condition, Damage, DecodeError, Effect, EffectKind, IntExpr, LegacyIEffect, Roll, Save,
    SetVariable, Target, TempHp, TAGS,
};
use effect_automation::runtime::Automation;
use proptest::prelude::*;
use serde_json::{json, Value as Json};

fn longsword() -> Json {
    json!([
        {
            "type": "target",
            "target": "each",
            "effects": [
                {
                    "type": "attack",
                    "attackBonus": "strengthMod + proficiencyBonus",
                    "hit": [{"type": "damage", "damage": "1d8+{strengthMod}[slashing]"}],
                    "miss": []
                }
            ]
        },
        {"type": "text", "text": "Versatile: 1d10 when used with two hands."}
    ])
}

fn hex() -> Json {
    json!([
        {
            "type": "target",
            "target": "each",
            "effects": [
                {
                    "type": "ieffect2",
                    "name": "Hexed",
                    "duration": 600,
                    "buttons": [
                        {
                            "label": "Hex",
                            "automation": [
                                {"type": "target", "target": "parent", "effects": [
                                    {"type": "damage", "damage": "1d6[necrotic]"}
                                ]}
                            ]
                        }
                    ],
                    "desc": "Disadvantage on checks with the chosen ability."
                }
            ]
        },
        {"type": "counter", "counter": {"slot": 1}, "amount": "1", "errorBehaviour": "raise"},
        {
            "type": "condition",
            "condition": "lastCounterRemaining == 0",
            "onTrue": [{"type": "text", "text": "Out of slots!", "title": "Warning"}],
            "onFalse": [],
            "errorBehaviour": "neither"
        },
        {
            "type": "check",
            "ability": ["athletics", "acrobatics"],
            "contestAbility": "athletics",
            "contestTie": "neither",
            "fail": [{"type": "remove_ieffect", "removeParent": "if_no_children"}]
        },
        {"type": "spell", "id": 2102, "level": 3, "dc": "14"}
    ])
}

fn shield_of_faith() -> Json {
    json!([
        {
            "type": "variable",
            "name": "bonus",
            "value": "wisdomMod",
            "higher": {"3": "wisdomMod + 1"},
            "onError": "0"
        },
        {
            "type": "roll",
            "dice": "1d8",
            "name": "blessing",
            "higher": {"2": "2d8"},
            "cantripScale": true,
            "hidden": true,
            "displayName": "Blessing",
            "fixedValue": true
        },
        {
            "type": "target",
            "target": 1,
            "sortBy": "hp_asc",
            "effects": [
                {
                    "type": "save",
                    "stat": "wis",
                    "dc": "{bonus} + 10",
                    "adv": "-1",
                    "fail": [
                        {
                            "type": "ieffect",
                            "name": "Warded",
                            "duration": "{blessing}",
                            "effects": "-ac 2 -sb 1",
                            "end": true,
                            "conc": true,
                            "desc": "A shimmering field surrounds the creature.",
                            "stacking": true
                        }
                    ],
                    "success": [],
                    "meta": [{"type": "variable", "name": "warded", "value": "1"}]
                },
                {
                    "type": "temphp",
                    "amount": "1d4 + {bonus}",
                    "higher": {"2": "2d4 + {bonus}"},
                    "cantripScale": true
                }
            ]
        }
    ])
}

// ============================================================================
// Authored automation
// ============================================================================

#[test]
fn test_authored_automation_roundtrip() {
    for fixture in [longsword(), hex(), shield_of_faith()] {
        let automation = Automation::from_json(&fixture).unwrap();
        assert_eq!(automation.to_json().unwrap(), fixture);
    }
}

#[test]
fn test_decode_preserves_structure() {
    let automation = Automation::from_json(&hex()).unwrap();
    let tags: Vec<_> = automation.effects.iter().map(Effect::tag).collect();
    assert_eq!(tags, vec!["target", "counter", "condition", "check", "spell"]);

    // ieffect2 button automation is reachable through generic traversal.
    let ieffect = automation.effects[0].children()[0];
    assert_eq!(ieffect.tag(), "ieffect2");
    assert_eq!(ieffect.children().len(), 1);
    assert_eq!(ieffect.children()[0].children()[0].tag(), "damage");
}

#[test]
fn test_optional_fields_decode() {
    let automation = Automation::from_json(&shield_of_faith()).unwrap();
    let EffectKind::Roll(roll) = &automation.effects[1].kind else {
        panic!("expected a roll");
    };
    assert!(roll.hidden && roll.cantrip_scale && roll.fixed_value);
    assert_eq!(roll.display_name.as_deref(), Some("Blessing"));

    let save = automation.effects[2].children()[0];
    assert_eq!(save.meta.len(), 1);
    let EffectKind::Save(save) = &save.kind else {
        panic!("expected a save");
    };
    assert_eq!(save.adv.as_deref(), Some("-1"));
    let EffectKind::LegacyIEffect(ieffect) = &save.fail[0].kind else {
        panic!("expected a legacy ieffect");
    };
    assert_eq!(ieffect.duration, IntExpr::Expr("{blessing}".to_string()));
    assert!(ieffect.conc && ieffect.stacking && ieffect.end);
}

#[test]
fn test_every_tag_is_registered() {
    assert_eq!(TAGS.len(), 15);
    for tag in TAGS {
        let result = Effect::from_descriptor(json!({"type": tag}));
        assert!(
            !matches!(result, Err(DecodeError::UnknownType { .. })),
            "{tag} is not registered"
        );
    }
}

// ============================================================================
// Rejection
// ============================================================================

#[test]
fn test_unknown_tag_rejects_whole_tree() {
    let descriptors = vec![
        json!({"type": "damage", "damage": "1d6"}),
        json!({"type": "summon", "monster": "wolf"}),
    ];
    match decode(&descriptors) {
        Err(DecodeError::UnknownType { tag }) => assert_eq!(tag, "summon"),
        other => panic!("expected unknown type, got {other:?}"),
    }
}

#[test]
fn test_nested_unknown_tag_rejects_whole_tree() {
    let fixture = json!([{
        "type": "target",
        "target": "each",
        "effects": [{"type": "nope"}]
    }]);
    assert!(Automation::from_json(&fixture).is_err());
}

#[test]
fn test_missing_required_field() {
    let err = Effect::from_descriptor(json!({"type": "save", "stat": "dex", "fail": []})).unwrap_err();
    match err {
        DecodeError::InvalidFields { tag, .. } => assert_eq!(tag, "save"),
        other => panic!("expected invalid fields, got {other:?}"),
    }
    assert!(matches!(
        Effect::from_descriptor(json!({"damage": "1d6"})),
        Err(DecodeError::MissingType)
    ));
    assert!(matches!(Effect::from_descriptor(json!("damage")), Err(DecodeError::NotAnObject)));
}

#[test]
fn test_unknown_fields_are_ignored() {
    let effect = Effect::from_descriptor(json!({"type": "damage", "damage": "2d6", "legacyFlag": true})).unwrap();
    assert_eq!(effect, Effect::from(Damage::new("2d6")));
}

#[test]
fn test_invalid_target_keyword_decodes() {
    // Bad keywords are a run-time error, not a decode error.
    let effect = Effect::from_descriptor(json!({"type": "target", "target": "everyone", "effects": []})).unwrap();
    assert_eq!(effect.to_descriptor().unwrap()["target"], json!("everyone"));
}

// ============================================================================
// Meta
// ============================================================================

#[test]
fn test_empty_meta_is_omitted() {
    let encoded = Effect::new(Damage::new("1d4")).to_descriptor().unwrap();
    assert!(encoded.get("meta").is_none());

    let with_meta = Effect::new(Damage::new("{x}")).with_meta(vec![SetVariable::new("x", "2").into()]);
    let encoded = with_meta.to_descriptor().unwrap();
    assert_eq!(encoded["meta"][0]["type"], json!("variable"));
    assert_eq!(Effect::from_descriptor(encoded).unwrap(), with_meta);
}

// ============================================================================
// Generated trees
// ============================================================================

fn leaf() -> impl Strategy<Value = Effect> {
    prop_oneof![
        "[1-9]d(4|6|8|10)".prop_map(|d| Effect::from(Damage::new(d))),
        ("[a-z]{1,8}", "[1-9]d20", any::<bool>(), proptest::option::of("[A-Z][a-z]{1,6}")).prop_map(
            |(name, dice, hidden, display_name)| {
                Effect::from(Roll {
                    hidden,
                    display_name,
                    cantrip_scale: hidden,
                    ..Roll::new(dice, name)
                })
            }
        ),
        ("[a-z]{1,8}", 0i64..100, proptest::option::of("[0-9]")).prop_map(|(name, v, on_error)| {
            Effect::from(SetVariable {
                on_error,
                ..SetVariable::new(name, v.to_string())
            })
        }),
        ("[1-9]d(4|8)", any::<bool>()).prop_map(|(amount, cantrip_scale)| {
            Effect::from(TempHp {
                cantrip_scale,
                ..TempHp::new(amount)
            })
        }),
        ("[A-Z][a-z]{1,8}", 1i64..100, "-(ac|sb|cb) [1-5]", any::<bool>()).prop_map(
            |(name, duration, effects, conc)| {
                Effect::from(LegacyIEffect {
                    name,
                    duration: IntExpr::Int(duration),
                    effects,
                    end: !conc,
                    conc,
                    desc: None,
                    stacking: conc,
                })
            }
        ),
    ]
}

fn tree() -> impl Strategy<Value = Effect> {
    leaf().prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(|effects| Effect::from(Target::new("each", effects))),
            (prop::collection::vec(inner.clone(), 0..3), prop::collection::vec(inner.clone(), 0..3))
                .prop_map(|(t, f)| Effect::from(Condition::new("lastDamage > 3", t, f))),
            (
                "(str|dex|con|wis)",
                prop::collection::vec(inner.clone(), 0..3),
                prop::collection::vec(inner.clone(), 0..3),
                proptest::option::of("1[0-9]"),
                proptest::option::of("-?1"),
            )
                .prop_map(|(stat, fail, success, dc, adv)| {
                    Effect::from(Save {
                        dc,
                        adv,
                        ..Save::new(stat, fail, success)
                    })
                }),
            (inner.clone(), prop::collection::vec(inner, 1..3))
                .prop_map(|(node, meta): (Effect, Vec<Effect>)| node.with_meta(meta)),
        ]
    })
}

proptest! {
    #[test]
    fn prop_encode_decode_identity(effects in prop::collection::vec(tree(), 0..5)) {
        let encoded = encode(&effects).unwrap();
        let decoded = decode(&encoded).unwrap();
        prop_assert_eq!(&decoded, &effects);
        prop_assert_eq!(encode(&decoded).unwrap(), encoded);
    }

    #[test]
    fn prop_kind_matches_tag(effect in tree()) {
        let descriptor = effect.to_descriptor().unwrap();
        prop_assert_eq!(descriptor["type"].as_str(), Some(effect.tag()));
        let same_kind = matches!(
            (&effect.kind, &Effect::from_descriptor(descriptor).unwrap().kind),
            (EffectKind::Target(_), EffectKind::Target(_))
                | (EffectKind::Condition(_), EffectKind::Condition(_))
                | (EffectKind::Damage(_), EffectKind::Damage(_))
                | (EffectKind::Roll(_), EffectKind::Roll(_))
                | (EffectKind::SetVariable(_), EffectKind::SetVariable(_))
                | (EffectKind::TempHp(_), EffectKind::TempHp(_))
                | (EffectKind::LegacyIEffect(_), EffectKind::LegacyIEffect(_))
                | (EffectKind::Save(_), EffectKind::Save(_))
        );
        prop_assert!(same_kind);
    }
}
