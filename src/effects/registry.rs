//! The descriptor format and the tag registry.
//!
//! A persisted effect is a JSON object with a `type` tag, the variant's own
//! fields, and an optional `meta` list of nested descriptors:
//!
//! ```json
//! {"type": "damage", "damage": "1d6 [fire]", "meta": [{"type": "roll", "dice": "1d4", "name": "bonus"}]}
//! ```
//!
//! Decoding maps the tag to its variant with an exhaustive match, so the
//! registry is fixed at compile time and shared freely between runs.
//! Unknown fields are ignored; missing required fields and unknown tags
//! fail the whole decode. An empty `meta` is never written.

use serde::de::{self, Deserialize, DeserializeOwned, Deserializer};
use serde::ser::{self, Serialize, Serializer};
use serde_json::{Map, Value as Json};
use thiserror::Error;

use super::effect::{Effect, EffectKind};

/// Every registered tag.
pub const TAGS: [&str; 15] = [
    "target",
    "attack",
    "save",
    "damage",
    "temphp",
    "ieffect",
    "ieffect2",
    "remove_ieffect",
    "roll",
    "text",
    "variable",
    "condition",
    "counter",
    "spell",
    "check",
];

/// Errors decoding descriptors into effects.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The tag is not registered.
    #[error("unknown effect type `{tag}`")]
    UnknownType { tag: String },

    /// The descriptor has no string `type` field.
    #[error("effect descriptor has no `type`")]
    MissingType,

    /// The descriptor is not an object.
    #[error("effect descriptor must be an object")]
    NotAnObject,

    /// The variant's fields are missing or malformed.
    #[error("invalid `{tag}` effect: {source}")]
    InvalidFields {
        tag: String,
        #[source]
        source: serde_json::Error,
    },

    /// An automation must be a list of descriptors.
    #[error("automation must be a list of effects")]
    NotAList,
}

fn fields<T: DeserializeOwned>(tag: &str, fields: Json) -> Result<T, DecodeError> {
    serde_json::from_value(fields).map_err(|source| DecodeError::InvalidFields {
        tag: tag.to_string(),
        source,
    })
}

impl Effect {
    /// Decode one descriptor.
    pub fn from_descriptor(descriptor: Json) -> Result<Self, DecodeError> {
        let Json::Object(mut map) = descriptor else {
            return Err(DecodeError::NotAnObject);
        };
        let tag = match map.remove("type") {
            Some(Json::String(tag)) => tag,
            _ => return Err(DecodeError::MissingType),
        };
        let meta = match map.remove("meta") {
            None | Some(Json::Null) => Vec::new(),
            Some(meta) => decode_value(meta).map_err(|e| match e {
                DecodeError::NotAList => DecodeError::InvalidFields {
                    tag: tag.clone(),
                    source: <serde_json::Error as de::Error>::custom(
                        "`meta` must be a list of effects",
                    ),
                },
                other => other,
            })?,
        };

        let body = Json::Object(map);
        let kind = match tag.as_str() {
            "target" => EffectKind::Target(fields(&tag, body)?),
            "attack" => EffectKind::Attack(fields(&tag, body)?),
            "save" => EffectKind::Save(fields(&tag, body)?),
            "damage" => EffectKind::Damage(fields(&tag, body)?),
            "temphp" => EffectKind::TempHp(fields(&tag, body)?),
            "ieffect" => EffectKind::LegacyIEffect(fields(&tag, body)?),
            "ieffect2" => EffectKind::IEffect(fields(&tag, body)?),
            "remove_ieffect" => EffectKind::RemoveIEffect(fields(&tag, body)?),
            "roll" => EffectKind::Roll(fields(&tag, body)?),
            "text" => EffectKind::Text(fields(&tag, body)?),
            "variable" => EffectKind::SetVariable(fields(&tag, body)?),
            "condition" => EffectKind::Condition(fields(&tag, body)?),
            "counter" => EffectKind::UseCounter(fields(&tag, body)?),
            "spell" => EffectKind::CastSpell(fields(&tag, body)?),
            "check" => EffectKind::Check(fields(&tag, body)?),
            _ => return Err(DecodeError::UnknownType { tag }),
        };

        Ok(Effect { kind, meta })
    }

    /// Encode as a descriptor.
    pub fn to_descriptor(&self) -> Result<Json, serde_json::Error> {
        let body = match &self.kind {
            EffectKind::Target(e) => serde_json::to_value(e)?,
            EffectKind::Attack(e) => serde_json::to_value(e)?,
            EffectKind::Save(e) => serde_json::to_value(e)?,
            EffectKind::Damage(e) => serde_json::to_value(e)?,
            EffectKind::TempHp(e) => serde_json::to_value(e)?,
            EffectKind::LegacyIEffect(e) => serde_json::to_value(e)?,
            EffectKind::IEffect(e) => serde_json::to_value(e)?,
            EffectKind::RemoveIEffect(e) => serde_json::to_value(e)?,
            EffectKind::Roll(e) => serde_json::to_value(e)?,
            EffectKind::Text(e) => serde_json::to_value(e)?,
            EffectKind::SetVariable(e) => serde_json::to_value(e)?,
            EffectKind::Condition(e) => serde_json::to_value(e)?,
            EffectKind::UseCounter(e) => serde_json::to_value(e)?,
            EffectKind::CastSpell(e) => serde_json::to_value(e)?,
            EffectKind::Check(e) => serde_json::to_value(e)?,
        };

        let mut map = match body {
            Json::Object(map) => map,
            _ => Map::new(),
        };
        map.insert("type".to_string(), Json::String(self.tag().to_string()));
        if !self.meta.is_empty() {
            map.insert("meta".to_string(), Json::Array(encode(&self.meta)?));
        }
        Ok(Json::Object(map))
    }
}

impl Serialize for Effect {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_descriptor()
            .map_err(ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Effect {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let descriptor = Json::deserialize(deserializer)?;
        Effect::from_descriptor(descriptor).map_err(de::Error::custom)
    }
}

/// Decode a list of descriptors, preserving order.
pub fn decode(descriptors: &[Json]) -> Result<Vec<Effect>, DecodeError> {
    descriptors.iter().cloned().map(Effect::from_descriptor).collect()
}

/// Decode a JSON value that must be a list of descriptors.
pub fn decode_value(value: Json) -> Result<Vec<Effect>, DecodeError> {
    match value {
        Json::Array(descriptors) => descriptors.into_iter().map(Effect::from_descriptor).collect(),
        _ => Err(DecodeError::NotAList),
    }
}

/// Encode effects as descriptors, preserving order.
pub fn encode(effects: &[Effect]) -> Result<Vec<Json>, serde_json::Error> {
    effects.iter().map(Effect::to_descriptor).collect()
}
