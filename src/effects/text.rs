//! Free-form text.
//!
//! Text is either written inline (with `{expr}` annotations) or refers to a
//! compendium entity whose text is fetched during preflight.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::combat::Combatant;
use crate::eval::Evaluator;
use crate::runtime::{AutomationContext, AutomationError, EntityRef, Signal};

use super::effect::EffectNode;
use super::results::{EffectResult, TextResult};

/// Where a text effect's text comes from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextSource {
    Inline(String),
    Entity(EntityRef),
}

/// Show a block of text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Text {
    pub text: TextSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Text {
    /// Inline text.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: TextSource::Inline(text.into()),
            title: None,
        }
    }

    /// Text of a compendium entity.
    #[must_use]
    pub fn entity(entity: EntityRef) -> Self {
        Self {
            text: TextSource::Entity(entity),
            title: None,
        }
    }
}

fn truncate(text: String, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text,
    }
}

#[async_trait]
impl EffectNode for Text {
    async fn preflight(&self, ctx: &mut AutomationContext) {
        let &TextSource::Entity(entity) = &self.text else {
            return;
        };
        if ctx.cache().text(entity).is_some() {
            return;
        }
        match ctx.compendium().entity_text(entity).await {
            Ok(Some(text)) => ctx.cache_mut().insert_text(entity, text),
            Ok(None) => warn!(id = entity.id, type_id = entity.type_id, "entity text not found"),
            Err(e) => warn!(id = entity.id, type_id = entity.type_id, error = %e, "failed to load entity text"),
        }
    }

    fn run(&self, ctx: &mut AutomationContext) -> Result<Option<EffectResult>, Signal> {
        let text = match &self.text {
            TextSource::Inline(text) => ctx.transformed_str(text)?,
            TextSource::Entity(entity) => ctx
                .cache()
                .text(*entity)
                .map(str::to_string)
                .ok_or_else(|| {
                    AutomationError::Evaluation(format!(
                        "Text for entity {} (type {}) has not been loaded.",
                        entity.id, entity.type_id
                    ))
                })?,
        };
        let text = truncate(text, ctx.config().max_text_length);
        if text.is_empty() {
            return Ok(None);
        }

        let title = self.title.as_deref().unwrap_or("Effect");
        ctx.narration_mut().postflight_field(title, text.clone());
        Ok(Some(EffectResult::Text(TextResult { text })))
    }

    fn build_str(&self, _caster: &Combatant, _evaluator: &Evaluator) -> String {
        String::new()
    }
}
