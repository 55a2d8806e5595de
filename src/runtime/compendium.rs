//! External game-data lookups.
//!
//! Spells, entity texts and limited-use names live outside the interpreter
//! (a database, an HTTP service). Effects reach them only during preflight,
//! through the async [`Compendium`] trait; the results are cached in the
//! automation context so the synchronous run never suspends.

use std::sync::Arc;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::effects::Effect;

/// A reference to a compendium entity (feature, item, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// Entity ID.
    pub id: i64,
    /// Entity type ID.
    #[serde(rename = "typeId")]
    pub type_id: i64,
}

impl EntityRef {
    /// Create an entity reference.
    #[must_use]
    pub const fn new(id: i64, type_id: i64) -> Self {
        Self { id, type_id }
    }
}

/// A castable spell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Spell {
    /// Compendium ID.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Base spell level. Zero is a cantrip.
    pub level: u8,
    /// Whether casting requires concentration.
    #[serde(default)]
    pub concentration: bool,
    /// The spell's own automation.
    #[serde(default)]
    pub automation: Vec<Effect>,
}

/// A lookup failure in the backing store.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("compendium lookup failed: {0}")]
pub struct CompendiumError(pub String);

/// Async access to game data.
#[async_trait]
pub trait Compendium: Send + Sync {
    /// Look up a spell by ID.
    async fn spell(&self, id: i64) -> Result<Option<Spell>, CompendiumError>;

    /// Look up an entity's descriptive text.
    async fn entity_text(&self, entity: EntityRef) -> Result<Option<String>, CompendiumError>;

    /// Look up the counter name of a limited-use entity.
    async fn limited_use(&self, entity: EntityRef) -> Result<Option<String>, CompendiumError>;
}

/// In-memory compendium.
#[derive(Clone, Debug, Default)]
pub struct MemoryCompendium {
    spells: FxHashMap<i64, Spell>,
    texts: FxHashMap<EntityRef, String>,
    limited_uses: FxHashMap<EntityRef, String>,
}

impl MemoryCompendium {
    /// Create an empty compendium.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a spell (builder pattern).
    #[must_use]
    pub fn with_spell(mut self, spell: Spell) -> Self {
        self.spells.insert(spell.id, spell);
        self
    }

    /// Add an entity text (builder pattern).
    #[must_use]
    pub fn with_text(mut self, entity: EntityRef, text: impl Into<String>) -> Self {
        self.texts.insert(entity, text.into());
        self
    }

    /// Add a limited-use counter name (builder pattern).
    #[must_use]
    pub fn with_limited_use(mut self, entity: EntityRef, counter: impl Into<String>) -> Self {
        self.limited_uses.insert(entity, counter.into());
        self
    }

    /// Wrap in an `Arc` for use in a context.
    #[must_use]
    pub fn shared(self) -> Arc<dyn Compendium> {
        Arc::new(self)
    }
}

#[async_trait]
impl Compendium for MemoryCompendium {
    async fn spell(&self, id: i64) -> Result<Option<Spell>, CompendiumError> {
        Ok(self.spells.get(&id).cloned())
    }

    async fn entity_text(&self, entity: EntityRef) -> Result<Option<String>, CompendiumError> {
        Ok(self.texts.get(&entity).cloned())
    }

    async fn limited_use(&self, entity: EntityRef) -> Result<Option<String>, CompendiumError> {
        Ok(self.limited_uses.get(&entity).cloned())
    }
}
