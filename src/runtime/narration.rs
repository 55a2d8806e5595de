//! Narration queue.
//!
//! Effects describe what happened by queuing lines. Lines accumulate in a
//! pending buffer until `push_field` groups them under a title (one field
//! per target, per iteration, per text block). Meta lines (errors,
//! warnings, untargeted output) collect separately and are shown before the
//! fields. The interpreter only guarantees append order; presentation is the
//! caller's job.

use serde::{Deserialize, Serialize};

/// A titled group of narration lines.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrationField {
    /// Field title, if any.
    pub title: Option<String>,
    /// Lines joined with newlines.
    pub body: String,
    /// Whether the field may be displayed inline.
    pub inline: bool,
}

/// Ordered, append-only narration for one automation run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Narration {
    meta: Vec<String>,
    pending: Vec<String>,
    fields: Vec<NarrationField>,
    postflight: Vec<NarrationField>,
}

impl Narration {
    /// Create an empty narration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a line into the pending buffer.
    pub fn queue(&mut self, line: impl Into<String>) {
        self.pending.push(line.into());
    }

    /// Queue a meta line (errors, warnings).
    pub fn meta_queue(&mut self, line: impl Into<String>) {
        let line = line.into();
        if !self.meta.contains(&line) {
            self.meta.push(line);
        }
    }

    /// Flush pending lines into a field. Does nothing if nothing is pending.
    pub fn push_field(&mut self, title: Option<&str>, inline: bool) {
        if self.pending.is_empty() {
            return;
        }
        let body = self.pending.join("\n");
        self.pending.clear();
        self.fields.push(NarrationField {
            title: title.map(str::to_string),
            body,
            inline,
        });
    }

    /// Flush pending lines into the meta lines.
    pub fn push_to_meta(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        self.meta.extend(pending);
    }

    /// Add a complete field shown after all other fields.
    pub fn postflight_field(&mut self, title: impl Into<String>, body: impl Into<String>) {
        self.postflight.push(NarrationField {
            title: Some(title.into()),
            body: body.into(),
            inline: false,
        });
    }

    /// Meta lines in order.
    #[must_use]
    pub fn meta_lines(&self) -> &[String] {
        &self.meta
    }

    /// Lines not yet grouped into a field.
    #[must_use]
    pub fn pending(&self) -> &[String] {
        &self.pending
    }

    /// Fields in order.
    #[must_use]
    pub fn fields(&self) -> &[NarrationField] {
        &self.fields
    }

    /// Fields added with [`Self::postflight_field`].
    #[must_use]
    pub fn postflight_fields(&self) -> &[NarrationField] {
        &self.postflight
    }

    /// Whether nothing has been narrated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.meta.is_empty()
            && self.pending.is_empty()
            && self.fields.is_empty()
            && self.postflight.is_empty()
    }

    /// Render everything as plain text: meta lines, fields, any pending
    /// lines, then postflight fields.
    #[must_use]
    pub fn render(&self) -> String {
        let mut blocks: Vec<String> = Vec::new();
        if !self.meta.is_empty() {
            blocks.push(self.meta.join("\n"));
        }
        let render = |field: &NarrationField| match &field.title {
            Some(title) => format!("**{title}**\n{}", field.body),
            None => field.body.clone(),
        };
        blocks.extend(self.fields.iter().map(render));
        if !self.pending.is_empty() {
            blocks.push(self.pending.join("\n"));
        }
        blocks.extend(self.postflight.iter().map(render));
        blocks.join("\n\n")
    }
}
