//! Interpreter configuration.
//!
//! Callers configure the interpreter per invocation with an
//! `AutomationConfig`. Every field has a default, so most callers only
//! override the seed in tests:
//!
//! ```
//! use effect_automation::core::AutomationConfig;
//!
//! let config = AutomationConfig::new().with_seed(42).with_max_iterations(5);
//! assert_eq!(config.max_iterations, 5);
//!
//! let parsed = AutomationConfig::from_json_str(r#"{"max_depth": 3}"#).unwrap();
//! assert_eq!(parsed.max_depth, 3);
//! assert_eq!(parsed.max_iterations, 25);
//! ```

use serde::{Deserialize, Serialize};

/// Default cap on repeated target iterations.
pub const DEFAULT_MAX_ITERATIONS: u32 = 25;

/// Default cap on a single Text effect's length.
pub const DEFAULT_MAX_TEXT_LENGTH: usize = 1020;

/// Default cap on nested automation depth.
pub const DEFAULT_MAX_DEPTH: u32 = 10;

/// Configuration for one automation invocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// Maximum number of times a Target effect repeats its children.
    pub max_iterations: u32,

    /// Text effects longer than this are truncated with `...`.
    pub max_text_length: usize,

    /// Maximum nesting of automation inside automation (spells cast by
    /// automation). Exceeding it is a recoverable error.
    pub max_depth: u32,

    /// Dice seed. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl AutomationConfig {
    /// Create a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Set the iteration cap.
    #[must_use]
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Set the text length cap.
    #[must_use]
    pub fn with_max_text_length(mut self, max: usize) -> Self {
        self.max_text_length = max;
        self
    }

    /// Set the nesting cap.
    #[must_use]
    pub fn with_max_depth(mut self, max: u32) -> Self {
        self.max_depth = max;
        self
    }

    /// Set a deterministic dice seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
            max_depth: DEFAULT_MAX_DEPTH,
            seed: None,
        }
    }
}
