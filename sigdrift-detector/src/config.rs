//! Detector configuration types
//!
//! This module defines the small set of knobs the detector exposes. Everything
//! language specific lives in the signature extractors, not here.

use crate::types::{DetectorError, LanguageId, Result};
use serde::{Deserialize, Serialize};

/// Operation names that may start tracking out of the box
pub const DEFAULT_QUALIFYING_OPERATIONS: &[&str] =
    &["typing", "paste", "cut", "drag-and-drop", "move-parameter"];

/// Configuration for the gesture detector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// User operations whose edits may start tracking
    #[serde(default = "default_qualifying_operations")]
    pub qualifying_operations: Vec<String>,

    /// Ignore raw edits on documents whose syntax tree is out of sync
    #[serde(default = "default_true")]
    pub require_committed: bool,

    /// Optional: only track declarations in these languages
    #[serde(default)]
    pub enabled_languages: Option<Vec<String>>,
}

fn default_qualifying_operations() -> Vec<String> {
    DEFAULT_QUALIFYING_OPERATIONS
        .iter()
        .map(|op| op.to_string())
        .collect()
}

fn default_true() -> bool {
    true
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            qualifying_operations: default_qualifying_operations(),
            require_committed: true,
            enabled_languages: None,
        }
    }
}

impl DetectorConfig {
    /// Create a new detector configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: replace the qualifying operation set
    pub fn with_qualifying_operations<I, S>(mut self, operations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.qualifying_operations = operations.into_iter().map(Into::into).collect();
        self
    }

    /// Builder method: add one qualifying operation
    pub fn add_qualifying_operation(mut self, operation: impl Into<String>) -> Self {
        self.qualifying_operations.push(operation.into());
        self
    }

    /// Builder method: require (or not) a committed syntax tree before tracking
    pub fn with_require_committed(mut self, enabled: bool) -> Self {
        self.require_committed = enabled;
        self
    }

    /// Builder method: set language filter
    pub fn with_language_filter(mut self, languages: Vec<String>) -> Self {
        self.enabled_languages = Some(languages);
        self
    }

    /// Check if an operation name may start tracking
    pub fn is_qualifying_operation(&self, operation: Option<&str>) -> bool {
        match operation {
            Some(name) => self.qualifying_operations.iter().any(|op| op == name),
            None => false,
        }
    }

    /// Check if declarations in a language should be tracked
    pub fn is_language_enabled(&self, language: &LanguageId) -> bool {
        match &self.enabled_languages {
            Some(languages) => languages.iter().any(|l| l == language.as_str()),
            None => true,
        }
    }

    /// Reject configurations that can never start tracking
    pub fn validate(&self) -> Result<()> {
        if self.qualifying_operations.is_empty() {
            return Err(DetectorError::InvalidConfig(
                "qualifying_operations must not be empty".to_string(),
            ));
        }
        if let Some(op) = self.qualifying_operations.iter().find(|op| op.trim().is_empty()) {
            return Err(DetectorError::InvalidConfig(format!(
                "blank qualifying operation name: {:?}",
                op
            )));
        }
        if matches!(&self.enabled_languages, Some(languages) if languages.is_empty()) {
            return Err(DetectorError::InvalidConfig(
                "enabled_languages is set but empty".to_string(),
            ));
        }
        Ok(())
    }
}
