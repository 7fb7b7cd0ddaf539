//! Replay script loading and parsing
//!
//! A replay script is a TOML file describing the documents a simulated editor
//! opens and the steps (edits and queries) it performs on them.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use sigdrift_detector::{DetectorConfig, PLAIN_LANGUAGE};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// A complete replay script (loaded from a .toml file)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReplayScript {
    #[serde(default)]
    pub detector: DetectorConfig,
    pub documents: Vec<DocumentConfig>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DocumentConfig {
    pub id: String,
    #[serde(default = "default_language")]
    pub language: String,
    pub text: String,
}

fn default_language() -> String {
    PLAIN_LANGUAGE.to_string()
}

fn default_operation() -> String {
    "typing".to_string()
}

fn default_true() -> bool {
    true
}

/// One scripted action
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Step {
    /// Replace `delete` bytes at `offset` with `insert`
    Edit {
        document: String,
        offset: usize,
        #[serde(default)]
        delete: usize,
        #[serde(default)]
        insert: String,
        #[serde(default = "default_operation")]
        operation: String,
        #[serde(default = "default_true")]
        committed: bool,
    },
    Resolve {
        document: String,
    },
    Apply {
        document: String,
        #[serde(default)]
        silent: bool,
    },
    Dismiss {
        document: String,
    },
    /// Release the document's view
    Close {
        document: String,
    },
    Delete {
        document: String,
    },
    /// Toggle whether the project is ready for analysis
    Ready {
        value: bool,
    },
}

impl Step {
    pub fn document(&self) -> Option<&str> {
        match self {
            Step::Edit { document, .. }
            | Step::Resolve { document }
            | Step::Apply { document, .. }
            | Step::Dismiss { document }
            | Step::Close { document }
            | Step::Delete { document } => Some(document),
            Step::Ready { .. } => None,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Step::Edit { .. } => "edit",
            Step::Resolve { .. } => "resolve",
            Step::Apply { .. } => "apply",
            Step::Dismiss { .. } => "dismiss",
            Step::Close { .. } => "close",
            Step::Delete { .. } => "delete",
            Step::Ready { .. } => "ready",
        }
    }
}

impl ReplayScript {
    /// Check references between steps and documents
    pub fn validate(&self) -> Result<()> {
        self.detector
            .validate()
            .context("Invalid [detector] section")?;

        let mut ids = HashSet::new();
        for document in &self.documents {
            if !ids.insert(document.id.as_str()) {
                bail!("Duplicate document id: {:?}", document.id);
            }
        }

        for (index, step) in self.steps.iter().enumerate() {
            if let Some(document) = step.document() {
                if !ids.contains(document) {
                    bail!(
                        "Step {} ({}) refers to unknown document {:?}",
                        index + 1,
                        step.action(),
                        document
                    );
                }
            }
        }
        Ok(())
    }
}

/// Load a replay script from a TOML file
pub fn load_script(path: &Path) -> Result<ReplayScript> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read script file: {:?}", path))?;

    let script: ReplayScript = toml::from_str(&content)
        .with_context(|| format!("Failed to parse script file: {:?}", path))?;

    script
        .validate()
        .with_context(|| format!("Invalid script file: {:?}", path))?;

    Ok(script)
}
