//! Signature extractors
//!
//! The detector does not understand any programming language. Everything that
//! needs language knowledge goes through a [`SignatureExtractor`], resolved by the
//! language tag of the edited document.

use crate::descriptor::ChangeDescriptor;
use crate::types::{Declaration, DocumentId, LanguageId, Result, SyntaxNode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub mod plain;

// Re-export the reference extractor
pub use plain::{ApplyHook, PlainSignatureExtractor, PLAIN_LANGUAGE};

/// Returned by [`SignatureExtractor::declaration_at`] when its lookup was interrupted
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("declaration lookup was cancelled")]
pub struct LookupCancelled;

/// Everything an extractor needs to apply a resolved change
#[derive(Debug, Clone, Copy)]
pub struct ApplyRequest<'a> {
    /// Most recently resolved descriptor
    pub current: &'a ChangeDescriptor,
    /// Descriptor captured when tracking began
    pub initial: &'a ChangeDescriptor,
    /// Raw text of the declaration when tracking began
    pub original_text: &'a str,
    /// Apply without asking the user
    pub silent: bool,
}

/// Result of a change application that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyOutcome {
    /// The change was applied; tracking restarts from the new form
    Applied,
    /// The change was declined (e.g. the user cancelled a dialog)
    Rejected,
}

impl fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyOutcome::Applied => write!(f, "applied"),
            ApplyOutcome::Rejected => write!(f, "rejected"),
        }
    }
}

/// Per-language capability the detector relies on
///
/// Every method is "best effort": returning `None` means the location or edit
/// cannot be tracked, which the detector turns into a silent reset.
pub trait SignatureExtractor: Send + Sync {
    /// Language handled by this extractor
    fn language(&self) -> LanguageId;

    /// Find the declaration enclosing `offset` in `source`
    ///
    /// Implementations should poll `cancel` while scanning and give up with
    /// [`LookupCancelled`] once it fires.
    fn declaration_at(
        &self,
        source: &str,
        document: &DocumentId,
        offset: usize,
        cancel: &CancellationToken,
    ) -> std::result::Result<Option<Declaration>, LookupCancelled>;

    /// Build the initial descriptor for a declaration, or `None` if it is not trackable
    fn create_initial_descriptor(&self, declaration: &Declaration) -> Option<ChangeDescriptor>;

    /// Current signature text of the declaration reflected by `node`, or `None`
    /// if the node no longer belongs to the tracked declaration
    fn extract_signature_text(
        &self,
        node: &SyntaxNode<'_>,
        initial: &ChangeDescriptor,
    ) -> Option<String>;

    /// Fold one observed signature text into the running descriptor
    fn merge_observation(
        &self,
        signature_text: &str,
        previous: &ChangeDescriptor,
        original_name: Option<&str>,
    ) -> Option<ChangeDescriptor>;

    /// True for edits that must never start or extend tracking
    fn should_ignore(&self, node: &SyntaxNode<'_>) -> bool;

    /// Apply a resolved change (e.g. update call sites)
    fn perform_change(&self, request: ApplyRequest<'_>) -> Result<ApplyOutcome>;
}

/// Registry of signature extractors keyed by language
#[derive(Default, Clone)]
pub struct ExtractorRegistry {
    extractors: HashMap<LanguageId, Arc<dyn SignatureExtractor>>,
}

impl ExtractorRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extractor, replacing any previous one for the same language
    pub fn register(&mut self, extractor: impl SignatureExtractor + 'static) {
        self.register_shared(Arc::new(extractor));
    }

    /// Register an already shared extractor
    pub fn register_shared(&mut self, extractor: Arc<dyn SignatureExtractor>) {
        let language = extractor.language();
        if self.extractors.insert(language.clone(), extractor).is_some() {
            log::warn!("Replacing signature extractor for language: {}", language);
        } else {
            log::debug!("Registered signature extractor for language: {}", language);
        }
    }

    /// Get the extractor for a language
    pub fn get(&self, language: &LanguageId) -> Option<Arc<dyn SignatureExtractor>> {
        self.extractors.get(language).cloned()
    }

    pub fn contains(&self, language: &LanguageId) -> bool {
        self.extractors.contains_key(language)
    }

    /// All registered languages, sorted
    pub fn languages(&self) -> Vec<LanguageId> {
        let mut languages: Vec<LanguageId> = self.extractors.keys().cloned().collect();
        languages.sort_unstable();
        languages
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }
}

impl fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractorRegistry")
            .field("languages", &self.languages())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_registry() {
        let registry = ExtractorRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get(&LanguageId::new(PLAIN_LANGUAGE)).is_none());
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ExtractorRegistry::new();
        registry.register(PlainSignatureExtractor::new());

        let language = LanguageId::new(PLAIN_LANGUAGE);
        assert!(registry.contains(&language));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.languages(), vec![language.clone()]);

        let extractor = registry.get(&language).unwrap();
        assert_eq!(extractor.language(), language);
    }

    #[test]
    fn test_register_replaces_same_language() {
        let mut registry = ExtractorRegistry::new();
        registry.register(PlainSignatureExtractor::new());
        registry.register(PlainSignatureExtractor::new());
        assert_eq!(registry.len(), 1);
    }
}
