//! Tracking registry
//!
//! Maps every open document to its tracking state. An entry exists exactly as
//! long as at least one view is attached to the document.

use crate::tracking::TrackingState;
use crate::types::{DocumentId, LanguageId};
use serde::Serialize;
use std::collections::HashMap;

/// Registry entry for one open document
#[derive(Debug)]
pub struct DocumentEntry {
    /// Language of the document
    pub language: LanguageId,
    /// Number of views currently attached
    views: usize,
    /// Tracking state machine for the document
    pub state: TrackingState,
}

impl DocumentEntry {
    fn new(language: LanguageId) -> Self {
        Self {
            language,
            views: 1,
            state: TrackingState::new(),
        }
    }

    pub fn views(&self) -> usize {
        self.views
    }
}

/// Registry statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RegistryStats {
    /// Documents with at least one attached view
    pub open_documents: usize,
    /// Documents whose tracking state is active
    pub tracking_documents: usize,
    /// Observations buffered across all documents
    pub pending_observations: usize,
}

/// Map from document identity to tracking state
#[derive(Debug, Default)]
pub struct TrackingRegistry {
    entries: HashMap<DocumentId, DocumentEntry>,
}

impl TrackingRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a view attaching to a document
    ///
    /// Returns true if this created the entry (first view).
    pub fn attach(&mut self, document: DocumentId, language: LanguageId) -> bool {
        match self.entries.get_mut(&document) {
            Some(entry) => {
                entry.views += 1;
                if entry.language != language {
                    log::warn!(
                        "Document {} re-attached as {} (was {}), keeping original language",
                        document,
                        language,
                        entry.language
                    );
                }
                false
            }
            None => {
                log::debug!("Registry entry created: {} ({})", document, language);
                self.entries.insert(document, DocumentEntry::new(language));
                true
            }
        }
    }

    /// Record a view releasing a document
    ///
    /// Returns the entry if this was the last view, which removes it.
    pub fn release(&mut self, document: &DocumentId) -> Option<DocumentEntry> {
        let entry = self.entries.get_mut(document)?;
        entry.views = entry.views.saturating_sub(1);
        if entry.views > 0 {
            return None;
        }
        log::debug!("Registry entry removed: {} (last view released)", document);
        self.entries.remove(document)
    }

    /// Drop an entry regardless of attached views (content deleted)
    pub fn remove(&mut self, document: &DocumentId) -> Option<DocumentEntry> {
        let removed = self.entries.remove(document);
        if removed.is_some() {
            log::debug!("Registry entry removed: {} (content deleted)", document);
        }
        removed
    }

    pub fn get(&self, document: &DocumentId) -> Option<&DocumentEntry> {
        self.entries.get(document)
    }

    pub fn get_mut(&mut self, document: &DocumentId) -> Option<&mut DocumentEntry> {
        self.entries.get_mut(document)
    }

    /// Tracking state of a document
    pub fn state(&self, document: &DocumentId) -> Option<&TrackingState> {
        self.entries.get(document).map(|entry| &entry.state)
    }

    pub fn state_mut(&mut self, document: &DocumentId) -> Option<&mut TrackingState> {
        self.entries.get_mut(document).map(|entry| &mut entry.state)
    }

    pub fn contains(&self, document: &DocumentId) -> bool {
        self.entries.contains_key(document)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All open documents, sorted
    pub fn documents(&self) -> Vec<DocumentId> {
        let mut documents: Vec<DocumentId> = self.entries.keys().cloned().collect();
        documents.sort_unstable();
        documents
    }

    /// Remove every entry, returning how many were dropped
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    /// Get registry statistics
    pub fn stats(&self) -> RegistryStats {
        let tracking_documents = self
            .entries
            .values()
            .filter(|entry| entry.state.is_tracking())
            .count();
        let pending_observations = self
            .entries
            .values()
            .map(|entry| entry.state.pending_len())
            .sum();

        RegistryStats {
            open_documents: self.entries.len(),
            tracking_documents,
            pending_observations,
        }
    }
}
