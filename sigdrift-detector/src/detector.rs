//! Main detector API
//!
//! This module provides the primary interface for the library. The
//! [`GestureDetector`] owns the tracking registry, receives edit notifications from
//! the host editing surface, and answers pull-based queries about the signature
//! change currently being made in each document.

use crate::config::DetectorConfig;
use crate::descriptor::ChangeDescriptor;
use crate::extractor::{ApplyOutcome, ApplyRequest, ExtractorRegistry, LookupCancelled};
use crate::registry::{RegistryStats, TrackingRegistry};
use crate::tracking::{Capture, PendingObservations};
use crate::types::{
    DeclarationRef, DetectorError, DocumentId, LanguageId, RawEdit, Result, StructuralEdit,
    SyntaxNode, TextRange,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Answers whether the project is ready for semantic analysis
///
/// While a project is indexing (or otherwise in bulk mode) declaration lookups
/// are unreliable, so the detector does not track anything.
pub trait ProjectStatus: Send + Sync {
    fn is_ready_for_analysis(&self) -> bool;
}

/// Project status for hosts without an indexing phase
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReady;

impl ProjectStatus for AlwaysReady {
    fn is_ready_for_analysis(&self) -> bool {
        true
    }
}

impl<F> ProjectStatus for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_ready_for_analysis(&self) -> bool {
        self()
    }
}

/// Clears the suspension flag when dropped, whatever the apply step did
struct Suspension<'a> {
    flag: &'a mut bool,
}

impl<'a> Suspension<'a> {
    fn engage(flag: &'a mut bool) -> Self {
        *flag = true;
        Self { flag }
    }
}

impl Drop for Suspension<'_> {
    fn drop(&mut self) {
        *self.flag = false;
    }
}

/// The gesture detector - entry point for all tracking operations
pub struct GestureDetector {
    config: DetectorConfig,
    extractors: ExtractorRegistry,
    registry: TrackingRegistry,
    project: Arc<dyn ProjectStatus>,
    /// Set while a change is being applied; edits are not interpreted meanwhile
    suspended: bool,
    lookup_cancel: CancellationToken,
}

impl GestureDetector {
    /// Create a new detector with the default configuration
    ///
    /// # Example
    /// ```
    /// use sigdrift_detector::{ExtractorRegistry, GestureDetector, PlainSignatureExtractor};
    ///
    /// let mut extractors = ExtractorRegistry::new();
    /// extractors.register(PlainSignatureExtractor::new());
    ///
    /// let detector = GestureDetector::new(extractors);
    /// assert_eq!(detector.stats().open_documents, 0);
    /// ```
    pub fn new(extractors: ExtractorRegistry) -> Self {
        Self {
            config: DetectorConfig::default(),
            extractors,
            registry: TrackingRegistry::new(),
            project: Arc::new(AlwaysReady),
            suspended: false,
            lookup_cancel: CancellationToken::new(),
        }
    }

    /// Create a detector with an explicit configuration
    ///
    /// # Returns
    /// * `Err(DetectorError::InvalidConfig)` if the configuration can never track anything
    pub fn with_config(config: DetectorConfig, extractors: ExtractorRegistry) -> Result<Self> {
        config.validate()?;
        let mut detector = Self::new(extractors);
        detector.config = config;
        Ok(detector)
    }

    /// Builder method: consult `status` before tracking anything
    pub fn with_project_status(mut self, status: impl ProjectStatus + 'static) -> Self {
        self.project = Arc::new(status);
        self
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn extractors(&self) -> &ExtractorRegistry {
        &self.extractors
    }

    pub fn registry(&self) -> &TrackingRegistry {
        &self.registry
    }

    // ------------------------------------------------------------------
    // Document lifecycle
    // ------------------------------------------------------------------

    /// A view attached to a document
    ///
    /// Returns true if the document was not open before.
    pub fn view_attached(&mut self, document: DocumentId, language: LanguageId) -> bool {
        if !self.extractors.contains(&language) {
            log::debug!(
                "No signature extractor for {} ({}), edits will not be tracked",
                document,
                language
            );
        }
        self.registry.attach(document, language)
    }

    /// A view released a document
    ///
    /// Returns true if this was the last view and the document's state was dropped.
    pub fn view_released(&mut self, document: &DocumentId) -> bool {
        self.registry.release(document).is_some()
    }

    /// The document's content was deleted; its state is dropped immediately
    pub fn document_deleted(&mut self, document: &DocumentId) -> bool {
        self.registry.remove(document).is_some()
    }

    /// Tear down: cancel lookups and drop every remaining entry
    ///
    /// Returns the number of entries that were still registered. Hosts release
    /// every view before shutting down, so anything non-zero points at a leak.
    pub fn detach_all(&mut self) -> usize {
        self.cancel_pending_lookups();
        let leaked = self.registry.clear();
        if leaked > 0 {
            log::warn!("{} document(s) still registered when detaching", leaked);
        }
        leaked
    }

    // ------------------------------------------------------------------
    // Edit notifications
    // ------------------------------------------------------------------

    /// Handle a raw pre-edit notification
    ///
    /// Only used to start tracking. Returns true if this edit started tracking a
    /// declaration.
    pub fn on_raw_edit(&mut self, edit: &RawEdit<'_>) -> bool {
        if self.suspended {
            log::trace!("Suspended, ignoring raw edit in {}", edit.document);
            return false;
        }

        let Some(entry) = self.registry.get(edit.document) else {
            log::trace!("Raw edit for unregistered document {}", edit.document);
            return false;
        };
        if entry.state.is_tracking() {
            return false;
        }
        if !self.project.is_ready_for_analysis() {
            log::debug!("Project not ready for analysis, not tracking {}", edit.document);
            return false;
        }
        if self.config.require_committed && !edit.committed {
            log::trace!("Document {} is uncommitted, not tracking", edit.document);
            return false;
        }
        if !self.config.is_qualifying_operation(edit.operation) {
            log::trace!("Operation {:?} does not start tracking", edit.operation);
            return false;
        }
        if !self.config.is_language_enabled(&entry.language) {
            return false;
        }
        let Some(extractor) = self.extractors.get(&entry.language) else {
            return false;
        };

        let edited = SyntaxNode::new(
            edit.document,
            edit.text,
            TextRange::new(edit.offset, edit.offset + edit.removed.len()),
        );
        if extractor.should_ignore(&edited) {
            return false;
        }

        let cancel = self.lookup_cancel.child_token();
        let declaration =
            match extractor.declaration_at(edit.text, edit.document, edit.offset, &cancel) {
                Ok(Some(declaration)) => declaration,
                Ok(None) => return false,
                Err(LookupCancelled) => {
                    log::debug!(
                        "Declaration lookup cancelled at {}:{}, not trackable now",
                        edit.document,
                        edit.offset
                    );
                    return false;
                }
            };

        // Never capture a declaration that runs up to the end of the document
        if edit.text.len() <= declaration.range.end {
            log::debug!(
                "Declaration {} reaches the end of {}, not tracking",
                declaration.range,
                edit.document
            );
            return false;
        }

        let Some(initial) = extractor.create_initial_descriptor(&declaration) else {
            return false;
        };
        let original_node = SyntaxNode::new(edit.document, edit.text, declaration.range);
        let original_signature = extractor
            .extract_signature_text(&original_node, &initial)
            .unwrap_or_else(|| declaration.text.clone());

        let capture = Capture {
            original_text: declaration.text,
            original_signature,
            original_name: declaration.name,
            initial,
        };

        match self.registry.state_mut(edit.document) {
            Some(state) => state.start(capture),
            None => false,
        }
    }

    /// Handle a structural post-edit notification
    ///
    /// Only used to extend tracking that is already active. Returns true if a new
    /// observation was buffered.
    pub fn on_structural_edit(&mut self, edit: &StructuralEdit<'_>) -> bool {
        if self.suspended {
            log::trace!("Suspended, ignoring structural edit in {}", edit.document());
            return false;
        }
        if !self.project.is_ready_for_analysis() {
            return false;
        }

        let Some(entry) = self.registry.get_mut(edit.document()) else {
            return false;
        };
        if !entry.state.is_tracking() {
            return false;
        }
        let Some(extractor) = self.extractors.get(&entry.language) else {
            return false;
        };
        if extractor.should_ignore(&edit.node) {
            log::trace!("Ignoring {} at {}", edit.kind, edit.node.range);
            return false;
        }

        let Some(initial) = entry.state.initial() else {
            return false;
        };
        match extractor.extract_signature_text(&edit.node, initial) {
            Some(signature) => entry.state.extend(signature),
            None => {
                log::debug!(
                    "Tracked declaration in {} is no longer extractable after {}, resetting",
                    edit.document(),
                    edit.kind
                );
                entry.state.reinit();
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// True if `declaration` is the one currently tracked in its document
    pub fn is_tracking_active(&self, declaration: &DeclarationRef) -> bool {
        self.registry
            .state(&declaration.document)
            .and_then(|state| state.declaration())
            .is_some_and(|tracked| tracked == declaration)
    }

    /// True if any declaration is tracked in `document`
    pub fn is_tracking_document(&self, document: &DocumentId) -> bool {
        self.registry
            .state(document)
            .is_some_and(|state| state.is_tracking())
    }

    /// Descriptor captured when tracking began in `document`
    pub fn initial_descriptor(&self, document: &DocumentId) -> Option<&ChangeDescriptor> {
        self.registry.state(document)?.initial()
    }

    /// Raw text of the tracked declaration when tracking began
    pub fn original_text(&self, document: &DocumentId) -> Option<&str> {
        self.registry.state(document)?.original_text()
    }

    /// Read-only handle to a document's observation buffer
    pub fn pending_observations(&self, document: &DocumentId) -> Option<PendingObservations> {
        self.registry.state(document).map(|state| state.pending())
    }

    /// Resolve the change currently being made in `document`
    ///
    /// Drains the buffered observations. Returns `None` if nothing is tracked, the
    /// edits reverted the declaration, or they could not be reconciled.
    pub fn resolve_current_descriptor(&mut self, document: &DocumentId) -> Option<ChangeDescriptor> {
        let entry = self.registry.get_mut(document)?;
        let extractor = self.extractors.get(&entry.language)?;
        entry.state.resolve(extractor.as_ref())
    }

    /// Stop tracking `declaration`, if it is the tracked one
    pub fn dismiss_declaration(&mut self, declaration: &DeclarationRef) -> bool {
        if !self.is_tracking_active(declaration) {
            return false;
        }
        self.dismiss_document(&declaration.document)
    }

    /// Stop tracking whatever is tracked in `document`
    pub fn dismiss_document(&mut self, document: &DocumentId) -> bool {
        match self.registry.state_mut(document) {
            Some(state) if state.is_tracking() => {
                log::debug!("Tracking dismissed in {}", document);
                state.reinit();
                true
            }
            _ => false,
        }
    }

    /// Get registry statistics
    pub fn stats(&self) -> RegistryStats {
        self.registry.stats()
    }

    // ------------------------------------------------------------------
    // Applying changes
    // ------------------------------------------------------------------

    /// Apply the change currently being made in `document`
    ///
    /// Edits are not interpreted while the extractor applies the change. On
    /// [`ApplyOutcome::Applied`] the document's tracking restarts from scratch (the
    /// document stays registered); on rejection or failure tracking stays active so
    /// the user can retry.
    pub fn apply_change(&mut self, document: &DocumentId, silent: bool) -> Result<ApplyOutcome> {
        let language = self
            .registry
            .get(document)
            .map(|entry| entry.language.clone())
            .ok_or_else(|| DetectorError::UnknownDocument(document.clone()))?;
        let extractor = self
            .extractors
            .get(&language)
            .ok_or(DetectorError::NoExtractor(language))?;

        let current = self
            .resolve_current_descriptor(document)
            .ok_or_else(|| DetectorError::NotTracking(document.clone()))?;
        let (initial, original_text) = self
            .registry
            .state(document)
            .and_then(|state| Some((state.initial()?.clone(), state.original_text()?.to_string())))
            .ok_or_else(|| DetectorError::NotTracking(document.clone()))?;

        let outcome = {
            let _suspension = Suspension::engage(&mut self.suspended);
            extractor.perform_change(ApplyRequest {
                current: &current,
                initial: &initial,
                original_text: &original_text,
                silent,
            })
        };

        match &outcome {
            Ok(ApplyOutcome::Applied) => {
                log::info!("Applied signature change in {}: {}", document, current);
                if let Some(state) = self.registry.state_mut(document) {
                    state.reinit();
                }
            }
            Ok(ApplyOutcome::Rejected) => {
                log::info!("Signature change in {} was rejected", document);
            }
            Err(e) => {
                log::warn!("Failed to apply signature change in {}: {}", document, e);
            }
        }
        outcome
    }

    /// Run `f` with edit interpretation suspended
    ///
    /// Hosts use this to deliver the edits produced by applying a change, so they
    /// are not mistaken for further user-driven drift.
    pub fn with_suspended<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let previous = std::mem::replace(&mut self.suspended, true);
        let result = f(self);
        self.suspended = previous;
        result
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    // ------------------------------------------------------------------
    // Lookup cancellation
    // ------------------------------------------------------------------

    /// Token whose cancellation interrupts declaration lookups in flight
    pub fn lookup_cancellation(&self) -> CancellationToken {
        self.lookup_cancel.clone()
    }

    /// Interrupt lookups in flight and re-arm for the next edit
    pub fn cancel_pending_lookups(&mut self) {
        self.lookup_cancel.cancel();
        self.lookup_cancel = CancellationToken::new();
    }
}

impl std::fmt::Debug for GestureDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GestureDetector")
            .field("config", &self.config)
            .field("extractors", &self.extractors)
            .field("registry", &self.registry)
            .field("suspended", &self.suspended)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::PlainSignatureExtractor;
    use crate::types::StructuralChangeKind;
    use std::sync::atomic::{AtomicBool, Ordering};

    const SOURCE: &str = "f(a: int, b: int) {\n}\n";

    fn detector() -> GestureDetector {
        let mut extractors = ExtractorRegistry::new();
        extractors.register(PlainSignatureExtractor::new());
        let mut detector = GestureDetector::new(extractors);
        detector.view_attached(DocumentId::new("a.plain"), LanguageId::new("plain"));
        detector
    }

    fn doc() -> DocumentId {
        DocumentId::new("a.plain")
    }

    #[test]
    fn test_detector_creation() {
        let detector = GestureDetector::new(ExtractorRegistry::new());
        let stats = detector.stats();
        assert_eq!(stats.open_documents, 0);
        assert_eq!(stats.tracking_documents, 0);
        assert!(!detector.is_suspended());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DetectorConfig::new().with_qualifying_operations(Vec::<String>::new());
        let result = GestureDetector::with_config(config, ExtractorRegistry::new());
        assert!(matches!(result, Err(DetectorError::InvalidConfig(_))));
    }

    #[test]
    fn test_raw_edit_starts_tracking() {
        let mut detector = detector();
        let doc = doc();
        let edit = RawEdit::new(&doc, SOURCE, 2).removing("a").inserting("x").during("typing");

        assert!(detector.on_raw_edit(&edit));
        assert!(detector.is_tracking_document(&doc));
        assert_eq!(detector.original_text(&doc), Some("f(a: int, b: int)"));

        let declaration = detector.initial_descriptor(&doc).unwrap().declaration.clone();
        assert!(detector.is_tracking_active(&declaration));
    }

    #[test]
    fn test_raw_edit_filters() {
        let mut detector = detector();
        let doc = doc();

        // Not a qualifying operation
        assert!(!detector.on_raw_edit(&RawEdit::new(&doc, SOURCE, 2).during("reformat")));
        // No operation at all
        assert!(!detector.on_raw_edit(&RawEdit::new(&doc, SOURCE, 2)));
        // Uncommitted document
        assert!(!detector.on_raw_edit(&RawEdit::new(&doc, SOURCE, 2).during("typing").uncommitted()));
        // Declaration reaches end of document
        assert!(!detector.on_raw_edit(&RawEdit::new(&doc, "f(a: int)", 2).during("typing")));
        // Unknown document
        let other = DocumentId::new("b.plain");
        assert!(!detector.on_raw_edit(&RawEdit::new(&other, SOURCE, 2).during("typing")));

        assert!(!detector.is_tracking_document(&doc));
    }

    #[test]
    fn test_not_ready_project_is_not_tracked() {
        let ready = Arc::new(AtomicBool::new(false));
        let flag = ready.clone();
        let mut detector = detector().with_project_status(move || flag.load(Ordering::SeqCst));
        let doc = doc();
        let edit = RawEdit::new(&doc, SOURCE, 2).during("typing");

        assert!(!detector.on_raw_edit(&edit));
        ready.store(true, Ordering::SeqCst);
        assert!(detector.on_raw_edit(&edit));
    }

    #[test]
    fn test_cancelled_lookup_is_not_trackable() {
        let mut detector = detector();
        let doc = doc();
        detector.lookup_cancellation().cancel();

        assert!(!detector.on_raw_edit(&RawEdit::new(&doc, SOURCE, 2).during("typing")));

        detector.cancel_pending_lookups();
        assert!(detector.on_raw_edit(&RawEdit::new(&doc, SOURCE, 2).during("typing")));
    }

    #[test]
    fn test_structural_edit_resets_when_declaration_deleted() {
        let mut detector = detector();
        let doc = doc();
        detector.on_raw_edit(&RawEdit::new(&doc, SOURCE, 2).during("cut"));

        let after = "\n}\n";
        let node = SyntaxNode::new(&doc, after, TextRange::new(0, 0));
        let edit = StructuralEdit::new(StructuralChangeKind::ChildRemoved, node);

        assert!(!detector.on_structural_edit(&edit));
        assert!(!detector.is_tracking_document(&doc));
        assert!(detector.resolve_current_descriptor(&doc).is_none());
    }

    #[test]
    fn test_dismiss() {
        let mut detector = detector();
        let doc = doc();
        detector.on_raw_edit(&RawEdit::new(&doc, SOURCE, 2).during("typing"));

        let other = DeclarationRef::new(doc.clone(), LanguageId::new("plain"), 99);
        assert!(!detector.dismiss_declaration(&other));
        assert!(detector.is_tracking_document(&doc));

        let tracked = detector.initial_descriptor(&doc).unwrap().declaration.clone();
        assert!(detector.dismiss_declaration(&tracked));
        assert!(!detector.is_tracking_document(&doc));
        assert!(!detector.dismiss_document(&doc));
    }

    #[test]
    fn test_apply_change_errors() {
        let mut detector = detector();
        let unknown = DocumentId::new("nope.plain");
        assert!(matches!(
            detector.apply_change(&unknown, true),
            Err(DetectorError::UnknownDocument(_))
        ));
        assert!(matches!(
            detector.apply_change(&doc(), true),
            Err(DetectorError::NotTracking(_))
        ));
        assert!(!detector.is_suspended());
    }

    #[test]
    fn test_detector_can_move_to_another_thread() {
        fn assert_send<T: Send>() {}
        assert_send::<GestureDetector>();
        assert_send::<PendingObservations>();

        let mut detector = detector();
        let doc = doc();
        detector.on_raw_edit(&RawEdit::new(&doc, SOURCE, 2).removing("a").during("typing"));
        let node = SyntaxNode::new(&doc, "f(x: int, b: int) {\n}\n", TextRange::new(2, 3));
        detector.on_structural_edit(&StructuralEdit::new(StructuralChangeKind::ChildReplaced, node));

        let resolved = std::thread::spawn(move || detector.resolve_current_descriptor(&doc))
            .join()
            .unwrap();
        assert_eq!(resolved.unwrap().signature_text(), "f(x: int, b: int)");
    }

    #[test]
    fn test_detach_all_reports_leaked_entries() {
        let mut leaky = detector();
        assert_eq!(leaky.detach_all(), 1);
        assert!(leaky.registry().is_empty());

        let mut clean = detector();
        clean.view_released(&doc());
        assert_eq!(clean.detach_all(), 0);
    }
}
