//! Replay session
//!
//! Plays the part of the editing surface: keeps a text buffer per document, turns
//! every scripted edit into a raw pre-edit and a structural post-edit
//! notification, and collects the results of query steps for the report.

use crate::config::{ReplayScript, Step};
use crate::report::{ReportEntry, StepResult};
use anyhow::{bail, Context, Result};
use sigdrift_detector::{
    DocumentId, ExtractorRegistry, GestureDetector, LanguageId, PlainSignatureExtractor, RawEdit,
    RegistryStats, StructuralChangeKind, StructuralEdit, SyntaxNode, TextRange,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct ReplaySession {
    detector: GestureDetector,
    buffers: HashMap<DocumentId, String>,
    ready: Arc<AtomicBool>,
    entries: Vec<ReportEntry>,
}

impl ReplaySession {
    /// Build a detector for `script` and open its documents
    pub fn new(script: &ReplayScript) -> Result<Self> {
        let mut extractors = ExtractorRegistry::new();
        extractors.register(PlainSignatureExtractor::new());

        let ready = Arc::new(AtomicBool::new(true));
        let flag = ready.clone();
        let detector = GestureDetector::with_config(script.detector.clone(), extractors)
            .context("Failed to create detector")?
            .with_project_status(move || flag.load(Ordering::SeqCst));

        let mut session = Self {
            detector,
            buffers: HashMap::new(),
            ready,
            entries: Vec::new(),
        };
        for document in &script.documents {
            let id = DocumentId::new(document.id.as_str());
            session
                .detector
                .view_attached(id.clone(), LanguageId::new(document.language.as_str()));
            session.buffers.insert(id, document.text.clone());
        }
        log::debug!("Opened {} document(s)", session.buffers.len());
        Ok(session)
    }

    /// Run every step in order
    pub fn run(&mut self, steps: &[Step]) -> Result<()> {
        for (index, step) in steps.iter().enumerate() {
            log::debug!("Step {}: {:?}", index + 1, step);
            self.step(index + 1, step)
                .with_context(|| format!("Step {} ({}) failed", index + 1, step.action()))?;
        }
        Ok(())
    }

    fn step(&mut self, number: usize, step: &Step) -> Result<()> {
        match step {
            Step::Edit {
                document,
                offset,
                delete,
                insert,
                operation,
                committed,
            } => {
                let document = DocumentId::new(document.as_str());
                self.edit(&document, *offset, *delete, insert, operation, *committed)
            }
            Step::Resolve { document } => {
                let id = DocumentId::new(document.as_str());
                let change = self.detector.resolve_current_descriptor(&id);
                self.record(number, document, StepResult::Resolved { change });
                Ok(())
            }
            Step::Apply { document, silent } => {
                let id = DocumentId::new(document.as_str());
                let Some(change) = self.detector.resolve_current_descriptor(&id) else {
                    self.record(number, document, StepResult::Resolved { change: None });
                    return Ok(());
                };
                let result = match self.detector.apply_change(&id, *silent) {
                    Ok(outcome) => StepResult::Applied { outcome, change },
                    Err(e) => StepResult::ApplyFailed {
                        error: e.to_string(),
                    },
                };
                self.record(number, document, result);
                Ok(())
            }
            Step::Dismiss { document } => {
                self.detector
                    .dismiss_document(&DocumentId::new(document.as_str()));
                Ok(())
            }
            Step::Close { document } => {
                let id = DocumentId::new(document.as_str());
                if self.detector.view_released(&id) {
                    self.buffers.remove(&id);
                }
                Ok(())
            }
            Step::Delete { document } => {
                let id = DocumentId::new(document.as_str());
                self.detector.document_deleted(&id);
                self.buffers.remove(&id);
                Ok(())
            }
            Step::Ready { value } => {
                self.ready.store(*value, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    fn edit(
        &mut self,
        document: &DocumentId,
        offset: usize,
        delete: usize,
        insert: &str,
        operation: &str,
        committed: bool,
    ) -> Result<()> {
        let Some(before) = self.buffers.get(document).cloned() else {
            bail!("Document {} is not open", document);
        };
        let end = offset.saturating_add(delete);
        let Some(removed) = before.get(offset..end) else {
            bail!(
                "Edit range {}..{} is outside {} ({} bytes) or splits a character",
                offset,
                end,
                document,
                before.len()
            );
        };

        let mut raw = RawEdit::new(document, &before, offset)
            .removing(removed)
            .inserting(insert)
            .during(operation);
        if !committed {
            raw = raw.uncommitted();
        }
        if self.detector.on_raw_edit(&raw) {
            log::info!("Tracking started in {} at offset {}", document, offset);
        }

        let mut after = String::with_capacity(before.len() + insert.len());
        after.push_str(&before[..offset]);
        after.push_str(insert);
        after.push_str(&before[end..]);

        let kind = match (delete, insert.is_empty()) {
            (0, _) => StructuralChangeKind::ChildAdded,
            (_, true) => StructuralChangeKind::ChildRemoved,
            _ => StructuralChangeKind::ChildReplaced,
        };
        let node = SyntaxNode::new(document, &after, TextRange::new(offset, offset + insert.len()));
        self.detector
            .on_structural_edit(&StructuralEdit::new(kind, node));

        self.buffers.insert(document.clone(), after);
        Ok(())
    }

    fn record(&mut self, step: usize, document: &str, result: StepResult) {
        self.entries.push(ReportEntry {
            step,
            document: document.to_string(),
            result,
        });
    }

    pub fn stats(&self) -> RegistryStats {
        self.detector.stats()
    }

    /// Release every remaining view and hand back the collected entries
    pub fn finish(mut self) -> Vec<ReportEntry> {
        let open: Vec<DocumentId> = self.buffers.keys().cloned().collect();
        for document in &open {
            self.detector.view_released(document);
        }
        self.detector.detach_all();
        self.entries
    }
}
