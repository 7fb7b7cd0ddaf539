//! Host simulator shared by the integration tests
//!
//! Keeps one text buffer per open document and turns every edit into the pair of
//! notifications a real editing surface would deliver: a raw pre-edit event on
//! the old text, then a structural post-edit event on the new text.

#![allow(dead_code)]

use sigdrift_detector::{
    DocumentId, ExtractorRegistry, GestureDetector, LanguageId, PlainSignatureExtractor, RawEdit,
    StructuralChangeKind, StructuralEdit, SyntaxNode, TextRange, PLAIN_LANGUAGE,
};
use std::collections::HashMap;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn plain_extractors(extractor: PlainSignatureExtractor) -> ExtractorRegistry {
    let mut extractors = ExtractorRegistry::new();
    extractors.register(extractor);
    extractors
}

pub struct Host {
    pub detector: GestureDetector,
    buffers: HashMap<DocumentId, String>,
    committed: bool,
}

impl Host {
    pub fn new() -> Self {
        Self::with_detector(GestureDetector::new(plain_extractors(
            PlainSignatureExtractor::new(),
        )))
    }

    pub fn with_detector(detector: GestureDetector) -> Self {
        init_logging();
        Self {
            detector,
            buffers: HashMap::new(),
            committed: true,
        }
    }

    /// Open a plain document in one view
    pub fn open(&mut self, id: &str, text: &str) -> DocumentId {
        let document = DocumentId::new(id);
        self.detector
            .view_attached(document.clone(), LanguageId::new(PLAIN_LANGUAGE));
        self.buffers.insert(document.clone(), text.to_string());
        document
    }

    pub fn text(&self, document: &DocumentId) -> &str {
        self.buffers
            .get(document)
            .map(String::as_str)
            .expect("document is open")
    }

    /// Following raw edits report the syntax tree as out of sync
    pub fn set_committed(&mut self, committed: bool) {
        self.committed = committed;
    }

    /// Replace `removed_len` bytes at `offset` with `inserted`
    pub fn edit(
        &mut self,
        document: &DocumentId,
        offset: usize,
        removed_len: usize,
        inserted: &str,
        operation: &str,
    ) {
        let before = self.text(document).to_string();
        let removed = &before[offset..offset + removed_len];

        let mut raw = RawEdit::new(document, &before, offset)
            .removing(removed)
            .inserting(inserted)
            .during(operation);
        if !self.committed {
            raw = raw.uncommitted();
        }
        self.detector.on_raw_edit(&raw);

        let mut after = before.clone();
        after.replace_range(offset..offset + removed_len, inserted);

        let kind = match (removed_len, inserted.is_empty()) {
            (0, _) => StructuralChangeKind::ChildAdded,
            (_, true) => StructuralChangeKind::ChildRemoved,
            _ => StructuralChangeKind::ChildReplaced,
        };
        let node = SyntaxNode::new(document, &after, TextRange::new(offset, offset + inserted.len()));
        self.detector
            .on_structural_edit(&StructuralEdit::new(kind, node));

        self.buffers.insert(document.clone(), after);
    }

    /// Replace the first occurrence of `from` with `to`
    pub fn replace(&mut self, document: &DocumentId, from: &str, to: &str, operation: &str) {
        let offset = self
            .text(document)
            .find(from)
            .unwrap_or_else(|| panic!("{:?} not found in document", from));
        self.edit(document, offset, from.len(), to, operation);
    }

    /// Type `text` one keystroke at a time starting at `offset`
    pub fn type_at(&mut self, document: &DocumentId, offset: usize, text: &str) {
        for (idx, c) in text.char_indices() {
            self.edit(document, offset + idx, 0, c.encode_utf8(&mut [0; 4]), "typing");
        }
    }

    /// Delete the character before `offset`
    pub fn backspace(&mut self, document: &DocumentId, offset: usize) {
        let len = self.text(document)[..offset]
            .chars()
            .next_back()
            .map_or(0, char::len_utf8);
        self.edit(document, offset - len, len, "", "typing");
    }
}
