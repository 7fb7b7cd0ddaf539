//! Core types for the signature drift detector
//!
//! This module defines the identities, edit notifications and error type shared by
//! every part of the detector. The detector never owns document text: the host
//! editing surface hands it borrowed snapshots with each notification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type used throughout the detector
pub type Timestamp = DateTime<Utc>;

/// Result type for detector operations
pub type Result<T> = std::result::Result<T, DetectorError>;

/// Opaque identity of an open document (usually a path or URI)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Create a new document identity
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Source-language tag used to resolve a signature extractor
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageId(String);

impl LanguageId {
    /// Create a new language tag
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LanguageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LanguageId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Half-open byte range `[start, end)` within a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    /// Create a new range; `end` is clamped so that it never precedes `start`
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True if `offset` lies inside the range (the end offset counts as inside,
    /// so a caret sitting right after the last character still hits it)
    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset <= self.end
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Stable handle to a tracked declaration
///
/// The offset is the start of the declaration when tracking began. Edits inside
/// a signature never move its start, so the handle stays valid for as long as
/// the declaration itself does.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeclarationRef {
    /// Document containing the declaration
    pub document: DocumentId,
    /// Language of the containing document
    pub language: LanguageId,
    /// Start offset of the declaration
    pub offset: usize,
}

impl DeclarationRef {
    pub fn new(document: DocumentId, language: LanguageId, offset: usize) -> Self {
        Self {
            document,
            language,
            offset,
        }
    }
}

impl fmt::Display for DeclarationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.document, self.offset)
    }
}

/// A declaration located by an extractor at an edit location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Handle used by change descriptors to refer back to this declaration
    pub reference: DeclarationRef,
    /// Full textual range of the declaration in the document
    pub range: TextRange,
    /// Declared name, if the declaration exposes one
    pub name: Option<String>,
    /// Raw text of `range`
    pub text: String,
}

/// Node reference delivered with a structural post-edit notification
#[derive(Debug, Clone, Copy)]
pub struct SyntaxNode<'a> {
    /// Document the node belongs to
    pub document: &'a DocumentId,
    /// Post-edit text of the whole document
    pub source: &'a str,
    /// Range of the changed node in `source`
    pub range: TextRange,
}

impl<'a> SyntaxNode<'a> {
    pub fn new(document: &'a DocumentId, source: &'a str, range: TextRange) -> Self {
        Self {
            document,
            source,
            range,
        }
    }

    /// Text covered by the node, or `None` if the range no longer fits the source
    pub fn text(&self) -> Option<&'a str> {
        self.source.get(self.range.start..self.range.end)
    }
}

/// Raw pre-edit notification, sent before the document text is mutated
#[derive(Debug, Clone, Copy)]
pub struct RawEdit<'a> {
    /// Document about to change
    pub document: &'a DocumentId,
    /// Document text before the edit
    pub text: &'a str,
    /// Offset of the edit
    pub offset: usize,
    /// Text about to be removed at `offset`
    pub removed: &'a str,
    /// Text about to be inserted at `offset`
    pub inserted: &'a str,
    /// Name of the user operation currently in flight, if any
    pub operation: Option<&'a str>,
    /// False if the host's syntax tree is out of sync with `text`
    pub committed: bool,
}

impl<'a> RawEdit<'a> {
    /// Create a committed edit with no removal and no operation name
    pub fn new(document: &'a DocumentId, text: &'a str, offset: usize) -> Self {
        Self {
            document,
            text,
            offset,
            removed: "",
            inserted: "",
            operation: None,
            committed: true,
        }
    }

    /// Builder method: set the removed text
    pub fn removing(mut self, removed: &'a str) -> Self {
        self.removed = removed;
        self
    }

    /// Builder method: set the inserted text
    pub fn inserting(mut self, inserted: &'a str) -> Self {
        self.inserted = inserted;
        self
    }

    /// Builder method: set the in-flight operation name
    pub fn during(mut self, operation: &'a str) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Builder method: mark the document as out of sync with its syntax tree
    pub fn uncommitted(mut self) -> Self {
        self.committed = false;
        self
    }
}

/// Kind of structural change reported after an edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructuralChangeKind {
    ChildAdded,
    ChildRemoved,
    ChildReplaced,
    ChildrenChanged,
}

impl fmt::Display for StructuralChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructuralChangeKind::ChildAdded => write!(f, "child-added"),
            StructuralChangeKind::ChildRemoved => write!(f, "child-removed"),
            StructuralChangeKind::ChildReplaced => write!(f, "child-replaced"),
            StructuralChangeKind::ChildrenChanged => write!(f, "children-changed"),
        }
    }
}

/// Structural post-edit notification, sent after the document text was mutated
#[derive(Debug, Clone, Copy)]
pub struct StructuralEdit<'a> {
    pub kind: StructuralChangeKind,
    pub node: SyntaxNode<'a>,
}

impl<'a> StructuralEdit<'a> {
    pub fn new(kind: StructuralChangeKind, node: SyntaxNode<'a>) -> Self {
        Self { kind, node }
    }

    pub fn document(&self) -> &'a DocumentId {
        self.node.document
    }
}

/// Errors that can be surfaced by the detector
///
/// Tracking itself never fails: unreconcilable edits silently reset the tracking
/// state. Only host misuse and change application produce errors.
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("Document is not open: {0}")]
    UnknownDocument(DocumentId),

    #[error("No signature extractor registered for language: {0}")]
    NoExtractor(LanguageId),

    #[error("No signature change is being tracked in document: {0}")]
    NotTracking(DocumentId),

    #[error("Failed to apply signature change: {0}")]
    ApplyFailed(String),

    #[error("Invalid detector configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_range_contains() {
        let range = TextRange::new(4, 10);
        assert_eq!(range.len(), 6);
        assert!(range.contains(4));
        assert!(range.contains(10));
        assert!(!range.contains(3));
        assert!(!range.contains(11));
    }

    #[test]
    fn test_text_range_clamps_inverted_bounds() {
        let range = TextRange::new(8, 2);
        assert!(range.is_empty());
        assert_eq!(range.start, 8);
    }

    #[test]
    fn test_syntax_node_text() {
        let doc = DocumentId::new("a.sig");
        let node = SyntaxNode::new(&doc, "f(a: int)", TextRange::new(2, 8));
        assert_eq!(node.text(), Some("a: int"));

        let stale = SyntaxNode::new(&doc, "f()", TextRange::new(2, 8));
        assert_eq!(stale.text(), None);
    }

    #[test]
    fn test_raw_edit_builder() {
        let doc = DocumentId::new("a.sig");
        let edit = RawEdit::new(&doc, "f(a)", 2)
            .removing("a")
            .inserting("b")
            .during("typing");

        assert_eq!(edit.removed, "a");
        assert_eq!(edit.inserted, "b");
        assert_eq!(edit.operation, Some("typing"));
        assert!(edit.committed);
        assert!(!edit.uncommitted().committed);
    }

    #[test]
    fn test_error_display() {
        let err = DetectorError::NoExtractor(LanguageId::new("cobol"));
        assert_eq!(
            err.to_string(),
            "No signature extractor registered for language: cobol"
        );
    }
}
