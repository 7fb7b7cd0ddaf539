//! Plain signature notation extractor
//!
//! Reference extractor for a deliberately tiny, line-oriented notation:
//!
//! ```text
//! [visibility ]name(param, ...)[: return-type] [{ ...body... }]
//! ```
//!
//! Parameters are written `name[: type][ = default]`. A declaration is the header
//! part of a single top-level line (everything before an opening `{`); lines
//! inside a `{ ... }` body are never declarations. The parser is tolerant so that
//! half-typed signatures still produce a snapshot: a missing `)` ends at the end
//! of the line, a missing type is left empty, and once a declaration is tracked
//! its name may be momentarily empty while it is retyped.

use crate::descriptor::{ChangeDescriptor, Parameter, ParameterInfo, ParameterOrigin, Signature};
use crate::extractor::{ApplyOutcome, ApplyRequest, LookupCancelled, SignatureExtractor};
use crate::types::{Declaration, DeclarationRef, DocumentId, LanguageId, Result, SyntaxNode, TextRange};
use tokio_util::sync::CancellationToken;

/// Language tag handled by [`PlainSignatureExtractor`]
pub const PLAIN_LANGUAGE: &str = "plain";

/// Keywords accepted in front of a declared name
const VISIBILITY_KEYWORDS: &[&str] = &["pub", "public", "private", "protected", "internal"];

/// Line prefixes whose edits never affect a declaration
const COMMENT_PREFIXES: &[&str] = &["//", "#"];

/// Callback used to apply a resolved change
pub type ApplyHook = Box<dyn Fn(&ApplyRequest<'_>) -> Result<ApplyOutcome> + Send + Sync>;

/// Signature extractor for the plain notation
#[derive(Default)]
pub struct PlainSignatureExtractor {
    apply_hook: Option<ApplyHook>,
}

impl PlainSignatureExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: route `perform_change` through a custom applier
    pub fn with_apply_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ApplyRequest<'_>) -> Result<ApplyOutcome> + Send + Sync + 'static,
    {
        self.apply_hook = Some(Box::new(hook));
        self
    }
}

impl std::fmt::Debug for PlainSignatureExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlainSignatureExtractor")
            .field("apply_hook", &self.apply_hook.is_some())
            .finish()
    }
}

impl SignatureExtractor for PlainSignatureExtractor {
    fn language(&self) -> LanguageId {
        LanguageId::new(PLAIN_LANGUAGE)
    }

    fn declaration_at(
        &self,
        source: &str,
        document: &DocumentId,
        offset: usize,
        cancel: &CancellationToken,
    ) -> std::result::Result<Option<Declaration>, LookupCancelled> {
        if cancel.is_cancelled() {
            return Err(LookupCancelled);
        }

        let Some((line_start, line)) = line_at(source, offset) else {
            return Ok(None);
        };
        if brace_depth(&source[..line_start]) > 0 {
            return Ok(None);
        }
        let Some(header) = parse_header(line, line_start, NameRule::Required) else {
            return Ok(None);
        };

        if cancel.is_cancelled() {
            return Err(LookupCancelled);
        }
        if !header.range.contains(offset) {
            return Ok(None);
        }

        Ok(Some(Declaration {
            reference: DeclarationRef::new(document.clone(), self.language(), header.range.start),
            range: header.range,
            name: Some(header.signature.name.clone()),
            text: source[header.range.start..header.range.end].to_string(),
        }))
    }

    fn create_initial_descriptor(&self, declaration: &Declaration) -> Option<ChangeDescriptor> {
        let header = parse_header(
            &declaration.text,
            declaration.range.start,
            NameRule::Required,
        )?;
        Some(ChangeDescriptor::initial(
            declaration.reference.clone(),
            header.signature,
        ))
    }

    fn extract_signature_text(
        &self,
        node: &SyntaxNode<'_>,
        initial: &ChangeDescriptor,
    ) -> Option<String> {
        if node.document != &initial.declaration.document {
            return None;
        }

        // Read the header at the tracked offset rather than at the node: body edits
        // then leave the text unchanged, while a deleted or shifted header fails.
        let offset = initial.declaration.offset;
        let (line_start, line) = line_at(node.source, offset)?;
        let header = parse_header(line, line_start, NameRule::MayBeEmpty)?;
        if header.range.start != offset {
            return None;
        }
        Some(header.signature.to_string())
    }

    fn merge_observation(
        &self,
        signature_text: &str,
        previous: &ChangeDescriptor,
        original_name: Option<&str>,
    ) -> Option<ChangeDescriptor> {
        if let Some(name) = original_name {
            if name != previous.original_name() {
                log::debug!(
                    "Descriptor for {} does not belong to declaration {}",
                    previous.original_name(),
                    name
                );
                return None;
            }
        }

        let header = parse_header(signature_text, 0, NameRule::MayBeEmpty)?;
        let signature = header.signature;
        let origins = match_parameters(&signature.parameters, previous);

        let parameters = signature
            .parameters
            .into_iter()
            .zip(origins)
            .map(|(parameter, origin)| ParameterInfo::new(parameter, origin))
            .collect();

        Some(previous.derive(
            signature.name,
            signature.visibility,
            parameters,
            signature.return_type,
        ))
    }

    fn should_ignore(&self, node: &SyntaxNode<'_>) -> bool {
        match line_at(node.source, node.range.start) {
            Some((line_start, line)) => {
                is_comment(line) || brace_depth(&node.source[..line_start]) > 0
            }
            None => false,
        }
    }

    fn perform_change(&self, request: ApplyRequest<'_>) -> Result<ApplyOutcome> {
        match &self.apply_hook {
            Some(hook) => hook(&request),
            None => {
                log::info!(
                    "Applying signature change {} (silent: {})",
                    request.current,
                    request.silent
                );
                Ok(ApplyOutcome::Applied)
            }
        }
    }
}

/// A parsed declaration header
#[derive(Debug, Clone, PartialEq, Eq)]
struct Header {
    /// Absolute range of the header in its source
    range: TextRange,
    signature: Signature,
}

/// Whether a header must carry a name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameRule {
    /// Locating a new declaration
    Required,
    /// Re-reading a tracked declaration, which may be mid-rename
    MayBeEmpty,
}

fn is_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    COMMENT_PREFIXES.iter().any(|prefix| trimmed.starts_with(prefix))
}

/// Number of `{` left open by `text`, skipping comment lines
fn brace_depth(text: &str) -> usize {
    text.lines()
        .filter(|line| !is_comment(line))
        .flat_map(str::chars)
        .fold(0usize, |depth, c| match c {
            '{' => depth + 1,
            '}' => depth.saturating_sub(1),
            _ => depth,
        })
}

/// Line containing `offset`, with the absolute offset of its first byte
fn line_at(source: &str, offset: usize) -> Option<(usize, &str)> {
    let before = source.get(..offset)?;
    let start = before.rfind('\n').map_or(0, |idx| idx + 1);
    let end = source[offset..]
        .find('\n')
        .map_or(source.len(), |idx| offset + idx);
    Some((start, &source[start..end]))
}

/// Parse a declaration header from one line
fn parse_header(line: &str, line_start: usize, names: NameRule) -> Option<Header> {
    let header = match line.find('{') {
        Some(idx) => &line[..idx],
        None => line,
    }
    .trim_end();
    let indent = header.len() - header.trim_start().len();
    let mut rest = &header[indent..];

    let mut visibility = None;
    if let Some(word_end) = rest.find(char::is_whitespace) {
        let word = &rest[..word_end];
        if VISIBILITY_KEYWORDS.contains(&word) {
            visibility = Some(word.to_string());
            rest = rest[word_end..].trim_start();
        }
    }

    let name_len = identifier_len(rest);
    if name_len == 0 && names == NameRule::Required {
        return None;
    }
    let name = &rest[..name_len];
    let after_name = rest[name_len..].trim_start().strip_prefix('(')?;

    let (params_text, tail) = match closing_paren(after_name) {
        Some(close) => (&after_name[..close], after_name[close + 1..].trim()),
        None => (after_name, ""),
    };

    let return_type = if tail.is_empty() {
        None
    } else {
        let type_text = tail.strip_prefix("->").or_else(|| tail.strip_prefix(':'))?;
        Some(normalize_whitespace(type_text)).filter(|t| !t.is_empty())
    };

    let parameters = split_top_level(params_text, ',')
        .into_iter()
        .filter(|text| !text.trim().is_empty())
        .map(parse_parameter)
        .collect();

    Some(Header {
        range: TextRange::new(line_start + indent, line_start + header.len()),
        signature: Signature {
            visibility,
            name: name.to_string(),
            parameters,
            return_type,
        },
    })
}

/// Length in bytes of the identifier at the start of `text`, 0 if there is none
fn identifier_len(text: &str) -> usize {
    let mut chars = text.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_alphabetic() || c == '_' => {}
        _ => return 0,
    }
    chars
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
        .map_or(text.len(), |(idx, _)| idx)
}

/// Index of the `)` closing an already opened `(`
fn closing_paren(text: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (idx, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on `separator` outside of any bracket pair
fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (idx, c) in text.char_indices() {
        match c {
            '(' | '[' | '<' | '{' => depth += 1,
            ')' | ']' | '>' | '}' => depth = depth.saturating_sub(1),
            c if c == separator && depth == 0 => {
                parts.push(&text[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Parse `name[: type][ = default]`
fn parse_parameter(text: &str) -> Parameter {
    let (declared, default_value) = match split_once_top_level(text, '=') {
        Some((declared, default_value)) => (declared, Some(normalize_whitespace(default_value))),
        None => (text, None),
    };
    let (name, type_text) = match declared.split_once(':') {
        Some((name, type_text)) => (name, type_text),
        None => (declared, ""),
    };

    Parameter {
        name: name.trim().to_string(),
        type_text: normalize_whitespace(type_text),
        default_value: default_value.filter(|d| !d.is_empty()),
    }
}

fn split_once_top_level(text: &str, separator: char) -> Option<(&str, &str)> {
    let parts = split_top_level(text, separator);
    if parts.len() < 2 {
        return None;
    }
    let head = parts[0];
    Some((head, &text[head.len() + separator.len_utf8()..]))
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decide the origin of every current parameter
///
/// Matching order: a parameter of the previous descriptor with the same name,
/// then an original parameter with the same name, then a parameter renamed in
/// place (same position, old name gone). Each original index is used once.
fn match_parameters(current: &[Parameter], previous: &ChangeDescriptor) -> Vec<ParameterOrigin> {
    let original = &previous.original().parameters;
    let mut used = vec![false; original.len()];
    let mut origins: Vec<Option<ParameterOrigin>> = vec![None; current.len()];

    for (pos, parameter) in current.iter().enumerate() {
        let prior = previous
            .parameters()
            .iter()
            .find(|p| p.name == parameter.name)
            .and_then(|p| p.origin.original_index());
        if let Some(idx) = prior {
            if claim(&mut used, idx) {
                origins[pos] = Some(ParameterOrigin::Original(idx));
            }
        }
    }

    for (pos, parameter) in current.iter().enumerate() {
        if origins[pos].is_some() {
            continue;
        }
        if let Some(idx) = original.iter().position(|p| p.name == parameter.name) {
            if claim(&mut used, idx) {
                origins[pos] = Some(ParameterOrigin::Original(idx));
            }
        }
    }

    for pos in 0..current.len() {
        if origins[pos].is_some() {
            continue;
        }
        let Some(prior) = previous.parameters().get(pos) else {
            continue;
        };
        let renamed_away = !current.iter().any(|p| p.name == prior.name);
        if let (true, Some(idx)) = (renamed_away, prior.origin.original_index()) {
            if claim(&mut used, idx) {
                origins[pos] = Some(ParameterOrigin::Original(idx));
            }
        }
    }

    origins
        .into_iter()
        .map(|origin| origin.unwrap_or(ParameterOrigin::New))
        .collect()
}

fn claim(used: &mut [bool], idx: usize) -> bool {
    match used.get_mut(idx) {
        Some(slot) if !*slot => {
            *slot = true;
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn doc() -> DocumentId {
        DocumentId::new("lib.plain")
    }

    fn initial_for(source: &str, offset: usize) -> (PlainSignatureExtractor, ChangeDescriptor) {
        let extractor = PlainSignatureExtractor::new();
        let declaration = extractor
            .declaration_at(source, &doc(), offset, &CancellationToken::new())
            .unwrap()
            .expect("declaration at offset");
        let initial = extractor.create_initial_descriptor(&declaration).unwrap();
        (extractor, initial)
    }

    #[test]
    fn test_parse_header_full() {
        let header = parse_header(
            "    pub connect(host: str, port: u16 = 80): Conn {",
            10,
            NameRule::Required,
        )
        .unwrap();

        assert_eq!(header.range, TextRange::new(14, 58));
        assert_eq!(header.signature.visibility.as_deref(), Some("pub"));
        assert_eq!(header.signature.name, "connect");
        assert_eq!(
            header.signature.parameters,
            vec![
                Parameter::new("host", "str"),
                Parameter::new("port", "u16").with_default("80"),
            ]
        );
        assert_eq!(header.signature.return_type.as_deref(), Some("Conn"));
    }

    #[test]
    fn test_parse_header_nested_types() {
        let header = parse_header(
            "load(map: Map<K, V>, cb: fn(i32, i32)) -> Result<(), E>",
            0,
            NameRule::Required,
        )
        .unwrap();

        assert_eq!(header.signature.parameters.len(), 2);
        assert_eq!(header.signature.parameters[0].type_text, "Map<K, V>");
        assert_eq!(header.signature.parameters[1].type_text, "fn(i32, i32)");
        assert_eq!(header.signature.return_type.as_deref(), Some("Result<(), E>"));
    }

    #[test]
    fn test_parse_header_tolerates_partial_input() {
        let header = parse_header("f(a: int, b", 0, NameRule::Required).unwrap();
        assert_eq!(header.signature.to_string(), "f(a: int, b)");

        let trailing = parse_header("f(a: int, )", 0, NameRule::Required).unwrap();
        assert_eq!(trailing.signature.parameters.len(), 1);
    }

    #[test]
    fn test_parse_header_rejects_statements() {
        assert!(parse_header("call(1, 2);", 0, NameRule::Required).is_none());
        assert!(parse_header("    return x", 0, NameRule::Required).is_none());
        assert!(parse_header("(a: int)", 0, NameRule::Required).is_none());
        assert!(parse_header("", 0, NameRule::Required).is_none());
    }

    #[test]
    fn test_parse_header_empty_name_while_tracked() {
        let header = parse_header("(a: int) {", 0, NameRule::MayBeEmpty).unwrap();
        assert_eq!(header.signature.name, "");
        assert_eq!(header.signature.to_string(), "(a: int)");

        let public = parse_header("pub (a: int)", 0, NameRule::MayBeEmpty).unwrap();
        assert_eq!(public.signature.visibility.as_deref(), Some("pub"));

        assert!(parse_header("    return x", 0, NameRule::MayBeEmpty).is_none());
    }

    #[test]
    fn test_brace_depth() {
        assert_eq!(brace_depth(""), 0);
        assert_eq!(brace_depth("f(a: int) {\n"), 1);
        assert_eq!(brace_depth("f(a: int) {\n  if x {\n  }\n"), 1);
        assert_eq!(brace_depth("f(a: int) {\n}\n"), 0);
        assert_eq!(brace_depth("# {\n"), 0);
        assert_eq!(brace_depth("}\n}\n"), 0);
    }

    #[test]
    fn test_signature_text_is_whitespace_normalized() {
        let a = parse_header("f(a:   int )", 0, NameRule::Required).unwrap();
        let b = parse_header("f(a: int)", 0, NameRule::Required).unwrap();
        assert_eq!(a.signature.to_string(), b.signature.to_string());
    }

    #[test]
    fn test_declaration_at() {
        let source = "// header\nf(a: int, b: int) {\n  return 1\n}\n";
        let extractor = PlainSignatureExtractor::new();
        let cancel = CancellationToken::new();

        let declaration = extractor
            .declaration_at(source, &doc(), 13, &cancel)
            .unwrap()
            .unwrap();
        assert_eq!(declaration.range, TextRange::new(10, 27));
        assert_eq!(declaration.text, "f(a: int, b: int)");
        assert_eq!(declaration.name.as_deref(), Some("f"));
        assert_eq!(declaration.reference.offset, 10);

        // Inside the body: not a declaration
        assert!(extractor
            .declaration_at(source, &doc(), 33, &cancel)
            .unwrap()
            .is_none());
        // Past the end of the document
        assert!(extractor
            .declaration_at(source, &doc(), 500, &cancel)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_declaration_at_cancelled() {
        let extractor = PlainSignatureExtractor::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = extractor.declaration_at("f(a: int)\n", &doc(), 2, &cancel);
        assert_eq!(result, Err(LookupCancelled));
    }

    #[test]
    fn test_extract_signature_text_same_declaration() {
        let source = "f(a: int)\n";
        let (extractor, initial) = initial_for(source, 2);

        let edited = "f(a: int, b: str)\n";
        let node = SyntaxNode::new(&initial.declaration.document, edited, TextRange::new(8, 16));
        assert_eq!(
            extractor.extract_signature_text(&node, &initial).as_deref(),
            Some("f(a: int, b: str)")
        );
    }

    #[test]
    fn test_extract_signature_text_shifted_declaration() {
        let (extractor, initial) = initial_for("f(a: int)\n", 2);

        let edited = "  f(a: int)\n";
        let node = SyntaxNode::new(&initial.declaration.document, edited, TextRange::new(0, 2));
        assert_eq!(extractor.extract_signature_text(&node, &initial), None);

        let other_doc = DocumentId::new("other.plain");
        let foreign = SyntaxNode::new(&other_doc, "f(a: int)\n", TextRange::new(0, 1));
        assert_eq!(extractor.extract_signature_text(&foreign, &initial), None);
    }

    #[test]
    fn test_merge_reorder() {
        let (extractor, initial) = initial_for("f(a: int, b: int)\n", 2);

        let merged = extractor
            .merge_observation("f(b: int, a: int)", &initial, Some("f"))
            .unwrap();

        assert_eq!(merged.new_order(), vec!["b", "a"]);
        assert!(merged.flags().parameter_set_or_order_changed);
        assert!(!merged.flags().parameter_types_changed);
        assert!(!merged.flags().parameter_names_changed);
    }

    #[test]
    fn test_merge_rename_in_place_keeps_origin() {
        let (extractor, initial) = initial_for("f(a: int, b: int)\n", 2);

        let step1 = extractor
            .merge_observation("f(: int, b: int)", &initial, Some("f"))
            .unwrap();
        let step2 = extractor
            .merge_observation("f(x: int, b: int)", &step1, Some("f"))
            .unwrap();

        assert_eq!(step2.parameters()[0].origin, ParameterOrigin::Original(0));
        assert!(step2.flags().parameter_names_changed);
        assert!(!step2.flags().parameter_set_or_order_changed);
    }

    #[test]
    fn test_merge_added_parameter_is_new() {
        let (extractor, initial) = initial_for("f(a: int)\n", 2);

        let merged = extractor
            .merge_observation("f(a: int, verbose: bool = false)", &initial, Some("f"))
            .unwrap();

        assert_eq!(merged.parameters()[1].origin, ParameterOrigin::New);
        assert_eq!(merged.parameters()[1].default_value.as_deref(), Some("false"));
        assert!(merged.flags().parameter_set_or_order_changed);
    }

    #[test]
    fn test_merge_failures() {
        let (extractor, initial) = initial_for("f(a: int)\n", 2);

        assert!(extractor.merge_observation("a: int", &initial, Some("f")).is_none());
        assert!(extractor.merge_observation("f(a: int)", &initial, Some("g")).is_none());
    }

    #[test]
    fn test_merge_empty_name_mid_rename() {
        let (extractor, initial) = initial_for("foo(a: int)\n", 2);

        let cleared = extractor
            .merge_observation("(a: int)", &initial, Some("foo"))
            .unwrap();
        assert_eq!(cleared.name(), "");
        assert_eq!(cleared.original_name(), "foo");

        let renamed = extractor
            .merge_observation("bar(a: int)", &cleared, Some("foo"))
            .unwrap();
        assert!(renamed.is_rename_only());
    }

    #[test]
    fn test_body_lines_are_not_declarations() {
        let source = "f(a: int) {\n  go()\n}\ng(b: int) {\n}\n";
        let extractor = PlainSignatureExtractor::new();
        let cancel = CancellationToken::new();

        // Inside the body of f
        assert!(extractor
            .declaration_at(source, &doc(), 15, &cancel)
            .unwrap()
            .is_none());
        // g is back at the top level
        let g = extractor
            .declaration_at(source, &doc(), 22, &cancel)
            .unwrap()
            .unwrap();
        assert_eq!(g.text, "g(b: int)");

        let doc = doc();
        let body = SyntaxNode::new(&doc, source, TextRange::new(15, 16));
        let header = SyntaxNode::new(&doc, source, TextRange::new(2, 3));
        assert!(extractor.should_ignore(&body));
        assert!(!extractor.should_ignore(&header));
    }

    #[test]
    fn test_should_ignore_comment_lines() {
        let extractor = PlainSignatureExtractor::new();
        let source = "# note(a)\nf(a: int)\n";

        let doc = doc();
        let comment = SyntaxNode::new(&doc, source, TextRange::new(3, 4));
        let code = SyntaxNode::new(&doc, source, TextRange::new(12, 13));
        assert!(extractor.should_ignore(&comment));
        assert!(!extractor.should_ignore(&code));
    }

    #[test]
    fn test_perform_change_uses_hook() {
        let (_, initial) = initial_for("f(a: int)\n", 2);
        let request = ApplyRequest {
            current: &initial,
            initial: &initial,
            original_text: "f(a: int)",
            silent: true,
        };

        let default = PlainSignatureExtractor::new();
        assert_eq!(default.perform_change(request).unwrap(), ApplyOutcome::Applied);

        let rejecting = PlainSignatureExtractor::new().with_apply_hook(|_| Ok(ApplyOutcome::Rejected));
        assert_eq!(rejecting.perform_change(request).unwrap(), ApplyOutcome::Rejected);
    }
}
