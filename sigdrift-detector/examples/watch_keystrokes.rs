//! Keystroke-by-keystroke signature tracking
//!
//! Types a new parameter into a declaration one character at a time and prints
//! what the detector resolves after every keystroke.
//!
//! Usage:
//!   cargo run --example watch_keystrokes [-- "<declaration line>" "<text to type>"]

use sigdrift_detector::{
    DocumentId, ExtractorRegistry, GestureDetector, LanguageId, PlainSignatureExtractor, RawEdit,
    StructuralChangeKind, StructuralEdit, SyntaxNode, TextRange, PLAIN_LANGUAGE,
};
use std::env;

struct Stats {
    keystrokes: usize,
    resolved: usize,
    empty: usize,
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let declaration = args.get(1).map_or("connect(host: str)", String::as_str);
    let typed = args.get(2).map_or(", port: u16 = 80", String::as_str);

    let mut extractors = ExtractorRegistry::new();
    extractors.register(PlainSignatureExtractor::new());
    let mut detector = GestureDetector::new(extractors);

    let doc = DocumentId::new("demo.plain");
    detector.view_attached(doc.clone(), LanguageId::new(PLAIN_LANGUAGE));

    let mut text = format!("{} {{\n}}\n", declaration);
    let Some(mut cursor) = declaration.rfind(')') else {
        eprintln!("Declaration must contain a parameter list: {}", declaration);
        std::process::exit(1);
    };

    let mut stats = Stats {
        keystrokes: 0,
        resolved: 0,
        empty: 0,
    };

    println!("Original: {}", declaration);
    for c in typed.chars() {
        let inserted = c.to_string();
        detector.on_raw_edit(
            &RawEdit::new(&doc, &text, cursor)
                .inserting(&inserted)
                .during("typing"),
        );

        text.insert(cursor, c);
        let node = SyntaxNode::new(&doc, &text, TextRange::new(cursor, cursor + c.len_utf8()));
        detector.on_structural_edit(&StructuralEdit::new(StructuralChangeKind::ChildAdded, node));
        cursor += c.len_utf8();
        stats.keystrokes += 1;

        match detector.resolve_current_descriptor(&doc) {
            Some(change) => {
                stats.resolved += 1;
                println!("{:>3} {:?} -> {}", stats.keystrokes, c, change.signature_text());
            }
            None => {
                stats.empty += 1;
                println!("{:>3} {:?} -> (no change)", stats.keystrokes, c);
            }
        }
    }

    println!("\n=== SUMMARY ===");
    println!("Keystrokes:        {}", stats.keystrokes);
    println!("Resolved changes:  {}", stats.resolved);
    println!("Nothing to report: {}", stats.empty);
    println!("Still tracking:    {}", detector.is_tracking_document(&doc));
}
