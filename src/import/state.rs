//! Per-conversion mutable state.
//!
//! One [`State`] is created per import call, threaded by reference through
//! every recursive handler, and discarded when the conversion completes or
//! fails. Nothing here survives into the output graph except what is
//! explicitly committed to it.

use std::collections::{HashMap, HashSet};

use crate::graph::{Annotation, DocumentGraph, PropertyPath};
use crate::xml::XmlNodeId;

/// Produces stable, monotonically increasing, type-scoped identifiers:
/// `paragraph_1`, `paragraph_2`, ... Counters are independent per type tag
/// and never reset mid-conversion.
#[derive(Debug, Default)]
pub struct IdGenerator {
    counters: HashMap<String, u64>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next identifier for a type tag.
    pub fn next(&mut self, kind: &str) -> String {
        let counter = self.counters.entry(kind.to_string()).or_insert(0);
        *counter += 1;
        format!("{}_{}", kind, counter)
    }
}

/// A frame on the annotation path stack.
///
/// While the extractor descends through annotated markup, the top frame
/// carries the property path that queued annotations should span, and the
/// tag names to ignore below this point.
#[derive(Debug, Clone)]
pub struct Frame {
    pub path: PropertyPath,
    pub ignore: Vec<String>,
}

/// Mutable context for one conversion.
pub struct State {
    /// The output graph under construction.
    pub doc: DocumentGraph,

    ids: IdGenerator,

    /// In-flight annotation target paths. Pushed and popped exclusively by
    /// the annotated-text extractor; balanced on every exit path.
    stack: Vec<Frame>,

    /// Annotation stubs discovered during the first pass, committed by the
    /// reference resolver in this order.
    pub annotations: Vec<Annotation>,

    /// Current section nesting depth.
    pub section_level: usize,

    /// All affiliation node ids seen so far.
    pub affiliations: Vec<String>,

    /// Source elements already turned into nodes, so the catch-all sweeps
    /// do not reprocess them.
    consumed: HashSet<XmlNodeId>,

    /// Source-document ids already claimed by some node or reference.
    pub used_source_ids: HashSet<String>,

    /// Source ids of author-note footnotes, linked up after the main walk.
    pub author_note_ids: Vec<String>,

    /// Source ids of footnotes referenced from the subtitle.
    pub subtitle_note_ids: Vec<String>,

    /// Acknowledgement node ids, appended to the body before appendices.
    pub acknowledgement_nodes: Vec<String>,

    /// The first abstract node, linked from the cover and document nodes.
    pub abstract_id: Option<String>,

    // Whitespace normalization cursor, carried across every text-node visit
    // of one paragraph-ish unit.
    last_char: Option<char>,
    pub skip_ws: bool,

    trim_whitespace: bool,
    remove_inner_ws: bool,
}

impl State {
    pub fn new(trim_whitespace: bool, remove_inner_ws: bool) -> Self {
        Self {
            doc: DocumentGraph::new(),
            ids: IdGenerator::new(),
            stack: Vec::new(),
            annotations: Vec::new(),
            section_level: 0,
            affiliations: Vec::new(),
            consumed: HashSet::new(),
            used_source_ids: HashSet::new(),
            author_note_ids: Vec::new(),
            subtitle_note_ids: Vec::new(),
            acknowledgement_nodes: Vec::new(),
            abstract_id: None,
            last_char: None,
            skip_ws: false,
            trim_whitespace,
            remove_inner_ws,
        }
    }

    /// Next identifier for a type tag.
    pub fn next_id(&mut self, kind: &str) -> String {
        self.ids.next(kind)
    }

    pub fn push_frame(&mut self, frame: Frame) {
        self.stack.push(frame);
    }

    pub fn pop_frame(&mut self) {
        self.stack.pop();
    }

    /// The active annotation frame. Callers outside the extractor never see
    /// an empty stack; the fallback path exists for defensive completeness.
    pub fn top(&self) -> Frame {
        self.stack.last().cloned().unwrap_or(Frame {
            path: PropertyPath::new("", ""),
            ignore: Vec::new(),
        })
    }

    /// Whether a tag is ignored in the current extraction frame.
    pub fn is_ignored(&self, tag: &str) -> bool {
        self.stack
            .last()
            .is_some_and(|frame| frame.ignore.iter().any(|t| t == tag))
    }

    /// Mark a source element as converted.
    pub fn consume(&mut self, el: XmlNodeId) {
        self.consumed.insert(el);
    }

    /// Whether a source element was already converted by an earlier sweep.
    pub fn is_consumed(&self, el: XmlNodeId) -> bool {
        self.consumed.contains(&el)
    }

    /// Reset whitespace handling at the start of a paragraph-like unit:
    /// leading whitespace of the next text run is removed outright.
    pub fn reset_whitespace(&mut self) {
        self.skip_ws = true;
    }

    /// Normalize one text run.
    ///
    /// Tabs and newlines are deleted completely, so the preferred way to
    /// prettify source XML is tab/newline indentation. Leading whitespace is
    /// dropped after an emitted space (or at a unit start), otherwise
    /// collapsed to a single space; trailing whitespace collapses to a single
    /// space to preserve word boundaries across element boundaries.
    pub fn accept_text(&mut self, text: &str) -> String {
        if !self.trim_whitespace {
            return text.to_string();
        }

        let is_ws = |c: char| matches!(c, ' ' | '\u{C}' | '\u{B}');

        let mut out: String = text
            .chars()
            .filter(|c| !matches!(c, '\t' | '\n' | '\r'))
            .collect();

        let leading = out.chars().take_while(|&c| is_ws(c)).count();
        if leading > 0 {
            let rest: String = out.chars().skip(leading).collect();
            if self.last_char == Some(' ') || self.skip_ws {
                out = rest;
            } else {
                out = format!(" {}", rest);
            }
        }
        // this state is only kept for one call
        self.skip_ws = false;

        let total = out.chars().count();
        let trailing = out.chars().rev().take_while(|&c| is_ws(c)).count();
        if trailing > 0 {
            let kept: String = out.chars().take(total - trailing).collect();
            out = format!("{} ", kept);
        }

        if self.remove_inner_ws {
            let mut collapsed = String::with_capacity(out.len());
            let mut in_run = false;
            for c in out.chars() {
                if is_ws(c) {
                    if !in_run {
                        collapsed.push(' ');
                    }
                    in_run = true;
                } else {
                    collapsed.push(c);
                    in_run = false;
                }
            }
            out = collapsed;
        }

        if let Some(c) = out.chars().last() {
            self.last_char = Some(c);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_generator_monotonic_per_type() {
        let mut ids = IdGenerator::new();
        assert_eq!(ids.next("paragraph"), "paragraph_1");
        assert_eq!(ids.next("paragraph"), "paragraph_2");
        assert_eq!(ids.next("heading"), "heading_1");
        assert_eq!(ids.next("paragraph"), "paragraph_3");
    }

    #[test]
    fn test_accept_text_trims_unit_start() {
        let mut state = State::new(true, true);
        state.reset_whitespace();
        assert_eq!(state.accept_text("  \n\tfoo   bar\n"), "foo bar");
    }

    #[test]
    fn test_accept_text_single_space_between_elements() {
        // Consecutive inline elements separated only by source indentation
        // render with exactly one space between them.
        let mut state = State::new(true, true);
        state.reset_whitespace();
        let mut text = state.accept_text("first");
        text.push_str(&state.accept_text("\n      "));
        text.push_str(&state.accept_text("second"));
        assert_eq!(text, "first second");

        let mut state = State::new(true, true);
        state.reset_whitespace();
        let mut text = state.accept_text("first ");
        text.push_str(&state.accept_text("  second"));
        assert_eq!(text, "first second");
    }

    #[test]
    fn test_accept_text_idempotent_on_normalized() {
        let mut state = State::new(true, true);
        state.reset_whitespace();
        let normalized = state.accept_text("  already\tnormalized   text ");
        let mut state = State::new(true, true);
        state.reset_whitespace();
        assert_eq!(state.accept_text(&normalized), normalized);
    }

    #[test]
    fn test_accept_text_disabled() {
        let mut state = State::new(false, false);
        assert_eq!(state.accept_text("  raw\n\ttext  "), "  raw\n\ttext  ");
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_accept_text_idempotent_on_normalized(input in "[ a-zA-Z0-9\\t\\n]{0,40}") {
                let mut state = State::new(true, true);
                state.reset_whitespace();
                let normalized = state.accept_text(&input);

                let mut state = State::new(true, true);
                state.reset_whitespace();
                prop_assert_eq!(state.accept_text(&normalized), normalized);
            }

            #[test]
            fn prop_accept_text_never_emits_tabs_or_newlines(input in "[ a-zA-Z\\t\\n\\r]{0,40}") {
                let mut state = State::new(true, true);
                state.reset_whitespace();
                let normalized = state.accept_text(&input);
                prop_assert!(!normalized.contains('\t'));
                prop_assert!(!normalized.contains('\n'));
                prop_assert!(!normalized.contains("  "));
            }

            #[test]
            fn prop_id_suffixes_strictly_increase(
                kinds in prop::collection::vec(prop_oneof![
                    Just("paragraph"), Just("heading"), Just("text")
                ], 1..50)
            ) {
                let mut ids = IdGenerator::new();
                let mut last: std::collections::HashMap<&str, u64> = std::collections::HashMap::new();
                for kind in kinds {
                    let id = ids.next(kind);
                    let suffix: u64 = id.rsplit('_').next().unwrap().parse().unwrap();
                    if let Some(&prev) = last.get(kind) {
                        prop_assert!(suffix > prev);
                    }
                    last.insert(kind, suffix);
                }
            }
        }
    }

    #[test]
    fn test_frame_ignore_lookup() {
        let mut state = State::new(true, true);
        state.push_frame(Frame {
            path: PropertyPath::new("heading_1", "content"),
            ignore: vec!["xref".to_string()],
        });
        assert!(state.is_ignored("xref"));
        assert!(!state.is_ignored("bold"));
        state.pop_frame();
        assert!(!state.is_ignored("xref"));
    }
}
