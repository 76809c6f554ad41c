//! Reference resolution, the second pass.
//!
//! Annotation stubs are committed only after the entire document tree has
//! been visited, since forward references (a citation annotation pointing to
//! a reference-list entry converted later) are common. Stubs whose target is
//! a source-document id are rewritten to the generated node id; targets that
//! cannot be resolved stay untouched, which is an accepted outcome (inline
//! formula targets already carry generated ids, and not every referenced
//! element becomes a node).

use log::debug;

use crate::import::state::State;

/// Resolve and commit all queued annotation stubs, preserving their
/// discovery order.
pub(crate) fn post_process_annotations(state: &mut State) {
    let pending = std::mem::take(&mut state.annotations);

    for mut annotation in pending {
        if let Some(target) = &annotation.target {
            if let Some(generated) = state.doc.resolve_source_id(target) {
                annotation.target = Some(generated.to_string());
            }
        }

        // A stub over a text property that never materialized would dangle;
        // dropping it keeps the graph free of dead references.
        match state.doc.text_at(&annotation.path) {
            Some(text) => {
                debug_assert!(
                    annotation.range.1 <= text.chars().count(),
                    "annotation {} range {:?} exceeds text length",
                    annotation.id,
                    annotation.range
                );
                state.doc.create_annotation(annotation);
            }
            None => {
                debug!(
                    "dropping annotation {} with unmaterialized path {}[{}]",
                    annotation.id, annotation.path.node, annotation.path.property
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Annotation, Node, PropertyPath};

    fn state_with_text(node_id: &str, content: &str) -> State {
        let mut state = State::new(true, true);
        state
            .doc
            .create(Node::new(node_id, "text").with("content", content));
        state
    }

    #[test]
    fn test_rewrites_source_id_targets() {
        let mut state = state_with_text("text_1", "see figure");
        state
            .doc
            .create(Node::new("figure_1", "figure").with("source_id", "fig1"));

        let mut anno = Annotation::new(
            "figure_reference",
            PropertyPath::new("text_1", "content"),
            (4, 10),
        );
        anno.target = Some("fig1".to_string());
        anno.id = "figure_reference_1".to_string();
        state.annotations.push(anno);

        post_process_annotations(&mut state);

        let committed = state.doc.annotations();
        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].target.as_deref(), Some("figure_1"));
    }

    #[test]
    fn test_unresolvable_target_left_untouched() {
        let mut state = state_with_text("text_1", "see figure");

        let mut anno = Annotation::new(
            "figure_reference",
            PropertyPath::new("text_1", "content"),
            (0, 3),
        );
        anno.target = Some("nonexistent".to_string());
        anno.id = "figure_reference_1".to_string();
        state.annotations.push(anno);

        post_process_annotations(&mut state);

        let committed = state.doc.annotations();
        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].target.as_deref(), Some("nonexistent"));
    }

    #[test]
    fn test_preserves_discovery_order() {
        let mut state = state_with_text("text_1", "alpha beta gamma");

        for (i, range) in [(0, 5), (6, 10), (11, 16)].iter().enumerate() {
            let mut anno = Annotation::new(
                "strong",
                PropertyPath::new("text_1", "content"),
                *range,
            );
            anno.id = format!("strong_{}", i + 1);
            state.annotations.push(anno);
        }

        post_process_annotations(&mut state);

        let ids: Vec<_> = state.doc.annotations().iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, ["strong_1", "strong_2", "strong_3"]);
    }

    #[test]
    fn test_drops_dangling_paths() {
        let mut state = State::new(true, true);
        let mut anno = Annotation::new(
            "strong",
            PropertyPath::new("text_99", "content"),
            (0, 4),
        );
        anno.id = "strong_1".to_string();
        state.annotations.push(anno);

        post_process_annotations(&mut state);
        assert!(state.doc.annotations().is_empty());
    }
}
