//! Reference resolution tests.
//!
//! Cross-references are queued during the first pass with source-document
//! ids and rewritten to generated node ids in the second pass; targets that
//! cannot be resolved stay untouched.

use docgraph::import_article;

// ============================================================================
// Affiliation references
// ============================================================================

const AFF_ARTICLE: &str = r#"<article>
  <front>
    <article-meta>
      <title-group><article-title>T</article-title></title-group>
      <contrib-group>
        <contrib contrib-type="author">
          <name><surname>Doe</surname><given-names>Jane</given-names></name>
          <xref ref-type="aff" rid="aff1"/>
        </contrib>
      </contrib-group>
      <aff id="aff1"><label>1</label><institution>MIT</institution></aff>
    </article-meta>
  </front>
  <body>
    <p>Work done at <xref ref-type="aff" rid="aff1">1</xref>.</p>
  </body>
</article>"#;

#[test]
fn test_affiliation_reference_resolves_to_generated_id() {
    let graph = import_article(AFF_ARTICLE).unwrap();

    let aff = graph.node_by_source_id("aff1").expect("affiliation node");
    assert_eq!(aff.kind, "affiliation");
    assert_eq!(aff.get_str("label"), Some("1"));
    assert_eq!(aff.get_str("institution"), Some("MIT"));

    // The in-text cross-reference now targets the generated id, not "aff1".
    let xref = graph
        .annotations()
        .iter()
        .find(|a| a.kind == "affiliation_reference" && a.path.node.starts_with("text_"))
        .expect("affiliation reference from body text");
    assert_eq!(xref.target.as_deref(), Some(aff.id.as_str()));
    assert_ne!(xref.target.as_deref(), Some("aff1"));
}

#[test]
fn test_contributor_picks_up_affiliation() {
    let graph = import_article(AFF_ARTICLE).unwrap();

    let aff_id = graph.node_by_source_id("aff1").unwrap().id.clone();
    let contributor = graph
        .iter_nodes()
        .find(|n| n.kind == "contributor")
        .expect("contributor node");
    let affs = contributor
        .get("affiliations")
        .and_then(docgraph::Value::as_list)
        .unwrap();
    assert_eq!(affs[0].as_str(), Some(aff_id.as_str()));
}

// ============================================================================
// Citation references
// ============================================================================

#[test]
fn test_citation_forward_reference() {
    // The in-text reference precedes the reference list; resolution must
    // tolerate the forward reference.
    let xml = r#"<article>
  <front><article-meta>
    <title-group><article-title>T</article-title></title-group>
  </article-meta></front>
  <body><p>As shown in <xref ref-type="bibr" rid="bib1">[1]</xref>.</p></body>
  <back>
    <ref-list>
      <ref id="bib1">
        <element-citation>
          <person-group><name><surname>Doe</surname><given-names>J</given-names></name></person-group>
          <article-title>On Things</article-title>
          <source>J Things</source><year>2001</year>
        </element-citation>
      </ref>
    </ref-list>
  </back>
</article>"#;
    let graph = import_article(xml).unwrap();

    let citation = graph.node_by_source_id("bib1").expect("citation node");
    assert_eq!(citation.kind, "citation");

    let reference = graph
        .annotations()
        .iter()
        .find(|a| a.kind == "citation_reference")
        .expect("citation reference");
    assert_eq!(reference.target.as_deref(), Some(citation.id.as_str()));

    assert_eq!(graph.container("citations"), [citation.id.clone()]);
}

#[test]
fn test_unresolvable_target_is_kept_silently() {
    let xml = r#"<article>
  <front><article-meta>
    <title-group><article-title>T</article-title></title-group>
  </article-meta></front>
  <body><p>See <xref ref-type="fig" rid="nowhere">Figure 99</xref>.</p></body>
</article>"#;
    let graph = import_article(xml).unwrap();

    let reference = graph
        .annotations()
        .iter()
        .find(|a| a.kind == "figure_reference")
        .expect("figure reference");
    // Unresolved targets are an accepted, silent outcome.
    assert_eq!(reference.target.as_deref(), Some("nowhere"));
}

#[test]
fn test_figure_reference_resolution() {
    let xml = r#"<article>
  <front><article-meta>
    <title-group><article-title>T</article-title></title-group>
  </article-meta></front>
  <body>
    <p>See <xref ref-type="fig" rid="f1">Figure 1</xref>.</p>
    <fig id="f1"><label>Figure 1</label>
      <caption><title>C</title></caption>
      <graphic xlink:href="f1.jpg"/>
    </fig>
  </body>
</article>"#;
    let graph = import_article(xml).unwrap();

    let figure = graph.node_by_source_id("f1").unwrap();
    let reference = graph
        .annotations()
        .iter()
        .find(|a| a.kind == "figure_reference")
        .unwrap();
    assert_eq!(reference.target.as_deref(), Some(figure.id.as_str()));

    // The figure is referenced from running text.
    assert_eq!(figure.get("referenced"), Some(&docgraph::Value::Bool(true)));
}

// ============================================================================
// Ordering guarantees
// ============================================================================

#[test]
fn test_annotations_commit_in_discovery_order() {
    let xml = r#"<article>
  <front><article-meta>
    <title-group><article-title>T</article-title></title-group>
  </article-meta></front>
  <body><p><bold>a</bold> then <italic>b</italic> then <monospace>c</monospace></p></body>
</article>"#;
    let graph = import_article(xml).unwrap();

    let kinds: Vec<_> = graph
        .annotations()
        .iter()
        .filter(|a| ["strong", "emphasis", "code"].contains(&a.kind.as_str()))
        .map(|a| a.kind.as_str())
        .collect();
    assert_eq!(kinds, ["strong", "emphasis", "code"]);
}

#[test]
fn test_annotation_ranges_within_text() {
    let graph = import_article(AFF_ARTICLE).unwrap();

    for annotation in graph.annotations() {
        let text = graph
            .text_at(&annotation.path)
            .expect("annotation path resolves to text");
        let (start, end) = annotation.range;
        assert!(start <= end);
        assert!(end <= text.chars().count());
    }
}
