//! End-to-end import tests: fatal errors, determinism, id discipline, and
//! front-matter assembly.

use std::collections::HashSet;

use docgraph::{Error, Value, import_article};

const FULL_ARTICLE: &str = r#"<article>
  <front>
    <article-meta>
      <article-id pub-id-type="doi">10.7554/example.00001</article-id>
      <title-group>
        <article-title>The <italic>Complete</italic> Example</article-title>
      </title-group>
      <contrib-group>
        <contrib contrib-type="author">
          <name><surname>Doe</surname><given-names>Jane</given-names></name>
          <degrees>PhD</degrees>
          <xref ref-type="aff" rid="aff1"/>
        </contrib>
        <contrib contrib-type="author">
          <name><surname>Roe</surname><given-names>Richard</given-names></name>
        </contrib>
      </contrib-group>
      <aff id="aff1"><label>1</label><institution>MIT</institution></aff>
      <pub-date pub-type="epub"><day>14</day><month>11</month><year>2012</year></pub-date>
      <volume>1</volume>
      <elocation-id>e00001</elocation-id>
      <permissions>
        <copyright-statement>Copyright 2012 Doe</copyright-statement>
        <license><license-p>Freely available</license-p></license>
      </permissions>
      <abstract>
        <p>A short abstract.</p>
      </abstract>
    </article-meta>
  </front>
  <body>
    <sec><title>Introduction</title>
      <p>We cite <xref ref-type="bibr" rid="bib1">Doe, 2001</xref> here.</p>
    </sec>
  </body>
  <back>
    <ack><title>acknowledgements</title><p>Thanks everyone.</p></ack>
    <ref-list>
      <ref id="bib1">
        <element-citation>
          <person-group><name><surname>Doe</surname><given-names>J</given-names></name></person-group>
          <article-title>Earlier work</article-title>
          <source>J Example</source><volume>5</volume>
          <fpage>1</fpage><lpage>9</lpage><year>2001</year>
          <pub-id pub-id-type="doi">10.1000/earlier</pub-id>
        </element-citation>
      </ref>
    </ref-list>
  </back>
</article>"#;

// ============================================================================
// Fatal structural errors
// ============================================================================

#[test]
fn test_missing_article_is_fatal() {
    let err = import_article("<root><p>nothing</p></root>").unwrap_err();
    match err {
        Error::MissingElement(el) => assert_eq!(el, "article"),
        other => panic!("expected MissingElement, got {:?}", other),
    }
}

#[test]
fn test_missing_article_meta_is_fatal() {
    let err = import_article("<article><body><p>text</p></body></article>").unwrap_err();
    match err {
        Error::MissingElement(el) => assert_eq!(el, "article-meta"),
        other => panic!("expected MissingElement, got {:?}", other),
    }
}

// ============================================================================
// Id discipline
// ============================================================================

#[test]
fn test_node_ids_unique_across_conversion() {
    let graph = import_article(FULL_ARTICLE).unwrap();

    let mut seen = HashSet::new();
    for node in graph.iter_nodes() {
        assert!(seen.insert(node.id.clone()), "duplicate node id {}", node.id);
    }
    for annotation in graph.annotations() {
        assert!(
            seen.insert(annotation.id.clone()),
            "annotation id {} collides",
            annotation.id
        );
    }
}

#[test]
fn test_typed_id_suffixes_increase_in_creation_order() {
    let xml = r#"<article>
  <front><article-meta>
    <title-group><article-title>T</article-title></title-group>
  </article-meta></front>
  <body><p>one</p><p>two</p><p>three</p></body>
</article>"#;
    let graph = import_article(xml).unwrap();

    let content = graph.container("content");
    let suffixes: Vec<u64> = content
        .iter()
        .filter_map(|id| graph.node(id))
        .filter(|n| n.kind == "paragraph")
        .map(|n| n.id.rsplit('_').next().unwrap().parse().unwrap())
        .collect();
    assert_eq!(suffixes, [1, 2, 3]);
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn test_conversion_is_deterministic() {
    let first = import_article(FULL_ARTICLE).unwrap();
    let second = import_article(FULL_ARTICLE).unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.title, second.title);
    assert_eq!(first.container("content"), second.container("content"));
    assert_eq!(first.container("citations"), second.container("citations"));
    assert_eq!(first.container("info"), second.container("info"));
    assert_eq!(first.annotations(), second.annotations());

    let first_nodes: Vec<_> = first.iter_nodes().collect();
    let second_nodes: Vec<_> = second.iter_nodes().collect();
    assert_eq!(first_nodes, second_nodes);
}

// ============================================================================
// Front matter
// ============================================================================

#[test]
fn test_title_flattens_inline_markup() {
    let graph = import_article(FULL_ARTICLE).unwrap();
    assert_eq!(graph.title, "The Complete Example");

    // The emphasis annotation spans "Complete" over the document title.
    let emphasis = graph
        .annotations()
        .iter()
        .find(|a| a.kind == "emphasis" && a.path.node == "document")
        .expect("title emphasis");
    assert_eq!(emphasis.range, (4, 12));
}

#[test]
fn test_cover_authors_carry_contributor_references() {
    let graph = import_article(FULL_ARTICLE).unwrap();

    let cover = graph.node("cover").expect("cover node");
    let authors = cover.get("authors").and_then(Value::as_list).unwrap();
    assert_eq!(authors.len(), 2);

    let first_author_text = graph.node(authors[0].as_str().unwrap()).unwrap();
    assert_eq!(first_author_text.get_str("content"), Some("Jane Doe, PhD"));

    let reference = graph
        .annotations()
        .iter()
        .find(|a| a.kind == "contributor_reference")
        .expect("contributor reference");
    let target = graph.node(reference.target.as_deref().unwrap()).unwrap();
    assert_eq!(target.kind, "contributor");
}

#[test]
fn test_abstract_in_content_order() {
    let graph = import_article(FULL_ARTICLE).unwrap();

    let content = graph.container("content");
    assert_eq!(content[0], "cover");
    let abstract_node = graph.node(&content[1]).expect("abstract after cover");
    assert_eq!(abstract_node.kind, "abstract");
}

#[test]
fn test_publication_info() {
    let graph = import_article(FULL_ARTICLE).unwrap();

    let info = graph.node("publication_info").expect("publication info node");
    assert_eq!(info.get_str("doi"), Some("10.7554/example.00001"));
    assert_eq!(info.get_str("first_published_on"), Some("2012/11/14"));
    assert!(graph.container("info").contains(&"publication_info".to_string()));
}

#[test]
fn test_acknowledgements_appended_to_body() {
    let graph = import_article(FULL_ARTICLE).unwrap();

    let heading = graph
        .iter_nodes()
        .find(|n| n.kind == "heading" && n.get_str("content") == Some("Acknowledgements"))
        .expect("capitalized acknowledgements heading");
    assert!(graph.container("content").contains(&heading.id));
}

// ============================================================================
// Citations
// ============================================================================

#[test]
fn test_structured_citation_fields() {
    let graph = import_article(FULL_ARTICLE).unwrap();

    let citation = graph.node_by_source_id("bib1").expect("citation");
    assert_eq!(citation.get_str("title"), Some("Earlier work"));
    assert_eq!(citation.get_str("source"), Some("J Example"));
    assert_eq!(citation.get_str("doi"), Some("http://dx.doi.org/10.1000/earlier"));
    assert_eq!(citation.get_str("source_line"), Some("J Example, 5: 2001, 1-9"));

    let authors = citation.get("authors").and_then(Value::as_list).unwrap();
    assert_eq!(authors[0].as_str(), Some("J Doe"));
    assert_eq!(citation.get("referenced"), Some(&Value::Bool(true)));
}

#[test]
fn test_citation_without_structure_is_skipped() {
    let xml = r#"<article>
  <front><article-meta>
    <title-group><article-title>T</article-title></title-group>
  </article-meta></front>
  <back>
    <ref-list>
      <ref id="bad"><element-citation><source>Loose text only</source></element-citation></ref>
    </ref-list>
  </back>
</article>"#;
    let graph = import_article(xml).unwrap();

    assert!(graph.container("citations").is_empty());
    assert!(graph.iter_nodes().all(|n| n.kind != "citation"));
}

#[test]
fn test_mixed_citation_keeps_relaxed_text() {
    let xml = r#"<article>
  <front><article-meta>
    <title-group><article-title>T</article-title></title-group>
  </article-meta></front>
  <back>
    <ref-list>
      <ref id="m1">
        <mixed-citation><string-name><surname>Poe</surname></string-name>. Collected tales.
          <source>Anthology</source>, 1845.</mixed-citation>
      </ref>
    </ref-list>
  </back>
</article>"#;
    let graph = import_article(xml).unwrap();

    let citation = graph.node_by_source_id("m1").expect("mixed citation node");
    let relaxed = citation.get_str("relaxed_text").unwrap();
    assert!(relaxed.contains("Collected tales"));
    assert!(relaxed.contains("Anthology"));

    // Free-form rendering keeps its annotations (source renders emphasized).
    assert!(
        graph
            .annotations()
            .iter()
            .any(|a| a.kind == "emphasis" && a.path.node == citation.id)
    );
}
