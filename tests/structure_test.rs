//! Structural conversion tests: sections, lists, figures, tables, footnotes,
//! and container membership.

use docgraph::{DocumentGraph, Value, import_article};

fn article(body: &str) -> String {
    format!(
        r#"<article>
  <front>
    <article-meta>
      <title-group><article-title>Test Article</article-title></title-group>
    </article-meta>
  </front>
  <body>{}</body>
</article>"#,
        body
    )
}

fn nodes_of_kind<'a>(graph: &'a DocumentGraph, kind: &str) -> Vec<&'a docgraph::Node> {
    graph.iter_nodes().filter(|n| n.kind == kind).collect()
}

// ============================================================================
// Sections and headings
// ============================================================================

#[test]
fn test_section_heading_levels() {
    let graph = import_article(&article(
        "<sec><title>Top</title><p>a</p><sec><title>Nested</title><p>b</p></sec></sec>",
    ))
    .unwrap();

    let headings = nodes_of_kind(&graph, "heading");
    let top = headings.iter().find(|h| h.get_str("content") == Some("Top")).unwrap();
    let nested = headings
        .iter()
        .find(|h| h.get_str("content") == Some("Nested"))
        .unwrap();

    assert_eq!(top.get("level"), Some(&Value::Int(1)));
    assert_eq!(nested.get("level"), Some(&Value::Int(2)));

    // The heading precedes its section content in reading order.
    let content = graph.container("content");
    let top_pos = content.iter().position(|id| id == &top.id).unwrap();
    let nested_pos = content.iter().position(|id| id == &nested.id).unwrap();
    assert!(top_pos < nested_pos);
}

#[test]
fn test_empty_section_with_empty_title_yields_nothing() {
    let graph = import_article(&article("<sec><title></title></sec>")).unwrap();
    assert!(nodes_of_kind(&graph, "heading").is_empty());
}

#[test]
fn test_section_without_title_keeps_content() {
    let graph = import_article(&article("<sec><p>orphan</p></sec>")).unwrap();

    assert!(nodes_of_kind(&graph, "heading").is_empty());
    assert_eq!(nodes_of_kind(&graph, "paragraph").len(), 1);
}

// ============================================================================
// Lists
// ============================================================================

#[test]
fn test_list_types_and_labels() {
    let graph = import_article(&article(
        r#"<list list-type="bullet">
             <list-item><label>*</label><p>one</p></list-item>
             <list-item><p>two</p><p>three</p></list-item>
           </list>"#,
    ))
    .unwrap();

    let list = nodes_of_kind(&graph, "list")[0];
    assert_eq!(list.get_str("list_type"), Some("bulleted"));

    let items = list.get("items").and_then(Value::as_list).unwrap();
    let labels = list.get("labels").and_then(Value::as_list).unwrap();

    // An item contributing two body nodes pads the label array with nulls so
    // both arrays stay the same length.
    assert_eq!(items.len(), 3);
    assert_eq!(labels.len(), 3);
    assert_eq!(labels[0].as_str(), Some("*"));
    assert!(labels[1].is_null());
    assert!(labels[2].is_null());
}

#[test]
fn test_unknown_list_type_defaults_to_simple() {
    let graph = import_article(&article(
        r#"<list list-type="fancy"><list-item><p>x</p></list-item></list>"#,
    ))
    .unwrap();

    let list = nodes_of_kind(&graph, "list")[0];
    assert_eq!(list.get_str("list_type"), Some("simple"));
}

// ============================================================================
// Figures, tables, videos
// ============================================================================

#[test]
fn test_figure_converted_once_across_body_and_sweep() {
    let graph = import_article(&article(
        r#"<sec><title>S</title>
             <fig id="f1"><label>Figure 1</label>
               <caption><title>A caption</title></caption>
               <graphic xlink:href="f1.jpg"/>
             </fig>
           </sec>"#,
    ))
    .unwrap();

    let figures = nodes_of_kind(&graph, "figure");
    assert_eq!(figures.len(), 1);
    assert_eq!(figures[0].get_str("label"), Some("Figure 1"));

    let urls = figures[0].get("urls").and_then(Value::as_list).unwrap();
    assert_eq!(urls[0].as_str(), Some("f1.jpg"));

    // Display membership goes through the figures container.
    assert!(graph.container("figures").contains(&figures[0].id));
    assert!(!graph.container("content").contains(&figures[0].id));
}

#[test]
fn test_figure_in_appendix_is_swept() {
    let xml = r#"<article>
  <front><article-meta>
    <title-group><article-title>T</article-title></title-group>
  </article-meta></front>
  <body><p>body</p></body>
  <back>
    <app-group><title>Appendices</title>
      <app><title>A1</title>
        <fig id="fa"><caption><title>In appendix</title></caption>
          <graphic xlink:href="a.png"/></fig>
      </app>
    </app-group>
  </back>
</article>"#;
    let graph = import_article(xml).unwrap();
    assert_eq!(nodes_of_kind(&graph, "figure").len(), 1);
}

#[test]
fn test_thumbnail_figures_are_skipped() {
    let graph = import_article(&article(
        r#"<fig fig-type="thumb" id="f1"><graphic xlink:href="t.jpg"/></fig>"#,
    ))
    .unwrap();
    assert!(nodes_of_kind(&graph, "figure").is_empty());
}

#[test]
fn test_figure_caption_always_has_text_child() {
    let graph = import_article(&article(r#"<fig id="f1"><graphic xlink:href="f.jpg"/></fig>"#))
        .unwrap();

    let figure = nodes_of_kind(&graph, "figure")[0];
    let caption_id = figure.get_str("caption").unwrap();
    let caption = graph.node(caption_id).unwrap();
    let children = caption.get("children").and_then(Value::as_list).unwrap();
    assert_eq!(children.len(), 1);
}

#[test]
fn test_table_cells_carry_indexed_annotations() {
    let graph = import_article(&article(
        r#"<table-wrap id="t1"><label>Table 1</label>
             <caption><title>T</title></caption>
             <table><tbody><tr>
               <td>alpha <bold>b</bold></td><td>beta</td>
             </tr></tbody></table>
           </table-wrap>"#,
    ))
    .unwrap();

    let table = nodes_of_kind(&graph, "html_table")[0];
    let cells = table.get("annotated_text").and_then(Value::as_list).unwrap();
    assert_eq!(cells.len(), 2);
    assert_eq!(cells[0].as_str(), Some("alpha b"));
    assert_eq!(cells[1].as_str(), Some("beta"));

    let strong = graph
        .annotations()
        .iter()
        .find(|a| a.kind == "strong" && a.path.node == table.id)
        .expect("cell annotation");
    assert_eq!(strong.path.index, Some(0));
    assert_eq!(strong.range, (6, 7));
}

#[test]
fn test_video_url_variants() {
    let graph = import_article(&article(
        r#"<media mimetype="video" id="m1" xlink:href="http://cdn.example.com/movie1.mov">
             <label>Movie 1</label>
           </media>"#,
    ))
    .unwrap();

    let video = nodes_of_kind(&graph, "video")[0];
    assert_eq!(video.get_str("url"), Some("http://cdn.example.com/movie1.mp4"));
    assert_eq!(video.get_str("url_webm"), Some("http://cdn.example.com/movie1.webm"));
    assert_eq!(video.get_str("poster"), Some("http://cdn.example.com/movie1.png"));
}

// ============================================================================
// Footnotes
// ============================================================================

#[test]
fn test_inline_footnote_marker() {
    let graph = import_article(&article(
        r#"<p>Stated<fn id="fn9"><p>The note</p></fn>.</p>"#,
    ))
    .unwrap();

    let footnotes = nodes_of_kind(&graph, "footnote");
    assert_eq!(footnotes.len(), 1);

    let marker = graph
        .annotations()
        .iter()
        .find(|a| a.kind == "footnote_reference")
        .expect("footnote marker");
    // The marker occupies exactly one placeholder character.
    assert_eq!(marker.range.1 - marker.range.0, 1);
    assert_eq!(marker.target.as_deref(), Some(footnotes[0].id.as_str()));
    assert_eq!(marker.get("generated"), Some(&Value::Bool(true)));
}

#[test]
fn test_footnote_label_from_first_child() {
    let graph = import_article(&article(
        r#"<p>x<fn id="fn1"><label>a</label><p>note body</p></fn></p>"#,
    ))
    .unwrap();

    let footnote = nodes_of_kind(&graph, "footnote")[0];
    assert_eq!(footnote.get_str("label"), Some("a"));
    let children = footnote.get("children").and_then(Value::as_list).unwrap();
    assert_eq!(children.len(), 1);
}

#[test]
fn test_footnote_label_reverse_lookup() {
    let graph = import_article(&article(
        r#"<p>value<xref ref-type="table-fn" rid="tfn1">c</xref></p>
           <table-wrap id="t1"><caption><title>T</title></caption>
             <table-wrap-foot><fn id="tfn1"><p>cell note</p></fn></table-wrap-foot>
           </table-wrap>"#,
    ))
    .unwrap();

    let footnote = nodes_of_kind(&graph, "footnote")[0];
    assert_eq!(footnote.get_str("label"), Some("c"));
}

// ============================================================================
// Containers
// ============================================================================

#[test]
fn test_cover_opens_content_container() {
    let graph = import_article(&article("<p>hello</p>")).unwrap();
    assert_eq!(graph.container("content").first().map(String::as_str), Some("cover"));
}

#[test]
fn test_definitions_container() {
    let graph = import_article(&article(
        r#"<p>text</p>
           <glossary><def-list>
             <def-item><term>DNA</term><def id="d1"><p>deoxyribonucleic acid</p></def></def-item>
           </def-list></glossary>"#,
    ))
    .unwrap();

    let definitions = graph.container("definitions");
    assert_eq!(definitions.len(), 1);
    let def = graph.node(&definitions[0]).unwrap();
    assert_eq!(def.get_str("title"), Some("DNA"));
}
