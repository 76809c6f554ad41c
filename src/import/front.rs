//! Article orchestration and front-matter extraction: metadata, title group,
//! abstracts, definitions, affiliations, contributors, publication info,
//! cover, and back matter.

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::graph::{CONTENT, DEFINITIONS, INFO, Node, PropertyPath, Value};
use crate::import::Importer;
use crate::import::blocks::string_list;
use crate::import::citations::{find_with_attr, get_name};
use crate::import::figures::has_ancestor_tag;
use crate::import::footnotes::find_aff_label;
use crate::import::state::State;
use crate::util::{capitalize_words, normalize_month, numeric_tail};
use crate::xml::{XmlDom, XmlNodeId};

impl Importer {
    /// Top-level conversion of a parsed document.
    pub(crate) fn document(&self, state: &mut State, dom: &XmlDom) -> Result<()> {
        let Some(article) = dom.find_by_tag(dom.document(), "article") else {
            return Err(Error::MissingElement("article".to_string()));
        };
        self.article(state, dom, article)?;
        Ok(())
    }

    /// Convert the article element: front matter, body, and the global
    /// sweeps, in a fixed order that satisfies their data dependencies.
    fn article(&self, state: &mut State, dom: &XmlDom, article: XmlNodeId) -> Result<()> {
        // Both required elements are checked up front so a malformed
        // document fails before any work is done.
        if dom.find_by_tag(article, "article-meta").is_none() {
            return Err(Error::MissingElement("article-meta".to_string()));
        }

        state.doc.id = match dom.find_by_tag(article, "article-id") {
            Some(id_el) => dom.text_content(id_el),
            None => state.next_id("article"),
        };

        // Glossary.
        self.extract_definitions(state, dom);

        // Authors and their metadata.
        self.extract_affiliations(state, dom, article);
        self.extract_author_notes(state, dom, article);
        self.extract_contributors(state, dom, article);

        // Citations are global as well.
        self.extract_citations(state, dom);

        // Title, abstract, publication info; the cover draws on all three.
        self.extract_article_meta(state, dom, article)?;
        self.extract_publication_info(state, dom, article);
        self.extract_cover(state, dom, article);

        if let Some(body) = dom.find_by_tag(article, "body") {
            self.body(state, dom, body);
        }

        self.extract_figures(state, dom);

        // Catch all unhandled footnotes.
        self.extract_footnotes(state, dom, article);

        if let Some(back) = dom.find_by_tag(article, "back") {
            self.back(state, dom, back);
        }

        self.create_document_node(state);
        self.hooks.article(&mut state.doc, dom, article);
        Ok(())
    }

    /// The pseudo-node holding document-level text properties; annotations
    /// over the title and subtitle resolve against it.
    fn create_document_node(&self, state: &mut State) {
        let node = Node::new("document", "document")
            .with("title", state.doc.title.clone())
            .with("subtitle", state.doc.subtitle.clone())
            .with("authors", state.doc.authors.clone())
            .with("abstract", state.abstract_id.clone())
            .with("on_behalf_of", state.doc.on_behalf_of.clone());
        state.doc.create(node);
    }

    fn body(&self, state: &mut State, dom: &XmlDom, body: XmlNodeId) {
        let children: Vec<_> = dom.children(body).collect();
        let mut nodes = self.body_nodes(state, dom, &children, &[]);
        nodes.extend(state.acknowledgement_nodes.clone());
        if !nodes.is_empty() {
            self.show_nodes(state, &nodes);
        }
    }

    // ### Article metadata

    fn extract_article_meta(&self, state: &mut State, dom: &XmlDom, article: XmlNodeId) -> Result<()> {
        let article_meta = dom
            .find_by_tag(article, "article-meta")
            .ok_or_else(|| Error::MissingElement("article-meta".to_string()))?;

        if let Some(title_group) = dom.find_by_tag(article_meta, "title-group") {
            self.title_group(state, dom, title_group);
        }

        let pub_dates = dom.find_all_by_tag(article_meta, "pub-date");
        if let Some(&first) = pub_dates.first() {
            state.doc.created_at = extract_date(dom, first);
        }

        for abstract_el in dom.find_all_by_tag(article_meta, "abstract") {
            self.abstract_element(state, dom, abstract_el);
        }
        Ok(())
    }

    fn title_group(&self, state: &mut State, dom: &XmlDom, title_group: XmlNodeId) {
        if let Some(title) = dom.find_by_tag(title_group, "article-title") {
            state.doc.title = self.annotated_text(
                state,
                dom,
                title,
                PropertyPath::new("document", "title"),
                &["xref"],
            );
        }

        if let Some(subtitle) = dom.find_by_tag(title_group, "subtitle") {
            state.doc.subtitle = self.annotated_text(
                state,
                dom,
                subtitle,
                PropertyPath::new("document", "subtitle"),
                &["xref"],
            );
            for xref in dom.find_all_by_tag(subtitle, "xref") {
                if let Some(rid) = dom.get_attr(xref, "rid") {
                    if rid.starts_with("fn") {
                        state.subtitle_note_ids.push(rid.to_string());
                    }
                }
            }
        }
    }

    fn abstract_element(&self, state: &mut State, dom: &XmlDom, abstract_el: XmlNodeId) {
        let title = dom
            .direct_children(abstract_el, "title")
            .into_iter()
            .next();

        let heading_id = state.next_id("heading");
        let heading_content = match title {
            Some(t) => dom.text_content(t),
            None => "Abstract".to_string(),
        };
        state.doc.create(
            Node::new(&heading_id, "heading")
                .with("level", 1_i64)
                .with("content", heading_content),
        );

        let children: Vec<_> = dom.children(abstract_el).collect();
        state.section_level += 1;
        let body = self.body_nodes(state, dom, &children, &["title", "object-id"]);
        state.section_level -= 1;

        // Heading nodes produced by abstract sections are navigation only;
        // the abstract lists its readable content.
        let sections: Vec<String> = body
            .iter()
            .filter(|id| state.doc.node(id.as_str()).is_none_or(|n| n.kind != "heading"))
            .cloned()
            .collect();

        let abstract_id = state.next_id("abstract");
        state.doc.create(
            Node::new(&abstract_id, "abstract").with("sections", string_list(&sections)),
        );
        state.doc.show_at(CONTENT, abstract_id.clone(), 1);
        if state.abstract_id.is_none() {
            state.abstract_id = Some(abstract_id);
        }
    }

    // ### Glossary

    fn extract_definitions(&self, state: &mut State, dom: &XmlDom) {
        for def_item in dom.find_all_by_tag(dom.document(), "def-item") {
            let Some(term) = dom.find_by_tag(def_item, "term") else {
                continue;
            };
            let Some(def) = dom.find_by_tag(def_item, "def") else {
                continue;
            };

            let id = state.next_id("definition");
            let mut node = Node::new(&id, "definition")
                .with("title", dom.text_content(term))
                .with("description", dom.text_content(def));
            if let Some(sid) = dom.element_id(def) {
                node.set("source_id", sid);
            }
            state.doc.create(node);
            state.doc.show(DEFINITIONS, id);
        }
    }

    // ### Affiliations

    fn extract_affiliations(&self, state: &mut State, dom: &XmlDom, article: XmlNodeId) {
        for aff in dom.find_all_by_tag(article, "aff") {
            self.affiliation(state, dom, aff);
        }
    }

    fn affiliation(&self, state: &mut State, dom: &XmlDom, aff: XmlNodeId) {
        // Institutions come in two encodings: a typed institution pair, or
        // named-content address lines.
        let addr_content = |content_type: &str| {
            dom.find(aff, |el| {
                dom.element_name(el) == Some("named-content")
                    && dom.get_attr(el, "content-type") == Some(content_type)
                    && has_ancestor_tag(dom, el, "addr-line")
            })
        };
        let dept_institution = find_with_attr(dom, aff, "institution", "content-type", "dept");
        let (department, institution) = if dept_institution.is_some() {
            let plain = dom.find(aff, |el| {
                dom.element_name(el) == Some("institution")
                    && dom.get_attr(el, "content-type") != Some("dept")
            });
            (dept_institution, plain)
        } else {
            (addr_content("department"), dom.find_by_tag(aff, "institution"))
        };
        let country = dom.find_by_tag(aff, "country");
        let city = addr_content("city");
        let label_el = dom.find_by_tag(aff, "label");
        let specific_use = dom.get_attr(aff, "specific-use").map(str::to_string);
        let source_id = dom.element_id(aff).map(str::to_string);

        let aff_id = state.next_id("affiliation");
        let reference_id = state.next_id("affiliation_reference");

        let text = self.annotated_text(
            state,
            dom,
            aff,
            PropertyPath::new(&aff_id, "relaxed_text"),
            &["label"],
        );

        let label = if let Some(label_el) = label_el {
            dom.text_content(label_el)
        } else if let Some(sid) = &source_id {
            find_aff_label(dom, sid).unwrap_or_else(|| numeric_tail(sid))
        } else {
            String::new()
        };

        let text_content = |el: Option<XmlNodeId>| el.map(|e| dom.text_content(e));

        let mut node = Node::new(&aff_id, "affiliation")
            .with("label", label.clone())
            .with("department", text_content(department))
            .with("city", text_content(city))
            .with("institution", text_content(institution))
            .with("country", text_content(country))
            .with("specific_use", specific_use)
            .with("relaxed_text", text)
            .with("reference_id", reference_id.clone());
        if let Some(sid) = &source_id {
            node.set("source_id", sid.as_str());
        }
        state.doc.create(node);
        state.affiliations.push(aff_id.clone());

        if !label.is_empty() {
            let mut anno = crate::graph::Annotation::new(
                "affiliation_reference",
                PropertyPath::new(&aff_id, "label"),
                (0, label.chars().count()),
            );
            anno.target = Some(aff_id);
            anno.id = reference_id;
            state.annotations.push(anno);
        }
    }

    // ### Contributors

    fn extract_author_notes(&self, state: &mut State, dom: &XmlDom, article: XmlNodeId) {
        for notes in dom.find_all_by_tag(article, "author-notes") {
            for fn_el in dom.find_all_by_tag(notes, "fn") {
                if let Some(id) = dom.element_id(fn_el) {
                    state.author_note_ids.push(id.to_string());
                }
            }
        }
    }

    fn extract_contributors(&self, state: &mut State, dom: &XmlDom, article: XmlNodeId) {
        if let Some(article_meta) = dom.find_by_tag(article, "article-meta") {
            for group in dom.direct_children(article_meta, "contrib-group") {
                self.contrib_group(state, dom, group, true);
            }
        }
    }

    fn contrib_group(&self, state: &mut State, dom: &XmlDom, group: XmlNodeId, top_level: bool) {
        let contribs = dom.direct_children(group, "contrib");

        if !contribs.is_empty() && state.doc.authors.is_empty() {
            let heading_id = format!("{}_author_list", state.next_id("heading"));
            state.doc.create(
                Node::new(&heading_id, "heading")
                    .with("level", 3_i64)
                    .with("content", "Authors"),
            );
            state.doc.show(INFO, heading_id);
        }

        for contrib in contribs {
            self.contributor(state, dom, contrib, top_level);
        }

        if let Some(on_behalf_of) = dom.direct_children(group, "on-behalf-of").into_iter().next() {
            state.doc.on_behalf_of = Some(dom.text_content(on_behalf_of).trim().to_string());
        }
    }

    fn contributor(&self, state: &mut State, dom: &XmlDom, contrib: XmlNodeId, top_level: bool) {
        let Some(contrib_type) = dom.get_attr(contrib, "contrib-type") else {
            return;
        };
        // Non-byline authors are not shown.
        if contrib_type == "author non-byline" {
            return;
        }
        let contrib_type = contrib_type.to_string();

        let id = state.next_id("contributor");
        let mut node = Node::new(&id, "contributor")
            .with("name", "")
            .with("affiliations", Vec::<Value>::new())
            .with("footnotes", Vec::<Value>::new())
            .with("fundings", Vec::<Value>::new())
            .with("bio", Vec::<Value>::new())
            .with("image", "")
            .with("deceased", false)
            .with("emails", Vec::<Value>::new())
            .with("contribution", "")
            .with("members", Vec::<Value>::new())
            .with("degrees", "")
            .with("contributor_type", self.dispatch.contrib_type(&contrib_type));
        if let Some(sid) = dom.element_id(contrib) {
            node.set("source_id", sid);
        }

        if let Some(role) = dom.direct_children(contrib, "role").into_iter().next() {
            node.set("role", dom.text_content(role));
        }

        // Author bio and image.
        if let Some(bio) = dom.direct_children(contrib, "bio").into_iter().next() {
            for par in dom.child_elements(bio).collect::<Vec<_>>() {
                if let Some(graphic) = dom.find_by_tag(par, "graphic") {
                    if let Some(url) = dom.get_attr(graphic, "xlink:href") {
                        node.set("image", url);
                    }
                } else {
                    let pars = self.paragraph_group(state, dom, par);
                    if let Some(first) = pars.first() {
                        node.set("bio", vec![Value::Str(first.clone())]);
                    }
                }
            }
        }

        if dom.get_attr(contrib, "deceased") == Some("yes") {
            node.set("deceased", true);
        }

        // ORCID comes either as a typed uri or a contrib-id element.
        if let Some(orcid) = find_direct_attr_el(dom, contrib, "uri", "content-type", "orcid") {
            node.set("orcid", dom.get_attr(orcid, "xlink:href").unwrap_or(""));
        } else if let Some(orcid) =
            find_direct_attr_el(dom, contrib, "contrib-id", "contrib-id-type", "orcid")
        {
            node.set("orcid", dom.text_content(orcid));
        }

        let collab = dom.direct_children(contrib, "collab").into_iter().next();
        let collab_contrib_group =
            collab.and_then(|c| dom.direct_children(c, "contrib-group").into_iter().next());
        let collab_has_tags = collab.is_some_and(|c| dom.child_elements(c).next().is_some());

        let name_el = dom.direct_children(contrib, "name").into_iter().next();
        let name = if name_el.is_some() {
            get_name(dom, name_el)
        } else if let Some(collab) = collab {
            // A collaboration takes its display name from the leading text.
            dom.children(collab)
                .find_map(|c| dom.text(c))
                .map(|t| t.trim().to_string())
                .unwrap_or_else(|| dom.text_content(collab).trim().to_string())
        } else {
            "N/A".to_string()
        };
        node.set("name", name);

        let property_holder = if collab_contrib_group.is_some() || collab_has_tags {
            collab.unwrap_or(contrib)
        } else {
            contrib
        };
        self.extract_contributor_properties(state, dom, property_holder, &mut node);

        let is_author = contrib_type == "author";
        if is_author && top_level {
            state.doc.authors.push(id.clone());
        }

        if let Some(degrees) = dom.direct_children(contrib, "degrees").into_iter().next() {
            node.set("degrees", dom.text_content(degrees));
        }

        state.doc.create(node);
        state.doc.show(INFO, id);

        if let Some(sub_group) = collab_contrib_group {
            self.contrib_group(state, dom, sub_group, false);
        }
    }

    fn extract_contributor_properties(
        &self,
        state: &mut State,
        dom: &XmlDom,
        contrib: XmlNodeId,
        node: &mut Node,
    ) {
        let mut competing_interests: Vec<String> = Vec::new();

        for xref in dom.direct_children(contrib, "xref") {
            let ref_type = dom.get_attr(xref, "ref-type").unwrap_or("");
            let rid = dom.get_attr(xref, "rid").unwrap_or("").to_string();
            match ref_type {
                "aff" => {
                    if let Some(aff_node) = state.doc.node_by_source_id(&rid) {
                        let aff_id = aff_node.id.clone();
                        node.push("affiliations", aff_id);
                        state.used_source_ids.insert(rid);
                    }
                }
                "other" => {
                    // By convention an 'other' xref points at an award group.
                    let Some(award_group) = dom.get_by_id(&rid) else {
                        continue;
                    };
                    let Some(funding_source) = dom.find_by_tag(award_group, "funding-source")
                    else {
                        continue;
                    };
                    let award_id = dom
                        .find_by_tag(award_group, "award-id")
                        .map(|a| format!(", {}", dom.text_content(a)))
                        .unwrap_or_default();
                    // Only the funder name is displayed, not the funder id.
                    let name = match dom.find_by_tag(funding_source, "institution") {
                        Some(institution) => dom.text_content(institution),
                        None => dom
                            .children(funding_source)
                            .find_map(|c| dom.text(c))
                            .unwrap_or("")
                            .to_string(),
                    };
                    node.push("fundings", format!("{}{}", name, award_id));
                }
                "corresp" => {
                    let Some(corresp) = dom.get_by_id(&rid) else {
                        continue;
                    };
                    if let Some(email) = dom.find_by_tag(corresp, "email") {
                        node.push("emails", dom.text_content(email));
                    }
                }
                "fn" => {
                    self.contributor_footnote(
                        state,
                        dom,
                        &rid,
                        node,
                        &mut competing_interests,
                    );
                }
                _ => {
                    debug!("skipping contributor xref with ref-type {:?}", ref_type);
                }
            }
        }

        // A contributor with a real conflict drops the boilerplate
        // "no competing interests" entry that often accompanies it.
        if competing_interests.len() > 1 {
            competing_interests.retain(|c| !c.contains("no competing"));
        }
        node.set(
            "competing_interests",
            competing_interests
                .iter()
                .map(|c| Value::Str(c.clone()))
                .collect::<Vec<_>>(),
        );

        // Member list for person groups.
        if let Some(member_list) = find_direct_attr_el(dom, contrib, "xref", "ref-type", "other") {
            if let Some(rid) = dom.get_attr(member_list, "rid") {
                if let Some(list_el) = dom.get_by_id(rid) {
                    for member in dom.find_all_by_tag(list_el, "contrib") {
                        let member_name =
                            get_name(dom, dom.direct_children(member, "name").into_iter().next());
                        node.push("members", member_name);
                    }
                }
            }
        }

        node.set("equal_contrib", Vec::<Value>::new());
    }

    fn contributor_footnote(
        &self,
        state: &mut State,
        dom: &XmlDom,
        rid: &str,
        node: &mut Node,
        competing_interests: &mut Vec<String>,
    ) {
        let Some(fn_el) = dom.get_by_id(rid) else {
            return;
        };
        let mut author_note = false;
        let mut used = true;

        match dom.get_attr(fn_el, "fn-type") {
            Some("con") => {
                node.set("contribution", dom.text_content(fn_el));
            }
            Some("conflict") => {
                competing_interests.push(dom.text_content(fn_el).trim().to_string());
            }
            Some("present-address") => {
                if let Some(p) = dom.find_by_tag(fn_el, "p") {
                    node.set("present_address", dom.text_content(p));
                }
            }
            Some("equal") => {
                author_note = true;
            }
            Some("other") => {
                // Equal contributions are sometimes encoded as 'other' with
                // a telltale id.
                if rid.contains("equal-contrib") {
                    author_note = true;
                } else {
                    used = false;
                }
            }
            _ => {
                author_note = true;
                used = false;
            }
        }

        if author_note {
            let has_label = dom.find_by_tag(fn_el, "label").is_some();
            if has_label {
                let existing = state.doc.node_by_source_id(rid).map(|n| n.id.clone());
                let footnote_id = match existing {
                    Some(id) => id,
                    None => self.footnote(state, dom, fn_el, Some("author-note")),
                };
                let label_present = state
                    .doc
                    .node(&footnote_id)
                    .and_then(|f| f.get_str("label"))
                    .is_some_and(|l| !l.is_empty());
                if label_present {
                    node.push("footnotes", footnote_id);
                    used = true;
                }
            }
        }
        if used {
            state.used_source_ids.insert(rid.to_string());
        }
    }

    // ### Publication info

    fn extract_publication_info(&self, state: &mut State, dom: &XmlDom, article: XmlNodeId) {
        let Some(article_meta) = dom.find_by_tag(article, "article-meta") else {
            return;
        };

        let journal_title = dom.find_by_tag(article, "journal-title");
        let doi = find_with_attr(dom, article, "article-id", "pub-id-type", "doi");

        let subjects: Vec<Value> = dom
            .find_all_by_tag(article_meta, "subj-group")
            .into_iter()
            .filter(|&g| dom.get_attr(g, "subj-group-type") == Some("heading"))
            .flat_map(|g| dom.find_all_by_tag(g, "subject"))
            .map(|s| Value::Str(dom.text_content(s)))
            .collect();

        let article_info_id = self.extract_article_info(state, dom, article);
        let funding_info = self.extract_funding_info(state, dom, article);

        let volume = dom
            .find_by_tag(article_meta, "volume")
            .map(|v| dom.text_content(v))
            .unwrap_or_default();
        let issue = dom
            .find_by_tag(article_meta, "issue")
            .map(|v| dom.text_content(v))
            .unwrap_or_default();
        // "Publish ahead of print" articles carry a sentinel volume.
        let is_pap = volume.eq_ignore_ascii_case("publish ahead of print");

        let fpage = dom
            .find_by_tag(article_meta, "fpage")
            .or_else(|| {
                if is_pap {
                    None
                } else {
                    dom.find_by_tag(article_meta, "elocation-id")
                }
            })
            .map(|f| dom.text_content(f))
            .unwrap_or_default();

        let (first_published_on, published_on) = extract_publication_dates(dom, article, is_pap);

        let mut published_info = std::collections::BTreeMap::new();
        published_info.insert("volume".to_string(), Value::Str(volume));
        published_info.insert("issue".to_string(), Value::Str(issue));
        published_info.insert("fpage".to_string(), Value::Str(fpage));

        let mut node = Node::new("publication_info", "publication_info")
            .with("first_published_on", first_published_on)
            .with("published_on", published_on)
            .with(
                "journal",
                journal_title.map(|j| dom.text_content(j)).unwrap_or_default(),
            )
            .with("related_articles", extract_related_articles(dom, article))
            .with("doi", doi.map(|d| dom.text_content(d)).unwrap_or_default())
            .with("article_info", article_info_id)
            .with("funding_info", funding_info)
            .with("article_type", "")
            .with("keywords", Vec::<Value>::new())
            .with("links", Vec::<Value>::new())
            .with("subjects", subjects)
            .with("supplements", Vec::<Value>::new())
            .with("research_organisms", Vec::<Value>::new())
            .with("provider", "")
            .with("published_info", Value::Map(published_info))
            .with("is_pap", is_pap);

        let mut history: Vec<Value> = Vec::new();
        for history_el in dom.find_all_by_tag(article_meta, "history") {
            for date_el in dom.find_all_by_tag(history_el, "date") {
                let mut entry = std::collections::BTreeMap::new();
                entry.insert(
                    "type".to_string(),
                    Value::from(dom.get_attr(date_el, "date-type").map(str::to_string)),
                );
                entry.insert("date".to_string(), Value::from(extract_date(dom, date_el)));
                history.push(Value::Map(entry));
            }
        }
        node.set("history", history);

        self.hooks.publication_info(&mut node, dom, article);
        state.doc.create(node);
        state.doc.show_at(INFO, "publication_info", 0);
    }

    fn extract_funding_info(&self, state: &mut State, dom: &XmlDom, article: XmlNodeId) -> Vec<Value> {
        let statements = dom.find_all_by_tag(article, "funding-statement");
        let mut funding_info = Vec::new();
        for (i, statement) in statements.into_iter().enumerate() {
            let text = self.annotated_text(
                state,
                dom,
                statement,
                PropertyPath::indexed("publication_info", "funding_info", i),
                &[],
            );
            funding_info.push(Value::Str(text));
        }
        funding_info
    }

    /// The article-info composite: editor, datasets, custom metadata, notes,
    /// keywords, copyright. Returns the id of the composite node.
    fn extract_article_info(&self, state: &mut State, dom: &XmlDom, article: XmlNodeId) -> String {
        let mut children: Vec<String> = Vec::new();

        children.extend(self.extract_editor(state, dom, article));
        children.extend(self.extract_datasets(state, dom, article));
        children.extend(self.extract_custom_meta_group(state, dom, article));
        children.extend(self.extract_copyright_and_license(state, dom, article));

        // Acknowledgements are kept aside and inserted into the body before
        // any appendix.
        state.acknowledgement_nodes = self.extract_acknowledgements(state, dom, article);

        let node = Node::new("articleinfo", "paragraph").with("children", string_list(&children));
        state.doc.create(node);
        "articleinfo".to_string()
    }

    fn extract_editor(&self, state: &mut State, dom: &XmlDom, article: XmlNodeId) -> Vec<String> {
        let Some(editor) = find_with_attr(dom, article, "contrib", "contrib-type", "editor") else {
            return Vec::new();
        };

        let mut content: Vec<String> = Vec::new();
        let name = get_name(dom, dom.find_by_tag(editor, "name"));
        if !name.is_empty() {
            content.push(name);
        }
        if let Some(institution) = dom.find_by_tag(editor, "institution") {
            content.push(dom.text_content(institution));
        }
        if let Some(country) = dom.find_by_tag(editor, "country") {
            content.push(dom.text_content(country));
        }

        let heading_id = state.next_id("heading");
        state.doc.create(
            Node::new(&heading_id, "heading")
                .with("level", 3_i64)
                .with("content", "Reviewing Editor"),
        );
        let text_id = state.next_id("text");
        state.doc.create(
            Node::new(&text_id, "text").with("content", content.join(", ")),
        );
        vec![heading_id, text_id]
    }

    fn extract_datasets(&self, state: &mut State, dom: &XmlDom, article: XmlNodeId) -> Vec<String> {
        let mut nodes = Vec::new();
        for sec in dom.find_all_by_tag(article, "sec") {
            if dom.get_attr(sec, "sec-type") != Some("datasets") {
                continue;
            }
            let heading_id = state.next_id("heading");
            state.doc.create(
                Node::new(&heading_id, "heading")
                    .with("level", 3_i64)
                    .with("content", "Major Datasets"),
            );
            nodes.push(heading_id);

            for p in dom.direct_children(sec, "p") {
                let pars = self.paragraph_group(state, dom, p);
                nodes.extend(pars.into_iter().next());
            }
        }
        nodes
    }

    fn extract_custom_meta_group(
        &self,
        state: &mut State,
        dom: &XmlDom,
        article: XmlNodeId,
    ) -> Vec<String> {
        if self.options.ignore_all_custom_meta {
            return Vec::new();
        }
        let Some(article_meta) = dom.find_by_tag(article, "article-meta") else {
            return Vec::new();
        };

        let mut node_ids = Vec::new();
        for custom_meta in dom.find_all_by_tag(article_meta, "custom-meta") {
            let Some(meta_name) = dom.find_by_tag(custom_meta, "meta-name") else {
                continue;
            };
            let Some(meta_value) = dom.find_by_tag(custom_meta, "meta-value") else {
                continue;
            };
            let name_text = dom.text_content(meta_name);
            if self.options.ignore_custom_meta_names.contains(&name_text) {
                continue;
            }

            if !self
                .options
                .ignore_custom_meta_header_names
                .contains(&name_text)
            {
                let heading_id = state.next_id("heading");
                let content = self.annotated_text(
                    state,
                    dom,
                    meta_name,
                    PropertyPath::new(&heading_id, "content"),
                    &[],
                );
                state.doc.create(
                    Node::new(&heading_id, "heading")
                        .with("level", 3_i64)
                        .with("content", content),
                );
                node_ids.push(heading_id);
            }

            node_ids.extend(self.paragraph_group(state, dom, meta_value));
        }
        node_ids
    }

    fn extract_copyright_and_license(
        &self,
        state: &mut State,
        dom: &XmlDom,
        article: XmlNodeId,
    ) -> Vec<String> {
        let Some(permissions) = dom.find_by_tag(article, "permissions") else {
            return Vec::new();
        };

        let mut nodes = Vec::new();
        let heading_id = state.next_id("heading");
        state.doc.create(
            Node::new(&heading_id, "heading")
                .with("level", 3_i64)
                .with("content", "Copyright & License"),
        );
        nodes.push(heading_id);

        if let Some(copyright) = dom.find_by_tag(permissions, "copyright-statement") {
            let pars = self.paragraph_group(state, dom, copyright);
            if !pars.is_empty() {
                // Statements render inline with the license text; make sure
                // the sentence is terminated.
                if !dom.text_content(copyright).trim().ends_with('.') {
                    self.append_period(state, &pars);
                }
                nodes.extend(pars);
            }
        }

        if let Some(license) = dom.find_by_tag(permissions, "license") {
            for child in dom.child_elements(license).collect::<Vec<_>>() {
                let tag = dom.element_name(child).unwrap_or("");
                if tag == "p" || tag == "license-p" {
                    nodes.extend(self.paragraph_group(state, dom, child));
                }
            }
        }
        nodes
    }

    /// Append ". " to the last text child of the last paragraph in a group.
    fn append_period(&self, state: &mut State, paragraph_ids: &[String]) {
        let Some(last_par) = paragraph_ids.last() else {
            return;
        };
        let last_text_id = state
            .doc
            .node(last_par)
            .and_then(|p| p.get("children"))
            .and_then(Value::as_list)
            .and_then(|children| children.last())
            .and_then(Value::as_str)
            .map(str::to_string);
        if let Some(text_id) = last_text_id {
            if let Some(text_node) = state.doc.node_mut(&text_id) {
                if let Some(content) = text_node.get_str("content").map(str::to_string) {
                    text_node.set("content", format!("{}. ", content));
                }
            }
        }
    }

    fn extract_acknowledgements(
        &self,
        state: &mut State,
        dom: &XmlDom,
        article: XmlNodeId,
    ) -> Vec<String> {
        let mut nodes = Vec::new();
        for ack in dom.find_all_by_tag(article, "ack") {
            let title = dom.find_by_tag(ack, "title");
            let heading_id = state.next_id("heading");
            let content = match title {
                Some(t) => capitalize_words(&dom.text_content(t).to_lowercase()),
                None => "Acknowledgements".to_string(),
            };
            state.doc.create(
                Node::new(&heading_id, "heading")
                    .with("level", 1_i64)
                    .with("content", content),
            );
            nodes.push(heading_id);

            let children: Vec<_> = dom.children(ack).collect();
            nodes.extend(self.body_nodes(state, dom, &children, &["title"]));
        }
        nodes
    }

    // ### Cover

    fn extract_cover(&self, state: &mut State, dom: &XmlDom, article: XmlNodeId) {
        let mut cover = Node::new("cover", "cover")
            .with("title", state.doc.title.clone())
            .with("subtitle", state.doc.subtitle.clone())
            .with("authors", Vec::<Value>::new())
            .with("abstract", state.abstract_id.clone());

        // Author names become text nodes carrying contributor references,
        // which is what activates the author cards.
        let authors = state.doc.authors.clone();
        for contributor_id in authors {
            let Some(contributor) = state.doc.node(&contributor_id) else {
                continue;
            };
            let mut name = contributor.get_str("name").unwrap_or("").to_string();
            if let Some(degrees) = contributor.get_str("degrees") {
                if !degrees.is_empty() {
                    name = format!("{}, {}", name, degrees);
                }
            }

            let text_id = format!("text_{}_reference", contributor_id);
            state
                .doc
                .create(Node::new(&text_id, "text").with("content", name.clone()));
            cover.push("authors", text_id.clone());

            let mut anno = crate::graph::Annotation::new(
                "contributor_reference",
                PropertyPath::new(&text_id, "content"),
                (0, name.chars().count()),
            );
            anno.target = Some(contributor_id);
            anno.id = state.next_id("contributor_reference");
            state.annotations.push(anno);
        }

        self.hooks.cover(&mut cover, dom, article);
        state.doc.create(cover);
        state.doc.show_at(CONTENT, "cover", 0);
    }

    // ### Back matter

    fn back(&self, state: &mut State, dom: &XmlDom, back: XmlNodeId) {
        let app_groups = dom.find_all_by_tag(back, "app-group");
        if !app_groups.is_empty() {
            for group in app_groups {
                self.app_group(state, dom, group);
            }
        } else {
            // Some documents put <app> elements into <back> directly.
            self.app_group(state, dom, back);
        }
    }

    fn app_group(&self, state: &mut State, dom: &XmlDom, group: XmlNodeId) {
        let apps = dom.find_all_by_tag(group, "app");
        if apps.is_empty() {
            return;
        }

        let title = dom.direct_children(group, "title").into_iter().next();
        if title.is_none() {
            warn!("app-group without title");
        }

        let heading_id = state.next_id("heading");
        let content = match title {
            Some(t) => self.annotated_text(
                state,
                dom,
                t,
                PropertyPath::new(&heading_id, "content"),
                &[],
            ),
            None => "Appendix".to_string(),
        };
        state.doc.create(
            Node::new(&heading_id, "heading")
                .with("level", 1_i64)
                .with("content", content),
        );
        self.show_nodes(state, &[heading_id]);

        for app in apps {
            state.section_level = 2;
            self.app(state, dom, app);
        }
    }

    fn app(&self, state: &mut State, dom: &XmlDom, app: XmlNodeId) {
        let title = dom.direct_children(app, "title").into_iter().next();
        if title.is_none() {
            warn!("app without title");
        }

        let heading_id = state.next_id("heading");
        let content = match title {
            Some(t) => self.annotated_text(
                state,
                dom,
                t,
                PropertyPath::new(&heading_id, "content"),
                &[],
            ),
            None => String::new(),
        };
        state.doc.create(
            Node::new(&heading_id, "heading")
                .with("level", 2_i64)
                .with("content", content),
        );

        let mut nodes = vec![heading_id];
        let children: Vec<_> = dom.children(app).collect();
        nodes.extend(self.body_nodes(state, dom, &children, &["title", "label", "ref-list"]));
        self.show_nodes(state, &nodes);
    }
}

// ### Date handling

/// Extract a `year/month/day` date string from a JATS date element.
/// A non-numeric month is treated as a season and carried verbatim.
fn extract_date(dom: &XmlDom, date_el: XmlNodeId) -> Option<String> {
    let year = dom.find_by_tag(date_el, "year")?;
    let mut parts = vec![dom.text_content(year)];

    if let Some(month) = dom.find_by_tag(date_el, "month") {
        let month_text = dom.text_content(month);
        match normalize_month(&month_text) {
            Some(num) => {
                parts.push(num.to_string());
                if let Some(day) = dom.find_by_tag(date_el, "day") {
                    parts.push(dom.text_content(day));
                }
            }
            None => parts.push(month_text),
        }
    } else if let Some(season) = dom.find_by_tag(date_el, "season") {
        parts.push(dom.text_content(season));
    }
    Some(parts.join("/"))
}

/// Select first-published and published dates from the pub-date elements,
/// honoring the epub/ppub/collection precedence rules.
fn extract_publication_dates(
    dom: &XmlDom,
    article: XmlNodeId,
    is_pap: bool,
) -> (Option<String>, Option<String>) {
    let dates = dom.find_all_by_tag(article, "pub-date");
    if dates.is_empty() {
        return (None, None);
    }

    let by_type = |t: &str| {
        dates
            .iter()
            .copied()
            .find(|&d| dom.get_attr(d, "pub-type") == Some(t))
    };
    let untyped = dates
        .iter()
        .copied()
        .find(|&d| dom.get_attr(d, "pub-type").is_none());

    let epub_ppub = by_type("epub-ppub");
    let epub = by_type("epub").or(epub_ppub);
    let ppub = by_type("ppub").or(epub_ppub);
    let collection = by_type("collection");

    let first = epub.or(ppub).or(collection).or(untyped);
    let published = if is_pap {
        first
    } else {
        collection.or(ppub).or(untyped)
    };

    (
        first.and_then(|d| extract_date(dom, d)),
        published.and_then(|d| extract_date(dom, d)),
    )
}

/// Related-article links, preferring reader links for DOI references.
fn extract_related_articles(dom: &XmlDom, article: XmlNodeId) -> Vec<Value> {
    let mut result = Vec::new();
    for related in dom.find_all_by_tag(article, "related-article") {
        let Some(href) = dom.get_attr(related, "xlink:href") else {
            continue;
        };
        let is_doi = dom.get_attr(related, "ext-link-type") == Some("doi");
        let link = if is_doi {
            match dom.get_attr(related, "reader_link") {
                Some(reader_link) => reader_link.to_string(),
                None => format!("http://dx.doi.org/{}", href),
            }
        } else {
            href.to_string()
        };

        let mut entry = std::collections::BTreeMap::new();
        entry.insert("href".to_string(), Value::Str(link));
        entry.insert("text".to_string(), Value::Str(href.to_string()));
        result.push(Value::Map(entry));
    }
    result
}

/// First direct child element with a tag and attribute value.
fn find_direct_attr_el(
    dom: &XmlDom,
    parent: XmlNodeId,
    tag: &str,
    attr: &str,
    value: &str,
) -> Option<XmlNodeId> {
    dom.child_elements(parent).find(|&el| {
        dom.element_name(el) == Some(tag) && dom.get_attr(el, attr) == Some(value)
    })
}
