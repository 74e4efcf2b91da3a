use std::collections::HashMap;

use super::*;
use crate::xref::external::LoadedSource;
use crate::dom::markup::{parse, serialize};

fn options() -> ProcessOptions {
    ProcessOptions::default()
}

fn define_all(doc: &mut Document, options: &ProcessOptions) -> Result<TermTable, ProcessError> {
    let mut table = TermTable::new();
    let mut registry = IdRegistry::new();
    collect_definitions(doc, &mut registry, &mut table, None, "test.html", options)?;
    Ok(table)
}

fn link_all(input: &str, options: &ProcessOptions) -> String {
    let mut doc = parse(input).expect("parse");
    let table = define_all(&mut doc, options).expect("definitions");
    for (element, href) in plan_links(&doc, &table, None, options.compatibility_mode) {
        rewrite_as_link(&mut doc, element, &href, options.compatibility_mode);
    }
    serialize(&doc)
}

struct StaticLoader {
    sources: HashMap<String, LoadedSource>,
}

impl SourceLoader for StaticLoader {
    fn load(&self, address: &Url) -> anyhow::Result<LoadedSource> {
        self.sources
            .get(address.as_str())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("connection refused"))
    }
}

#[test]
fn terms_normalize_override_title_then_text() {
    let doc = parse(
        "<p><dfn data-xref=\"Foo  Bar\">x</dfn><dfn title=\" The\tWidget \">y</dfn><dfn>  Plain\n Text </dfn></p>",
    )
    .expect("parse");
    let dfns = doc.descendant_elements_named(doc.root(), "dfn");
    assert_eq!(term_of(&doc, dfns[0], false), "foo bar");
    assert_eq!(term_of(&doc, dfns[1], false), "the widget");
    assert_eq!(term_of(&doc, dfns[2], false), "plain text");
}

#[test]
fn compatibility_normalization_drops_punctuation() {
    assert_eq!(normalize_term("Node's child-list (live)", true), "nodes child-list live");
    assert_eq!(normalize_term("Node's", false), "node's");
}

#[test]
fn duplicate_definitions_are_rejected() {
    let mut doc = parse("<p><dfn>Widget</dfn> and <dfn>widget</dfn></p>").expect("parse");
    let err = define_all(&mut doc, &options()).expect_err("duplicate");
    assert_eq!(
        err,
        ProcessError::DuplicateDefinition {
            document: "test.html".to_string(),
            term: "widget".to_string(),
        }
    );
}

#[test]
fn allowed_duplicates_keep_the_last_definition() {
    let mut doc = parse("<p><dfn id=\"first\">Widget</dfn> and <dfn id=\"second\">widget</dfn></p>")
        .expect("parse");
    let options = ProcessOptions {
        allow_duplicate_definitions: true,
        ..ProcessOptions::default()
    };
    let table = define_all(&mut doc, &options).expect("definitions");
    assert_eq!(table.len(), 1);
    assert_eq!(table.get("widget").map(|target| target.fragment.as_str()), Some("second"));
}

#[test]
fn definitions_in_headings_anchor_on_the_heading() {
    let mut doc = parse("<body><h2>The <dfn>gadget</dfn> interface</h2><p><dfn>knob</dfn></p></body>")
        .expect("parse");
    let table = define_all(&mut doc, &options()).expect("definitions");
    let h2 = doc.descendant_elements_named(doc.root(), "h2")[0];
    assert_eq!(doc.attr(h2, "id"), Some("the-gadget-interface"));
    assert_eq!(table.get("gadget").map(|target| target.fragment.as_str()), Some("the-gadget-interface"));
    assert_eq!(table.get("knob").map(|target| target.fragment.as_str()), Some("knob"));
}

#[test]
fn generic_inline_references_become_links() {
    let html = link_all(
        "<p><dfn>widget</dfn></p><p>A <span class=\"x\">widget</span> and <code>widget</code>.</p>",
        &options(),
    );
    assert_eq!(
        html,
        "<p><dfn id=\"widget\">widget</dfn></p><p>A <a class=\"x\" href=\"#widget\">widget</a> and <a href=\"#widget\"><code>widget</code></a>.</p>"
    );
}

#[test]
fn compatibility_placement_wraps_children() {
    let options = ProcessOptions {
        compatibility_mode: true,
        ..ProcessOptions::default()
    };
    let html = link_all("<p><dfn>widget</dfn> <em>wid<b>get</b></em> tail</p>", &options);
    assert_eq!(
        html,
        "<p><dfn id=\"widget\">widget</dfn> <em><a href=\"#widget\">wid<b>get</b></a></em> tail</p>"
    );
}

#[test]
fn references_inside_links_are_left_alone() {
    let html = link_all(
        "<p><dfn>widget</dfn></p><p><a href=\"#x\"><span>widget</span></a></p>",
        &options(),
    );
    assert!(html.contains("<a href=\"#x\"><span>widget</span></a>"));
}

#[test]
fn references_containing_blockers_are_left_alone() {
    let html = link_all(
        "<p><dfn data-xref=\"widget\">w</dfn></p><p><span title=\"widget\"><dfn>gizmo</dfn></span><i title=\"widget\">see <video controls=\"\">v</video></i></p>",
        &options(),
    );
    assert!(html.contains("<span title=\"widget\"><dfn id=\"gizmo\">gizmo</dfn></span>"));
    assert!(html.contains("<i title=\"widget\">see <video controls=\"\">v</video></i>"));
}

#[test]
fn nested_references_link_only_the_innermost() {
    let html = link_all(
        "<p><dfn>widget</dfn></p><p><code title=\"widget\"><var>widget</var></code></p>",
        &options(),
    );
    assert!(html.contains("<code title=\"widget\"><a href=\"#widget\"><var>widget</var></a></code>"));
}

#[test]
fn unknown_terms_are_untouched() {
    let input = "<p><dfn>widget</dfn></p><p><span>gadget</span></p>";
    let html = link_all(input, &options());
    assert!(html.contains("<span>gadget</span>"));
}

#[test]
fn targets_resolve_relative_to_the_referring_document() {
    let target = TermTarget::new(Some("https://example.org/docs/dom.html"), "concept-node");
    assert_eq!(
        target.href_from(Some("https://example.org/docs/dom.html")),
        "#concept-node"
    );
    assert_eq!(
        target.href_from(Some("https://example.org/docs/html.html#top")),
        "dom.html#concept-node"
    );
    assert_eq!(
        target.href_from(Some("https://other.example/page.html")),
        "https://example.org/docs/dom.html#concept-node"
    );
    assert_eq!(target.href_from(None), "https://example.org/docs/dom.html#concept-node");
    assert_eq!(TermTarget::new(None, "x").href_from(Some("file:///a.html")), "#x");
}

#[test]
fn external_json_database_is_merged() {
    let database = r##"{"name":"dom","url":"https://example.org/dom.html","definitions":{"Node":"#concept-node","event":"https://example.org/events.html#event"}}"##;
    let loader = StaticLoader {
        sources: HashMap::from([(
            "https://example.org/terms.json".to_string(),
            LoadedSource {
                content_type: Some("application/json; charset=utf-8".to_string()),
                body: database.to_string(),
            },
        )]),
    };
    let mut pass = XrefPass::new(Box::new(loader)).expect("pass");
    let options = ProcessOptions {
        external_sources: vec!["https://example.org/terms.json".to_string()],
        ..ProcessOptions::default()
    };
    pass.prepare(&options).expect("prepare");
    assert_eq!(
        pass.table().get("node").map(TermTarget::absolute),
        Some("https://example.org/dom.html#concept-node".to_string())
    );
    assert_eq!(
        pass.table().get("event").map(TermTarget::absolute),
        Some("https://example.org/events.html#event".to_string())
    );
}

#[test]
fn external_markup_definitions_use_the_source_address() {
    let loader = StaticLoader {
        sources: HashMap::from([(
            "https://example.org/dom.html".to_string(),
            LoadedSource {
                content_type: Some("text/html".to_string()),
                body: "<body><p><dfn id=\"concept-tree\">tree</dfn></p></body>".to_string(),
            },
        )]),
    };
    let mut pass = XrefPass::new(Box::new(loader)).expect("pass");
    let options = ProcessOptions {
        external_sources: vec!["https://example.org/dom.html".to_string()],
        ..ProcessOptions::default()
    };
    pass.prepare(&options).expect("prepare");
    assert_eq!(
        pass.table().get("tree").map(TermTarget::absolute),
        Some("https://example.org/dom.html#concept-tree".to_string())
    );
}

#[test]
fn external_source_failures_are_reported() {
    let loader = StaticLoader {
        sources: HashMap::new(),
    };
    let mut pass = XrefPass::new(Box::new(loader)).expect("pass");

    let relative = ProcessOptions {
        external_sources: vec!["terms.json".to_string()],
        ..ProcessOptions::default()
    };
    assert_eq!(pass.prepare(&relative).expect_err("relative").kind(), "external-source");

    let unreachable = ProcessOptions {
        external_sources: vec!["https://example.org/missing.json".to_string()],
        ..ProcessOptions::default()
    };
    match pass.prepare(&unreachable) {
        Err(ProcessError::ExternalSource { address, reason }) => {
            assert_eq!(address, "https://example.org/missing.json");
            assert!(reason.contains("connection refused"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn exported_database_round_trips_targets() {
    let mut table = TermTable::new();
    table
        .define(
            "widget".to_string(),
            TermTarget::new(Some("file:///docs/a.html"), "widget"),
            false,
            "a.html",
        )
        .expect("define");
    let database = external::to_database(&table, "batch");
    let mut restored = TermTable::new();
    external::merge_database(&database, "batch", &mut restored, &options()).expect("merge");
    assert_eq!(restored.get("widget"), table.get("widget"));
}
