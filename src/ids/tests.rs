use super::*;
use crate::dom::markup::{parse, serialize};
use crate::outline::Outline;

#[test]
fn fragment_identifiers_collapse_disallowed_runs() {
    let syntax = IdentifierSyntax::Fragment;
    assert_eq!(syntax.identifier_from("  Hello,  World! "), "hello,-world!");
    assert_eq!(syntax.identifier_from("a \"quoted\" <b>"), "a-quoted-b");
    assert_eq!(syntax.identifier_from("Überblick"), "überblick");
    assert_eq!(syntax.identifier_from("2. Scope"), "2.-scope");
}

#[test]
fn legacy_identifiers_start_with_a_letter() {
    let syntax = IdentifierSyntax::Legacy;
    assert_eq!(syntax.identifier_from("2. Scope"), "x2.-scope");
    assert_eq!(syntax.identifier_from("Überblick"), "berblick");
    assert_eq!(syntax.identifier_from("node_type:list"), "node_type:list");
}

#[test]
fn empty_sources_fall_back_to_generated_id() {
    assert_eq!(IdentifierSyntax::Fragment.identifier_from("   "), GENERATED_ID);
    assert_eq!(IdentifierSyntax::Fragment.identifier_from("\"<>\""), GENERATED_ID);
    assert_eq!(IdentifierSyntax::Legacy.identifier_from("!!"), GENERATED_ID);
}

#[test]
fn legacy_doctypes_select_legacy_syntax() {
    let strict = parse(
        "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Strict//EN\" \"http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd\"><html></html>",
    )
    .expect("parse");
    assert_eq!(IdentifierSyntax::for_document(&strict, false), IdentifierSyntax::Legacy);

    let modern = parse("<!DOCTYPE html><html></html>").expect("parse");
    assert_eq!(IdentifierSyntax::for_document(&modern, false), IdentifierSyntax::Fragment);
    assert_eq!(IdentifierSyntax::for_document(&modern, true), IdentifierSyntax::Legacy);
}

#[test]
fn claims_add_numeric_suffixes_after_existing_ids() {
    let doc = parse("<p id=\"intro\"></p><p id=\"intro-0\"></p>").expect("parse");
    let mut registry = IdRegistry::new();
    assert_eq!(registry.claim(&doc, "intro"), "intro-1");
    assert_eq!(registry.claim(&doc, "intro"), "intro-2");
    assert_eq!(registry.claim(&doc, "other"), "other");
    registry.release("other");
    assert_eq!(registry.claim(&doc, "other"), "other");
}

#[test]
fn element_ids_prefer_title_and_skip_labels() {
    let mut doc = parse(
        "<body><h1><span class=\"secno\">1 </span>Intro</h1><dfn title=\"Widget Set\">widgets</dfn><p id=\"x\">kept</p></body>",
    )
    .expect("parse");
    let mut registry = IdRegistry::new();
    let h1 = doc.descendant_elements_named(doc.root(), "h1")[0];
    let dfn = doc.descendant_elements_named(doc.root(), "dfn")[0];
    let p = doc.descendant_elements_named(doc.root(), "p")[0];
    let syntax = IdentifierSyntax::Fragment;
    assert_eq!(ensure_element_id(&mut doc, &mut registry, h1, syntax), "intro");
    assert_eq!(ensure_element_id(&mut doc, &mut registry, dfn, syntax), "widget-set");
    assert_eq!(ensure_element_id(&mut doc, &mut registry, p, syntax), "x");
}

#[test]
fn header_ids_move_to_the_section_element() {
    let mut doc = parse("<body><section><h2 id=\"scope\">Scope</h2></section></body>").expect("parse");
    let outline = Outline::build(&doc);
    let mut registry = IdRegistry::new();
    let section = outline.section(outline.top_level()[0]).children()[0];
    let id = ensure_section_id(
        &mut doc,
        &mut registry,
        outline.section(section),
        IdentifierSyntax::Fragment,
    );
    assert_eq!(id, "scope");
    assert_eq!(
        serialize(&doc),
        "<body><section id=\"scope\"><h2>Scope</h2></section></body>"
    );
}

#[test]
fn section_ids_stay_unique_within_a_document() {
    let mut doc = parse(
        "<body><h1>Notes</h1><section><h2>Notes</h2></section><section><h2>Notes</h2></section><section><p>none</p></section></body>",
    )
    .expect("parse");
    let outline = Outline::build(&doc);
    let mut registry = IdRegistry::new();
    let ids: Vec<String> = outline
        .depth_first()
        .into_iter()
        .map(|(id, _)| {
            ensure_section_id(
                &mut doc,
                &mut registry,
                outline.section(id),
                IdentifierSyntax::Fragment,
            )
        })
        .collect();
    assert_eq!(ids, vec!["notes", "notes-0", "notes-1", UNKNOWN_SECTION_ID]);
}
