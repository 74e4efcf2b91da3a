use super::markup::{MarkupReader, serialize, serialize_node};
use super::*;

fn parse(input: &str) -> Document {
    MarkupReader::new().expect("reader").parse(input)
}

fn first_named(doc: &Document, name: &str) -> NodeId {
    doc.descendant_elements_named(doc.root(), name)
        .into_iter()
        .next()
        .unwrap_or_else(|| panic!("no <{name}> in document"))
}

#[test]
fn parse_and_serialize_preserves_markup() {
    let input = "<!DOCTYPE html><html><body><h1 id=\"x\">A &amp; B</h1><p>one<br>two</p><!--toc--></body></html>";
    let doc = parse(input);
    assert_eq!(serialize(&doc), input);
}

#[test]
fn parse_records_doctype_public_identifier() {
    let doc = parse(
        "<!DOCTYPE html PUBLIC \"-//W3C//DTD HTML 4.01//EN\" \"http://www.w3.org/TR/html4/strict.dtd\"><p>x</p>",
    );
    assert_eq!(doc.doctype_public_id(), Some("-//W3C//DTD HTML 4.01//EN"));
    assert_eq!(doc.prolog().len(), 1);

    let plain = parse("<!doctype html><p>x</p>");
    assert_eq!(plain.doctype_public_id(), None);
}

#[test]
fn parse_splits_text_and_tail() {
    let doc = parse("<p>lead <b>bold</b> trail</p>");
    let p = first_named(&doc, "p");
    let b = first_named(&doc, "b");
    assert_eq!(doc.text(p), Some("lead "));
    assert_eq!(doc.text(b), Some("bold"));
    assert_eq!(doc.tail(b), Some(" trail"));
    assert_eq!(doc.text_content(p), "lead bold trail");
}

#[test]
fn parse_ignores_stray_end_tags_and_closes_at_eof() {
    let doc = parse("<div><p>a</span>b</div><section><h1>open");
    let p = first_named(&doc, "p");
    assert_eq!(doc.text(p), Some("ab"));
    let h1 = first_named(&doc, "h1");
    assert_eq!(doc.text(h1), Some("open"));
    assert_eq!(serialize(&doc), "<div><p>ab</p></div><section><h1>open</h1></section>");
}

#[test]
fn parse_keeps_raw_text_verbatim() {
    let input = "<script>if (a < b && c) {}</script><p>x</p>";
    let doc = parse(input);
    let script = first_named(&doc, "script");
    assert_eq!(doc.text(script), Some("if (a < b && c) {}"));
    assert_eq!(serialize(&doc), input);
}

#[test]
fn attributes_are_decoded_and_escaped() {
    let doc = parse("<a title='say \"hi\"' href=x.html#a&amp;b>t</a>");
    let a = first_named(&doc, "a");
    assert_eq!(doc.attr(a, "title"), Some("say \"hi\""));
    assert_eq!(doc.attr(a, "href"), Some("x.html#a&b"));
    assert_eq!(
        serialize_node(&doc, a),
        "<a title=\"say &quot;hi&quot;\" href=\"x.html#a&amp;b\">t</a>"
    );
}

#[test]
fn unwrap_element_keeps_content_in_order() {
    let mut doc = parse("<p>a<em>b<i>c</i>d</em>e</p>");
    let em = first_named(&doc, "em");
    doc.unwrap_element(em);
    let p = first_named(&doc, "p");
    assert_eq!(serialize_node(&doc, p), "<p>ab<i>c</i>de</p>");
}

#[test]
fn remove_drops_content_but_keeps_tail() {
    let mut doc = parse("<h1><span class=\"secno\">1 </span>Intro</h1>");
    let span = first_named(&doc, "span");
    doc.remove(span);
    let h1 = first_named(&doc, "h1");
    assert_eq!(serialize_node(&doc, h1), "<h1>Intro</h1>");
}

#[test]
fn structural_edits_bump_generation() {
    let mut doc = parse("<body><p>x</p></body>");
    let body = first_named(&doc, "body");
    let start = doc.structure_generation();

    let para = doc.create_element("p");
    doc.append_child(body, para);
    assert_eq!(doc.structure_generation(), start);

    let section = doc.create_element("section");
    doc.append_child(body, section);
    assert_eq!(doc.structure_generation(), start + 1);

    doc.rename(para, "h2");
    assert_eq!(doc.structure_generation(), start + 2);

    doc.set_attr(para, "id", "x");
    assert_eq!(doc.structure_generation(), start + 2);
}

#[test]
fn detached_edits_leave_generation_alone() {
    let mut doc = parse("<body></body>");
    let start = doc.structure_generation();
    let section = doc.create_element("section");
    let heading = doc.create_element("h1");
    doc.append_child(section, heading);
    doc.rename(heading, "h2");
    assert_eq!(doc.structure_generation(), start);
}

#[test]
fn deep_copy_is_detached_and_independent() {
    let mut doc = parse("<h1 id=\"a\">x<b>y</b></h1>tail");
    let h1 = first_named(&doc, "h1");
    let copy = doc.deep_copy(h1);
    assert!(!doc.is_attached(copy));
    assert_eq!(doc.tail(copy), Some("tail"));
    doc.set_attr(copy, "id", "b");
    assert_eq!(doc.attr(h1, "id"), Some("a"));
    assert_eq!(doc.text_content(copy), "xy");
}

#[test]
fn text_content_skipping_keeps_tails_of_skipped() {
    let doc = parse("<h2><span class=\"secno\">2.1 </span>Scope</h2>");
    let h2 = first_named(&doc, "h2");
    let text = doc.text_content_skipping(h2, &|doc, node| doc.has_class(node, "secno"));
    assert_eq!(text, "Scope");
}

#[test]
fn walk_emits_balanced_events() {
    let doc = parse("<div><p></p><p></p></div>");
    let events: Vec<WalkEvent> = doc.walk(doc.root()).collect();
    let enters = events
        .iter()
        .filter(|event| matches!(event, WalkEvent::Enter(_)))
        .count();
    assert_eq!(enters * 2, events.len());
    assert_eq!(events.first(), Some(&WalkEvent::Enter(doc.root())));
    assert_eq!(events.last(), Some(&WalkEvent::Exit(doc.root())));
}
