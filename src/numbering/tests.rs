use super::*;
use crate::dom::markup::{parse, serialize};

fn labels(doc: &Document) -> Vec<String> {
    doc.descendant_elements_named(doc.root(), GENERIC_INLINE_ELEMENT)
        .into_iter()
        .filter(|span| doc.has_class(*span, SECNO_CLASS))
        .map(|span| doc.text_content(span))
        .collect()
}

fn number(input: &str) -> Document {
    let mut doc = parse(input).expect("parse");
    let outline = Outline::build(&doc);
    SectionNumberer::new().number(&mut doc, &outline);
    doc
}

#[test]
fn flat_headings_number_in_order() {
    let doc = number("<body><h1>A</h1><h1>B</h1><h1>C</h1></body>");
    assert_eq!(labels(&doc), vec!["1 ", "2 ", "3 "]);
}

#[test]
fn nested_headings_get_dotted_numbers() {
    let doc = number("<body><h1>A</h1><h2>B</h2><h2>C</h2><h1>D</h1></body>");
    assert_eq!(labels(&doc), vec!["1 ", "1.1 ", "1.2 ", "2 "]);
}

#[test]
fn label_precedes_header_text() {
    let doc = number("<body><h1>Intro <em>here</em></h1></body>");
    assert_eq!(
        serialize(&doc),
        "<body><h1><span class=\"secno\">1 </span>Intro <em>here</em></h1></body>"
    );
}

#[test]
fn renumbering_is_idempotent() {
    let mut doc = parse("<body><h1>A</h1><h2>B</h2><h1>C</h1></body>").expect("parse");
    let outline = Outline::build(&doc);
    SectionNumberer::new().number(&mut doc, &outline);
    let once = serialize(&doc);
    SectionNumberer::new().number(&mut doc, &outline);
    assert_eq!(serialize(&doc), once);
}

#[test]
fn no_num_sections_are_skipped() {
    let doc = number(
        "<body><h1 class=\"no-num\">Abstract</h1><h1>A</h1><section class=\"no-num\"><h1>Hidden</h1></section><h1>B</h1></body>",
    );
    assert_eq!(labels(&doc), vec!["1 ", "2 "]);
}

#[test]
fn numbering_root_restarts_its_subtree() {
    let doc = number(
        "<body><h1>A</h1><h2>A.1</h2><h2 class=\"numbering-root\">Root</h2><h3>Child</h3><h3>Child</h3></body>",
    );
    assert_eq!(labels(&doc), vec!["1 ", "1.1 ", "1 ", "1.1 ", "1.2 "]);
}

#[test]
fn unnumbered_numbering_root_numbers_children_from_one() {
    let doc = number(
        "<body><h1>Front</h1><section class=\"numbering-root no-num\"><h1>Annex</h1><h2>First</h2><h2>Second</h2></section></body>",
    );
    assert_eq!(labels(&doc), vec!["1 ", "1 ", "2 "]);
}

#[test]
fn headings_after_sectioning_roots_number_in_the_parent_outline() {
    let doc = number(
        "<body><h1>A</h1><figure><h1>F</h1></figure><figure><h1>G</h1></figure><h2>B</h2></body>",
    );
    assert_eq!(labels(&doc), vec!["1 ", "1.1 ", "1.2 ", "1.3 "]);
}

#[test]
fn counters_carry_across_documents_without_reset() {
    let mut numberer = SectionNumberer::new();
    let mut first = parse("<body><h1>A</h1><h1>B</h1></body>").expect("parse");
    let outline = Outline::build(&first);
    numberer.number(&mut first, &outline);
    let mut second = parse("<body><h1>C</h1></body>").expect("parse");
    let outline = Outline::build(&second);
    numberer.number(&mut second, &outline);
    assert_eq!(labels(&second), vec!["3 "]);

    numberer.reset();
    numberer.number(&mut second, &outline);
    assert_eq!(labels(&second), vec!["1 "]);
}
