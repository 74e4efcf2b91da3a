use crate::dom::{Document, NodeId};

pub const SECNO_CLASS: &str = "secno";
pub const NO_NUM_CLASS: &str = "no-num";
pub const NO_TOC_CLASS: &str = "no-toc";
pub const NUMBERING_ROOT_CLASS: &str = "numbering-root";
pub const TOC_CLASS: &str = "toc";

pub const XREF_ATTRIBUTE: &str = "data-xref";
pub const DEFINITION_ELEMENT: &str = "dfn";
pub const LINK_ELEMENT: &str = "a";
pub const GENERIC_INLINE_ELEMENT: &str = "span";

pub const TOC_MARKER: &str = "toc";

const HEADINGS: [&str; 6] = ["h1", "h2", "h3", "h4", "h5", "h6"];
const HEADING_GROUP: &str = "hgroup";

const SECTIONING_CONTENT: &[&str] = &["section", "nav", "article", "aside"];
const SECTIONING_ROOT: &[&str] = &["body", "blockquote", "figure", "td", "datagrid"];

const ALWAYS_INTERACTIVE: &[&str] = &["a", "bb", "details", "datagrid"];
const MEDIA_ELEMENTS: &[&str] = &["audio", "video"];

const INSTANCE_ELEMENTS: &[&str] = &["span", "abbr", "code", "var", "i"];
const COMPAT_INSTANCE_ELEMENTS: &[&str] = &[
    "abbr", "acronym", "b", "bdo", "big", "code", "del", "em", "i", "ins", "kbd", "label",
    "legend", "q", "samp", "small", "span", "strong", "sub", "sup", "tt", "var",
];

/// Whitespace as markup defines it; narrower than `char::is_whitespace`.
pub fn is_space(ch: char) -> bool {
    matches!(ch, '\t' | '\n' | '\u{0C}' | '\r' | ' ')
}

pub fn trim_spaces(value: &str) -> &str {
    value.trim_matches(is_space)
}

pub fn split_on_spaces(value: &str) -> impl Iterator<Item = &str> {
    value.split(is_space).filter(|token| !token.is_empty())
}

pub fn collapse_spaces(value: &str) -> String {
    split_on_spaces(value).collect::<Vec<&str>>().join(" ")
}

pub fn heading_level(name: &str) -> Option<u8> {
    HEADINGS
        .iter()
        .position(|heading| *heading == name)
        .map(|index| index as u8 + 1)
}

pub fn is_heading_group(name: &str) -> bool {
    name == HEADING_GROUP
}

pub fn is_heading_content(name: &str) -> bool {
    heading_level(name).is_some() || is_heading_group(name)
}

pub fn is_sectioning_content(name: &str) -> bool {
    SECTIONING_CONTENT.contains(&name)
}

pub fn is_sectioning_root(name: &str) -> bool {
    SECTIONING_ROOT.contains(&name)
}

pub fn is_outlinee(name: &str) -> bool {
    is_sectioning_content(name) || is_sectioning_root(name)
}

/// Elements whose insertion or removal can change a document's outline.
pub fn affects_outline(name: &str) -> bool {
    is_heading_content(name) || is_outlinee(name)
}

pub fn is_instance_element(name: &str, compatibility: bool) -> bool {
    INSTANCE_ELEMENTS.contains(&name) || (compatibility && COMPAT_INSTANCE_ELEMENTS.contains(&name))
}

pub fn is_interactive_content(doc: &Document, node: NodeId) -> bool {
    if !doc.is_element(node) {
        return false;
    }
    let name = doc.name(node);
    if ALWAYS_INTERACTIVE.contains(&name) {
        return true;
    }
    if MEDIA_ELEMENTS.contains(&name) {
        return doc.attr(node, "controls").is_some();
    }
    name == "menu"
        && doc
            .attr(node, "type")
            .is_some_and(|value| value.eq_ignore_ascii_case("toolbar"))
}
