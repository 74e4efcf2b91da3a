use std::collections::HashSet;

use tracing::trace;

use crate::dom::{Document, NodeId, WalkEvent};
use crate::outline::Section;
use crate::vocab::{self, SECNO_CLASS};

#[cfg(test)]
mod tests;

pub const GENERATED_ID: &str = "generatedID";
pub const UNKNOWN_SECTION_ID: &str = "unknown-section";

const LEGACY_PUBLIC_IDS: &[&str] = &[
    "-//W3C//DTD HTML 4.0//EN",
    "-//W3C//DTD HTML 4.0 Transitional//EN",
    "-//W3C//DTD HTML 4.0 Frameset//EN",
    "-//W3C//DTD HTML 4.01//EN",
    "-//W3C//DTD HTML 4.01 Transitional//EN",
    "-//W3C//DTD HTML 4.01 Frameset//EN",
    "ISO/IEC 15445:2000//DTD HyperText Markup Language//EN",
    "ISO/IEC 15445:2000//DTD HTML//EN",
    "-//W3C//DTD XHTML 1.0 Strict//EN",
    "-//W3C//DTD XHTML 1.0 Transitional//EN",
    "-//W3C//DTD XHTML 1.0 Frameset//EN",
    "-//W3C//DTD XHTML 1.1//EN",
];

/// Character set generated identifiers are restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierSyntax {
    /// Anything legal in an IRI fragment.
    Fragment,
    /// SGML name characters, starting with a letter.
    Legacy,
}

impl IdentifierSyntax {
    pub fn for_document(doc: &Document, force_legacy: bool) -> Self {
        let legacy_doctype = doc
            .doctype_public_id()
            .is_some_and(|public_id| LEGACY_PUBLIC_IDS.contains(&public_id));
        if force_legacy || legacy_doctype {
            IdentifierSyntax::Legacy
        } else {
            IdentifierSyntax::Fragment
        }
    }

    /// Normalizes free text into an identifier. Never returns an empty string.
    pub fn identifier_from(self, source: &str) -> String {
        let source = vocab::trim_spaces(source).to_lowercase();
        if source.is_empty() {
            return GENERATED_ID.to_string();
        }
        let sanitized = match self {
            IdentifierSyntax::Fragment => replace_runs(&source, is_fragment_char),
            IdentifierSyntax::Legacy => replace_runs(&source, is_legacy_char),
        };
        match sanitized.chars().next() {
            None => GENERATED_ID.to_string(),
            Some(first) if self == IdentifierSyntax::Legacy && !first.is_ascii_alphabetic() => {
                format!("x{sanitized}")
            }
            Some(_) => sanitized,
        }
    }
}

/// Replaces every run of disallowed characters with a single `-` and trims
/// `-` from both ends.
fn replace_runs(source: &str, allowed: fn(char) -> bool) -> String {
    let mut out = String::with_capacity(source.len());
    let mut in_run = false;
    for ch in source.chars() {
        if allowed(ch) {
            out.push(ch);
            in_run = false;
        } else if !in_run {
            out.push('-');
            in_run = true;
        }
    }
    out.trim_matches('-').to_string()
}

fn is_legacy_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | ':' | '.')
}

fn is_fragment_char(ch: char) -> bool {
    if ch.is_ascii() {
        return ch.is_ascii_alphanumeric() || "._~!$&'()*+,;=:@/?".contains(ch);
    }
    let code = ch as u32;
    match code {
        0xA0..=0xD7FF | 0xF900..=0xFDCF | 0xFDF0..=0xFFEF => true,
        0xE1000..=0xEFFFD => true,
        0x10000..=0xDFFFD => (code & 0xFFFF) <= 0xFFFD,
        _ => false,
    }
}

/// Identifiers in use within one document, scanned lazily on first use.
#[derive(Debug, Default)]
pub struct IdRegistry {
    ids: HashSet<String>,
    scanned: bool,
}

impl IdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn scan(&mut self, doc: &Document) {
        if self.scanned {
            return;
        }
        for event in doc.walk(doc.root()) {
            if let WalkEvent::Enter(node) = event
                && let Some(id) = doc.attr(node, "id")
            {
                self.ids.insert(id.to_string());
            }
        }
        self.scanned = true;
    }

    /// Reserves `base`, or the first free `base-0`, `base-1`, ... after it.
    pub fn claim(&mut self, doc: &Document, base: &str) -> String {
        self.scan(doc);
        let mut candidate = base.to_string();
        let mut suffix = 0usize;
        while self.ids.contains(&candidate) {
            candidate = format!("{base}-{suffix}");
            suffix += 1;
        }
        self.ids.insert(candidate.clone());
        candidate
    }

    pub fn release(&mut self, id: &str) {
        self.ids.remove(id);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

/// Source text an identifier is derived from: a non-blank `title`, otherwise
/// the element's text without any section number label.
pub fn identifier_source(doc: &Document, element: NodeId) -> String {
    if let Some(title) = doc.attr(element, "title")
        && !vocab::trim_spaces(title).is_empty()
    {
        return title.to_string();
    }
    doc.text_content_skipping(element, &|doc, node| doc.has_class(node, SECNO_CLASS))
}

/// Returns the element's id, assigning a unique derived one first if needed.
pub fn ensure_element_id(
    doc: &mut Document,
    registry: &mut IdRegistry,
    element: NodeId,
    syntax: IdentifierSyntax,
) -> String {
    if let Some(id) = doc.attr(element, "id") {
        return id.to_string();
    }
    let base = syntax.identifier_from(&identifier_source(doc, element));
    let id = registry.claim(doc, &base);
    doc.set_attr(element, "id", &id);
    trace!(id = %id, element = doc.name(element), "assigned identifier");
    id
}

/// Returns the section's id, set on its element. A header's own id moves to
/// the section element; otherwise one is derived from the header text.
pub fn ensure_section_id(
    doc: &mut Document,
    registry: &mut IdRegistry,
    section: &Section,
    syntax: IdentifierSyntax,
) -> String {
    let element = section.element();
    if let Some(id) = doc.attr(element, "id") {
        return id.to_string();
    }

    let base = match section.header_text_element(doc) {
        Some(header) => match doc.remove_attr(header, "id") {
            Some(existing) => {
                registry.release(&existing);
                existing
            }
            None => syntax.identifier_from(&identifier_source(doc, header)),
        },
        None => UNKNOWN_SECTION_ID.to_string(),
    };
    let id = registry.claim(doc, &base);
    doc.set_attr(element, "id", &id);
    trace!(id = %id, "assigned section identifier");
    id
}
