//! Term definitions and the links that point at them.
//!
//! Definitions are collected from every document of a batch (and from any
//! external sources) before a single reference is rewritten, so a document
//! may link to terms defined in documents processed after it.

use std::collections::BTreeMap;

use anyhow::Result;
use tracing::{debug, info, trace};
use url::Url;

use crate::config::ProcessOptions;
use crate::dom::markup::MarkupReader;
use crate::dom::{Document, NodeId, WalkEvent};
use crate::error::ProcessError;
use crate::ids::{self, IdRegistry, IdentifierSyntax};
use crate::pipeline::{Pass, PassContext, SourceDocument};
use crate::vocab::{self, DEFINITION_ELEMENT, GENERIC_INLINE_ELEMENT, LINK_ELEMENT, XREF_ATTRIBUTE};

pub mod external;
#[cfg(test)]
mod tests;

pub use external::{HttpSourceLoader, SourceLoader};

/// Where a term is defined: an anchor inside a document, identified by the
/// document's address when it has one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermTarget {
    pub document: Option<String>,
    pub fragment: String,
}

impl TermTarget {
    pub fn new(document: Option<&str>, fragment: &str) -> Self {
        Self {
            document: document.map(strip_fragment).map(str::to_string),
            fragment: fragment.to_string(),
        }
    }

    /// Splits `doc#fragment`; a bare `#fragment` has no document.
    pub fn from_reference(reference: &str) -> Self {
        match reference.rsplit_once('#') {
            Some((document, fragment)) => {
                let document = (!document.is_empty()).then_some(document);
                Self::new(document, fragment)
            }
            None => Self::new(Some(reference), ""),
        }
    }

    pub fn absolute(&self) -> String {
        match &self.document {
            Some(document) => format!("{document}#{}", self.fragment),
            None => format!("#{}", self.fragment),
        }
    }

    /// The `href` to use from a document at `base`: a bare fragment within
    /// the same document, a relative URL when both ends are URLs on the same
    /// origin, and the absolute reference otherwise.
    pub fn href_from(&self, base: Option<&str>) -> String {
        let Some(document) = &self.document else {
            return format!("#{}", self.fragment);
        };
        let Some(base) = base else {
            return self.absolute();
        };
        if strip_fragment(base) == document {
            return format!("#{}", self.fragment);
        }
        match (Url::parse(base), Url::parse(&self.absolute())) {
            (Ok(base), Ok(target)) => base
                .make_relative(&target)
                .filter(|relative| !relative.is_empty())
                .unwrap_or_else(|| self.absolute()),
            _ => self.absolute(),
        }
    }
}

fn strip_fragment(address: &str) -> &str {
    address.split_once('#').map_or(address, |(document, _)| document)
}

/// Normalized term to definition target, shared by a whole batch.
#[derive(Debug, Clone, Default)]
pub struct TermTable {
    terms: BTreeMap<String, TermTarget>,
}

impl TermTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a definition. A repeated term is an error unless duplicates
    /// are allowed, in which case the later definition wins.
    pub fn define(
        &mut self,
        term: String,
        target: TermTarget,
        allow_duplicates: bool,
        document: &str,
    ) -> Result<(), ProcessError> {
        if !allow_duplicates && self.terms.contains_key(&term) {
            return Err(ProcessError::DuplicateDefinition {
                document: document.to_string(),
                term,
            });
        }
        trace!(term = %term, target = %target.absolute(), "defined term");
        self.terms.insert(term, target);
        Ok(())
    }

    pub fn get(&self, term: &str) -> Option<&TermTarget> {
        self.terms.get(term)
    }

    pub fn contains(&self, term: &str) -> bool {
        self.terms.contains_key(term)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TermTarget)> {
        self.terms.iter()
    }
}

/// Trims, lowercases and collapses whitespace. Compatibility mode also drops
/// everything but ASCII letters, digits, spaces and hyphens.
pub fn normalize_term(raw: &str, compatibility: bool) -> String {
    let term = vocab::collapse_spaces(&raw.to_lowercase());
    if compatibility {
        term.chars()
            .filter(|ch| ch.is_ascii_alphanumeric() || *ch == ' ' || *ch == '-')
            .collect()
    } else {
        term
    }
}

/// The term an element names: its `data-xref` override, else its `title`,
/// else its text.
pub fn term_of(doc: &Document, element: NodeId, compatibility: bool) -> String {
    let raw = match doc
        .attr(element, XREF_ATTRIBUTE)
        .or_else(|| doc.attr(element, "title"))
    {
        Some(value) => value.to_string(),
        None => doc.text_content(element),
    };
    normalize_term(&raw, compatibility)
}

fn blocks_links(doc: &Document, node: NodeId) -> bool {
    doc.name(node) == DEFINITION_ELEMENT || vocab::is_interactive_content(doc, node)
}

/// Collects every definition in `doc` into `table`, giving each anchor an
/// identifier. The anchor is the enclosing heading when the definition sits
/// inside one. Returns the number of definitions found.
pub fn collect_definitions(
    doc: &mut Document,
    registry: &mut IdRegistry,
    table: &mut TermTable,
    address: Option<&str>,
    label: &str,
    options: &ProcessOptions,
) -> Result<usize, ProcessError> {
    let syntax = IdentifierSyntax::for_document(doc, options.force_legacy_identifiers);
    let mut found = 0;
    for definition in doc.descendant_elements_named(doc.root(), DEFINITION_ELEMENT) {
        let term = term_of(doc, definition, options.compatibility_mode);
        if term.is_empty() {
            continue;
        }
        if !options.allow_duplicate_definitions && table.contains(&term) {
            return Err(ProcessError::DuplicateDefinition {
                document: label.to_string(),
                term,
            });
        }
        let anchor = doc
            .ancestors(definition)
            .find(|ancestor| vocab::is_heading_content(doc.name(*ancestor)))
            .unwrap_or(definition);
        let fragment = ids::ensure_element_id(doc, registry, anchor, syntax);
        table.define(
            term,
            TermTarget::new(address, &fragment),
            options.allow_duplicate_definitions,
            label,
        )?;
        found += 1;
    }
    Ok(found)
}

struct Frame {
    blocking: bool,
    contains_blocker: bool,
    href: Option<String>,
}

/// Finds the instance elements to turn into links, innermost first. An
/// element is skipped when it sits inside, or contains, a definition,
/// interactive content or another chosen link.
pub fn plan_links(
    doc: &Document,
    table: &TermTable,
    address: Option<&str>,
    compatibility: bool,
) -> Vec<(NodeId, String)> {
    let mut planned = Vec::new();
    let mut frames: Vec<Frame> = Vec::new();
    let mut blocked = 0usize;

    for event in doc.walk(doc.root()) {
        match event {
            WalkEvent::Enter(node) if doc.is_element(node) => {
                let blocking = blocks_links(doc, node);
                let href = if blocked == 0
                    && !blocking
                    && vocab::is_instance_element(doc.name(node), compatibility)
                {
                    let term = term_of(doc, node, compatibility);
                    match table.get(&term) {
                        Some(target) => Some(target.href_from(address)),
                        None => {
                            trace!(term = %term, "no definition for term");
                            None
                        }
                    }
                } else {
                    None
                };
                if blocking {
                    blocked += 1;
                }
                frames.push(Frame {
                    blocking,
                    contains_blocker: false,
                    href,
                });
            }
            WalkEvent::Exit(node) if doc.is_element(node) => {
                let Some(frame) = frames.pop() else {
                    continue;
                };
                if frame.blocking {
                    blocked -= 1;
                }
                let mut linked = false;
                if let Some(href) = frame.href {
                    if frame.contains_blocker {
                        debug!(element = doc.name(node), "reference contains a blocker; skipped");
                    } else {
                        planned.push((node, href));
                        linked = true;
                    }
                }
                if let Some(parent) = frames.last_mut() {
                    parent.contains_blocker |= frame.blocking || frame.contains_blocker || linked;
                }
            }
            _ => {}
        }
    }
    planned
}

/// Turns `element` into a link to `href`. A generic inline element becomes
/// the link itself; anything else is wrapped, or in compatibility mode has
/// its content wrapped.
pub fn rewrite_as_link(doc: &mut Document, element: NodeId, href: &str, compatibility: bool) {
    if doc.name(element) == GENERIC_INLINE_ELEMENT {
        doc.rename(element, LINK_ELEMENT);
        doc.set_attr(element, "href", href);
        return;
    }

    let link = doc.create_element_with(LINK_ELEMENT, &[("href", href)]);
    if compatibility {
        let text = doc.take_text(element);
        doc.set_text(link, text);
        for child in doc.children(element).to_vec() {
            doc.append_child(link, child);
        }
        doc.append_child(element, link);
    } else {
        doc.insert_before(element, link);
        doc.append_child(link, element);
        let tail = doc.take_tail(element);
        doc.set_tail(link, tail);
    }
}

pub struct XrefPass {
    table: TermTable,
    loader: Box<dyn SourceLoader>,
    reader: MarkupReader,
}

impl XrefPass {
    pub fn new(loader: Box<dyn SourceLoader>) -> Result<Self> {
        Ok(Self {
            table: TermTable::new(),
            loader,
            reader: MarkupReader::new()?,
        })
    }

    #[cfg(test)]
    pub fn table(&self) -> &TermTable {
        &self.table
    }
}

impl Pass for XrefPass {
    fn name(&self) -> &'static str {
        "xref"
    }

    fn prepare(&mut self, options: &ProcessOptions) -> Result<(), ProcessError> {
        for address in &options.external_sources {
            let count = external::load_terms(
                address,
                self.loader.as_ref(),
                &self.reader,
                &mut self.table,
                options,
            )?;
            info!(source = %address, terms = count, "loaded external definitions");
        }
        Ok(())
    }

    fn collect(
        &mut self,
        source: &mut SourceDocument,
        cx: &mut PassContext<'_>,
    ) -> Result<(), ProcessError> {
        let found = collect_definitions(
            &mut source.document,
            &mut source.ids,
            &mut self.table,
            source.address.as_deref(),
            &source.label,
            cx.options,
        )?;
        source.stats.definitions = found;
        debug!(document = %source.label, definitions = found, "collected definitions");
        Ok(())
    }

    fn apply(
        &mut self,
        source: &mut SourceDocument,
        cx: &mut PassContext<'_>,
    ) -> Result<(), ProcessError> {
        let compatibility = cx.options.compatibility_mode;
        let planned = plan_links(
            &source.document,
            &self.table,
            source.address.as_deref(),
            compatibility,
        );
        for (element, href) in &planned {
            rewrite_as_link(&mut source.document, *element, href, compatibility);
        }
        source.stats.links = planned.len();
        info!(
            document = %source.label,
            links = planned.len(),
            terms = self.table.len(),
            "linked term references"
        );
        Ok(())
    }
}
