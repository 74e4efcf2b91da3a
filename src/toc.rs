use std::collections::HashMap;

use tracing::{debug, info, trace};

use crate::dom::markup::serialize_node;
use crate::dom::{Document, NodeId};
use crate::error::ProcessError;
use crate::ids::{self, IdRegistry, IdentifierSyntax};
use crate::outline::Outline;
use crate::pipeline::{Pass, PassContext, SourceDocument};
use crate::vocab::{self, DEFINITION_ELEMENT, LINK_ELEMENT, NO_TOC_CLASS, SECNO_CLASS, TOC_CLASS, TOC_MARKER};


pub const UNKNOWN_SECTION_LABEL: &str = "Unknown Section";

const LIST_ELEMENT: &str = "ol";
const ITEM_ELEMENT: &str = "li";

/// A table of contents built for one document but not yet inserted.
#[derive(Debug, Clone, Copy)]
pub struct PendingToc {
    pub list: NodeId,
    pub entries: usize,
}

pub struct TocBuilder<'a> {
    pub label: &'a str,
    pub syntax: IdentifierSyntax,
    pub compatibility: bool,
}

impl TocBuilder<'_> {
    /// Builds the nested list for `outline` as a detached fragment. Every
    /// listed section gets an identifier along the way.
    pub fn build(
        &self,
        doc: &mut Document,
        registry: &mut IdRegistry,
        outline: &Outline,
    ) -> Result<PendingToc, ProcessError> {
        let root_depth = effective_root_depth(doc, outline);
        let list = doc.create_element_with(LIST_ELEMENT, &[("class", TOC_CLASS)]);
        let mut entries = 0;

        for (id, depth) in outline.depth_first() {
            if depth < root_depth {
                continue;
            }
            let section = outline.section(id);
            let header = section.header_text_element(doc);
            let target = ids::ensure_section_id(doc, registry, section, self.syntax);
            if header.is_some_and(|header| doc.has_class(header, NO_TOC_CLASS)) {
                continue;
            }

            let parent = self.descend(doc, list, depth - root_depth);
            let item = doc.create_element(ITEM_ELEMENT);
            doc.append_child(parent, item);
            let link = match header {
                Some(header) => self.link_from_header(doc, header, &target)?,
                None => {
                    let href = format!("#{target}");
                    let link = doc.create_element_with(LINK_ELEMENT, &[("href", href.as_str())]);
                    doc.set_text(link, Some(UNKNOWN_SECTION_LABEL.to_string()));
                    link
                }
            };
            doc.append_child(item, link);
            entries += 1;
        }

        debug!(document = %self.label, root_depth, entries, "built table of contents");
        Ok(PendingToc { list, entries })
    }

    /// Returns the list `levels` below `list`, growing `li`/`ol` pairs on the
    /// last item as needed.
    fn descend(&self, doc: &mut Document, list: NodeId, levels: usize) -> NodeId {
        let mut current = list;
        for _ in 0..levels {
            let last_item = doc.children(current).last().copied();
            let item = match last_item {
                Some(item) => item,
                None => {
                    let item = doc.create_element(ITEM_ELEMENT);
                    doc.append_child(current, item);
                    item
                }
            };
            let nested = doc
                .children(item)
                .last()
                .copied()
                .filter(|child| doc.name(*child) == LIST_ELEMENT);
            current = match nested {
                Some(nested) => nested,
                None => {
                    let nested = doc.create_element(LIST_ELEMENT);
                    if self.compatibility {
                        doc.set_attr(nested, "class", TOC_CLASS);
                    }
                    doc.append_child(item, nested);
                    nested
                }
            };
        }
        current
    }

    fn link_from_header(
        &self,
        doc: &mut Document,
        header: NodeId,
        target: &str,
    ) -> Result<NodeId, ProcessError> {
        let link = doc.deep_copy(header);
        doc.rename(link, LINK_ELEMENT);
        doc.set_tail(link, None);

        for node in doc.descendants(link) {
            if vocab::is_interactive_content(doc, node) || doc.name(node) == DEFINITION_ELEMENT {
                doc.unwrap_element(node);
            }
        }
        doc.remove_attr(link, "id");
        for node in doc.descendants(link) {
            doc.remove_attr(node, "id");
        }
        doc.set_attr(link, "href", &format!("#{target}"));

        let expected = entry_text(doc, header);
        let found = entry_text(doc, link);
        if expected != found {
            return Err(ProcessError::InconsistentAnchor {
                document: self.label.to_string(),
                expected,
                found,
            });
        }
        Ok(link)
    }
}

/// Text of a header or TOC entry, without its number label.
pub fn entry_text(doc: &Document, node: NodeId) -> String {
    doc.text_content_skipping(node, &|doc, node| doc.has_class(node, SECNO_CLASS))
}

/// Shallowest depth holding a section that is not excluded from the table of
/// contents; 0 when every section is excluded.
pub fn effective_root_depth(doc: &Document, outline: &Outline) -> usize {
    outline
        .breadth_first()
        .into_iter()
        .find(|(id, _)| {
            outline
                .section(*id)
                .header_text_element(doc)
                .is_none_or(|header| !doc.has_class(header, NO_TOC_CLASS))
        })
        .map_or(0, |(_, depth)| depth)
}

/// Replaces every `<!--toc-->` marker, and every region left by an earlier
/// run, with `list`. Returns the number of regions written.
pub fn splice(doc: &mut Document, list: NodeId, label: &str) -> Result<usize, ProcessError> {
    let begin_marker = format!("begin-{TOC_MARKER}");
    let end_marker = format!("end-{TOC_MARKER}");
    let comments: Vec<NodeId> = doc
        .descendants(doc.root())
        .into_iter()
        .filter(|node| doc.is_comment(*node))
        .collect();

    let mut written = 0;
    let mut index = 0;
    while index < comments.len() {
        let comment = comments[index];
        let text = marker_text(doc, comment);
        if text == TOC_MARKER {
            let fragment = if written == 0 { list } else { doc.deep_copy(list) };
            let begin = doc.create_comment(&begin_marker);
            let end = doc.create_comment(&end_marker);
            doc.insert_before(comment, begin);
            doc.insert_before(comment, fragment);
            doc.insert_before(comment, end);
            let tail = doc.take_tail(comment);
            doc.set_tail(end, tail);
            doc.detach(comment);
            written += 1;
        } else if text == begin_marker {
            let Some(offset) = comments[index + 1..]
                .iter()
                .position(|node| marker_text(doc, *node) == end_marker)
            else {
                return Err(ProcessError::StructuralPrecondition {
                    document: label.to_string(),
                    marker: begin_marker,
                    detail: "no matching end marker".to_string(),
                });
            };
            let end = comments[index + 1 + offset];
            if doc.parent(end) != doc.parent(comment) {
                return Err(ProcessError::StructuralPrecondition {
                    document: label.to_string(),
                    marker: begin_marker,
                    detail: "begin and end markers have different parents".to_string(),
                });
            }
            while let Some(stale) = doc.next_sibling(comment).filter(|node| *node != end) {
                doc.detach(stale);
            }
            doc.set_tail(comment, None);
            let fragment = if written == 0 { list } else { doc.deep_copy(list) };
            doc.insert_after(comment, fragment);
            written += 1;
            index += offset + 1;
        }
        index += 1;
    }

    if written == 0 {
        return Err(ProcessError::StructuralPrecondition {
            document: label.to_string(),
            marker: TOC_MARKER.to_string(),
            detail: "document has no table of contents marker".to_string(),
        });
    }
    Ok(written)
}

fn marker_text(doc: &Document, comment: NodeId) -> String {
    vocab::trim_spaces(doc.text(comment).unwrap_or_default()).to_string()
}

#[derive(Debug, Default)]
pub struct TocPass {
    pending: HashMap<u64, PendingToc>,
}

impl TocPass {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Pass for TocPass {
    fn name(&self) -> &'static str {
        "toc"
    }

    fn collect(
        &mut self,
        source: &mut SourceDocument,
        cx: &mut PassContext<'_>,
    ) -> Result<(), ProcessError> {
        let outline = cx.outlines.outline(&source.document);
        let builder = TocBuilder {
            label: &source.label,
            syntax: IdentifierSyntax::for_document(
                &source.document,
                cx.options.force_legacy_identifiers,
            ),
            compatibility: cx.options.compatibility_mode,
        };
        let pending = builder.build(&mut source.document, &mut source.ids, &outline)?;
        self.pending.insert(source.document.handle(), pending);
        Ok(())
    }

    fn apply(
        &mut self,
        source: &mut SourceDocument,
        _cx: &mut PassContext<'_>,
    ) -> Result<(), ProcessError> {
        let Some(pending) = self.pending.remove(&source.document.handle()) else {
            return Ok(());
        };
        trace!(list = %serialize_node(&source.document, pending.list), "table of contents markup");
        let regions = splice(&mut source.document, pending.list, &source.label)?;
        source.stats.toc_entries = pending.entries;
        info!(
            document = %source.label,
            entries = pending.entries,
            regions,
            "inserted table of contents"
        );
        Ok(())
    }
}
