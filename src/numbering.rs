use tracing::{debug, info};

use crate::dom::{Document, NodeId};
use crate::error::ProcessError;
use crate::outline::{Outline, Section, SectionId};
use crate::pipeline::{Pass, PassContext, SourceDocument};
use crate::vocab::{GENERIC_INLINE_ELEMENT, NO_NUM_CLASS, NUMBERING_ROOT_CLASS, SECNO_CLASS};

#[cfg(test)]
mod tests;

/// Dotted section counters, one per outline depth.
#[derive(Debug, Default)]
pub struct SectionNumberer {
    counters: Vec<u32>,
}

impl SectionNumberer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.counters.clear();
    }

    /// Labels every numbered header of the outline and returns how many
    /// labels were inserted. Stale labels are stripped first, so running it
    /// again yields the same markup.
    pub fn number(&mut self, doc: &mut Document, outline: &Outline) -> usize {
        let mut labelled = 0;
        let mut pending: Vec<(SectionId, usize)> = outline
            .top_level()
            .iter()
            .rev()
            .map(|id| (*id, 0))
            .collect();

        while let Some((id, mut depth)) = pending.pop() {
            let section = outline.section(id);
            let header = section.header_text_element(doc);
            if let Some(header) = header {
                strip_labels(doc, header);
            }

            let excluded = is_marked(doc, section, header, NO_NUM_CLASS);
            let mut child_depth = depth + 1;
            if is_marked(doc, section, header, NUMBERING_ROOT_CLASS) {
                debug!(depth, "numbering root restarts counters");
                self.counters.clear();
                pending.clear();
                depth = 0;
                child_depth = if excluded { 0 } else { 1 };
            }

            if depth + 1 < self.counters.len() {
                self.counters.truncate(depth + 1);
            } else if depth == self.counters.len() {
                self.counters.push(0);
            }

            let counts = match header {
                Some(_) => !excluded,
                None => !section.children().is_empty(),
            };
            if counts && let Some(last) = self.counters.last_mut() {
                *last += 1;
            }

            if let Some(header) = header
                && !excluded
            {
                insert_label(doc, header, &self.label());
                labelled += 1;
            }

            pending.extend(
                section
                    .children()
                    .iter()
                    .rev()
                    .map(|child| (*child, child_depth)),
            );
        }

        labelled
    }

    fn label(&self) -> String {
        let parts: Vec<String> = self.counters.iter().map(u32::to_string).collect();
        format!("{} ", parts.join("."))
    }
}

/// A marker class counts when it sits on the section element, the header or
/// the element carrying the header text.
fn is_marked(doc: &Document, section: &Section, header_text: Option<NodeId>, class: &str) -> bool {
    doc.has_class(section.element(), class)
        || section.header().is_some_and(|header| doc.has_class(header, class))
        || header_text.is_some_and(|header| doc.has_class(header, class))
}

pub fn strip_labels(doc: &mut Document, header: NodeId) {
    for span in doc.descendant_elements_named(header, GENERIC_INLINE_ELEMENT) {
        if doc.has_class(span, SECNO_CLASS) {
            doc.remove(span);
        }
    }
}

fn insert_label(doc: &mut Document, header: NodeId, label: &str) {
    let span = doc.create_element_with(GENERIC_INLINE_ELEMENT, &[("class", SECNO_CLASS)]);
    doc.set_text(span, Some(label.to_string()));
    let leading = doc.take_text(header);
    doc.set_tail(span, leading);
    doc.insert_child(header, 0, span);
}

#[derive(Debug, Default)]
pub struct NumberingPass {
    numberer: SectionNumberer,
}

impl NumberingPass {
    pub fn new() -> Self {
        Self {
            numberer: SectionNumberer::new(),
        }
    }
}

impl Pass for NumberingPass {
    fn name(&self) -> &'static str {
        "numbering"
    }

    fn apply(
        &mut self,
        source: &mut SourceDocument,
        cx: &mut PassContext<'_>,
    ) -> Result<(), ProcessError> {
        if cx.options.per_file_numbering {
            self.numberer.reset();
        }
        let outline = cx.outlines.outline(&source.document);
        let count = self.numberer.number(&mut source.document, &outline);
        source.stats.numbered_sections = count;
        info!(document = %source.label, sections = count, "numbered sections");
        Ok(())
    }
}
