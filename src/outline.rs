//! Implicit document outline derived from heading and sectioning elements.

use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use tracing::debug;

use crate::dom::{Document, NodeId, WalkEvent};
use crate::vocab;


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    element: NodeId,
    header: Option<NodeId>,
    children: Vec<SectionId>,
    parent: Option<SectionId>,
    /// Outlinee whose outline the section currently belongs to.
    owner: NodeId,
}

impl Section {
    /// The element the section was created for: an outlinee, or the heading
    /// that opened an implied section.
    pub fn element(&self) -> NodeId {
        self.element
    }

    pub fn header(&self) -> Option<NodeId> {
        self.header
    }

    pub fn children(&self) -> &[SectionId] {
        &self.children
    }

    /// The element carrying the header's text. For a heading group this is
    /// its highest-ranked heading.
    pub fn header_text_element(&self, doc: &Document) -> Option<NodeId> {
        let header = self.header?;
        if !vocab::is_heading_group(doc.name(header)) {
            return Some(header);
        }
        let descendants = doc.descendants(header);
        (1..=6u8).find_map(|level| {
            descendants
                .iter()
                .copied()
                .find(|node| vocab::heading_level(doc.name(*node)) == Some(level))
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outline {
    sections: Vec<Section>,
    top_level: Vec<SectionId>,
}

impl Outline {
    /// Walks the document once and returns its outline. A document without
    /// any sectioning element has an empty outline.
    pub fn build(doc: &Document) -> Self {
        let mut builder = OutlineBuilder::new(doc);
        for event in doc.walk(doc.root()) {
            if builder.step(event) {
                break;
            }
        }
        builder.finish()
    }

    pub fn top_level(&self) -> &[SectionId] {
        &self.top_level
    }

    pub fn section(&self, id: SectionId) -> &Section {
        &self.sections[id.0]
    }

    /// Sections in pre-order with their depth (top level is 0).
    pub fn depth_first(&self) -> Vec<(SectionId, usize)> {
        let mut out = Vec::with_capacity(self.sections.len());
        let mut pending: Vec<(SectionId, usize)> =
            self.top_level.iter().rev().map(|id| (*id, 0)).collect();
        while let Some((id, depth)) = pending.pop() {
            out.push((id, depth));
            pending.extend(
                self.section(id)
                    .children
                    .iter()
                    .rev()
                    .map(|child| (*child, depth + 1)),
            );
        }
        out
    }

    /// Sections level by level with their depth.
    pub fn breadth_first(&self) -> Vec<(SectionId, usize)> {
        let mut out = Vec::with_capacity(self.sections.len());
        let mut pending: VecDeque<(SectionId, usize)> =
            self.top_level.iter().map(|id| (*id, 0)).collect();
        while let Some((id, depth)) = pending.pop_front() {
            out.push((id, depth));
            pending.extend(
                self.section(id)
                    .children
                    .iter()
                    .map(|child| (*child, depth + 1)),
            );
        }
        out
    }
}

/// Rank of a heading-content element as a heading level: 1 is the coarsest.
/// A heading group ranks as its highest-ranked heading, or as `h1` when it
/// has none.
pub fn rank(doc: &Document, header: NodeId) -> u8 {
    let name = doc.name(header);
    if let Some(level) = vocab::heading_level(name) {
        return level;
    }
    doc.descendants(header)
        .into_iter()
        .filter_map(|node| vocab::heading_level(doc.name(node)))
        .min()
        .unwrap_or(1)
}

struct OutlineBuilder<'a> {
    doc: &'a Document,
    sections: Vec<Section>,
    outlines: HashMap<NodeId, Vec<SectionId>>,
    stack: Vec<NodeId>,
    current_outlinee: Option<NodeId>,
    current_section: Option<SectionId>,
}

impl<'a> OutlineBuilder<'a> {
    fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            sections: Vec::new(),
            outlines: HashMap::new(),
            stack: Vec::new(),
            current_outlinee: None,
            current_section: None,
        }
    }

    /// Handles one walk event; returns true once the outermost outlinee has
    /// been exited.
    fn step(&mut self, event: WalkEvent) -> bool {
        let doc = self.doc;
        let (node, entering) = match event {
            WalkEvent::Enter(node) => (node, true),
            WalkEvent::Exit(node) => (node, false),
        };
        if !doc.is_element(node) {
            return false;
        }
        let name = doc.name(node);

        if !entering && self.stack.last() == Some(&node) {
            self.stack.pop();
        } else if self
            .stack
            .last()
            .is_some_and(|top| vocab::is_heading_content(doc.name(*top)))
        {
            // inside a heading
        } else if entering && vocab::is_outlinee(name) {
            self.enter_outlinee(node);
        } else if !entering && vocab::is_sectioning_content(name) && !self.stack.is_empty() {
            self.exit_sectioning_content(node);
        } else if !entering && vocab::is_sectioning_root(name) && !self.stack.is_empty() {
            self.exit_sectioning_root(node);
        } else if !entering && vocab::is_outlinee(name) {
            return true;
        } else if self.current_outlinee.is_none() {
            // nothing to attach headings to yet
        } else if entering && vocab::is_heading_content(name) {
            self.enter_heading(node);
        }
        false
    }

    fn new_section(
        &mut self,
        element: NodeId,
        header: Option<NodeId>,
        owner: NodeId,
    ) -> SectionId {
        self.sections.push(Section {
            element,
            header,
            children: Vec::new(),
            parent: None,
            owner,
        });
        SectionId(self.sections.len() - 1)
    }

    fn adopt(&mut self, parent: SectionId, child: SectionId) {
        self.sections[parent.0].children.push(child);
        self.sections[child.0].parent = Some(parent);
    }

    fn last_section(&self, outlinee: NodeId) -> Option<SectionId> {
        self.outlines
            .get(&outlinee)
            .and_then(|sections| sections.last().copied())
    }

    fn header_rank(&self, section: SectionId) -> u8 {
        self.sections[section.0]
            .header
            .map_or(1, |header| rank(self.doc, header))
    }

    /// Hands the sections `from` owns in this subtree over to `to`. Sections
    /// of nested sectioning roots keep their owner.
    fn reassign_owner(&mut self, section: SectionId, from: NodeId, to: NodeId) {
        if self.sections[section.0].owner != from {
            return;
        }
        self.sections[section.0].owner = to;
        for child in self.sections[section.0].children.clone() {
            self.reassign_owner(child, from, to);
        }
    }

    fn subtree_has_header(&self, section: SectionId) -> bool {
        let section = &self.sections[section.0];
        section.header.is_some()
            || section
                .children
                .iter()
                .any(|child| self.subtree_has_header(*child))
    }

    fn enter_outlinee(&mut self, node: NodeId) {
        if let Some(current) = self.current_outlinee {
            self.stack.push(current);
        }
        self.current_outlinee = Some(node);
        let section = self.new_section(node, None, node);
        self.current_section = Some(section);
        self.outlines.insert(node, vec![section]);
    }

    /// Sectioning content flattens: its outline joins the parent's last
    /// section.
    fn exit_sectioning_content(&mut self, node: NodeId) {
        let Some(parent) = self.stack.pop() else {
            return;
        };
        self.current_outlinee = Some(parent);
        let Some(current) = self.last_section(parent) else {
            return;
        };
        for section in self.outlines.remove(&node).unwrap_or_default() {
            self.reassign_owner(section, node, parent);
            self.adopt(current, section);
        }
        self.current_section = Some(current);
    }

    /// Sectioning roots nest: the current section moves to the parent
    /// outline's own deepest last section, and any headed sub-outline hangs
    /// below it. Sub-outlines attached by earlier roots are never descended
    /// into.
    fn exit_sectioning_root(&mut self, node: NodeId) {
        let Some(parent) = self.stack.pop() else {
            return;
        };
        self.current_outlinee = Some(parent);
        let Some(mut current) = self.last_section(parent) else {
            return;
        };
        while let Some(&last) = self.sections[current.0].children.last()
            && self.sections[last.0].owner == parent
        {
            current = last;
        }
        let nested = self.outlines.remove(&node).unwrap_or_default();
        if nested.iter().any(|section| self.subtree_has_header(*section)) {
            for section in nested {
                self.adopt(current, section);
            }
        }
        self.current_section = Some(current);
    }

    fn enter_heading(&mut self, node: NodeId) {
        let (Some(current), Some(outlinee)) = (self.current_section, self.current_outlinee) else {
            return;
        };

        if self.sections[current.0].header.is_none() {
            self.sections[current.0].header = Some(node);
        } else {
            let level = rank(self.doc, node);
            let last_top = self.last_section(outlinee);
            if last_top.is_none_or(|last| level <= self.header_rank(last)) {
                let section = self.new_section(node, Some(node), outlinee);
                self.outlines.entry(outlinee).or_default().push(section);
                self.current_section = Some(section);
            } else {
                let mut candidate = Some(current);
                loop {
                    match candidate {
                        Some(parent) if level > self.header_rank(parent) => {
                            let section = self.new_section(node, Some(node), outlinee);
                            self.adopt(parent, section);
                            self.current_section = Some(section);
                            break;
                        }
                        Some(parent) => candidate = self.sections[parent.0].parent,
                        None => {
                            let section = self.new_section(node, Some(node), outlinee);
                            self.outlines.entry(outlinee).or_default().push(section);
                            self.current_section = Some(section);
                            break;
                        }
                    }
                }
            }
        }
        self.stack.push(node);
    }

    fn finish(mut self) -> Outline {
        let top_level = self
            .current_outlinee
            .and_then(|outlinee| self.outlines.remove(&outlinee))
            .unwrap_or_default();
        Outline {
            sections: self.sections,
            top_level,
        }
    }
}

/// Outlines keyed by document handle, valid for one structure generation.
#[derive(Debug, Default)]
pub struct OutlineCache {
    entries: HashMap<u64, (u64, Rc<Outline>)>,
}

impl OutlineCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outline(&mut self, doc: &Document) -> Rc<Outline> {
        let generation = doc.structure_generation();
        if let Some((cached_generation, outline)) = self.entries.get(&doc.handle())
            && *cached_generation == generation
        {
            return Rc::clone(outline);
        }

        let outline = Rc::new(Outline::build(doc));
        debug!(
            handle = doc.handle(),
            generation,
            sections = outline.depth_first().len(),
            "built outline"
        );
        self.entries
            .insert(doc.handle(), (generation, Rc::clone(&outline)));
        outline
    }
}
