//! Arena-backed markup tree.
//!
//! Nodes live in a single `Vec` owned by the [`Document`] and refer to each
//! other by [`NodeId`]. Text follows the "text + tail" model: an element's
//! `text` precedes its first child, and its `tail` is the text between the
//! element's end and its next sibling. Parent links are plain indices used for
//! navigation only.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::vocab;

pub mod markup;
#[cfg(test)]
mod tests;

pub const DOCUMENT_ROOT: &str = "#document";

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Comment,
}

#[derive(Debug, Clone)]
pub struct Node {
    kind: NodeKind,
    name: String,
    attributes: Vec<(String, String)>,
    text: Option<String>,
    tail: Option<String>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl Node {
    fn new(kind: NodeKind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            attributes: Vec::new(),
            text: None,
            tail: None,
            children: Vec::new(),
            parent: None,
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkEvent {
    Enter(NodeId),
    Exit(NodeId),
}

#[derive(Debug)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    handle: u64,
    generation: u64,
    prolog: Vec<String>,
    doctype_public_id: Option<String>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(NodeKind::Element, DOCUMENT_ROOT)],
            root: NodeId(0),
            handle: NEXT_HANDLE.fetch_add(1, Ordering::Relaxed),
            generation: 0,
            prolog: Vec::new(),
            doctype_public_id: None,
        }
    }

    /// Identity of this tree, unique within the process.
    pub fn handle(&self) -> u64 {
        self.handle
    }

    /// Bumped whenever an attached heading or sectioning element is inserted,
    /// removed or renamed. Outlines computed at an older generation are stale.
    pub fn structure_generation(&self) -> u64 {
        self.generation
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn prolog(&self) -> &[String] {
        &self.prolog
    }

    pub fn push_prolog(&mut self, raw: String) {
        self.prolog.push(raw);
    }

    pub fn doctype_public_id(&self) -> Option<&str> {
        self.doctype_public_id.as_deref()
    }

    pub fn set_doctype_public_id(&mut self, public_id: Option<String>) {
        self.doctype_public_id = public_id;
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.nodes.push(Node::new(NodeKind::Element, name));
        NodeId(self.nodes.len() - 1)
    }

    pub fn create_element_with(&mut self, name: &str, attributes: &[(&str, &str)]) -> NodeId {
        let id = self.create_element(name);
        for (key, value) in attributes {
            self.set_attr(id, key, value);
        }
        id
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        let mut node = Node::new(NodeKind::Comment, "");
        node.text = Some(text.to_string());
        self.nodes.push(node);
        id
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.node(id).kind == NodeKind::Element
    }

    pub fn is_comment(&self, id: NodeId) -> bool {
        self.node(id).kind == NodeKind::Comment
    }

    /// Tag name of an element; empty for comments.
    pub fn name(&self, id: NodeId) -> &str {
        &self.node(id).name
    }

    pub fn rename(&mut self, id: NodeId, name: &str) {
        let structural = vocab::affects_outline(self.name(id)) || vocab::affects_outline(name);
        self.node_mut(id).name = name.to_string();
        if structural && self.is_attached(id) {
            self.generation += 1;
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.node(id)
            .attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        let attributes = &mut self.node_mut(id).attributes;
        match attributes.iter().position(|(key, _)| key == name) {
            Some(index) => attributes[index].1 = value.to_string(),
            None => attributes.push((name.to_string(), value.to_string())),
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Option<String> {
        let attributes = &mut self.node_mut(id).attributes;
        let index = attributes.iter().position(|(key, _)| key == name)?;
        Some(attributes.remove(index).1)
    }

    pub fn has_class(&self, id: NodeId, class_name: &str) -> bool {
        self.attr(id, "class")
            .is_some_and(|classes| vocab::split_on_spaces(classes).any(|class| class == class_name))
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.node(id).text.as_deref()
    }

    pub fn set_text(&mut self, id: NodeId, text: Option<String>) {
        self.node_mut(id).text = text;
    }

    pub fn take_text(&mut self, id: NodeId) -> Option<String> {
        self.node_mut(id).text.take()
    }

    pub fn tail(&self, id: NodeId) -> Option<&str> {
        self.node(id).tail.as_deref()
    }

    pub fn set_tail(&mut self, id: NodeId, tail: Option<String>) {
        self.node_mut(id).tail = tail;
    }

    pub fn take_tail(&mut self, id: NodeId) -> Option<String> {
        self.node_mut(id).tail.take()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        index
            .checked_sub(1)
            .map(|previous| self.children(parent)[previous])
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        self.children(parent).get(index + 1).copied()
    }

    fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|child| *child == id)
    }

    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |node| self.parent(*node))
    }

    /// Whether the node is reachable from the document root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.root || self.ancestors(id).any(|ancestor| ancestor == self.root)
    }

    /// Every node below `id` in document order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        self.walk(id)
            .filter_map(|event| match event {
                WalkEvent::Enter(node) if node != id => Some(node),
                _ => None,
            })
            .collect()
    }

    pub fn descendant_elements_named(&self, id: NodeId, name: &str) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|node| self.is_element(*node) && self.name(*node) == name)
            .collect()
    }

    /// Enter/exit events for `id` and its subtree in document order.
    pub fn walk(&self, id: NodeId) -> Walk<'_> {
        Walk {
            doc: self,
            stack: Vec::new(),
            start: Some(id),
        }
    }

    /// Concatenated text of the subtree, excluding comment bodies and the
    /// node's own tail.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out, &|_, _| false);
        out
    }

    /// Like [`Document::text_content`], but elements matching `skip` contribute
    /// only their tail.
    pub fn text_content_skipping(&self, id: NodeId, skip: &dyn Fn(&Document, NodeId) -> bool) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out, skip);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String, skip: &dyn Fn(&Document, NodeId) -> bool) {
        if self.is_comment(id) {
            return;
        }
        if let Some(text) = self.text(id) {
            out.push_str(text);
        }
        for child in self.children(id) {
            if self.is_element(*child) && !skip(self, *child) {
                self.collect_text(*child, out, skip);
            }
            if let Some(tail) = self.tail(*child) {
                out.push_str(tail);
            }
        }
    }

    fn touches_outline(&self, id: NodeId) -> bool {
        self.walk(id).any(|event| match event {
            WalkEvent::Enter(node) => self.is_element(node) && vocab::affects_outline(self.name(node)),
            WalkEvent::Exit(_) => false,
        })
    }

    fn note_structural_change(&mut self, parent: NodeId, child: NodeId) {
        if self.is_attached(parent) && self.touches_outline(child) {
            self.generation += 1;
        }
    }

    /// Unlinks the node (with its subtree and tail) from its parent.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        self.note_structural_change(parent, id);
        self.node_mut(parent).children.retain(|child| *child != id);
        self.node_mut(id).parent = None;
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.node_mut(parent).children.push(child);
        self.node_mut(child).parent = Some(parent);
        self.note_structural_change(parent, child);
    }

    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        let children = &mut self.node_mut(parent).children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.node_mut(child).parent = Some(parent);
        self.note_structural_change(parent, child);
    }

    /// Places `new` immediately before `reference` under the same parent.
    pub fn insert_before(&mut self, reference: NodeId, new: NodeId) {
        let Some(parent) = self.parent(reference) else {
            return;
        };
        self.detach(new);
        let index = self.index_in_parent(reference).unwrap_or(0);
        self.insert_child(parent, index, new);
    }

    pub fn insert_after(&mut self, reference: NodeId, new: NodeId) {
        let Some(parent) = self.parent(reference) else {
            return;
        };
        self.detach(new);
        let index = self.index_in_parent(reference).map_or(0, |index| index + 1);
        self.insert_child(parent, index, new);
    }

    /// Appends text to whatever precedes the end of `parent`'s content: the
    /// last child's tail, or the parent's own text.
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        match self.children(parent).last().copied() {
            Some(last) => push_optional(&mut self.node_mut(last).tail, text),
            None => push_optional(&mut self.node_mut(parent).text, text),
        }
    }

    /// Appends text to the stream immediately before `id`.
    fn append_text_before(&mut self, id: NodeId, text: &str) {
        if let Some(previous) = self.previous_sibling(id) {
            push_optional(&mut self.node_mut(previous).tail, text);
        } else if let Some(parent) = self.parent(id) {
            push_optional(&mut self.node_mut(parent).text, text);
        }
    }

    /// Removes an element but keeps its content in place: leading text,
    /// children and tail move into the parent at the element's position.
    pub fn unwrap_element(&mut self, id: NodeId) {
        if self.parent(id).is_none() {
            return;
        }
        if let Some(text) = self.take_text(id) {
            self.append_text_before(id, &text);
        }
        for child in self.children(id).to_vec() {
            self.insert_before(id, child);
        }
        self.remove(id);
    }

    /// Removes an element together with its text and children. Its tail is
    /// merged into the surrounding text so following content is not lost.
    pub fn remove(&mut self, id: NodeId) {
        if self.parent(id).is_none() {
            return;
        }
        if let Some(tail) = self.take_tail(id) {
            self.append_text_before(id, &tail);
        }
        self.detach(id);
    }

    /// Copies the subtree rooted at `id` (tail included) into new detached
    /// nodes of the same document.
    pub fn deep_copy(&mut self, id: NodeId) -> NodeId {
        let source = self.node(id).clone();
        let copy = NodeId(self.nodes.len());
        self.nodes.push(Node {
            children: Vec::new(),
            parent: None,
            ..source.clone()
        });
        for child in source.children {
            let child_copy = self.deep_copy(child);
            self.node_mut(copy).children.push(child_copy);
            self.node_mut(child_copy).parent = Some(copy);
        }
        copy
    }
}

fn push_optional(slot: &mut Option<String>, text: &str) {
    match slot {
        Some(existing) => existing.push_str(text),
        None => *slot = Some(text.to_string()),
    }
}

pub struct Walk<'a> {
    doc: &'a Document,
    stack: Vec<(NodeId, usize)>,
    start: Option<NodeId>,
}

impl Iterator for Walk<'_> {
    type Item = WalkEvent;

    fn next(&mut self) -> Option<WalkEvent> {
        if let Some(start) = self.start.take() {
            self.stack.push((start, 0));
            return Some(WalkEvent::Enter(start));
        }
        let (node, next_child) = self.stack.last_mut()?;
        let node = *node;
        match self.doc.children(node).get(*next_child).copied() {
            Some(child) => {
                *next_child += 1;
                self.stack.push((child, 0));
                Some(WalkEvent::Enter(child))
            }
            None => {
                self.stack.pop();
                Some(WalkEvent::Exit(node))
            }
        }
    }
}
