//! In-memory document implementing [`DomPort`].
//!
//! Markup written with `set_inner_html` is parsed into real element and text
//! nodes, so everything it inserts can be queried and mutated afterwards.
//! Nodes live in an arena addressed by [`NodeId`]. Removing a node or
//! replacing its content releases the slots of the discarded subtree for
//! reuse, so an id must not be used after its node has been removed.

use std::collections::HashSet;
use std::fmt::Write as _;

use tracing::debug;

use crate::dom::{ClassOp, DomPort, ElementSpec, EventTarget, FiredEvent, Listener, NodeId};
use crate::fragment::{self, Fragment};
use crate::selector::{Selector, SelectorTree};

/// Tag name reported for text nodes.
const TEXT_TAG: &str = "#text";

#[derive(Debug, Clone)]
enum NodeData {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
    /// A released slot waiting on the free list.
    Vacant,
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl Node {
    fn element(tag: &str) -> Self {
        Self::with_data(NodeData::Element {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
        })
    }

    fn text(text: &str) -> Self {
        Self::with_data(NodeData::Text(text.to_string()))
    }

    fn with_data(data: NodeData) -> Self {
        Self {
            data,
            children: Vec::new(),
            parent: None,
        }
    }

    fn tag(&self) -> &str {
        match &self.data {
            NodeData::Element { tag, .. } => tag,
            NodeData::Text(_) => TEXT_TAG,
            NodeData::Vacant => "",
        }
    }

    fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element { .. })
    }
}

/// A history entry recorded by `push_history`.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub state: serde_json::Value,
    pub path: String,
}

pub struct MemoryDom {
    nodes: Vec<Node>,
    free: Vec<NodeId>,
    html: NodeId,
    head: NodeId,
    body: NodeId,
    location: String,
    history: Vec<HistoryEntry>,
    listeners: Vec<(EventTarget, String, Listener)>,
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDom {
    /// An empty `<html><head></head><body></body></html>` document at `/`.
    pub fn new() -> Self {
        let mut dom = Self {
            nodes: vec![Node::element("html"), Node::element("head"), Node::element("body")],
            free: Vec::new(),
            html: NodeId(0),
            head: NodeId(1),
            body: NodeId(2),
            location: "/".to_string(),
            history: Vec::new(),
            listeners: Vec::new(),
        };
        dom.append_child(dom.html, dom.head);
        dom.append_child(dom.html, dom.body);
        dom
    }

    pub fn with_location(mut self, path: impl Into<String>) -> Self {
        self.location = path.into();
        self
    }

    /// Create `spec` and append it under `parent`.
    pub fn append_element(&mut self, parent: NodeId, spec: &ElementSpec) -> NodeId {
        let node = self.create_element(spec);
        self.append_child(parent, node);
        node
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Tag name of an element, or `#text` for a text node.
    pub fn tag(&self, node: NodeId) -> &str {
        self.nodes[node.0].tag()
    }

    /// Child nodes, text nodes included.
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    /// Number of live nodes in the arena, detached ones included.
    pub fn allocated_nodes(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// Number of listeners bound anywhere in the document.
    pub fn bound_listeners(&self) -> usize {
        self.listeners.len()
    }

    /// Whether `node` is reachable from the document element.
    pub fn is_connected(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == self.html {
                return true;
            }
            current = self.nodes[n.0].parent;
        }
        false
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attribute_value(node, "class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    /// Number of listeners currently bound for `event` on `target`.
    pub fn listener_count(&self, target: EventTarget, event: &str) -> usize {
        self.listeners
            .iter()
            .filter(|(t, e, _)| *t == target && e == event)
            .count()
    }

    /// Fire `event` at `target`, invoking every bound listener. Returns how
    /// many listeners ran.
    pub fn fire(&self, target: EventTarget, event: &str) -> usize {
        let fired = FiredEvent {
            name: event.to_string(),
            target,
        };
        let matching: Vec<Listener> = self
            .listeners
            .iter()
            .filter(|(t, e, _)| *t == target && e == event)
            .map(|(_, _, l)| l.clone())
            .collect();
        for listener in &matching {
            listener(&fired);
        }
        matching.len()
    }

    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_inner(node, &mut out);
        out
    }

    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_outer(node, false, &mut out);
        out
    }

    /// Serialize the whole document.
    pub fn to_html(&self) -> String {
        format!("<!DOCTYPE html>{}", self.outer_html(self.html))
    }

    fn write_outer(&self, node: NodeId, raw: bool, out: &mut String) {
        let n = &self.nodes[node.0];
        let (tag, attributes) = match &n.data {
            NodeData::Text(text) if raw => return out.push_str(text),
            NodeData::Text(text) => return out.push_str(&escape_text(text)),
            NodeData::Vacant => return,
            NodeData::Element { tag, attributes } => (tag, attributes),
        };
        out.push('<');
        out.push_str(tag);
        for (name, value) in attributes {
            if value.is_empty() {
                let _ = write!(out, " {}", name);
            } else {
                let _ = write!(out, " {}=\"{}\"", name, escape_attribute(value));
            }
        }
        out.push('>');
        if fragment::is_void(tag) {
            return;
        }
        self.write_inner(node, out);
        let _ = write!(out, "</{}>", tag);
    }

    fn write_inner(&self, node: NodeId, out: &mut String) {
        let n = &self.nodes[node.0];
        let raw = fragment::is_raw_text(n.tag());
        for &child in &n.children {
            self.write_outer(child, raw, out);
        }
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        let n = &self.nodes[node.0];
        if let NodeData::Text(text) = &n.data {
            out.push_str(text);
        }
        for &child in &n.children {
            self.collect_text(child, out);
        }
    }

    /// Pre-order walk of the elements under `root`, excluding `root`.
    fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[root.0].children.iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            let n = &self.nodes[node.0];
            if !n.is_element() {
                continue;
            }
            out.push(node);
            stack.extend(n.children.iter().rev().copied());
        }
        out
    }

    fn parse_selector(selector: &str) -> Option<Selector> {
        match Selector::parse(selector) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!(error = %e, "ignoring unparseable selector");
                None
            }
        }
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id.0] = node;
                id
            }
            None => {
                self.nodes.push(node);
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    fn build(&mut self, parent: NodeId, fragments: Vec<Fragment>) {
        for fragment in fragments {
            match fragment {
                Fragment::Text(text) => {
                    let node = self.alloc(Node::text(&text));
                    self.append_child(parent, node);
                }
                Fragment::Element {
                    tag,
                    attributes,
                    children,
                } => {
                    let node = self.alloc(Node::with_data(NodeData::Element { tag, attributes }));
                    self.append_child(parent, node);
                    self.build(node, children);
                }
            }
        }
    }

    fn clear_content(&mut self, node: NodeId) {
        let children = std::mem::take(&mut self.nodes[node.0].children);
        for child in children {
            self.nodes[child.0].parent = None;
            self.discard(child);
        }
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != node);
        }
    }

    /// Release a detached subtree: its slots return to the free list and
    /// listeners bound to its elements are dropped. The document's own
    /// `html`/`head`/`body` nodes are only ever unlinked.
    fn discard(&mut self, root: NodeId) {
        let mut released = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            let structural = [self.html, self.head, self.body].contains(&node);
            if structural || matches!(self.nodes[node.0].data, NodeData::Vacant) {
                continue;
            }
            let vacant = Node::with_data(NodeData::Vacant);
            let old = std::mem::replace(&mut self.nodes[node.0], vacant);
            stack.extend(old.children);
            released.push(node);
        }
        if released.is_empty() {
            return;
        }
        let gone: HashSet<NodeId> = released.iter().copied().collect();
        self.listeners.retain(|(target, _, _)| match target {
            EventTarget::Element(node) => !gone.contains(node),
            EventTarget::Document => true,
        });
        self.free.extend(released);
    }

    fn attributes_mut(&mut self, node: NodeId) -> Option<&mut Vec<(String, String)>> {
        match &mut self.nodes[node.0].data {
            NodeData::Element { attributes, .. } => Some(attributes),
            NodeData::Text(_) | NodeData::Vacant => None,
        }
    }
}

impl SelectorTree for MemoryDom {
    fn tag_name(&self, node: NodeId) -> &str {
        self.nodes[node.0].tag()
    }

    fn attribute_value(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[node.0].data {
            NodeData::Element { attributes, .. } => attributes
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str()),
            NodeData::Text(_) | NodeData::Vacant => None,
        }
    }

    fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }
}

impl DomPort for MemoryDom {
    fn query(&self, selector: &str) -> Option<NodeId> {
        let parsed = Self::parse_selector(selector)?;
        self.descendants(self.html)
            .into_iter()
            .find(|&n| parsed.matches(self, n))
    }

    fn query_all(&self, selector: &str) -> Vec<NodeId> {
        let Some(parsed) = Self::parse_selector(selector) else {
            return Vec::new();
        };
        self.descendants(self.html)
            .into_iter()
            .filter(|&n| parsed.matches(self, n))
            .collect()
    }

    fn query_within(&self, scope: NodeId, selector: &str) -> Vec<NodeId> {
        let Some(parsed) = Self::parse_selector(selector) else {
            return Vec::new();
        };
        self.descendants(scope)
            .into_iter()
            .filter(|&n| parsed.matches(self, n))
            .collect()
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.html)
            .into_iter()
            .find(|&n| self.attribute_value(n, "id") == Some(id))
    }

    fn head(&self) -> NodeId {
        self.head
    }

    fn body(&self) -> NodeId {
        self.body
    }

    fn document_element(&self) -> NodeId {
        self.html
    }

    fn create_element(&mut self, spec: &ElementSpec) -> NodeId {
        let mut node = Node::element(&spec.tag);
        if let NodeData::Element { attributes, .. } = &mut node.data {
            for (name, value) in &spec.attributes {
                set_attr(attributes, name, value);
            }
        }
        let id = self.alloc(node);
        if let Some(text) = spec.text.as_deref().filter(|t| !t.is_empty()) {
            let child = self.alloc(Node::text(text));
            self.append_child(id, child);
        }
        id
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if !self.nodes[parent.0].is_element() {
            debug!(parent = parent.0, "ignoring append to a text node");
            return;
        }
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    fn remove(&mut self, node: NodeId) {
        self.detach(node);
        self.discard(node);
    }

    fn set_inner_html(&mut self, node: NodeId, html: &str) {
        if fragment::is_raw_text(self.nodes[node.0].tag()) {
            return self.set_text_content(node, html);
        }
        self.clear_content(node);
        self.build(node, fragment::parse(html));
    }

    fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn set_text_content(&mut self, node: NodeId, text: &str) {
        match &mut self.nodes[node.0].data {
            NodeData::Text(existing) => {
                *existing = text.to_string();
                return;
            }
            NodeData::Vacant => return,
            NodeData::Element { .. } => {}
        }
        self.clear_content(node);
        if !text.is_empty() {
            let child = self.alloc(Node::text(text));
            self.append_child(node, child);
        }
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.attribute_value(node, name).map(str::to_string)
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(attributes) = self.attributes_mut(node) {
            set_attr(attributes, name, value);
        }
    }

    fn update_class(&mut self, node: NodeId, op: ClassOp, class: &str) {
        if class.is_empty() || class.contains(char::is_whitespace) {
            debug!(class, "ignoring invalid class token");
            return;
        }
        let mut classes: Vec<String> = self
            .attribute_value(node, "class")
            .unwrap_or("")
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let present = classes.iter().any(|c| c == class);
        match (op, present) {
            (ClassOp::Add, false) | (ClassOp::Toggle, false) => classes.push(class.to_string()),
            (ClassOp::Remove, true) | (ClassOp::Toggle, true) => classes.retain(|c| c != class),
            _ => return,
        }
        let joined = classes.join(" ");
        self.set_attribute(node, "class", &joined);
    }

    fn add_event_listener(&mut self, target: EventTarget, event: &str, listener: Listener) {
        let duplicate = self
            .listeners
            .iter()
            .any(|(t, e, l)| *t == target && e == event && std::sync::Arc::ptr_eq(l, &listener));
        if !duplicate {
            self.listeners.push((target, event.to_string(), listener));
        }
    }

    fn remove_event_listener(&mut self, target: EventTarget, event: &str, listener: &Listener) {
        self.listeners
            .retain(|(t, e, l)| !(*t == target && e == event && std::sync::Arc::ptr_eq(l, listener)));
    }

    fn has_event_listener(&self, target: EventTarget, event: &str, listener: &Listener) -> bool {
        self.listeners
            .iter()
            .any(|(t, e, l)| *t == target && e == event && std::sync::Arc::ptr_eq(l, listener))
    }

    fn push_history(&mut self, state: serde_json::Value, path: &str) {
        self.location = path.to_string();
        self.history.push(HistoryEntry {
            state,
            path: path.to_string(),
        });
    }

    fn location_path(&self) -> String {
        self.location.clone()
    }
}

fn set_attr(attributes: &mut Vec<(String, String)>, name: &str, value: &str) {
    let name = name.to_ascii_lowercase();
    match attributes.iter_mut().find(|(n, _)| *n == name) {
        Some((_, existing)) => *existing = value.to_string(),
        None => attributes.push((name, value.to_string())),
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
