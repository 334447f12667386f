//! DOM-mutation port.
//!
//! The dispatcher never touches a document directly. Every query and mutation
//! goes through a [`DomPort`], so the same dispatch logic can drive a browser
//! binding or the in-memory [`MemoryDom`](crate::memory_dom::MemoryDom).

use std::fmt;
use std::sync::Arc;

/// Opaque handle to an element owned by a [`DomPort`] implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Class-list operation applied by `AddClasses` / `RemoveClasses` / `ToggleClasses`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassOp {
    Add,
    Remove,
    Toggle,
}

/// Where an event listener is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTarget {
    Document,
    Element(NodeId),
}

/// Event delivered to a listener when it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredEvent {
    pub name: String,
    pub target: EventTarget,
}

/// A bound event listener. Identity (pointer equality) is what removal matches on.
pub type Listener = Arc<dyn Fn(&FiredEvent) + Send + Sync>;

/// Description of an element to create.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementSpec {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
}

impl ElementSpec {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

impl fmt::Display for ElementSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.tag)?;
        for (name, value) in &self.attributes {
            write!(f, " {}=\"{}\"", name, value)?;
        }
        write!(f, ">")
    }
}

/// The capability set the dispatcher needs from a document.
///
/// Selector arguments use CSS selector syntax. Implementations return `None`
/// or an empty list for selectors they cannot parse; they never panic.
pub trait DomPort {
    /// First element matching `selector` in document order.
    fn query(&self, selector: &str) -> Option<NodeId>;

    /// Every element matching `selector`, in document order.
    fn query_all(&self, selector: &str) -> Vec<NodeId>;

    /// Descendants of `scope` matching `selector`.
    fn query_within(&self, scope: NodeId, selector: &str) -> Vec<NodeId>;

    fn element_by_id(&self, id: &str) -> Option<NodeId>;

    fn head(&self) -> NodeId;

    fn body(&self) -> NodeId;

    /// The `<html>` element.
    fn document_element(&self) -> NodeId;

    /// Create a detached element.
    fn create_element(&mut self, spec: &ElementSpec) -> NodeId;

    fn append_child(&mut self, parent: NodeId, child: NodeId);

    /// Detach `node` (and its subtree) from the document. Listeners bound to
    /// elements in the subtree are dropped with it.
    fn remove(&mut self, node: NodeId);

    /// Replace the content of `node` with the elements parsed from `html`.
    fn set_inner_html(&mut self, node: NodeId, html: &str);

    fn text_content(&self, node: NodeId) -> String;

    fn set_text_content(&mut self, node: NodeId, text: &str);

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str);

    fn update_class(&mut self, node: NodeId, op: ClassOp, class: &str);

    fn add_event_listener(&mut self, target: EventTarget, event: &str, listener: Listener);

    fn remove_event_listener(&mut self, target: EventTarget, event: &str, listener: &Listener);

    /// Whether `listener` is still bound for `event` on `target`. Listeners of
    /// removed elements are no longer bound.
    fn has_event_listener(&self, target: EventTarget, event: &str, listener: &Listener) -> bool;

    /// Push a history entry without reloading.
    fn push_history(&mut self, state: serde_json::Value, path: &str);

    /// Current location path (e.g. `/app/settings`).
    fn location_path(&self) -> String;
}

/// Progressive-enhancement collaborator: binds declarative attribute-driven
/// behavior to freshly inserted markup.
pub trait Enhancer {
    fn process(&mut self, node: NodeId);
}

/// Enhancer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEnhancement;

impl Enhancer for NoEnhancement {
    fn process(&mut self, _node: NodeId) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_spec_builder() {
        let spec = ElementSpec::new("script")
            .attr("src", "/app.js")
            .attr("defer", "")
            .text("");
        assert_eq!(spec.tag, "script");
        assert_eq!(spec.attributes.len(), 2);
        assert_eq!(spec.text.as_deref(), Some(""));
        assert_eq!(spec.to_string(), "<script src=\"/app.js\" defer=\"\">");
    }
}
