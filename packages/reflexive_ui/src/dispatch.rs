//! Event-to-DOM-mutation dispatcher.
//!
//! One [`Dispatcher`] owns the DOM port, the theme registry and the listener
//! table. Events are applied one at a time, in the order they are handed in.
//! A failing event is logged and dropped; it never affects the next one.

use serde_json::json;
use tracing::{debug, info, warn};

use crate::actions::{self, ActionRegistry, ListenerRegistry};
use crate::dom::{DomPort, ElementSpec, Enhancer, EventTarget, NoEnhancement, NodeId};
use crate::error::DispatchError;
use crate::protocol::{
    ActionBinding, Channel, Command, CssCommand, HtmlCommand, JsCommand, Navigation, Route, Scope,
};
use crate::theme::{ThemeRegistry, ThemeVars};

/// Id of the style element holding rendered themes.
pub const THEME_STYLE_ID: &str = "dynamic-themes";
/// Id of the container replaced by `navigation` events.
pub const MAIN_CONTAINER_ID: &str = "reflexive-ui-main";
/// Marker class of keyed dynamic style blocks.
pub const DYNAMIC_CSS_CLASS: &str = "dynamic-css-block";
/// Marker class of injected script blocks.
pub const DYNAMIC_JS_CLASS: &str = "dynamic-js-block";

/// What happened to one inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The command was decoded and applied (possibly as a no-op because its
    /// target was missing).
    Applied,
    /// Unknown channel or discriminant.
    Ignored,
    /// Decoding or applying failed; the error was logged.
    Failed,
}

pub struct Dispatcher<D, E = NoEnhancement> {
    dom: D,
    enhancer: E,
    actions: ActionRegistry,
    listeners: ListenerRegistry,
    themes: Option<ThemeRegistry>,
    root_path: String,
}

impl<D: DomPort> Dispatcher<D, NoEnhancement> {
    pub fn new(dom: D) -> Self {
        Self::with_enhancer(dom, NoEnhancement)
    }
}

impl<D: DomPort, E: Enhancer> Dispatcher<D, E> {
    /// Build a dispatcher. The navigation root is the current location path
    /// with one trailing slash removed.
    pub fn with_enhancer(dom: D, enhancer: E) -> Self {
        let location = dom.location_path();
        let root_path = location.strip_suffix('/').unwrap_or(&location).to_string();
        Self {
            dom,
            enhancer,
            actions: ActionRegistry::new(),
            listeners: ListenerRegistry::default(),
            themes: None,
            root_path,
        }
    }

    pub fn with_actions(mut self, actions: ActionRegistry) -> Self {
        self.actions = actions;
        self
    }

    pub fn actions_mut(&mut self) -> &mut ActionRegistry {
        &mut self.actions
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    pub fn dom_mut(&mut self) -> &mut D {
        &mut self.dom
    }

    pub fn into_dom(self) -> D {
        self.dom
    }

    pub fn enhancer(&self) -> &E {
        &self.enhancer
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    pub fn themes(&self) -> Option<&ThemeRegistry> {
        self.themes.as_ref()
    }

    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    /// Dispatch one event, logging instead of returning failures.
    pub fn handle_event(&mut self, event: &str, data: &str) -> DispatchOutcome {
        match self.dispatch(event, data) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(event, error = %e, "dropping event");
                DispatchOutcome::Failed
            }
        }
    }

    /// Decode and apply one event.
    pub fn dispatch(&mut self, event: &str, data: &str) -> Result<DispatchOutcome, DispatchError> {
        let Some(channel) = Channel::from_event_name(event) else {
            debug!(event, "ignoring event on unknown channel");
            return Ok(DispatchOutcome::Ignored);
        };
        match Command::decode(channel, data)? {
            Some(command) => {
                self.apply(command)?;
                Ok(DispatchOutcome::Applied)
            }
            None => {
                debug!(%channel, "ignoring unrecognized payload");
                Ok(DispatchOutcome::Ignored)
            }
        }
    }

    pub fn apply(&mut self, command: Command) -> Result<(), DispatchError> {
        match command {
            Command::Html(cmd) => self.apply_html(cmd),
            Command::Css(cmd) => {
                self.apply_css(cmd);
                Ok(())
            }
            Command::Js(cmd) => self.apply_js(cmd),
            Command::Navigate(nav) => {
                self.navigate(nav);
                Ok(())
            }
        }
    }

    // =========================================================================
    // HTML
    // =========================================================================

    fn apply_html(&mut self, cmd: HtmlCommand) -> Result<(), DispatchError> {
        match cmd {
            HtmlCommand::Partial { target, html } => {
                let Some(node) = self.dom.query(&target) else {
                    debug!(%target, "partial target not found");
                    return Ok(());
                };
                self.replace_content(node, &html);
            }
            HtmlCommand::AddScriptSrcToHeader { src, defer } => {
                let mut spec = ElementSpec::new("script").attr("src", src);
                if defer {
                    spec = spec.attr("defer", "");
                }
                let head = self.dom.head();
                let node = self.dom.create_element(&spec);
                self.dom.append_child(head, node);
            }
            HtmlCommand::AddLinkToHeader { href } => {
                let spec = ElementSpec::new("link")
                    .attr("rel", "stylesheet")
                    .attr("href", href);
                let head = self.dom.head();
                let node = self.dom.create_element(&spec);
                self.dom.append_child(head, node);
            }
            HtmlCommand::Routing { target, route } => self.route(&target, route),
            HtmlCommand::AddThemes { themes } => {
                let registry = self.bind_themes();
                for (name, vars) in themes {
                    registry.add(&name, vars);
                }
                self.render_themes();
            }
            HtmlCommand::DeleteTheme { theme } => {
                let removed = self.bind_themes().remove(&theme);
                if removed {
                    self.render_themes();
                } else {
                    debug!(%theme, "theme not registered");
                }
            }
            HtmlCommand::SwitchTheme { theme } => {
                let root = self.dom.document_element();
                self.dom.set_attribute(root, "data-theme", &theme);
            }
            HtmlCommand::UpdateTheme { theme, updates } => self.update_theme(&theme, updates),
        }
        Ok(())
    }

    fn route(&mut self, target: &str, route: Route) {
        self.dom.push_history(json!({}), &route.href);
        info!(href = %route.href, "routed");
        let Some(content) = route.content else {
            return;
        };
        if let Some(node) = self.dom.query(target) {
            self.replace_content(node, &content);
        }
    }

    fn update_theme(&mut self, theme: &str, updates: ThemeVars) {
        self.bind_themes().replace(theme, updates);
        self.render_themes();
    }

    /// The theme registry, bound on first use from the text already present
    /// in the theme style element.
    fn bind_themes(&mut self) -> &mut ThemeRegistry {
        if self.themes.is_none() {
            let existing = self
                .dom
                .element_by_id(THEME_STYLE_ID)
                .map(|node| self.dom.text_content(node))
                .unwrap_or_default();
            self.themes = Some(ThemeRegistry::parse(&existing));
        }
        self.themes.get_or_insert_with(ThemeRegistry::new)
    }

    fn render_themes(&mut self) {
        let css = self.themes.as_ref().map(ThemeRegistry::render).unwrap_or_default();
        let node = match self.dom.element_by_id(THEME_STYLE_ID) {
            Some(node) => node,
            None => {
                let node = self
                    .dom
                    .create_element(&ElementSpec::new("style").attr("id", THEME_STYLE_ID));
                let head = self.dom.head();
                self.dom.append_child(head, node);
                node
            }
        };
        self.dom.set_text_content(node, &css);
    }

    // =========================================================================
    // CSS
    // =========================================================================

    fn apply_css(&mut self, cmd: CssCommand) {
        match cmd {
            CssCommand::Classes {
                op,
                target,
                classes,
            } => {
                for node in self.dom.query_all(&target) {
                    for class in &classes {
                        self.dom.update_class(node, op, class);
                    }
                }
            }
            CssCommand::AddDynamicCss { key, css } => {
                let node = match self.dynamic_css_block(&key) {
                    Some(node) => node,
                    None => {
                        let spec = ElementSpec::new("style")
                            .attr("class", DYNAMIC_CSS_CLASS)
                            .attr("data-key", key.as_str());
                        let node = self.dom.create_element(&spec);
                        let head = self.dom.head();
                        self.dom.append_child(head, node);
                        node
                    }
                };
                self.dom.set_text_content(node, &css);
            }
            CssCommand::RemoveDynamicCss { key } => {
                if let Some(node) = self.dynamic_css_block(&key) {
                    self.dom.remove(node);
                }
            }
        }
    }

    // Compare the key attribute directly so keys never need selector escaping.
    fn dynamic_css_block(&self, key: &str) -> Option<NodeId> {
        self.dom
            .query_all(&format!("style.{}", DYNAMIC_CSS_CLASS))
            .into_iter()
            .find(|&node| self.dom.attribute(node, "data-key").as_deref() == Some(key))
    }

    // =========================================================================
    // JS
    // =========================================================================

    fn apply_js(&mut self, cmd: JsCommand) -> Result<(), DispatchError> {
        match cmd {
            JsCommand::AttachScript { scope, script } => {
                let Some(parent) = self.resolve_scope(&scope, self.dom.body()) else {
                    debug!(%scope, "script target not found");
                    return Ok(());
                };
                let spec = ElementSpec::new("script")
                    .attr("class", DYNAMIC_JS_CLASS)
                    .text(script);
                let node = self.dom.create_element(&spec);
                self.dom.append_child(parent, node);
            }
            JsCommand::AddListener(binding) => self.add_listener(binding)?,
            JsCommand::RemoveScripts { scope } => {
                let blocks = match &scope {
                    Scope::Document => self
                        .dom
                        .query_all(&format!("body > script.{}", DYNAMIC_JS_CLASS)),
                    Scope::Component(selector) => match self.dom.query(selector) {
                        Some(container) => self
                            .dom
                            .query_within(container, &format!("script.{}", DYNAMIC_JS_CLASS)),
                        None => Vec::new(),
                    },
                };
                for node in blocks {
                    self.dom.remove(node);
                }
                self.forget_detached_listeners();
            }
            JsCommand::RemoveListener { scope, event } => {
                let removed = self.listeners.take(&scope, &event);
                if removed.is_empty() {
                    debug!(%scope, %event, "no listeners recorded");
                }
                for (target, listener) in removed {
                    self.dom.remove_event_listener(target, &event, &listener);
                }
            }
        }
        Ok(())
    }

    fn add_listener(&mut self, binding: ActionBinding) -> Result<(), DispatchError> {
        let ActionBinding {
            scope,
            event,
            handler,
            args,
        } = binding;
        let action = self
            .actions
            .get(&handler)
            .ok_or_else(|| DispatchError::UnknownAction(handler.clone()))?;
        let target = match &scope {
            Scope::Document => EventTarget::Document,
            Scope::Component(selector) => match self.dom.query(selector) {
                Some(node) => EventTarget::Element(node),
                None => {
                    debug!(%scope, "listener target not found");
                    return Ok(());
                }
            },
        };
        let listener = actions::bind(action, &scope, args);
        self.dom.add_event_listener(target, &event, listener.clone());
        debug!(%scope, %event, %handler, "listener attached");
        self.listeners.insert(scope, &event, target, listener);
        Ok(())
    }

    fn resolve_scope(&self, scope: &Scope, document: NodeId) -> Option<NodeId> {
        match scope {
            Scope::Document => Some(document),
            Scope::Component(selector) => self.dom.query(selector),
        }
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    fn navigate(&mut self, nav: Navigation) {
        let Some(container) = self.dom.element_by_id(MAIN_CONTAINER_ID) else {
            debug!("navigation container not found");
            return;
        };
        let child = nav.url.trim_start_matches('/');
        let next = if child.is_empty() {
            self.root_path.clone()
        } else {
            format!("{}/{}", self.root_path, child)
        };
        let next = if next.is_empty() { "/".to_string() } else { next };

        self.dom.push_history(json!({ "path": next }), &next);
        info!(path = %next, "navigated");
        self.replace_content(container, &nav.html);
    }

    fn replace_content(&mut self, node: NodeId, html: &str) {
        self.dom.set_inner_html(node, html);
        self.forget_detached_listeners();
        self.enhancer.process(node);
    }

    // The port drops listeners of removed elements itself; this keeps the
    // attach-time records in step with it.
    fn forget_detached_listeners(&mut self) {
        let dom = &self.dom;
        self.listeners
            .retain(|event, target, listener| dom.has_event_listener(target, event, listener));
    }
}
