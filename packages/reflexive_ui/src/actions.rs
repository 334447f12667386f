//! Pre-registered listener actions and the attach-time listener table.
//!
//! The server never ships code for listeners. It names an action registered
//! on the client and passes structured arguments; the dispatcher binds a
//! listener that calls that action when the event fires.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::dom::{EventTarget, FiredEvent, Listener};
use crate::protocol::Scope;

/// What an action sees when its event fires.
#[derive(Debug)]
pub struct ActionContext<'a> {
    pub event: &'a FiredEvent,
    /// Selector the listener was attached with, or `None` for the document.
    pub target: Option<&'a str>,
    pub args: &'a Value,
}

pub type Action = Arc<dyn Fn(&ActionContext<'_>) + Send + Sync>;

/// Name → action lookup table.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Action>,
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ActionRegistry")
            .field("actions", &names)
            .finish()
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `action` under `name`, replacing any previous registration.
    pub fn register<F>(&mut self, name: impl Into<String>, action: F) -> &mut Self
    where
        F: Fn(&ActionContext<'_>) + Send + Sync + 'static,
    {
        self.actions.insert(name.into(), Arc::new(action));
        self
    }

    pub fn get(&self, name: &str) -> Option<Action> {
        self.actions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Build the DOM listener that runs `action` with `args`.
pub(crate) fn bind(action: Action, scope: &Scope, args: Value) -> Listener {
    let target = match scope {
        Scope::Document => None,
        Scope::Component(selector) => Some(selector.clone()),
    };
    Arc::new(move |event: &FiredEvent| {
        let ctx = ActionContext {
            event,
            target: target.as_deref(),
            args: &args,
        };
        action(&ctx);
    })
}

/// Listeners remembered at attach time, keyed by `(scope, event name)`.
#[derive(Default)]
pub struct ListenerRegistry {
    entries: HashMap<(Scope, String), Vec<(EventTarget, Listener)>>,
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("keys", &self.entries.len())
            .field("listeners", &self.len())
            .finish()
    }
}

impl ListenerRegistry {
    pub fn insert(&mut self, scope: Scope, event: &str, target: EventTarget, listener: Listener) {
        self.entries
            .entry((scope, event.to_string()))
            .or_default()
            .push((target, listener));
    }

    /// Remove and return every listener recorded for `(scope, event)`.
    pub fn take(&mut self, scope: &Scope, event: &str) -> Vec<(EventTarget, Listener)> {
        self.entries
            .remove(&(scope.clone(), event.to_string()))
            .unwrap_or_default()
    }

    /// Keep only the records for which `keep(event, target, listener)` holds.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, EventTarget, &Listener) -> bool) {
        self.entries.retain(|(_, event), listeners| {
            listeners.retain(|(target, listener)| keep(event.as_str(), *target, listener));
            !listeners.is_empty()
        });
    }

    pub fn count(&self, scope: &Scope, event: &str) -> usize {
        self.entries
            .get(&(scope.clone(), event.to_string()))
            .map_or(0, Vec::len)
    }

    /// Total number of recorded listeners.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
