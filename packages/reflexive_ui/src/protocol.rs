//! Push-event payloads and the typed commands decoded from them.
//!
//! Each channel carries a flat JSON object whose `render` field selects the
//! mutation. An unrecognized `render` decodes to `None` before any field is
//! looked at. A recognized one is decoded in two steps: the flat payload is
//! deserialized leniently, then converted into a typed command that names
//! exactly the fields its variant requires.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::dom::ClassOp;
use crate::error::DispatchError;
use crate::theme::ThemeVars;

/// Named event channels on the push stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Html,
    Css,
    Js,
    Navigation,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Self::Html, Self::Css, Self::Js, Self::Navigation];

    /// Map an SSE `event:` name to a channel. Names are case-sensitive.
    pub fn from_event_name(name: &str) -> Option<Self> {
        match name {
            "HTML" => Some(Self::Html),
            "CSS" => Some(Self::Css),
            "JS" => Some(Self::Js),
            "navigation" => Some(Self::Navigation),
            _ => None,
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Html => "HTML",
            Self::Css => "CSS",
            Self::Js => "JS",
            Self::Navigation => "navigation",
        }
    }

    /// `render` discriminants handled on this channel. `navigation` has none.
    pub fn renders(&self) -> &'static [&'static str] {
        match self {
            Self::Html => &[
                "Partial",
                "AddScriptSrcToHeader",
                "AddLinkToHeader",
                "Routing",
                "AddThemes",
                "DeleteTheme",
                "SwitchTheme",
                "UpdateTheme",
            ],
            Self::Css => &[
                "AddClasses",
                "RemoveClasses",
                "ToggleClasses",
                "AddDynamicCss",
                "RemoveDynamicCss",
            ],
            Self::Js => &[
                "AttachToComponent",
                "AttachToDocument",
                "AddListenerToComponent",
                "AddListenerToDocument",
                "RemoveJsFromComponent",
                "RemoveJsFromDocument",
                "RemoveListenerFromComponent",
                "RemoveListenerFromDocument",
            ],
            Self::Navigation => &[],
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_name())
    }
}

// =============================================================================
// Raw payloads
// =============================================================================

#[derive(Debug, Deserialize)]
struct HtmlPayload {
    #[serde(default)]
    render: String,
    target: Option<String>,
    html: Option<String>,
    #[serde(default)]
    defer: Value,
}

#[derive(Debug, Deserialize)]
struct CssPayload {
    #[serde(default)]
    render: String,
    target: Option<String>,
    classes: Option<Vec<String>>,
    key: Option<String>,
    css: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JsPayload {
    #[serde(default)]
    render: String,
    target: Option<String>,
    html: Option<String>,
}

/// Nested JSON carried in `Routing`'s `html` field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Route {
    pub href: String,
    #[serde(default, alias = "html")]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ThemeName {
    theme: String,
}

#[derive(Debug, Deserialize)]
struct ThemeUpdate {
    theme: String,
    updates: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ListenerSpec {
    target: Option<String>,
    event: String,
    #[serde(alias = "code")]
    handler: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Deserialize)]
struct ListenerRemoval {
    target: Option<String>,
    event: String,
}

#[derive(Debug, Deserialize)]
struct ScopeTarget {
    target: String,
}

// =============================================================================
// Commands
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum HtmlCommand {
    Partial { target: String, html: String },
    AddScriptSrcToHeader { src: String, defer: bool },
    AddLinkToHeader { href: String },
    Routing { target: String, route: Route },
    AddThemes { themes: Vec<(String, ThemeVars)> },
    DeleteTheme { theme: String },
    SwitchTheme { theme: String },
    UpdateTheme { theme: String, updates: ThemeVars },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CssCommand {
    Classes {
        op: ClassOp,
        target: String,
        classes: Vec<String>,
    },
    AddDynamicCss { key: String, css: String },
    RemoveDynamicCss { key: String },
}

/// Whether a listener or script block is bound to a component or the document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Document,
    Component(String),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Document => f.write_str("document"),
            Scope::Component(selector) => f.write_str(selector),
        }
    }
}

/// A pre-registered action invocation bound to an event.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionBinding {
    pub scope: Scope,
    pub event: String,
    pub handler: String,
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JsCommand {
    AttachScript { scope: Scope, script: String },
    AddListener(ActionBinding),
    RemoveScripts { scope: Scope },
    RemoveListener { scope: Scope, event: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub url: String,
    pub html: String,
}

#[derive(Debug, Deserialize)]
struct NavigationPayload {
    #[serde(default, deserialize_with = "lenient_present")]
    url: Option<String>,
    #[serde(default, deserialize_with = "lenient_present")]
    html: Option<String>,
}

impl NavigationPayload {
    /// A payload carrying neither `url` nor `html` is not a navigation.
    fn into_navigation(self) -> Option<Navigation> {
        if self.url.is_none() && self.html.is_none() {
            return None;
        }
        Some(Navigation {
            url: self.url.unwrap_or_default(),
            html: self.html.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Html(HtmlCommand),
    Css(CssCommand),
    Js(JsCommand),
    Navigate(Navigation),
}

impl Command {
    /// Decode `data` received on `channel`. `Ok(None)` means the discriminant
    /// is not one this client knows.
    pub fn decode(channel: Channel, data: &str) -> Result<Option<Self>, DispatchError> {
        let malformed = |source| DispatchError::MalformedPayload { channel, source };
        let value: Value = serde_json::from_str(data).map_err(malformed)?;
        if channel == Channel::Navigation {
            let nav: NavigationPayload = serde_json::from_value(value).map_err(malformed)?;
            return Ok(nav.into_navigation().map(Self::Navigate));
        }

        // Field types are only checked for discriminants this client handles.
        let render = value.get("render").and_then(Value::as_str).unwrap_or_default();
        if !channel.renders().contains(&render) {
            return Ok(None);
        }
        match channel {
            Channel::Html => {
                let payload: HtmlPayload = serde_json::from_value(value).map_err(malformed)?;
                Ok(HtmlCommand::from_payload(payload)?.map(Self::Html))
            }
            Channel::Css => {
                let payload: CssPayload = serde_json::from_value(value).map_err(malformed)?;
                Ok(CssCommand::from_payload(payload)?.map(Self::Css))
            }
            Channel::Js => {
                let payload: JsPayload = serde_json::from_value(value).map_err(malformed)?;
                Ok(JsCommand::from_payload(payload)?.map(Self::Js))
            }
            Channel::Navigation => Ok(None),
        }
    }
}

fn require<T>(value: Option<T>, render: &str, field: &'static str) -> Result<T, DispatchError> {
    value.ok_or_else(|| DispatchError::MissingField {
        render: render.to_string(),
        field,
    })
}

fn nested<'a, T: Deserialize<'a>>(raw: &'a str, render: &str) -> Result<T, DispatchError> {
    serde_json::from_str(raw).map_err(|source| DispatchError::MalformedNested {
        render: render.to_string(),
        source,
    })
}

impl HtmlCommand {
    fn from_payload(p: HtmlPayload) -> Result<Option<Self>, DispatchError> {
        let render = p.render.as_str();
        let command = match render {
            "Partial" => Self::Partial {
                target: require(p.target, render, "target")?,
                html: require(p.html, render, "html")?,
            },
            "AddScriptSrcToHeader" => Self::AddScriptSrcToHeader {
                src: require(p.html, render, "html")?,
                defer: is_truthy(&p.defer),
            },
            "AddLinkToHeader" => Self::AddLinkToHeader {
                href: require(p.html, render, "html")?,
            },
            "Routing" => {
                let target = require(p.target, render, "target")?;
                let raw = require(p.html, render, "html")?;
                Self::Routing {
                    target,
                    route: nested(&raw, render)?,
                }
            }
            "AddThemes" => {
                let raw = require(p.html, render, "html")?;
                let map: serde_json::Map<String, Value> = nested(&raw, render)?;
                let mut themes = Vec::with_capacity(map.len());
                for (name, vars) in map {
                    let Value::Object(vars) = vars else {
                        return Err(DispatchError::InvalidField {
                            render: p.render.clone(),
                            field: "html",
                            reason: format!("theme {name:?} is not an object"),
                        });
                    };
                    themes.push((name, theme_vars(vars)));
                }
                Self::AddThemes { themes }
            }
            "DeleteTheme" => {
                let raw = require(p.html, render, "html")?;
                let ThemeName { theme } = nested(&raw, render)?;
                Self::DeleteTheme { theme }
            }
            "SwitchTheme" => {
                let raw = require(p.html, render, "html")?;
                let ThemeName { theme } = nested(&raw, render)?;
                Self::SwitchTheme { theme }
            }
            "UpdateTheme" => {
                let raw = require(p.html, render, "html")?;
                let ThemeUpdate { theme, updates } = nested(&raw, render)?;
                Self::UpdateTheme {
                    theme,
                    updates: theme_vars(updates),
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(command))
    }
}

impl CssCommand {
    fn from_payload(p: CssPayload) -> Result<Option<Self>, DispatchError> {
        let render = p.render.as_str();
        let op = match render {
            "AddClasses" => ClassOp::Add,
            "RemoveClasses" => ClassOp::Remove,
            "ToggleClasses" => ClassOp::Toggle,
            "AddDynamicCss" => {
                return Ok(Some(Self::AddDynamicCss {
                    key: require(p.key, render, "key")?,
                    css: require(p.css, render, "css")?,
                }));
            }
            "RemoveDynamicCss" => {
                return Ok(Some(Self::RemoveDynamicCss {
                    key: require(p.key, render, "key")?,
                }));
            }
            _ => return Ok(None),
        };
        Ok(Some(Self::Classes {
            op,
            target: require(p.target, render, "target")?,
            classes: require(p.classes, render, "classes")?,
        }))
    }
}

impl JsCommand {
    fn from_payload(p: JsPayload) -> Result<Option<Self>, DispatchError> {
        let render = p.render.as_str();
        let command = match render {
            "AttachToComponent" => Self::AttachScript {
                scope: Scope::Component(require(p.target, render, "target")?),
                script: require(p.html, render, "html")?,
            },
            "AttachToDocument" => Self::AttachScript {
                scope: Scope::Document,
                script: require(p.html, render, "html")?,
            },
            "AddListenerToComponent" | "AddListenerToDocument" => {
                let raw = require(p.html, render, "html")?;
                let spec: ListenerSpec = nested(&raw, render)?;
                let scope = if render == "AddListenerToComponent" {
                    Scope::Component(require(spec.target, render, "target")?)
                } else {
                    Scope::Document
                };
                Self::AddListener(ActionBinding {
                    scope,
                    event: spec.event,
                    handler: spec.handler,
                    args: spec.args,
                })
            }
            "RemoveJsFromComponent" => {
                let raw = require(p.html, render, "html")?;
                let ScopeTarget { target } = nested(&raw, render)?;
                Self::RemoveScripts {
                    scope: Scope::Component(target),
                }
            }
            "RemoveJsFromDocument" => Self::RemoveScripts {
                scope: Scope::Document,
            },
            "RemoveListenerFromComponent" | "RemoveListenerFromDocument" => {
                let raw = require(p.html, render, "html")?;
                let removal: ListenerRemoval = nested(&raw, render)?;
                let scope = if render == "RemoveListenerFromComponent" {
                    Scope::Component(require(removal.target, render, "target")?)
                } else {
                    Scope::Document
                };
                Self::RemoveListener {
                    scope,
                    event: removal.event,
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(command))
    }
}

/// Flatten a JSON object of CSS variables into declarations. Non-string
/// values keep their JSON text (`12` stays `12`).
fn theme_vars(map: serde_json::Map<String, Value>) -> ThemeVars {
    map.into_iter()
        .map(|(property, value)| {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (property, value)
        })
        .collect()
}

/// JavaScript-style truthiness, used for the optional `defer` flag.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Like [`lenient_string`], for fields whose presence matters. A missing
/// field falls back to `None` through `#[serde(default)]`.
fn lenient_present<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    lenient_string(deserializer).map(Some)
}

/// Accept a string, `null` or any scalar, rendering non-strings as text.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}
