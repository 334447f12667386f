//! # Reflexive UI
//!
//! Client runtime for server-driven UIs. A server pushes named events
//! (`HTML`, `CSS`, `JS`, `navigation`) over a `text/event-stream`
//! subscription; each event carries a JSON payload describing one direct DOM
//! mutation, which the [`Dispatcher`] applies through a [`DomPort`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use reflexive_ui::{ClientConfig, Dispatcher, MemoryDom, StreamListener, runtime};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let config = ClientConfig::load(None)?;
//! let listener = StreamListener::new(config.subscription_url()?).with_retry(config.retry);
//!
//! let mut dispatcher = Dispatcher::new(MemoryDom::new());
//! dispatcher.actions_mut().register("greet", |ctx| {
//!     println!("{} fired with {}", ctx.event.name, ctx.args);
//! });
//!
//! runtime::run(listener, &mut dispatcher, config.channel_capacity, CancellationToken::new())
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Applying events directly
//!
//! ```rust
//! use reflexive_ui::{Dispatcher, DomPort, ElementSpec, MemoryDom};
//!
//! let mut dom = MemoryDom::new();
//! let body = dom.body();
//! let card = dom.append_element(body, &ElementSpec::new("div").attr("id", "card"));
//!
//! let mut dispatcher = Dispatcher::new(dom);
//! dispatcher.handle_event("HTML", r##"{"render":"Partial","target":"#card","html":"<p>hi</p>"}"##);
//! assert_eq!(dispatcher.dom().inner_html(card), "<p>hi</p>");
//! ```

pub mod actions;
pub mod config;
pub mod dispatch;
pub mod dom;
pub mod error;
pub mod fragment;
pub mod memory_dom;
pub mod protocol;
pub mod runtime;
pub mod selector;
pub mod sse;
pub mod stream;
pub mod theme;

pub use actions::{Action, ActionContext, ActionRegistry};
pub use config::{ClientConfig, Environment};
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use dom::{ClassOp, DomPort, ElementSpec, Enhancer, EventTarget, FiredEvent, Listener, NodeId};
pub use error::{ConfigError, DispatchError, StreamError};
pub use memory_dom::MemoryDom;
pub use protocol::{Channel, Command};
pub use sse::{SseEvent, SseParser};
pub use stream::StreamListener;
pub use theme::ThemeRegistry;
