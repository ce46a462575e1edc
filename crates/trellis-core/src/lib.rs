//! # Trellis Core
//!
//! Framework-independent building blocks for declaring typed request handlers
//! and wiring them to a concrete router and to concrete dependencies later.
//!
//! Business code writes plain async functions that take a [`Context`] and a
//! typed parameter value. The core erases them into [`Handler`]s, scopes them
//! into [`RouteGroup`]s keyed to one dependency, and collects those groups in a
//! [`Groups`] registry that is bound once against a [`Router`] and a
//! [`Resolve`] implementation.
//!
//! ## Flow
//!
//! ```text
//! business fn ──▶ register() ──▶ HandlerFn ──▶ OptionsRouter ──▶ Router
//!                                                   ▲
//! define_group(..) ──▶ Groups::register ──▶ Groups::bind_all(router, resolve)
//! ```
//!
//! Everything that touches the wire (request parsing, response encoding,
//! authentication) lives outside this crate and talks to it only through the
//! [`Router`], [`Resolve`] and [`Handler`] contracts.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trellis_core::*;
//!
//! #[derive(Default, serde::Serialize, serde::Deserialize)]
//! struct Hello { name: String }
//!
//! #[derive(Default, serde::Serialize)]
//! struct Greeting { message: String }
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self, name: &str) -> String;
//! }
//!
//! let groups = Groups::new();
//! groups.register(define_group(|router, greeter: Arc<dyn Greeter>| {
//!     register(router, "GET", "/hello", move |_ctx, params: Hello| {
//!         let message = greeter.greet(&params.name);
//!         async move { Ok::<_, BindError>(Greeting { message }) }
//!     });
//! }));
//!
//! groups.bind_all(&my_router, &resolve_fn(|slot| {
//!     if slot.is::<Arc<dyn Greeter>>() {
//!         slot.fill::<Arc<dyn Greeter>>(Arc::new(MyGreeter))?;
//!     }
//!     Ok(())
//! }))?;
//! ```

pub mod context;
pub mod error;
pub mod group;
pub mod handler;
pub mod payload;
pub mod register;
pub mod registry;
pub mod resolve;
pub mod router;

pub use context::Context;
pub use error::{BindError, BindResult, BoxError};
pub use group::{Binder, RouteGroup, define_group, define_group_with};
pub use handler::{BoxedHandler, Handler, HandlerFn, HandlerFuture, into_handler};
pub use payload::Payload;
pub use register::{register, register_with};
pub use registry::Groups;
pub use resolve::{Resolve, Slot, resolve_fn};
pub use router::{Options, OptionsRouter, Router, merge_options, options};
