//! # Trellis
//!
//! Typed request handlers that do not know which HTTP framework serves them.
//!
//! ## Overview
//!
//! Business logic is written as plain async functions over a typed parameter
//! value. Those functions are collected into route groups, each scoped to one
//! dependency, and every group is bound once at startup against a router and
//! a resolver supplied by the application.
//!
//! ```text
//! ┌──────────────┐     ┌────────────┐     ┌──────────────┐     ┌────────────┐
//! │ business fn  │────▶│ RouteGroup │────▶│    Groups    │────▶│   Router   │
//! │ (Ctx, P)->R  │     │  (dep D)   │     │ (bind_all)   │     │ (adapter)  │
//! └──────────────┘     └────────────┘     └──────────────┘     └────────────┘
//!                                                ▲
//!                                          Resolve (deps, request data)
//! ```
//!
//! - **Handler**: the type-erased contract a router stores and invokes
//! - **RouteGroup**: routes sharing one dependency and a set of options
//! - **Groups**: the process-wide registry, bound in registration order
//! - **Router / Resolve**: the two seams an HTTP adapter implements
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trellis::prelude::*;
//!
//! #[derive(Default, serde::Serialize, serde::Deserialize)]
//! struct GetUser { id: String }
//!
//! let runtime = TrellisRuntime::load()?;
//! runtime.register_group(define_group(|router, users: Arc<dyn UserService>| {
//!     register(router, "GET", "/users/:id", move |ctx, p: GetUser| {
//!         let users = users.clone();
//!         async move { users.get(&ctx, &p.id).await }
//!     });
//! }));
//! runtime.bind(&dependencies)?;
//! ```
//!
//! ## Features
//!
//! - `toml-config`: Load configuration from TOML files (default)
//! - `yaml-config`: Load configuration from YAML files
//! - `json-log`: Enable the JSON log format

pub use trellis_core as core;
pub use trellis_runtime as runtime;

pub use trellis_core::*;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use trellis::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use trellis_runtime::{DispatchError, PathParams, RouteTable, TrellisRuntime};

    // Declaring routes
    pub use trellis_core::{
        Binder, Groups, RouteGroup, define_group, define_group_with, options, register,
        register_with,
    };

    // Invocation
    pub use trellis_core::{BindError, BoxError, Context, Payload, Resolve, Slot, resolve_fn};

    // Core traits for custom routers
    pub use trellis_core::{BoxedHandler, Handler, Options, Router};
}
