//! Trellis Runtime - wiring for the Trellis handler core.
//!
//! This crate provides:
//! - Layered configuration (`ConfigLoader`, `TrellisConfig`)
//! - Logging setup on top of `tracing-subscriber` (`LoggingBuilder`)
//! - A reference in-memory router (`RouteTable`) that groups bind against
//! - Runtime orchestration (`TrellisRuntime`)
//!
//! ```ignore
//! use trellis_runtime::TrellisRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = TrellisRuntime::load()?;
//!
//!     runtime.register_group(routes::public());
//!     runtime.register_group(routes::protected());
//!     runtime.bind(&dependencies)?;
//!
//!     for route in runtime.routes() {
//!         println!("{} {}", route.method, route.path);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Route Table Options
//!
//! `RouteTable` reads one option key itself: `prefix`, which is joined in
//! front of the route path when `router.prefix_option` is enabled. Every
//! other option is stored with the route and left to the application.

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod table;

// Re-exports
pub use config::{
    ConfigError, ConfigLoader, ConfigResult, LoggingConfig, Profile, RouterConfig, TrellisConfig,
};
pub use error::{DispatchError, RuntimeError, RuntimeResult};
pub use logging::{FmtSpan, LoggingBuilder};
pub use runtime::{RuntimeBuilder, TrellisRuntime};
pub use table::{
    DispatchFuture, PREFIX_OPTION, PathParams, Route, RouteInfo, RouteMatch, RouteTable,
};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides all the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
