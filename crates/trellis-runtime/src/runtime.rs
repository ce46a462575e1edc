//! Runtime wiring: configuration, logging, the group registry and a route
//! table, owned together.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use trellis_runtime::TrellisRuntime;
//!
//! let runtime = TrellisRuntime::builder()
//!     .config_file("config/trellis.toml")
//!     .build()?;
//!
//! runtime.register_group(users::public_routes());
//! runtime.bind(&dependencies)?;
//!
//! let response = runtime
//!     .dispatch("GET", "/users/42", Context::new(), &request)
//!     .await?;
//! ```

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};
use trellis_core::{Binder, Context, Groups, Resolve};

use crate::config::{ConfigLoader, TrellisConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use crate::table::{DispatchFuture, RouteInfo, RouteMatch, RouteTable};

/// Owns the configuration, a shared [`Groups`] registry and a shared
/// [`RouteTable`].
pub struct TrellisRuntime {
    config: TrellisConfig,
    groups: Arc<Groups>,
    table: Arc<RouteTable>,
}

impl TrellisRuntime {
    /// Creates a runtime from the default config locations.
    ///
    /// Falls back to defaults if loading fails.
    pub fn new() -> Self {
        let config = ConfigLoader::new()
            .with_current_dir()
            .load()
            .unwrap_or_else(|e| {
                eprintln!("Warning: Failed to load config ({e}), using defaults");
                TrellisConfig::default()
            });

        Self::from_config(config)
    }

    /// Creates a runtime builder for custom configuration.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Loads, validates and applies configuration from the default locations,
    /// then installs logging.
    pub fn load() -> RuntimeResult<Self> {
        Self::builder().build()
    }

    /// Creates a runtime from an already loaded configuration.
    ///
    /// Does not install logging; call [`init_logging`](Self::init_logging).
    pub fn from_config(config: TrellisConfig) -> Self {
        let table = RouteTable::with_config(config.router.clone());
        debug!(
            base_path = %config.router.base_path,
            prefix_option = config.router.prefix_option,
            "Runtime created"
        );

        Self {
            config,
            groups: Arc::new(Groups::new()),
            table: Arc::new(table),
        }
    }

    /// Installs the global tracing subscriber from the logging config.
    ///
    /// Does nothing if a subscriber is already installed.
    pub fn init_logging(&self) {
        logging::init_from_config(&self.config.logging);
        info!(
            log_level = %self.config.logging.level,
            log_format = ?self.config.logging.format,
            "Logging initialized"
        );
    }

    pub fn config(&self) -> &TrellisConfig {
        &self.config
    }

    /// The group registry. Clone the `Arc` to register groups from elsewhere.
    pub fn groups(&self) -> &Arc<Groups> {
        &self.groups
    }

    /// The route table groups are bound against.
    pub fn table(&self) -> &Arc<RouteTable> {
        &self.table
    }

    /// Appends a group to the registry.
    pub fn register_group(&self, group: impl Binder + 'static) -> &Self {
        self.groups.register(group);
        self
    }

    /// Binds every registered group against the route table.
    ///
    /// On failure, routes of groups bound before the failing one remain in
    /// the table.
    pub fn bind(&self, resolve: &dyn Resolve) -> RuntimeResult<()> {
        let before = self.table.len();
        match self.groups.bind_all(self.table.as_ref(), resolve) {
            Ok(()) => {
                info!(
                    groups = self.groups.len(),
                    routes = self.table.len(),
                    "Route groups bound"
                );
                Ok(())
            }
            Err(err) => {
                warn!(
                    registered = self.table.len() - before,
                    error = %err,
                    "Binding stopped, partially registered routes remain"
                );
                Err(RuntimeError::Bind(err))
            }
        }
    }

    /// Dispatches a request through the route table.
    pub fn dispatch(
        &self,
        method: &str,
        path: &str,
        ctx: Context,
        resolve: &dyn Resolve,
    ) -> DispatchFuture {
        self.table.dispatch(method, path, ctx, resolve)
    }

    /// Dispatches a request with a resolver built from the matched route.
    pub fn dispatch_with<F, R>(
        &self,
        method: &str,
        path: &str,
        ctx: Context,
        make_resolver: F,
    ) -> DispatchFuture
    where
        F: FnOnce(&RouteMatch) -> R,
        R: Resolve,
    {
        self.table.dispatch_with(method, path, ctx, make_resolver)
    }

    /// Describes every bound route.
    pub fn routes(&self) -> Vec<RouteInfo> {
        self.table.describe()
    }
}

impl Default for TrellisRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TrellisRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrellisRuntime")
            .field("groups", &self.groups.len())
            .field("routes", &self.table.len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`TrellisRuntime`] with custom configuration sources.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    init_logging: bool,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder searching the current directory.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            init_logging: true,
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Enables loading environment variables (enabled by default).
    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges configuration above the defaults; files and env vars still win.
    ///
    /// See [`ConfigLoader::merge`].
    pub fn merge(mut self, config: TrellisConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Skips installing the global subscriber in [`build`](Self::build).
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    /// Loads and validates the configuration and builds the runtime.
    pub fn build(self) -> RuntimeResult<TrellisRuntime> {
        let config = self.config_loader.load()?;
        validate_config(&config)?;

        let runtime = TrellisRuntime::from_config(config);
        if self.init_logging {
            runtime.init_logging();
        }
        Ok(runtime)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use trellis_core::{BindError, define_group, define_group_with, options, register, resolve_fn};

    use super::*;
    use crate::config::{ConfigError, RouterConfig};

    struct Greeter {
        greeting: &'static str,
    }

    #[derive(Default, Serialize, Deserialize)]
    struct Hello {
        name: String,
    }

    #[derive(Debug, Default, PartialEq, Serialize)]
    struct Greeting {
        message: String,
    }

    fn runtime() -> TrellisRuntime {
        TrellisRuntime::from_config(TrellisConfig {
            router: RouterConfig {
                base_path: "/api".into(),
                prefix_option: true,
            },
            ..Default::default()
        })
    }

    fn greeter_group() -> impl Binder {
        define_group_with(
            |router, greeter: Arc<Greeter>| {
                register(router, "POST", "/hello", move |_ctx: Context, p: Hello| {
                    let message = format!("{}, {}", greeter.greeting, p.name);
                    async move { Ok::<_, BindError>(Greeting { message }) }
                });
            },
            vec![options([("prefix", "/v1")])],
        )
    }

    #[tokio::test]
    async fn test_bind_and_dispatch() {
        let runtime = runtime();
        runtime.register_group(greeter_group());

        let deps = resolve_fn(|slot| {
            slot.fill(Arc::new(Greeter { greeting: "Hello" }))?;
            Ok(())
        });
        runtime.bind(&deps).unwrap();

        let routes = runtime.routes();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].path, "/api/v1/hello");

        let body = resolve_fn(|slot| {
            slot.decode_json(json!({ "name": "trellis" }))?;
            Ok(())
        });
        let out = runtime
            .dispatch("POST", "/api/v1/hello", Context::new(), &body)
            .await
            .unwrap();
        assert_eq!(
            out.downcast_ref::<Greeting>(),
            Some(&Greeting {
                message: "Hello, trellis".into()
            })
        );
    }

    #[test]
    fn test_bind_failure_keeps_earlier_routes() {
        let runtime = runtime();
        runtime
            .register_group(greeter_group())
            .register_group(define_group(|_router, _missing: u32| {}));

        let deps = resolve_fn(|slot| {
            if slot.is::<Arc<Greeter>>() {
                slot.fill(Arc::new(Greeter { greeting: "Hi" }))?;
            }
            Ok(())
        });

        let err = runtime.bind(&deps).unwrap_err();
        assert!(matches!(err, RuntimeError::Bind(_)));
        assert_eq!(runtime.table().len(), 1);
    }

    #[test]
    fn test_builder_validates_config() {
        let err = TrellisRuntime::builder()
            .search_path("/nonexistent/trellis")
            .without_env()
            .without_logging()
            .merge(TrellisConfig {
                router: RouterConfig {
                    base_path: "no-slash".into(),
                    prefix_option: true,
                },
                ..Default::default()
            })
            .build()
            .unwrap_err();

        assert!(matches!(
            err,
            RuntimeError::Config(ConfigError::InvalidPath { .. })
        ));
    }
}
