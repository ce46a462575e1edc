//! An in-process reference router.
//!
//! [`RouteTable`] implements [`Router`] without any transport. It stores the
//! registered handlers, matches `METHOD path` pairs against them and invokes
//! the winning handler. Framework adapters do the same work against their own
//! routers; the table is what the runtime, the tests and the demo use.
//!
//! Path handling on registration:
//!
//! 1. the path is normalized to a single leading `/` with no empty segments,
//! 2. the merged `prefix` option is prepended (see
//!    [`RouterConfig::prefix_option`]),
//! 3. [`RouterConfig::base_path`] is prepended.
//!
//! Path parameters are written `:name` or `{name}`. When several routes match
//! a request, the one with the most static segments wins.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::{self, BoxFuture};
use futures::{FutureExt, TryFutureExt};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tracing::{Instrument, debug, debug_span, warn};
use trellis_core::{BoxedHandler, Context, Options, Payload, Resolve, Router, merge_options};

use crate::config::RouterConfig;
use crate::error::DispatchError;

/// Route option whose value is prepended to the route path.
pub const PREFIX_OPTION: &str = "prefix";

/// Future returned by [`RouteTable::dispatch`].
pub type DispatchFuture = BoxFuture<'static, Result<Box<dyn Payload>, DispatchError>>;

// =============================================================================
// Paths
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(String),
}

impl Segment {
    fn parse(raw: &str) -> Self {
        if let Some(name) = raw.strip_prefix(':') {
            return Self::Param(name.to_string());
        }
        match raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) if !name.is_empty() => Self::Param(name.to_string()),
            _ => Self::Static(raw.to_string()),
        }
    }

    /// Same position in the routing tree, ignoring parameter names.
    fn same_shape(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Static(a), Self::Static(b)) => a == b,
            (Self::Param(_), Self::Param(_)) => true,
            _ => false,
        }
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn strip_query(path: &str) -> &str {
    path.split(['?', '#']).next().unwrap_or(path)
}

/// Normalizes `path` to a leading `/` with no empty or trailing segments.
pub fn normalize_path(path: &str) -> String {
    let joined = split_path(path.trim()).collect::<Vec<_>>().join("/");
    format!("/{joined}")
}

/// Joins two paths, normalizing both.
pub fn join_paths(prefix: &str, path: &str) -> String {
    let prefix = normalize_path(prefix);
    let path = normalize_path(path);
    match (prefix.as_str(), path.as_str()) {
        ("/", _) => path,
        (_, "/") => prefix,
        _ => format!("{prefix}{path}"),
    }
}

/// Path parameters captured by a route match.
///
/// Also inserted into the [`Context`] handed to the business function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PathParams(BTreeMap<String, String>);

impl PathParams {
    /// Returns the raw value of a parameter.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Iterates over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PathParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

// =============================================================================
// Route
// =============================================================================

/// A registered route.
pub struct Route {
    method: String,
    path: String,
    pattern: Vec<Segment>,
    handler: BoxedHandler,
    options: Vec<Options>,
    merged: Options,
}

impl Route {
    /// Upper-cased HTTP method.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Final path, including prefix and base path.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn handler(&self) -> &BoxedHandler {
        &self.handler
    }

    /// Options as received, group options first.
    pub fn options(&self) -> &[Options] {
        &self.options
    }

    /// Options flattened with later maps winning.
    pub fn merged_options(&self) -> &Options {
        &self.merged
    }

    /// Looks up one merged option.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.merged.get(key).map(String::as_str)
    }

    fn static_segments(&self) -> usize {
        self.pattern
            .iter()
            .filter(|s| matches!(s, Segment::Static(_)))
            .count()
    }

    fn same_shape(&self, other: &Route) -> bool {
        self.pattern.len() == other.pattern.len()
            && self
                .pattern
                .iter()
                .zip(&other.pattern)
                .all(|(a, b)| a.same_shape(b))
    }

    fn match_segments(&self, segments: &[&str]) -> Option<PathParams> {
        if segments.len() != self.pattern.len() {
            return None;
        }

        let mut params = BTreeMap::new();
        for (pattern, segment) in self.pattern.iter().zip(segments) {
            match pattern {
                Segment::Static(expected) if expected == segment => {}
                Segment::Static(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), (*segment).to_string());
                }
            }
        }
        Some(PathParams(params))
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("options", &self.merged)
            .finish_non_exhaustive()
    }
}

/// A route selected for a request, with its captured parameters.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<Route>,
    pub params: PathParams,
}

/// Serializable description of a route.
#[derive(Debug, Clone, Serialize)]
pub struct RouteInfo {
    pub method: String,
    pub path: String,
    pub params_type: &'static str,
    pub response_type: &'static str,
    /// Zero value of the parameter type, as JSON.
    pub params: Option<Value>,
    pub options: BTreeMap<String, String>,
}

// =============================================================================
// RouteTable
// =============================================================================

/// A thread-safe table of routes implementing [`Router`].
#[derive(Default)]
pub struct RouteTable {
    config: RouterConfig,
    routes: RwLock<Vec<Arc<Route>>>,
}

impl RouteTable {
    /// Creates an empty table with the default router settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty table with the given settings.
    pub fn with_config(config: RouterConfig) -> Self {
        Self {
            config,
            routes: RwLock::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.routes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.read().is_empty()
    }

    /// Snapshot of all routes in registration order.
    pub fn routes(&self) -> Vec<Arc<Route>> {
        self.routes.read().clone()
    }

    /// Describes every route for introspection.
    pub fn describe(&self) -> Vec<RouteInfo> {
        self.routes
            .read()
            .iter()
            .map(|route| {
                let params = route.handler.params();
                let response = route.handler.response();
                RouteInfo {
                    method: route.method.clone(),
                    path: route.path.clone(),
                    params_type: params.type_name(),
                    response_type: response.type_name(),
                    params: params.to_json().ok(),
                    options: route
                        .merged
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                }
            })
            .collect()
    }

    /// Finds the route for `method` and `path`.
    pub fn find(&self, method: &str, path: &str) -> Option<RouteMatch> {
        self.lookup(method, path).ok()
    }

    /// Like [`find`](Self::find), but reports why nothing matched.
    ///
    /// A query string or fragment on `path` is ignored when matching.
    pub fn lookup(&self, method: &str, path: &str) -> Result<RouteMatch, DispatchError> {
        let method = method.to_uppercase();
        let path = strip_query(path);
        let segments: Vec<&str> = split_path(path).collect();

        let routes = self.routes.read();
        let mut best: Option<(usize, RouteMatch)> = None;
        let mut allowed: Vec<String> = Vec::new();

        for route in routes.iter() {
            let Some(params) = route.match_segments(&segments) else {
                continue;
            };
            if route.method != method {
                if !allowed.contains(&route.method) {
                    allowed.push(route.method.clone());
                }
                continue;
            }

            let score = route.static_segments();
            if best.as_ref().is_none_or(|(best_score, _)| score > *best_score) {
                best = Some((
                    score,
                    RouteMatch {
                        route: Arc::clone(route),
                        params,
                    },
                ));
            }
        }

        match best {
            Some((_, found)) => Ok(found),
            None if !allowed.is_empty() => Err(DispatchError::MethodNotAllowed {
                method,
                path: path.to_string(),
                allowed,
            }),
            None => Err(DispatchError::NotFound {
                method,
                path: path.to_string(),
            }),
        }
    }

    /// Dispatches a request, resolving parameters through `resolve`.
    pub fn dispatch(
        &self,
        method: &str,
        path: &str,
        ctx: Context,
        resolve: &dyn Resolve,
    ) -> DispatchFuture {
        match self.lookup(method, path) {
            Ok(found) => invoke_matched(found, ctx, resolve),
            Err(err) => future::ready(Err(err)).boxed(),
        }
    }

    /// Dispatches a request with a resolver built from the matched route.
    ///
    /// Use this when parameter resolution needs the captured path parameters.
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
        match self.lookup(method, path) {
            Ok(found) => {
                let resolver = make_resolver(&found);
                invoke_matched(found, ctx, &resolver)
            }
            Err(err) => future::ready(Err(err)).boxed(),
        }
    }
}

fn invoke_matched(found: RouteMatch, ctx: Context, resolve: &dyn Resolve) -> DispatchFuture {
    let span = debug_span!("dispatch", method = %found.route.method, route = %found.route.path);
    let ctx = ctx.with_value(found.params);
    let fut = span.in_scope(|| found.route.handler.invoke(ctx, resolve));
    fut.map_err(DispatchError::Handler).instrument(span).boxed()
}

impl Router for RouteTable {
    fn register(&self, method: &str, path: &str, handler: BoxedHandler, options: Vec<Options>) {
        let merged = merge_options(&options);

        let mut full_path = normalize_path(path);
        if let Some(prefix) = merged.get(PREFIX_OPTION).filter(|_| self.config.prefix_option) {
            full_path = join_paths(prefix, &full_path);
        }
        if !self.config.base_path.is_empty() {
            full_path = join_paths(&self.config.base_path, &full_path);
        }

        let route = Arc::new(Route {
            method: method.to_uppercase(),
            pattern: split_path(&full_path).map(Segment::parse).collect(),
            path: full_path,
            handler,
            options,
            merged,
        });

        let mut routes = self.routes.write();
        let existing = routes
            .iter_mut()
            .find(|r| r.method == route.method && r.same_shape(&route));
        match existing {
            Some(slot) => {
                warn!(
                    method = %route.method,
                    path = %route.path,
                    replaced = %slot.path,
                    "Duplicate route, replacing earlier registration"
                );
                *slot = route;
            }
            None => {
                debug!(method = %route.method, path = %route.path, "Route registered");
                routes.push(route);
            }
        }
    }
}

impl std::fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteTable")
            .field("config", &self.config)
            .field("routes", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;
    use trellis_core::{BindError, Slot, into_handler, options, resolve_fn};

    use super::*;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Echo {
        id: String,
    }

    fn echo() -> BoxedHandler {
        into_handler(|ctx: Context, mut p: Echo| async move {
            if p.id.is_empty() {
                p.id = ctx
                    .value::<PathParams>()
                    .and_then(|params| params.get("id"))
                    .unwrap_or_default()
                    .to_string();
            }
            Ok::<_, BindError>(p)
        })
    }

    fn fixed(tag: &'static str) -> BoxedHandler {
        into_handler(move |_ctx: Context, (): ()| async move { Ok::<_, BindError>(tag) })
    }

    fn no_params() -> impl Fn(&mut Slot<'_>) -> Result<(), trellis_core::BoxError> {
        resolve_fn(|_| Ok(()))
    }

    #[test]
    fn test_normalize_and_join() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("users//:id/"), "/users/:id");
        assert_eq!(join_paths("/api/", "users"), "/api/users");
        assert_eq!(join_paths("/", "/users"), "/users");
        assert_eq!(join_paths("/api", "/"), "/api");
    }

    #[test]
    fn test_register_applies_prefix_and_base_path() {
        let table = RouteTable::with_config(RouterConfig {
            base_path: "/svc".into(),
            prefix_option: true,
        });
        table.register(
            "get",
            "users/:id",
            echo(),
            vec![options([("prefix", "/api/v1")]), options([("auth", "jwt")])],
        );

        let routes = table.routes();
        assert_eq!(routes[0].method(), "GET");
        assert_eq!(routes[0].path(), "/svc/api/v1/users/:id");
        assert_eq!(routes[0].option("auth"), Some("jwt"));
        assert_eq!(routes[0].options().len(), 2);
    }

    #[test]
    fn test_prefix_option_can_be_disabled() {
        let table = RouteTable::with_config(RouterConfig {
            base_path: String::new(),
            prefix_option: false,
        });
        table.register("GET", "/a", fixed("a"), vec![options([("prefix", "/p")])]);
        assert_eq!(table.routes()[0].path(), "/a");
    }

    #[test]
    fn test_duplicate_route_is_replaced() {
        let table = RouteTable::new();
        table.register("GET", "/users/:id", fixed("first"), Vec::new());
        table.register("GET", "/users/{user_id}", fixed("second"), Vec::new());
        table.register("PUT", "/users/:id", fixed("put"), Vec::new());

        assert_eq!(table.len(), 2);
        assert_eq!(table.routes()[0].path(), "/users/{user_id}");
    }

    #[test]
    fn test_static_segments_win() {
        let table = RouteTable::new();
        table.register("GET", "/users/:id", fixed("by-id"), Vec::new());
        table.register("GET", "/users/me", fixed("me"), Vec::new());

        let found = table.find("GET", "/users/me").unwrap();
        assert_eq!(found.route.path(), "/users/me");
        assert!(found.params.is_empty());

        let found = table.find("get", "/users/42").unwrap();
        assert_eq!(found.params.get("id"), Some("42"));
    }

    #[test]
    fn test_query_string_is_ignored_when_matching() {
        let table = RouteTable::new();
        table.register("GET", "/users", fixed("list"), Vec::new());
        table.register("GET", "/users/:id", fixed("by-id"), Vec::new());

        let found = table.find("GET", "/users?limit=2&offset=4").unwrap();
        assert_eq!(found.route.path(), "/users");

        let found = table.find("GET", "/users/7?expand=roles#top").unwrap();
        assert_eq!(found.params.get("id"), Some("7"));

        match table.lookup("GET", "/missing?x=1") {
            Err(DispatchError::NotFound { path, .. }) => assert_eq!(path, "/missing"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_lookup_errors() {
        let table = RouteTable::new();
        table.register("GET", "/users/:id", fixed("get"), Vec::new());
        table.register("DELETE", "/users/:id", fixed("delete"), Vec::new());

        assert!(matches!(
            table.lookup("GET", "/nope"),
            Err(DispatchError::NotFound { .. })
        ));
        match table.lookup("PATCH", "/users/1") {
            Err(DispatchError::MethodNotAllowed { allowed, .. }) => {
                assert_eq!(allowed, vec!["GET", "DELETE"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dispatch_passes_path_params_in_context() {
        let table = RouteTable::new();
        table.register("GET", "/echo/:id", echo(), Vec::new());

        let out = table
            .dispatch("GET", "/echo/abc", Context::new(), &no_params())
            .await
            .unwrap();
        assert_eq!(out.downcast_ref::<Echo>(), Some(&Echo { id: "abc".into() }));
    }

    #[tokio::test]
    async fn test_dispatch_with_route_aware_resolver() {
        let table = RouteTable::new();
        table.register("POST", "/echo/:id", echo(), Vec::new());

        let out = table
            .dispatch_with("POST", "/echo/x", Context::new(), |found: &RouteMatch| {
                let id = format!("{}-decoded", found.params.get("id").unwrap_or_default());
                resolve_fn(move |slot| {
                    slot.decode_json(json!({ "id": id }))?;
                    Ok(())
                })
            })
            .await
            .unwrap();
        assert_eq!(
            out.downcast_ref::<Echo>(),
            Some(&Echo {
                id: "x-decoded".into()
            })
        );
    }

    #[tokio::test]
    async fn test_dispatch_errors() {
        let table = RouteTable::new();
        table.register("POST", "/echo/:id", echo(), Vec::new());

        let err = table
            .dispatch("GET", "/missing", Context::new(), &no_params())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");

        let bad_body = resolve_fn(|slot| {
            slot.decode_json(json!({ "id": 5 }))?;
            Ok(())
        });
        let err = table
            .dispatch("POST", "/echo/1", Context::new(), &bad_body)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "bad_request");
    }

    #[test]
    fn test_describe() {
        let table = RouteTable::new();
        table.register("GET", "/echo/:id", echo(), vec![options([("public", "true")])]);

        let info = table.describe();
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].path, "/echo/:id");
        assert!(info[0].params_type.ends_with("Echo"));
        assert_eq!(info[0].params, Some(json!({ "id": "" })));
        assert_eq!(info[0].options.get("public").map(String::as_str), Some("true"));
    }
}
