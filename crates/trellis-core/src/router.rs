//! The router contract and the options decorator.
//!
//! The core never routes requests itself. It registers handlers with whatever
//! implements [`Router`], together with a sequence of free-form [`Options`]
//! maps that the router is free to interpret (auth requirements, path
//! prefixes, rate limits, …).

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::handler::BoxedHandler;

/// Free-form key/value metadata attached to groups and routes.
pub type Options = HashMap<String, String>;

/// Something that can register handlers.
///
/// Implemented outside the core, by framework adapters and by the reference
/// route table in the runtime crate.
pub trait Router: Send + Sync {
    /// Registers `handler` under `method` and `path`.
    ///
    /// `options` is ordered: group options first, then route options.
    fn register(&self, method: &str, path: &str, handler: BoxedHandler, options: Vec<Options>);
}

impl<R: Router + ?Sized> Router for &R {
    fn register(&self, method: &str, path: &str, handler: BoxedHandler, options: Vec<Options>) {
        (**self).register(method, path, handler, options);
    }
}

impl<R: Router + ?Sized> Router for Arc<R> {
    fn register(&self, method: &str, path: &str, handler: BoxedHandler, options: Vec<Options>) {
        (**self).register(method, path, handler, options);
    }
}

/// Builds an [`Options`] map from key/value pairs.
///
/// ```rust,ignore
/// let opts = options([("protected", "true"), ("prefix", "/users")]);
/// ```
pub fn options<I, K, V>(pairs: I) -> Options
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}

/// Flattens a sequence of option maps into one. Later maps win.
pub fn merge_options(options: &[Options]) -> Options {
    options
        .iter()
        .flat_map(|map| map.iter())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

// ============================================================================
// OptionsRouter
// ============================================================================

/// A [`Router`] that prepends a fixed set of options to every registration.
///
/// Route groups hand one of these to their registration closure so that each
/// route inherits the group's options ahead of its own.
#[derive(Clone, Copy)]
pub struct OptionsRouter<'a> {
    inner: &'a dyn Router,
    options: &'a [Options],
}

impl<'a> OptionsRouter<'a> {
    /// Wraps `inner`, prepending `options` to each registration.
    pub fn new(inner: &'a dyn Router, options: &'a [Options]) -> Self {
        Self { inner, options }
    }

    /// The options prepended to every registration.
    pub fn options(&self) -> &'a [Options] {
        self.options
    }
}

impl Router for OptionsRouter<'_> {
    fn register(&self, method: &str, path: &str, handler: BoxedHandler, options: Vec<Options>) {
        let mut combined = Vec::with_capacity(self.options.len() + options.len());
        combined.extend_from_slice(self.options);
        combined.extend(options);

        trace!(
            method,
            path,
            group_options = self.options.len(),
            "Forwarding route with group options"
        );
        self.inner.register(method, path, handler, combined);
    }
}

impl std::fmt::Debug for OptionsRouter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptionsRouter")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::context::Context;
    use crate::error::BindError;
    use crate::handler::into_handler;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(String, String, Vec<Options>)>>,
    }

    impl Router for Recorder {
        fn register(&self, method: &str, path: &str, _: BoxedHandler, options: Vec<Options>) {
            self.calls
                .lock()
                .push((method.to_string(), path.to_string(), options));
        }
    }

    fn noop() -> BoxedHandler {
        into_handler(|_ctx: Context, (): ()| async { Ok::<_, BindError>(()) })
    }

    #[test]
    fn test_merge_later_wins() {
        let merged = merge_options(&[
            options([("x", "0"), ("y", "2")]),
            options([("x", "1")]),
        ]);
        assert_eq!(merged, options([("x", "1"), ("y", "2")]));
        assert!(merge_options(&[]).is_empty());
    }

    #[test]
    fn test_decorator_prepends_group_options() {
        let recorder = Recorder::default();
        let group = [options([("x", "0"), ("y", "2")])];
        let router = OptionsRouter::new(&recorder, &group);

        router.register("GET", "/a", noop(), vec![options([("x", "1")])]);

        let calls = recorder.calls.lock();
        assert_eq!(calls.len(), 1);
        let (method, path, opts) = &calls[0];
        assert_eq!((method.as_str(), path.as_str()), ("GET", "/a"));
        assert_eq!(opts.len(), 2);
        assert_eq!(opts[0], group[0]);
        assert_eq!(merge_options(opts), options([("x", "1"), ("y", "2")]));
    }

    #[test]
    fn test_decorator_without_options() {
        let recorder = Recorder::default();
        let router = OptionsRouter::new(&recorder, &[]);

        router.register("POST", "/b", noop(), Vec::new());

        assert!(recorder.calls.lock()[0].2.is_empty());
    }

    #[test]
    fn test_shared_router_forwards() {
        let recorder = Arc::new(Recorder::default());
        let shared: Arc<dyn Router> = recorder.clone();

        shared.register("DELETE", "/c", noop(), Vec::new());
        (&*shared).register("PUT", "/d", noop(), Vec::new());

        assert_eq!(recorder.calls.lock().len(), 2);
    }
}
