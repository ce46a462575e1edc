//! Registration helpers: the one-liners business code uses inside a group.

use std::future::Future;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::trace;

use crate::context::Context;
use crate::error::BoxError;
use crate::handler::into_handler;
use crate::router::{Options, Router};

/// Registers a typed business function under `method` and `path`.
///
/// Equivalent to [`register_with`] with no route options.
///
/// ```rust,ignore
/// define_group(|router, svc: Arc<dyn UserService>| {
///     register(router, "GET", "/users/:id", move |ctx, req: GetUser| {
///         let svc = svc.clone();
///         async move { svc.get(ctx, req).await }
///     });
/// })
/// ```
pub fn register<Rt, P, R, F, Fut, E>(router: &Rt, method: &str, path: &str, f: F)
where
    Rt: Router + ?Sized,
    P: DeserializeOwned + Serialize + Default + Send + Sync + 'static,
    R: Serialize + Default + Send + Sync + 'static,
    F: Fn(Context, P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    E: Into<BoxError> + 'static,
{
    register_with(router, method, path, f, Vec::new());
}

/// Registers a typed business function with route-level options.
///
/// The router receives `method`, `path` and `options` exactly as given.
pub fn register_with<Rt, P, R, F, Fut, E>(
    router: &Rt,
    method: &str,
    path: &str,
    f: F,
    options: Vec<Options>,
) where
    Rt: Router + ?Sized,
    P: DeserializeOwned + Serialize + Default + Send + Sync + 'static,
    R: Serialize + Default + Send + Sync + 'static,
    F: Fn(Context, P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    E: Into<BoxError> + 'static,
{
    trace!(
        method,
        path,
        params = std::any::type_name::<P>(),
        response = std::any::type_name::<R>(),
        "Registering route"
    );
    router.register(method, path, into_handler(f), options);
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use serde::Deserialize;

    use super::*;
    use crate::error::BindError;
    use crate::handler::BoxedHandler;
    use crate::router::options;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(String, String, Vec<Options>, BoxedHandler)>>,
    }

    impl Router for Recorder {
        fn register(&self, method: &str, path: &str, handler: BoxedHandler, options: Vec<Options>) {
            self.calls
                .lock()
                .push((method.to_string(), path.to_string(), options, handler));
        }
    }

    #[derive(Default, Serialize, Deserialize)]
    struct Ping {
        seq: u32,
    }

    #[derive(Default, Serialize)]
    struct Pong {
        seq: u32,
    }

    #[test]
    fn test_register_forwards_once() {
        let recorder = Recorder::default();
        let route_opts = vec![options([("rate", "10")])];

        register_with(
            &recorder,
            "get",
            "ping/:seq",
            |_ctx: Context, p: Ping| async move { Ok::<_, BindError>(Pong { seq: p.seq }) },
            route_opts.clone(),
        );

        let calls = recorder.calls.lock();
        assert_eq!(calls.len(), 1);
        let (method, path, opts, handler) = &calls[0];
        assert_eq!(method, "get");
        assert_eq!(path, "ping/:seq");
        assert_eq!(opts, &route_opts);
        assert!(handler.response().is::<Pong>());
    }

    #[test]
    fn test_register_without_options() {
        let recorder = Recorder::default();
        let router: &dyn Router = &recorder;

        register(router, "POST", "/ping", |_ctx: Context, _p: Ping| async {
            Ok::<_, BindError>(Pong::default())
        });

        let calls = recorder.calls.lock();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].2.is_empty());
        assert!(calls[0].3.params().is::<Ping>());
    }
}
