//! Route groups: routes that share one dependency and one set of options.
//!
//! A group is declared up front, usually at program start, without access to
//! its dependency. Only when the group is bound does the resolver supply the
//! dependency; the group then registers its routes through an
//! [`OptionsRouter`] so that each route inherits the group's options.

use std::any::Any;
use std::sync::Arc;

use tracing::trace;

use crate::error::{BindError, BoxError};
use crate::resolve::{Resolve, Slot};
use crate::router::{Options, OptionsRouter, Router};

/// Something that can register its routes once a router and a resolver are
/// known.
pub trait Binder: Send + Sync {
    /// Resolves whatever the binder needs and registers its routes.
    fn bind(&self, router: &dyn Router, resolve: &dyn Resolve) -> Result<(), BoxError>;
}

impl<B: Binder + ?Sized> Binder for Box<B> {
    fn bind(&self, router: &dyn Router, resolve: &dyn Resolve) -> Result<(), BoxError> {
        (**self).bind(router, resolve)
    }
}

impl<B: Binder + ?Sized> Binder for Arc<B> {
    fn bind(&self, router: &dyn Router, resolve: &dyn Resolve) -> Result<(), BoxError> {
        (**self).bind(router, resolve)
    }
}

type RegisterFn<D> = dyn Fn(&dyn Router, D) + Send + Sync;

/// A set of routes keyed to one dependency of type `D`.
pub struct RouteGroup<D> {
    register: Box<RegisterFn<D>>,
    options: Vec<Options>,
}

impl<D> RouteGroup<D> {
    /// Group-level options, in the order they were given.
    pub fn options(&self) -> &[Options] {
        &self.options
    }
}

impl<D: Any> Binder for RouteGroup<D> {
    fn bind(&self, router: &dyn Router, resolve: &dyn Resolve) -> Result<(), BoxError> {
        let mut dependency: Option<D> = None;
        resolve.resolve(&mut Slot::new(&mut dependency))?;
        let dependency =
            dependency.ok_or(BindError::Unresolved(std::any::type_name::<D>()))?;

        trace!(
            dependency = std::any::type_name::<D>(),
            options = self.options.len(),
            "Binding route group"
        );
        let router = OptionsRouter::new(router, &self.options);
        (self.register)(&router, dependency);
        Ok(())
    }
}

impl<D> std::fmt::Debug for RouteGroup<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteGroup")
            .field("dependency", &std::any::type_name::<D>())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Declares a route group without group options.
pub fn define_group<D, F>(f: F) -> RouteGroup<D>
where
    D: Any,
    F: Fn(&dyn Router, D) + Send + Sync + 'static,
{
    define_group_with(f, Vec::new())
}

/// Declares a route group whose routes all inherit `options`.
///
/// ```rust,ignore
/// let group = define_group_with(
///     |router, svc: Arc<dyn UserService>| { /* register(...) */ },
///     vec![options([("protected", "true")])],
/// );
/// ```
pub fn define_group_with<D, F>(f: F, options: Vec<Options>) -> RouteGroup<D>
where
    D: Any,
    F: Fn(&dyn Router, D) + Send + Sync + 'static,
{
    RouteGroup {
        register: Box::new(f),
        options,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::context::Context;
    use crate::handler::BoxedHandler;
    use crate::register::register;
    use crate::resolve::resolve_fn;
    use crate::router::{merge_options, options};

    #[derive(Default)]
    struct Recorder {
        routes: Mutex<Vec<(String, Options)>>,
    }

    impl Router for Recorder {
        fn register(&self, _: &str, path: &str, _: BoxedHandler, options: Vec<Options>) {
            self.routes
                .lock()
                .push((path.to_string(), merge_options(&options)));
        }
    }

    fn prefix_group() -> RouteGroup<String> {
        define_group_with(
            |router, prefix: String| {
                register(router, "GET", &format!("{prefix}/a"), |_: Context, (): ()| async {
                    Ok::<_, BindError>(())
                });
            },
            vec![options([("protected", "true")])],
        )
    }

    #[test]
    fn test_bind_registers_with_group_options() {
        let recorder = Recorder::default();
        let resolve = resolve_fn(|slot| {
            slot.fill("/v1".to_string())?;
            Ok(())
        });

        prefix_group().bind(&recorder, &resolve).unwrap();

        let routes = recorder.routes.lock();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].0, "/v1/a");
        assert_eq!(routes[0].1, options([("protected", "true")]));
    }

    #[test]
    fn test_resolver_error_registers_nothing() {
        let recorder = Recorder::default();
        let called = AtomicUsize::new(0);
        let group = define_group(|_router, _dep: u32| {});
        let resolve = resolve_fn(|_slot| {
            called.fetch_add(1, Ordering::SeqCst);
            Err(BindError::custom("no database").into())
        });

        let err = group.bind(&recorder, &resolve).unwrap_err();
        assert_eq!(err.to_string(), "no database");
        assert_eq!(called.load(Ordering::SeqCst), 1);
        assert!(recorder.routes.lock().is_empty());
    }

    #[test]
    fn test_unfilled_dependency() {
        let recorder = Recorder::default();
        let resolve = resolve_fn(|_slot| Ok(()));

        let err = prefix_group().bind(&recorder, &resolve).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BindError>(),
            Some(BindError::Unresolved(_))
        ));
        assert!(recorder.routes.lock().is_empty());
    }

    #[test]
    fn test_wrong_dependency_type() {
        let recorder = Recorder::default();
        let resolve = resolve_fn(|slot| {
            slot.fill(7u8)?;
            Ok(())
        });

        let err = prefix_group().bind(&recorder, &resolve).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BindError>(),
            Some(BindError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_group_options_are_kept() {
        let group = prefix_group();
        assert_eq!(group.options(), &[options([("protected", "true")])]);
    }
}
