//! The handler contract and the generic adapter that implements it.
//!
//! Business code writes ordinary async functions:
//!
//! ```rust,ignore
//! async fn get_user(ctx: Context, params: GetUser) -> Result<User, ServiceError> {
//!     // ...
//! }
//! ```
//!
//! [`HandlerFn`] erases such a function behind the [`Handler`] trait so that a
//! router can store it next to functions of every other shape. Before calling
//! the function, the adapter asks the router-supplied [`Resolve`] to fill a
//! fresh parameter value; if that fails, the function never runs.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::future::{self, BoxFuture};
use futures::{FutureExt, TryFutureExt};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::context::Context;
use crate::error::BoxError;
use crate::payload::Payload;
use crate::resolve::{Resolve, Slot};

/// Future returned by [`Handler::invoke`].
pub type HandlerFuture = BoxFuture<'static, Result<Box<dyn Payload>, BoxError>>;

// ============================================================================
// Handler Trait
// ============================================================================

/// A type-erased request handler.
///
/// Routers only ever see this trait. [`params`](Handler::params) and
/// [`response`](Handler::response) return the zero value of the declared
/// parameter and response types so that routers can introspect a route
/// without calling it.
pub trait Handler: Send + Sync {
    /// Resolves parameters through `resolve` and runs the business function.
    ///
    /// Resolution happens before this method returns; the returned future
    /// only drives the business function.
    fn invoke(&self, ctx: Context, resolve: &dyn Resolve) -> HandlerFuture;

    /// Zero value of the declared parameter type.
    fn params(&self) -> Box<dyn Payload>;

    /// Zero value of the declared response type.
    fn response(&self) -> Box<dyn Payload>;
}

/// A shared, type-erased handler as stored by routers.
pub type BoxedHandler = Arc<dyn Handler>;

// ============================================================================
// HandlerFn - the generic adapter
// ============================================================================

type ErasedFn<P, R> = dyn Fn(Context, P) -> BoxFuture<'static, Result<R, BoxError>> + Send + Sync;

/// Adapts `async fn(Context, P) -> Result<R, E>` to [`Handler`].
pub struct HandlerFn<P, R> {
    f: Arc<ErasedFn<P, R>>,
    _marker: PhantomData<fn(P) -> R>,
}

impl<P, R> HandlerFn<P, R>
where
    P: DeserializeOwned + Serialize + Default + Send + Sync + 'static,
    R: Serialize + Default + Send + Sync + 'static,
{
    /// Wraps a business function.
    pub fn new<F, Fut, E>(f: F) -> Self
    where
        F: Fn(Context, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        let f = move |ctx: Context, params: P| -> BoxFuture<'static, Result<R, BoxError>> {
            f(ctx, params).map_err(Into::<BoxError>::into).boxed()
        };
        Self {
            f: Arc::new(f),
            _marker: PhantomData,
        }
    }
}

impl<P, R> Clone for HandlerFn<P, R> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
            _marker: PhantomData,
        }
    }
}

impl<P, R> Handler for HandlerFn<P, R>
where
    P: DeserializeOwned + Serialize + Default + Send + Sync + 'static,
    R: Serialize + Default + Send + Sync + 'static,
{
    fn invoke(&self, ctx: Context, resolve: &dyn Resolve) -> HandlerFuture {
        let mut params = Some(P::default());
        if let Err(err) = resolve.resolve(&mut Slot::decodable(&mut params)) {
            return future::ready(Err(err)).boxed();
        }

        let fut = (self.f)(ctx, params.unwrap_or_default());
        async move { fut.await.map(|response| Box::new(response) as Box<dyn Payload>) }.boxed()
    }

    fn params(&self) -> Box<dyn Payload> {
        Box::new(P::default())
    }

    fn response(&self) -> Box<dyn Payload> {
        Box::new(R::default())
    }
}

impl<P, R> std::fmt::Debug for HandlerFn<P, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerFn")
            .field("params", &std::any::type_name::<P>())
            .field("response", &std::any::type_name::<R>())
            .finish_non_exhaustive()
    }
}

/// Converts a business function into a shared [`BoxedHandler`].
pub fn into_handler<P, R, F, Fut, E>(f: F) -> BoxedHandler
where
    P: DeserializeOwned + Serialize + Default + Send + Sync + 'static,
    R: Serialize + Default + Send + Sync + 'static,
    F: Fn(Context, P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    E: Into<BoxError> + 'static,
{
    Arc::new(HandlerFn::new(f))
}
