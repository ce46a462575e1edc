//! Request-scoped context handed to every business function.
//!
//! A [`Context`] carries three things from the router to the handler:
//!
//! - a [`CancellationToken`] the router may trigger when the caller goes away,
//! - an optional deadline,
//! - typed request-scoped values (request IDs, client addresses, …).
//!
//! The core never observes any of these. It only moves the context, unchanged,
//! from [`Handler::invoke`](crate::handler::Handler::invoke) into the business
//! function.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

/// Heterogeneous value map stored in a [`Context`].
type ValueMap = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

/// Cancellation, deadline and typed values for one invocation.
///
/// Cloning is cheap: the value map is shared and only copied when a clone
/// adds a value of its own.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone)]
/// struct RequestId(String);
///
/// let ctx = Context::new()
///     .with_timeout(Duration::from_secs(5))
///     .with_value(RequestId("req-1".into()));
///
/// assert_eq!(ctx.value::<RequestId>().unwrap().0, "req-1");
/// ```
#[derive(Clone, Default)]
pub struct Context {
    cancel: CancellationToken,
    deadline: Option<Instant>,
    values: Arc<ValueMap>,
}

impl Context {
    /// Creates an empty context with a fresh cancellation token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context driven by an existing cancellation token.
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            cancel: token,
            ..Self::default()
        }
    }

    /// Returns a context whose token is a child of this one.
    ///
    /// Cancelling the parent cancels the child, not the other way around.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
            values: Arc::clone(&self.values),
        }
    }

    // ─── Values ───────────────────────────────────────────────────────────────

    /// Attaches a typed value, replacing any earlier value of the same type.
    pub fn with_value<T: Any + Send + Sync>(mut self, value: T) -> Self {
        Arc::make_mut(&mut self.values).insert(TypeId::of::<T>(), Arc::new(value));
        self
    }

    /// Looks up a typed value.
    pub fn value<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    // ─── Deadline ─────────────────────────────────────────────────────────────

    /// Sets an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets a deadline relative to now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Returns the deadline, if one was set.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    // ─── Cancellation ─────────────────────────────────────────────────────────

    /// Returns the cancellation token of this context.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Signals cancellation to everyone holding this context or a child of it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns `true` once the context has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Completes when the context is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("cancelled", &self.is_cancelled())
            .field("deadline", &self.deadline)
            .field("values", &self.values.len())
            .finish_non_exhaustive()
    }
}
