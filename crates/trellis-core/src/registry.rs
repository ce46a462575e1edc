//! The group registry.
//!
//! Modules declare their route groups independently, typically during
//! start-up, and append them to a shared [`Groups`]. Once the router and the
//! resolver exist, [`Groups::bind_all`] binds every group in insertion order.

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::BoxError;
use crate::group::Binder;
use crate::resolve::Resolve;
use crate::router::Router;

/// An ordered, thread-safe collection of [`Binder`]s.
///
/// Appends may happen from any thread and at any time, including after an
/// earlier [`bind_all`](Groups::bind_all). The registry itself implements
/// [`Binder`], so registries can be nested.
///
/// # Deadlocks
///
/// The internal lock is held for the whole of `bind_all`. A group whose
/// registration closure calls back into the *same* registry
/// (`register`, `register_all`, `bind_all`, `len`) will deadlock. `Debug`
/// does not take the lock and prints `<locked>` while a bind is running.
///
/// # Partial failure
///
/// `bind_all` stops at the first failing group. Groups bound before it stay
/// registered with the router; there is no rollback. Treat an error as fatal
/// for the router it was bound against.
#[derive(Default)]
pub struct Groups {
    groups: Mutex<Vec<Box<dyn Binder>>>,
}

impl Groups {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one group.
    pub fn register(&self, group: impl Binder + 'static) -> &Self {
        self.groups.lock().push(Box::new(group));
        self
    }

    /// Appends several groups as one contiguous batch.
    ///
    /// The iterator is drained before the lock is taken, so concurrent
    /// appends never interleave with the batch.
    pub fn register_all<I, B>(&self, groups: I) -> &Self
    where
        I: IntoIterator<Item = B>,
        B: Binder + 'static,
    {
        let batch: Vec<Box<dyn Binder>> = groups
            .into_iter()
            .map(|group| Box::new(group) as Box<dyn Binder>)
            .collect();
        self.groups.lock().extend(batch);
        self
    }

    /// Number of registered groups.
    pub fn len(&self) -> usize {
        self.groups.lock().len()
    }

    /// Returns `true` if no group has been registered.
    pub fn is_empty(&self) -> bool {
        self.groups.lock().is_empty()
    }

    /// Binds every group, in insertion order, against `router` and `resolve`.
    ///
    /// Returns the first error unchanged. Groups after the failing one are
    /// not attempted.
    pub fn bind_all(&self, router: &dyn Router, resolve: &dyn Resolve) -> Result<(), BoxError> {
        let groups = self.groups.lock();
        debug!(groups = groups.len(), "Binding route groups");

        for (index, group) in groups.iter().enumerate() {
            if let Err(err) = group.bind(router, resolve) {
                warn!(
                    index,
                    total = groups.len(),
                    error = %err,
                    "Route group failed to bind, earlier groups stay registered"
                );
                return Err(err);
            }
        }

        debug!(groups = groups.len(), "All route groups bound");
        Ok(())
    }
}

impl Binder for Groups {
    fn bind(&self, router: &dyn Router, resolve: &dyn Resolve) -> Result<(), BoxError> {
        self.bind_all(router, resolve)
    }
}

impl std::fmt::Debug for Groups {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = f.debug_struct("Groups");
        match self.groups.try_lock() {
            Some(groups) => out.field("len", &groups.len()),
            None => out.field("len", &format_args!("<locked>")),
        };
        out.finish()
    }
}
