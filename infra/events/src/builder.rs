use crate::dispatcher::{Dispatcher, Hooks};
use crate::error::DispatchError;
use crate::priority::PriorityOrder;
use crate::store::{Shared, Store};
use crate::subscription::Subscription;
use std::cmp::Ordering;
use std::marker::PhantomData;
use std::sync::Arc;

/// A builder for configuring a [`Dispatcher`] before it is shared.
///
/// Unset hooks keep their defaults: highest priority first with `FIRST` /
/// `MONITOR` sentinels, a stable sort, and an error handler that logs via `tracing`.
///
/// # Examples
///
/// ```rust
/// use herald_events::EventDispatcher;
///
/// let dispatcher = EventDispatcher::builder()
///     .error_handler(|err| eprintln!("listener failed: {err}"))
///     .build();
/// assert_eq!(dispatcher.category_count(), 0);
/// ```
#[derive(Debug)]
pub struct DispatcherBuilder<S: Store = Shared> {
    hooks: Hooks,
    _store: PhantomData<S>,
}

impl<S: Store> Default for DispatcherBuilder<S> {
    fn default() -> Self {
        Self { hooks: Hooks::default(), _store: PhantomData }
    }
}

impl<S: Store> DispatcherBuilder<S> {
    #[must_use = "The builder must be configured before it can be used to build the dispatcher."]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the comparator used to order subscriptions.
    #[must_use = "The builder must be configured before it can be used to build the dispatcher."]
    pub fn priority_order(
        mut self,
        order: impl Fn(&Subscription, &Subscription) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        self.hooks.order = Arc::new(order);
        self
    }

    /// Sets the sort strategy. It receives a snapshot in subscribe order.
    #[must_use = "The builder must be configured before it can be used to build the dispatcher."]
    pub fn sort_strategy(
        mut self,
        sort: impl Fn(&mut [Arc<Subscription>], &PriorityOrder) + Send + Sync + 'static,
    ) -> Self {
        self.hooks.sort = Arc::new(sort);
        self
    }

    /// Sets the handler receiving failures caught by [`Dispatcher::post`].
    #[must_use = "The builder must be configured before it can be used to build the dispatcher."]
    pub fn error_handler(mut self, handler: impl Fn(DispatchError) + Send + Sync + 'static) -> Self {
        self.hooks.on_error = Arc::new(handler);
        self
    }

    /// Consumes the builder and creates the dispatcher.
    #[must_use]
    pub fn build(self) -> Dispatcher<S> {
        Dispatcher::from_hooks(self.hooks)
    }
}
