use crate::builder::DispatcherBuilder;
use crate::capability::{Capabilities, Subscriber};
use crate::error::{DispatchError, DispatchErrorExt, panic_message};
use crate::event::Event;
use crate::priority::{
    Priority, PriorityOrder, PrioritySource, SortStrategy, default_priority_order,
    default_sort_strategy,
};
use crate::registry::{Registry, Snapshot};
use crate::store::{Local, Sealed, Shared, State, Store};
use crate::subscription::{CategoryId, ListenerId, Subscription};
use std::cmp::Ordering;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::{debug, error, trace};

/// Receives every failure caught at the dispatch boundary.
pub type ErrorHandler = dyn Fn(DispatchError) + Send + Sync;

/// Pluggable behavior of a dispatcher.
#[derive(Clone)]
pub(crate) struct Hooks {
    pub(crate) order: Arc<PriorityOrder>,
    pub(crate) sort: Arc<SortStrategy>,
    pub(crate) on_error: Arc<ErrorHandler>,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            order: Arc::new(default_priority_order),
            sort: Arc::new(default_sort_strategy),
            on_error: Arc::new(log_error),
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks").finish_non_exhaustive()
    }
}

/// Default error handler: reports the failure through `tracing`.
pub fn log_error(err: DispatchError) {
    error!(
        category = err.context_str().unwrap_or("unknown"),
        error = %err,
        "Event dispatch failed; remaining listeners skipped"
    );
}

/// How a single post call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The event was already aborted when posted. Nobody was invoked.
    Aborted,
    /// The category has no subscribers.
    NoSubscribers,
    /// A listener aborted the event; `invoked` includes that listener.
    Stopped { invoked: usize },
    /// Every subscribed listener was invoked.
    Done { invoked: usize },
}

impl Delivery {
    /// Number of listeners that ran to completion.
    #[must_use]
    pub const fn invoked(&self) -> usize {
        match self {
            Self::Aborted | Self::NoSubscribers => 0,
            Self::Stopped { invoked } | Self::Done { invoked } => *invoked,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reorder {
    Always,
    Cached,
}

enum Pending {
    Ready(Snapshot),
    Unsorted {
        members: Vec<Arc<Subscription>>,
        generation: u64,
        order: Arc<PriorityOrder>,
        sort: Arc<SortStrategy>,
    },
}

/// A synchronous, priority-ordered event dispatcher.
///
/// Listeners register under a category type `L` (usually a trait object) and
/// receive every [`Event`] whose `Listener` is `L`, highest priority first.
/// Delivery happens on the caller's thread and stops early when the event
/// aborts or a listener fails. Failures go to the error handler, never to the
/// publisher.
///
/// Use [`EventDispatcher`] when the dispatcher is shared between threads and
/// [`LocalDispatcher`] otherwise.
///
/// # Examples
///
/// ```rust
/// use herald_events::{Breakable, Event, EventDispatcher, ListenerResult, Priority};
/// use std::sync::Arc;
///
/// trait ChatListener: Send + Sync {
///     fn on_chat(&self, event: &mut ChatEvent) -> ListenerResult;
/// }
///
/// struct ChatEvent {
///     message: String,
///     flow: Breakable,
/// }
///
/// impl Event for ChatEvent {
///     type Listener = dyn ChatListener;
///
///     fn call(&mut self, listener: &dyn ChatListener) -> ListenerResult {
///         listener.on_chat(self)
///     }
///
///     fn is_abort(&self) -> bool {
///         self.flow.is_abort()
///     }
/// }
///
/// struct Filter;
/// impl ChatListener for Filter {
///     fn on_chat(&self, event: &mut ChatEvent) -> ListenerResult {
///         if event.message.contains("spam") {
///             event.flow.stop_handling();
///         }
///         Ok(())
///     }
/// }
///
/// let dispatcher = EventDispatcher::new();
/// dispatcher.subscribe_with_priority::<dyn ChatListener>(Arc::new(Filter), Priority::HIGHEST);
///
/// let event = dispatcher.post(ChatEvent { message: "spam".into(), flow: Breakable::new() });
/// assert!(event.flow.is_abort());
/// ```
#[derive(Debug)]
pub struct Dispatcher<S: Store = Shared> {
    store: S,
}

/// Thread-safe dispatcher.
pub type EventDispatcher = Dispatcher<Shared>;

/// Single-threaded dispatcher. `!Sync`: the compiler rejects sharing it.
pub type LocalDispatcher = Dispatcher<Local>;

impl<S: Store> Default for Dispatcher<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Store> Dispatcher<S> {
    /// Creates an empty dispatcher with the default hooks.
    #[must_use]
    pub fn new() -> Self {
        Self::from_hooks(Hooks::default())
    }

    /// Returns a builder to configure the hooks before first use.
    #[must_use = "The builder must be configured before it can be used to build the dispatcher."]
    pub fn builder() -> DispatcherBuilder<S> {
        DispatcherBuilder::new()
    }

    pub(crate) fn from_hooks(hooks: Hooks) -> Self {
        Self { store: S::from_state(State { registry: Registry::default(), hooks }) }
    }

    /// Subscribes `listener` to category `L` with [`Priority::NONE`].
    pub fn subscribe<L>(&self, listener: Arc<L>) -> ListenerId
    where
        L: ?Sized + Send + Sync + 'static,
    {
        self.subscribe_subscription(Subscription::new::<L>(listener, Priority::NONE))
    }

    /// Subscribes `listener` to category `L` with a fixed priority.
    pub fn subscribe_with_priority<L>(&self, listener: Arc<L>, priority: i32) -> ListenerId
    where
        L: ?Sized + Send + Sync + 'static,
    {
        self.subscribe_subscription(Subscription::new::<L>(listener, priority))
    }

    /// Subscribes `listener` to category `L` with a priority evaluated at ordering time.
    pub fn subscribe_with_supplier<L>(
        &self,
        listener: Arc<L>,
        supplier: impl Fn() -> i32 + Send + Sync + 'static,
    ) -> ListenerId
    where
        L: ?Sized + Send + Sync + 'static,
    {
        self.subscribe_subscription(Subscription::new::<L>(
            listener,
            PrioritySource::dynamic(supplier),
        ))
    }

    /// Inserts a prepared subscription.
    ///
    /// Subscribing the same listener to the same category again replaces the
    /// previous subscription: last subscribe wins, and the listener moves behind
    /// the others of equal priority.
    ///
    /// The returned id stays valid while the listener is subscribed to at least
    /// one category. Once it has left every category the id matches nothing.
    pub fn subscribe_subscription(&self, subscription: Subscription) -> ListenerId {
        let category = subscription.category();
        let (id, replaced) = self.store.write(|state| state.registry.insert(subscription));
        debug!(
            category = category.name(),
            listener = ?id,
            replaced = replaced.is_some(),
            "Listener subscribed"
        );
        // Dropped outside the lock: a listener destructor may re-enter the dispatcher.
        drop(replaced);
        id
    }

    /// Subscribes `listener` to every category it declares, with [`Priority::NONE`].
    ///
    /// Returns the number of declared categories. A listener declaring none is
    /// silently ignored.
    pub fn subscribe_all<T: Subscriber>(&self, listener: Arc<T>) -> usize {
        self.subscribe_all_with(listener, PrioritySource::default())
    }

    /// Like [`Dispatcher::subscribe_all`] with an explicit priority source shared
    /// by every declared category.
    pub fn subscribe_all_with<T: Subscriber>(
        &self,
        listener: Arc<T>,
        priority: impl Into<PrioritySource>,
    ) -> usize {
        let id = ListenerId::of(&listener);
        let mut capabilities = Capabilities::new(priority.into());
        listener.capabilities(&mut capabilities);

        if capabilities.is_empty() {
            trace!(
                listener = std::any::type_name::<T>(),
                "Listener declares no categories; nothing subscribed"
            );
            return 0;
        }

        let count = capabilities.len();
        let subscriptions = capabilities.into_subscriptions();
        let replaced: Vec<_> = self.store.write(|state| {
            subscriptions.into_iter().filter_map(|s| state.registry.insert(s).1).collect()
        });
        debug!(
            listener = std::any::type_name::<T>(),
            id = ?id,
            categories = count,
            replaced = replaced.len(),
            "Listener subscribed to all declared categories"
        );
        drop(replaced);
        count
    }

    /// Removes `listener` from category `L`. Returns `false` if it was not subscribed.
    pub fn unsubscribe<L: ?Sized + 'static>(&self, listener: impl Into<ListenerId>) -> bool {
        let id = listener.into();
        let category = CategoryId::of::<L>();
        let removed = self.store.write(|state| state.registry.remove(category, id));
        if removed.is_some() {
            debug!(category = category.name(), listener = ?id, "Listener unsubscribed");
        }
        removed.is_some()
    }

    /// Removes `listener` from every category. Returns how many subscriptions were removed.
    pub fn unsubscribe_all(&self, listener: impl Into<ListenerId>) -> usize {
        let id = listener.into();
        let removed = self.store.write(|state| state.registry.remove_listener(id));
        if !removed.is_empty() {
            debug!(listener = ?id, categories = removed.len(), "Listener unsubscribed everywhere");
        }
        removed.len()
    }

    /// Removes category `L` with all of its subscriptions.
    pub fn unsubscribe_category<L: ?Sized + 'static>(&self) -> bool {
        let category = CategoryId::of::<L>();
        let removed = self.store.write(|state| state.registry.remove_category(category));
        if let Some(roster) = &removed {
            debug!(category = category.name(), listeners = roster.len(), "Category removed");
        }
        removed.is_some()
    }

    /// Removes every category. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let removed = self.store.write(|state| state.registry.clear());
        debug!(categories = removed.len(), "Dispatcher cleared");
        removed.len()
    }

    /// Whether category `L` has at least one subscription.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use herald_events::EventDispatcher;
    /// use std::sync::Arc;
    ///
    /// type Hook = dyn Fn() + Send + Sync;
    ///
    /// let dispatcher = EventDispatcher::new();
    /// assert!(!dispatcher.has_subscribers::<Hook>());
    ///
    /// let id = dispatcher.subscribe::<Hook>(Arc::new(|| {}));
    /// assert!(dispatcher.has_subscribers::<Hook>());
    ///
    /// dispatcher.unsubscribe::<Hook>(id);
    /// assert!(!dispatcher.has_subscribers::<Hook>());
    /// ```
    #[must_use]
    pub fn has_subscribers<L: ?Sized + 'static>(&self) -> bool {
        let category = CategoryId::of::<L>();
        self.store.read(|state| state.registry.contains_category(category))
    }

    /// Whether `listener` is subscribed to category `L`.
    ///
    /// Accepts a live `&Arc` or an id returned by a subscribe call; a stale id
    /// from a registration that has since ended reports `false`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use herald_events::EventDispatcher;
    /// use std::sync::Arc;
    ///
    /// type Hook = dyn Fn() + Send + Sync;
    ///
    /// let dispatcher = EventDispatcher::new();
    /// let hook: Arc<Hook> = Arc::new(|| {});
    /// let id = dispatcher.subscribe::<Hook>(hook.clone());
    ///
    /// assert!(dispatcher.has_listener::<Hook>(id));
    /// assert!(dispatcher.has_listener::<Hook>(&hook));
    /// ```
    #[must_use]
    pub fn has_listener<L: ?Sized + 'static>(&self, listener: impl Into<ListenerId>) -> bool {
        let id = listener.into();
        let category = CategoryId::of::<L>();
        self.store.read(|state| state.registry.contains(category, id))
    }

    /// Number of subscriptions in category `L`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use herald_events::EventDispatcher;
    /// use std::sync::Arc;
    ///
    /// type Hook = dyn Fn() + Send + Sync;
    ///
    /// let dispatcher = EventDispatcher::new();
    /// dispatcher.subscribe::<Hook>(Arc::new(|| {}));
    /// dispatcher.subscribe::<Hook>(Arc::new(|| {}));
    /// assert_eq!(dispatcher.subscriber_count::<Hook>(), 2);
    /// ```
    #[must_use]
    pub fn subscriber_count<L: ?Sized + 'static>(&self) -> usize {
        let category = CategoryId::of::<L>();
        self.store.read(|state| state.registry.get(category).map_or(0, |roster| roster.len()))
    }

    /// Number of categories with at least one subscription.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use herald_events::EventDispatcher;
    /// use std::sync::Arc;
    ///
    /// let dispatcher = EventDispatcher::new();
    /// dispatcher.subscribe::<dyn Fn() + Send + Sync>(Arc::new(|| {}));
    /// dispatcher.subscribe::<dyn Fn(u8) + Send + Sync>(Arc::new(|_: u8| {}));
    /// assert_eq!(dispatcher.category_count(), 2);
    /// ```
    #[must_use]
    pub fn category_count(&self) -> usize {
        self.store.read(|state| state.registry.category_count())
    }

    /// Replaces the comparator used to order subscriptions. Invalidates cached orders.
    pub fn set_priority_order(
        &self,
        order: impl Fn(&Subscription, &Subscription) -> Ordering + Send + Sync + 'static,
    ) {
        let order: Arc<PriorityOrder> = Arc::new(order);
        let previous = self.store.write(|state| {
            state.registry.invalidate_orders();
            std::mem::replace(&mut state.hooks.order, order)
        });
        drop(previous);
        debug!("Priority order replaced");
    }

    /// Replaces the sort strategy. Invalidates cached orders.
    ///
    /// The snapshot handed to the strategy is in subscribe order; a stable
    /// strategy keeps equal priorities in that order.
    pub fn set_sort_strategy(
        &self,
        sort: impl Fn(&mut [Arc<Subscription>], &PriorityOrder) + Send + Sync + 'static,
    ) {
        let sort: Arc<SortStrategy> = Arc::new(sort);
        let previous = self.store.write(|state| {
            state.registry.invalidate_orders();
            std::mem::replace(&mut state.hooks.sort, sort)
        });
        drop(previous);
        debug!("Sort strategy replaced");
    }

    /// Replaces the handler receiving failures caught by [`Dispatcher::post`].
    pub fn set_error_handler(&self, handler: impl Fn(DispatchError) + Send + Sync + 'static) {
        let handler: Arc<ErrorHandler> = Arc::new(handler);
        let previous =
            self.store.write(|state| std::mem::replace(&mut state.hooks.on_error, handler));
        drop(previous);
        debug!("Error handler replaced");
    }

    /// Delivers `event` to every listener of its category, re-evaluating priorities.
    ///
    /// Returns the same event so callers can inspect what listeners did to it.
    /// A failing listener stops delivery; the failure goes to the error handler.
    pub fn post<E: Event>(&self, mut event: E) -> E {
        self.deliver(&mut event, Reorder::Always);
        event
    }

    /// Like [`Dispatcher::post`], but reuses the order computed on the first
    /// dispatch after the category last changed.
    ///
    /// Dynamic priority suppliers are not re-evaluated until the category changes.
    pub fn post_cached<E: Event>(&self, mut event: E) -> E {
        self.deliver(&mut event, Reorder::Cached);
        event
    }

    /// Delivers `event` without the error boundary.
    ///
    /// # Errors
    /// Returns the first listener failure (error or panic) or a panic raised
    /// while ordering subscriptions. The error handler is not called.
    pub fn try_post<E: Event>(&self, event: &mut E) -> Result<Delivery, DispatchError> {
        self.dispatch(event, Reorder::Always)
    }

    /// Cached-order variant of [`Dispatcher::try_post`].
    ///
    /// # Errors
    /// See [`Dispatcher::try_post`].
    pub fn try_post_cached<E: Event>(&self, event: &mut E) -> Result<Delivery, DispatchError> {
        self.dispatch(event, Reorder::Cached)
    }

    fn deliver<E: Event>(&self, event: &mut E, reorder: Reorder) {
        if let Err(err) = self.dispatch(event, reorder) {
            let handler = self.store.read(|state| Arc::clone(&state.hooks.on_error));
            handler(err);
        }
    }

    fn dispatch<E: Event>(&self, event: &mut E, reorder: Reorder) -> Result<Delivery, DispatchError> {
        let category = CategoryId::of::<E::Listener>();

        if event.is_abort() {
            trace!(category = category.name(), "Event already aborted; not dispatched");
            return Ok(Delivery::Aborted);
        }

        let Some(snapshot) = self.ordered(category, reorder)? else {
            trace!(category = category.name(), "Event dropped: no subscribers");
            return Ok(Delivery::NoSubscribers);
        };

        let mut invoked = 0;
        for subscription in snapshot.iter() {
            let listener = subscription.listener::<E::Listener>().ok_or_else(|| {
                DispatchError::TypeMismatch {
                    message: format!("{:?} stored under {}", subscription.category(), category.name())
                        .into(),
                    context: None,
                }
            })?;

            match catch_unwind(AssertUnwindSafe(|| event.call(&**listener))) {
                Ok(result) => result.context(category.name())?,
                Err(payload) => {
                    return Err(DispatchError::Panicked {
                        message: panic_message(payload.as_ref()),
                        context: Some(category.name().into()),
                    });
                },
            }

            invoked += 1;
            if event.is_abort() {
                trace!(
                    category = category.name(),
                    invoked,
                    skipped = snapshot.len() - invoked,
                    "Event aborted by listener"
                );
                return Ok(Delivery::Stopped { invoked });
            }
        }

        trace!(category = category.name(), invoked, "Event dispatched");
        Ok(Delivery::Done { invoked })
    }

    /// Snapshot of the category in dispatch order, or `None` without subscribers.
    ///
    /// User ordering code (suppliers, comparator, sort strategy) runs outside the store.
    fn ordered(
        &self,
        category: CategoryId,
        reorder: Reorder,
    ) -> Result<Option<Snapshot>, DispatchError> {
        let pending = self.store.read(|state| {
            let roster = state.registry.get(category).filter(|roster| !roster.is_empty())?;
            if reorder == Reorder::Cached
                && let Some(cached) = roster.cached()
            {
                return Some(Pending::Ready(cached));
            }
            Some(Pending::Unsorted {
                members: roster.in_subscribe_order(),
                generation: roster.generation(),
                order: Arc::clone(&state.hooks.order),
                sort: Arc::clone(&state.hooks.sort),
            })
        });

        let (mut members, generation, order, sort) = match pending {
            None => return Ok(None),
            Some(Pending::Ready(snapshot)) => return Ok(Some(snapshot)),
            Some(Pending::Unsorted { members, generation, order, sort }) => {
                (members, generation, order, sort)
            },
        };

        catch_unwind(AssertUnwindSafe(|| sort(members.as_mut_slice(), &*order))).map_err(|payload| {
            DispatchError::Panicked {
                message: panic_message(payload.as_ref()),
                context: Some(format!("ordering {}", category.name()).into()),
            }
        })?;

        let snapshot: Snapshot = members.into();
        if reorder == Reorder::Cached {
            let cached = self
                .store
                .write(|state| state.registry.cache_order(category, generation, Arc::clone(&snapshot)));
            trace!(category = category.name(), cached, "Subscription order computed");
        }
        Ok(Some(snapshot))
    }
}
