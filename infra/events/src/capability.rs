use crate::priority::PrioritySource;
use crate::subscription::Subscription;
use std::sync::Arc;

/// A listener that declares every category it serves, for
/// [`crate::Dispatcher::subscribe_all`].
///
/// # Examples
///
/// ```rust
/// use herald_events::{Capabilities, EventDispatcher, Subscriber};
/// use std::sync::Arc;
///
/// trait OnOpen: Send + Sync {}
/// trait OnClose: Send + Sync {}
///
/// struct Audit;
/// impl OnOpen for Audit {}
/// impl OnClose for Audit {}
///
/// impl Subscriber for Audit {
///     fn capabilities(self: Arc<Self>, capabilities: &mut Capabilities) {
///         capabilities.serve::<dyn OnOpen>(self.clone()).serve::<dyn OnClose>(self);
///     }
/// }
///
/// let dispatcher = EventDispatcher::new();
/// assert_eq!(dispatcher.subscribe_all(Arc::new(Audit)), 2);
/// assert!(dispatcher.has_subscribers::<dyn OnClose>());
/// ```
pub trait Subscriber: Send + Sync + 'static {
    /// Registers `self` under each category it implements. Declaring nothing is allowed.
    fn capabilities(self: Arc<Self>, capabilities: &mut Capabilities);
}

/// Collects the categories declared by a [`Subscriber`].
#[derive(Debug)]
pub struct Capabilities {
    priority: PrioritySource,
    subscriptions: Vec<Subscription>,
}

impl Capabilities {
    pub(crate) const fn new(priority: PrioritySource) -> Self {
        Self { priority, subscriptions: Vec::new() }
    }

    /// Declares that `listener` serves category `L`.
    pub fn serve<L>(&mut self, listener: Arc<L>) -> &mut Self
    where
        L: ?Sized + Send + Sync + 'static,
    {
        self.subscriptions.push(Subscription::new::<L>(listener, self.priority.clone()));
        self
    }

    /// Number of categories declared so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub(crate) fn into_subscriptions(self) -> Vec<Subscription> {
        self.subscriptions
    }
}
