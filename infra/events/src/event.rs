use crate::error::ListenerResult;
use std::fmt;
use std::marker::PhantomData;

/// A payload that can be posted through a [`crate::Dispatcher`].
///
/// An event targets exactly one listener category (`Self::Listener`) and knows
/// how to invoke itself against one listener of that category.
///
/// # Examples
///
/// ```rust
/// use herald_events::{Breakable, Event, ListenerResult};
///
/// trait KeyListener: Send + Sync {
///     fn on_key(&self, event: &mut KeyPressed) -> ListenerResult;
/// }
///
/// struct KeyPressed {
///     code: u32,
///     flow: Breakable,
/// }
///
/// impl Event for KeyPressed {
///     type Listener = dyn KeyListener;
///
///     fn call(&mut self, listener: &dyn KeyListener) -> ListenerResult {
///         listener.on_key(self)
///     }
///
///     fn is_abort(&self) -> bool {
///         self.flow.is_abort()
///     }
/// }
/// ```
pub trait Event {
    /// The listener category this event is routed to.
    type Listener: ?Sized + Send + Sync + 'static;

    /// Invokes this event against a single listener.
    ///
    /// # Errors
    /// Any error stops delivery of this event and is forwarded to the error handler.
    fn call(&mut self, listener: &Self::Listener) -> ListenerResult;

    /// Whether delivery should stop before the next listener.
    ///
    /// Non-abortable events keep the default.
    fn is_abort(&self) -> bool {
        false
    }
}

/// Stop-propagation flag for abortable events.
///
/// Once stopped it stays stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Breakable {
    abort: bool,
}

impl Breakable {
    #[must_use]
    pub const fn new() -> Self {
        Self { abort: false }
    }

    /// A flag that is already stopped. Posting an event carrying it invokes nobody.
    #[must_use]
    pub const fn stopped() -> Self {
        Self { abort: true }
    }

    /// Stops delivery after the current listener returns.
    pub const fn stop_handling(&mut self) {
        self.abort = true;
    }

    #[must_use]
    pub const fn is_abort(&self) -> bool {
        self.abort
    }
}

/// Veto flag. Independent from [`Breakable`]: cancelling does not stop
/// propagation, so later listeners still see (and may reverse) the veto.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cancellable {
    cancelled: bool,
}

impl Cancellable {
    #[must_use]
    pub const fn new() -> Self {
        Self { cancelled: false }
    }

    pub const fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub const fn set_cancelled(&mut self, cancelled: bool) {
        self.cancelled = cancelled;
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// An event whose invocation behavior is a closure captured at construction.
///
/// The closure receives the listener and the event's [`Breakable`] flag.
///
/// # Examples
///
/// ```rust
/// use herald_events::{EventDispatcher, FnEvent};
/// use std::sync::Arc;
///
/// type Tick = dyn Fn(u64) + Send + Sync;
///
/// let dispatcher = EventDispatcher::new();
/// dispatcher.subscribe::<Tick>(Arc::new(|n: u64| assert_eq!(n, 3)));
///
/// let event = dispatcher.post(FnEvent::<Tick, _>::new(|listener, _flow| {
///     listener(3);
///     Ok(())
/// }));
/// assert!(!event.is_abort());
/// ```
pub struct FnEvent<L: ?Sized, F> {
    invoke: F,
    flow: Breakable,
    _category: PhantomData<fn(&L)>,
}

impl<L, F> FnEvent<L, F>
where
    L: ?Sized + Send + Sync + 'static,
    F: FnMut(&L, &mut Breakable) -> ListenerResult,
{
    pub const fn new(invoke: F) -> Self {
        Self { invoke, flow: Breakable::new(), _category: PhantomData }
    }

    #[must_use]
    pub const fn is_abort(&self) -> bool {
        self.flow.is_abort()
    }

    /// Stops the event before it is posted.
    pub const fn stop_handling(&mut self) {
        self.flow.stop_handling();
    }
}

impl<L, F> Event for FnEvent<L, F>
where
    L: ?Sized + Send + Sync + 'static,
    F: FnMut(&L, &mut Breakable) -> ListenerResult,
{
    type Listener = L;

    fn call(&mut self, listener: &L) -> ListenerResult {
        (self.invoke)(listener, &mut self.flow)
    }

    fn is_abort(&self) -> bool {
        self.flow.is_abort()
    }
}

impl<L: ?Sized, F> fmt::Debug for FnEvent<L, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnEvent")
            .field("category", &std::any::type_name::<L>())
            .field("flow", &self.flow)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breakable_is_monotonic() {
        let mut flow = Breakable::new();
        assert!(!flow.is_abort());
        flow.stop_handling();
        flow.stop_handling();
        assert!(flow.is_abort());
        assert!(Breakable::stopped().is_abort());
    }

    #[test]
    fn test_cancel_does_not_stop_propagation() {
        let mut veto = Cancellable::new();
        let flow = Breakable::new();
        veto.cancel();
        assert!(veto.is_cancelled());
        assert!(!flow.is_abort());

        veto.set_cancelled(false);
        assert!(!veto.is_cancelled());
    }

    #[test]
    fn test_fn_event_invokes_closure() {
        type Counter = dyn Fn() -> u32 + Send + Sync;

        let mut seen = 0;
        let mut event = FnEvent::<Counter, _>::new(|listener, flow| {
            seen += listener();
            flow.stop_handling();
            Ok(())
        });

        let listener: &Counter = &|| 5;
        event.call(listener).unwrap();
        assert!(Event::is_abort(&event));
        drop(event);
        assert_eq!(seen, 5);
    }
}
