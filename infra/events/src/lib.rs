//! # Event Dispatcher
//!
//! A synchronous, in-process publish/subscribe dispatcher with priority
//! ordering, early termination and listener fault isolation.
//!
//! ## Overview
//!
//! Listeners register under a *category*: any `?Sized + Send + Sync + 'static`
//! type, usually a listener trait object such as `dyn ClickListener`. An
//! [`Event`] names the category it targets and knows how to call one listener.
//! [`Dispatcher::post`] delivers the event to every listener of that category
//! on the caller's thread, highest priority first, and hands the event back.
//!
//! ## Features
//!
//! * **Priorities**: any `i32`, plus [`Priority::FIRST`] and [`Priority::MONITOR`]
//!   sentinels. Equal priorities run in subscribe order. Priorities may be
//!   re-evaluated at every dispatch ([`Dispatcher::subscribe_with_supplier`]).
//! * **Abort**: an event carrying a [`Breakable`] flag stops after the listener
//!   that called [`Breakable::stop_handling`]. [`Cancellable`] is an independent
//!   veto flag.
//! * **Fault isolation**: a listener returning `Err` or panicking ends that
//!   dispatch; the failure goes to the error handler, never to the publisher.
//! * **Two storage variants**: [`EventDispatcher`] (`parking_lot::RwLock`,
//!   `Send + Sync`) and [`LocalDispatcher`] (`RefCell`, single-threaded).
//! * **Re-entrant**: listeners may post, subscribe and unsubscribe while being
//!   invoked; no lock is held across user code.
//!
//! # Example
//!
//! ```rust
//! use herald_events::{Event, EventDispatcher, ListenerResult, Priority};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! trait LoginListener: Send + Sync {
//!     fn on_login(&self, user: &str) -> ListenerResult;
//! }
//!
//! struct Login(&'static str);
//!
//! impl Event for Login {
//!     type Listener = dyn LoginListener;
//!
//!     fn call(&mut self, listener: &dyn LoginListener) -> ListenerResult {
//!         listener.on_login(self.0)
//!     }
//! }
//!
//! #[derive(Default)]
//! struct Counter(AtomicU32);
//!
//! impl LoginListener for Counter {
//!     fn on_login(&self, _user: &str) -> ListenerResult {
//!         self.0.fetch_add(1, Ordering::Relaxed);
//!         Ok(())
//!     }
//! }
//!
//! let dispatcher = EventDispatcher::new();
//! let counter = Arc::new(Counter::default());
//! dispatcher.subscribe_with_priority::<dyn LoginListener>(counter.clone(), Priority::HIGH);
//!
//! dispatcher.post(Login("ada"));
//! assert_eq!(counter.0.load(Ordering::Relaxed), 1);
//!
//! dispatcher.unsubscribe::<dyn LoginListener>(&counter);
//! assert!(!dispatcher.has_subscribers::<dyn LoginListener>());
//! ```

mod builder;
mod capability;
mod dispatcher;
mod error;
mod event;
mod priority;
mod registry;
mod store;
mod subscription;

pub use builder::DispatcherBuilder;
pub use capability::{Capabilities, Subscriber};
pub use dispatcher::{Delivery, Dispatcher, ErrorHandler, EventDispatcher, LocalDispatcher, log_error};
pub use error::{BoxError, DispatchError, DispatchErrorExt, ListenerResult};
pub use event::{Breakable, Cancellable, Event, FnEvent};
pub use priority::{
    Priority, PriorityOrder, PrioritySource, SortStrategy, default_priority_order,
    default_sort_strategy, sort_key,
};
pub use store::{Local, Shared, Store};
pub use subscription::{CategoryId, ListenerId, Subscription};

use std::sync::OnceLock;

static GLOBAL: OnceLock<EventDispatcher> = OnceLock::new();

/// The process-wide thread-safe dispatcher, created on first access.
///
/// It is an ordinary [`EventDispatcher`]; components that want isolation
/// should construct their own instead. It lives for the rest of the process.
pub fn global() -> &'static EventDispatcher {
    GLOBAL.get_or_init(EventDispatcher::new)
}
