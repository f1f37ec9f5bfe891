use crate::subscription::Subscription;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Named priority levels. Any `i32` is a valid priority; higher runs earlier.
///
/// The two sentinels bypass numeric comparison entirely: [`Priority::FIRST`]
/// runs before every other priority and [`Priority::MONITOR`] after every other
/// priority, so a monitoring listener always observes the final event state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Priority;

impl Priority {
    /// Lowest named priority.
    pub const LOWEST: i32 = -2;
    /// Below [`Priority::NONE`].
    pub const LOW: i32 = -1;
    /// Priority of plain [`crate::Dispatcher::subscribe`] calls.
    pub const NONE: i32 = 0;
    /// Above [`Priority::NONE`].
    pub const HIGH: i32 = 1;
    /// Highest named priority. Larger plain values still run earlier.
    pub const HIGHEST: i32 = 2;

    /// Runs before every other priority.
    pub const FIRST: i32 = i32::MIN;
    /// Runs after every other priority.
    pub const MONITOR: i32 = i32::MAX;
    /// Alias for [`Priority::MONITOR`].
    pub const LAST: i32 = Self::MONITOR;
}

/// Maps a priority onto an ascending sort key.
///
/// `FIRST` maps below every negated value and `MONITOR` above, so the
/// sentinels win regardless of the numeric direction.
#[must_use]
pub const fn sort_key(priority: i32) -> i64 {
    match priority {
        Priority::FIRST => i64::MIN,
        Priority::MONITOR => i64::MAX,
        p => -(p as i64),
    }
}

/// Where a subscription's priority comes from.
///
/// Dynamic sources are evaluated at ordering time, not at subscribe time.
#[derive(Clone)]
pub enum PrioritySource {
    Fixed(i32),
    Dynamic(Arc<dyn Fn() -> i32 + Send + Sync>),
}

impl PrioritySource {
    /// Wraps a supplier that is re-evaluated every time the category is ordered.
    pub fn dynamic(supplier: impl Fn() -> i32 + Send + Sync + 'static) -> Self {
        Self::Dynamic(Arc::new(supplier))
    }

    /// Evaluates the current priority.
    #[must_use]
    pub fn value(&self) -> i32 {
        match self {
            Self::Fixed(priority) => *priority,
            Self::Dynamic(supplier) => supplier(),
        }
    }
}

impl Default for PrioritySource {
    fn default() -> Self {
        Self::Fixed(Priority::NONE)
    }
}

impl From<i32> for PrioritySource {
    fn from(priority: i32) -> Self {
        Self::Fixed(priority)
    }
}

impl fmt::Debug for PrioritySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(priority) => f.debug_tuple("Fixed").field(priority).finish(),
            Self::Dynamic(_) => f.debug_tuple("Dynamic").finish_non_exhaustive(),
        }
    }
}

/// Comparator used to order subscriptions before dispatch.
pub type PriorityOrder = dyn Fn(&Subscription, &Subscription) -> Ordering + Send + Sync;

/// Sorts an insertion-ordered snapshot with the given comparator.
///
/// Ties keep insertion order only if the strategy is stable.
pub type SortStrategy = dyn Fn(&mut [Arc<Subscription>], &PriorityOrder) + Send + Sync;

/// Highest priority first, `FIRST` before everything, `MONITOR` after everything.
pub fn default_priority_order(a: &Subscription, b: &Subscription) -> Ordering {
    sort_key(a.priority()).cmp(&sort_key(b.priority()))
}

/// Stable sort.
pub fn default_sort_strategy(subscriptions: &mut [Arc<Subscription>], order: &PriorityOrder) {
    subscriptions.sort_by(|a, b| order(a, b));
}
