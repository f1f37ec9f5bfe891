use crate::priority::PrioritySource;
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Identity of a listener category: the type listeners are registered under.
///
/// Usually a trait object such as `dyn ClickListener`, but any
/// `?Sized + Send + Sync + 'static` type works, including closure types like
/// `dyn Fn(&mut Tick) + Send + Sync`.
#[derive(Clone, Copy)]
pub struct CategoryId {
    id: TypeId,
    name: &'static str,
}

impl CategoryId {
    /// Category identity of `L`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use herald_events::CategoryId;
    ///
    /// trait OnOpen {}
    /// trait OnClose {}
    ///
    /// assert_eq!(CategoryId::of::<dyn OnOpen>(), CategoryId::of::<dyn OnOpen>());
    /// assert_ne!(CategoryId::of::<dyn OnOpen>(), CategoryId::of::<dyn OnClose>());
    /// ```
    #[must_use]
    pub fn of<L: ?Sized + 'static>() -> Self {
        Self { id: TypeId::of::<L>(), name: std::any::type_name::<L>() }
    }

    /// Type name of the category, for diagnostics only.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for CategoryId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CategoryId {}

impl Hash for CategoryId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Identity of a listener instance: the data address of its `Arc`, plus the
/// registration token when the id was handed out by a subscribe call.
///
/// Coercing one allocation to several trait objects yields the same address
/// for each of them. An id built from a live `Arc` ([`ListenerId::of`]) has no
/// token and matches that allocation. An id returned by
/// [`crate::Dispatcher::subscribe`] is bound to that registration: once the
/// listener has left every category, the id matches nothing, even if the
/// allocator hands the same address to a new listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId {
    addr: usize,
    token: Option<u64>,
}

impl ListenerId {
    /// Id of a live listener, valid for as long as the caller holds `listener`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use herald_events::ListenerId;
    /// use std::fmt::Debug;
    /// use std::sync::Arc;
    ///
    /// let concrete = Arc::new(5_u8);
    /// let erased: Arc<dyn Debug + Send + Sync> = concrete.clone();
    /// assert_eq!(ListenerId::of(&concrete), ListenerId::of(&erased));
    /// ```
    #[must_use]
    pub fn of<T: ?Sized>(listener: &Arc<T>) -> Self {
        Self { addr: Arc::as_ptr(listener).cast::<()>().addr(), token: None }
    }

    /// Whether both ids point at the same allocation, ignoring registration tokens.
    #[must_use]
    pub const fn same_listener(&self, other: &Self) -> bool {
        self.addr == other.addr
    }

    pub(crate) const fn addr(self) -> usize {
        self.addr
    }

    pub(crate) const fn token(self) -> Option<u64> {
        self.token
    }

    pub(crate) const fn with_token(self, token: u64) -> Self {
        Self { addr: self.addr, token: Some(token) }
    }
}

impl<T: ?Sized> From<&Arc<T>> for ListenerId {
    fn from(listener: &Arc<T>) -> Self {
        Self::of(listener)
    }
}

/// One listener bound to a priority source within one category.
pub struct Subscription {
    listener: Box<dyn Any + Send + Sync>,
    priority: PrioritySource,
    category: CategoryId,
    id: ListenerId,
    seq: u64,
}

impl Subscription {
    /// Binds `listener` to category `L`.
    pub fn new<L>(listener: Arc<L>, priority: impl Into<PrioritySource>) -> Self
    where
        L: ?Sized + Send + Sync + 'static,
    {
        Self {
            id: ListenerId::of(&listener),
            listener: Box::new(listener),
            priority: priority.into(),
            category: CategoryId::of::<L>(),
            seq: 0,
        }
    }

    /// Current priority, evaluating a dynamic source.
    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority.value()
    }

    #[must_use]
    pub const fn priority_source(&self) -> &PrioritySource {
        &self.priority
    }

    #[must_use]
    pub const fn category(&self) -> CategoryId {
        self.category
    }

    /// Address-only id of the listener, see [`ListenerId::of`].
    #[must_use]
    pub const fn id(&self) -> ListenerId {
        self.id
    }

    /// Insertion sequence assigned by the registry. Later subscriptions have larger values.
    #[must_use]
    pub const fn seq(&self) -> u64 {
        self.seq
    }

    /// Returns the listener if `L` is this subscription's category.
    #[must_use]
    pub fn listener<L: ?Sized + 'static>(&self) -> Option<&Arc<L>> {
        self.listener.downcast_ref::<Arc<L>>()
    }

    pub(crate) const fn with_seq(mut self, seq: u64) -> Self {
        self.seq = seq;
        self
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("category", &self.category)
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}
