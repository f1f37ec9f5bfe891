//! Containers holding the registry and the dispatch hooks.
//!
//! [`Shared`] guards the state with a `parking_lot::RwLock` and makes the
//! dispatcher `Send + Sync`. [`Local`] uses a `RefCell` and is `!Sync`, so the
//! compiler rejects concurrent use instead of paying for synchronization.
//!
//! Neither container hands out guards: every access is a closure that must not
//! call user code, which keeps re-entrant dispatch deadlock- and panic-free.

use crate::dispatcher::Hooks;
use crate::registry::Registry;
use parking_lot::RwLock;
use std::cell::RefCell;

#[derive(Debug, Default)]
pub(crate) struct State {
    pub(crate) registry: Registry,
    pub(crate) hooks: Hooks,
}

mod private {
    use super::State;

    pub trait Sealed {
        fn from_state(state: State) -> Self;
        fn read<R>(&self, f: impl FnOnce(&State) -> R) -> R;
        fn write<R>(&self, f: impl FnOnce(&mut State) -> R) -> R;
    }
}

pub(crate) use private::Sealed;

/// Storage backend of a [`crate::Dispatcher`]. Implemented by [`Shared`] and [`Local`] only.
#[allow(private_bounds)]
pub trait Store: Sealed {}

/// Thread-safe storage.
#[derive(Debug, Default)]
pub struct Shared(RwLock<State>);

/// Single-threaded storage without synchronization.
#[derive(Debug, Default)]
pub struct Local(RefCell<State>);

impl Sealed for Shared {
    fn from_state(state: State) -> Self {
        Self(RwLock::new(state))
    }

    #[inline]
    fn read<R>(&self, f: impl FnOnce(&State) -> R) -> R {
        f(&self.0.read())
    }

    #[inline]
    fn write<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        f(&mut self.0.write())
    }
}

impl Sealed for Local {
    fn from_state(state: State) -> Self {
        Self(RefCell::new(state))
    }

    #[inline]
    fn read<R>(&self, f: impl FnOnce(&State) -> R) -> R {
        f(&self.0.borrow())
    }

    #[inline]
    fn write<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }
}

impl Store for Shared {}
impl Store for Local {}
