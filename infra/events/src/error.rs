//! # Dispatch Errors
//!
//! Everything that can go wrong while delivering an event. None of these reach
//! the publisher through [`crate::Dispatcher::post`]; they are handed to the
//! configured error handler instead.

use std::borrow::Cow;

/// Boxed error type returned by listener code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Outcome of a single listener invocation.
pub type ListenerResult = Result<(), BoxError>;

/// Errors raised at the dispatch boundary.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// A listener returned an error. Delivery of the event stopped at that listener.
    #[error("Listener failed{}: {source}", format_context(.context))]
    Listener { source: BoxError, context: Option<Cow<'static, str>> },

    /// A listener, priority supplier, comparator or sort strategy panicked.
    #[error("Listener panicked{}: {message}", format_context(.context))]
    Panicked { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A stored listener could not be downcast to its category type.
    /// This indicates an invariant violation in the registry.
    #[error("Type mismatch{}: {message}", format_context(.context))]
    TypeMismatch { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl DispatchError {
    /// Returns the attached context, if any.
    #[must_use]
    pub fn context_str(&self) -> Option<&str> {
        match self {
            Self::Listener { context, .. }
            | Self::Panicked { context, .. }
            | Self::TypeMismatch { context, .. } => context.as_deref(),
        }
    }
}

impl From<BoxError> for DispatchError {
    #[inline]
    fn from(source: BoxError) -> Self {
        Self::Listener { source, context: None }
    }
}

/// Adds `.context()` to results that carry (or convert into) a [`DispatchError`].
pub trait DispatchErrorExt<T> {
    /// Attaches `context` to the error, replacing any previous context.
    ///
    /// # Errors
    /// Returns the original error with the context attached.
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, DispatchError>;
}

impl<T> DispatchErrorExt<T> for Result<T, DispatchError> {
    #[inline]
    fn context(self, context: impl Into<Cow<'static, str>>) -> Self {
        self.map_err(|mut e| {
            match &mut e {
                DispatchError::Listener { context: c, .. }
                | DispatchError::Panicked { context: c, .. }
                | DispatchError::TypeMismatch { context: c, .. } => *c = Some(context.into()),
            }
            e
        })
    }
}

impl<T> DispatchErrorExt<T> for Result<T, BoxError> {
    #[inline]
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, DispatchError> {
        self.map_err(|source| DispatchError::Listener { source, context: Some(context.into()) })
    }
}

fn format_context(context: &Option<Cow<'static, str>>) -> Cow<'static, str> {
    context.as_ref().map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(" ({c})")))
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> Cow<'static, str> {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        Cow::Borrowed(message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        Cow::Owned(message.clone())
    } else {
        Cow::Borrowed("non-string panic payload")
    }
}
