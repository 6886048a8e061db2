//! A wrapper for arbitrary errors, and a global hook for "thrown" errors
//! that nothing above the throw site handles.

use std::{
    cell::{Cell, RefCell},
    error,
    fmt::{self, Display},
    ops,
    rc::Rc,
};

/// This is a result type into which any error can be converted.
///
/// Results are stored as [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// A generic, cheaply-clonable wrapper for any error.
#[derive(Debug, Clone)]
#[repr(transparent)]
pub struct Error(Rc<dyn error::Error>);

impl Error {
    /// Wraps the given error.
    pub fn new(err: impl error::Error + 'static) -> Self {
        Self(Rc::new(err))
    }

    /// Converts the wrapper into the inner reference-counted error.
    pub fn into_inner(self) -> Rc<dyn error::Error> {
        self.0
    }
}

impl ops::Deref for Error {
    type Target = Rc<dyn error::Error>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<T> From<T> for Error
where
    T: error::Error + 'static,
{
    fn from(value: T) -> Self {
        Error(Rc::new(value))
    }
}

/// A convenience for throwing stringly-typed errors from render closures and
/// tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringError(pub String);

impl StringError {
    /// Wraps the message in an [`Error`].
    pub fn boxed(message: impl Into<String>) -> Error {
        Error::new(StringError(message.into()))
    }
}

impl Display for StringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl error::Error for StringError {}

/// A unique identifier for a reported error, used by error boundaries to
/// clear individual entries.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Default)]
pub struct ErrorId(usize);

impl Display for ErrorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<usize> for ErrorId {
    fn from(value: usize) -> Self {
        Self(value)
    }
}

thread_local! {
    static ERROR_HOOK: RefCell<Option<Rc<dyn ErrorHook>>> =
        const { RefCell::new(None) };
    static NEXT_ERROR_ID: Cell<usize> = const { Cell::new(0) };
}

pub(crate) fn next_error_id() -> ErrorId {
    NEXT_ERROR_ID.with(|id| {
        let next = id.get();
        id.set(next + 1);
        ErrorId(next)
    })
}

/// Receives errors that reach the top of the tree without being handled by
/// an error boundary. An application installs one through
/// [`set_error_hook`]; the app layer uses this to feed its `on_error`
/// listeners.
pub trait ErrorHook {
    /// Handles the given error, returning a unique identifier for it.
    fn throw(&self, error: Error) -> ErrorId;

    /// Clears the error associated with the given identifier.
    fn clear(&self, id: &ErrorId);
}

/// Resets the error hook to its previous state when dropped.
#[must_use]
pub struct ResetErrorHookOnDrop(Option<Rc<dyn ErrorHook>>);

impl Drop for ResetErrorHookOnDrop {
    fn drop(&mut self) {
        ERROR_HOOK.with(|hook| *hook.borrow_mut() = self.0.take())
    }
}

/// Returns the currently-installed error hook, if any.
pub fn get_error_hook() -> Option<Rc<dyn ErrorHook>> {
    ERROR_HOOK.with(|hook| hook.borrow().clone())
}

/// Installs a hook that receives otherwise-unhandled errors. The previous
/// hook is restored when the returned guard drops.
pub fn set_error_hook(hook: Rc<dyn ErrorHook>) -> ResetErrorHookOnDrop {
    ResetErrorHookOnDrop(
        ERROR_HOOK.with(|this| this.borrow_mut().replace(hook)),
    )
}

/// Hands an error to the installed [`ErrorHook`]. With no hook installed,
/// the error is logged and otherwise dropped.
pub fn throw_error(error: impl Into<Error>) -> ErrorId {
    let error = error.into();
    match get_error_hook() {
        Some(hook) => hook.throw(error),
        None => {
            tracing::error!("unhandled error: {error}");
            next_error_id()
        }
    }
}

/// Clears a previously-thrown error on the installed hook, if any.
pub fn clear_error(id: &ErrorId) {
    if let Some(hook) = get_error_hook() {
        hook.clear(id);
    }
}
