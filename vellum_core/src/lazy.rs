use crate::{error::Error, suspense::Suspension};
use futures::{
    future::{LocalBoxFuture, Shared},
    FutureExt,
};
use std::{cell::RefCell, future::Future, rc::Rc};
use thiserror::Error as ThisError;

/// Failure modes of a [`Lazy`] cell.
#[derive(Debug, ThisError, Clone)]
pub enum LazyError {
    /// The loader rejected. The cell is poisoned: every later call returns
    /// this same error without re-running the loader. Retrying is a
    /// higher-level concern, by building a fresh [`Lazy`].
    #[error("lazy component failed to load: {0}")]
    LoadFailed(Error),
}

type SharedLoad<C> = Shared<LocalBoxFuture<'static, Result<C, Error>>>;
type Loader<C> = dyn Fn() -> LocalBoxFuture<'static, Result<C, Error>>;

/// Wraps an async loader into a lazily-loaded component (or any other
/// clonable value).
///
/// The first [`get`](Lazy::get) starts the loader — exactly once, however
/// many callers race on it — and reports [`LazyResult::Pending`] with a
/// handle all of them share. Once the load resolves, every call returns the
/// cached value; once it rejects, every call returns the same error.
///
/// A suspense boundary treats the `Pending` handle as its suspension
/// contract: render the placeholder now, re-render when the shared load
/// settles.
///
/// ```
/// # use vellum_core::*;
/// # futures::executor::block_on(async {
/// let greeting = lazy(|| async { Ok::<_, Error>("hello") });
///
/// let pending = match greeting.get() {
///     LazyResult::Pending(pending) => pending,
///     _ => unreachable!("first call starts the load"),
/// };
/// pending.wait().await.unwrap();
///
/// assert!(matches!(greeting.get(), LazyResult::Ready("hello")));
/// # });
/// ```
pub fn lazy<C, F, Fut>(loader: F) -> Lazy<C>
where
    C: Clone + 'static,
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = Result<C, Error>> + 'static,
{
    Lazy {
        loader: Rc::new(move || loader().boxed_local()),
        state: Rc::new(RefCell::new(LazyState::NotRequested)),
    }
}

/// A lazily-loaded value with single-flight loading and sticky failure.
/// See [`lazy`]. Cheap to clone; clones share one load state.
pub struct Lazy<C>
where
    C: Clone + 'static,
{
    loader: Rc<Loader<C>>,
    state: Rc<RefCell<LazyState<C>>>,
}

impl<C: Clone + 'static> Clone for Lazy<C> {
    fn clone(&self) -> Self {
        Self {
            loader: Rc::clone(&self.loader),
            state: Rc::clone(&self.state),
        }
    }
}

enum LazyState<C: Clone> {
    NotRequested,
    Pending(SharedLoad<C>),
    Ready(C),
    Failed(Error),
}

/// The outcome of one [`Lazy::get`] call.
pub enum LazyResult<C>
where
    C: Clone + 'static,
{
    /// The value is loaded and cached.
    Ready(C),
    /// The load is in flight; all concurrent callers hold handles to the
    /// same one.
    Pending(PendingLoad<C>),
    /// The loader rejected; the cell is poisoned with this error.
    Failed(LazyError),
}

impl<C: Clone + 'static> Lazy<C> {
    /// The current state of the cell, starting the loader on first call.
    pub fn get(&self) -> LazyResult<C> {
        let mut state = self.state.borrow_mut();

        // settle a completed in-flight load
        let settled = match &*state {
            LazyState::Pending(shared) => {
                shared.peek().map(|result| match result {
                    Ok(value) => LazyState::Ready(value.clone()),
                    Err(error) => LazyState::Failed(error.clone()),
                })
            }
            _ => None,
        };
        if let Some(next) = settled {
            *state = next;
        }

        if matches!(&*state, LazyState::NotRequested) {
            let shared = (self.loader)().shared();
            *state = LazyState::Pending(shared.clone());
            return LazyResult::Pending(PendingLoad { load: shared });
        }

        match &*state {
            LazyState::Pending(shared) => LazyResult::Pending(PendingLoad {
                load: shared.clone(),
            }),
            LazyState::Ready(value) => LazyResult::Ready(value.clone()),
            LazyState::Failed(error) => {
                LazyResult::Failed(LazyError::LoadFailed(error.clone()))
            }
            LazyState::NotRequested => unreachable!("load started above"),
        }
    }

    /// Whether the value is loaded and cached.
    pub fn is_ready(&self) -> bool {
        matches!(&*self.state.borrow(), LazyState::Ready(_))
    }
}

/// A handle to an in-flight load, shared by every caller that observed it.
pub struct PendingLoad<C>
where
    C: Clone + 'static,
{
    load: SharedLoad<C>,
}

impl<C: Clone + 'static> Clone for PendingLoad<C> {
    fn clone(&self) -> Self {
        Self {
            load: self.load.clone(),
        }
    }
}

impl<C: Clone + 'static> PendingLoad<C> {
    /// Awaits the shared load.
    pub async fn wait(self) -> Result<C, LazyError> {
        self.load.await.map_err(LazyError::LoadFailed)
    }

    /// The type-erased suspension a suspense boundary registers: a future
    /// that completes when the load settles, successfully or not.
    pub fn suspension(&self) -> Suspension {
        Suspension::new(self.load.clone().map(|_| ()))
    }
}

/// Starts (if necessary) and awaits a [`Lazy`] cell's loader without
/// rendering anything.
pub async fn preload<C>(lazy: &Lazy<C>) -> Result<C, LazyError>
where
    C: Clone + 'static,
{
    match lazy.get() {
        LazyResult::Ready(value) => Ok(value),
        LazyResult::Failed(error) => Err(error),
        LazyResult::Pending(pending) => {
            let result = pending.wait().await;
            // settle the cell so later calls are transparent
            _ = lazy.get();
            result
        }
    }
}
