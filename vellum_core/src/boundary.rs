use crate::error::{next_error_id, throw_error, Error, ErrorId};
use indexmap::IndexMap;
use std::{cell::RefCell, rc::Rc};
use vellum_reactive::{
    create_rw_signal, provide_context, use_context, RwSignal, Scope,
    ScopeDisposer, SignalUpdate, SignalWith,
};

/// The errors currently trapped by one error boundary, keyed by report id.
#[derive(Debug, Clone, Default)]
pub struct Errors(IndexMap<ErrorId, Error>);

impl Errors {
    /// Adds an error for the boundary to display.
    pub fn insert(&mut self, key: ErrorId, error: Error) {
        self.0.insert(key, error);
    }

    /// Removes a single error, e.g. when the condition that produced it has
    /// gone away.
    pub fn remove(&mut self, key: &ErrorId) -> Option<Error> {
        self.0.shift_remove(key)
    }

    /// Whether the boundary currently traps no errors.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of trapped errors.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over the trapped errors in report order.
    pub fn iter(&self) -> impl Iterator<Item = (&ErrorId, &Error)> {
        self.0.iter()
    }

    /// Drops all trapped errors.
    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// Context through which descendants report errors to their nearest
/// boundary. Provided automatically for the children of an error boundary.
#[derive(Clone, Copy)]
pub struct ErrorBoundaryContext {
    /// The boundary's trapped errors.
    pub errors: RwSignal<Errors>,
}

/// Reports an error to the nearest error boundary above `cx`. With no
/// boundary in the tree, the error goes to the global
/// [error hook](crate::set_error_hook) and is logged.
///
/// Render closures usually return `Result` instead and let the boundary
/// catch the `Err`; this is the escape hatch for effects and mount
/// callbacks, which have no return channel.
pub fn report_error(cx: Scope, error: impl Into<Error>) {
    let error = error.into();
    match use_context::<ErrorBoundaryContext>(cx) {
        Some(boundary) => {
            let id = next_error_id();
            boundary.errors.update(|errors| errors.insert(id, error));
        }
        None => {
            throw_error(error);
        }
    }
}

/// Creates an error boundary: a node that renders `children` while their
/// subtree is healthy and `fallback` while any error is trapped.
///
/// `children` is a builder: it receives the scope the subtree lives under
/// and returns the subtree's render closure, which may fail. The boundary
/// catches the failure, records it, and renders the fallback in the same
/// pass. [`reset`](ErrorBoundary::reset) tears the subtree down, rebuilds
/// it in a fresh scope, and clears the trapped errors.
///
/// The boundary's own [`render`](ErrorBoundary::render) is expected to run
/// under an effect (the usual renderer contract), which is what re-renders
/// it when descendants report errors from their own effects.
pub fn create_error_boundary<V, C, F>(
    cx: Scope,
    children: C,
    fallback: F,
) -> ErrorBoundary<V>
where
    V: 'static,
    C: Fn(Scope) -> Box<dyn Fn() -> Result<V, Error>> + 'static,
    F: Fn(RwSignal<Errors>) -> V + 'static,
{
    let errors = create_rw_signal(cx, Errors::default());
    let inner = Rc::new(BoundaryInner {
        cx,
        errors,
        children: Box::new(children),
        child: RefCell::new(None),
        fallback: Box::new(fallback),
    });
    inner.mount_children();
    ErrorBoundary { inner }
}

/// An error boundary handle, created by [`create_error_boundary`].
pub struct ErrorBoundary<V> {
    inner: Rc<BoundaryInner<V>>,
}

impl<V> Clone for ErrorBoundary<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

#[allow(clippy::type_complexity)]
struct BoundaryInner<V> {
    cx: Scope,
    errors: RwSignal<Errors>,
    children: Box<dyn Fn(Scope) -> Box<dyn Fn() -> Result<V, Error>>>,
    child: RefCell<Option<(Box<dyn Fn() -> Result<V, Error>>, ScopeDisposer)>>,
    fallback: Box<dyn Fn(RwSignal<Errors>) -> V>,
}

impl<V> BoundaryInner<V> {
    fn mount_children(&self) {
        let errors = self.errors;
        let (render, disposer) = self.cx.run_child_scope(|child| {
            provide_context(child, ErrorBoundaryContext { errors });
            (self.children)(child)
        });
        let previous = self.child.borrow_mut().replace((render, disposer));
        if let Some((_, old_disposer)) = previous {
            old_disposer.dispose();
        }
    }
}

impl<V> ErrorBoundary<V> {
    /// The boundary's current rendered value: the children while healthy,
    /// the fallback while any error is trapped.
    pub fn render(&self) -> V {
        let inner = &self.inner;
        let healthy = inner.errors.with(|errors| errors.is_empty());
        if healthy {
            let child = inner.child.borrow();
            let (render, _) =
                child.as_ref().expect("boundary children to be mounted");
            match render() {
                Ok(view) => view,
                Err(error) => {
                    let id = next_error_id();
                    inner
                        .errors
                        .update(|errors| errors.insert(id, error));
                    (inner.fallback)(inner.errors)
                }
            }
        } else {
            (inner.fallback)(inner.errors)
        }
    }

    /// Tears down the child subtree, rebuilds it in a fresh scope, and
    /// clears the trapped errors. Rendering afterwards succeeds if the
    /// source error condition is gone.
    pub fn reset(&self) {
        self.inner.mount_children();
        self.inner.errors.update(|errors| errors.clear());
    }

    /// The boundary's trapped errors, for fallbacks and devtools.
    pub fn errors(&self) -> RwSignal<Errors> {
        self.inner.errors
    }
}
