use crate::{
    macros::debug_warn,
    node::NodeId,
    runtime::{with_runtime, RuntimeId},
    ReactiveError,
};
use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

#[must_use = "Scope will leak memory if the disposer function is never called"]
/// Creates a new reactive root scope in the given runtime and runs the
/// function within it.
///
/// This should usually only be used once, at the root of an application,
/// because its reactive values will not have access to values created under
/// another `create_scope`.
pub fn create_scope(
    runtime: RuntimeId,
    f: impl FnOnce(Scope) + 'static,
) -> ScopeDisposer {
    runtime.run_scope_undisposed(f, None).2
}

#[must_use = "Scope will leak memory if the disposer function is never called"]
/// Creates a new reactive root scope and returns it, along with its disposer.
pub fn raw_scope_and_disposer(runtime: RuntimeId) -> (Scope, ScopeDisposer) {
    runtime.raw_scope_and_disposer()
}

/// Creates a temporary scope, runs the given function, disposes of the scope,
/// and returns the value returned from the function. Useful for short-lived
/// operations like a single server render, where reactivity is not required
/// beyond the end of the synchronous call.
pub fn run_scope<T>(
    runtime: RuntimeId,
    f: impl FnOnce(Scope) -> T + 'static,
) -> T {
    runtime.run_scope(f, None)
}

#[must_use = "Scope will leak memory if the disposer function is never called"]
/// Creates a temporary scope and runs the given function without disposing
/// of the scope. If you do not dispose of the scope on your own, memory
/// will leak.
pub fn run_scope_undisposed<T>(
    runtime: RuntimeId,
    f: impl FnOnce(Scope) -> T + 'static,
) -> (T, ScopeId, ScopeDisposer) {
    runtime.run_scope_undisposed(f, None)
}

/// A node in the ownership tree of the reactive system. Each scope may have
/// child scopes, and may in turn have a parent.
///
/// Scopes manage memory within the reactive system. When a scope is
/// disposed, its child scopes are disposed first, its cleanup functions run
/// in reverse registration order, and the signals, memos, effects, and
/// contexts associated with it no longer exist and should no longer be
/// accessed.
///
/// Every component instance, application root, and store runs under its own
/// scope, which is how the framework gets deterministic teardown without
/// finalizers.
///
/// `Scope` is [`Copy`] and `'static`, so passing it around adds no overhead
/// or lifetime complexity.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Scope {
    #[doc(hidden)]
    pub runtime: RuntimeId,
    #[doc(hidden)]
    pub id: ScopeId,
}

impl Scope {
    /// The unique identifier for this scope.
    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// Returns the chain of scope IDs beginning with this one, going to its
    /// parent, grandparent, etc.
    pub fn ancestry(&self) -> Vec<ScopeId> {
        let mut ids = vec![self.id];
        let mut cx = *self;
        while let Some(parent) = cx.parent() {
            ids.push(parent.id());
            cx = parent;
        }
        ids
    }

    /// Creates a child scope and runs the given function within it, returning
    /// a handle to dispose of it.
    ///
    /// The child scope has its own lifetime and disposer, but will be
    /// disposed when the parent is disposed, if it has not been already.
    #[inline(always)]
    pub fn child_scope(self, f: impl FnOnce(Scope)) -> ScopeDisposer {
        let (_, disposer) = self.run_child_scope(f);
        disposer
    }

    /// Creates a child scope and runs the given function within it, returning
    /// the function's return value and a handle to dispose of it.
    ///
    /// This is useful for applications like a list or a router, which may
    /// want to create child scopes and dispose of them when they are no
    /// longer needed (e.g., a list item has been removed or the user has
    /// navigated away from the route).
    #[inline(always)]
    pub fn run_child_scope<T>(
        self,
        f: impl FnOnce(Scope) -> T,
    ) -> (T, ScopeDisposer) {
        let (res, child_id, disposer) =
            self.runtime.run_scope_undisposed(f, Some(self));

        self.push_child(child_id);

        (res, disposer)
    }

    fn push_child(&self, child_id: ScopeId) {
        _ = with_runtime(self.runtime, |runtime| {
            let mut children = runtime.scope_children.borrow_mut();
            if let Some(entry) = children.entry(self.id) {
                entry.or_default().push(child_id);
            }
        });
    }

    /// Suspends reactive tracking while running the given function.
    /// Ownership is unaffected: anything created inside still belongs to
    /// this scope.
    ///
    /// This can be used to isolate parts of the reactive graph from one
    /// another.
    ///
    /// ```
    /// # use vellum_reactive::*;
    /// # run_scope(create_runtime(), |cx| {
    /// let (a, set_a) = create_signal(cx, 0);
    /// let (b, set_b) = create_signal(cx, 0);
    /// let c = create_memo(cx, move |_| {
    ///     // this memo will *only* update when `a` changes
    ///     a.get() + cx.untrack(move || b.get())
    /// });
    ///
    /// assert_eq!(c.get(), 0);
    /// set_a.set(1);
    /// assert_eq!(c.get(), 1);
    /// set_b.set(1);
    /// // hasn't updated, because we untracked before reading b
    /// assert_eq!(c.get(), 1);
    /// set_a.set(2);
    /// assert_eq!(c.get(), 3);
    /// # });
    /// ```
    #[inline(always)]
    pub fn untrack<T>(&self, f: impl FnOnce() -> T) -> T {
        self.runtime.untrack(f)
    }

    /// Batches reactive updates, so that no effect runs until the whole
    /// function has finished. Dependent effects run exactly once per batch,
    /// however many of their sources were written. Nested batches collapse
    /// into the outermost one.
    ///
    /// # Panics
    /// Panics if the runtime this scope belongs to has been disposed, or if
    /// the flush at batch exit trips the scheduler's cycle guard. Use
    /// [`try_batch`](Scope::try_batch) to handle the latter as a value.
    #[inline(always)]
    pub fn batch<T>(&self, f: impl FnOnce() -> T) -> T {
        self.try_batch(f).unwrap_or_else(|err| panic!("{err}"))
    }

    /// Like [`batch`](Scope::batch), but surfaces a tripped scheduler cycle
    /// guard as [`ReactiveError::CycleDetected`] instead of panicking.
    pub fn try_batch<T>(
        &self,
        f: impl FnOnce() -> T,
    ) -> Result<T, ReactiveError> {
        with_runtime(self.runtime, move |runtime| {
            let batching =
                SetBatchingOnDrop(self.runtime, runtime.batching.get());
            runtime.batching.set(true);

            let val = f();

            runtime.batching.set(batching.1);
            std::mem::forget(batching);

            runtime.run_effects().map(|_| val)
        })
        .expect(
            "tried to run a batched update in a runtime that has been disposed",
        )
    }

    /// Returns an abort signal tied to this scope's lifetime: the flag flips
    /// and all registered listeners run when the scope is disposed.
    ///
    /// In-flight async work bound to a scope is expected to observe this
    /// signal and short-circuit; the reactive system itself never cancels
    /// foreign futures.
    pub fn abort_signal(&self) -> ScopeAbortSignal {
        let signal = ScopeAbortSignal::default();
        let handle = signal.clone();
        on_cleanup(*self, move || handle.trigger());
        signal
    }
}

// Internals

impl Scope {
    /// Disposes of this reactive scope.
    ///
    /// This will
    /// 1. dispose of all child `Scope`s, recursively
    /// 2. run this scope's cleanup functions in reverse registration order
    /// 3. dispose of all signals, memos, and effects owned by this `Scope`.
    ///
    /// Disposing an already-disposed scope is a no-op.
    pub fn dispose(self) {
        _ = with_runtime(self.runtime, |runtime| {
            // dispose of all child scopes first
            let children = {
                let mut children = runtime.scope_children.borrow_mut();
                children.remove(self.id)
            };

            if let Some(children) = children {
                for id in children {
                    Scope {
                        runtime: self.runtime,
                        id,
                    }
                    .dispose();
                }
            }

            // run cleanups in reverse registration order
            let cleanups = {
                let mut cleanups = runtime.scope_cleanups.borrow_mut();
                cleanups.remove(self.id)
            };
            if let Some(cleanups) = cleanups {
                for cleanup in cleanups.into_iter().rev() {
                    cleanup();
                }
            }

            runtime.scope_parents.borrow_mut().remove(self.id);
            runtime.scope_contexts.borrow_mut().remove(self.id);

            // remove everything we own from the reactive graph
            let owned = {
                let owned = runtime.scopes.borrow_mut().remove(self.id);
                owned.map(|owned| owned.take())
            };
            if let Some(owned) = owned {
                for property in owned {
                    match property {
                        ScopeProperty::Signal(id)
                        | ScopeProperty::Memo(id)
                        | ScopeProperty::Effect(id) => {
                            runtime.dispose_node(id)
                        }
                    }
                }
            }
        })
    }

    pub(crate) fn push_scope_property(&self, prop: ScopeProperty) {
        _ = with_runtime(self.runtime, |runtime| {
            let scopes = runtime.scopes.borrow();
            if let Some(scope) = scopes.get(self.id) {
                scope.borrow_mut().push(prop);
            } else {
                debug_warn!(
                    "tried to add a property to a scope that has been disposed"
                );
            }
        })
    }

    /// Returns the parent scope, if any.
    pub fn parent(&self) -> Option<Scope> {
        match with_runtime(self.runtime, |runtime| {
            runtime.scope_parents.borrow().get(self.id).copied()
        }) {
            Ok(Some(id)) => Some(Scope {
                runtime: self.runtime,
                id,
            }),
            _ => None,
        }
    }

    /// Returns the root ancestor of this scope (itself, if it has no parent).
    pub fn root(&self) -> Scope {
        let mut cx = *self;
        while let Some(parent) = cx.parent() {
            cx = parent;
        }
        cx
    }
}

fn push_cleanup(cx: Scope, cleanup_fn: Box<dyn FnOnce()>) {
    _ = with_runtime(cx.runtime, |runtime| {
        if runtime.scopes.borrow().get(cx.id).is_none() {
            debug_warn!(
                "on_cleanup() called on a scope that has been disposed; the \
                 callback will never run"
            );
            return;
        }
        let mut cleanups = runtime.scope_cleanups.borrow_mut();
        if let Some(entry) = cleanups.entry(cx.id) {
            entry.or_default().push(cleanup_fn);
        }
    });
}

/// Registers a cleanup function, which will run when the [`Scope`] is
/// disposed.
///
/// Cleanups run after child scopes have been disposed, in reverse
/// registration order, and before the scope's signals, memos, and effects
/// are invalidated. Calling this on a disposed scope warns in debug builds
/// and is otherwise a no-op.
#[inline(always)]
pub fn on_cleanup(cx: Scope, cleanup_fn: impl FnOnce() + 'static) {
    push_cleanup(cx, Box::new(cleanup_fn))
}

slotmap::new_key_type! {
    /// Unique ID assigned to a [`Scope`](crate::Scope).
    pub struct ScopeId;
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub(crate) enum ScopeProperty {
    Signal(NodeId),
    Memo(NodeId),
    Effect(NodeId),
}

/// Creating a [`Scope`](crate::Scope) gives you a disposer, which can be
/// called to dispose of that reactive scope.
#[repr(transparent)]
pub struct ScopeDisposer(pub(crate) Scope);

impl ScopeDisposer {
    /// Disposes of the reactive [`Scope`](crate::Scope). See
    /// [`Scope::dispose`] for the teardown order.
    #[inline(always)]
    pub fn dispose(self) {
        self.0.dispose()
    }
}

impl fmt::Debug for ScopeDisposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ScopeDisposer").finish()
    }
}

/// An abort-like flag tied to a scope's lifetime, created with
/// [`Scope::abort_signal`].
///
/// External async helpers hold a clone and either poll [`aborted`] at their
/// own suspension points or register a listener with [`on_abort`]. Listeners
/// run at most once, at the moment the owning scope is disposed.
///
/// [`aborted`]: ScopeAbortSignal::aborted
/// [`on_abort`]: ScopeAbortSignal::on_abort
#[derive(Clone, Default)]
pub struct ScopeAbortSignal {
    aborted: Rc<Cell<bool>>,
    #[allow(clippy::type_complexity)]
    listeners: Rc<RefCell<Vec<Box<dyn FnOnce()>>>>,
}

impl ScopeAbortSignal {
    /// Whether the owning scope has been disposed.
    pub fn aborted(&self) -> bool {
        self.aborted.get()
    }

    /// Registers a listener to run when the owning scope is disposed. If the
    /// scope is already gone, the listener runs immediately.
    pub fn on_abort(&self, f: impl FnOnce() + 'static) {
        if self.aborted.get() {
            f();
        } else {
            self.listeners.borrow_mut().push(Box::new(f));
        }
    }

    pub(crate) fn trigger(&self) {
        if !self.aborted.replace(true) {
            let listeners = self.listeners.take();
            for listener in listeners {
                listener();
            }
        }
    }
}

impl fmt::Debug for ScopeAbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeAbortSignal")
            .field("aborted", &self.aborted.get())
            .finish()
    }
}

struct SetBatchingOnDrop(RuntimeId, bool);

impl Drop for SetBatchingOnDrop {
    fn drop(&mut self) {
        _ = with_runtime(self.0, |rt| {
            rt.batching.set(self.1);
        });
    }
}
