use crate::component::{MountQueue, RenderFn};
use std::{cell::RefCell, rc::Rc};
use vellum_reactive::{
    create_effect, provide_context, raw_scope_and_disposer, RuntimeId, Scope,
    ScopeDisposer,
};

/// Mounts a root render closure into the given runtime, wiring the full
/// renderer contract:
///
/// 1. opens a root scope;
/// 2. runs `build` there (typically: instantiate the root component and
///    return its render closure);
/// 3. wraps the returned closure in an effect, so dependency tracking
///    re-renders on signal changes;
/// 4. exposes [`flush_mounts`](RootView::flush_mounts) for the caller to
///    invoke once the first output is attached;
/// 5. on [`unmount`](RootView::unmount), disposes the root scope.
///
/// A real renderer reproduces these steps against its own output type; this
/// helper is the reference wiring, and what the test suites drive.
///
/// ```
/// # use vellum_core::*;
/// let runtime = create_runtime();
/// let root = create_root(runtime, |cx| {
///     let (count, set_count) = create_signal(cx, 0);
///     set_count.set(41);
///     Box::new(move || count.get() + 1)
/// });
///
/// assert_eq!(root.view(), 42);
/// root.unmount();
/// runtime.dispose();
/// ```
pub fn create_root<V, F>(runtime: RuntimeId, build: F) -> RootView<V>
where
    V: Clone + 'static,
    F: FnOnce(Scope) -> RenderFn<V> + 'static,
{
    let (cx, disposer) = raw_scope_and_disposer(runtime);

    let mounts = MountQueue::default();
    provide_context(cx, mounts.clone());

    let render = build(cx);
    let view = Rc::new(RefCell::new(None));

    create_effect(cx, {
        let view = Rc::clone(&view);
        move |_| {
            *view.borrow_mut() = Some(render());
        }
    });

    RootView {
        scope: cx,
        disposer: RefCell::new(Some(disposer)),
        view,
        mounts,
    }
}

/// A mounted render root, created by [`create_root`].
pub struct RootView<V>
where
    V: Clone + 'static,
{
    scope: Scope,
    disposer: RefCell<Option<ScopeDisposer>>,
    view: Rc<RefCell<Option<V>>>,
    mounts: MountQueue,
}

impl<V> RootView<V>
where
    V: Clone + 'static,
{
    /// The root scope.
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// A clone of the most recent rendered output.
    ///
    /// # Panics
    /// Panics if called after [`unmount`](RootView::unmount).
    pub fn view(&self) -> V {
        self.view
            .borrow()
            .clone()
            .expect("root has rendered at least once")
    }

    /// Reads the most recent rendered output by reference.
    pub fn with_view<O>(&self, f: impl FnOnce(&V) -> O) -> Option<O> {
        self.view.borrow().as_ref().map(f)
    }

    /// Runs the mount callbacks queued during setup of every component
    /// instance under this root, FIFO. Call once, after the first output
    /// has been attached.
    pub fn flush_mounts(&self) {
        self.mounts.flush();
    }

    /// Disposes the root scope: cleanups run, instances unregister, and no
    /// further renders occur. Unmounting twice is a no-op.
    pub fn unmount(&self) {
        if let Some(disposer) = self.disposer.borrow_mut().take() {
            disposer.dispose();
        }
        *self.view.borrow_mut() = None;
    }
}
