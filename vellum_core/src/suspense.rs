use crate::ssr;
use futures::{future::LocalBoxFuture, FutureExt};
use std::{cell::RefCell, future::Future, rc::Rc};
use vellum_reactive::{
    create_signal, provide_context, ReadSignal, Scope, SignalGet,
    SignalUpdate, SignalWith, WriteSignal,
};

/// A type-erased unit of pending async work thrown by a suspending child: a
/// future that completes when the work settles, successfully or not.
pub struct Suspension(pub(crate) LocalBoxFuture<'static, ()>);

impl Suspension {
    /// Wraps a future as a suspension.
    pub fn new(fut: impl Future<Output = ()> + 'static) -> Self {
        Self(fut.boxed_local())
    }
}

/// Tracks how much async work is pending under one suspense boundary.
#[derive(Copy, Clone, Debug)]
pub struct SuspenseContext {
    /// The number of units of work currently pending.
    pub pending_count: ReadSignal<usize>,
    set_pending_count: WriteSignal<usize>,
}

impl SuspenseContext {
    /// Creates an empty suspense context owned by the given scope.
    pub fn new(cx: Scope) -> Self {
        let (pending_count, set_pending_count) = create_signal(cx, 0);
        Self {
            pending_count,
            set_pending_count,
        }
    }

    /// Notes that a new unit of work is pending.
    pub fn increment(&self) {
        _ = self.set_pending_count.try_update(|n| *n += 1);
    }

    /// Notes that a unit of work has settled. A no-op once the boundary's
    /// scope is gone, so late resolutions after unmount are harmless.
    pub fn decrement(&self) {
        _ = self.set_pending_count.try_update(|n| {
            if *n > 0 {
                *n -= 1
            }
        });
    }

    /// Whether all pending work has settled.
    pub fn ready(&self) -> bool {
        self.pending_count
            .try_with(|n| *n == 0)
            .unwrap_or(false)
    }
}

/// Creates a suspense boundary: a node that renders `children` while no
/// async work is pending beneath it and `fallback` while some is.
///
/// `children` is re-run on each render and signals suspension by returning
/// `Err(Suspension)` — the thrown-promise contract a [`Lazy`](crate::Lazy)
/// first call produces. The boundary registers the suspension (with the
/// active [SSR context](crate::ssr), when rendering on the server, or its
/// own pending set otherwise), renders the fallback, and re-renders the
/// children once the work settles.
///
/// On the client/test side, [`settle`](SuspenseBoundary::settle) drives the
/// pending set; on the server, `render_to_string` does.
pub fn create_suspense<V, C, F>(
    cx: Scope,
    children: C,
    fallback: F,
) -> SuspenseBoundary<V>
where
    V: 'static,
    C: Fn() -> Result<V, Suspension> + 'static,
    F: Fn() -> V + 'static,
{
    let context = SuspenseContext::new(cx);
    provide_context(cx, context);
    SuspenseBoundary {
        context,
        children: Rc::new(children),
        fallback: Rc::new(fallback),
        pending: Rc::new(RefCell::new(Vec::new())),
    }
}

/// A suspense boundary handle, created by [`create_suspense`].
pub struct SuspenseBoundary<V> {
    context: SuspenseContext,
    #[allow(clippy::type_complexity)]
    children: Rc<dyn Fn() -> Result<V, Suspension>>,
    fallback: Rc<dyn Fn() -> V>,
    pending: Rc<RefCell<Vec<LocalBoxFuture<'static, ()>>>>,
}

impl<V> Clone for SuspenseBoundary<V> {
    fn clone(&self) -> Self {
        Self {
            context: self.context,
            children: Rc::clone(&self.children),
            fallback: Rc::clone(&self.fallback),
            pending: Rc::clone(&self.pending),
        }
    }
}

impl<V> SuspenseBoundary<V> {
    /// The boundary's current rendered value. Expected to run under an
    /// effect, so that settling work re-renders it.
    pub fn render(&self) -> V {
        // subscribe to the pending count so resolution re-renders us
        let pending = self.context.pending_count.get();

        match (self.children)() {
            Ok(view) if pending == 0 => view,
            Ok(_) => (self.fallback)(),
            Err(suspension) => {
                self.context.increment();
                let context = self.context;
                let settled = async move {
                    suspension.0.await;
                    context.decrement();
                };
                match ssr::get_ssr_context() {
                    Some(ssr_context) => {
                        ssr_context.register_pending(settled.boxed_local())
                    }
                    None => {
                        self.pending.borrow_mut().push(settled.boxed_local())
                    }
                }
                (self.fallback)()
            }
        }
    }

    /// The boundary's pending-work counter.
    pub fn context(&self) -> SuspenseContext {
        self.context
    }

    /// Awaits every registered suspension, including any that new renders
    /// register while earlier ones settle. Settling decrements the pending
    /// count, which re-renders the boundary through the usual effect wiring.
    pub async fn settle(&self) {
        loop {
            let pending: Vec<_> = {
                let mut pending = self.pending.borrow_mut();
                pending.drain(..).collect()
            };
            if pending.is_empty() {
                break;
            }
            futures::future::join_all(pending).await;
        }
    }
}
