use crate::{
    node::NodeId,
    runtime::{with_runtime, RuntimeId},
    Scope, ScopeProperty,
};
use std::{any::Any, cell::RefCell, marker::PhantomData, rc::Rc};

/// An effect is the bridge out of the reactive system: a closure that runs
/// once immediately, under tracking, and then again whenever any cell it
/// read during its previous run is written. The dependency set is
/// re-recorded on every run, so reads sitting behind branches come and go
/// as the branches do.
///
/// The closure receives its own previous return value (`None` on the first
/// run) — a convenient slot for handles to whatever the effect maintains in
/// the outside world. A renderer is the canonical effect: it wraps a
/// component's render closure so that output stays in sync with state. For
/// state that merely *derives from* other state, reach for
/// [`create_memo`](crate::create_memo) instead of writing to signals from
/// inside an effect.
///
/// The effect is owned by `cx` and dies with it; the returned
/// [`EffectHandle`] can stop it earlier.
///
/// ```
/// # use vellum_reactive::*;
/// # create_scope(create_runtime(), |cx| {
/// let (title, set_title) = create_signal(cx, "untitled".to_string());
///
/// // prints "document: untitled" now, and again on every title change
/// create_effect(cx, move |_| {
///     println!("document: {}", title.get());
/// });
///
/// set_title.set("chapter one".to_string());
/// # }).dispose();
/// ```
#[track_caller]
#[inline(always)]
pub fn create_effect<T>(
    cx: Scope,
    f: impl Fn(Option<T>) -> T + 'static,
) -> EffectHandle
where
    T: 'static,
{
    let handle = cx.runtime.create_effect(f);
    cx.push_scope_property(ScopeProperty::Effect(handle.id));
    handle
}

/// A handle to a running effect, returned by [`create_effect`].
///
/// The effect itself is owned by the scope it was created in; dropping the
/// handle does nothing. [`stop`](EffectHandle::stop) removes the effect from
/// the graph early, before its scope is disposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectHandle {
    pub(crate) runtime: RuntimeId,
    pub(crate) id: NodeId,
}

impl EffectHandle {
    /// The ID of the underlying reactive node, for diagnostics.
    pub fn node_id(&self) -> NodeId {
        self.id
    }

    /// Stops the effect: it is unsubscribed from all of its sources and will
    /// never run again. Stopping an already-stopped effect is a no-op.
    pub fn stop(self) {
        _ = with_runtime(self.runtime, |runtime| {
            runtime.dispose_node(self.id);
        });
    }
}

pub(crate) struct Effect<T, F>
where
    T: 'static,
    F: Fn(Option<T>) -> T,
{
    pub(crate) f: F,
    pub(crate) ty: PhantomData<T>,
    #[cfg(debug_assertions)]
    #[allow(dead_code)]
    pub(crate) defined_at: &'static std::panic::Location<'static>,
}

pub(crate) trait AnyComputation {
    fn run(&self, value: Rc<RefCell<dyn Any>>) -> bool;
}

impl<T, F> AnyComputation for Effect<T, F>
where
    T: 'static,
    F: Fn(Option<T>) -> T,
{
    fn run(&self, value: Rc<RefCell<dyn Any>>) -> bool {
        // we take and release the borrow twice here, in case a change during
        // the effect running schedules a rerun
        let curr_value = {
            // downcast value
            let mut value = value.borrow_mut();
            let value = value
                .downcast_mut::<Option<T>>()
                .expect("to downcast effect value");
            value.take()
        };

        // run the effect
        let new_value = (self.f)(curr_value);

        // set new value
        let mut value = value.borrow_mut();
        let value = value
            .downcast_mut::<Option<T>>()
            .expect("to downcast effect value");
        *value = Some(new_value);

        true
    }
}
