use crate::{
    node::NodeId,
    runtime::{with_runtime, RuntimeId},
    AnyComputation, Scope, ScopeProperty, SignalDispose, SignalGet,
    SignalGetUntracked, SignalWith, SignalWithUntracked,
};
use std::{any::Any, cell::RefCell, marker::PhantomData, rc::Rc};

/// Creates an efficient derived reactive value based on other reactive
/// values.
///
/// Unlike a "derived signal" (a plain closure), a memo comes with two
/// guarantees:
/// 1. The memo will only run *once* per change, no matter how many times you
///    access its value.
/// 2. The memo will only notify its dependents if the value of the
///    computation changes — recomputing to an equal value short-circuits
///    propagation, which is what keeps the graph glitch-free.
///
/// Memos are lazy: the computation does not run until the first read, and a
/// stale memo recomputes on read rather than on write.
///
/// As with [`create_effect`](crate::create_effect), the argument to the memo
/// closure is the previous value, i.e. `None` on the initial calculation.
///
/// ```
/// # use vellum_reactive::*;
/// # fn really_expensive_computation(value: i32) -> i32 { value };
/// # create_scope(create_runtime(), |cx| {
/// let (value, set_value) = create_signal(cx, 0);
///
/// // the calculation runs when first read, then is cached
/// let memoized =
///     create_memo(cx, move |_| really_expensive_computation(value.get()));
/// create_effect(cx, move |_| {
///     // reads the current value without re-running the calculation
///     println!("memoized = {}", memoized.get());
/// });
/// # }).dispose();
/// ```
#[track_caller]
#[inline(always)]
pub fn create_memo<T>(
    cx: Scope,
    f: impl Fn(Option<&T>) -> T + 'static,
) -> Memo<T>
where
    T: PartialEq + 'static,
{
    let memo = cx.runtime.create_memo(f);
    cx.push_scope_property(ScopeProperty::Memo(memo.id));
    memo
}

/// A cached derivation of other reactive values. See [`create_memo`].
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Memo<T>
where
    T: 'static,
{
    pub(crate) runtime: RuntimeId,
    pub(crate) id: NodeId,
    pub(crate) ty: PhantomData<T>,
    #[cfg(debug_assertions)]
    pub(crate) defined_at: &'static std::panic::Location<'static>,
}

impl<T> Clone for Memo<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Memo<T> {}

impl<T> Memo<T> {
    /// The ID of the underlying reactive node, for diagnostics.
    pub fn node_id(&self) -> NodeId {
        self.id
    }
}

impl<T: Clone> SignalGet<T> for Memo<T> {
    fn get(&self) -> T {
        self.with(T::clone)
    }

    fn try_get(&self) -> Option<T> {
        self.try_with(T::clone)
    }
}

impl<T> SignalWith<T> for Memo<T> {
    fn with<O>(&self, f: impl FnOnce(&T) -> O) -> O {
        match with_runtime(self.runtime, |runtime| {
            self.id.try_with(runtime, |v: &Option<T>| {
                // the memo recomputed before this read, so the value slot is
                // always `Some` by now
                f(v.as_ref().expect("memo to have run"))
            })
        })
        .expect("runtime to be alive")
        {
            Ok(o) => o,
            Err(_) => crate::signal::panic_getting_dead_signal(
                #[cfg(debug_assertions)]
                self.defined_at,
            ),
        }
    }

    fn try_with<O>(&self, f: impl FnOnce(&T) -> O) -> Option<O> {
        with_runtime(self.runtime, |runtime| {
            self.id
                .try_with(runtime, |v: &Option<T>| v.as_ref().map(f))
                .ok()
                .flatten()
        })
        .ok()
        .flatten()
    }
}

impl<T: Clone> SignalGetUntracked<T> for Memo<T> {
    fn get_untracked(&self) -> T {
        self.with_untracked(T::clone)
    }

    fn try_get_untracked(&self) -> Option<T> {
        self.try_with_untracked(T::clone)
    }
}

impl<T> SignalWithUntracked<T> for Memo<T> {
    fn with_untracked<O>(&self, f: impl FnOnce(&T) -> O) -> O {
        match with_runtime(self.runtime, |runtime| {
            self.id.try_with_no_subscription(runtime, |v: &Option<T>| {
                f(v.as_ref().expect("memo to have run"))
            })
        })
        .expect("runtime to be alive")
        {
            Ok(o) => o,
            Err(_) => crate::signal::panic_getting_dead_signal(
                #[cfg(debug_assertions)]
                self.defined_at,
            ),
        }
    }

    fn try_with_untracked<O>(&self, f: impl FnOnce(&T) -> O) -> Option<O> {
        with_runtime(self.runtime, |runtime| {
            self.id
                .try_with_no_subscription(runtime, |v: &Option<T>| {
                    v.as_ref().map(f)
                })
                .ok()
                .flatten()
        })
        .ok()
        .flatten()
    }
}

impl<T> SignalDispose for Memo<T> {
    fn dispose(self) {
        _ = with_runtime(self.runtime, |runtime| {
            runtime.dispose_node(self.id);
        });
    }
}

pub(crate) struct MemoState<T, F>
where
    T: PartialEq + 'static,
    F: Fn(Option<&T>) -> T,
{
    pub f: F,
    pub t: PhantomData<T>,
    #[cfg(debug_assertions)]
    #[allow(dead_code)]
    pub defined_at: &'static std::panic::Location<'static>,
}

impl<T, F> AnyComputation for MemoState<T, F>
where
    T: PartialEq + 'static,
    F: Fn(Option<&T>) -> T,
{
    fn run(&self, value: Rc<RefCell<dyn Any>>) -> bool {
        let (new_value, is_different) = {
            let value = value.borrow();
            let curr_value = value
                .downcast_ref::<Option<T>>()
                .expect("to downcast memo value");

            // run the memo
            let new_value = (self.f)(curr_value.as_ref());
            let is_different = curr_value.as_ref() != Some(&new_value);
            (new_value, is_different)
        };
        if is_different {
            let mut value = value.borrow_mut();
            let value = value
                .downcast_mut::<Option<T>>()
                .expect("to downcast memo value");
            *value = Some(new_value);
        }

        is_different
    }
}
