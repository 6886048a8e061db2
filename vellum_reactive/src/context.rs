use crate::{macros::debug_warn, runtime::with_runtime, Scope};
use std::any::{Any, TypeId};

/// Provides a context value of type `T` to the given [`Scope`] and all of
/// its descendants. The value can be consumed lower in the scope tree using
/// [`use_context`].
///
/// This is useful for passing values down to components or functions lower
/// in a hierarchy without “prop drilling” — threading them through each
/// layer as arguments or properties.
///
/// Context works like variable scope: a value provided higher in the scope
/// tree is visible lower down, and a provider in a nested scope *shadows*
/// an ancestor provider of the same type for its own descendants only. When
/// the providing scope is disposed, the binding disappears and descendants
/// created afterwards see the outer value again.
///
/// Contexts are keyed by the *type* of the value. To provide two separate
/// values of the same underlying type, use the newtype pattern:
///
/// ```
/// use vellum_reactive::*;
///
/// // a newtype keeps this `WriteSignal<i32>` context distinct from any
/// // other `WriteSignal<i32>` we might also want to share
/// #[derive(Copy, Clone)]
/// struct ValueSetter(WriteSignal<i32>);
///
/// create_scope(create_runtime(), |cx| {
///     let (value, set_value) = create_signal(cx, 0);
///     provide_context(cx, ValueSetter(set_value));
///
///     cx.run_child_scope(|child| {
///         let setter = use_context::<ValueSetter>(child).unwrap().0;
///         setter.set(42);
///     });
///     assert_eq!(value.get(), 42);
/// })
/// .dispose();
/// ```
#[track_caller]
pub fn provide_context<T>(cx: Scope, value: T)
where
    T: Clone + 'static,
{
    let id = value.type_id();

    _ = with_runtime(cx.runtime, |runtime| {
        if runtime.scopes.borrow().get(cx.id).is_none() {
            debug_warn!(
                "provide_context() called on a scope that has been disposed"
            );
            return;
        }
        let mut contexts = runtime.scope_contexts.borrow_mut();
        if let Some(context) = contexts.entry(cx.id) {
            context
                .or_default()
                .insert(id, Box::new(value) as Box<dyn Any>);
        }
    });
}

/// Extracts a context value of type `T` from the scope tree by walking
/// upwards from the given [`Scope`] through its parents, returning the
/// nearest provided value, or `None` if no ancestor provides one.
///
/// Insertion is O(1); lookup is O(depth of the scope tree).
pub fn use_context<T>(cx: Scope) -> Option<T>
where
    T: Clone + 'static,
{
    let ty = TypeId::of::<T>();

    with_runtime(cx.runtime, |runtime| {
        let contexts = runtime.scope_contexts.borrow();
        let parents = runtime.scope_parents.borrow();
        let mut id = Some(cx.id);
        while let Some(scope_id) = id {
            if let Some(value) =
                contexts.get(scope_id).and_then(|context| context.get(&ty))
            {
                let value = value
                    .downcast_ref::<T>()
                    .expect("context value to be of the keyed type");
                return Some(value.clone());
            }
            id = parents.get(scope_id).copied();
        }
        None
    })
    .ok()
    .flatten()
}

/// Like [`use_context`], but panics with a descriptive message if no
/// ancestor scope provides a value of type `T`.
#[track_caller]
pub fn expect_context<T>(cx: Scope) -> T
where
    T: Clone + 'static,
{
    use_context(cx).unwrap_or_else(|| {
        panic!(
            "expected context of type {:?} to be present",
            std::any::type_name::<T>()
        )
    })
}
