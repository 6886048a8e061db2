use crate::{create_effect, Scope};
use std::{cell::RefCell, rc::Rc};

/// A reactive observer with an explicit dependency function.
///
/// `deps` runs under tracking and decides when the watcher wakes up;
/// `callback` runs *untracked* with the new dependency value, the previous
/// one, and whatever it returned last time. This is the subscription shape
/// external persistence layers want: they see old and new values without
/// accidentally widening the dependency set inside their own logic.
///
/// When `immediate` is false, the callback is skipped on the initial run and
/// first fires on the first change.
///
/// Returns a stop function. The watcher is also owned by `cx` like any other
/// effect, so disposal of the scope stops it too.
///
/// ```
/// # use vellum_reactive::*;
/// # run_scope(create_runtime(), |cx| {
/// let (count, set_count) = create_signal(cx, 0);
///
/// let stop = watch(
///     cx,
///     move || count.get(),
///     |count, prev_count, _| {
///         println!("count: {count}; previous: {prev_count:?}");
///     },
///     false,
/// );
///
/// set_count.set(1); // prints "count: 1; previous: Some(0)"
/// stop();
/// set_count.set(2); // nothing printed
/// # });
/// ```
pub fn watch<W, T>(
    cx: Scope,
    deps: impl Fn() -> W + 'static,
    callback: impl Fn(&W, Option<&W>, Option<T>) -> T + Clone + 'static,
    immediate: bool,
) -> impl Fn() + Clone
where
    W: Clone + 'static,
    T: 'static,
{
    let cur_deps_value = Rc::new(RefCell::new(None::<W>));
    let prev_deps_value = Rc::new(RefCell::new(None::<W>));
    let prev_callback_value = Rc::new(RefCell::new(None::<T>));

    let wrapped_callback = {
        let cur_deps_value = Rc::clone(&cur_deps_value);
        let prev_deps_value = Rc::clone(&prev_deps_value);
        let prev_callback_value = Rc::clone(&prev_callback_value);

        move || {
            callback(
                cur_deps_value.borrow().as_ref().expect(
                    "this will not be called before there is a deps value",
                ),
                prev_deps_value.borrow().as_ref(),
                prev_callback_value.take(),
            )
        }
    };

    let handle = create_effect(cx, {
        let prev_callback_value = Rc::clone(&prev_callback_value);

        move |did_run_before: Option<()>| {
            let deps_value = deps();

            let did_run_before = did_run_before.is_some();

            if !immediate && !did_run_before {
                prev_deps_value.replace(Some(deps_value));
                return;
            }

            cur_deps_value.replace(Some(deps_value.clone()));

            let callback_value =
                Some(cx.untrack(wrapped_callback.clone()));

            prev_callback_value.replace(callback_value);

            prev_deps_value.replace(Some(deps_value));
        }
    });

    move || handle.stop()
}
