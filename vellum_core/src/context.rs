use std::rc::Rc;
use vellum_reactive::{provide_context, use_context, Scope};

/// Declares a typed context channel with a default value.
///
/// [`provide`](Context::provide) binds a value for a scope and its
/// descendants; [`consume`](Context::consume) returns the nearest bound
/// value, falling back to the default when no ancestor provides one.
/// Shadowing and unbinding follow scope lifetimes, exactly as with
/// [`provide_context`] / [`use_context`].
///
/// Channels are keyed by the value type. Two independent channels carrying
/// the same underlying type should wrap it in distinct newtypes.
///
/// ```
/// # use vellum_core::*;
/// #[derive(Clone, PartialEq, Debug)]
/// struct Theme(&'static str);
///
/// let theme = create_context(Theme("light"));
///
/// create_scope(create_runtime(), move |cx| {
///     // no provider anywhere: the default applies
///     assert_eq!(theme.consume(cx), Theme("light"));
///
///     theme.provide(cx, Theme("dark"));
///     cx.run_child_scope(|child| {
///         assert_eq!(theme.consume(child), Theme("dark"));
///     });
/// })
/// .dispose();
/// ```
pub fn create_context<T>(default: T) -> Context<T>
where
    T: Clone + 'static,
{
    Context {
        default: Rc::new(default),
    }
}

/// A typed context channel created by [`create_context`]. Cheap to clone.
pub struct Context<T>
where
    T: Clone + 'static,
{
    default: Rc<T>,
}

impl<T> Clone for Context<T>
where
    T: Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            default: Rc::clone(&self.default),
        }
    }
}

impl<T> Context<T>
where
    T: Clone + 'static,
{
    /// Binds `value` for `cx` and its descendants. The binding disappears
    /// when `cx` is disposed.
    ///
    /// To make the provided value itself reactive, provide a signal or
    /// [`MaybeSignal`](vellum_reactive::MaybeSignal) as `T`.
    pub fn provide(&self, cx: Scope, value: T) {
        provide_context(cx, ProvidedValue(value));
    }

    /// Returns the nearest bound value, walking up the scope tree, or a
    /// clone of the default when no ancestor provides one.
    pub fn consume(&self, cx: Scope) -> T {
        match use_context::<ProvidedValue<T>>(cx) {
            Some(provided) => provided.0,
            None => (*self.default).clone(),
        }
    }

    /// Whether any ancestor of `cx` currently provides a value.
    pub fn is_provided(&self, cx: Scope) -> bool {
        use_context::<ProvidedValue<T>>(cx).is_some()
    }
}

#[derive(Clone)]
struct ProvidedValue<T: Clone + 'static>(T);
