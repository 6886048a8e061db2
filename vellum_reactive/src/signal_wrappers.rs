use crate::{
    Memo, ReadSignal, RwSignal, SignalGet, SignalGetUntracked, SignalWith,
    SignalWithUntracked,
};
use std::rc::Rc;

/// A wrapper for any kind of readable reactive value: a [`ReadSignal`], a
/// [`Memo`], or a derived-signal closure.
///
/// This allows you to create APIs that take any kind of readable value as an
/// argument without needing to be generic over the concrete signal type, at
/// the cost of a small amount of overhead for the wrapped closure case.
pub struct Signal<T>
where
    T: 'static,
{
    inner: SignalTypes<T>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

enum SignalTypes<T>
where
    T: 'static,
{
    ReadSignal(ReadSignal<T>),
    Memo(Memo<T>),
    DerivedSignal(Rc<dyn Fn() -> T>),
}

impl<T> Clone for SignalTypes<T> {
    fn clone(&self) -> Self {
        match self {
            Self::ReadSignal(s) => Self::ReadSignal(*s),
            Self::Memo(m) => Self::Memo(*m),
            Self::DerivedSignal(f) => Self::DerivedSignal(Rc::clone(f)),
        }
    }
}

impl<T> Signal<T> {
    /// Wraps a derived signal: any closure that reads other signals.
    pub fn derive(f: impl Fn() -> T + 'static) -> Self {
        Self {
            inner: SignalTypes::DerivedSignal(Rc::new(f)),
        }
    }
}

impl<T: Clone> SignalGet<T> for Signal<T> {
    fn get(&self) -> T {
        match &self.inner {
            SignalTypes::ReadSignal(s) => s.get(),
            SignalTypes::Memo(m) => m.get(),
            SignalTypes::DerivedSignal(f) => f(),
        }
    }

    fn try_get(&self) -> Option<T> {
        match &self.inner {
            SignalTypes::ReadSignal(s) => s.try_get(),
            SignalTypes::Memo(m) => m.try_get(),
            SignalTypes::DerivedSignal(f) => Some(f()),
        }
    }
}

impl<T> SignalWith<T> for Signal<T> {
    fn with<O>(&self, f: impl FnOnce(&T) -> O) -> O {
        match &self.inner {
            SignalTypes::ReadSignal(s) => s.with(f),
            SignalTypes::Memo(m) => m.with(f),
            SignalTypes::DerivedSignal(v) => f(&v()),
        }
    }

    fn try_with<O>(&self, f: impl FnOnce(&T) -> O) -> Option<O> {
        match &self.inner {
            SignalTypes::ReadSignal(s) => s.try_with(f),
            SignalTypes::Memo(m) => m.try_with(f),
            SignalTypes::DerivedSignal(v) => Some(f(&v())),
        }
    }
}

impl<T: Clone> SignalGetUntracked<T> for Signal<T> {
    fn get_untracked(&self) -> T {
        match &self.inner {
            SignalTypes::ReadSignal(s) => s.get_untracked(),
            SignalTypes::Memo(m) => m.get_untracked(),
            SignalTypes::DerivedSignal(f) => f(),
        }
    }

    fn try_get_untracked(&self) -> Option<T> {
        match &self.inner {
            SignalTypes::ReadSignal(s) => s.try_get_untracked(),
            SignalTypes::Memo(m) => m.try_get_untracked(),
            SignalTypes::DerivedSignal(f) => Some(f()),
        }
    }
}

impl<T> SignalWithUntracked<T> for Signal<T> {
    fn with_untracked<O>(&self, f: impl FnOnce(&T) -> O) -> O {
        match &self.inner {
            SignalTypes::ReadSignal(s) => s.with_untracked(f),
            SignalTypes::Memo(m) => m.with_untracked(f),
            SignalTypes::DerivedSignal(v) => f(&v()),
        }
    }

    fn try_with_untracked<O>(&self, f: impl FnOnce(&T) -> O) -> Option<O> {
        match &self.inner {
            SignalTypes::ReadSignal(s) => s.try_with_untracked(f),
            SignalTypes::Memo(m) => m.try_with_untracked(f),
            SignalTypes::DerivedSignal(v) => Some(f(&v())),
        }
    }
}

impl<T> From<ReadSignal<T>> for Signal<T> {
    fn from(value: ReadSignal<T>) -> Self {
        Self {
            inner: SignalTypes::ReadSignal(value),
        }
    }
}

impl<T> From<RwSignal<T>> for Signal<T> {
    fn from(value: RwSignal<T>) -> Self {
        Self {
            inner: SignalTypes::ReadSignal(value.read_only()),
        }
    }
}

impl<T> From<Memo<T>> for Signal<T> {
    fn from(value: Memo<T>) -> Self {
        Self {
            inner: SignalTypes::Memo(value),
        }
    }
}

impl<T> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            SignalTypes::ReadSignal(_) => {
                f.debug_tuple("Signal::ReadSignal").finish()
            }
            SignalTypes::Memo(_) => f.debug_tuple("Signal::Memo").finish(),
            SignalTypes::DerivedSignal(_) => {
                f.debug_tuple("Signal::DerivedSignal").finish()
            }
        }
    }
}

/// A component prop that is either a static value (a setup-time snapshot)
/// or a [`Signal`] (live: reading it under an effect re-runs the effect when
/// it changes).
///
/// This pins down the props-reactivity contract: a plain value locks the
/// prop to whatever it was when the component was set up; a signal keeps the
/// rendered output in sync with its source.
///
/// ```
/// # use vellum_reactive::*;
/// # create_scope(create_runtime(), |cx| {
/// fn above_threshold(value: MaybeSignal<i32>) -> bool {
///     value.get() > 3
/// }
///
/// let (count, set_count) = create_signal(cx, 4);
///
/// // static and dynamic props go through the same argument
/// assert!(above_threshold(5.into()));
/// assert!(above_threshold(count.into()));
/// # }).dispose();
/// ```
#[derive(Clone, Debug)]
pub enum MaybeSignal<T>
where
    T: 'static,
{
    /// A static, setup-time value.
    Static(T),
    /// A live reactive value.
    Dynamic(Signal<T>),
}

impl<T: Default> Default for MaybeSignal<T> {
    fn default() -> Self {
        Self::Static(Default::default())
    }
}

impl<T: Clone> SignalGet<T> for MaybeSignal<T> {
    fn get(&self) -> T {
        match self {
            Self::Static(t) => t.clone(),
            Self::Dynamic(s) => s.get(),
        }
    }

    fn try_get(&self) -> Option<T> {
        match self {
            Self::Static(t) => Some(t.clone()),
            Self::Dynamic(s) => s.try_get(),
        }
    }
}

impl<T> SignalWith<T> for MaybeSignal<T> {
    fn with<O>(&self, f: impl FnOnce(&T) -> O) -> O {
        match self {
            Self::Static(t) => f(t),
            Self::Dynamic(s) => s.with(f),
        }
    }

    fn try_with<O>(&self, f: impl FnOnce(&T) -> O) -> Option<O> {
        match self {
            Self::Static(t) => Some(f(t)),
            Self::Dynamic(s) => s.try_with(f),
        }
    }
}

impl<T: Clone> SignalGetUntracked<T> for MaybeSignal<T> {
    fn get_untracked(&self) -> T {
        match self {
            Self::Static(t) => t.clone(),
            Self::Dynamic(s) => s.get_untracked(),
        }
    }

    fn try_get_untracked(&self) -> Option<T> {
        match self {
            Self::Static(t) => Some(t.clone()),
            Self::Dynamic(s) => s.try_get_untracked(),
        }
    }
}

impl<T> MaybeSignal<T> {
    /// Wraps a derived signal, making this prop live.
    pub fn derive(f: impl Fn() -> T + 'static) -> Self {
        Self::Dynamic(Signal::derive(f))
    }
}

impl<T> From<T> for MaybeSignal<T> {
    fn from(value: T) -> Self {
        Self::Static(value)
    }
}

impl<T> From<ReadSignal<T>> for MaybeSignal<T> {
    fn from(value: ReadSignal<T>) -> Self {
        Self::Dynamic(value.into())
    }
}

impl<T> From<RwSignal<T>> for MaybeSignal<T> {
    fn from(value: RwSignal<T>) -> Self {
        Self::Dynamic(value.into())
    }
}

impl<T> From<Memo<T>> for MaybeSignal<T> {
    fn from(value: Memo<T>) -> Self {
        Self::Dynamic(value.into())
    }
}

impl<T> From<Signal<T>> for MaybeSignal<T> {
    fn from(value: Signal<T>) -> Self {
        Self::Dynamic(value)
    }
}

impl From<&str> for MaybeSignal<String> {
    fn from(value: &str) -> Self {
        Self::Static(value.to_string())
    }
}
