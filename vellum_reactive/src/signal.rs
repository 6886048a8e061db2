use crate::{
    create_effect, on_cleanup,
    node::NodeId,
    runtime::{notify, with_runtime, Runtime, RuntimeId},
    Scope, ScopeProperty,
};
use futures::Stream;
use std::{marker::PhantomData, pin::Pin};
use thiserror::Error;

/// Errors produced when accessing a reactive node.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SignalError {
    /// The runtime that owned the signal has been disposed.
    #[error("tried to access a signal in a runtime that has been disposed")]
    RuntimeDisposed,
    /// The signal's owning scope has been disposed.
    #[error("tried to access a signal that has been disposed")]
    Disposed,
    /// The stored value was not of the requested type.
    #[error("error casting signal to type {0}")]
    Type(&'static str),
}

/// This trait allows getting an owned value of the signal's inner type.
pub trait SignalGet<T> {
    /// Clones and returns the current value of the signal, and subscribes
    /// the running observer (effect or memo) to this signal.
    ///
    /// # Panics
    /// Panics if you try to access a signal that was created in a [`Scope`]
    /// that has been disposed.
    #[track_caller]
    fn get(&self) -> T;

    /// Clones and returns the signal value, returning [`Some`] if the signal
    /// is still alive, and [`None`] otherwise.
    fn try_get(&self) -> Option<T>;
}

/// This trait allows obtaining an immutable reference to the signal's
/// inner type.
pub trait SignalWith<T> {
    /// Applies a function to the current value of the signal, and subscribes
    /// the running observer to this signal.
    ///
    /// # Panics
    /// Panics if you try to access a signal that was created in a [`Scope`]
    /// that has been disposed.
    #[track_caller]
    fn with<O>(&self, f: impl FnOnce(&T) -> O) -> O;

    /// Applies a function to the current value of the signal, and subscribes
    /// the running observer to this signal. Returns [`Some`] if the signal
    /// is valid and the function ran, otherwise returns [`None`].
    fn try_with<O>(&self, f: impl FnOnce(&T) -> O) -> Option<O>;
}

/// This trait allows setting the value of a signal.
pub trait SignalSet<T> {
    /// Sets the signal’s value and notifies subscribers.
    ///
    /// **Note:** `set()` does not auto-memoize, i.e., it will notify
    /// subscribers even if the value has not actually changed.
    #[track_caller]
    fn set(&self, new_value: T);

    /// Sets the signal’s value and notifies subscribers. Returns [`None`]
    /// if the signal is still valid, [`Some(T)`] otherwise.
    fn try_set(&self, new_value: T) -> Option<T>;
}

/// This trait allows updating the inner value of a signal.
pub trait SignalUpdate<T> {
    /// Applies a function to the current value to mutate it in place
    /// and notifies subscribers that the signal has changed.
    #[track_caller]
    fn update(&self, f: impl FnOnce(&mut T));

    /// Applies a function to the current value to mutate it in place
    /// and notifies subscribers that the signal has changed. Returns
    /// [`Some(O)`] if the signal is still valid, [`None`] otherwise.
    fn try_update<O>(&self, f: impl FnOnce(&mut T) -> O) -> Option<O>;
}

/// Allows getting the inner value without subscribing the running observer.
/// This is the "peek" operation: it never records a dependency.
pub trait SignalGetUntracked<T> {
    /// Gets the signal's value without creating a dependency on the
    /// running observer.
    ///
    /// # Panics
    /// Panics if you try to access a signal that was created in a [`Scope`]
    /// that has been disposed.
    #[track_caller]
    fn get_untracked(&self) -> T;

    /// Gets the signal's value without creating a dependency on the
    /// running observer. Returns [`Some(T)`] if the signal is still
    /// valid, [`None`] otherwise.
    fn try_get_untracked(&self) -> Option<T>;
}

/// Allows getting a reference to the signal's inner value without creating
/// a dependency on it.
pub trait SignalWithUntracked<T> {
    /// Runs the provided closure with a reference to the current
    /// value without creating a dependency on the running observer.
    ///
    /// # Panics
    /// Panics if you try to access a signal that was created in a [`Scope`]
    /// that has been disposed.
    #[track_caller]
    fn with_untracked<O>(&self, f: impl FnOnce(&T) -> O) -> O;

    /// Runs the provided closure with a reference to the current
    /// value without creating a dependency on the running observer.
    /// Returns [`Some(O)`] if the signal is still valid, [`None`]
    /// otherwise.
    #[track_caller]
    fn try_with_untracked<O>(&self, f: impl FnOnce(&T) -> O) -> Option<O>;
}

/// Allows setting the inner value without notifying dependents.
pub trait SignalSetUntracked<T> {
    /// Sets the signal's value without notifying dependents.
    #[track_caller]
    fn set_untracked(&self, new_value: T);

    /// Attempts to set the signal if it's still valid. Returns [`None`]
    /// if the signal was set, [`Some(T)`] otherwise.
    #[track_caller]
    fn try_set_untracked(&self, new_value: T) -> Option<T>;
}

/// Allows updating the signal's value without notifying dependents.
pub trait SignalUpdateUntracked<T> {
    /// Runs the provided closure with a mutable reference to the current
    /// value without notifying dependents.
    #[track_caller]
    fn update_untracked(&self, f: impl FnOnce(&mut T));

    /// Runs the provided closure with a mutable reference to the current
    /// value without notifying dependents and returns the value the closure
    /// returned.
    fn try_update_untracked<O>(&self, f: impl FnOnce(&mut T) -> O)
        -> Option<O>;
}

/// This trait allows converting a signal into an async [`Stream`].
pub trait SignalStream<T> {
    /// Generates a [`Stream`] that emits the current value of the signal,
    /// then its new value whenever it changes.
    ///
    /// The underlying subscription is owned by the given scope: it stays
    /// stable until that scope is disposed, at which point the stream ends.
    /// This is the seam external persistence layers subscribe through.
    ///
    /// # Panics
    /// Panics if you try to access a signal that was created in a [`Scope`]
    /// that has been disposed.
    #[track_caller]
    fn to_stream(&self, cx: Scope) -> Pin<Box<dyn Stream<Item = T>>>;
}

/// This trait allows disposing a reactive node before its owning scope is
/// disposed.
pub trait SignalDispose {
    /// Disposes of the node. Reads and writes through disposed handles fail
    /// softly through the `try_` accessors.
    fn dispose(self);
}

/// Creates a signal, the basic reactive primitive: a writable source of one
/// value that notifies its readers when written.
///
/// Takes the owning [`Scope`] and an initial value, and returns a
/// ([`ReadSignal`], [`WriteSignal`]) pair.
///
/// ```
/// # use vellum_reactive::*;
/// # create_scope(create_runtime(), |cx| {
/// let (count, set_count) = create_signal(cx, 0);
///
/// // the getter clones and returns the value
/// assert_eq!(count.get(), 0);
///
/// // the setter sets the value
/// set_count.set(1);
/// assert_eq!(count.get(), 1);
///
/// // to read the current value inside a write, use update()
/// set_count.update(|count: &mut i32| *count += 1);
/// assert_eq!(count.get(), 2);
///
/// // "derived signals" are plain closures over the getter
/// let double_count = move || count.get() * 2; // signals are `Copy`
/// set_count.set(1);
/// assert_eq!(double_count(), 2);
/// # }).dispose();
/// ```
#[track_caller]
pub fn create_signal<T>(
    cx: Scope,
    value: T,
) -> (ReadSignal<T>, WriteSignal<T>) {
    let s = cx.runtime.create_signal(value);
    cx.push_scope_property(ScopeProperty::Signal(s.0.id));
    s
}

/// Creates a signal without the read-write segregation of
/// [`create_signal`]: a single [`RwSignal`] handle that can both read and
/// write.
///
/// ```
/// # use vellum_reactive::*;
/// # create_scope(create_runtime(), |cx| {
/// let count = create_rw_signal(cx, 0);
/// count.set(1);
/// assert_eq!(count.get(), 1);
/// # }).dispose();
/// ```
#[track_caller]
pub fn create_rw_signal<T>(cx: Scope, value: T) -> RwSignal<T> {
    let s = cx.runtime.create_rw_signal(value);
    cx.push_scope_property(ScopeProperty::Signal(s.id));
    s
}

/// The getter for a reactive signal.
///
/// `ReadSignal` is [`Copy`] and `'static`, so it moves cheaply into closures
/// and structs.
///
/// ## Core Trait Implementations
/// - [`.get()`](SignalGet::get) clones the current value and subscribes the
///   running observer.
///   - [`.get_untracked()`](SignalGetUntracked::get_untracked) clones the
///     value without tracking ("peek").
/// - [`.with()`](SignalWith::with) reads the value by reference without
///   cloning.
/// - [`.to_stream()`](SignalStream::to_stream) converts the signal into an
///   async stream of values.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ReadSignal<T>
where
    T: 'static,
{
    pub(crate) runtime: RuntimeId,
    pub(crate) id: NodeId,
    pub(crate) ty: PhantomData<T>,
    #[cfg(debug_assertions)]
    pub(crate) defined_at: &'static std::panic::Location<'static>,
}

impl<T> Clone for ReadSignal<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ReadSignal<T> {}

impl<T> ReadSignal<T> {
    /// The ID of the underlying reactive node, for diagnostics.
    pub fn node_id(&self) -> NodeId {
        self.id
    }
}

impl<T: Clone> SignalGet<T> for ReadSignal<T> {
    fn get(&self) -> T {
        match with_runtime(self.runtime, |runtime| {
            self.id.try_with(runtime, T::clone)
        })
        .expect("runtime to be alive")
        {
            Ok(t) => t,
            Err(_) => panic_getting_dead_signal(
                #[cfg(debug_assertions)]
                self.defined_at,
            ),
        }
    }

    fn try_get(&self) -> Option<T> {
        self.try_with(Clone::clone)
    }
}

impl<T> SignalWith<T> for ReadSignal<T> {
    fn with<O>(&self, f: impl FnOnce(&T) -> O) -> O {
        match with_runtime(self.runtime, |runtime| self.id.try_with(runtime, f))
            .expect("runtime to be alive")
        {
            Ok(o) => o,
            Err(_) => panic_getting_dead_signal(
                #[cfg(debug_assertions)]
                self.defined_at,
            ),
        }
    }

    fn try_with<O>(&self, f: impl FnOnce(&T) -> O) -> Option<O> {
        with_runtime(self.runtime, |runtime| self.id.try_with(runtime, f).ok())
            .ok()
            .flatten()
    }
}

impl<T: Clone> SignalGetUntracked<T> for ReadSignal<T> {
    fn get_untracked(&self) -> T {
        match with_runtime(self.runtime, |runtime| {
            self.id.try_with_no_subscription(runtime, T::clone)
        })
        .expect("runtime to be alive")
        {
            Ok(t) => t,
            Err(_) => panic_getting_dead_signal(
                #[cfg(debug_assertions)]
                self.defined_at,
            ),
        }
    }

    fn try_get_untracked(&self) -> Option<T> {
        with_runtime(self.runtime, |runtime| {
            self.id.try_with_no_subscription(runtime, Clone::clone).ok()
        })
        .ok()
        .flatten()
    }
}

impl<T> SignalWithUntracked<T> for ReadSignal<T> {
    fn with_untracked<O>(&self, f: impl FnOnce(&T) -> O) -> O {
        match with_runtime(self.runtime, |runtime| {
            self.id.try_with_no_subscription(runtime, f)
        })
        .expect("runtime to be alive")
        {
            Ok(o) => o,
            Err(_) => panic_getting_dead_signal(
                #[cfg(debug_assertions)]
                self.defined_at,
            ),
        }
    }

    fn try_with_untracked<O>(&self, f: impl FnOnce(&T) -> O) -> Option<O> {
        with_runtime(self.runtime, |runtime| {
            self.id.try_with_no_subscription(runtime, f).ok()
        })
        .ok()
        .flatten()
    }
}

impl<T: Clone> SignalStream<T> for ReadSignal<T> {
    fn to_stream(&self, cx: Scope) -> Pin<Box<dyn Stream<Item = T>>> {
        let (tx, rx) = futures::channel::mpsc::unbounded();

        let close_channel = tx.clone();

        on_cleanup(cx, move || close_channel.close_channel());

        let this = *self;
        create_effect(cx, move |_| {
            _ = tx.unbounded_send(this.get());
        });

        Box::pin(rx)
    }
}

impl<T> SignalDispose for ReadSignal<T> {
    fn dispose(self) {
        dispose_node(self.runtime, self.id);
    }
}

/// The setter for a reactive signal.
///
/// Calling [`.set()`](SignalSet::set) or [`.update()`](SignalUpdate::update)
/// notifies subscribers and, outside a [batch](Scope::batch), flushes the
/// effect queue synchronously.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct WriteSignal<T>
where
    T: 'static,
{
    pub(crate) runtime: RuntimeId,
    pub(crate) id: NodeId,
    pub(crate) ty: PhantomData<T>,
    #[cfg(debug_assertions)]
    pub(crate) defined_at: &'static std::panic::Location<'static>,
}

impl<T> Clone for WriteSignal<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for WriteSignal<T> {}

impl<T> SignalSet<T> for WriteSignal<T> {
    fn set(&self, new_value: T) {
        self.update(|v| *v = new_value);
    }

    fn try_set(&self, new_value: T) -> Option<T> {
        let mut new_value = Some(new_value);
        _ = self.try_update(|v| *v = new_value.take().unwrap());
        new_value
    }
}

impl<T> SignalUpdate<T> for WriteSignal<T> {
    fn update(&self, f: impl FnOnce(&mut T)) {
        if self.try_update(f).is_none() {
            panic_setting_dead_signal(
                #[cfg(debug_assertions)]
                self.defined_at,
            );
        }
    }

    fn try_update<O>(&self, f: impl FnOnce(&mut T) -> O) -> Option<O> {
        let updated = with_runtime(self.runtime, |runtime| {
            self.id.try_update_value(runtime, f)
        })
        .ok()
        .flatten();
        if updated.is_some() {
            notify(self.runtime, self.id);
        }
        updated
    }
}

impl<T> SignalSetUntracked<T> for WriteSignal<T> {
    fn set_untracked(&self, new_value: T) {
        if self
            .try_update_untracked(|v| *v = new_value)
            .is_none()
        {
            panic_setting_dead_signal(
                #[cfg(debug_assertions)]
                self.defined_at,
            );
        }
    }

    fn try_set_untracked(&self, new_value: T) -> Option<T> {
        let mut new_value = Some(new_value);
        _ = self.try_update_untracked(|v| *v = new_value.take().unwrap());
        new_value
    }
}

impl<T> SignalUpdateUntracked<T> for WriteSignal<T> {
    fn update_untracked(&self, f: impl FnOnce(&mut T)) {
        if self.try_update_untracked(f).is_none() {
            panic_setting_dead_signal(
                #[cfg(debug_assertions)]
                self.defined_at,
            );
        }
    }

    fn try_update_untracked<O>(
        &self,
        f: impl FnOnce(&mut T) -> O,
    ) -> Option<O> {
        with_runtime(self.runtime, |runtime| {
            self.id.try_update_value(runtime, f)
        })
        .ok()
        .flatten()
    }
}

impl<T> SignalDispose for WriteSignal<T> {
    fn dispose(self) {
        dispose_node(self.runtime, self.id);
    }
}

/// A signal that can be both read and written through a single handle.
///
/// ## Core Trait Implementations
/// All of [`ReadSignal`]'s read traits and [`WriteSignal`]'s write traits,
/// plus [`read_only`](RwSignal::read_only) and
/// [`write_only`](RwSignal::write_only) projections.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct RwSignal<T>
where
    T: 'static,
{
    pub(crate) runtime: RuntimeId,
    pub(crate) id: NodeId,
    pub(crate) ty: PhantomData<T>,
    #[cfg(debug_assertions)]
    pub(crate) defined_at: &'static std::panic::Location<'static>,
}

impl<T> Clone for RwSignal<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for RwSignal<T> {}

impl<T> RwSignal<T> {
    /// Projects this signal to a read-only handle with identical tracking
    /// behavior and no setter. The projection is by value: the two handles
    /// share the same underlying node but are distinct values.
    ///
    /// ```
    /// # use vellum_reactive::*;
    /// # create_scope(create_runtime(), |cx| {
    /// let count = create_rw_signal(cx, 0);
    /// let read_count = count.read_only();
    /// count.set(1);
    /// assert_eq!(read_count.get(), 1);
    /// # }).dispose();
    /// ```
    #[track_caller]
    pub fn read_only(&self) -> ReadSignal<T> {
        ReadSignal {
            runtime: self.runtime,
            id: self.id,
            ty: PhantomData,
            #[cfg(debug_assertions)]
            defined_at: std::panic::Location::caller(),
        }
    }

    /// Projects this signal to a write-only handle.
    #[track_caller]
    pub fn write_only(&self) -> WriteSignal<T> {
        WriteSignal {
            runtime: self.runtime,
            id: self.id,
            ty: PhantomData,
            #[cfg(debug_assertions)]
            defined_at: std::panic::Location::caller(),
        }
    }

    /// Splits this signal into its getter and setter halves.
    #[track_caller]
    pub fn split(&self) -> (ReadSignal<T>, WriteSignal<T>) {
        (self.read_only(), self.write_only())
    }

    /// The ID of the underlying reactive node, for diagnostics.
    pub fn node_id(&self) -> NodeId {
        self.id
    }
}

impl<T: Clone> SignalGet<T> for RwSignal<T> {
    fn get(&self) -> T {
        self.read_only().get()
    }

    fn try_get(&self) -> Option<T> {
        self.read_only().try_get()
    }
}

impl<T> SignalWith<T> for RwSignal<T> {
    fn with<O>(&self, f: impl FnOnce(&T) -> O) -> O {
        self.read_only().with(f)
    }

    fn try_with<O>(&self, f: impl FnOnce(&T) -> O) -> Option<O> {
        self.read_only().try_with(f)
    }
}

impl<T: Clone> SignalGetUntracked<T> for RwSignal<T> {
    fn get_untracked(&self) -> T {
        self.read_only().get_untracked()
    }

    fn try_get_untracked(&self) -> Option<T> {
        self.read_only().try_get_untracked()
    }
}

impl<T> SignalWithUntracked<T> for RwSignal<T> {
    fn with_untracked<O>(&self, f: impl FnOnce(&T) -> O) -> O {
        self.read_only().with_untracked(f)
    }

    fn try_with_untracked<O>(&self, f: impl FnOnce(&T) -> O) -> Option<O> {
        self.read_only().try_with_untracked(f)
    }
}

impl<T> SignalSet<T> for RwSignal<T> {
    fn set(&self, new_value: T) {
        self.write_only().set(new_value)
    }

    fn try_set(&self, new_value: T) -> Option<T> {
        self.write_only().try_set(new_value)
    }
}

impl<T> SignalUpdate<T> for RwSignal<T> {
    fn update(&self, f: impl FnOnce(&mut T)) {
        self.write_only().update(f)
    }

    fn try_update<O>(&self, f: impl FnOnce(&mut T) -> O) -> Option<O> {
        self.write_only().try_update(f)
    }
}

impl<T> SignalSetUntracked<T> for RwSignal<T> {
    fn set_untracked(&self, new_value: T) {
        self.write_only().set_untracked(new_value)
    }

    fn try_set_untracked(&self, new_value: T) -> Option<T> {
        self.write_only().try_set_untracked(new_value)
    }
}

impl<T> SignalUpdateUntracked<T> for RwSignal<T> {
    fn update_untracked(&self, f: impl FnOnce(&mut T)) {
        self.write_only().update_untracked(f)
    }

    fn try_update_untracked<O>(
        &self,
        f: impl FnOnce(&mut T) -> O,
    ) -> Option<O> {
        self.write_only().try_update_untracked(f)
    }
}

impl<T: Clone> SignalStream<T> for RwSignal<T> {
    fn to_stream(&self, cx: Scope) -> Pin<Box<dyn Stream<Item = T>>> {
        self.read_only().to_stream(cx)
    }
}

impl<T> SignalDispose for RwSignal<T> {
    fn dispose(self) {
        dispose_node(self.runtime, self.id);
    }
}

fn dispose_node(runtime: RuntimeId, node: NodeId) {
    _ = with_runtime(runtime, |runtime| {
        runtime.dispose_node(node);
    });
}

impl NodeId {
    pub(crate) fn subscribe(&self, runtime: &Runtime) {
        // add the observer to this node's subscribers, and this node to the
        // observer's sources
        if let Some(observer) = runtime.observer.get() {
            {
                let mut subs = runtime.node_subscribers.borrow_mut();
                if let Some(subs) = subs.entry(*self) {
                    subs.or_default().borrow_mut().insert(observer);
                }
            }
            {
                let mut sources = runtime.node_sources.borrow_mut();
                if let Some(sources) = sources.entry(observer) {
                    sources.or_default().borrow_mut().insert(*self);
                }
            }
        }
    }

    pub(crate) fn try_with_no_subscription<T, U>(
        &self,
        runtime: &Runtime,
        f: impl FnOnce(&T) -> U,
    ) -> Result<U, SignalError>
    where
        T: 'static,
    {
        // a memo that is stale recomputes before it is read
        runtime.update_if_necessary(*self);

        let value = runtime.get_value(*self).ok_or(SignalError::Disposed)?;
        let value = value.borrow();
        let value = value
            .downcast_ref::<T>()
            .ok_or_else(|| SignalError::Type(std::any::type_name::<T>()))?;
        Ok(f(value))
    }

    pub(crate) fn try_with<T, U>(
        &self,
        runtime: &Runtime,
        f: impl FnOnce(&T) -> U,
    ) -> Result<U, SignalError>
    where
        T: 'static,
    {
        self.subscribe(runtime);
        self.try_with_no_subscription(runtime, f)
    }

    /// Mutates the stored value in place without marking or flushing;
    /// callers notify afterwards if the write should propagate.
    pub(crate) fn try_update_value<T, U>(
        &self,
        runtime: &Runtime,
        f: impl FnOnce(&mut T) -> U,
    ) -> Option<U>
    where
        T: 'static,
    {
        let value = runtime.get_value(*self)?;
        let mut value = value.borrow_mut();
        let value = value.downcast_mut::<T>()?;
        Some(f(value))
    }
}

#[track_caller]
pub(crate) fn panic_getting_dead_signal(
    #[cfg(debug_assertions)] defined_at: &'static std::panic::Location<
        'static,
    >,
) -> ! {
    #[cfg(debug_assertions)]
    panic!(
        "tried to access a signal defined at {defined_at} after it was \
         disposed"
    );
    #[cfg(not(debug_assertions))]
    panic!("tried to access a signal after it was disposed");
}

#[track_caller]
pub(crate) fn panic_setting_dead_signal(
    #[cfg(debug_assertions)] defined_at: &'static std::panic::Location<
        'static,
    >,
) -> ! {
    #[cfg(debug_assertions)]
    panic!(
        "tried to set a signal defined at {defined_at} after it was disposed"
    );
    #[cfg(not(debug_assertions))]
    panic!("tried to set a signal after it was disposed");
}
