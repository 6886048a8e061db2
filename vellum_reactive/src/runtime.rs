use crate::{
    node::{NodeId, ReactiveNode, ReactiveNodeState, ReactiveNodeType},
    AnyComputation, Effect, EffectHandle, Memo, MemoState, ReadSignal,
    RwSignal, Scope, ScopeDisposer, ScopeId, ScopeProperty, WriteSignal,
};
use core::hash::BuildHasherDefault;
use indexmap::IndexSet;
use rustc_hash::{FxHashMap, FxHasher};
use slotmap::{SecondaryMap, SlotMap, SparseSecondaryMap};
use std::{
    any::{Any, TypeId},
    cell::{Cell, RefCell},
    fmt::Debug,
    marker::PhantomData,
    rc::Rc,
};
use thiserror::Error;

thread_local! {
    pub(crate) static RUNTIMES: RefCell<SlotMap<RuntimeId, Runtime>> = Default::default();
}

pub(crate) type FxIndexSet<T> = IndexSet<T, BuildHasherDefault<FxHasher>>;

/// How many effect runs a single flush may spend per initially-queued effect
/// before the scheduler assumes the graph is cycling.
pub(crate) const SCHEDULER_CYCLE_LIMIT: usize = 64;

/// Errors produced by the reactive scheduler itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReactiveError {
    /// The effect queue kept refilling past the scheduler's safety bound.
    /// The flush was aborted and the queue cleared; the graph itself
    /// remains valid.
    #[error(
        "effect cycle detected: the scheduler ran {runs} effects in a single \
         flush without draining the queue"
    )]
    CycleDetected {
        /// Number of effect runs spent before the flush was aborted.
        runs: usize,
    },
}

// The data structure that owns all the signals, memos, effects, scopes, and
// contexts of one reactive system.
#[derive(Default)]
pub(crate) struct Runtime {
    pub observer: Cell<Option<NodeId>>,
    pub scopes: RefCell<SlotMap<ScopeId, RefCell<Vec<ScopeProperty>>>>,
    pub scope_parents: RefCell<SparseSecondaryMap<ScopeId, ScopeId>>,
    pub scope_children: RefCell<SparseSecondaryMap<ScopeId, Vec<ScopeId>>>,
    #[allow(clippy::type_complexity)]
    pub scope_contexts:
        RefCell<SparseSecondaryMap<ScopeId, FxHashMap<TypeId, Box<dyn Any>>>>,
    #[allow(clippy::type_complexity)]
    pub scope_cleanups:
        RefCell<SparseSecondaryMap<ScopeId, Vec<Box<dyn FnOnce()>>>>,
    pub nodes: RefCell<SlotMap<NodeId, ReactiveNode>>,
    pub node_subscribers:
        RefCell<SecondaryMap<NodeId, RefCell<FxIndexSet<NodeId>>>>,
    pub node_sources:
        RefCell<SecondaryMap<NodeId, RefCell<FxIndexSet<NodeId>>>>,
    pub pending_effects: RefCell<Vec<NodeId>>,
    pub batching: Cell<bool>,
    pub flushing: Cell<bool>,
}

// This core impl block handles all the work of marking and updating the
// reactive graph.
//
// In terms of concept and algorithm, this reactive-system implementation
// is significantly inspired by Reactively (https://github.com/modderme123/reactively)
impl Runtime {
    pub(crate) fn update_if_necessary(&self, node_id: NodeId) {
        if self.current_state(node_id) == ReactiveNodeState::Check {
            let sources = {
                let sources = self.node_sources.borrow();

                // rather than cloning the entire IndexSet, only allocate a
                // `Vec` for the node ids
                sources.get(node_id).map(|n| {
                    let sources = n.borrow();
                    let mut sources_vec = Vec::with_capacity(sources.len());
                    sources_vec.extend(sources.iter().cloned());
                    sources_vec
                })
            };

            for source in sources.into_iter().flatten() {
                self.update_if_necessary(source);
                if self.current_state(node_id) >= ReactiveNodeState::Dirty {
                    // as soon as a single parent has marked us dirty, we can
                    // stop checking the rest to avoid over-re-running
                    break;
                }
            }
        }

        // if we're dirty at this point, update
        if self.current_state(node_id) >= ReactiveNodeState::Dirty {
            self.update(node_id);
        }

        // now we're clean
        self.mark_clean(node_id);
    }

    pub(crate) fn update(&self, node_id: NodeId) {
        let node = {
            let nodes = self.nodes.borrow();
            nodes.get(node_id).cloned()
        };

        if let Some(node) = node {
            // memos and effects rerun; signals simply have their value
            let changed = match node.node_type {
                ReactiveNodeType::Signal => true,
                ReactiveNodeType::Memo { ref f }
                | ReactiveNodeType::Effect { ref f } => {
                    let value = node.value();
                    // set this node as the observer
                    self.with_observer(node_id, move || {
                        // drop the old dependency edges of this memo/effect;
                        // the rerun records the new set
                        self.cleanup_sources(node_id);

                        f.run(value)
                    })
                }
            };

            // mark children dirty
            if changed {
                let subs = self.node_subscribers.borrow();

                if let Some(subs) = subs.get(node_id) {
                    let mut nodes = self.nodes.borrow_mut();
                    for sub_id in subs.borrow().iter() {
                        if let Some(sub) = nodes.get_mut(*sub_id) {
                            sub.state = ReactiveNodeState::Dirty;
                        }
                    }
                }
            }

            // mark clean
            self.mark_clean(node_id);
        }
    }

    /// Unsubscribes a memo/effect from all of its current sources, so that
    /// the next run can record a fresh dependency list.
    pub(crate) fn cleanup_sources(&self, node_id: NodeId) {
        let sources = self.node_sources.borrow();
        if let Some(sources) = sources.get(node_id) {
            let mut sources = sources.borrow_mut();
            {
                let subs = self.node_subscribers.borrow();
                for source in sources.iter() {
                    if let Some(source_subs) = subs.get(*source) {
                        source_subs.borrow_mut().remove(&node_id);
                    }
                }
            }
            sources.clear();
        }
    }

    fn current_state(&self, node: NodeId) -> ReactiveNodeState {
        match self.nodes.borrow().get(node) {
            None => ReactiveNodeState::Clean,
            Some(node) => node.state,
        }
    }

    fn with_observer<T>(&self, observer: NodeId, f: impl FnOnce() -> T) -> T {
        let prev_observer = self.observer.take();
        self.observer.set(Some(observer));
        let v = f();
        self.observer.set(prev_observer);
        v
    }

    fn mark_clean(&self, node: NodeId) {
        let mut nodes = self.nodes.borrow_mut();
        if let Some(node) = nodes.get_mut(node) {
            node.state = ReactiveNodeState::Clean;
        }
    }

    pub(crate) fn mark_dirty(&self, node: NodeId) {
        let mut nodes = self.nodes.borrow_mut();

        if let Some(current_node) = nodes.get_mut(node) {
            if current_node.state == ReactiveNodeState::DirtyMarked {
                return;
            }

            let mut pending_effects = self.pending_effects.borrow_mut();
            let subscribers = self.node_subscribers.borrow();
            let current_observer = self.observer.get();

            // mark self dirty
            Runtime::mark(
                node,
                current_node,
                ReactiveNodeState::Dirty,
                &mut pending_effects,
                current_observer,
            );

            // depth-first traversal over the subscriber DAG; nodes already
            // marked `Check` or `DirtyMarked` have been visited and bound
            // the traversal
            let mut stack: Vec<NodeId> = subscribers
                .get(node)
                .map(|subs| subs.borrow().iter().rev().copied().collect())
                .unwrap_or_default();

            while let Some(child) = stack.pop() {
                if let Some(child_node) = nodes.get_mut(child) {
                    if child_node.state == ReactiveNodeState::Check
                        || child_node.state == ReactiveNodeState::DirtyMarked
                    {
                        continue;
                    }

                    Runtime::mark(
                        child,
                        child_node,
                        ReactiveNodeState::Check,
                        &mut pending_effects,
                        current_observer,
                    );

                    if let Some(grandchildren) = subscribers.get(child) {
                        for gc in grandchildren.borrow().iter().rev() {
                            stack.push(*gc);
                        }
                    }
                }
            }
        }
    }

    #[inline(always)] // small function, used in hot loop
    fn mark(
        node_id: NodeId,
        node: &mut ReactiveNode,
        level: ReactiveNodeState,
        pending_effects: &mut Vec<NodeId>,
        current_observer: Option<NodeId>,
    ) {
        if level > node.state {
            node.state = level;
        }

        if matches!(node.node_type, ReactiveNodeType::Effect { .. } if current_observer != Some(node_id))
        {
            pending_effects.push(node_id)
        }

        if node.state == ReactiveNodeState::Dirty {
            node.state = ReactiveNodeState::DirtyMarked;
        }
    }

    /// Drains the pending-effect queue, FIFO. Effects that enqueue further
    /// effects are drained in the same flush, bounded by the cycle guard.
    pub(crate) fn run_effects(&self) -> Result<(), ReactiveError> {
        if self.batching.get() || self.flushing.get() {
            return Ok(());
        }

        let flushing = SetFlushingOnDrop::new(self);
        let initial = self.pending_effects.borrow().len();
        let budget = SCHEDULER_CYCLE_LIMIT * initial.max(1);
        let mut ran = 0usize;

        loop {
            let effects = self.pending_effects.take();
            if effects.is_empty() {
                drop(flushing);
                return Ok(());
            }
            for effect_id in effects {
                if ran >= budget {
                    // abort the flush and clear the queue; the graph is
                    // still in a valid state
                    _ = self.pending_effects.take();
                    drop(flushing);
                    return Err(ReactiveError::CycleDetected { runs: ran });
                }
                self.update_if_necessary(effect_id);
                ran += 1;
            }
        }
    }

    pub(crate) fn dispose_node(&self, node: NodeId) {
        self.cleanup_sources(node);
        self.node_sources.borrow_mut().remove(node);
        self.node_subscribers.borrow_mut().remove(node);
        self.nodes.borrow_mut().remove(node);
    }

    /// Do not call on nodes without a value slot.
    pub(crate) fn get_value(
        &self,
        node_id: NodeId,
    ) -> Option<Rc<RefCell<dyn Any>>> {
        let signals = self.nodes.borrow();
        signals.get(node_id).map(|node| node.value())
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("observer", &self.observer)
            .field("scopes", &self.scopes)
            .field("scope_parents", &self.scope_parents)
            .field("scope_children", &self.scope_children)
            .finish()
    }
}

impl PartialEq for Runtime {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for Runtime {}

/// Get the selected runtime from the thread-local set of runtimes.
#[inline(always)] // it monomorphizes anyway
pub(crate) fn with_runtime<T>(
    id: RuntimeId,
    f: impl FnOnce(&Runtime) -> T,
) -> Result<T, ()> {
    RUNTIMES.with(|runtimes| {
        let runtimes = runtimes.borrow();
        match runtimes.get(id) {
            None => Err(()),
            Some(runtime) => Ok(f(runtime)),
        }
    })
}

#[must_use = "Runtime will leak memory if Runtime::dispose() is never called."]
/// Creates a new reactive runtime and returns its ID. This is usually
/// handled by the framework: every app, test root, and server render gets
/// its own runtime.
pub fn create_runtime() -> RuntimeId {
    RUNTIMES.with(|runtimes| runtimes.borrow_mut().insert(Runtime::new()))
}

slotmap::new_key_type! {
    /// Unique ID assigned to a runtime.
    pub struct RuntimeId;
}

impl RuntimeId {
    /// Removes the runtime, disposing all its child [`Scope`](crate::Scope)s.
    pub fn dispose(self) {
        let runtime = RUNTIMES
            .with(move |runtimes| runtimes.borrow_mut().remove(self))
            .expect(
                "tried to dispose of a reactive runtime that was not found; \
                 this suggests it was already disposed",
            );
        drop(runtime);
    }

    pub(crate) fn raw_scope_and_disposer(self) -> (Scope, ScopeDisposer) {
        with_runtime(self, |runtime| {
            let id = { runtime.scopes.borrow_mut().insert(Default::default()) };
            let scope = Scope { runtime: self, id };
            let disposer = ScopeDisposer(scope);
            (scope, disposer)
        })
        .expect(
            "tried to create a scope in a runtime that has already been \
             disposed",
        )
    }

    pub(crate) fn raw_scope_and_disposer_with_parent(
        self,
        parent: Option<Scope>,
    ) -> (Scope, ScopeDisposer) {
        with_runtime(self, |runtime| {
            let id = { runtime.scopes.borrow_mut().insert(Default::default()) };
            if let Some(parent) = parent {
                runtime.scope_parents.borrow_mut().insert(id, parent.id);
            }
            let scope = Scope { runtime: self, id };
            let disposer = ScopeDisposer(scope);
            (scope, disposer)
        })
        .expect("tried to create a scope in a runtime that has been disposed")
    }

    #[inline(always)]
    pub(crate) fn run_scope_undisposed<T>(
        self,
        f: impl FnOnce(Scope) -> T,
        parent: Option<Scope>,
    ) -> (T, ScopeId, ScopeDisposer) {
        let (scope, disposer) = self.raw_scope_and_disposer_with_parent(parent);

        (f(scope), scope.id, disposer)
    }

    #[inline(always)]
    pub(crate) fn run_scope<T>(
        self,
        f: impl FnOnce(Scope) -> T,
        parent: Option<Scope>,
    ) -> T {
        let (ret, _, disposer) = self.run_scope_undisposed(f, parent);
        disposer.dispose();
        ret
    }

    #[inline(always)]
    pub(crate) fn untrack<T>(self, f: impl FnOnce() -> T) -> T {
        with_runtime(self, |runtime| {
            let prev_observer =
                SetObserverOnDrop(self, runtime.observer.take());

            let untracked_result = f();

            runtime.observer.set(prev_observer.1);
            std::mem::forget(prev_observer); // avoid Drop

            untracked_result
        })
        .expect(
            "tried to run an untracked function in a runtime that has been \
             disposed",
        )
    }

    pub(crate) fn create_concrete_signal(
        self,
        value: Rc<RefCell<dyn Any>>,
    ) -> NodeId {
        with_runtime(self, |runtime| {
            runtime.nodes.borrow_mut().insert(ReactiveNode {
                value: Some(value),
                state: ReactiveNodeState::Clean,
                node_type: ReactiveNodeType::Signal,
            })
        })
        .expect("tried to create a signal in a runtime that has been disposed")
    }

    #[track_caller]
    #[inline(always)]
    pub(crate) fn create_signal<T>(
        self,
        value: T,
    ) -> (ReadSignal<T>, WriteSignal<T>)
    where
        T: Any + 'static,
    {
        let id = self.create_concrete_signal(
            Rc::new(RefCell::new(value)) as Rc<RefCell<dyn Any>>
        );

        (
            ReadSignal {
                runtime: self,
                id,
                ty: PhantomData,
                #[cfg(debug_assertions)]
                defined_at: std::panic::Location::caller(),
            },
            WriteSignal {
                runtime: self,
                id,
                ty: PhantomData,
                #[cfg(debug_assertions)]
                defined_at: std::panic::Location::caller(),
            },
        )
    }

    #[track_caller]
    #[inline(always)]
    pub(crate) fn create_rw_signal<T>(self, value: T) -> RwSignal<T>
    where
        T: Any + 'static,
    {
        let id = self.create_concrete_signal(
            Rc::new(RefCell::new(value)) as Rc<RefCell<dyn Any>>
        );
        RwSignal {
            runtime: self,
            id,
            ty: PhantomData,
            #[cfg(debug_assertions)]
            defined_at: std::panic::Location::caller(),
        }
    }

    pub(crate) fn create_concrete_effect(
        self,
        value: Rc<RefCell<dyn Any>>,
        effect: Rc<dyn AnyComputation>,
    ) -> NodeId {
        with_runtime(self, |runtime| {
            let id = runtime.nodes.borrow_mut().insert(ReactiveNode {
                value: Some(Rc::clone(&value)),
                state: ReactiveNodeState::Clean,
                node_type: ReactiveNodeType::Effect {
                    f: Rc::clone(&effect),
                },
            });

            // run the effect for the first time
            let prev_observer = runtime.observer.take();
            runtime.observer.set(Some(id));

            effect.run(value);

            runtime.observer.set(prev_observer);

            id
        })
        .expect("tried to create an effect in a runtime that has been disposed")
    }

    #[track_caller]
    #[inline(always)]
    pub(crate) fn create_effect<T>(
        self,
        f: impl Fn(Option<T>) -> T + 'static,
    ) -> EffectHandle
    where
        T: Any + 'static,
    {
        let id = self.create_concrete_effect(
            Rc::new(RefCell::new(None::<T>)),
            Rc::new(Effect {
                f,
                ty: PhantomData,
                #[cfg(debug_assertions)]
                defined_at: std::panic::Location::caller(),
            }),
        );
        EffectHandle { runtime: self, id }
    }

    pub(crate) fn create_concrete_memo(
        self,
        value: Rc<RefCell<dyn Any>>,
        computation: Rc<dyn AnyComputation>,
    ) -> NodeId {
        with_runtime(self, |runtime| {
            runtime.nodes.borrow_mut().insert(ReactiveNode {
                value: Some(value),
                // memos are lazy, so are dirty when created; they run the
                // first time their value is asked for
                state: ReactiveNodeState::Dirty,
                node_type: ReactiveNodeType::Memo { f: computation },
            })
        })
        .expect("tried to create a memo in a runtime that has been disposed")
    }

    #[track_caller]
    #[inline(always)]
    pub(crate) fn create_memo<T>(
        self,
        f: impl Fn(Option<&T>) -> T + 'static,
    ) -> Memo<T>
    where
        T: PartialEq + Any + 'static,
    {
        Memo {
            runtime: self,
            id: self.create_concrete_memo(
                Rc::new(RefCell::new(None::<T>)),
                Rc::new(MemoState {
                    f,
                    t: PhantomData,
                    #[cfg(debug_assertions)]
                    defined_at: std::panic::Location::caller(),
                }),
            ),
            ty: PhantomData,
            #[cfg(debug_assertions)]
            defined_at: std::panic::Location::caller(),
        }
    }
}

/// Marks a node dirty and, outside a batch, flushes the effect queue. A
/// tripped cycle guard from a bare write is logged rather than propagated:
/// setters have no error channel, and the queue has already been cleared.
pub(crate) fn notify(runtime_id: RuntimeId, node: NodeId) {
    _ = with_runtime(runtime_id, |runtime| {
        runtime.mark_dirty(node);
        if let Err(err) = runtime.run_effects() {
            tracing::error!("{err}");
        }
    });
}

struct SetObserverOnDrop(RuntimeId, Option<NodeId>);

impl Drop for SetObserverOnDrop {
    fn drop(&mut self) {
        _ = with_runtime(self.0, |rt| {
            rt.observer.set(self.1);
        });
    }
}

struct SetFlushingOnDrop<'a>(&'a Runtime);

impl SetFlushingOnDrop<'_> {
    fn new(runtime: &Runtime) -> SetFlushingOnDrop<'_> {
        runtime.flushing.set(true);
        SetFlushingOnDrop(runtime)
    }
}

impl Drop for SetFlushingOnDrop<'_> {
    fn drop(&mut self) {
        self.0.flushing.set(false);
    }
}
