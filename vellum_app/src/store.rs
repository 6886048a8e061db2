use rustc_hash::FxHashMap;
use std::{
    any::Any,
    cell::{Cell, RefCell},
    rc::Rc,
};
use thiserror::Error;
use vellum_reactive::{ReadSignal, RwSignal, Scope, ScopeDisposer};

/// Errors produced by the store registry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No store is registered under the id.
    #[error("no store registered with id `{0}`")]
    NotFound(String),
    /// Store factories resolved each other cyclically. Break the cycle with
    /// a memo that reads the other store lazily, or restructure.
    #[error("circular store dependency: {chain}")]
    CircularDependency {
        /// The instantiation chain, outermost first.
        chain: String,
    },
    /// The store exists but is not of the requested type.
    #[error("store `{0}` is not of the requested type")]
    WrongType(String),
}

/// Optional metadata attached to a store registration, surfaced through
/// [`store_metadata`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreMeta {
    /// Human-readable description, for devtools.
    pub description: Option<String>,
    /// Free-form tags.
    pub tags: Vec<String>,
}

type StoreFactory = Rc<dyn Fn(Scope) -> Result<Rc<dyn Any>, StoreError>>;

struct StoreEntry {
    factory: StoreFactory,
    meta: StoreMeta,
    instance: Option<Rc<dyn Any>>,
    disposer: Option<ScopeDisposer>,
}

#[derive(Default)]
struct StoreRegistry {
    stores: RefCell<FxHashMap<String, StoreEntry>>,
    resolving: RefCell<Vec<String>>,
    derived_counter: Cell<usize>,
}

thread_local! {
    static REGISTRY: StoreRegistry = Default::default();
}

/// Registers a store: a named, lazily instantiated singleton produced by
/// `factory`. The factory runs at most once per registration, on first
/// [`use_store`], under a long-lived scope of its own.
///
/// Re-registering an id warns, replaces the factory, and disposes any
/// cached instance: the next `use_store` runs the new factory. Callers
/// holding the previous instance keep a working but orphaned value.
pub fn define_store<T: 'static>(
    id: impl Into<String>,
    factory: impl Fn(Scope) -> T + 'static,
) {
    define_store_with_meta(id, StoreMeta::default(), factory)
}

/// [`define_store`] with attached metadata.
pub fn define_store_with_meta<T: 'static>(
    id: impl Into<String>,
    meta: StoreMeta,
    factory: impl Fn(Scope) -> T + 'static,
) {
    let id = id.into();
    let entry = StoreEntry {
        factory: Rc::new(move |cx| Ok(Rc::new(factory(cx)) as Rc<dyn Any>)),
        meta,
        instance: None,
        disposer: None,
    };
    insert_entry(id, entry);
}

fn insert_entry(id: String, entry: StoreEntry) {
    let replaced = REGISTRY
        .with(|registry| registry.stores.borrow_mut().insert(id.clone(), entry));
    if let Some(replaced) = replaced {
        tracing::warn!(
            "store `{id}` was re-registered; the previous factory and any \
             cached instance are discarded"
        );
        if let Some(disposer) = replaced.disposer {
            disposer.dispose();
        }
    }
}

/// Returns the store instance for `id`, instantiating it on first use.
///
/// The factory runs under a fresh child scope of the *root* of `cx`'s scope
/// tree, so the store outlives the component that happened to touch it
/// first and dies with the application root (or on [`reset_store`] /
/// [`dispose_store`] / [`clear_all_stores`]).
pub fn use_store<T: 'static>(cx: Scope, id: &str) -> Result<Rc<T>, StoreError> {
    use_store_any(cx, id)?
        .downcast::<T>()
        .map_err(|_| StoreError::WrongType(id.to_string()))
}

pub(crate) fn use_store_any(
    cx: Scope,
    id: &str,
) -> Result<Rc<dyn Any>, StoreError> {
    // fast path: cached instance
    let (cached, factory) = REGISTRY.with(|registry| {
        let stores = registry.stores.borrow();
        match stores.get(id) {
            None => Err(StoreError::NotFound(id.to_string())),
            Some(entry) => {
                Ok((entry.instance.clone(), Rc::clone(&entry.factory)))
            }
        }
    })?;
    if let Some(instance) = cached {
        return Ok(instance);
    }

    // cycle check before running the factory
    REGISTRY.with(|registry| {
        let resolving = registry.resolving.borrow();
        if resolving.iter().any(|r| r == id) {
            let mut chain: Vec<&str> =
                resolving.iter().map(String::as_str).collect();
            chain.push(id);
            return Err(StoreError::CircularDependency {
                chain: chain.join(" -> "),
            });
        }
        Ok(())
    })?;

    let resolving = PopResolvingOnDrop::push(id);

    // the factory runs with no registry borrows held, so it may freely use
    // other stores
    let result = cx.root().run_child_scope(|store_cx| factory(store_cx));

    drop(resolving);

    let (instance, disposer) = match result {
        (Ok(instance), disposer) => (instance, disposer),
        (Err(err), disposer) => {
            disposer.dispose();
            return Err(err);
        }
    };

    REGISTRY.with(|registry| {
        let mut stores = registry.stores.borrow_mut();
        match stores.get_mut(id) {
            Some(entry) => {
                entry.instance = Some(Rc::clone(&instance));
                entry.disposer = Some(disposer);
            }
            // the factory itself removed the registration; treat the
            // produced value as orphaned
            None => disposer.dispose(),
        }
    });

    Ok(instance)
}

// Pops the instantiation stack on unwind as well as on normal return; the
// registry outlives any one panicked factory.
struct PopResolvingOnDrop;

impl PopResolvingOnDrop {
    fn push(id: &str) -> Self {
        REGISTRY
            .with(|registry| registry.resolving.borrow_mut().push(id.to_string()));
        PopResolvingOnDrop
    }
}

impl Drop for PopResolvingOnDrop {
    fn drop(&mut self) {
        REGISTRY.with(|registry| {
            registry.resolving.borrow_mut().pop();
        });
    }
}

/// Projects a writable signal to a read-only accessor with identical
/// tracking behavior and no setter. Stores expose state through this.
pub fn readonly<T>(source: RwSignal<T>) -> ReadSignal<T> {
    source.read_only()
}

/// The resolved inputs of a [`derive_store`] composition, by alias.
pub struct StoreDeps {
    values: FxHashMap<String, Rc<dyn Any>>,
}

impl StoreDeps {
    /// The input registered under `alias`.
    pub fn get<T: 'static>(&self, alias: &str) -> Result<Rc<T>, StoreError> {
        self.values
            .get(alias)
            .ok_or_else(|| StoreError::NotFound(alias.to_string()))?
            .clone()
            .downcast::<T>()
            .map_err(|_| StoreError::WrongType(alias.to_string()))
    }
}

/// Constructs an anonymous store composed from other stores.
///
/// `inputs` maps aliases to registered store ids; each input instantiates
/// (if necessary) before `compose` runs with the resolved set. The
/// composition is registered as a store of its own under a generated id and
/// instantiated immediately.
pub fn derive_store<T: 'static>(
    cx: Scope,
    inputs: &[(&str, &str)],
    compose: impl Fn(Scope, &StoreDeps) -> T + 'static,
) -> Result<Rc<T>, StoreError> {
    let id = REGISTRY.with(|registry| {
        let n = registry.derived_counter.get();
        registry.derived_counter.set(n + 1);
        format!("~derived-{n}")
    });

    let inputs: Vec<(String, String)> = inputs
        .iter()
        .map(|(alias, id)| (alias.to_string(), id.to_string()))
        .collect();
    let outer = cx;

    let entry = StoreEntry {
        factory: Rc::new(move |store_cx| {
            let mut values = FxHashMap::default();
            for (alias, id) in &inputs {
                values.insert(alias.clone(), use_store_any(outer, id)?);
            }
            let deps = StoreDeps { values };
            Ok(Rc::new(compose(store_cx, &deps)) as Rc<dyn Any>)
        }),
        meta: StoreMeta::default(),
        instance: None,
        disposer: None,
    };
    insert_entry(id.clone(), entry);

    use_store::<T>(cx, &id)
}

/// Replaces the store's factory with one that composes additional members
/// on top of the base value. Fails with [`StoreError::NotFound`] when the
/// base is unregistered; any cached base instance is invalidated.
pub fn extend_store<B, E>(
    id: &str,
    extender: impl Fn(Scope, Rc<B>) -> E + 'static,
) -> Result<(), StoreError>
where
    B: 'static,
    E: 'static,
{
    let id = id.to_string();
    REGISTRY.with(|registry| {
        let mut stores = registry.stores.borrow_mut();
        let entry = stores
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        let base_factory = Rc::clone(&entry.factory);
        let base_id = id.clone();
        entry.factory = Rc::new(move |cx| {
            let base = base_factory(cx)?
                .downcast::<B>()
                .map_err(|_| StoreError::WrongType(base_id.clone()))?;
            Ok(Rc::new(extender(cx, base)) as Rc<dyn Any>)
        });
        entry.instance = None;
        if let Some(disposer) = entry.disposer.take() {
            disposer.dispose();
        }
        Ok(())
    })
}

/// Disposes the store's cached instance (its scope is torn down); the next
/// [`use_store`] re-runs the factory.
pub fn reset_store(id: &str) -> Result<(), StoreError> {
    REGISTRY.with(|registry| {
        let mut stores = registry.stores.borrow_mut();
        let entry = stores
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        entry.instance = None;
        if let Some(disposer) = entry.disposer.take() {
            disposer.dispose();
        }
        Ok(())
    })
}

/// Removes the store entirely: the instance's scope is torn down and the id
/// becomes unregistered, so later access through [`use_store`] or a
/// composition handle fails with [`StoreError::NotFound`].
pub fn dispose_store(id: &str) -> Result<(), StoreError> {
    REGISTRY.with(|registry| {
        let entry = registry
            .stores
            .borrow_mut()
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if let Some(disposer) = entry.disposer {
            disposer.dispose();
        }
        Ok(())
    })
}

/// An aliased view over several stores with lazy getters, built by
/// [`compose_stores`].
pub struct StoreComposition {
    cx: Scope,
    aliases: FxHashMap<String, String>,
}

impl StoreComposition {
    /// Resolves the store behind `alias`, instantiating it on first access
    /// only. A store disposed since composition fails with
    /// [`StoreError::NotFound`].
    pub fn get<T: 'static>(&self, alias: &str) -> Result<Rc<T>, StoreError> {
        let id = self
            .aliases
            .get(alias)
            .ok_or_else(|| StoreError::NotFound(alias.to_string()))?;
        use_store(self.cx, id)
    }
}

/// Builds an aliased composition over registered stores. Nothing
/// instantiates until a property is read through
/// [`get`](StoreComposition::get).
pub fn compose_stores(
    cx: Scope,
    aliases: &[(&str, &str)],
) -> StoreComposition {
    StoreComposition {
        cx,
        aliases: aliases
            .iter()
            .map(|(alias, id)| (alias.to_string(), id.to_string()))
            .collect(),
    }
}

/// Whether a store is registered under `id`.
pub fn has_store(id: &str) -> bool {
    REGISTRY.with(|registry| registry.stores.borrow().contains_key(id))
}

/// Every registered store id, in arbitrary order.
pub fn all_store_ids() -> Vec<String> {
    REGISTRY
        .with(|registry| registry.stores.borrow().keys().cloned().collect())
}

/// The metadata attached to a registration, if any.
pub fn store_metadata(id: &str) -> Option<StoreMeta> {
    REGISTRY.with(|registry| {
        registry.stores.borrow().get(id).map(|entry| entry.meta.clone())
    })
}

/// Whether the store has a live cached instance.
pub fn is_store_initialized(id: &str) -> bool {
    REGISTRY.with(|registry| {
        registry
            .stores
            .borrow()
            .get(id)
            .map(|entry| entry.instance.is_some())
            .unwrap_or(false)
    })
}

/// Tears down every store instance and empties the registry. The standard
/// reset between tests.
pub fn clear_all_stores() {
    let entries: Vec<StoreEntry> = REGISTRY.with(|registry| {
        registry.resolving.borrow_mut().clear();
        registry.derived_counter.set(0);
        registry.stores.borrow_mut().drain().map(|(_, e)| e).collect()
    });
    for entry in entries {
        if let Some(disposer) = entry.disposer {
            disposer.dispose();
        }
    }
}
