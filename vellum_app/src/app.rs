use crate::{
    di::{Container, Provider, Token},
    module::{ModuleCtx, ModuleDef},
    store::{dispose_store, use_store_any, StoreError},
};
use rustc_hash::{FxHashMap, FxHashSet};
use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
};
use thiserror::Error;
use vellum_core::{
    set_error_hook, Error as RenderError, ErrorHook, ErrorId,
    ResetErrorHookOnDrop,
};
use vellum_reactive::{
    create_runtime, raw_scope_and_disposer, RuntimeId, Scope, ScopeDisposer,
};

/// Errors produced by the application lifecycle.
#[derive(Debug, Error)]
pub enum AppError {
    /// [`App::bootstrap`] was called a second time.
    #[error("application has already been bootstrapped")]
    AlreadyBootstrapped,
    /// Two distinct modules in the graph share an id.
    #[error("duplicate module id `{0}` in the module graph")]
    DuplicateModule(String),
    /// The module graph is not a DAG.
    #[error("module graph contains a cycle through `{0}`")]
    ModuleCycle(String),
    /// A module's setup hook failed. Already-bootstrapped modules were
    /// unwound in reverse order before this was returned.
    #[error("module `{module}` failed to set up: {message}")]
    Setup {
        /// The failing module's id.
        module: String,
        /// The setup error, stringified.
        message: String,
    },
    /// Initializing a module's declared store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Error-shaped events delivered to [`App::on_error`] listeners.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// An error from a render, effect, or mount hook that no error boundary
    /// trapped.
    Render(RenderError),
    /// A `window.error`-style event, forwarded by the browser collaborator.
    WindowError(String),
    /// An `unhandledrejection`-style event, forwarded by the browser
    /// collaborator.
    UnhandledRejection(String),
}

/// Discovers and disposes interactivity islands. Registered by the browser
/// collaborator; the core treats island descriptors as opaque values.
pub trait IslandManager {
    /// Called once after bootstrap with every declared island descriptor,
    /// in module bootstrap order.
    fn discover(&self, islands: &[serde_json::Value]);

    /// Called at unmount.
    fn dispose(&self);
}

/// The key under which the browser collaborator mirrors the active app
/// handle on the JS global object, for devtools attach.
pub const GLOBAL_APP_KEY: &str = "__VELLUM_APP__";

struct AppInner {
    root_module: Rc<ModuleDef>,
    container: Rc<Container>,
    runtime: RuntimeId,
    scope: Scope,
    scope_disposer: RefCell<Option<ScopeDisposer>>,
    bootstrapped: Cell<bool>,
    unmounted: Cell<bool>,
    order: RefCell<Vec<Rc<ModuleDef>>>,
    contexts: RefCell<FxHashMap<String, serde_json::Value>>,
    module_tokens: RefCell<FxHashMap<String, Vec<Token>>>,
    overrides: Vec<(Token, Provider)>,
    discover_islands: bool,
    ready_hooks: RefCell<Vec<Rc<dyn Fn()>>>,
    dispose_hooks: RefCell<Vec<Box<dyn FnOnce()>>>,
    island_manager: RefCell<Option<Rc<dyn IslandManager>>>,
    error_listeners: RefCell<Vec<Rc<dyn Fn(&AppEvent)>>>,
    error_hook_guard: RefCell<Option<ResetErrorHookOnDrop>>,
}

/// An application: a module DAG bound to a DI container, a store set, and a
/// reactive runtime of its own. Cheap to clone.
#[derive(Clone)]
pub struct App {
    inner: Rc<AppInner>,
}

/// Creates an application rooted at the given module. Nothing runs until
/// [`App::bootstrap`].
pub fn create_app(root_module: Rc<ModuleDef>) -> App {
    App::with_options(root_module, Vec::new(), true)
}

/// Creates an application for tests: `mock_providers` override any
/// module-declared provider for the same token, and island discovery is
/// disabled.
pub fn create_test_app(
    root_module: Rc<ModuleDef>,
    mock_providers: Vec<(Token, Provider)>,
) -> App {
    App::with_options(root_module, mock_providers, false)
}

impl App {
    fn with_options(
        root_module: Rc<ModuleDef>,
        overrides: Vec<(Token, Provider)>,
        discover_islands: bool,
    ) -> App {
        let runtime = create_runtime();
        let (scope, scope_disposer) = raw_scope_and_disposer(runtime);
        App {
            inner: Rc::new(AppInner {
                root_module,
                container: Container::root(),
                runtime,
                scope,
                scope_disposer: RefCell::new(Some(scope_disposer)),
                bootstrapped: Cell::new(false),
                unmounted: Cell::new(false),
                order: Default::default(),
                contexts: Default::default(),
                module_tokens: Default::default(),
                overrides,
                discover_islands,
                ready_hooks: Default::default(),
                dispose_hooks: Default::default(),
                island_manager: Default::default(),
                error_listeners: Default::default(),
                error_hook_guard: RefCell::new(None),
            }),
        }
    }

    /// The application's DI container.
    pub fn container(&self) -> Rc<Container> {
        Rc::clone(&self.inner.container)
    }

    /// The application's root scope. Stores instantiated through it live
    /// until unmount.
    pub fn scope(&self) -> Scope {
        self.inner.scope
    }

    /// The application's reactive runtime.
    pub fn runtime(&self) -> RuntimeId {
        self.inner.runtime
    }

    /// Whether [`bootstrap`](App::bootstrap) has completed successfully.
    pub fn is_bootstrapped(&self) -> bool {
        self.inner.bootstrapped.get()
    }

    /// The memoized return value of a module's setup hook, by module id.
    pub fn module_context(&self, id: &str) -> Option<serde_json::Value> {
        self.inner.contexts.borrow().get(id).cloned()
    }

    /// Registers a hook to run once bootstrap completes (the router's
    /// `ready()` is wired here). Registered after bootstrap, it runs
    /// immediately.
    pub fn on_ready(&self, hook: impl Fn() + 'static) {
        if self.inner.bootstrapped.get() {
            hook();
        } else {
            self.inner.ready_hooks.borrow_mut().push(Rc::new(hook));
        }
    }

    /// Registers a hook to run during unmount, before the container clears.
    pub fn on_dispose(&self, hook: impl FnOnce() + 'static) {
        self.inner.dispose_hooks.borrow_mut().push(Box::new(hook));
    }

    /// Registers the island manager. Only consulted when the app was not
    /// created through [`create_test_app`].
    pub fn set_island_manager(&self, manager: Rc<dyn IslandManager>) {
        *self.inner.island_manager.borrow_mut() = Some(manager);
    }

    /// Registers a listener for error events: render errors with no
    /// boundary above them, plus whatever the browser collaborator forwards
    /// through [`emit_error`](App::emit_error).
    pub fn on_error(&self, listener: impl Fn(&AppEvent) + 'static) {
        self.inner.error_listeners.borrow_mut().push(Rc::new(listener));
    }

    /// Delivers an event to every [`on_error`](App::on_error) listener.
    pub fn emit_error(&self, event: AppEvent) {
        self.inner.emit(&event);
    }

    /// Bootstraps the application:
    ///
    /// 1. validates the module DAG (duplicate ids and cycles are rejected);
    /// 2. walks it children-first;
    /// 3. per module: registers providers (test overrides win), initializes
    ///    declared stores, awaits `setup` and memoizes its return value as
    ///    the module context;
    /// 4. runs ready hooks and, for non-test apps with a registered island
    ///    manager, island discovery.
    ///
    /// A failing module unwinds the already-bootstrapped ones in reverse
    /// order before the error is returned. Bootstrapping twice fails with
    /// [`AppError::AlreadyBootstrapped`].
    pub async fn bootstrap(&self) -> Result<(), AppError> {
        let inner = &self.inner;
        if inner.bootstrapped.get() {
            return Err(AppError::AlreadyBootstrapped);
        }

        let order = module_order(&inner.root_module)?;

        // route unhandled render errors into the app's listeners
        let hook = Rc::new(AppErrorHook {
            inner: Rc::downgrade(inner),
            next_id: Cell::new(0),
        });
        *inner.error_hook_guard.borrow_mut() = Some(set_error_hook(hook));

        let overridden: FxHashSet<Token> = inner
            .overrides
            .iter()
            .map(|(token, _)| token.clone())
            .collect();
        for (token, provider) in &inner.overrides {
            inner.container.register(token.clone(), provider.clone());
        }

        let mut completed: Vec<Rc<ModuleDef>> = Vec::new();
        for module in &order {
            match self.bootstrap_module(module, &overridden).await {
                Ok(context) => {
                    inner
                        .contexts
                        .borrow_mut()
                        .insert(module.id().to_string(), context);
                    completed.push(Rc::clone(module));
                }
                Err(err) => {
                    self.remove_module_tokens(module.id());
                    for done in completed.iter().rev() {
                        self.unwind_module(done).await;
                    }
                    *inner.error_hook_guard.borrow_mut() = None;
                    return Err(err);
                }
            }
        }

        *inner.order.borrow_mut() = order;
        inner.bootstrapped.set(true);

        let ready_hooks: Vec<_> =
            inner.ready_hooks.borrow_mut().drain(..).collect();
        for hook in ready_hooks {
            hook();
        }

        if inner.discover_islands {
            let manager = inner.island_manager.borrow().clone();
            if let Some(manager) = manager {
                let islands: Vec<serde_json::Value> = inner
                    .order
                    .borrow()
                    .iter()
                    .flat_map(|module| module.islands().iter().cloned())
                    .collect();
                manager.discover(&islands);
            }
        }

        Ok(())
    }

    async fn bootstrap_module(
        &self,
        module: &Rc<ModuleDef>,
        overridden: &FxHashSet<Token>,
    ) -> Result<serde_json::Value, AppError> {
        let inner = &self.inner;

        let mut registered = Vec::new();
        for (token, provider) in module.providers() {
            if overridden.contains(token) {
                continue;
            }
            inner.container.register(token.clone(), provider.clone());
            registered.push(token.clone());
        }
        inner
            .module_tokens
            .borrow_mut()
            .insert(module.id().to_string(), registered);

        for store_id in module.stores() {
            use_store_any(inner.scope, store_id)?;
        }

        match module.setup_hook() {
            Some(setup) => {
                setup(self.module_ctx()).await.map_err(|err| {
                    AppError::Setup {
                        module: module.id().to_string(),
                        message: err.to_string(),
                    }
                })
            }
            None => Ok(serde_json::Value::Null),
        }
    }

    async fn unwind_module(&self, module: &Rc<ModuleDef>) {
        if let Some(teardown) = module.teardown_hook() {
            teardown(self.module_ctx()).await;
        }
        for store_id in module.stores() {
            _ = dispose_store(store_id);
        }
        self.remove_module_tokens(module.id());
        self.inner.contexts.borrow_mut().remove(module.id());
    }

    fn remove_module_tokens(&self, module_id: &str) {
        let tokens = self.inner.module_tokens.borrow_mut().remove(module_id);
        for token in tokens.into_iter().flatten() {
            self.inner.container.remove(&token);
        }
    }

    fn module_ctx(&self) -> ModuleCtx {
        ModuleCtx {
            container: Rc::clone(&self.inner.container),
            scope: self.inner.scope,
        }
    }

    /// Unmounts the application in reverse bootstrap order: per module,
    /// teardown runs, declared stores dispose, and its providers are
    /// removed; then dispose hooks and the island manager fire, the
    /// container clears, and the app's scope and runtime are torn down.
    /// Unmounting twice (or before bootstrap) is a no-op.
    pub async fn unmount(&self) {
        let inner = &self.inner;
        if !inner.bootstrapped.get() || inner.unmounted.get() {
            return;
        }
        inner.unmounted.set(true);

        let order: Vec<Rc<ModuleDef>> =
            inner.order.borrow().iter().rev().cloned().collect();
        for module in &order {
            self.unwind_module(module).await;
        }

        let dispose_hooks: Vec<_> =
            inner.dispose_hooks.borrow_mut().drain(..).collect();
        for hook in dispose_hooks {
            hook();
        }

        let manager = inner.island_manager.borrow_mut().take();
        if let Some(manager) = manager {
            manager.dispose();
        }

        inner.container.clear();

        if let Some(disposer) = inner.scope_disposer.borrow_mut().take() {
            disposer.dispose();
        }
        inner.runtime.dispose();

        *inner.error_hook_guard.borrow_mut() = None;

        // drop the global handle if it still points at this app
        let points_here = get_app()
            .map(|app| Rc::ptr_eq(&app.inner, &self.inner))
            .unwrap_or(false);
        if points_here {
            clear_app();
        }
    }
}

impl AppInner {
    fn emit(&self, event: &AppEvent) {
        let listeners: Vec<_> =
            self.error_listeners.borrow().iter().cloned().collect();
        for listener in listeners {
            listener(event);
        }
    }
}

struct AppErrorHook {
    inner: Weak<AppInner>,
    next_id: Cell<usize>,
}

impl ErrorHook for AppErrorHook {
    fn throw(&self, error: RenderError) -> ErrorId {
        if let Some(inner) = self.inner.upgrade() {
            inner.emit(&AppEvent::Render(error));
        }
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        ErrorId::from(id)
    }

    fn clear(&self, _id: &ErrorId) {}
}

/// Validates the module graph and returns the bootstrap order: children
/// before parents, each module once.
fn module_order(
    root: &Rc<ModuleDef>,
) -> Result<Vec<Rc<ModuleDef>>, AppError> {
    fn visit(
        module: &Rc<ModuleDef>,
        order: &mut Vec<Rc<ModuleDef>>,
        seen: &mut FxHashMap<String, Rc<ModuleDef>>,
        path: &mut Vec<String>,
    ) -> Result<(), AppError> {
        if path.iter().any(|id| id == module.id()) {
            return Err(AppError::ModuleCycle(module.id().to_string()));
        }
        match seen.get(module.id()) {
            Some(existing) if Rc::ptr_eq(existing, module) => return Ok(()),
            Some(_) => {
                return Err(AppError::DuplicateModule(
                    module.id().to_string(),
                ))
            }
            None => {}
        }
        seen.insert(module.id().to_string(), Rc::clone(module));

        path.push(module.id().to_string());
        for child in module.imports() {
            visit(child, order, seen, path)?;
        }
        path.pop();

        order.push(Rc::clone(module));
        Ok(())
    }

    let mut order = Vec::new();
    let mut seen = FxHashMap::default();
    let mut path = Vec::new();
    visit(root, &mut order, &mut seen, &mut path)?;
    Ok(order)
}

thread_local! {
    static ACTIVE_APP: RefCell<Option<App>> = const { RefCell::new(None) };
}

/// Marks an app as the process's active one, retrievable with [`get_app`].
/// In a browser build, the collaborator additionally mirrors the handle on
/// the JS global under [`GLOBAL_APP_KEY`] for devtools attach.
pub fn set_app(app: App) {
    ACTIVE_APP.with(|active| *active.borrow_mut() = Some(app));
}

/// The active app, if one was set.
pub fn get_app() -> Option<App> {
    ACTIVE_APP.with(|active| active.borrow().clone())
}

/// Clears the active-app handle.
pub fn clear_app() {
    ACTIVE_APP.with(|active| *active.borrow_mut() = None);
}
