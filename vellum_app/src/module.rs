use crate::di::{Container, Provider, Token};
use std::{future::Future, pin::Pin, rc::Rc};
use vellum_core::Error;
use vellum_reactive::Scope;

pub(crate) type PinnedLocalFuture<T> = Pin<Box<dyn Future<Output = T>>>;

type SetupHook =
    Rc<dyn Fn(ModuleCtx) -> PinnedLocalFuture<Result<serde_json::Value, Error>>>;
type TeardownHook = Rc<dyn Fn(ModuleCtx) -> PinnedLocalFuture<()>>;

/// What a module's setup and teardown hooks see: the app's container and
/// root scope.
#[derive(Clone)]
pub struct ModuleCtx {
    /// The application's DI container.
    pub container: Rc<Container>,
    /// The application's root scope.
    pub scope: Scope,
}

/// An immutable bundle of DI providers, store declarations, child modules,
/// island descriptors, and setup/teardown hooks. Built once with
/// [`ModuleDef::build`] and shared by reference in the module DAG.
///
/// ```
/// # use vellum_app::*;
/// let auth = ModuleDef::build("auth", |module| {
///     module
///         .provider("auth.tokenTtl", Provider::value(3600u64))
///         .store("session")
/// });
///
/// let root = ModuleDef::build("root", |module| module.import(auth));
/// assert_eq!(root.imports()[0].id(), "auth");
/// ```
pub struct ModuleDef {
    id: String,
    providers: Vec<(Token, Provider)>,
    imports: Vec<Rc<ModuleDef>>,
    stores: Vec<String>,
    islands: Vec<serde_json::Value>,
    setup: Option<SetupHook>,
    teardown: Option<TeardownHook>,
}

impl ModuleDef {
    /// Builds a module definition through the given configuration closure.
    pub fn build(
        id: impl Into<String>,
        configure: impl FnOnce(ModuleBuilder) -> ModuleBuilder,
    ) -> Rc<ModuleDef> {
        let builder = configure(ModuleBuilder {
            def: ModuleDef {
                id: id.into(),
                providers: Vec::new(),
                imports: Vec::new(),
                stores: Vec::new(),
                islands: Vec::new(),
                setup: None,
                teardown: None,
            },
        });
        Rc::new(builder.def)
    }

    /// The module's unique id within the graph.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The module's provider descriptors, in declaration order.
    pub fn providers(&self) -> &[(Token, Provider)] {
        &self.providers
    }

    /// Child modules, bootstrapped before this one.
    pub fn imports(&self) -> &[Rc<ModuleDef>] {
        &self.imports
    }

    /// Ids of the stores this module initializes at bootstrap.
    pub fn stores(&self) -> &[String] {
        &self.stores
    }

    /// Opaque island descriptors handed to the external island manager.
    pub fn islands(&self) -> &[serde_json::Value] {
        &self.islands
    }

    pub(crate) fn setup_hook(&self) -> Option<SetupHook> {
        self.setup.clone()
    }

    pub(crate) fn teardown_hook(&self) -> Option<TeardownHook> {
        self.teardown.clone()
    }
}

impl std::fmt::Debug for ModuleDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleDef")
            .field("id", &self.id)
            .field("providers", &self.providers.len())
            .field(
                "imports",
                &self.imports.iter().map(|m| m.id.clone()).collect::<Vec<_>>(),
            )
            .field("stores", &self.stores)
            .finish()
    }
}

/// Accumulates a [`ModuleDef`] inside [`ModuleDef::build`].
pub struct ModuleBuilder {
    def: ModuleDef,
}

impl ModuleBuilder {
    /// Declares a provider.
    pub fn provider(mut self, token: impl Into<Token>, provider: Provider) -> Self {
        self.def.providers.push((token.into(), provider));
        self
    }

    /// Imports a child module, bootstrapped before this one.
    pub fn import(mut self, module: Rc<ModuleDef>) -> Self {
        self.def.imports.push(module);
        self
    }

    /// Declares a store (registered elsewhere through
    /// [`define_store`](crate::define_store)) to initialize at bootstrap.
    pub fn store(mut self, id: impl Into<String>) -> Self {
        self.def.stores.push(id.into());
        self
    }

    /// Attaches an opaque island descriptor.
    pub fn island(mut self, descriptor: serde_json::Value) -> Self {
        self.def.islands.push(descriptor);
        self
    }

    /// Attaches an async setup hook. Its return value becomes the module's
    /// context, retrievable through
    /// [`App::module_context`](crate::App::module_context).
    pub fn on_setup<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(ModuleCtx) -> Fut + 'static,
        Fut: Future<Output = Result<serde_json::Value, Error>> + 'static,
    {
        self.def.setup = Some(Rc::new(move |ctx| Box::pin(hook(ctx))));
        self
    }

    /// Attaches an async teardown hook, run at unmount before child modules
    /// tear down.
    pub fn on_teardown<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(ModuleCtx) -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        self.def.teardown = Some(Rc::new(move |ctx| Box::pin(hook(ctx))));
        self
    }
}
