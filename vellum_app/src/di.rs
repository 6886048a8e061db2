use rustc_hash::FxHashMap;
use std::{any::Any, borrow::Cow, cell::RefCell, fmt, rc::Rc};
use thiserror::Error;

/// A key into the DI container. Tokens are plain strings; services keyed by
/// interface use one token per interface.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token(Cow<'static, str>);

impl Token {
    /// Creates a token from its name.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// The token's name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Token {
    fn from(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self(Cow::Owned(value))
    }
}

/// Errors produced by [`Container`] resolution.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DiError {
    /// No provider is registered for the token, here or in any ancestor
    /// container.
    #[error("no provider registered for token `{0}`")]
    UnknownToken(Token),
    /// Resolution re-entered a token already being resolved.
    #[error("circular dependency while resolving `{token}`: {chain}")]
    CircularDependency {
        /// The token whose resolution closed the cycle.
        token: Token,
        /// The resolution chain, outermost first.
        chain: String,
    },
    /// The provider resolved, but not to the requested type.
    #[error("provider for `{0}` is not of the requested type")]
    WrongType(Token),
}

/// How often a provider's product is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderScope {
    /// One instance per container, memoized on first resolve.
    #[default]
    Singleton,
    /// A fresh instance on every resolve.
    Transient,
    /// Like [`Singleton`](ProviderScope::Singleton), but removed together
    /// with its module at module teardown.
    ModuleScoped,
}

type FactoryFn =
    Rc<dyn Fn(&Container) -> Result<Rc<dyn Any>, DiError>>;
type ConstructFn = Rc<dyn Fn(Vec<Rc<dyn Any>>) -> Rc<dyn Any>>;

/// A provider descriptor: how a container produces the value for a token.
pub enum Provider {
    /// A ready-made value.
    Value(Rc<dyn Any>),
    /// A factory with access to the container for its own lookups.
    Factory {
        /// Construction frequency.
        scope: ProviderScope,
        /// The factory itself.
        factory: FactoryFn,
    },
    /// A constructor with declared dependencies, resolved in declaration
    /// order before construction.
    Class {
        /// Construction frequency.
        scope: ProviderScope,
        /// Dependency tokens, in declaration order.
        deps: Vec<Token>,
        /// The constructor; receives the resolved dependencies in the same
        /// order.
        construct: ConstructFn,
    },
    /// An alias: resolves by delegating to another token.
    Existing(Token),
}

impl Clone for Provider {
    fn clone(&self) -> Self {
        match self {
            Self::Value(v) => Self::Value(Rc::clone(v)),
            Self::Factory { scope, factory } => Self::Factory {
                scope: *scope,
                factory: Rc::clone(factory),
            },
            Self::Class {
                scope,
                deps,
                construct,
            } => Self::Class {
                scope: *scope,
                deps: deps.clone(),
                construct: Rc::clone(construct),
            },
            Self::Existing(token) => Self::Existing(token.clone()),
        }
    }
}

impl Provider {
    /// A provider for a ready-made value.
    pub fn value<T: 'static>(value: T) -> Self {
        Self::Value(Rc::new(value))
    }

    /// A singleton factory provider.
    pub fn factory<T: 'static>(
        f: impl Fn(&Container) -> Result<T, DiError> + 'static,
    ) -> Self {
        Self::factory_scoped(ProviderScope::Singleton, f)
    }

    /// A factory provider with an explicit scope.
    pub fn factory_scoped<T: 'static>(
        scope: ProviderScope,
        f: impl Fn(&Container) -> Result<T, DiError> + 'static,
    ) -> Self {
        Self::Factory {
            scope,
            factory: Rc::new(move |container| {
                f(container).map(|value| Rc::new(value) as Rc<dyn Any>)
            }),
        }
    }

    /// A singleton class provider: `deps` resolve in declaration order and
    /// are handed to `construct`.
    pub fn class<T: 'static>(
        deps: Vec<Token>,
        construct: impl Fn(Vec<Rc<dyn Any>>) -> T + 'static,
    ) -> Self {
        Self::class_scoped(ProviderScope::Singleton, deps, construct)
    }

    /// A class provider with an explicit scope.
    pub fn class_scoped<T: 'static>(
        scope: ProviderScope,
        deps: Vec<Token>,
        construct: impl Fn(Vec<Rc<dyn Any>>) -> T + 'static,
    ) -> Self {
        Self::Class {
            scope,
            deps,
            construct: Rc::new(move |resolved| {
                Rc::new(construct(resolved)) as Rc<dyn Any>
            }),
        }
    }

    /// An alias for another token.
    pub fn existing(token: impl Into<Token>) -> Self {
        Self::Existing(token.into())
    }

    fn scope(&self) -> ProviderScope {
        match self {
            Self::Factory { scope, .. } | Self::Class { scope, .. } => *scope,
            Self::Value(_) | Self::Existing(_) => ProviderScope::Singleton,
        }
    }
}

/// A hierarchical token → provider container.
///
/// Resolution checks this container's own providers first and otherwise
/// delegates to the parent; misses everywhere fail with
/// [`DiError::UnknownToken`]. Singleton products are memoized in the
/// container the provider is registered in.
pub struct Container {
    parent: Option<Rc<Container>>,
    providers: RefCell<FxHashMap<Token, Provider>>,
    singletons: RefCell<FxHashMap<Token, Rc<dyn Any>>>,
    resolving: RefCell<Vec<Token>>,
}

impl Container {
    /// Creates a root container.
    pub fn root() -> Rc<Self> {
        Rc::new(Self {
            parent: None,
            providers: Default::default(),
            singletons: Default::default(),
            resolving: Default::default(),
        })
    }

    /// Creates a child container. Lookups that miss the child fall through
    /// to this container.
    pub fn child(self: &Rc<Self>) -> Rc<Self> {
        Rc::new(Self {
            parent: Some(Rc::clone(self)),
            providers: Default::default(),
            singletons: Default::default(),
            resolving: Default::default(),
        })
    }

    /// Registers a provider for a token, replacing any previous one and
    /// dropping its memoized product.
    pub fn register(&self, token: impl Into<Token>, provider: Provider) {
        let token = token.into();
        self.singletons.borrow_mut().remove(&token);
        self.providers.borrow_mut().insert(token, provider);
    }

    /// Replaces a provider for test purposes. Identical to
    /// [`register`](Container::register); the distinct name marks intent at
    /// call sites.
    pub fn override_provider(
        &self,
        token: impl Into<Token>,
        provider: Provider,
    ) {
        self.register(token, provider);
    }

    /// Whether a provider for the token is registered here or in an
    /// ancestor.
    pub fn has(&self, token: &Token) -> bool {
        if self.providers.borrow().contains_key(token) {
            return true;
        }
        match &self.parent {
            Some(parent) => parent.has(token),
            None => false,
        }
    }

    /// Removes a token's provider and memoized product from this container.
    pub fn remove(&self, token: &Token) {
        self.providers.borrow_mut().remove(token);
        self.singletons.borrow_mut().remove(token);
    }

    /// Drops every provider and memoized product in this container. The
    /// parent is untouched.
    pub fn clear(&self) {
        self.providers.borrow_mut().clear();
        self.singletons.borrow_mut().clear();
        self.resolving.borrow_mut().clear();
    }

    /// Resolves a token to a value of type `T`.
    pub fn resolve<T: 'static>(&self, token: &Token) -> Result<Rc<T>, DiError> {
        self.resolve_any(token)?
            .downcast::<T>()
            .map_err(|_| DiError::WrongType(token.clone()))
    }

    /// Resolves a token to its type-erased value.
    pub fn resolve_any(&self, token: &Token) -> Result<Rc<dyn Any>, DiError> {
        let provider = { self.providers.borrow().get(token).cloned() };
        let Some(provider) = provider else {
            return match &self.parent {
                Some(parent) => parent.resolve_any(token),
                None => Err(DiError::UnknownToken(token.clone())),
            };
        };

        match provider {
            Provider::Value(value) => Ok(value),
            Provider::Existing(target) => {
                self.with_resolution_guard(token, |container| {
                    container.resolve_any(&target)
                })
            }
            Provider::Factory { scope, factory } => {
                if let Some(memoized) = self.memoized(token, scope) {
                    return Ok(memoized);
                }
                let value = self.with_resolution_guard(token, |container| {
                    factory(container)
                })?;
                self.memoize(token, scope, &value);
                Ok(value)
            }
            Provider::Class {
                scope,
                deps,
                construct,
            } => {
                if let Some(memoized) = self.memoized(token, scope) {
                    return Ok(memoized);
                }
                let value = self.with_resolution_guard(token, |container| {
                    let mut resolved = Vec::with_capacity(deps.len());
                    for dep in &deps {
                        resolved.push(container.resolve_any(dep)?);
                    }
                    Ok(construct(resolved))
                })?;
                self.memoize(token, scope, &value);
                Ok(value)
            }
        }
    }

    fn memoized(
        &self,
        token: &Token,
        scope: ProviderScope,
    ) -> Option<Rc<dyn Any>> {
        match scope {
            ProviderScope::Transient => None,
            ProviderScope::Singleton | ProviderScope::ModuleScoped => {
                self.singletons.borrow().get(token).cloned()
            }
        }
    }

    fn memoize(
        &self,
        token: &Token,
        scope: ProviderScope,
        value: &Rc<dyn Any>,
    ) {
        match scope {
            ProviderScope::Transient => {}
            ProviderScope::Singleton | ProviderScope::ModuleScoped => {
                self.singletons
                    .borrow_mut()
                    .insert(token.clone(), Rc::clone(value));
            }
        }
    }

    fn with_resolution_guard<T>(
        &self,
        token: &Token,
        f: impl FnOnce(&Self) -> Result<T, DiError>,
    ) -> Result<T, DiError> {
        {
            let resolving = self.resolving.borrow();
            if resolving.contains(token) {
                let mut chain: Vec<&str> =
                    resolving.iter().map(Token::name).collect();
                chain.push(token.name());
                return Err(DiError::CircularDependency {
                    token: token.clone(),
                    chain: chain.join(" -> "),
                });
            }
        }
        self.resolving.borrow_mut().push(token.clone());
        let pop = PopResolutionOnDrop(&self.resolving);
        let result = f(self);
        drop(pop);
        result
    }
}

// Pops the resolution stack on unwind as well as on normal return.
struct PopResolutionOnDrop<'a>(&'a RefCell<Vec<Token>>);

impl Drop for PopResolutionOnDrop<'_> {
    fn drop(&mut self) {
        self.0.borrow_mut().pop();
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("providers", &self.providers.borrow().len())
            .field("singletons", &self.singletons.borrow().len())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}
