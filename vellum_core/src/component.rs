use crate::devtools::{self, ComponentId};
use serde::Serialize;
use std::{
    borrow::Cow,
    cell::RefCell,
    rc::Rc,
};
use vellum_reactive::{
    on_cleanup, provide_context, use_context, Scope, ScopeDisposer,
};

/// The render closure a component's setup returns. The renderer calls it
/// repeatedly, always under an effect, so that reads inside it re-wire the
/// render to signal changes.
pub type RenderFn<V> = Box<dyn Fn() -> V>;

/// Declares a component: a named setup function that runs exactly once per
/// instance and returns a render closure.
///
/// Props are a plain typed record. The runtime never clones them; a
/// component treats its props as read-only. Props reactivity follows the
/// type: a plain field is a setup-time snapshot, a signal or
/// [`MaybeSignal`](vellum_reactive::MaybeSignal) field is live.
///
/// ```
/// # use vellum_core::*;
/// struct GreetingProps {
///     name: String,
/// }
///
/// let greeting = define_component("Greeting", |cx, props: GreetingProps| {
///     let (excited, _set_excited) = create_signal(cx, false);
///     Box::new(move || {
///         if excited.get() {
///             format!("{}!", props.name)
///         } else {
///             props.name.clone()
///         }
///     }) as RenderFn<String>
/// });
///
/// create_scope(create_runtime(), move |cx| {
///     let instance = greeting.create(
///         cx,
///         GreetingProps {
///             name: "World".into(),
///         },
///     );
///     assert_eq!(instance.render(), "World");
/// })
/// .dispose();
/// ```
pub fn define_component<P, V>(
    name: impl Into<Cow<'static, str>>,
    setup: impl Fn(Scope, P) -> RenderFn<V> + 'static,
) -> Component<P, V> {
    Component {
        name: name.into(),
        setup: Rc::new(setup),
    }
}

/// A component declaration, created by [`define_component`]. Cheap to clone;
/// each [`create`](Component::create) call produces an independent instance.
pub struct Component<P, V> {
    name: Cow<'static, str>,
    #[allow(clippy::type_complexity)]
    setup: Rc<dyn Fn(Scope, P) -> RenderFn<V>>,
}

impl<P, V> Clone for Component<P, V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            setup: Rc::clone(&self.setup),
        }
    }
}

impl<P, V> Component<P, V> {
    /// The component's declared name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instantiates the component:
    ///
    /// 1. opens a new scope as a child of `cx`,
    /// 2. registers the instance in the devtools tree (its parent is the
    ///    nearest enclosing instance),
    /// 3. runs setup exactly once with the given props,
    /// 4. returns the instance wrapping the render closure.
    ///
    /// The caller (a renderer, or a parent component's render path) is
    /// expected to invoke [`render`](ComponentInstance::render) under an
    /// effect and to call [`flush_mounts`](ComponentInstance::flush_mounts)
    /// once after the first output is attached.
    pub fn create(&self, cx: Scope, props: P) -> ComponentInstance<V> {
        self.create_inner(cx, props, serde_json::Value::Null)
    }

    fn create_inner(
        &self,
        cx: Scope,
        props: P,
        props_snapshot: serde_json::Value,
    ) -> ComponentInstance<V> {
        let parent = use_context::<CurrentComponent>(cx).map(|c| c.0);
        let ((id, render, mounts), disposer) = cx.run_child_scope(|child| {
            let id = devtools::register_component(
                &self.name,
                parent,
                props_snapshot,
            );
            provide_context(child, CurrentComponent(id));
            on_cleanup(child, move || devtools::unregister_component(id));

            // a mount queue is shared with an enclosing render pass if one
            // exists, so a single flush after first attach reaches every
            // instance set up during the pass
            let mounts = match use_context::<MountQueue>(child) {
                Some(queue) => queue,
                None => {
                    let queue = MountQueue::default();
                    provide_context(child, queue.clone());
                    queue
                }
            };

            let render = (self.setup)(child, props);
            (id, render, mounts)
        });

        ComponentInstance {
            id,
            scope: cx,
            disposer: RefCell::new(Some(disposer)),
            render,
            mounts,
        }
    }
}

impl<P: Serialize, V> Component<P, V> {
    /// Like [`create`](Component::create), but records a sanitized snapshot
    /// of the props in the devtools tree. Requires `P: Serialize`.
    pub fn create_traced(&self, cx: Scope, props: P) -> ComponentInstance<V> {
        let snapshot = serde_json::to_value(&props)
            .map(devtools::sanitize)
            .unwrap_or(serde_json::Value::Null);
        self.create_inner(cx, props, snapshot)
    }
}

/// A live component instance. Holds the instance's identity, its scope, and
/// the render closure produced by setup.
pub struct ComponentInstance<V> {
    id: ComponentId,
    scope: Scope,
    disposer: RefCell<Option<ScopeDisposer>>,
    render: RenderFn<V>,
    mounts: MountQueue,
}

impl<V> ComponentInstance<V> {
    /// The instance's stable identity in the devtools tree.
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// The scope the instance was created under (its parent scope).
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Produces the current rendered value. Must be called under an effect
    /// for the output to stay wired to the signals it reads; setup never
    /// re-runs.
    pub fn render(&self) -> V {
        devtools::record_render(self.id);
        (self.render)()
    }

    /// Runs the mount callbacks queued during setup, FIFO, removing each as
    /// it runs. The renderer calls this once, after the first output has
    /// been attached.
    pub fn flush_mounts(&self) {
        self.mounts.flush();
    }

    /// Disposes the instance's scope early, before the parent scope goes
    /// away. Cleanups run as usual; a second call is a no-op.
    pub fn dispose(&self) {
        if let Some(disposer) = self.disposer.borrow_mut().take() {
            disposer.dispose();
        }
    }
}

/// Context marker carrying the nearest enclosing component instance.
#[derive(Clone, Copy)]
pub(crate) struct CurrentComponent(pub ComponentId);

/// Returns the identity of the component instance whose setup or render
/// path is currently running, if any.
pub fn current_component(cx: Scope) -> Option<ComponentId> {
    use_context::<CurrentComponent>(cx).map(|c| c.0)
}

/// The queue `on_mount` callbacks land in until the renderer flushes them.
#[derive(Clone, Default)]
pub(crate) struct MountQueue(
    #[allow(clippy::type_complexity)]
    Rc<RefCell<Vec<Box<dyn FnOnce()>>>>,
);

impl MountQueue {
    pub(crate) fn flush(&self) {
        // callbacks queued by a mount callback run in the same flush
        loop {
            let callbacks = { std::mem::take(&mut *self.0.borrow_mut()) };
            if callbacks.is_empty() {
                break;
            }
            for callback in callbacks {
                callback();
            }
        }
    }
}

/// Queues a callback to run once, after the component's first output has
/// been attached by the renderer.
///
/// Must be called during a component's setup (or under a render root);
/// outside of one the callback can never fire, so it is dropped with a
/// warning.
pub fn on_mount(cx: Scope, f: impl FnOnce() + 'static) {
    match use_context::<MountQueue>(cx) {
        Some(queue) => queue.0.borrow_mut().push(Box::new(f)),
        None => {
            tracing::warn!(
                "on_mount() called outside a component or render root; the \
                 callback will never run"
            );
        }
    }
}
