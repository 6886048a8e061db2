//! The per-render server-side rendering context and its helpers.
//!
//! A server render installs an [`SsrContext`] for its duration; components
//! and collaborators call [`collect_data`] / [`extract_styles`] /
//! [`collect_island`] while rendering, and the renderer reads everything
//! back out of the finished context. All helpers are **silent no-ops when
//! no context is installed**, so shared components run unchanged on the
//! client.

use futures::future::LocalBoxFuture;
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};
use thiserror::Error;

/// Errors produced by [`render_to_string`].
#[derive(Debug, Error)]
pub enum SsrError {
    /// The render, including all awaited async work, exceeded the
    /// user-supplied budget.
    #[error("server render exceeded its budget of {0:?}")]
    Timeout(std::time::Duration),
}

/// The shared state of one server render. Cheap to clone; clones share the
/// same collections.
#[derive(Clone, Default)]
pub struct SsrContext {
    inner: Rc<SsrContextInner>,
}

#[derive(Default)]
struct SsrContextInner {
    data: RefCell<IndexMap<String, serde_json::Value>>,
    styles: RefCell<IndexSet<String>>,
    islands: RefCell<Vec<serde_json::Value>>,
    pending: RefCell<Vec<LocalBoxFuture<'static, ()>>>,
    complete: Cell<bool>,
}

impl SsrContext {
    /// Records a value under `key`. **Duplicate keys overwrite: the last
    /// write wins.** Collect under distinct keys if you need every value.
    pub fn collect_data(&self, key: impl Into<String>, value: impl Serialize) {
        match serde_json::to_value(value) {
            Ok(value) => {
                self.inner.data.borrow_mut().insert(key.into(), value);
            }
            Err(err) => {
                tracing::warn!("collect_data: value failed to serialize: {err}")
            }
        }
    }

    /// Adds a style chunk. Chunks deduplicate by exact string equality, in
    /// first-seen order.
    pub fn extract_styles(&self, css: impl Into<String>) {
        self.inner.styles.borrow_mut().insert(css.into());
    }

    /// Records an opaque island descriptor for the external island manager.
    pub fn collect_island(&self, descriptor: serde_json::Value) {
        self.inner.islands.borrow_mut().push(descriptor);
    }

    /// Registers async work (a suspension) that the render must await
    /// before it is complete.
    pub fn register_pending(&self, work: LocalBoxFuture<'static, ()>) {
        self.inner.pending.borrow_mut().push(work);
    }

    /// Takes the currently-registered pending work, leaving the set empty.
    pub fn take_pending(&self) -> Vec<LocalBoxFuture<'static, ()>> {
        self.inner.pending.borrow_mut().drain(..).collect()
    }

    /// Whether any pending work is registered.
    pub fn has_pending(&self) -> bool {
        !self.inner.pending.borrow().is_empty()
    }

    /// Whether the render has finished awaiting all of its async work.
    pub fn is_complete(&self) -> bool {
        self.inner.complete.get()
    }

    pub(crate) fn mark_complete(&self) {
        self.inner.complete.set(true);
    }

    /// A snapshot of the collected data map, in collection order.
    pub fn data(&self) -> IndexMap<String, serde_json::Value> {
        self.inner.data.borrow().clone()
    }

    /// The collected style chunks, deduplicated, in first-seen order.
    pub fn styles(&self) -> Vec<String> {
        self.inner.styles.borrow().iter().cloned().collect()
    }

    /// The collected island descriptors, in collection order.
    pub fn islands(&self) -> Vec<serde_json::Value> {
        self.inner.islands.borrow().clone()
    }
}

thread_local! {
    static SSR_CONTEXT: RefCell<Option<SsrContext>> =
        const { RefCell::new(None) };
}

/// Installs `context` as the active SSR context for this thread.
pub fn set_ssr_context(context: SsrContext) {
    SSR_CONTEXT.with(|current| *current.borrow_mut() = Some(context));
}

/// Returns the active SSR context, if a server render is in progress.
pub fn get_ssr_context() -> Option<SsrContext> {
    SSR_CONTEXT.with(|current| current.borrow().clone())
}

/// Removes and returns the active SSR context.
pub fn take_ssr_context() -> Option<SsrContext> {
    SSR_CONTEXT.with(|current| current.borrow_mut().take())
}

/// Records a value in the active SSR context under `key`; the finished
/// render exposes it in [`SsrRendered::data`]. **Duplicate keys overwrite:
/// the last write wins.** Outside a server render this is a silent no-op.
pub fn collect_data(key: impl Into<String>, value: impl Serialize) {
    if let Some(context) = get_ssr_context() {
        context.collect_data(key, value);
    }
}

/// Adds a style chunk to the active SSR context, deduplicated by exact
/// string equality. Outside a server render this is a silent no-op.
pub fn extract_styles(css: impl Into<String>) {
    if let Some(context) = get_ssr_context() {
        context.extract_styles(css);
    }
}

/// Records an opaque island descriptor in the active SSR context. Outside a
/// server render this is a silent no-op.
pub fn collect_island(descriptor: serde_json::Value) {
    if let Some(context) = get_ssr_context() {
        context.collect_island(descriptor);
    }
}

/// The product of a finished [`render_to_string`] call.
#[derive(Debug, Clone)]
pub struct SsrRendered {
    /// The final rendered output.
    pub html: String,
    /// Everything collected through [`collect_data`], last write per key.
    pub data: IndexMap<String, serde_json::Value>,
    /// Deduplicated style chunks, in first-seen order.
    pub styles: Vec<String>,
    /// Island descriptors for the external island manager.
    pub islands: Vec<serde_json::Value>,
}

/// Renders a view to a string on the server, awaiting async work registered
/// under suspense boundaries until the tree settles or `timeout` elapses.
///
/// `build` receives a fresh root scope and returns the root render closure;
/// the closure is wrapped in an effect like any other render, so resolved
/// suspensions re-render before the output string is taken. Exceeding the
/// budget fails with [`SsrError::Timeout`] and tears the render down.
#[cfg(feature = "ssr")]
pub async fn render_to_string<V, F>(
    build: F,
    timeout: std::time::Duration,
) -> Result<SsrRendered, SsrError>
where
    V: std::fmt::Display + 'static,
    F: FnOnce(vellum_reactive::Scope) -> crate::RenderFn<V> + 'static,
{
    use vellum_reactive::{create_runtime, raw_scope_and_disposer};

    let runtime = create_runtime();
    let (cx, disposer) = raw_scope_and_disposer(runtime);
    let context = SsrContext::default();
    set_ssr_context(context.clone());

    let result =
        tokio::time::timeout(timeout, drive_render(cx, context, build)).await;

    take_ssr_context();
    disposer.dispose();
    runtime.dispose();

    result.map_err(|_| SsrError::Timeout(timeout))
}

#[cfg(feature = "ssr")]
async fn drive_render<V, F>(
    cx: vellum_reactive::Scope,
    context: SsrContext,
    build: F,
) -> SsrRendered
where
    V: std::fmt::Display + 'static,
    F: FnOnce(vellum_reactive::Scope) -> crate::RenderFn<V> + 'static,
{
    use vellum_reactive::create_effect;

    let html = Rc::new(RefCell::new(String::new()));
    let render = build(cx);

    create_effect(cx, {
        let html = Rc::clone(&html);
        move |_| {
            *html.borrow_mut() = render().to_string();
        }
    });

    // each settled suspension re-renders through the effect; keep going
    // until a render pass registers no new work
    loop {
        let pending = context.take_pending();
        if pending.is_empty() {
            break;
        }
        futures::future::join_all(pending).await;
    }

    context.mark_complete();

    let html_out = html.borrow().clone();
    SsrRendered {
        html: html_out,
        data: context.data(),
        styles: context.styles(),
        islands: context.islands(),
    }
}
