#![forbid(unsafe_code)]

//! The component runtime of the Vellum framework, built on
//! [`vellum_reactive`].
//!
//! This crate turns the raw reactive graph into a component model:
//!
//! - [`define_component`] declares a setup-once component; calling
//!   [`Component::create`] opens a scope, runs setup exactly once, and hands
//!   back a render closure for the renderer to wrap in an effect.
//! - [`on_mount`] and [`on_cleanup`](vellum_reactive::on_cleanup) are the
//!   two lifecycle hooks; [`create_root`] is the reference wiring a renderer
//!   is expected to reproduce (root scope → instance → render effect →
//!   mount flush → dispose on unmount).
//! - [`create_error_boundary`] traps errors reported from a subtree and
//!   swaps in a fallback until [`ErrorBoundary::reset`] rebuilds it.
//! - [`lazy`] and [`create_suspense`] implement deferred component loading
//!   with single-flight semantics and sticky failures.
//! - The [`ssr`] module carries the per-render server context (collected
//!   data, styles, islands, pending async work) and `render_to_string`.
//! - The [`devtools`] module publishes the component tree for inspection.
//!
//! Everything from `vellum_reactive` is re-exported, so this crate is the
//! single dependency a renderer or application layer needs.

pub use vellum_reactive::*;

mod boundary;
mod component;
mod context;
mod error;
pub mod devtools;
mod lazy;
mod root;
pub mod ssr;
mod suspense;

pub use boundary::*;
pub use component::*;
pub use context::*;
pub use error::*;
pub use lazy::*;
pub use root::*;
pub use suspense::*;
