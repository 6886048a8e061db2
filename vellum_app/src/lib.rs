#![forbid(unsafe_code)]

//! The application layer of the Vellum framework: named reactive stores, a
//! hierarchical dependency-injection container, and a module system that
//! binds both into an application with a defined bootstrap/teardown order.
//!
//! - [`define_store`] / [`use_store`] manage process-wide, lazily
//!   instantiated singletons of reactive state, each living under its own
//!   long-lived scope. [`derive_store`], [`extend_store`], and
//!   [`compose_stores`] build new stores out of existing ones.
//! - [`Container`] resolves tokens to providers (`value` / `class` /
//!   `factory` / `existing`), hierarchically, with per-container singleton
//!   memoization and constructor-cycle detection.
//! - [`ModuleDef`] bundles providers, stores, child modules, and async
//!   setup/teardown hooks; [`App::bootstrap`] walks the module DAG children
//!   first, [`App::unmount`] unwinds it in reverse.
//!
//! The store registry, the root container, and the global app handle are
//! process-wide mutable state with explicit teardown helpers
//! ([`clear_all_stores`], [`Container::clear`], [`clear_app`]); tests reset
//! through those, and production code does not mutate them after bootstrap.

mod app;
mod di;
mod module;
mod store;

pub use app::*;
pub use di::*;
pub use module::*;
pub use store::*;
