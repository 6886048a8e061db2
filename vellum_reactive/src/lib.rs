#![forbid(unsafe_code)]

//! The reactive system for the Vellum component framework.
//!
//! ## Fine-Grained Reactivity
//!
//! Vellum is built on a fine-grained reactive system: individual reactive
//! values (“signals”) trigger the code that reacts to them (“effects”) to
//! re-run. Signals and effects are inter-dependent halves of the system —
//! without effects, signal changes are never observed outside the graph;
//! without signals, effects run once and never again.
//!
//! The most commonly-used functions and types:
//!
//! ### Signals
//! 1. *Signals:* [`create_signal`], which returns a ([`ReadSignal`],
//!    [`WriteSignal`]) pair, or [`create_rw_signal`], which returns an
//!    [`RwSignal`] without the read-write segregation.
//! 2. *Derived signals:* any closure that reads other signals.
//! 3. *Memos:* [`create_memo`], a cached derivation that only notifies its
//!    dependents when its value actually changes.
//!
//! ### Effects
//! Use [`create_effect`] to synchronize the reactive system with something
//! outside it. A renderer wraps a component's render closure in an effect,
//! so application code rarely needs explicit effects of its own.
//!
//! ### Scopes
//! Every signal, memo, and effect is owned by a [`Scope`]. Disposing a scope
//! runs its cleanup callbacks (LIFO), disposes child scopes first, and
//! removes everything the scope owns from the reactive graph.
//!
//! ### Example
//! ```
//! use vellum_reactive::*;
//!
//! create_scope(create_runtime(), |cx| {
//!     // a signal: returns a (getter, setter) pair
//!     let (count, set_count) = create_signal(cx, 0);
//!     assert_eq!(count.get(), 0);
//!
//!     set_count.set(1);
//!     // or mutate in place with update()
//!     set_count.update(|n| *n += 1);
//!
//!     // a memo subscribes to the signal and recomputes lazily
//!     let double_count = create_memo(cx, move |_| count.get() * 2);
//!     assert_eq!(double_count.get(), 4);
//!
//!     // this effect runs whenever count changes
//!     create_effect(cx, move |_| {
//!         println!("count = {}", count.get());
//!     });
//! })
//! .dispose();
//! ```

mod context;
mod diagnostics;
mod effect;
mod macros;
mod memo;
mod node;
mod runtime;
mod scope;
mod signal;
mod signal_wrappers;
mod watch;

pub use context::*;
pub use diagnostics::*;
pub use effect::*;
pub use memo::*;
pub use node::NodeId;
pub use runtime::{create_runtime, ReactiveError, RuntimeId};
pub use scope::*;
pub use signal::*;
pub use signal_wrappers::*;
pub use watch::*;
