//! Single-threaded promises over a pluggable job queue.
//!
//! A [`Promise`] settles once, to a value or a reason. Anything waiting on it
//! is notified through jobs that a [`Scheduler`] runs after the current turn,
//! never from inside the call that attached or settled it. Promises adopt
//! other promises and foreign [`Thenable`]s, and [`Promise::all`] /
//! [`Promise::race`] coordinate many promises into one.
//!
//! The scheduler picks its backend once, from a ranked list, when it is
//! constructed; see [`config`] and [`backend`].
//!
//! # Examples
//!
//! ```
//! use promise_core::{Error, Promise, Resolution, Scheduler};
//!
//! let scheduler = Scheduler::try_default().unwrap();
//! let a = Promise::<i32, Error>::resolve(&scheduler, Resolution::Value(1));
//! let b = Promise::with_resolvers(&scheduler);
//! let all = Promise::<i32, Error>::all(&scheduler, vec![a, b.promise.clone()]);
//!
//! b.resolve.resolve_value(2);
//! assert_eq!(scheduler.block_on(&all), Ok(Ok(vec![1, 2])));
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod iter;
pub mod job;
pub mod scheduler;

mod combinators;
mod promise;
mod reaction;
mod resolve;
mod settled;

pub use config::{BackendKind, SchedulerConfig};
pub use error::{Error, Result};
pub use promise::{Promise, PromiseState};
pub use resolve::{Capability, Continuation, Reject, Resolution, Resolve, ThenFn, Thenable};
pub use scheduler::Scheduler;
pub use settled::Settled;
