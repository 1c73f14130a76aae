//! Resolution protocol: the one-shot resolve/reject entry points of a promise
//! and the adoption of thenables.

use crate::error::Error;
use crate::job::PROMISE_JOBS;
use crate::promise::{fulfill_promise, reject_promise, Promise};
use std::cell::Cell;
use std::rc::Rc;
use tracing::debug;

/// What a promise is resolved with.
pub enum Resolution<T, E> {
    /// A plain value. Fulfills immediately.
    Value(T),
    /// Another promise of the same type. Adopted through a job.
    Promise(Promise<T, E>),
    /// A foreign value that may carry a continuation.
    Thenable(Rc<dyn Thenable<T, E>>),
}

impl<T: Clone, E> Clone for Resolution<T, E> {
    fn clone(&self) -> Self {
        match self {
            Resolution::Value(value) => Resolution::Value(value.clone()),
            Resolution::Promise(promise) => Resolution::Promise(promise.clone()),
            Resolution::Thenable(thenable) => Resolution::Thenable(thenable.clone()),
        }
    }
}

impl<T, E> From<Promise<T, E>> for Resolution<T, E> {
    fn from(promise: Promise<T, E>) -> Self {
        Resolution::Promise(promise)
    }
}

impl<T, E> From<Rc<dyn Thenable<T, E>>> for Resolution<T, E> {
    fn from(thenable: Rc<dyn Thenable<T, E>>) -> Self {
        Resolution::Thenable(thenable)
    }
}

/// Continuation invoked with a fresh resolve/reject pair for the adopting
/// promise. Returning `Err` rejects it, unless the pair was already used.
pub type ThenFn<T, E> = Box<dyn FnOnce(Resolve<T, E>, Reject<T, E>) -> Result<(), E>>;

/// Result of looking up a thenable's continuation.
pub enum Continuation<T, E> {
    /// No callable continuation: the thenable is adopted as this plain value.
    Absent(T),
    Callable(ThenFn<T, E>),
}

/// A foreign value that can be adopted into a promise.
///
/// [`continuation`](Thenable::continuation) is the lookup step; an `Err`
/// means the lookup itself failed and the adopting promise rejects with it.
/// A callable continuation is never invoked synchronously: it runs in a job
/// after the current turn, even when the thenable is already settled.
pub trait Thenable<T, E> {
    fn continuation(&self) -> Result<Continuation<T, E>, E>;

    /// The promise behind this thenable, if it is one. Used to detect a
    /// promise being resolved with itself.
    fn as_promise(&self) -> Option<&Promise<T, E>> {
        None
    }
}

/// Fulfill-side entry point of a promise.
pub struct Resolve<T, E> {
    promise: Promise<T, E>,
    already_resolved: Rc<Cell<bool>>,
}

/// Reject-side entry point of a promise.
pub struct Reject<T, E> {
    promise: Promise<T, E>,
    already_resolved: Rc<Cell<bool>>,
}

impl<T, E> Clone for Resolve<T, E> {
    fn clone(&self) -> Self {
        Self {
            promise: self.promise.clone(),
            already_resolved: self.already_resolved.clone(),
        }
    }
}

impl<T, E> Clone for Reject<T, E> {
    fn clone(&self) -> Self {
        Self {
            promise: self.promise.clone(),
            already_resolved: self.already_resolved.clone(),
        }
    }
}

impl<T, E> Resolve<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    /// Resolve the promise. Ignored if this pair was already used.
    pub fn resolve(&self, resolution: Resolution<T, E>) {
        if self.already_resolved.replace(true) {
            return;
        }
        resolve_promise(&self.promise, resolution);
    }

    /// Shorthand for resolving with [`Resolution::Value`].
    pub fn resolve_value(&self, value: T) {
        self.resolve(Resolution::Value(value))
    }

    pub fn is_used(&self) -> bool {
        self.already_resolved.get()
    }
}

impl<T, E> Reject<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    /// Reject the promise right away. Ignored if this pair was already used.
    pub fn reject(&self, reason: E) {
        if self.already_resolved.replace(true) {
            return;
        }
        reject_promise(&self.promise, reason);
    }

    pub fn is_used(&self) -> bool {
        self.already_resolved.get()
    }
}

/// A promise bundled with its own resolve/reject entry points.
pub struct Capability<T, E> {
    pub promise: Promise<T, E>,
    pub resolve: Resolve<T, E>,
    pub reject: Reject<T, E>,
}

impl<T, E> Clone for Capability<T, E> {
    fn clone(&self) -> Self {
        Self {
            promise: self.promise.clone(),
            resolve: self.resolve.clone(),
            reject: self.reject.clone(),
        }
    }
}

impl<T, E> Capability<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    pub(crate) fn new(promise: Promise<T, E>) -> Self {
        let (resolve, reject) = resolving_functions(&promise);
        Self {
            promise,
            resolve,
            reject,
        }
    }
}

/// A fresh resolve/reject pair for `promise`, sharing one guard flag.
pub(crate) fn resolving_functions<T, E>(promise: &Promise<T, E>) -> (Resolve<T, E>, Reject<T, E>) {
    let already_resolved = Rc::new(Cell::new(false));
    (
        Resolve {
            promise: promise.clone(),
            already_resolved: already_resolved.clone(),
        },
        Reject {
            promise: promise.clone(),
            already_resolved,
        },
    )
}

fn resolve_promise<T, E>(promise: &Promise<T, E>, resolution: Resolution<T, E>)
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    match resolution {
        Resolution::Value(value) => fulfill_promise(promise, value),
        Resolution::Promise(other) => adopt(promise, &other),
        Resolution::Thenable(thenable) => adopt(promise, thenable.as_ref()),
    }
}

fn adopt<T, E>(promise: &Promise<T, E>, thenable: &dyn Thenable<T, E>)
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    if thenable
        .as_promise()
        .is_some_and(|other| other.ptr_eq(promise))
    {
        debug!("promise resolved with itself");
        reject_promise(promise, E::from(Error::SelfResolution));
        return;
    }
    match thenable.continuation() {
        Err(reason) => {
            debug!("thenable continuation lookup failed");
            reject_promise(promise, reason);
        }
        Ok(Continuation::Absent(value)) => fulfill_promise(promise, value),
        Ok(Continuation::Callable(then)) => {
            let target = promise.clone();
            promise
                .scheduler()
                .enqueue(PROMISE_JOBS, move || resolve_thenable_job(target, then));
        }
    }
}

fn resolve_thenable_job<T, E>(target: Promise<T, E>, then: ThenFn<T, E>)
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    let (resolve, reject) = resolving_functions(&target);
    if let Err(reason) = then(resolve, reject.clone()) {
        reject.reject(reason);
    }
}

impl<T, E> Thenable<T, E> for Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    fn continuation(&self) -> Result<Continuation<T, E>, E> {
        let source = self.clone();
        Ok(Continuation::Callable(Box::new(move |resolve, reject| {
            source.then(
                move |value| {
                    resolve.resolve_value(value);
                    Ok(Resolution::Value(()))
                },
                move |reason| {
                    reject.reject(reason);
                    Ok(Resolution::Value(()))
                },
            );
            Ok(())
        })))
    }

    fn as_promise(&self) -> Option<&Promise<T, E>> {
        Some(self)
    }
}
