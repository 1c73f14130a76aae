//! The settlement state machine.
//!
//! A [`Promise`] starts pending and settles at most once, to fulfilled with a
//! `T` or rejected with an `E`. Settlement itself is synchronous; reactions
//! attached with [`then`](Promise::then) and friends always run later, as
//! jobs on the promise's [`Scheduler`], even when the promise had already
//! settled when they were attached.
//!
//! ```
//! use promise_core::{Error, Promise, Scheduler};
//!
//! let scheduler = Scheduler::try_default().unwrap();
//! let first: Promise<i32, Error> = Promise::new(&scheduler, |resolve, _reject| {
//!     resolve.resolve_value(1);
//!     Ok(())
//! });
//! let second = first.map(|v| Ok(v + 1));
//! assert!(!second.is_settled());
//! assert_eq!(scheduler.block_on(&second), Ok(Ok(2)));
//! ```

use crate::error::Error;
use crate::job::PROMISE_JOBS;
use crate::reaction::{Handler, PromiseReaction, Reaction};
use crate::resolve::{resolving_functions, Capability, Reject, Resolution, Resolve};
use crate::scheduler::Scheduler;
use crate::settled::Settled;
use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;
use std::task::Waker;

/// Observable settlement state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseState {
    Pending,
    Fulfilled,
    Rejected,
}

pub(crate) enum State<T, E> {
    Pending {
        fulfill_reactions: Vec<Box<dyn Reaction<T>>>,
        reject_reactions: Vec<Box<dyn Reaction<E>>>,
        wakers: Vec<Waker>,
    },
    Fulfilled(T),
    Rejected(E),
}

impl<T, E> State<T, E> {
    fn pending() -> Self {
        State::Pending {
            fulfill_reactions: Vec::new(),
            reject_reactions: Vec::new(),
            wakers: Vec::new(),
        }
    }
}

/// A value that will be available later, or the reason it never will be.
pub struct Promise<T, E> {
    state: Rc<RefCell<State<T, E>>>,
    scheduler: Scheduler,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            scheduler: self.scheduler.clone(),
        }
    }
}

impl<T, E> Promise<T, E> {
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Whether both handles point at the same promise.
    pub fn ptr_eq(&self, other: &Promise<T, E>) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    pub fn state(&self) -> PromiseState {
        match &*self.state.borrow() {
            State::Pending { .. } => PromiseState::Pending,
            State::Fulfilled(_) => PromiseState::Fulfilled,
            State::Rejected(_) => PromiseState::Rejected,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.state() != PromiseState::Pending
    }

    fn pending(scheduler: &Scheduler) -> Self {
        Self {
            state: Rc::new(RefCell::new(State::pending())),
            scheduler: scheduler.clone(),
        }
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    /// Create a pending promise and run `setup` with its entry points right
    /// away. An `Err` from `setup` rejects the promise instead of being
    /// returned.
    pub fn new<F>(scheduler: &Scheduler, setup: F) -> Self
    where
        F: FnOnce(Resolve<T, E>, Reject<T, E>) -> Result<(), E>,
    {
        let promise = Self::pending(scheduler);
        let (resolve, reject) = resolving_functions(&promise);
        if let Err(reason) = setup(resolve, reject.clone()) {
            reject.reject(reason);
        }
        promise
    }

    /// A pending promise together with its entry points.
    pub fn with_resolvers(scheduler: &Scheduler) -> Capability<T, E> {
        Capability::new(Self::pending(scheduler))
    }

    /// The settled outcome, or `None` while pending.
    pub fn result(&self) -> Option<Result<T, E>> {
        match &*self.state.borrow() {
            State::Pending { .. } => None,
            State::Fulfilled(value) => Some(Ok(value.clone())),
            State::Rejected(reason) => Some(Err(reason.clone())),
        }
    }

    /// Attach both handlers. Each returns what the derived promise is resolved
    /// with, or `Err` to reject it.
    pub fn then<U, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Promise<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Result<Resolution<U, E>, E> + 'static,
        R: FnOnce(E) -> Result<Resolution<U, E>, E> + 'static,
    {
        self.perform_then(
            Handler::Callback(Box::new(on_fulfilled)),
            Handler::Callback(Box::new(on_rejected)),
        )
    }

    /// Transform the fulfilled value. Rejections pass through.
    pub fn map<U, F>(&self, f: F) -> Promise<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Result<U, E> + 'static,
    {
        self.perform_then(
            Handler::Callback(Box::new(move |value| f(value).map(Resolution::Value))),
            Handler::Thrower(std::convert::identity),
        )
    }

    /// Chain a step that may itself return a promise or thenable. Rejections
    /// pass through.
    pub fn and_then<U, F>(&self, f: F) -> Promise<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Result<Resolution<U, E>, E> + 'static,
    {
        self.perform_then(
            Handler::Callback(Box::new(f)),
            Handler::Thrower(std::convert::identity),
        )
    }

    /// Handle a rejection. Fulfilled values pass through.
    pub fn catch<F>(&self, on_rejected: F) -> Promise<T, E>
    where
        F: FnOnce(E) -> Result<Resolution<T, E>, E> + 'static,
    {
        self.perform_then(
            Handler::Identity(std::convert::identity),
            Handler::Callback(Box::new(on_rejected)),
        )
    }

    /// A `std::future::Future` that completes when this promise settles.
    pub fn settled(&self) -> Settled<T, E> {
        Settled::new(self.clone())
    }

    fn perform_then<U>(
        &self,
        on_fulfilled: Handler<T, U, E>,
        on_rejected: Handler<E, U, E>,
    ) -> Promise<U, E>
    where
        U: Clone + 'static,
    {
        let capability = Promise::<U, E>::with_resolvers(&self.scheduler);
        let derived = capability.promise.clone();
        let fulfill_reaction = PromiseReaction::new(capability.clone(), on_fulfilled);
        let reject_reaction = PromiseReaction::new(capability, on_rejected);

        match self.result() {
            None => {
                if let State::Pending {
                    fulfill_reactions,
                    reject_reactions,
                    ..
                } = &mut *self.state.borrow_mut()
                {
                    fulfill_reactions.push(Box::new(fulfill_reaction));
                    reject_reactions.push(Box::new(reject_reaction));
                }
            }
            Some(Ok(value)) => {
                self.scheduler.enqueue(PROMISE_JOBS, move || {
                    Box::new(fulfill_reaction).run(value)
                });
            }
            Some(Err(reason)) => {
                self.scheduler.enqueue(PROMISE_JOBS, move || {
                    Box::new(reject_reaction).run(reason)
                });
            }
        }
        derived
    }

    /// Settled outcome, registering `waker` if still pending.
    pub(crate) fn poll_result(&self, waker: &Waker) -> Option<Result<T, E>> {
        match &mut *self.state.borrow_mut() {
            State::Pending { wakers, .. } => {
                if !wakers.iter().any(|w| w.will_wake(waker)) {
                    wakers.push(waker.clone());
                }
                None
            }
            State::Fulfilled(value) => Some(Ok(value.clone())),
            State::Rejected(reason) => Some(Err(reason.clone())),
        }
    }
}

/// Settle `promise` as fulfilled and schedule its fulfill reactions.
///
/// Callers go through the one-shot entry points; a promise that is already
/// settled is left alone.
pub(crate) fn fulfill_promise<T, E>(promise: &Promise<T, E>, value: T)
where
    T: Clone + 'static,
    E: 'static,
{
    let previous = {
        let mut state = promise.state.borrow_mut();
        if !matches!(*state, State::Pending { .. }) {
            return;
        }
        std::mem::replace(&mut *state, State::Fulfilled(value.clone()))
    };
    if let State::Pending {
        fulfill_reactions,
        wakers,
        ..
    } = previous
    {
        trigger_reactions(&promise.scheduler, fulfill_reactions, value);
        wakers.into_iter().for_each(Waker::wake);
    }
}

/// Settle `promise` as rejected and schedule its reject reactions.
pub(crate) fn reject_promise<T, E>(promise: &Promise<T, E>, reason: E)
where
    T: 'static,
    E: Clone + 'static,
{
    let previous = {
        let mut state = promise.state.borrow_mut();
        if !matches!(*state, State::Pending { .. }) {
            return;
        }
        std::mem::replace(&mut *state, State::Rejected(reason.clone()))
    };
    if let State::Pending {
        reject_reactions,
        wakers,
        ..
    } = previous
    {
        trigger_reactions(&promise.scheduler, reject_reactions, reason);
        wakers.into_iter().for_each(Waker::wake);
    }
}

fn trigger_reactions<A>(scheduler: &Scheduler, reactions: Vec<Box<dyn Reaction<A>>>, argument: A)
where
    A: Clone + 'static,
{
    for reaction in reactions {
        let argument = argument.clone();
        scheduler.enqueue(PROMISE_JOBS, move || reaction.run(argument));
    }
}

impl<T: Debug, E: Debug> Debug for Promise<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &*self.state.borrow() {
            State::Pending { .. } => write!(f, "Promise {{ <pending> }}"),
            State::Fulfilled(v) => write!(f, "Promise {{ <fulfilled>: {:?} }}", v),
            State::Rejected(e) => write!(f, "Promise {{ <rejected>: {:?} }}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn scheduler() -> Scheduler {
        Scheduler::try_default().unwrap()
    }

    #[test]
    fn test_setup_runs_synchronously() {
        let scheduler = scheduler();
        let ran = Rc::new(Cell::new(false));
        let r = ran.clone();
        let promise: Promise<i32, Error> = Promise::new(&scheduler, move |_, _| {
            r.set(true);
            Ok(())
        });
        assert!(ran.get());
        assert_eq!(promise.state(), PromiseState::Pending);
    }

    #[test]
    fn test_plain_value_settles_synchronously() {
        let scheduler = scheduler();
        let promise: Promise<i32, Error> = Promise::new(&scheduler, |resolve, _| {
            resolve.resolve_value(7);
            Ok(())
        });
        assert_eq!(promise.state(), PromiseState::Fulfilled);
        assert_eq!(promise.result(), Some(Ok(7)));
    }

    #[test]
    fn test_settles_once() {
        let scheduler = scheduler();
        let capability = Promise::<i32, Error>::with_resolvers(&scheduler);
        capability.resolve.resolve_value(1);
        capability.resolve.resolve_value(2);
        capability.reject.reject(Error::Stalled);
        assert_eq!(capability.promise.result(), Some(Ok(1)));
        assert!(capability.reject.is_used());
    }

    #[test]
    fn test_reject_then_resolve_is_ignored() {
        let scheduler = scheduler();
        let capability = Promise::<i32, Error>::with_resolvers(&scheduler);
        capability.reject.reject(Error::Stalled);
        capability.resolve.resolve_value(3);
        assert_eq!(capability.promise.result(), Some(Err(Error::Stalled)));
    }

    #[test]
    fn test_reactions_fire_in_attachment_order() {
        let scheduler = scheduler();
        let capability = Promise::<i32, Error>::with_resolvers(&scheduler);
        let log = Rc::new(RefCell::new(Vec::new()));
        for tag in ["a", "b", "c"] {
            let log = log.clone();
            capability.promise.map(move |v| {
                log.borrow_mut().push((tag, v));
                Ok(())
            });
        }
        capability.resolve.resolve_value(5);
        assert!(log.borrow().is_empty());
        scheduler.run_until_idle();
        assert_eq!(*log.borrow(), vec![("a", 5), ("b", 5), ("c", 5)]);
    }

    #[test]
    fn test_then_returns_a_new_promise() {
        let scheduler = scheduler();
        let capability = Promise::<i32, Error>::with_resolvers(&scheduler);
        let derived = capability.promise.catch(|e| Err(e));
        assert!(!derived.ptr_eq(&capability.promise));
    }

    #[test]
    fn test_debug_shows_state() {
        let scheduler = scheduler();
        let capability = Promise::<i32, Error>::with_resolvers(&scheduler);
        assert_eq!(format!("{:?}", capability.promise), "Promise { <pending> }");
        capability.resolve.resolve_value(4);
        assert_eq!(
            format!("{:?}", capability.promise),
            "Promise { <fulfilled>: 4 }"
        );
    }
}
