//! Reactions: a handler paired with the capability of the derived promise.

use crate::error::Error;
use crate::resolve::{Capability, Resolution};

/// What a reaction does with the incoming value.
pub(crate) enum Handler<A, U, E> {
    /// Pass the value through unchanged.
    Identity(fn(A) -> U),
    /// Re-raise the reason.
    Thrower(fn(A) -> E),
    Callback(Box<dyn FnOnce(A) -> Result<Resolution<U, E>, E>>),
}

pub(crate) struct PromiseReaction<A, U, E> {
    capability: Capability<U, E>,
    handler: Handler<A, U, E>,
}

impl<A, U, E> PromiseReaction<A, U, E> {
    pub(crate) fn new(capability: Capability<U, E>, handler: Handler<A, U, E>) -> Self {
        Self {
            capability,
            handler,
        }
    }
}

/// A queued reaction with its derived type erased, so one source promise can
/// hold reactions producing different types.
pub(crate) trait Reaction<A> {
    fn run(self: Box<Self>, argument: A);
}

impl<A, U, E> Reaction<A> for PromiseReaction<A, U, E>
where
    U: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    fn run(self: Box<Self>, argument: A) {
        let PromiseReaction {
            capability,
            handler,
        } = *self;
        let outcome = match handler {
            Handler::Identity(pass) => Ok(Resolution::Value(pass(argument))),
            Handler::Thrower(raise) => Err(raise(argument)),
            Handler::Callback(callback) => callback(argument),
        };
        match outcome {
            Ok(resolution) => capability.resolve.resolve(resolution),
            Err(reason) => capability.reject.reject(reason),
        }
    }
}
