//! Awaiting a promise from `async` code.

use crate::error::Error;
use crate::promise::Promise;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// `Settled` waits for a [`Promise`] from `async` code. Every poll while the
/// promise is pending registers the task's waker with it; settling the
/// promise wakes them all. Many `Settled` may wait on the same promise.
///
/// Settling still needs the scheduler to be driven when the promise depends
/// on jobs; a promise settled directly through its entry points wakes its
/// waiters immediately.
///
/// # Examples
///
/// ```
/// use promise_core::{Error, Promise, Scheduler};
/// use futures::executor::block_on;
///
/// let scheduler = Scheduler::try_default().unwrap();
/// let capability = Promise::<String, Error>::with_resolvers(&scheduler);
/// capability.resolve.resolve_value("🍓".into());
/// assert_eq!(block_on(capability.promise.settled()), Ok("🍓".to_string()));
/// ```
#[must_use = "futures do nothing unless polled"]
pub struct Settled<T, E> {
    promise: Promise<T, E>,
}

impl<T, E> Settled<T, E> {
    pub(crate) fn new(promise: Promise<T, E>) -> Self {
        Self { promise }
    }
}

impl<T, E> Future for Settled<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.promise.poll_result(cx.waker()) {
            Some(value) => Poll::Ready(value),
            None => Poll::Pending,
        }
    }
}
