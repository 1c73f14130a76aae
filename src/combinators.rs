//! Static constructors and combinators built on the public promise surface.

use crate::error::{Error, Result};
use crate::iter::{IteratorRecord, Sequence};
use crate::promise::Promise;
use crate::resolve::{Capability, Resolution};
use crate::scheduler::Scheduler;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

impl<T, E> Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    /// A promise resolved with `resolution`. A promise on the same scheduler
    /// is returned unchanged rather than wrapped.
    pub fn resolve(scheduler: &Scheduler, resolution: Resolution<T, E>) -> Promise<T, E> {
        if let Resolution::Promise(promise) = &resolution {
            if promise.scheduler().ptr_eq(scheduler) {
                return promise.clone();
            }
        }
        let capability = Promise::with_resolvers(scheduler);
        capability.resolve.resolve(resolution);
        capability.promise
    }

    /// A promise already rejected with `reason`.
    pub fn reject(scheduler: &Scheduler, reason: E) -> Promise<T, E> {
        let capability = Promise::with_resolvers(scheduler);
        capability.reject.reject(reason);
        capability.promise
    }

    /// Fulfills with every element's value, in input order, once all of them
    /// have fulfilled. Rejects with the first rejection to arrive.
    pub fn all<S>(scheduler: &Scheduler, iterable: S) -> Promise<Vec<T>, E>
    where
        S: Sequence,
        S::Item: Into<Resolution<T, E>>,
    {
        let capability = Promise::<Vec<T>, E>::with_resolvers(scheduler);
        let mut record = IteratorRecord::new(iterable);
        if let Err(err) = perform_all(&mut record, scheduler, &capability) {
            capability.reject.reject(E::from(err));
        }
        capability.promise
    }

    /// Settles like whichever element settles first.
    pub fn race<S>(scheduler: &Scheduler, iterable: S) -> Promise<T, E>
    where
        S: Sequence,
        S::Item: Into<Resolution<T, E>>,
    {
        let capability = Promise::<T, E>::with_resolvers(scheduler);
        let mut record = IteratorRecord::new(iterable);
        if let Err(err) = perform_race(&mut record, scheduler, &capability) {
            capability.reject.reject(E::from(err));
        }
        capability.promise
    }
}

fn perform_all<S, T, E>(
    record: &mut IteratorRecord<S>,
    scheduler: &Scheduler,
    capability: &Capability<Vec<T>, E>,
) -> Result<()>
where
    S: Sequence,
    S::Item: Into<Resolution<T, E>>,
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    let values: Rc<RefCell<Vec<Option<T>>>> = Rc::new(RefCell::new(Vec::new()));
    // Starts at one so the count cannot reach zero before enumeration ends.
    let remaining = Rc::new(Cell::new(1usize));
    let mut index = 0;

    while let Some(next) = record.next_item()? {
        values.borrow_mut().push(None);
        let next_promise = Promise::<T, E>::resolve(scheduler, next.into());
        remaining.set(remaining.get() + 1);

        let element_values = values.clone();
        let element_remaining = remaining.clone();
        let resolve = capability.resolve.clone();
        let reject = capability.reject.clone();
        next_promise.then(
            move |value| {
                element_values.borrow_mut()[index] = Some(value);
                element_remaining.set(element_remaining.get() - 1);
                if element_remaining.get() == 0 {
                    resolve.resolve_value(collect(&element_values));
                }
                Ok(Resolution::Value(()))
            },
            move |reason| {
                reject.reject(reason);
                Ok(Resolution::Value(()))
            },
        );
        index += 1;
    }

    remaining.set(remaining.get() - 1);
    if remaining.get() == 0 {
        capability.resolve.resolve_value(collect(&values));
    }
    Ok(())
}

fn collect<T>(values: &RefCell<Vec<Option<T>>>) -> Vec<T> {
    values.borrow_mut().drain(..).flatten().collect()
}

fn perform_race<S, T, E>(
    record: &mut IteratorRecord<S>,
    scheduler: &Scheduler,
    capability: &Capability<T, E>,
) -> Result<()>
where
    S: Sequence,
    S::Item: Into<Resolution<T, E>>,
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    while let Some(next) = record.next_item()? {
        let next_promise = Promise::<T, E>::resolve(scheduler, next.into());
        let resolve = capability.resolve.clone();
        let reject = capability.reject.clone();
        next_promise.then(
            move |value| {
                resolve.resolve_value(value);
                Ok(Resolution::Value(()))
            },
            move |reason| {
                reject.reject(reason);
                Ok(Resolution::Value(()))
            },
        );
    }
    Ok(())
}
