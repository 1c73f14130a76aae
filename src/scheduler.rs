//! The job queue every promise schedules its notifications on.
//!
//! A [`Scheduler`] is constructed once from a [`SchedulerConfig`], picks the
//! first supported backend from the configured ranking, and is then cloned
//! into every promise that needs it. Clones share one queue.
//!
//! ## Batching
//!
//! Each [`enqueue`](Scheduler::enqueue) buffers a job and asks the backend to
//! schedule a drain. The first drain callback to fire runs every buffered job
//! in FIFO order (including jobs enqueued while it runs), clears the buffer,
//! and cancels the backend tokens of the remaining drain callbacks. A burst of
//! enqueues within one turn therefore executes as one contiguous run.
//!
//! ## Driving
//!
//! Nothing runs until the owner drives the scheduler with
//! [`turn`](Scheduler::turn), [`run_until_idle`](Scheduler::run_until_idle)
//! or [`block_on`](Scheduler::block_on). Driving from inside a job is refused.
//!
//! ## Dropping
//!
//! A buffered job usually captures a promise, and every promise holds a
//! clone of its scheduler. While jobs are buffered the scheduler therefore
//! keeps itself alive. Drain the queue, or call
//! [`discard_pending`](Scheduler::discard_pending), before dropping the last
//! handle, or the scheduler and everything its jobs capture is leaked.

use crate::backend::{Backend, JobBackend};
use crate::config::{BackendKind, SchedulerConfig};
use crate::error::{Error, Result};
use crate::job::{Job, JobBuffer};
use crate::promise::Promise;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::{debug, error, trace, warn};

#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<Inner>,
}

struct Inner {
    backend: Backend,
    buffer: RefCell<JobBuffer>,
    executed: Cell<u64>,
    driving: Cell<bool>,
}

impl Scheduler {
    /// Probe the configured backends in rank order and adopt the first one
    /// whose schedule and cancel primitives both exist.
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        for kind in &config.ranking {
            let backend = Backend::probe(*kind, &config);
            if backend.is_supported() {
                debug!(backend = %kind, capacity = config.initial_capacity, "selected job backend");
                return Ok(Self {
                    inner: Rc::new(Inner {
                        backend,
                        buffer: RefCell::new(JobBuffer::with_capacity(config.initial_capacity)),
                        executed: Cell::new(0),
                        driving: Cell::new(false),
                    }),
                });
            }
            debug!(backend = %kind, "job backend not supported on this host");
        }
        error!(ranking = ?config.ranking, "no job backend is supported");
        Err(Error::SchedulerUnavailable)
    }

    /// A scheduler built from [`SchedulerConfig::default`].
    pub fn try_default() -> Result<Self> {
        Self::new(SchedulerConfig::default())
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.inner.backend.kind()
    }

    /// Defer `action` until after the current turn.
    pub fn enqueue<F>(&self, name: &'static str, action: F)
    where
        F: FnOnce() + 'static,
    {
        let slot = self.inner.buffer.borrow_mut().push(Job::new(name, action));
        let weak: Weak<Inner> = Rc::downgrade(&self.inner);
        let token = self.inner.backend.schedule(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.process();
            }
        }));
        self.inner.buffer.borrow_mut().set_token(slot, token);
    }

    /// Jobs waiting for the next drain.
    pub fn pending_jobs(&self) -> usize {
        self.inner.buffer.borrow().pending()
    }

    /// Drop every buffered job without running it and retract its drain
    /// callback. Returns the number of jobs discarded.
    ///
    /// Promises waiting on a discarded job stay pending.
    pub fn discard_pending(&self) -> usize {
        let (jobs, tokens) = self.inner.buffer.borrow_mut().drain_all();
        for token in tokens {
            self.inner.backend.cancel(token);
        }
        if !jobs.is_empty() {
            debug!(jobs = jobs.len(), "discarded buffered jobs");
        }
        // Jobs are dropped here, outside the buffer borrow.
        jobs.len()
    }

    /// Current capacity of the job buffer.
    pub fn capacity(&self) -> usize {
        self.inner.buffer.borrow().capacity()
    }

    /// Total jobs executed since construction.
    pub fn executed_jobs(&self) -> u64 {
        self.inner.executed.get()
    }

    /// Run one backend turn. Returns the number of jobs executed.
    pub fn turn(&self) -> usize {
        let Some(_guard) = DriveGuard::enter(&self.inner) else {
            return 0;
        };
        let before = self.inner.executed.get();
        self.inner.backend.run_once();
        (self.inner.executed.get() - before) as usize
    }

    /// Drive the backend until nothing is scheduled. Returns the number of
    /// jobs executed.
    pub fn run_until_idle(&self) -> usize {
        let Some(_guard) = DriveGuard::enter(&self.inner) else {
            return 0;
        };
        let before = self.inner.executed.get();
        while self.inner.backend.has_pending() {
            self.inner.backend.run_once();
        }
        (self.inner.executed.get() - before) as usize
    }

    /// Drive the backend until `promise` settles.
    ///
    /// Fails with [`Error::Stalled`] when the queue runs dry while the promise
    /// is still pending, which means nothing left could ever settle it.
    pub fn block_on<T, E>(&self, promise: &Promise<T, E>) -> Result<std::result::Result<T, E>>
    where
        T: Clone + 'static,
        E: Clone + From<Error> + 'static,
    {
        let Some(_guard) = DriveGuard::enter(&self.inner) else {
            return Err(Error::Stalled);
        };
        loop {
            if let Some(result) = promise.result() {
                return Ok(result);
            }
            if !self.inner.backend.has_pending() {
                return Err(Error::Stalled);
            }
            self.inner.backend.run_once();
        }
    }

    pub fn ptr_eq(&self, other: &Scheduler) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("backend", &self.backend_kind())
            .field("pending_jobs", &self.pending_jobs())
            .finish()
    }
}

impl Inner {
    /// Drain callback: run every buffered job in order, then clear the buffer.
    fn process(&self) {
        let mut slot = 0;
        loop {
            let taken = self.buffer.borrow_mut().take(slot);
            let Some((job, token)) = taken else {
                break;
            };
            if let Some(job) = job {
                trace!(job = job.name(), slot, "running job");
                job.execute();
                self.executed.set(self.executed.get() + 1);
            }
            if let Some(token) = token {
                self.backend.cancel(token);
            }
            slot += 1;
        }
        self.buffer.borrow_mut().clear();
        if slot > 0 {
            trace!(jobs = slot, "drained job buffer");
        }
    }
}

struct DriveGuard<'a> {
    inner: &'a Inner,
}

impl<'a> DriveGuard<'a> {
    fn enter(inner: &'a Inner) -> Option<Self> {
        if inner.driving.replace(true) {
            warn!("scheduler driven from inside a job; ignoring");
            return None;
        }
        Some(Self { inner })
    }
}

impl Drop for DriveGuard<'_> {
    fn drop(&mut self) {
        self.inner.driving.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HostPrimitives;
    use crate::job::PROMISE_JOBS;
    use std::time::Duration;

    fn log_job(scheduler: &Scheduler, log: &Rc<RefCell<Vec<u32>>>, value: u32) {
        let log = log.clone();
        scheduler.enqueue(PROMISE_JOBS, move || log.borrow_mut().push(value));
    }

    #[test]
    fn test_selects_first_supported_backend() {
        let scheduler = Scheduler::try_default().unwrap();
        assert_eq!(scheduler.backend_kind(), BackendKind::Immediate);

        let config = SchedulerConfig::builder()
            .without_backend(BackendKind::Immediate)
            .host_primitives(
                BackendKind::MessageChannel,
                HostPrimitives {
                    schedule: true,
                    cancel: false,
                },
            )
            .build()
            .unwrap();
        let scheduler = Scheduler::new(config).unwrap();
        assert_eq!(scheduler.backend_kind(), BackendKind::LocalPool);
    }

    #[test]
    fn test_no_supported_backend_is_fatal() {
        let mut builder = SchedulerConfig::builder();
        for kind in BackendKind::RANKED {
            builder = builder.without_backend(kind);
        }
        let err = Scheduler::new(builder.build().unwrap()).unwrap_err();
        assert_eq!(err, Error::SchedulerUnavailable);
    }

    #[test]
    fn test_jobs_never_run_inside_enqueue() {
        let scheduler = Scheduler::try_default().unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        log_job(&scheduler, &log, 1);
        assert!(log.borrow().is_empty());
        assert_eq!(scheduler.pending_jobs(), 1);
        assert_eq!(scheduler.run_until_idle(), 1);
        assert_eq!(*log.borrow(), vec![1]);
    }

    #[test]
    fn test_burst_drains_in_one_turn() {
        for kind in BackendKind::RANKED {
            let config = SchedulerConfig::builder()
                .ranking([kind])
                .timer_min_delay(Duration::ZERO)
                .build()
                .unwrap();
            let scheduler = Scheduler::new(config).unwrap();
            let log = Rc::new(RefCell::new(Vec::new()));
            for i in 0..10 {
                log_job(&scheduler, &log, i);
            }
            assert_eq!(scheduler.turn(), 10, "backend {kind}");
            assert_eq!(*log.borrow(), (0..10).collect::<Vec<_>>());
            assert_eq!(scheduler.pending_jobs(), 0);
            // The other nine drain callbacks were cancelled.
            assert_eq!(scheduler.run_until_idle(), 0, "backend {kind}");
        }
    }

    #[test]
    fn test_jobs_enqueued_during_drain_run_in_order() {
        let scheduler = Scheduler::try_default().unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        {
            let s = scheduler.clone();
            let log2 = log.clone();
            scheduler.enqueue(PROMISE_JOBS, move || {
                log2.borrow_mut().push(1);
                log_job(&s, &log2, 3);
            });
        }
        log_job(&scheduler, &log, 2);
        scheduler.run_until_idle();
        assert_eq!(*log.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn test_capacity_grows() {
        let config = SchedulerConfig::builder()
            .initial_capacity(1)
            .build()
            .unwrap();
        let scheduler = Scheduler::new(config).unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            log_job(&scheduler, &log, i);
        }
        assert_eq!(scheduler.capacity(), 4);
        scheduler.run_until_idle();
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert_eq!(scheduler.executed_jobs(), 3);
    }

    #[test]
    fn test_large_burst_drains_in_linear_time() {
        let scheduler = Scheduler::try_default().unwrap();
        let count = Rc::new(Cell::new(0u32));
        for _ in 0..100_000 {
            let count = count.clone();
            scheduler.enqueue(PROMISE_JOBS, move || count.set(count.get() + 1));
        }
        let started = std::time::Instant::now();
        assert_eq!(scheduler.run_until_idle(), 100_000);
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(count.get(), 100_000);
        assert_eq!(scheduler.pending_jobs(), 0);
        assert_eq!(scheduler.run_until_idle(), 0);
    }

    #[test]
    fn test_discard_pending_breaks_the_cycle() {
        let scheduler = Scheduler::try_default().unwrap();
        let inner = Rc::downgrade(&scheduler.inner);
        let ran = Rc::new(Cell::new(false));
        {
            let held = scheduler.clone();
            let ran = ran.clone();
            scheduler.enqueue(PROMISE_JOBS, move || {
                let _ = held.pending_jobs();
                ran.set(true);
            });
        }
        assert_eq!(scheduler.discard_pending(), 1);
        assert_eq!(scheduler.pending_jobs(), 0);
        assert_eq!(scheduler.run_until_idle(), 0);
        drop(scheduler);
        assert!(inner.upgrade().is_none());
        assert!(!ran.get());
    }

    #[test]
    fn test_reentrant_drive_is_refused() {
        let scheduler = Scheduler::try_default().unwrap();
        let nested = Rc::new(Cell::new(usize::MAX));
        {
            let s = scheduler.clone();
            let nested = nested.clone();
            scheduler.enqueue(PROMISE_JOBS, move || nested.set(s.run_until_idle()));
        }
        scheduler.run_until_idle();
        assert_eq!(nested.get(), 0);
    }
}
