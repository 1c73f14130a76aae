//! Jobs and the buffer they wait in.

use crate::backend::Token;
use tracing::debug;

/// Tag carried by every promise reaction and thenable-resolution job.
pub const PROMISE_JOBS: &str = "PromiseJobs";

/// A unit of deferred work. Arguments are captured by the action when the job
/// is created.
pub struct Job {
    name: &'static str,
    action: Box<dyn FnOnce()>,
}

impl Job {
    pub fn new<F>(name: &'static str, action: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self {
            name,
            action: Box::new(action),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn execute(self) {
        (self.action)()
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job").field("name", &self.name).finish()
    }
}

/// Buffered jobs with the backend token that was issued for each of them.
///
/// `jobs` and `tokens` are parallel: slot `i` of one belongs to slot `i` of
/// the other. A drained slot is left as `None` until the buffer is cleared.
#[derive(Debug)]
pub(crate) struct JobBuffer {
    jobs: Vec<Option<Job>>,
    tokens: Vec<Option<Token>>,
    capacity: usize,
}

impl JobBuffer {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            jobs: Vec::with_capacity(capacity),
            tokens: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a job, growing the buffer when it is full. Returns its slot.
    pub(crate) fn push(&mut self, job: Job) -> usize {
        if self.jobs.len() == self.capacity {
            let grown = self.capacity * 2;
            debug!(from = self.capacity, to = grown, "growing job buffer");
            self.jobs.reserve(grown - self.jobs.len());
            self.tokens.reserve(grown - self.tokens.len());
            self.capacity = grown;
        }
        self.jobs.push(Some(job));
        self.tokens.push(None);
        self.jobs.len() - 1
    }

    pub(crate) fn set_token(&mut self, slot: usize, token: Token) {
        if let Some(entry) = self.tokens.get_mut(slot) {
            *entry = Some(token);
        }
    }

    /// Move the job and token out of `slot`. `None` once `slot` is past the end.
    pub(crate) fn take(&mut self, slot: usize) -> Option<(Option<Job>, Option<Token>)> {
        if slot >= self.jobs.len() {
            return None;
        }
        Some((self.jobs[slot].take(), self.tokens[slot].take()))
    }

    /// Jobs buffered and not yet executed.
    pub(crate) fn pending(&self) -> usize {
        self.jobs.iter().filter(|job| job.is_some()).count()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Move every remaining job and token out, leaving the buffer empty.
    pub(crate) fn drain_all(&mut self) -> (Vec<Job>, Vec<Token>) {
        let jobs = self.jobs.drain(..).flatten().collect();
        let tokens = self.tokens.drain(..).flatten().collect();
        (jobs, tokens)
    }

    pub(crate) fn clear(&mut self) {
        self.jobs.clear();
        self.tokens.clear();
    }
}
