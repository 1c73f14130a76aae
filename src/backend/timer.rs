//! Minimum-delay timer backend, the last resort in the default ranking.

use super::{Callback, JobBackend, Token};
use crate::config::HostPrimitives;
use std::cell::{Cell, RefCell};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::{Duration, Instant};

/// Minimum-delay timer. Every callback gets a deadline of `now + min_delay`;
/// a turn sleeps until the earliest live deadline and then runs everything
/// that is due.
pub struct TimerBackend {
    primitives: HostPrimitives,
    min_delay: Duration,
    deadlines: RefCell<BinaryHeap<Reverse<(Instant, Token)>>>,
    tasks: RefCell<HashMap<Token, Callback>>,
    next_token: Cell<u64>,
}

impl TimerBackend {
    pub fn new(primitives: HostPrimitives, min_delay: Duration) -> Self {
        Self {
            primitives,
            min_delay,
            deadlines: RefCell::new(BinaryHeap::new()),
            tasks: RefCell::new(HashMap::new()),
            next_token: Cell::new(1),
        }
    }

    /// Earliest deadline that still has a callback; cancelled entries are
    /// dropped from the heap on the way.
    fn next_deadline(&self) -> Option<Instant> {
        let mut deadlines = self.deadlines.borrow_mut();
        let tasks = self.tasks.borrow();
        while let Some(Reverse((deadline, token))) = deadlines.peek().copied() {
            if tasks.contains_key(&token) {
                return Some(deadline);
            }
            deadlines.pop();
        }
        None
    }
}

impl JobBackend for TimerBackend {
    fn is_supported(&self) -> bool {
        self.primitives.is_complete()
    }

    fn schedule(&self, callback: Callback) -> Token {
        let token = Token(self.next_token.get());
        self.next_token.set(token.0 + 1);
        let deadline = Instant::now() + self.min_delay;
        self.tasks.borrow_mut().insert(token, callback);
        self.deadlines.borrow_mut().push(Reverse((deadline, token)));
        token
    }

    fn cancel(&self, token: Token) {
        self.tasks.borrow_mut().remove(&token);
    }

    fn run_once(&self) -> usize {
        let Some(deadline) = self.next_deadline() else {
            return 0;
        };
        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }

        let horizon = Instant::now();
        let mut ran = 0;
        loop {
            let due = {
                let mut deadlines = self.deadlines.borrow_mut();
                let is_due = matches!(deadlines.peek(), Some(Reverse((deadline, _))) if *deadline <= horizon);
                if is_due {
                    deadlines.pop()
                } else {
                    None
                }
            };
            let Some(Reverse((_, token))) = due else {
                break;
            };
            let task = self.tasks.borrow_mut().remove(&token);
            if let Some(task) = task {
                task();
                ran += 1;
            }
        }
        ran
    }

    fn has_pending(&self) -> bool {
        !self.tasks.borrow().is_empty()
    }
}
