//! Same-thread ready queue, the default backend.

use super::{Callback, JobBackend, Token};
use crate::config::HostPrimitives;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

/// Same-thread ready queue. A turn runs everything that was scheduled before
/// the turn started; callbacks scheduled during the turn wait for the next.
///
/// Callbacks live in a table keyed by token next to a FIFO of tokens.
/// Cancelling only removes the table entry; the stale token is skipped when
/// it reaches the front of the queue.
pub struct ImmediateBackend {
    primitives: HostPrimitives,
    order: RefCell<VecDeque<Token>>,
    tasks: RefCell<HashMap<Token, Callback>>,
    next_token: Cell<u64>,
}

impl ImmediateBackend {
    pub fn new(primitives: HostPrimitives) -> Self {
        Self {
            primitives,
            order: RefCell::new(VecDeque::new()),
            tasks: RefCell::new(HashMap::new()),
            next_token: Cell::new(1),
        }
    }
}

impl JobBackend for ImmediateBackend {
    fn is_supported(&self) -> bool {
        self.primitives.is_complete()
    }

    fn schedule(&self, callback: Callback) -> Token {
        let token = Token(self.next_token.get());
        self.next_token.set(token.0 + 1);
        self.tasks.borrow_mut().insert(token, callback);
        self.order.borrow_mut().push_back(token);
        token
    }

    fn cancel(&self, token: Token) {
        self.tasks.borrow_mut().remove(&token);
    }

    fn run_once(&self) -> usize {
        // Tokens only grow, so everything below this mark predates the turn.
        let horizon = self.next_token.get();
        let mut ran = 0;
        loop {
            let next = {
                let mut order = self.order.borrow_mut();
                let predates = matches!(order.front(), Some(token) if token.0 < horizon);
                if predates {
                    order.pop_front()
                } else {
                    None
                }
            };
            let Some(token) = next else {
                break;
            };
            let task = self.tasks.borrow_mut().remove(&token);
            if let Some(callback) = task {
                callback();
                ran += 1;
            }
        }
        if self.tasks.borrow().is_empty() {
            self.order.borrow_mut().clear();
        }
        ran
    }

    fn has_pending(&self) -> bool {
        !self.tasks.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_nested_schedule_waits_for_next_turn() {
        let backend = Rc::new(ImmediateBackend::new(HostPrimitives::AVAILABLE));
        let log = Rc::new(RefCell::new(Vec::new()));
        {
            let inner_backend = backend.clone();
            let log = log.clone();
            backend.schedule(Box::new(move || {
                log.borrow_mut().push("outer");
                let log = log.clone();
                inner_backend.schedule(Box::new(move || log.borrow_mut().push("inner")));
            }));
        }
        assert_eq!(backend.run_once(), 1);
        assert_eq!(*log.borrow(), vec!["outer"]);
        assert!(backend.has_pending());
        assert_eq!(backend.run_once(), 1);
        assert_eq!(*log.borrow(), vec!["outer", "inner"]);
    }

    #[test]
    fn test_cancelled_tokens_are_skipped() {
        let backend = ImmediateBackend::new(HostPrimitives::AVAILABLE);
        let log = Rc::new(RefCell::new(Vec::new()));
        let tokens: Vec<Token> = (0..3)
            .map(|i| {
                let log = log.clone();
                backend.schedule(Box::new(move || log.borrow_mut().push(i)))
            })
            .collect();
        backend.cancel(tokens[1]);
        backend.cancel(tokens[1]);
        assert!(backend.has_pending());
        assert_eq!(backend.run_once(), 2);
        assert_eq!(*log.borrow(), vec![0, 2]);
        assert!(!backend.has_pending());
        assert_eq!(backend.run_once(), 0);
    }
}
