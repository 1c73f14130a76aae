//! Backend over a `futures` local executor.

use super::{Callback, JobBackend, Token};
use crate::config::HostPrimitives;
use futures::executor::{LocalPool, LocalSpawner};
use futures::future::{AbortHandle, Abortable};
use futures::task::LocalSpawnExt;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::warn;

/// Runs callbacks as tasks on a single-threaded `futures` executor. Each task
/// is wrapped in [`Abortable`], and cancelling aborts it.
pub struct LocalPoolBackend {
    primitives: HostPrimitives,
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
    handles: Rc<RefCell<HashMap<Token, AbortHandle>>>,
    ran: Rc<Cell<usize>>,
    next_token: Cell<u64>,
}

impl LocalPoolBackend {
    pub fn new(primitives: HostPrimitives) -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self {
            primitives,
            pool: RefCell::new(pool),
            spawner,
            handles: Rc::new(RefCell::new(HashMap::new())),
            ran: Rc::new(Cell::new(0)),
            next_token: Cell::new(1),
        }
    }
}

impl JobBackend for LocalPoolBackend {
    fn is_supported(&self) -> bool {
        self.primitives.is_complete()
    }

    fn schedule(&self, callback: Callback) -> Token {
        let token = Token(self.next_token.get());
        self.next_token.set(token.0 + 1);

        let (abort, registration) = AbortHandle::new_pair();
        self.handles.borrow_mut().insert(token, abort);

        let handles = self.handles.clone();
        let ran = self.ran.clone();
        let task = Abortable::new(
            async move {
                handles.borrow_mut().remove(&token);
                callback();
                ran.set(ran.get() + 1);
            },
            registration,
        );
        if let Err(err) = self.spawner.spawn_local(async move {
            let _ = task.await;
        }) {
            warn!(?token, %err, "local pool refused task");
            self.handles.borrow_mut().remove(&token);
        }
        token
    }

    fn cancel(&self, token: Token) {
        let handle = self.handles.borrow_mut().remove(&token);
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    fn run_once(&self) -> usize {
        let before = self.ran.get();
        self.pool.borrow_mut().run_until_stalled();
        self.ran.get() - before
    }

    fn has_pending(&self) -> bool {
        !self.handles.borrow().is_empty()
    }
}
