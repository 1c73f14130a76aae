//! A message-channel backend emulates a zero-delay callback by posting the
//! callback's handle over a channel and keeping the callback itself in a
//! handle table. Cancelling deletes the table entry, so the message arrives
//! but finds nothing to run.

use super::{Callback, JobBackend, Token};
use crate::config::HostPrimitives;
use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    sync::mpsc::{channel, Receiver, Sender, TryRecvError},
};
use tracing::warn;

pub struct ChannelBackend {
    primitives: HostPrimitives,
    sender: Sender<Token>,
    receiver: Receiver<Token>,
    tasks: RefCell<HashMap<Token, Callback>>,
    next_handle: Cell<u64>,
    in_flight: Cell<usize>,
}

impl ChannelBackend {
    pub fn new(primitives: HostPrimitives) -> Self {
        let (tx, rx) = channel();
        Self {
            primitives,
            sender: tx,
            receiver: rx,
            tasks: RefCell::new(HashMap::new()),
            next_handle: Cell::new(1),
            in_flight: Cell::new(0),
        }
    }
}

impl JobBackend for ChannelBackend {
    fn is_supported(&self) -> bool {
        self.primitives.is_complete()
    }

    fn schedule(&self, callback: Callback) -> Token {
        let handle = Token(self.next_handle.get());
        self.next_handle.set(handle.0 + 1);
        self.tasks.borrow_mut().insert(handle, callback);
        match self.sender.send(handle) {
            Ok(()) => self.in_flight.set(self.in_flight.get() + 1),
            Err(_) => {
                warn!(?handle, "message channel closed, dropping callback");
                self.tasks.borrow_mut().remove(&handle);
            }
        }
        handle
    }

    fn cancel(&self, token: Token) {
        self.tasks.borrow_mut().remove(&token);
    }

    fn run_once(&self) -> usize {
        // Only messages posted before this turn are delivered in it.
        let batch = self.in_flight.get();
        let mut ran = 0;
        for _ in 0..batch {
            let handle = match self.receiver.try_recv() {
                Ok(handle) => handle,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            };
            self.in_flight.set(self.in_flight.get() - 1);
            let task = self.tasks.borrow_mut().remove(&handle);
            if let Some(task) = task {
                task();
                ran += 1;
            }
        }
        ran
    }

    fn has_pending(&self) -> bool {
        self.in_flight.get() > 0
    }
}
