//! The array-like iteration contract consumed by [`Promise::all`] and
//! [`Promise::race`].
//!
//! A [`Sequence`] exposes a length and positional access. Combinators walk it
//! left to right, once, through an [`IteratorRecord`]; asking a finished
//! record for more is an error rather than a silent restart.
//!
//! [`Promise::all`]: crate::Promise::all
//! [`Promise::race`]: crate::Promise::race

use crate::error::{Error, Result};

/// Length plus positional access.
pub trait Sequence {
    type Item;

    fn length(&self) -> usize;

    fn item(&self, index: usize) -> Option<Self::Item>;
}

impl<X: Clone> Sequence for Vec<X> {
    type Item = X;

    fn length(&self) -> usize {
        self.len()
    }

    fn item(&self, index: usize) -> Option<X> {
        self.get(index).cloned()
    }
}

impl<X: Clone> Sequence for &[X] {
    type Item = X;

    fn length(&self) -> usize {
        self.len()
    }

    fn item(&self, index: usize) -> Option<X> {
        self.get(index).cloned()
    }
}

impl<X: Clone, const N: usize> Sequence for [X; N] {
    type Item = X;

    fn length(&self) -> usize {
        N
    }

    fn item(&self, index: usize) -> Option<X> {
        self.get(index).cloned()
    }
}

/// Cursor over a [`Sequence`]. Starts before the first element; the length
/// is read once, when the cursor is created.
#[derive(Debug)]
pub struct SeqIterator<S> {
    sequence: S,
    index: Option<usize>,
    length: usize,
}

impl<S: Sequence> SeqIterator<S> {
    pub fn new(sequence: S) -> Self {
        let length = sequence.length();
        Self {
            sequence,
            index: None,
            length,
        }
    }

    /// Move to the next element. `false` once past the end.
    pub fn advance(&mut self) -> bool {
        let next = self.index.map_or(0, |i| i + 1);
        self.index = Some(next.min(self.length));
        next < self.length
    }

    /// Element under the cursor.
    pub fn current(&self) -> Option<S::Item> {
        self.index.and_then(|i| self.sequence.item(i))
    }

    /// Back to before the first element.
    pub fn reset(&mut self) {
        self.index = None;
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// A [`SeqIterator`] with a done flag so it is consumed at most once.
#[derive(Debug)]
pub struct IteratorRecord<S> {
    iterator: SeqIterator<S>,
    done: bool,
}

impl<S: Sequence> IteratorRecord<S> {
    pub fn new(sequence: S) -> Self {
        Self {
            iterator: SeqIterator::new(sequence),
            done: false,
        }
    }

    /// Next element, `Ok(None)` at the end. Fails once the record is done.
    pub fn next_item(&mut self) -> Result<Option<S::Item>> {
        if self.done {
            return Err(Error::IteratorConsumed);
        }
        if self.iterator.advance() {
            Ok(self.iterator.current())
        } else {
            self.done = true;
            Ok(None)
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}
