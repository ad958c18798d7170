//! Round-robin iteration over a peer view
//!
//! A peer view is an ordered set shared with whoever maintains it. The
//! sequential strategy walks it in ascending order from a cursor, wrapping
//! around at the end, and copes with the set changing between calls: if the
//! cursor element was removed, iteration resumes at the next larger element.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;

/// Shared, externally mutated ordered set of peers
pub type SharedPeerView<T> = Arc<Mutex<BTreeSet<T>>>;

/// Strategy for choosing the next element of a peer view
pub trait PeerViewStrategy<T> {
    /// Next element, or `None` if the view is empty
    fn next(&mut self) -> Option<T>;

    /// Restart from the smallest element
    fn reset(&mut self);
}

/// Ascending, wrapping iteration with a restartable cursor
#[derive(Debug)]
pub struct SequentialStrategy<T: Ord + Clone> {
    view: SharedPeerView<T>,
    cursor: Option<T>,
}

impl<T: Ord + Clone> SequentialStrategy<T> {
    pub fn new(view: SharedPeerView<T>) -> Self {
        Self { view, cursor: None }
    }

    /// The last element returned
    pub fn cursor(&self) -> Option<&T> {
        self.cursor.as_ref()
    }

    fn step(set: &BTreeSet<T>, cursor: Option<&T>) -> Option<T> {
        match cursor {
            None => set.iter().next().cloned(),
            Some(cursor) => {
                let mut tail = set.range(cursor..);
                match tail.next() {
                    // cursor was removed; resume at its successor
                    Some(first) if first != cursor => Some(first.clone()),
                    Some(_) => tail.next().cloned(),
                    None => None,
                }
            }
        }
    }
}

impl<T: Ord + Clone> PeerViewStrategy<T> for SequentialStrategy<T> {
    fn next(&mut self) -> Option<T> {
        let set = self.view.lock();

        let next = match Self::step(&set, self.cursor.as_ref()) {
            Some(next) => Some(next),
            // wrap
            None => Self::step(&set, None),
        };

        self.cursor = next.clone();
        next
    }

    fn reset(&mut self) {
        self.cursor = None;
    }
}

impl<T: Ord + Clone> SequentialStrategy<T> {
    /// Every element once, starting at the element [`next`] would return.
    ///
    /// The cursor moves to that starting element, so successive rounds
    /// start one element further along.
    ///
    /// [`next`]: PeerViewStrategy::next
    pub fn round(&mut self) -> Vec<T> {
        let set = self.view.lock();
        let start = match Self::step(&set, self.cursor.as_ref()) {
            Some(start) => start,
            None => match Self::step(&set, None) {
                Some(start) => start,
                None => return Vec::new(),
            },
        };

        let mut out = Vec::with_capacity(set.len());
        out.extend(set.range(&start..).cloned());
        out.extend(set.range(..&start).cloned());
        self.cursor = Some(start);
        out
    }
}
