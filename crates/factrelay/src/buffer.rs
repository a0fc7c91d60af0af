//! 🪣 The shared buffer — where facts wait between "202 Accepted" and "please form-encode me".
//!
//! Producers append at the tail. The flush worker pops from the head. Every touch
//! happens under one mutex, and that mutex is NEVER held across an `.await`.
//! A `std::sync::Mutex` guard is not `Send`, so the compiler enforces that for us
//! inside spawned tasks. The borrow checker: finally doing HR's job.
//!
//! 🧠 Knowledge graph:
//! - `append` → used by the gateway, returns the post-append length for the threshold check
//! - `drain_all` → used by the flush worker, pops one fact per lock acquisition
//! - `push_front` → used by the `reject` queue policy to give a fact its place back in line

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::common::Fact;

/// 🔒 An ordered, mutex-guarded queue of facts not yet handed to delivery.
#[derive(Debug, Default)]
pub(crate) struct SharedBuffer {
    facts: Mutex<VecDeque<Fact>>,
}

impl SharedBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 📥 Append at the tail. Returns how many facts are buffered right after the append.
    pub(crate) fn append(&self, fact: Fact) -> usize {
        let mut facts = self.lock();
        facts.push_back(fact);
        facts.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    /// 🔄 Put a fact back at the head, ahead of anything appended since it was popped.
    pub(crate) fn push_front(&self, fact: Fact) {
        self.lock().push_front(fact);
    }

    /// 🚿 Drain everything, oldest first.
    ///
    /// The returned iterator takes the lock once per item and releases it before
    /// yielding, so the caller may `.await` between items without starving producers.
    /// Facts appended while the drain is running are picked up by the same drain.
    pub(crate) fn drain_all(&self) -> Drain<'_> {
        Drain { buffer: self }
    }

    fn pop_front(&self) -> Option<Fact> {
        self.lock().pop_front()
    }

    // -- 💀 a poisoned lock means a producer panicked mid-push. VecDeque is still
    // -- structurally fine, so we keep going instead of panicking in sympathy.
    fn lock(&self) -> MutexGuard<'_, VecDeque<Fact>> {
        self.facts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 🚿 Lock-per-item draining iterator. Holds a reference, never a guard.
#[derive(Debug)]
pub(crate) struct Drain<'a> {
    buffer: &'a SharedBuffer,
}

impl Iterator for Drain<'_> {
    type Item = Fact;

    fn next(&mut self) -> Option<Fact> {
        self.buffer.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn fact(value: i64) -> Fact {
        Fact {
            value: Some(value),
            ..Fact::default()
        }
    }

    #[test]
    fn the_one_where_append_reports_the_new_length() {
        let buffer = SharedBuffer::new();
        assert_eq!(buffer.append(fact(1)), 1);
        assert_eq!(buffer.append(fact(2)), 2);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn the_one_where_drain_is_fifo_and_leaves_nothing_behind() {
        let buffer = SharedBuffer::new();
        for v in 0..5 {
            buffer.append(fact(v));
        }

        let drained: Vec<i64> = buffer.drain_all().filter_map(|f| f.value).collect();
        assert_eq!(drained, vec![0, 1, 2, 3, 4]);
        assert_eq!(buffer.len(), 0);
    }

    #[test]
    fn the_one_where_a_late_append_joins_the_running_drain() {
        let buffer = SharedBuffer::new();
        buffer.append(fact(1));

        let mut drain = buffer.drain_all();
        assert_eq!(drain.next().and_then(|f| f.value), Some(1));
        buffer.append(fact(2));
        assert_eq!(drain.next().and_then(|f| f.value), Some(2));
        assert!(drain.next().is_none());
    }

    #[test]
    fn the_one_where_push_front_cuts_the_line_politely() {
        let buffer = SharedBuffer::new();
        buffer.append(fact(2));
        buffer.push_front(fact(1));

        let drained: Vec<i64> = buffer.drain_all().filter_map(|f| f.value).collect();
        assert_eq!(drained, vec![1, 2]);
    }

    #[test]
    fn the_one_where_racing_threads_lose_nothing() {
        let buffer = Arc::new(SharedBuffer::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let buffer = Arc::clone(&buffer);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        buffer.append(fact(t * 1000 + i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("💀 a producer thread panicked");
        }

        let mut drained: Vec<i64> = buffer.drain_all().filter_map(|f| f.value).collect();
        assert_eq!(drained.len(), 800);
        drained.sort_unstable();
        drained.dedup();
        assert_eq!(drained.len(), 800, "no fact may be duplicated");
    }
}
