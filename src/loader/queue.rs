//! Work queues for the split-generation pipeline
//!
//! Two levels of work feed the loader tasks:
//!
//! - [`LazyQueue`] drains the caller's partition iterator exactly once
//!   across any number of concurrent consumers, without materializing it.
//! - [`WorkDeque`] holds the file iterators of in-progress partitions.
//!   `add_first` re-parks a partially consumed iterator on backpressure
//!   so the next free task resumes it; `add_last` parks fresh iterators.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::iter::Peekable;

/// Thread-safe draining queue over an iterator
///
/// Each element of the underlying iterator is yielded to exactly one
/// caller of `poll`. Once drained, `is_empty` stays true forever; the
/// queue is never refilled.
pub struct LazyQueue<T> {
    inner: Mutex<Peekable<Box<dyn Iterator<Item = T> + Send>>>,
}

impl<T: Send> LazyQueue<T> {
    pub fn new<I>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        let iter: Box<dyn Iterator<Item = T> + Send> = Box::new(items.into_iter());
        Self {
            inner: Mutex::new(iter.peekable()),
        }
    }

    /// Take the next element, or `None` once drained
    pub fn poll(&self) -> Option<T> {
        self.inner.lock().next()
    }

    /// Observably consistent with `poll`: true iff every future `poll`
    /// returns `None`
    pub fn is_empty(&self) -> bool {
        self.inner.lock().peek().is_none()
    }
}

/// Concurrent double-ended queue of work items
pub struct WorkDeque<T> {
    inner: Mutex<VecDeque<T>>,
}

impl<T> WorkDeque<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    /// Take ownership of the front item
    pub fn poll_first(&self) -> Option<T> {
        self.inner.lock().pop_front()
    }

    /// Re-park a partially consumed item at the front
    pub fn add_first(&self, item: T) {
        self.inner.lock().push_front(item);
    }

    /// Park a fresh item at the back
    pub fn add_last(&self, item: T) {
        self.inner.lock().push_back(item);
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

impl<T> Default for WorkDeque<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn lazy_queue_drains_in_order() {
        let queue = LazyQueue::new(vec![1, 2, 3]);
        assert!(!queue.is_empty());
        assert_eq!(queue.poll(), Some(1));
        assert_eq!(queue.poll(), Some(2));
        assert_eq!(queue.poll(), Some(3));
        assert_eq!(queue.poll(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn lazy_queue_is_empty_does_not_consume() {
        let queue = LazyQueue::new(vec![42]);
        assert!(!queue.is_empty());
        assert!(!queue.is_empty());
        assert_eq!(queue.poll(), Some(42));
        assert!(queue.is_empty());
    }

    #[test]
    fn lazy_queue_yields_each_element_to_one_consumer() {
        let queue = Arc::new(LazyQueue::new(0..1000));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let queue = Arc::clone(&queue);
            handles.push(thread::spawn(move || {
                let mut seen = Vec::new();
                while let Some(item) = queue.poll() {
                    seen.push(item);
                }
                seen
            }));
        }

        let mut all: Vec<i32> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..1000).collect::<Vec<_>>());
        assert!(queue.is_empty());
    }

    #[test]
    fn deque_front_and_back() {
        let deque = WorkDeque::new();
        deque.add_last("fresh-1");
        deque.add_last("fresh-2");
        deque.add_first("resumed");

        assert_eq!(deque.len(), 3);
        assert_eq!(deque.poll_first(), Some("resumed"));
        assert_eq!(deque.poll_first(), Some("fresh-1"));
        assert_eq!(deque.poll_first(), Some("fresh-2"));
        assert_eq!(deque.poll_first(), None);
        assert!(deque.is_empty());
    }
}
