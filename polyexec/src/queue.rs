use parking_lot::Mutex;

use std::collections::VecDeque;

/// Thread-safe FIFO of deferred work items.
///
/// Every operation takes the same internal lock. Items pushed by a single
/// producer come out in the order they went in; there is no fairness
/// guarantee between concurrent poppers.
///
/// [`is_empty`](Self::is_empty) and [`len`](Self::len) are snapshots and may
/// be stale by the time the caller looks at them.
pub struct ConcurrentQueue<T> {
    /// Inner deque protected by a mutex.
    inner: Mutex<VecDeque<T>>,
}

impl<T> ConcurrentQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    /// Appends an item to the tail of the queue.
    pub fn push(&self, item: T) {
        self.inner.lock().push_back(item);
    }

    /// Appends every item of `items` under a single lock acquisition, so the
    /// batch stays contiguous in the queue.
    pub fn push_batch<I>(&self, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        self.inner.lock().extend(items);
    }

    /// Removes the head of the queue.
    ///
    /// Returns `None` if the queue is empty; never blocks on emptiness.
    pub fn try_pop(&self) -> Option<T> {
        self.inner.lock().pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

impl<T> Default for ConcurrentQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn pops_in_push_order() {
        let queue = ConcurrentQueue::new();
        queue.push(1);
        queue.push(2);
        queue.push_batch([3, 4]);

        assert_eq!(queue.len(), 4);
        assert_eq!(queue.try_pop(), Some(1));
        assert_eq!(queue.try_pop(), Some(2));
        assert_eq!(queue.try_pop(), Some(3));
        assert_eq!(queue.try_pop(), Some(4));
        assert_eq!(queue.try_pop(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn concurrent_producers_and_consumers_lose_nothing() {
        let queue = Arc::new(ConcurrentQueue::new());

        let producers: Vec<_> = (0..4)
            .map(|p| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for i in 0..250 {
                        queue.push(p * 1000 + i);
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    while let Some(item) = queue.try_pop() {
                        seen.push(item);
                    }
                    seen
                })
            })
            .collect();

        let mut all = HashSet::new();
        for consumer in consumers {
            for item in consumer.join().unwrap() {
                assert!(all.insert(item), "item {item} popped twice");
            }
        }
        assert_eq!(all.len(), 1000);
    }
}
