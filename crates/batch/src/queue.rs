//! Task queue shared by the workers of one run

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::cancel::CancellationToken;
use crate::outcome::{Item, Task};

/// Ordered backlog of items with an atomic take
///
/// The cursor only moves forward and never past the end, so each item is
/// dispensed to at most one worker regardless of how calls race. Once the
/// run's token is cancelled, no further item is dispensed.
#[derive(Debug)]
pub struct TaskQueue {
    items: Vec<Item>,
    cursor: AtomicUsize,
    cancel: CancellationToken,
}

impl TaskQueue {
    /// Create a queue over `items` in their given order
    pub fn new(items: Vec<Item>, cancel: CancellationToken) -> Self {
        Self {
            items,
            cursor: AtomicUsize::new(0),
            cancel,
        }
    }

    /// Take the next pending item as a fresh task
    ///
    /// Returns `None` when every item has been dispensed or cancellation was
    /// requested.
    pub fn take_next(&self) -> Option<Task> {
        if self.cancel.is_cancelled() {
            return None;
        }

        let len = self.items.len();
        let index = self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cursor| {
                (cursor < len).then_some(cursor + 1)
            })
            .ok()?;

        Some(Task::new(self.items[index].clone()))
    }

    /// Number of items in the queue, dispensed or not
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the queue was created without items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of items handed out so far
    pub fn dispensed(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    /// Number of items not yet handed out
    pub fn remaining(&self) -> usize {
        self.items.len() - self.dispensed()
    }

    /// Check if every item has been handed out
    pub fn is_drained(&self) -> bool {
        self.remaining() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    fn items(n: usize) -> Vec<Item> {
        (1..=n).map(|i| Item::new(format!("v{i}"))).collect()
    }

    #[test]
    fn test_dispenses_in_order() {
        let queue = TaskQueue::new(items(3), CancellationToken::new());

        let ids: Vec<_> = std::iter::from_fn(|| queue.take_next())
            .map(|task| task.item.id)
            .collect();

        assert_eq!(ids, vec!["v1", "v2", "v3"]);
        assert!(queue.is_drained());
        assert!(queue.take_next().is_none());
    }

    #[test]
    fn test_tasks_start_at_attempt_zero() {
        let queue = TaskQueue::new(items(1), CancellationToken::new());
        assert_eq!(queue.take_next().map(|t| t.attempt), Some(0));
    }

    #[test]
    fn test_cursor_never_passes_end() {
        let queue = TaskQueue::new(items(2), CancellationToken::new());
        for _ in 0..10 {
            queue.take_next();
        }

        assert_eq!(queue.dispensed(), 2);
        assert_eq!(queue.remaining(), 0);
    }

    #[test]
    fn test_cancel_stops_dispensing() {
        let token = CancellationToken::new();
        let queue = TaskQueue::new(items(5), token.clone());

        assert!(queue.take_next().is_some());
        token.cancel();

        assert!(queue.take_next().is_none());
        assert_eq!(queue.dispensed(), 1);
        assert_eq!(queue.remaining(), 4);
    }

    #[test]
    fn test_empty_queue() {
        let queue = TaskQueue::new(Vec::new(), CancellationToken::new());

        assert!(queue.is_empty());
        assert!(queue.is_drained());
        assert!(queue.take_next().is_none());
    }

    #[test]
    fn test_concurrent_takes_are_unique() {
        let queue = Arc::new(TaskQueue::new(items(1000), CancellationToken::new()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    let mut taken = Vec::new();
                    while let Some(task) = queue.take_next() {
                        taken.push(task.item.id);
                    }
                    taken
                })
            })
            .collect();

        let mut seen = HashSet::new();
        let mut total = 0;
        for handle in handles {
            for id in handle.join().unwrap() {
                total += 1;
                assert!(seen.insert(id), "item dispensed twice");
            }
        }

        assert_eq!(total, 1000);
    }
}
