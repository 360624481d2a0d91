//! FIFO task queue and the batch dispatch decision.

use std::collections::VecDeque;

use crate::core::task::Task;

/// Ordered queue of submitted tasks; insertion order is submission order.
#[derive(Debug, Default)]
pub struct BatchQueue {
    tasks: VecDeque<Task>,
}

impl BatchQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task at the tail.
    pub fn push(&mut self, task: Task) {
        self.tasks.push_back(task);
    }

    /// Current depth.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True when nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Take the next batch to start on an idle scheduler.
    ///
    /// Returns the maximal contiguous prefix of parallel tasks at the head of
    /// the queue. If the head is serial, returns exactly that one task. An
    /// empty vector means the queue is empty.
    pub fn take_batch(&mut self) -> Vec<Task> {
        let mut batch = Vec::new();
        while self.tasks.front().is_some_and(|t| t.mode.is_parallel()) {
            if let Some(task) = self.tasks.pop_front() {
                batch.push(task);
            }
        }
        if batch.is_empty() {
            if let Some(serial) = self.tasks.pop_front() {
                batch.push(serial);
            }
        }
        batch
    }
}
