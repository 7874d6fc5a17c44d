//! In-process task queue (§4.6): a FIFO of pending doc-ids plus four maps
//! tracking every doc-id's lifecycle. The metadata store remains the
//! authoritative record; this is a mirror so the manager's worker loop
//! never has to hit the database just to find its next piece of work.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A task's position in the in-process queue mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// A unit of work enqueued at submission time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub doc_id: String,
    pub user_token: String,
    pub filename: String,
    pub created_at: DateTime<Utc>,
}

/// Snapshot of queue occupancy (§4.6 `status()`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStatus {
    pub queue_size: usize,
    pub processing: Vec<String>,
    pub completed_count: usize,
    pub failed_count: usize,
}

#[derive(Default)]
struct State {
    pending: VecDeque<String>,
    all: HashMap<String, Task>,
    processing: HashMap<String, Task>,
    completed: HashMap<String, Task>,
    failed: HashMap<String, (Task, Option<String>)>,
}

/// FIFO task queue guarded by a single lock, so claim and status mutations
/// are atomic (§5 "Mutual exclusion").
#[derive(Default)]
pub struct InMemoryTaskQueue {
    state: Mutex<State>,
}

impl InMemoryTaskQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task to the pending FIFO.
    pub fn add(&self, task: Task) {
        let mut state = self.state.lock().expect("queue lock poisoned");
        state.all.insert(task.doc_id.clone(), task.clone());
        state.pending.push_back(task.doc_id.clone());
    }

    /// Atomically pop the oldest pending doc-id and mark it processing.
    /// Non-blocking: returns `None` immediately if the queue is empty.
    pub fn claim_next(&self) -> Option<Task> {
        let mut state = self.state.lock().expect("queue lock poisoned");
        let doc_id = state.pending.pop_front()?;
        let task = state.all.get(&doc_id).cloned()?;
        state.processing.insert(doc_id, task.clone());
        Some(task)
    }

    /// Move a task to a terminal or in-progress status.
    pub fn update_status(&self, doc_id: &str, status: TaskStatus, err_msg: Option<String>) {
        let mut state = self.state.lock().expect("queue lock poisoned");
        let Some(task) = state.all.get(doc_id).cloned() else {
            return;
        };

        state.processing.remove(doc_id);
        state.completed.remove(doc_id);
        state.failed.remove(doc_id);

        match status {
            TaskStatus::Pending => state.pending.push_back(doc_id.to_string()),
            TaskStatus::Processing => {
                state.processing.insert(doc_id.to_string(), task);
            }
            TaskStatus::Completed => {
                state.completed.insert(doc_id.to_string(), task);
            }
            TaskStatus::Failed => {
                state.failed.insert(doc_id.to_string(), (task, err_msg));
            }
        }
    }

    #[must_use]
    pub fn get(&self, doc_id: &str) -> Option<Task> {
        let state = self.state.lock().expect("queue lock poisoned");
        state.all.get(doc_id).cloned()
    }

    #[must_use]
    pub fn status(&self) -> QueueStatus {
        let state = self.state.lock().expect("queue lock poisoned");
        QueueStatus {
            queue_size: state.pending.len(),
            processing: state.processing.keys().cloned().collect(),
            completed_count: state.completed.len(),
            failed_count: state.failed.len(),
        }
    }

    #[must_use]
    pub fn all(&self) -> Vec<Task> {
        let state = self.state.lock().expect("queue lock poisoned");
        state.all.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(doc_id: &str) -> Task {
        Task {
            doc_id: doc_id.to_string(),
            user_token: "alice".to_string(),
            filename: "a.txt".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn claim_next_preserves_fifo_order() {
        let queue = InMemoryTaskQueue::new();
        queue.add(task("doc1"));
        queue.add(task("doc2"));

        assert_eq!(queue.claim_next().unwrap().doc_id, "doc1");
        assert_eq!(queue.claim_next().unwrap().doc_id, "doc2");
        assert!(queue.claim_next().is_none());
    }

    #[test]
    fn status_reflects_transitions() {
        let queue = InMemoryTaskQueue::new();
        queue.add(task("doc1"));
        queue.claim_next();
        queue.update_status("doc1", TaskStatus::Completed, None);

        let status = queue.status();
        assert_eq!(status.queue_size, 0);
        assert!(status.processing.is_empty());
        assert_eq!(status.completed_count, 1);
    }

    #[test]
    fn update_status_to_failed_records_message() {
        let queue = InMemoryTaskQueue::new();
        queue.add(task("doc1"));
        queue.claim_next();
        queue.update_status("doc1", TaskStatus::Failed, Some("boom".to_string()));

        assert_eq!(queue.status().failed_count, 1);
    }
}
