use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use super::record::{TaskRecord, TaskResult, TaskStatus};
use crate::error::{Result, SpectrogramError};

/// Id → record store. The map lock is only held to insert or look up an
/// entry; each record has its own lock, written only by the worker that owns
/// the task.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<String, Entry>>,
}

struct Entry {
    record: Arc<RwLock<TaskRecord>>,
    created: Instant,
}

/// Write access to a single task's record.
#[derive(Clone)]
pub struct TaskHandle {
    record: Arc<RwLock<TaskRecord>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending task.
    pub fn insert(&self, task_id: &str) -> TaskHandle {
        let record = Arc::new(RwLock::new(TaskRecord::pending(task_id.to_string())));
        let mut tasks = self.tasks.write().unwrap_or_else(|e| e.into_inner());
        tasks.insert(
            task_id.to_string(),
            Entry {
                record: Arc::clone(&record),
                created: Instant::now(),
            },
        );
        TaskHandle { record }
    }

    /// Snapshot of a task's current record.
    pub fn get(&self, task_id: &str) -> Result<TaskRecord> {
        let record = {
            let tasks = self.tasks.read().unwrap_or_else(|e| e.into_inner());
            tasks.get(task_id).map(|entry| Arc::clone(&entry.record))
        };
        match record {
            Some(record) => Ok(record.read().unwrap_or_else(|e| e.into_inner()).clone()),
            None => Err(SpectrogramError::TaskNotFound(task_id.to_string())),
        }
    }

    /// Drop finished tasks submitted more than `max_age` ago. Tasks still
    /// running are kept whatever their age.
    pub fn evict_finished(&self, max_age: Duration) -> usize {
        let mut tasks = self.tasks.write().unwrap_or_else(|e| e.into_inner());
        let before = tasks.len();
        tasks.retain(|_, entry| {
            let finished = entry
                .record
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .status
                .is_terminal();
            !(finished && entry.created.elapsed() > max_age)
        });
        before - tasks.len()
    }

    pub fn len(&self) -> usize {
        self.tasks.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TaskHandle {
    pub fn snapshot(&self) -> TaskRecord {
        self.record.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn advance(&self, status: TaskStatus, progress: u8, message: &str) -> bool {
        let mut record = self.record.write().unwrap_or_else(|e| e.into_inner());
        let changed = record.advance(status, progress, message);
        if changed {
            log::debug!("Task {}: {:?} {}% {}", record.task_id, status, progress, message);
        }
        changed
    }

    pub fn complete(&self, result: TaskResult) -> bool {
        let mut record = self.record.write().unwrap_or_else(|e| e.into_inner());
        let changed = record.complete(result);
        if changed {
            log::info!("Task {} completed", record.task_id);
        }
        changed
    }

    pub fn fail(&self, message: &str) -> bool {
        let mut record = self.record.write().unwrap_or_else(|e| e.into_inner());
        let changed = record.fail(message);
        if changed {
            log::warn!("Task {} failed: {}", record.task_id, message);
        }
        changed
    }
}
