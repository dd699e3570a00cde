//! In-memory store for asynchronous recommendation tasks.
//!
//! A task starts `pending`, moves to `processing` when its run begins and
//! ends `completed` (with items) or `failed` (with a message). Tasks live
//! for the lifetime of the process.

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use workflow::Item;

use crate::error::{Result, ServiceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    /// True once the task reached `completed` or `failed`.
    pub fn is_finished(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Snapshot of one asynchronous task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub status: TaskStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<Item>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct TaskManager {
    tasks: RwLock<HashMap<String, Task>>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and store a pending task with a fresh UUID v4 id.
    pub fn create(&self) -> Task {
        let task = Task {
            id: Uuid::new_v4().to_string(),
            status: TaskStatus::Pending,
            result: None,
            error: None,
            created_at: Utc::now(),
        };
        self.tasks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(task.id.clone(), task.clone());
        task
    }

    pub fn get(&self, id: &str) -> Result<Task> {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::TaskNotFound(id.to_string()))
    }

    pub fn update_status(&self, id: &str, status: TaskStatus) -> Result<()> {
        self.modify(id, |task| task.status = status)
    }

    /// Store the items and mark the task completed.
    pub fn set_result(&self, id: &str, items: Vec<Item>) -> Result<()> {
        self.modify(id, |task| {
            task.result = Some(items);
            task.error = None;
            task.status = TaskStatus::Completed;
        })
    }

    /// Store the error message and mark the task failed.
    pub fn set_error(&self, id: &str, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        self.modify(id, |task| {
            task.error = Some(message);
            task.status = TaskStatus::Failed;
        })
    }

    pub fn len(&self) -> usize {
        self.tasks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn modify(&self, id: &str, f: impl FnOnce(&mut Task)) -> Result<()> {
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| ServiceError::TaskNotFound(id.to_string()))?;
        f(task);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_lifecycle() {
        let manager = TaskManager::new();
        let task = manager.create();
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(Uuid::parse_str(&task.id).is_ok());

        manager.update_status(&task.id, TaskStatus::Processing).unwrap();
        assert_eq!(manager.get(&task.id).unwrap().status, TaskStatus::Processing);

        manager
            .set_result(&task.id, vec![Item::named("Song A", "llm")])
            .unwrap();
        let done = manager.get(&task.id).unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert!(done.status.is_finished());
        assert_eq!(done.result.unwrap()[0].name, "Song A");
    }

    #[test]
    fn test_set_error_marks_failed() {
        let manager = TaskManager::new();
        let task = manager.create();
        manager.set_error(&task.id, "llm timeout").unwrap();

        let failed = manager.get(&task.id).unwrap();
        assert_eq!(failed.status, TaskStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("llm timeout"));
        assert!(failed.result.is_none());
    }

    #[test]
    fn test_unknown_task() {
        let manager = TaskManager::new();
        assert!(matches!(manager.get("nope"), Err(ServiceError::TaskNotFound(_))));
        assert!(manager.update_status("nope", TaskStatus::Processing).is_err());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_ids_are_unique() {
        let manager = TaskManager::new();
        let a = manager.create();
        let b = manager.create();
        assert_ne!(a.id, b.id);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&TaskStatus::Processing).unwrap(), "\"processing\"");
    }
}
