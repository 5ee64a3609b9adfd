use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, instrument};

use crate::task::{Task, TaskId, TaskPatch};

/// In-memory cache of the task list held by a page or board.
///
/// Handles are cheap clones sharing one list. Writes are last-writer-wins:
/// there is no per-task version or etag, so two in-flight patches on the same
/// task settle in whatever order their responses arrive. Locks are never held
/// across an await point.
#[derive(Debug, Clone, Default)]
pub struct TaskCache {
    inner: Arc<Mutex<Vec<Task>>>,
}

/// Change reported to the holder of an independent copy of the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskUpdate {
    Patched(TaskPatch),
    Deleted,
}

/// Receives confirmed changes so that other copies of the task list converge.
pub trait TaskUpdateListener: Send + Sync {
    fn task_updated(&self, id: TaskId, update: &TaskUpdate);
}

impl TaskCache {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(tasks)),
        }
    }

    #[instrument(skip(self, tasks), fields(count = tasks.len()))]
    pub fn replace_all(&self, tasks: Vec<Task>) {
        *self.inner.lock() = tasks;
    }

    pub fn snapshot(&self) -> Vec<Task> {
        self.inner.lock().clone()
    }

    pub fn get(&self, id: TaskId) -> Option<Task> {
        self.inner.lock().iter().find(|t| t.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Merges `patch` into the task; returns false when the task is gone.
    #[instrument(skip(self, patch), fields(id = %id))]
    pub fn merge(&self, id: TaskId, patch: &TaskPatch) -> bool {
        let mut tasks = self.inner.lock();
        match tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => {
                task.apply_patch(patch);
                true
            }
            None => {
                debug!("merge target not cached");
                false
            }
        }
    }

    /// Restores the fields named by `patch` from `snapshot`.
    #[instrument(skip(self, snapshot, patch), fields(id = %snapshot.id))]
    pub fn revert(&self, snapshot: &Task, patch: &TaskPatch) -> bool {
        let mut tasks = self.inner.lock();
        match tasks.iter_mut().find(|t| t.id == snapshot.id) {
            Some(task) => {
                task.revert_fields(snapshot, patch);
                true
            }
            None => {
                debug!("revert target not cached");
                false
            }
        }
    }

    pub fn insert(&self, task: Task) {
        let mut tasks = self.inner.lock();
        match tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task,
            None => tasks.push(task),
        }
    }

    pub fn remove(&self, id: TaskId) -> Option<Task> {
        let mut tasks = self.inner.lock();
        let idx = tasks.iter().position(|t| t.id == id)?;
        Some(tasks.remove(idx))
    }

    pub fn apply_update(&self, id: TaskId, update: &TaskUpdate) {
        match update {
            TaskUpdate::Patched(patch) => {
                self.merge(id, patch);
            }
            TaskUpdate::Deleted => {
                self.remove(id);
            }
        }
    }
}

/// A cache can itself be the listener of another cache's mutations.
impl TaskUpdateListener for TaskCache {
    fn task_updated(&self, id: TaskId, update: &TaskUpdate) {
        self.apply_update(id, update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Priority, Status, UserId};

    fn cache() -> TaskCache {
        TaskCache::new(vec![
            Task::new(TaskId(1), "a", UserId(1)),
            Task::new(TaskId(2), "b", UserId(1)),
        ])
    }

    #[test]
    fn handles_share_one_list() {
        let a = cache();
        let b = a.clone();
        assert!(a.merge(TaskId(1), &TaskPatch::status(Status::Done)));
        assert_eq!(b.get(TaskId(1)).map(|t| t.status), Some(Status::Done));
        assert!(!a.merge(TaskId(9), &TaskPatch::status(Status::Done)));
    }

    #[test]
    fn revert_touches_only_patched_fields() {
        let c = cache();
        let snapshot = c.get(TaskId(2)).expect("cached");
        let patch = TaskPatch::priority(Priority::Urgente);
        c.merge(TaskId(2), &patch);
        c.merge(TaskId(2), &TaskPatch::status(Status::InProgress));

        assert!(c.revert(&snapshot, &patch));
        let task = c.get(TaskId(2)).expect("cached");
        assert_eq!(task.priority, Priority::Media);
        assert_eq!(task.status, Status::InProgress);
    }

    #[test]
    fn listener_applies_patches_and_deletions() {
        let c = cache();
        c.task_updated(TaskId(1), &TaskUpdate::Patched(TaskPatch::status(Status::Cancelled)));
        c.task_updated(TaskId(2), &TaskUpdate::Deleted);
        let tasks = c.snapshot();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].status, Status::Cancelled);

        c.insert(Task::new(TaskId(3), "c", UserId(1)));
        c.insert(Task::new(TaskId(3), "c2", UserId(1)));
        assert_eq!(c.len(), 2);
        assert_eq!(c.get(TaskId(3)).map(|t| t.title), Some("c2".to_string()));
    }
}
