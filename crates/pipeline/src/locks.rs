//! Caller-owned "one generation in flight per task" locks.
//!
//! The pipeline itself assumes at most one concurrent `generate()` per task
//! id. Sessions that can fire overlapping requests hold a `TaskLocks` and
//! take a guard before calling into the controller.

use docforge_core::TaskId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("A generation is already in flight for task {0}")]
pub struct TaskBusy(pub TaskId);

/// Held while a generation for `task_id` runs; dropping it releases the task.
#[derive(Debug)]
pub struct TaskGuard {
    task_id: TaskId,
    _guard: OwnedMutexGuard<()>,
}

impl TaskGuard {
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }
}

/// Registry of per-task async mutexes. Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct TaskLocks {
    inner: Arc<Mutex<HashMap<TaskId, Arc<AsyncMutex<()>>>>>,
}

impl TaskLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<TaskId, Arc<AsyncMutex<()>>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, task_id: &TaskId) -> Arc<AsyncMutex<()>> {
        Arc::clone(self.registry().entry(task_id.clone()).or_default())
    }

    /// Take the task without waiting, or report that it is busy.
    pub fn try_acquire(&self, task_id: &TaskId) -> Result<TaskGuard, TaskBusy> {
        let guard = self
            .slot(task_id)
            .try_lock_owned()
            .map_err(|_| TaskBusy(task_id.clone()))?;
        Ok(TaskGuard {
            task_id: task_id.clone(),
            _guard: guard,
        })
    }

    /// Wait until the task is free, then take it.
    pub async fn acquire(&self, task_id: &TaskId) -> TaskGuard {
        let guard = self.slot(task_id).lock_owned().await;
        TaskGuard {
            task_id: task_id.clone(),
            _guard: guard,
        }
    }

    pub fn is_busy(&self, task_id: &TaskId) -> bool {
        self.registry()
            .get(task_id)
            .is_some_and(|slot| slot.try_lock().is_err())
    }

    /// Forget tasks nobody holds or waits on.
    pub fn prune(&self) -> usize {
        let mut registry = self.registry();
        let before = registry.len();
        registry.retain(|_, slot| Arc::strong_count(slot) > 1 || slot.try_lock().is_err());
        before - registry.len()
    }

    pub fn len(&self) -> usize {
        self.registry().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry().is_empty()
    }
}
