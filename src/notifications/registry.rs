//! Dispatch Task Registry
//!
//! Identifier-keyed table of in-flight tasks, shared between the arrival path
//! and the response/timeout path.

use std::sync::Arc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, warn};
use tokio::sync::Notify;

use crate::notifications::task::{DispatchTask, TaskOwner};

#[derive(Debug, Default)]
pub struct DispatchTaskRegistry {
    tasks: DashMap<String, Arc<DispatchTask>>,
    idle: Notify,
}

impl DispatchTaskRegistry {
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
            idle: Notify::new(),
        }
    }

    /// Insert a pending task; refuses to displace another task with the same identifier
    pub fn insert(&self, task: Arc<DispatchTask>) -> bool {
        match self.tasks.entry(task.identifier().to_string()) {
            Entry::Occupied(_) => {
                warn!("Notification {} is already in flight", task.identifier());
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(task);
                true
            }
        }
    }

    pub fn get(&self, identifier: &str) -> Option<Arc<DispatchTask>> {
        // Clone out so no shard lock is held while the caller drives the task.
        self.tasks.get(identifier).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove `task`, but only if it is the entry stored under its identifier
    pub fn remove(&self, task: &DispatchTask) -> bool {
        let removed = self
            .tasks
            .remove_if(task.identifier(), |_, stored| std::ptr::eq(stored.as_ref(), task))
            .is_some();
        if removed {
            debug!("Dropped finished notification {}", task.identifier());
            if self.tasks.is_empty() {
                self.idle.notify_waiters();
            }
        }
        removed
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.tasks.contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Resolve once no task is pending
    pub async fn wait_until_empty(&self) {
        loop {
            // Registered before the check so a removal in between is not missed.
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.tasks.is_empty() {
                return;
            }
            notified.await;
        }
    }

    /// Point-in-time copy of every pending task
    pub fn pending(&self) -> Vec<Arc<DispatchTask>> {
        self.tasks.iter().map(|entry| Arc::clone(entry.value())).collect()
    }
}

impl TaskOwner for DispatchTaskRegistry {
    fn on_task_finished(&self, task: &DispatchTask) {
        self.remove(task);
    }
}
