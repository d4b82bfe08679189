use crate::domain::models::{
    CHALLENGE_DAYS, Task, reindex, splice_move, validate_collection,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::ops_log::OpsLog;
use crate::infrastructure::storage::StorageBackend;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

#[derive(Debug, Default)]
pub struct ClockIdGenerator {
    sequence: AtomicU64,
}

impl ClockIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for ClockIdGenerator {
    fn next_id(&self) -> String {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("tsk-{}-{sequence}", Utc::now().timestamp_micros())
    }
}

#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    sequence: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            sequence: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> String {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{}-{sequence}", self.prefix)
    }
}

pub struct TaskListController {
    backend: Arc<dyn StorageBackend>,
    ids: Arc<dyn IdGenerator>,
    ops_log: Arc<OpsLog>,
    snapshots: Mutex<HashMap<String, Vec<Task>>>,
    // Serializes successive saves so two rapid mutations cannot interleave
    // their backend writes.
    save_gate: tokio::sync::Mutex<()>,
}

impl TaskListController {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        ids: Arc<dyn IdGenerator>,
        ops_log: Arc<OpsLog>,
    ) -> Self {
        Self {
            backend,
            ids,
            ops_log,
            snapshots: Mutex::new(HashMap::new()),
            save_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub async fn tasks(&self, tab: &str) -> Result<Vec<Task>, InfraError> {
        self.ensure_loaded(tab).await?;
        let snapshots = self.lock_snapshots()?;
        Ok(snapshots.get(tab).cloned().unwrap_or_default())
    }

    pub async fn add_task(&self, tab: &str) -> Result<String, InfraError> {
        self.ensure_loaded(tab).await?;
        let (id, updated) = {
            let mut snapshots = self.lock_snapshots()?;
            let tasks = snapshots.entry(tab.to_string()).or_default();
            let id = self.unused_id(tasks);
            tasks.push(Task::new(id.clone(), tasks.len() as u32));
            (id, checked_snapshot(tasks)?)
        };
        self.persist("add_task", tab, updated).await;
        self.ops_log
            .info("add_task", &format!("tab={tab} created {id}"));
        Ok(id)
    }

    pub async fn rename_task(
        &self,
        tab: &str,
        id: &str,
        name: &str,
    ) -> Result<bool, InfraError> {
        self.ensure_loaded(tab).await?;
        let updated = {
            let mut snapshots = self.lock_snapshots()?;
            let tasks = snapshots.entry(tab.to_string()).or_default();
            let Some(task) = tasks.iter_mut().find(|task| task.id == id) else {
                self.log_missing_id("rename_task", tab, id);
                return Ok(false);
            };
            task.name = name.to_string();
            checked_snapshot(tasks)?
        };
        self.persist("rename_task", tab, updated).await;
        Ok(true)
    }

    pub async fn delete_task(&self, tab: &str, id: &str) -> Result<bool, InfraError> {
        self.ensure_loaded(tab).await?;
        let updated = {
            let mut snapshots = self.lock_snapshots()?;
            let tasks = snapshots.entry(tab.to_string()).or_default();
            let Some(position) = tasks.iter().position(|task| task.id == id) else {
                self.log_missing_id("delete_task", tab, id);
                return Ok(false);
            };
            tasks.remove(position);
            reindex(tasks);
            checked_snapshot(tasks)?
        };
        self.persist("delete_task", tab, updated).await;
        self.ops_log
            .info("delete_task", &format!("tab={tab} removed {id}"));
        Ok(true)
    }

    pub async fn toggle_cell(&self, tab: &str, id: &str, day: u8) -> Result<bool, InfraError> {
        if day >= CHALLENGE_DAYS {
            return Err(InfraError::InvalidInput(format!(
                "day index {day} out of range 0..{CHALLENGE_DAYS}"
            )));
        }
        self.ensure_loaded(tab).await?;
        let updated = {
            let mut snapshots = self.lock_snapshots()?;
            let tasks = snapshots.entry(tab.to_string()).or_default();
            let Some(task) = tasks.iter_mut().find(|task| task.id == id) else {
                self.log_missing_id("toggle_cell", tab, id);
                return Ok(false);
            };
            let next = task.cell_state(day).next();
            task.set_cell(day, next);
            checked_snapshot(tasks)?
        };
        self.persist("toggle_cell", tab, updated).await;
        Ok(true)
    }

    pub async fn reorder_task(
        &self,
        tab: &str,
        source: usize,
        dest: usize,
    ) -> Result<(), InfraError> {
        self.ensure_loaded(tab).await?;
        let updated = {
            let mut snapshots = self.lock_snapshots()?;
            let tasks = snapshots.entry(tab.to_string()).or_default();
            let len = tasks.len();
            if source >= len || dest >= len {
                return Err(InfraError::InvalidInput(format!(
                    "reorder indices ({source}, {dest}) out of range for {len} tasks"
                )));
            }
            if source == dest {
                return Ok(());
            }
            splice_move(tasks, source, dest);
            checked_snapshot(tasks)?
        };
        self.persist("reorder_task", tab, updated).await;
        Ok(())
    }

    async fn ensure_loaded(&self, tab: &str) -> Result<(), InfraError> {
        if self.lock_snapshots()?.contains_key(tab) {
            return Ok(());
        }
        let loaded = self.backend.load(tab).await;
        self.lock_snapshots()?
            .entry(tab.to_string())
            .or_insert(loaded);
        Ok(())
    }

    // Save failures are logged and swallowed: the in-memory snapshot stays
    // authoritative until the next successful save.
    async fn persist(&self, operation: &str, tab: &str, tasks: Vec<Task>) {
        let _gate = self.save_gate.lock().await;
        if let Err(error) = self.backend.save(tab, &tasks).await {
            self.ops_log
                .error(operation, &format!("tab={tab} save failed: {error}"));
        }
    }

    fn unused_id(&self, tasks: &[Task]) -> String {
        loop {
            let id = self.ids.next_id();
            if !tasks.iter().any(|task| task.id == id) {
                return id;
            }
        }
    }

    fn log_missing_id(&self, operation: &str, tab: &str, id: &str) {
        self.ops_log
            .info(operation, &format!("tab={tab} no task with id {id}"));
    }

    fn lock_snapshots(&self) -> Result<MutexGuard<'_, HashMap<String, Vec<Task>>>, InfraError> {
        self.snapshots
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("snapshot lock poisoned: {error}")))
    }
}

fn checked_snapshot(tasks: &[Task]) -> Result<Vec<Task>, InfraError> {
    validate_collection(tasks)
        .map_err(|message| InfraError::InvalidInput(format!("collection invariant broken: {message}")))?;
    Ok(tasks.to_vec())
}
