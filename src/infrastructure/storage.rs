use crate::domain::models::Task;
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

pub fn initialize_database(path: &Path) -> Result<(), InfraError> {
    let connection = Connection::open(path)?;
    connection.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

// Full-snapshot persistence per tab. `load` never fails visibly: internal
// failures are logged and an empty collection is substituted.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn load(&self, tab: &str) -> Vec<Task>;
    async fn save(&self, tab: &str, tasks: &[Task]) -> Result<(), InfraError>;
}

#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    slots: Mutex<HashMap<String, Vec<Task>>>,
    fail_saves: AtomicBool,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Task>>> {
        match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl StorageBackend for InMemoryTaskStore {
    async fn load(&self, tab: &str) -> Vec<Task> {
        self.lock_slots().get(tab).cloned().unwrap_or_default()
    }

    async fn save(&self, tab: &str, tasks: &[Task]) -> Result<(), InfraError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(InfraError::Remote("injected save failure".to_string()));
        }
        self.lock_slots().insert(tab.to_string(), tasks.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::CellState;

    fn sample_tasks() -> Vec<Task> {
        let mut first = Task::new("tsk-1", 0);
        first.name = "Pray fajr on time".to_string();
        first.set_cell(0, CellState::Done);
        let second = Task::new("tsk-2", 1);
        vec![first, second]
    }

    #[tokio::test]
    async fn load_of_unknown_tab_is_empty() {
        let store = InMemoryTaskStore::new();
        assert!(store.load("meli").await.is_empty());
    }

    #[tokio::test]
    async fn save_replaces_the_whole_slot() {
        let store = InMemoryTaskStore::new();
        store.save("meli", &sample_tasks()).await.expect("save");
        store.save("meli", &sample_tasks()[..1]).await.expect("save");
        assert_eq!(store.load("meli").await.len(), 1);
    }

    #[tokio::test]
    async fn tabs_are_isolated() {
        let store = InMemoryTaskStore::new();
        store.save("meli", &sample_tasks()).await.expect("save");
        assert!(store.load("younes").await.is_empty());
    }

    #[tokio::test]
    async fn injected_failure_keeps_prior_state() {
        let store = InMemoryTaskStore::new();
        store.save("meli", &sample_tasks()).await.expect("save");
        store.fail_next_saves(true);
        assert!(store.save("meli", &[]).await.is_err());
        assert_eq!(store.load("meli").await, sample_tasks());
    }
}
