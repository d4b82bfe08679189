use crate::domain::models::{Task, validate_collection};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::ops_log::OpsLog;
use crate::infrastructure::storage::StorageBackend;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SqliteTaskStore {
    db_path: PathBuf,
    namespace: String,
    ops_log: Arc<OpsLog>,
}

impl SqliteTaskStore {
    pub fn new(db_path: impl AsRef<Path>, namespace: impl Into<String>, ops_log: Arc<OpsLog>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
            namespace: namespace.into(),
            ops_log,
        }
    }

    fn slot_key(&self, tab: &str) -> String {
        format!("{}-{tab}", self.namespace)
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }

    fn read_slot(&self, tab: &str) -> Result<Vec<Task>, InfraError> {
        let connection = self.connect()?;
        let payload: Option<String> = connection
            .query_row(
                "SELECT payload FROM task_snapshots WHERE slot_key = ?1",
                [self.slot_key(tab)],
                |row| row.get(0),
            )
            .optional()?;

        let Some(payload) = payload else {
            return Ok(Vec::new());
        };

        let mut tasks: Vec<Task> = serde_json::from_str(&payload)?;
        tasks.sort_by_key(|task| task.order);
        validate_collection(&tasks)
            .map_err(|message| InfraError::InvalidInput(format!("stored snapshot invalid: {message}")))?;
        Ok(tasks)
    }

    fn write_slot(&self, tab: &str, tasks: &[Task]) -> Result<(), InfraError> {
        let payload = serde_json::to_string(tasks)?;
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO task_snapshots (slot_key, payload, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(slot_key) DO UPDATE SET
               payload = excluded.payload,
               updated_at = excluded.updated_at",
            params![self.slot_key(tab), payload, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for SqliteTaskStore {
    async fn load(&self, tab: &str) -> Vec<Task> {
        match self.read_slot(tab) {
            Ok(tasks) => tasks,
            Err(error) => {
                self.ops_log
                    .error("load", &format!("tab={tab} falling back to empty: {error}"));
                Vec::new()
            }
        }
    }

    async fn save(&self, tab: &str, tasks: &[Task]) -> Result<(), InfraError> {
        self.write_slot(tab, tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::CellState;
    use crate::infrastructure::storage::initialize_database;

    struct Fixture {
        _dir: tempfile::TempDir,
        store: SqliteTaskStore,
        db_path: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("habitgrid.sqlite");
        initialize_database(&db_path).expect("initialize database");
        let store = SqliteTaskStore::new(
            &db_path,
            "habitgrid-v1",
            Arc::new(OpsLog::new(dir.path())),
        );
        Fixture {
            _dir: dir,
            store,
            db_path,
        }
    }

    fn sample_tasks() -> Vec<Task> {
        let mut first = Task::new("tsk-1", 0);
        first.name = "Read quran".to_string();
        first.set_cell(0, CellState::Done);
        first.set_cell(1, CellState::Missed);
        let mut second = Task::new("tsk-2", 1);
        second.name = "Evening walk".to_string();
        vec![first, second]
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let fixture = fixture();
        let tasks = sample_tasks();
        fixture.store.save("meli", &tasks).await.expect("save");
        assert_eq!(fixture.store.load("meli").await, tasks);
    }

    #[tokio::test]
    async fn load_of_unknown_tab_is_empty() {
        let fixture = fixture();
        assert!(fixture.store.load("younes").await.is_empty());
    }

    #[tokio::test]
    async fn save_replaces_previous_snapshot() {
        let fixture = fixture();
        let tasks = sample_tasks();
        fixture.store.save("meli", &tasks).await.expect("save");
        fixture.store.save("meli", &tasks[..1]).await.expect("save");
        assert_eq!(fixture.store.load("meli").await.len(), 1);
    }

    #[tokio::test]
    async fn tabs_use_distinct_slots() {
        let fixture = fixture();
        fixture
            .store
            .save("meli", &sample_tasks())
            .await
            .expect("save");
        assert!(fixture.store.load("younes").await.is_empty());
    }

    #[tokio::test]
    async fn malformed_payload_loads_as_empty() {
        let fixture = fixture();
        let connection = Connection::open(&fixture.db_path).expect("open db");
        connection
            .execute(
                "INSERT INTO task_snapshots (slot_key, payload, updated_at)
                 VALUES (?1, ?2, ?3)",
                params!["habitgrid-v1-meli", "not json", "2026-02-18T00:00:00Z"],
            )
            .expect("insert malformed row");
        assert!(fixture.store.load("meli").await.is_empty());
    }

    #[tokio::test]
    async fn snapshot_violating_order_invariant_loads_as_empty() {
        let fixture = fixture();
        let connection = Connection::open(&fixture.db_path).expect("open db");
        let payload = r#"[{"id":"a","name":"","cells":{},"order":0},{"id":"b","name":"","cells":{},"order":2}]"#;
        connection
            .execute(
                "INSERT INTO task_snapshots (slot_key, payload, updated_at)
                 VALUES (?1, ?2, ?3)",
                params!["habitgrid-v1-meli", payload, "2026-02-18T00:00:00Z"],
            )
            .expect("insert invalid row");
        assert!(fixture.store.load("meli").await.is_empty());
    }

    #[tokio::test]
    async fn load_sorts_by_stored_order() {
        let fixture = fixture();
        let connection = Connection::open(&fixture.db_path).expect("open db");
        let payload = r#"[{"id":"b","name":"","cells":{},"order":1},{"id":"a","name":"","cells":{},"order":0}]"#;
        connection
            .execute(
                "INSERT INTO task_snapshots (slot_key, payload, updated_at)
                 VALUES (?1, ?2, ?3)",
                params!["habitgrid-v1-meli", payload, "2026-02-18T00:00:00Z"],
            )
            .expect("insert shuffled row");
        let tasks = fixture.store.load("meli").await;
        let ids: Vec<&str> = tasks.iter().map(|task| task.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }
}
