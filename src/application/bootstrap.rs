use crate::application::controller::{ClockIdGenerator, TaskListController};
use crate::infrastructure::config::{
    StorageMode, ensure_default_configs, read_namespace, read_remote_settings, read_storage_mode,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::local_store::SqliteTaskStore;
use crate::infrastructure::ops_log::OpsLog;
use crate::infrastructure::remote_store::ReqwestTaskStore;
use crate::infrastructure::storage::{StorageBackend, initialize_database};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug)]
pub struct BootstrapResult {
    pub workspace_root: PathBuf,
    pub config_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub database_path: PathBuf,
}

pub fn bootstrap_workspace(workspace_root: &Path) -> Result<BootstrapResult, InfraError> {
    let config_dir = workspace_root.join("config");
    let state_dir = workspace_root.join("state");
    let logs_dir = workspace_root.join("logs");
    let database_path = state_dir.join("habitgrid.sqlite");

    fs::create_dir_all(&config_dir)?;
    fs::create_dir_all(&state_dir)?;
    fs::create_dir_all(&logs_dir)?;

    ensure_default_configs(&config_dir)?;
    initialize_database(&database_path)?;

    Ok(BootstrapResult {
        workspace_root: workspace_root.to_path_buf(),
        config_dir,
        logs_dir,
        database_path,
    })
}

// Backend variant is fixed at startup from the configured mode.
pub fn select_backend(
    bootstrap: &BootstrapResult,
    ops_log: Arc<OpsLog>,
) -> Result<Arc<dyn StorageBackend>, InfraError> {
    match read_storage_mode(&bootstrap.config_dir)? {
        StorageMode::Local => {
            let namespace = read_namespace(&bootstrap.config_dir)?;
            Ok(Arc::new(SqliteTaskStore::new(
                &bootstrap.database_path,
                namespace,
                ops_log,
            )))
        }
        StorageMode::Remote => {
            let settings = read_remote_settings(&bootstrap.config_dir)?;
            Ok(Arc::new(ReqwestTaskStore::new(settings, ops_log)))
        }
    }
}

pub fn initialize_engine(workspace_root: &Path) -> Result<TaskListController, InfraError> {
    let bootstrap = bootstrap_workspace(workspace_root)?;
    let ops_log = Arc::new(OpsLog::new(&bootstrap.logs_dir));
    let backend = select_backend(&bootstrap, Arc::clone(&ops_log))?;
    Ok(TaskListController::new(
        backend,
        Arc::new(ClockIdGenerator::new()),
        ops_log,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_creates_workspace_layout() {
        let dir = tempfile::tempdir().expect("temp dir");
        let result = bootstrap_workspace(dir.path()).expect("bootstrap");
        assert!(result.config_dir.join("app.json").exists());
        assert!(result.config_dir.join("remote.json").exists());
        assert!(result.database_path.exists());
        assert!(result.logs_dir.exists());
    }

    #[test]
    fn bootstrap_is_idempotent() {
        let dir = tempfile::tempdir().expect("temp dir");
        bootstrap_workspace(dir.path()).expect("first bootstrap");
        bootstrap_workspace(dir.path()).expect("second bootstrap");
    }

    #[test]
    fn default_workspace_selects_the_local_backend() {
        let dir = tempfile::tempdir().expect("temp dir");
        let result = bootstrap_workspace(dir.path()).expect("bootstrap");
        let ops_log = Arc::new(OpsLog::new(&result.logs_dir));
        assert!(select_backend(&result, ops_log).is_ok());
    }

    #[test]
    fn remote_mode_without_settings_is_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let result = bootstrap_workspace(dir.path()).expect("bootstrap");
        fs::write(
            result.config_dir.join("app.json"),
            r#"{"schema":1,"storage":"remote"}"#,
        )
        .expect("write config");
        let ops_log = Arc::new(OpsLog::new(&result.logs_dir));
        assert!(select_backend(&result, ops_log).is_err());
    }

    #[tokio::test]
    async fn initialized_engine_round_trips_through_sqlite() {
        let dir = tempfile::tempdir().expect("temp dir");
        let engine = initialize_engine(dir.path()).expect("engine");
        let id = engine.add_task("meli").await.expect("add task");
        assert!(engine.rename_task("meli", &id, "fast").await.expect("rename"));

        let reopened = initialize_engine(dir.path()).expect("engine");
        let tasks = reopened.tasks("meli").await.expect("tasks");
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].name, "fast");
    }
}
