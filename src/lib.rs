pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::bootstrap::{
    BootstrapResult, bootstrap_workspace, initialize_engine, select_backend,
};
pub use application::controller::{
    ClockIdGenerator, IdGenerator, SequentialIdGenerator, TaskListController,
};
pub use domain::models::{CHALLENGE_DAYS, CellState, Task, validate_collection};
pub use domain::window::{DEFAULT_CHALLENGE_START, challenge_dates, day_label};
pub use infrastructure::config::{RemoteSettings, StorageMode};
pub use infrastructure::error::InfraError;
pub use infrastructure::local_store::SqliteTaskStore;
pub use infrastructure::ops_log::OpsLog;
pub use infrastructure::remote_store::ReqwestTaskStore;
pub use infrastructure::storage::{InMemoryTaskStore, StorageBackend, initialize_database};
