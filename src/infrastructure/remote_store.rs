use crate::domain::models::{CellState, Task, validate_collection};
use crate::infrastructure::config::RemoteSettings;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::ops_log::OpsLog;
use crate::infrastructure::storage::StorageBackend;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::BTreeMap;
use std::sync::Arc;
use url::Url;

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct TaskRow {
    id: String,
    name: String,
    cells: String,
    order: i64,
    tab: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
}

impl TaskRow {
    // `created_at` stays absent on save so the column default applies on
    // insert and upserts leave the original timestamp untouched.
    fn from_task(task: &Task, tab: &str) -> Result<Self, InfraError> {
        Ok(Self {
            id: task.id.clone(),
            name: task.name.clone(),
            cells: serde_json::to_string(&task.cells)?,
            order: i64::from(task.order),
            tab: tab.to_string(),
            created_at: None,
        })
    }

    fn into_task(self) -> Result<Task, InfraError> {
        let cells: BTreeMap<u8, CellState> = serde_json::from_str(&self.cells).map_err(|error| {
            InfraError::Remote(format!("invalid cells payload for row {}: {error}", self.id))
        })?;
        let order = u32::try_from(self.order).map_err(|_| {
            InfraError::Remote(format!("negative order {} for row {}", self.order, self.id))
        })?;
        Ok(Task {
            id: self.id,
            name: self.name,
            cells,
            order,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestTaskStore {
    client: Client,
    base_url: String,
    api_key: String,
    table: String,
    ops_log: Arc<OpsLog>,
}

impl ReqwestTaskStore {
    pub fn new(settings: RemoteSettings, ops_log: Arc<OpsLog>) -> Self {
        Self {
            client: Client::new(),
            base_url: settings.base_url,
            api_key: settings.api_key,
            table: settings.table,
            ops_log,
        }
    }

    fn table_endpoint(&self) -> Result<Url, InfraError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|error| InfraError::Remote(format!("invalid remote base url: {error}")))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| InfraError::Remote("remote base URL cannot be a base".to_string()))?;
            segments.pop_if_empty();
            segments.push(&self.table);
        }
        Ok(url)
    }

    fn http_error(context: &str, status: reqwest::StatusCode, body: &str) -> InfraError {
        let message = if body.trim().is_empty() {
            format!("{context}: http {}", status.as_u16())
        } else {
            format!("{context}: http {}; body={body}", status.as_u16())
        };
        InfraError::Remote(message)
    }

    fn tab_filter(tab: &str) -> (&'static str, String) {
        ("tab", format!("eq.{tab}"))
    }

    fn prune_filter(kept_ids: &[&str]) -> (&'static str, String) {
        ("id", format!("not.in.({})", kept_ids.join(",")))
    }

    async fn fetch_rows(&self, tab: &str) -> Result<Vec<Task>, InfraError> {
        let endpoint = self.table_endpoint()?;
        let response = self
            .client
            .get(endpoint)
            .query(&[Self::tab_filter(tab), ("order", "order.asc".to_string())])
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|error| {
                InfraError::Remote(format!("network error while loading tasks: {error}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            InfraError::Remote(format!("failed reading task list response: {error}"))
        })?;

        if !status.is_success() {
            return Err(Self::http_error("task list failed", status, &body));
        }

        let rows: Vec<TaskRow> = serde_json::from_str(&body).map_err(|error| {
            InfraError::Remote(format!("invalid task list payload: {error}; body={body}"))
        })?;

        let mut tasks = rows
            .into_iter()
            .map(TaskRow::into_task)
            .collect::<Result<Vec<_>, _>>()?;
        tasks.sort_by_key(|task| task.order);
        validate_collection(&tasks)
            .map_err(|message| InfraError::Remote(format!("stored collection invalid: {message}")))?;
        Ok(tasks)
    }

    async fn upsert_rows(&self, tab: &str, tasks: &[Task]) -> Result<(), InfraError> {
        let rows = tasks
            .iter()
            .map(|task| TaskRow::from_task(task, tab))
            .collect::<Result<Vec<_>, _>>()?;

        let endpoint = self.table_endpoint()?;
        let response = self
            .client
            .post(endpoint)
            .query(&[("on_conflict", "id")])
            .header("apikey", &self.api_key)
            .header("Prefer", "resolution=merge-duplicates")
            .bearer_auth(&self.api_key)
            .json(&rows)
            .send()
            .await
            .map_err(|error| {
                InfraError::Remote(format!("network error while upserting tasks: {error}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            InfraError::Remote(format!("failed reading upsert response: {error}"))
        })?;

        if !status.is_success() {
            return Err(Self::http_error("task upsert failed", status, &body));
        }
        Ok(())
    }

    async fn prune_rows(&self, tab: &str, kept_ids: &[&str]) -> Result<(), InfraError> {
        let endpoint = self.table_endpoint()?;
        let mut request = self
            .client
            .delete(endpoint)
            .query(&[Self::tab_filter(tab)])
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key);
        if !kept_ids.is_empty() {
            request = request.query(&[Self::prune_filter(kept_ids)]);
        }

        let response = request.send().await.map_err(|error| {
            InfraError::Remote(format!("network error while pruning tasks: {error}"))
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            InfraError::Remote(format!("failed reading prune response: {error}"))
        })?;

        if !status.is_success() {
            return Err(Self::http_error("task prune failed", status, &body));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for ReqwestTaskStore {
    async fn load(&self, tab: &str) -> Vec<Task> {
        match self.fetch_rows(tab).await {
            Ok(tasks) => tasks,
            Err(error) => {
                self.ops_log
                    .error("load", &format!("tab={tab} falling back to empty: {error}"));
                Vec::new()
            }
        }
    }

    // Upsert before prune: a failure between the two steps leaves stale extra
    // rows for the tab, never an emptied collection.
    async fn save(&self, tab: &str, tasks: &[Task]) -> Result<(), InfraError> {
        if !tasks.is_empty() {
            self.upsert_rows(tab, tasks).await?;
        }
        let kept_ids: Vec<&str> = tasks.iter().map(|task| task.id.as_str()).collect();
        self.prune_rows(tab, &kept_ids).await
    }
}
