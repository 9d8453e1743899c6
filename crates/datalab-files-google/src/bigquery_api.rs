//! BigQuery API v2 metadata client (projects, datasets, tables).

use std::sync::Arc;

use datalab_files_core::FileManagerError;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::http::{read_json, send_authorized};
use crate::token_manager::TokenSource;

pub const BIGQUERY_API_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectReference {
    pub project_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub project_reference: ProjectReference,
    #[serde(default)]
    pub friendly_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetReference {
    pub project_id: String,
    pub dataset_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub dataset_reference: DatasetReference,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableReference {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub table_reference: TableReference,
    #[serde(default, rename = "type")]
    pub table_type: Option<String>,
}

/// One page of a list response; the item array is named after the resource.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: DeserializeOwned"))]
struct Page<T> {
    #[serde(default, alias = "projects", alias = "datasets", alias = "tables")]
    items: Vec<T>,
    #[serde(default)]
    next_page_token: Option<String>,
}

pub struct BigQueryClient {
    http: Client,
    api_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl BigQueryClient {
    pub fn new(tokens: Arc<dyn TokenSource>) -> Self {
        Self::with_base_url(BIGQUERY_API_URL, tokens)
    }

    pub fn with_base_url(api_url: impl Into<String>, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            http: Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, what: &str) -> Result<T, FileManagerError> {
        let resp = send_authorized(self.tokens.as_ref(), self.http.get(url), what).await?;
        read_json(resp).await
    }

    async fn list_all<T: DeserializeOwned>(&self, url: &str, what: &str) -> Result<Vec<T>, FileManagerError> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self.http.get(url);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }
            let resp = send_authorized(self.tokens.as_ref(), request, what).await?;
            let page: Page<T> = read_json(resp).await?;
            items.extend(page.items);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(items)
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn list_projects(&self) -> Result<Vec<Project>, FileManagerError> {
        let url = format!("{}/projects", self.api_url);
        let projects: Vec<Project> = self.list_all(&url, "BigQuery projects").await?;
        debug!("Listed {} BigQuery projects", projects.len());
        Ok(projects)
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn list_datasets(&self, project_id: &str) -> Result<Vec<Dataset>, FileManagerError> {
        let url = format!("{}/projects/{}/datasets", self.api_url, project_id);
        self.list_all(&url, &format!("BigQuery project {}", project_id)).await
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn get_dataset(&self, project_id: &str, dataset_id: &str) -> Result<Dataset, FileManagerError> {
        let url = format!("{}/projects/{}/datasets/{}", self.api_url, project_id, dataset_id);
        self.get_json(&url, &format!("BigQuery dataset {}.{}", project_id, dataset_id))
            .await
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn list_tables(&self, project_id: &str, dataset_id: &str) -> Result<Vec<Table>, FileManagerError> {
        let url = format!(
            "{}/projects/{}/datasets/{}/tables",
            self.api_url, project_id, dataset_id
        );
        self.list_all(&url, &format!("BigQuery dataset {}.{}", project_id, dataset_id))
            .await
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn get_table(
        &self,
        project_id: &str,
        dataset_id: &str,
        table_id: &str,
    ) -> Result<Table, FileManagerError> {
        let url = format!(
            "{}/projects/{}/datasets/{}/tables/{}",
            self.api_url, project_id, dataset_id, table_id
        );
        self.get_json(
            &url,
            &format!("BigQuery table {}.{}.{}", project_id, dataset_id, table_id),
        )
        .await
    }
}
