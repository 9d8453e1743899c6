//! Read-only BigQuery file manager.
//!
//! Presents the metadata hierarchy as directories: `/` lists projects,
//! `project` lists datasets, `project/dataset` lists tables. Tables are files.

use std::sync::Arc;

use async_trait::async_trait;
use datalab_files_core::{
    ensure_source, BigQueryKind, DatalabFile, DatalabFileId, DatalabFileType, FileManager,
    FileManagerError, FileManagerType, FileMetadata,
};
use futures::future::try_join_all;
use tracing::instrument;

use crate::bigquery_api::{BigQueryClient, Dataset, Table};

const PROJECT_ICON: &str = "datalab-icons:bq-project";
const DATASET_ICON: &str = "datalab-icons:bq-dataset";
const TABLE_ICON: &str = "datalab-icons:bq-table";

/// Domain-scoped project ids (`example.com:analytics`) contain the file id
/// delimiter, so `:` is kept percent-encoded inside id paths.
const ESCAPED_COLON: &str = "%3A";

fn escape_segment(segment: &str) -> String {
    segment.replace(':', ESCAPED_COLON)
}

fn unescape_segment(segment: &str) -> String {
    segment.replace(ESCAPED_COLON, ":")
}

pub struct BigQueryFileManager {
    client: Arc<BigQueryClient>,
}

impl BigQueryFileManager {
    pub fn new(client: Arc<BigQueryClient>) -> Self {
        Self { client }
    }

    fn unsupported(method: &'static str) -> FileManagerError {
        FileManagerError::unsupported(method, FileManagerType::BigQuery)
    }

    fn root_file() -> DatalabFile {
        DatalabFile::new(
            DatalabFileId::new("/", FileManagerType::BigQuery),
            "/",
            DatalabFileType::Directory,
        )
    }

    fn project_file(project_id: &str) -> DatalabFile {
        DatalabFile::new(
            DatalabFileId::new(escape_segment(project_id), FileManagerType::BigQuery),
            project_id,
            DatalabFileType::Directory,
        )
        .with_icon(PROJECT_ICON)
        .with_metadata(FileMetadata::BigQuery {
            kind: BigQueryKind::Project,
            table_type: None,
        })
    }

    fn dataset_file(dataset: Dataset) -> DatalabFile {
        let r = dataset.dataset_reference;
        DatalabFile::new(
            DatalabFileId::new(
                format!("{}/{}", escape_segment(&r.project_id), r.dataset_id),
                FileManagerType::BigQuery,
            ),
            r.dataset_id,
            DatalabFileType::Directory,
        )
        .with_icon(DATASET_ICON)
        .with_metadata(FileMetadata::BigQuery {
            kind: BigQueryKind::Dataset,
            table_type: None,
        })
    }

    fn table_file(table: Table) -> DatalabFile {
        let r = table.table_reference;
        DatalabFile::new(
            DatalabFileId::new(
                format!(
                    "{}/{}/{}",
                    escape_segment(&r.project_id),
                    r.dataset_id,
                    r.table_id
                ),
                FileManagerType::BigQuery,
            ),
            r.table_id,
            DatalabFileType::File,
        )
        .with_icon(TABLE_ICON)
        .with_metadata(FileMetadata::BigQuery {
            kind: BigQueryKind::Table,
            table_type: table.table_type,
        })
    }
}

#[async_trait]
impl FileManager for BigQueryFileManager {
    fn manager_type(&self) -> FileManagerType {
        FileManagerType::BigQuery
    }

    #[instrument(skip(self), level = "debug")]
    async fn get(&self, file_id: &DatalabFileId) -> Result<DatalabFile, FileManagerError> {
        ensure_source(file_id, FileManagerType::BigQuery)?;
        let segments: Vec<String> = file_id.segments().iter().map(|s| unescape_segment(s)).collect();
        match segments.as_slice() {
            [] => Ok(Self::root_file()),
            [project] => Ok(Self::project_file(project)),
            [project, dataset] => {
                let dataset = self.client.get_dataset(project, dataset).await?;
                Ok(Self::dataset_file(dataset))
            }
            [project, dataset, table] => {
                let table = self.client.get_table(project, dataset, table).await?;
                Ok(Self::table_file(table))
            }
            _ => Err(FileManagerError::InvalidOperation(format!(
                "Invalid BigQuery path: {}",
                file_id.path
            ))),
        }
    }

    async fn get_string_content(&self, _file_id: &DatalabFileId) -> Result<String, FileManagerError> {
        Err(Self::unsupported("getStringContent"))
    }

    async fn get_root_file(&self) -> Result<DatalabFile, FileManagerError> {
        Ok(Self::root_file())
    }

    async fn save_text(&self, _file: &DatalabFile, _text: &str) -> Result<DatalabFile, FileManagerError> {
        Err(Self::unsupported("saveText"))
    }

    #[instrument(skip(self), level = "debug")]
    async fn list(&self, container_id: &DatalabFileId) -> Result<Vec<DatalabFile>, FileManagerError> {
        ensure_source(container_id, FileManagerType::BigQuery)?;
        let segments: Vec<String> = container_id.segments().iter().map(|s| unescape_segment(s)).collect();
        match segments.as_slice() {
            [] => {
                let projects = self.client.list_projects().await?;
                Ok(projects
                    .iter()
                    .map(|p| Self::project_file(&p.project_reference.project_id))
                    .collect())
            }
            [project] => {
                let datasets = self.client.list_datasets(project).await?;
                Ok(datasets.into_iter().map(Self::dataset_file).collect())
            }
            [project, dataset] => {
                let tables = self.client.list_tables(project, dataset).await?;
                Ok(tables.into_iter().map(Self::table_file).collect())
            }
            _ => Err(FileManagerError::InvalidOperation(format!(
                "Cannot list BigQuery table {}",
                container_id.path
            ))),
        }
    }

    async fn create(
        &self,
        _file_type: DatalabFileType,
        _container_id: Option<&DatalabFileId>,
        _name: Option<&str>,
    ) -> Result<DatalabFile, FileManagerError> {
        Err(Self::unsupported("create"))
    }

    async fn rename(
        &self,
        _old_file_id: &DatalabFileId,
        _new_name: &str,
        _new_container_id: Option<&DatalabFileId>,
    ) -> Result<DatalabFile, FileManagerError> {
        Err(Self::unsupported("rename"))
    }

    async fn delete(&self, _file_id: &DatalabFileId) -> Result<(), FileManagerError> {
        Err(Self::unsupported("delete"))
    }

    async fn copy(
        &self,
        _file_id: &DatalabFileId,
        _destination_directory_id: &DatalabFileId,
    ) -> Result<DatalabFile, FileManagerError> {
        Err(Self::unsupported("copy"))
    }

    async fn get_editor_url(&self, _file_id: &DatalabFileId) -> Result<String, FileManagerError> {
        Err(Self::unsupported("getEditorUrl"))
    }

    async fn get_notebook_url(&self, _file_id: &DatalabFileId) -> Result<String, FileManagerError> {
        Err(Self::unsupported("getNotebookUrl"))
    }

    #[instrument(skip(self), level = "debug")]
    async fn file_id_to_full_path(
        &self,
        file_id: &DatalabFileId,
    ) -> Result<Vec<DatalabFile>, FileManagerError> {
        ensure_source(file_id, FileManagerType::BigQuery)?;
        let segments = file_id.segments();
        let ancestors = (1..=segments.len()).map(|i| {
            let id = DatalabFileId::new(segments[..i].join("/"), FileManagerType::BigQuery);
            async move { self.get(&id).await }
        });

        let mut full_path = vec![Self::root_file()];
        full_path.extend(try_join_all(ancestors).await?);
        Ok(full_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token_manager::StaticToken;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn manager(server: &MockServer) -> BigQueryFileManager {
        let client = BigQueryClient::with_base_url(server.uri(), Arc::new(StaticToken::new("t")));
        BigQueryFileManager::new(Arc::new(client))
    }

    fn bq_id(path: &str) -> DatalabFileId {
        DatalabFileId::new(path, FileManagerType::BigQuery)
    }

    #[tokio::test]
    async fn test_list_hierarchy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/projects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "projects": [{ "id": "p1", "projectReference": { "projectId": "p1" } }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/projects/p1/datasets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "datasets": [{ "datasetReference": { "projectId": "p1", "datasetId": "sales" } }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/projects/p1/datasets/sales/tables"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tables": [{
                    "tableReference": { "projectId": "p1", "datasetId": "sales", "tableId": "orders" },
                    "type": "TABLE"
                }]
            })))
            .mount(&server)
            .await;

        let manager = manager(&server);

        let projects = manager.list(&bq_id("/")).await.unwrap();
        assert_eq!(projects[0].id, bq_id("p1"));
        assert!(projects[0].is_directory());

        let datasets = manager.list(&bq_id("p1")).await.unwrap();
        assert_eq!(datasets[0].id, bq_id("p1/sales"));
        assert_eq!(datasets[0].icon, DATASET_ICON);

        let tables = manager.list(&bq_id("p1/sales")).await.unwrap();
        assert_eq!(tables[0].id, bq_id("p1/sales/orders"));
        assert_eq!(tables[0].file_type, DatalabFileType::File);

        assert!(matches!(
            manager.list(&bq_id("p1/sales/orders")).await,
            Err(FileManagerError::InvalidOperation(_))
        ));
    }

    #[tokio::test]
    async fn test_full_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/projects/p1/datasets/sales"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "datasetReference": { "projectId": "p1", "datasetId": "sales" }
            })))
            .mount(&server)
            .await;

        let full_path = manager(&server)
            .file_id_to_full_path(&bq_id("p1/sales"))
            .await
            .unwrap();
        let names: Vec<_> = full_path.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["/", "p1", "sales"]);
    }

    #[tokio::test]
    async fn test_domain_scoped_project_ids() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/projects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "projects": [{ "projectReference": { "projectId": "example.com:analytics" } }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/projects/example.com:analytics/datasets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "datasets": [{
                    "datasetReference": { "projectId": "example.com:analytics", "datasetId": "web" }
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager(&server);
        let projects = manager.list(&bq_id("/")).await.unwrap();
        assert_eq!(projects[0].name, "example.com:analytics");

        let id = projects[0].id.clone();
        assert_eq!(id.to_query_string(), "bigquery:example.com%3Aanalytics");
        assert_eq!(DatalabFileId::from_query_string(&id.to_query_string()).unwrap(), id);

        let datasets = manager.list(&id).await.unwrap();
        assert_eq!(datasets[0].id, bq_id("example.com%3Aanalytics/web"));
        assert_eq!(manager.get(&id).await.unwrap().name, "example.com:analytics");
    }

    #[tokio::test]
    async fn test_mutations_unsupported() {
        let server = MockServer::start().await;
        let manager = manager(&server);
        let err = manager.delete(&bq_id("p1/sales/orders")).await.unwrap_err();
        assert!(err.is_unsupported());
        let err = manager
            .create(DatalabFileType::File, Some(&bq_id("p1")), None)
            .await
            .unwrap_err();
        assert!(err.is_unsupported());
    }
}
