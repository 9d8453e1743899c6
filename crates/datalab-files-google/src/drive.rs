//! Google Drive file manager.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use datalab_files_core::{
    ensure_source, list_with_session_status, AppUrls, ContentFormat, DatalabFile, DatalabFileId, DatalabFileType,
    FileManager, FileManagerError, FileManagerType, FileMetadata, SessionLister,
    EMPTY_NOTEBOOK_CONTENT,
};
use tracing::{debug, instrument, warn};

use crate::drive_api::{DriveClient, DriveFile, FOLDER_MIME_TYPE};

const NOTEBOOK_MIME_TYPE: &str = "application/json";
const TEXT_MIME_TYPE: &str = "text/plain";
const DEFAULT_ITEM_NAME: &str = "New Item";

const GET_FIELDS: &[&str] = &["id", "kind", "mimeType", "name", "parents", "iconLink"];
const LIST_FIELDS: &[&str] = &[
    "createdTime",
    "iconLink",
    "id",
    "mimeType",
    "modifiedTime",
    "name",
    "parents",
];
const ORDER_BY: &[&str] = &["folder", "modifiedTime desc", "name"];

/// File manager backed by Google Drive. File id paths are Drive file ids.
pub struct DriveFileManager {
    client: Arc<DriveClient>,
    sessions: Arc<dyn SessionLister>,
    urls: AppUrls,
}

impl DriveFileManager {
    pub fn new(client: Arc<DriveClient>, sessions: Arc<dyn SessionLister>, urls: AppUrls) -> Self {
        Self {
            client,
            sessions,
            urls,
        }
    }

    fn to_datalab_file(file: DriveFile) -> DatalabFile {
        let mut file_type = if file.mime_type == FOLDER_MIME_TYPE {
            DatalabFileType::Directory
        } else {
            DatalabFileType::File
        };
        if file.name.ends_with(".ipynb") {
            file_type = DatalabFileType::Notebook;
        }

        let mut datalab_file = DatalabFile::new(
            DatalabFileId::new(file.id, FileManagerType::Drive),
            file.name,
            file_type,
        );
        if let Some(icon) = file.icon_link {
            datalab_file.icon = icon;
        }
        datalab_file.with_metadata(FileMetadata::Drive {
            parents: file.parents,
            mime_type: file.mime_type,
            created_time: file.created_time,
            modified_time: file.modified_time,
        })
    }

    /// Search predicates selecting the visible children of `parent_id`.
    fn list_query(parent_id: &str) -> Vec<String> {
        let whitelist = [
            "name contains '.ipynb'".to_string(),
            "name contains '.txt'".to_string(),
            format!("mimeType = '{}'", FOLDER_MIME_TYPE),
        ];
        vec![
            format!("\"{}\" in parents", parent_id),
            "trashed = false".to_string(),
            format!("({})", whitelist.join(" or ")),
        ]
    }
}

#[async_trait]
impl FileManager for DriveFileManager {
    fn manager_type(&self) -> FileManagerType {
        FileManagerType::Drive
    }

    #[instrument(skip(self), level = "debug")]
    async fn get(&self, file_id: &DatalabFileId) -> Result<DatalabFile, FileManagerError> {
        ensure_source(file_id, FileManagerType::Drive)?;
        let upstream = self.client.get_file(&file_id.path, GET_FIELDS).await?;
        Ok(Self::to_datalab_file(upstream))
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_string_content(&self, file_id: &DatalabFileId) -> Result<String, FileManagerError> {
        ensure_source(file_id, FileManagerType::Drive)?;
        self.client
            .get_content(&file_id.path)
            .await
            .map_err(|e| match e {
                FileManagerError::NotFound(_) => FileManagerError::NotFound(format!(
                    "Could not download file: {}",
                    file_id.to_query_string()
                )),
                other => other,
            })
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_root_file(&self) -> Result<DatalabFile, FileManagerError> {
        let upstream = self.client.get_file("root", GET_FIELDS).await?;
        Ok(Self::to_datalab_file(upstream))
    }

    #[instrument(skip(self, text), level = "debug", fields(text_len = text.len()))]
    async fn save_text(&self, file: &DatalabFile, text: &str) -> Result<DatalabFile, FileManagerError> {
        ensure_source(&file.id, FileManagerType::Drive)?;
        let mime_type = match &file.metadata {
            FileMetadata::Drive { mime_type, .. } if !mime_type.is_empty() => mime_type.as_str(),
            _ => TEXT_MIME_TYPE,
        };
        let content = match file.format {
            Some(ContentFormat::Base64) => STANDARD.decode(text).map_err(|e| {
                FileManagerError::InvalidOperation(format!(
                    "Invalid base64 content for {}: {}",
                    file.id, e
                ))
            })?,
            _ => text.as_bytes().to_vec(),
        };
        let upstream = self.client.upload_content(&file.id.path, content, mime_type).await?;
        Ok(Self::to_datalab_file(upstream))
    }

    #[instrument(skip(self), level = "debug")]
    async fn list(&self, container_id: &DatalabFileId) -> Result<Vec<DatalabFile>, FileManagerError> {
        ensure_source(container_id, FileManagerType::Drive)?;
        let predicates = Self::list_query(&container_id.path);

        let listing = async {
            let upstream = self.client.list_files(LIST_FIELDS, &predicates, ORDER_BY).await?;
            Ok::<Vec<DatalabFile>, FileManagerError>(
                upstream.into_iter().map(Self::to_datalab_file).collect(),
            )
        };
        list_with_session_status(listing, self.sessions.as_ref()).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn create(
        &self,
        file_type: DatalabFileType,
        container_id: Option<&DatalabFileId>,
        name: Option<&str>,
    ) -> Result<DatalabFile, FileManagerError> {
        if let Some(container) = container_id {
            ensure_source(container, FileManagerType::Drive)?;
        }
        let (mime_type, content) = match file_type {
            DatalabFileType::Directory => (FOLDER_MIME_TYPE, ""),
            DatalabFileType::Notebook => (NOTEBOOK_MIME_TYPE, EMPTY_NOTEBOOK_CONTENT),
            DatalabFileType::File => (TEXT_MIME_TYPE, ""),
        };
        let parent = container_id.map(|c| c.path.as_str()).unwrap_or("root");
        let name = name.unwrap_or(DEFAULT_ITEM_NAME);

        let mut upstream = self.client.create(mime_type, parent, name).await?;
        if !content.is_empty() {
            upstream = self
                .client
                .upload_content(&upstream.id, content.as_bytes().to_vec(), mime_type)
                .await?;
        }

        debug!("Created Drive {} {} in {}", file_type, upstream.id, parent);
        Ok(Self::to_datalab_file(upstream))
    }

    #[instrument(skip(self), level = "debug")]
    async fn rename(
        &self,
        old_file_id: &DatalabFileId,
        new_name: &str,
        new_container_id: Option<&DatalabFileId>,
    ) -> Result<DatalabFile, FileManagerError> {
        ensure_source(old_file_id, FileManagerType::Drive)?;

        let upstream = match new_container_id {
            Some(container) => {
                ensure_source(container, FileManagerType::Drive)?;
                let current = self.client.get_file(&old_file_id.path, &["id", "parents"]).await?;
                self.client
                    .update_metadata(&old_file_id.path, new_name, Some(&container.path), &current.parents)
                    .await?
            }
            None => {
                self.client
                    .update_metadata(&old_file_id.path, new_name, None, &[])
                    .await?
            }
        };
        Ok(Self::to_datalab_file(upstream))
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, file_id: &DatalabFileId) -> Result<(), FileManagerError> {
        ensure_source(file_id, FileManagerType::Drive)?;
        self.client.delete(&file_id.path).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn copy(
        &self,
        file_id: &DatalabFileId,
        destination_directory_id: &DatalabFileId,
    ) -> Result<DatalabFile, FileManagerError> {
        ensure_source(file_id, FileManagerType::Drive)?;
        ensure_source(destination_directory_id, FileManagerType::Drive)?;
        let upstream = self
            .client
            .copy(&file_id.path, &destination_directory_id.path)
            .await?;
        Ok(Self::to_datalab_file(upstream))
    }

    async fn get_editor_url(&self, file_id: &DatalabFileId) -> Result<String, FileManagerError> {
        ensure_source(file_id, FileManagerType::Drive)?;
        Ok(self.urls.editor_url(file_id))
    }

    async fn get_notebook_url(&self, file_id: &DatalabFileId) -> Result<String, FileManagerError> {
        ensure_source(file_id, FileManagerType::Drive)?;
        Ok(self.urls.notebook_url(file_id))
    }

    /// Walks `parents[0]` links upwards; Drive has no cheaper ancestor query.
    #[instrument(skip(self), level = "debug")]
    async fn file_id_to_full_path(
        &self,
        file_id: &DatalabFileId,
    ) -> Result<Vec<DatalabFile>, FileManagerError> {
        let mut file = self.get(file_id).await?;
        let mut seen = HashSet::from([file.id.path.clone()]);
        let mut full_path = vec![file.clone()];

        while let Some(parent) = file.parents().first().cloned() {
            if !seen.insert(parent.clone()) {
                warn!("Parent cycle detected at Drive file {}", parent);
                break;
            }
            file = self
                .get(&DatalabFileId::new(parent, FileManagerType::Drive))
                .await?;
            full_path.push(file.clone());
        }

        full_path.reverse();
        Ok(full_path)
    }
}
