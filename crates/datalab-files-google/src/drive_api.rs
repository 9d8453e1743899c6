//! Google Drive API v3 client wrapper.
//!
//! Thin request layer: builds URLs, field selectors and query strings and
//! decodes responses. Mapping to `DatalabFile` lives in `drive.rs`.

use std::sync::Arc;

use datalab_files_core::FileManagerError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::http::{read_json, send_authorized};
use crate::token_manager::TokenSource;

pub const DRIVE_API_URL: &str = "https://www.googleapis.com/drive/v3";
pub const DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3";
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Fields requested for every file returned by a mutation.
const FILE_FIELDS: &str = "id,kind,mimeType,name,parents,iconLink,createdTime,modifiedTime";

/// File resource returned by Google Drive.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub icon_link: Option<String>,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub modified_time: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRequest<'a> {
    name: &'a str,
    mime_type: &'a str,
    parents: [&'a str; 1],
}

/// Google Drive API client.
pub struct DriveClient {
    http: Client,
    api_url: String,
    upload_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl DriveClient {
    pub fn new(tokens: Arc<dyn TokenSource>) -> Self {
        Self::with_base_urls(DRIVE_API_URL, DRIVE_UPLOAD_URL, tokens)
    }

    pub fn with_base_urls(
        api_url: impl Into<String>,
        upload_url: impl Into<String>,
        tokens: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            http: Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            upload_url: upload_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    /// Get file metadata restricted to `fields`.
    #[instrument(skip(self), level = "debug")]
    pub async fn get_file(&self, file_id: &str, fields: &[&str]) -> Result<DriveFile, FileManagerError> {
        let url = format!("{}/files/{}", self.api_url, file_id);
        let request = self.http.get(&url).query(&[("fields", fields.join(","))]);
        let resp = send_authorized(self.tokens.as_ref(), request, &format!("Drive file {}", file_id)).await?;
        read_json(resp).await
    }

    /// Download file content as text.
    #[instrument(skip(self), level = "debug")]
    pub async fn get_content(&self, file_id: &str) -> Result<String, FileManagerError> {
        let url = format!("{}/files/{}", self.api_url, file_id);
        let request = self.http.get(&url).query(&[("alt", "media")]);
        let resp = send_authorized(self.tokens.as_ref(), request, &format!("Drive file {}", file_id)).await?;
        let text = resp
            .text()
            .await
            .map_err(|e| FileManagerError::MalformedResponse(e.to_string()))?;
        debug!("Downloaded {} bytes for file {}", text.len(), file_id);
        Ok(text)
    }

    /// List files matching all `query_predicates`, following every result page.
    #[instrument(skip(self), level = "debug")]
    pub async fn list_files(
        &self,
        file_fields: &[&str],
        query_predicates: &[String],
        order_by: &[&str],
    ) -> Result<Vec<DriveFile>, FileManagerError> {
        let url = format!("{}/files", self.api_url);
        let q = query_predicates.join(" and ");
        let fields = format!("nextPageToken, files({})", file_fields.join(","));
        let order_by = order_by.join(",");

        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut params = vec![
                ("q", q.clone()),
                ("fields", fields.clone()),
                ("orderBy", order_by.clone()),
            ];
            if let Some(token) = &page_token {
                params.push(("pageToken", token.clone()));
            }

            let request = self.http.get(&url).query(&params);
            let resp = send_authorized(self.tokens.as_ref(), request, "Drive file list").await?;
            let page: FileList = read_json(resp).await?;
            files.extend(page.files);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!("Listed {} Drive files", files.len());
        Ok(files)
    }

    /// Create an empty file or folder under `parent_id`.
    #[instrument(skip(self), level = "debug")]
    pub async fn create(
        &self,
        mime_type: &str,
        parent_id: &str,
        name: &str,
    ) -> Result<DriveFile, FileManagerError> {
        let url = format!("{}/files", self.api_url);
        let request = self
            .http
            .post(&url)
            .query(&[("fields", FILE_FIELDS)])
            .json(&CreateRequest {
                name,
                mime_type,
                parents: [parent_id],
            });
        let resp = send_authorized(self.tokens.as_ref(), request, &format!("Drive folder {}", parent_id)).await?;
        read_json(resp).await
    }

    /// Replace the content of a file (simple media upload).
    #[instrument(skip(self, content), level = "debug", fields(content_len = content.len()))]
    pub async fn upload_content(
        &self,
        file_id: &str,
        content: Vec<u8>,
        mime_type: &str,
    ) -> Result<DriveFile, FileManagerError> {
        let url = format!("{}/files/{}", self.upload_url, file_id);
        let len = content.len();
        let request = self
            .http
            .patch(&url)
            .query(&[("uploadType", "media"), ("fields", FILE_FIELDS)])
            .header("Content-Type", mime_type)
            .body(content);
        let resp = send_authorized(self.tokens.as_ref(), request, &format!("Drive file {}", file_id)).await?;
        debug!("Updated file {} ({} bytes)", file_id, len);
        read_json(resp).await
    }

    /// Rename a file and optionally move it between parents.
    #[instrument(skip(self), level = "debug")]
    pub async fn update_metadata(
        &self,
        file_id: &str,
        new_name: &str,
        add_parents: Option<&str>,
        remove_parents: &[String],
    ) -> Result<DriveFile, FileManagerError> {
        let url = format!("{}/files/{}", self.api_url, file_id);
        let mut params = vec![("fields", FILE_FIELDS.to_string())];
        if let Some(parent) = add_parents {
            params.push(("addParents", parent.to_string()));
            if !remove_parents.is_empty() {
                params.push(("removeParents", remove_parents.join(",")));
            }
        }

        let request = self
            .http
            .patch(&url)
            .query(&params)
            .json(&serde_json::json!({ "name": new_name }));
        let resp = send_authorized(self.tokens.as_ref(), request, &format!("Drive file {}", file_id)).await?;
        read_json(resp).await
    }

    /// Copy a file into `parent_id`.
    #[instrument(skip(self), level = "debug")]
    pub async fn copy(&self, file_id: &str, parent_id: &str) -> Result<DriveFile, FileManagerError> {
        let url = format!("{}/files/{}/copy", self.api_url, file_id);
        let request = self
            .http
            .post(&url)
            .query(&[("fields", FILE_FIELDS)])
            .json(&serde_json::json!({ "parents": [parent_id] }));
        let resp = send_authorized(self.tokens.as_ref(), request, &format!("Drive file {}", file_id)).await?;
        read_json(resp).await
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn delete(&self, file_id: &str) -> Result<(), FileManagerError> {
        let url = format!("{}/files/{}", self.api_url, file_id);
        send_authorized(self.tokens.as_ref(), self.http.delete(&url), &format!("Drive file {}", file_id)).await?;
        debug!("Deleted Drive file {}", file_id);
        Ok(())
    }
}
