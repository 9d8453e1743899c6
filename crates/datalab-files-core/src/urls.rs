use crate::file_id::DatalabFileId;

/// Builds links into the Datalab app for opening files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppUrls {
    host_root: String,
}

impl AppUrls {
    pub fn new(host_root: impl Into<String>) -> Self {
        let host_root = host_root.into();
        Self {
            host_root: host_root.trim_end_matches('/').to_string(),
        }
    }

    pub fn host_root(&self) -> &str {
        &self.host_root
    }

    pub fn editor_url(&self, file_id: &DatalabFileId) -> String {
        format!("{}/editor?file={}", self.host_root, file_id.to_query_string())
    }

    pub fn notebook_url(&self, file_id: &DatalabFileId) -> String {
        format!("{}/notebook?file={}", self.host_root, file_id.to_query_string())
    }
}
