use async_trait::async_trait;

use crate::error::FileManagerError;
use crate::file::{DatalabFile, DatalabFileType};
use crate::file_id::{DatalabFileId, FileManagerType};

/// Operation set implemented by every storage backend.
///
/// Implementations are shared across the whole process through the registry and
/// must not keep per-request mutable state. Backends that cannot perform an
/// operation return `FileManagerError::Unsupported` without touching the network.
#[async_trait]
pub trait FileManager: Send + Sync {
    /// Backend this manager serves. Ids of any other backend are rejected.
    fn manager_type(&self) -> FileManagerType;

    /// Fetch the metadata of a single node.
    async fn get(&self, file_id: &DatalabFileId) -> Result<DatalabFile, FileManagerError>;

    /// Fetch the raw content of a file as a string.
    async fn get_string_content(&self, file_id: &DatalabFileId)
        -> Result<String, FileManagerError>;

    /// The top of this backend's namespace.
    async fn get_root_file(&self) -> Result<DatalabFile, FileManagerError>;

    /// Overwrite the content of an existing file.
    async fn save_text(&self, file: &DatalabFile, text: &str)
        -> Result<DatalabFile, FileManagerError>;

    /// List the children of a directory node.
    async fn list(&self, container_id: &DatalabFileId)
        -> Result<Vec<DatalabFile>, FileManagerError>;

    /// Create a new item inside `container_id` (the root when omitted).
    async fn create(
        &self,
        file_type: DatalabFileType,
        container_id: Option<&DatalabFileId>,
        name: Option<&str>,
    ) -> Result<DatalabFile, FileManagerError>;

    /// Rename an item, moving it into `new_container_id` when given.
    async fn rename(
        &self,
        old_file_id: &DatalabFileId,
        new_name: &str,
        new_container_id: Option<&DatalabFileId>,
    ) -> Result<DatalabFile, FileManagerError>;

    async fn delete(&self, file_id: &DatalabFileId) -> Result<(), FileManagerError>;

    /// Copy an item into `destination_directory_id`.
    async fn copy(
        &self,
        file_id: &DatalabFileId,
        destination_directory_id: &DatalabFileId,
    ) -> Result<DatalabFile, FileManagerError>;

    async fn get_editor_url(&self, file_id: &DatalabFileId) -> Result<String, FileManagerError>;

    async fn get_notebook_url(&self, file_id: &DatalabFileId)
        -> Result<String, FileManagerError>;

    /// Ordered chain of nodes from the root down to `file_id` (inclusive).
    async fn file_id_to_full_path(
        &self,
        file_id: &DatalabFileId,
    ) -> Result<Vec<DatalabFile>, FileManagerError>;
}

/// Reject ids that belong to a different backend than `expected`.
pub fn ensure_source(
    file_id: &DatalabFileId,
    expected: FileManagerType,
) -> Result<(), FileManagerError> {
    if file_id.source != expected {
        return Err(FileManagerError::WrongBackend {
            id: file_id.to_query_string(),
            expected,
            actual: file_id.source,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_source() {
        let id = DatalabFileId::new("abc", FileManagerType::Drive);
        assert!(ensure_source(&id, FileManagerType::Drive).is_ok());
        let err = ensure_source(&id, FileManagerType::Jupyter).unwrap_err();
        assert!(matches!(
            err,
            FileManagerError::WrongBackend {
                expected: FileManagerType::Jupyter,
                actual: FileManagerType::Drive,
                ..
            }
        ));
    }
}
