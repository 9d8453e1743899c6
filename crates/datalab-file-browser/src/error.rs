use datalab_files_core::FileManagerError;

/// Errors returned by `FileBrowser` operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BrowserError {
    #[error(transparent)]
    FileManager(#[from] FileManagerError),

    #[error("No current file to retrieve")]
    NoCurrentFile,

    #[error("No item at index {0}")]
    IndexOutOfRange(usize),
}
