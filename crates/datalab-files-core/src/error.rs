use crate::file_id::FileManagerType;

/// Errors returned by file managers and the registry.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FileManagerError {
    #[error("Method {method} is not supported by the {manager} file manager")]
    Unsupported {
        method: &'static str,
        manager: FileManagerType,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream error {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid format for file id: {0}")]
    InvalidFileId(String),

    #[error("Unknown FileManagerType name {0}")]
    UnknownFileManagerType(String),

    #[error("File id {id} belongs to the {actual} backend, not {expected}")]
    WrongBackend {
        id: String,
        expected: FileManagerType,
        actual: FileManagerType,
    },

    #[error("No file manager registered for type {0}")]
    NotRegistered(FileManagerType),
}

impl FileManagerError {
    pub fn unsupported(method: &'static str, manager: FileManagerType) -> Self {
        Self::Unsupported { method, manager }
    }

    /// Whether this error came from an operation the backend does not implement.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

impl From<serde_json::Error> for FileManagerError {
    fn from(e: serde_json::Error) -> Self {
        Self::MalformedResponse(e.to_string())
    }
}
