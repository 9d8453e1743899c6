//! Core traits and types for Datalab file manager backends.
//!
//! This crate defines the abstractions shared by every storage backend:
//! - `DatalabFileId`: cross-backend file identifier (`backend:path`)
//! - `DatalabFile`: one node (file, directory or notebook) returned by a backend
//! - `FileManager`: the operation set every backend adapter implements
//! - `SessionLister`: running-session lookup used to annotate listing status
//! - `FileManagerRegistry`: one lazily-built adapter per backend type

mod error;
mod file;
mod file_id;
mod manager;
mod registry;
mod session;
mod urls;

pub use error::FileManagerError;
pub use file::{
    BigQueryKind, ContentFormat, DatalabFile, DatalabFileStatus, DatalabFileType, FileMetadata,
    DIRECTORY_ICON, FILE_ICON, EMPTY_NOTEBOOK_CONTENT,
};
pub use file_id::{DatalabFileId, FileManagerType};
pub use manager::{ensure_source, FileManager};
pub use registry::{FileManagerRegistry, FileManagerRegistryBuilder};
pub use session::{apply_session_status, list_with_session_status, NoSessions, SessionLister};
pub use urls::AppUrls;

/// Convenience alias for results returned by file managers.
pub type Result<T> = std::result::Result<T, FileManagerError>;
