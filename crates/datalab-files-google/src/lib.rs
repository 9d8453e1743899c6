//! Google-hosted file managers for Datalab.
//!
//! - `DriveFileManager`: Google Drive v3 files API (full read/write)
//! - `BigQueryFileManager`: BigQuery v2 metadata API (read-only browsing of
//!   projects, datasets and tables)
//!
//! Both authenticate with a bearer token obtained from a `TokenSource`.

mod bigquery;
mod bigquery_api;
mod drive;
mod drive_api;
mod http;
mod token_manager;

pub use bigquery::BigQueryFileManager;
pub use bigquery_api::{BigQueryClient, BIGQUERY_API_URL};
pub use drive::DriveFileManager;
pub use drive_api::{DriveClient, DriveFile, DRIVE_API_URL, DRIVE_UPLOAD_URL, FOLDER_MIME_TYPE};
pub use token_manager::{GoogleTokenManager, StaticToken, TokenSource, GOOGLE_TOKEN_URL};
