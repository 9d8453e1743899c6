//! GitHub file manager for Datalab.
//!
//! Browses users, repositories and repository contents through the GitHub
//! REST v3 API. The backend is read-only: every mutation fails with
//! `FileManagerError::Unsupported`.
//!
//! Path format: `user[/repo[/path/in/repo]]`, with `/` as the root.

mod api;
mod manager;

pub use api::{GithubClient, GITHUB_API_URL};
pub use manager::GithubFileManager;
