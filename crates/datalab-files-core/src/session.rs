//! Running-session lookup and listing status enrichment.

use std::collections::HashSet;
use std::future::Future;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::FileManagerError;
use crate::file::{DatalabFile, DatalabFileStatus};

/// Source of the paths of currently running notebook sessions.
#[async_trait]
pub trait SessionLister: Send + Sync {
    async fn list_session_paths(&self) -> Result<Vec<String>, FileManagerError>;
}

/// Session lister for deployments without a notebook server.
pub struct NoSessions;

#[async_trait]
impl SessionLister for NoSessions {
    async fn list_session_paths(&self) -> Result<Vec<String>, FileManagerError> {
        Ok(Vec::new())
    }
}

/// Mark each file Running if its path is in `session_paths`, Idle otherwise.
pub fn apply_session_status(files: &mut [DatalabFile], session_paths: &[String]) {
    let running: HashSet<&str> = session_paths.iter().map(String::as_str).collect();
    for file in files {
        file.status = if running.contains(file.id.path.as_str()) {
            DatalabFileStatus::Running
        } else {
            DatalabFileStatus::Idle
        };
    }
}

/// Run a listing and a session query concurrently and combine them.
///
/// A failed session query is logged and every file is reported Idle; only a
/// failed listing fails the call.
pub async fn list_with_session_status<F>(
    listing: F,
    sessions: &dyn SessionLister,
) -> Result<Vec<DatalabFile>, FileManagerError>
where
    F: Future<Output = Result<Vec<DatalabFile>, FileManagerError>>,
{
    let (files, session_paths) = futures::join!(listing, sessions.list_session_paths());

    let mut files = files?;
    let session_paths = session_paths.unwrap_or_else(|e| {
        warn!("Could not load sessions: {}", e);
        Vec::new()
    });

    apply_session_status(&mut files, &session_paths);
    debug!(
        "Listed {} files against {} running sessions",
        files.len(),
        session_paths.len()
    );
    Ok(files)
}
