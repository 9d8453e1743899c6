use std::sync::Arc;

use async_trait::async_trait;
use datalab_files_core::{FileManagerError, SessionLister};
use tracing::debug;

use crate::client::JupyterClient;

/// Reports notebooks with a live kernel session on the notebook server.
pub struct JupyterSessionClient {
    client: Arc<JupyterClient>,
}

impl JupyterSessionClient {
    pub fn new(client: Arc<JupyterClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SessionLister for JupyterSessionClient {
    async fn list_session_paths(&self) -> Result<Vec<String>, FileManagerError> {
        let sessions = self.client.list_sessions().await?;
        let paths: Vec<String> = sessions
            .into_iter()
            .filter_map(|s| s.into_path())
            .collect();
        debug!("{} running sessions", paths.len());
        Ok(paths)
    }
}
