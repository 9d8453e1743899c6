//! Registry wiring for every backend the configuration enables.

use std::sync::Arc;

use datalab_files_core::{AppUrls, FileManager, FileManagerRegistry, FileManagerType, SessionLister};
use datalab_files_github::{GithubClient, GithubFileManager};
use datalab_files_google::{
    BigQueryClient, BigQueryFileManager, DriveClient, DriveFileManager, GoogleTokenManager,
    StaticToken, TokenSource,
};
use datalab_files_jupyter::{JupyterClient, JupyterFileManager, JupyterSessionClient};
use tracing::{info, warn};

use crate::config::Config;

/// Token source for the Google backends, if credentials are configured.
fn google_tokens(config: &Config) -> Option<Arc<dyn TokenSource>> {
    if let Some(token) = &config.google_access_token {
        return Some(Arc::new(StaticToken::new(token.clone())) as Arc<dyn TokenSource>);
    }
    match (
        &config.google_client_id,
        &config.google_client_secret,
        &config.google_refresh_token,
    ) {
        (Some(id), Some(secret), Some(refresh)) => Some(Arc::new(GoogleTokenManager::with_token_url(
            config.google_token_url.clone(),
            id.clone(),
            secret.clone(),
            refresh.clone(),
        )) as Arc<dyn TokenSource>),
        _ => None,
    }
}

/// Build the registry. Jupyter and GitHub are always available; Drive and
/// BigQuery only with Google credentials. Jupyter sessions drive the running
/// status of every listing.
pub fn build_registry(config: &Config) -> FileManagerRegistry {
    let urls = AppUrls::new(config.host_root.clone());
    let jupyter = Arc::new(JupyterClient::new(
        config.jupyter_url.clone(),
        config.jupyter_token.clone(),
    ));
    let sessions: Arc<dyn SessionLister> = Arc::new(JupyterSessionClient::new(jupyter.clone()));

    let mut builder = FileManagerRegistry::builder();

    {
        let (jupyter, sessions, urls) = (jupyter.clone(), sessions.clone(), urls.clone());
        builder = builder.register_with(FileManagerType::Jupyter, move || {
            Arc::new(JupyterFileManager::new(jupyter.clone(), sessions.clone(), urls.clone()))
                as Arc<dyn FileManager>
        });
    }

    {
        let (api_url, token, urls) = (
            config.github_api_url.clone(),
            config.github_token.clone(),
            urls.clone(),
        );
        builder = builder.register_with(FileManagerType::Github, move || {
            let client = GithubClient::with_base_url(api_url.clone(), token.clone());
            Arc::new(GithubFileManager::new(client, urls.clone())) as Arc<dyn FileManager>
        });
    }

    match google_tokens(config) {
        Some(tokens) => {
            let (drive_api, drive_upload, tokens_for_drive) = (
                config.drive_api_url.clone(),
                config.drive_upload_url.clone(),
                tokens.clone(),
            );
            builder = builder.register_with(FileManagerType::Drive, move || {
                let client = DriveClient::with_base_urls(
                    drive_api.clone(),
                    drive_upload.clone(),
                    tokens_for_drive.clone(),
                );
                Arc::new(DriveFileManager::new(Arc::new(client), sessions.clone(), urls.clone()))
                    as Arc<dyn FileManager>
            });

            let bigquery_api = config.bigquery_api_url.clone();
            builder = builder.register_with(FileManagerType::BigQuery, move || {
                let client = BigQueryClient::with_base_url(bigquery_api.clone(), tokens.clone());
                Arc::new(BigQueryFileManager::new(Arc::new(client))) as Arc<dyn FileManager>
            });
        }
        None => warn!("No Google credentials configured; drive and bigquery are unavailable"),
    }

    let registry = builder.build();
    info!("Registered file managers: {:?}", registry.registered_types());
    registry
}
