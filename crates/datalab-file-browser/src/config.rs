use std::time::Duration;

use clap::Args;
use datalab_files_core::FileManagerType;
use datalab_files_github::GITHUB_API_URL;
use datalab_files_google::{BIGQUERY_API_URL, DRIVE_API_URL, DRIVE_UPLOAD_URL, GOOGLE_TOKEN_URL};

use crate::settings::BrowserSettings;

/// Backend endpoints and credentials, from flags or the environment.
#[derive(Args, Debug, Clone)]
pub struct Config {
    /// Root URL of the Datalab app, used to build editor and notebook links
    #[arg(long, default_value = "http://localhost:8081", env = "DATALAB_HOST_ROOT")]
    pub host_root: String,

    /// Backend to browse when no file id is given (bigquery, drive, github, jupyter)
    #[arg(long, env = "DATALAB_DEFAULT_FILE_MANAGER")]
    pub default_file_manager: Option<FileManagerType>,

    /// Jupyter start directory, e.g. `/tree/notebooks`
    #[arg(long, env = "DATALAB_STARTUP_PATH")]
    pub startup_path: Option<String>,

    /// File list refresh interval while focused (seconds)
    #[arg(long, default_value = "60", env = "DATALAB_REFRESH_INTERVAL")]
    pub refresh_interval_secs: u64,

    /// Jupyter notebook server base URL
    #[arg(long, default_value = "http://localhost:8888", env = "JUPYTER_URL")]
    pub jupyter_url: String,

    /// Jupyter server token
    #[arg(long, env = "JUPYTER_TOKEN")]
    pub jupyter_token: Option<String>,

    /// Fixed Google access token (takes precedence over the refresh-token grant)
    #[arg(long, env = "GOOGLE_ACCESS_TOKEN")]
    pub google_access_token: Option<String>,

    /// Google OAuth2 Client ID (for token refresh)
    #[arg(long, env = "GOOGLE_CLIENT_ID")]
    pub google_client_id: Option<String>,

    /// Google OAuth2 Client Secret (for token refresh)
    #[arg(long, env = "GOOGLE_CLIENT_SECRET")]
    pub google_client_secret: Option<String>,

    /// Google OAuth2 refresh token
    #[arg(long, env = "GOOGLE_REFRESH_TOKEN")]
    pub google_refresh_token: Option<String>,

    #[arg(long, default_value = GOOGLE_TOKEN_URL, env = "GOOGLE_TOKEN_URL")]
    pub google_token_url: String,

    #[arg(long, default_value = DRIVE_API_URL, env = "GOOGLE_DRIVE_API_URL")]
    pub drive_api_url: String,

    #[arg(long, default_value = DRIVE_UPLOAD_URL, env = "GOOGLE_DRIVE_UPLOAD_URL")]
    pub drive_upload_url: String,

    #[arg(long, default_value = BIGQUERY_API_URL, env = "GOOGLE_BIGQUERY_API_URL")]
    pub bigquery_api_url: String,

    /// GitHub personal access token (unauthenticated requests are rate limited)
    #[arg(long, env = "GITHUB_TOKEN")]
    pub github_token: Option<String>,

    #[arg(long, default_value = GITHUB_API_URL, env = "GITHUB_API_URL")]
    pub github_api_url: String,
}

impl Config {
    pub fn browser_settings(&self) -> BrowserSettings {
        BrowserSettings {
            default_file_manager: self.default_file_manager,
            startup_path: self.startup_path.clone(),
            refresh_interval: Duration::from_secs(self.refresh_interval_secs.max(1)),
            ..BrowserSettings::default()
        }
    }
}
