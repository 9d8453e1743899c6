use std::time::Duration;

use datalab_files_core::{DatalabFileId, FileManagerType};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_UPLOAD_SIZE_WARNING_LIMIT: u64 = 25 * 1024 * 1024;

/// Startup and behaviour settings for a `FileBrowser`.
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Directory to open first. Its backend wins over every other setting.
    pub initial_file_id: Option<DatalabFileId>,
    /// Backend forced by the host, like the `filemanager` query parameter.
    pub file_manager_override: Option<FileManagerType>,
    /// Backend from the app settings.
    pub default_file_manager: Option<FileManagerType>,
    /// Saved Jupyter start directory, possibly in the legacy `/tree/...` form.
    pub startup_path: Option<String>,
    /// Browse-only mode: double clicking a file does nothing.
    pub small: bool,
    pub n_leading_breadcrumbs_to_trim: usize,
    pub refresh_interval: Duration,
    pub upload_size_warning_limit: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            initial_file_id: None,
            file_manager_override: None,
            default_file_manager: None,
            startup_path: None,
            small: false,
            n_leading_breadcrumbs_to_trim: 0,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            upload_size_warning_limit: DEFAULT_UPLOAD_SIZE_WARNING_LIMIT,
        }
    }
}

impl BrowserSettings {
    /// Backend to start with: the initial id's, then the override, then the
    /// app default, then Drive.
    pub fn startup_file_manager_type(&self) -> FileManagerType {
        self.initial_file_id
            .as_ref()
            .map(|id| id.source)
            .or(self.file_manager_override)
            .or(self.default_file_manager)
            .unwrap_or(FileManagerType::Drive)
    }

    /// The Jupyter start directory with the legacy `/tree/` prefix removed.
    pub fn jupyter_startup_path(&self) -> Option<&str> {
        self.startup_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| p.strip_prefix("/tree/").unwrap_or(p))
    }
}
