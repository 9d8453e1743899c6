//! Modal dialogs the browser asks its host to show.

use async_trait::async_trait;
use datalab_files_core::DatalabFileId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDialogOptions {
    pub title: String,
    pub input_label: String,
    /// Prefilled value, e.g. the current name when renaming.
    pub input_value: Option<String>,
    pub ok_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmOptions {
    pub title: String,
    pub message: String,
    pub ok_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryPickerOptions {
    pub title: String,
    pub ok_label: String,
    pub big: bool,
    pub with_file_name: bool,
}

/// Host-provided modal dialogs.
///
/// Every method resolves when the user closes the dialog.
#[async_trait]
pub trait DialogService: Send + Sync {
    /// Ask for a line of text. `None` when cancelled or left empty.
    async fn input(&self, options: InputDialogOptions) -> Option<String>;

    /// Ask the user to confirm. `false` when cancelled.
    async fn confirm(&self, options: ConfirmOptions) -> bool;

    /// Ask for a destination directory. `None` when cancelled.
    async fn pick_directory(&self, options: DirectoryPickerOptions) -> Option<DatalabFileId>;

    async fn show_error(&self, title: &str, message: &str);
}
