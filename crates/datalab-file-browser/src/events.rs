use datalab_files_core::DatalabFileId;

/// Notifications sent from the browser to its host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserEvent {
    /// A toast for the user. `sticky` toasts stay until dismissed.
    Notification {
        message: String,
        show: bool,
        sticky: bool,
    },
    CurrentFileIdChanged(DatalabFileId),
    /// The displayed listing was replaced. Not sent when a refresh returns the same list.
    FileListChanged { count: usize },
    /// The host should open this URL in a new tab or window.
    OpenUrl(String),
}

impl BrowserEvent {
    pub fn notification(message: impl Into<String>) -> Self {
        Self::Notification {
            message: message.into(),
            show: true,
            sticky: false,
        }
    }
}
