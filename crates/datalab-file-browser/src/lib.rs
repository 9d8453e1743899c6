//! File browser for Datalab file managers.
//!
//! `FileBrowser` is the navigation state machine behind the file list view:
//! current directory, breadcrumbs, deduplicated and periodically refreshed
//! listings, and dialog-driven mutations. Hosts plug in a `DialogService` and
//! consume `BrowserEvent`s.

pub mod backends;
pub mod browser;
pub mod config;
pub mod dialog;
pub mod error;
pub mod events;
pub mod location;
pub mod settings;

pub use browser::{FileBrowser, MutationOutcome, UploadFile};
pub use config::Config;
pub use dialog::{ConfirmOptions, DialogService, DirectoryPickerOptions, InputDialogOptions};
pub use error::BrowserError;
pub use events::BrowserEvent;
pub use settings::BrowserSettings;
