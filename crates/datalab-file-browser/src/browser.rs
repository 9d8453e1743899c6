//! Navigation state machine behind the file browser view.
//!
//! A `FileBrowser` owns the current directory, the path leading to it, the
//! displayed listing and the selection. It talks to backends only through the
//! `FileManagerRegistry`, to the user only through `DialogService`, and reports
//! changes to its host as `BrowserEvent`s.
//!
//! Every navigation bumps a generation counter. Listings and full paths carry
//! the generation they were requested for and are dropped if the user has
//! moved on by the time they arrive. Concurrent refreshes within one
//! generation share a single in-flight listing.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use datalab_files_core::{
    ContentFormat, DatalabFile, DatalabFileId, DatalabFileStatus, DatalabFileType, FileManager,
    FileManagerError, FileManagerRegistry, FileManagerType,
};
use futures::future::{join_all, try_join_all, BoxFuture, FutureExt, Shared};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::dialog::{ConfirmOptions, DialogService, DirectoryPickerOptions, InputDialogOptions};
use crate::error::BrowserError;
use crate::events::BrowserEvent;
use crate::settings::BrowserSettings;

/// Names listed by the delete confirmation before it summarizes the rest.
const DELETE_LIST_LIMIT: usize = 10;

type ListingFetch = Shared<BoxFuture<'static, Result<(), FileManagerError>>>;

/// How a dialog-driven operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The dialog was dismissed, or the selection did not fit the operation.
    Cancelled,
    /// The backend call succeeded; a notification was sent and the list refreshed.
    Completed,
    /// The backend call failed and an error dialog was shown.
    Failed,
}

/// A local file to upload into the current directory.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub data: Vec<u8>,
}

struct InFlight {
    generation: u64,
    fetch: ListingFetch,
}

#[derive(Default)]
struct BrowserState {
    file_manager: Option<Arc<dyn FileManager>>,
    current_file_id: Option<DatalabFileId>,
    current_path: Vec<DatalabFile>,
    file_list: Vec<DatalabFile>,
    selected_indices: Vec<usize>,
    selected_file: Option<DatalabFile>,
    in_flight: Option<InFlight>,
    refresh_task: Option<JoinHandle<()>>,
}

pub struct FileBrowser {
    registry: Arc<FileManagerRegistry>,
    dialogs: Arc<dyn DialogService>,
    events: UnboundedSender<BrowserEvent>,
    settings: BrowserSettings,
    state: Mutex<BrowserState>,
    generation: AtomicU64,
    document_focused: AtomicBool,
}

impl FileBrowser {
    pub fn new(
        registry: Arc<FileManagerRegistry>,
        dialogs: Arc<dyn DialogService>,
        settings: BrowserSettings,
        events: UnboundedSender<BrowserEvent>,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            dialogs,
            events,
            settings,
            state: Mutex::new(BrowserState::default()),
            generation: AtomicU64::new(0),
            document_focused: AtomicBool::new(true),
        })
    }

    fn state(&self) -> MutexGuard<'_, BrowserState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: BrowserEvent) {
        if self.events.send(event).is_err() {
            debug!("Browser event dropped, receiver is gone");
        }
    }

    pub fn settings(&self) -> &BrowserSettings {
        &self.settings
    }

    pub fn current_file_id(&self) -> Option<DatalabFileId> {
        self.state().current_file_id.clone()
    }

    pub fn current_path(&self) -> Vec<DatalabFile> {
        self.state().current_path.clone()
    }

    pub fn file_list(&self) -> Vec<DatalabFile> {
        self.state().file_list.clone()
    }

    /// The selected file when exactly one is selected.
    pub fn selected_file(&self) -> Option<DatalabFile> {
        self.state().selected_file.clone()
    }

    pub fn file_manager_type(&self) -> Option<FileManagerType> {
        self.state().file_manager.as_ref().map(|m| m.manager_type())
    }

    /// Whether a listing for the current directory is outstanding.
    pub fn is_fetching(&self) -> bool {
        let generation = self.generation.load(Ordering::SeqCst);
        self.state()
            .in_flight
            .as_ref()
            .is_some_and(|f| f.generation == generation)
    }

    pub fn is_auto_refreshing(&self) -> bool {
        self.state().refresh_task.is_some()
    }

    /// Names shown in the breadcrumb bar. The root and any trimmed leading
    /// entries are left out.
    pub fn breadcrumbs(&self) -> Vec<String> {
        self.state()
            .current_path
            .iter()
            .skip(1 + self.settings.n_leading_breadcrumbs_to_trim)
            .map(|f| f.name.clone())
            .collect()
    }

    /// Pick the backend and start directory, load it and start auto refresh.
    ///
    /// Failures are shown in an "Error loading file" dialog and returned.
    #[instrument(skip(self), level = "debug")]
    pub async fn ready(self: &Arc<Self>) -> Result<(), BrowserError> {
        match self.load_startup_path().await {
            Ok(()) => {
                self.focus_handler().await;
                Ok(())
            }
            Err(e) => {
                error!("Error loading file: {}", e);
                self.dialogs.show_error("Error loading file", &e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn load_startup_path(self: &Arc<Self>) -> Result<(), BrowserError> {
        let manager_type = self.settings.startup_file_manager_type();
        let manager = self.registry.get(manager_type)?;
        info!("File browser starting with the {} file manager", manager_type);

        let start_id = match (&self.settings.initial_file_id, manager_type) {
            (Some(id), _) => id.clone(),
            (None, FileManagerType::Jupyter) => match self.settings.jupyter_startup_path() {
                Some(path) => DatalabFileId::new(path, FileManagerType::Jupyter),
                None => manager.get_root_file().await?.id,
            },
            (None, _) => manager.get_root_file().await?.id,
        };
        self.change_directory(start_id).await?;
        Ok(())
    }

    /// Navigate to `file_id`, switching backend if needed, and list it.
    #[instrument(skip(self), level = "debug")]
    pub async fn set_current_file_id(self: &Arc<Self>, file_id: DatalabFileId) -> Result<(), BrowserError> {
        if self.change_directory(file_id).await?.is_some() {
            self.fetch_file_list().await?;
        }
        Ok(())
    }

    /// Make `file_id` current and load its full path. Returns the new
    /// generation, or `None` when a later navigation superseded this one.
    async fn change_directory(self: &Arc<Self>, file_id: DatalabFileId) -> Result<Option<u64>, BrowserError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let current = self
            .state()
            .file_manager
            .as_ref()
            .filter(|m| m.manager_type() == file_id.source)
            .cloned();
        let manager = match current {
            Some(manager) => manager,
            None => {
                debug!("Switching to the {} file manager", file_id.source);
                self.registry.get(file_id.source)?
            }
        };

        // Nothing changes until the full path resolves.
        let full_path = manager.file_id_to_full_path(&file_id).await?;
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("Dropping full path of {}, navigation moved on", file_id);
            return Ok(None);
        }
        {
            let mut state = self.state();
            state.file_manager = Some(manager);
            state.current_file_id = Some(file_id.clone());
            state.current_path = full_path;
        }
        self.emit(BrowserEvent::CurrentFileIdChanged(file_id));
        Ok(Some(generation))
    }

    /// List the current directory, joining a listing already in flight for
    /// the same navigation.
    pub async fn fetch_file_list(self: &Arc<Self>) -> Result<(), BrowserError> {
        let fetch = {
            let mut state = self.state();
            let generation = self.generation.load(Ordering::SeqCst);
            let joined = state
                .in_flight
                .as_ref()
                .filter(|f| f.generation == generation)
                .map(|f| f.fetch.clone());
            match joined {
                Some(fetch) => {
                    debug!("Joining in-flight listing");
                    fetch
                }
                None => {
                    let file_id = state.current_file_id.clone().ok_or(BrowserError::NoCurrentFile)?;
                    let manager = state.file_manager.clone().ok_or(BrowserError::NoCurrentFile)?;
                    let fetch = self.spawn_listing(generation, manager, file_id);
                    state.in_flight = Some(InFlight {
                        generation,
                        fetch: fetch.clone(),
                    });
                    fetch
                }
            }
        };
        fetch.await.map_err(BrowserError::from)
    }

    fn spawn_listing(
        self: &Arc<Self>,
        generation: u64,
        manager: Arc<dyn FileManager>,
        file_id: DatalabFileId,
    ) -> ListingFetch {
        let browser = Arc::clone(self);
        let task = tokio::spawn(async move {
            let result = manager.list(&file_id).await;
            browser.finish_listing(generation, result)
        });
        async move {
            task.await.unwrap_or_else(|e| {
                Err(FileManagerError::InvalidOperation(format!("Listing task failed: {}", e)))
            })
        }
        .boxed()
        .shared()
    }

    fn finish_listing(
        &self,
        generation: u64,
        result: Result<Vec<DatalabFile>, FileManagerError>,
    ) -> Result<(), FileManagerError> {
        let mut state = self.state();
        if state.in_flight.as_ref().is_some_and(|f| f.generation == generation) {
            state.in_flight = None;
        }
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("Dropping listing for abandoned generation {}", generation);
            return Ok(());
        }

        let files = result?;
        if files == state.file_list {
            return Ok(());
        }
        let count = files.len();
        state.file_list = files;
        state.selected_indices.clear();
        state.selected_file = None;
        drop(state);

        self.emit(BrowserEvent::FileListChanged { count });
        Ok(())
    }

    async fn refresh_logged(self: &Arc<Self>) {
        if let Err(e) = self.fetch_file_list().await {
            error!("Error getting list of files: {}", e);
        }
    }

    /// Open a listed item: directories are entered, notebooks and files are
    /// opened through `OpenUrl`. In small mode only directories react.
    #[instrument(skip(self), level = "debug")]
    pub async fn handle_double_click(self: &Arc<Self>, index: usize) -> Result<(), BrowserError> {
        let (file, manager) = {
            let state = self.state();
            let file = state
                .file_list
                .get(index)
                .cloned()
                .ok_or(BrowserError::IndexOutOfRange(index))?;
            let manager = state.file_manager.clone().ok_or(BrowserError::NoCurrentFile)?;
            (file, manager)
        };
        if self.settings.small && !file.is_directory() {
            return Ok(());
        }

        let url = match file.file_type {
            DatalabFileType::Directory => return self.set_current_file_id(file.id).await,
            DatalabFileType::Notebook => manager.get_notebook_url(&file.id).await?,
            DatalabFileType::File => manager.get_editor_url(&file.id).await?,
        };
        self.emit(BrowserEvent::OpenUrl(url));
        Ok(())
    }

    pub fn set_selected_indices(&self, indices: Vec<usize>) {
        let mut state = self.state();
        let selected = match indices.as_slice() {
            [index] => state.file_list.get(*index).cloned(),
            _ => None,
        };
        state.selected_file = selected;
        state.selected_indices = indices;
    }

    pub async fn crumb_clicked(self: &Arc<Self>, index: usize) -> Result<(), BrowserError> {
        let target = self.path_entry(index + 1 + self.settings.n_leading_breadcrumbs_to_trim)?;
        self.set_current_file_id(target).await
    }

    pub async fn root_clicked(self: &Arc<Self>) -> Result<(), BrowserError> {
        let target = self.path_entry(self.settings.n_leading_breadcrumbs_to_trim)?;
        self.set_current_file_id(target).await
    }

    fn path_entry(&self, index: usize) -> Result<DatalabFileId, BrowserError> {
        self.state()
            .current_path
            .get(index)
            .map(|f| f.id.clone())
            .ok_or(BrowserError::IndexOutOfRange(index))
    }

    fn current(&self) -> Result<(Arc<dyn FileManager>, DatalabFileId), BrowserError> {
        let state = self.state();
        match (&state.file_manager, &state.current_file_id) {
            (Some(manager), Some(id)) => Ok((Arc::clone(manager), id.clone())),
            _ => Err(BrowserError::NoCurrentFile),
        }
    }

    fn selected_files(&self) -> Vec<DatalabFile> {
        let state = self.state();
        state
            .selected_indices
            .iter()
            .filter_map(|&i| state.file_list.get(i).cloned())
            .collect()
    }

    async fn finish_mutation(
        self: &Arc<Self>,
        result: Result<String, FileManagerError>,
        error_title: &str,
    ) -> MutationOutcome {
        match result {
            Ok(message) => {
                info!("{}", message);
                self.emit(BrowserEvent::notification(message));
                self.refresh_logged().await;
                MutationOutcome::Completed
            }
            Err(e) => {
                warn!("{}: {}", error_title, e);
                self.dialogs.show_error(error_title, &e.to_string()).await;
                MutationOutcome::Failed
            }
        }
    }

    pub async fn create_new_notebook(self: &Arc<Self>) -> Result<MutationOutcome, BrowserError> {
        self.create_new_item(DatalabFileType::Notebook).await
    }

    pub async fn create_new_file(self: &Arc<Self>) -> Result<MutationOutcome, BrowserError> {
        self.create_new_item(DatalabFileType::File).await
    }

    pub async fn create_new_directory(self: &Arc<Self>) -> Result<MutationOutcome, BrowserError> {
        self.create_new_item(DatalabFileType::Directory).await
    }

    async fn create_new_item(self: &Arc<Self>, file_type: DatalabFileType) -> Result<MutationOutcome, BrowserError> {
        let (manager, current_id) = self.current()?;
        let options = InputDialogOptions {
            title: format!("New {}", file_type),
            input_label: "Name".to_string(),
            input_value: None,
            ok_label: "Create".to_string(),
        };
        let Some(mut name) = self.dialogs.input(options).await else {
            return Ok(MutationOutcome::Cancelled);
        };
        if file_type == DatalabFileType::Notebook && !name.ends_with(".ipynb") {
            name.push_str(".ipynb");
        }

        let result = manager
            .create(file_type, Some(&current_id), Some(&name))
            .await
            .map(|_| format!("Created {}.", name));
        Ok(self.finish_mutation(result, "Error creating item").await)
    }

    /// Open the single selected item in the text editor.
    pub async fn open_selected_in_editor(&self) -> Result<(), BrowserError> {
        let Some(file) = self.selected_file() else {
            return Ok(());
        };
        let (manager, _) = self.current()?;
        let url = manager.get_editor_url(&file.id).await?;
        self.emit(BrowserEvent::OpenUrl(url));
        Ok(())
    }

    pub async fn rename_selected(self: &Arc<Self>) -> Result<MutationOutcome, BrowserError> {
        let Some(file) = self.selected_file() else {
            return Ok(MutationOutcome::Cancelled);
        };
        let (manager, _) = self.current()?;
        let options = InputDialogOptions {
            title: format!("Rename {}", file.file_type),
            input_label: "New name".to_string(),
            input_value: Some(file.name.clone()),
            ok_label: "Rename".to_string(),
        };
        let Some(new_name) = self.dialogs.input(options).await else {
            return Ok(MutationOutcome::Cancelled);
        };

        let result = manager
            .rename(&file.id, &new_name, None)
            .await
            .map(|_| format!("Renamed {} to {}.", file.name, new_name));
        Ok(self.finish_mutation(result, "Error renaming item").await)
    }

    /// Delete every selected item after confirmation.
    ///
    /// All deletions run even if some fail. On any failure one error dialog
    /// is shown and the listing is left as is.
    pub async fn delete_selected(self: &Arc<Self>) -> Result<MutationOutcome, BrowserError> {
        let files = self.selected_files();
        if files.is_empty() {
            return Ok(MutationOutcome::Cancelled);
        }
        let (manager, _) = self.current()?;

        let title = match files.as_slice() {
            [file] => format!("Delete {}", file.file_type),
            _ => format!("Delete {} items", files.len()),
        };
        let options = ConfirmOptions {
            title,
            message: delete_confirmation_message(&files),
            ok_label: "Delete".to_string(),
        };
        if !self.dialogs.confirm(options).await {
            return Ok(MutationOutcome::Cancelled);
        }

        let results = join_all(files.iter().map(|f| manager.delete(&f.id))).await;
        let failures: Vec<FileManagerError> = results.into_iter().filter_map(Result::err).collect();
        let result = match failures.into_iter().next() {
            Some(first) => Err(first),
            None if files.len() == 1 => Ok("Deleted 1 file.".to_string()),
            None => Ok(format!("Deleted {} files.", files.len())),
        };
        Ok(self.finish_mutation(result, "Error deleting item").await)
    }

    pub async fn copy_selected(self: &Arc<Self>) -> Result<MutationOutcome, BrowserError> {
        let Some(file) = self.selected_file() else {
            return Ok(MutationOutcome::Cancelled);
        };
        let (manager, _) = self.current()?;
        let Some(destination) = self
            .dialogs
            .pick_directory(directory_picker("Copy Item", "Copy Here"))
            .await
        else {
            return Ok(MutationOutcome::Cancelled);
        };

        let result = manager
            .copy(&file.id, &destination)
            .await
            .map(|_| "Copied item.".to_string());
        Ok(self.finish_mutation(result, "Error copying item").await)
    }

    /// Move the single selected item. Moving is a rename into another container.
    pub async fn move_selected(self: &Arc<Self>) -> Result<MutationOutcome, BrowserError> {
        let Some(file) = self.selected_file() else {
            return Ok(MutationOutcome::Cancelled);
        };
        let (manager, _) = self.current()?;
        let Some(destination) = self
            .dialogs
            .pick_directory(directory_picker("Move Item", "Move Here"))
            .await
        else {
            return Ok(MutationOutcome::Cancelled);
        };

        let result = manager
            .rename(&file.id, &file.name, Some(&destination))
            .await
            .map(|_| "Moved item.".to_string());
        Ok(self.finish_mutation(result, "Error moving item").await)
    }

    /// Upload local files into the current directory.
    ///
    /// Each file is created empty and then saved with base64 content. Files
    /// over the size warning limit need confirmation first.
    #[instrument(skip(self, files), level = "debug", fields(count = files.len()))]
    pub async fn upload(self: &Arc<Self>, files: Vec<UploadFile>) -> Result<MutationOutcome, BrowserError> {
        if files.is_empty() {
            return Ok(MutationOutcome::Cancelled);
        }
        let (manager, current_id) = self.current()?;

        let limit = self.settings.upload_size_warning_limit;
        if files.iter().any(|f| f.data.len() as u64 > limit) {
            let subject = if files.len() > 1 {
                "Some of the files you selected are"
            } else {
                "The file you selected is"
            };
            let options = ConfirmOptions {
                title: "Warning: Large File".to_string(),
                message: format!(
                    "{} larger than {}MB. The upload may take a long time.",
                    subject,
                    limit / (1024 * 1024)
                ),
                ok_label: "Upload Anyway".to_string(),
            };
            if !self.dialogs.confirm(options).await {
                return Ok(MutationOutcome::Cancelled);
            }
        }

        let uploads = files.iter().map(|file| {
            let manager = &manager;
            let current_id = &current_id;
            async move {
                let mut created = manager
                    .create(DatalabFileType::File, Some(current_id), Some(&file.name))
                    .await?;
                created.format = Some(ContentFormat::Base64);
                created.name = file.name.clone();
                created.status = DatalabFileStatus::Idle;
                manager.save_text(&created, &STANDARD.encode(&file.data)).await
            }
        });
        let result = try_join_all(uploads).await.map(|_| match files.as_slice() {
            [file] => format!("{} uploaded successfully.", file.name),
            _ => format!("{} files uploaded successfully.", files.len()),
        });
        Ok(self.finish_mutation(result, "Error uploading file").await)
    }

    /// The view gained focus: start periodic refresh if it is not running and
    /// refresh right away.
    pub async fn focus_handler(self: &Arc<Self>) {
        {
            let mut state = self.state();
            if state.refresh_task.is_none() {
                state.refresh_task = Some(self.spawn_refresh_loop());
            }
        }
        self.refresh_logged().await;
    }

    /// The view lost focus: stop periodic refresh.
    pub fn blur_handler(&self) {
        if let Some(task) = self.state().refresh_task.take() {
            debug!("Stopping file list auto refresh");
            task.abort();
        }
    }

    /// Whether the host document has focus. Periodic refreshes are skipped while it does not.
    pub fn set_document_focused(&self, focused: bool) {
        self.document_focused.store(focused, Ordering::SeqCst);
    }

    fn spawn_refresh_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let browser = Arc::downgrade(self);
        let period = self.settings.refresh_interval;
        debug!("Starting file list auto refresh every {:?}", period);

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(browser) = browser.upgrade() else {
                    break;
                };
                if browser.document_focused.load(Ordering::SeqCst) {
                    browser.refresh_logged().await;
                }
            }
        })
    }
}

impl Drop for FileBrowser {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = state.refresh_task.take() {
            task.abort();
        }
    }
}

fn directory_picker(title: &str, ok_label: &str) -> DirectoryPickerOptions {
    DirectoryPickerOptions {
        title: title.to_string(),
        ok_label: ok_label.to_string(),
        big: true,
        with_file_name: false,
    }
}

fn delete_confirmation_message(files: &[DatalabFile]) -> String {
    let mut message = String::from("Are you sure you want to delete:\n");
    for file in files.iter().take(DELETE_LIST_LIMIT) {
        message.push_str("- ");
        message.push_str(&file.name);
        message.push('\n');
    }
    if files.len() > DELETE_LIST_LIMIT {
        message.push_str(&format!("+ {} more.", files.len() - DELETE_LIST_LIMIT));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(n: usize) -> Vec<DatalabFile> {
        (0..n)
            .map(|i| {
                DatalabFile::new(
                    DatalabFileId::new(format!("f{}", i), FileManagerType::Drive),
                    format!("file{}.txt", i),
                    DatalabFileType::File,
                )
            })
            .collect()
    }

    #[test]
    fn test_delete_message_lists_all_when_short() {
        let message = delete_confirmation_message(&files(2));
        assert_eq!(
            message,
            "Are you sure you want to delete:\n- file0.txt\n- file1.txt\n"
        );
    }

    #[test]
    fn test_delete_message_truncates() {
        let message = delete_confirmation_message(&files(13));
        assert!(message.contains("- file9.txt\n"));
        assert!(!message.contains("file10.txt"));
        assert!(message.ends_with("+ 3 more."));
    }
}
