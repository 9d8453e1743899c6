//! In-memory file manager and scripted dialogs shared by the browser tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use datalab_file_browser::{
    BrowserEvent, BrowserSettings, ConfirmOptions, DialogService, DirectoryPickerOptions,
    FileBrowser, InputDialogOptions,
};
use datalab_files_core::{
    DatalabFile, DatalabFileId, DatalabFileType, FileManager, FileManagerError,
    FileManagerRegistry, FileManagerType,
};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::Notify;

pub const ROOT: &str = "/";

fn name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or(ROOT)
}

fn join(container: &str, name: &str) -> String {
    if container == ROOT {
        name.to_string()
    } else {
        format!("{}/{}", container, name)
    }
}

/// A backend whose whole namespace lives in a map from directory path to children.
pub struct MockManager {
    manager_type: FileManagerType,
    tree: Mutex<HashMap<String, Vec<DatalabFile>>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    failing_deletes: Mutex<HashSet<String>>,
    failing_paths: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
    list_calls: AtomicUsize,
}

impl MockManager {
    pub fn new(manager_type: FileManagerType) -> Self {
        Self {
            manager_type,
            tree: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            failing_deletes: Mutex::new(HashSet::new()),
            failing_paths: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            list_calls: AtomicUsize::new(0),
        }
    }

    pub fn id(&self, path: &str) -> DatalabFileId {
        DatalabFileId::new(path, self.manager_type)
    }

    pub fn node(&self, path: &str, file_type: DatalabFileType) -> DatalabFile {
        let name = if path == ROOT { ROOT } else { name_of(path) };
        DatalabFile::new(self.id(path), name, file_type)
    }

    /// Add an item under its parent directory.
    pub fn add(&self, path: &str, file_type: DatalabFileType) {
        let node = self.node(path, file_type);
        let mut tree = self.tree.lock().unwrap();
        tree.entry(parent_of(path).to_string()).or_default().push(node);
        if file_type == DatalabFileType::Directory {
            tree.entry(path.to_string()).or_default();
        }
    }

    pub fn with_dir(self, path: &str) -> Self {
        self.add(path, DatalabFileType::Directory);
        self
    }

    pub fn with_file(self, path: &str) -> Self {
        self.add(path, DatalabFileType::File);
        self
    }

    pub fn with_notebook(self, path: &str) -> Self {
        self.add(path, DatalabFileType::Notebook);
        self
    }

    /// Hold every listing of `path` until the returned gate is notified.
    pub fn gate(&self, path: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(path.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn fail_delete(&self, path: &str) {
        self.failing_deletes.lock().unwrap().insert(path.to_string());
    }

    /// Make full-path lookups of `path` fail as if it had been removed.
    pub fn fail_path(&self, path: &str) {
        self.failing_paths.lock().unwrap().insert(path.to_string());
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Mutating calls seen so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl FileManager for MockManager {
    fn manager_type(&self) -> FileManagerType {
        self.manager_type
    }

    async fn get(&self, file_id: &DatalabFileId) -> Result<DatalabFile, FileManagerError> {
        if file_id.path == ROOT {
            return Ok(self.node(ROOT, DatalabFileType::Directory));
        }
        self.tree
            .lock()
            .unwrap()
            .get(parent_of(&file_id.path))
            .and_then(|children| children.iter().find(|f| &f.id == file_id).cloned())
            .ok_or_else(|| FileManagerError::NotFound(file_id.path.clone()))
    }

    async fn get_string_content(&self, file_id: &DatalabFileId) -> Result<String, FileManagerError> {
        Ok(format!("content of {}", file_id.path))
    }

    async fn get_root_file(&self) -> Result<DatalabFile, FileManagerError> {
        Ok(self.node(ROOT, DatalabFileType::Directory))
    }

    async fn save_text(&self, file: &DatalabFile, text: &str) -> Result<DatalabFile, FileManagerError> {
        let format = file.format.map(|f| f.as_str()).unwrap_or("none");
        self.record(format!("save {} {} {}", file.id.path, format, text));
        Ok(file.clone())
    }

    async fn list(&self, container_id: &DatalabFileId) -> Result<Vec<DatalabFile>, FileManagerError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gates.lock().unwrap().get(&container_id.path).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(self
            .tree
            .lock()
            .unwrap()
            .get(&container_id.path)
            .cloned()
            .unwrap_or_default())
    }

    async fn create(
        &self,
        file_type: DatalabFileType,
        container_id: Option<&DatalabFileId>,
        name: Option<&str>,
    ) -> Result<DatalabFile, FileManagerError> {
        let container = container_id.map(|id| id.path.as_str()).unwrap_or(ROOT);
        let name = name.unwrap_or("Untitled");
        self.record(format!("create {} {} in {}", file_type, name, container));
        let path = join(container, name);
        self.add(&path, file_type);
        Ok(self.node(&path, file_type))
    }

    async fn rename(
        &self,
        old_file_id: &DatalabFileId,
        new_name: &str,
        new_container_id: Option<&DatalabFileId>,
    ) -> Result<DatalabFile, FileManagerError> {
        let file = self.get(old_file_id).await?;
        let into = new_container_id.map(|id| id.path.as_str()).unwrap_or("-");
        self.record(format!("rename {} to {} into {}", old_file_id.path, new_name, into));
        Ok(DatalabFile::new(self.id(new_name), new_name, file.file_type))
    }

    async fn delete(&self, file_id: &DatalabFileId) -> Result<(), FileManagerError> {
        self.record(format!("delete {}", file_id.path));
        if self.failing_deletes.lock().unwrap().contains(&file_id.path) {
            return Err(FileManagerError::Upstream {
                status: 403,
                body: "forbidden".to_string(),
            });
        }
        let mut tree = self.tree.lock().unwrap();
        if let Some(children) = tree.get_mut(parent_of(&file_id.path)) {
            children.retain(|f| &f.id != file_id);
        }
        Ok(())
    }

    async fn copy(
        &self,
        file_id: &DatalabFileId,
        destination_directory_id: &DatalabFileId,
    ) -> Result<DatalabFile, FileManagerError> {
        let file = self.get(file_id).await?;
        self.record(format!("copy {} to {}", file_id.path, destination_directory_id.path));
        let path = join(&destination_directory_id.path, &file.name);
        Ok(self.node(&path, file.file_type))
    }

    async fn get_editor_url(&self, file_id: &DatalabFileId) -> Result<String, FileManagerError> {
        Ok(format!("http://datalab/editor?file={}", file_id))
    }

    async fn get_notebook_url(&self, file_id: &DatalabFileId) -> Result<String, FileManagerError> {
        Ok(format!("http://datalab/notebook?file={}", file_id))
    }

    async fn file_id_to_full_path(
        &self,
        file_id: &DatalabFileId,
    ) -> Result<Vec<DatalabFile>, FileManagerError> {
        if self.failing_paths.lock().unwrap().contains(&file_id.path) {
            return Err(FileManagerError::NotFound(file_id.path.clone()));
        }
        let mut path = vec![self.node(ROOT, DatalabFileType::Directory)];
        let segments = file_id.segments();
        for depth in 1..=segments.len() {
            path.push(self.node(&segments[..depth].join("/"), DatalabFileType::Directory));
        }
        Ok(path)
    }
}

/// Dialogs answered from queues filled by the test. Unscripted prompts are cancelled.
#[derive(Default)]
pub struct ScriptedDialogs {
    inputs: Mutex<VecDeque<Option<String>>>,
    confirms: Mutex<VecDeque<bool>>,
    picks: Mutex<VecDeque<Option<DatalabFileId>>>,
    pub input_prompts: Mutex<Vec<InputDialogOptions>>,
    pub confirm_prompts: Mutex<Vec<ConfirmOptions>>,
    pub picker_prompts: Mutex<Vec<DirectoryPickerOptions>>,
    pub errors: Mutex<Vec<(String, String)>>,
}

impl ScriptedDialogs {
    pub fn answer_input(&self, answer: Option<&str>) {
        self.inputs.lock().unwrap().push_back(answer.map(str::to_string));
    }

    pub fn answer_confirm(&self, answer: bool) {
        self.confirms.lock().unwrap().push_back(answer);
    }

    pub fn answer_pick(&self, answer: Option<DatalabFileId>) {
        self.picks.lock().unwrap().push_back(answer);
    }

    pub fn error_titles(&self) -> Vec<String> {
        self.errors.lock().unwrap().iter().map(|(title, _)| title.clone()).collect()
    }
}

#[async_trait]
impl DialogService for ScriptedDialogs {
    async fn input(&self, options: InputDialogOptions) -> Option<String> {
        self.input_prompts.lock().unwrap().push(options);
        self.inputs.lock().unwrap().pop_front().flatten()
    }

    async fn confirm(&self, options: ConfirmOptions) -> bool {
        self.confirm_prompts.lock().unwrap().push(options);
        self.confirms.lock().unwrap().pop_front().unwrap_or(false)
    }

    async fn pick_directory(&self, options: DirectoryPickerOptions) -> Option<DatalabFileId> {
        self.picker_prompts.lock().unwrap().push(options);
        self.picks.lock().unwrap().pop_front().flatten()
    }

    async fn show_error(&self, title: &str, message: &str) {
        self.errors
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
    }
}

pub struct Harness {
    pub browser: Arc<FileBrowser>,
    pub dialogs: Arc<ScriptedDialogs>,
    pub events: UnboundedReceiver<BrowserEvent>,
}

impl Harness {
    /// Events received since the last call.
    pub fn drain_events(&mut self) -> Vec<BrowserEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn notifications(&mut self) -> Vec<String> {
        self.drain_events()
            .into_iter()
            .filter_map(|event| match event {
                BrowserEvent::Notification { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn file_names(&self) -> Vec<String> {
        self.browser.file_list().into_iter().map(|f| f.name).collect()
    }
}

pub fn setup_browser(managers: Vec<Arc<MockManager>>, settings: BrowserSettings) -> Harness {
    let registry = managers
        .into_iter()
        .fold(FileManagerRegistry::builder(), |builder, manager| {
            builder.register(manager as Arc<dyn FileManager>)
        })
        .build();
    let dialogs = Arc::new(ScriptedDialogs::default());
    let (events_tx, events) = mpsc::unbounded_channel();
    let browser = FileBrowser::new(
        Arc::new(registry),
        Arc::clone(&dialogs) as Arc<dyn DialogService>,
        settings,
        events_tx,
    );
    Harness {
        browser,
        dialogs,
        events,
    }
}

/// A Drive tree with one directory, one notebook and one plain file at the root.
pub fn setup_drive() -> Arc<MockManager> {
    Arc::new(
        MockManager::new(FileManagerType::Drive)
            .with_dir("reports")
            .with_notebook("analysis.ipynb")
            .with_file("notes.txt")
            .with_dir("reports/2024")
            .with_file("reports/2024/q1.csv"),
    )
}
