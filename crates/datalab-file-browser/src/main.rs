use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Weak};

use anyhow::Context;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::signal;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use datalab_file_browser::backends::build_registry;
use datalab_file_browser::location::{file_id_from_query, file_manager_from_query};
use datalab_file_browser::{
    BrowserError, BrowserEvent, BrowserSettings, Config, ConfirmOptions, DialogService,
    DirectoryPickerOptions, FileBrowser, InputDialogOptions, UploadFile,
};
use datalab_files_core::{DatalabFile, DatalabFileId, FileManagerRegistry, FileManagerType};

#[derive(Parser, Debug)]
#[command(name = "datalab-files")]
#[command(about = "Browse Datalab file managers (Jupyter, Drive, GitHub, BigQuery) from the terminal")]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a directory, e.g. `ls jupyter:/` or `ls github:octocat`
    Ls { file_id: DatalabFileId },
    /// Print the content of a file
    Cat { file_id: DatalabFileId },
    /// Print the chain of directories from the root down to a file
    Path { file_id: DatalabFileId },
    /// Print the URL that opens a file in Datalab
    Url {
        file_id: DatalabFileId,
        /// Open in the text editor instead of the notebook view
        #[arg(long)]
        editor: bool,
    },
    /// Interactive browser
    Browse {
        /// Directory to start in
        #[arg(long)]
        file: Option<DatalabFileId>,
        /// Backend to start with when no file is given
        #[arg(long)]
        filemanager: Option<FileManagerType>,
        /// App URL query string carrying `file` and `filemanager` parameters
        #[arg(long)]
        query: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so `cat` output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let registry = Arc::new(build_registry(&cli.config));

    match cli.command {
        Command::Ls { file_id } => {
            let manager = registry.for_file(&file_id)?;
            let files = manager
                .list(&file_id)
                .await
                .with_context(|| format!("Error getting list of files in {}", file_id))?;
            print_files(&files);
        }
        Command::Cat { file_id } => {
            let manager = registry.for_file(&file_id)?;
            let content = manager.get_string_content(&file_id).await?;
            print!("{}", content);
        }
        Command::Path { file_id } => {
            let manager = registry.for_file(&file_id)?;
            let full_path = manager.file_id_to_full_path(&file_id).await?;
            for file in full_path {
                println!("{}\t{}", file.id, file.name);
            }
        }
        Command::Url { file_id, editor } => {
            let manager = registry.for_file(&file_id)?;
            let url = if editor {
                manager.get_editor_url(&file_id).await?
            } else {
                manager.get_notebook_url(&file_id).await?
            };
            println!("{}", url);
        }
        Command::Browse {
            file,
            filemanager,
            query,
        } => {
            let mut settings = cli.config.browser_settings();
            settings.initial_file_id = file;
            settings.file_manager_override = filemanager;
            if let Some(query) = query {
                if settings.initial_file_id.is_none() {
                    settings.initial_file_id = file_id_from_query(&query)?;
                }
                if settings.file_manager_override.is_none() {
                    settings.file_manager_override = file_manager_from_query(&query)?;
                }
            }
            browse(registry, settings).await?;
        }
    }
    Ok(())
}

fn print_files(files: &[DatalabFile]) {
    for (i, file) in files.iter().enumerate() {
        println!(
            "{:>3}  {:<9} {:<8} {}",
            i,
            file.file_type.to_string(),
            file.status.to_string(),
            file.name
        );
    }
}

type InputLines = Arc<Mutex<Lines<BufReader<Stdin>>>>;

/// Dialogs answered on the terminal, sharing stdin with the command prompt.
struct TerminalDialogs {
    lines: InputLines,
}

impl TerminalDialogs {
    async fn prompt(&self, text: &str) -> Option<String> {
        eprint!("{}", text);
        let _ = std::io::stderr().flush();
        match self.lines.lock().await.next_line().await {
            Ok(Some(line)) => Some(line.trim().to_string()),
            Ok(None) => None,
            Err(e) => {
                error!("Failed to read from stdin: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl DialogService for TerminalDialogs {
    async fn input(&self, options: InputDialogOptions) -> Option<String> {
        let text = match &options.input_value {
            Some(value) => format!("{} - {} [{}]: ", options.title, options.input_label, value),
            None => format!("{} - {}: ", options.title, options.input_label),
        };
        self.prompt(&text).await.filter(|answer| !answer.is_empty())
    }

    async fn confirm(&self, options: ConfirmOptions) -> bool {
        eprintln!("{}", options.message);
        let answer = self
            .prompt(&format!("{} ({}) [y/N]: ", options.title, options.ok_label))
            .await;
        matches!(answer.as_deref(), Some("y" | "Y" | "yes"))
    }

    async fn pick_directory(&self, options: DirectoryPickerOptions) -> Option<DatalabFileId> {
        let answer = self
            .prompt(&format!("{} - destination directory id: ", options.title))
            .await?;
        match DatalabFileId::from_query_string(&answer) {
            Ok(id) => Some(id),
            Err(e) => {
                eprintln!("{}", e);
                None
            }
        }
    }

    async fn show_error(&self, title: &str, message: &str) {
        eprintln!("{}: {}", title, message);
    }
}

const BROWSE_HELP: &str = "\
commands:
  ls                    show the current listing
  cd <n>                open item n (enter directory, or print its URL)
  crumb <n> | root      jump to breadcrumb n or to the root
  sel <n> [<n>...]      select items
  edit                  print the editor URL of the selected item
  new notebook|file|dir create an item in the current directory
  rename | rm | cp | mv act on the selection
  upload <path>...      upload local files into the current directory
  refresh               list the current directory again
  focus | blur          start or stop auto refresh
  quit";

async fn browse(
    registry: Arc<FileManagerRegistry>,
    settings: BrowserSettings,
) -> anyhow::Result<()> {
    let lines: InputLines = Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines()));
    let dialogs = Arc::new(TerminalDialogs {
        lines: lines.clone(),
    });
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let browser = FileBrowser::new(registry, dialogs, settings, events_tx);
    tokio::spawn(print_events(Arc::downgrade(&browser), events_rx));

    browser.ready().await?;
    print_location(&browser);

    let mut shutdown_rx = create_shutdown_signal();
    eprintln!("{}", BROWSE_HELP);
    loop {
        eprint!("> ");
        let _ = std::io::stderr().flush();
        let line = tokio::select! {
            line = async { lines.lock().await.next_line().await } => line?,
            _ = shutdown_rx.wait_for(|&v| v) => None,
        };
        let Some(line) = line else { break };

        let words: Vec<&str> = line.split_whitespace().collect();
        let result = match words.as_slice() {
            [] => Ok(()),
            ["quit" | "exit"] => break,
            ["help"] => {
                eprintln!("{}", BROWSE_HELP);
                Ok(())
            }
            ["ls"] => {
                print_location(&browser);
                print_files(&browser.file_list());
                Ok(())
            }
            ["cd", n] => match n.parse() {
                Ok(index) => browser.handle_double_click(index).await,
                Err(_) => usage(&format!("not an index: {}", n)),
            },
            ["crumb", n] => match n.parse() {
                Ok(index) => browser.crumb_clicked(index).await,
                Err(_) => usage(&format!("not an index: {}", n)),
            },
            ["root"] => browser.root_clicked().await,
            ["sel", indices @ ..] => {
                browser.set_selected_indices(indices.iter().filter_map(|n| n.parse().ok()).collect());
                Ok(())
            }
            ["edit"] => browser.open_selected_in_editor().await,
            ["new", "notebook"] => browser.create_new_notebook().await.map(drop),
            ["new", "file"] => browser.create_new_file().await.map(drop),
            ["new", "dir"] => browser.create_new_directory().await.map(drop),
            ["rename"] => browser.rename_selected().await.map(drop),
            ["rm"] => browser.delete_selected().await.map(drop),
            ["cp"] => browser.copy_selected().await.map(drop),
            ["mv"] => browser.move_selected().await.map(drop),
            ["upload", paths @ ..] => match read_uploads(paths).await {
                Ok(files) => browser.upload(files).await.map(drop),
                Err(e) => usage(&format!("{:#}", e)),
            },
            ["refresh"] => browser.fetch_file_list().await,
            ["focus"] => {
                browser.focus_handler().await;
                Ok(())
            }
            ["blur"] => {
                browser.blur_handler();
                Ok(())
            }
            _ => usage("unknown command, try `help`"),
        };
        if let Err(e) = result {
            eprintln!("{}", e);
        }
    }

    browser.blur_handler();
    info!("Browser closed");
    Ok(())
}

fn usage(message: &str) -> Result<(), BrowserError> {
    eprintln!("{}", message);
    Ok(())
}

async fn read_uploads(paths: &[&str]) -> anyhow::Result<Vec<UploadFile>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let path = PathBuf::from(path);
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("No file name in {}", path.display()))?
            .to_string();
        let data = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Error reading {}", path.display()))?;
        files.push(UploadFile { name, data });
    }
    Ok(files)
}

fn print_location(browser: &FileBrowser) {
    if let Some(id) = browser.current_file_id() {
        let crumbs = browser.breadcrumbs();
        eprintln!("[{}] /{}", id, crumbs.join("/"));
    }
}

async fn print_events(browser: Weak<FileBrowser>, mut events: mpsc::UnboundedReceiver<BrowserEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            BrowserEvent::Notification { message, show: true, .. } => eprintln!("* {}", message),
            BrowserEvent::Notification { .. } => {}
            BrowserEvent::CurrentFileIdChanged(id) => eprintln!("-> {}", id),
            BrowserEvent::FileListChanged { count } => {
                eprintln!("({} items)", count);
                if let Some(browser) = browser.upgrade() {
                    print_files(&browser.file_list());
                }
            }
            BrowserEvent::OpenUrl(url) => println!("{}", url),
        }
    }
}

/// Create a shutdown signal that triggers on Ctrl+C or SIGTERM.
fn create_shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Received Ctrl+C, closing browser");
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                    info!("Received SIGTERM, closing browser");
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }

        let _ = tx.send(true);
    });

    rx
}
