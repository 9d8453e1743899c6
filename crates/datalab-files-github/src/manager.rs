use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use datalab_files_core::{
    ensure_source, AppUrls, DatalabFile, DatalabFileId, DatalabFileType, FileManager,
    FileManagerError, FileManagerType, FileMetadata,
};
use futures::future::try_join_all;
use tracing::{debug, instrument};

use crate::api::{ContentsResponse, DirEntryResponse, FileResponse, GithubClient, RepoResponse};

/// Extensions shown when listing repository contents, besides directories.
const VISIBLE_EXTENSIONS: &[&str] = &[".ipynb", ".txt"];

/// A repository location resolved from a file id path.
struct RepoPath<'a> {
    user: &'a str,
    repo: &'a str,
    path: String,
}

pub struct GithubFileManager {
    client: GithubClient,
    urls: AppUrls,
}

impl GithubFileManager {
    pub fn new(client: GithubClient, urls: AppUrls) -> Self {
        Self { client, urls }
    }

    fn unsupported(method: &'static str) -> FileManagerError {
        FileManagerError::unsupported(method, FileManagerType::Github)
    }

    fn github_id(path: impl Into<String>) -> DatalabFileId {
        DatalabFileId::new(path, FileManagerType::Github)
    }

    fn root_file() -> DatalabFile {
        DatalabFile::new(Self::github_id("/"), "/", DatalabFileType::Directory)
    }

    fn entry_type(name: &str, github_type: &str) -> DatalabFileType {
        if name.ends_with(".ipynb") {
            DatalabFileType::Notebook
        } else if github_type == "dir" {
            DatalabFileType::Directory
        } else {
            DatalabFileType::File
        }
    }

    fn repo_file(repo: RepoResponse) -> DatalabFile {
        DatalabFile::new(Self::github_id(repo.full_name), repo.name, DatalabFileType::Directory)
    }

    fn entry_file(user: &str, repo: &str, entry: DirEntryResponse) -> DatalabFile {
        let file_type = Self::entry_type(&entry.name, &entry.entry_type);
        DatalabFile::new(
            Self::github_id(format!("{}/{}/{}", user, repo, entry.path)),
            entry.name,
            file_type,
        )
        .with_metadata(FileMetadata::Github {
            sha: entry.sha,
            size: entry.size,
        })
    }

    fn content_file(user: &str, repo: &str, file: FileResponse) -> DatalabFile {
        let file_type = Self::entry_type(&file.name, &file.entry_type);
        DatalabFile::new(
            Self::github_id(format!("{}/{}/{}", user, repo, file.path)),
            file.name,
            file_type,
        )
        .with_metadata(FileMetadata::Github {
            sha: file.sha,
            size: file.size,
        })
    }

    fn is_visible(entry: &DirEntryResponse) -> bool {
        entry.entry_type == "dir"
            || VISIBLE_EXTENSIONS
                .iter()
                .any(|ext| entry.name.ends_with(ext))
    }

    /// Resolve an id to a location inside a repository. The root, users and
    /// bare repositories have no file content.
    fn repo_path<'a>(file_id: &'a DatalabFileId, op: &str) -> Result<RepoPath<'a>, FileManagerError> {
        match file_id.segments().as_slice() {
            [] => Err(FileManagerError::InvalidOperation(format!(
                "{} on github root is not allowed",
                op
            ))),
            [_] => Err(FileManagerError::InvalidOperation(format!(
                "{} on a github user is not allowed",
                op
            ))),
            [user, repo, rest @ ..] => Ok(RepoPath {
                user: *user,
                repo: *repo,
                path: rest.join("/"),
            }),
        }
    }

    fn decode_content(file: FileResponse) -> Result<String, FileManagerError> {
        match file.encoding.as_deref() {
            Some("base64") => {}
            other => {
                return Err(FileManagerError::MalformedResponse(format!(
                    "Unexpected GitHub content encoding {:?} for {}",
                    other, file.path
                )))
            }
        }
        let encoded: String = file
            .content
            .unwrap_or_default()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| FileManagerError::MalformedResponse(format!("Invalid base64: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| FileManagerError::MalformedResponse(format!("Content is not UTF-8: {}", e)))
    }
}

#[async_trait]
impl FileManager for GithubFileManager {
    fn manager_type(&self) -> FileManagerType {
        FileManagerType::Github
    }

    #[instrument(skip(self), level = "debug")]
    async fn get(&self, file_id: &DatalabFileId) -> Result<DatalabFile, FileManagerError> {
        ensure_source(file_id, FileManagerType::Github)?;
        match file_id.segments().as_slice() {
            [] => Ok(Self::root_file()),
            // GitHub has no cheap user lookup that fits the tree, so users are synthesized.
            [user] => Ok(DatalabFile::new(
                Self::github_id(*user),
                *user,
                DatalabFileType::Directory,
            )),
            [user, repo] => {
                let repo = self.client.get_repo(user, repo).await?;
                Ok(Self::repo_file(repo))
            }
            [user, repo, rest @ ..] => {
                let path = rest.join("/");
                match self.client.get_contents(user, repo, &path).await? {
                    ContentsResponse::File(file) => Ok(Self::content_file(user, repo, file)),
                    ContentsResponse::Directory(_) => {
                        let name = rest.last().copied().unwrap_or_default();
                        Ok(DatalabFile::new(
                            Self::github_id(format!("{}/{}/{}", user, repo, path)),
                            name,
                            DatalabFileType::Directory,
                        ))
                    }
                }
            }
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_string_content(&self, file_id: &DatalabFileId) -> Result<String, FileManagerError> {
        ensure_source(file_id, FileManagerType::Github)?;
        let location = Self::repo_path(file_id, "getStringContent")?;
        match self
            .client
            .get_contents(location.user, location.repo, &location.path)
            .await?
        {
            ContentsResponse::File(file) => Self::decode_content(file),
            ContentsResponse::Directory(_) => Err(FileManagerError::InvalidOperation(format!(
                "Cannot read content of directory {}",
                file_id
            ))),
        }
    }

    async fn get_root_file(&self) -> Result<DatalabFile, FileManagerError> {
        Ok(Self::root_file())
    }

    async fn save_text(&self, _file: &DatalabFile, _text: &str) -> Result<DatalabFile, FileManagerError> {
        Err(Self::unsupported("saveText"))
    }

    #[instrument(skip(self), level = "debug")]
    async fn list(&self, container_id: &DatalabFileId) -> Result<Vec<DatalabFile>, FileManagerError> {
        ensure_source(container_id, FileManagerType::Github)?;
        match container_id.segments().as_slice() {
            // There is no way to enumerate all users.
            [] => Ok(Vec::new()),
            [user] => {
                let repos = self.client.list_user_repos(user).await?;
                debug!("Listed {} repositories for {}", repos.len(), user);
                Ok(repos.into_iter().map(Self::repo_file).collect())
            }
            [user, repo, rest @ ..] => {
                let path = rest.join("/");
                match self.client.get_contents(user, repo, &path).await? {
                    ContentsResponse::Directory(entries) => Ok(entries
                        .into_iter()
                        .filter(Self::is_visible)
                        .map(|entry| Self::entry_file(user, repo, entry))
                        .collect()),
                    ContentsResponse::File(_) => Err(FileManagerError::InvalidOperation(format!(
                        "Cannot list file {}",
                        container_id
                    ))),
                }
            }
        }
    }

    async fn create(
        &self,
        _file_type: DatalabFileType,
        _container_id: Option<&DatalabFileId>,
        _name: Option<&str>,
    ) -> Result<DatalabFile, FileManagerError> {
        Err(Self::unsupported("create"))
    }

    async fn rename(
        &self,
        _old_file_id: &DatalabFileId,
        _new_name: &str,
        _new_container_id: Option<&DatalabFileId>,
    ) -> Result<DatalabFile, FileManagerError> {
        Err(Self::unsupported("rename"))
    }

    async fn delete(&self, _file_id: &DatalabFileId) -> Result<(), FileManagerError> {
        Err(Self::unsupported("delete"))
    }

    async fn copy(
        &self,
        _file_id: &DatalabFileId,
        _destination_directory_id: &DatalabFileId,
    ) -> Result<DatalabFile, FileManagerError> {
        Err(Self::unsupported("copy"))
    }

    async fn get_editor_url(&self, file_id: &DatalabFileId) -> Result<String, FileManagerError> {
        ensure_source(file_id, FileManagerType::Github)?;
        Ok(self.urls.editor_url(file_id))
    }

    async fn get_notebook_url(&self, file_id: &DatalabFileId) -> Result<String, FileManagerError> {
        ensure_source(file_id, FileManagerType::Github)?;
        Ok(self.urls.notebook_url(file_id))
    }

    #[instrument(skip(self), level = "debug")]
    async fn file_id_to_full_path(
        &self,
        file_id: &DatalabFileId,
    ) -> Result<Vec<DatalabFile>, FileManagerError> {
        ensure_source(file_id, FileManagerType::Github)?;
        let segments = file_id.segments();
        let ancestors = (1..=segments.len()).map(|i| {
            let id = Self::github_id(segments[..i].join("/"));
            async move { self.get(&id).await }
        });

        let mut full_path = vec![Self::root_file()];
        full_path.extend(try_join_all(ancestors).await?);
        Ok(full_path)
    }
}
