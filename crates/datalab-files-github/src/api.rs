//! GitHub REST v3 client wrapper.

use datalab_files_core::FileManagerError;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

pub const GITHUB_API_URL: &str = "https://api.github.com";

const ACCEPT: &str = "application/vnd.github.v3+json";
const REQUESTED_WITH: &str = "XMLHttpRequest; googledatalab-datalab-app";
const USER_AGENT: &str = concat!("datalab-files/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Deserialize)]
pub struct RepoResponse {
    /// Repository name only.
    pub name: String,
    /// `user/repo`.
    pub full_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirEntryResponse {
    /// File name only.
    pub name: String,
    /// Path relative to the repository root.
    pub path: String,
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    /// `file`, `dir`, `symlink` or `submodule`.
    #[serde(rename = "type")]
    pub entry_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileResponse {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// The contents endpoint returns an array for directories and an object for files.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ContentsResponse {
    Directory(Vec<DirEntryResponse>),
    File(FileResponse),
}

pub struct GithubClient {
    http: Client,
    api_url: String,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(token: Option<String>) -> Self {
        Self::with_base_url(GITHUB_API_URL, token)
    }

    pub fn with_base_url(api_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http: Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    /// API URL made of `segments`, each percent-encoded as one path segment.
    fn api_url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url, FileManagerError> {
        let mut url = Url::parse(&self.api_url)
            .map_err(|e| FileManagerError::InvalidOperation(format!("Invalid GitHub API URL {}: {}", self.api_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| FileManagerError::InvalidOperation(format!("GitHub API URL {} cannot have a path", self.api_url)))?
            .pop_if_empty()
            .extend(segments.into_iter().filter(|s| !s.is_empty()));
        Ok(url)
    }

    /// GET an API URL and decode the JSON body. `what` names the resource in errors.
    #[instrument(skip(self, url), level = "debug", fields(url = %url))]
    async fn get_json<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<T, FileManagerError> {
        let mut request = self
            .http
            .get(url)
            .header("Accept", ACCEPT)
            .header("X-Requested-With", REQUESTED_WITH)
            .header("User-Agent", USER_AGENT);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("token {}", token));
        }

        let resp = request
            .send()
            .await
            .map_err(|e| FileManagerError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::NOT_FOUND => FileManagerError::NotFound(format!("GitHub path {}", what)),
                // Rate limiting is reported as 403 too.
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FileManagerError::Auth(body),
                _ => FileManagerError::Upstream {
                    status: status.as_u16(),
                    body,
                },
            });
        }

        debug!("GitHub request {} -> {}", what, status);
        resp.json()
            .await
            .map_err(|e| FileManagerError::MalformedResponse(e.to_string()))
    }

    pub async fn list_user_repos(&self, user: &str) -> Result<Vec<RepoResponse>, FileManagerError> {
        let url = self.api_url(["users", user, "repos"])?;
        self.get_json(url, user).await
    }

    pub async fn get_repo(&self, user: &str, repo: &str) -> Result<RepoResponse, FileManagerError> {
        let url = self.api_url(["repos", user, repo])?;
        self.get_json(url, &format!("{}/{}", user, repo)).await
    }

    pub async fn get_contents(
        &self,
        user: &str,
        repo: &str,
        path: &str,
    ) -> Result<ContentsResponse, FileManagerError> {
        let url = self.api_url(["repos", user, repo, "contents"].into_iter().chain(path.split('/')))?;
        self.get_json(url, &format!("{}/{}/{}", user, repo, path)).await
    }
}
