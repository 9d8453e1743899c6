//! Thin client for the notebook server REST API.

use datalab_files_core::FileManagerError;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};
use url::Url;

/// A contents API model. `content` is only present when requested.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentsModel {
    pub name: String,
    /// Relative to the server root; empty for the root itself.
    pub path: String,
    /// `directory`, `notebook` or `file`.
    #[serde(rename = "type")]
    pub model_type: String,
    #[serde(default)]
    pub mimetype: Option<String>,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub writable: bool,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub content: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct SessionNotebook {
    path: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SessionModel {
    #[serde(default)]
    path: Option<String>,
    /// Servers before 5.0 only report the path under `notebook`.
    #[serde(default)]
    notebook: Option<SessionNotebook>,
}

impl SessionModel {
    pub(crate) fn into_path(self) -> Option<String> {
        self.path.or(self.notebook.map(|n| n.path))
    }
}

pub struct JupyterClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl JupyterClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    /// `/api/contents/<path>` with every path segment percent-encoded. The
    /// root keeps its trailing slash.
    fn contents_url(&self, path: &str) -> Result<Url, FileManagerError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            FileManagerError::InvalidOperation(format!("Invalid Jupyter URL {}: {}", self.base_url, e))
        })?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                FileManagerError::InvalidOperation(format!("Jupyter URL {} cannot have a path", self.base_url))
            })?;
            segments.pop_if_empty().extend(["api", "contents"]);
            let mut parts = path.split('/').filter(|s| !s.is_empty()).peekable();
            if parts.peek().is_none() {
                segments.push("");
            }
            segments.extend(parts);
        }
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, FileManagerError> {
        let request = match &self.token {
            Some(token) => request.header("Authorization", format!("token {}", token)),
            None => request,
        };
        let resp = request
            .send()
            .await
            .map_err(|e| FileManagerError::Http(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        match status {
            StatusCode::NOT_FOUND => Err(FileManagerError::NotFound(what.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(FileManagerError::Auth(body)),
            _ => Err(FileManagerError::Upstream {
                status: status.as_u16(),
                body,
            }),
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T, FileManagerError> {
        self.send(request, what)
            .await?
            .json()
            .await
            .map_err(|e| FileManagerError::MalformedResponse(e.to_string()))
    }

    /// Fetch a model, with its content (directory children, notebook JSON or
    /// file body) when `content` is set.
    #[instrument(skip(self), level = "debug")]
    pub async fn get_model(&self, path: &str, content: bool) -> Result<ContentsModel, FileManagerError> {
        let request = self
            .http
            .get(self.contents_url(path)?)
            .query(&[("content", if content { "1" } else { "0" })]);
        self.send_json(request, &format!("Jupyter path {}", path)).await
    }

    #[instrument(skip(self, model), level = "debug")]
    pub async fn save(&self, path: &str, model: &Value) -> Result<ContentsModel, FileManagerError> {
        let request = self.http.put(self.contents_url(path)?).json(model);
        self.send_json(request, &format!("Jupyter path {}", path)).await
    }

    /// Create an untitled item in `directory`; the server picks the name.
    #[instrument(skip(self), level = "debug")]
    pub async fn create_untitled(
        &self,
        directory: &str,
        model_type: &str,
        ext: Option<&str>,
    ) -> Result<ContentsModel, FileManagerError> {
        let mut body = json!({ "type": model_type });
        if let Some(ext) = ext {
            body["ext"] = json!(ext);
        }
        let request = self.http.post(self.contents_url(directory)?).json(&body);
        let model: ContentsModel = self
            .send_json(request, &format!("Jupyter directory {}", directory))
            .await?;
        debug!("Jupyter created {} {}", model.model_type, model.path);
        Ok(model)
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn rename(&self, path: &str, new_path: &str) -> Result<ContentsModel, FileManagerError> {
        let request = self
            .http
            .patch(self.contents_url(path)?)
            .json(&json!({ "path": new_path }));
        self.send_json(request, &format!("Jupyter path {}", path)).await
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn delete(&self, path: &str) -> Result<(), FileManagerError> {
        let request = self.http.delete(self.contents_url(path)?);
        self.send(request, &format!("Jupyter path {}", path)).await?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn copy(&self, copy_from: &str, directory: &str) -> Result<ContentsModel, FileManagerError> {
        let request = self
            .http
            .post(self.contents_url(directory)?)
            .json(&json!({ "copy_from": copy_from }));
        self.send_json(request, &format!("Jupyter path {}", copy_from)).await
    }

    #[instrument(skip(self), level = "debug")]
    pub(crate) async fn list_sessions(&self) -> Result<Vec<SessionModel>, FileManagerError> {
        let request = self.http.get(format!("{}/api/sessions", self.base_url));
        self.send_json(request, "Jupyter sessions").await
    }
}
