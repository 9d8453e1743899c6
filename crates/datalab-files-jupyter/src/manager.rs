//! `FileManager` over the notebook server contents API.

use std::sync::Arc;

use async_trait::async_trait;
use datalab_files_core::{
    ensure_source, list_with_session_status, AppUrls, ContentFormat, DatalabFile, DatalabFileId,
    DatalabFileType, FileManager, FileManagerError, FileManagerType, FileMetadata, SessionLister,
};
use futures::future::try_join_all;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::client::{ContentsModel, JupyterClient};

pub struct JupyterFileManager {
    client: Arc<JupyterClient>,
    sessions: Arc<dyn SessionLister>,
    urls: AppUrls,
}

impl JupyterFileManager {
    pub fn new(client: Arc<JupyterClient>, sessions: Arc<dyn SessionLister>, urls: AppUrls) -> Self {
        Self {
            client,
            sessions,
            urls,
        }
    }

    fn jupyter_id(path: &str) -> DatalabFileId {
        let path = path.trim_matches('/');
        if path.is_empty() {
            DatalabFileId::new("/", FileManagerType::Jupyter)
        } else {
            DatalabFileId::new(path, FileManagerType::Jupyter)
        }
    }

    fn root_file() -> DatalabFile {
        DatalabFile::new(Self::jupyter_id("/"), "/", DatalabFileType::Directory)
    }

    fn file_type(model_type: &str) -> DatalabFileType {
        match model_type {
            "directory" => DatalabFileType::Directory,
            "notebook" => DatalabFileType::Notebook,
            _ => DatalabFileType::File,
        }
    }

    fn to_datalab_file(model: ContentsModel) -> DatalabFile {
        let name = if model.path.trim_matches('/').is_empty() {
            "/".to_string()
        } else {
            model.name
        };
        let mut file = DatalabFile::new(
            Self::jupyter_id(&model.path),
            name,
            Self::file_type(&model.model_type),
        )
        .with_metadata(FileMetadata::Jupyter {
            mimetype: model.mimetype,
            last_modified: model.last_modified,
            writable: model.writable,
        });
        file.format = match model.format.as_deref() {
            Some("text") => Some(ContentFormat::Text),
            Some("base64") => Some(ContentFormat::Base64),
            Some("json") => Some(ContentFormat::Json),
            _ => None,
        };
        file
    }

    fn parent_path(path: &str) -> &str {
        path.trim_matches('/')
            .rsplit_once('/')
            .map(|(parent, _)| parent)
            .unwrap_or("")
    }

    fn join(directory: &str, name: &str) -> String {
        let directory = directory.trim_matches('/');
        if directory.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", directory, name)
        }
    }
}

#[async_trait]
impl FileManager for JupyterFileManager {
    fn manager_type(&self) -> FileManagerType {
        FileManagerType::Jupyter
    }

    #[instrument(skip(self), level = "debug")]
    async fn get(&self, file_id: &DatalabFileId) -> Result<DatalabFile, FileManagerError> {
        ensure_source(file_id, FileManagerType::Jupyter)?;
        let model = self.client.get_model(&file_id.path, false).await?;
        Ok(Self::to_datalab_file(model))
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_string_content(&self, file_id: &DatalabFileId) -> Result<String, FileManagerError> {
        ensure_source(file_id, FileManagerType::Jupyter)?;
        let model = self.client.get_model(&file_id.path, true).await?;
        match model.content {
            Some(Value::String(text)) => Ok(text),
            Some(Value::Array(_)) => Err(FileManagerError::InvalidOperation(format!(
                "Cannot read content of directory {}",
                file_id
            ))),
            Some(notebook @ Value::Object(_)) => Ok(serde_json::to_string(&notebook)?),
            _ => Err(FileManagerError::MalformedResponse(format!(
                "No content returned for {}",
                file_id
            ))),
        }
    }

    async fn get_root_file(&self) -> Result<DatalabFile, FileManagerError> {
        Ok(Self::root_file())
    }

    #[instrument(skip(self, file, text), level = "debug", fields(id = %file.id, text_len = text.len()))]
    async fn save_text(&self, file: &DatalabFile, text: &str) -> Result<DatalabFile, FileManagerError> {
        ensure_source(&file.id, FileManagerType::Jupyter)?;
        let model = match file.file_type {
            DatalabFileType::Notebook => {
                let notebook: Value = serde_json::from_str(text)?;
                json!({ "type": "notebook", "format": "json", "content": notebook })
            }
            DatalabFileType::File => {
                let format = file.format.unwrap_or(ContentFormat::Text);
                json!({ "type": "file", "format": format.as_str(), "content": text })
            }
            DatalabFileType::Directory => {
                return Err(FileManagerError::InvalidOperation(format!(
                    "Cannot save text to directory {}",
                    file.id
                )))
            }
        };
        let saved = self.client.save(&file.id.path, &model).await?;
        Ok(Self::to_datalab_file(saved))
    }

    #[instrument(skip(self), level = "debug")]
    async fn list(&self, container_id: &DatalabFileId) -> Result<Vec<DatalabFile>, FileManagerError> {
        ensure_source(container_id, FileManagerType::Jupyter)?;
        let listing = async {
            let model = self.client.get_model(&container_id.path, true).await?;
            let children = match model.content {
                Some(Value::Array(children)) => children,
                _ => {
                    return Err(FileManagerError::InvalidOperation(format!(
                        "Cannot list {}: not a directory",
                        container_id
                    )))
                }
            };
            let files = children
                .into_iter()
                .map(|child| serde_json::from_value::<ContentsModel>(child).map(Self::to_datalab_file))
                .collect::<Result<Vec<_>, _>>()?;
            Ok::<Vec<DatalabFile>, FileManagerError>(files)
        };
        list_with_session_status(listing, self.sessions.as_ref()).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn create(
        &self,
        file_type: DatalabFileType,
        container_id: Option<&DatalabFileId>,
        name: Option<&str>,
    ) -> Result<DatalabFile, FileManagerError> {
        if let Some(container) = container_id {
            ensure_source(container, FileManagerType::Jupyter)?;
        }
        let directory = container_id.map(|c| c.path.as_str()).unwrap_or("/");
        let (model_type, ext) = match file_type {
            DatalabFileType::Directory => ("directory", None),
            DatalabFileType::Notebook => ("notebook", Some(".ipynb")),
            DatalabFileType::File => ("file", Some(".txt")),
        };

        let created = self.client.create_untitled(directory, model_type, ext).await?;
        let Some(name) = name else {
            return Ok(Self::to_datalab_file(created));
        };

        // The server always creates an untitled item; move it to the requested name.
        let new_path = Self::join(directory, name);
        debug!("Renaming {} to {}", created.path, new_path);
        let renamed = self.client.rename(&created.path, &new_path).await?;
        Ok(Self::to_datalab_file(renamed))
    }

    #[instrument(skip(self), level = "debug")]
    async fn rename(
        &self,
        old_file_id: &DatalabFileId,
        new_name: &str,
        new_container_id: Option<&DatalabFileId>,
    ) -> Result<DatalabFile, FileManagerError> {
        ensure_source(old_file_id, FileManagerType::Jupyter)?;
        let directory = match new_container_id {
            Some(container) => {
                ensure_source(container, FileManagerType::Jupyter)?;
                container.path.as_str()
            }
            None => Self::parent_path(&old_file_id.path),
        };
        let new_path = Self::join(directory, new_name);
        let renamed = self.client.rename(&old_file_id.path, &new_path).await?;
        Ok(Self::to_datalab_file(renamed))
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, file_id: &DatalabFileId) -> Result<(), FileManagerError> {
        ensure_source(file_id, FileManagerType::Jupyter)?;
        self.client.delete(&file_id.path).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn copy(
        &self,
        file_id: &DatalabFileId,
        destination_directory_id: &DatalabFileId,
    ) -> Result<DatalabFile, FileManagerError> {
        ensure_source(file_id, FileManagerType::Jupyter)?;
        ensure_source(destination_directory_id, FileManagerType::Jupyter)?;
        let copied = self
            .client
            .copy(&file_id.path, &destination_directory_id.path)
            .await?;
        Ok(Self::to_datalab_file(copied))
    }

    async fn get_editor_url(&self, file_id: &DatalabFileId) -> Result<String, FileManagerError> {
        ensure_source(file_id, FileManagerType::Jupyter)?;
        Ok(self.urls.editor_url(file_id))
    }

    async fn get_notebook_url(&self, file_id: &DatalabFileId) -> Result<String, FileManagerError> {
        ensure_source(file_id, FileManagerType::Jupyter)?;
        Ok(format!(
            "{}/notebooks/{}",
            self.urls.host_root(),
            file_id.path.trim_start_matches('/')
        ))
    }

    #[instrument(skip(self), level = "debug")]
    async fn file_id_to_full_path(
        &self,
        file_id: &DatalabFileId,
    ) -> Result<Vec<DatalabFile>, FileManagerError> {
        ensure_source(file_id, FileManagerType::Jupyter)?;
        let segments = file_id.segments();
        let ancestors = (1..=segments.len()).map(|i| {
            let id = Self::jupyter_id(&segments[..i].join("/"));
            async move { self.get(&id).await }
        });

        let mut full_path = vec![Self::root_file()];
        full_path.extend(try_join_all(ancestors).await?);
        Ok(full_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datalab_files_core::{DatalabFileStatus, NoSessions};
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FixedSessions(Vec<String>);

    #[async_trait]
    impl SessionLister for FixedSessions {
        async fn list_session_paths(&self) -> Result<Vec<String>, FileManagerError> {
            Ok(self.0.clone())
        }
    }

    fn manager_with(server: &MockServer, sessions: Arc<dyn SessionLister>) -> JupyterFileManager {
        JupyterFileManager::new(
            Arc::new(JupyterClient::new(server.uri(), None)),
            sessions,
            AppUrls::new("http://localhost:8081"),
        )
    }

    fn manager(server: &MockServer) -> JupyterFileManager {
        manager_with(server, Arc::new(NoSessions))
    }

    fn jp(path: &str) -> DatalabFileId {
        DatalabFileId::new(path, FileManagerType::Jupyter)
    }

    fn model(path: &str, model_type: &str) -> Value {
        let name = path.rsplit('/').next().unwrap_or(path);
        json!({
            "name": name,
            "path": path,
            "type": model_type,
            "writable": true,
            "last_modified": "2017-06-01T10:00:00Z",
            "mimetype": null,
            "format": null,
            "content": null
        })
    }

    #[tokio::test]
    async fn test_list_maps_types_and_status() {
        let server = MockServer::start().await;
        let mut dir = model("work", "directory");
        dir["content"] = json!([
            model("work/a.ipynb", "notebook"),
            model("work/data", "directory"),
            model("work/notes.txt", "file")
        ]);
        Mock::given(method("GET"))
            .and(path("/api/contents/work"))
            .and(query_param("content", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(dir))
            .mount(&server)
            .await;

        let manager = manager_with(&server, Arc::new(FixedSessions(vec!["work/a.ipynb".into()])));
        let files = manager.list(&jp("work")).await.unwrap();

        let types: Vec<_> = files.iter().map(|f| f.file_type).collect();
        assert_eq!(
            types,
            vec![
                DatalabFileType::Notebook,
                DatalabFileType::Directory,
                DatalabFileType::File
            ]
        );
        assert_eq!(files[0].status, DatalabFileStatus::Running);
        assert_eq!(files[1].status, DatalabFileStatus::Idle);
        assert_eq!(files[2].id, jp("work/notes.txt"));
    }

    #[tokio::test]
    async fn test_get_root_model() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/contents/"))
            .and(query_param("content", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(model("", "directory")))
            .mount(&server)
            .await;

        let root = manager(&server).get(&jp("/")).await.unwrap();
        assert_eq!(root.id, jp("/"));
        assert_eq!(root.name, "/");
        assert!(root.is_directory());
    }

    #[tokio::test]
    async fn test_string_content_for_file_and_notebook() {
        let server = MockServer::start().await;
        let mut text = model("notes.txt", "file");
        text["content"] = json!("hello");
        text["format"] = json!("text");
        let mut notebook = model("a.ipynb", "notebook");
        notebook["content"] = json!({ "cells": [], "nbformat": 4 });
        Mock::given(method("GET"))
            .and(path("/api/contents/notes.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/contents/a.ipynb"))
            .respond_with(ResponseTemplate::new(200).set_body_json(notebook))
            .mount(&server)
            .await;

        let manager = manager(&server);
        assert_eq!(manager.get_string_content(&jp("notes.txt")).await.unwrap(), "hello");
        let content = manager.get_string_content(&jp("a.ipynb")).await.unwrap();
        let parsed: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["nbformat"], 4);
    }

    #[tokio::test]
    async fn test_create_then_rename() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/contents/work"))
            .and(body_json(json!({ "type": "notebook", "ext": ".ipynb" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(model("work/Untitled.ipynb", "notebook")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/api/contents/work/Untitled.ipynb"))
            .and(body_json(json!({ "path": "work/analysis.ipynb" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(model("work/analysis.ipynb", "notebook")))
            .expect(1)
            .mount(&server)
            .await;

        let file = manager(&server)
            .create(DatalabFileType::Notebook, Some(&jp("work")), Some("analysis.ipynb"))
            .await
            .unwrap();
        assert_eq!(file.id, jp("work/analysis.ipynb"));
        assert_eq!(file.file_type, DatalabFileType::Notebook);
    }

    #[tokio::test]
    async fn test_create_without_name_keeps_untitled() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/contents/"))
            .and(body_json(json!({ "type": "directory" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(model("Untitled Folder", "directory")))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let file = manager(&server)
            .create(DatalabFileType::Directory, None, None)
            .await
            .unwrap();
        assert_eq!(file.id, jp("Untitled Folder"));
    }

    #[tokio::test]
    async fn test_rename_in_place_and_move() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/api/contents/work/a.ipynb"))
            .and(body_json(json!({ "path": "work/b.ipynb" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(model("work/b.ipynb", "notebook")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/api/contents/work/b.ipynb"))
            .and(body_json(json!({ "path": "archive/b.ipynb" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(model("archive/b.ipynb", "notebook")))
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager(&server);
        let renamed = manager.rename(&jp("work/a.ipynb"), "b.ipynb", None).await.unwrap();
        assert_eq!(renamed.id, jp("work/b.ipynb"));
        let moved = manager
            .rename(&jp("work/b.ipynb"), "b.ipynb", Some(&jp("archive")))
            .await
            .unwrap();
        assert_eq!(moved.id, jp("archive/b.ipynb"));
    }

    #[tokio::test]
    async fn test_save_text_uses_file_format() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/contents/upload.bin"))
            .and(body_json(json!({ "type": "file", "format": "base64", "content": "AAEC" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(model("upload.bin", "file")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/contents/a.ipynb"))
            .and(body_json(json!({ "type": "notebook", "format": "json", "content": { "cells": [] } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(model("a.ipynb", "notebook")))
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager(&server);
        let mut upload = DatalabFile::new(jp("upload.bin"), "upload.bin", DatalabFileType::File);
        upload.format = Some(ContentFormat::Base64);
        manager.save_text(&upload, "AAEC").await.unwrap();

        let notebook = DatalabFile::new(jp("a.ipynb"), "a.ipynb", DatalabFileType::Notebook);
        manager.save_text(&notebook, r#"{"cells": []}"#).await.unwrap();

        let err = manager.save_text(&notebook, "not json").await.unwrap_err();
        assert!(matches!(err, FileManagerError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_copy_and_delete() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/contents/archive"))
            .and(body_json(json!({ "copy_from": "work/a.ipynb" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(model("archive/a-Copy1.ipynb", "notebook")))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/contents/work/a.ipynb"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager(&server);
        let copied = manager.copy(&jp("work/a.ipynb"), &jp("archive")).await.unwrap();
        assert_eq!(copied.id, jp("archive/a-Copy1.ipynb"));
        manager.delete(&jp("work/a.ipynb")).await.unwrap();
    }

    #[tokio::test]
    async fn test_full_path_and_urls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/contents/work"))
            .respond_with(ResponseTemplate::new(200).set_body_json(model("work", "directory")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/contents/work/a.ipynb"))
            .respond_with(ResponseTemplate::new(200).set_body_json(model("work/a.ipynb", "notebook")))
            .mount(&server)
            .await;

        let manager = manager(&server);
        let full_path = manager.file_id_to_full_path(&jp("work/a.ipynb")).await.unwrap();
        let names: Vec<_> = full_path.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["/", "work", "a.ipynb"]);

        assert_eq!(
            manager.get_notebook_url(&jp("work/a.ipynb")).await.unwrap(),
            "http://localhost:8081/notebooks/work/a.ipynb"
        );
        assert_eq!(
            manager.get_editor_url(&jp("work/notes.txt")).await.unwrap(),
            "http://localhost:8081/editor?file=jupyter:work/notes.txt"
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/contents/gone.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = manager(&server).get(&jp("gone.txt")).await.unwrap_err();
        assert!(matches!(err, FileManagerError::NotFound(_)));
    }
}
