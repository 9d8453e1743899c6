use std::fmt;

use serde::{Deserialize, Serialize};

use crate::file_id::DatalabFileId;

pub const DIRECTORY_ICON: &str = "folder";
pub const FILE_ICON: &str = "editor:insert-drive-file";

/// Content of a freshly created, empty notebook.
pub const EMPTY_NOTEBOOK_CONTENT: &str = r#"{
  "cells": [],
  "metadata": {},
  "nbformat": 4,
  "nbformat_minor": 2
}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatalabFileType {
    File,
    Directory,
    Notebook,
}

impl DatalabFileType {
    /// Icon name used by the item list for this type.
    pub fn icon(self) -> &'static str {
        match self {
            DatalabFileType::Directory => DIRECTORY_ICON,
            _ => FILE_ICON,
        }
    }
}

impl fmt::Display for DatalabFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DatalabFileType::File => "file",
            DatalabFileType::Directory => "directory",
            DatalabFileType::Notebook => "notebook",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatalabFileStatus {
    #[default]
    Idle,
    Running,
}

impl fmt::Display for DatalabFileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DatalabFileStatus::Idle => "",
            DatalabFileStatus::Running => "Running",
        })
    }
}

/// Encoding of the text handed to `FileManager::save_text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    Text,
    Base64,
    Json,
}

impl ContentFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentFormat::Text => "text",
            ContentFormat::Base64 => "base64",
            ContentFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BigQueryKind {
    Project,
    Dataset,
    Table,
}

/// Backend-specific fields carried alongside the common file record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum FileMetadata {
    #[default]
    None,
    Drive {
        parents: Vec<String>,
        mime_type: String,
        created_time: Option<String>,
        modified_time: Option<String>,
    },
    Github {
        sha: Option<String>,
        size: Option<u64>,
    },
    Jupyter {
        mimetype: Option<String>,
        last_modified: Option<String>,
        writable: bool,
    },
    BigQuery {
        kind: BigQueryKind,
        table_type: Option<String>,
    },
}

/// One node in a backend's namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatalabFile {
    pub id: DatalabFileId,
    pub name: String,
    #[serde(rename = "type")]
    pub file_type: DatalabFileType,
    #[serde(default)]
    pub status: DatalabFileStatus,
    pub icon: String,
    #[serde(default)]
    pub format: Option<ContentFormat>,
    #[serde(default)]
    pub metadata: FileMetadata,
}

impl DatalabFile {
    /// A file with the default icon for its type and no backend metadata.
    pub fn new(id: DatalabFileId, name: impl Into<String>, file_type: DatalabFileType) -> Self {
        Self {
            id,
            name: name.into(),
            file_type,
            status: DatalabFileStatus::Idle,
            icon: file_type.icon().to_string(),
            format: None,
            metadata: FileMetadata::None,
        }
    }

    pub fn with_metadata(mut self, metadata: FileMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn is_directory(&self) -> bool {
        self.file_type == DatalabFileType::Directory
    }

    /// Drive parent ids, empty for other backends.
    pub fn parents(&self) -> &[String] {
        match &self.metadata {
            FileMetadata::Drive { parents, .. } => parents,
            _ => &[],
        }
    }
}
