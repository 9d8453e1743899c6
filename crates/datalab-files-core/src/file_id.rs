use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FileManagerError;

/// Storage backends a file can live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileManagerType {
    BigQuery,
    Drive,
    Github,
    Jupyter,
}

impl FileManagerType {
    pub const ALL: [FileManagerType; 4] = [
        FileManagerType::BigQuery,
        FileManagerType::Drive,
        FileManagerType::Github,
        FileManagerType::Jupyter,
    ];

    /// Canonical name used in query strings and configuration.
    pub fn name(self) -> &'static str {
        match self {
            FileManagerType::BigQuery => "bigquery",
            FileManagerType::Drive => "drive",
            FileManagerType::Github => "github",
            FileManagerType::Jupyter => "jupyter",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, FileManagerError> {
        match name {
            "bigquery" => Ok(FileManagerType::BigQuery),
            "drive" => Ok(FileManagerType::Drive),
            "github" => Ok(FileManagerType::Github),
            "jupyter" => Ok(FileManagerType::Jupyter),
            other => Err(FileManagerError::UnknownFileManagerType(other.to_string())),
        }
    }
}

impl fmt::Display for FileManagerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FileManagerType {
    type Err = FileManagerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

/// Unique identifier for a file object across backends.
///
/// Serialized as `<backend>:<path>`, e.g. `drive:1AbCdEf` or `jupyter:notebooks/a.ipynb`.
/// Paths containing the `:` delimiter cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatalabFileId {
    pub path: String,
    pub source: FileManagerType,
}

impl DatalabFileId {
    const DELIM: char = ':';

    pub fn new(path: impl Into<String>, source: FileManagerType) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }

    pub fn from_query_string(query_string: &str) -> Result<Self, FileManagerError> {
        let tokens: Vec<&str> = query_string.split(Self::DELIM).collect();
        if tokens.len() != 2 {
            return Err(FileManagerError::InvalidFileId(query_string.to_string()));
        }
        let source = FileManagerType::from_name(tokens[0])?;
        Ok(Self::new(tokens[1], source))
    }

    pub fn to_query_string(&self) -> String {
        format!("{}{}{}", self.source.name(), Self::DELIM, self.path)
    }

    /// Path segments with empty components (leading, trailing or doubled `/`) removed.
    pub fn segments(&self) -> Vec<&str> {
        self.path.split('/').filter(|part| !part.is_empty()).collect()
    }
}

impl fmt::Display for DatalabFileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

impl FromStr for DatalabFileId {
    type Err = FileManagerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_query_string(s)
    }
}

impl TryFrom<String> for DatalabFileId {
    type Error = FileManagerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_query_string(&value)
    }
}

impl From<DatalabFileId> for String {
    fn from(id: DatalabFileId) -> Self {
        id.to_query_string()
    }
}
