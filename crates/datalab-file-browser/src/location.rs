//! Reading and writing file ids in URL query strings.

use datalab_files_core::{DatalabFileId, FileManagerError, FileManagerType};
use url::form_urlencoded;

pub const FILE_PARAM: &str = "file";
pub const FILE_MANAGER_PARAM: &str = "filemanager";

fn param(query: &str, name: &str) -> Option<String> {
    form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// The file id in the `file` parameter, if there is one.
pub fn file_id_from_query(query: &str) -> Result<Option<DatalabFileId>, FileManagerError> {
    param(query, FILE_PARAM)
        .map(|value| DatalabFileId::from_query_string(&value))
        .transpose()
}

/// The backend forced by the `filemanager` parameter, if there is one.
pub fn file_manager_from_query(query: &str) -> Result<Option<FileManagerType>, FileManagerError> {
    param(query, FILE_MANAGER_PARAM)
        .filter(|value| !value.is_empty())
        .map(|value| FileManagerType::from_name(&value))
        .transpose()
}

/// `query` with its `file` parameter set to `file_id`, keeping every other
/// parameter in place.
pub fn query_with_file_id(query: &str, file_id: &DatalabFileId) -> String {
    let id = file_id.to_query_string();
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    let mut replaced = false;

    for (key, value) in form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
        if key == FILE_PARAM {
            if !replaced {
                serializer.append_pair(FILE_PARAM, &id);
                replaced = true;
            }
        } else {
            serializer.append_pair(&key, &value);
        }
    }
    if !replaced {
        serializer.append_pair(FILE_PARAM, &id);
    }
    serializer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_id_from_query() {
        assert_eq!(file_id_from_query("").unwrap(), None);
        assert_eq!(file_id_from_query("?tab=2").unwrap(), None);
        assert_eq!(
            file_id_from_query("?file=drive%3Aabc123&tab=2").unwrap(),
            Some(DatalabFileId::new("abc123", FileManagerType::Drive))
        );
        assert_eq!(
            file_id_from_query("file=jupyter:work/a.ipynb").unwrap(),
            Some(DatalabFileId::new("work/a.ipynb", FileManagerType::Jupyter))
        );
    }

    #[test]
    fn test_malformed_file_param() {
        assert!(matches!(
            file_id_from_query("file=nocolon"),
            Err(FileManagerError::InvalidFileId(_))
        ));
        assert!(matches!(
            file_id_from_query("file=dropbox:x"),
            Err(FileManagerError::UnknownFileManagerType(_))
        ));
    }

    #[test]
    fn test_query_with_file_id() {
        let id = DatalabFileId::new("octo/repo", FileManagerType::Github);
        assert_eq!(query_with_file_id("", &id), "file=github%3Aocto%2Frepo");
        assert_eq!(
            query_with_file_id("?tab=2&file=drive%3Aold&x=y", &id),
            "tab=2&file=github%3Aocto%2Frepo&x=y"
        );

        let round_trip = query_with_file_id("tab=2", &id);
        assert_eq!(file_id_from_query(&round_trip).unwrap(), Some(id));
    }

    #[test]
    fn test_file_manager_from_query() {
        assert_eq!(file_manager_from_query("x=1").unwrap(), None);
        assert_eq!(file_manager_from_query("filemanager=").unwrap(), None);
        assert_eq!(
            file_manager_from_query("filemanager=jupyter").unwrap(),
            Some(FileManagerType::Jupyter)
        );
        assert!(file_manager_from_query("filemanager=ftp").is_err());
    }
}
