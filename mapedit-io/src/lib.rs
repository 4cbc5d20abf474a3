use std::fs;
use std::path::{Path, PathBuf};

use mapedit_core::{document::Document, errors::DocumentError};
use thiserror::Error;
use tracing::debug;

pub mod clipboard;
pub mod remote;

/// 导出时默认使用的文件名。
pub const EXPORT_FILE_NAME: &str = "map_data.json";

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid document structure: {0}")]
    InvalidDocument(#[from] DocumentError),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("HTTP error! status: {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("clipboard unavailable: {0}")]
    Clipboard(String),
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Document, IoError>;
}

pub trait DocumentSaver {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError>;
}

/// 基于 serde_json 的地图配置读写门面。
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFacade;

impl JsonFacade {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentLoader for JsonFacade {
    fn load(&self, path: &Path) -> Result<Document, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), bytes = data.len(), "读取 JSON 文件");
        parse_document(&data)
    }
}

impl DocumentSaver for JsonFacade {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError> {
        let text = to_pretty_json(document)?;
        fs::write(path, text).map_err(|source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "写出 JSON 文件");
        Ok(())
    }
}

/// 解析 JSON 文本；根值必须是对象。
pub fn parse_document(text: &str) -> Result<Document, IoError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    Ok(Document::from_value(value)?)
}

/// 两空格缩进的序列化结果，不带结尾换行。
pub fn to_pretty_json(document: &Document) -> Result<String, IoError> {
    Ok(serde_json::to_string_pretty(document.as_map())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pretty_output_uses_two_space_indent() {
        let document = parse_document(r#"{"name":"M","locations":{"a":[]}}"#).unwrap();
        let text = to_pretty_json(&document).unwrap();
        assert_eq!(
            text,
            "{\n  \"name\": \"M\",\n  \"locations\": {\n    \"a\": []\n  }\n}"
        );
    }

    #[test]
    fn non_object_roots_are_rejected() {
        assert!(matches!(
            parse_document("[1, 2, 3]"),
            Err(IoError::InvalidDocument(DocumentError::NotAnObject(_)))
        ));
        assert!(matches!(parse_document("{not json"), Err(IoError::Parse(_))));
    }

    #[test]
    fn missing_file_reports_path() {
        let path = Path::new("definitely/not/here.json");
        let err = JsonFacade::new().load(path).unwrap_err();
        match err {
            IoError::ReadError { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
