use std::fs;
use std::path::{Path, PathBuf};

use mapedit_config::IngestConfig;
use mapedit_engine::session::Session;
use mapedit_io::remote::{FetchedDocument, HttpFetcher, ReqwestFetcher, fetch_document};
use mapedit_io::{DocumentLoader, IoError, JsonFacade, parse_document};
use tracing::{info, warn};

pub const PASTED_LABEL: &str = "Pasted JSON";

pub const FILE_ERROR_MESSAGE: &str = "Error reading the JSON file. Please check the format.";
pub const URL_ERROR_MESSAGE: &str = "Could not fetch the JSON from the URL provided. Maybe CORS is not enabled for the source? (paste.cytooxien.de not supported)";
pub const PASTE_ERROR_MESSAGE: &str = "Error parsing pasted JSON. Please check the format. Paste must not include line numbers. Please paste from paste.cytooxien.de/raw/...";

/// 文档来源，便于前端呈现加载信息。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    File(PathBuf),
    Url(String),
    Pasted,
}

impl DocumentSource {
    pub fn describe(&self) -> String {
        match self {
            DocumentSource::File(path) => format!("文件 {}", path.display()),
            DocumentSource::Url(url) => format!("URL {url}"),
            DocumentSource::Pasted => "粘贴文本".to_string(),
        }
    }
}

/// 启动参数中指定的初始文档。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitialSource {
    File(PathBuf),
    Url(String),
    /// 文件内容按粘贴文本处理。
    PasteFile(PathBuf),
}

/// 文件名作为来源标签，取不到时退回完整路径。
pub fn label_for_path(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// 三条导入路径的统一入口。
///
/// 成功时替换会话文档并记录来源标签；失败时记录日志、向用户报告错误，文档保持不变。
pub struct Ingestor {
    loader: JsonFacade,
    fetcher: Box<dyn HttpFetcher + Send + Sync>,
}

impl Ingestor {
    pub fn new(fetcher: Box<dyn HttpFetcher + Send + Sync>) -> Self {
        Self {
            loader: JsonFacade::new(),
            fetcher,
        }
    }

    pub fn from_config(config: &IngestConfig) -> Result<Self, IoError> {
        let fetcher = ReqwestFetcher::new(
            config.timeout(),
            config.connect_timeout(),
            &config.user_agent,
        )?;
        Ok(Self::new(Box::new(fetcher)))
    }

    pub fn ingest_initial(&self, session: &mut Session, source: &InitialSource) -> bool {
        match source {
            InitialSource::File(path) => self.ingest_file(session, path),
            InitialSource::Url(url) => self.ingest_url(session, url),
            InitialSource::PasteFile(path) => match fs::read_to_string(path) {
                Ok(text) => self.ingest_paste(session, &text),
                Err(source) => {
                    let err = IoError::ReadError {
                        path: path.clone(),
                        source,
                    };
                    report_failure(
                        session,
                        &DocumentSource::Pasted,
                        &err,
                        format!("{FILE_ERROR_MESSAGE} ({err})"),
                    );
                    false
                }
            },
        }
    }

    /// 返回是否成功载入。
    pub fn ingest_file(&self, session: &mut Session, path: &Path) -> bool {
        let source = DocumentSource::File(path.to_path_buf());
        match self.loader.load(path) {
            Ok(document) => {
                info!(source = %source.describe(), "导入成功");
                session.load_document(document, label_for_path(path));
                true
            }
            Err(err) => {
                report_failure(session, &source, &err, format!("{FILE_ERROR_MESSAGE} ({err})"));
                false
            }
        }
    }

    pub fn ingest_url(&self, session: &mut Session, input: &str) -> bool {
        let result = self.fetch_remote(input);
        apply_fetch_result(session, input, result)
    }

    /// 只做网络请求与解析，不触碰会话；供后台线程调用。
    pub fn fetch_remote(&self, input: &str) -> Result<FetchedDocument, IoError> {
        fetch_document(self.fetcher.as_ref(), input)
    }

    pub fn ingest_paste(&self, session: &mut Session, text: &str) -> bool {
        session.clear_error();
        let source = DocumentSource::Pasted;
        match parse_document(text) {
            Ok(document) => {
                info!(source = %source.describe(), bytes = text.len(), "导入成功");
                session.load_document(document, PASTED_LABEL);
                true
            }
            Err(err) => {
                report_failure(session, &source, &err, PASTE_ERROR_MESSAGE.to_string());
                false
            }
        }
    }
}

/// 将一次远程获取的结果写入会话：先清除旧错误，再载入文档或报告失败。
pub fn apply_fetch_result(
    session: &mut Session,
    input: &str,
    result: Result<FetchedDocument, IoError>,
) -> bool {
    session.clear_error();
    let source = DocumentSource::Url(input.trim().to_string());
    match result {
        Ok(fetched) => {
            info!(source = %source.describe(), url = %fetched.url, "导入成功");
            session.load_document(fetched.document, fetched.label);
            true
        }
        Err(err) => {
            report_failure(session, &source, &err, format!("{URL_ERROR_MESSAGE} ({err})"));
            false
        }
    }
}

fn report_failure(session: &mut Session, source: &DocumentSource, err: &IoError, message: String) {
    warn!(source = %source.describe(), error = %err, "导入失败，保留当前文档");
    session.report_error(message);
}
