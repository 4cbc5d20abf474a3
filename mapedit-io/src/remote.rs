//! 远程 JSON 获取：URL 规整、来源标签推导以及基于 reqwest 的阻塞式下载。

use std::time::Duration;

use mapedit_core::document::Document;
use reqwest::blocking::Client;
use tracing::{debug, warn};

use crate::{IoError, parse_document};

/// 该粘贴站的网页地址需要改写到原始文本端点。
pub const PASTE_HOST_PREFIX: &str = "https://paste.cytooxien.de/";
/// URL 最后一段为空时使用的来源标签。
pub const FALLBACK_URL_LABEL: &str = "Fetched JSON";

/// 去除首尾空白，并把粘贴站的网页链接改写为 `/raw/<id>`。
pub fn resolve_fetch_url(input: &str) -> String {
    let url = input.trim();
    if url.starts_with(PASTE_HOST_PREFIX) && !url.contains("/raw/") {
        let id = url.rsplit('/').next().unwrap_or_default();
        return format!("{PASTE_HOST_PREFIX}raw/{id}");
    }
    url.to_string()
}

/// URL 按 `/` 切分后的最后一段；为空时退回 `Fetched JSON`。
pub fn label_for_url(url: &str) -> String {
    match url.rsplit('/').next() {
        Some(segment) if !segment.is_empty() => segment.to_string(),
        _ => FALLBACK_URL_LABEL.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    #[inline]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 单次 HTTP GET 的抽象，便于在测试中替换网络。
pub trait HttpFetcher {
    fn get(&self, url: &str) -> Result<FetchResponse, IoError>;
}

pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new(
        timeout: Duration,
        connect_timeout: Option<Duration>,
        user_agent: &str,
    ) -> Result<Self, IoError> {
        let mut builder = Client::builder().timeout(timeout).user_agent(user_agent);
        if let Some(connect_timeout) = connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }
        let client = builder.build().map_err(IoError::HttpClient)?;
        Ok(Self { client })
    }
}

impl HttpFetcher for ReqwestFetcher {
    fn get(&self, url: &str) -> Result<FetchResponse, IoError> {
        let network = |source: reqwest::Error| IoError::Network {
            url: url.to_string(),
            source: Box::new(source),
        };
        let response = self.client.get(url).send().map_err(network)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(network)?;
        Ok(FetchResponse { status, body })
    }
}

#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub document: Document,
    /// 改写后的实际请求地址。
    pub url: String,
    pub label: String,
}

/// 规整 URL、发起请求并解析响应体；非 2xx 状态视为失败。
pub fn fetch_document(fetcher: &dyn HttpFetcher, input: &str) -> Result<FetchedDocument, IoError> {
    let url = resolve_fetch_url(input);
    debug!(url = %url, "请求远程 JSON");
    let response = fetcher.get(&url)?;
    if !response.is_success() {
        warn!(url = %url, status = response.status, "远程 JSON 请求失败");
        return Err(IoError::HttpStatus {
            url,
            status: response.status,
        });
    }
    let document = parse_document(&response.body)?;
    let label = label_for_url(&url);
    Ok(FetchedDocument {
        document,
        url,
        label,
    })
}
