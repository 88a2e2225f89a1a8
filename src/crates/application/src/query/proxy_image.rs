use crate::image_token::ImageTokenCodec;
use async_trait::async_trait;
use bytes::Bytes;
use domain::image_token::ImageTokenError;
use std::sync::Arc;
use thiserror::Error;

/// 上游未返回 Content-Type 时使用的默认类型
pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

/// 上游返回的图片数据
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub data: Bytes,
    pub content_type: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// 连接失败、超时、读取响应体失败
    #[error("transport error: {0}")]
    Transport(String),
    #[error("upstream responded with status {0}")]
    Status(u16),
    #[error("upstream body exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

/// 图片抓取器 trait
///
/// 每次调用只发起一次 GET 请求，不做重试。
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError>;
}

/// 代理结果：图片数据、类型以及剩余可缓存秒数
#[derive(Debug, Clone)]
pub struct ProxiedImage {
    pub data: Bytes,
    pub content_type: String,
    pub max_age: u64,
}

/// 代理失败分类
///
/// `UpstreamAuthLapsed` 与 `TokenExpired` 对调用方呈现为同一状态，
/// 不向外暴露上游鉴权细节。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProxyError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("token expired")]
    TokenExpired,
    #[error("upstream resource not found")]
    UpstreamNotFound,
    #[error("upstream authorization lapsed (status {0})")]
    UpstreamAuthLapsed(u16),
    #[error("upstream failure: {0}")]
    UpstreamFailure(String),
    #[error("server misconfigured: {0}")]
    ServerMisconfigured(String),
}

impl From<ImageTokenError> for ProxyError {
    fn from(err: ImageTokenError) -> Self {
        match err {
            ImageTokenError::TokenExpired { .. } => ProxyError::TokenExpired,
            ImageTokenError::InvalidToken(msg) | ImageTokenError::InvalidPayload(msg) => {
                ProxyError::InvalidToken(msg)
            }
        }
    }
}

impl From<FetchError> for ProxyError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Status(404) => ProxyError::UpstreamNotFound,
            FetchError::Status(status @ (401 | 403)) => ProxyError::UpstreamAuthLapsed(status),
            other => ProxyError::UpstreamFailure(other.to_string()),
        }
    }
}

/// 图片代理用例：解码 token、抓取上游、计算缓存时长
pub struct ProxyImage {
    /// 未配置密钥时为 None
    codec: Option<Arc<dyn ImageTokenCodec>>,
    fetcher: Arc<dyn ImageFetcher>,
}

impl ProxyImage {
    pub fn new(codec: Option<Arc<dyn ImageTokenCodec>>, fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self { codec, fetcher }
    }

    pub async fn handle(&self, raw_token: &str) -> Result<ProxiedImage, ProxyError> {
        if raw_token.trim().is_empty() {
            return Err(ProxyError::BadRequest("missing token".to_string()));
        }

        let codec = self.codec.as_ref().ok_or_else(|| {
            ProxyError::ServerMisconfigured("image token secret is not provisioned".to_string())
        })?;

        let payload = codec.decode(raw_token)?;
        let fetched = self.fetcher.fetch(payload.url()).await?;

        // 在抓取完成后计算，避免缓存时间超过 token 的实际剩余寿命
        let max_age = payload.remaining_secs();
        let content_type = fetched
            .content_type
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        Ok(ProxiedImage {
            data: fetched.data,
            content_type,
            max_age,
        })
    }
}
