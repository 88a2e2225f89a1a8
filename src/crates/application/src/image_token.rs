use crate::error::AppError;
use chrono::Utc;
use domain::image_token::{ImageToken, ImageTokenError};
use std::sync::Arc;

/// 代理路由前缀，签发的 token 以 `/img/{token}` 的形式嵌入页面
pub const IMAGE_PROXY_PATH: &str = "/img";

/// 图片 token 编解码器 trait
///
/// 应用层只依赖此 trait，具体的 AEAD 实现放在 infra 层。
/// 实现方必须在内部生成随机 nonce，调用方无法传入 nonce。
pub trait ImageTokenCodec: Send + Sync {
    fn encode(&self, payload: &ImageToken) -> Result<String, ImageTokenError>;

    /// 以给定时间解码并校验过期
    fn decode_at(&self, token: &str, now: i64) -> Result<ImageToken, ImageTokenError>;

    fn decode(&self, token: &str) -> Result<ImageToken, ImageTokenError> {
        self.decode_at(token, Utc::now().timestamp())
    }
}

/// 签发端服务：为图片 URL 生成不暴露原地址的代理 token
#[derive(Clone)]
pub struct ImageTokenIssuer {
    codec: Arc<dyn ImageTokenCodec>,
    ttl_secs: i64,
}

impl ImageTokenIssuer {
    /// `ttl_secs` 应与存储源预签名 URL 的有效期保持一致
    pub fn new(codec: Arc<dyn ImageTokenCodec>, ttl_secs: i64) -> Self {
        Self { codec, ttl_secs }
    }

    /// 以 `now + ttl` 作为过期时间签发 token
    pub fn issue(&self, url: &str) -> Result<String, AppError> {
        if self.ttl_secs <= 0 {
            return Err(AppError::InvalidInput(format!(
                "token ttl must be positive, got {}",
                self.ttl_secs
            )));
        }
        let exp = Utc::now()
            .timestamp()
            .checked_add(self.ttl_secs)
            .ok_or_else(|| {
                AppError::InvalidInput(format!("token ttl is too large: {}", self.ttl_secs))
            })?;
        self.issue_until(url, exp)
    }

    /// 以显式的过期时间签发 token
    pub fn issue_until(&self, url: &str, exp: i64) -> Result<String, AppError> {
        let payload = ImageToken::new(url, exp)?;
        Ok(self.codec.encode(&payload)?)
    }

    /// 签发并返回可直接放入 `<img src>` 的路径
    pub fn issue_path(&self, url: &str) -> Result<String, AppError> {
        self.issue(url).map(|token| Self::proxy_path(&token))
    }

    pub fn proxy_path(token: &str) -> String {
        format!("{}/{}", IMAGE_PROXY_PATH, token)
    }
}
