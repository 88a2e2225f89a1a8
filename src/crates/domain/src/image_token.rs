use chrono::Utc;
use thiserror::Error;
use url::Url;

/// 图片 token 领域错误
///
/// 解码只会产生 `InvalidToken` 或 `TokenExpired` 两种失败，
/// `InvalidPayload` 仅在签发端构造 token 时出现。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageTokenError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("token expired at {exp}")]
    TokenExpired { exp: i64 },
}

/// 图片 token 的明文载荷
///
/// 签发后不可变；`exp` 为 Unix 秒，过期后代理必须拒绝，
/// 即使底层 URL 本身仍然有效。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageToken {
    url: String,
    exp: i64,
}

impl ImageToken {
    /// 构造载荷，要求 `url` 为绝对 http(s) 地址且 `exp` 为正数
    pub fn new(url: impl Into<String>, exp: i64) -> Result<Self, ImageTokenError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(ImageTokenError::InvalidPayload("url is empty".to_string()));
        }
        if exp <= 0 {
            return Err(ImageTokenError::InvalidPayload(format!(
                "exp must be positive, got {}",
                exp
            )));
        }
        let parsed = Url::parse(&url)
            .map_err(|e| ImageTokenError::InvalidPayload(format!("url is not absolute: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ImageTokenError::InvalidPayload(format!(
                "unsupported url scheme: {}",
                parsed.scheme()
            )));
        }
        Ok(Self { url, exp })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn exp(&self) -> i64 {
        self.exp
    }

    /// `now` 严格大于 `exp` 时视为过期
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.exp < now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp())
    }

    /// 剩余有效秒数，已过期时为 0
    pub fn remaining_secs_at(&self, now: i64) -> u64 {
        (self.exp - now).max(0) as u64
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs_at(Utc::now().timestamp())
    }

    /// 解码后的检查：载荷合法但已过期返回 `TokenExpired`
    pub fn ensure_fresh_at(self, now: i64) -> Result<Self, ImageTokenError> {
        if self.is_expired_at(now) {
            Err(ImageTokenError::TokenExpired { exp: self.exp })
        } else {
            Ok(self)
        }
    }
}
