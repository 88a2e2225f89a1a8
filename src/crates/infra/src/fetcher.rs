use application::query::proxy_image::{FetchError, FetchedImage, ImageFetcher};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client as ReqwestClient;
use std::time::Duration;

/// 基于 reqwest 的上游图片抓取器
///
/// 只发起一次 GET，不重试；超时和响应体大小上限由配置决定。
/// 错误信息中去掉了上游 URL，避免写入日志。
#[derive(Clone)]
pub struct ReqwestImageFetcher {
    client: ReqwestClient,
    max_bytes: usize,
}

impl ReqwestImageFetcher {
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self, reqwest::Error> {
        let client = ReqwestClient::builder().timeout(timeout).build()?;
        Ok(Self { client, max_bytes })
    }
}

#[async_trait]
impl ImageFetcher for ReqwestImageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError> {
        let mut resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(format!("request failed: {}", e.without_url())))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        if let Some(len) = resp.content_length() {
            if len > self.max_bytes as u64 {
                return Err(FetchError::TooLarge {
                    limit: self.max_bytes,
                });
            }
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        // Content-Length 可能缺失或不可信，边读边检查
        let mut body = BytesMut::new();
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| FetchError::Transport(format!("failed to read body: {}", e.without_url())))?
        {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(FetchedImage {
            data: Bytes::from(body),
            content_type,
        })
    }
}
