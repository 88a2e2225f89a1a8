pub mod consts;
pub mod health;
pub mod image_proxy;
pub mod middleware;

use application::error::AppError;
use application::image_token::{ImageTokenCodec, ImageTokenIssuer};
use application::query::proxy_image::ImageFetcher;
use infra::config::AppConfigImpl;
use infra::ReqwestImageFetcher;
use std::sync::Arc;

pub struct AppState {
    pub app_cfg: AppConfigImpl,
    /// 未配置密钥时为 None，图片代理返回 500
    pub token_codec: Option<Arc<dyn ImageTokenCodec>>,
    pub fetcher: Arc<dyn ImageFetcher>,
}

impl AppState {
    pub fn new(app_cfg: AppConfigImpl) -> Result<Self, AppError> {
        use log::{error, info};

        let proxy_cfg = app_cfg.image_proxy();
        let token_codec: Option<Arc<dyn ImageTokenCodec>> = match proxy_cfg
            .token_codec()
            .map_err(|e| AppError::ConfigError(e.to_string()))?
        {
            Some(codec) => {
                info!(
                    "Image token codec initialized ({} previous secret(s))",
                    proxy_cfg.previous_secrets.len()
                );
                Some(Arc::new(codec))
            }
            None => {
                error!("image_proxy.secret is not set, image proxy requests will fail with 500");
                None
            }
        };

        let fetcher = ReqwestImageFetcher::new(proxy_cfg.fetch_timeout(), proxy_cfg.max_image_bytes)
            .map_err(|e| AppError::ConfigError(format!("Failed to build http client: {}", e)))?;

        Ok(Self {
            app_cfg,
            token_codec,
            fetcher: Arc::new(fetcher),
        })
    }

    pub fn with_parts(
        app_cfg: AppConfigImpl,
        token_codec: Option<Arc<dyn ImageTokenCodec>>,
        fetcher: Arc<dyn ImageFetcher>,
    ) -> Self {
        Self {
            app_cfg,
            token_codec,
            fetcher,
        }
    }

    /// 签发端使用的 token 服务，未配置密钥时返回 None
    pub fn token_issuer(&self) -> Option<ImageTokenIssuer> {
        let ttl_secs = self.app_cfg.image_proxy().token_ttl_secs;
        self.token_codec
            .clone()
            .map(|codec| ImageTokenIssuer::new(codec, ttl_secs))
    }
}
