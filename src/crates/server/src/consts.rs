pub use application::image_token::IMAGE_PROXY_PATH as URL_PATH_IMAGE_PROXY;

pub const URL_PATH_HEALTH: &str = "/healthz";

/// 错误响应不允许缓存
pub const ERROR_CACHE_CONTROL: &str = "no-store";
