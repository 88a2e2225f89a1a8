pub mod config;
pub use config::{AppConfigImpl, ImageProxyConfig, ServerConfig};

pub mod crypto;
pub use crypto::Aes256GcmTokenCodec;

pub mod fetcher;
pub use fetcher::ReqwestImageFetcher;
