use crate::crypto::{Aes256GcmTokenCodec, KeyError};
use config::{Config, Environment, File, FileFormat};
use dotenvy::dotenv;
use serde::{Deserialize, Deserializer};
use std::error::Error;
use std::time::Duration;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawConfig {
    /// 服务器配置
    server: RawServerConfig,
    /// 图片代理配置
    image_proxy: RawImageProxyConfig,
}

/// 服务器配置（原始配置）
#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawServerConfig {
    /// 监听地址
    host: String,
    /// 监听端口
    port: u16,
}

impl Default for RawServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5533,
        }
    }
}

/// 图片代理配置（原始配置）
#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawImageProxyConfig {
    /// 当前密钥，为空表示未配置
    secret: String,
    /// 轮换前的旧密钥，仅用于解码；环境变量中以逗号分隔
    #[serde(deserialize_with = "list_or_comma_separated")]
    previous_secrets: Vec<String>,
    /// 签发 token 的有效期（秒），与存储源预签名 URL 的有效期一致
    token_ttl_secs: i64,
    /// 上游抓取超时（秒）
    fetch_timeout_secs: u64,
    /// 上游响应体大小上限（字节）
    max_image_bytes: usize,
}

impl Default for RawImageProxyConfig {
    fn default() -> Self {
        Self {
            secret: "".to_string(),
            previous_secrets: vec![],
            token_ttl_secs: 45 * 60,
            fetch_timeout_secs: 10,
            max_image_bytes: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// TOML 数组或环境变量中的 `a,b` 字符串
fn list_or_comma_separated<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListOrString {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match ListOrString::deserialize(deserializer)? {
        ListOrString::List(items) => items,
        ListOrString::Joined(joined) => joined
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    })
}

/// 服务器配置
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
}

/// 图片代理配置
#[derive(Clone)]
pub struct ImageProxyConfig {
    pub secret: String,
    pub previous_secrets: Vec<String>,
    pub token_ttl_secs: i64,
    pub fetch_timeout_secs: u64,
    pub max_image_bytes: usize,
}

// 不打印密钥
impl std::fmt::Debug for ImageProxyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageProxyConfig")
            .field("secret", &if self.secret.is_empty() { "<unset>" } else { "<redacted>" })
            .field("previous_secrets", &self.previous_secrets.len())
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("max_image_bytes", &self.max_image_bytes)
            .finish()
    }
}

impl ImageProxyConfig {
    pub fn is_configured(&self) -> bool {
        !self.secret.trim().is_empty()
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// 根据配置构建编解码器；未配置密钥时返回 None
    pub fn token_codec(&self) -> Result<Option<Aes256GcmTokenCodec>, KeyError> {
        if !self.is_configured() {
            return Ok(None);
        }
        Aes256GcmTokenCodec::with_previous(&self.secret, &self.previous_secrets).map(Some)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfigImpl {
    server: ServerConfig,
    image_proxy: ImageProxyConfig,
}

impl AppConfigImpl {
    fn new(data: RawConfig) -> Self {
        let server_config = ServerConfig {
            host: data.server.host,
            port: data.server.port,
        };
        let image_proxy_config = ImageProxyConfig {
            secret: data.image_proxy.secret,
            previous_secrets: data.image_proxy.previous_secrets,
            token_ttl_secs: data.image_proxy.token_ttl_secs,
            fetch_timeout_secs: data.image_proxy.fetch_timeout_secs,
            max_image_bytes: data.image_proxy.max_image_bytes,
        };
        AppConfigImpl {
            server: server_config,
            image_proxy: image_proxy_config,
        }
    }

    pub fn server(&self) -> ServerConfig {
        self.server.clone()
    }

    pub fn image_proxy(&self) -> ImageProxyConfig {
        self.image_proxy.clone()
    }

    pub fn load() -> Result<AppConfigImpl, Box<dyn Error>> {
        dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name("config").required(false))
            // 环境变量一律按字符串读取，密钥不能被当作数字解析
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        let raw: RawConfig = config.try_deserialize()?; // serde 自动填充默认值
        Ok(AppConfigImpl::new(raw))
    }

    /// 从 TOML 字符串加载（不读取环境变量）
    pub fn from_toml(content: &str) -> Result<AppConfigImpl, Box<dyn Error>> {
        let config = Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;
        let raw: RawConfig = config.try_deserialize()?;
        Ok(AppConfigImpl::new(raw))
    }
}
