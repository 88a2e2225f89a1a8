//! AES-256-GCM 图片 token 编解码模块
//!
//! 把 `{url, exp}` 加密为可直接放进 URL 路径段的不透明字符串，
//! 页面中不会出现存储源的真实地址。

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use application::image_token::ImageTokenCodec;
use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use domain::image_token::{ImageToken, ImageTokenError};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// URL-safe base64：编码不带 padding，解码时 padding 可有可无
const TOKEN_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// 加密前的 JSON 载荷，字段顺序固定为 url、exp
#[derive(Debug, Serialize, Deserialize)]
struct TokenPayload {
    url: String,
    exp: i64,
}

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("secret is empty")]
    Empty,
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

/// AES-256-GCM 图片 token 编解码器
///
/// 格式: base64url(nonce + ciphertext)
/// - nonce: 12 bytes (96 bits)，每次编码随机生成
/// - ciphertext: 加密后的 JSON + 16 bytes auth tag
///
/// 持有一个有序密钥环：第一个为当前密钥（用于编码），
/// 其余为轮换前的旧密钥，仅用于解码。
#[derive(Clone)]
pub struct Aes256GcmTokenCodec {
    ciphers: Arc<Vec<Aes256Gcm>>,
}

impl Aes256GcmTokenCodec {
    /// 使用单个密钥创建编解码器
    pub fn new(secret: &str) -> Result<Self, KeyError> {
        Self::with_previous(secret, &[])
    }

    /// 使用当前密钥和旧密钥列表创建编解码器
    pub fn with_previous(current: &str, previous: &[String]) -> Result<Self, KeyError> {
        let mut ciphers = Vec::with_capacity(1 + previous.len());
        ciphers.push(Self::cipher_for(current)?);
        for secret in previous.iter().filter(|s| !s.is_empty()) {
            ciphers.push(Self::cipher_for(secret)?);
        }
        Ok(Self {
            ciphers: Arc::new(ciphers),
        })
    }

    fn cipher_for(secret: &str) -> Result<Aes256Gcm, KeyError> {
        let key_bytes = Self::derive_key(secret)?;
        Aes256Gcm::new_from_slice(&key_bytes).map_err(|e| KeyError::InvalidKey(e.to_string()))
    }

    /// 64 位十六进制字符串直接作为原始密钥，其余任意长度的密钥用 SHA-256 派生
    fn derive_key(secret: &str) -> Result<[u8; KEY_LEN], KeyError> {
        use sha2::{Digest, Sha256};
        if secret.is_empty() {
            return Err(KeyError::Empty);
        }
        let mut key_bytes = [0u8; KEY_LEN];
        if secret.len() == KEY_LEN * 2 && hex::decode_to_slice(secret, &mut key_bytes).is_ok() {
            return Ok(key_bytes);
        }
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        key_bytes.copy_from_slice(&hasher.finalize());
        Ok(key_bytes)
    }
}

impl ImageTokenCodec for Aes256GcmTokenCodec {
    fn encode(&self, payload: &ImageToken) -> Result<String, ImageTokenError> {
        let plain = serde_json::to_vec(&TokenPayload {
            url: payload.url().to_string(),
            exp: payload.exp(),
        })
        .map_err(|e| ImageTokenError::InvalidPayload(format!("serialize failed: {}", e)))?;

        // 生成随机 nonce (12 bytes)
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self.ciphers[0]
            .encrypt(nonce, plain.as_slice())
            .map_err(|e| ImageTokenError::InvalidPayload(format!("encryption failed: {}", e)))?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(TOKEN_ENGINE.encode(&combined))
    }

    fn decode_at(&self, token: &str, now: i64) -> Result<ImageToken, ImageTokenError> {
        if token.is_empty() {
            return Err(ImageTokenError::InvalidToken("token is empty".to_string()));
        }

        let combined = TOKEN_ENGINE
            .decode(token)
            .map_err(|e| ImageTokenError::InvalidToken(format!("base64 decode failed: {}", e)))?;

        // 最小长度 (12 bytes nonce + 16 bytes auth tag)
        if combined.len() < NONCE_LEN + TAG_LEN {
            return Err(ImageTokenError::InvalidToken("token too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        // 按密钥环顺序尝试，第一个通过认证的即为结果
        let plain = self
            .ciphers
            .iter()
            .find_map(|cipher| cipher.decrypt(nonce, ciphertext).ok())
            .ok_or_else(|| ImageTokenError::InvalidToken("authentication failed".to_string()))?;

        let payload: TokenPayload = serde_json::from_slice(&plain)
            .map_err(|e| ImageTokenError::InvalidToken(format!("malformed payload: {}", e)))?;

        ImageToken::new(payload.url, payload.exp)
            .map_err(|e| ImageTokenError::InvalidToken(e.to_string()))?
            .ensure_fresh_at(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const URL: &str = "https://storage.example/img123.jpg?sig=abc";

    fn payload(exp: i64) -> ImageToken {
        ImageToken::new(URL, exp).unwrap()
    }

    fn now() -> i64 {
        Utc::now().timestamp()
    }

    #[test]
    fn test_encode_decode() {
        let codec = Aes256GcmTokenCodec::new("test_secret_key").unwrap();
        let token = payload(now() + 2700);

        let encoded = codec.encode(&token).unwrap();
        assert_eq!(codec.decode(&encoded).unwrap(), token);
    }

    #[test]
    fn test_encoded_alphabet_is_url_safe() {
        let codec = Aes256GcmTokenCodec::new("test_secret_key").unwrap();
        for _ in 0..32 {
            let encoded = codec.encode(&payload(now() + 60)).unwrap();
            assert!(encoded
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        }
    }

    #[test]
    fn test_different_encryptions() {
        let codec = Aes256GcmTokenCodec::new("test_secret_key").unwrap();
        let token = payload(now() + 60);

        // 每次编码结果都不同（nonce 随机）
        let first = codec.encode(&token).unwrap();
        let second = codec.encode(&token).unwrap();
        assert_ne!(first, second);

        assert_eq!(codec.decode(&first).unwrap(), token);
        assert_eq!(codec.decode(&second).unwrap(), token);
    }

    #[test]
    fn test_padded_input_is_accepted() {
        let codec = Aes256GcmTokenCodec::new("test_secret_key").unwrap();
        let token = payload(now() + 60);
        let mut encoded = codec.encode(&token).unwrap();
        while encoded.len() % 4 != 0 {
            encoded.push('=');
        }
        assert_eq!(codec.decode(&encoded).unwrap(), token);
    }

    #[test]
    fn test_tampering_is_detected() {
        let codec = Aes256GcmTokenCodec::new("test_secret_key").unwrap();
        let encoded = codec.encode(&payload(now() + 60)).unwrap();
        let raw = TOKEN_ENGINE.decode(&encoded).unwrap();

        // 逐位翻转密文区域（nonce 之后）的每一个 bit
        for byte in NONCE_LEN..raw.len() {
            for bit in 0..8 {
                let mut tampered = raw.clone();
                tampered[byte] ^= 1 << bit;
                let result = codec.decode(&TOKEN_ENGINE.encode(&tampered));
                assert!(
                    matches!(result, Err(ImageTokenError::InvalidToken(_))),
                    "bit {} of byte {} was not detected",
                    bit,
                    byte
                );
            }
        }
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let codec = Aes256GcmTokenCodec::new("secret_a").unwrap();
        let other = Aes256GcmTokenCodec::new("secret_b").unwrap();
        let encoded = other.encode(&payload(now() + 60)).unwrap();

        assert!(matches!(
            codec.decode(&encoded),
            Err(ImageTokenError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_expired_token() {
        let codec = Aes256GcmTokenCodec::new("test_secret_key").unwrap();
        let exp = now() - 1;
        let encoded = codec.encode(&payload(exp)).unwrap();

        assert_eq!(
            codec.decode(&encoded),
            Err(ImageTokenError::TokenExpired { exp })
        );
        // 同一个 token 在过期之前可以正常解码
        assert!(codec.decode_at(&encoded, exp).is_ok());
    }

    #[test]
    fn test_invalid_data() {
        let codec = Aes256GcmTokenCodec::new("test_secret_key").unwrap();

        for token in ["", "not_valid_base64!!!", "YWJj", "a/b+c"] {
            assert!(
                matches!(codec.decode(token), Err(ImageTokenError::InvalidToken(_))),
                "{:?} should be invalid",
                token
            );
        }

        // 长度足够但无法通过认证
        let garbage = TOKEN_ENGINE.encode([7u8; 64]);
        assert!(matches!(
            codec.decode(&garbage),
            Err(ImageTokenError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_authentic_but_malformed_payload() {
        let codec = Aes256GcmTokenCodec::new("test_secret_key").unwrap();
        let seal = |plain: &[u8]| {
            let nonce_bytes = [1u8; NONCE_LEN];
            let ciphertext = codec.ciphers[0]
                .encrypt(Nonce::from_slice(&nonce_bytes), plain)
                .unwrap();
            let mut combined = nonce_bytes.to_vec();
            combined.extend_from_slice(&ciphertext);
            TOKEN_ENGINE.encode(&combined)
        };

        let cases: [&[u8]; 6] = [
            b"not json",
            br#"{"url":"https://storage.example/a.jpg"}"#,
            br#"{"exp":99999999999}"#,
            br#"{"url":"","exp":99999999999}"#,
            br#"{"url":"file:///etc/passwd","exp":99999999999}"#,
            br#"{"url":"https://storage.example/a.jpg","exp":"soon"}"#,
        ];
        for plain in cases {
            assert!(matches!(
                codec.decode(&seal(plain)),
                Err(ImageTokenError::InvalidToken(_))
            ));
        }
    }

    #[test]
    fn test_opacity() {
        let codec = Aes256GcmTokenCodec::new("test_secret_key").unwrap();
        let exp = now() + 60;
        let a = codec
            .encode(&ImageToken::new("https://storage.example/aaaa.jpg", exp).unwrap())
            .unwrap();
        let b = codec
            .encode(&ImageToken::new("https://storage.example/bbbb.jpg", exp).unwrap())
            .unwrap();

        assert_eq!(a.len(), b.len());
        assert!(!a.contains("storage"));
        // 两个 token 不应共享超过随机碰撞水平的子串
        let longest_common = (0..a.len())
            .flat_map(|i| (i + 1..=a.len()).map(move |j| (i, j)))
            .filter(|&(i, j)| b.contains(&a[i..j]))
            .map(|(i, j)| j - i)
            .max()
            .unwrap_or(0);
        assert!(longest_common < 8, "shared substring of {}", longest_common);
    }

    #[test]
    fn test_secret_rotation() {
        let old = Aes256GcmTokenCodec::new("old_secret").unwrap();
        let rotated =
            Aes256GcmTokenCodec::with_previous("new_secret", &["old_secret".to_string()]).unwrap();
        let token = payload(now() + 60);

        // 旧密钥签发的 token 在轮换后仍可解码
        let legacy = old.encode(&token).unwrap();
        assert_eq!(rotated.decode(&legacy).unwrap(), token);

        // 新 token 只用当前密钥加密
        let fresh = rotated.encode(&token).unwrap();
        assert!(old.decode(&fresh).is_err());
        assert_eq!(
            Aes256GcmTokenCodec::new("new_secret").unwrap().decode(&fresh).unwrap(),
            token
        );
    }

    #[test]
    fn test_key_derivation() {
        assert!(Aes256GcmTokenCodec::new("").is_err());

        let hex_secret = "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff";
        let raw = Aes256GcmTokenCodec::derive_key(hex_secret).unwrap();
        assert_eq!(raw[0], 0x00);
        assert_eq!(raw[1], 0x11);
        assert_eq!(raw[31], 0xff);

        // 非十六进制的任意密钥派生结果稳定
        assert_eq!(
            Aes256GcmTokenCodec::derive_key("short").unwrap(),
            Aes256GcmTokenCodec::derive_key("short").unwrap()
        );
        assert_ne!(
            Aes256GcmTokenCodec::derive_key("short").unwrap(),
            Aes256GcmTokenCodec::derive_key("shorter").unwrap()
        );
    }
}
