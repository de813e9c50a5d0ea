/// 对象存储客户端
///
/// 素材上传后只在对象存储里，流水线需要两种访问方式：
/// 直接下载字节（文档），或者签名链接（交给 OCR / 语音识别服务去拉取）。
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::{ensure_success, http_client, map_reqwest_error};
use crate::config::Config;
use crate::error::ServiceError;

const SERVICE: &str = "storage";

/// 签名链接有效期
const SIGNED_URL_TTL_SECS: u64 = 600;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// 下载对象内容
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, ServiceError>;

    /// 生成可供外部服务访问的签名链接
    async fn signed_url(&self, locator: &str) -> Result<String, ServiceError>;
}

/// 兼容 Supabase Storage 接口的 HTTP 实现
pub struct HttpObjectStore {
    http: reqwest::Client,
    base_url: String,
    token: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

impl HttpObjectStore {
    pub fn new(config: &Config) -> Result<Self, ServiceError> {
        let timeout = config.service_timeout();
        Ok(Self {
            http: http_client(SERVICE, timeout)?,
            base_url: config.storage_base_url.trim_end_matches('/').to_string(),
            token: config.storage_token.clone(),
            timeout,
        })
    }

    fn object_url(&self, locator: &str) -> String {
        format!("{}/object/{}", self.base_url, locator.trim_start_matches('/'))
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, ServiceError> {
        debug!("下载素材: {}", locator);
        let response = self
            .http
            .get(self.object_url(locator))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| map_reqwest_error(SERVICE, self.timeout, e))?;

        let response = ensure_success(SERVICE, self.timeout, response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(SERVICE, self.timeout, e))?;
        Ok(bytes.to_vec())
    }

    async fn signed_url(&self, locator: &str) -> Result<String, ServiceError> {
        let url = format!(
            "{}/object/sign/{}",
            self.base_url,
            locator.trim_start_matches('/')
        );
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(&json!({ "expiresIn": SIGNED_URL_TTL_SECS }))
            .send()
            .await
            .map_err(|e| map_reqwest_error(SERVICE, self.timeout, e))?;

        let response = ensure_success(SERVICE, self.timeout, response).await?;
        let signed: SignResponse = response.json().await.map_err(|e| ServiceError::Parse {
            service: SERVICE,
            message: e.to_string(),
        })?;

        if signed.signed_url.starts_with("http") {
            Ok(signed.signed_url)
        } else {
            Ok(format!("{}{}", self.base_url, signed.signed_url))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_url_joins_cleanly() {
        let config = Config {
            storage_base_url: "http://storage.local/v1/".to_string(),
            ..Config::default()
        };
        let store = HttpObjectStore::new(&config).unwrap();
        assert_eq!(
            store.object_url("/uploads/a.png"),
            "http://storage.local/v1/object/uploads/a.png"
        );
    }

    #[test]
    fn test_sign_response_accepts_both_spellings() {
        let a: SignResponse = serde_json::from_str(r#"{"signedURL": "/x?token=1"}"#).unwrap();
        let b: SignResponse = serde_json::from_str(r#"{"signedUrl": "/y?token=2"}"#).unwrap();
        assert_eq!(a.signed_url, "/x?token=1");
        assert_eq!(b.signed_url, "/y?token=2");
    }
}
