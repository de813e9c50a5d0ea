/// 语音识别客户端
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use super::{ensure_success, http_client, map_reqwest_error};
use crate::config::Config;
use crate::error::ServiceError;

const SERVICE: &str = "transcribe";

/// 带时间戳的识别片段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptSegment {
    pub text: String,
    #[serde(default)]
    pub start_ms: u64,
    #[serde(default)]
    pub end_ms: u64,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_url: &str) -> Result<Vec<TranscriptSegment>, ServiceError>;
}

pub struct HttpTranscriber {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    timeout: Duration,
}

impl HttpTranscriber {
    pub fn new(config: &Config) -> Result<Self, ServiceError> {
        let timeout = config.service_timeout();
        Ok(Self {
            http: http_client(SERVICE, timeout)?,
            api_url: config.transcribe_api_url.clone(),
            api_key: config.transcribe_api_key.clone(),
            timeout,
        })
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, audio_url: &str) -> Result<Vec<TranscriptSegment>, ServiceError> {
        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "audioUrl": audio_url }))
            .send()
            .await
            .map_err(|e| map_reqwest_error(SERVICE, self.timeout, e))?;

        let response = ensure_success(SERVICE, self.timeout, response).await?;
        let raw: Value = response.json().await.map_err(|e| ServiceError::Parse {
            service: SERVICE,
            message: e.to_string(),
        })?;

        parse_segments(raw)
    }
}

/// 响应可以是片段数组，也可以是 `{"segments": [...]}`
fn parse_segments(raw: Value) -> Result<Vec<TranscriptSegment>, ServiceError> {
    let list = match raw {
        Value::Object(mut map) => map.remove("segments").unwrap_or(Value::Array(Vec::new())),
        other => other,
    };
    serde_json::from_value(list).map_err(|e| ServiceError::Parse {
        service: SERVICE,
        message: e.to_string(),
    })
}

/// 每个片段一行
pub fn segments_to_text(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
