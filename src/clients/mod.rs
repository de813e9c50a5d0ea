//! 外部服务客户端
//!
//! 每个黑盒服务一个 trait，流水线只依赖 trait；
//! HTTP 实现都带单次调用超时。

pub mod ocr_client;
pub mod storage_client;
pub mod transcribe_client;
pub mod translate_client;

pub use ocr_client::{extract_ocr_text, HttpOcrClient, OcrService};
pub use storage_client::{HttpObjectStore, ObjectStore};
pub use transcribe_client::{HttpTranscriber, Transcriber, TranscriptSegment};
pub use translate_client::{LlmTranslator, Translator};

use std::time::Duration;

use crate::error::ServiceError;

/// 创建带超时的 HTTP 客户端
pub(crate) fn http_client(
    service: &'static str,
    timeout: Duration,
) -> Result<reqwest::Client, ServiceError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ServiceError::request(service, e))
}

/// 把 reqwest 错误转换为服务错误，超时单独区分
pub(crate) fn map_reqwest_error(
    service: &'static str,
    timeout: Duration,
    err: reqwest::Error,
) -> ServiceError {
    if err.is_timeout() {
        ServiceError::Timeout { service, timeout }
    } else {
        ServiceError::request(service, err)
    }
}

/// 检查响应状态，非 2xx 时读取响应体作为错误信息
pub(crate) async fn ensure_success(
    service: &'static str,
    timeout: Duration,
    response: reqwest::Response,
) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .map_err(|e| map_reqwest_error(service, timeout, e))?;
    Err(ServiceError::BadResponse {
        service,
        status: status.as_u16(),
        body: crate::utils::logging::truncate_text(&body, 200),
    })
}
