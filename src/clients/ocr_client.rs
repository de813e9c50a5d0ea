/// OCR 服务客户端
///
/// 不同 OCR 供应商的响应结构差别很大，`extract_ocr_text` 负责从任意形状的
/// JSON 里找出识别文本。
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::{ensure_success, http_client, map_reqwest_error};
use crate::config::Config;
use crate::error::ServiceError;

const SERVICE: &str = "ocr";

/// 直接存放文本的字段
const DIRECT_KEYS: &[&str] = &[
    "content",
    "Content",
    "fullText",
    "FullText",
    "text",
    "Text",
    "ocr_text",
    "ocrText",
    "OCRText",
    "outputText",
    "OutputText",
];

/// 需要继续向下解包的字段
const NESTED_KEYS: &[&str] = &[
    "data",
    "Data",
    "result",
    "Result",
    "payload",
    "Payload",
    "value",
    "Value",
    "outputs",
    "Outputs",
    "outputValue",
    "OutputValue",
    "dataValue",
    "DataValue",
];

/// 按词 / 按行返回的数组字段
const ARRAY_KEYS: &[&str] = &[
    "prism_wordsInfo",
    "PrismWordsInfo",
    "wordsInfo",
    "WordsInfo",
    "words",
    "Words",
    "lineContents",
    "LineContents",
    "lines",
    "Lines",
    "contents",
    "Contents",
];

/// 数组元素里存放文本的字段
const ENTRY_KEYS: &[&str] = &[
    "word", "Word", "text", "Text", "content", "Content", "line", "Line",
];

const MAX_DEPTH: usize = 16;

#[async_trait]
pub trait OcrService: Send + Sync {
    /// 识别图片中的文本，没有文字时返回空字符串
    async fn recognize(&self, image_url: &str) -> Result<String, ServiceError>;
}

/// HTTP OCR 客户端
pub struct HttpOcrClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    timeout: Duration,
}

impl HttpOcrClient {
    pub fn new(config: &Config) -> Result<Self, ServiceError> {
        let timeout = config.service_timeout();
        Ok(Self {
            http: http_client(SERVICE, timeout)?,
            api_url: config.ocr_api_url.clone(),
            api_key: config.ocr_api_key.clone(),
            timeout,
        })
    }
}

#[async_trait]
impl OcrService for HttpOcrClient {
    async fn recognize(&self, image_url: &str) -> Result<String, ServiceError> {
        debug!("请求 OCR: {}", crate::utils::logging::truncate_text(image_url, 80));
        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "imageUrl": image_url }))
            .send()
            .await
            .map_err(|e| map_reqwest_error(SERVICE, self.timeout, e))?;

        let response = ensure_success(SERVICE, self.timeout, response).await?;
        let raw: Value = response.json().await.map_err(|e| ServiceError::Parse {
            service: SERVICE,
            message: e.to_string(),
        })?;

        Ok(extract_ocr_text(&raw))
    }
}

/// 从 OCR 响应中提取文本
///
/// 先剥掉 `body` / `data` 外壳，再按字段优先级递归查找；
/// 字符串形式的 JSON 会被再解析一次。
pub fn extract_ocr_text(raw: &Value) -> String {
    let body = non_null(raw, &["body"]).unwrap_or(raw);
    let data = non_null(body, &["data", "Data"]).unwrap_or(body);
    extract_recursive(data, 0)
}

fn non_null<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .find(|v| !v.is_null())
}

fn extract_recursive(value: &Value, depth: usize) -> String {
    if depth > MAX_DEPTH {
        return String::new();
    }

    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            let looks_like_json = (trimmed.starts_with('{') && trimmed.ends_with('}'))
                || (trimmed.starts_with('[') && trimmed.ends_with(']'));
            if looks_like_json {
                if let Ok(parsed) = serde_json::from_str::<Value>(trimmed) {
                    return extract_recursive(&parsed, depth + 1);
                }
            }
            trimmed.to_string()
        }
        Value::Array(items) => {
            let joined = collect_from_array(items);
            if !joined.is_empty() {
                return joined;
            }
            items
                .iter()
                .map(|item| extract_recursive(item, depth + 1))
                .find(|text| !text.is_empty())
                .unwrap_or_default()
        }
        Value::Object(record) => {
            for key in DIRECT_KEYS {
                if let Some(Value::String(text)) = record.get(*key) {
                    if !text.trim().is_empty() {
                        return text.clone();
                    }
                }
            }

            for key in NESTED_KEYS {
                if let Some(nested) = record.get(*key) {
                    let text = extract_recursive(nested, depth + 1);
                    if !text.is_empty() {
                        return text;
                    }
                }
            }

            for key in ARRAY_KEYS {
                if let Some(Value::Array(items)) = record.get(*key) {
                    let text = collect_from_array(items);
                    if !text.is_empty() {
                        return text;
                    }
                }
            }

            String::new()
        }
        _ => String::new(),
    }
}

/// 数组元素可以是字符串，也可以是带 word / text / line 字段的对象
fn collect_from_array(items: &[Value]) -> String {
    items
        .iter()
        .filter_map(|entry| match entry {
            Value::String(s) => Some(s.as_str()),
            Value::Object(_) => non_null(entry, ENTRY_KEYS).and_then(Value::as_str),
            _ => None,
        })
        .filter(|s| !s.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_field() {
        let raw = json!({"text": "I get up at six."});
        assert_eq!(extract_ocr_text(&raw), "I get up at six.");
    }

    #[test]
    fn test_body_and_data_wrappers() {
        let raw = json!({
            "body": {
                "Data": {
                    "Result": {"FullText": "We go to school by bus."}
                }
            }
        });
        assert_eq!(extract_ocr_text(&raw), "We go to school by bus.");
    }

    #[test]
    fn test_stringified_json_payload() {
        let raw = json!({
            "data": "{\"content\": \"She often reads books.\"}"
        });
        assert_eq!(extract_ocr_text(&raw), "She often reads books.");
    }

    #[test]
    fn test_word_arrays_are_joined_by_line() {
        let raw = json!({
            "data": {
                "prism_wordsInfo": [
                    {"word": "Hello there."},
                    {"word": "  "},
                    {"word": "How are you?"}
                ]
            }
        });
        assert_eq!(extract_ocr_text(&raw), "Hello there.\nHow are you?");
    }

    #[test]
    fn test_unknown_shape_yields_empty() {
        assert_eq!(extract_ocr_text(&json!({"code": 200, "count": 3})), "");
        assert_eq!(extract_ocr_text(&Value::Null), "");
    }
}
