//! 内容项载荷的存储格式
//!
//! 下游读取方使用的字段名不统一：英文句子可能读 `english` / `answer` / `target`，
//! 中文可能读 `cn` / `translation`。内部只用 `SentencePayload`，
//! 写库时在这里展开成全部别名，读库时接受任意一个别名。

use serde_json::{json, Value};

use crate::models::SentencePayload;

const ENGLISH_KEYS: &[&str] = &["english", "answer", "target", "en"];
const TRANSLATION_KEYS: &[&str] = &["cn", "translation"];

/// 渲染为存储用的 JSON
pub fn to_stored(payload: &SentencePayload) -> Value {
    json!({
        "english": payload.english,
        "answer": payload.english,
        "target": payload.english,
        "cn": payload.translation,
        "translation": payload.translation,
        "pageNumber": payload.page_number,
        "round": {
            "index": payload.round_index,
            "order": payload.order_in_round,
        },
        "materialId": payload.material_id,
    })
}

/// 从存储的 JSON 还原，英文句子缺失时返回 None
pub fn from_stored(value: &Value) -> Option<SentencePayload> {
    let english = first_text(value, ENGLISH_KEYS)?;
    let translation = first_text(value, TRANSLATION_KEYS);
    let round = value.get("round");

    Some(SentencePayload {
        english,
        translation,
        page_number: value
            .get("pageNumber")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32,
        round_index: round
            .and_then(|r| r.get("index"))
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize,
        order_in_round: round
            .and_then(|r| r.get("order"))
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize,
        material_id: value
            .get("materialId")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

fn first_text(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(translation: Option<&str>) -> SentencePayload {
        SentencePayload {
            english: "I like apples.".to_string(),
            translation: translation.map(str::to_string),
            page_number: 3,
            round_index: 1,
            order_in_round: 2,
            material_id: "m1".to_string(),
        }
    }

    #[test]
    fn test_aliases_are_identical() {
        let stored = to_stored(&payload(Some("我喜欢苹果。")));
        assert_eq!(stored["english"], stored["answer"]);
        assert_eq!(stored["english"], stored["target"]);
        assert_eq!(stored["cn"], stored["translation"]);
        assert_eq!(stored["round"]["order"], 2);
    }

    #[test]
    fn test_missing_translation_is_null() {
        let stored = to_stored(&payload(None));
        assert!(stored["cn"].is_null());
        assert!(stored["translation"].is_null());
        assert_eq!(stored["english"], "I like apples.");
    }

    #[test]
    fn test_reader_accepts_any_alias() {
        let legacy = json!({"target": "We go to school.", "translation": "我们去上学。"});
        let parsed = from_stored(&legacy).unwrap();
        assert_eq!(parsed.english, "We go to school.");
        assert_eq!(parsed.translation.as_deref(), Some("我们去上学。"));
        assert_eq!(parsed.round_index, 0);

        assert_eq!(from_stored(&to_stored(&payload(None))), Some(payload(None)));
        assert!(from_stored(&json!({"cn": "只有中文"})).is_none());
    }
}
