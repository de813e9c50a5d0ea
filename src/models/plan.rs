use serde::{Deserialize, Serialize};

/// 关卡内容项类型
///
/// 生成流水线只产出 `sentence`，其余类型由人工编辑添加。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonItemType {
    Sentence,
}

impl LessonItemType {
    pub fn as_str(self) -> &'static str {
        match self {
            LessonItemType::Sentence => "sentence",
        }
    }
}

/// 句子内容项的规范载荷
///
/// 存储层的历史字段别名由 `services::payload_compat` 负责转换。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentencePayload {
    pub english: String,
    pub translation: Option<String>,
    pub page_number: u32,
    pub round_index: usize,
    pub order_in_round: usize,
    pub material_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonItemPlan {
    pub item_type: LessonItemType,
    pub title: Option<String>,
    pub payload: SentencePayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonPlan {
    pub title: String,
    pub summary: String,
    pub difficulty: u8,
    pub items: Vec<LessonItemPlan>,
}

/// 课程草稿，对应一个新的 draft 版本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoursePlan {
    pub package_summary: String,
    pub lessons: Vec<LessonPlan>,
}

impl CoursePlan {
    pub fn item_count(&self) -> usize {
        self.lessons.iter().map(|l| l.items.len()).sum()
    }

    /// 所有内容项载荷（可变）
    pub fn payloads_mut(&mut self) -> impl Iterator<Item = &mut SentencePayload> {
        self.lessons
            .iter_mut()
            .flat_map(|l| l.items.iter_mut())
            .map(|item| &mut item.payload)
    }
}
