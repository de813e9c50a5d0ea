use std::collections::BTreeSet;

/// 从素材中抽出、尚未打分的句子
#[derive(Debug, Clone, PartialEq)]
pub struct RawSentence {
    pub text: String,
    pub page_number: u32,
    pub material_id: String,
    /// 全任务范围内的发现顺序
    pub discovery_index: usize,
}

/// 打分、去重后的候选句，只在一次任务内存在
#[derive(Debug, Clone, PartialEq)]
pub struct SentenceCandidate {
    pub id: String,
    pub text: String,
    pub score: f64,
    pub tokens: BTreeSet<String>,
    pub page_number: u32,
    pub material_id: String,
    pub discovery_index: usize,
}

/// 分配到某一轮的句子
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedSentence {
    pub candidate: SentenceCandidate,
    /// 轮次（从 1 开始）
    pub round_index: usize,
    /// 轮内顺序（从 1 开始）
    pub order_in_round: usize,
}

impl SelectedSentence {
    pub fn text(&self) -> &str {
        &self.candidate.text
    }
}
