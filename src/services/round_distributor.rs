//! 轮次分配
//!
//! 候选池按页码顺序轮流放入各轮，满的轮跳过。
//! 实际使用的轮数为 `min(R, ceil(N / C))`，句子少时不会摊薄成很多小轮。

use crate::config::PipelineSettings;
use crate::error::{PipelineError, Result};
use crate::models::{SelectedSentence, SentenceCandidate};

/// 分配结果：按轮次顺序，每轮内按 (页码, 分数) 排好
pub type Rounds = Vec<Vec<SelectedSentence>>;

pub struct RoundDistributor {
    round_count: usize,
    round_capacity: usize,
}

impl RoundDistributor {
    pub fn new(settings: &PipelineSettings) -> Self {
        Self {
            round_count: settings.round_count.max(1),
            round_capacity: settings.round_capacity.max(1),
        }
    }

    /// 实际使用的轮数
    pub fn effective_rounds(&self, pool_size: usize) -> usize {
        pool_size
            .div_ceil(self.round_capacity)
            .clamp(1, self.round_count)
    }

    /// 分配候选句
    ///
    /// `limit` 为任务期望的句子上限（素材的 lessonCountHint），为 0 时忽略。
    pub fn distribute(&self, pool: Vec<SentenceCandidate>, limit: Option<usize>) -> Result<Rounds> {
        let mut cap = self.round_count * self.round_capacity;
        if let Some(limit) = limit.filter(|l| *l > 0) {
            cap = cap.min(limit);
        }

        let pool: Vec<SentenceCandidate> = pool.into_iter().take(cap).collect();
        if pool.is_empty() {
            return Err(PipelineError::NoUsableSentences);
        }

        let rounds = self.effective_rounds(pool.len());
        let mut buckets: Vec<Vec<SentenceCandidate>> = vec![Vec::new(); rounds];
        let mut cursor = 0;

        for candidate in pool {
            if buckets.iter().all(|b| b.len() >= self.round_capacity) {
                break;
            }
            while buckets[cursor].len() >= self.round_capacity {
                cursor = (cursor + 1) % rounds;
            }
            buckets[cursor].push(candidate);
            cursor = (cursor + 1) % rounds;
        }

        Ok(buckets
            .into_iter()
            .enumerate()
            .filter(|(_, bucket)| !bucket.is_empty())
            .map(|(index, mut bucket)| {
                bucket.sort_by(|a, b| {
                    a.page_number
                        .cmp(&b.page_number)
                        .then_with(|| b.score.total_cmp(&a.score))
                        .then_with(|| a.discovery_index.cmp(&b.discovery_index))
                });
                bucket
                    .into_iter()
                    .enumerate()
                    .map(|(order, candidate)| SelectedSentence {
                        candidate,
                        round_index: index + 1,
                        order_in_round: order + 1,
                    })
                    .collect()
            })
            .collect())
    }
}
