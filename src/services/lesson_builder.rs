//! 关卡草稿构建
//!
//! 每个入选句子生成一个只含一个 `sentence` 内容项的关卡。

use tracing::warn;

use crate::config::PipelineSettings;
use crate::models::{CoursePlan, LessonItemPlan, LessonItemType, LessonPlan, SentencePayload};
use crate::services::round_distributor::Rounds;

pub struct LessonPlanBuilder {
    difficulty: u8,
}

/// 载荷修复统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// 英文为空、用关卡简介补上的内容项
    pub repaired: usize,
    /// 无法修复而丢弃的关卡
    pub dropped_lessons: usize,
}

impl LessonPlanBuilder {
    pub fn new(settings: &PipelineSettings) -> Self {
        Self {
            difficulty: settings.default_difficulty,
        }
    }

    pub fn build(&self, rounds: &Rounds, source_names: &[String]) -> CoursePlan {
        let lessons: Vec<LessonPlan> = rounds
            .iter()
            .flatten()
            .map(|selected| {
                let text = selected.text().to_string();
                LessonPlan {
                    title: format!(
                        "Round {} · Sentence {}",
                        selected.round_index, selected.order_in_round
                    ),
                    summary: text.clone(),
                    difficulty: self.difficulty,
                    items: vec![LessonItemPlan {
                        item_type: LessonItemType::Sentence,
                        title: None,
                        payload: SentencePayload {
                            english: text,
                            translation: None,
                            page_number: selected.candidate.page_number,
                            round_index: selected.round_index,
                            order_in_round: selected.order_in_round,
                            material_id: selected.candidate.material_id.clone(),
                        },
                    }],
                }
            })
            .collect();

        let package_summary = format!(
            "根据 {} 自动抽取的 {} 个句子，分为 {} 轮练习",
            source_names.join("、"),
            lessons.len(),
            rounds.len()
        );

        CoursePlan {
            package_summary,
            lessons,
        }
    }
}

/// 保证每个内容项都有非空英文句子
///
/// 英文为空时用关卡简介补上；简介也为空的内容项被删除，没有内容项的关卡被丢弃。
pub fn repair_payloads(plan: &mut CoursePlan) -> RepairReport {
    let mut report = RepairReport::default();

    for lesson in plan.lessons.iter_mut() {
        let summary = lesson.summary.trim().to_string();
        lesson.items.retain_mut(|item| {
            if !item.payload.english.trim().is_empty() {
                return true;
            }
            if summary.is_empty() {
                return false;
            }
            item.payload.english = summary.clone();
            report.repaired += 1;
            true
        });
    }

    let before = plan.lessons.len();
    plan.lessons.retain(|lesson| {
        let keep = !lesson.items.is_empty();
        if !keep {
            warn!("关卡 {} 没有可用的句子，已丢弃", lesson.title);
        }
        keep
    });
    report.dropped_lessons = before - plan.lessons.len();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SelectedSentence, SentenceCandidate};
    use std::collections::BTreeSet;

    fn selected(text: &str, round: usize, order: usize) -> SelectedSentence {
        SelectedSentence {
            candidate: SentenceCandidate {
                id: format!("cand-{}-{}", round, order),
                text: text.to_string(),
                score: 1.0,
                tokens: BTreeSet::new(),
                page_number: 4,
                material_id: "m1".to_string(),
                discovery_index: 0,
            },
            round_index: round,
            order_in_round: order,
        }
    }

    #[test]
    fn test_one_lesson_per_sentence() {
        let rounds = vec![
            vec![selected("I like apples.", 1, 1), selected("We go to school.", 1, 2)],
            vec![selected("They play games.", 2, 1)],
        ];
        let plan = LessonPlanBuilder::new(&PipelineSettings::default())
            .build(&rounds, &["page-4.png".to_string()]);

        assert_eq!(plan.lessons.len(), 3);
        assert_eq!(plan.item_count(), 3);
        assert_eq!(plan.lessons[1].title, "Round 1 · Sentence 2");
        assert_eq!(plan.lessons[2].title, "Round 2 · Sentence 1");
        assert_eq!(plan.lessons[0].summary, "I like apples.");
        assert_eq!(plan.lessons[0].difficulty, 2);

        let payload = &plan.lessons[2].items[0].payload;
        assert_eq!(payload.english, "They play games.");
        assert_eq!(payload.translation, None);
        assert_eq!(payload.page_number, 4);
        assert_eq!((payload.round_index, payload.order_in_round), (2, 1));
        assert!(plan.package_summary.contains("page-4.png"));
    }

    #[test]
    fn test_repair_falls_back_to_summary_or_drops() {
        let rounds = vec![vec![selected("I like apples.", 1, 1), selected("We go to school.", 1, 2)]];
        let mut plan = LessonPlanBuilder::new(&PipelineSettings::default()).build(&rounds, &[]);
        plan.lessons[0].items[0].payload.english = "  ".to_string();
        plan.lessons[1].items[0].payload.english.clear();
        plan.lessons[1].summary.clear();

        let report = repair_payloads(&mut plan);
        assert_eq!(report.repaired, 1);
        assert_eq!(report.dropped_lessons, 1);
        assert_eq!(plan.lessons.len(), 1);
        assert_eq!(plan.lessons[0].items[0].payload.english, "I like apples.");
    }
}
