//! 草稿落库 - 业务能力层
//!
//! 一个课程包至多一个草稿版本：
//! - 整包模式：删除旧草稿及其关卡，新建草稿版本，序号从 1 开始
//! - 单元模式：沿用已有草稿（没有则新建），只删除该单元的关卡，序号接在剩余关卡之后
//!
//! 每个关卡单独一个短事务；序号冲突时序号加一重试该关卡，次数有上限。

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::PipelineSettings;
use crate::error::{PipelineError, Result, StoreError};
use crate::models::{CoursePlan, LessonPlan};
use crate::services::payload_compat;
use crate::store::{CourseStore, NewLesson, NewLessonItem, NewVersion, PackageVersion};

/// 落库参数
#[derive(Debug, Clone)]
pub struct CommitRequest {
    pub package_id: String,
    pub unit_id: Option<String>,
    pub triggered_by: Option<String>,
    /// 素材原始文件名，写入版本备注
    pub source_names: Vec<String>,
}

/// 落库结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub version_id: String,
    pub version_number: u32,
    /// 本次写入的关卡数
    pub lesson_count: usize,
    /// 替换掉的旧关卡数
    pub replaced_lessons: usize,
    /// 序号冲突重试次数
    pub sequence_retries: u32,
    /// 回读数量与预期不一致时为 (预期, 实际)
    pub count_mismatch: Option<(usize, usize)>,
}

pub struct PersistenceCommitter {
    courses: Arc<dyn CourseStore>,
    sequence_attempts: u32,
}

impl PersistenceCommitter {
    pub fn new(courses: Arc<dyn CourseStore>, settings: &PipelineSettings) -> Self {
        Self {
            courses,
            sequence_attempts: settings.sequence_retry_attempts.max(1),
        }
    }

    pub async fn commit(&self, plan: &CoursePlan, request: &CommitRequest) -> Result<CommitOutcome> {
        // 确认课程包存在
        self.courses.get_package(&request.package_id).await?;

        let (version, replaced_lessons) = match &request.unit_id {
            None => self.replace_draft(request).await?,
            Some(unit_id) => self.reuse_draft(request, unit_id).await?,
        };

        let remaining = self.courses.count_lessons(&version.id).await?;
        let mut next_sequence = self.courses.max_lesson_sequence(&version.id).await? + 1;
        let mut sequence_retries = 0;

        for lesson in &plan.lessons {
            sequence_retries += self
                .commit_lesson(&version, lesson, request, &mut next_sequence)
                .await?;
        }

        self.courses
            .update_version_payload(&version.id, plan_snapshot(plan))
            .await?;
        self.courses
            .set_current_version(&request.package_id, &version.id, &plan.package_summary)
            .await?;

        let expected = remaining + plan.lessons.len();
        let actual = self.courses.count_lessons(&version.id).await?;
        let count_mismatch = if actual != expected {
            warn!(
                "关卡数量回读不一致: 预期 {}，实际 {} (version={})",
                expected, actual, version.id
            );
            Some((expected, actual))
        } else {
            None
        };

        info!(
            "草稿 {} 落库完成: 新增 {} 个关卡，替换 {} 个",
            version.label,
            plan.lessons.len(),
            replaced_lessons
        );

        Ok(CommitOutcome {
            version_id: version.id,
            version_number: version.version_number,
            lesson_count: plan.lessons.len(),
            replaced_lessons,
            sequence_retries,
            count_mismatch,
        })
    }

    /// 整包模式：删除旧草稿后新建
    async fn replace_draft(&self, request: &CommitRequest) -> Result<(PackageVersion, usize)> {
        let mut replaced = 0;
        if let Some(draft) = self.courses.find_draft_version(&request.package_id).await? {
            replaced = self.courses.delete_version_cascade(&draft.id).await?;
            info!(
                "删除旧草稿 {} (v{})，连同 {} 个关卡",
                draft.label, draft.version_number, replaced
            );
        }
        let version = self.create_draft(request).await?;
        Ok((version, replaced))
    }

    /// 单元模式：沿用草稿，只清掉该单元的关卡
    async fn reuse_draft(
        &self,
        request: &CommitRequest,
        unit_id: &str,
    ) -> Result<(PackageVersion, usize)> {
        let version = match self.courses.find_draft_version(&request.package_id).await? {
            Some(draft) => draft,
            None => self.create_draft(request).await?,
        };
        let replaced = self.courses.delete_unit_lessons(&version.id, unit_id).await?;
        if replaced > 0 {
            info!("删除单元 {} 的 {} 个旧关卡", unit_id, replaced);
        }
        Ok((version, replaced))
    }

    async fn create_draft(&self, request: &CommitRequest) -> Result<PackageVersion> {
        // 版本号可能不连续（旧草稿被删），取最大值再加一
        let version_number = self.courses.max_version_number(&request.package_id).await? + 1;
        let version = self
            .courses
            .create_version(NewVersion {
                package_id: request.package_id.clone(),
                version_number,
                label: format!("AI Draft #{}", version_number),
                notes: format!("生成自 {}", request.source_names.join(", ")),
                created_by: request.triggered_by.clone(),
            })
            .await?;
        Ok(version)
    }

    /// 写入一个关卡，返回因序号冲突而重试的次数
    async fn commit_lesson(
        &self,
        version: &PackageVersion,
        lesson: &LessonPlan,
        request: &CommitRequest,
        next_sequence: &mut u32,
    ) -> Result<u32> {
        let items: Vec<NewLessonItem> = lesson
            .items
            .iter()
            .map(|item| NewLessonItem {
                item_type: item.item_type.as_str().to_string(),
                title: item.title.clone(),
                payload: payload_compat::to_stored(&item.payload),
            })
            .collect();

        let mut attempt = 1;
        loop {
            let new_lesson = NewLesson {
                package_id: request.package_id.clone(),
                package_version_id: version.id.clone(),
                unit_id: request.unit_id.clone(),
                title: lesson.title.clone(),
                sequence: *next_sequence,
                summary: lesson.summary.clone(),
                difficulty: lesson.difficulty,
                items: items.clone(),
                created_by: request.triggered_by.clone(),
            };

            match self.courses.create_lesson(new_lesson).await {
                Ok(_) => {
                    *next_sequence += 1;
                    return Ok(attempt - 1);
                }
                Err(StoreError::SequenceConflict { sequence, .. })
                    if attempt < self.sequence_attempts =>
                {
                    warn!(
                        "关卡 {} 序号 {} 冲突，改用 {} 重试 ({}/{})",
                        lesson.title,
                        sequence,
                        sequence + 1,
                        attempt,
                        self.sequence_attempts
                    );
                    *next_sequence = sequence + 1;
                    attempt += 1;
                }
                Err(StoreError::SequenceConflict { .. }) => {
                    return Err(PipelineError::SequenceRetriesExhausted {
                        title: lesson.title.clone(),
                        attempts: attempt,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// 版本快照：草稿结构 + 存储格式的载荷
fn plan_snapshot(plan: &CoursePlan) -> Value {
    let lessons: Vec<Value> = plan
        .lessons
        .iter()
        .map(|lesson| {
            let items: Vec<Value> = lesson
                .items
                .iter()
                .map(|item| {
                    json!({
                        "type": item.item_type.as_str(),
                        "title": item.title,
                        "payload": payload_compat::to_stored(&item.payload),
                    })
                })
                .collect();
            json!({
                "title": lesson.title,
                "summary": lesson.summary,
                "difficulty": lesson.difficulty,
                "items": items,
            })
        })
        .collect();

    json!({
        "packageSummary": plan.package_summary,
        "lessons": lessons,
    })
}
