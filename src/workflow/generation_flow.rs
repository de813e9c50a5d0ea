//! 课程生成流程 - 流程层
//!
//! 核心职责：定义"一个生成任务"的完整处理流程
//!
//! 流程顺序（括号内为阶段结束时的进度）：
//! 1. 素材加载：取文件 / OCR / PDF / 语音识别（15）
//! 2. 句子抽取（30）
//! 3. 打分去重 → 轮次分配（55）
//! 4. 关卡草稿 → 翻译补全 → 载荷修复（70）
//! 5. 落库（100 由任务执行器写入）
//!
//! 任务状态的起止（processing / succeeded / failed）由编排层负责，
//! 这里只推进中间进度并写任务日志。

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::clients::{ObjectStore, OcrService, Transcriber, Translator};
use crate::config::PipelineSettings;
use crate::error::{PipelineError, Result};
use crate::infrastructure::TtlCache;
use crate::models::{
    assign_page_offsets, GenerationJob, JobLogEntry, JobResult, JobStatus, JobUpdate, LogLevel,
    Material,
};
use crate::services::{
    collect_raw_sentences, repair_payloads, CommitRequest, LessonPlanBuilder, MaterialLoader,
    PersistenceCommitter, RoundDistributor, SentenceScorer, TextExtractor, TranslationEnricher,
};
use crate::store::{CourseStore, JobStore};
use crate::workflow::job_ctx::JobCtx;

/// 流程依赖的外部能力
#[derive(Clone)]
pub struct PipelineDeps {
    pub storage: Arc<dyn ObjectStore>,
    pub ocr: Arc<dyn OcrService>,
    pub transcriber: Arc<dyn Transcriber>,
    pub translator: Arc<dyn Translator>,
    pub courses: Arc<dyn CourseStore>,
    pub jobs: Arc<dyn JobStore>,
    /// OCR 结果缓存（跨任务共享）
    pub ocr_cache: Arc<TtlCache<String>>,
    /// 翻译结果缓存（跨任务共享）
    pub translation_cache: Arc<TtlCache<String>>,
}

/// 课程生成流程
///
/// - 编排各阶段的先后顺序
/// - 在固定检查点推进进度
/// - 只依赖业务能力（services）
pub struct GenerationFlow {
    loader: MaterialLoader,
    extractor: TextExtractor,
    scorer: SentenceScorer,
    distributor: RoundDistributor,
    builder: LessonPlanBuilder,
    enricher: TranslationEnricher,
    committer: PersistenceCommitter,
    jobs: Arc<dyn JobStore>,
}

impl GenerationFlow {
    pub fn new(deps: PipelineDeps, settings: &PipelineSettings) -> Result<Self> {
        Ok(Self {
            loader: MaterialLoader::new(
                deps.storage,
                deps.ocr,
                deps.transcriber,
                deps.ocr_cache,
                settings,
            ),
            extractor: TextExtractor::new(settings)?,
            scorer: SentenceScorer::new(settings),
            distributor: RoundDistributor::new(settings),
            builder: LessonPlanBuilder::new(settings),
            enricher: TranslationEnricher::new(deps.translator, deps.translation_cache, settings),
            committer: PersistenceCommitter::new(deps.courses, settings),
            jobs: deps.jobs,
        })
    }

    pub async fn run(&self, job: &GenerationJob, ctx: &JobCtx) -> Result<JobResult> {
        let package_id = job
            .package_id
            .clone()
            .ok_or(PipelineError::MissingPackage)?;

        let mut materials: Vec<Material> = job
            .input
            .materials
            .iter()
            .cloned()
            .enumerate()
            .map(|(position, descriptor)| Material::new(descriptor, position))
            .collect();
        if materials.is_empty() {
            return Err(PipelineError::NoMaterials);
        }

        // ========== 阶段 1: 素材加载 ==========
        info!("{} 📥 正在加载 {} 个素材...", ctx, materials.len());
        let load = self.loader.load(&mut materials).await?;
        assign_page_offsets(&mut materials);
        for skipped in &load.skipped {
            self.log(
                ctx,
                LogLevel::Warning,
                format!("素材 {} 处理失败，已跳过", skipped.original_name),
                json!({
                    "materialId": skipped.material_id,
                    "reason": skipped.reason,
                }),
            )
            .await;
        }
        self.checkpoint(
            ctx,
            15,
            "素材处理完成",
            json!({
                "materials": materials.len(),
                "withText": load.with_text,
                "ocrAttempted": load.ocr_attempted,
                "ocrFailed": load.ocr_failed,
                "ocrCacheHits": load.ocr_cache_hits,
            }),
        )
        .await?;

        // ========== 阶段 2: 句子抽取 ==========
        for material in materials.iter_mut() {
            let count = self.extractor.extract_material(material);
            info!(
                "{} 素材 {} 抽取到 {} 个句子",
                ctx, material.descriptor.original_name, count
            );
        }
        let raw = collect_raw_sentences(&materials);
        self.checkpoint(ctx, 30, "句子抽取完成", json!({ "sentences": raw.len() }))
            .await?;

        // ========== 阶段 3: 打分去重 + 轮次分配 ==========
        let candidates = self.scorer.rank(raw);
        let candidate_count = candidates.len();
        let limit = materials
            .iter()
            .filter_map(|m| m.descriptor.lesson_count_hint)
            .max();
        let rounds = self.distributor.distribute(candidates, limit)?;
        let selected: usize = rounds.iter().map(Vec::len).sum();
        self.checkpoint(
            ctx,
            55,
            "句子筛选与分轮完成",
            json!({
                "candidates": candidate_count,
                "selected": selected,
                "rounds": rounds.len(),
            }),
        )
        .await?;

        // ========== 阶段 4: 关卡草稿 + 翻译 ==========
        let source_names: Vec<String> = materials
            .iter()
            .map(|m| m.descriptor.original_name.clone())
            .collect();
        let mut plan = self.builder.build(&rounds, &source_names);

        let translation = self.enricher.enrich(&mut plan).await;
        if translation.failed > 0 {
            self.log(
                ctx,
                LogLevel::Warning,
                format!("{} 个句子翻译失败，译文留空", translation.failed),
                json!({ "failed": translation.failed }),
            )
            .await;
        }

        let repair = repair_payloads(&mut plan);
        if repair.repaired > 0 || repair.dropped_lessons > 0 {
            self.log(
                ctx,
                LogLevel::Warning,
                "部分内容项缺少英文句子，已修复或丢弃",
                json!({
                    "repaired": repair.repaired,
                    "droppedLessons": repair.dropped_lessons,
                }),
            )
            .await;
        }
        if plan.lessons.is_empty() {
            return Err(PipelineError::NoUsableSentences);
        }
        self.checkpoint(
            ctx,
            70,
            "关卡草稿生成完成",
            json!({
                "lessons": plan.lessons.len(),
                "translated": translation.translated + translation.from_cache,
                "translationFailed": translation.failed,
            }),
        )
        .await?;

        // ========== 阶段 5: 落库 ==========
        info!("{} 💾 正在写入草稿...", ctx);
        let request = CommitRequest {
            package_id,
            unit_id: job.unit_id.clone(),
            triggered_by: job.triggered_by.clone(),
            source_names,
        };
        let outcome = self.committer.commit(&plan, &request).await?;

        if let Some((expected, actual)) = outcome.count_mismatch {
            self.log(
                ctx,
                LogLevel::Warning,
                "写入后的关卡数量与预期不一致",
                json!({ "expected": expected, "actual": actual }),
            )
            .await;
        }
        if outcome.sequence_retries > 0 {
            self.log(
                ctx,
                LogLevel::Info,
                format!("关卡序号冲突 {} 次，已自动顺延", outcome.sequence_retries),
                json!({ "retries": outcome.sequence_retries }),
            )
            .await;
        }

        Ok(JobResult {
            version_id: outcome.version_id,
            version_number: outcome.version_number,
            lesson_count: outcome.lesson_count,
        })
    }

    /// 推进进度并写一条任务日志
    async fn checkpoint(
        &self,
        ctx: &JobCtx,
        progress: u8,
        message: &str,
        details: Value,
    ) -> Result<()> {
        self.jobs
            .update_job(
                &ctx.job_id,
                JobUpdate::status(JobStatus::Processing).progress(progress),
            )
            .await?;
        info!("{} ✓ {} ({}%)", ctx, message, progress);
        self.log(ctx, LogLevel::Info, message, details).await;
        Ok(())
    }

    /// 写任务日志；日志写失败不影响任务本身
    async fn log(&self, ctx: &JobCtx, level: LogLevel, message: impl Into<String>, details: Value) {
        let entry = JobLogEntry::new(level, message, details);
        if level == LogLevel::Warning {
            warn!("{} ⚠️ {}", ctx, entry.message);
        }
        if let Err(e) = self.jobs.append_log(&ctx.job_id, entry).await {
            warn!("{} 任务日志写入失败: {}", ctx, e);
        }
    }
}
