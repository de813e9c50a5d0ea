//! 单个任务执行器 - 编排层
//!
//! 负责任务状态机：
//!
//! ```text
//! queued ──┐
//!          ├─→ processing ─→ succeeded
//! failed ──┘              └→ failed
//! ```
//!
//! canceled 只能由外部设置；取任务时已经是 succeeded / canceled / processing 的直接跳过。
//! 流程中的任何错误都会把任务标记为 failed 并写入错误日志，然后原样返回给队列层。

use std::sync::Arc;

use serde_json::json;
use tracing::{error, info};

use crate::error::{PipelineError, Result, StoreError};
use crate::models::{JobLogEntry, JobResult, JobStatus, JobUpdate, LogLevel};
use crate::store::JobStore;
use crate::workflow::{GenerationFlow, JobCtx};

/// 任务执行结果
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Succeeded(JobResult),
    /// 任务当前状态不允许执行
    Skipped(JobStatus),
}

pub struct JobRunner {
    flow: GenerationFlow,
    jobs: Arc<dyn JobStore>,
}

impl JobRunner {
    pub fn new(flow: GenerationFlow, jobs: Arc<dyn JobStore>) -> Self {
        Self { flow, jobs }
    }

    /// 执行一个任务
    ///
    /// # 参数
    /// - `job_id`: 任务ID
    /// - `delivery`: 第几次投递（从1开始）
    pub async fn run(&self, job_id: &str, delivery: u32) -> Result<RunOutcome> {
        let job = self.jobs.get_job(job_id).await.map_err(|e| match e {
            StoreError::NotFound { .. } => PipelineError::JobNotFound(job_id.to_string()),
            other => other.into(),
        })?;

        if !job.status.can_start() {
            info!(
                "[任务 {}] 当前状态为 {:?}，跳过",
                job_id, job.status
            );
            return Ok(RunOutcome::Skipped(job.status));
        }

        let ctx = JobCtx::new(
            job.id.clone(),
            delivery,
            job.package_id.clone().unwrap_or_default(),
            job.unit_id.clone(),
        );
        info!(
            "{} 🚀 开始处理 (第 {} 次投递，{} 个素材)",
            ctx,
            delivery,
            job.input.materials.len()
        );

        let job = self
            .jobs
            .update_job(
                job_id,
                JobUpdate::status(JobStatus::Processing)
                    .progress(5)
                    .started_now()
                    .clear_failure(),
            )
            .await?;
        self.append_log(
            &ctx,
            JobLogEntry::new(
                LogLevel::Info,
                "任务开始处理",
                json!({ "delivery": delivery, "materials": job.input.materials.len() }),
            ),
        )
        .await;

        match self.flow.run(&job, &ctx).await {
            Ok(result) => {
                self.jobs
                    .update_job(
                        job_id,
                        JobUpdate::status(JobStatus::Succeeded)
                            .progress(100)
                            .result(result.clone())
                            .completed_now(),
                    )
                    .await?;
                self.append_log(
                    &ctx,
                    JobLogEntry::new(
                        LogLevel::Info,
                        format!("生成完成，共 {} 个关卡", result.lesson_count),
                        json!(result),
                    ),
                )
                .await;
                info!(
                    "{} ✅ 生成完成: 版本 v{}，{} 个关卡",
                    ctx, result.version_number, result.lesson_count
                );
                Ok(RunOutcome::Succeeded(result))
            }
            Err(e) => {
                self.mark_failed(&ctx, &e).await;
                Err(e)
            }
        }
    }

    /// 标记任务失败；这里的存储错误只记日志，返回给队列的仍是原始错误
    async fn mark_failed(&self, ctx: &JobCtx, err: &PipelineError) {
        error!("{} ❌ 处理失败: {}", ctx, err);

        let update = JobUpdate::status(JobStatus::Failed)
            .error(err.to_string())
            .completed_now();
        if let Err(store_err) = self.jobs.update_job(&ctx.job_id, update).await {
            error!("{} 任务状态更新失败: {}", ctx, store_err);
        }

        self.append_log(
            ctx,
            JobLogEntry::new(
                LogLevel::Error,
                err.to_string(),
                json!({
                    "delivery": ctx.delivery,
                    "inputDefect": err.is_input_defect(),
                }),
            ),
        )
        .await;
    }

    async fn append_log(&self, ctx: &JobCtx, entry: JobLogEntry) {
        if let Err(e) = self.jobs.append_log(&ctx.job_id, entry).await {
            error!("{} 任务日志写入失败: {}", ctx, e);
        }
    }
}
