//! 任务队列与工作池 - 编排层
//!
//! ## 核心功能
//!
//! 1. **队列**：任务ID通过 `mpsc` 通道投递
//! 2. **并发控制**：使用 Semaphore 限制同时执行的任务数
//! 3. **重新投递**：失败的任务延迟后重新入队，直到达到最大投递次数；
//!    输入缺陷（素材本身的问题）不再重投
//! 4. **全局统计**：汇总所有任务的处理结果

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::orchestrator::job_runner::{JobRunner, RunOutcome};

/// 一次投递
#[derive(Debug, Clone)]
struct Delivery {
    job_id: String,
    attempt: u32,
}

/// 处理统计
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// 重新投递次数
    pub redelivered: usize,
}

pub struct WorkerPool {
    runner: Arc<JobRunner>,
    max_concurrent: usize,
    max_delivery_attempts: u32,
    redelivery_delay: Duration,
}

impl WorkerPool {
    pub fn new(runner: Arc<JobRunner>, config: &Config) -> Self {
        Self {
            runner,
            max_concurrent: config.max_concurrent_jobs.max(1),
            max_delivery_attempts: config.max_delivery_attempts.max(1),
            redelivery_delay: Duration::from_millis(config.redelivery_delay_ms),
        }
    }

    /// 处理所有任务，全部结束（成功、跳过或投递次数用尽）后返回统计
    pub async fn run(&self, job_ids: Vec<String>) -> PoolStats {
        let mut stats = PoolStats {
            total: job_ids.len(),
            ..Default::default()
        };
        if job_ids.is_empty() {
            return stats;
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<Delivery>();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut running: JoinSet<(Delivery, Result<RunOutcome>)> = JoinSet::new();
        // 已入队（含等待重投）但尚未结束的投递数
        let mut pending = 0usize;

        for job_id in job_ids {
            if tx.send(Delivery { job_id, attempt: 1 }).is_ok() {
                pending += 1;
            }
        }

        info!(
            "📋 共 {} 个任务，最大并发 {}，最多投递 {} 次",
            stats.total, self.max_concurrent, self.max_delivery_attempts
        );

        while pending > 0 {
            tokio::select! {
                Some(delivery) = rx.recv() => {
                    let permit = match semaphore.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(e) => {
                            error!("[任务 {}] 无法获取执行许可: {}", delivery.job_id, e);
                            stats.failed += 1;
                            pending -= 1;
                            continue;
                        }
                    };
                    let runner = self.runner.clone();
                    running.spawn(async move {
                        let _permit = permit;
                        let outcome = runner.run(&delivery.job_id, delivery.attempt).await;
                        (delivery, outcome)
                    });
                }
                Some(joined) = running.join_next() => {
                    pending -= 1;
                    match joined {
                        Ok((_, Ok(RunOutcome::Succeeded(_)))) => stats.succeeded += 1,
                        Ok((_, Ok(RunOutcome::Skipped(_)))) => stats.skipped += 1,
                        Ok((delivery, Err(e))) => {
                            if delivery.attempt < self.max_delivery_attempts && !e.is_input_defect() {
                                warn!(
                                    "[任务 {}] 第 {} 次投递失败，{:?} 后重新投递",
                                    delivery.job_id, delivery.attempt, self.redelivery_delay
                                );
                                stats.redelivered += 1;
                                pending += 1;
                                self.redeliver(&tx, delivery);
                            } else {
                                error!(
                                    "[任务 {}] ❌ 最终失败 (共投递 {} 次): {}",
                                    delivery.job_id, delivery.attempt, e
                                );
                                stats.failed += 1;
                            }
                        }
                        Err(e) => {
                            error!("任务执行失败: {}", e);
                            stats.failed += 1;
                        }
                    }
                }
                else => break,
            }
        }

        stats
    }

    /// 延迟后重新入队
    fn redeliver(&self, tx: &mpsc::UnboundedSender<Delivery>, delivery: Delivery) {
        let tx = tx.clone();
        let delay = self.redelivery_delay;
        tokio::spawn(async move {
            if !delay.is_zero() {
                sleep(delay).await;
            }
            let next = Delivery {
                job_id: delivery.job_id,
                attempt: delivery.attempt + 1,
            };
            if let Err(e) = tx.send(next) {
                error!("[任务 {}] 重新投递失败", e.0.job_id);
            }
        });
    }
}
