//! # Course Gen Worker
//!
//! 把上传的教材素材（扫描页、图片、PDF、音频）生成为分轮练习关卡草稿的后台任务
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 与业务无关的通用能力
//! - `retry` / `cache` / `batch` - 指数退避、TTL 缓存、分批并发
//! - `clients/` - 对象存储、OCR、语音识别、翻译的 trait 与 HTTP 实现
//! - `store/` - 课程包与任务的持久化接口，以及进程内实现
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 流水线的各个阶段，每个只做一件事
//! - `MaterialLoader` - 取出素材文本
//! - `TextExtractor` - 抽取候选句
//! - `SentenceScorer` - 打分与近似去重
//! - `RoundDistributor` - 分轮
//! - `LessonPlanBuilder` - 生成关卡草稿
//! - `TranslationEnricher` - 补全翻译
//! - `PersistenceCommitter` - 草稿落库
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个任务"的完整处理流程
//! - `JobCtx` - 上下文封装（job_id + 投递次数）
//! - `GenerationFlow` - 阶段编排与进度检查点
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/job_runner` - 任务状态机
//! - `orchestrator/worker_pool` - 队列、并发与重投
//! - `orchestrator/app` - 应用入口
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod store;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, PipelineSettings};
pub use error::{PipelineError, Result, ServiceError, StoreError};
pub use models::{GenerationJob, JobResult, JobStatus};
pub use orchestrator::{App, JobRunner, PoolStats, RunOutcome, WorkerPool};
pub use workflow::{GenerationFlow, JobCtx, PipelineDeps};
