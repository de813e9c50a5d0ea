//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `app` - 应用入口
//! - 创建客户端、缓存、存储
//! - 加载任务清单并入队
//! - 导出存储快照、输出全局统计
//!
//! ### `worker_pool` - 任务队列与工作池
//! - `mpsc` 队列 + Semaphore 控制并发
//! - 失败任务延迟重投
//!
//! ### `job_runner` - 单个任务执行器
//! - 任务状态机（queued / failed → processing → succeeded / failed）
//! - 委托 `GenerationFlow` 执行流程
//!
//! ## 层次关系
//!
//! ```text
//! app (加载清单)
//!     ↓
//! worker_pool (处理 Vec<JobId>)
//!     ↓
//! job_runner (处理单个任务的状态)
//!     ↓
//! workflow::GenerationFlow (处理单个任务的阶段)
//!     ↓
//! services → clients / store / infrastructure
//! ```

pub mod app;
pub mod job_runner;
pub mod worker_pool;

pub use app::App;
pub use job_runner::{JobRunner, RunOutcome};
pub use worker_pool::{PoolStats, WorkerPool};
