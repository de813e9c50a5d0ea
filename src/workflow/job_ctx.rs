//! 任务处理上下文
//!
//! 封装"我正在处理哪个任务"这一信息，用于日志前缀

use std::fmt::Display;

/// 任务处理上下文
#[derive(Debug, Clone)]
pub struct JobCtx {
    /// 任务ID
    pub job_id: String,

    /// 第几次投递（从1开始，仅用于日志显示）
    pub delivery: u32,

    /// 课程包ID
    pub package_id: String,

    /// 单元ID（单元模式才有）
    pub unit_id: Option<String>,
}

impl JobCtx {
    pub fn new(job_id: String, delivery: u32, package_id: String, unit_id: Option<String>) -> Self {
        Self {
            job_id,
            delivery,
            package_id,
            unit_id,
        }
    }
}

impl Display for JobCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[任务 {}]", self.job_id)
    }
}
