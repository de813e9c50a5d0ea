use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::material::MaterialDescriptor;

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Succeeded,
    Failed,
    /// 只能由外部设置
    Canceled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Canceled
        )
    }

    /// 能否被工作进程取走执行（失败的任务可被队列重新投递）
    pub fn can_start(self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Failed)
    }
}

/// 任务输入
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInput {
    pub materials: Vec<MaterialDescriptor>,
}

/// 任务成功结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub version_id: String,
    pub version_number: u32,
    pub lesson_count: usize,
}

/// 生成任务
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationJob {
    pub id: String,
    pub package_id: Option<String>,
    /// 只替换某个单元的关卡
    pub unit_id: Option<String>,
    pub triggered_by: Option<String>,
    pub status: JobStatus,
    pub progress: u8,
    pub input: JobInput,
    pub result: Option<JobResult>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl GenerationJob {
    /// 新建任务，初始状态为 queued
    pub fn queued(
        package_id: impl Into<String>,
        unit_id: Option<String>,
        materials: Vec<MaterialDescriptor>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            package_id: Some(package_id.into()),
            unit_id,
            triggered_by: None,
            status: JobStatus::Queued,
            progress: 0,
            input: JobInput { materials },
            result: None,
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

/// 任务状态更新
///
/// `None` 的字段保持原值不变；`clear_failure` 为真时先清掉上一次的错误和完成时间。
#[derive(Debug, Clone, PartialEq)]
pub struct JobUpdate {
    pub status: JobStatus,
    pub clear_failure: bool,
    pub progress: Option<u8>,
    pub result: Option<JobResult>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobUpdate {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status,
            clear_failure: false,
            progress: None,
            result: None,
            error_message: None,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress.min(100));
        self
    }

    pub fn started_now(mut self) -> Self {
        self.started_at = Some(Utc::now());
        self
    }

    pub fn completed_now(mut self) -> Self {
        self.completed_at = Some(Utc::now());
        self
    }

    pub fn result(mut self, result: JobResult) -> Self {
        self.result = Some(result);
        self
    }

    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// 重新拾取时使用：上一次投递留下的 error_message / completed_at 作废
    pub fn clear_failure(mut self) -> Self {
        self.clear_failure = true;
        self
    }
}

impl GenerationJob {
    /// 应用一次状态更新
    pub fn apply(&mut self, update: JobUpdate) {
        self.status = update.status;
        if update.clear_failure {
            self.error_message = None;
            self.completed_at = None;
        }
        if let Some(progress) = update.progress {
            self.progress = progress;
        }
        if update.result.is_some() {
            self.result = update.result;
        }
        if update.error_message.is_some() {
            self.error_message = update.error_message;
        }
        if update.started_at.is_some() {
            self.started_at = update.started_at;
        }
        if update.completed_at.is_some() {
            self.completed_at = update.completed_at;
        }
    }
}

/// 任务日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

/// 任务日志（只追加）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobLogEntry {
    pub level: LogLevel,
    pub message: String,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl JobLogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            level,
            message: message.into(),
            details,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        assert!(JobStatus::Queued.can_start());
        assert!(JobStatus::Failed.can_start());
        assert!(!JobStatus::Canceled.can_start());
        assert!(!JobStatus::Succeeded.can_start());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Canceled.is_terminal());
    }

    #[test]
    fn test_apply_keeps_unset_fields() {
        let mut job = GenerationJob::queued("pkg", None, Vec::new());
        job.apply(JobUpdate::status(JobStatus::Processing).progress(5).started_now());
        assert_eq!(job.progress, 5);
        assert!(job.started_at.is_some());

        job.apply(JobUpdate::status(JobStatus::Failed).error("boom").completed_now());
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.progress, 5);
        assert_eq!(job.error_message.as_deref(), Some("boom"));
        assert!(job.started_at.is_some());
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_pickup_clears_previous_failure() {
        let mut job = GenerationJob::queued("pkg", None, Vec::new());
        job.apply(JobUpdate::status(JobStatus::Failed).error("boom").completed_now());
        assert!(job.completed_at.is_some());

        job.apply(
            JobUpdate::status(JobStatus::Processing)
                .progress(5)
                .started_now()
                .clear_failure(),
        );
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.error_message.is_none());
        assert!(job.completed_at.is_none());
        assert!(job.started_at.is_some());

        // 同一次更新里显式给出的值仍然生效
        job.apply(JobUpdate::status(JobStatus::Failed).clear_failure().error("again"));
        assert_eq!(job.error_message.as_deref(), Some("again"));
    }

    #[test]
    fn test_result_wire_format() {
        let result = JobResult {
            version_id: "v1".to_string(),
            version_number: 2,
            lesson_count: 15,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"versionId": "v1", "versionNumber": 2, "lessonCount": 15})
        );
    }
}
