//! 持久化层接口
//!
//! 流水线只通过这两个 trait 读写课程包和任务状态：
//! - `CourseStore`：课程包、版本、关卡、内容项
//! - `JobStore`：生成任务状态与任务日志
//!
//! `create_lesson` 必须在一个短事务里写完关卡、关卡版本和全部内容项，
//! 同一版本内关卡序号唯一，冲突时返回 `StoreError::SequenceConflict`。

pub mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;
use crate::models::{GenerationJob, JobLogEntry, JobUpdate};

/// 版本状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    Draft,
    Published,
}

/// 课程包
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoursePackage {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub current_version_id: Option<String>,
}

/// 课程包版本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageVersion {
    pub id: String,
    pub package_id: String,
    pub version_number: u32,
    pub label: String,
    pub notes: String,
    pub status: VersionStatus,
    pub source_type: String,
    /// 课程草稿快照
    pub payload: Value,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonRecord {
    pub id: String,
    pub package_id: String,
    pub package_version_id: String,
    pub unit_id: Option<String>,
    pub title: String,
    pub sequence: u32,
    pub current_version_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonVersionRecord {
    pub id: String,
    pub lesson_id: String,
    pub version_number: u32,
    pub title: String,
    pub summary: String,
    pub difficulty: u8,
    pub status: VersionStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonItemRecord {
    pub id: String,
    pub lesson_version_id: String,
    pub order_index: u32,
    pub item_type: String,
    pub title: Option<String>,
    pub payload: Value,
}

/// 新建版本参数
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub package_id: String,
    pub version_number: u32,
    pub label: String,
    pub notes: String,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewLessonItem {
    pub item_type: String,
    pub title: Option<String>,
    pub payload: Value,
}

/// 新建关卡参数（关卡 + 第一个关卡版本 + 内容项）
#[derive(Debug, Clone)]
pub struct NewLesson {
    pub package_id: String,
    pub package_version_id: String,
    pub unit_id: Option<String>,
    pub title: String,
    pub sequence: u32,
    pub summary: String,
    pub difficulty: u8,
    pub items: Vec<NewLessonItem>,
    pub created_by: Option<String>,
}

#[async_trait]
pub trait CourseStore: Send + Sync {
    async fn get_package(&self, package_id: &str) -> Result<CoursePackage, StoreError>;

    /// 课程包当前的草稿版本（至多一个）
    async fn find_draft_version(
        &self,
        package_id: &str,
    ) -> Result<Option<PackageVersion>, StoreError>;

    /// 课程包已有的最大版本号，没有版本时为 0
    async fn max_version_number(&self, package_id: &str) -> Result<u32, StoreError>;

    /// 删除版本及其全部关卡，返回删除的关卡数
    async fn delete_version_cascade(&self, version_id: &str) -> Result<usize, StoreError>;

    /// 只删除某个单元的关卡，返回删除的关卡数
    async fn delete_unit_lessons(
        &self,
        version_id: &str,
        unit_id: &str,
    ) -> Result<usize, StoreError>;

    /// 版本内最大的关卡序号，没有关卡时为 0
    async fn max_lesson_sequence(&self, version_id: &str) -> Result<u32, StoreError>;

    async fn create_version(&self, version: NewVersion) -> Result<PackageVersion, StoreError>;

    async fn update_version_payload(
        &self,
        version_id: &str,
        payload: Value,
    ) -> Result<(), StoreError>;

    async fn create_lesson(&self, lesson: NewLesson) -> Result<LessonRecord, StoreError>;

    /// 设置课程包当前版本；描述为空时用 `description_fallback` 补上
    async fn set_current_version(
        &self,
        package_id: &str,
        version_id: &str,
        description_fallback: &str,
    ) -> Result<(), StoreError>;

    async fn count_lessons(&self, version_id: &str) -> Result<usize, StoreError>;
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert_job(&self, job: GenerationJob) -> Result<(), StoreError>;

    async fn get_job(&self, job_id: &str) -> Result<GenerationJob, StoreError>;

    async fn update_job(&self, job_id: &str, update: JobUpdate)
        -> Result<GenerationJob, StoreError>;

    async fn append_log(&self, job_id: &str, entry: JobLogEntry) -> Result<(), StoreError>;

    /// 任务日志（追加顺序），供状态轮询接口读取
    async fn list_logs(&self, job_id: &str) -> Result<Vec<JobLogEntry>, StoreError>;
}
